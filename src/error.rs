use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use maud::html;
use snafu::Snafu;
use std::{num::ParseIntError, path::PathBuf};

pub type RosterResult<T> = Result<T, RosterError>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum RosterError {
    #[snafu(display("Error opening database"))]
    OpenDatabase { source: sqlx::Error },
    #[snafu(display("Error getting db connection"))]
    GetDatabaseConnection { source: sqlx::Error },
    #[snafu(display("Error making SQL query"))]
    MakeQuery { source: sqlx::Error },
    #[snafu(display("Error commiting SQL transaction"))]
    CommitTransaction { source: sqlx::Error },
    #[snafu(display("Error migrating DB schema"))]
    MigrateError { source: sqlx::migrate::MigrateError },
    #[snafu(display("Unable to retrieve env var `{}`", name))]
    BadEnvVar {
        source: dotenvy::Error,
        name: &'static str,
    },
    #[snafu(display("Unable to parse `{}` as a number", name))]
    ParseNumber {
        source: ParseIntError,
        name: &'static str,
    },
    #[snafu(display("Unable to find student with ID: {}", id))]
    MissingStudent { id: i64 },
    #[snafu(display("Unable to find student with email: {}", email))]
    MissingStudentByEmail { email: String },
    #[snafu(display("Student {} has no audio", id))]
    MissingAudio { id: i64 },
    #[snafu(display("A student with email {} already exists", email))]
    DuplicateEmail { email: String },
    #[snafu(display("Missing required field `{}`", field))]
    MissingField { field: &'static str },
    #[snafu(display("QR Code not recognized"))]
    Unreadable,
    #[snafu(display("QR Code does not contain a valid ID"))]
    NoIdField,
    #[snafu(display("QR Code ID {:?} is not a number", value))]
    BadIdField {
        source: ParseIntError,
        value: String,
    },
    #[snafu(display("Error encoding image"))]
    EncodeImage { source: image::ImageError },
    #[snafu(display("Error building QR code"))]
    RenderQr { source: qrcode::types::QrError },
    #[snafu(display("Unsupported recorded audio type {:?}", mime))]
    UnsupportedAudioFormat { mime: String },
    #[snafu(display("Recorded audio was not a base64 data URL"))]
    MalformedDataUrl,
    #[snafu(display("Error decoding Base64"))]
    B64 { source: base64::DecodeError },
    #[snafu(display("Error with temporary audio file"))]
    TempFile { source: std::io::Error },
    #[snafu(display("Error transcoding audio: {}", reason))]
    Transcode { reason: String },
    #[snafu(display("Error with file {:?}", path))]
    FileIo {
        source: std::io::Error,
        path: PathBuf,
    },
    #[snafu(display("Error joining blocking task"))]
    JoinTask { source: tokio::task::JoinError },
    #[snafu(display("Error with multipart form input"))]
    Multipart {
        source: axum::extract::multipart::MultipartError,
    },
    #[snafu(display("Error with CSVs"))]
    Csv { source: csv::Error },
    #[snafu(display("Invalid JSON body: {}", source.body_text()))]
    JsonBody {
        source: axum::extract::rejection::JsonRejection,
    },
}

impl RosterError {
    #[allow(clippy::match_same_arms)]
    pub fn status_code(&self) -> StatusCode {
        const ISE: StatusCode = StatusCode::INTERNAL_SERVER_ERROR; //internal server error
        const NF: StatusCode = StatusCode::NOT_FOUND; //not found
        const BI: StatusCode = StatusCode::BAD_REQUEST; //bad input

        match self {
            Self::OpenDatabase { .. } | Self::GetDatabaseConnection { .. } => ISE,
            Self::MigrateError { .. } => ISE,
            Self::MakeQuery { .. } | Self::CommitTransaction { .. } => ISE,
            Self::BadEnvVar { .. } | Self::ParseNumber { .. } => ISE,
            Self::MissingStudent { .. } | Self::MissingStudentByEmail { .. } => NF,
            Self::MissingAudio { .. } => NF,
            Self::DuplicateEmail { .. } | Self::MissingField { .. } => BI,
            Self::Unreadable | Self::NoIdField | Self::BadIdField { .. } => BI,
            Self::EncodeImage { .. } | Self::RenderQr { .. } => ISE,
            Self::UnsupportedAudioFormat { .. } | Self::MalformedDataUrl | Self::B64 { .. } => BI,
            Self::TempFile { .. } | Self::Transcode { .. } => ISE,
            Self::FileIo { .. } | Self::JoinTask { .. } => ISE,
            Self::Multipart { source } => source.status(),
            Self::JsonBody { source } => source.status(),
            Self::Csv { .. } => BI,
        }
    }
}

impl IntoResponse for RosterError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();

        error!(?self, "Error!");
        let body = html! {
            div class="bg-red-100 border border-red-400 text-red-700 px-4 py-3 rounded relative mb-4" role="alert" {
                strong class="font-bold" {"Roster Error: "}
                span {(self.to_string())}
            }
        };
        (status_code, body).into_response()
    }
}
