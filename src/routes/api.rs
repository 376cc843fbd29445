use crate::{
    data::{
        DataType,
        student::{Student, StudentFields, StudentUpdate},
    },
    error::RosterError,
    state::RosterState,
};
use axum::{
    Json,
    extract::{FromRequest, Path, State, rejection::JsonRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;

/// Same errors as the HTML routes, rendered as `{"error": ...}`.
#[derive(Debug)]
pub struct ApiError(RosterError);

impl From<RosterError> for ApiError {
    fn from(value: RosterError) -> Self {
        Self(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status_code = self.0.status_code();

        error!(error = ?self.0, "API Error!");
        (status_code, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(source: JsonRejection) -> Self {
        Self(RosterError::JsonBody { source })
    }
}

type ApiResult<T> = Result<T, ApiError>;

/// `Json`, but a body that can't be read comes back as an [`ApiError`] too.
#[derive(FromRequest)]
#[from_request(via(Json), rejection(ApiError))]
pub struct ApiJson<T>(pub T);

#[derive(Debug, Serialize)]
pub struct StudentJson {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub department: String,
    pub email: String,
    pub audio_filename: Option<String>,
    pub audio_url: Option<String>,
    pub qr_code_file: Option<String>,
}

impl From<Student> for StudentJson {
    fn from(student: Student) -> Self {
        let audio_url = student.audio_url();

        Self {
            id: student.id,
            first_name: student.first_name,
            last_name: student.last_name,
            department: student.department,
            email: student.email,
            audio_filename: student.audio.map(|clip| clip.filename),
            audio_url,
            qr_code_file: student.qr_code_file,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct Created {
    pub message: &'static str,
    pub id: i64,
}

pub async fn post_student(
    State(state): State<RosterState>,
    ApiJson(fields): ApiJson<StudentFields>,
) -> ApiResult<(StatusCode, Json<Created>)> {
    let id =
        Student::insert_into_database(fields, &mut *state.get_connection().await?).await?;

    Ok((
        StatusCode::CREATED,
        Json(Created {
            message: "Student created successfully.",
            id,
        }),
    ))
}

pub async fn get_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> ApiResult<Json<StudentJson>> {
    let student = Student::get(id, &mut *state.get_connection().await?).await?;
    Ok(Json(student.into()))
}

pub async fn put_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
    ApiJson(update): ApiJson<StudentUpdate>,
) -> ApiResult<Json<StudentJson>> {
    let mut conn = state.get_connection().await?;
    Student::update_in_database(id, update, &mut conn).await?;
    let student = Student::get(id, &mut conn).await?;

    Ok(Json(student.into()))
}
