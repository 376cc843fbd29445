use crate::{
    audio::{RecordedClip, transcode_recording, uploaded_clip},
    data::{
        DataType,
        student::{AudioClip, NewStudent, Student, StudentFields, StudentUpdate},
    },
    error::{CommitTransactionSnafu, MissingFieldSnafu, MultipartSnafu, RosterResult},
    maud_conveniences::{
        file_form_element, form_submit_button, simple_form_element, subtitle, title,
    },
    state::RosterState,
};
use axum::{
    extract::{Multipart, Path, Query, State},
    response::Redirect,
};
use maud::{Markup, PreEscaped, html};
use serde::Deserialize;
use snafu::{OptionExt, ResultExt};

const RECORDER_JS: &str = r"
const button = document.getElementById('record_button');
const status = document.getElementById('record_status');
const hidden = document.getElementById('audio_data');
let recorder = null;

button.addEventListener('click', async () => {
    if (recorder && recorder.state === 'recording') {
        recorder.stop();
        return;
    }

    const stream = await navigator.mediaDevices.getUserMedia({ audio: true });
    const chunks = [];
    recorder = new MediaRecorder(stream);
    recorder.ondataavailable = (e) => chunks.push(e.data);
    recorder.onstop = () => {
        stream.getTracks().forEach((t) => t.stop());
        const reader = new FileReader();
        reader.onloadend = () => {
            hidden.value = reader.result;
            status.textContent = 'Recording ready, save to keep it';
            button.textContent = 'Record again';
        };
        reader.readAsDataURL(new Blob(chunks, { type: recorder.mimeType }));
    };
    recorder.start();
    status.textContent = 'Recording...';
    button.textContent = 'Stop';
});
";

/// Everything the add and edit forms can send.
#[derive(Default)]
struct StudentMultipart {
    first_name: Option<String>,
    last_name: Option<String>,
    department: Option<String>,
    email: Option<String>,
    audio: Option<AudioClip>,
    audio_data: Option<String>,
}

impl StudentMultipart {
    async fn read(mut multipart: Multipart) -> RosterResult<Self> {
        let mut form = Self::default();

        loop {
            let Some(field) = multipart.next_field().await.context(MultipartSnafu)? else {
                break;
            };
            let name = field.name().unwrap_or_default().to_string();

            match name.as_str() {
                "audio" => {
                    let filename = field.file_name().map(ToString::to_string);
                    let bytes = field.bytes().await.context(MultipartSnafu)?;
                    form.audio = uploaded_clip(filename.as_deref(), bytes.to_vec());
                }
                "audio_data" => {
                    let text = field.text().await.context(MultipartSnafu)?;
                    form.audio_data = Some(text).filter(|t| !t.trim().is_empty());
                }
                "first_name" => form.first_name = Some(field.text().await.context(MultipartSnafu)?),
                "last_name" => form.last_name = Some(field.text().await.context(MultipartSnafu)?),
                "department" => form.department = Some(field.text().await.context(MultipartSnafu)?),
                "email" => form.email = Some(field.text().await.context(MultipartSnafu)?),
                _ => debug!(?name, "Ignoring unknown form field"),
            }
        }

        Ok(form)
    }

    fn into_fields(self) -> (StudentFields, Option<String>) {
        (
            StudentFields {
                first_name: self.first_name,
                last_name: self.last_name,
                department: self.department,
                email: self.email,
                audio: self.audio,
            },
            self.audio_data,
        )
    }
}

fn student_form(student: Option<&Student>) -> Markup {
    html! {
        (simple_form_element("first_name", "First Name", true, None, student.map(|s| s.first_name.as_str())))
        (simple_form_element("last_name", "Last Name", true, None, student.map(|s| s.last_name.as_str())))
        (simple_form_element("department", "Department", true, None, student.map(|s| s.department.as_str())))
        (simple_form_element("email", "Email", true, Some("email"), student.map(|s| s.email.as_str())))
        (file_form_element("audio", "Audio File (optional)", "audio/*"))
    }
}

pub async fn get_add_student(State(state): State<RosterState>) -> Markup {
    state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            (title("Add Student"))
            form method="post" action="/student/add" enctype="multipart/form-data" {
                (student_form(None))
                (form_submit_button(Some("Add Student")))
            }
        }
    })
}

pub async fn post_add_student(
    State(state): State<RosterState>,
    multipart: Multipart,
) -> RosterResult<Redirect> {
    let (fields, _) = StudentMultipart::read(multipart).await?.into_fields();
    Student::insert_into_database(fields, &mut *state.get_connection().await?).await?;

    Ok(Redirect::to("/"))
}

pub async fn get_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Markup> {
    let student = Student::get(id, &mut *state.get_connection().await?).await?;
    Ok(state.render(render_student(&student)))
}

#[derive(Deserialize)]
pub struct EmailQuery {
    email: Option<String>,
}

pub async fn get_student_by_email(
    State(state): State<RosterState>,
    Query(EmailQuery { email }): Query<EmailQuery>,
) -> RosterResult<Markup> {
    let email = email
        .filter(|e| !e.trim().is_empty())
        .context(MissingFieldSnafu { field: "email" })?;
    let student = Student::find_by_email(&email, &mut *state.get_connection().await?).await?;
    Ok(state.render(render_student(&student)))
}

fn render_student(student: &Student) -> Markup {
    let id = student.id;

    html! {
        div class="rounded-lg shadow-md overflow-hidden bg-gray-800 max-w-md w-full p-6 flex flex-col space-y-2" {
            (title(student))
            p class="text-gray-200 font-semibold" {
                "Department: "
                span class="font-medium" {(student.department)}
            }
            p {
                a href={"mailto:" (student.email)} class="text-blue-400 underline" {(student.email)}
            }
            p class="text-sm text-gray-400" {"ID: " (id)}

            @if let Some(clip) = &student.audio {
                (subtitle("Audio"))
                audio controls src={"/student/" (id) "/audio"} {}
                p class="text-sm italic" {(clip.filename)}
            }

            @if let Some(qr_code_file) = &student.qr_code_file {
                (subtitle("QR Code"))
                img src={"/qrcodes/" (qr_code_file)} alt="QR code" class="w-48 h-48 bg-white";
            }

            div class="flex flex-row space-x-2 pt-4" {
                a href={"/student/" (id) "/edit"} class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Edit"}
                a href={"/student/" (id) "/qrcode"} class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"QR Code"}
                form method="post" action={"/student/" (id) "/delete"} {
                    button type="submit" class="bg-red-600 hover:bg-red-800 font-bold py-2 px-4 rounded" {"Delete"}
                }
            }
        }
    }
}

pub async fn get_edit_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Markup> {
    let student = Student::get(id, &mut *state.get_connection().await?).await?;

    Ok(state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            (title(html!{"Edit " (student)}))
            form method="post" action={"/student/" (id) "/edit"} enctype="multipart/form-data" {
                (student_form(Some(&student)))

                div class="mb-4" {
                    p class="block text-sm font-bold mb-2 text-gray-300" {"Or record a clip"}
                    div class="flex flex-row items-center space-x-4" {
                        button type="button" id="record_button" class="bg-pink-600 hover:bg-pink-700 font-bold py-2 px-4 rounded" {"Record"}
                        span id="record_status" class="text-sm italic" {}
                    }
                    input type="hidden" id="audio_data" name="audio_data";
                }

                (form_submit_button(Some("Save")))
            }
            script { (PreEscaped(RECORDER_JS)) }
        }
    }))
}

/// An uploaded file takes precedence over a recording sent in the same request.
///
/// No lock is held while transcoding, the write transaction only opens afterwards.
pub async fn post_edit_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
    multipart: Multipart,
) -> RosterResult<Redirect> {
    let (fields, audio_data) = StudentMultipart::read(multipart).await?.into_fields();
    let NewStudent {
        first_name,
        last_name,
        department,
        email,
        audio,
    } = fields.validate()?;
    let recording = match (&audio, audio_data) {
        (None, Some(data_url)) => Some(RecordedClip::from_data_url(&data_url)?),
        _ => None,
    };

    //404 before spending time on ffmpeg
    Student::get(id, &mut *state.get_connection().await?).await?;

    let recorded = match recording {
        Some(recording) => Some(transcode_recording(state.transcoder(), id, recording).await?),
        None => None,
    };

    let mut tx = state.get_write_transaction().await?;
    Student::update_in_database(
        id,
        StudentUpdate {
            first_name: Some(first_name),
            last_name: Some(last_name),
            department: Some(department),
            email: Some(email),
            audio,
        },
        &mut tx,
    )
    .await?;
    if let Some(clip) = recorded {
        state.files().store_audio(id, clip, &mut tx).await?;
    }
    tx.commit().await.context(CommitTransactionSnafu)?;

    Ok(Redirect::to(&format!("/student/{id}")))
}

pub async fn post_delete_student(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Redirect> {
    let mut tx = state.get_write_transaction().await?;
    Student::get(id, &mut tx).await?;

    state.files().delete_all_for(id, &mut tx).await?;
    Student::remove_from_database(id, &mut tx).await?;
    tx.commit().await.context(CommitTransactionSnafu)?;

    Ok(Redirect::to("/"))
}
