use crate::{
    data::{
        DataType,
        student::{Student, StudentFields},
    },
    error::{CommitTransactionSnafu, MultipartSnafu, RosterError, RosterResult},
    maud_conveniences::{errors_list, file_form_element, form_submit_button, render_table, subtitle, title},
    qr,
    state::RosterState,
};
use axum::extract::{Multipart, State};
use maud::{Markup, html};
use snafu::ResultExt;

pub async fn get_import(State(state): State<RosterState>) -> Markup {
    state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            (title("Import Students"))
            (render_table(
                "CSV Format",
                ["Column", "Example"],
                vec![
                    [html!{"first_name"}, html!{"Ada"}],
                    [html!{"last_name"}, html!{"Lovelace"}],
                    [html!{"department"}, html!{"Mathematics"}],
                    [html!{"email"}, html!{"ada@example.com"}],
                ],
            ))
            form method="post" action="/import" enctype="multipart/form-data" class="pt-4" {
                (file_form_element("students_csv", "CSV File", ".csv"))
                (form_submit_button(Some("Import")))
            }
        }
    })
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub added: Vec<Student>,
    pub skipped: Vec<String>,
}

/// Adds one student and generates their QR code, all or nothing.
async fn import_row(state: &RosterState, fields: StudentFields) -> RosterResult<Student> {
    let mut tx = state.get_write_transaction().await?;

    let id = Student::insert_into_database(fields, &mut tx).await?;
    let student = Student::get(id, &mut tx).await?;
    let png = qr::encode(&student)?;
    let qr_code_file = state.files().store_qr_image(id, &png, &mut tx).await?;

    tx.commit().await.context(CommitTransactionSnafu)?;
    Ok(Student {
        qr_code_file: Some(qr_code_file),
        ..student
    })
}

pub async fn import_csv(state: &RosterState, bytes: &[u8]) -> RosterResult<ImportReport> {
    let mut report = ImportReport::default();
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(bytes);

    for (i, record) in rdr.deserialize::<StudentFields>().enumerate() {
        //header is line 1
        let line = i + 2;
        let fields = match record {
            Ok(x) => x,
            Err(source) => {
                report
                    .skipped
                    .push(format!("Row {line}: {}", RosterError::Csv { source }));
                continue;
            }
        };

        match import_row(state, fields).await {
            Ok(student) => report.added.push(student),
            Err(
                e @ (RosterError::MissingField { .. } | RosterError::DuplicateEmail { .. }),
            ) => {
                warn!(line, ?e, "Skipping CSV row");
                report.skipped.push(format!("Row {line}: {e}"));
            }
            Err(e) => return Err(e),
        }
    }

    Ok(report)
}

pub async fn post_import(
    State(state): State<RosterState>,
    mut multipart: Multipart,
) -> RosterResult<Markup> {
    let mut report = ImportReport::default();
    loop {
        let Some(field) = multipart.next_field().await.context(MultipartSnafu)? else {
            break;
        };

        let bytes = field.bytes().await.context(MultipartSnafu)?;
        let ImportReport { added, skipped } = import_csv(&state, &bytes).await?;
        report.added.extend(added);
        report.skipped.extend(skipped);
    }

    info!(
        added = report.added.len(),
        skipped = report.skipped.len(),
        "Imported students from CSV"
    );

    Ok(state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-3xl w-full" {
            (title("Import Results"))
            p class="italic pb-4" {"Added " (report.added.len()) " students."}

            @if !report.skipped.is_empty() {
                (errors_list(Some("Skipped rows:"), report.skipped.iter()))
            }

            @if !report.added.is_empty() {
                (subtitle("Added"))
                ul class="list-disc list-inside" {
                    @for student in &report.added {
                        li {
                            a href={"/student/" (student.id)} class="text-blue-400 underline" {(student)}
                            " (" (student.email) ")"
                        }
                    }
                }
            }
        }
    }))
}
