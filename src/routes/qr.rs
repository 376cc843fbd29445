use crate::{
    data::student::Student,
    error::{JoinTaskSnafu, MissingFieldSnafu, MultipartSnafu, RosterResult},
    maud_conveniences::{file_form_element, form_submit_button, title},
    qr,
    state::RosterState,
};
use axum::{
    extract::{Multipart, Path, State},
    response::Redirect,
};
use base64::{Engine, prelude::BASE64_STANDARD};
use maud::{Markup, PreEscaped, html};
use snafu::{OptionExt, ResultExt};

const CAMERA_SCAN_JS: &str = r"
const status = document.getElementById('scan_status');
const scanner = new Html5QrcodeScanner('reader', { fps: 10, qrbox: 250 });
scanner.render((text) => {
    const id = text
        .split(',')
        .map((part) => part.split(':'))
        .find(([key]) => key.trim() === 'id');
    if (id && id[1]) {
        scanner.clear();
        window.location.href = '/student/' + encodeURIComponent(id[1].trim());
    } else {
        status.textContent = 'QR Code does not contain a valid ID';
    }
});
";

/// Regenerates every time, so the image always matches the current record.
pub async fn get_qrcode(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Markup> {
    let mut conn = state.get_connection().await?;
    let student = Student::get(id, &mut conn).await?;

    let png = qr::encode(&student)?;
    let file_name = state.files().store_qr_image(id, &png, &mut conn).await?;
    drop(conn);

    Ok(state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full flex flex-col items-center space-y-4" {
            (title(html!{"QR Code for " (student)}))
            img src={"data:image/png;base64," (BASE64_STANDARD.encode(&png))} alt="QR code" class="bg-white rounded";
            div class="flex flex-row space-x-2" {
                a href={"/qrcodes/" (file_name)} download=(file_name) class="bg-blue-500 hover:bg-blue-700 font-bold py-2 px-4 rounded" {"Download"}
                a href={"/student/" (id)} class="bg-slate-600 hover:bg-slate-800 font-bold py-2 px-4 rounded" {"Back"}
            }
        }
    }))
}

pub async fn get_scan(State(state): State<RosterState>) -> Markup {
    state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            (title("Scan QR Code"))
            form method="post" action="/scan" enctype="multipart/form-data" {
                (file_form_element("qr_code", "QR Code Image", "image/*"))
                (form_submit_button(Some("Scan")))
            }
            p class="pt-4" {
                a href="/scan/advanced" class="text-blue-400 underline" {"Use camera instead"}
            }
        }
    })
}

pub async fn post_scan(mut multipart: Multipart) -> RosterResult<Redirect> {
    let mut image = None;
    loop {
        let Some(field) = multipart.next_field().await.context(MultipartSnafu)? else {
            break;
        };

        if field.name() == Some("qr_code") {
            let bytes = field.bytes().await.context(MultipartSnafu)?;
            if !bytes.is_empty() {
                image = Some(bytes);
            }
        }
    }
    let image = image.context(MissingFieldSnafu { field: "qr_code" })?;

    let fields = tokio::task::spawn_blocking(move || qr::decode(&image))
        .await
        .context(JoinTaskSnafu)??;
    let id = qr::student_id(&fields)?;

    info!(id, "Scanned QR code");
    Ok(Redirect::to(&format!("/student/{id}")))
}

pub async fn get_scan_advanced(State(state): State<RosterState>) -> Markup {
    state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-md w-full" {
            (title("Scan with Camera"))
            div id="reader" class="bg-white rounded" {}
            p id="scan_status" class="pt-4 italic" {}
            script src="https://unpkg.com/html5-qrcode@2.3.8/html5-qrcode.min.js" {}
            script { (PreEscaped(CAMERA_SCAN_JS)) }
        }
    })
}
