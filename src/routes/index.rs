use crate::{
    data::{DataType, student::Student},
    error::RosterResult,
    maud_conveniences::render_table,
    state::RosterState,
};
use axum::extract::State;
use maud::{Markup, html};

pub async fn get_index_route(State(state): State<RosterState>) -> RosterResult<Markup> {
    let students = Student::get_all(&state).await?;

    let rows = students
        .into_iter()
        .map(|student| {
            let id = student.id;
            [
                html! {(id)},
                html! {
                    a href={"/student/" (id)} class="hover:text-blue-400 underline" {(student)}
                },
                html! {(student.department)},
                html! {(student.email)},
                html! {
                    @if student.audio.is_some() {
                        a href={"/student/" (id) "/play_audio"} class="hover:text-blue-400 underline" {"Play"}
                    } @else {
                        span class="italic text-gray-400" {"None"}
                    }
                },
                html! {
                    div class="flex flex-row space-x-2" {
                        a href={"/student/" (id) "/edit"} class="hover:text-blue-400 underline" {"Edit"}
                        a href={"/student/" (id) "/qrcode"} class="hover:text-blue-400 underline" {"QR"}
                        form method="post" action={"/student/" (id) "/delete"} {
                            button type="submit" class="text-red-400 hover:text-red-600 underline" {"Delete"}
                        }
                    }
                },
            ]
        })
        .collect();

    Ok(state.render(html! {
        div class="bg-gray-800 p-8 rounded shadow-md max-w-5xl w-full" {
            (render_table(
                "Students",
                ["ID", "Name", "Department", "Email", "Audio", ""],
                rows,
            ))
        }
    }))
}
