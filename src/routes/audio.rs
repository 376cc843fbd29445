use crate::{audio::content_type_for, error::RosterResult, state::RosterState};
use axum::{
    extract::{Path, State},
    http::header,
    response::{IntoResponse, Redirect, Response},
};

pub async fn get_play_audio(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Redirect> {
    //only here to 404 early when there's nothing to play
    state
        .files()
        .load_audio(id, &mut *state.get_connection().await?)
        .await?;

    Ok(Redirect::to(&format!("/student/{id}/audio")))
}

pub async fn get_audio(
    State(state): State<RosterState>,
    Path(id): Path<i64>,
) -> RosterResult<Response> {
    let clip = state
        .files()
        .load_audio(id, &mut *state.get_connection().await?)
        .await?;

    let content_type = content_type_for(&clip);
    let disposition = format!("inline; filename=\"{}\"", clip.filename);

    Ok((
        [
            (header::CONTENT_TYPE, content_type.to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        clip.bytes,
    )
        .into_response())
}
