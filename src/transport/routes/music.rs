use std::sync::Arc;

use axum::{
  extract::{Path, State, rejection::JsonRejection},
  http::{StatusCode, Uri},
  response::{IntoResponse, Json, Response},
};
use serde::Deserialize;
use serde_json::json;

use crate::{
  common::{ErrorBody, MusicError, types::GuildId},
  control::PlayRequest,
  server::AppState,
  session::LoopMode,
};

#[derive(Deserialize)]
pub struct VolumeBody {
  pub volume: i64,
}

#[derive(Deserialize)]
pub struct RemoveBody {
  pub index: i64,
}

#[derive(Deserialize)]
pub struct LoopBody {
  pub mode: String,
}

fn error_response(err: &MusicError, uri: &Uri) -> Response {
  let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
  (status, Json(ErrorBody::from_error(err, uri.path()))).into_response()
}

fn bad_body(rejection: JsonRejection, uri: &Uri) -> Response {
  error_response(&MusicError::Validation(rejection.body_text()), uri)
}

fn respond<T: serde::Serialize>(result: Result<T, MusicError>, uri: &Uri) -> Response {
  match result {
    Ok(body) => Json(body).into_response(),
    Err(err) => {
      tracing::debug!("{} failed: {}", uri.path(), err);
      error_response(&err, uri)
    }
  }
}

/// GET /music/{guildId}/status
pub async fn get_status(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  let guild_id = GuildId(guild_id);
  tracing::debug!("GET /music/{}/status", guild_id);
  Json(state.control.status(&guild_id).await)
}

/// GET /music/{guildId}/queue
pub async fn get_queue(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
  let guild_id = GuildId(guild_id);
  tracing::debug!("GET /music/{}/queue", guild_id);
  Json(state.control.queue(&guild_id).await)
}

/// POST /music/{guildId}/play
pub async fn play(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
  body: Result<Json<PlayRequest>, JsonRejection>,
) -> Response {
  let guild_id = GuildId(guild_id);
  let Json(request) = match body {
    Ok(body) => body,
    Err(rejection) => return bad_body(rejection, &uri),
  };
  tracing::info!("POST /music/{}/play query='{}'", guild_id, request.query);
  respond(state.control.play(&guild_id, request).await, &uri)
}

/// POST /music/{guildId}/pause
///
/// Toggles: pauses a playing session, resumes a paused one.
pub async fn pause(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
) -> Response {
  let guild_id = GuildId(guild_id);
  let result = state.control.toggle_pause(&guild_id).await;
  respond(result.map(|paused| json!({ "paused": paused })), &uri)
}

/// POST /music/{guildId}/resume
pub async fn resume(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
) -> Response {
  let guild_id = GuildId(guild_id);
  let result = state.control.resume(&guild_id).await;
  respond(result.map(|paused| json!({ "paused": paused })), &uri)
}

/// POST /music/{guildId}/skip
pub async fn skip(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
) -> Response {
  let guild_id = GuildId(guild_id);
  let result = state.control.skip(&guild_id).await;
  respond(result.map(|()| json!({ "success": true })), &uri)
}

/// POST /music/{guildId}/stop
pub async fn stop(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
) -> Response {
  let guild_id = GuildId(guild_id);
  tracing::info!("POST /music/{}/stop", guild_id);
  let result = state.control.stop(&guild_id).await;
  respond(result.map(|()| json!({ "success": true })), &uri)
}

/// POST /music/{guildId}/volume
pub async fn set_volume(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
  body: Result<Json<VolumeBody>, JsonRejection>,
) -> Response {
  let guild_id = GuildId(guild_id);
  let Json(body) = match body {
    Ok(body) => body,
    Err(rejection) => return bad_body(rejection, &uri),
  };
  let result = state.control.set_volume(&guild_id, body.volume).await;
  respond(result.map(|volume| json!({ "volume": volume })), &uri)
}

/// POST /music/{guildId}/remove
pub async fn remove_track(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
  body: Result<Json<RemoveBody>, JsonRejection>,
) -> Response {
  let guild_id = GuildId(guild_id);
  let Json(body) = match body {
    Ok(body) => body,
    Err(rejection) => return bad_body(rejection, &uri),
  };
  let result = state.control.remove_track(&guild_id, body.index).await;
  respond(
    result.map(|removed| json!({ "success": true, "removed": removed })),
    &uri,
  )
}

/// POST /music/{guildId}/loop
pub async fn set_loop(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
  body: Result<Json<LoopBody>, JsonRejection>,
) -> Response {
  let guild_id = GuildId(guild_id);
  let Json(body) = match body {
    Ok(body) => body,
    Err(rejection) => return bad_body(rejection, &uri),
  };
  let mode = match body.mode.parse::<LoopMode>() {
    Ok(mode) => mode,
    Err(err) => return error_response(&err, &uri),
  };
  let result = state.control.set_loop(&guild_id, mode).await;
  respond(result.map(|mode| json!({ "loopMode": mode })), &uri)
}

/// GET /music/{guildId}/voice-channels
pub async fn get_voice_channels(
  Path(guild_id): Path<String>,
  State(state): State<Arc<AppState>>,
  uri: Uri,
) -> Response {
  let guild_id = GuildId(guild_id);
  let result = state.control.voice_channels(&guild_id).await;
  respond(result.map(|channels| json!({ "channels": channels })), &uri)
}
