use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::{
    server::AppState,
    transport::{
        middleware::{add_response_headers, check_auth},
        routes::{info, music},
    },
};

const MUSIC: &str = "/music/{guild_id}";

pub fn router(state: Arc<AppState>) -> Router {
    let music_routes = Router::new()
        .route("/status", get(music::get_status))
        .route("/queue", get(music::get_queue))
        .route("/play", post(music::play))
        .route("/pause", post(music::pause))
        .route("/resume", post(music::resume))
        .route("/skip", post(music::skip))
        .route("/stop", post(music::stop))
        .route("/volume", post(music::set_volume))
        .route("/remove", post(music::remove_track))
        .route("/loop", post(music::set_loop))
        .route("/voice-channels", get(music::get_voice_channels));

    Router::new()
        .nest(MUSIC, music_routes)
        .route("/version", get(info::get_version))
        .layer(middleware::from_fn_with_state(state.clone(), check_auth))
        .layer(middleware::from_fn(add_response_headers))
        .with_state(state)
}
