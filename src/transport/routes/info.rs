use axum::Json;
use serde::Serialize;

#[derive(Serialize)]
pub struct Version {
  pub name: &'static str,
  pub version: &'static str,
}

/// GET /version
pub async fn get_version() -> Json<Version> {
  tracing::debug!("GET /version");
  Json(Version {
    name: env!("CARGO_PKG_NAME"),
    version: env!("CARGO_PKG_VERSION"),
  })
}
