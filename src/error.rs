use axum::response::{IntoResponse, Response};
use axum::Json;
use http::StatusCode;
use serde_json::json;

use crate::tool::ToolError;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
  #[error("missing required parameter: {0}")]
  MissingParam(&'static str),

  // per-attempt errors, recovered inside the pipeline by advancing to
  // the next strategy. they only surface through logs.
  #[error(transparent)]
  Tool(#[from] ToolError),

  #[error("no structured record found in tool output")]
  MalformedOutput,

  #[error("tool reported success but produced no output file")]
  ArtifactMissing,

  #[error("all clients failed to {0}")]
  Exhausted(&'static str),

  #[error(transparent)]
  Io(#[from] std::io::Error),
}

impl Error {
  // caller-facing message. raw tool diagnostics stay in the logs.
  fn public_message(&self) -> String {
    match self {
      Error::MissingParam(name) => format!("Missing {name} param"),
      Error::Exhausted(what) => format!("All clients failed to {what}"),
      _ => "internal server error".to_string(),
    }
  }

  fn status(&self) -> StatusCode {
    match self {
      Error::MissingParam(_) => StatusCode::BAD_REQUEST,
      _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    let status = self.status();
    let body = Json(json!({ "error": self.public_message() }));
    (status, body).into_response()
  }
}
