use std::net::SocketAddr;
use std::sync::Arc;

use axum::{response::Html, routing::get, Router};
use tracing::info;

mod audio;
mod config;
mod error;
mod info;
mod pipeline;
mod strategy;
mod tool;
mod util;
mod workspace;

pub use error::{Error, Result};

use config::Config;
use pipeline::Pipeline;
use strategy::Catalog;
use tool::YtdlpTool;
use workspace::Workspace;

pub struct App {
  pub pipeline: Pipeline,
}

impl App {
  pub fn new(config: &Config) -> Result<Self> {
    let tool = YtdlpTool::new(config.ytdlp.clone());
    let workspace = Workspace::new(config.download_dir.clone())?;
    let pipeline = Pipeline::new(
      Box::new(tool),
      Catalog::default_clients(),
      workspace,
      config.ffmpeg.clone(),
      config.cookie_file.clone(),
    );
    Ok(Self { pipeline })
  }
}

fn router(app: Arc<App>) -> Router {
  Router::new()
    .route("/", get(homepage))
    .route("/info", get(info::get_info))
    .route("/mp3", get(audio::get_mp3))
    .with_state(app)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into()),
    )
    .init();

  let config = Config::load().await?;
  let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
  let app = Arc::new(App::new(&config)?);

  info!("listening on {addr}");

  axum::Server::bind(&addr)
    .serve(router(app).into_make_service())
    .await
    .expect("Failed to start server");

  Ok(())
}

pub const HOMEPAGE_HTML: &str = include_str!("../html/homepage.html");

async fn homepage() -> Html<&'static str> {
  Html(HOMEPAGE_HTML)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::body::{BoxBody, HttpBody};
  use http::{header, Request, StatusCode};
  use tempfile::TempDir;
  use tower::ServiceExt;

  use crate::pipeline::testing::{ScriptedTool, Step};

  fn test_router(steps: Vec<Step>) -> (Router, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new(
      Box::new(ScriptedTool::new(steps)),
      Catalog::default_clients(),
      Workspace::new(dir.path()).unwrap(),
      None,
      None,
    );
    let app = Arc::new(App { pipeline });
    (router(app), dir)
  }

  async fn body_bytes(mut body: BoxBody) -> Vec<u8> {
    let mut bytes = Vec::new();
    while let Some(chunk) = body.data().await {
      bytes.extend_from_slice(&chunk.unwrap());
    }
    bytes
  }

  fn get(uri: &str) -> Request<axum::body::Body> {
    Request::builder()
      .uri(uri)
      .body(axum::body::Body::empty())
      .unwrap()
  }

  #[tokio::test]
  async fn test_homepage_is_alive() {
    let (router, _dir) = test_router(vec![]);
    let resp = router.oneshot(get("/")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }

  #[tokio::test]
  async fn test_info_without_url_is_400() {
    let (router, _dir) = test_router(vec![]);
    let resp = router.oneshot(get("/info")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let body = body_bytes(resp.into_body()).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "Missing url param");
  }

  #[tokio::test]
  async fn test_info_with_empty_url_is_400() {
    let (router, _dir) = test_router(vec![]);
    let resp = router.oneshot(get("/info?url=")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_mp3_without_url_is_400() {
    let (router, _dir) = test_router(vec![]);
    let resp = router.oneshot(get("/mp3")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
  }

  #[tokio::test]
  async fn test_info_success_returns_normalized_record() {
    let (router, _dir) = test_router(vec![Step::Succeed {
      stdout: "{\"title\":\"A Song\",\"duration\":212.0,\"uploader\":\"someone\"}",
      produce: None,
    }]);
    let resp = router
      .oneshot(get("/info?url=https://youtube.com/watch?v=x"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let body = body_bytes(resp.into_body()).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["title"], "A Song");
    assert_eq!(json["duration"], 212.0);
    assert_eq!(json["uploader"], "someone");
  }

  #[tokio::test]
  async fn test_info_exhaustion_is_500() {
    let steps = (0..6).map(|_| Step::Fail { leftover: None }).collect();
    let (router, _dir) = test_router(steps);
    let resp = router
      .oneshot(get("/info?url=https://youtube.com/watch?v=x"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let body = body_bytes(resp.into_body()).await;
    let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(json["error"], "All clients failed to fetch video info");
  }

  #[tokio::test]
  async fn test_mp3_success_streams_and_deletes() {
    let (router, dir) = test_router(vec![
      Step::Fail {
        leftover: Some(".part"),
      },
      Step::Succeed {
        stdout: "",
        produce: Some(".mp3"),
      },
    ]);
    let resp = router
      .oneshot(get("/mp3?url=https://youtube.com/watch?v=x"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(resp.headers()[header::CONTENT_LENGTH], "9");
    assert_eq!(
      resp.headers()[header::CONTENT_DISPOSITION],
      "attachment; filename=\"audio.mp3\""
    );

    let body = body_bytes(resp.into_body()).await;
    assert_eq!(body, b"mp3 bytes");

    // transfer complete, workspace must be empty again
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }

  #[tokio::test]
  async fn test_mp3_exhaustion_is_500() {
    let steps = (0..6)
      .map(|_| Step::Fail {
        leftover: Some(".part"),
      })
      .collect();
    let (router, dir) = test_router(steps);
    let resp = router
      .oneshot(get("/mp3?url=https://youtube.com/watch?v=x"))
      .await
      .unwrap();
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
  }
}
