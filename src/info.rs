use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::{App, Error, Result};

pub async fn get_info(
  State(app): State<Arc<App>>,
  Query(query): Query<UrlQuery>,
) -> Result<impl IntoResponse> {
  let url = query.require_url()?;
  let info = app.pipeline.video_info(&url).await?;
  Ok(Json(info))
}

#[derive(Deserialize)]
pub struct UrlQuery {
  url: Option<String>,
}

impl UrlQuery {
  pub fn require_url(self) -> Result<String> {
    match self.url {
      Some(url) if !url.is_empty() => Ok(url),
      _ => Err(Error::MissingParam("url")),
    }
  }
}

/// Normalized metadata record returned by `/info`. Absent upstream fields
/// collapse to sentinels instead of nulls.
#[derive(Debug, Serialize, PartialEq)]
pub struct VideoInfo {
  pub title: String,
  pub duration: f64,
  pub uploader: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub thumbnail: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub webpage_url: Option<String>,
}

// the raw yt-dlp record; everything optional so a sparse record still
// yields a usable result
#[derive(Deserialize)]
struct RawInfo {
  title: Option<String>,
  duration: Option<f64>,
  uploader: Option<String>,
  thumbnail: Option<String>,
  webpage_url: Option<String>,
}

impl From<RawInfo> for VideoInfo {
  fn from(raw: RawInfo) -> Self {
    Self {
      title: raw.title.unwrap_or_else(|| "Unknown".to_string()),
      duration: raw.duration.unwrap_or(0.0),
      uploader: raw.uploader.unwrap_or_else(|| "Unknown".to_string()),
      thumbnail: raw.thumbnail,
      webpage_url: raw.webpage_url,
    }
  }
}

/// Extracts the metadata record from raw tool output.
///
/// yt-dlp interleaves warnings with the `--print-json` record, so the
/// record is the first line that fully parses as a JSON object, not
/// merely the first line or the first line starting with a brace.
pub fn parse_tool_output(output: &str) -> Result<VideoInfo> {
  output
    .lines()
    .find_map(|line| serde_json::from_str::<RawInfo>(line.trim()).ok())
    .map(VideoInfo::from)
    .ok_or(Error::MalformedOutput)
}
