use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use axum::body::StreamBody;
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use futures::Stream;
use http::header;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::info::UrlQuery;
use crate::workspace::AudioArtifact;
use crate::{App, Result};

pub async fn get_mp3(
  State(app): State<Arc<App>>,
  Query(query): Query<UrlQuery>,
) -> Result<impl IntoResponse> {
  let url = query.require_url()?;
  let artifact = app.pipeline.download_audio(&url).await?;
  serve_artifact(artifact).await
}

// streams the file with exact length and a normalized download name.
// the artifact guard rides along with the body, so the file is deleted
// exactly once when the transfer finishes or the client disconnects.
async fn serve_artifact(artifact: AudioArtifact) -> Result<impl IntoResponse> {
  let file = File::open(artifact.path()).await?;
  let len = file.metadata().await?.len();

  let stream = CleanupStream::new(ReaderStream::new(file), artifact);

  let headers = [
    (header::CONTENT_TYPE, "audio/mpeg".to_string()),
    (header::CONTENT_LENGTH, len.to_string()),
    (
      header::CONTENT_DISPOSITION,
      "attachment; filename=\"audio.mp3\"".to_string(),
    ),
  ];

  Ok((headers, StreamBody::new(stream)))
}

// passthrough stream that owns the artifact backing it
struct CleanupStream<S> {
  inner: S,
  _artifact: AudioArtifact,
}

impl<S> CleanupStream<S> {
  fn new(inner: S, artifact: AudioArtifact) -> Self {
    Self {
      inner,
      _artifact: artifact,
    }
  }
}

impl<S> Stream for CleanupStream<S>
where
  S: Stream + Unpin,
{
  type Item = S::Item;

  fn poll_next(
    mut self: Pin<&mut Self>,
    cx: &mut Context<'_>,
  ) -> Poll<Option<Self::Item>> {
    Pin::new(&mut self.inner).poll_next(cx)
  }
}
