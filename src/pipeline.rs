//! The per-request acquisition loop.
//!
//! Each operation walks the strategy catalog in order, invoking the
//! external tool once per strategy. The first success short-circuits the
//! loop; a failed attempt purges its partial files, logs one bounded
//! diagnostic line and moves on. When the explicit list and the fallback
//! are both exhausted, a single aggregate error surfaces to the caller.

use std::path::PathBuf;
use std::time::Duration;

use tracing::{info, warn};

use crate::info::{parse_tool_output, VideoInfo};
use crate::strategy::{Catalog, Operation, Strategy};
use crate::tool::ToolInvoker;
use crate::util::{redact_credentials, tool_proxy};
use crate::workspace::{AudioArtifact, RunToken, Workspace};
use crate::{Error, Result};

const METADATA_TIMEOUT: Duration = Duration::from_secs(30);
// includes download and transcode time
const AUDIO_TIMEOUT: Duration = Duration::from_secs(180);

pub struct Pipeline {
  tool: Box<dyn ToolInvoker>,
  catalog: Catalog,
  workspace: Workspace,
  ffmpeg: Option<PathBuf>,
  cookie_file: Option<PathBuf>,
}

impl Pipeline {
  pub fn new(
    tool: Box<dyn ToolInvoker>,
    catalog: Catalog,
    workspace: Workspace,
    ffmpeg: Option<PathBuf>,
    cookie_file: Option<PathBuf>,
  ) -> Self {
    if let Some(proxy) = tool_proxy() {
      info!("using proxy: {}", redact_credentials(proxy));
    }
    Self {
      tool,
      catalog,
      workspace,
      ffmpeg,
      cookie_file,
    }
  }

  pub async fn video_info(&self, url: &str) -> Result<VideoInfo> {
    let op = Operation::Metadata;
    for strategy in self.catalog.strategies_for(op) {
      if strategy.is_fallback() {
        info!("[info] explicit clients exhausted, trying unconstrained");
      }
      match self.try_metadata(&strategy, url).await {
        Ok(video) => {
          info!("[info] client {}: {}", strategy.name(), video.title);
          return Ok(video);
        }
        Err(e) => warn!("[info] client {}: {}", strategy.name(), e),
      }
    }
    Err(Error::Exhausted(op.describe()))
  }

  pub async fn download_audio(&self, url: &str) -> Result<AudioArtifact> {
    let op = Operation::Audio;
    let token = self.workspace.new_run_token();
    for strategy in self.catalog.strategies_for(op) {
      if strategy.is_fallback() {
        info!("[mp3] explicit clients exhausted, trying unconstrained");
      }
      match self.try_download(&strategy, &token, url).await {
        Ok(artifact) => {
          info!("[mp3] client {}: {}", strategy.name(), token);
          return Ok(artifact);
        }
        Err(e) => {
          // leave nothing behind before the next attempt reuses the token
          self.workspace.purge(&token);
          warn!("[mp3] client {}: {}", strategy.name(), e);
        }
      }
    }
    Err(Error::Exhausted(op.describe()))
  }

  async fn try_metadata(
    &self,
    strategy: &Strategy,
    url: &str,
  ) -> Result<VideoInfo> {
    let mut args = self.base_args(strategy);
    args.push("--skip-download".to_string());
    args.push("--print-json".to_string());
    args.push(url.to_string());

    let stdout = self.tool.invoke(&args, METADATA_TIMEOUT).await?;
    parse_tool_output(&stdout)
  }

  async fn try_download(
    &self,
    strategy: &Strategy,
    token: &RunToken,
    url: &str,
  ) -> Result<AudioArtifact> {
    let mut args = self.base_args(strategy);
    for flag in [
      "-f",
      "bestaudio/best",
      "-x",
      "--audio-format",
      "mp3",
      "--audio-quality",
      "192K",
      "-o",
    ] {
      args.push(flag.to_string());
    }
    args.push(self.workspace.output_pattern(token));
    args.push(url.to_string());

    self.tool.invoke(&args, AUDIO_TIMEOUT).await?;

    // the tool may have renamed the output, so search by token prefix
    self
      .workspace
      .find_by_prefix(token, ".mp3")
      .map(AudioArtifact::new)
      .ok_or(Error::ArtifactMissing)
  }

  fn base_args(&self, strategy: &Strategy) -> Vec<String> {
    let mut args = vec!["--no-warnings".to_string()];
    if let Some(ffmpeg) = &self.ffmpeg {
      args.push("--ffmpeg-location".to_string());
      args.push(ffmpeg.to_string_lossy().into_owned());
    }
    args.push("--no-check-certificate".to_string());
    if let Some(cookie_file) = &self.cookie_file {
      args.push("--cookies".to_string());
      args.push(cookie_file.to_string_lossy().into_owned());
    }
    if let Some(proxy) = tool_proxy() {
      args.push("--proxy".to_string());
      args.push(proxy.to_string());
    }
    args.extend(strategy.args());
    args
  }
}
