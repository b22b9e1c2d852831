use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;
use tracing::info;

use crate::Result;

const YTDLP_CANDIDATES: &[&str] =
  &["/usr/local/bin/yt-dlp", "/usr/bin/yt-dlp", "yt-dlp"];
const FFMPEG_CANDIDATES: &[&str] =
  &["/usr/local/bin/ffmpeg", "/usr/bin/ffmpeg"];
const COOKIE_FILE: &str = "cookies.txt";

/// Process-wide configuration, resolved once at startup and shared by
/// reference with every request. Nothing here is re-read per request.
pub struct Config {
  pub ytdlp: PathBuf,
  pub ffmpeg: Option<PathBuf>,
  pub cookie_file: Option<PathBuf>,
  pub download_dir: PathBuf,
  pub port: u16,
}

impl Config {
  pub async fn load() -> Result<Self> {
    let ytdlp = probe_binary(YTDLP_CANDIDATES)
      .await
      // last resort: let the OS search PATH at spawn time
      .unwrap_or_else(|| PathBuf::from("yt-dlp"));
    info!("using yt-dlp: {}", ytdlp.display());

    let ffmpeg = probe_binary(FFMPEG_CANDIDATES).await;
    match &ffmpeg {
      Some(path) => info!("using ffmpeg: {}", path.display()),
      None => info!("ffmpeg not found at known paths, relying on PATH"),
    }

    let cookie_file = bootstrap_cookie_file()?;
    match &cookie_file {
      Some(path) => info!("cookie file ready: {}", path.display()),
      None => info!("no cookies configured, restricted content may fail"),
    }

    let download_dir = std::env::var("DOWNLOAD_DIR")
      .map(PathBuf::from)
      .unwrap_or_else(|_| PathBuf::from("downloads"));

    let port = std::env::var("PORT")
      .ok()
      .and_then(|s| s.parse().ok())
      .unwrap_or(8080);

    Ok(Self {
      ytdlp,
      ffmpeg,
      cookie_file,
      download_dir,
      port,
    })
  }
}

// first candidate that answers `--version` with a zero exit wins
async fn probe_binary(candidates: &[&str]) -> Option<PathBuf> {
  for candidate in candidates {
    let status = Command::new(candidate)
      .arg("--version")
      .stdin(Stdio::null())
      .stdout(Stdio::null())
      .stderr(Stdio::null())
      .status()
      .await;
    if matches!(status, Ok(s) if s.success()) {
      return Some(PathBuf::from(candidate));
    }
  }
  None
}

// persist the YT_COOKIE env blob once; a pre-existing nonempty cookie
// file from an earlier run is honored as well. absence only means
// restricted content can fail, it is not an error.
fn bootstrap_cookie_file() -> Result<Option<PathBuf>> {
  let path = PathBuf::from(COOKIE_FILE);

  if let Ok(blob) = std::env::var("YT_COOKIE") {
    if !blob.is_empty() {
      std::fs::write(&path, blob)?;
      return Ok(Some(path));
    }
  }

  match std::fs::metadata(&path) {
    Ok(meta) if meta.len() > 0 => Ok(Some(path)),
    _ => Ok(None),
  }
}
