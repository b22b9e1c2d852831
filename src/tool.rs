use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use crate::util::TOOL_SEMAPHORE;

const MAX_DIAGNOSTIC_LEN: usize = 200;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
  #[error("failed to run tool: {0}")]
  Spawn(#[from] std::io::Error),

  #[error("tool timed out after {0:?}")]
  Timeout(Duration),

  #[error("tool exited with {status}: {diagnostic}")]
  Failed { status: String, diagnostic: String },
}

// invokes an external executable with an argument vector. the url and
// every other caller-supplied value go through as separate argv entries,
// never through a shell.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
  async fn invoke(
    &self,
    args: &[String],
    timeout: Duration,
  ) -> Result<String, ToolError>;
}

// runs the yt-dlp command line. requires the executable resolved at startup.
pub struct YtdlpTool {
  program: PathBuf,
}

impl YtdlpTool {
  pub fn new(program: PathBuf) -> Self {
    Self { program }
  }
}

#[async_trait]
impl ToolInvoker for YtdlpTool {
  async fn invoke(
    &self,
    args: &[String],
    timeout: Duration,
  ) -> Result<String, ToolError> {
    // the semaphore is never closed, so acquisition cannot fail
    let _guard = TOOL_SEMAPHORE.acquire().await.unwrap();

    let child = Command::new(&self.program)
      .args(args)
      .stdin(Stdio::null())
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      // dropping the wait future on timeout must not leave the process behind
      .kill_on_drop(true)
      .spawn()?;

    let output = tokio::time::timeout(timeout, child.wait_with_output())
      .await
      .map_err(|_| ToolError::Timeout(timeout))??;

    if !output.status.success() {
      return Err(ToolError::Failed {
        status: output.status.to_string(),
        diagnostic: pick_diagnostic(&output.stderr),
      });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
  }
}

// one bounded line for the logs: the first stderr line carrying an error
// marker, else the first nonempty stderr line.
fn pick_diagnostic(stderr: &[u8]) -> String {
  let text = String::from_utf8_lossy(stderr);
  let line = text
    .lines()
    .find(|l| l.contains("ERROR"))
    .or_else(|| text.lines().find(|l| !l.trim().is_empty()))
    .unwrap_or("(no diagnostic output)");
  truncate(line, MAX_DIAGNOSTIC_LEN)
}

fn truncate(s: &str, max: usize) -> String {
  if s.len() <= max {
    return s.to_string();
  }
  let mut end = max;
  while !s.is_char_boundary(end) {
    end -= 1;
  }
  format!("{}...", &s[..end])
}
