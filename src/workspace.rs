use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rand::Rng;

use crate::Result;

/// Unique identifier tying together all on-disk files of one request.
///
/// Combines a process-wide sequence number with a random component, so
/// concurrent requests can never collide on a filename prefix (a bare
/// timestamp can, under burst load).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunToken(String);

impl fmt::Display for RunToken {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl RunToken {
  pub fn as_str(&self) -> &str {
    &self.0
  }
}

/// Owns the download directory shared by all in-flight requests. Every
/// file in it is prefixed by the run token of the request that created it.
pub struct Workspace {
  dir: PathBuf,
  seq: AtomicU64,
}

impl Workspace {
  pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
    let dir = dir.into();
    std::fs::create_dir_all(&dir)?;
    Ok(Self {
      dir,
      seq: AtomicU64::new(0),
    })
  }

  pub fn new_run_token(&self) -> RunToken {
    let seq = self.seq.fetch_add(1, Ordering::Relaxed);
    let salt: u32 = rand::thread_rng().gen();
    RunToken(format!("audio_{seq}_{salt:08x}"))
  }

  // output template handed to yt-dlp; the tool substitutes the extension
  pub fn output_pattern(&self, token: &RunToken) -> String {
    self
      .dir
      .join(format!("{token}.%(ext)s"))
      .to_string_lossy()
      .into_owned()
  }

  /// Locates a produced file by token prefix and extension. Prefix match
  /// only: the tool may rename the output, so the exact requested
  /// filename cannot be assumed.
  pub fn find_by_prefix(
    &self,
    token: &RunToken,
    extension: &str,
  ) -> Option<PathBuf> {
    let entries = std::fs::read_dir(&self.dir).ok()?;
    for entry in entries.flatten() {
      let name = entry.file_name();
      let name = name.to_string_lossy();
      if name.starts_with(token.as_str()) && name.ends_with(extension) {
        return Some(entry.path());
      }
    }
    None
  }

  /// Best-effort removal of every file carrying the token prefix.
  /// Deletion errors are swallowed; cleanup must never fail an attempt.
  pub fn purge(&self, token: &RunToken) {
    let Ok(entries) = std::fs::read_dir(&self.dir) else {
      return;
    };
    for entry in entries.flatten() {
      if entry
        .file_name()
        .to_string_lossy()
        .starts_with(token.as_str())
      {
        std::fs::remove_file(entry.path()).ok();
      }
    }
  }
}

/// A completed download owned by exactly one request. The file is deleted
/// when the artifact is dropped, which happens once the response body has
/// been fully sent or the client has gone away.
#[derive(Debug)]
pub struct AudioArtifact {
  path: PathBuf,
}

impl AudioArtifact {
  pub fn new(path: PathBuf) -> Self {
    Self { path }
  }

  pub fn path(&self) -> &Path {
    &self.path
  }
}

impl Drop for AudioArtifact {
  fn drop(&mut self) {
    if let Err(e) = std::fs::remove_file(&self.path) {
      tracing::warn!("failed to delete {}: {}", self.path.display(), e);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::HashSet;
  use std::sync::Arc;

  #[test]
  fn test_tokens_are_unique_under_concurrency() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Arc::new(Workspace::new(dir.path()).unwrap());

    let mut handles = Vec::new();
    for _ in 0..8 {
      let ws = workspace.clone();
      handles.push(std::thread::spawn(move || {
        (0..100).map(|_| ws.new_run_token()).collect::<Vec<_>>()
      }));
    }

    let mut seen = HashSet::new();
    for handle in handles {
      for token in handle.join().unwrap() {
        assert!(seen.insert(token.as_str().to_string()));
      }
    }
    assert_eq!(seen.len(), 800);
  }

  #[test]
  fn test_find_by_prefix_matches_renamed_extension() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    let token = workspace.new_run_token();

    // the tool may emit e.g. `<token>.something.mp3` instead of the
    // requested `<token>.mp3`
    let renamed = dir.path().join(format!("{token}.f140.mp3"));
    std::fs::write(&renamed, b"audio").unwrap();

    assert_eq!(workspace.find_by_prefix(&token, ".mp3"), Some(renamed));
    assert_eq!(workspace.find_by_prefix(&token, ".wav"), None);
  }

  #[test]
  fn test_purge_only_removes_own_token() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path()).unwrap();
    let mine = workspace.new_run_token();
    let theirs = workspace.new_run_token();

    let mine_file = dir.path().join(format!("{mine}.part"));
    let theirs_file = dir.path().join(format!("{theirs}.mp3"));
    std::fs::write(&mine_file, b"x").unwrap();
    std::fs::write(&theirs_file, b"y").unwrap();

    workspace.purge(&mine);

    assert!(!mine_file.exists());
    assert!(theirs_file.exists());
  }

  #[test]
  fn test_purge_on_missing_dir_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let workspace = Workspace::new(dir.path().join("sub")).unwrap();
    let token = workspace.new_run_token();
    std::fs::remove_dir_all(&workspace.dir).unwrap();
    workspace.purge(&token);
  }

  #[test]
  fn test_artifact_deletes_file_on_drop() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("audio_0_00000000.mp3");
    std::fs::write(&path, b"mp3").unwrap();

    let artifact = AudioArtifact::new(path.clone());
    assert!(path.exists());
    drop(artifact);
    assert!(!path.exists());
  }
}
