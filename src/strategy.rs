//! The catalog of extractor client identities tried against yt-dlp.
//!
//! Upstream behavior toward a given player client changes over time, so a
//! handful of identities are tried cheaply in priority order, followed by a
//! single unconstrained fallback. The list is static configuration; order is
//! significant and never adapts to past outcomes.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
  Metadata,
  Audio,
}

impl Operation {
  pub fn describe(self) -> &'static str {
    match self {
      Operation::Metadata => "fetch video info",
      Operation::Audio => "convert video",
    }
  }
}

#[derive(Debug, Clone)]
pub struct Strategy {
  name: &'static str,
  // extractor-facing key=value constraints, rendered as a single
  // `--extractor-args youtube:k=v;k2=v2` pair. empty for the fallback.
  params: Vec<(&'static str, &'static str)>,
}

impl Strategy {
  fn client(name: &'static str) -> Self {
    Self {
      name,
      // player_skip=webpage keeps yt-dlp from switching back to the web
      // client when cookies are present
      params: vec![("player_client", name), ("player_skip", "webpage")],
    }
  }

  fn fallback() -> Self {
    Self {
      name: "default",
      params: Vec::new(),
    }
  }

  pub fn name(&self) -> &'static str {
    self.name
  }

  pub fn is_fallback(&self) -> bool {
    self.params.is_empty()
  }

  pub fn args(&self) -> Vec<String> {
    if self.params.is_empty() {
      return Vec::new();
    }

    let constraints = self
      .params
      .iter()
      .map(|(k, v)| format!("{k}={v}"))
      .collect::<Vec<_>>()
      .join(";");

    vec!["--extractor-args".to_string(), format!("youtube:{constraints}")]
  }
}

#[derive(Debug, Clone)]
pub struct Catalog {
  strategies: Vec<Strategy>,
}

impl Catalog {
  pub fn new(strategies: Vec<Strategy>) -> Self {
    Self { strategies }
  }

  // clients that tend to dodge the web player checks, cheapest first
  pub fn default_clients() -> Self {
    Self::new(vec![
      Strategy::client("android_sdkless"),
      Strategy::client("android"),
      Strategy::client("ios"),
      Strategy::client("tv_embedded"),
      Strategy::client("mweb"),
    ])
  }

  /// Explicit strategies in declared order, then the unconstrained
  /// fallback exactly once. Both operations use the same rotation.
  pub fn strategies_for(&self, _op: Operation) -> Vec<Strategy> {
    let mut ordered = self.strategies.clone();
    ordered.push(Strategy::fallback());
    ordered
  }
}
