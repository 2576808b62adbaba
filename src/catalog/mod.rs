use std::{
    sync::{Arc, LazyLock},
    time::Duration,
};

use regex::Regex;
use tracing::{debug, warn};

use crate::{node::AudioNode, protocol::LoadResult};

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?i)https?://\S+$").expect("valid url regex"));

/// `ytsearch:`, `scsearch:`, `ytmsearch:` and friends.
static SEARCH_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2,10}search:").expect("valid prefix regex"));

/// Turns user queries into playable tracks through the audio node.
///
/// Holds no mutable state, so one instance serves every community
/// concurrently.
pub struct TrackCatalog {
    node: Arc<dyn AudioNode>,
    search_prefix: String,
    timeout: Duration,
}

impl TrackCatalog {
    pub fn new(node: Arc<dyn AudioNode>, search_prefix: impl Into<String>, timeout: Duration) -> Self {
        Self {
            node,
            search_prefix: search_prefix.into(),
            timeout,
        }
    }

    /// The identifier sent to the node: URLs and already-prefixed searches
    /// pass through, free text gets the default search prefix.
    pub fn identifier_for(&self, query: &str) -> String {
        let query = query.trim();
        if URL_RE.is_match(query) || SEARCH_PREFIX_RE.is_match(query) {
            query.to_string()
        } else {
            format!("{}:{}", self.search_prefix, query)
        }
    }

    /// Never fails: transport errors and timeouts come back as
    /// `LoadResult::Error`, no matches as `LoadResult::Empty`.
    pub async fn resolve(&self, query: &str) -> LoadResult {
        let identifier = self.identifier_for(query);
        debug!("Resolving {}", identifier);

        match tokio::time::timeout(self.timeout, self.node.load_tracks(&identifier)).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => {
                warn!("Track resolution failed for {}: {}", identifier, e);
                LoadResult::failure(e.to_string())
            }
            Err(_) => {
                warn!(
                    "Track resolution for {} timed out after {:?}",
                    identifier, self.timeout
                );
                LoadResult::failure(format!(
                    "resolution timed out after {}ms",
                    self.timeout.as_millis()
                ))
            }
        }
    }
}
