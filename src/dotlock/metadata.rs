//! Metadata stored inside dotlock marker files.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::Path;

/// Contents of a dotlock marker, serialized as JSON.
///
/// The marker's existence is what provides mutual exclusion; the metadata is
/// there so operators and other processes can see who holds a mailbox and
/// since when. Other dotlock implementations may write different content (or
/// nothing), so nothing in the protocol depends on being able to parse it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DotlockMetadata {
    /// Owner of the lock (`user@host`).
    pub owner: String,

    /// Process ID of the holder.
    pub pid: u32,

    /// Timestamp when the marker was created (RFC3339).
    pub created_at: DateTime<Utc>,
}

impl DotlockMetadata {
    /// Metadata describing this process, stamped with the current time.
    pub fn new() -> Self {
        Self {
            owner: owner_string(),
            pid: std::process::id(),
            created_at: Utc::now(),
        }
    }

    /// Parse marker metadata from a file.
    pub fn from_file(path: impl AsRef<Path>) -> io::Result<Self> {
        let content = fs::read_to_string(path.as_ref())?;
        serde_json::from_str(&content).map_err(io::Error::other)
    }

    /// Serialize to the JSON written into the marker.
    pub fn to_json(&self) -> io::Result<String> {
        serde_json::to_string_pretty(self).map_err(io::Error::other)
    }

    /// Age of the marker according to its own timestamp.
    pub fn age(&self) -> Duration {
        Utc::now().signed_duration_since(self.created_at)
    }
}

impl Default for DotlockMetadata {
    fn default() -> Self {
        Self::new()
    }
}

/// `user@host` identifying the holder.
fn owner_string() -> String {
    let user = std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| "unknown".to_string());

    let host = hostname::get()
        .map(|h| h.to_string_lossy().to_string())
        .unwrap_or_else(|_| "unknown".to_string());

    format!("{}@{}", user, host)
}
