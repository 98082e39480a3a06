//! Millisecond timestamps, the resolution recorded in the state file.

use std::io;
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Millis = u64;

/// Converts a `SystemTime` to epoch milliseconds, clamping pre-epoch times to 0.
pub fn to_millis(t: SystemTime) -> Millis {
    t.duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as Millis)
        .unwrap_or(0)
}

/// Returns the last-modified time of a file in epoch milliseconds.
pub fn modified_millis(path: &Path) -> io::Result<Millis> {
    let meta = std::fs::metadata(path)?;
    Ok(to_millis(meta.modified()?))
}
