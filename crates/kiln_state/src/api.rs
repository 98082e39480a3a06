//! Public-API fingerprints.

use kiln_common::ContentHash;

/// An ordered list of opaque signature strings summarizing a package's
/// externally visible surface.
///
/// Comparison is structural: two fingerprints are equal iff their ordered
/// lists are equal. Empty signatures and embedded line breaks are never
/// stored, since each signature occupies one `I` line in the state file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublicApi(Vec<String>);

impl PublicApi {
    /// Builds a fingerprint from signature lines, dropping empty ones.
    pub fn new<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(
            lines
                .into_iter()
                .map(Into::into)
                .filter(|l: &String| !l.is_empty())
                .collect(),
        )
    }

    /// Parses the newline-separated form handed back by transformers.
    pub fn from_serialized(text: &str) -> Self {
        Self::new(text.lines().map(|l| l.trim_end_matches('\r')))
    }

    /// Appends one signature line.
    pub fn push(&mut self, line: impl Into<String>) {
        let line = line.into();
        if !line.is_empty() && !line.contains('\n') {
            self.0.push(line);
        }
    }

    /// The signature lines in order.
    pub fn lines(&self) -> &[String] {
        &self.0
    }

    /// Returns `true` if the package exposes nothing.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// A short digest for log messages.
    pub fn digest(&self) -> ContentHash {
        ContentHash::from_lines(&self.0)
    }
}
