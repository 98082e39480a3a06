//! Error types for configuration loading and validation.

use std::path::PathBuf;

/// How many missing/extra entries a source-list mismatch shows.
const PREVIEW: usize = 5;

/// Errors that can occur when loading or validating a build configuration.
///
/// All of these are fatal: the build does not start and no state is written.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// An I/O error occurred while reading a configuration input.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        /// The file that could not be read.
        path: PathBuf,
        /// The underlying error.
        source: std::io::Error,
    },

    /// The TOML content could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(String),

    /// A required field is missing from both the file and the command line.
    #[error("missing required field: {0}")]
    MissingField(String),

    /// A source root does not exist or is not a directory.
    #[error("invalid source root {}: {reason}", path.display())]
    InvalidRoot {
        /// The offending root.
        path: PathBuf,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The same directory was listed as a root more than once.
    #[error("source root {} is listed more than once", path.display())]
    DuplicateRoot {
        /// The repeated root.
        path: PathBuf,
    },

    /// An output directory is also a source root.
    #[error("output directory {} is also a source root", path.display())]
    OutputIsSourceRoot {
        /// The offending directory.
        path: PathBuf,
    },

    /// No transformer is configured, so nothing could ever be compiled.
    #[error("no transformers configured")]
    NoTransformers,

    /// A transformer entry is malformed.
    #[error("invalid transformer for '{suffix}': {reason}")]
    InvalidTransformer {
        /// The suffix the entry is registered for.
        suffix: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// The scanned sources differ from the externally supplied list.
    #[error(
        "found sources differ from the expected list ({} missing, {} extra){}",
        .missing.len(),
        .extra.len(),
        preview(.missing, .extra)
    )]
    SourceListMismatch {
        /// Listed but not found.
        missing: Vec<String>,
        /// Found but not listed.
        extra: Vec<String>,
    },
}

fn preview(missing: &[String], extra: &[String]) -> String {
    let mut out = String::new();
    for (label, list) in [("missing", missing), ("extra", extra)] {
        for name in list.iter().take(PREVIEW) {
            out.push_str(&format!("\n  {label}: {name}"));
        }
        if list.len() > PREVIEW {
            out.push_str(&format!("\n  ... and {} more {label}", list.len() - PREVIEW));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_missing_field() {
        let err = ConfigError::MissingField("build.output".to_string());
        assert_eq!(format!("{err}"), "missing required field: build.output");
    }

    #[test]
    fn display_parse_error() {
        let err = ConfigError::Parse("expected '=' at line 3".to_string());
        assert_eq!(
            format!("{err}"),
            "failed to parse configuration: expected '=' at line 3"
        );
    }

    #[test]
    fn display_invalid_root() {
        let err = ConfigError::InvalidRoot {
            path: PathBuf::from("src"),
            reason: "does not exist",
        };
        assert_eq!(format!("{err}"), "invalid source root src: does not exist");
    }

    #[test]
    fn display_io_error() {
        let err = ConfigError::Io {
            path: PathBuf::from("kiln.toml"),
            source: std::io::Error::new(std::io::ErrorKind::NotFound, "file not found"),
        };
        assert!(format!("{err}").starts_with("failed to read kiln.toml:"));
    }

    #[test]
    fn display_source_list_mismatch_is_truncated() {
        let missing: Vec<String> = (0..7).map(|i| format!("src/M{i}.java")).collect();
        let err = ConfigError::SourceListMismatch {
            missing,
            extra: vec!["src/X.java".to_string()],
        };
        let text = format!("{err}");
        assert!(text.starts_with("found sources differ from the expected list (7 missing, 1 extra)"));
        assert!(text.contains("missing: src/M4.java"));
        assert!(!text.contains("src/M5.java"));
        assert!(text.contains("... and 2 more missing"));
        assert!(text.contains("extra: src/X.java"));
    }
}
