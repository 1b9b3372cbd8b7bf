// src/error.rs

//! Error taxonomy shared across the pipeline.

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    /// Bad invocation or a missing artifact the user named.
    #[error("{0}")]
    Usage(String),

    #[error("recipe error: {0}")]
    Recipe(String),

    #[error("failed to fetch {url}: {reason}")]
    Fetch { url: String, reason: String },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    Integrity {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("failed to extract {archive}: {reason}")]
    Extract { archive: String, reason: String },

    /// Extraction succeeded but no usable source directory appeared.
    #[error("source directory not found under {0} after extraction")]
    SourceDirMissing(PathBuf),

    #[error("failed to apply patch {patch}: {reason}")]
    Patch { patch: String, reason: String },

    #[error("{phase} phase failed with exit code {code}")]
    Phase { phase: &'static str, code: i32 },

    #[error("package {0} is not installed")]
    NotInstalled(String),

    #[error("packaging failed: {0}")]
    Pack(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Process exit code for this error (see the command surface contract).
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Usage(_) | Error::NotInstalled(_) => 2,
            Error::Fetch { .. } => 3,
            Error::SourceDirMissing(_) => 4,
            _ => 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        assert_eq!(Error::Usage("bad".into()).exit_code(), 2);
        assert_eq!(Error::NotInstalled("x".into()).exit_code(), 2);
        assert_eq!(
            Error::Fetch {
                url: "http://example.com/a".into(),
                reason: "timeout".into()
            }
            .exit_code(),
            3
        );
        assert_eq!(Error::SourceDirMissing(PathBuf::from("/b")).exit_code(), 4);
        assert_eq!(
            Error::Phase {
                phase: "build",
                code: 2
            }
            .exit_code(),
            1
        );
    }

    #[test]
    fn test_display_mentions_phase() {
        let e = Error::Phase {
            phase: "package",
            code: 1,
        };
        assert!(e.to_string().contains("package"));
    }
}
