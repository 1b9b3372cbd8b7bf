// src/report.rs

//! Status reporting seam between the engine and a frontend.
//!
//! Terminal decoration (colors, spinners) lives outside the engine; this
//! trait is the contract a frontend implements to observe progress.

use tracing::{info, warn};

pub trait Reporter {
    /// A pipeline stage began.
    fn step(&self, message: &str);

    /// Something non-fatal deserves the user's attention.
    fn warn(&self, message: &str);

    /// An operation finished.
    fn done(&self, message: &str);
}

/// Forwards every event to the tracing log.
pub struct LogReporter;

impl Reporter for LogReporter {
    fn step(&self, message: &str) {
        info!("{message}");
    }

    fn warn(&self, message: &str) {
        warn!("{message}");
    }

    fn done(&self, message: &str) {
        info!("{message}");
    }
}

/// Discards all events. Useful for tests and embedding.
pub struct SilentReporter;

impl Reporter for SilentReporter {
    fn step(&self, _message: &str) {}
    fn warn(&self, _message: &str) {}
    fn done(&self, _message: &str) {}
}
