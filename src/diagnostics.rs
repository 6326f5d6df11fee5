//! Diagnostics context threaded through the pipeline stages.
//!
//! Stages never consult ambient state to decide how chatty to be; the caller
//! constructs a [`Diagnostics`] once and passes it down. Emission goes through
//! the [`log`] facade so the binary (or a host application) controls the sink.

use log::{debug, info};

/// Per-run diagnostics context.
///
/// Carries the verbosity decision made at the entry point. `trace` output is
/// suppressed entirely unless verbose mode is on; `message` output is always
/// emitted at info level.
#[derive(Debug, Clone, Copy, Default)]
pub struct Diagnostics {
    verbose: bool,
}

impl Diagnostics {
    /// Create a diagnostics context with the given verbosity.
    #[must_use]
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    /// Whether verbose tracing is enabled for this run.
    #[must_use]
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Emit a verbose-only trace line.
    pub fn trace(&self, message: impl AsRef<str>) {
        if self.verbose {
            debug!("{}", message.as_ref());
        }
    }

    /// Emit a user-facing progress message.
    pub fn message(&self, message: impl AsRef<str>) {
        info!("{}", message.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbosity_flag_is_carried() {
        assert!(Diagnostics::new(true).is_verbose());
        assert!(!Diagnostics::new(false).is_verbose());
        assert!(!Diagnostics::default().is_verbose());
    }
}
