// ABOUTME: Diagnostics accumulator for non-fatal warnings during a deployment.
// ABOUTME: Best-effort engine failures land here instead of aborting the run.

/// Collects non-fatal warnings during orchestration.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<Warning>,
}

impl Diagnostics {
    /// Record a warning, auto-logging it via tracing.
    pub fn warn(&mut self, warning: Warning) {
        tracing::warn!(kind = ?warning.kind, "{}", warning.message);
        self.warnings.push(warning);
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    /// Move every warning out, leaving the accumulator empty.
    pub fn take(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}

/// A non-fatal warning.
#[derive(Debug, Clone)]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

impl Warning {
    /// Pulling an image failed; a local copy may still exist.
    ///
    /// This also hides a genuinely missing image until the create call fails.
    pub fn pull_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::PullFailed,
            message: message.into(),
        }
    }

    /// The image replaced by a rebuild could not be removed.
    pub fn image_remove_failed(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::ImageRemoveFailed,
            message: message.into(),
        }
    }

    pub fn deprecated_marker(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::DeprecatedMarker,
            message: message.into(),
        }
    }

    /// The interactive terminal could not be switched or restored.
    pub fn terminal(message: impl Into<String>) -> Self {
        Self {
            kind: WarningKind::Terminal,
            message: message.into(),
        }
    }
}

/// Categories of warnings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WarningKind {
    /// Image pull failed and was ignored.
    PullFailed,
    /// Old image left behind after a rebuild.
    ImageRemoveFailed,
    /// A service printed the `@whaler ready in` marker.
    DeprecatedMarker,
    /// Raw mode or resize forwarding failed.
    Terminal,
}
