use std::time::Duration;

/// Tunables of a [`Renderer`](crate::Renderer).
#[derive(Debug, Clone, PartialEq)]
pub struct RendererConfig {
    /// Slice length used when the host gives no deadline of its own.
    pub frame_budget: Duration,
    /// Replace ASCII spaces in text nodes with U+00A0.
    pub nbsp_text: bool,
    pub warn_missing_keys: bool,
    /// Commits `flush` performs before giving up on a self-scheduling update.
    pub max_passes_per_flush: usize,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            frame_budget: Duration::from_millis(4),
            nbsp_text: false,
            warn_missing_keys: true,
            max_passes_per_flush: 50,
        }
    }
}

impl RendererConfig {
    pub fn with_frame_budget(mut self, budget: Duration) -> Self {
        self.frame_budget = budget;
        self
    }

    pub fn with_nbsp_text(mut self, enabled: bool) -> Self {
        self.nbsp_text = enabled;
        self
    }

    pub fn with_warn_missing_keys(mut self, enabled: bool) -> Self {
        self.warn_missing_keys = enabled;
        self
    }

    pub fn with_max_passes_per_flush(mut self, limit: usize) -> Self {
        self.max_passes_per_flush = limit.max(1);
        self
    }
}
