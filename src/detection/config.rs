use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::face::FacePolicy;

pub const DEFAULT_CLOSURE_THRESHOLD: f64 = 0.26;
pub const DEFAULT_DWELL_MS: u64 = 2_000;
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionConfig {
    /// EAR below this value counts as a closed-eye sample
    pub closure_threshold: f64,
    /// Continuous closure required before the subject is classified drowsy
    pub dwell_ms: u64,
    /// Frame polling cadence of the monitor loop
    pub poll_interval_ms: u64,
    #[serde(default)]
    pub face_policy: FacePolicy,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            closure_threshold: DEFAULT_CLOSURE_THRESHOLD,
            dwell_ms: DEFAULT_DWELL_MS,
            poll_interval_ms: DEFAULT_POLL_INTERVAL_MS,
            face_policy: FacePolicy::default(),
        }
    }
}

impl DetectionConfig {
    pub fn dwell(&self) -> Duration {
        Duration::from_millis(self.dwell_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Replace unusable values with defaults. A zero dwell is allowed and means
    /// the second consecutive closed frame already classifies as drowsy.
    pub fn sanitized(mut self) -> Self {
        if !self.closure_threshold.is_finite() || self.closure_threshold <= 0.0 {
            tracing::warn!(
                value = self.closure_threshold,
                fallback = DEFAULT_CLOSURE_THRESHOLD,
                "Invalid closure threshold, using default"
            );
            self.closure_threshold = DEFAULT_CLOSURE_THRESHOLD;
        }
        if self.poll_interval_ms == 0 {
            tracing::warn!(
                fallback = DEFAULT_POLL_INTERVAL_MS,
                "Poll interval must be positive, using default"
            );
            self.poll_interval_ms = DEFAULT_POLL_INTERVAL_MS;
        }
        self
    }

    /// Apply optional per-session overrides on top of this config.
    pub fn with_overrides(self, overrides: &DetectionOverrides) -> Self {
        Self {
            closure_threshold: overrides.closure_threshold.unwrap_or(self.closure_threshold),
            dwell_ms: overrides.dwell_ms.unwrap_or(self.dwell_ms),
            poll_interval_ms: self.poll_interval_ms,
            face_policy: overrides.face_policy.unwrap_or(self.face_policy),
        }
        .sanitized()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionOverrides {
    pub closure_threshold: Option<f64>,
    pub dwell_ms: Option<u64>,
    pub face_policy: Option<FacePolicy>,
}
