use std::sync::atomic::{AtomicU64, Ordering};

/// Alarm playback collaborator.
///
/// `stop` is called on every not-drowsy frame and must be idempotent.
pub trait AlarmSink: Send + Sync {
    fn play(&self);
    fn stop(&self);
}

/// Default sink for headless deployments: the alarm is surfaced through logs
/// and the realtime event stream only.
#[derive(Debug, Default)]
pub struct TracingAlarm {
    plays: AtomicU64,
}

impl TracingAlarm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn play_count(&self) -> u64 {
        self.plays.load(Ordering::Relaxed)
    }
}

impl AlarmSink for TracingAlarm {
    fn play(&self) {
        let n = self.plays.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::warn!(alarm_count = n, "Drowsiness alarm: PLAY");
    }

    fn stop(&self) {
        tracing::trace!("Drowsiness alarm: ensure stopped");
    }
}
