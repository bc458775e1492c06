//! Frame polling loop that drives a session from a landmark source.

pub mod source;

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::session::{Session, SessionError};

pub use source::{IterSource, LandmarkSource, ReplaySource, SourceError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    SourceExhausted,
    SessionStopped,
    Shutdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MonitorSummary {
    pub frames_processed: u64,
    pub alarms_raised: u64,
    pub reason: StopReason,
}

pub struct Monitor<S> {
    session: Arc<Session>,
    source: S,
    poll_interval: Duration,
}

impl<S: LandmarkSource> Monitor<S> {
    pub fn new(session: Arc<Session>, source: S) -> Self {
        let poll_interval = session.config().poll_interval();
        Self {
            session,
            source,
            poll_interval,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval.max(Duration::from_millis(1));
        self
    }

    /// Pull and process frames until the source runs dry, the session is stopped
    /// or shutdown is signalled. Frames are processed strictly one after another.
    pub async fn run(
        mut self,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<MonitorSummary, SourceError> {
        let mut interval = tokio::time::interval(self.poll_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let mut frames_processed = 0_u64;
        let mut alarms_raised = 0_u64;
        let session_id = self.session.id();

        tracing::info!(
            %session_id,
            poll_interval_ms = self.poll_interval.as_millis() as u64,
            "Monitor loop started"
        );

        let reason = loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = shutdown_rx.recv() => break StopReason::Shutdown,
            }

            if self.session.is_stopped() {
                break StopReason::SessionStopped;
            }

            let Some(frame) = self.source.next_frame().await? else {
                break StopReason::SourceExhausted;
            };

            match self.session.process(&frame).await {
                Ok(report) => {
                    frames_processed += 1;
                    if report.alarm_edge == Some(crate::detection::AlarmEdge::On) {
                        alarms_raised += 1;
                    }
                }
                Err(SessionError::Stopped(_)) => break StopReason::SessionStopped,
                Err(e) => {
                    tracing::warn!(%session_id, error = %e, "Frame processing rejected");
                }
            }
        };

        tracing::info!(
            %session_id,
            frames_processed,
            alarms_raised,
            reason = ?reason,
            "Monitor loop finished"
        );

        Ok(MonitorSummary {
            frames_processed,
            alarms_raised,
            reason,
        })
    }
}
