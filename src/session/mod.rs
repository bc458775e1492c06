pub mod alarm;
pub mod manager;
pub mod report;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::detection::{
    evaluate_frame, AlarmCommand, AlarmEdge, DetectionConfig, DrowsinessDetector, FrameLandmarks,
};

pub use alarm::{AlarmSink, TracingAlarm};
pub use manager::SessionManager;
pub use report::{
    AlarmNotice, FrameReport, SessionCounters, SessionEvent, SessionInfo, SessionSummary,
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("a detection session is already active: {0}")]
    AlreadyActive(Uuid),
    #[error("no active detection session")]
    NotActive,
    #[error("detection session {0} has been stopped")]
    Stopped(Uuid),
}

struct SessionInner {
    detector: DrowsinessDetector,
    counters: SessionCounters,
    last_report: Option<FrameReport>,
    stopped_at: Option<DateTime<Utc>>,
}

/// One start → stop detection cycle. Owns its detection state exclusively;
/// frames are processed one at a time under `inner`.
pub struct Session {
    info: SessionInfo,
    origin: Instant,
    stopped: AtomicBool,
    inner: Mutex<SessionInner>,
    alarm: Arc<dyn AlarmSink>,
    events: broadcast::Sender<SessionEvent>,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.info.id)
            .field("started_at", &self.info.started_at)
            .field("stopped", &self.is_stopped())
            .finish_non_exhaustive()
    }
}

impl Session {
    pub fn new(
        config: DetectionConfig,
        alarm: Arc<dyn AlarmSink>,
        events: broadcast::Sender<SessionEvent>,
    ) -> Self {
        let info = SessionInfo {
            id: Uuid::new_v4(),
            started_at: Utc::now(),
            config,
        };
        Self {
            inner: Mutex::new(SessionInner {
                detector: DrowsinessDetector::from_config(&config),
                counters: SessionCounters::default(),
                last_report: None,
                stopped_at: None,
            }),
            info,
            origin: Instant::now(),
            stopped: AtomicBool::new(false),
            alarm,
            events,
        }
    }

    pub fn id(&self) -> Uuid {
        self.info.id
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn config(&self) -> &DetectionConfig {
        &self.info.config
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Frames carrying an offset are placed on the session's own timeline;
    /// otherwise the arrival time is used.
    pub fn timestamp_for(&self, frame: &FrameLandmarks) -> Instant {
        match frame.offset_ms {
            Some(ms) => self.origin + Duration::from_millis(ms),
            None => Instant::now(),
        }
    }

    pub async fn process(&self, frame: &FrameLandmarks) -> Result<FrameReport, SessionError> {
        let now = self.timestamp_for(frame);
        self.process_at(frame, now).await
    }

    pub async fn process_at(
        &self,
        frame: &FrameLandmarks,
        now: Instant,
    ) -> Result<FrameReport, SessionError> {
        let mut inner = self.inner.lock().await;
        // checked under the lock so a concurrent stop is never overtaken
        if self.is_stopped() {
            return Err(SessionError::Stopped(self.id()));
        }

        let signal = evaluate_frame(frame, self.info.config.face_policy);
        let outcome = inner.detector.step(signal.ear, now);

        match outcome.alarm_command {
            Some(AlarmCommand::Play) => self.alarm.play(),
            Some(AlarmCommand::Stop) => self.alarm.stop(),
            None => {}
        }

        let frame_index = inner.counters.frames;
        inner.counters.record(&outcome);
        let report = FrameReport::new(self.id(), frame_index, &signal, &outcome);

        if signal.ear.is_none() {
            tracing::debug!(
                session_id = %self.id(),
                frame_index,
                faces = signal.faces_detected,
                "No eyes detected"
            );
        }
        match outcome.alarm_edge {
            Some(AlarmEdge::On) => tracing::info!(
                session_id = %self.id(),
                frame_index,
                closed_for_ms = ?report.closed_for_ms,
                "Subject classified drowsy, alarm raised"
            ),
            Some(AlarmEdge::Off) => tracing::info!(
                session_id = %self.id(),
                frame_index,
                "Subject awake again, alarm cleared"
            ),
            None => {}
        }

        inner.last_report = Some(report.clone());
        self.publish(SessionEvent::Frame(report.clone()));
        if let Some(edge) = outcome.alarm_edge {
            self.publish(SessionEvent::Alarm(AlarmNotice {
                session_id: self.id(),
                frame_index,
                edge,
            }));
        }

        Ok(report)
    }

    /// Stop the session. Always releases the alarm, even when called twice.
    pub async fn stop(&self) -> SessionSummary {
        let mut inner = self.inner.lock().await;
        let already_stopped = self.stopped.swap(true, Ordering::SeqCst);

        let was_playing = inner.detector.reset();
        self.alarm.stop();

        if already_stopped {
            return self.summary_locked(&inner);
        }

        inner.stopped_at = Some(Utc::now());
        let summary = self.summary_locked(&inner);
        tracing::info!(
            session_id = %self.id(),
            frames = summary.counters.frames,
            alarms = summary.counters.alarms_raised,
            alarm_was_playing = was_playing,
            "Detection session stopped"
        );
        self.publish(SessionEvent::SessionStopped(summary.clone()));
        summary
    }

    pub async fn summary(&self) -> SessionSummary {
        let inner = self.inner.lock().await;
        self.summary_locked(&inner)
    }

    fn summary_locked(&self, inner: &SessionInner) -> SessionSummary {
        SessionSummary {
            info: self.info.clone(),
            active: !self.is_stopped(),
            stopped_at: inner.stopped_at,
            counters: inner.counters,
            last_report: inner.last_report.clone(),
        }
    }

    fn publish(&self, event: SessionEvent) {
        // no subscribers is fine
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicU64;

    use super::*;
    use crate::detection::FaceLandmarks;

    #[derive(Default)]
    struct CountingAlarm {
        plays: AtomicU64,
        stops: AtomicU64,
    }

    impl AlarmSink for CountingAlarm {
        fn play(&self) {
            self.plays.fetch_add(1, Ordering::SeqCst);
        }
        fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn eye(ear: f64) -> Vec<[f64; 2]> {
        let h = ear * 30.0 / 2.0;
        vec![
            [0.0, 0.0],
            [10.0, h],
            [20.0, h],
            [30.0, 0.0],
            [20.0, -h],
            [10.0, -h],
        ]
    }

    fn frame(ear: Option<f64>, offset_ms: u64) -> FrameLandmarks {
        FrameLandmarks {
            faces: ear
                .map(|e| {
                    vec![FaceLandmarks {
                        left: eye(e),
                        right: eye(e),
                    }]
                })
                .unwrap_or_default(),
            offset_ms: Some(offset_ms),
        }
    }

    fn session() -> (Session, Arc<CountingAlarm>, broadcast::Receiver<SessionEvent>) {
        let alarm = Arc::new(CountingAlarm::default());
        let (tx, rx) = broadcast::channel(64);
        let session = Session::new(DetectionConfig::default(), alarm.clone(), tx);
        (session, alarm, rx)
    }

    #[tokio::test]
    async fn debug_shows_id_and_stopped_flag() {
        let (session, _alarm, _rx) = session();
        let rendered = format!("{session:?}");
        assert!(rendered.contains(&session.id().to_string()));
        assert!(rendered.contains("stopped: false"));

        session.stop().await;
        assert!(format!("{session:?}").contains("stopped: true"));
    }

    #[tokio::test]
    async fn drowsy_run_plays_alarm_once() {
        let (session, alarm, _rx) = session();
        let mut reports = Vec::new();
        for t in [0, 500, 1000, 1500, 2000, 2500] {
            reports.push(session.process(&frame(Some(0.2), t)).await.unwrap());
        }
        assert_eq!(alarm.plays.load(Ordering::SeqCst), 1);
        assert_eq!(alarm.stops.load(Ordering::SeqCst), 4);
        assert!(reports[4].is_drowsy);
        assert_eq!(reports[4].ear, Some(0.2));
        assert_eq!(reports[5].frame_index, 5);

        let summary = session.summary().await;
        assert_eq!(summary.counters.alarms_raised, 1);
        assert_eq!(summary.counters.drowsy_frames, 2);
        assert!(summary.active);
    }

    #[tokio::test]
    async fn missing_face_is_reported_distinctly() {
        let (session, _alarm, _rx) = session();
        let report = session.process(&frame(None, 0)).await.unwrap();
        assert!(report.no_eyes_detected);
        assert_eq!(report.ear, None);
        assert_eq!(report.faces_detected, 0);
    }

    #[tokio::test]
    async fn stop_releases_alarm_and_rejects_frames() {
        let (session, alarm, mut rx) = session();
        session.process(&frame(Some(0.1), 0)).await.unwrap();
        session.process(&frame(Some(0.1), 2000)).await.unwrap();
        assert_eq!(alarm.plays.load(Ordering::SeqCst), 1);

        let stops_before = alarm.stops.load(Ordering::SeqCst);
        let summary = session.stop().await;
        assert!(!summary.active);
        assert!(summary.stopped_at.is_some());
        assert_eq!(alarm.stops.load(Ordering::SeqCst), stops_before + 1);

        let err = session.process(&frame(Some(0.3), 2100)).await.unwrap_err();
        assert_eq!(err, SessionError::Stopped(session.id()));

        // second stop still ensures the alarm is silent but emits no event
        session.stop().await;
        assert_eq!(alarm.stops.load(Ordering::SeqCst), stops_before + 2);

        let mut kinds = Vec::new();
        while let Ok(event) = rx.try_recv() {
            kinds.push(event.kind());
        }
        assert_eq!(kinds, vec!["frame", "frame", "alarm", "session_stopped"]);
    }
}
