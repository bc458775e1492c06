use std::sync::Arc;

use tokio::sync::{broadcast, Mutex};
use uuid::Uuid;

use crate::detection::{DetectionConfig, DetectionOverrides};

use super::{AlarmSink, Session, SessionError, SessionEvent, SessionSummary};

/// Holds at most one active detection session.
pub struct SessionManager {
    current: Mutex<Option<Arc<Session>>>,
    defaults: DetectionConfig,
    alarm: Arc<dyn AlarmSink>,
    events: broadcast::Sender<SessionEvent>,
}

impl SessionManager {
    pub fn new(defaults: DetectionConfig, alarm: Arc<dyn AlarmSink>, event_buffer: usize) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            current: Mutex::new(None),
            defaults: defaults.sanitized(),
            alarm,
            events,
        }
    }

    pub fn defaults(&self) -> &DetectionConfig {
        &self.defaults
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Start a session with fresh detection state.
    pub async fn start(&self, overrides: &DetectionOverrides) -> Result<Arc<Session>, SessionError> {
        let mut current = self.current.lock().await;
        if let Some(existing) = current.as_ref() {
            return Err(SessionError::AlreadyActive(existing.id()));
        }

        let config = self.defaults.with_overrides(overrides);
        let session = Arc::new(Session::new(config, self.alarm.clone(), self.events.clone()));
        // a new session never inherits a sounding alarm
        self.alarm.stop();

        tracing::info!(
            session_id = %session.id(),
            closure_threshold = config.closure_threshold,
            dwell_ms = config.dwell_ms,
            face_policy = %config.face_policy,
            "Detection session started"
        );
        let _ = self
            .events
            .send(SessionEvent::SessionStarted(session.info().clone()));

        *current = Some(session.clone());
        Ok(session)
    }

    /// Stop whichever session is active.
    ///
    /// `current` stays locked until the session has released the alarm.
    pub async fn stop(&self) -> Result<SessionSummary, SessionError> {
        let mut current = self.current.lock().await;
        let session = current.take().ok_or(SessionError::NotActive)?;
        Ok(session.stop().await)
    }

    /// Stop a specific session; a newer session started in the meantime is left alone.
    pub async fn stop_session(&self, id: Uuid) -> Result<SessionSummary, SessionError> {
        let mut current = self.current.lock().await;
        let session = match current.as_ref() {
            Some(s) if s.id() == id => current.take(),
            _ => None,
        }
        .ok_or(SessionError::NotActive)?;
        Ok(session.stop().await)
    }

    pub async fn current(&self) -> Option<Arc<Session>> {
        self.current.lock().await.clone()
    }

    pub async fn active(&self) -> Result<Arc<Session>, SessionError> {
        self.current().await.ok_or(SessionError::NotActive)
    }
}
