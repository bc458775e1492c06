use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::session::{AlarmSink, SessionManager};

#[derive(Clone)]
pub struct AppState {
    sessions: Arc<SessionManager>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        config: &Config,
        alarm: Arc<dyn AlarmSink>,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        let sessions = Arc::new(SessionManager::new(
            config.detection,
            alarm,
            config.limits.event_buffer,
        ));
        Self {
            sessions,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}
