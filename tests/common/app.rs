use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use axum::Router;
use tokio::sync::broadcast;

use drowsiness_monitor::config::{Config, LimitsConfig};
use drowsiness_monitor::detection::DetectionConfig;
use drowsiness_monitor::routes::build_router;
use drowsiness_monitor::session::AlarmSink;
use drowsiness_monitor::state::AppState;

/// Counts alarm commands so tests can assert the audio side effects.
#[derive(Default)]
pub struct RecordingAlarm {
    pub plays: AtomicU64,
    pub stops: AtomicU64,
}

impl RecordingAlarm {
    pub fn plays(&self) -> u64 {
        self.plays.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> u64 {
        self.stops.load(Ordering::SeqCst)
    }
}

impl AlarmSink for RecordingAlarm {
    fn play(&self) {
        self.plays.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub alarm: Arc<RecordingAlarm>,
    pub shutdown_tx: broadcast::Sender<()>,
}

fn test_config(limits: LimitsConfig) -> Config {
    // 直接构造 Config，避免 set_var 在并行测试中互相干扰
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        cors_origin: "http://localhost:5173".to_string(),
        detection: DetectionConfig::default(),
        limits,
        replay_path: None,
    }
}

pub async fn spawn_with_limits(limits: LimitsConfig) -> TestApp {
    let config = test_config(limits);
    let alarm = Arc::new(RecordingAlarm::default());
    let (shutdown_tx, _) = broadcast::channel::<()>(8);

    let state = AppState::new(&config, alarm.clone(), shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        alarm,
        shutdown_tx,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_limits(LimitsConfig::default()).await
}
