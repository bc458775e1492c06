use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::detection::{AlarmCommand, AlarmEdge, DetectionConfig, FrameSignal, Phase, StepOutcome};

pub const STATUS_DROWSY: &str = "Drowsy - Wake Up!";
pub const STATUS_AWAKE: &str = "Awake";

/// Per-frame output for display collaborators.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameReport {
    pub session_id: Uuid,
    pub frame_index: u64,
    /// Display EAR rounded to two decimals
    pub ear: Option<f64>,
    pub no_eyes_detected: bool,
    pub faces_detected: usize,
    pub is_drowsy: bool,
    pub phase: Phase,
    pub status: &'static str,
    pub alarm_edge: Option<AlarmEdge>,
    pub alarm_command: Option<AlarmCommand>,
    pub closed_for_ms: Option<u64>,
}

impl FrameReport {
    pub fn new(
        session_id: Uuid,
        frame_index: u64,
        signal: &FrameSignal,
        outcome: &StepOutcome,
    ) -> Self {
        Self {
            session_id,
            frame_index,
            ear: outcome.display_ear,
            no_eyes_detected: outcome.ear.is_none(),
            faces_detected: signal.faces_detected,
            is_drowsy: outcome.is_drowsy,
            phase: outcome.phase,
            status: if outcome.is_drowsy {
                STATUS_DROWSY
            } else {
                STATUS_AWAKE
            },
            alarm_edge: outcome.alarm_edge,
            alarm_command: outcome.alarm_command,
            closed_for_ms: outcome.closed_for.map(|d| d.as_millis() as u64),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: Uuid,
    pub started_at: DateTime<Utc>,
    pub config: DetectionConfig,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCounters {
    pub frames: u64,
    pub frames_without_eyes: u64,
    pub drowsy_frames: u64,
    pub alarms_raised: u64,
}

impl SessionCounters {
    pub fn record(&mut self, outcome: &StepOutcome) {
        self.frames += 1;
        if outcome.ear.is_none() {
            self.frames_without_eyes += 1;
        }
        if outcome.is_drowsy {
            self.drowsy_frames += 1;
        }
        if outcome.alarm_edge == Some(AlarmEdge::On) {
            self.alarms_raised += 1;
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    #[serde(flatten)]
    pub info: SessionInfo,
    pub active: bool,
    pub stopped_at: Option<DateTime<Utc>>,
    pub counters: SessionCounters,
    pub last_report: Option<FrameReport>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AlarmNotice {
    pub session_id: Uuid,
    pub frame_index: u64,
    pub edge: AlarmEdge,
}

/// Events fanned out to realtime subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    SessionStarted(SessionInfo),
    Frame(FrameReport),
    Alarm(AlarmNotice),
    SessionStopped(SessionSummary),
}

impl SessionEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::SessionStarted(_) => "session_started",
            Self::Frame(_) => "frame",
            Self::Alarm(_) => "alarm",
            Self::SessionStopped(_) => "session_stopped",
        }
    }
}
