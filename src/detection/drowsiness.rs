//! 瞌睡判定状态机
//!
//! 逐帧消费 EAR 信号，跟踪 EAR 持续低于闭眼阈值的时长：
//! Awake（睁眼）→ Closing（闭眼计时中）→ Drowsy（闭眼超过驻留时长）
//!
//! - 任意一帧 EAR ≥ 阈值都会清空计时，重新闭眼必须重新累计完整驻留时长
//! - 无信号帧（未检测到眼睛）既不启动也不清空计时
//! - 报警为单次触发：进入 Drowsy 时发出一次 ON；非 Drowsy 的每一帧都发出
//!   幂等的 STOP 命令，但 OFF 边沿只在报警确实在响时发出一次
//!
//! 阈值比较使用全精度 EAR，两位小数仅用于展示。

use std::time::{Duration, Instant};

use serde::Serialize;

use super::config::DetectionConfig;
use super::ear::round_display;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmEdge {
    On,
    Off,
}

/// 发给报警播放方的命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AlarmCommand {
    Play,
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Awake,
    Closing,
    Drowsy,
}

/// 单个会话独占的检测状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DetectionState {
    pub drowsy_timer_start: Option<Instant>,
    pub alarm_playing: bool,
}

/// 单帧判定结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepOutcome {
    pub is_drowsy: bool,
    pub phase: Phase,
    /// 全精度 EAR
    pub ear: Option<f64>,
    /// 两位小数的展示值；`None` 表示未检测到眼睛
    pub display_ear: Option<f64>,
    pub alarm_edge: Option<AlarmEdge>,
    pub alarm_command: Option<AlarmCommand>,
    /// 当前闭眼持续时长
    pub closed_for: Option<Duration>,
}

#[derive(Debug, Clone)]
pub struct DrowsinessDetector {
    closure_threshold: f64,
    dwell: Duration,
    state: DetectionState,
}

impl DrowsinessDetector {
    pub fn new(closure_threshold: f64, dwell: Duration) -> Self {
        Self {
            closure_threshold,
            dwell,
            state: DetectionState::default(),
        }
    }

    pub fn from_config(config: &DetectionConfig) -> Self {
        Self::new(config.closure_threshold, config.dwell())
    }

    pub fn state(&self) -> DetectionState {
        self.state
    }

    pub fn closure_threshold(&self) -> f64 {
        self.closure_threshold
    }

    pub fn dwell(&self) -> Duration {
        self.dwell
    }

    /// 处理一帧。`frame_ear` 为 `None` 表示本帧未检测到眼睛；
    /// `now` 必须单调不减，由调用方提供。
    pub fn step(&mut self, frame_ear: Option<f64>, now: Instant) -> StepOutcome {
        let is_drowsy = match frame_ear {
            None => self.dwell_elapsed(now),
            Some(ear) if ear < self.closure_threshold => {
                if self.state.drowsy_timer_start.is_none() {
                    self.state.drowsy_timer_start = Some(now);
                    false
                } else {
                    self.dwell_elapsed(now)
                }
            }
            Some(_) => {
                self.state.drowsy_timer_start = None;
                false
            }
        };

        let (alarm_edge, alarm_command) = self.update_alarm(is_drowsy);

        let closed_for = self
            .state
            .drowsy_timer_start
            .map(|start| now.saturating_duration_since(start));
        let phase = match (is_drowsy, closed_for) {
            (true, _) => Phase::Drowsy,
            (false, Some(_)) => Phase::Closing,
            (false, None) => Phase::Awake,
        };

        StepOutcome {
            is_drowsy,
            phase,
            ear: frame_ear,
            display_ear: frame_ear.map(round_display),
            alarm_edge,
            alarm_command,
            closed_for,
        }
    }

    /// 丢弃计时并确保报警停止；返回报警此前是否在响
    pub fn reset(&mut self) -> bool {
        let was_playing = self.state.alarm_playing;
        self.state = DetectionState::default();
        was_playing
    }

    fn dwell_elapsed(&self, now: Instant) -> bool {
        self.state
            .drowsy_timer_start
            .map(|start| now.saturating_duration_since(start) >= self.dwell)
            .unwrap_or(false)
    }

    fn update_alarm(&mut self, is_drowsy: bool) -> (Option<AlarmEdge>, Option<AlarmCommand>) {
        if is_drowsy {
            if self.state.alarm_playing {
                (None, None)
            } else {
                self.state.alarm_playing = true;
                (Some(AlarmEdge::On), Some(AlarmCommand::Play))
            }
        } else {
            let was_playing = std::mem::replace(&mut self.state.alarm_playing, false);
            let edge = was_playing.then_some(AlarmEdge::Off);
            (edge, Some(AlarmCommand::Stop))
        }
    }
}

impl Default for DrowsinessDetector {
    fn default() -> Self {
        Self::from_config(&DetectionConfig::default())
    }
}
