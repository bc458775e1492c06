//! 瞌睡检测核心
//!
//! 纯计算，无 I/O：
//! - `ear`: 6 点眼部轮廓的 EAR 计算
//! - `face`: 帧级关键点输入与多人脸策略
//! - `drowsiness`: 带驻留时长和单次报警的判定状态机
//! - `config`: 检测参数

pub mod config;
pub mod drowsiness;
pub mod ear;
pub mod face;

pub use config::{DetectionConfig, DetectionOverrides};
pub use drowsiness::{AlarmCommand, AlarmEdge, DetectionState, DrowsinessDetector, Phase, StepOutcome};
pub use ear::{compute_ear, round_display, EyeContour, Point};
pub use face::{evaluate_frame, FaceLandmarks, FacePolicy, FrameLandmarks, FrameSignal};
