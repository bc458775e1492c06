//! 帧级关键点输入与多人脸策略
//!
//! 关键点检测器每帧可能返回零张或多张人脸。每张人脸先独立计算双眼 EAR，
//! 再由 [`FacePolicy`] 显式地归约为该帧唯一的 EAR 信号。

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::ear::{binocular_ear, BinocularEar, EyeContour};

/// 单张人脸的左右眼轮廓（图像像素坐标）
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceLandmarks {
    #[serde(default)]
    pub left: Vec<[f64; 2]>,
    #[serde(default)]
    pub right: Vec<[f64; 2]>,
}

/// 一帧的关键点输入
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameLandmarks {
    #[serde(default)]
    pub faces: Vec<FaceLandmarks>,
    /// 相对会话开始的单调时间偏移（毫秒）；缺省时使用到达时间
    #[serde(default)]
    pub offset_ms: Option<u64>,
}

impl FrameLandmarks {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// 单张人脸的评估结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceSignal {
    pub eyes: BinocularEar,
    /// 有效眼部轮廓的平均眼角间距，用作人脸远近的代理
    pub width: f64,
}

impl FaceSignal {
    pub fn ear(&self) -> Option<f64> {
        self.eyes.combined()
    }
}

pub fn evaluate_face(face: &FaceLandmarks) -> FaceSignal {
    let left = EyeContour::from_coords(&face.left);
    let right = EyeContour::from_coords(&face.right);
    let eyes = binocular_ear(left.as_ref(), right.as_ref());

    let widths: Vec<f64> = [(left, eyes.left), (right, eyes.right)]
        .into_iter()
        .filter_map(|(contour, ear)| ear.and(contour).map(|c| c.horizontal()))
        .collect();
    let width = if widths.is_empty() {
        0.0
    } else {
        widths.iter().sum::<f64>() / widths.len() as f64
    };

    FaceSignal { eyes, width }
}

/// 多人脸时如何得到该帧唯一的 EAR
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacePolicy {
    /// 眼角间距最大（离摄像头最近）的人脸
    #[default]
    Largest,
    /// 检测顺序中第一张有信号的人脸
    First,
    /// 检测顺序中最后一张有信号的人脸
    Last,
    /// 所有有信号人脸的平均值
    Average,
    /// EAR 最低（最接近闭眼）的人脸
    MostClosed,
    /// 出现多张人脸时整帧视为无信号
    Reject,
}

impl FacePolicy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Largest => "largest",
            Self::First => "first",
            Self::Last => "last",
            Self::Average => "average",
            Self::MostClosed => "most_closed",
            Self::Reject => "reject",
        }
    }

    /// `faces` 为该帧全部检测到的人脸（含无信号的人脸）
    pub fn resolve(self, faces: &[FaceSignal]) -> Option<f64> {
        let mut with_signal = faces.iter().filter_map(|f| f.ear().map(|ear| (ear, f.width)));

        match self {
            Self::First => with_signal.next().map(|(ear, _)| ear),
            Self::Last => with_signal.last().map(|(ear, _)| ear),
            Self::Largest => with_signal
                .fold(None, |best: Option<(f64, f64)>, (ear, width)| match best {
                    Some((_, best_width)) if best_width >= width => best,
                    _ => Some((ear, width)),
                })
                .map(|(ear, _)| ear),
            Self::Average => {
                let ears: Vec<f64> = with_signal.map(|(ear, _)| ear).collect();
                if ears.is_empty() {
                    None
                } else {
                    Some(ears.iter().sum::<f64>() / ears.len() as f64)
                }
            }
            Self::MostClosed => with_signal.map(|(ear, _)| ear).reduce(f64::min),
            Self::Reject => {
                if faces.len() > 1 {
                    None
                } else {
                    with_signal.next().map(|(ear, _)| ear)
                }
            }
        }
    }
}

impl fmt::Display for FacePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FacePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "largest" => Ok(Self::Largest),
            "first" => Ok(Self::First),
            "last" => Ok(Self::Last),
            "average" => Ok(Self::Average),
            "most_closed" | "most-closed" => Ok(Self::MostClosed),
            "reject" => Ok(Self::Reject),
            other => Err(format!("unknown face policy: {other}")),
        }
    }
}

/// 一帧归约后的信号
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameSignal {
    /// 全精度 EAR；`None` 表示本帧未检测到眼睛
    pub ear: Option<f64>,
    pub faces_detected: usize,
}

pub fn evaluate_frame(frame: &FrameLandmarks, policy: FacePolicy) -> FrameSignal {
    let faces: Vec<FaceSignal> = frame.faces.iter().map(evaluate_face).collect();
    FrameSignal {
        ear: policy.resolve(&faces),
        faces_detected: faces.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// 眼角间距为 `width`、EAR 为 `ear` 的轮廓
    fn eye(width: f64, ear: f64, x0: f64) -> Vec<[f64; 2]> {
        let h = ear * width / 2.0;
        vec![
            [x0, 0.0],
            [x0 + width / 3.0, h],
            [x0 + 2.0 * width / 3.0, h],
            [x0 + width, 0.0],
            [x0 + 2.0 * width / 3.0, -h],
            [x0 + width / 3.0, -h],
        ]
    }

    fn face(width: f64, ear: f64) -> FaceLandmarks {
        FaceLandmarks {
            left: eye(width, ear, 0.0),
            right: eye(width, ear, width * 2.0),
        }
    }

    fn frame(faces: Vec<FaceLandmarks>) -> FrameLandmarks {
        FrameLandmarks {
            faces,
            offset_ms: None,
        }
    }

    fn approx(actual: Option<f64>, expected: f64) {
        let v = actual.expect("signal");
        assert!((v - expected).abs() < 1e-9, "{v} != {expected}");
    }

    #[test]
    fn no_faces_is_absent_signal() {
        let signal = evaluate_frame(&FrameLandmarks::empty(), FacePolicy::Largest);
        assert_eq!(signal.ear, None);
        assert_eq!(signal.faces_detected, 0);
    }

    #[test]
    fn face_without_valid_eyes_is_absent_signal() {
        let f = FaceLandmarks {
            left: vec![[0.0, 0.0]; 3],
            right: Vec::new(),
        };
        let signal = evaluate_frame(&frame(vec![f]), FacePolicy::Largest);
        assert_eq!(signal.ear, None);
        assert_eq!(signal.faces_detected, 1);
    }

    #[test]
    fn single_valid_eye_is_used() {
        let f = FaceLandmarks {
            left: eye(30.0, 0.2, 0.0),
            right: vec![[5.0, 5.0]; 6],
        };
        approx(evaluate_frame(&frame(vec![f]), FacePolicy::First).ear, 0.2);
    }

    #[test]
    fn policies_resolve_multiple_faces() {
        let faces = vec![face(20.0, 0.30), face(40.0, 0.20), face(10.0, 0.10)];
        let f = frame(faces);

        approx(evaluate_frame(&f, FacePolicy::Largest).ear, 0.20);
        approx(evaluate_frame(&f, FacePolicy::First).ear, 0.30);
        approx(evaluate_frame(&f, FacePolicy::Last).ear, 0.10);
        approx(evaluate_frame(&f, FacePolicy::Average).ear, 0.20);
        approx(evaluate_frame(&f, FacePolicy::MostClosed).ear, 0.10);
        assert_eq!(evaluate_frame(&f, FacePolicy::Reject).ear, None);
    }

    #[test]
    fn reject_accepts_single_face() {
        approx(
            evaluate_frame(&frame(vec![face(30.0, 0.25)]), FacePolicy::Reject).ear,
            0.25,
        );
    }

    #[test]
    fn policy_parses_from_env_strings() {
        assert_eq!("LARGEST".parse::<FacePolicy>(), Ok(FacePolicy::Largest));
        assert_eq!("most-closed".parse::<FacePolicy>(), Ok(FacePolicy::MostClosed));
        assert!("nearest".parse::<FacePolicy>().is_err());
        assert_eq!(FacePolicy::MostClosed.to_string(), "most_closed");
    }

    #[test]
    fn frame_deserializes_camel_case() {
        let json = r#"{"faces":[{"left":[[0,0],[1,1],[2,1],[3,0],[2,-1],[1,-1]]}],"offsetMs":150}"#;
        let f: FrameLandmarks = serde_json::from_str(json).unwrap();
        assert_eq!(f.offset_ms, Some(150));
        assert_eq!(f.faces[0].left.len(), 6);
        assert!(f.faces[0].right.is_empty());
    }
}
