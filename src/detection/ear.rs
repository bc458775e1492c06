//! EAR (Eye Aspect Ratio) 计算模块
//!
//! 基于标准 6 点眼部轮廓计算 EAR，用于判断眼睛的睁闭状态。
//! 公式: EAR = (|p1-p5| + |p2-p4|) / (2 * |p0-p3|)
//! - p0, p3: 眼角点（水平方向）
//! - p1, p2: 上眼睑点
//! - p4, p5: 下眼睑点
//!
//! 水平距离为 0 的退化轮廓不产生信号，而不是返回 inf/NaN。

use serde::{Deserialize, Serialize};

/// 标准眼部轮廓的点数
pub const CONTOUR_POINTS: usize = 6;

/// 水平距离低于此值视为退化轮廓
const MIN_HORIZONTAL: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }
}

impl From<[f64; 2]> for Point {
    fn from([x, y]: [f64; 2]) -> Self {
        Self::new(x, y)
    }
}

/// 单眼 6 点轮廓，点的顺序有意义
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EyeContour {
    points: [Point; CONTOUR_POINTS],
}

impl EyeContour {
    pub fn new(points: [Point; CONTOUR_POINTS]) -> Self {
        Self { points }
    }

    /// 从原始坐标构造；点数不是 6 时返回 `None`
    pub fn from_coords(coords: &[[f64; 2]]) -> Option<Self> {
        let points: [[f64; 2]; CONTOUR_POINTS] = coords.try_into().ok()?;
        Some(Self::new(points.map(Point::from)))
    }

    pub fn points(&self) -> &[Point; CONTOUR_POINTS] {
        &self.points
    }

    /// 眼角间距 |p0-p3|
    pub fn horizontal(&self) -> f64 {
        self.points[0].distance(&self.points[3])
    }
}

/// 计算单眼 EAR；退化轮廓返回 `None`
pub fn compute_ear(contour: &EyeContour) -> Option<f64> {
    let p = contour.points();
    let horizontal = contour.horizontal();
    if horizontal.is_nan() || horizontal <= MIN_HORIZONTAL {
        return None;
    }

    let vertical1 = p[1].distance(&p[5]);
    let vertical2 = p[2].distance(&p[4]);
    let ear = (vertical1 + vertical2) / (2.0 * horizontal);

    ear.is_finite().then_some(ear)
}

/// 保留两位小数，仅用于展示
pub fn round_display(ear: f64) -> f64 {
    (ear * 100.0).round() / 100.0
}

/// 双眼 EAR 结果
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BinocularEar {
    pub left: Option<f64>,
    pub right: Option<f64>,
}

impl BinocularEar {
    /// 双眼都有信号时取平均；只有一只眼有信号时直接使用该眼
    pub fn combined(&self) -> Option<f64> {
        match (self.left, self.right) {
            (Some(l), Some(r)) => Some((l + r) / 2.0),
            (Some(v), None) | (None, Some(v)) => Some(v),
            (None, None) => None,
        }
    }
}

pub fn binocular_ear(left: Option<&EyeContour>, right: Option<&EyeContour>) -> BinocularEar {
    BinocularEar {
        left: left.and_then(compute_ear),
        right: right.and_then(compute_ear),
    }
}
