//! 配置错误.
//!
//! 不变量被破坏 (例如两个区域共享同一体素) 属于程序错误, 会直接 panic,
//! 不会出现在这里.

use crate::Idx3d;
use thiserror::Error;

/// 分割核心在调用时即可发现的配置错误.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SegError {
    /// 标量场、掩膜、种子掩膜之间的网格形状不一致.
    #[error("网格形状不一致: 期望 {expected:?}, 实际 {actual:?}")]
    ShapeMismatch {
        /// 参照网格的形状 `(z, h, w)`.
        expected: Idx3d,
        /// 出错网格的形状 `(z, h, w)`.
        actual: Idx3d,
    },

    /// 阈值或系数不是有限值.
    #[error("非法阈值 `{name}`: {value}")]
    InvalidThreshold {
        /// 参数名.
        name: &'static str,
        /// 实际值.
        value: f64,
    },

    /// 体素分辨率必须是正的有限值.
    #[error("非法体素分辨率: xy = {xy_mm} mm, z = {z_mm} mm")]
    InvalidCalibration {
        /// 水平方向分辨率.
        xy_mm: f64,
        /// 切片方向分辨率.
        z_mm: f64,
    },

    /// 显式种子坐标越界.
    #[error("种子越界: {0:?}")]
    SeedOutOfBound(Idx3d),

    /// 显式种子的标签为背景标签 0.
    #[error("种子 {pos:?} 的标签非法: {label}")]
    InvalidSeedLabel {
        /// 种子坐标.
        pos: Idx3d,
        /// 种子标签.
        label: u32,
    },

    /// 融合判据需要区域辅助统计量, 但调用者没有提供.
    #[error("融合判据 `{0}` 需要区域辅助统计量")]
    MissingStatistic(&'static str),

    /// 其它非法参数.
    #[error("非法参数: {0}")]
    InvalidParameter(String),
}

/// 分割核心的返回值类型.
pub type SegResult<T> = Result<T, SegError>;

/// 检查 `value` 是否为有限值.
#[inline]
pub(crate) fn check_finite(name: &'static str, value: f64) -> SegResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(SegError::InvalidThreshold { name, value })
    }
}

/// 检查两个网格形状是否一致.
#[inline]
pub(crate) fn check_shape(expected: Idx3d, actual: Idx3d) -> SegResult<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(SegError::ShapeMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_check_finite() {
        assert!(check_finite("t", 0.5).is_ok());
        assert_eq!(
            check_finite("t", f64::NAN).unwrap_err().to_string(),
            "非法阈值 `t`: NaN"
        );
        assert!(check_finite("t", f64::INFINITY).is_err());
    }

    #[test]
    fn test_check_shape() {
        assert!(check_shape((1, 2, 3), (1, 2, 3)).is_ok());
        assert_eq!(
            check_shape((1, 2, 3), (1, 3, 2)),
            Err(SegError::ShapeMismatch {
                expected: (1, 2, 3),
                actual: (1, 3, 2)
            })
        );
    }
}
