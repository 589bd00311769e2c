//! 融合判据.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Interface;
use crate::consts::{DEFAULT_DY_FACTOR, TINY_BRIDGE_MAX_CONTACTS, TINY_BRIDGE_MIN_REGION_SIZE};
use crate::error::{check_finite, SegResult};
use crate::region::Region;

/// 一次融合判定所需的全部信息.
#[derive(Copy, Clone, Debug)]
pub struct FusionCandidate<'a> {
    /// 待判定的界面.
    pub interface: &'a Interface,
    /// 标签较小的端点区域.
    pub first: &'a Region,
    /// 标签较大的端点区域.
    pub second: &'a Region,
    /// `first` 的辅助统计量 (若有).
    pub first_aux: Option<f64>,
    /// `second` 的辅助统计量 (若有).
    pub second_aux: Option<f64>,
}

impl FusionCandidate<'_> {
    /// 两个端点中较小区域的体素数.
    #[inline]
    pub fn min_size(&self) -> usize {
        self.first.size().min(self.second.size())
    }
}

/// 是否接受一次融合.
pub trait FusionCheck {
    /// 判定 `candidate` 的两个区域能否融合.
    fn check_fusion(&self, candidate: &FusionCandidate<'_>) -> bool;

    /// 若判定需要区域辅助统计量, 返回判据名称.
    fn needs_statistic(&self) -> Option<&'static str> {
        None
    }
}

impl<F> FusionCheck for F
where
    F: Fn(&FusionCandidate<'_>) -> bool,
{
    #[inline]
    fn check_fusion(&self, candidate: &FusionCandidate<'_>) -> bool {
        self(candidate)
    }
}

/// 二级融合判据.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DivisionCriterion {
    /// 不附加条件.
    #[default]
    None,

    /// 两区域辅助统计量之差必须小于 `factor` 乘以几何中心的 y 方向距离.
    Dy {
        /// 比例系数.
        factor: f64,
    },

    /// 两区域辅助统计量都必须小于 `threshold`.
    DivMap {
        /// 统计量上限.
        threshold: f64,
    },
}

impl DivisionCriterion {
    /// 使用 [`DEFAULT_DY_FACTOR`] 的 `Dy` 判据.
    #[inline]
    pub const fn dy() -> Self {
        Self::Dy {
            factor: DEFAULT_DY_FACTOR,
        }
    }

    /// 判据名称.
    pub fn name(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Dy { .. } => "Dy",
            Self::DivMap { .. } => "DivMap",
        }
    }

    /// 是否需要区域辅助统计量.
    #[inline]
    pub fn needs_statistic(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// 检查参数是否为有限值.
    pub fn validate(&self) -> SegResult<()> {
        match *self {
            Self::None => Ok(()),
            Self::Dy { factor } => check_finite("factor", factor),
            Self::DivMap { threshold } => check_finite("threshold", threshold),
        }
    }

    /// 判定是否满足. 缺少辅助统计量时视为不满足.
    pub fn passes(&self, c: &FusionCandidate<'_>) -> bool {
        let aux = c.first_aux.zip(c.second_aux);
        match *self {
            Self::None => true,
            Self::Dy { factor } => aux.map_or(false, |(a, b)| {
                let dy = (c.first.geom_center()[1] - c.second.geom_center()[1]).abs();
                (a - b).abs() < factor * dy
            }),
            Self::DivMap { threshold } => aux.map_or(false, |(a, b)| a < threshold && b < threshold),
        }
    }
}

/// 基于 EDM 的融合判据.
///
/// 接触体素不超过 [`TINY_BRIDGE_MAX_CONTACTS`] 且两区域都大于
/// [`TINY_BRIDGE_MIN_REGION_SIZE`] 时拒绝 (细桥保护). 否则要求界面取值小于
/// `split_threshold` 且满足二级判据.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EdmFusion {
    /// 分裂阈值.
    pub split_threshold: f64,
    /// 二级判据.
    pub criterion: DivisionCriterion,
}

impl EdmFusion {
    /// 不附加二级判据.
    #[inline]
    pub fn new(split_threshold: f64) -> Self {
        Self {
            split_threshold,
            criterion: DivisionCriterion::None,
        }
    }

    /// 设置二级判据.
    #[inline]
    pub fn with_criterion(mut self, criterion: DivisionCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// 检查参数.
    pub fn validate(&self) -> SegResult<()> {
        check_finite("split_threshold", self.split_threshold)?;
        self.criterion.validate()
    }
}

impl FusionCheck for EdmFusion {
    fn check_fusion(&self, c: &FusionCandidate<'_>) -> bool {
        if c.interface.contact_count() <= TINY_BRIDGE_MAX_CONTACTS
            && c.min_size() > TINY_BRIDGE_MIN_REGION_SIZE
        {
            return false;
        }
        c.interface.value() < self.split_threshold && self.criterion.passes(c)
    }

    fn needs_statistic(&self) -> Option<&'static str> {
        self.criterion
            .needs_statistic()
            .then(|| self.criterion.name())
    }
}
