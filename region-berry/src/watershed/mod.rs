//! 种子分水岭.
//!
//! 以标量图为优先级, 从种子出发在前景掩膜内泛洪, 得到初始区域划分.
//! `decreasing = true` 时先处理取值最大的体素 (例如 EDM), 否则先处理最小的.
//! 取值相同的体素按发现顺序先进先出.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::data::{Connectivity, GridAttr, Mask, ScalarField};
use crate::error::{check_finite, check_shape, SegError, SegResult};
use crate::region::RegionPopulation;
use crate::Idx3d;

mod flood;
pub mod seeds;

pub use seeds::{filter_seeds, local_extrema, seed_components};

/// 泛洪传播判据.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PropagationCriterion {
    /// 总是传播.
    #[default]
    Unbounded,

    /// 递减传播时要求邻居取值 `>= t`, 递增传播时要求 `<= t`.
    Threshold(f64),
}

impl PropagationCriterion {
    /// 取值为 `value` 的邻居能否被当前区域占据.
    #[inline]
    pub fn allows(&self, value: f32, decreasing: bool) -> bool {
        match *self {
            Self::Unbounded => true,
            Self::Threshold(t) if decreasing => value as f64 >= t,
            Self::Threshold(t) => value as f64 <= t,
        }
    }
}

/// 分水岭配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct WatershedConfig {
    /// 是否先处理取值较大的体素.
    pub decreasing: bool,
    /// 传播判据.
    pub propagation: PropagationCriterion,
    /// 泛洪与种子分量所用的邻接关系.
    pub connectivity: Connectivity,
}

impl Default for WatershedConfig {
    fn default() -> Self {
        Self {
            decreasing: true,
            propagation: PropagationCriterion::Unbounded,
            connectivity: Connectivity::TwentySix,
        }
    }
}

impl WatershedConfig {
    /// 设置泛洪方向.
    #[inline]
    pub fn with_decreasing(mut self, decreasing: bool) -> Self {
        self.decreasing = decreasing;
        self
    }

    /// 设置传播判据.
    #[inline]
    pub fn with_propagation(mut self, propagation: PropagationCriterion) -> Self {
        self.propagation = propagation;
        self
    }

    /// 设置邻接关系.
    #[inline]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// 检查配置合法性.
    pub fn validate(&self) -> SegResult<()> {
        match self.propagation {
            PropagationCriterion::Threshold(t) => check_finite("propagation", t),
            PropagationCriterion::Unbounded => Ok(()),
        }
    }
}

/// 分水岭种子.
#[derive(Copy, Clone, Debug)]
pub enum SeedSet<'a> {
    /// 显式给出的 `(坐标, 标签)` 列表. 标签必须非 0.
    Points(&'a [(Idx3d, u32)]),

    /// 种子掩膜. 每个连通分量成为一个区域, 标签按分量首个体素的行优先序为 `1..=n`.
    Mask(&'a Mask),
}

/// 在 `mask` 内以 `map` 为优先级运行种子分水岭.
///
/// 位于前景之外的种子会被丢弃. 种子为空或前景为空时返回空集合.
pub fn run_watershed(
    map: &ScalarField,
    mask: &Mask,
    seeds: SeedSet<'_>,
    config: &WatershedConfig,
) -> SegResult<RegionPopulation> {
    config.validate()?;
    check_shape(map.shape(), mask.shape())?;

    let resolved = match seeds {
        SeedSet::Points(points) => {
            for &(pos, label) in points {
                if !map.check(&pos) {
                    return Err(SegError::SeedOutOfBound(pos));
                }
                if label == crate::consts::BACKGROUND_LABEL {
                    return Err(SegError::InvalidSeedLabel { pos, label });
                }
            }
            points.to_vec()
        }
        SeedSet::Mask(m) => {
            check_shape(map.shape(), m.shape())?;
            seed_components(m, config.connectivity)
        }
    };

    let before = resolved.len();
    let resolved: Vec<_> = resolved.into_iter().filter(|s| mask[s.0]).collect();
    if resolved.len() < before {
        log::warn!("丢弃 {} 个位于前景之外的种子", before - resolved.len());
    }

    let labels = flood::flood(map, mask, &resolved, config);
    let ans = RegionPopulation::from_label_map(labels.view(), map.calibration());
    log::debug!(
        "分水岭: {} 个种子体素, {} 个区域, 覆盖 {} / {} 个前景体素",
        resolved.len(),
        ans.len(),
        ans.total_voxels(),
        mask.count()
    );
    Ok(ans)
}
