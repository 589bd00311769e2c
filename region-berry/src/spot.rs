//! 斑点分割.
//!
//! 输入为预先计算好的径向对称变换图和平滑强度图. 种子为径向对称图在前景内的
//! 局部极大值 (圆柱邻域), 并按两个阈值筛选; 随后在径向对称图上做带阈值传播的
//! 递减分水岭. 每个斑点的中心为径向对称图加权的质心, 质量为中心处
//! `sqrt(对称值 * 平滑强度)`. 最后移除扁平区域和过小的斑点.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::consts::{SPOT_SEED_RADIUS_XY, SPOT_SEED_RADIUS_Z};
use crate::data::{GridAttr, Mask, Neighbourhood, ScalarField};
use crate::error::{check_finite, check_shape, SegResult};
use crate::region::{Point3d, PopulationFilter, Region, RegionPopulation};
use crate::watershed::{
    filter_seeds, local_extrema, run_watershed, PropagationCriterion, SeedSet, WatershedConfig,
};
use crate::Idx3d;

/// 斑点分割参数.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SpotConfig {
    /// 小于该体素数的斑点被移除.
    pub min_spot_size: usize,
    /// 种子处径向对称值的下限.
    pub seed_threshold: f64,
    /// 分水岭传播所需的径向对称值下限.
    pub propagation_threshold: f64,
    /// 种子处平滑强度的下限.
    pub intensity_threshold: f64,
}

impl Default for SpotConfig {
    fn default() -> Self {
        Self {
            min_spot_size: 5,
            seed_threshold: 0.3,
            propagation_threshold: 0.2,
            intensity_threshold: 1.2,
        }
    }
}

impl SpotConfig {
    /// 检查阈值是否为有限值.
    pub fn validate(&self) -> SegResult<()> {
        check_finite("seed_threshold", self.seed_threshold)?;
        check_finite("propagation_threshold", self.propagation_threshold)?;
        check_finite("intensity_threshold", self.intensity_threshold)
    }
}

/// 一个斑点.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Spot {
    /// 区域标签.
    pub label: u32,
    /// `[z, y, x]` 中心, 单位为体素.
    pub center: Point3d,
    /// 质量评分.
    pub quality: f64,
}

/// 斑点分割结果.
#[derive(Debug, Clone)]
pub struct SpotSegmentation {
    /// 保留下来的斑点区域.
    pub population: RegionPopulation,
    /// 与 `population` 中区域按标签一一对应的斑点.
    pub spots: Vec<Spot>,
}

/// 在 `mask` 内分割斑点.
pub fn segment_spots(
    symmetry: &ScalarField,
    smooth: &ScalarField,
    mask: &Mask,
    config: &SpotConfig,
) -> SegResult<SpotSegmentation> {
    config.validate()?;
    check_shape(symmetry.shape(), smooth.shape())?;
    check_shape(symmetry.shape(), mask.shape())?;

    let nb = Neighbourhood::cylinder(SPOT_SEED_RADIUS_XY, SPOT_SEED_RADIUS_Z)?;
    let mut seeds = local_extrema(symmetry, Some(mask), true, &nb)?;
    let by_intensity = filter_seeds(&mut seeds, smooth, config.intensity_threshold)?;
    let by_symmetry = filter_seeds(&mut seeds, symmetry, config.seed_threshold)?;
    log::debug!(
        "斑点种子: 保留 {}, 强度不足 {by_intensity}, 对称值不足 {by_symmetry}",
        seeds.count()
    );

    let ws = WatershedConfig::default()
        .with_propagation(PropagationCriterion::Threshold(config.propagation_threshold));
    let population = run_watershed(symmetry, mask, SeedSet::Mask(&seeds), &ws)?
        .filter(&PopulationFilter::RemoveFlatObjects)
        .filter(&PopulationFilter::Size {
            min: config.min_spot_size,
            max: None,
        });

    Ok(with_spots(population, symmetry, smooth))
}

/// 以给定的种子点分割斑点, 第 `i` 个种子得到标签 `i + 1`.
///
/// 不做种子阈值筛选和区域过滤, 其余与 [`segment_spots`] 相同.
pub fn segment_spots_from_seeds(
    symmetry: &ScalarField,
    smooth: &ScalarField,
    mask: &Mask,
    seeds: &[Idx3d],
    config: &SpotConfig,
) -> SegResult<SpotSegmentation> {
    config.validate()?;
    check_shape(symmetry.shape(), smooth.shape())?;

    let seeds: Vec<_> = seeds.iter().copied().zip(1..).collect();
    let ws = WatershedConfig::default()
        .with_propagation(PropagationCriterion::Threshold(config.propagation_threshold));
    let population = run_watershed(symmetry, mask, SeedSet::Points(&seeds), &ws)?;
    Ok(with_spots(population, symmetry, smooth))
}

fn with_spots(population: RegionPopulation, symmetry: &ScalarField, smooth: &ScalarField) -> SpotSegmentation {
    let spots = population
        .regions()
        .map(|r| spot_of(r, symmetry, smooth))
        .collect();
    SpotSegmentation { population, spots }
}

fn spot_of(region: &Region, symmetry: &ScalarField, smooth: &ScalarField) -> Spot {
    let center = region.mass_center(symmetry);
    let at = nearest_voxel(center, symmetry.shape());
    let product = symmetry[at] as f64 * smooth[at] as f64;
    Spot {
        label: region.label(),
        center,
        quality: product.max(0.0).sqrt(),
    }
}

/// 最近的网格体素, 截断到网格范围内.
fn nearest_voxel(p: Point3d, (z, h, w): Idx3d) -> Idx3d {
    let clamp = |v: f64, n: usize| (v.round().max(0.0) as usize).min(n - 1);
    (clamp(p[0], z), clamp(p[1], h), clamp(p[2], w))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Calibration;

    /// 在 (0, 5, 5) 和 (0, 5, 14) 各放一个高斯斑点, 幅值分别为 `a0` 和 `a1`.
    fn maps(a0: f32, a1: f32) -> (ScalarField, ScalarField, Mask) {
        let shape = (1, 11, 20);
        let blob = |(_, h, w): Idx3d| {
            let g = |ch: f32, cw: f32, a: f32| {
                let d2 = (h as f32 - ch).powi(2) + (w as f32 - cw).powi(2);
                a * (-d2 / 4.0).exp()
            };
            g(5.0, 5.0, a0) + g(5.0, 14.0, a1)
        };
        let sym = ScalarField::from_fn(shape, Calibration::unit(), blob);
        let smooth = ScalarField::from_fn(shape, Calibration::unit(), |p| 2.0 * blob(p));
        let mask = Mask::filled(shape, Calibration::unit(), true);
        (sym, smooth, mask)
    }

    #[test]
    fn test_two_spots() {
        let (sym, smooth, mask) = maps(1.0, 1.0);
        let out = segment_spots(&sym, &smooth, &mask, &SpotConfig::default()).unwrap();
        assert_eq!(out.spots.len(), 2);
        assert!(out.population.is_partition(Some(&mask)));

        let s = out.spots[0];
        // 另一个斑点的尾部让质心略微偏向 w 方向.
        assert!((s.center[1] - 5.0).abs() < 1e-4);
        assert!((s.center[2] - 5.0).abs() < 1e-4);
        // sqrt(1 * 2).
        assert!((s.quality - 2f64.sqrt()).abs() < 1e-6);
        // 传播阈值 0.2: exp(-d2 / 4) >= 0.2 即 d2 <= 6.43.
        assert_eq!(out.population.get(s.label).unwrap().size(), 21);
    }

    #[test]
    fn test_seed_thresholds() {
        // 第二个斑点太弱.
        let (sym, smooth, mask) = maps(1.0, 0.25);
        let out = segment_spots(&sym, &smooth, &mask, &SpotConfig::default()).unwrap();
        assert_eq!(out.spots.len(), 1);

        // 种子阈值高于两个斑点.
        let cfg = SpotConfig {
            seed_threshold: 1.5,
            ..SpotConfig::default()
        };
        let out = segment_spots(&sym, &smooth, &mask, &cfg).unwrap();
        assert!(out.spots.is_empty());
        assert!(out.population.is_empty());

        // 尺寸下限.
        let cfg = SpotConfig {
            min_spot_size: 22,
            ..SpotConfig::default()
        };
        assert!(segment_spots(&sym, &smooth, &mask, &cfg).unwrap().spots.is_empty());

        let bad = SpotConfig {
            intensity_threshold: f64::NAN,
            ..SpotConfig::default()
        };
        assert!(segment_spots(&sym, &smooth, &mask, &bad).is_err());
    }

    #[test]
    fn test_spots_from_seeds() {
        // 较弱的斑点不经过种子阈值, 仍然被分割.
        let (sym, smooth, mask) = maps(1.0, 0.25);
        let cfg = SpotConfig::default();
        let out = segment_spots_from_seeds(&sym, &smooth, &mask, &[(0, 5, 5), (0, 5, 14)], &cfg).unwrap();
        assert_eq!(out.spots.len(), 2);
        assert_eq!(out.spots[1].label, 2);
        assert!((out.spots[1].center[2] - 14.0).abs() < 0.5);

        let (sym, smooth, mask) = maps(1.0, 1.0);
        let out = segment_spots_from_seeds(&sym, &smooth, &mask, &[(0, 5, 5)], &cfg).unwrap();
        assert_eq!(out.spots.len(), 1);
        assert_eq!(out.population.get(1).unwrap().size(), 21);

        assert!(matches!(
            segment_spots_from_seeds(&sym, &smooth, &mask, &[(0, 11, 0)], &cfg),
            Err(crate::error::SegError::SeedOutOfBound(_))
        ));
    }

    #[test]
    fn test_nearest_voxel() {
        assert_eq!(nearest_voxel([-0.4, 2.6, 9.0], (1, 3, 5)), (0, 2, 4));
    }
}
