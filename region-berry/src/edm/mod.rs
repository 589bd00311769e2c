//! 基于欧氏距离图 (EDM) 的分裂与合并.
//!
//! 分裂: 以 EDM 的局部极大值为种子, 在前景内做递减分水岭.
//! 合并: 界面取值为界面处 EDM 的中位数的倒数 (或以两区域内 EDM 局部极大值的
//! 中位数归一化), 取值小于分裂阈值的界面两端区域被合并.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::cluster::{
    build_interfaces, contract, Contraction, DivisionCriterion, EdmFusion, Interface,
    InterfaceValue,
};
use crate::consts::{EDM_LOCAL_MAX_MIN_VALUE, EDM_LOCAL_MAX_RADIUS, EDM_SEED_RADIUS};
use crate::data::{Connectivity, GridAttr, Mask, Neighbourhood, ScalarField};
use crate::error::{check_finite, check_shape, SegError, SegResult};
use crate::region::{median, RegionPopulation, RegionStatistic};
use crate::watershed::{filter_seeds, local_extrema, run_watershed, SeedSet, WatershedConfig};

mod distance;

pub use distance::distance_map;

/// EDM 界面取值.
///
/// 局部极大值图只在构造时计算一次.
#[derive(Debug, Clone)]
pub struct EdmInterfaceValue<'a> {
    edm: &'a ScalarField,
    local_max: Option<Mask>,
}

impl<'a> EdmInterfaceValue<'a> {
    /// 以 `edm` 为取值依据. `normalize` 为真时预先计算 EDM 的局部极大值,
    /// 只保留不小于 [`EDM_LOCAL_MAX_MIN_VALUE`] 的极大值.
    pub fn new(edm: &'a ScalarField, normalize: bool) -> SegResult<Self> {
        let local_max = if normalize {
            let nb = Neighbourhood::scaled(EDM_LOCAL_MAX_RADIUS, edm.calibration())?;
            let mut lm = local_extrema(edm, None, true, &nb)?;
            filter_seeds(&mut lm, edm, EDM_LOCAL_MAX_MIN_VALUE)?;
            Some(lm)
        } else {
            None
        };
        Ok(Self { edm, local_max })
    }

    /// 是否做归一化.
    #[inline]
    pub fn is_normalized(&self) -> bool {
        self.local_max.is_some()
    }

    /// 两个端点区域内, EDM 局部极大值的中位数. 不存在时为 1.
    fn norm(&self, lm: &Mask, interface: &Interface, population: &RegionPopulation) -> f64 {
        let (a, b) = interface.pair();
        let mut values: Vec<f64> = [a, b]
            .into_iter()
            .filter_map(|l| population.get(l))
            .flat_map(|r| r.voxels().iter())
            .filter(|p| lm[**p])
            .map(|p| self.edm[*p] as f64)
            .collect();
        median(&mut values).unwrap_or(1.0)
    }
}

impl InterfaceValue for EdmInterfaceValue<'_> {
    fn value(&self, interface: &Interface, population: &RegionPopulation) -> f64 {
        if interface.voxels().is_empty() {
            return f64::NAN;
        }
        let all = interface.voxels().iter().chain(interface.duplicated()).copied();
        let mut values = self.edm.values(all);
        let raw = median(&mut values).unwrap_or(f64::NAN);
        match &self.local_max {
            Some(lm) => self.norm(lm, interface, population) / raw,
            None => 1.0 / raw,
        }
    }
}

/// EDM 分裂合并配置.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SplitMergeConfig {
    /// 界面取值小于该阈值时允许合并.
    pub split_threshold: f64,
    /// 二级融合判据.
    pub criterion: DivisionCriterion,
    /// 是否以区域内 EDM 局部极大值归一化界面取值.
    pub normalize: bool,
    /// 建立界面所用的邻接关系.
    pub connectivity: Connectivity,
    /// 分裂种子 (EDM 局部极大值) 的水平滤波半径, 单位为体素.
    pub seed_radius: f64,
}

impl Default for SplitMergeConfig {
    fn default() -> Self {
        Self {
            split_threshold: 0.3,
            criterion: DivisionCriterion::None,
            normalize: false,
            connectivity: Connectivity::Six,
            seed_radius: EDM_SEED_RADIUS,
        }
    }
}

impl SplitMergeConfig {
    /// 设置分裂阈值.
    #[inline]
    pub fn with_threshold(mut self, split_threshold: f64) -> Self {
        self.split_threshold = split_threshold;
        self
    }

    /// 设置二级融合判据.
    #[inline]
    pub fn with_criterion(mut self, criterion: DivisionCriterion) -> Self {
        self.criterion = criterion;
        self
    }

    /// 设置是否归一化.
    #[inline]
    pub fn with_normalize(mut self, normalize: bool) -> Self {
        self.normalize = normalize;
        self
    }

    /// 设置界面邻接关系.
    #[inline]
    pub fn with_connectivity(mut self, connectivity: Connectivity) -> Self {
        self.connectivity = connectivity;
        self
    }

    /// 检查配置合法性.
    pub fn validate(&self) -> SegResult<()> {
        check_finite("split_threshold", self.split_threshold)?;
        self.criterion.validate()?;
        if !(self.seed_radius.is_finite() && self.seed_radius >= 0.0) {
            return Err(SegError::InvalidParameter(format!(
                "种子半径非法: {}",
                self.seed_radius
            )));
        }
        Ok(())
    }

    /// 对应的融合判据.
    #[inline]
    pub fn fusion(&self) -> EdmFusion {
        EdmFusion::new(self.split_threshold).with_criterion(self.criterion)
    }
}

/// EDM 分裂合并分割器.
#[derive(Debug, Clone)]
pub struct SplitAndMergeEdm<'a> {
    edm: &'a ScalarField,
    config: SplitMergeConfig,
    value: EdmInterfaceValue<'a>,
    foreground: Option<&'a Mask>,
}

impl<'a> SplitAndMergeEdm<'a> {
    /// 以 `edm` 为分水岭图与取值依据.
    pub fn new(edm: &'a ScalarField, config: SplitMergeConfig) -> SegResult<Self> {
        config.validate()?;
        Ok(Self {
            edm,
            config,
            value: EdmInterfaceValue::new(edm, config.normalize)?,
            foreground: None,
        })
    }

    /// 设置建立界面时所用的前景. 界面中位于前景之外的接触会令另一侧体素重复计数.
    pub fn with_foreground(mut self, foreground: &'a Mask) -> SegResult<Self> {
        check_shape(self.edm.shape(), foreground.shape())?;
        self.foreground = Some(foreground);
        Ok(self)
    }

    /// 当前配置.
    #[inline]
    pub fn config(&self) -> &SplitMergeConfig {
        &self.config
    }

    /// 修改分裂阈值.
    pub fn set_threshold(&mut self, split_threshold: f64) -> SegResult<()> {
        check_finite("split_threshold", split_threshold)?;
        self.config.split_threshold = split_threshold;
        Ok(())
    }

    /// 修改二级融合判据.
    pub fn set_division_criterion(&mut self, criterion: DivisionCriterion) -> SegResult<()> {
        criterion.validate()?;
        self.config.criterion = criterion;
        Ok(())
    }

    /// 以 EDM 局部极大值为种子, 在 `mask` 内做递减分水岭.
    pub fn split(&self, mask: &Mask) -> SegResult<RegionPopulation> {
        check_shape(self.edm.shape(), mask.shape())?;
        let nb = Neighbourhood::scaled(self.config.seed_radius, self.edm.calibration())?;
        let seeds = local_extrema(self.edm, Some(mask), true, &nb)?;
        run_watershed(
            self.edm,
            mask,
            SeedSet::Mask(&seeds),
            &WatershedConfig::default(),
        )
    }

    /// 建立界面并收缩. 二级判据为 `Dy` 或 `DivMap` 时必须提供 `aux`.
    pub fn merge(
        &self,
        population: RegionPopulation,
        aux: Option<&dyn RegionStatistic>,
    ) -> SegResult<Contraction> {
        check_shape(self.edm.shape(), population.shape())?;
        let interfaces = build_interfaces(&population, self.config.connectivity, self.foreground)?;
        contract(population, interfaces, &self.value, &self.config.fusion(), aux)
    }

    /// 先分裂后合并.
    pub fn split_and_merge(
        &self,
        mask: &Mask,
        aux: Option<&dyn RegionStatistic>,
    ) -> SegResult<Contraction> {
        // 配置错误应在分水岭之前发现.
        if let (true, None) = (self.config.criterion.needs_statistic(), aux) {
            return Err(SegError::MissingStatistic(self.config.criterion.name()));
        }
        let population = self.split(mask)?;
        self.merge(population, aux)
    }

    /// 将每个界面的取值画在其主接触体素上, 其余体素为 0.
    ///
    /// 多个界面共享体素时, 规范端点顺序靠后的界面覆盖靠前的.
    pub fn interface_value_map(&self, population: &RegionPopulation) -> SegResult<ScalarField> {
        check_shape(self.edm.shape(), population.shape())?;
        let interfaces = build_interfaces(population, self.config.connectivity, self.foreground)?;
        let mut out = ScalarField::zeros(population.shape(), self.edm.calibration());
        for iface in interfaces.iter() {
            let v = self.value.value(iface, population) as f32;
            for p in iface.voxels() {
                out[*p] = v;
            }
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Calibration;
    use crate::region::MedianOfMap;

    /// 两个半径为 `r` 的球, 球心相距 `gap`, 沿 w 方向排列.
    fn two_balls(r: f64, gap: usize) -> Mask {
        let ri = r.ceil() as usize;
        let shape = (2 * ri + 3, 2 * ri + 3, 2 * ri + gap + 3);
        let c0 = (ri + 1, ri + 1, ri + 1);
        let c1 = (ri + 1, ri + 1, ri + 1 + gap);
        Mask::from_fn(shape, Calibration::unit(), |p| {
            let d2 = |c: (usize, usize, usize)| {
                (p.0.abs_diff(c.0).pow(2) + p.1.abs_diff(c.1).pow(2) + p.2.abs_diff(c.2).pow(2))
                    as f64
            };
            d2(c0) <= r * r || d2(c1) <= r * r
        })
    }

    #[test]
    fn test_interface_value() {
        let edm = ScalarField::from_fn((1, 1, 4), Calibration::unit(), |(_, _, w)| (w + 1) as f32);
        let labels = ndarray::array![[[1, 1, 2, 2]]];
        let pop = RegionPopulation::from_label_map(labels.view(), Calibration::unit());
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        let iface = set.get(1, 2).unwrap();

        // 界面体素 w = 1, 2, EDM 为 2 和 3, 中位数 2.5.
        let plain = EdmInterfaceValue::new(&edm, false).unwrap();
        assert_eq!(plain.value(iface, &pop), 1.0 / 2.5);

        // 唯一的正局部极大值是 w = 3 (EDM 4).
        let norm = EdmInterfaceValue::new(&edm, true).unwrap();
        assert!(norm.is_normalized());
        assert_eq!(norm.value(iface, &pop), 4.0 / 2.5);

        let empty = Interface::new(1, 2);
        assert!(plain.value(&empty, &pop).is_nan());
    }

    #[test]
    fn test_shallow_maxima_are_not_normalizers() {
        // 唯一的局部极大值 (w = 0, EDM 0.4) 低于下限, 归一化退化为 1.
        let edm = ScalarField::from_fn((1, 1, 4), Calibration::unit(), |(_, _, w)| {
            0.1 * (4 - w) as f32
        });
        let labels = ndarray::array![[[1, 1, 2, 2]]];
        let pop = RegionPopulation::from_label_map(labels.view(), Calibration::unit());
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        let iface = set.get(1, 2).unwrap();

        let plain = EdmInterfaceValue::new(&edm, false).unwrap();
        let norm = EdmInterfaceValue::new(&edm, true).unwrap();
        assert_eq!(norm.value(iface, &pop), plain.value(iface, &pop));

        // 提高整体 EDM 后极大值参与归一化.
        let deep = ScalarField::from_fn((1, 1, 4), Calibration::unit(), |p| edm[p] + 1.0);
        let norm = EdmInterfaceValue::new(&deep, true).unwrap();
        let plain = EdmInterfaceValue::new(&deep, false).unwrap();
        assert!((norm.value(iface, &pop) - deep[(0, 0, 0)] as f64 * plain.value(iface, &pop)).abs() < 1e-9);
    }

    #[test]
    fn test_split_and_merge_touching_balls() {
        let mask = two_balls(4.0, 6);
        let edm = distance_map(&mask);
        let sm = SplitAndMergeEdm::new(&edm, SplitMergeConfig::default().with_threshold(0.3)).unwrap();

        let split = sm.split(&mask).unwrap();
        assert!(split.len() >= 2);
        assert!(split.is_partition(Some(&mask)));
        assert_eq!(split.total_voxels(), mask.count());

        // 颈部较细 (EDM 约 2), 1 / 2 > 0.3, 两个球保持分离.
        let out = sm.merge(split.clone(), None).unwrap();
        assert_eq!(out.population.len(), 2);
        assert_eq!(out.population.total_voxels(), mask.count());

        // 阈值放宽后全部合并.
        let mut sm = sm;
        sm.set_threshold(10.0).unwrap();
        let out = sm.split_and_merge(&mask, None).unwrap();
        assert_eq!(out.population.len(), 1);
        assert_eq!(out.fusions.len(), split.len() - 1);
    }

    #[test]
    fn test_criterion_requires_statistic() {
        let mask = two_balls(3.0, 5);
        let edm = distance_map(&mask);
        let mut sm = SplitAndMergeEdm::new(&edm, SplitMergeConfig::default()).unwrap();
        sm.set_division_criterion(DivisionCriterion::DivMap { threshold: 1.0 })
            .unwrap();
        assert_eq!(
            sm.split_and_merge(&mask, None).unwrap_err(),
            SegError::MissingStatistic("DivMap")
        );
        let stat = MedianOfMap::new(&edm);
        assert!(sm.split_and_merge(&mask, Some(&stat)).is_ok());
        assert!(sm.set_threshold(f64::NAN).is_err());
        assert!(SplitAndMergeEdm::new(&edm, SplitMergeConfig::default().with_threshold(f64::INFINITY)).is_err());
    }

    #[test]
    fn test_interface_value_map() {
        let edm = ScalarField::from_fn((1, 1, 4), Calibration::unit(), |(_, _, w)| (w + 1) as f32);
        let labels = ndarray::array![[[1, 1, 2, 2]]];
        let pop = RegionPopulation::from_label_map(labels.view(), Calibration::unit());
        let sm = SplitAndMergeEdm::new(&edm, SplitMergeConfig::default()).unwrap();
        let map = sm.interface_value_map(&pop).unwrap();
        assert_eq!(map[(0, 0, 0)], 0.0);
        assert_eq!(map[(0, 0, 1)], 0.4);
        assert_eq!(map[(0, 0, 2)], 0.4);
        assert_eq!(map[(0, 0, 3)], 0.0);
    }
}
