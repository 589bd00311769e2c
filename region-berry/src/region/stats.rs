//! 区域统计量.

use std::cmp::Ordering;

use num::Float;

use super::Region;
use crate::data::ScalarField;

/// 中位数. 偶数个元素时取中间两个值的平均. `values` 会被原地排序.
///
/// `values` 为空时返回 `None`.
pub fn median<T: Float>(values: &mut [T]) -> Option<T> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
    let n = values.len();
    let mid = n / 2;
    if n % 2 == 1 {
        Some(values[mid])
    } else {
        let two = T::one() + T::one();
        Some((values[mid - 1] + values[mid]) / two)
    }
}

/// 区域辅助统计量, 例如区域内次级图的中位数.
///
/// 融合判据 `Dy` 与 `DivMap` 依赖它. 统计量会在多个帧之间只读共享, 因此要求 `Sync`.
pub trait RegionStatistic: Sync {
    /// 计算 `region` 的统计值.
    fn evaluate(&self, region: &Region) -> f64;
}

impl<F> RegionStatistic for F
where
    F: Fn(&Region) -> f64 + Sync,
{
    #[inline]
    fn evaluate(&self, region: &Region) -> f64 {
        self(region)
    }
}

/// 区域内某标量场的中位数.
#[derive(Copy, Clone, Debug)]
pub struct MedianOfMap<'a> {
    map: &'a ScalarField,
}

impl<'a> MedianOfMap<'a> {
    /// 以 `map` 为统计对象.
    #[inline]
    pub fn new(map: &'a ScalarField) -> Self {
        Self { map }
    }
}

impl RegionStatistic for MedianOfMap<'_> {
    fn evaluate(&self, region: &Region) -> f64 {
        let mut values = self.map.values(region.voxels().iter().copied());
        median(&mut values).unwrap_or(f64::NAN)
    }
}
