//! 区域: 带标签的互斥体素集合.
//!
//! 区域由分水岭或融合产生, 只由聚类引擎修改. 几何概要 (包围盒, 几何中心)
//! 在首次访问时惰性计算, 体素集合发生变化后自动失效.

use std::collections::BTreeSet;

use once_cell::sync::OnceCell;

use crate::data::{GridAttr, ScalarField};
use crate::Idx3d;

mod filter;
mod population;
mod stats;

pub use filter::PopulationFilter;
pub use population::RegionPopulation;
pub use stats::{median, MedianOfMap, RegionStatistic};

/// `[z, y, x]` 顺序的实数坐标, 单位为体素.
pub type Point3d = [f64; 3];

/// 闭区间包围盒.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BoundingBox {
    /// 各维度的最小下标.
    pub min: Idx3d,
    /// 各维度的最大下标 (含).
    pub max: Idx3d,
}

impl BoundingBox {
    /// 各维度的跨度 (体素个数).
    #[inline]
    pub fn extent(&self) -> Idx3d {
        (
            self.max.0 - self.min.0 + 1,
            self.max.1 - self.min.1 + 1,
            self.max.2 - self.min.2 + 1,
        )
    }

    /// `pos` 是否落在包围盒内.
    #[inline]
    pub fn contains(&self, pos: &Idx3d) -> bool {
        (self.min.0..=self.max.0).contains(&pos.0)
            && (self.min.1..=self.max.1).contains(&pos.1)
            && (self.min.2..=self.max.2).contains(&pos.2)
    }
}

/// 分割区域.
///
/// 体素按 `(z, h, w)` 字典序有序存储, 因此遍历顺序与行优先序一致.
#[derive(Debug, Clone)]
pub struct Region {
    label: u32,
    voxels: BTreeSet<Idx3d>,
    bounds: OnceCell<BoundingBox>,
    geom_center: OnceCell<Point3d>,
}

impl PartialEq for Region {
    fn eq(&self, other: &Self) -> bool {
        self.label == other.label && self.voxels == other.voxels
    }
}

impl Eq for Region {}

impl Region {
    /// 由标签和体素集合创建区域.
    ///
    /// # 注意
    ///
    /// `voxels` 为空或 `label` 为背景标签时, 程序 panic.
    pub fn new(label: u32, voxels: BTreeSet<Idx3d>) -> Self {
        assert_ne!(label, crate::consts::BACKGROUND_LABEL, "区域标签不能为 0");
        assert!(!voxels.is_empty(), "区域 {label} 不含体素");
        Self {
            label,
            voxels,
            bounds: OnceCell::new(),
            geom_center: OnceCell::new(),
        }
    }

    /// 区域标签.
    #[inline]
    pub fn label(&self) -> u32 {
        self.label
    }

    /// 体素个数.
    #[inline]
    pub fn size(&self) -> usize {
        self.voxels.len()
    }

    /// 有序体素集合.
    #[inline]
    pub fn voxels(&self) -> &BTreeSet<Idx3d> {
        &self.voxels
    }

    /// 行优先序下的第一个体素.
    #[inline]
    pub fn first_voxel(&self) -> Idx3d {
        // 构造时保证非空.
        *self.voxels.first().unwrap_or(&(0, 0, 0))
    }

    /// 体素是否属于该区域.
    #[inline]
    pub fn contains(&self, pos: &Idx3d) -> bool {
        self.voxels.contains(pos)
    }

    /// 包围盒.
    pub fn bounds(&self) -> BoundingBox {
        *self.bounds.get_or_init(|| {
            let first = self.first_voxel();
            let init = BoundingBox {
                min: first,
                max: first,
            };
            self.voxels.iter().fold(init, |mut b, &(z, h, w)| {
                b.min = (b.min.0.min(z), b.min.1.min(h), b.min.2.min(w));
                b.max = (b.max.0.max(z), b.max.1.max(h), b.max.2.max(w));
                b
            })
        })
    }

    /// 几何中心 `[z, y, x]`, 即全部体素坐标的平均值.
    pub fn geom_center(&self) -> Point3d {
        *self.geom_center.get_or_init(|| {
            let n = self.size() as f64;
            let sum = self.voxels.iter().fold([0.0; 3], |mut acc, &(z, h, w)| {
                acc[0] += z as f64;
                acc[1] += h as f64;
                acc[2] += w as f64;
                acc
            });
            sum.map(|v| v / n)
        })
    }

    /// 以 `map` 为权重的质心 `[z, y, x]`.
    ///
    /// 权重总和不为正时退化为几何中心.
    pub fn mass_center(&self, map: &ScalarField) -> Point3d {
        debug_assert!(self.voxels.iter().all(|p| map.check(p)));
        let mut total = 0.0;
        let mut acc = [0.0; 3];
        for &(z, h, w) in self.voxels.iter() {
            let m = map[(z, h, w)] as f64;
            total += m;
            acc[0] += m * z as f64;
            acc[1] += m * h as f64;
            acc[2] += m * w as f64;
        }
        if total > 0.0 {
            acc.map(|v| v / total)
        } else {
            self.geom_center()
        }
    }

    /// 将 `other` 的全部体素并入自身. 两者必须不相交.
    pub(crate) fn absorb(&mut self, other: Region) {
        let before = self.size() + other.size();
        self.voxels.extend(other.voxels);
        assert_eq!(before, self.size(), "区域 {} 与 {} 相交", self.label, other.label);
        self.reset_cache();
    }

    #[inline]
    pub(crate) fn set_label(&mut self, label: u32) {
        self.label = label;
    }

    #[inline]
    fn reset_cache(&mut self) {
        self.bounds = OnceCell::new();
        self.geom_center = OnceCell::new();
    }
}
