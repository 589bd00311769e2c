//! 区域集合.

use std::collections::{BTreeMap, BTreeSet};

use ndarray::{Array3, ArrayView3};

use super::{PopulationFilter, Region};
use crate::consts::BACKGROUND_LABEL;
use crate::data::{Calibration, GridAttr, Mask};
use crate::Idx3d;

/// 同一网格上互不相交的区域集合, 按标签索引.
///
/// 分水岭的输出, 同时也是聚类引擎的工作状态与最终结果.
/// 在一次运行中被淘汰的标签不会被再次分配.
#[derive(Debug, Clone, PartialEq)]
pub struct RegionPopulation {
    shape: Idx3d,
    calibration: Calibration,
    regions: BTreeMap<u32, Region>,
    next_label: u32,
}

impl GridAttr for RegionPopulation {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.shape
    }

    #[inline]
    fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl RegionPopulation {
    /// 不含任何区域的集合.
    #[inline]
    pub fn empty(shape: Idx3d, calibration: Calibration) -> Self {
        Self {
            shape,
            calibration,
            regions: BTreeMap::new(),
            next_label: 1,
        }
    }

    /// 由若干区域构造.
    ///
    /// # 注意
    ///
    /// 区域标签重复, 体素越界或两个区域共享同一体素时, 程序 panic.
    pub fn from_regions<I>(shape: Idx3d, calibration: Calibration, regions: I) -> Self
    where
        I: IntoIterator<Item = Region>,
    {
        let mut ans = Self::empty(shape, calibration);
        let mut seen = BTreeSet::new();
        for r in regions {
            for p in r.voxels() {
                assert!(ans.check(p), "区域 {} 的体素 {p:?} 越界", r.label());
                assert!(seen.insert(*p), "体素 {p:?} 被多个区域占有");
            }
            ans.insert(r);
        }
        ans
    }

    /// 由标签图构造. 值为 0 的体素是背景.
    pub fn from_label_map(labels: ArrayView3<'_, u32>, calibration: Calibration) -> Self {
        let mut groups: BTreeMap<u32, BTreeSet<Idx3d>> = BTreeMap::new();
        for (pos, &l) in labels.indexed_iter() {
            if l != BACKGROUND_LABEL {
                groups.entry(l).or_default().insert(pos);
            }
        }
        let mut ans = Self::empty(labels.dim(), calibration);
        for (l, voxels) in groups {
            ans.insert(Region::new(l, voxels));
        }
        ans
    }

    /// 区域个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// 是否不含任何区域.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// 按标签获取区域.
    #[inline]
    pub fn get(&self, label: u32) -> Option<&Region> {
        self.regions.get(&label)
    }

    /// 全部标签, 升序.
    #[inline]
    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.regions.keys().copied()
    }

    /// 全部区域, 按标签升序.
    #[inline]
    pub fn regions(&self) -> impl Iterator<Item = &Region> + '_ {
        self.regions.values()
    }

    /// 所有区域的体素总数.
    #[inline]
    pub fn total_voxels(&self) -> usize {
        self.regions.values().map(Region::size).sum()
    }

    /// 下一个可分配的标签.
    #[inline]
    pub fn next_label(&self) -> u32 {
        self.next_label
    }

    /// 导出稠密标签图. 背景为 0.
    pub fn label_map(&self) -> Array3<u32> {
        let mut ans = Array3::from_elem(self.shape, BACKGROUND_LABEL);
        for r in self.regions.values() {
            for p in r.voxels() {
                ans[*p] = r.label();
            }
        }
        ans
    }

    /// 按各区域首个体素的行优先序, 把标签重排为 `1..=n`.
    pub fn relabel(self) -> Self {
        let Self {
            shape,
            calibration,
            regions,
            ..
        } = self;
        let mut sorted: Vec<Region> = regions.into_values().collect();
        sorted.sort_unstable_by_key(Region::first_voxel);
        let mut ans = Self::empty(shape, calibration);
        for (i, mut r) in sorted.into_iter().enumerate() {
            r.set_label(i as u32 + 1);
            ans.insert(r);
        }
        ans
    }

    /// 仅保留满足 `filter` 的区域. 标签保持不变.
    pub fn filter(mut self, filter: &PopulationFilter) -> Self {
        self.regions.retain(|_, r| filter.keep(r));
        self
    }

    /// 各区域是否两两不相交, 且 (若给出 `mask`) 全部位于前景内.
    pub fn is_partition(&self, mask: Option<&Mask>) -> bool {
        let mut seen = BTreeSet::new();
        self.regions.values().flat_map(Region::voxels).all(|p| {
            seen.insert(*p) && self.check(p) && mask.map_or(true, |m| m.contains(*p))
        })
    }

    /// 插入新区域.
    ///
    /// 标签已存在时 panic. 调用者需保证体素不与已有区域相交.
    pub(crate) fn insert(&mut self, region: Region) {
        let label = region.label();
        self.next_label = self.next_label.max(label.saturating_add(1));
        let old = self.regions.insert(label, region);
        assert!(old.is_none(), "标签 {label} 重复");
    }

    /// 将 `removed` 并入 `kept`, 返回合并后区域的引用.
    ///
    /// 任一标签不存在时 panic.
    pub(crate) fn fuse(&mut self, kept: u32, removed: u32) -> &Region {
        assert_ne!(kept, removed);
        let gone = self
            .regions
            .remove(&removed)
            .unwrap_or_else(|| panic!("区域 {removed} 不存在"));
        let target = self
            .regions
            .get_mut(&kept)
            .unwrap_or_else(|| panic!("区域 {kept} 不存在"));
        target.absorb(gone);
        target
    }
}
