//! 区域之间的界面.

use std::collections::{BTreeMap, BTreeSet};

use crate::consts::BACKGROUND_LABEL;
use crate::data::{Connectivity, GridAttr, Mask};
use crate::error::{check_shape, SegResult};
use crate::region::RegionPopulation;
use crate::Idx3d;

/// 两个相邻区域之间的界面.
///
/// 端点以 `(较小标签, 较大标签)` 规范顺序存储, 因此 `(A, B)` 与 `(B, A)` 是同一个界面.
#[derive(Debug, Clone, PartialEq)]
pub struct Interface {
    pair: (u32, u32),
    voxels: BTreeSet<Idx3d>,
    duplicated: BTreeSet<Idx3d>,
    value: f64,
    stamp: u64,
}

impl Interface {
    /// 创建 `a` 与 `b` 之间的空界面. 取值为 `NaN`.
    pub fn new(a: u32, b: u32) -> Self {
        assert_ne!(a, b, "界面两端不能是同一个区域");
        Self {
            pair: (a.min(b), a.max(b)),
            voxels: BTreeSet::new(),
            duplicated: BTreeSet::new(),
            value: f64::NAN,
            stamp: 0,
        }
    }

    /// 规范顺序的端点标签.
    #[inline]
    pub fn pair(&self) -> (u32, u32) {
        self.pair
    }

    /// 主接触体素集合.
    #[inline]
    pub fn voxels(&self) -> &BTreeSet<Idx3d> {
        &self.voxels
    }

    /// 重复体素集合. 计算取值时这些体素会被重复计入.
    #[inline]
    pub fn duplicated(&self) -> &BTreeSet<Idx3d> {
        &self.duplicated
    }

    /// 融合优先级. 越小表示边界越弱, 越应融合.
    #[inline]
    pub fn value(&self) -> f64 {
        self.value
    }

    /// 每次更新取值时递增的版本号.
    #[inline]
    pub fn stamp(&self) -> u64 {
        self.stamp
    }

    /// 接触体素总数 (主集合与重复集合之和).
    #[inline]
    pub fn contact_count(&self) -> usize {
        self.voxels.len() + self.duplicated.len()
    }

    /// 是否以 `label` 为端点.
    #[inline]
    pub fn involves(&self, label: u32) -> bool {
        self.pair.0 == label || self.pair.1 == label
    }

    /// 另一端的标签. `label` 不是端点时返回 `None`.
    #[inline]
    pub fn other(&self, label: u32) -> Option<u32> {
        match self.pair {
            (a, b) if a == label => Some(b),
            (a, b) if b == label => Some(a),
            _ => None,
        }
    }

    /// 记录一对相邻体素.
    ///
    /// 若给出前景且 `v1` 位于前景之外, 则 `v2` 记入重复集合, 否则 `v1` 记入主集合.
    /// `v2` 总是记入主集合.
    pub fn add_pair(&mut self, v1: Idx3d, v2: Idx3d, foreground: Option<&Mask>) {
        match foreground {
            Some(m) if !m.contains(v1) => {
                self.duplicated.insert(v2);
            }
            _ => {
                self.voxels.insert(v1);
            }
        }
        self.voxels.insert(v2);
    }

    /// 吸收 `other` 的全部接触体素. 取值失效为 `NaN`, 需要重新计算.
    pub fn fusion_interface(&mut self, other: Interface) {
        self.voxels.extend(other.voxels);
        self.duplicated.extend(other.duplicated);
        self.value = f64::NAN;
    }

    #[inline]
    pub(crate) fn update(&mut self, value: f64) {
        self.value = value;
        self.stamp += 1;
    }

    /// 将端点 `from` 改为 `to`. 取值失效为 `NaN`.
    fn repoint(&mut self, from: u32, to: u32) {
        let keep = self
            .other(from)
            .unwrap_or_else(|| panic!("界面 {:?} 不含区域 {from}", self.pair));
        self.pair = (keep.min(to), keep.max(to));
        self.value = f64::NAN;
    }
}

/// 界面取值函数.
pub trait InterfaceValue {
    /// 根据当前区域集合计算 `interface` 的融合优先级.
    fn value(&self, interface: &Interface, population: &RegionPopulation) -> f64;
}

impl<F> InterfaceValue for F
where
    F: Fn(&Interface, &RegionPopulation) -> f64,
{
    #[inline]
    fn value(&self, interface: &Interface, population: &RegionPopulation) -> f64 {
        self(interface, population)
    }
}

/// 区域邻接图的边集合.
///
/// 界面存放在 arena 中, 以下标寻址. 被删除的槽位不会分配给新界面,
/// 因此队列中过期的下标要么指向空槽位, 要么指向版本号已变化的同一界面.
#[derive(Debug, Clone)]
pub struct InterfaceSet {
    shape: Idx3d,
    arena: Vec<Option<Interface>>,
    index: BTreeMap<(u32, u32), usize>,
    by_region: BTreeMap<u32, BTreeSet<usize>>,
}

impl InterfaceSet {
    fn new(shape: Idx3d) -> Self {
        Self {
            shape,
            arena: Vec::new(),
            index: BTreeMap::new(),
            by_region: BTreeMap::new(),
        }
    }

    /// 建立界面时所用网格的形状.
    #[inline]
    pub fn shape(&self) -> Idx3d {
        self.shape
    }

    /// 存活界面个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// 是否没有任何界面.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// 获取 `a` 与 `b` 之间的界面, 与参数顺序无关.
    pub fn get(&self, a: u32, b: u32) -> Option<&Interface> {
        let slot = *self.index.get(&(a.min(b), a.max(b)))?;
        self.at(slot)
    }

    /// 按规范端点顺序遍历全部存活界面.
    pub fn iter(&self) -> impl Iterator<Item = &Interface> + '_ {
        self.index.values().filter_map(|s| self.at(*s))
    }

    /// 以 `label` 为端点的全部界面.
    pub fn of_region(&self, label: u32) -> impl Iterator<Item = &Interface> + '_ {
        self.by_region
            .get(&label)
            .into_iter()
            .flatten()
            .filter_map(|s| self.at(*s))
    }

    /// 全部端点标签.
    pub(crate) fn endpoints(&self) -> impl Iterator<Item = u32> + '_ {
        self.index.keys().flat_map(|&(a, b)| [a, b])
    }

    /// 全部存活槽位, 按规范端点顺序.
    pub(crate) fn slots(&self) -> Vec<usize> {
        self.index.values().copied().collect()
    }

    /// 以 `label` 为端点的全部槽位.
    pub(crate) fn slots_of(&self, label: u32) -> Vec<usize> {
        self.by_region
            .get(&label)
            .map(|s| s.iter().copied().collect())
            .unwrap_or_default()
    }

    #[inline]
    pub(crate) fn at(&self, slot: usize) -> Option<&Interface> {
        self.arena.get(slot).and_then(Option::as_ref)
    }

    #[inline]
    pub(crate) fn at_mut(&mut self, slot: usize) -> Option<&mut Interface> {
        self.arena.get_mut(slot).and_then(Option::as_mut)
    }

    #[inline]
    pub(crate) fn slot_of(&self, a: u32, b: u32) -> Option<usize> {
        self.index.get(&(a.min(b), a.max(b))).copied()
    }

    fn insert(&mut self, interface: Interface) -> usize {
        let slot = self.arena.len();
        let (a, b) = interface.pair();
        self.index.insert((a, b), slot);
        self.by_region.entry(a).or_default().insert(slot);
        self.by_region.entry(b).or_default().insert(slot);
        self.arena.push(Some(interface));
        slot
    }

    /// 删除槽位 `slot` 处的界面.
    ///
    /// 槽位为空时 panic.
    pub(crate) fn remove(&mut self, slot: usize) -> Interface {
        let iface = self.arena[slot]
            .take()
            .unwrap_or_else(|| panic!("界面槽位 {slot} 为空"));
        let (a, b) = iface.pair();
        self.index.remove(&(a, b));
        for l in [a, b] {
            if let Some(s) = self.by_region.get_mut(&l) {
                s.remove(&slot);
                if s.is_empty() {
                    self.by_region.remove(&l);
                }
            }
        }
        iface
    }

    /// 区域 `removed` 并入 `kept` 后, 重新组织 `removed` 的全部界面:
    /// 与 `kept` 已有的界面融合, 否则改为指向 `kept`.
    ///
    /// `kept` 与 `removed` 之间的界面必须事先删除.
    pub(crate) fn reassign(&mut self, kept: u32, removed: u32) {
        for slot in self.slots_of(removed) {
            let iface = self.remove(slot);
            let third = iface
                .other(removed)
                .unwrap_or_else(|| panic!("界面 {:?} 不含区域 {removed}", iface.pair()));
            assert_ne!(third, kept, "融合前未删除界面 ({kept}, {removed})");
            match self.slot_of(kept, third) {
                Some(existing) => {
                    if let Some(target) = self.at_mut(existing) {
                        target.fusion_interface(iface);
                    }
                }
                None => {
                    let mut iface = iface;
                    iface.repoint(removed, kept);
                    // 同一界面留在原槽位.
                    let (a, b) = iface.pair();
                    self.index.insert((a, b), slot);
                    self.by_region.entry(a).or_default().insert(slot);
                    self.by_region.entry(b).or_default().insert(slot);
                    self.arena[slot] = Some(iface);
                }
            }
        }
    }
}

/// 扫描全部相邻体素对, 为每对相邻且标签不同的区域建立界面.
///
/// 体素对按行优先序, 沿半邻域枚举, 每对只访问一次. 若其中恰有一个体素位于
/// `foreground` 之外, 则以它作为 `add_pair` 的第一个参数, 否则以行优先序较早者为第一个参数.
/// 界面取值在收缩开始时计算, 此处均为 `NaN`.
pub fn build_interfaces(
    population: &RegionPopulation,
    connectivity: Connectivity,
    foreground: Option<&Mask>,
) -> SegResult<InterfaceSet> {
    let shape = population.shape();
    if let Some(m) = foreground {
        check_shape(shape, m.shape())?;
    }
    let labels = population.label_map();
    let outside = |p: Idx3d| foreground.map_or(false, |m| !m[p]);

    let mut set = InterfaceSet::new(shape);
    for (pos, &a) in labels.indexed_iter() {
        if a == BACKGROUND_LABEL {
            continue;
        }
        for n in connectivity.forward_neighbours(pos, shape) {
            let b = labels[n];
            if b == BACKGROUND_LABEL || b == a {
                continue;
            }
            let (v1, v2) = if !outside(pos) && outside(n) {
                (n, pos)
            } else {
                (pos, n)
            };
            let slot = match set.slot_of(a, b) {
                Some(s) => s,
                None => set.insert(Interface::new(a, b)),
            };
            if let Some(iface) = set.at_mut(slot) {
                iface.add_pair(v1, v2, foreground);
            }
        }
    }
    log::debug!(
        "{} 个区域之间建立了 {} 个界面",
        population.len(),
        set.len()
    );
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Calibration;
    use ndarray::array;

    fn population() -> RegionPopulation {
        // 1 | 2
        // 3 | 2
        let labels = array![[[1, 1, 2], [3, 3, 2]]];
        RegionPopulation::from_label_map(labels.view(), Calibration::unit())
    }

    #[test]
    fn test_build_six() {
        let p = population();
        let set = build_interfaces(&p, Connectivity::Six, None).unwrap();
        assert_eq!(set.len(), 3);
        let i12 = set.get(2, 1).unwrap();
        assert_eq!(i12.pair(), (1, 2));
        assert_eq!(
            i12.voxels().iter().copied().collect::<Vec<_>>(),
            vec![(0, 0, 1), (0, 0, 2)]
        );
        assert_eq!(i12.contact_count(), 2);
        assert!(i12.value().is_nan());
        assert_eq!(set.get(1, 3).unwrap().voxels().len(), 4);
        assert_eq!(set.of_region(2).count(), 2);
        assert_eq!(
            set.iter().map(Interface::pair).collect::<Vec<_>>(),
            vec![(1, 2), (1, 3), (2, 3)]
        );
    }

    #[test]
    fn test_duplicated_voxels() {
        let p = population();
        let mut fg = Mask::filled((1, 2, 3), Calibration::unit(), true);
        fg[(0, 0, 2)] = false;
        let set = build_interfaces(&p, Connectivity::Six, Some(&fg)).unwrap();
        let i12 = set.get(1, 2).unwrap();
        // (0, 0, 2) 在前景外, 作为第一个参数, 于是 (0, 0, 1) 计入重复集合.
        assert_eq!(i12.duplicated().len(), 1);
        assert!(i12.duplicated().contains(&(0, 0, 1)));
        assert_eq!(i12.voxels().len(), 1);
        assert_eq!(i12.contact_count(), 2);

        let wrong = Mask::filled((1, 2, 2), Calibration::unit(), true);
        assert!(build_interfaces(&p, Connectivity::Six, Some(&wrong)).is_err());
    }

    #[test]
    fn test_interface_basics() {
        let mut a = Interface::new(5, 2);
        assert_eq!(a.pair(), (2, 5));
        assert_eq!(a.other(2), Some(5));
        assert_eq!(a.other(9), None);
        assert!(a.involves(5));
        a.add_pair((0, 0, 0), (0, 0, 1), None);
        a.update(0.5);
        assert_eq!(a.stamp(), 1);

        let mut b = Interface::new(2, 5);
        b.add_pair((0, 1, 0), (0, 1, 1), None);
        a.fusion_interface(b);
        assert_eq!(a.voxels().len(), 4);
        assert!(a.value().is_nan());
    }

    #[test]
    fn test_reassign() {
        let p = population();
        let mut set = build_interfaces(&p, Connectivity::Six, None).unwrap();
        // 3 并入 1: 删除 (1, 3), (2, 3) 与 (1, 2) 融合.
        let slot = set.slot_of(1, 3).unwrap();
        set.remove(slot);
        set.reassign(1, 3);
        assert_eq!(set.len(), 1);
        assert_eq!(set.get(1, 2).unwrap().voxels().len(), 4);
        assert_eq!(set.of_region(3).count(), 0);

        // 保留区域与第三方尚无界面时, 界面改为指向保留区域.
        let mut set = build_interfaces(&p, Connectivity::Six, None).unwrap();
        let slot = set.slot_of(1, 2).unwrap();
        set.remove(slot);
        set.reassign(4, 2);
        assert!(set.get(3, 4).is_some());
        assert!(set.get(2, 3).is_none());
    }
}
