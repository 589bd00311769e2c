use std::collections::BTreeMap;

use binary_heap_plus::BinaryHeap;

use super::{
    Contraction, FusionCandidate, FusionCheck, FusionRecord, Interface, InterfaceKey,
    InterfaceOrder, InterfaceSet, InterfaceValue,
};
use crate::data::GridAttr;
use crate::error::{check_shape, SegError, SegResult};
use crate::region::{RegionPopulation, RegionStatistic};

/// 队列条目. `stamp` 与界面当前版本号不一致时条目已过期.
#[derive(Copy, Clone, Debug)]
struct Entry {
    key: InterfaceKey,
    slot: usize,
    stamp: u64,
}

/// 收缩过程的全部工作状态.
pub(super) struct ClusterImp<'a, V: ?Sized, F: ?Sized> {
    population: RegionPopulation,
    interfaces: InterfaceSet,
    value_fn: &'a V,
    fusion: &'a F,
    aux: Option<&'a dyn RegionStatistic>,
    aux_cache: BTreeMap<u32, f64>,
    order: InterfaceOrder,
}

impl<'a, V, F> ClusterImp<'a, V, F>
where
    V: InterfaceValue + ?Sized,
    F: FusionCheck + ?Sized,
{
    /// 检查输入. 出错时不做任何修改.
    pub(super) fn new(
        population: RegionPopulation,
        interfaces: InterfaceSet,
        value_fn: &'a V,
        fusion: &'a F,
        aux: Option<&'a dyn RegionStatistic>,
        order: InterfaceOrder,
    ) -> SegResult<Self> {
        check_shape(population.shape(), interfaces.shape())?;
        if let Some(l) = interfaces.endpoints().find(|l| population.get(*l).is_none()) {
            return Err(SegError::InvalidParameter(format!(
                "界面端点 {l} 不在区域集合中"
            )));
        }
        if let (Some(name), None) = (fusion.needs_statistic(), aux) {
            return Err(SegError::MissingStatistic(name));
        }

        let aux_cache = match aux {
            Some(stat) => population
                .regions()
                .map(|r| (r.label(), stat.evaluate(r)))
                .collect(),
            None => BTreeMap::new(),
        };
        Ok(Self {
            population,
            interfaces,
            value_fn,
            fusion,
            aux,
            aux_cache,
            order,
        })
    }

    fn live(&self, slot: usize) -> &Interface {
        self.interfaces
            .at(slot)
            .unwrap_or_else(|| panic!("界面槽位 {slot} 已失效"))
    }

    /// 重新计算 `slot` 处界面的取值, 返回新的队列条目.
    fn refresh(&mut self, slot: usize) -> Entry {
        let value = self.value_fn.value(self.live(slot), &self.population);
        let iface = self
            .interfaces
            .at_mut(slot)
            .unwrap_or_else(|| panic!("界面槽位 {slot} 已失效"));
        iface.update(value);
        Entry {
            key: InterfaceKey {
                value,
                pair: iface.pair(),
                contacts: iface.contact_count(),
            },
            slot,
            stamp: iface.stamp(),
        }
    }

    /// 将 `removed` 并入 `kept`, 并删除二者之间位于 `slot` 的界面.
    fn merge(&mut self, slot: usize, kept: u32, removed: u32) {
        self.interfaces.remove(slot);
        let merged = self.population.fuse(kept, removed);
        if let Some(stat) = self.aux {
            let v = stat.evaluate(merged);
            self.aux_cache.remove(&removed);
            self.aux_cache.insert(kept, v);
        }
        self.interfaces.reassign(kept, removed);
    }

    pub(super) fn run(mut self) -> SegResult<Contraction> {
        let order = self.order;
        // 堆顶为 `order` 下最小的条目
        let mut heap = BinaryHeap::new_by(move |a: &Entry, b: &Entry| order(&b.key, &a.key));
        for slot in self.interfaces.slots() {
            let e = self.refresh(slot);
            heap.push(e);
        }

        let initial = self.population.len();
        let mut fusions = Vec::new();
        while let Some(entry) = heap.pop() {
            let Some(iface) = self.interfaces.at(entry.slot) else {
                log::trace!("丢弃已删除的界面 {:?}", entry.key.pair);
                continue;
            };
            if iface.stamp() != entry.stamp {
                log::trace!("丢弃过期的界面 {:?}", entry.key.pair);
                continue;
            }

            let (a, b) = iface.pair();
            let (Some(first), Some(second)) = (self.population.get(a), self.population.get(b))
            else {
                panic!("界面 ({a}, {b}) 引用了已淘汰的区域");
            };
            let candidate = FusionCandidate {
                interface: iface,
                first,
                second,
                first_aux: self.aux_cache.get(&a).copied(),
                second_aux: self.aux_cache.get(&b).copied(),
            };
            let accepted = self.fusion.check_fusion(&candidate);
            let value = iface.value();
            log::debug!(
                "界面 ({a}, {b}): 取值 {value:.4}, 接触 {}, 区域大小 {} / {}, {}",
                iface.contact_count(),
                first.size(),
                second.size(),
                if accepted { "融合" } else { "拒绝" }
            );
            if !accepted {
                continue;
            }

            self.merge(entry.slot, a, b);
            fusions.push(FusionRecord {
                kept: a,
                removed: b,
                value,
            });
            for slot in self.interfaces.slots_of(a) {
                let e = self.refresh(slot);
                heap.push(e);
            }
        }

        debug_assert_eq!(initial - fusions.len(), self.population.len());
        log::debug!(
            "收缩结束: {} 个区域经 {} 次融合剩余 {} 个",
            initial,
            fusions.len(),
            self.population.len()
        );
        Ok(Contraction {
            population: self.population,
            interfaces: self.interfaces,
            fusions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::data::{Calibration, Connectivity};
    use crate::error::SegError;
    use crate::region::{Region, RegionPopulation};
    use std::collections::BTreeSet;

    /// 沿 w 方向排列的若干 5x10 薄片, 每片 50 个体素.
    fn slabs(n: usize) -> RegionPopulation {
        let regions = (0..n).map(|i| {
            let voxels: BTreeSet<_> = itertools::iproduct!(0..1, 0..10, i * 5..i * 5 + 5).collect();
            Region::new(i as u32 + 1, voxels)
        });
        RegionPopulation::from_regions((1, 10, 5 * n), Calibration::unit(), regions)
    }

    /// 由端点标签查表给出界面取值.
    fn table(values: &'static [((u32, u32), f64)]) -> impl Fn(&Interface, &RegionPopulation) -> f64 {
        move |i: &Interface, _: &RegionPopulation| {
            values
                .iter()
                .find(|(p, _)| *p == i.pair())
                .map_or(f64::NAN, |(_, v)| *v)
        }
    }

    fn run(
        pop: RegionPopulation,
        values: &'static [((u32, u32), f64)],
        threshold: f64,
    ) -> Contraction {
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        contract(pop, set, &table(values), &EdmFusion::new(threshold), None).unwrap()
    }

    #[test]
    fn test_two_regions_merge() {
        let out = run(slabs(2), &[((1, 2), 0.05)], 0.1);
        assert_eq!(out.population.len(), 1);
        assert_eq!(out.population.get(1).unwrap().size(), 100);
        assert_eq!(
            out.fusions,
            vec![FusionRecord {
                kept: 1,
                removed: 2,
                value: 0.05
            }]
        );
        assert!(out.interfaces.is_empty());
    }

    #[test]
    fn test_two_regions_rejected() {
        let out = run(slabs(2), &[((1, 2), 0.05)], 0.01);
        assert_eq!(out.population.len(), 2);
        assert!(out.population.regions().all(|r| r.size() == 50));
        assert!(out.fusions.is_empty());
        assert_eq!(out.interfaces.get(1, 2).unwrap().value(), 0.05);
    }

    #[test]
    fn test_chain_keeps_union_of_contacts() {
        // A-B 0.02, B-C 0.2, 阈值 0.1.
        let pop = slabs(3);
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        let bc_contacts = set.get(2, 3).unwrap().voxels().clone();
        // 合并后 (1, 3) 界面的取值沿用 B-C.
        let values = &[((1, 2), 0.02), ((2, 3), 0.2), ((1, 3), 0.2)];
        let out = contract(pop, set, &table(values), &EdmFusion::new(0.1), None).unwrap();

        assert_eq!(out.population.labels().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(out.population.get(1).unwrap().size(), 100);
        let ac = out.interfaces.get(1, 3).unwrap();
        assert_eq!(ac.voxels(), &bc_contacts);
        assert_eq!(ac.value(), 0.2);
        assert_eq!(out.fusions.len(), 1);
    }

    #[test]
    fn test_tiny_bridge_never_merges() {
        // 两个 3x4 区域, 由 (0, 1, 4) -> (0, 1, 5) 单对体素相连.
        let left: BTreeSet<_> = itertools::iproduct!(0..1, 0..3, 0..4)
            .chain([(0, 1, 4)])
            .collect();
        let right: BTreeSet<_> = itertools::iproduct!(0..1, 0..3, 5..9).collect();
        let pop = RegionPopulation::from_regions(
            (1, 3, 9),
            Calibration::unit(),
            [Region::new(1, left), Region::new(2, right)],
        );
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        assert_eq!(set.get(1, 2).unwrap().contact_count(), 2);
        let out = contract(pop, set, &table(&[((1, 2), 0.0)]), &EdmFusion::new(1.0), None).unwrap();
        assert_eq!(out.population.len(), 2);
    }

    #[test]
    fn test_statistic_required_and_updated() {
        let pop = slabs(3);
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        let fusion = EdmFusion::new(1.0).with_criterion(DivisionCriterion::DivMap { threshold: 120.0 });
        let values = table(&[((1, 2), 0.1), ((2, 3), 0.5), ((1, 3), 0.5)]);
        assert_eq!(
            contract(pop.clone(), set.clone(), &values, &fusion, None).unwrap_err(),
            SegError::MissingStatistic("DivMap")
        );

        // 统计量取区域体素数. 上限 120 时 100 与 50 都满足, 三者合一.
        let size = |r: &Region| r.size() as f64;
        let out = contract(pop.clone(), set.clone(), &values, &fusion, Some(&size)).unwrap();
        assert_eq!(out.population.len(), 1);

        // 上限 80 时, 合并后的区域 (100) 不再满足.
        let fusion = EdmFusion::new(1.0).with_criterion(DivisionCriterion::DivMap { threshold: 80.0 });
        let out = contract(pop, set, &values, &fusion, Some(&size)).unwrap();
        assert_eq!(out.population.len(), 2);
        assert_eq!(out.fusions.len(), 1);
    }

    #[test]
    fn test_custom_order_and_validation() {
        let pop = slabs(3);
        let set = build_interfaces(&pop, Connectivity::Six, None).unwrap();
        // 两个界面都可融合; 倒序时先合并 2 和 3.
        let values = table(&[((1, 2), 0.01), ((2, 3), 0.02)]);
        let descending: InterfaceOrder = |a, b| ascending_value(b, a);
        let out = contract_by(pop.clone(), set.clone(), &values, &EdmFusion::new(0.1), None, descending)
            .unwrap();
        assert_eq!(out.fusions[0].kept, 2);
        assert_eq!(out.fusions[0].removed, 3);
        assert_eq!(out.population.len(), 1);

        // 网格形状不一致.
        assert!(matches!(
            contract(slabs(2), set.clone(), &values, &EdmFusion::new(0.1), None),
            Err(SegError::ShapeMismatch { .. })
        ));

        // 界面端点不在区域集合中.
        let none = pop.filter(&crate::region::PopulationFilter::Size { min: 1000, max: None });
        assert!(matches!(
            contract(none, set, &values, &EdmFusion::new(0.1), None),
            Err(SegError::InvalidParameter(_))
        ));
    }
}
