//! 区域聚类: 区域邻接图上按优先级的贪心收缩.
//!
//! 每次从队列中取出取值最小的界面, 由融合判据决定是否合并两端区域.
//! 合并时标签较大的区域并入标签较小的区域, 前者的界面被融合或改为指向后者,
//! 后者的全部界面重新计算取值并重新入队. 队列采用惰性删除:
//! 出队时若界面已被删除或版本号已变化, 该条目直接丢弃.

use std::cmp::Ordering;

use ordered_float::OrderedFloat;

use crate::region::{RegionPopulation, RegionStatistic};
use crate::error::SegResult;

mod engine;
mod fusion;
mod interface;

pub use fusion::{DivisionCriterion, EdmFusion, FusionCandidate, FusionCheck};
pub use interface::{build_interfaces, Interface, InterfaceSet, InterfaceValue};

/// 入队时界面的快照, 供排序使用.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct InterfaceKey {
    /// 界面取值.
    pub value: f64,
    /// 规范顺序的端点标签.
    pub pair: (u32, u32),
    /// 接触体素总数.
    pub contacts: usize,
}

/// 界面出队顺序. 返回 `Less` 的一方先出队.
pub type InterfaceOrder = fn(&InterfaceKey, &InterfaceKey) -> Ordering;

/// 默认顺序: 取值升序 (`NaN` 最后), 取值相同时按端点标签升序.
pub fn ascending_value(a: &InterfaceKey, b: &InterfaceKey) -> Ordering {
    OrderedFloat(a.value)
        .cmp(&OrderedFloat(b.value))
        .then_with(|| a.pair.cmp(&b.pair))
}

/// 一次被接受的融合.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FusionRecord {
    /// 保留的标签 (较小者).
    pub kept: u32,
    /// 被淘汰的标签.
    pub removed: u32,
    /// 融合时的界面取值.
    pub value: f64,
}

/// 收缩结果.
#[derive(Debug, Clone)]
pub struct Contraction {
    /// 收缩后的区域集合.
    pub population: RegionPopulation,
    /// 收缩后的界面集合, 取值均为最后一次计算的结果.
    pub interfaces: InterfaceSet,
    /// 按发生顺序排列的融合记录.
    pub fusions: Vec<FusionRecord>,
}

/// 以默认顺序收缩区域邻接图.
///
/// `aux` 为融合判据所需的区域辅助统计量. 判据需要统计量而 `aux` 为 `None`,
/// 或界面集合与区域集合不匹配时, 返回错误且不做任何修改.
pub fn contract<V, F>(
    population: RegionPopulation,
    interfaces: InterfaceSet,
    value_fn: &V,
    fusion: &F,
    aux: Option<&dyn RegionStatistic>,
) -> SegResult<Contraction>
where
    V: InterfaceValue + ?Sized,
    F: FusionCheck + ?Sized,
{
    contract_by(population, interfaces, value_fn, fusion, aux, ascending_value)
}

/// 以自定义顺序 `order` 收缩区域邻接图.
pub fn contract_by<V, F>(
    population: RegionPopulation,
    interfaces: InterfaceSet,
    value_fn: &V,
    fusion: &F,
    aux: Option<&dyn RegionStatistic>,
    order: InterfaceOrder,
) -> SegResult<Contraction>
where
    V: InterfaceValue + ?Sized,
    F: FusionCheck + ?Sized,
{
    engine::ClusterImp::new(population, interfaces, value_fn, fusion, aux, order)?.run()
}
