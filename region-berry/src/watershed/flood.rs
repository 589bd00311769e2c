//! 优先队列泛洪.

use binary_heap_plus::BinaryHeap;
use ndarray::Array3;

use super::WatershedConfig;
use crate::consts::BACKGROUND_LABEL;
use crate::data::{GridAttr, Mask, ScalarField};
use crate::Idx3d;

/// 队列中的前沿体素. `seq` 为入队序号, 用于相同取值时的先进先出.
#[derive(Copy, Clone, Debug)]
struct Frontier {
    value: f32,
    seq: u64,
    pos: Idx3d,
}

/// 从 `seeds` 出发在 `mask` 内泛洪, 返回标签图. 未到达的体素为 0.
///
/// 调用者保证种子均在前景内且标签非 0. 已有标签的体素不会被覆盖.
pub(super) fn flood(
    map: &ScalarField,
    mask: &Mask,
    seeds: &[(Idx3d, u32)],
    config: &WatershedConfig,
) -> Array3<u32> {
    let shape = map.shape();
    let decreasing = config.decreasing;
    let mut labels = Array3::from_elem(shape, BACKGROUND_LABEL);

    // 堆顶为最先处理的体素
    let mut heap: BinaryHeap<Frontier, _> = BinaryHeap::new_by(|a: &Frontier, b: &Frontier| {
        let by_value = if decreasing {
            a.value.total_cmp(&b.value)
        } else {
            b.value.total_cmp(&a.value)
        };
        by_value.then_with(|| b.seq.cmp(&a.seq))
    });
    heap.reserve(seeds.len().max(64));

    let mut seq = 0u64;

    for &(pos, label) in seeds {
        if labels[pos] == BACKGROUND_LABEL {
            labels[pos] = label;
            heap.push(Frontier {
                value: map[pos],
                seq,
                pos,
            });
            seq += 1;
        }
    }

    while let Some(Frontier { pos, .. }) = heap.pop() {
        let label = labels[pos];
        for n in config.connectivity.neighbours(pos, shape) {
            if labels[n] == BACKGROUND_LABEL
                && mask[n]
                && config.propagation.allows(map[n], decreasing)
            {
                labels[n] = label;
                heap.push(Frontier {
                    value: map[n],
                    seq,
                    pos: n,
                });
                seq += 1;
            }
        }
    }
    labels
}
