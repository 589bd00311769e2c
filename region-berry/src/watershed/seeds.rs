//! 种子检测: 局部极值, 阈值筛选和连通分量标记.

use std::collections::VecDeque;

use ndarray::{Array3, Zip};

use crate::data::{Connectivity, GridAttr, Mask, Neighbourhood, ScalarField};
use crate::error::{check_finite, check_shape, SegResult};
use crate::Idx3d;

/// 局部极值滤波.
///
/// 体素 `p` (位于 `mask` 内, 若给出) 为局部极大值, 当且仅当 `neighbourhood`
/// 中每个位于网格和 `mask` 内的体素取值都不大于 `map[p]`. 极小值同理.
/// 平台上的每个体素都会被标记, 由后续连通分量合并为同一个种子.
pub fn local_extrema(
    map: &ScalarField,
    mask: Option<&Mask>,
    maxima: bool,
    neighbourhood: &Neighbourhood,
) -> SegResult<Mask> {
    let shape = map.shape();
    if let Some(m) = mask {
        check_shape(shape, m.shape())?;
    }
    let inside = |p: Idx3d| mask.map_or(true, |m| m[p]);

    let mut out = Array3::from_elem(shape, false);
    let op = |pos: Idx3d, o: &mut bool| {
        if !inside(pos) {
            return;
        }
        let v = map[pos];
        *o = neighbourhood
            .around(pos, shape)
            .filter(|q| inside(*q))
            .all(|q| if maxima { map[q] <= v } else { map[q] >= v });
    };

    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            Zip::indexed(&mut out).par_for_each(op);
        } else {
            Zip::indexed(&mut out).for_each(op);
        }
    }
    Ok(Mask::new(out, map.calibration()))
}

/// 移除 `field` 取值小于 `min_value` 的种子体素, 返回被移除的个数.
pub fn filter_seeds(seeds: &mut Mask, field: &ScalarField, min_value: f64) -> SegResult<usize> {
    check_finite("min_value", min_value)?;
    check_shape(seeds.shape(), field.shape())?;
    let mut removed = 0;
    for pos in seeds.foreground_pos() {
        if (field[pos] as f64) < min_value {
            seeds[pos] = false;
            removed += 1;
        }
    }
    Ok(removed)
}

/// 将种子掩膜的各连通分量标记为 `1..=n`, 编号按分量首个体素的行优先序.
///
/// 返回全部种子体素及其标签, 同一分量内的体素按广度优先序排列.
pub fn seed_components(seeds: &Mask, connectivity: Connectivity) -> Vec<(Idx3d, u32)> {
    let shape = seeds.shape();
    let mut visited = Array3::from_elem(shape, false);
    let mut ans = Vec::new();
    let mut queue = VecDeque::new();
    let mut label = 0u32;

    for start in seeds.foreground_pos() {
        if visited[start] {
            continue;
        }
        label += 1;
        visited[start] = true;
        queue.push_back(start);
        while let Some(pos) = queue.pop_front() {
            ans.push((pos, label));
            for n in connectivity.neighbours(pos, shape) {
                if seeds[n] && !visited[n] {
                    visited[n] = true;
                    queue.push_back(n);
                }
            }
        }
    }
    ans
}
