//! 合成体数据. 以若干个 (可能相互重叠的) 球的并集作为前景.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use region_berry::prelude::*;

/// 球心与半径, 单位为体素.
pub type Ball = (Idx3d, f64);

/// 若干个球的并集. `region-berry/tests/properties.rs` 中有一份相同的副本.
pub fn balls(shape: Idx3d, calibration: Calibration, specs: &[Ball]) -> Mask {
    Mask::from_fn(shape, calibration, |(z, h, w)| {
        specs.iter().any(|&((cz, ch, cw), r)| {
            let d2 = z.abs_diff(cz).pow(2) + h.abs_diff(ch).pow(2) + w.abs_diff(cw).pow(2);
            d2 as f64 <= r * r
        })
    })
}

/// 沿 w 方向排列的五个球, 相邻两球之间的颈部粗细不同.
///
/// `region-berry/tests/properties.rs` 中有一份相同的副本, 修改时需同步.
pub fn ball_chain() -> Mask {
    balls(
        (11, 11, 34),
        Calibration::unit(),
        &[
            ((5, 5, 5), 4.0),
            ((5, 5, 11), 3.5),
            ((5, 5, 16), 4.0),
            ((5, 5, 23), 4.0),
            ((5, 5, 29), 3.0),
        ],
    )
}

/// 两个相同的球, 球心距离为 `gap`.
pub fn touching_pair(radius: f64, gap: usize) -> Mask {
    let r = radius.ceil() as usize + 1;
    let shape = (2 * r + 1, 2 * r + 1, 2 * r + gap + 1);
    balls(
        shape,
        Calibration::unit(),
        &[((r, r, r), radius), ((r, r, r + gap), radius)],
    )
}

/// 随机放置 `n` 个球. 同一个 `seed` 总是给出相同结果.
pub fn random_balls(seed: u64, shape: Idx3d, n: usize) -> Mask {
    let mut rng = StdRng::seed_from_u64(seed);
    let margin = |len: usize| len.min(6) / 2;
    let specs: Vec<Ball> = (0..n)
        .map(|_| {
            let c = (
                rng.gen_range(margin(shape.0)..shape.0 - margin(shape.0)),
                rng.gen_range(margin(shape.1)..shape.1 - margin(shape.1)),
                rng.gen_range(margin(shape.2)..shape.2 - margin(shape.2)),
            );
            (c, rng.gen_range(2.0..5.0))
        })
        .collect();
    balls(shape, Calibration::unit(), &specs)
}

/// 消融实验使用的全部体数据. 最后一个为全背景.
pub fn suite() -> Vec<Mask> {
    let mut out = vec![ball_chain(), touching_pair(4.0, 6), touching_pair(5.0, 9)];
    out.extend((0..12).map(|seed| random_balls(seed, (16, 40, 40), 4 + seed as usize % 5)));
    out.push(Mask::filled((8, 16, 16), Calibration::unit(), false));
    out
}
