//! 体素邻接关系与邻域.

use itertools::iproduct;
use once_cell::sync::Lazy;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Calibration;
use crate::error::{SegError, SegResult};
use crate::Idx3d;

/// `(dz, dh, dw)` 偏移量.
pub type Offset3d = (isize, isize, isize);

/// 按字典序排列的 6/18/26-邻接偏移量表.
static FULL_OFFSETS: Lazy<[Vec<Offset3d>; 3]> =
    Lazy::new(|| [offsets_within(1), offsets_within(2), offsets_within(3)]);

/// 只保留字典序大于原点的那一半偏移量. 遍历全图时每一对相邻体素只会被访问一次.
static FORWARD_OFFSETS: Lazy<[Vec<Offset3d>; 3]> = Lazy::new(|| {
    FULL_OFFSETS
        .clone()
        .map(|v| v.into_iter().filter(|o| *o > (0, 0, 0)).collect())
});

/// 曼哈顿范数不超过 `l1` 的单位立方体偏移量 (不含原点).
fn offsets_within(l1: usize) -> Vec<Offset3d> {
    iproduct!(-1isize..=1, -1isize..=1, -1isize..=1)
        .filter(|&(z, h, w)| {
            let n = z.unsigned_abs() + h.unsigned_abs() + w.unsigned_abs();
            n != 0 && n <= l1
        })
        .collect()
}

/// 将 `pos` 平移 `off`. 若结果不在 `shape` 范围内则返回 `None`.
#[inline]
pub fn shift((z, h, w): Idx3d, (dz, dh, dw): Offset3d, shape: Idx3d) -> Option<Idx3d> {
    let z = z.checked_add_signed(dz).filter(|v| *v < shape.0)?;
    let h = h.checked_add_signed(dh).filter(|v| *v < shape.1)?;
    let w = w.checked_add_signed(dw).filter(|v| *v < shape.2)?;
    Some((z, h, w))
}

/// 体素网格的邻接规则.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    /// 共面 (前后上下左右).
    #[default]
    Six,

    /// 共面或共棱.
    Eighteen,

    /// 共面, 共棱或共顶点.
    TwentySix,
}

impl Connectivity {
    /// 由邻居个数 (6, 18, 26) 构造.
    pub fn from_count(count: u32) -> SegResult<Self> {
        match count {
            6 => Ok(Self::Six),
            18 => Ok(Self::Eighteen),
            26 => Ok(Self::TwentySix),
            n => Err(SegError::InvalidParameter(format!(
                "连通性必须为 6, 18 或 26, 实际为 {n}"
            ))),
        }
    }

    /// 邻居个数.
    #[inline]
    pub const fn count(&self) -> u32 {
        match self {
            Self::Six => 6,
            Self::Eighteen => 18,
            Self::TwentySix => 26,
        }
    }

    #[inline]
    const fn table_index(&self) -> usize {
        match self {
            Self::Six => 0,
            Self::Eighteen => 1,
            Self::TwentySix => 2,
        }
    }

    /// 全部偏移量, 按字典序.
    #[inline]
    pub fn offsets(&self) -> &'static [Offset3d] {
        &FULL_OFFSETS[self.table_index()]
    }

    /// 字典序大于原点的一半偏移量.
    #[inline]
    pub fn forward_offsets(&self) -> &'static [Offset3d] {
        &FORWARD_OFFSETS[self.table_index()]
    }

    /// 获取 `pos` 在 `shape` 范围内的全部邻居.
    #[inline]
    pub fn neighbours(&self, pos: Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
        self.offsets()
            .iter()
            .filter_map(move |off| shift(pos, *off, shape))
    }

    /// 获取 `pos` 在 `shape` 范围内, 且按行优先序位于其后的邻居.
    #[inline]
    pub fn forward_neighbours(&self, pos: Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> {
        self.forward_offsets()
            .iter()
            .filter_map(move |off| shift(pos, *off, shape))
    }
}

/// 局部极值滤波等操作所用的有限邻域 (不含中心体素).
#[derive(Clone, Debug, PartialEq)]
pub struct Neighbourhood {
    offsets: Vec<Offset3d>,
}

impl Neighbourhood {
    /// 椭球邻域: 满足 `(dh² + dw²) / rxy² + dz² / rz² <= 1` 的偏移量.
    ///
    /// `radius_z == 0` 时退化为水平圆盘.
    pub fn ellipsoid(radius_xy: f64, radius_z: f64) -> SegResult<Self> {
        check_radius(radius_xy, radius_z)?;
        let (rxy, rz) = (radius_xy.floor() as isize, radius_z.floor() as isize);
        let offsets = iproduct!(-rz..=rz, -rxy..=rxy, -rxy..=rxy)
            .filter(|&o| o != (0, 0, 0))
            .filter(|&(dz, dh, dw)| {
                let planar = ((dh * dh + dw * dw) as f64) / (radius_xy * radius_xy).max(1e-12);
                let axial = if radius_z > 0.0 {
                    ((dz * dz) as f64) / (radius_z * radius_z)
                } else {
                    0.0
                };
                planar + axial <= 1.0
            })
            .collect();
        Ok(Self { offsets })
    }

    /// 圆柱邻域: 水平半径 `radius_xy`, 切片方向半高 `half_z`.
    pub fn cylinder(radius_xy: f64, half_z: f64) -> SegResult<Self> {
        check_radius(radius_xy, half_z)?;
        let (rxy, rz) = (radius_xy.floor() as isize, half_z.floor() as isize);
        let r2 = radius_xy * radius_xy;
        let offsets = iproduct!(-rz..=rz, -rxy..=rxy, -rxy..=rxy)
            .filter(|&o| o != (0, 0, 0))
            .filter(|&(_, dh, dw)| ((dh * dh + dw * dw) as f64) <= r2)
            .collect();
        Ok(Self { offsets })
    }

    /// 按体素分辨率修正的球形邻域: 物理半径为 `radius_xy` 个水平体素,
    /// 切片方向半径按 `calibration` 的各向异性比例缩小.
    pub fn scaled(radius_xy: f64, calibration: Calibration) -> SegResult<Self> {
        Self::ellipsoid(radius_xy, radius_xy / calibration.anisotropy())
    }

    /// 偏移量个数.
    #[inline]
    pub fn len(&self) -> usize {
        self.offsets.len()
    }

    /// 是否为空邻域.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.offsets.is_empty()
    }

    /// 全部偏移量.
    #[inline]
    pub fn offsets(&self) -> &[Offset3d] {
        &self.offsets
    }

    /// 获取 `pos` 在 `shape` 范围内的全部邻域体素.
    #[inline]
    pub fn around(&self, pos: Idx3d, shape: Idx3d) -> impl Iterator<Item = Idx3d> + '_ {
        self.offsets
            .iter()
            .filter_map(move |off| shift(pos, *off, shape))
    }
}

fn check_radius(radius_xy: f64, radius_z: f64) -> SegResult<()> {
    let valid = |r: f64| r.is_finite() && r >= 0.0;
    if valid(radius_xy) && valid(radius_z) {
        Ok(())
    } else {
        Err(SegError::InvalidParameter(format!(
            "邻域半径非法: xy = {radius_xy}, z = {radius_z}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connectivity_counts() {
        for c in [
            Connectivity::Six,
            Connectivity::Eighteen,
            Connectivity::TwentySix,
        ] {
            assert_eq!(c.offsets().len(), c.count() as usize);
            assert_eq!(c.forward_offsets().len() * 2, c.count() as usize);
            assert_eq!(Connectivity::from_count(c.count()), Ok(c));
        }
        assert!(Connectivity::from_count(8).is_err());
    }

    #[test]
    fn test_neighbours_clipped() {
        let shape = (3, 3, 3);
        assert_eq!(Connectivity::Six.neighbours((0, 0, 0), shape).count(), 3);
        assert_eq!(Connectivity::Six.neighbours((1, 1, 1), shape).count(), 6);
        assert_eq!(Connectivity::TwentySix.neighbours((0, 0, 0), shape).count(), 7);
        assert_eq!(
            Connectivity::TwentySix.neighbours((1, 1, 1), shape).count(),
            26
        );
        // 行优先序之后的邻居.
        let fwd: Vec<_> = Connectivity::Six.forward_neighbours((1, 1, 1), shape).collect();
        assert_eq!(fwd, vec![(1, 1, 2), (1, 2, 1), (2, 1, 1)]);
    }

    #[test]
    fn test_shift() {
        assert_eq!(shift((0, 0, 0), (-1, 0, 0), (2, 2, 2)), None);
        assert_eq!(shift((0, 0, 1), (0, 0, 1), (2, 2, 2)), None);
        assert_eq!(shift((1, 1, 1), (-1, -1, -1), (2, 2, 2)), Some((0, 0, 0)));
    }

    #[test]
    fn test_neighbourhood_shapes() {
        // 平面圆盘, 半径 1.5: 3x3 去掉中心.
        let n = Neighbourhood::ellipsoid(1.5, 0.0).unwrap();
        assert_eq!(n.len(), 8);

        // 半径 1 的球: 6 邻域.
        let n = Neighbourhood::ellipsoid(1.0, 1.0).unwrap();
        assert_eq!(n.len(), 6);

        // 圆柱 1.5 x 1: 3 层 3x3 去掉中心.
        let n = Neighbourhood::cylinder(1.5, 1.0).unwrap();
        assert_eq!(n.len(), 26);

        // 切片方向分辨率为水平方向的 4 倍时, 半径 3 的邻域在 z 方向不超过 0 层.
        let c = Calibration::new(1.0, 4.0).unwrap();
        let n = Neighbourhood::scaled(3.0, c).unwrap();
        assert!(n.offsets().iter().all(|o| o.0 == 0));

        assert!(Neighbourhood::ellipsoid(-1.0, 0.0).is_err());
    }
}
