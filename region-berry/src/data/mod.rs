//! 三维体数据: 标量场 (强度图, 距离图, 变换图) 与前景掩膜.
//!
//! 所有网格均按 `(z, h, w)` 模式访问, 与 [`crate::Idx3d`] 一致.
//! 分割核心只读取这些数据, 从不做文件 IO.

use std::ops::{Index, IndexMut};

use ndarray::{Array3, ArrayView3, ArrayViewMut3, Axis};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{SegError, SegResult};
use crate::Idx3d;

pub mod neighbour;

pub use neighbour::{Connectivity, Neighbourhood};

/// 体素的物理尺寸, 以毫米 (或任意统一长度单位) 表示.
///
/// 水平切片内部各向同性 (`xy_mm`), 切片方向单独给出 (`z_mm`).
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Calibration {
    xy_mm: f64,
    z_mm: f64,
}

impl Calibration {
    /// 构造分辨率. 两个分量都必须是正的有限值.
    pub fn new(xy_mm: f64, z_mm: f64) -> SegResult<Self> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(xy_mm) && valid(z_mm) {
            Ok(Self { xy_mm, z_mm })
        } else {
            Err(SegError::InvalidCalibration { xy_mm, z_mm })
        }
    }

    /// 各向同性的单位分辨率.
    #[inline]
    pub const fn unit() -> Self {
        Self {
            xy_mm: 1.0,
            z_mm: 1.0,
        }
    }

    /// 水平切片内的体素分辨率.
    #[inline]
    pub fn xy_mm(&self) -> f64 {
        self.xy_mm
    }

    /// 切片方向的体素分辨率.
    #[inline]
    pub fn z_mm(&self) -> f64 {
        self.z_mm
    }

    /// 各向异性比例 `z_mm / xy_mm`.
    #[inline]
    pub fn anisotropy(&self) -> f64 {
        self.z_mm / self.xy_mm
    }

    /// 体素的实际体积.
    #[inline]
    pub fn voxel(&self) -> f64 {
        self.xy_mm * self.xy_mm * self.z_mm
    }

    /// 体素分辨率在三个维度上是否是各向同的?
    #[inline]
    pub fn is_isotropic(&self) -> bool {
        self.xy_mm == self.z_mm
    }
}

impl Default for Calibration {
    fn default() -> Self {
        Self::unit()
    }
}

/// 三维网格的共用属性和部分通用操作.
pub trait GridAttr {
    /// 获取数据形状大小 `(z, h, w)`.
    fn shape(&self) -> Idx3d;

    /// 获取体素分辨率.
    fn calibration(&self) -> Calibration;

    /// 获取水平切片个数.
    #[inline]
    fn len_z(&self) -> usize {
        self.shape().0
    }

    /// 获取数据体素个数.
    #[inline]
    fn size(&self) -> usize {
        let (z, h, w) = self.shape();
        z * h * w
    }

    /// 检查索引是否合法.
    #[inline]
    fn check(&self, (z0, h0, w0): &Idx3d) -> bool {
        let (z, h, w) = self.shape();
        *z0 < z && *h0 < h && *w0 < w
    }

    /// 是否只有一个水平切片 (即二维图像).
    #[inline]
    fn is_planar(&self) -> bool {
        self.len_z() == 1
    }
}

/// 只读的稠密三维标量场, 例如到背景的欧氏距离图 (EDM) 或径向对称变换图.
#[derive(Debug, Clone)]
pub struct ScalarField {
    data: Array3<f32>,
    calibration: Calibration,
}

impl GridAttr for ScalarField {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl Index<Idx3d> for ScalarField {
    type Output = f32;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for ScalarField {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl ScalarField {
    /// 由 `(z, h, w)` 组织的数据直接创建.
    #[inline]
    pub fn new(data: Array3<f32>, calibration: Calibration) -> Self {
        Self { data, calibration }
    }

    /// 全零标量场.
    #[inline]
    pub fn zeros(shape: Idx3d, calibration: Calibration) -> Self {
        Self::new(Array3::zeros(shape), calibration)
    }

    /// 按坐标逐点生成标量场.
    #[inline]
    pub fn from_fn<F: FnMut(Idx3d) -> f32>(shape: Idx3d, calibration: Calibration, f: F) -> Self {
        Self::new(Array3::from_shape_fn(shape, f), calibration)
    }

    /// 获取给定位置的值. 越界时返回 `None`.
    #[inline]
    pub fn get(&self, pos: Idx3d) -> Option<f32> {
        self.data.get(pos).copied()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, f32> {
        self.data.view()
    }

    /// 获得数据的一份可变 shallow copy.
    #[inline]
    pub fn data_mut(&mut self) -> ArrayViewMut3<'_, f32> {
        self.data.view_mut()
    }

    /// 直接获得内部数据的所有权.
    #[inline]
    pub fn into_raw(self) -> Array3<f32> {
        self.data
    }

    /// 以 `f64` 收集由 `it` 给出的所有索引对应的值.
    ///
    /// 如果存在越界索引, 则程序 panic.
    pub fn values<I: IntoIterator<Item = Idx3d>>(&self, it: I) -> Vec<f64> {
        it.into_iter().map(|p| self[p] as f64).collect()
    }

    /// 获取第 `z_index` 层水平切片, 作为单层标量场.
    ///
    /// 当 `z_index` 越界时 panic.
    pub fn plane(&self, z_index: usize) -> ScalarField {
        let sli = self.data.index_axis(Axis(0), z_index).insert_axis(Axis(0));
        Self::new(sli.to_owned(), self.calibration)
    }
}

/// 稠密三维前景掩膜.
#[derive(Debug, Clone, PartialEq)]
pub struct Mask {
    data: Array3<bool>,
    calibration: Calibration,
}

impl GridAttr for Mask {
    #[inline]
    fn shape(&self) -> Idx3d {
        self.data.dim()
    }

    #[inline]
    fn calibration(&self) -> Calibration {
        self.calibration
    }
}

impl Index<Idx3d> for Mask {
    type Output = bool;

    #[inline]
    fn index(&self, index: Idx3d) -> &Self::Output {
        &self.data[index]
    }
}

impl IndexMut<Idx3d> for Mask {
    #[inline]
    fn index_mut(&mut self, index: Idx3d) -> &mut Self::Output {
        &mut self.data[index]
    }
}

impl Mask {
    /// 由 `(z, h, w)` 组织的数据直接创建.
    #[inline]
    pub fn new(data: Array3<bool>, calibration: Calibration) -> Self {
        Self { data, calibration }
    }

    /// 每个体素都取 `value` 的掩膜.
    #[inline]
    pub fn filled(shape: Idx3d, calibration: Calibration, value: bool) -> Self {
        Self::new(Array3::from_elem(shape, value), calibration)
    }

    /// 按坐标逐点生成掩膜.
    #[inline]
    pub fn from_fn<F: FnMut(Idx3d) -> bool>(shape: Idx3d, calibration: Calibration, f: F) -> Self {
        Self::new(Array3::from_shape_fn(shape, f), calibration)
    }

    /// 以 `field > threshold` 生成掩膜. 分辨率与 `field` 相同.
    pub fn above(field: &ScalarField, threshold: f32) -> Self {
        Self::new(
            field.data().mapv(|v| v > threshold),
            field.calibration(),
        )
    }

    /// 判断某位置是否为前景. 越界时返回 `false`.
    #[inline]
    pub fn contains(&self, pos: Idx3d) -> bool {
        self.data.get(pos).copied().unwrap_or(false)
    }

    /// 前景体素个数.
    #[inline]
    pub fn count(&self) -> usize {
        self.data.iter().filter(|p| **p).count()
    }

    /// 该掩膜是否为全背景?
    #[inline]
    pub fn is_background(&self) -> bool {
        !self.data.iter().any(|p| *p)
    }

    /// 收集所有前景体素对应的下标. 结果按行优先存储.
    pub fn foreground_pos(&self) -> Vec<Idx3d> {
        self.data
            .indexed_iter()
            .filter_map(|(pos, p)| p.then_some(pos))
            .collect()
    }

    /// 获得数据的一份不可变 shallow copy.
    #[inline]
    pub fn data(&self) -> ArrayView3<'_, bool> {
        self.data.view()
    }

    /// 直接获得内部数据的所有权.
    #[inline]
    pub fn into_raw(self) -> Array3<bool> {
        self.data
    }
}
