#![warn(missing_docs)] // <= 合适时移除它.
// #![warn(clippy::missing_docs_in_private_items)]  // <= too strict.

//! 核心库. 提供显微图像三维体数据上的区域分裂-合并分割算法.
//!
//! 该 crate 目前仅提供 `safe` 接口, 不做任何文件 IO: 输入均为已在内存中的
//! 稠密标量场与前景掩膜, 输出为带标签的区域集合.
//!
//! # 注意
//!
//! 1. 所有体数据按 `(z, h, w)` 组织, 与 [`Idx3d`] 一致. 几何中心等实数坐标按 `[z, y, x]` 给出.
//! 2. 配置错误以 [`SegError`] 返回. 在非期望情况下 (例如两个区域共享体素),
//!   程序会直接 panic, 而不会导致内存错误. As what Rust promises.
//! 3. 库内部只通过 `log` 门面输出日志, 从不安装 logger.
//!
//! # 开发计划
//!
//! ### 体数据, 邻接关系与邻域 ✅
//!
//! 标量场, 前景掩膜, 体素分辨率, 6/18/26-邻接和椭球/圆柱邻域.
//!
//! 实现位于 `region-berry/src/data`.
//!
//! ### 区域与区域集合 ✅
//!
//! 包围盒, 几何中心, 质心, 标签图互转, 重新编号, 尺寸和扁平过滤.
//!
//! 实现位于 `region-berry/src/region`.
//!
//! ### 种子分水岭 ✅
//!
//! 递增/递减泛洪, 阈值传播, 相同取值时先进先出. 局部极值种子与阈值筛选.
//!
//! 实现位于 `region-berry/src/watershed`.
//!
//! ### 区域邻接图与贪心收缩 ✅
//!
//! 1. 界面按半邻域、行优先序建立, 结果与哈希顺序无关. ✅
//! 2. 优先队列惰性删除 (版本号校验). ✅
//! 3. 融合时界面合并或改为指向保留区域. ✅
//! 4. 细桥保护, `Dy` / `DivMap` 二级判据. ✅
//!
//! 实现位于 `region-berry/src/cluster`.
//!
//! ### EDM 分裂合并 ✅
//!
//! 可分离精确欧氏距离变换 (支持各向异性), 局部极大值归一化的界面取值.
//!
//! 实现位于 `region-berry/src/edm`.
//!
//! ### 斑点分割 ✅
//!
//! 径向对称图上的种子分水岭, 中心与质量评分.
//!
//! 实现位于 `region-berry/src/spot.rs`.
//!
//! ### 多帧并行 ✅
//!
//! 启用 `rayon` 特性时逐帧并行.
//!
//! 实现位于 `region-berry/src/frames.rs`.
//!
//! ### 亚像素斑点定位 ⌛️
//!
//! 目前斑点中心取质心.

/// 三维索引 `(z, h, w)`, 同时也可一定程度上用作非负整数向量.
pub type Idx3d = (usize, usize, usize);

/// 标量场, 掩膜与邻接关系.
pub mod data;

pub use data::{Calibration, Connectivity, GridAttr, Mask, Neighbourhood, ScalarField};

pub mod consts;

mod error;

pub use error::{SegError, SegResult};

pub mod region;

pub mod watershed;

pub mod cluster;

pub mod edm;

pub mod spot;

pub mod frames;

pub mod prelude;
