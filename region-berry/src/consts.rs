//! 通用常量.

/// 背景 (未分割) 体素在标签图中的值. 合法区域标签从 1 开始.
pub const BACKGROUND_LABEL: u32 = 0;

/// 细桥保护: 接触体素 (含重复体素) 不超过该数量的界面被视为细桥.
pub const TINY_BRIDGE_MAX_CONTACTS: usize = 2;

/// 细桥保护: 两个区域都 **大于** 该体素数时, 细桥不允许触发融合.
pub const TINY_BRIDGE_MIN_REGION_SIZE: usize = 10;

/// `DivisionCriterion::Dy` 的常用系数.
pub const DEFAULT_DY_FACTOR: f64 = 0.75;

/// EDM 归一化时, 局部极大值滤波的 xy 半径 (体素).
pub const EDM_LOCAL_MAX_RADIUS: f64 = 3.0;

/// EDM 归一化时, 局部极大值的 EDM 下限. 更小的极大值不参与归一化.
pub const EDM_LOCAL_MAX_MIN_VALUE: f64 = 0.5;

/// EDM 分裂时, 种子 (局部极大值) 滤波的 xy 半径 (体素).
pub const EDM_SEED_RADIUS: f64 = 1.5;

/// 斑点种子检测所用圆柱邻域的 xy 半径 (体素).
pub const SPOT_SEED_RADIUS_XY: f64 = 1.5;

/// 斑点种子检测所用圆柱邻域的 z 半高 (体素).
pub const SPOT_SEED_RADIUS_Z: f64 = 1.0;
