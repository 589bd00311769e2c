//! 区域后处理过滤器.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use super::Region;

/// 对分割结果做逐区域筛选.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum PopulationFilter {
    /// 保留体素数位于 `[min, max]` 之间的区域. `max` 为 `None` 时不设上限.
    Size {
        /// 最小体素数 (含).
        min: usize,
        /// 最大体素数 (含).
        max: Option<usize>,
    },

    /// 移除在水平方向 (x 或 y) 上只有一个体素宽的扁平区域.
    RemoveFlatObjects,
}

impl PopulationFilter {
    /// 区域 `region` 是否保留.
    pub fn keep(&self, region: &Region) -> bool {
        match *self {
            Self::Size { min, max } => {
                let s = region.size();
                s >= min && max.map_or(true, |m| s <= m)
            }
            Self::RemoveFlatObjects => {
                let (_, h, w) = region.bounds().extent();
                h > 1 && w > 1
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keep() {
        let line = Region::new(1, (0..4).map(|w| (0, 2, w)).collect());
        let square = Region::new(2, itertools::iproduct!(0..1, 0..2, 0..2).collect());

        let flat = PopulationFilter::RemoveFlatObjects;
        assert!(!flat.keep(&line));
        assert!(flat.keep(&square));

        let size = PopulationFilter::Size { min: 4, max: None };
        assert!(size.keep(&line));
        assert!(size.keep(&square));

        let size = PopulationFilter::Size {
            min: 1,
            max: Some(3),
        };
        assert!(!size.keep(&line));
    }
}
