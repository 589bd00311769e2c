//! 多帧 (时间序列) 批处理. 各帧相互独立.

use crate::cluster::Contraction;
use crate::data::Mask;
use crate::edm::{distance_map, SplitAndMergeEdm, SplitMergeConfig};
use crate::error::SegResult;

cfg_if::cfg_if! {
    if #[cfg(feature = "rayon")] {
        use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
    }
}

/// 对每一帧运行 `op`, 结果按帧顺序排列.
///
/// 启用 `rayon` 特性时并行执行.
pub fn segment_frames<T, R, F>(frames: &[T], op: F) -> Vec<R>
where
    T: Sync,
    R: Send,
    F: Fn(&T) -> R + Sync + Send,
{
    cfg_if::cfg_if! {
        if #[cfg(feature = "rayon")] {
            frames.par_iter().map(op).collect()
        } else {
            frames.iter().map(op).collect()
        }
    }
}

/// 对每一帧前景掩膜计算 EDM 并运行分裂合并.
///
/// 任何一帧出错时返回第一个错误.
pub fn split_and_merge_frames(
    masks: &[Mask],
    config: &SplitMergeConfig,
) -> SegResult<Vec<Contraction>> {
    config.validate()?;
    segment_frames(masks, |mask| {
        let edm = distance_map(mask);
        SplitAndMergeEdm::new(&edm, *config)?.split_and_merge(mask, None)
    })
    .into_iter()
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Calibration;
    use crate::error::SegError;

    #[test]
    fn test_segment_frames_keeps_order() {
        let frames: Vec<usize> = (0..16).collect();
        assert_eq!(segment_frames(&frames, |v| v * 2), (0..32usize).step_by(2).collect::<Vec<_>>());
    }

    #[test]
    fn test_split_and_merge_frames() {
        let cal = Calibration::unit();
        let masks = vec![
            Mask::from_fn((1, 5, 5), cal, |(_, h, w)| (1..4).contains(&h) && (1..4).contains(&w)),
            Mask::filled((1, 5, 5), cal, false),
        ];
        let out = split_and_merge_frames(&masks, &SplitMergeConfig::default()).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].population.len(), 1);
        assert_eq!(out[0].population.total_voxels(), 9);
        assert!(out[1].population.is_empty());

        let bad = SplitMergeConfig::default().with_threshold(f64::NAN);
        assert!(matches!(
            split_and_merge_frames(&masks, &bad),
            Err(SegError::InvalidThreshold { .. })
        ));
    }
}
