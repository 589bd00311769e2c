mod profile;

use region_berry::prelude::*;

pub use profile::Profile;

/// 一组分裂合并参数.
#[derive(Copy, Clone, Debug)]
pub struct Setting {
    pub name: &'static str,
    pub threshold: f64,
    pub normalize: bool,
}

impl Setting {
    /// 直接使用中位 EDM 值的倒数作为界面取值.
    pub const fn raw(name: &'static str, threshold: f64) -> Self {
        Self {
            name,
            threshold,
            normalize: false,
        }
    }

    /// 使用局部极大值归一化后的界面取值.
    pub const fn normalized(name: &'static str, threshold: f64) -> Self {
        Self {
            name,
            threshold,
            normalize: true,
        }
    }

    fn config(&self) -> SplitMergeConfig {
        SplitMergeConfig::default()
            .with_threshold(self.threshold)
            .with_normalize(self.normalize)
    }
}

/// 在每个体数据上运行 EDM 分裂合并, 统计种子, 融合次数与耗时.
pub fn split_and_merge(setting: &Setting, volumes: &[Mask]) -> Profile {
    let mut profile = Profile::new();
    for (idx, mask) in volumes.iter().enumerate() {
        if mask.is_background() {
            profile.count_trivial();
            continue;
        }
        log::debug!("{}: volume {idx}...", setting.name);

        profile.count_target(true);
        let edm = distance_map(mask);
        let outcome = SplitAndMergeEdm::new(&edm, setting.config()).and_then(|sm| {
            let split = sm.split(mask)?;
            let seeds = split.len();
            sm.merge(split, None).map(|c| (seeds, c))
        });
        profile.target_elapsed();

        match outcome {
            Ok((seeds, c)) => profile.count_result(seeds, c.fusions.len(), c.population.len()),
            Err(e) => log::error!("{}: volume {idx} failed: {e}", setting.name),
        }
    }
    profile.finish()
}
