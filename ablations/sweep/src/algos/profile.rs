//! 算法运行统计.

use std::time::{Duration, Instant};

/// ablation/benchmark 计时器.
///
/// 该计时器支持 "中途中断" 与 "结束中断, 继续开始计时".
#[derive(Clone, Debug)]
struct AccTimer {
    consumed: Duration,
    since: Instant,
}

impl AccTimer {
    /// 初始化计时器, 视为已经开始计时.
    #[inline]
    fn new() -> Self {
        Self {
            consumed: Duration::ZERO,
            since: Instant::now(),
        }
    }

    /// 开始计时.
    #[inline]
    fn start(&mut self) {
        self.since = Instant::now();
    }

    /// 结束计时并累加. 返回本轮计时时长.
    ///
    /// 上一次调用必须是 `self.start()`.
    #[inline]
    fn elapsed(&mut self) -> Duration {
        let d = self.since.elapsed();
        self.consumed += d;
        d
    }

    #[inline]
    fn get_total_us(&self) -> u64 {
        self.consumed.as_micros() as u64
    }
}

/// ablation/benchmark 数据统计.
#[derive(Clone, Debug)]
pub struct Profile {
    /// 遇到的全背景体数据个数.
    trivial: u64,

    /// 实际分割的体数据个数.
    target: u64,

    /// 分割花费的总时间, 含 EDM 计算.
    target_time: AccTimer,

    /// 整个任务花费的总时间.
    real_time: AccTimer,

    /// 最耗时的一次分割. 尚无记录时为 `None`.
    most: Option<Duration>,

    /// 分裂阶段产生的区域总数.
    seeds: u64,

    /// 融合总次数.
    fusions: u64,

    /// 合并之后剩余的区域总数.
    regions: u64,
}

impl Profile {
    /// 初始化.
    #[inline]
    pub fn new() -> Self {
        Self {
            trivial: 0,
            target: 0,
            target_time: AccTimer::new(),
            real_time: AccTimer::new(),
            most: None,
            seeds: 0,
            fusions: 0,
            regions: 0,
        }
    }

    /// 记录一个全背景体数据.
    #[inline]
    pub fn count_trivial(&mut self) {
        self.trivial += 1;
    }

    /// 记录一个需要分割的体数据. `start` 表明是否同时开始计时.
    #[inline]
    pub fn count_target(&mut self, start: bool) {
        self.target += 1;
        if start {
            self.target_time.start();
        }
    }

    /// 结束一次分割计时.
    #[inline]
    pub fn target_elapsed(&mut self) {
        let d = self.target_time.elapsed();
        self.most = Some(self.most.map_or(d, |m| m.max(d)));
    }

    /// 记录一次分裂合并的结果.
    #[inline]
    pub fn count_result(&mut self, seeds: usize, fusions: usize, regions: usize) {
        self.seeds += seeds as u64;
        self.fusions += fusions as u64;
        self.regions += regions as u64;
    }

    /// 结束全部计时.
    #[inline]
    pub fn finish(mut self) -> Self {
        self.real_time.elapsed();
        self
    }

    #[inline]
    pub fn get_trivial(&self) -> u64 {
        self.trivial
    }

    #[inline]
    pub fn get_target(&self) -> u64 {
        self.target
    }

    #[inline]
    pub fn get_seeds(&self) -> u64 {
        self.seeds
    }

    #[inline]
    pub fn get_fusions(&self) -> u64 {
        self.fusions
    }

    /// 每个体数据合并后的平均区域数.
    #[inline]
    pub fn get_avg_regions(&self) -> Option<f64> {
        match self.target {
            0 => None,
            target => Some(self.regions as f64 / target as f64),
        }
    }

    /// 以微秒为单位获得分割的总花费时间.
    #[inline]
    pub fn get_target_time_us(&self) -> u64 {
        self.target_time.get_total_us()
    }

    /// 以微秒为单位获得整个任务的总时间.
    #[inline]
    pub fn get_real_time_us(&self) -> u64 {
        self.real_time.get_total_us()
    }

    /// 以微秒为单位获得分割的平均时间.
    #[inline]
    pub fn get_avg_target_time_us(&self) -> Option<f64> {
        match self.target {
            0 => None,
            target => Some(self.get_target_time_us() as f64 / target as f64),
        }
    }

    /// 获取最耗时的一次分割所消耗的时间.
    #[inline]
    pub fn get_most_time_consuming(&self) -> Option<Duration> {
        self.most
    }
}

impl Default for Profile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_profile_counters() {
        let mut p = Profile::new();
        assert!(p.get_avg_regions().is_none());
        assert!(p.get_most_time_consuming().is_none());

        p.count_trivial();
        p.count_target(true);
        p.target_elapsed();
        p.count_result(5, 3, 2);
        p.count_target(true);
        p.target_elapsed();
        p.count_result(2, 0, 2);
        let p = p.finish();

        assert_eq!(p.get_trivial(), 1);
        assert_eq!(p.get_target(), 2);
        assert_eq!(p.get_seeds(), 7);
        assert_eq!(p.get_fusions(), 3);
        assert_eq!(p.get_avg_regions(), Some(2.0));
        assert!(p.get_most_time_consuming().is_some());
    }
}
