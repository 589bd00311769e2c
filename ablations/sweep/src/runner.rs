//! 程序运行函数.

use crate::algos::{self, Setting};
use crate::result::AblationResult;
use std::thread;
use utils::phantom;

/// 参与比较的配置.
const SETTINGS: [Setting; 6] = [
    Setting::raw("raw@0.3", 0.3),
    Setting::raw("raw@0.8", 0.8),
    Setting::raw("raw@1.5", 1.5),
    Setting::normalized("norm@0.3", 0.3),
    Setting::normalized("norm@0.5", 0.5),
    Setting::normalized("norm@0.8", 0.8),
];

/// 实际运行.
pub fn run() -> AblationResult {
    let volumes = phantom::suite();
    assert!(!volumes.is_empty(), "Empty phantom suite");
    log::info!(
        "Running ablation studies on {} volumes with {} cores...",
        volumes.len(),
        utils::cpus()
    );

    let volumes = volumes.as_slice();
    thread::scope(|s| {
        let handles = SETTINGS.map(|t| s.spawn(move || algos::split_and_merge(&t, volumes)));

        AblationResult::from_iter(
            SETTINGS.iter().map(|t| t.name).zip(
                handles
                    .into_iter()
                    .map(|th| th.join().expect("Thread joining error")),
            ),
        )
    })
}
