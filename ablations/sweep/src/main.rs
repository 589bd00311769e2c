//! 分裂阈值与归一化方式的消融实验.

mod algos;
mod result;
mod runner;

fn main() {
    simple_logger::init_with_level(log::Level::Info).expect("Logger initialization error");
    runner::run().analyze();
}
