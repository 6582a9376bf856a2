mod router;
mod runner;

pub use router::{RouterStats, StreamRouter};
pub use runner::{jitter_for, RunnerStats, StreamRunner};
