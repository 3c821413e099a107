//! Evaluation client: one bound backend, built once per run.
//!
//! Implementation details are split into submodules under `src/client/`.

pub mod builder;
pub mod core;

pub use builder::EvalClientBuilder;
pub use core::{CallStats, EvalClient};
