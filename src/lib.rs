#![deny(
    clippy::correctness,
    unused_lifetimes,
    unused_unsafe,
    single_use_lifetimes,
    missing_debug_implementations
)]
#![recursion_limit = "256"]

pub mod config;
pub mod error;
pub mod generator;
pub mod harness;
pub mod ir;
pub mod passes;
pub mod randomext;

pub use config::RunConfig;
pub use error::Error;
pub use generator::{GenerationContext, GeneratorConfig, ProgramGenerator};
pub use passes::{Pipeline, PipelineConfig};
