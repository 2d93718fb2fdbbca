pub mod cli;
pub mod config;
pub mod runtime;
pub mod sampler;
pub mod stats;
