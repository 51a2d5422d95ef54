pub mod artifacts;
pub mod benchmark;
pub mod benchmark_utils;
pub mod compressor;
pub mod config;
pub mod dataset;
pub mod error;
pub mod plot;
pub mod verify;
