//! Registry, hardware probe, router, resident manager, streaming runner, and
//! benchmark harness for the ARIV inference gateway.
//!
//! This crate has no process entrypoint of its own; `ariv-server` links it
//! as a library for both the HTTP frontend and the control CLI.

pub mod bench;
pub mod config;
pub mod manager;
pub mod probe;
pub mod registry;
pub mod router;
pub mod runner;

pub use bench::BenchmarkHarness;
pub use config::AppConfig;
pub use manager::ResidentManager;
pub use probe::HardwareProbe;
pub use registry::Registry;
pub use runner::{ChatParams, RunnerState, StreamSession, StreamingRunner};
