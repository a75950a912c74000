//! perflog - self-healing, configuration-driven telemetry sampler.
//!
//! On a fixed cadence the library reads a fixed catalogue of host and
//! per-process metrics from `/proc`, filters them through a persisted
//! enable/disable configuration, and appends them as tab-delimited records
//! to a count-rotated set of log files. The `perflogd` binary wires the
//! pieces together.

pub mod catalog;
pub mod collector;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod writer;
