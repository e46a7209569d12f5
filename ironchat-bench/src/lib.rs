//! # IronChat Bench
//!
//! Workload generators shared by the IronChat benchmarks.

pub mod workload;
