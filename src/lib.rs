//! Workspace root for the fireline wearable telemetry pipeline.
//!
//! This crate holds no runtime code of its own; `edge-agent` and
//! `telemetry-server` are the deployable binaries, `fireline-protocol` and
//! `fireline-parse` are the shared libraries. The only thing that lives
//! here is `tests/integration/*`, which exercises those crates together
//! the way a single component's tests cannot.
