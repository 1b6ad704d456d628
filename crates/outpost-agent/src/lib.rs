//! Outpost agent runtime assembly.
//!
//! Wires the configured security policy, the standard dispatch table, and
//! the three capability handlers into an execution engine, then hands the
//! engine to the transport poller. The binary in `main.rs` is a thin CLI
//! over [`runtime`].

pub mod runtime;

pub use runtime::{build_engine, exec_local, run};
