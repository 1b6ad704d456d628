//! Security policy evaluation for Outpost commands.
//!
//! Every command passes through [`SecurityPolicy::evaluate`] before any
//! handler is invoked. The policy realizes the command's effective
//! operation string (the literal shell line, file path, or browser target
//! it would touch) and tests it against a configured set of blocked
//! patterns.

pub mod builtin;
pub mod engine;
pub mod verdict;

pub use builtin::DEFAULT_BLOCKED_PATTERNS;
pub use engine::SecurityPolicy;
pub use verdict::PolicyVerdict;
