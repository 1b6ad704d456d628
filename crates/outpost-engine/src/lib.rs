//! Command dispatch and execution for Outpost.
//!
//! The [`dispatch`] module maps action identifiers to handler bindings
//! through a closed registry built at startup; unknown actions are a typed
//! error, never a crash. The [`engine`] module drives the full pipeline:
//! shape validation, policy gate, dispatch resolution, timeout-bounded
//! handler invocation, and result normalization. The [`confirm`] module
//! provides the out-of-band approval seam for policies that require
//! confirmation.

pub mod confirm;
pub mod dispatch;
pub mod engine;

pub use confirm::{ChannelGate, ConfirmationGate, ConfirmationRequest, DenyAllGate};
pub use dispatch::{ActionId, Binding, DispatchTable, HandlerKind, ParamKind, ResolveError};
pub use engine::{EngineConfig, ExecutionEngine};
