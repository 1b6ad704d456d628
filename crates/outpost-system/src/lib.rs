//! Process and OS capability handler.
//!
//! Stateless: each method spawns through the platform shell and reports the
//! uniform handler outcome. Package installs go through the platform
//! package manager (winget / brew / apt-get).

pub mod handler;
pub mod pkgmgr;

pub use handler::SystemHandler;
