//! Browser session capability handler for Outpost.
//!
//! Drives a locally-launched Chrome/Chromium instance over the DevTools
//! Protocol. The crate is split into four layers:
//!
//! - **`cdp`**: WebSocket JSON-RPC client with command/response correlation
//!   for one DevTools page target.
//! - **`launch`**: browser binary discovery, process spawn with
//!   `--remote-debugging-port`, and the DevTools HTTP endpoints used for
//!   tab lifecycle (`/json/list`, `/json/new`, `/json/close`).
//! - **`session`**: [`session::BrowserSession`], owning the child process
//!   and the open tabs; navigation, JavaScript evaluation, element
//!   interaction, page content, and web search.
//! - **`handler`**: [`handler::BrowserHandler`], the dispatch surface. The
//!   session is created lazily on the first command that needs it and
//!   reused by subsequent commands; `close_session` (or shutdown) tears it
//!   down. A `Browser` trait seam lets tests run the handler against a
//!   fake session.

pub mod cdp;
pub mod error;
pub mod handler;
pub mod launch;
pub mod session;

pub use error::BrowserError;
pub use handler::{Browser, BrowserBackend, BrowserHandler, PageContent, SearchResult};
pub use session::BrowserSession;
