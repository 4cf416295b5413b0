//! Request handler module
//!
//! Responsible for request routing dispatch: the router, the per-request
//! context handed to handlers and the reply type they return.

pub mod context;
pub mod router;

// Re-export main entry point
pub use context::{HandlerResult, Reply, RequestContext};
pub use router::{handle_request, Router};
