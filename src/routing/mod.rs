//! Routing module
//!
//! Provides method + path pattern routing:
//! - Literal and `:name` parameter segments
//! - Conflict detection at registration time
//! - Most specific pattern wins at match time

mod matcher;
mod table;

pub use matcher::{Params, PathPattern};
pub use table::{Route, RouteTable};

/// Registration errors; any of these prevents startup
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    #[error("route {method} {pattern} conflicts with already registered {existing}")]
    Conflict {
        method: String,
        pattern: String,
        existing: String,
    },

    #[error("invalid route pattern {pattern:?}: {reason}")]
    InvalidPattern { pattern: String, reason: String },
}
