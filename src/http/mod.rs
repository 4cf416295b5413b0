//! HTTP protocol layer module
//!
//! Provides HTTP protocol-related base functionality, decoupled from routing
//! and handler logic.

pub mod mime;
pub mod response;

// Re-export commonly used functions
pub use response::{build_response, set_server_header};
