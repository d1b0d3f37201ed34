//! mbz-daemon library surface.
//!
//! Exposed so integration tests can build the router in-process without
//! binding a socket.

pub mod api_types;
pub mod routes;
pub mod state;
