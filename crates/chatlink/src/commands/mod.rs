//! Command handlers for the chatlink CLI.

pub mod auth;
pub mod connect;
pub mod servers;

pub use auth::*;
pub use connect::*;
pub use servers::*;
