//! Auth-domain identifiers, mode configuration, and delegated credentials.

pub mod config;
pub mod credential;
pub mod id;

pub use config::*;
pub use credential::*;
pub use id::*;
