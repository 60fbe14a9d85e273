//! Extension contracts for attaching broker output to HTTP clients.

pub mod request_signer;

pub use request_signer::*;
