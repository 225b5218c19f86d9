//! Extension seams for attaching client authentication to outbound token requests.

pub mod request_signer;

pub use request_signer::*;
