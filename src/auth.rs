//! Client authentication material: credentials, redacted secrets, and the OAuth1 request signer.

pub mod credentials;
pub mod secret;
pub mod signer;

pub use credentials::*;
pub use secret::*;
pub use signer::*;
