// Utility functions
// Signature verification and startup secret checks.

pub mod secrets;
pub mod signature;

pub use secrets::validate_secrets;
pub use signature::{SIGNATURE_HEADER, compute_signature, verify_signature};
