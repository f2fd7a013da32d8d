//! Operator-invoked maintenance operations

pub mod verify;

pub use verify::{verify_backends, AttachmentMismatch, VerifyReport};
