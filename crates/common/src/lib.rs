//! Common utilities and types shared across edgeshift crates.

pub mod error;
pub mod format;
pub mod hash;
pub mod timestamp;

pub use error::{Error, RecordKind, Result};
pub use format::FileFormat;
pub use timestamp::Timestamp;

/// Generate a fresh record identifier.
pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
