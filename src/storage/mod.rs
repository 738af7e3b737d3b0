//! Storage module for binary model persistence.

mod format;

pub use format::{ModelFormat, ModelHeader, HEADER_SIZE};
