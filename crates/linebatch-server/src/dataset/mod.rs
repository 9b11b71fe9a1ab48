//! Read-only access to the line-oriented dataset

pub mod index;
pub mod resolver;

pub use index::LineIndex;
pub use resolver::{BatchResolver, ByteRange};
