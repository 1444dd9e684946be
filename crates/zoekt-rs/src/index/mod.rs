//! Turning a directory tree into documents for the shard writer.

mod builder;
mod utils;

pub use builder::IndexBuilder;
pub use utils::is_text;
