//! Session context: compact notation and size-bounded compression.
//!
//! - **[`toon`]** encodes flat session records as `key: value` lines that
//!   cost far fewer tokens than JSON when fed back to the model.
//! - **[`compressor`]** keeps an encoded record under the compression
//!   budget, summarizing old turns and failing loudly past the hard ceiling.

pub mod compressor;
pub mod toon;

pub use compressor::{CompressionError, CompressionMode, compress};
pub use toon::{Record, Value};
