//! The run-length/pattern codec used for initialized data segments, and the framing of the
//! `data` resource that carries its output.
//!
//! The decompressor runs on the device at load time; it makes three passes over the output
//! buffer, each starting at its own offset and ending at a zero tag.


mod compress;
mod decompress;
mod error;
pub mod instruction;
mod resource;


use std::fmt;

pub use crate::compress::compress;
pub use crate::decompress::decompress;
pub use crate::error::Error;
pub use crate::resource::{decode_data_resource, encode_data_resource, RESERVED_TRAILER_SIZE};


/// The number of passes in every compressed stream.
pub const PASS_COUNT: usize = 3;


/// How hard the compressor tries.
///
/// Level 0 emits literals only, level 1 adds runs, level 2 adds the fixed patterns and level 4
/// additionally splits the buffer around its two longest runs of zeros.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct CompressionLevel(u8);
impl CompressionLevel {
    pub const LITERAL: Self = Self(0);
    pub const RUNS: Self = Self(1);
    pub const PATTERNS: Self = Self(2);
    pub const SPLIT: Self = Self(4);
    pub const MAX: Self = Self(7);

    pub const fn new(level: u8) -> Self { Self(level) }
    pub const fn as_u8(&self) -> u8 { self.0 }

    pub const fn uses_runs(&self) -> bool { self.0 >= Self::RUNS.0 }
    pub const fn uses_patterns(&self) -> bool { self.0 >= Self::PATTERNS.0 }
    pub const fn splits_on_zeros(&self) -> bool { self.0 >= Self::SPLIT.0 }
}
impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
