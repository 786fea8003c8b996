use std::fmt;


#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum Error {
    Truncated { position: usize },
    InvalidTag { tag: u8, position: usize },
    OutputOverrun { position: usize, length: usize, output_size: usize },
    InvalidFraming { reason: &'static str },
    TooLarge { size: usize },
}
impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Truncated { position }
                => write!(f, "compressed data ends unexpectedly at {}", position),
            Self::InvalidTag { tag, position }
                => write!(f, "invalid instruction tag {:#04X} at {}", tag, position),
            Self::OutputOverrun { position, length, output_size }
                => write!(f, "writing {} bytes at {} overruns the {}-byte output", length, position, output_size),
            Self::InvalidFraming { reason }
                => write!(f, "invalid data resource framing: {}", reason),
            Self::TooLarge { size }
                => write!(f, "{} bytes of data are too many to address with 32-bit offsets", size),
        }
    }
}
impl std::error::Error for Error {
}
