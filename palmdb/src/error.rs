use std::fmt;


#[derive(Debug)]
pub enum FormatError {
    Io(std::io::Error),
    Truncated { needed: usize, available: usize },
    Corrupt { offset: u64, lower_bound: usize, upper_bound: usize },
    UnsupportedMultiDirectory { next_directory: u32 },
    WrongDatabaseKind { expected_resource: bool },
    DuplicateKey { key: String },
    TooLarge,
}
impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Io(e)
                => write!(f, "I/O error: {}", e),
            Self::Truncated { needed, available }
                => write!(f, "file truncated: need at least {} bytes, have {}", needed, available),
            Self::Corrupt { offset, lower_bound, upper_bound }
                => write!(f, "corrupt directory: entry offset {} not within {}..={} (file truncated or directory scrambled)", offset, lower_bound, upper_bound),
            Self::UnsupportedMultiDirectory { next_directory }
                => write!(f, "unsupported multi-directory database (next directory at {:#010X})", next_directory),
            Self::WrongDatabaseKind { expected_resource: true }
                => write!(f, "expected a resource database, found a record database"),
            Self::WrongDatabaseKind { expected_resource: false }
                => write!(f, "expected a record database, found a resource database"),
            Self::DuplicateKey { key }
                => write!(f, "directory lists {} more than once", key),
            Self::TooLarge
                => write!(f, "database too large for 32-bit offsets"),
        }
    }
}
impl std::error::Error for FormatError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Truncated { .. } => None,
            Self::Corrupt { .. } => None,
            Self::UnsupportedMultiDirectory { .. } => None,
            Self::WrongDatabaseKind { .. } => None,
            Self::DuplicateKey { .. } => None,
            Self::TooLarge => None,
        }
    }
}
impl From<std::io::Error> for FormatError {
    fn from(value: std::io::Error) -> Self { Self::Io(value) }
}
