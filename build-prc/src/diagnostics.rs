use std::fmt;
use std::process::ExitCode;

use tracing::{error, warn};


#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum Severity {
    Warning,
    Error,
}

#[derive(Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Diagnostic {
    pub severity: Severity,

    /// The file (or other source) the diagnostic is about.
    pub origin: String,

    pub message: String,
}
impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        write!(f, "{}: {}: {}", self.origin, label, self.message)
    }
}


/// Collects the problems found while processing inputs and decides the exit status.
#[derive(Clone, Debug, Default, Eq, Hash, PartialEq)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
}
impl Diagnostics {
    pub const EXIT_USAGE: u8 = 1;
    pub const EXIT_FATAL: u8 = 2;
    pub const EXIT_WARNINGS: u8 = 3;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn warn<O: fmt::Display, M: fmt::Display>(&mut self, origin: O, message: M) {
        let diagnostic = Diagnostic {
            severity: Severity::Warning,
            origin: origin.to_string(),
            message: message.to_string(),
        };
        warn!("{}: {}", diagnostic.origin, diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn error<O: fmt::Display, M: fmt::Display>(&mut self, origin: O, message: M) {
        let diagnostic = Diagnostic {
            severity: Severity::Error,
            origin: origin.to_string(),
            message: message.to_string(),
        };
        error!("{}: {}", diagnostic.origin, diagnostic.message);
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] { &self.entries }

    pub fn warning_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Warning).count()
    }

    pub fn error_count(&self) -> usize {
        self.entries.iter().filter(|d| d.severity == Severity::Error).count()
    }

    pub fn has_errors(&self) -> bool {
        self.error_count() > 0
    }

    /// Takes over the entries of another collector without logging them again.
    pub fn merge(&mut self, other: Diagnostics) {
        self.entries.extend(other.entries);
    }

    pub fn exit_status(&self) -> u8 {
        if self.has_errors() {
            Self::EXIT_FATAL
        } else if self.warning_count() > 0 {
            Self::EXIT_WARNINGS
        } else {
            0
        }
    }

    pub fn exit_code(&self) -> ExitCode {
        ExitCode::from(self.exit_status())
    }
}


#[cfg(test)]
mod tests {
    use super::{Diagnostics, Severity};
    use tracing_test::traced_test;

    #[test]
    #[traced_test]
    fn test_exit_status() {
        let mut diagnostics = Diagnostics::new();
        assert_eq!(diagnostics.exit_status(), 0);

        diagnostics.warn("a.bin", "something odd");
        assert_eq!(diagnostics.exit_status(), Diagnostics::EXIT_WARNINGS);
        assert!(logs_contain("a.bin: something odd"));

        let mut other = Diagnostics::new();
        other.error("b.prc", "corrupt");
        diagnostics.merge(other);
        assert_eq!(diagnostics.warning_count(), 1);
        assert_eq!(diagnostics.error_count(), 1);
        assert_eq!(diagnostics.exit_status(), Diagnostics::EXIT_FATAL);
        assert_eq!(diagnostics.entries()[1].severity, Severity::Error);
        assert_eq!(diagnostics.entries()[1].to_string(), "b.prc: error: corrupt");
    }
}
