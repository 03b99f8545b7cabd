use std::fmt;

use log::debug;

/// Sink for lexical and syntax errors. The scanner and parser only write to it.
pub trait ErrorReporter {
    fn report(&mut self, line: u32, location: &str, message: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub line: u32,
    pub location: String,
    pub message: String,
}

impl Diagnostic {
    pub fn new(line: u32, location: &str, message: &str) -> Self {
        Diagnostic {
            line,
            location: location.to_string(),
            message: message.to_string(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.location.is_empty() {
            write!(f, "[line {}] Error: {}", self.line, self.message)
        } else {
            write!(
                f,
                "[line {}] Error {}: {}",
                self.line, self.location, self.message
            )
        }
    }
}

#[derive(Debug, Default)]
pub struct ConsoleReporter {
    error_count: usize,
}

impl ConsoleReporter {
    pub fn had_error(&self) -> bool {
        self.error_count > 0
    }

    pub fn error_count(&self) -> usize {
        self.error_count
    }

    pub fn reset(&mut self) {
        self.error_count = 0;
    }
}

impl ErrorReporter for ConsoleReporter {
    fn report(&mut self, line: u32, location: &str, message: &str) {
        let diagnostic = Diagnostic::new(line, location, message);
        debug!("reporting {:?}", diagnostic);
        eprintln!("{}", diagnostic);
        self.error_count += 1;
    }
}

#[derive(Debug, Default)]
pub struct Diagnostics {
    diagnostics: Vec<Diagnostic>,
}

impl Diagnostics {
    pub fn had_error(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub fn len(&self) -> usize {
        self.diagnostics.len()
    }

    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Diagnostic> {
        self.diagnostics.iter()
    }

    pub fn messages(&self) -> Vec<String> {
        self.diagnostics.iter().map(ToString::to_string).collect()
    }
}

impl ErrorReporter for Diagnostics {
    fn report(&mut self, line: u32, location: &str, message: &str) {
        let diagnostic = Diagnostic::new(line, location, message);
        debug!("collecting {:?}", diagnostic);
        self.diagnostics.push(diagnostic);
    }
}
