use std::{
    fs,
    io::{self, BufRead, Write},
    path::Path,
};

use log::{debug, info};
use thiserror::Error;

use crate::{
    parser::Parser,
    printers::{AstPrinter, RpnPrinter},
    reporter::ConsoleReporter,
    scanner::Scanner,
};

pub type LoxResult = Result<(), LoxError>;

#[derive(Debug, Error)]
pub enum LoxError {
    #[error(transparent)]
    Io(#[from] io::Error),
    #[error("{0} error(s) reported")]
    Reported(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Emit {
    #[default]
    Ast,
    Rpn,
    // The parser does not run
    Tokens,
}

#[derive(Default)]
pub struct Lox {
    emit: Emit,
    reporter: ConsoleReporter,
}

impl Lox {
    pub fn new(emit: Emit) -> Self {
        Lox {
            emit,
            reporter: ConsoleReporter::default(),
        }
    }

    pub fn had_error(&self) -> bool {
        self.reporter.had_error()
    }

    pub fn run_file<P: AsRef<Path>>(&mut self, path: P) -> LoxResult {
        let path = path.as_ref();
        info!("running {}", path.display());

        let source = fs::read_to_string(path)?;
        self.run(&source, &mut io::stdout().lock())?;

        if self.reporter.had_error() {
            return Err(LoxError::Reported(self.reporter.error_count()));
        }

        Ok(())
    }

    pub fn run_prompt(&mut self) -> LoxResult {
        let mut stdout = io::stdout();
        print!("> ");
        stdout.flush()?;

        let stdin = io::stdin();
        for line in stdin.lock().lines() {
            let line = line?;
            if !line.trim().is_empty() {
                self.run(&line, &mut stdout)?;
            }

            // A mistake on one line must not poison the next one
            self.reporter.reset();

            print!("> ");
            stdout.flush()?;
        }

        Ok(())
    }

    pub fn run<W: Write>(&mut self, source: &str, out: &mut W) -> io::Result<()> {
        let errors_before = self.reporter.error_count();
        let tokens = Scanner::new(source).scan_tokens(&mut self.reporter);

        if self.emit == Emit::Tokens {
            for token in &tokens {
                writeln!(out, "{}", token)?;
            }
            return Ok(());
        }

        // Tokens from a source with lexical errors are not worth parsing
        if self.reporter.error_count() > errors_before {
            debug!("skipping parse after lexical errors");
            return Ok(());
        }

        let Some(expression) = Parser::new(tokens).parse(&mut self.reporter) else {
            return Ok(());
        };

        let rendered = match self.emit {
            Emit::Rpn => RpnPrinter.print(&expression),
            _ => AstPrinter.print(&expression),
        };
        writeln!(out, "{}", rendered)
    }
}
