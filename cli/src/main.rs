use std::{path::PathBuf, process::exit};

use clap::{Parser, ValueEnum};
use glox::{Emit, Lox, LoxError};
use log::debug;

#[derive(Parser, Debug)]
#[command(name = "glox", about = "Scans and parses Lox expressions")]
struct Args {
    /// Script to run. Starts an interactive prompt when omitted.
    script: Option<PathBuf>,

    /// What to print for each source.
    #[arg(long, value_enum, default_value_t = EmitArg::Ast)]
    emit: EmitArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum EmitArg {
    Ast,
    Rpn,
    Tokens,
}

impl From<EmitArg> for Emit {
    fn from(arg: EmitArg) -> Self {
        match arg {
            EmitArg::Ast => Emit::Ast,
            EmitArg::Rpn => Emit::Rpn,
            EmitArg::Tokens => Emit::Tokens,
        }
    }
}

fn main() {
    env_logger::init();

    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(err) => {
            // --help and --version are not usage errors
            if !err.use_stderr() {
                err.exit();
            }
            let _ = err.print();
            exit(64);
        }
    };

    let mut lox = Lox::new(args.emit.into());
    let result = match &args.script {
        Some(script) => lox.run_file(script),
        None => lox.run_prompt(),
    };

    match result {
        Ok(()) => {}
        Err(LoxError::Reported(count)) => {
            debug!("{} error(s) reported", count);
            exit(65);
        }
        Err(err) => {
            eprintln!("Error: {}", err);
            exit(65);
        }
    }
}
