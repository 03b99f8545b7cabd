pub mod ast;
pub mod lox;
pub mod parser;
pub mod printers;
pub mod reporter;
pub mod scanner;
pub mod token;
pub mod types;

pub use crate::lox::{Emit, Lox, LoxError};
