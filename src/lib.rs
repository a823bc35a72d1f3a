//! A small expression language front end.
//!
//! Source text is tokenized, parsed into an AST with precedence climbing and
//! lowered through a [`backend::Backend`] into a module of numeric functions.

pub mod ast;
pub mod backend;
pub mod codegen;
pub mod driver;
pub mod lexer;
pub mod parser;

pub use driver::{run_source, CompileError, Config, Driver, Stage};
