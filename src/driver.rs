//! Top-level read, parse and lower loop.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

use crate::ast::ASTNode;
use crate::backend::{Backend, Opts, TextModule};
use crate::codegen::{Codegen, CodegenError};
use crate::lexer::{Lexer, Token, TokenSource};
use crate::parser::{Parser, ParserError};

/// Either kind of failure that aborts one top-level construct.
#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum CompileError {
    #[error(transparent)]
    Syntax(#[from] ParserError),
    #[error(transparent)]
    Lowering(#[from] CodegenError),
}

/// How far each construct is taken before it is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Tokens,
    Parse,
    Ir,
}

impl FromStr for Stage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tokens" => Ok(Stage::Tokens),
            "parse" => Ok(Stage::Parse),
            "ir" => Ok(Stage::Ir),
            other => Err(format!("unknown stage '{}'", other)),
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Tokens => write!(f, "tokens"),
            Stage::Parse => write!(f, "parse"),
            Stage::Ir => write!(f, "ir"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub opts: Opts,
    /// Print `ready> ` before each top-level construct.
    pub prompt: bool,
    pub module_name: String,
    pub stage: Stage,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            opts: Opts::default(),
            prompt: false,
            module_name: "my cool jit".to_string(),
            stage: Stage::Ir,
        }
    }
}

/// One compilation session: the parser with its lookahead, and the
/// lowering engine with its module. Lives for the whole run.
pub struct Driver<S, B: Backend> {
    parser: Parser<S>,
    codegen: Codegen<B>,
    prompt: bool,
    stage: Stage,
}

impl<S: TokenSource> Driver<S, TextModule> {
    pub fn new(source: S, config: &Config) -> Self {
        let module = TextModule::new(config.module_name.clone(), config.opts);
        Driver::with_backend(source, module, config)
    }
}

impl<S: TokenSource, B: Backend> Driver<S, B> {
    pub fn with_backend(source: S, backend: B, config: &Config) -> Self {
        Driver {
            parser: Parser::new(source),
            codegen: Codegen::new(backend),
            prompt: config.prompt,
            stage: config.stage,
        }
    }

    pub fn codegen(&self) -> &Codegen<B> {
        &self.codegen
    }

    /// Runs until end of input, writing every report and diagnostic to
    /// `out`. Compile errors are reported and skipped; only I/O errors
    /// end the run early.
    pub fn run(&mut self, out: &mut impl Write) -> io::Result<()> {
        if self.stage == Stage::Tokens {
            return self.dump_tokens(out);
        }

        loop {
            if self.prompt {
                write!(out, "ready> ")?;
                out.flush()?;
            }

            match self.parser.current().clone() {
                Token::Eof => break,
                Token::Char(';') => {
                    self.parser.advance();
                }
                Token::Def => self.handle_definition(out)?,
                Token::Extern => self.handle_extern(out)?,
                _ => self.handle_top_level_expression(out)?,
            }
        }

        if let Some(err) = self.parser.take_source_error() {
            return Err(err);
        }

        if self.stage == Stage::Ir {
            write!(out, "{}", self.codegen.backend.print_module())?;
        }
        Ok(())
    }

    fn dump_tokens(&mut self, out: &mut impl Write) -> io::Result<()> {
        loop {
            let token = self.parser.current().clone();
            if token == Token::Eof {
                break;
            }
            writeln!(out, "{:?}", token)?;
            self.parser.advance();
        }

        match self.parser.take_source_error() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn handle_definition(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.parser.parse_definition() {
            Ok(func) => self.lower(out, ASTNode::Function(func), "Read function definition:"),
            Err(err) => self.recover(out, err.into()),
        }
    }

    fn handle_extern(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.parser.parse_extern() {
            Ok(proto) => self.lower(out, ASTNode::Extern(proto), "Read extern:"),
            Err(err) => self.recover(out, err.into()),
        }
    }

    fn handle_top_level_expression(&mut self, out: &mut impl Write) -> io::Result<()> {
        match self.parser.parse_top_level_expr() {
            Ok(func) => self.lower(out, ASTNode::Function(func), "Read top-level expression:"),
            Err(err) => self.recover(out, err.into()),
        }
    }

    fn lower(&mut self, out: &mut impl Write, node: ASTNode, heading: &str) -> io::Result<()> {
        if self.stage == Stage::Parse {
            return writeln!(out, "Parsed: {}", node);
        }

        let function = match self.codegen.compile_node(&node) {
            Ok(function) => function,
            Err(err) => return self.recover(out, err.into()),
        };

        writeln!(out, "{}", heading)?;
        write!(out, "{}", self.codegen.backend.print_function(function))?;
        writeln!(out)?;

        // Nothing can call an anonymous function by name, so it goes now.
        if let ASTNode::Function(func) = &node {
            if func.prototype.is_anonymous() {
                self.codegen.erase_function(function, &func.prototype.name);
            }
        }
        Ok(())
    }

    /// Reports the error and skips one token.
    fn recover(&mut self, out: &mut impl Write, err: CompileError) -> io::Result<()> {
        writeln!(out, "LogError: {}", err)?;
        self.parser.advance();
        Ok(())
    }
}

/// Runs a whole session over `source` and returns everything it reported.
pub fn run_source(source: &str, config: &Config) -> io::Result<String> {
    let mut driver = Driver::new(Lexer::new(source.as_bytes()), config);
    let mut out = Vec::new();
    driver.run(&mut out)?;
    Ok(String::from_utf8_lossy(&out).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        run_source(source, &Config::default()).unwrap()
    }

    #[test]
    fn reports_each_construct_and_dumps_module() {
        let output = run("def id(x) x;\nextern sin(a);\nid(2);\n");
        assert_eq!(
            output,
            "Read function definition:\n\
             define double @id(double %x) {\n\
             entry:\n  \
             ret double %x\n\
             }\n\
             \n\
             Read extern:\n\
             declare double @sin(double)\n\
             \n\
             Read top-level expression:\n\
             define double @0() {\n\
             entry:\n  \
             %calltmp = call double @id(double 2.000000e+00)\n  \
             ret double %calltmp\n\
             }\n\
             \n\
             ; ModuleID = 'my cool jit'\n\
             source_filename = \"my cool jit\"\n\
             \n\
             define double @id(double %x) {\n\
             entry:\n  \
             ret double %x\n\
             }\n\
             \n\
             declare double @sin(double)\n"
        );
    }

    #[test]
    fn syntax_error_skips_one_token() {
        let output = run(") 1");
        assert!(output.starts_with(
            "LogError: unknown token when expecting an expression, found ')'\n\
             Read top-level expression:\n"
        ));
    }

    #[test]
    fn lowering_errors_are_reported_and_run_continues() {
        let output = run("def f(x) x+1;\ndef f(x) x+1;\nfoo(1);\n");
        assert!(output.contains("LogError: function f cannot be redefined\n"));
        assert!(output.contains("LogError: unknown function referenced foo\n"));
        assert!(output.ends_with(
            "define double @f(double %x) {\n\
             entry:\n  \
             %addtmp = fadd double %x, 1.000000e+00\n  \
             ret double %addtmp\n\
             }\n"
        ));
    }

    #[test]
    fn prompts_when_interactive() {
        let config = Config {
            prompt: true,
            ..Config::default()
        };
        let output = run_source(";", &config).unwrap();
        assert!(output.starts_with("ready> ready> ; ModuleID"));
    }

    #[test]
    fn parse_stage_prints_ast_only() {
        let config = Config {
            stage: Stage::Parse,
            ..Config::default()
        };
        let output = run_source("def f(x) 1+2*x; extern g(); g()", &config).unwrap();
        assert_eq!(
            output,
            "Parsed: def f(x) (1 + (2 * x))\nParsed: extern g()\nParsed: g()\n"
        );
    }

    #[test]
    fn token_stage_lists_tokens() {
        let config = Config {
            stage: Stage::Tokens,
            ..Config::default()
        };
        let output = run_source("def f(x) # comment\n", &config).unwrap();
        assert_eq!(
            output,
            "Def\nIdent(\"f\")\nChar('(')\nIdent(\"x\")\nChar(')')\n"
        );
    }

    #[test]
    fn stage_from_str() {
        assert_eq!("parse".parse::<Stage>(), Ok(Stage::Parse));
        assert!("asm".parse::<Stage>().is_err());
        assert_eq!(Stage::Ir.to_string(), "ir");
    }

    #[test]
    fn dump_is_deterministic() {
        let source = "extern cos(x); def f(a b) a*b + cos(a); f(1, 2);";
        assert_eq!(run(source), run(source));
    }
}
