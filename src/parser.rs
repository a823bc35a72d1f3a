use std::collections::HashMap;
use std::io;

use crate::ast::{ASTNode, Expression, Function, Prototype};
use crate::lexer::{Token, TokenSource};

#[derive(Debug, PartialEq, Clone, thiserror::Error)]
pub enum ParserError {
    #[error("expected ')'")]
    ExpectedCloseParen,
    #[error("expected ')' or ',' in argument list")]
    ExpectedArgumentSeparator,
    #[error("unknown token when expecting an expression, found {0}")]
    UnknownToken(Token),
    #[error("expected function name in prototype")]
    ExpectedFunctionName,
    #[error("expected '(' in prototype")]
    ExpectedPrototypeOpen,
    #[error("expected ')' in prototype")]
    ExpectedPrototypeClose,
}

pub type PartialParseResult = Result<Expression, ParserError>;

/// Recursive-descent parser holding exactly one token of lookahead.
///
/// The lookahead is pulled lazily, so nothing is read from the source until
/// the first call that needs the current token.
pub struct Parser<S> {
    source: S,
    current: Option<Token>,
    pub operator_precedence: HashMap<char, i32>,
}

impl<S: TokenSource> Parser<S> {
    pub fn new(source: S) -> Self {
        let mut operator_precedence = HashMap::new();
        operator_precedence.insert('<', 10);
        operator_precedence.insert('>', 10);
        operator_precedence.insert('+', 20);
        operator_precedence.insert('-', 20);
        operator_precedence.insert('*', 40);
        operator_precedence.insert('/', 40);
        Self {
            source,
            current: None,
            operator_precedence,
        }
    }

    pub fn current(&mut self) -> &Token {
        let source = &mut self.source;
        self.current.get_or_insert_with(|| source.next_token())
    }

    /// Discards the current token and pulls the next one.
    pub fn advance(&mut self) -> &Token {
        if self.current.is_none() {
            self.source.next_token();
        }
        self.current = Some(self.source.next_token());
        self.current()
    }

    pub fn take_source_error(&mut self) -> Option<io::Error> {
        self.source.take_error()
    }

    /// Binding strength of the current token, or -1 if it is not a binary
    /// operator.
    fn token_precedence(&mut self) -> i32 {
        let op = match self.current() {
            Token::Char(c) => *c,
            _ => return -1,
        };
        self.operator_precedence.get(&op).copied().unwrap_or(-1)
    }

    fn parse_number(&mut self, num: f64) -> PartialParseResult {
        self.advance();
        Ok(Expression::Literal(num))
    }

    fn parse_identifier(&mut self, ident: String) -> PartialParseResult {
        if self.advance() != &Token::Char('(') {
            return Ok(Expression::Variable(ident));
        }
        self.advance();

        let mut args = Vec::new();
        if self.current() != &Token::Char(')') {
            loop {
                args.push(self.parse_expr()?);

                if self.current() == &Token::Char(')') {
                    break;
                }
                if self.current() != &Token::Char(',') {
                    return Err(ParserError::ExpectedArgumentSeparator);
                }
                self.advance();
            }
        }
        self.advance();

        Ok(Expression::Call(ident, args))
    }

    fn parse_nested(&mut self) -> PartialParseResult {
        self.advance();
        let res = self.parse_expr()?;
        if self.current() != &Token::Char(')') {
            return Err(ParserError::ExpectedCloseParen);
        }
        self.advance();
        Ok(res)
    }

    fn parse_primary(&mut self) -> PartialParseResult {
        match self.current().clone() {
            Token::Number(num) => self.parse_number(num),
            Token::Ident(ident) => self.parse_identifier(ident),
            Token::Char('(') => self.parse_nested(),
            tok => Err(ParserError::UnknownToken(tok)),
        }
    }

    /// Precedence climbing: folds `op primary` pairs into `lhs` for as long as
    /// the pending operator binds at least as tightly as `expr_precedence`.
    fn parse_rhs(&mut self, expr_precedence: i32, lhs: Expression) -> PartialParseResult {
        let mut result = lhs;

        loop {
            let precedence = self.token_precedence();
            if precedence < expr_precedence {
                return Ok(result);
            }

            let operator = match self.current() {
                Token::Char(op) => *op,
                _ => return Ok(result),
            };
            self.advance();

            let mut rhs = self.parse_primary()?;

            if precedence < self.token_precedence() {
                rhs = self.parse_rhs(precedence + 1, rhs)?;
            }

            result = Expression::binary(operator, result, rhs);
        }
    }

    pub fn parse_expr(&mut self) -> PartialParseResult {
        let lhs = self.parse_primary()?;
        self.parse_rhs(0, lhs)
    }

    /// prototype := identifier '(' { identifier } ')'
    pub fn parse_prototype(&mut self) -> Result<Prototype, ParserError> {
        let name = match self.current() {
            Token::Ident(name) => name.clone(),
            _ => return Err(ParserError::ExpectedFunctionName),
        };

        if self.advance() != &Token::Char('(') {
            return Err(ParserError::ExpectedPrototypeOpen);
        }

        let mut args = Vec::new();
        while let Token::Ident(arg) = self.advance() {
            args.push(arg.clone());
        }

        if self.current() != &Token::Char(')') {
            return Err(ParserError::ExpectedPrototypeClose);
        }
        self.advance();

        Ok(Prototype::new(name, args))
    }

    /// definition := 'def' prototype expression
    pub fn parse_definition(&mut self) -> Result<Function, ParserError> {
        self.advance();
        let prototype = self.parse_prototype()?;
        let body = self.parse_expr()?;
        Ok(Function { prototype, body })
    }

    /// extern := 'extern' prototype
    pub fn parse_extern(&mut self) -> Result<Prototype, ParserError> {
        self.advance();
        self.parse_prototype()
    }

    pub fn parse_top_level_expr(&mut self) -> Result<Function, ParserError> {
        Ok(Function::anonymous(self.parse_expr()?))
    }

    /// Parses every remaining construct, stopping at the first error.
    pub fn parse_program(&mut self) -> Result<Vec<ASTNode>, ParserError> {
        let mut ast = Vec::new();

        loop {
            let node = match self.current().clone() {
                Token::Eof => break,
                Token::Char(';') => {
                    self.advance();
                    continue;
                }
                Token::Def => ASTNode::Function(self.parse_definition()?),
                Token::Extern => ASTNode::Extern(self.parse_extern()?),
                _ => ASTNode::Function(self.parse_top_level_expr()?),
            };
            ast.push(node);
        }

        Ok(ast)
    }
}
