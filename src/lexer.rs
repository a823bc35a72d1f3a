use std::fmt;
use std::io::{self, BufRead};

use lazy_static::lazy_static;
use regex::Regex;

#[derive(Debug, PartialEq, Clone)]
pub enum Token {
    Eof,
    Def,
    Extern,
    Ident(String),
    Number(f64),
    Char(char),
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Eof => write!(f, "end of file"),
            Token::Def => write!(f, "def"),
            Token::Extern => write!(f, "extern"),
            Token::Ident(ident) => write!(f, "identifier '{}'", ident),
            Token::Number(num) => write!(f, "number {}", num),
            Token::Char(c) => write!(f, "'{}'", c),
        }
    }
}

/// Anything the parser can pull tokens from, one at a time.
pub trait TokenSource {
    /// Returns the next token, or `Token::Eof` forever once input runs out.
    fn next_token(&mut self) -> Token;

    /// Takes the I/O error that ended the stream early, if any.
    fn take_error(&mut self) -> Option<io::Error> {
        None
    }
}

/// A pre-lexed stack of tokens, last element first.
impl TokenSource for Vec<Token> {
    fn next_token(&mut self) -> Token {
        self.pop().unwrap_or(Token::Eof)
    }
}

lazy_static! {
    static ref IGNORE_RE: Regex = Regex::new(r"(?m)#.*$").unwrap();
    static ref TOKEN_RE: Regex = Regex::new(
        &[
            r"(?P<ident>[a-zA-Z][a-zA-Z0-9]*)",
            r"(?P<number>[0-9.]+)",
            r"(?P<char>\S)",
        ]
        .join("|")
    )
    .unwrap();
}

fn preprocess(input: &str) -> String {
    IGNORE_RE.replace_all(input, "").to_string()
}

/// Reads the longest leading prefix of `text` that is a valid float, so
/// `1.2.3` is `1.2` and a lone `.` is `0`.
fn parse_number(text: &str) -> f64 {
    (1..=text.len())
        .rev()
        .find_map(|end| text[..end].parse::<f64>().ok())
        .unwrap_or(0.0)
}

/// lex the given input string - returns a stack, so first-on last-off
pub fn lex(input: &str) -> Vec<Token> {
    let preprocessed = preprocess(input);

    let mut res = Vec::new();
    for cap in TOKEN_RE.captures_iter(&preprocessed) {
        let token = if let Some(ident) = cap.name("ident") {
            match ident.as_str() {
                "def" => Token::Def,
                "extern" => Token::Extern,
                other => Token::Ident(other.to_string()),
            }
        } else if let Some(num) = cap.name("number") {
            Token::Number(parse_number(num.as_str()))
        } else if let Some(c) = cap.name("char").and_then(|m| m.as_str().chars().next()) {
            Token::Char(c)
        } else {
            continue;
        };

        res.push(token);
    }
    res.reverse();
    res
}

/// Line-buffered tokenizer over any reader. Comments end at a newline and no
/// token spans one, so each line is lexed on its own as it is needed.
pub struct Lexer<R> {
    input: R,
    pending: Vec<Token>,
    done: bool,
    error: Option<io::Error>,
}

impl<R: BufRead> Lexer<R> {
    pub fn new(input: R) -> Self {
        Lexer {
            input,
            pending: Vec::new(),
            done: false,
            error: None,
        }
    }
}

impl<R: BufRead> TokenSource for Lexer<R> {
    fn next_token(&mut self) -> Token {
        loop {
            if let Some(tok) = self.pending.pop() {
                return tok;
            }
            if self.done {
                return Token::Eof;
            }

            let mut line = Vec::new();
            match self.input.read_until(b'\n', &mut line) {
                Ok(0) => self.done = true,
                Ok(_) => self.pending = lex(&String::from_utf8_lossy(&line)),
                Err(err) => {
                    self.done = true;
                    self.error = Some(err);
                }
            }
        }
    }

    fn take_error(&mut self) -> Option<io::Error> {
        self.error.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn ignore_works() {
        assert_eq!(preprocess("# somebody \na"), "\na");
    }

    #[test]
    fn lex_works() {
        let input = "def add(x) x+1.0;";
        let tokenized = [
            Token::Char(';'),
            Token::Number(1.0),
            Token::Char('+'),
            Token::Ident("x".to_string()),
            Token::Char(')'),
            Token::Ident("x".to_string()),
            Token::Char('('),
            Token::Ident("add".to_string()),
            Token::Def,
        ];
        assert_eq!(lex(input), tokenized);
    }

    #[test]
    fn keywords_only_match_whole_identifiers() {
        assert_eq!(
            lex("extern definitely"),
            vec![Token::Ident("definitely".to_string()), Token::Extern]
        );
    }

    #[test]
    fn numbers_take_longest_valid_prefix() {
        assert_eq!(parse_number("1.2.3"), 1.2);
        assert_eq!(parse_number(".5"), 0.5);
        assert_eq!(parse_number("."), 0.0);
        assert_eq!(lex("42"), vec![Token::Number(42.0)]);
    }

    #[test]
    fn identifiers_split_at_non_alphanumerics() {
        assert_eq!(
            lex("a1_b"),
            vec![
                Token::Ident("b".to_string()),
                Token::Char('_'),
                Token::Ident("a1".to_string()),
            ]
        );
    }

    #[test]
    fn lexer_pulls_lines_until_eof() {
        let mut lexer = Lexer::new("x # trailing\n\n  y\n".as_bytes());
        assert_eq!(lexer.next_token(), Token::Ident("x".to_string()));
        assert_eq!(lexer.next_token(), Token::Ident("y".to_string()));
        assert_eq!(lexer.next_token(), Token::Eof);
        assert_eq!(lexer.next_token(), Token::Eof);
        assert!(lexer.take_error().is_none());
    }

    #[test]
    fn invalid_utf8_does_not_end_input() {
        let mut lexer = Lexer::new(&b"# caf\xe9\nx \xff\ny\n"[..]);
        assert_eq!(lexer.next_token(), Token::Ident("x".to_string()));
        assert_eq!(lexer.next_token(), Token::Char('\u{FFFD}'));
        assert_eq!(lexer.next_token(), Token::Ident("y".to_string()));
        assert_eq!(lexer.next_token(), Token::Eof);
        assert!(lexer.take_error().is_none());
    }

    #[test]
    fn token_stack_source_yields_eof_when_drained() {
        let mut tokens = lex("1");
        assert_eq!(tokens.next_token(), Token::Number(1.0));
        assert_eq!(tokens.next_token(), Token::Eof);
    }
}
