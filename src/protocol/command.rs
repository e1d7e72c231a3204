//! Command definitions
//!
//! Parses one request line into a `Command`. Values stay as text until the
//! table definition says what type they are.

use crate::error::{EmberError, Result};

/// A parsed request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Health check
    Ping,

    /// Reply with the given text
    Echo(String),

    /// Insert a row; values in schema order
    Insert(Vec<String>),

    /// Fetch a row by primary key
    Get(String),

    /// Every row
    SelectAll,

    /// Rows where `column = value`
    SelectEq { column: String, value: String },

    /// Rows where `low <= column <= high`
    SelectRange {
        column: String,
        low: String,
        high: String,
    },

    /// Set `column` from `old` to `new`
    Update {
        column: String,
        old: String,
        new: String,
    },

    /// Remove rows where `column = value`
    Delete { column: String, value: String },

    /// Shape of the records tree
    Stats,
}

/// A lexical unit of a request line
#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Comma,
    Equals,
}

impl Command {
    /// Parse a request line; a trailing `;` is optional
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim().trim_end_matches(';').trim_end();
        let (verb, rest) = match line.split_once(char::is_whitespace) {
            Some((verb, rest)) => (verb, rest.trim()),
            None => (line, ""),
        };
        if verb.is_empty() {
            return Err(EmberError::Protocol("empty request".to_string()));
        }

        let verb = verb.to_ascii_uppercase();
        if verb == "ECHO" {
            return Ok(Command::Echo(rest.to_string()));
        }

        let mut args = Args::new(tokenize(rest)?);
        let command = match verb.as_str() {
            "PING" => Command::Ping,
            "STATS" => Command::Stats,
            "INSERT" => {
                let mut values = vec![args.word("value")?];
                while args.eat(&Token::Comma) {
                    values.push(args.word("value")?);
                }
                Command::Insert(values)
            }
            "GET" => Command::Get(args.word("primary key")?),
            "SELECT" => {
                if args.is_empty() {
                    Command::SelectAll
                } else {
                    let column = args.word("column")?;
                    if args.eat(&Token::Equals) {
                        Command::SelectEq {
                            column,
                            value: args.word("value")?,
                        }
                    } else {
                        args.keyword("BETWEEN")?;
                        let low = args.word("lower bound")?;
                        args.keyword("AND")?;
                        let high = args.word("upper bound")?;
                        Command::SelectRange { column, low, high }
                    }
                }
            }
            "UPDATE" => Command::Update {
                column: args.word("column")?,
                old: args.word("old value")?,
                new: args.word("new value")?,
            },
            "DELETE" => Command::Delete {
                column: args.word("column")?,
                value: args.word("value")?,
            },
            other => {
                return Err(EmberError::Protocol(format!("unknown command {}", other)));
            }
        };

        args.finish()?;
        Ok(command)
    }
}

/// Cursor over the tokens following the verb
struct Args {
    tokens: Vec<Token>,
    pos: usize,
}

impl Args {
    fn new(tokens: Vec<Token>) -> Self {
        Self { tokens, pos: 0 }
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.tokens.len()
    }

    fn word(&mut self, what: &str) -> Result<String> {
        match self.tokens.get(self.pos) {
            Some(Token::Word(word)) => {
                self.pos += 1;
                Ok(word.clone())
            }
            _ => Err(EmberError::Protocol(format!("expected {}", what))),
        }
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            return true;
        }
        false
    }

    fn keyword(&mut self, keyword: &str) -> Result<()> {
        match self.tokens.get(self.pos) {
            Some(Token::Word(word)) if word.eq_ignore_ascii_case(keyword) => {
                self.pos += 1;
                Ok(())
            }
            _ => Err(EmberError::Protocol(format!("expected {}", keyword))),
        }
    }

    fn finish(&self) -> Result<()> {
        if self.is_empty() {
            return Ok(());
        }
        Err(EmberError::Protocol(format!(
            "unexpected trailing input ({} tokens)",
            self.tokens.len() - self.pos
        )))
    }
}

/// Split on whitespace, `,` and `=`; quoted strings keep their spaces
fn tokenize(input: &str) -> Result<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = input.chars().peekable();

    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            ',' => {
                chars.next();
                tokens.push(Token::Comma);
            }
            '=' => {
                chars.next();
                tokens.push(Token::Equals);
            }
            '"' | '\'' => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some(q) if q == c => break,
                        Some(ch) => word.push(ch),
                        None => {
                            return Err(EmberError::Protocol("unterminated quote".to_string()));
                        }
                    }
                }
                tokens.push(Token::Word(word));
            }
            _ => {
                let mut word = String::new();
                while let Some(&ch) = chars.peek() {
                    if ch.is_whitespace() || ch == ',' || ch == '=' {
                        break;
                    }
                    word.push(ch);
                    chars.next();
                }
                tokens.push(Token::Word(word));
            }
        }
    }

    Ok(tokens)
}
