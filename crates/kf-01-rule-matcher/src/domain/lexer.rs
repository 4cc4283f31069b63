//! Tokenizer for rule text.

use crate::error::{MatcherError, MatcherResult};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Ident(String),
    Str(String),
    LParen,
    RParen,
    Comma,
    And,
    Or,
    Not,
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Ident(s) => write!(f, "identifier '{s}'"),
            Token::Str(s) => write!(f, "string \"{s}\""),
            Token::LParen => f.write_str("'('"),
            Token::RParen => f.write_str("')'"),
            Token::Comma => f.write_str("','"),
            Token::And => f.write_str("'&&'"),
            Token::Or => f.write_str("'||'"),
            Token::Not => f.write_str("'!'"),
        }
    }
}

/// Token with the byte index it started at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Spanned {
    pub token: Token,
    pub index: usize,
}

pub fn tokenize(input: &str) -> MatcherResult<Vec<Spanned>> {
    let chars: Vec<(usize, char)> = input.char_indices().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let (index, c) = chars[i];
        let token = match c {
            c if c.is_whitespace() => {
                i += 1;
                continue;
            }
            '(' => Token::LParen,
            ')' => Token::RParen,
            ',' => Token::Comma,
            '!' => Token::Not,
            '&' | '|' => {
                if chars.get(i + 1).map(|(_, n)| *n) != Some(c) {
                    return Err(MatcherError::UnexpectedChar { index, ch: c });
                }
                i += 1;
                if c == '&' {
                    Token::And
                } else {
                    Token::Or
                }
            }
            '"' => {
                let (s, next) = read_quoted(&chars, i)?;
                i = next;
                tokens.push(Spanned {
                    token: Token::Str(s),
                    index,
                });
                continue;
            }
            '`' => {
                let (s, next) = read_raw(&chars, i)?;
                i = next;
                tokens.push(Spanned {
                    token: Token::Str(s),
                    index,
                });
                continue;
            }
            c if c.is_ascii_alphabetic() || c == '_' => {
                let start = i;
                while i < chars.len() && (chars[i].1.is_ascii_alphanumeric() || chars[i].1 == '_')
                {
                    i += 1;
                }
                let word: String = chars[start..i].iter().map(|(_, c)| *c).collect();
                let token = match word.as_str() {
                    "AND" => Token::And,
                    "OR" => Token::Or,
                    "NOT" => Token::Not,
                    _ => Token::Ident(word),
                };
                tokens.push(Spanned { token, index });
                continue;
            }
            _ => return Err(MatcherError::UnexpectedChar { index, ch: c }),
        };
        tokens.push(Spanned { token, index });
        i += 1;
    }

    Ok(tokens)
}

/// Double-quoted string. `\"` and `\\` are unescaped; any other escape is
/// kept verbatim so patterns can carry `\{`.
fn read_quoted(chars: &[(usize, char)], open: usize) -> MatcherResult<(String, usize)> {
    let mut out = String::new();
    let mut i = open + 1;
    while i < chars.len() {
        match chars[i].1 {
            '"' => return Ok((out, i + 1)),
            '\\' => match chars.get(i + 1).map(|(_, c)| *c) {
                Some(c @ ('"' | '\\')) => {
                    out.push(c);
                    i += 2;
                }
                Some(c) => {
                    out.push('\\');
                    out.push(c);
                    i += 2;
                }
                None => break,
            },
            c => {
                out.push(c);
                i += 1;
            }
        }
    }
    Err(MatcherError::UnterminatedString {
        index: chars[open].0,
    })
}

fn read_raw(chars: &[(usize, char)], open: usize) -> MatcherResult<(String, usize)> {
    let mut out = String::new();
    for (i, (_, c)) in chars.iter().enumerate().skip(open + 1) {
        if *c == '`' {
            return Ok((out, i + 1));
        }
        out.push(*c);
    }
    Err(MatcherError::UnterminatedString {
        index: chars[open].0,
    })
}
