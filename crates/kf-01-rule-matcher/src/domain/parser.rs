//! Recursive-descent parser from rule text to `Predicate`.
//!
//! ```text
//! expr    := and ( ("||" | "OR") and )*
//! and     := unary ( ("&&" | "AND") unary )*
//! unary   := ("!" | "NOT") unary | primary
//! primary := "(" expr ")" | IDENT "(" [ STRING ( "," STRING )* ] ")"
//! ```

use super::lexer::{tokenize, Spanned, Token};
use super::pattern::{SegmentPattern, ValuePattern};
use super::predicate::Predicate;
use crate::error::{MatcherError, MatcherResult};
use shared_types::canonical_header_key;

/// Compile rule text into a predicate.
pub fn compile(rule: &str) -> MatcherResult<Predicate> {
    let tokens = tokenize(rule)?;
    let mut parser = Parser { tokens, pos: 0 };
    let predicate = parser.expr()?;
    match parser.peek() {
        None => Ok(predicate),
        Some(s) => Err(MatcherError::UnexpectedToken {
            index: s.index,
            expected: "end of rule",
            found: s.token.to_string(),
        }),
    }
}

struct Parser {
    tokens: Vec<Spanned>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<&Spanned> {
        self.tokens.get(self.pos)
    }

    fn next(&mut self, expected: &'static str) -> MatcherResult<Spanned> {
        let s = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or(MatcherError::UnexpectedEnd { expected })?;
        self.pos += 1;
        Ok(s)
    }

    fn eat(&mut self, token: &Token) -> bool {
        if self.peek().is_some_and(|s| &s.token == token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, token: Token, expected: &'static str) -> MatcherResult<()> {
        let s = self.next(expected)?;
        if s.token == token {
            Ok(())
        } else {
            Err(MatcherError::UnexpectedToken {
                index: s.index,
                expected,
                found: s.token.to_string(),
            })
        }
    }

    fn expr(&mut self) -> MatcherResult<Predicate> {
        let mut lhs = self.and()?;
        while self.eat(&Token::Or) {
            let rhs = self.and()?;
            lhs = Predicate::Or(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn and(&mut self) -> MatcherResult<Predicate> {
        let mut lhs = self.unary()?;
        while self.eat(&Token::And) {
            let rhs = self.unary()?;
            lhs = Predicate::And(Box::new(lhs), Box::new(rhs));
        }
        Ok(lhs)
    }

    fn unary(&mut self) -> MatcherResult<Predicate> {
        if self.eat(&Token::Not) {
            return Ok(Predicate::Not(Box::new(self.unary()?)));
        }
        self.primary()
    }

    fn primary(&mut self) -> MatcherResult<Predicate> {
        let s = self.next("function call or '('")?;
        match s.token {
            Token::LParen => {
                let inner = self.expr()?;
                self.expect(Token::RParen, "')'")?;
                Ok(inner)
            }
            Token::Ident(name) => {
                self.expect(Token::LParen, "'('")?;
                let args = self.args()?;
                function(&name, args)
            }
            other => Err(MatcherError::UnexpectedToken {
                index: s.index,
                expected: "function call or '('",
                found: other.to_string(),
            }),
        }
    }

    fn args(&mut self) -> MatcherResult<Vec<String>> {
        let mut args = Vec::new();
        if self.eat(&Token::RParen) {
            return Ok(args);
        }
        loop {
            let s = self.next("string argument")?;
            match s.token {
                Token::Str(v) => args.push(v),
                other => {
                    return Err(MatcherError::UnexpectedToken {
                        index: s.index,
                        expected: "string argument",
                        found: other.to_string(),
                    })
                }
            }
            if self.eat(&Token::RParen) {
                return Ok(args);
            }
            self.expect(Token::Comma, "',' or ')'")?;
        }
    }
}

fn function(name: &str, args: Vec<String>) -> MatcherResult<Predicate> {
    match name {
        "All" => {
            arity("All", "0", &args, 0)?;
            Ok(Predicate::All)
        }
        "Method" => {
            if args.is_empty() {
                return Err(MatcherError::Arity {
                    function: "Method",
                    expected: "at least 1",
                    got: 0,
                });
            }
            Ok(Predicate::Method(args))
        }
        "Path" => Ok(Predicate::Path(single_pattern("Path", args, '/')?)),
        "PathPrefix" => Ok(Predicate::PathPrefix(single_pattern("PathPrefix", args, '/')?)),
        "Host" => Ok(Predicate::Host(single_pattern("Host", args, '.')?)),
        "Header" => {
            let (key, value) = key_value("Header", args)?;
            Ok(Predicate::Header {
                key: canonical_header_key(&key),
                value,
            })
        }
        "Query" => {
            let (key, value) = key_value("Query", args)?;
            Ok(Predicate::Query { key, value })
        }
        "Type" => {
            arity("Type", "1", &args, 1)?;
            Ok(Predicate::Type(args.into_iter().next().unwrap_or_default()))
        }
        other => Err(MatcherError::UnknownFunction(other.to_string())),
    }
}

fn arity(
    function: &'static str,
    expected: &'static str,
    args: &[String],
    n: usize,
) -> MatcherResult<()> {
    if args.len() == n {
        Ok(())
    } else {
        Err(MatcherError::Arity {
            function,
            expected,
            got: args.len(),
        })
    }
}

fn single_pattern(
    function: &'static str,
    args: Vec<String>,
    sep: char,
) -> MatcherResult<SegmentPattern> {
    arity(function, "1", &args, 1)?;
    SegmentPattern::parse(&args[0], sep)
}

fn key_value(function: &'static str, args: Vec<String>) -> MatcherResult<(String, ValuePattern)> {
    arity(function, "2", &args, 2)?;
    let mut it = args.into_iter();
    let key = it.next().unwrap_or_default();
    let value = it.next().unwrap_or_default();
    if key.is_empty() {
        return Err(MatcherError::EmptyKey { function });
    }
    Ok((key, ValuePattern::parse(&value)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::{event_type, Category, Event};
    use std::time::Duration;

    fn http(method: &str, path: &str) -> Event {
        let mut evt = Event::new(Category::Request, event_type::HTTP, Duration::from_secs(1));
        evt.set_method(method);
        evt.set_path(path);
        evt
    }

    #[test]
    fn test_precedence_and_binds_tighter() {
        // Method("PUT") || (Method("GET") && Path("/a"))
        let p = compile(r#"Method("PUT") || Method("GET") && Path("/a")"#).unwrap();
        assert!(p.apply(&mut http("PUT", "/zzz")));
        assert!(p.apply(&mut http("GET", "/a")));
        assert!(!p.apply(&mut http("GET", "/b")));
    }

    #[test]
    fn test_not_and_parens() {
        let p = compile(r#"!(Method("GET") || Method("HEAD")) && PathPrefix("/api")"#).unwrap();
        assert!(p.apply(&mut http("POST", "/api/x")));
        assert!(!p.apply(&mut http("GET", "/api/x")));
        assert!(!p.apply(&mut http("POST", "/web")));
    }

    #[test]
    fn test_method_variadic_case_insensitive() {
        let p = compile(r#"Method("get", "post")"#).unwrap();
        assert!(p.apply(&mut http("GET", "/")));
        assert!(p.apply(&mut http("Post", "/")));
        assert!(!p.apply(&mut http("DELETE", "/")));
    }

    #[test]
    fn test_type_suffix_match() {
        let p = compile(r#"Type("HTTP")"#).unwrap();
        assert!(p.apply(&mut http("GET", "/")));
        let p = compile(r#"Type("cron")"#).unwrap();
        assert!(!p.apply(&mut http("GET", "/")));
    }

    #[test]
    fn test_header_and_query() {
        let p = compile(r#"Header("x-tenant", "{^acme|globex$}") && Query("debug", "true")"#)
            .unwrap();
        let mut evt = http("GET", "/");
        evt.add_header("X-Tenant", "globex");
        evt.add_query("debug", "true");
        assert!(p.apply(&mut evt));

        let mut evt = http("GET", "/");
        evt.add_header("X-Tenant", "initech");
        evt.add_query("debug", "true");
        assert!(!p.apply(&mut evt));
    }

    #[test]
    fn test_failed_or_branch_leaves_no_captures() {
        let p = compile(
            r#"(Path("/orders/{order}") && Method("POST")) || PathPrefix("/orders/{id}")"#,
        )
        .unwrap();
        let mut evt = http("GET", "/orders/7");
        assert!(p.apply(&mut evt));
        assert_eq!(evt.param("id").map(|v| v.to_string()), Some("7".into()));
        assert!(evt.param("order").is_none());
    }

    #[test]
    fn test_no_captures_when_rule_fails() {
        let p = compile(r#"Path("/orders/{id}") && Method("DELETE")"#).unwrap();
        let mut evt = http("GET", "/orders/7");
        assert!(!p.apply(&mut evt));
        assert!(evt.params.is_empty());
    }

    #[test]
    fn test_all() {
        assert!(compile("All()").unwrap().apply(&mut http("GET", "/x")));
    }

    #[test]
    fn test_errors() {
        assert_eq!(
            compile(r#"Nope("x")"#).unwrap_err(),
            MatcherError::UnknownFunction("Nope".into())
        );
        assert!(matches!(
            compile(r#"Path("/a", "/b")"#),
            Err(MatcherError::Arity { function: "Path", got: 2, .. })
        ));
        assert!(matches!(
            compile("Method()"),
            Err(MatcherError::Arity { function: "Method", .. })
        ));
        assert_eq!(
            compile(r#"Header("", "x")"#).unwrap_err(),
            MatcherError::EmptyKey { function: "Header" }
        );
        assert!(matches!(
            compile(r#"Path("/a") &&"#),
            Err(MatcherError::UnexpectedEnd { .. })
        ));
        assert!(matches!(
            compile(r#"Path("/a") Path("/b")"#),
            Err(MatcherError::UnexpectedToken { expected: "end of rule", .. })
        ));
        assert!(matches!(
            compile(r#"Path(/a)"#),
            Err(MatcherError::UnexpectedChar { ch: '/', .. })
        ));
    }

    proptest::proptest! {
        #[test]
        fn test_compile_never_panics(rule in ".{0,64}") {
            let _ = compile(&rule);
        }

        #[test]
        fn test_literal_path_matches_itself(segs in proptest::collection::vec("[a-z0-9]{1,8}", 1..5)) {
            let path = format!("/{}", segs.join("/"));
            let p = compile(&format!("Path(\"{path}\")")).unwrap();
            proptest::prop_assert!(p.apply(&mut http("GET", &path)));
        }
    }
}
