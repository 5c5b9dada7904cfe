//! Expression language used inside directive tags.
//!
//! Precedence, loosest first:
//!
//! ```text
//! or      := and (("||" | "or") and)*
//! and     := not (("&&" | "and") not)*
//! not     := "not" not | compare
//! compare := unary (("==" | "!=") unary)?
//! unary   := "!" unary | postfix
//! postfix := primary ("." name [args] | "[" or "]")*
//! primary := literal | "[" list "]" | "(" or ")" | name [args]
//! ```
//!
//! `args` is either a parenthesized list or, Ruby-style, a bare list that
//! runs to the end of the expression (`partial "_nav.html", active: "home"`).

use super::TemplateError;
use crate::value::Value;

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Token {
    Ident(String),
    /// `name:` in keyword-argument position.
    Key(String),
    Str(String),
    Symbol(String),
    Int(i64),
    Float(f64),
    Dot,
    Comma,
    LParen,
    RParen,
    LBracket,
    RBracket,
    LBrace,
    RBrace,
    Pipe,
    Minus,
    Eq,
    Ne,
    Not,
    And,
    Or,
}

impl Token {
    pub(super) fn is_ident(&self, name: &str) -> bool {
        matches!(self, Self::Ident(s) if s == name)
    }
}

/// Words that never start a bare argument list.
const KEYWORDS: &[&str] = &[
    "if", "elsif", "else", "unless", "end", "do", "then", "and", "or", "not",
];

#[derive(Debug, Clone, PartialEq)]
pub(super) enum Expr {
    Literal(Value),
    List(Vec<Expr>),
    Var(String),
    /// `target.name` with no arguments: a map key or a zero-argument method.
    Member(Box<Expr>, String),
    Index(Box<Expr>, Box<Expr>),
    Call {
        name: String,
        args: Vec<Expr>,
        kwargs: Vec<(String, Expr)>,
    },
    Method {
        target: Box<Expr>,
        name: String,
        args: Vec<Expr>,
    },
    Not(Box<Expr>),
    And(Box<Expr>, Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    Eq(Box<Expr>, Box<Expr>),
    Ne(Box<Expr>, Box<Expr>),
}

// ============================================================================
// Tokenizer
// ============================================================================

pub(super) fn tokenize(src: &str, line: usize) -> Result<Vec<Token>, TemplateError> {
    let chars: Vec<char> = src.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while let Some(&c) = chars.get(i) {
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '"' | '\'' => {
                let (s, end) = read_string(&chars, i, line)?;
                tokens.push(Token::Str(s));
                i = end;
            }
            ':' if next.is_some_and(is_ident_start) => {
                let (name, end) = read_ident(&chars, i + 1);
                tokens.push(Token::Symbol(name));
                i = end;
            }
            c if c.is_ascii_digit() => {
                let (token, end) = read_number(&chars, i, line)?;
                tokens.push(token);
                i = end;
            }
            c if is_ident_start(c) => {
                let (name, end) = read_ident(&chars, i);
                let is_key = chars.get(end) == Some(&':') && chars.get(end + 1) != Some(&':');
                if is_key {
                    tokens.push(Token::Key(name));
                    i = end + 1;
                } else {
                    tokens.push(Token::Ident(name));
                    i = end;
                }
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Eq);
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Ne);
                i += 2;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            _ => {
                let token = match c {
                    '.' => Token::Dot,
                    ',' => Token::Comma,
                    '(' => Token::LParen,
                    ')' => Token::RParen,
                    '[' => Token::LBracket,
                    ']' => Token::RBracket,
                    '{' => Token::LBrace,
                    '}' => Token::RBrace,
                    '|' => Token::Pipe,
                    '-' => Token::Minus,
                    '!' => Token::Not,
                    other => {
                        return Err(TemplateError::syntax(
                            line,
                            format!("unexpected character `{other}`"),
                        ));
                    }
                };
                tokens.push(token);
                i += 1;
            }
        }
    }
    Ok(tokens)
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Identifier, optionally ending in `?` or `!` (but not the `!` of `!=`).
fn read_ident(chars: &[char], start: usize) -> (String, usize) {
    let mut end = start;
    while chars.get(end).copied().is_some_and(is_ident_char) {
        end += 1;
    }
    if matches!(chars.get(end), Some('?' | '!')) && chars.get(end + 1) != Some(&'=') {
        end += 1;
    }
    (chars[start..end].iter().collect(), end)
}

fn read_string(chars: &[char], start: usize, line: usize) -> Result<(String, usize), TemplateError> {
    let quote = chars[start];
    let mut out = String::new();
    let mut i = start + 1;
    loop {
        match chars.get(i) {
            None => return Err(TemplateError::syntax(line, "unterminated string literal")),
            Some(&c) if c == quote => return Ok((out, i + 1)),
            Some('\\') => {
                let escaped = chars.get(i + 1).copied();
                match (quote, escaped) {
                    ('"', Some('n')) => out.push('\n'),
                    ('"', Some('t')) => out.push('\t'),
                    (_, Some(e)) if e == quote || e == '\\' => out.push(e),
                    (_, Some(e)) => {
                        out.push('\\');
                        out.push(e);
                    }
                    (_, None) => {
                        return Err(TemplateError::syntax(line, "unterminated string literal"));
                    }
                }
                i += 2;
            }
            Some(&c) => {
                out.push(c);
                i += 1;
            }
        }
    }
}

fn read_number(chars: &[char], start: usize, line: usize) -> Result<(Token, usize), TemplateError> {
    let mut end = start;
    while chars.get(end).is_some_and(|c| c.is_ascii_digit() || *c == '_') {
        end += 1;
    }
    // `1.5` is a float, `1.to_s` is a method call on an integer.
    let is_float =
        chars.get(end) == Some(&'.') && chars.get(end + 1).is_some_and(char::is_ascii_digit);
    if is_float {
        end += 1;
        while chars.get(end).is_some_and(char::is_ascii_digit) {
            end += 1;
        }
    }
    let text: String = chars[start..end].iter().filter(|c| **c != '_').collect();
    let invalid = || TemplateError::syntax(line, format!("invalid number `{text}`"));
    let token = if is_float {
        Token::Float(text.parse().map_err(|_| invalid())?)
    } else {
        Token::Int(text.parse().map_err(|_| invalid())?)
    };
    Ok((token, end))
}

// ============================================================================
// Parser
// ============================================================================

/// Parse a complete expression; leftover tokens are a syntax error.
pub(super) fn parse(tokens: &[Token], line: usize) -> Result<Expr, TemplateError> {
    let mut parser = Parser {
        tokens,
        pos: 0,
        line,
    };
    let expr = parser.or()?;
    match parser.peek() {
        None => Ok(expr),
        Some(token) => Err(parser.error(format!("unexpected {}", describe(token)))),
    }
}

struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    line: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos)
    }

    fn peek_at(&self, offset: usize) -> Option<&Token> {
        self.tokens.get(self.pos + offset)
    }

    fn bump(&mut self) -> Option<Token> {
        let token = self.tokens.get(self.pos).cloned();
        self.pos += 1;
        token
    }

    fn eat(&mut self, expected: &Token) -> bool {
        if self.peek() == Some(expected) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn eat_ident(&mut self, name: &str) -> bool {
        if self.peek().is_some_and(|t| t.is_ident(name)) {
            self.pos += 1;
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: &Token) -> Result<(), TemplateError> {
        if self.eat(expected) {
            Ok(())
        } else {
            let found = self.peek().map_or("end of expression".to_owned(), describe);
            Err(self.error(format!("expected {}, found {found}", describe(expected))))
        }
    }

    fn error(&self, message: impl Into<String>) -> TemplateError {
        TemplateError::syntax(self.line, message)
    }

    fn or(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.and()?;
        while self.eat(&Token::Or) || self.eat_ident("or") {
            let right = self.and()?;
            left = Expr::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn and(&mut self) -> Result<Expr, TemplateError> {
        let mut left = self.not()?;
        while self.eat(&Token::And) || self.eat_ident("and") {
            let right = self.not()?;
            left = Expr::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }

    fn not(&mut self) -> Result<Expr, TemplateError> {
        if self.eat_ident("not") {
            return Ok(Expr::Not(Box::new(self.not()?)));
        }
        self.compare()
    }

    fn compare(&mut self) -> Result<Expr, TemplateError> {
        let left = self.unary()?;
        if self.eat(&Token::Eq) {
            Ok(Expr::Eq(Box::new(left), Box::new(self.unary()?)))
        } else if self.eat(&Token::Ne) {
            Ok(Expr::Ne(Box::new(left), Box::new(self.unary()?)))
        } else {
            Ok(left)
        }
    }

    fn unary(&mut self) -> Result<Expr, TemplateError> {
        if self.eat(&Token::Not) {
            return Ok(Expr::Not(Box::new(self.unary()?)));
        }
        self.postfix()
    }

    fn postfix(&mut self) -> Result<Expr, TemplateError> {
        let mut expr = self.primary()?;
        loop {
            if self.eat(&Token::Dot) {
                let name = match self.bump() {
                    Some(Token::Ident(name)) => name,
                    other => {
                        let found = other.as_ref().map_or("end of expression".to_owned(), describe);
                        return Err(self.error(format!("expected a name after `.`, found {found}")));
                    }
                };
                expr = match self.call_args()? {
                    Some((args, kwargs)) if kwargs.is_empty() => Expr::Method {
                        target: Box::new(expr),
                        name,
                        args,
                    },
                    Some(_) => {
                        return Err(self.error(format!("method `{name}` takes no keyword arguments")));
                    }
                    None => Expr::Member(Box::new(expr), name),
                };
            } else if self.eat(&Token::LBracket) {
                let index = self.or()?;
                self.expect(&Token::RBracket)?;
                expr = Expr::Index(Box::new(expr), Box::new(index));
            } else {
                return Ok(expr);
            }
        }
    }

    fn primary(&mut self) -> Result<Expr, TemplateError> {
        let Some(token) = self.bump() else {
            return Err(self.error("unexpected end of expression"));
        };
        match token {
            Token::Str(s) | Token::Symbol(s) => Ok(Expr::Literal(Value::Str(s))),
            Token::Int(n) => Ok(Expr::Literal(Value::Int(n))),
            Token::Float(n) => Ok(Expr::Literal(Value::Float(n))),
            Token::Minus => match self.bump() {
                Some(Token::Int(n)) => Ok(Expr::Literal(Value::Int(-n))),
                Some(Token::Float(n)) => Ok(Expr::Literal(Value::Float(-n))),
                _ => Err(self.error("`-` must precede a number")),
            },
            Token::LParen => {
                let expr = self.or()?;
                self.expect(&Token::RParen)?;
                Ok(expr)
            }
            Token::LBracket => {
                let items = self.list(&Token::RBracket)?;
                Ok(Expr::List(items))
            }
            Token::Ident(name) => {
                match name.as_str() {
                    "true" => return Ok(Expr::Literal(Value::Bool(true))),
                    "false" => return Ok(Expr::Literal(Value::Bool(false))),
                    "nil" => return Ok(Expr::Literal(Value::Null)),
                    keyword if KEYWORDS.contains(&keyword) => {
                        return Err(self.error(format!("unexpected keyword `{keyword}`")));
                    }
                    _ => {}
                }
                Ok(match self.call_args()? {
                    Some((args, kwargs)) => Expr::Call { name, args, kwargs },
                    None => Expr::Var(name),
                })
            }
            other => Err(self.error(format!("unexpected {}", describe(&other)))),
        }
    }

    /// Comma-separated expressions up to `close`, which is consumed.
    fn list(&mut self, close: &Token) -> Result<Vec<Expr>, TemplateError> {
        let mut items = Vec::new();
        if self.eat(close) {
            return Ok(items);
        }
        loop {
            items.push(self.or()?);
            if self.eat(close) {
                return Ok(items);
            }
            self.expect(&Token::Comma)?;
        }
    }

    /// Arguments following a callable name, if any.
    fn call_args(&mut self) -> Result<Option<(Vec<Expr>, Vec<(String, Expr)>)>, TemplateError> {
        if self.eat(&Token::LParen) {
            let args = self.arguments(Some(&Token::RParen))?;
            return Ok(Some(args));
        }
        if self.starts_bare_argument() {
            return Ok(Some(self.arguments(None)?));
        }
        Ok(None)
    }

    fn starts_bare_argument(&self) -> bool {
        match self.peek() {
            Some(Token::Str(_) | Token::Symbol(_) | Token::Int(_) | Token::Float(_)) => true,
            Some(Token::Key(_)) => true,
            Some(Token::Ident(name)) => !KEYWORDS.contains(&name.as_str()),
            _ => false,
        }
    }

    fn arguments(
        &mut self,
        close: Option<&Token>,
    ) -> Result<(Vec<Expr>, Vec<(String, Expr)>), TemplateError> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        if let Some(close) = close
            && self.eat(close)
        {
            return Ok((args, kwargs));
        }
        loop {
            if let Some(Token::Key(key)) = self.peek() {
                let key = key.clone();
                self.pos += 1;
                kwargs.push((key, self.or()?));
            } else if kwargs.is_empty() {
                args.push(self.or()?);
            } else {
                return Err(self.error("positional argument after keyword arguments"));
            }

            if let Some(close) = close
                && self.eat(close)
            {
                return Ok((args, kwargs));
            }
            if !self.eat(&Token::Comma) {
                return match close {
                    Some(close) => {
                        let found = self.peek().map_or("end of expression".to_owned(), describe);
                        Err(self.error(format!("expected {}, found {found}", describe(close))))
                    }
                    None => Ok((args, kwargs)),
                };
            }
            // a trailing comma before `)` is fine
            if close.is_some_and(|close| self.peek_at(0) == Some(close)) {
                self.pos += 1;
                return Ok((args, kwargs));
            }
        }
    }
}

fn describe(token: &Token) -> String {
    match token {
        Token::Ident(name) => format!("`{name}`"),
        Token::Key(name) => format!("`{name}:`"),
        Token::Str(s) => format!("string {s:?}"),
        Token::Symbol(s) => format!("`:{s}`"),
        Token::Int(n) => format!("`{n}`"),
        Token::Float(n) => format!("`{n}`"),
        Token::Dot => "`.`".into(),
        Token::Comma => "`,`".into(),
        Token::LParen => "`(`".into(),
        Token::RParen => "`)`".into(),
        Token::LBracket => "`[`".into(),
        Token::RBracket => "`]`".into(),
        Token::LBrace => "`{`".into(),
        Token::RBrace => "`}`".into(),
        Token::Pipe => "`|`".into(),
        Token::Minus => "`-`".into(),
        Token::Eq => "`==`".into(),
        Token::Ne => "`!=`".into(),
        Token::Not => "`!`".into(),
        Token::And => "`&&`".into(),
        Token::Or => "`||`".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expr(src: &str) -> Expr {
        parse(&tokenize(src, 1).unwrap(), 1).unwrap()
    }

    fn var(name: &str) -> Box<Expr> {
        Box::new(Expr::Var(name.into()))
    }

    fn lit(value: impl Into<Value>) -> Expr {
        Expr::Literal(value.into())
    }

    #[test]
    fn test_tokenize() {
        let tokens = tokenize(r#"page.tags[0] == "a\"b" && !x?"#, 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("page".into()),
                Token::Dot,
                Token::Ident("tags".into()),
                Token::LBracket,
                Token::Int(0),
                Token::RBracket,
                Token::Eq,
                Token::Str("a\"b".into()),
                Token::And,
                Token::Not,
                Token::Ident("x?".into()),
            ]
        );
    }

    #[test]
    fn test_tokenize_keys_symbols_numbers() {
        let tokens = tokenize("f :head, active: 1.5, 2.to_s", 1).unwrap();
        assert_eq!(
            tokens,
            vec![
                Token::Ident("f".into()),
                Token::Symbol("head".into()),
                Token::Comma,
                Token::Key("active".into()),
                Token::Float(1.5),
                Token::Comma,
                Token::Int(2),
                Token::Dot,
                Token::Ident("to_s".into()),
            ]
        );
    }

    #[test]
    fn test_bang_before_equals_is_not_part_of_name() {
        let tokens = tokenize("a!=b", 1).unwrap();
        assert_eq!(
            tokens,
            vec![Token::Ident("a".into()), Token::Ne, Token::Ident("b".into())]
        );
    }

    #[test]
    fn test_single_quoted_string_keeps_escapes() {
        assert_eq!(tokenize(r"'a\n'", 1).unwrap(), vec![Token::Str(r"a\n".into())]);
    }

    #[test]
    fn test_member_and_index() {
        assert_eq!(
            expr(r#"site["name"].size"#),
            Expr::Member(
                Box::new(Expr::Index(var("site"), Box::new(lit("name")))),
                "size".into()
            )
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            expr("a || b && !c == d"),
            Expr::Or(
                var("a"),
                Box::new(Expr::And(
                    var("b"),
                    Box::new(Expr::Eq(Box::new(Expr::Not(var("c"))), var("d")))
                ))
            )
        );
        assert_eq!(
            expr("not a and b"),
            Expr::And(Box::new(Expr::Not(var("a"))), var("b"))
        );
    }

    #[test]
    fn test_bare_call_with_kwargs() {
        assert_eq!(
            expr(r#"partial "_nav.html", active: "home""#),
            Expr::Call {
                name: "partial".into(),
                args: vec![lit("_nav.html")],
                kwargs: vec![("active".into(), lit("home"))],
            }
        );
    }

    #[test]
    fn test_paren_call_and_method_args() {
        assert_eq!(
            expr(r#"content_for?(:head)"#),
            Expr::Call {
                name: "content_for?".into(),
                args: vec![lit("head")],
                kwargs: vec![],
            }
        );
        assert_eq!(
            expr(r#"tags.join(", ")"#),
            Expr::Method {
                target: var("tags"),
                name: "join".into(),
                args: vec![lit(", ")],
            }
        );
        assert_eq!(
            expr(r#"tags.join ", ""#),
            Expr::Method {
                target: var("tags"),
                name: "join".into(),
                args: vec![lit(", ")],
            }
        );
    }

    #[test]
    fn test_literals() {
        assert_eq!(expr("nil"), Expr::Literal(Value::Null));
        assert_eq!(expr("-1"), lit(-1_i64));
        assert_eq!(expr("[1, 'a']"), Expr::List(vec![lit(1_i64), lit("a")]));
        assert_eq!(expr("[]"), Expr::List(vec![]));
    }

    #[test]
    fn test_grouping() {
        assert_eq!(
            expr("(page.missing || []).size"),
            Expr::Member(
                Box::new(Expr::Or(
                    Box::new(Expr::Member(var("page"), "missing".into())),
                    Box::new(Expr::List(vec![]))
                )),
                "size".into()
            )
        );
    }

    #[test]
    fn test_syntax_errors() {
        for src in ["a ==", "(a", "a b c )", "page.", "'open", "a @ b", "if"] {
            let result = tokenize(src, 7).and_then(|tokens| parse(&tokens, 7));
            assert!(
                matches!(result, Err(TemplateError::Syntax { line: 7, .. })),
                "expected syntax error for {src:?}"
            );
        }
    }
}
