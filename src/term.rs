//! Typed term representation used on the backend boundary.
//!
//! Every value exchanged with the logic backend (models, vectors, formulas,
//! corpus mappings) is a [`Term`] in a Prolog-like concrete syntax:
//!
//! - atoms: `john`, `'New York'`
//! - integers: `0`, `-3`
//! - variables: `X`, `_Model`
//! - compounds: `love(john,mary)` (functor must touch the opening paren)
//! - lists: `[a,b,c]`
//! - tuples: `(a,b)`, a parenthesised comma sequence of two or more terms
//!
//! Formula connectives are right-associative infix operators, loosest first:
//! `<->`, `->`, `|`, `&`; `neg` is a prefix operator binding tighter than all
//! of them. They parse into ordinary compounds, so `p & q` is `'&'(p,q)`.
//!
//! The parser is strict: anything that does not lex, trailing input and
//! unbalanced brackets are rejected as [`DfsError::MalformedTerm`].

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use logos::{Lexer, Logos};

use crate::error::{DfsError, Result};

/// A term of the interchange syntax.
///
/// Variant order gives the standard order of terms:
/// variables < integers < atoms < lists < tuples < compounds.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Term {
    Var(String),
    Int(i64),
    Atom(String),
    List(Vec<Term>),
    Tuple(Vec<Term>),
    Compound { functor: String, args: Vec<Term> },
}

/// Prefix negation functor.
pub const NEG: &str = "neg";

/// Binary connectives of the formula language.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Connective {
    And,
    Or,
    Implies,
    Iff,
}

impl Connective {
    pub fn symbol(self) -> &'static str {
        match self {
            Connective::And => "&",
            Connective::Or => "|",
            Connective::Implies => "->",
            Connective::Iff => "<->",
        }
    }

    pub fn from_functor(functor: &str) -> Option<Self> {
        match functor {
            "&" => Some(Connective::And),
            "|" => Some(Connective::Or),
            "->" => Some(Connective::Implies),
            "<->" => Some(Connective::Iff),
            _ => None,
        }
    }

    fn precedence(self) -> u8 {
        match self {
            Connective::Iff => 1,
            Connective::Implies => 2,
            Connective::Or => 3,
            Connective::And => 4,
        }
    }

    fn from_token(token: &Token) -> Option<Self> {
        match token {
            Token::And => Some(Connective::And),
            Token::Or => Some(Connective::Or),
            Token::Implies => Some(Connective::Implies),
            Token::Iff => Some(Connective::Iff),
            _ => None,
        }
    }
}

impl Term {
    pub fn atom(name: impl Into<String>) -> Self {
        Term::Atom(name.into())
    }

    pub fn compound(functor: impl Into<String>, args: Vec<Term>) -> Self {
        Term::Compound {
            functor: functor.into(),
            args,
        }
    }

    /// Builds `lhs <op> rhs`.
    pub fn connect(op: Connective, lhs: Term, rhs: Term) -> Self {
        Term::compound(op.symbol(), vec![lhs, rhs])
    }

    /// Returns the atom name if this term is an atom.
    pub fn as_atom(&self) -> Option<&str> {
        match self {
            Term::Atom(a) => Some(a),
            _ => None,
        }
    }

    /// Name and arity of an atom or compound.
    pub fn functor_arity(&self) -> Option<(&str, usize)> {
        match self {
            Term::Atom(a) => Some((a, 0)),
            Term::Compound { functor, args } => Some((functor, args.len())),
            _ => None,
        }
    }

    /// True if the term contains no variables.
    pub fn is_ground(&self) -> bool {
        match self {
            Term::Var(_) => false,
            Term::Int(_) | Term::Atom(_) => true,
            Term::List(items) | Term::Tuple(items) => items.iter().all(Term::is_ground),
            Term::Compound { args, .. } => args.iter().all(Term::is_ground),
        }
    }

    /// Parses a complete term; the whole input must be consumed.
    pub fn parse(input: &str) -> Result<Term> {
        let mut parser = Parser::new(input)?;
        let term = parser.parse_expr(0)?;
        match parser.tokens.get(parser.pos) {
            None => Ok(term),
            Some((_, span)) => Err(parser.error(format!(
                "unexpected trailing input at offset {}",
                span.start
            ))),
        }
    }

    fn is_operator(&self) -> bool {
        match self {
            Term::Compound { functor, args } => {
                args.len() == 2 && Connective::from_functor(functor).is_some()
            }
            _ => false,
        }
    }
}

impl FromStr for Term {
    type Err = DfsError;

    fn from_str(s: &str) -> Result<Self> {
        Term::parse(s)
    }
}

fn atom_needs_quotes(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_lowercase() => {
            !chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => true,
    }
}

fn write_atom(f: &mut fmt::Formatter<'_>, name: &str) -> fmt::Result {
    if !atom_needs_quotes(name) {
        return f.write_str(name);
    }
    f.write_str("'")?;
    for c in name.chars() {
        if c == '\'' || c == '\\' {
            f.write_str("\\")?;
        }
        write!(f, "{c}")?;
    }
    f.write_str("'")
}

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Term]) -> fmt::Result {
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{item}")?;
    }
    Ok(())
}

fn write_operand(f: &mut fmt::Formatter<'_>, term: &Term) -> fmt::Result {
    if term.is_operator() {
        write!(f, "({term})")
    } else {
        write!(f, "{term}")
    }
}

/// Canonical serializer; `Term::parse(&t.to_string()) == Ok(t)`.
impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Var(v) => f.write_str(v),
            Term::Int(n) => write!(f, "{n}"),
            Term::Atom(a) => write_atom(f, a),
            Term::List(items) => {
                f.write_str("[")?;
                write_seq(f, items)?;
                f.write_str("]")
            }
            Term::Tuple(items) => {
                f.write_str("(")?;
                write_seq(f, items)?;
                f.write_str(")")
            }
            Term::Compound { functor, args } => {
                if let (Some(op), [lhs, rhs]) = (Connective::from_functor(functor), args.as_slice())
                {
                    write_operand(f, lhs)?;
                    f.write_str(op.symbol())?;
                    return write_operand(f, rhs);
                }
                write_atom(f, functor)?;
                f.write_str("(")?;
                write_seq(f, args)?;
                f.write_str(")")
            }
        }
    }
}

#[derive(Logos, Debug, Clone, PartialEq)]
#[logos(skip r"[ \t\r\n]+")]
enum Token {
    #[token("(")]
    LParen,
    #[token(")")]
    RParen,
    #[token("[")]
    LBracket,
    #[token("]")]
    RBracket,
    #[token(",")]
    Comma,
    #[token("&")]
    And,
    #[token("|")]
    Or,
    #[token("->")]
    Implies,
    #[token("<->")]
    Iff,
    #[regex(r"-?[0-9]+", |lex| lex.slice().parse::<i64>().ok())]
    Int(i64),
    #[regex(r"[a-z][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Name(String),
    #[regex(r"'([^'\\]|\\.)*'", unquote)]
    Quoted(String),
    #[regex(r"[A-Z_][A-Za-z0-9_]*", |lex| lex.slice().to_owned())]
    Var(String),
}

fn unquote(lex: &mut Lexer<Token>) -> String {
    let raw = lex.slice();
    let inner = &raw[1..raw.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            c => out.push(c),
        }
    }
    out
}

struct Parser<'a> {
    input: &'a str,
    tokens: Vec<(Token, Range<usize>)>,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn new(input: &'a str) -> Result<Self> {
        let mut tokens = Vec::new();
        for (token, span) in Token::lexer(input).spanned() {
            match token {
                Ok(t) => tokens.push((t, span)),
                Err(()) => {
                    let text = input.get(span.clone()).unwrap_or_default();
                    return Err(DfsError::malformed(
                        input,
                        format!("unexpected `{text}` at offset {}", span.start),
                    ));
                }
            }
        }
        Ok(Self {
            input,
            tokens,
            pos: 0,
        })
    }

    fn error(&self, reason: impl Into<String>) -> DfsError {
        DfsError::malformed(self.input, reason)
    }

    fn peek(&self) -> Option<&Token> {
        self.tokens.get(self.pos).map(|(t, _)| t)
    }

    fn next(&mut self) -> Result<(Token, Range<usize>)> {
        let item = self
            .tokens
            .get(self.pos)
            .cloned()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        self.pos += 1;
        Ok(item)
    }

    /// True if the next token is `(` starting exactly where `span` ends.
    fn opens_arguments(&self, span: &Range<usize>) -> bool {
        matches!(
            self.tokens.get(self.pos),
            Some((Token::LParen, next)) if next.start == span.end
        )
    }

    fn parse_expr(&mut self, min_prec: u8) -> Result<Term> {
        let mut lhs = self.parse_unary()?;
        while let Some(op) = self.peek().and_then(Connective::from_token) {
            if op.precedence() < min_prec {
                break;
            }
            self.pos += 1;
            let rhs = self.parse_expr(op.precedence())?;
            lhs = Term::connect(op, lhs, rhs);
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Term> {
        if let Some((Token::Name(name), span)) = self.tokens.get(self.pos) {
            let span = span.clone();
            let starts_operand = matches!(
                self.tokens.get(self.pos + 1),
                Some((Token::Name(_) | Token::Quoted(_) | Token::Var(_) | Token::LParen | Token::LBracket, _))
            );
            if name == NEG && starts_operand {
                self.pos += 1;
                if !self.opens_arguments(&span) {
                    let operand = self.parse_unary()?;
                    return Ok(Term::compound(NEG, vec![operand]));
                }
                self.pos -= 1;
            }
        }
        self.parse_primary()
    }

    fn parse_primary(&mut self) -> Result<Term> {
        let (token, span) = self.next()?;
        match token {
            Token::Int(n) => Ok(Term::Int(n)),
            Token::Var(v) => Ok(Term::Var(v)),
            Token::Name(name) | Token::Quoted(name) => {
                if self.opens_arguments(&span) {
                    self.pos += 1;
                    let args = self.parse_seq(Token::RParen)?;
                    if args.is_empty() {
                        return Err(self.error(format!("compound `{name}` has no arguments")));
                    }
                    Ok(Term::Compound {
                        functor: name,
                        args,
                    })
                } else {
                    Ok(Term::Atom(name))
                }
            }
            Token::LBracket => Ok(Term::List(self.parse_seq(Token::RBracket)?)),
            Token::LParen => {
                let mut items = self.parse_seq(Token::RParen)?;
                match items.len() {
                    0 => Err(self.error(format!("empty parentheses at offset {}", span.start))),
                    1 => Ok(items.remove(0)),
                    _ => Ok(Term::Tuple(items)),
                }
            }
            other => Err(self.error(format!(
                "unexpected `{}` at offset {}",
                token_text(&other),
                span.start
            ))),
        }
    }

    /// Parses `item, item, ... <close>` after the opening bracket was consumed.
    fn parse_seq(&mut self, close: Token) -> Result<Vec<Term>> {
        let mut items = Vec::new();
        if self.peek() == Some(&close) {
            self.pos += 1;
            return Ok(items);
        }
        loop {
            items.push(self.parse_expr(0)?);
            let (token, span) = self.next()?;
            if token == close {
                return Ok(items);
            }
            if token != Token::Comma {
                return Err(self.error(format!(
                    "expected `,` or `{}` at offset {}, got `{}`",
                    token_text(&close),
                    span.start,
                    token_text(&token)
                )));
            }
        }
    }
}

fn token_text(token: &Token) -> String {
    match token {
        Token::LParen => "(".into(),
        Token::RParen => ")".into(),
        Token::LBracket => "[".into(),
        Token::RBracket => "]".into(),
        Token::Comma => ",".into(),
        Token::And => "&".into(),
        Token::Or => "|".into(),
        Token::Implies => "->".into(),
        Token::Iff => "<->".into(),
        Token::Int(n) => n.to_string(),
        Token::Name(s) | Token::Var(s) => s.clone(),
        Token::Quoted(s) => format!("'{s}'"),
    }
}
