//! Line-oriented text syntax for terms and sentences.
//!
//! ```text
//! <cat --> mammal>. %1.0;0.9%
//! (likes $x ?y)?
//! <ball --> red>!
//! ```
//!
//! Copulas must be separated from their operands by whitespace. `//` starts
//! a comment. A belief or goal without a truth value gets `%1.0;0.9%`; a
//! truth value with one number sets only the frequency.

use std::sync::LazyLock;

use regex::Regex;

use crate::atom::{COPULAS, Term, VarKind};
use crate::error::ParseError;
use crate::sentence::Punctuation;
use crate::truth::TruthValue;

static TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<->|-->|==>|<=>|[()<>]|[^\s()<>]+").unwrap());
static SENTENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<body>.*?)(?P<punct>[.!?@])\s*(?:%(?P<truth>[^%]*)%)?\s*$").unwrap()
});

pub const DEFAULT_INPUT_FREQUENCY: f64 = 1.0;
pub const DEFAULT_INPUT_CONFIDENCE: f64 = 0.9;
/// Deepest accepted nesting of `(..)` and `<..>` groups.
pub const MAX_TERM_DEPTH: usize = 64;

/// One parsed input line.
#[derive(Clone, Debug, PartialEq)]
pub struct Statement {
    pub term: Term,
    pub punctuation: Punctuation,
    pub truth: Option<TruthValue>,
}

struct Parser<'a> {
    tokens: Vec<(usize, &'a str)>,
    pos: usize,
    depth: usize,
}

impl<'a> Parser<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            tokens: TOKEN
                .find_iter(text)
                .map(|m| (m.start(), m.as_str()))
                .collect(),
            pos: 0,
            depth: 0,
        }
    }

    fn next(&mut self) -> Result<(usize, &'a str), ParseError> {
        let token = self
            .tokens
            .get(self.pos)
            .copied()
            .ok_or(ParseError::UnexpectedEnd)?;
        self.pos += 1;
        Ok(token)
    }

    fn peek(&self) -> Option<&'a str> {
        self.tokens.get(self.pos).map(|(_, t)| *t)
    }

    fn term(&mut self) -> Result<Term, ParseError> {
        if self.depth >= MAX_TERM_DEPTH {
            return Err(ParseError::TooDeep(MAX_TERM_DEPTH));
        }
        self.depth += 1;
        let term = self.group();
        self.depth -= 1;
        term
    }

    fn group(&mut self) -> Result<Term, ParseError> {
        let (position, token) = self.next()?;
        match token {
            "(" => {
                let mut children = Vec::new();
                while self.peek() != Some(")") {
                    children.push(self.term()?);
                }
                self.next()?;
                Ok(Term::Expression(children))
            }
            "<" => {
                let subject = self.term()?;
                let (position, copula) = self.next()?;
                if !COPULAS.contains(&copula) {
                    return Err(unexpected(copula, position));
                }
                let predicate = self.term()?;
                match self.next()? {
                    (_, ">") => Ok(Term::statement(copula, subject, predicate)),
                    (position, token) => Err(unexpected(token, position)),
                }
            }
            ")" | ">" => Err(unexpected(token, position)),
            _ if COPULAS.contains(&token) => Err(unexpected(token, position)),
            _ => Ok(leaf(token)),
        }
    }

    fn finish(&self) -> Result<(), ParseError> {
        match self.tokens.get(self.pos) {
            Some((position, token)) => Err(unexpected(token, *position)),
            None => Ok(()),
        }
    }
}

fn unexpected(token: &str, position: usize) -> ParseError {
    ParseError::Unexpected {
        token: token.to_string(),
        position,
    }
}

fn leaf(token: &str) -> Term {
    let mut chars = token.chars();
    match chars.next().and_then(VarKind::from_prefix) {
        Some(kind) if token.len() > 1 => Term::Variable(kind, chars.as_str().to_string()),
        _ => Term::Symbol(token.to_string()),
    }
}

/// Parse a single term such as `<cat --> mammal>` or `(op a b)`.
pub fn parse_term(text: &str) -> Result<Term, ParseError> {
    let mut parser = Parser::new(text);
    if parser.tokens.is_empty() {
        return Err(ParseError::Empty);
    }
    let term = parser.term()?;
    parser.finish()?;
    Ok(term)
}

fn parse_truth(text: &str) -> Result<TruthValue, ParseError> {
    let number = |s: &str| {
        s.trim()
            .parse::<f64>()
            .map_err(|_| ParseError::Truth(text.to_string()))
    };
    let (frequency, confidence) = match text.split_once(';') {
        Some((f, c)) => (number(f)?, number(c)?),
        None => (number(text)?, DEFAULT_INPUT_CONFIDENCE),
    };
    Ok(TruthValue::try_new(frequency, confidence)?)
}

/// Parse one sentence line: a term, punctuation, and an optional truth value.
pub fn parse_statement(line: &str) -> Result<Statement, ParseError> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Err(ParseError::Empty);
    }
    let caps = SENTENCE
        .captures(line)
        .ok_or(ParseError::MissingPunctuation)?;
    let body = caps.name("body").map_or("", |m| m.as_str());
    let punctuation = caps
        .name("punct")
        .and_then(|m| m.as_str().chars().next())
        .and_then(Punctuation::from_symbol)
        .ok_or(ParseError::MissingPunctuation)?;
    let term = parse_term(body)?;
    let truth = caps.name("truth").map(|m| parse_truth(m.as_str())).transpose()?;

    let truth = match (punctuation, truth) {
        (Punctuation::Belief | Punctuation::Goal, None) => Some(TruthValue::new(
            DEFAULT_INPUT_FREQUENCY,
            DEFAULT_INPUT_CONFIDENCE,
        )),
        (_, truth) => truth,
    };
    punctuation.check_truth(truth.as_ref())?;
    Ok(Statement {
        term,
        punctuation,
        truth,
    })
}

fn strip_comment(line: &str) -> &str {
    line.find("//").map_or(line, |i| &line[..i])
}

/// Parse every non-blank, non-comment line, keeping 1-based line numbers.
pub fn parse_lines(text: &str) -> Vec<(usize, Result<Statement, ParseError>)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !strip_comment(line).trim().is_empty())
        .map(|(i, line)| (i + 1, parse_statement(line)))
        .collect()
}
