//! Element selectors.
//!
//! [`Selector`] mirrors the lookups a page enhancer performs: by id, by tag,
//! by class, or by a CSS query. [`Selector::Query`] is handed to the page as
//! is; [`MemoryPage`](super::MemoryPage) understands compound selectors
//! (`tag`, `#id`, `.class`, `*`) joined by descendant (` `) or child (`>`)
//! combinators, which covers queries like `#movesCounter > div` or
//! `a.mainButton.newsButton`.

use std::fmt;

use crate::error::DomError;

/// How to find elements on the page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Selector {
    /// Element whose `id` attribute equals the value.
    Id(String),
    /// Elements with this tag name (case-insensitive).
    Tag(String),
    /// Elements carrying this class.
    Class(String),
    /// CSS query.
    Query(String),
}

impl Selector {
    pub fn id(id: impl Into<String>) -> Self {
        Selector::Id(id.into())
    }

    pub fn tag(tag: impl Into<String>) -> Self {
        Selector::Tag(tag.into())
    }

    pub fn class(class: impl Into<String>) -> Self {
        Selector::Class(class.into())
    }

    pub fn query(query: impl Into<String>) -> Self {
        Selector::Query(query.into())
    }
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Id(id) => write!(f, "#{id}"),
            Selector::Tag(tag) => write!(f, "{tag}"),
            Selector::Class(class) => write!(f, ".{class}"),
            Selector::Query(q) => write!(f, "{q}"),
        }
    }
}

/// Relation between a compound and the one on its left.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Combinator {
    Descendant,
    Child,
}

/// `tag#id.class1.class2`; every part optional.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Compound {
    pub tag: Option<String>,
    pub id: Option<String>,
    pub classes: Vec<String>,
}

/// Parsed query, left to right. The combinator of the first step is unused.
pub(crate) type Chain = Vec<(Combinator, Compound)>;

pub(crate) fn parse_query(src: &str) -> Result<Chain, DomError> {
    let unsupported = || DomError::UnsupportedSelector {
        selector: src.to_string(),
    };

    let spaced = src.replace('>', " > ");
    let mut chain: Chain = Vec::new();
    let mut pending: Option<Combinator> = None;

    for token in spaced.split_whitespace() {
        if token == ">" {
            if chain.is_empty() || pending.is_some() {
                return Err(unsupported());
            }
            pending = Some(Combinator::Child);
            continue;
        }
        let compound = parse_compound(token).ok_or_else(unsupported)?;
        chain.push((pending.take().unwrap_or(Combinator::Descendant), compound));
    }

    if chain.is_empty() || pending.is_some() {
        return Err(unsupported());
    }
    Ok(chain)
}

fn parse_compound(token: &str) -> Option<Compound> {
    let mut compound = Compound::default();
    let mut chars = token.chars().peekable();

    if chars.peek() == Some(&'*') {
        chars.next();
    } else if chars.peek().is_some_and(|c| is_name_char(*c)) {
        compound.tag = Some(take_name(&mut chars)?.to_ascii_lowercase());
    }

    while let Some(sigil) = chars.next() {
        let name = take_name(&mut chars)?;
        match sigil {
            '#' if compound.id.is_none() => compound.id = Some(name),
            '.' => compound.classes.push(name),
            _ => return None,
        }
    }
    Some(compound)
}

fn take_name(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Option<String> {
    let mut name = String::new();
    while let Some(c) = chars.peek().copied() {
        if !is_name_char(c) {
            break;
        }
        name.push(c);
        chars.next();
    }
    (!name.is_empty()).then_some(name)
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_'
}
