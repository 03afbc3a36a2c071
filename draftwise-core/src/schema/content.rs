//! Content expressions: the grammar a node's children must satisfy.
//!
//! An expression is a sequence of terms. Each term names a node type or a
//! group, or a parenthesised choice `(a | b)`, optionally followed by `*`,
//! `+` or `?`. Matching is exhaustive: every child must be consumed.

use crate::error::SchemaError;

#[derive(Debug, Clone, PartialEq)]
struct Term {
    /// Names as written; resolved to concrete node type names by the schema.
    names: Vec<String>,
    resolved: Vec<String>,
    min: usize,
    max: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ContentExpr {
    source: String,
    terms: Vec<Term>,
}

#[derive(Debug, Clone, PartialEq)]
enum Tok {
    Name(String),
    Open,
    Close,
    Pipe,
    Star,
    Plus,
    Question,
}

fn tokenize(expr: &str) -> Result<Vec<Tok>, SchemaError> {
    let mut toks = Vec::new();
    let mut chars = expr.chars().peekable();
    while let Some(&c) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '(' => {
                chars.next();
                toks.push(Tok::Open);
            }
            ')' => {
                chars.next();
                toks.push(Tok::Close);
            }
            '|' => {
                chars.next();
                toks.push(Tok::Pipe);
            }
            '*' => {
                chars.next();
                toks.push(Tok::Star);
            }
            '+' => {
                chars.next();
                toks.push(Tok::Plus);
            }
            '?' => {
                chars.next();
                toks.push(Tok::Question);
            }
            c if c.is_alphanumeric() || c == '_' => {
                let mut name = String::new();
                while let Some(&c) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                toks.push(Tok::Name(name));
            }
            other => {
                return Err(SchemaError::InvalidContentExpr {
                    expr: expr.to_string(),
                    message: format!("unexpected character {other:?}"),
                })
            }
        }
    }
    Ok(toks)
}

impl ContentExpr {
    /// The expression of a leaf node: no children allowed.
    pub fn empty() -> Self {
        Self {
            source: String::new(),
            terms: Vec::new(),
        }
    }

    pub fn parse(expr: &str) -> Result<Self, SchemaError> {
        let err = |message: &str| SchemaError::InvalidContentExpr {
            expr: expr.to_string(),
            message: message.to_string(),
        };

        let toks = tokenize(expr)?;
        let mut terms = Vec::new();
        let mut i = 0;
        while i < toks.len() {
            let names = match &toks[i] {
                Tok::Name(name) => {
                    i += 1;
                    vec![name.clone()]
                }
                Tok::Open => {
                    i += 1;
                    let mut names = Vec::new();
                    loop {
                        match toks.get(i) {
                            Some(Tok::Name(name)) => names.push(name.clone()),
                            _ => return Err(err("expected a name inside parentheses")),
                        }
                        i += 1;
                        match toks.get(i) {
                            Some(Tok::Pipe) => i += 1,
                            Some(Tok::Close) => {
                                i += 1;
                                break;
                            }
                            _ => return Err(err("unclosed parenthesis")),
                        }
                    }
                    names
                }
                _ => return Err(err("expected a name or '('")),
            };

            let (min, max) = match toks.get(i) {
                Some(Tok::Star) => (0, None),
                Some(Tok::Plus) => (1, None),
                Some(Tok::Question) => (0, Some(1)),
                _ => (1, Some(1)),
            };
            if matches!(
                toks.get(i),
                Some(Tok::Star) | Some(Tok::Plus) | Some(Tok::Question)
            ) {
                i += 1;
            }

            terms.push(Term {
                names,
                resolved: Vec::new(),
                min,
                max,
            });
        }

        Ok(Self {
            source: expr.to_string(),
            terms,
        })
    }

    /// Replace group and type names with the concrete node type names they
    /// stand for. `lookup` returns `None` for names the schema does not know.
    pub(crate) fn resolve<F>(&mut self, lookup: F) -> Result<(), SchemaError>
    where
        F: Fn(&str) -> Option<Vec<String>>,
    {
        for term in &mut self.terms {
            let mut resolved = Vec::new();
            for name in &term.names {
                let types = lookup(name).ok_or_else(|| SchemaError::InvalidContentExpr {
                    expr: self.source.clone(),
                    message: format!("no node type or group named {name:?}"),
                })?;
                for ty in types {
                    if !resolved.contains(&ty) {
                        resolved.push(ty);
                    }
                }
            }
            term.resolved = resolved;
        }
        Ok(())
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// True when the expression admits no children at all.
    pub fn is_leaf(&self) -> bool {
        self.terms.is_empty()
    }

    /// Whether a child of the given type may appear anywhere in the content.
    pub fn allows(&self, type_name: &str) -> bool {
        self.terms
            .iter()
            .any(|term| term.resolved.iter().any(|n| n == type_name))
    }

    /// All node type names the expression mentions, in declaration order.
    pub fn allowed_types(&self) -> impl Iterator<Item = &str> {
        self.terms
            .iter()
            .flat_map(|term| term.resolved.iter().map(String::as_str))
    }

    /// Two expressions are compatible when they share at least one child type,
    /// which is the condition for joining their nodes.
    pub fn compatible(&self, other: &ContentExpr) -> bool {
        self.allowed_types().any(|name| other.allows(name))
    }

    pub fn matches<S: AsRef<str>>(&self, children: &[S]) -> bool {
        self.match_from(0, 0, children)
    }

    fn match_from<S: AsRef<str>>(&self, term_idx: usize, child_idx: usize, children: &[S]) -> bool {
        let Some(term) = self.terms.get(term_idx) else {
            return child_idx == children.len();
        };

        let mut count = 0;
        while child_idx + count < children.len()
            && term.max.map_or(true, |max| count < max)
            && term
                .resolved
                .iter()
                .any(|n| n == children[child_idx + count].as_ref())
        {
            count += 1;
        }

        (term.min..=count)
            .rev()
            .any(|taken| self.match_from(term_idx + 1, child_idx + taken, children))
    }

    /// The shortest child sequence that satisfies the expression, choosing
    /// the first resolved type of every required term. `None` when a required
    /// term has no candidates.
    pub fn minimal_fill(&self) -> Option<Vec<&str>> {
        let mut fill = Vec::new();
        for term in &self.terms {
            if term.min > 0 {
                let first = term.resolved.first()?;
                for _ in 0..term.min {
                    fill.push(first.as_str());
                }
            }
        }
        Some(fill)
    }
}
