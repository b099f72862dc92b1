//! Rule condition grammar.
//!
//! ```text
//! condition := [statistic] operator literal
//! operator  := "==" | "!=" | "<=" | ">=" | "<" | ">" | "=~" | "~" | "!~" | ":"
//! ```
//!
//! Without a statistic the comparison applies to every raw entry. With `:`
//! the identifier names a directive and the literal is split shell-style
//! into its arguments.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use crate::error::{ReportError, Result};
use crate::statistic::{numeric, text, StatisticKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    Ne,
    Le,
    Ge,
    Lt,
    Gt,
    /// `=~`: regex anchored at the start of the text.
    Match,
    /// `~`: regex found anywhere.
    Search,
    /// `!~`: regex found nowhere.
    NotSearch,
    /// `:`: directive call.
    Directive,
}

impl Operator {
    /// Longest tokens first so `<=` is never read as `<`.
    const TOKENS: [(&'static str, Operator); 10] = [
        ("==", Operator::Eq),
        ("!=", Operator::Ne),
        ("<=", Operator::Le),
        (">=", Operator::Ge),
        ("=~", Operator::Match),
        ("!~", Operator::NotSearch),
        ("<", Operator::Lt),
        (">", Operator::Gt),
        ("~", Operator::Search),
        (":", Operator::Directive),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::TOKENS
            .iter()
            .find(|(_, op)| op == self)
            .map(|(token, _)| *token)
            .unwrap_or("")
    }

    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Operator::Eq | Operator::Ne | Operator::Le | Operator::Ge | Operator::Lt | Operator::Gt
        )
    }

    fn split_prefix(s: &str) -> Option<(Operator, &str)> {
        Self::TOKENS
            .iter()
            .find_map(|(token, op)| s.strip_prefix(token).map(|rest| (*op, rest)))
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Right-hand side of a comparison, pre-parsed for its operator.
#[derive(Debug, Clone)]
enum Operand {
    Number(f64),
    Pattern(Regex),
}

/// An operator bound to its literal.
#[derive(Debug, Clone)]
pub struct Comparison {
    operator: Operator,
    literal: String,
    operand: Operand,
}

impl Comparison {
    fn new(operator: Operator, literal: &str, condition: &str) -> Result<Self> {
        let operand = match operator {
            Operator::Match => Operand::Pattern(compile(&format!("^(?:{literal})"), condition)?),
            Operator::Search | Operator::NotSearch => Operand::Pattern(compile(literal, condition)?),
            Operator::Directive => return Err(ReportError::MalformedRule(condition.to_string())),
            Operator::Eq | Operator::Ne | Operator::Le | Operator::Ge | Operator::Lt | Operator::Gt => {
                literal
                    .parse::<f64>()
                    .map(Operand::Number)
                    .map_err(|_| ReportError::MalformedRule(condition.to_string()))?
            }
        };
        Ok(Self {
            operator,
            literal: literal.to_string(),
            operand,
        })
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn literal(&self) -> &str {
        &self.literal
    }

    /// Apply to `value`. `None` means the value cannot be compared, e.g. a
    /// numeric operator against text.
    pub fn test(&self, value: &Value) -> Option<bool> {
        match &self.operand {
            Operand::Number(rhs) => {
                let lhs = numeric(value)?;
                Some(match self.operator {
                    Operator::Eq => lhs == *rhs,
                    Operator::Ne => lhs != *rhs,
                    Operator::Le => lhs <= *rhs,
                    Operator::Ge => lhs >= *rhs,
                    Operator::Lt => lhs < *rhs,
                    Operator::Gt => lhs > *rhs,
                    _ => return None,
                })
            }
            Operand::Pattern(re) => {
                let found = re.is_match(&text(value));
                Some(if self.operator == Operator::NotSearch { !found } else { found })
            }
        }
    }
}

fn compile(pattern: &str, condition: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|source| ReportError::InvalidPattern {
        condition: condition.to_string(),
        source,
    })
}

/// A parsed rule condition.
#[derive(Debug, Clone)]
pub enum Condition {
    /// Checked against each raw entry.
    Entry(Comparison),
    /// Checked once against an aggregate.
    Statistic {
        kind: StatisticKind,
        comparison: Comparison,
    },
    /// `name: args...`
    Directive { name: String, args: Vec<String> },
}

impl Condition {
    pub fn parse(raw: &str) -> Result<Self> {
        let malformed = || ReportError::MalformedRule(raw.to_string());
        let s = raw.trim();

        let ident_len = identifier_len(s);
        let (ident, rest) = s.split_at(ident_len);
        let (operator, literal) = Operator::split_prefix(rest.trim_start()).ok_or_else(malformed)?;
        let literal = literal.trim();
        if literal.is_empty() {
            return Err(malformed());
        }

        if operator == Operator::Directive {
            if ident.is_empty() {
                return Err(malformed());
            }
            let args = shlex::split(literal).ok_or_else(malformed)?;
            return Ok(Condition::Directive {
                name: ident.to_ascii_lowercase(),
                args,
            });
        }

        let comparison = Comparison::new(operator, literal, raw)?;
        if ident.is_empty() {
            Ok(Condition::Entry(comparison))
        } else {
            Ok(Condition::Statistic {
                kind: ident.parse()?,
                comparison,
            })
        }
    }
}

/// Length of a leading `[A-Za-z_][A-Za-z0-9_]*` run.
fn identifier_len(s: &str) -> usize {
    let mut chars = s.char_indices();
    match chars.next() {
        Some((_, c)) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return 0,
    }
    chars
        .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        .map(|(i, _)| i)
        .unwrap_or(s.len())
}
