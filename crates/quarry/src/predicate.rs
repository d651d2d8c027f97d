//! Predicate algebra and null-safe composition.
//!
//! The designated "absent" predicate is `Option::<Predicate>::None`: it is
//! the unit of conjunction, so composing it with anything yields the other
//! operand and composing nothing yields "match all rows". This is what lets
//! callers assemble a filter from conditionally-present criteria without
//! hand-writing branching query variants.

use crate::expr::ExprNode;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{BitAnd, BitOr};

///
/// Predicate
///
/// A boolean expression node. Composition is pure; operands are never
/// mutated.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Predicate(ExprNode);

impl Predicate {
    #[must_use]
    pub(crate) const fn from_node(node: ExprNode) -> Self {
        Self(node)
    }

    #[must_use]
    pub const fn node(&self) -> &ExprNode {
        &self.0
    }

    #[must_use]
    pub fn into_node(self) -> ExprNode {
        self.0
    }

    #[must_use]
    pub fn and(self, rhs: Self) -> Self {
        Self(ExprNode::And(vec![self.0, rhs.0]))
    }

    #[must_use]
    pub fn or(self, rhs: Self) -> Self {
        Self(ExprNode::Or(vec![self.0, rhs.0]))
    }

    #[expect(clippy::should_implement_trait)]
    #[must_use]
    pub fn not(self) -> Self {
        Self(ExprNode::Not(Box::new(self.0)))
    }

    /// Fold present predicates with AND, skipping absent entries.
    ///
    /// Zero present predicates compose to `None` — "match all rows". One
    /// present predicate is returned untouched.
    #[must_use]
    pub fn and_all(predicates: impl IntoIterator<Item = Option<Self>>) -> Option<Self> {
        let mut present: Vec<ExprNode> = predicates
            .into_iter()
            .flatten()
            .map(Self::into_node)
            .collect();

        match present.len() {
            0 => None,
            1 => present.pop().map(Self),
            _ => Some(Self(ExprNode::And(present))),
        }
    }
}

impl BitAnd for Predicate {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.and(rhs)
    }
}

impl BitAnd for &Predicate {
    type Output = Predicate;

    fn bitand(self, rhs: Self) -> Self::Output {
        self.clone().and(rhs.clone())
    }
}

impl BitOr for Predicate {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.or(rhs)
    }
}

impl BitOr for &Predicate {
    type Output = Predicate;

    fn bitor(self, rhs: Self) -> Self::Output {
        self.clone().or(rhs.clone())
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

///
/// BooleanBuilder
///
/// Explicit mutable predicate accumulator. Starts empty (absent); `and`/`or`
/// attach incrementally and rendering parenthesizes by operator precedence,
/// so `a.or(b).and(c)` reads back as `(a or b) and c`.
///

#[derive(Clone, Debug, Default)]
pub struct BooleanBuilder {
    current: Option<Predicate>,
}

impl BooleanBuilder {
    #[must_use]
    pub const fn new() -> Self {
        Self { current: None }
    }

    #[must_use]
    pub const fn has_value(&self) -> bool {
        self.current.is_some()
    }

    /// AND a predicate onto the accumulated condition.
    pub fn and(&mut self, predicate: Predicate) -> &mut Self {
        self.current = Some(match self.current.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// OR a predicate onto the accumulated condition.
    pub fn or(&mut self, predicate: Predicate) -> &mut Self {
        self.current = Some(match self.current.take() {
            Some(existing) => existing.or(predicate),
            None => predicate,
        });
        self
    }

    /// AND a conditionally-present predicate; absent entries are skipped.
    pub fn and_opt(&mut self, predicate: Option<Predicate>) -> &mut Self {
        if let Some(predicate) = predicate {
            self.and(predicate);
        }
        self
    }

    /// OR a conditionally-present predicate; absent entries are skipped.
    pub fn or_opt(&mut self, predicate: Option<Predicate>) -> &mut Self {
        if let Some(predicate) = predicate {
            self.or(predicate);
        }
        self
    }

    /// Finish, yielding the accumulated predicate or absent.
    #[must_use]
    pub fn build(self) -> Option<Predicate> {
        self.current
    }
}
