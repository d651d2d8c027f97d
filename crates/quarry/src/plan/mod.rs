//! Query and mutation plan contracts.
//!
//! Plans are immutable records produced only by their builders' `finalize`
//! step, so a partially-built plan can never reach a session.

mod builder;
mod validate;


pub use builder::{MutationBuilder, SelectBuilder};
pub use validate::PlanError;

use crate::{
    entity::{RelationPath, SourceRef},
    expr::{AggregateOp, ExprNode},
    predicate::Predicate,
};
use serde::{Deserialize, Serialize};
use std::fmt;

///
/// JoinKind
///
/// Closed set of join kinds; plan consumers match exhaustively, so a new
/// kind cannot be silently unhandled.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum JoinKind {
    Inner,
    LeftOuter,
}

///
/// JoinClause
///
/// `relation` carries the edge for relationship joins; unrelated joins leave
/// it empty and match purely through `on`. The `on` predicate restricts
/// which right-side rows match — distinct from the plan's `where`, which
/// filters the joined result afterward and therefore changes outer-join
/// result sets.
///
/// `fetch` is a loading-strategy hint consumed only by the session: it never
/// affects row shape, cardinality, or filtering.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JoinClause {
    pub kind: JoinKind,
    pub target: SourceRef,
    pub relation: Option<RelationPath>,
    pub on: Option<Predicate>,
    pub fetch: bool,
}

///
/// OrderDirection
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum OrderDirection {
    Asc,
    Desc,
}

///
/// NullOrder
///
/// Default null placement is engine-dependent; sort specs carry the policy
/// explicitly so reproducible orderings can be pinned.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum NullOrder {
    DatabaseDefault,
    First,
    Last,
}

///
/// OrderSpec
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub expr: ExprNode,
    pub direction: OrderDirection,
    pub nulls: NullOrder,
}

impl OrderSpec {
    #[must_use]
    pub const fn new(expr: ExprNode, direction: OrderDirection) -> Self {
        Self {
            expr,
            direction,
            nulls: NullOrder::DatabaseDefault,
        }
    }

    #[must_use]
    pub fn nulls_first(mut self) -> Self {
        self.nulls = NullOrder::First;
        self
    }

    #[must_use]
    pub fn nulls_last(mut self) -> Self {
        self.nulls = NullOrder::Last;
        self
    }
}

///
/// MappingStrategy
///
/// How a mapped projection materializes its target type. `Precompiled`
/// bindings carry their typed constructor outside the plan, so the plan
/// itself stays a pure value record.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum MappingStrategy {
    Constructor,
    Fields,
    Accessors,
    Precompiled,
}

///
/// MappedSelection
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MappedSelection {
    pub strategy: MappingStrategy,
    pub bindings: Vec<ExprNode>,
}

///
/// Selection
///
/// The projection target: one expression, a fixed-arity heterogeneous
/// tuple, or a mapping descriptor. Rows carry one value per expression.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum Selection {
    Single(ExprNode),
    Tuple(Vec<ExprNode>),
    Mapped(MappedSelection),
}

impl Selection {
    /// The selected expressions, in row order.
    #[must_use]
    pub fn exprs(&self) -> &[ExprNode] {
        match self {
            Self::Single(expr) => std::slice::from_ref(expr),
            Self::Tuple(exprs) => exprs,
            Self::Mapped(mapped) => &mapped.bindings,
        }
    }

    /// Number of values each result row carries.
    #[must_use]
    pub fn width(&self) -> usize {
        self.exprs().len()
    }
}

///
/// QueryPlan
///
/// Immutable, finalized description of a query, ready for submission.
/// Constructed only through [`SelectBuilder::finalize`] (or internally for
/// subqueries, which are validated when their outer plan finalizes).
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QueryPlan {
    pub(crate) selection: Selection,
    pub(crate) sources: Vec<SourceRef>,
    pub(crate) joins: Vec<JoinClause>,
    pub(crate) filter: Option<Predicate>,
    pub(crate) group_by: Vec<ExprNode>,
    pub(crate) having: Option<Predicate>,
    pub(crate) order: Vec<OrderSpec>,
    pub(crate) offset: u64,
    pub(crate) limit: Option<u64>,
}

impl QueryPlan {
    #[must_use]
    pub const fn selection(&self) -> &Selection {
        &self.selection
    }

    #[must_use]
    pub fn sources(&self) -> &[SourceRef] {
        &self.sources
    }

    #[must_use]
    pub fn joins(&self) -> &[JoinClause] {
        &self.joins
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }

    #[must_use]
    pub fn group_by(&self) -> &[ExprNode] {
        &self.group_by
    }

    #[must_use]
    pub const fn having(&self) -> Option<&Predicate> {
        self.having.as_ref()
    }

    #[must_use]
    pub fn order(&self) -> &[OrderSpec] {
        &self.order
    }

    #[must_use]
    pub const fn offset(&self) -> u64 {
        self.offset
    }

    #[must_use]
    pub const fn limit(&self) -> Option<u64> {
        self.limit
    }

    /// Derive the total-count shape for this plan (filter kept, slice and
    /// ordering stripped).
    #[must_use]
    pub(crate) fn count_shape(&self) -> CountShape {
        let stripped = Self {
            order: Vec::new(),
            offset: 0,
            limit: None,
            ..self.clone()
        };

        if !stripped.group_by.is_empty() {
            return CountShape::Grouped(stripped);
        }

        // A pure aggregate projection with no grouping collapses to one row.
        if stripped
            .selection
            .exprs()
            .iter()
            .any(ExprNode::contains_aggregate)
        {
            return CountShape::One;
        }

        let root = stripped.sources[0].alias.clone();
        CountShape::Total(Self {
            selection: Selection::Single(ExprNode::Aggregate {
                op: AggregateOp::Count,
                operand: Box::new(ExprNode::EntityAll { alias: root }),
            }),
            ..stripped
        })
    }
}

impl fmt::Display for QueryPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "select ")?;
        let exprs = self.selection.exprs();
        for (i, expr) in exprs.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{expr}")?;
        }

        write!(f, " from ")?;
        for (i, source) in self.sources.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{} {}", source.entity, source.alias)?;
        }

        for join in &self.joins {
            let kind = match join.kind {
                JoinKind::Inner => "join",
                JoinKind::LeftOuter => "left join",
            };
            write!(f, " {kind}")?;
            if join.fetch {
                write!(f, " fetch")?;
            }
            match &join.relation {
                Some(rel) => write!(
                    f,
                    " {}.{} {}",
                    rel.alias, rel.field, join.target.alias
                )?,
                None => write!(f, " {} {}", join.target.entity, join.target.alias)?,
            }
            if let Some(on) = &join.on {
                write!(f, " on {on}")?;
            }
        }

        if let Some(filter) = &self.filter {
            write!(f, " where {filter}")?;
        }

        if !self.group_by.is_empty() {
            write!(f, " group by ")?;
            for (i, key) in self.group_by.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}")?;
            }
        }

        if let Some(having) = &self.having {
            write!(f, " having {having}")?;
        }

        if !self.order.is_empty() {
            write!(f, " order by ")?;
            for (i, spec) in self.order.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                let direction = match spec.direction {
                    OrderDirection::Asc => "asc",
                    OrderDirection::Desc => "desc",
                };
                write!(f, "{} {direction}", spec.expr)?;
                match spec.nulls {
                    NullOrder::DatabaseDefault => {}
                    NullOrder::First => write!(f, " nulls first")?,
                    NullOrder::Last => write!(f, " nulls last")?,
                }
            }
        }

        if self.offset > 0 {
            write!(f, " offset {}", self.offset)?;
        }
        if let Some(limit) = self.limit {
            write!(f, " limit {limit}")?;
        }

        Ok(())
    }
}

///
/// CountShape
///
/// How `fetch_count` derives the unsliced total for a plan.
///

#[derive(Clone, Debug)]
pub(crate) enum CountShape {
    /// Pure aggregate projection without grouping: always exactly one row.
    One,
    /// Grouped plan: the total is the number of groups.
    Grouped(QueryPlan),
    /// Plain plan: submit a row-count aggregate over the root source.
    Total(QueryPlan),
}

///
/// Assignment
///
/// One `target path → new-value expression` pair of a bulk update.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub path: ExprNode,
    pub value: ExprNode,
}

///
/// MutationKind
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum MutationKind {
    Update(Vec<Assignment>),
    Delete,
}

///
/// MutationPlan
///
/// Immutable description of a bulk update or delete. Bulk mutations bypass
/// per-row materialization and leave session-held identities untouched; the
/// staleness that introduces is the caller's to manage (`flush` + `clear`).
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MutationPlan {
    pub(crate) target: SourceRef,
    pub(crate) kind: MutationKind,
    pub(crate) filter: Option<Predicate>,
}

impl MutationPlan {
    #[must_use]
    pub const fn target(&self) -> &SourceRef {
        &self.target
    }

    #[must_use]
    pub const fn kind(&self) -> &MutationKind {
        &self.kind
    }

    #[must_use]
    pub const fn filter(&self) -> Option<&Predicate> {
        self.filter.as_ref()
    }
}
