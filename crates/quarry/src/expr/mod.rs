//! Expression model: typed path/column references and operators producing
//! composable predicate and projection expressions.
//!
//! Construction is pure value computation. Building an expression never
//! touches a session, and operators never mutate their operands.

mod render;

#[cfg(test)]
mod tests;

use crate::{
    entity::{EntityKind, EntityRef, SourceRef},
    plan::{OrderDirection, OrderSpec, QueryPlan, Selection},
    predicate::Predicate,
    value::Value,
};
use derive_more::Deref;
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

///
/// CompareOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
    Contains,
    Like,
    StartsWith,
}

///
/// ArithOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum ArithOp {
    Add,
    Sub,
    Mul,
}

///
/// StrOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum StrOp {
    Lower,
    Upper,
}

///
/// AggregateOp
///

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub enum AggregateOp {
    Count,
    Sum,
    Avg,
    Max,
    Min,
}

///
/// ExprNode
///
/// Pure, schema-agnostic expression AST. This layer carries no type
/// validation and no execution semantics; binding checks happen at plan
/// finalize time and evaluation is the session's business.
///
/// `Template` is the raw escape hatch for vendor functions. Its operands are
/// always bound positionally (`{0}`, `{1}`, …) — rendering never splices an
/// argument into the template text, which is what keeps it injection-safe.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ExprNode {
    Path { alias: String, field: String },
    EntityAll { alias: String },
    Literal(Value),
    Compare { op: CompareOp, lhs: Box<Self>, rhs: Box<Self> },
    And(Vec<Self>),
    Or(Vec<Self>),
    Not(Box<Self>),
    IsNull(Box<Self>),
    Arith { op: ArithOp, lhs: Box<Self>, rhs: Box<Self> },
    StrFunc { op: StrOp, operand: Box<Self> },
    Aggregate { op: AggregateOp, operand: Box<Self> },
    Template { template: String, args: Vec<Self> },
    Subquery(Box<QueryPlan>),
    Aliased { name: String, expr: Box<Self> },
}

impl ExprNode {
    /// Pre-order walk over this expression tree.
    ///
    /// Does not descend into `Subquery` plans; nested plans carry their own
    /// sources and are validated as whole plans.
    pub fn walk(&self, visit: &mut dyn FnMut(&Self)) {
        visit(self);
        match self {
            Self::Path { .. }
            | Self::EntityAll { .. }
            | Self::Literal(_)
            | Self::Subquery(_) => {}
            Self::Compare { lhs, rhs, .. } | Self::Arith { lhs, rhs, .. } => {
                lhs.walk(visit);
                rhs.walk(visit);
            }
            Self::And(operands) | Self::Or(operands) | Self::Template { args: operands, .. } => {
                for operand in operands {
                    operand.walk(visit);
                }
            }
            Self::Not(operand)
            | Self::IsNull(operand)
            | Self::StrFunc { operand, .. }
            | Self::Aggregate { operand, .. }
            | Self::Aliased { expr: operand, .. } => operand.walk(visit),
        }
    }

    /// True if any node of this expression is an aggregate.
    #[must_use]
    pub fn contains_aggregate(&self) -> bool {
        let mut found = false;
        self.walk(&mut |node| {
            if matches!(node, Self::Aggregate { .. }) {
                found = true;
            }
        });
        found
    }

    /// Projection name used by named mapping strategies: an explicit alias,
    /// or the terminal field of a plain path.
    #[must_use]
    pub fn projection_name(&self) -> Option<&str> {
        match self {
            Self::Aliased { name, .. } => Some(name),
            Self::Path { field, .. } => Some(field),
            _ => None,
        }
    }
}

///
/// NumericType
///
/// Logical types that admit arithmetic and numeric aggregates.
///

pub trait NumericType {}

impl NumericType for i64 {}
impl NumericType for f64 {}

///
/// Expr
///
/// Typed facade over [`ExprNode`]. The phantom parameter is the logical
/// result type; it constrains which operators compose at compile time while
/// the erased node feeds runtime plan assembly.
///

#[derive(Debug, Deref)]
pub struct Expr<T> {
    #[deref]
    node: ExprNode,
    _marker: PhantomData<T>,
}

impl<T> Clone for Expr<T> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<T> From<Expr<T>> for ExprNode {
    fn from(expr: Expr<T>) -> Self {
        expr.node
    }
}

impl<T> Expr<T> {
    #[must_use]
    pub(crate) const fn from_node(node: ExprNode) -> Self {
        Self {
            node,
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn node(&self) -> &ExprNode {
        &self.node
    }

    #[must_use]
    pub fn into_node(self) -> ExprNode {
        self.node
    }

    /// Bind the projection name used by named mapping strategies.
    #[must_use]
    pub fn alias(self, name: impl Into<String>) -> Self {
        Self::from_node(ExprNode::Aliased {
            name: name.into(),
            expr: Box::new(self.node),
        })
    }

    // ------------------------------------------------------------------
    // Comparisons
    // ------------------------------------------------------------------

    #[must_use]
    pub fn eq(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Eq, rhs.into_operand())
    }

    #[must_use]
    pub fn ne(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Ne, rhs.into_operand())
    }

    #[must_use]
    pub fn lt(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Lt, rhs.into_operand())
    }

    /// Less-or-equal.
    #[must_use]
    pub fn loe(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Lte, rhs.into_operand())
    }

    #[must_use]
    pub fn gt(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Gt, rhs.into_operand())
    }

    /// Greater-or-equal.
    #[must_use]
    pub fn goe(&self, rhs: impl IntoOperand<T>) -> Predicate {
        self.compare(CompareOp::Gte, rhs.into_operand())
    }

    /// Membership in an explicit value list.
    #[must_use]
    pub fn in_<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Predicate {
        self.compare(CompareOp::In, ExprNode::Literal(Value::list(values)))
    }

    /// Exclusion from an explicit value list.
    #[must_use]
    pub fn not_in<V: Into<Value>>(&self, values: impl IntoIterator<Item = V>) -> Predicate {
        self.compare(CompareOp::NotIn, ExprNode::Literal(Value::list(values)))
    }

    /// Membership in a subquery's result column.
    #[must_use]
    pub fn in_select(&self, subquery: SubqueryBuilder<T>) -> Predicate {
        self.compare(CompareOp::In, subquery.into_node())
    }

    #[must_use]
    pub fn is_null(&self) -> Predicate {
        Predicate::from_node(ExprNode::IsNull(Box::new(self.node.clone())))
    }

    #[must_use]
    pub fn is_not_null(&self) -> Predicate {
        Predicate::from_node(ExprNode::Not(Box::new(ExprNode::IsNull(Box::new(
            self.node.clone(),
        )))))
    }

    // ------------------------------------------------------------------
    // Ordering
    // ------------------------------------------------------------------

    #[must_use]
    pub fn asc(&self) -> OrderSpec {
        OrderSpec::new(self.node.clone(), OrderDirection::Asc)
    }

    #[must_use]
    pub fn desc(&self) -> OrderSpec {
        OrderSpec::new(self.node.clone(), OrderDirection::Desc)
    }

    // ------------------------------------------------------------------
    // Aggregates
    // ------------------------------------------------------------------

    /// Count of non-null values of this expression.
    #[must_use]
    pub fn count(&self) -> Expr<i64> {
        Expr::from_node(self.aggregate(AggregateOp::Count))
    }

    fn aggregate(&self, op: AggregateOp) -> ExprNode {
        ExprNode::Aggregate {
            op,
            operand: Box::new(self.node.clone()),
        }
    }

    fn compare(&self, op: CompareOp, rhs: ExprNode) -> Predicate {
        Predicate::from_node(ExprNode::Compare {
            op,
            lhs: Box::new(self.node.clone()),
            rhs: Box::new(rhs),
        })
    }
}

impl<T: NumericType> Expr<T> {
    #[must_use]
    pub fn add(&self, rhs: impl IntoOperand<T>) -> Self {
        self.arith(ArithOp::Add, rhs.into_operand())
    }

    #[must_use]
    pub fn sub(&self, rhs: impl IntoOperand<T>) -> Self {
        self.arith(ArithOp::Sub, rhs.into_operand())
    }

    #[must_use]
    pub fn mul(&self, rhs: impl IntoOperand<T>) -> Self {
        self.arith(ArithOp::Mul, rhs.into_operand())
    }

    #[must_use]
    pub fn sum(&self) -> Self {
        Self::from_node(self.aggregate(AggregateOp::Sum))
    }

    /// Average; always a float-typed expression.
    #[must_use]
    pub fn avg(&self) -> Expr<f64> {
        Expr::from_node(self.aggregate(AggregateOp::Avg))
    }

    #[must_use]
    pub fn max(&self) -> Self {
        Self::from_node(self.aggregate(AggregateOp::Max))
    }

    #[must_use]
    pub fn min(&self) -> Self {
        Self::from_node(self.aggregate(AggregateOp::Min))
    }

    fn arith(&self, op: ArithOp, rhs: ExprNode) -> Self {
        Self::from_node(ExprNode::Arith {
            op,
            lhs: Box::new(self.node.clone()),
            rhs: Box::new(rhs),
        })
    }
}

impl Expr<String> {
    #[must_use]
    pub fn lower(&self) -> Self {
        self.str_func(StrOp::Lower)
    }

    #[must_use]
    pub fn upper(&self) -> Self {
        self.str_func(StrOp::Upper)
    }

    /// Substring containment.
    #[must_use]
    pub fn contains(&self, needle: impl Into<String>) -> Predicate {
        self.compare(
            CompareOp::Contains,
            ExprNode::Literal(Value::Text(needle.into())),
        )
    }

    /// SQL `LIKE` with `%`/`_` wildcards; the pattern is a bound operand.
    #[must_use]
    pub fn like(&self, pattern: impl Into<String>) -> Predicate {
        self.compare(
            CompareOp::Like,
            ExprNode::Literal(Value::Text(pattern.into())),
        )
    }

    #[must_use]
    pub fn starts_with(&self, prefix: impl Into<String>) -> Predicate {
        self.compare(
            CompareOp::StartsWith,
            ExprNode::Literal(Value::Text(prefix.into())),
        )
    }

    fn str_func(&self, op: StrOp) -> Self {
        Self::from_node(ExprNode::StrFunc {
            op,
            operand: Box::new(self.node().clone()),
        })
    }
}

///
/// IntoOperand
///
/// Right-hand operands accepted by typed comparisons and arithmetic:
/// literals of the matching logical type, expressions of the same type, and
/// scalar subqueries (including the numeric cross pairings the aggregate
/// operators produce).
///

pub trait IntoOperand<T> {
    fn into_operand(self) -> ExprNode;
}

impl<T> IntoOperand<T> for Expr<T> {
    fn into_operand(self) -> ExprNode {
        self.node
    }
}

impl<T> IntoOperand<T> for &Expr<T> {
    fn into_operand(self) -> ExprNode {
        self.node.clone()
    }
}

impl<T> IntoOperand<T> for SubqueryBuilder<T> {
    fn into_operand(self) -> ExprNode {
        self.into_node()
    }
}

/// Integer comparisons against float-valued subqueries (`avg` et al.).
impl IntoOperand<i64> for SubqueryBuilder<f64> {
    fn into_operand(self) -> ExprNode {
        self.into_node()
    }
}

/// Float comparisons against integer-valued subqueries.
impl IntoOperand<f64> for SubqueryBuilder<i64> {
    fn into_operand(self) -> ExprNode {
        self.into_node()
    }
}

impl IntoOperand<i64> for i64 {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Int(self))
    }
}

impl IntoOperand<i64> for i32 {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Int(i64::from(self)))
    }
}

impl IntoOperand<f64> for f64 {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Float(self))
    }
}

impl IntoOperand<bool> for bool {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Bool(self))
    }
}

impl IntoOperand<String> for &str {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Text(self.to_string()))
    }
}

impl IntoOperand<String> for String {
    fn into_operand(self) -> ExprNode {
        ExprNode::Literal(Value::Text(self))
    }
}

/// Bound literal operand for template argument lists.
#[must_use]
pub fn lit(value: impl Into<Value>) -> ExprNode {
    ExprNode::Literal(value.into())
}

/// Raw template expression for vendor functions not modeled natively.
///
/// Operands are positional (`{0}`, `{1}`, …) and always bound; the template
/// text itself never absorbs argument content.
#[must_use]
pub fn template<T>(
    template: impl Into<String>,
    args: impl IntoIterator<Item = ExprNode>,
) -> Expr<T> {
    Expr::from_node(ExprNode::Template {
        template: template.into(),
        args: args.into_iter().collect(),
    })
}

/// String-typed raw template.
#[must_use]
pub fn string_template(
    tpl: impl Into<String>,
    args: impl IntoIterator<Item = ExprNode>,
) -> Expr<String> {
    template(tpl, args)
}

/// Start a scalar subquery selecting one expression.
#[must_use]
pub fn subselect<T>(expr: Expr<T>) -> SubqueryBuilder<T> {
    SubqueryBuilder {
        selection: expr.into_node(),
        sources: Vec::new(),
        filter: None,
        _marker: PhantomData,
    }
}

///
/// SubqueryBuilder
///
/// Inner select usable as a comparison operand, an `in` source, or a
/// selected expression. The inner plan is validated when the outer plan
/// finalizes; its own sources bind its paths, and outer aliases remain
/// visible for correlation.
///

#[derive(Clone, Debug)]
pub struct SubqueryBuilder<T> {
    selection: ExprNode,
    sources: Vec<SourceRef>,
    filter: Option<Predicate>,
    _marker: PhantomData<T>,
}

impl<T> SubqueryBuilder<T> {
    /// Add a source entity reference.
    #[must_use]
    pub fn from<E: EntityKind>(mut self, source: &EntityRef<E>) -> Self {
        self.sources.push(source.source().clone());
        self
    }

    /// Add a filter, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Use this subquery as a selected expression in an outer query.
    #[must_use]
    pub fn scalar(self) -> Expr<T> {
        let node = self.into_node();
        Expr::from_node(node)
    }

    fn into_node(self) -> ExprNode {
        ExprNode::Subquery(Box::new(QueryPlan {
            selection: Selection::Single(self.selection),
            sources: self.sources,
            joins: Vec::new(),
            filter: self.filter,
            group_by: Vec::new(),
            having: None,
            order: Vec::new(),
            offset: 0,
            limit: None,
        }))
    }
}
