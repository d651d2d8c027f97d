//! Finalize-time plan validation.
//!
//! Validation ownership: every user-facing structural invariant is checked
//! here and surfaces as [`PlanError`] naming the violated rule. Sessions may
//! defend their own execution preconditions, but must not reinterpret these
//! semantics.

use crate::{
    expr::ExprNode,
    plan::{MutationKind, MutationPlan, QueryPlan},
};
use std::collections::BTreeSet;
use thiserror::Error as ThisError;

///
/// PlanError
///
/// Structural invariant violations raised when a plan is finalized. These
/// are caller mistakes, never planner bugs, and never reach a session.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum PlanError {
    /// A path expression's root is not bound by any source or join.
    #[error("expression references alias '{alias}' which no source or join binds")]
    UnboundReference { alias: String },

    #[error("offset must be non-negative, got {value}")]
    NegativeOffset { value: i64 },

    #[error("limit must be non-negative, got {value}")]
    NegativeLimit { value: i64 },

    /// Mixing aggregate and non-aggregate projection expressions is only
    /// meaningful under grouping; anything else is engine-defined and is
    /// rejected here instead of reproduced.
    #[error("projection mixes aggregate and non-aggregate expressions without group_by")]
    MixedAggregateWithoutGroupBy,

    #[error("having requires an explicit group_by")]
    HavingWithoutGroupBy,

    /// Fetch-eagerness is meaningless on a cross-product source.
    #[error("fetch-eager join targeting '{alias}' must follow a relationship edge")]
    FetchJoinWithoutRelation { alias: String },

    #[error("'{modifier}' must follow a join clause")]
    JoinModifierWithoutJoin { modifier: &'static str },

    #[error("query selects nothing")]
    EmptySelection,

    #[error("query has no source entity")]
    MissingSource,

    #[error("bulk update assignment target must be a plain path expression")]
    AssignmentTargetNotPath,

    #[error("bulk update requires at least one assignment")]
    EmptyAssignments,
}

/// Validate a finalized query plan, including nested subquery plans.
pub(crate) fn validate_query(plan: &QueryPlan) -> Result<(), PlanError> {
    validate_query_scoped(plan, &BTreeSet::new())
}

fn validate_query_scoped(plan: &QueryPlan, outer: &BTreeSet<String>) -> Result<(), PlanError> {
    let mut bound = outer.clone();
    for source in &plan.sources {
        bound.insert(source.alias.clone());
    }
    for join in &plan.joins {
        bound.insert(join.target.alias.clone());
    }

    for join in &plan.joins {
        if join.fetch && join.relation.is_none() {
            return Err(PlanError::FetchJoinWithoutRelation {
                alias: join.target.alias.clone(),
            });
        }
        if let Some(relation) = &join.relation {
            require_bound(&bound, &relation.alias)?;
        }
        if let Some(on) = &join.on {
            validate_expr(on.node(), &bound)?;
        }
    }

    for expr in plan.selection.exprs() {
        validate_expr(expr, &bound)?;
    }
    if let Some(filter) = &plan.filter {
        validate_expr(filter.node(), &bound)?;
    }
    for key in &plan.group_by {
        validate_expr(key, &bound)?;
    }
    if let Some(having) = &plan.having {
        validate_expr(having.node(), &bound)?;
    }
    for spec in &plan.order {
        validate_expr(&spec.expr, &bound)?;
    }

    if plan.having.is_some() && plan.group_by.is_empty() {
        return Err(PlanError::HavingWithoutGroupBy);
    }

    if plan.group_by.is_empty() {
        let exprs = plan.selection.exprs();
        let aggregates = exprs.iter().filter(|e| e.contains_aggregate()).count();
        if aggregates > 0 && aggregates < exprs.len() {
            return Err(PlanError::MixedAggregateWithoutGroupBy);
        }
    }

    Ok(())
}

/// Validate a finalized mutation plan.
pub(crate) fn validate_mutation(plan: &MutationPlan) -> Result<(), PlanError> {
    let mut bound = BTreeSet::new();
    bound.insert(plan.target.alias.clone());

    if let MutationKind::Update(assignments) = &plan.kind {
        for assignment in assignments {
            if !matches!(assignment.path, ExprNode::Path { .. }) {
                return Err(PlanError::AssignmentTargetNotPath);
            }
            validate_expr(&assignment.path, &bound)?;
            validate_expr(&assignment.value, &bound)?;
        }
    }

    if let Some(filter) = &plan.filter {
        validate_expr(filter.node(), &bound)?;
    }

    Ok(())
}

// Walk one expression: every path root must be bound, and nested subquery
// plans validate against their own sources plus the enclosing scope.
fn validate_expr(expr: &ExprNode, bound: &BTreeSet<String>) -> Result<(), PlanError> {
    let mut result = Ok(());
    expr.walk(&mut |node| {
        if result.is_err() {
            return;
        }
        result = match node {
            ExprNode::Path { alias, .. } | ExprNode::EntityAll { alias } => {
                require_bound(bound, alias)
            }
            ExprNode::Subquery(inner) => validate_query_scoped(inner, bound),
            _ => Ok(()),
        };
    });
    result
}

fn require_bound(bound: &BTreeSet<String>, alias: &str) -> Result<(), PlanError> {
    if bound.contains(alias) {
        Ok(())
    } else {
        Err(PlanError::UnboundReference {
            alias: alias.to_string(),
        })
    }
}
