//! Bulk mutation executors.
//!
//! Update/delete plans bypass per-row materialization entirely: the session
//! writes directly to the backing store and reports an affected-row count.
//! Already-materialized objects and identity caches held by the session are
//! NOT reconciled — that staleness is a documented hazard of bulk
//! mutations, and the fix (`flush` then `clear` before re-reading) belongs
//! to the caller.

use crate::{
    error::QueryError,
    expr::{Expr, IntoOperand},
    obs::{self, ExecEvent},
    plan::MutationBuilder,
    predicate::Predicate,
    session::Session,
};

///
/// UpdateQuery
///
/// Session-bound bulk update. Built, submitted once, finalized.
///

pub struct UpdateQuery<'s, S: Session> {
    session: &'s S,
    builder: MutationBuilder,
    entity: String,
}

impl<'s, S: Session> UpdateQuery<'s, S> {
    pub(crate) const fn new(session: &'s S, builder: MutationBuilder, entity: String) -> Self {
        Self {
            session,
            builder,
            entity,
        }
    }

    /// Bind a target path to a new value or value expression.
    ///
    /// Expressions may reference the target row itself, so increments like
    /// `set(age, age.add(1))` stay a single round-trip.
    #[must_use]
    pub fn set<T>(mut self, path: Expr<T>, value: impl IntoOperand<T>) -> Self {
        self.builder = self.builder.set(path.into_node(), value.into_operand());
        self
    }

    /// Add a filter predicate, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.builder = self.builder.filter(predicate);
        self
    }

    /// Add conditionally-present filters; absent entries are dropped.
    #[must_use]
    pub fn filter_all(mut self, predicates: impl IntoIterator<Item = Option<Predicate>>) -> Self {
        self.builder = self.builder.filter_all(predicates);
        self
    }

    /// Finalize and submit; returns the affected-row count.
    pub fn execute(&self) -> Result<u64, QueryError> {
        execute_mutation(self.session, &self.builder, &self.entity)
    }
}

///
/// DeleteQuery
///
/// Session-bound bulk delete. Built, submitted once, finalized.
///

pub struct DeleteQuery<'s, S: Session> {
    session: &'s S,
    builder: MutationBuilder,
    entity: String,
}

impl<'s, S: Session> DeleteQuery<'s, S> {
    pub(crate) const fn new(session: &'s S, builder: MutationBuilder, entity: String) -> Self {
        Self {
            session,
            builder,
            entity,
        }
    }

    /// Add a filter predicate, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.builder = self.builder.filter(predicate);
        self
    }

    /// Add conditionally-present filters; absent entries are dropped.
    #[must_use]
    pub fn filter_all(mut self, predicates: impl IntoIterator<Item = Option<Predicate>>) -> Self {
        self.builder = self.builder.filter_all(predicates);
        self
    }

    /// Finalize and submit; returns the affected-row count.
    pub fn execute(&self) -> Result<u64, QueryError> {
        execute_mutation(self.session, &self.builder, &self.entity)
    }
}

fn execute_mutation<S: Session>(
    session: &S,
    builder: &MutationBuilder,
    entity: &str,
) -> Result<u64, QueryError> {
    let plan = builder.finalize()?;

    obs::record(&ExecEvent::MutationStart {
        entity: entity.to_string(),
    });
    let rows_affected = session.submit_mutation(&plan)?;
    obs::record(&ExecEvent::MutationFinish {
        entity: entity.to_string(),
        rows_affected,
    });

    Ok(rows_affected)
}
