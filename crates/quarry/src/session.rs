//! The external persistence collaborator.
//!
//! The core builds and dispatches plans; everything stateful — transaction
//! boundaries, identity-map caching, lazy loading, dialect translation —
//! lives behind this trait. One session is one logical unit of work.

use crate::{
    entity::RelationHandle,
    plan::{MutationPlan, QueryPlan},
    value::Value,
};
use thiserror::Error as ThisError;

/// One result row: one value per selected expression, in selection order.
///
/// Whole-entity selection items arrive as [`Value::Entity`] (field values in
/// declaration order, relationship fields as [`Value::Relation`]) or as
/// [`Value::Null`] for unmatched left-join slots.
pub type Row = Vec<Value>;

///
/// Session
///
/// Execution boundary consumed by the executors. Submission is synchronous
/// from the core's perspective; retries and timeouts are the session's (or
/// the caller's) business.
///
/// Bulk mutations write past any identity cache the session holds. A caller
/// that needs to observe a mutation through object-shaped queries on the
/// same session must `flush()` then `clear()` first; the core never
/// reconciles caches implicitly.
///

pub trait Session {
    /// Execute a finalized query plan and return its rows in plan order.
    fn submit_query(&self, plan: &QueryPlan) -> Result<Vec<Row>, SessionError>;

    /// Execute a finalized bulk mutation plan; returns affected-row count.
    fn submit_mutation(&self, plan: &MutationPlan) -> Result<u64, SessionError>;

    /// Write pending mutations through to the backing store.
    fn flush(&self) -> Result<(), SessionError>;

    /// Drop cached identities; subsequent reads re-materialize from rows.
    fn clear(&self);

    /// Whether the referent of a relationship handle is materialized.
    fn is_loaded(&self, handle: &RelationHandle) -> bool;
}

///
/// SessionError
///
/// Pass-through failure from actual data access. The core surfaces these
/// uninterpreted.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("session failure: {message}")]
pub struct SessionError {
    pub message: String,
}

impl SessionError {
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
