use crate::{plan::PlanError, projection::ProjectionError, session::SessionError};
use thiserror::Error as ThisError;

///
/// QueryError
///
/// Caller-facing error taxonomy for query construction and execution.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum QueryError {
    #[error("{0}")]
    Plan(#[from] PlanError),

    #[error("{0}")]
    Projection(#[from] ProjectionError),

    /// A single-result fetch matched more than one row.
    #[error("query matched {matched} rows where at most one was expected")]
    TooManyResults { matched: usize },

    #[error("{0}")]
    Session(#[from] SessionError),
}
