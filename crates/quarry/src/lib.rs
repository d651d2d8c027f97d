//! Quarry: a typed query composition and dispatch layer.
//!
//! Callers build relational queries — filters, joins, aggregation, ordering,
//! pagination, bulk mutation — out of reusable typed expression fragments,
//! combine conditionally-present criteria safely, and materialize
//! heterogeneous result rows into typed objects through pluggable mapping
//! strategies.
//!
//! Persistence itself lives behind the [`session::Session`] trait: identity
//! caching, lazy loading, dialect translation, and transactions are the
//! session's business. This crate only assembles immutable plans and
//! dispatches them.

#![warn(unreachable_pub)]

pub mod entity;
pub mod error;
pub mod executor;
pub mod expr;
pub mod obs;
pub mod plan;
pub mod predicate;
pub mod projection;
pub mod session;
pub mod value;

///
/// Prelude
///
/// The vocabulary needed to define entities, build queries, and implement
/// sessions and projection targets.
///

pub mod prelude {
    pub use crate::{
        entity::{
            EntityKind, EntityRef, EntityRow, FieldDef, FieldKind, RelationHandle, RelationPath,
            SourceRef, entity_from_value,
        },
        error::QueryError,
        executor::{DeleteQuery, Page, QueryFactory, SelectQuery, UpdateQuery},
        expr::{Expr, ExprNode, lit, string_template, subselect, template},
        plan::{
            Assignment, JoinClause, JoinKind, MappingStrategy, MutationKind, MutationPlan,
            NullOrder, OrderDirection, OrderSpec, PlanError, QueryPlan, Selection,
        },
        predicate::{BooleanBuilder, Predicate},
        projection::{
            AccessorTarget, ConstructRow, FieldTarget, FromValue, Mapping, ProjectionError,
            Projections, ValueError, decode_column,
        },
        session::{Row, Session, SessionError},
        value::Value,
    };
}
