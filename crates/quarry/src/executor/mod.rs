//! Session-bound execution: the query factory, fluent select queries, and
//! the fetch terminals.
//!
//! The factory owns nothing but a session borrow; queries are value objects
//! wrapping a plan builder plus the typed row mapper chosen at select time.
//! Plans reach the session only through `finalize`, so partially-built
//! queries can never be submitted.

mod mutation;


pub use mutation::{DeleteQuery, UpdateQuery};

use crate::{
    entity::{EntityKind, EntityRef, EntityRow, RelationPath},
    error::QueryError,
    expr::{Expr, ExprNode, SubqueryBuilder},
    obs::{self, ExecEvent},
    plan::{
        CountShape, JoinKind, MutationBuilder, OrderSpec, PlanError, QueryPlan, SelectBuilder,
        Selection,
    },
    predicate::Predicate,
    projection::{FromValue, Mapping, ProjectionError, RowFn, decode_column},
    session::Session,
    value::Value,
};
use std::sync::Arc;

///
/// QueryFactory
///
/// Entry point bound to one session. Factories are cheap, borrow-only
/// values; one per unit of work is the intended shape.
///

pub struct QueryFactory<'s, S: Session> {
    session: &'s S,
}

impl<'s, S: Session> QueryFactory<'s, S> {
    #[must_use]
    pub const fn new(session: &'s S) -> Self {
        Self { session }
    }

    /// Start a query selecting the given projection target.
    #[must_use]
    pub fn select<D>(&self, target: impl IntoSelect<D>) -> SelectQuery<'s, S, D> {
        let (selection, mapper) = target.into_select();
        SelectQuery {
            session: self.session,
            builder: SelectBuilder::new().select(selection),
            mapper,
        }
    }

    /// Start a whole-entity query over one source.
    #[must_use]
    pub fn select_from<E>(&self, source: &EntityRef<E>) -> SelectQuery<'s, S, E>
    where
        E: EntityRow + FromValue + 'static,
    {
        self.select(source).from(source)
    }

    /// Start a bulk update against one target entity.
    #[must_use]
    pub fn update<E: EntityKind>(&self, target: &EntityRef<E>) -> UpdateQuery<'s, S> {
        UpdateQuery::new(
            self.session,
            MutationBuilder::update(target.source().clone()),
            target.source().entity.clone(),
        )
    }

    /// Start a bulk delete against one target entity.
    #[must_use]
    pub fn delete<E: EntityKind>(&self, target: &EntityRef<E>) -> DeleteQuery<'s, S> {
        DeleteQuery::new(
            self.session,
            MutationBuilder::delete(target.source().clone()),
            target.source().entity.clone(),
        )
    }
}

///
/// Page
///
/// One slice of an ordered result plus the unsliced total. `total` reflects
/// the filter without the page window.
///

#[derive(Clone, Debug)]
pub struct Page<D> {
    pub items: Vec<D>,
    pub total: u64,
    pub offset: u64,
    pub limit: Option<u64>,
}

///
/// SelectQuery
///
/// Fluent, session-bound query. Refinement methods are pure builders; the
/// `fetch_*` terminals finalize, submit, and materialize.
///

pub struct SelectQuery<'s, S: Session, D> {
    session: &'s S,
    builder: SelectBuilder,
    mapper: RowFn<D>,
}

impl<'s, S: Session, D> SelectQuery<'s, S, D> {
    // ------------------------------------------------------------------
    // Sources and joins
    // ------------------------------------------------------------------

    /// Add a source entity; repeated calls form a cross-product query.
    #[must_use]
    pub fn from<E: EntityKind>(mut self, source: &EntityRef<E>) -> Self {
        self.builder = self.builder.source(source.source().clone());
        self
    }

    /// Inner join along a relationship edge.
    #[must_use]
    pub fn join<E: EntityKind>(mut self, relation: RelationPath, target: &EntityRef<E>) -> Self {
        self.builder = self
            .builder
            .join(JoinKind::Inner, target.source().clone(), Some(relation));
        self
    }

    /// Left outer join along a relationship edge.
    #[must_use]
    pub fn left_join<E: EntityKind>(
        mut self,
        relation: RelationPath,
        target: &EntityRef<E>,
    ) -> Self {
        self.builder = self
            .builder
            .join(JoinKind::LeftOuter, target.source().clone(), Some(relation));
        self
    }

    /// Inner join against an unrelated source; match with `on`.
    #[must_use]
    pub fn join_source<E: EntityKind>(mut self, target: &EntityRef<E>) -> Self {
        self.builder = self
            .builder
            .join(JoinKind::Inner, target.source().clone(), None);
        self
    }

    /// Left outer join against an unrelated source; match with `on`.
    #[must_use]
    pub fn left_join_source<E: EntityKind>(mut self, target: &EntityRef<E>) -> Self {
        self.builder = self
            .builder
            .join(JoinKind::LeftOuter, target.source().clone(), None);
        self
    }

    /// Restrict which right-side rows the most recent join matches.
    ///
    /// Distinct from `filter`, which filters the joined result afterward —
    /// the difference is observable on outer joins.
    #[must_use]
    pub fn on(mut self, predicate: Predicate) -> Self {
        self.builder = self.builder.on(predicate);
        self
    }

    /// Ask the session to eagerly materialize the most recent join's
    /// relationship. A loading hint only: row shape, cardinality, and
    /// filtering are unaffected.
    #[must_use]
    pub fn fetch_join(mut self) -> Self {
        self.builder = self.builder.fetch_join();
        self
    }

    // ------------------------------------------------------------------
    // Refinement
    // ------------------------------------------------------------------

    /// Add a filter predicate, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.builder = self.builder.filter(predicate);
        self
    }

    /// Add conditionally-present filters; absent entries are dropped rather
    /// than raising an error.
    #[must_use]
    pub fn filter_all(mut self, predicates: impl IntoIterator<Item = Option<Predicate>>) -> Self {
        self.builder = self.builder.filter_all(predicates);
        self
    }

    /// Append a grouping key.
    #[must_use]
    pub fn group_by<T>(mut self, key: Expr<T>) -> Self {
        self.builder = self.builder.group_by(key.into_node());
        self
    }

    /// Add a having predicate over grouped rows.
    #[must_use]
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.builder = self.builder.having(predicate);
        self
    }

    /// Append a sort spec; specs apply left-to-right.
    #[must_use]
    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.builder = self.builder.order_by(spec);
        self
    }

    /// Skip rows of the ordered result. Negative values fail at finalize.
    #[must_use]
    pub fn offset(mut self, offset: i64) -> Self {
        self.builder = self.builder.offset(offset);
        self
    }

    /// Bound returned rows. Negative values fail at finalize.
    #[must_use]
    pub fn limit(mut self, limit: i64) -> Self {
        self.builder = self.builder.limit(limit);
        self
    }

    // ------------------------------------------------------------------
    // Planning
    // ------------------------------------------------------------------

    /// Finalize without executing.
    pub fn plan(&self) -> Result<QueryPlan, PlanError> {
        self.builder.finalize()
    }

    // ------------------------------------------------------------------
    // Execution terminals
    // ------------------------------------------------------------------

    /// Execute and return all rows in plan order.
    pub fn fetch(&self) -> Result<Vec<D>, QueryError> {
        let plan = self.builder.finalize()?;
        self.run(&plan)
    }

    /// Execute and require at most one row.
    ///
    /// Zero rows is `Ok(None)`; more than one is
    /// [`QueryError::TooManyResults`].
    pub fn fetch_one(&self) -> Result<Option<D>, QueryError> {
        let mut items = self.fetch()?;
        match items.len() {
            0 => Ok(None),
            1 => Ok(items.pop()),
            matched => Err(QueryError::TooManyResults { matched }),
        }
    }

    /// Execute and return the first row, if any. Never errors on emptiness.
    pub fn fetch_first(&self) -> Result<Option<D>, QueryError> {
        let plan = self.builder.clone().limit(1).finalize()?;
        Ok(self.run(&plan)?.into_iter().next())
    }

    /// Row count for this query's filter, ignoring offset/limit.
    pub fn fetch_count(&self) -> Result<u64, QueryError> {
        let plan = self.builder.finalize()?;
        self.count_of(&plan)
    }

    /// Execute the sliced query and the unsliced count in one call.
    ///
    /// Two session round-trips; the total always reflects the filter
    /// without the page window.
    pub fn fetch_page(&self) -> Result<Page<D>, QueryError> {
        let plan = self.builder.finalize()?;
        let total = self.count_of(&plan)?;
        let items = self.run(&plan)?;

        Ok(Page {
            items,
            total,
            offset: plan.offset(),
            limit: plan.limit(),
        })
    }

    fn run(&self, plan: &QueryPlan) -> Result<Vec<D>, QueryError> {
        let entity = plan.sources()[0].entity.clone();
        obs::record(&ExecEvent::QueryStart {
            entity: entity.clone(),
        });

        let rows = self.session.submit_query(plan)?;
        obs::record(&ExecEvent::QueryFinish {
            entity,
            rows: rows.len() as u64,
        });

        rows.into_iter()
            .map(|row| (self.mapper)(row).map_err(QueryError::from))
            .collect()
    }

    fn count_of(&self, plan: &QueryPlan) -> Result<u64, QueryError> {
        match plan.count_shape() {
            CountShape::One => Ok(1),
            CountShape::Grouped(stripped) => {
                Ok(self.session.submit_query(&stripped)?.len() as u64)
            }
            CountShape::Total(counting) => {
                let rows = self.session.submit_query(&counting)?;
                let value = rows
                    .into_iter()
                    .next()
                    .and_then(|mut row| row.pop())
                    .unwrap_or(Value::Int(0));
                let count: i64 = decode_column("count", value)?;
                Ok(u64::try_from(count).unwrap_or(0))
            }
        }
    }
}

/// Per-column typed decoder paired with its expression.
pub type ColumnFn<T> = Arc<dyn Fn(Value) -> Result<T, ProjectionError> + Send + Sync>;

///
/// SelectItem
///
/// One selectable column: a typed expression, a whole entity reference, or
/// a scalar subquery.
///

pub trait SelectItem<T> {
    fn into_item(self) -> (ExprNode, ColumnFn<T>);
}

impl<T: FromValue> SelectItem<T> for Expr<T> {
    fn into_item(self) -> (ExprNode, ColumnFn<T>) {
        let node = self.into_node();
        let column = node
            .projection_name()
            .unwrap_or(T::EXPECTED)
            .to_string();
        (node, Arc::new(move |value| decode_column(&column, value)))
    }
}

impl<E: EntityRow + FromValue> SelectItem<E> for &EntityRef<E> {
    fn into_item(self) -> (ExprNode, ColumnFn<E>) {
        self.all().into_item()
    }
}

impl<T: FromValue> SelectItem<T> for SubqueryBuilder<T> {
    fn into_item(self) -> (ExprNode, ColumnFn<T>) {
        self.scalar().into_item()
    }
}

///
/// IntoSelect
///
/// A complete projection target: one item, a fixed-arity tuple of items, or
/// a mapping descriptor. Produces the erased selection for the plan and the
/// typed row mapper for materialization.
///

pub trait IntoSelect<D> {
    fn into_select(self) -> (Selection, RowFn<D>);
}

impl<T: FromValue + 'static> IntoSelect<T> for Expr<T> {
    fn into_select(self) -> (Selection, RowFn<T>) {
        single_select(self)
    }
}

impl<E: EntityRow + FromValue + 'static> IntoSelect<E> for &EntityRef<E> {
    fn into_select(self) -> (Selection, RowFn<E>) {
        single_select(self)
    }
}

impl<T: FromValue + 'static> IntoSelect<T> for SubqueryBuilder<T> {
    fn into_select(self) -> (Selection, RowFn<T>) {
        single_select(self)
    }
}

impl<D> IntoSelect<D> for Mapping<D> {
    fn into_select(self) -> (Selection, RowFn<D>) {
        self.into_parts()
    }
}

fn single_select<T: 'static>(item: impl SelectItem<T>) -> (Selection, RowFn<T>) {
    let (node, column) = item.into_item();
    let mapper: RowFn<T> = Arc::new(move |row: Vec<Value>| {
        let [value]: [Value; 1] =
            row.try_into()
                .map_err(|row: Vec<Value>| ProjectionError::RowArity {
                    expected: 1,
                    found: row.len(),
                })?;
        column(value)
    });
    (Selection::Single(node), mapper)
}

macro_rules! impl_tuple_select {
    ( $len:expr; $( ($T:ident, $I:ident, $col:ident, $val:ident) ),+ ) => {
        impl<$($T,)+ $($I,)+> IntoSelect<($($T,)+)> for ($($I,)+)
        where
            $( $T: 'static, )+
            $( $I: SelectItem<$T>, )+
        {
            fn into_select(self) -> (Selection, RowFn<($($T,)+)>) {
                let ( $($col,)+ ) = self;
                let mut nodes: Vec<ExprNode> = Vec::with_capacity($len);
                $(
                    let $col = {
                        let (node, column) = $col.into_item();
                        nodes.push(node);
                        column
                    };
                )+

                let mapper: RowFn<($($T,)+)> = Arc::new(move |row: Vec<Value>| {
                    let [ $($val,)+ ]: [Value; $len] =
                        row.try_into()
                            .map_err(|row: Vec<Value>| ProjectionError::RowArity {
                                expected: $len,
                                found: row.len(),
                            })?;
                    Ok(( $( $col($val)?, )+ ))
                });

                (Selection::Tuple(nodes), mapper)
            }
        }
    };
}

impl_tuple_select!(2; (T0, I0, c0, v0), (T1, I1, c1, v1));
impl_tuple_select!(3; (T0, I0, c0, v0), (T1, I1, c1, v1), (T2, I2, c2, v2));
impl_tuple_select!(4;
    (T0, I0, c0, v0), (T1, I1, c1, v1), (T2, I2, c2, v2), (T3, I3, c3, v3));
impl_tuple_select!(5;
    (T0, I0, c0, v0), (T1, I1, c1, v1), (T2, I2, c2, v2), (T3, I3, c3, v3),
    (T4, I4, c4, v4));
