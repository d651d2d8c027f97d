use crate::{
    entity::{RelationPath, SourceRef},
    expr::ExprNode,
    plan::{
        Assignment, JoinClause, JoinKind, MutationKind, MutationPlan, OrderSpec, PlanError,
        QueryPlan, Selection, validate,
    },
    predicate::Predicate,
};

///
/// SelectBuilder
///
/// Accumulates select targets, sources, joins, filters, grouping, ordering,
/// and the page window in any order; `finalize` validates the whole and
/// produces the immutable [`QueryPlan`]. Builders are plain values: cheap to
/// clone, never submitted themselves.
///

#[derive(Clone, Debug, Default)]
pub struct SelectBuilder {
    selection: Option<Selection>,
    sources: Vec<SourceRef>,
    joins: Vec<JoinClause>,
    filter: Option<Predicate>,
    group_by: Vec<ExprNode>,
    having: Option<Predicate>,
    order: Vec<OrderSpec>,
    offset: Option<i64>,
    limit: Option<i64>,
    dangling_modifier: Option<&'static str>,
}

impl SelectBuilder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the projection target.
    #[must_use]
    pub fn select(mut self, selection: Selection) -> Self {
        self.selection = Some(selection);
        self
    }

    /// Add a source entity; multiple sources form a cross-product query.
    #[must_use]
    pub fn source(mut self, source: SourceRef) -> Self {
        self.sources.push(source);
        self
    }

    /// Add a join clause. Relationship joins carry their edge; unrelated
    /// joins match purely through a subsequent `on`.
    #[must_use]
    pub fn join(
        mut self,
        kind: JoinKind,
        target: SourceRef,
        relation: Option<RelationPath>,
    ) -> Self {
        self.joins.push(JoinClause {
            kind,
            target,
            relation,
            on: None,
            fetch: false,
        });
        self
    }

    /// Attach an `on` predicate to the most recent join clause.
    #[must_use]
    pub fn on(mut self, predicate: Predicate) -> Self {
        match self.joins.last_mut() {
            Some(join) => {
                join.on = Some(match join.on.take() {
                    Some(existing) => existing.and(predicate),
                    None => predicate,
                });
            }
            None => self.dangling_modifier = Some("on"),
        }
        self
    }

    /// Mark the most recent join clause fetch-eager.
    #[must_use]
    pub fn fetch_join(mut self) -> Self {
        match self.joins.last_mut() {
            Some(join) => join.fetch = true,
            None => self.dangling_modifier = Some("fetch_join"),
        }
        self
    }

    /// Add a filter predicate, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Add conditionally-present filter predicates; absent entries are
    /// dropped, and an all-absent list leaves the filter untouched.
    #[must_use]
    pub fn filter_all(self, predicates: impl IntoIterator<Item = Option<Predicate>>) -> Self {
        match Predicate::and_all(predicates) {
            Some(predicate) => self.filter(predicate),
            None => self,
        }
    }

    /// Append a grouping key.
    #[must_use]
    pub fn group_by(mut self, key: ExprNode) -> Self {
        self.group_by.push(key);
        self
    }

    /// Add a having predicate, AND-merged with any existing one.
    #[must_use]
    pub fn having(mut self, predicate: Predicate) -> Self {
        self.having = Some(match self.having.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Append a sort spec; specs apply left-to-right.
    #[must_use]
    pub fn order_by(mut self, spec: OrderSpec) -> Self {
        self.order.push(spec);
        self
    }

    /// Skip this many rows of the ordered result. Validated at finalize.
    #[must_use]
    pub const fn offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Bound the number of returned rows. Validated at finalize.
    #[must_use]
    pub const fn limit(mut self, limit: i64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Validate and produce the immutable plan.
    pub fn finalize(&self) -> Result<QueryPlan, PlanError> {
        if let Some(modifier) = self.dangling_modifier {
            return Err(PlanError::JoinModifierWithoutJoin { modifier });
        }

        let selection = self.selection.clone().ok_or(PlanError::EmptySelection)?;
        if self.sources.is_empty() {
            return Err(PlanError::MissingSource);
        }

        let offset = match self.offset {
            Some(value) if value < 0 => return Err(PlanError::NegativeOffset { value }),
            Some(value) => value.unsigned_abs(),
            None => 0,
        };
        let limit = match self.limit {
            Some(value) if value < 0 => return Err(PlanError::NegativeLimit { value }),
            Some(value) => Some(value.unsigned_abs()),
            None => None,
        };

        let plan = QueryPlan {
            selection,
            sources: self.sources.clone(),
            joins: self.joins.clone(),
            filter: self.filter.clone(),
            group_by: self.group_by.clone(),
            having: self.having.clone(),
            order: self.order.clone(),
            offset,
            limit,
        };

        validate::validate_query(&plan)?;

        Ok(plan)
    }
}

///
/// MutationBuilder
///
/// Builder for bulk update/delete plans. Constructed for one target entity;
/// `finalize` validates and seals the plan, which is then submitted once.
///

#[derive(Clone, Debug)]
pub struct MutationBuilder {
    target: SourceRef,
    assignments: Option<Vec<Assignment>>,
    filter: Option<Predicate>,
}

impl MutationBuilder {
    /// Start a bulk update against one target entity.
    #[must_use]
    pub const fn update(target: SourceRef) -> Self {
        Self {
            target,
            assignments: Some(Vec::new()),
            filter: None,
        }
    }

    /// Start a bulk delete against one target entity.
    #[must_use]
    pub const fn delete(target: SourceRef) -> Self {
        Self {
            target,
            assignments: None,
            filter: None,
        }
    }

    /// Bind a target path to a new-value expression.
    #[must_use]
    pub fn set(mut self, path: ExprNode, value: ExprNode) -> Self {
        if let Some(assignments) = &mut self.assignments {
            assignments.push(Assignment { path, value });
        }
        self
    }

    /// Add a filter predicate, AND-merged with any existing filter.
    #[must_use]
    pub fn filter(mut self, predicate: Predicate) -> Self {
        self.filter = Some(match self.filter.take() {
            Some(existing) => existing.and(predicate),
            None => predicate,
        });
        self
    }

    /// Add conditionally-present filter predicates; absent entries are dropped.
    #[must_use]
    pub fn filter_all(self, predicates: impl IntoIterator<Item = Option<Predicate>>) -> Self {
        match Predicate::and_all(predicates) {
            Some(predicate) => self.filter(predicate),
            None => self,
        }
    }

    /// Validate and produce the immutable mutation plan.
    pub fn finalize(&self) -> Result<MutationPlan, PlanError> {
        let kind = match &self.assignments {
            Some(assignments) if assignments.is_empty() => {
                return Err(PlanError::EmptyAssignments);
            }
            Some(assignments) => MutationKind::Update(assignments.clone()),
            None => MutationKind::Delete,
        };

        let plan = MutationPlan {
            target: self.target.clone(),
            kind,
            filter: self.filter.clone(),
        };

        validate::validate_mutation(&plan)?;

        Ok(plan)
    }
}
