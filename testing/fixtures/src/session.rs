//! In-memory reference session.
//!
//! `MemorySession` implements the full `Session` contract over plain tables
//! and deliberately reproduces the cache behavior of a real ORM session:
//!
//! - materialized entities go through an identity map, so re-reading a row
//!   through the same session returns the cached snapshot;
//! - bulk mutations write directly to the tables and never touch the
//!   identity map — the staleness the core documents is observable here;
//! - fetch-eager joins mark the related entity loaded, which `is_loaded`
//!   reports.
//!
//! Vendor `function('…')` templates are interpreted here because dialect
//! concerns belong to the session, not the core.

use crate::entities::{Group, User};
use quarry::{
    expr::{AggregateOp, ArithOp, CompareOp, StrOp},
    prelude::*,
};
use std::cell::RefCell;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

type StoredRow = BTreeMap<String, Value>;
type Frame = BTreeMap<String, Option<StoredRow>>;

///
/// StoredEntity
/// Write-side view of a fixture entity: named field values for one row.
///

pub trait StoredEntity: EntityKind {
    fn field_values(&self) -> Vec<(&'static str, Value)>;
}

impl StoredEntity for Group {
    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Int(self.id)),
            ("name", Value::Text(self.name.clone())),
        ]
    }
}

impl StoredEntity for User {
    fn field_values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("id", Value::Int(self.id)),
            ("username", Value::from(self.username.clone())),
            ("age", Value::Int(self.age)),
            (
                "group_id",
                self.group
                    .as_ref()
                    .map_or(Value::Null, |handle| (*handle.key).clone()),
            ),
        ]
    }
}

fn fields_of(entity: &str) -> &'static [FieldDef] {
    match entity {
        "user" => User::FIELDS,
        "group" => Group::FIELDS,
        _ => &[],
    }
}

fn primary_key_of(entity: &str) -> &'static str {
    match entity {
        "user" => User::PRIMARY_KEY,
        _ => Group::PRIMARY_KEY,
    }
}

fn key_repr(value: &Value) -> String {
    format!("{value:?}")
}

///
/// MemorySession
///

#[derive(Default)]
pub struct MemorySession {
    tables: RefCell<BTreeMap<String, Vec<StoredRow>>>,
    identity: RefCell<BTreeMap<(String, String), Value>>,
    loaded: RefCell<BTreeSet<(String, String)>>,
}

impl MemorySession {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert one entity row into its table.
    pub fn persist<T: StoredEntity>(&self, row: &T) {
        let stored: StoredRow = row
            .field_values()
            .into_iter()
            .map(|(name, value)| (name.to_string(), value))
            .collect();

        self.tables
            .borrow_mut()
            .entry(T::ENTITY.to_string())
            .or_default()
            .push(stored);
    }

    /// Number of identities currently cached (test introspection).
    #[must_use]
    pub fn cached_identities(&self) -> usize {
        self.identity.borrow().len()
    }
}

impl Session for MemorySession {
    fn submit_query(&self, plan: &QueryPlan) -> Result<Vec<Row>, SessionError> {
        let tables = self.tables.borrow().clone();
        let eval = Eval {
            session: self,
            tables: &tables,
            aliases: alias_map(plan),
        };
        eval.run(plan)
    }

    fn submit_mutation(&self, plan: &MutationPlan) -> Result<u64, SessionError> {
        let snapshot = self.tables.borrow().clone();
        let target = plan.target();
        let eval = Eval {
            session: self,
            tables: &snapshot,
            aliases: BTreeMap::from([(target.alias.clone(), target.entity.clone())]),
        };

        let rows = snapshot.get(&target.entity).cloned().unwrap_or_default();
        let mut affected = 0u64;

        let frame_for = |row: &StoredRow| -> Frame {
            BTreeMap::from([(target.alias.clone(), Some(row.clone()))])
        };
        let matches = |frame: &Frame| -> Result<bool, SessionError> {
            plan.filter()
                .map_or(Ok(true), |p| eval.truthy(p.node(), &Scope::Row(frame)))
        };

        match plan.kind() {
            MutationKind::Update(assignments) => {
                let mut updated = rows.clone();
                for (i, row) in rows.iter().enumerate() {
                    let frame = frame_for(row);
                    if !matches(&frame)? {
                        continue;
                    }
                    for assignment in assignments {
                        let ExprNode::Path { field, .. } = &assignment.path else {
                            return Err(SessionError::new(
                                "bulk update assignment target must be a path",
                            ));
                        };
                        let value = eval.eval(&assignment.value, &Scope::Row(&frame))?;
                        updated[i].insert(field.clone(), value);
                    }
                    affected += 1;
                }
                self.tables
                    .borrow_mut()
                    .insert(target.entity.clone(), updated);
            }
            MutationKind::Delete => {
                let mut kept = Vec::new();
                for row in rows {
                    let frame = frame_for(&row);
                    if matches(&frame)? {
                        affected += 1;
                    } else {
                        kept.push(row);
                    }
                }
                self.tables.borrow_mut().insert(target.entity.clone(), kept);
            }
        }

        // The identity map is deliberately NOT reconciled here.
        Ok(affected)
    }

    fn flush(&self) -> Result<(), SessionError> {
        // Mutations write through immediately; nothing is pending.
        Ok(())
    }

    fn clear(&self) {
        self.identity.borrow_mut().clear();
        self.loaded.borrow_mut().clear();
    }

    fn is_loaded(&self, handle: &RelationHandle) -> bool {
        self.loaded
            .borrow()
            .contains(&(handle.entity.clone(), key_repr(&handle.key)))
    }
}

fn alias_map(plan: &QueryPlan) -> BTreeMap<String, String> {
    let mut aliases = BTreeMap::new();
    for source in plan.sources() {
        aliases.insert(source.alias.clone(), source.entity.clone());
    }
    for join in plan.joins() {
        aliases.insert(join.target.alias.clone(), join.target.entity.clone());
    }
    aliases
}

///
/// Scope
/// Evaluation context: a single joined row, or a group of them.
///

enum Scope<'a> {
    Row(&'a Frame),
    Group { frames: &'a [Frame] },
}

///
/// Eval
/// One plan evaluation over a table snapshot.
///

struct Eval<'a> {
    session: &'a MemorySession,
    tables: &'a BTreeMap<String, Vec<StoredRow>>,
    aliases: BTreeMap<String, String>,
}

impl Eval<'_> {
    fn run(&self, plan: &QueryPlan) -> Result<Vec<Row>, SessionError> {
        // Cross product of the declared sources.
        let mut frames: Vec<Frame> = vec![Frame::new()];
        for source in plan.sources() {
            let rows = self.rows_of(&source.entity);
            let mut next = Vec::with_capacity(frames.len() * rows.len().max(1));
            for frame in &frames {
                for row in rows {
                    let mut joined = frame.clone();
                    joined.insert(source.alias.clone(), Some(row.clone()));
                    next.push(joined);
                }
            }
            frames = next;
        }

        for join in plan.joins() {
            frames = self.apply_join(frames, join)?;
        }

        if let Some(filter) = plan.filter() {
            let mut kept = Vec::new();
            for frame in frames {
                if self.truthy(filter.node(), &Scope::Row(&frame))? {
                    kept.push(frame);
                }
            }
            frames = kept;
        }

        let grouped = !plan.group_by().is_empty()
            || plan
                .selection()
                .exprs()
                .iter()
                .any(ExprNode::contains_aggregate);

        if grouped {
            self.run_grouped(plan, frames)
        } else {
            self.run_flat(plan, frames)
        }
    }

    fn run_flat(&self, plan: &QueryPlan, mut frames: Vec<Frame>) -> Result<Vec<Row>, SessionError> {
        if !plan.order().is_empty() {
            let mut keys = Vec::with_capacity(frames.len());
            for frame in &frames {
                keys.push(self.sort_key(plan.order(), &Scope::Row(frame))?);
            }
            frames = sorted_by_keys(frames, keys, plan.order());
        }

        let frames = window(frames, plan.offset(), plan.limit());

        frames
            .iter()
            .map(|frame| self.project(plan, &Scope::Row(frame)))
            .collect()
    }

    fn run_grouped(&self, plan: &QueryPlan, frames: Vec<Frame>) -> Result<Vec<Row>, SessionError> {
        // Groups keep key-insertion order.
        let mut groups: Vec<(Vec<Value>, Vec<Frame>)> = Vec::new();
        if plan.group_by().is_empty() {
            // Pure aggregate projection: one group over everything, kept
            // even when no rows matched.
            groups.push((Vec::new(), frames));
        } else {
            for frame in frames {
                let key = plan
                    .group_by()
                    .iter()
                    .map(|k| self.eval(k, &Scope::Row(&frame)))
                    .collect::<Result<Vec<_>, _>>()?;
                match groups.iter_mut().find(|(existing, _)| *existing == key) {
                    Some((_, members)) => members.push(frame),
                    None => groups.push((key, vec![frame])),
                }
            }
        }

        if let Some(having) = plan.having() {
            let mut kept = Vec::new();
            for (key, members) in groups {
                if self.truthy(having.node(), &Scope::Group { frames: &members })? {
                    kept.push((key, members));
                }
            }
            groups = kept;
        }

        if !plan.order().is_empty() {
            let mut keys = Vec::with_capacity(groups.len());
            for (_, members) in &groups {
                keys.push(self.sort_key(plan.order(), &Scope::Group { frames: members })?);
            }
            groups = sorted_by_keys(groups, keys, plan.order());
        }

        let groups = window(groups, plan.offset(), plan.limit());

        groups
            .iter()
            .map(|(_, members)| self.project(plan, &Scope::Group { frames: members }))
            .collect()
    }

    fn project(&self, plan: &QueryPlan, scope: &Scope<'_>) -> Result<Row, SessionError> {
        plan.selection()
            .exprs()
            .iter()
            .map(|expr| self.eval(expr, scope))
            .collect()
    }

    fn sort_key(&self, order: &[OrderSpec], scope: &Scope<'_>) -> Result<Vec<Value>, SessionError> {
        order.iter().map(|spec| self.eval(&spec.expr, scope)).collect()
    }

    fn apply_join(&self, frames: Vec<Frame>, join: &JoinClause) -> Result<Vec<Frame>, SessionError> {
        let right_rows = self.rows_of(&join.target.entity);
        let pk = primary_key_of(&join.target.entity);
        let mut out = Vec::new();

        for frame in frames {
            let mut matched = false;
            for row in right_rows {
                if let Some(rel) = &join.relation {
                    let left = frame
                        .get(&rel.alias)
                        .and_then(Option::as_ref)
                        .and_then(|r| r.get(&rel.field))
                        .cloned()
                        .unwrap_or(Value::Null);
                    if left.is_null() {
                        continue;
                    }
                    let right_key = row.get(pk).cloned().unwrap_or(Value::Null);
                    if left != right_key {
                        continue;
                    }
                }

                let mut candidate = frame.clone();
                candidate.insert(join.target.alias.clone(), Some(row.clone()));
                if let Some(on) = &join.on {
                    if !self.truthy(on.node(), &Scope::Row(&candidate))? {
                        continue;
                    }
                }

                if join.fetch && join.relation.is_some() {
                    let key = row.get(pk).cloned().unwrap_or(Value::Null);
                    self.session
                        .loaded
                        .borrow_mut()
                        .insert((join.target.entity.clone(), key_repr(&key)));
                    // Eager loading materializes the related entity now.
                    self.materialize(&join.target.entity, row)?;
                }

                matched = true;
                out.push(candidate);
            }

            if !matched && join.kind == JoinKind::LeftOuter {
                let mut unmatched = frame;
                unmatched.insert(join.target.alias.clone(), None);
                out.push(unmatched);
            }
        }

        Ok(out)
    }

    fn rows_of(&self, entity: &str) -> &[StoredRow] {
        self.tables.get(entity).map(Vec::as_slice).unwrap_or(&[])
    }

    // Identity-aware entity materialization: the first read of a row caches
    // its snapshot, and every later read returns the cached copy.
    fn materialize(&self, entity: &str, row: &StoredRow) -> Result<Value, SessionError> {
        let pk = primary_key_of(entity);
        let key = row.get(pk).cloned().unwrap_or(Value::Null);
        let cache_key = (entity.to_string(), key_repr(&key));

        if let Some(cached) = self.session.identity.borrow().get(&cache_key) {
            return Ok(cached.clone());
        }

        let mut values = Vec::new();
        for field in fields_of(entity) {
            let raw = row.get(field.name).cloned().unwrap_or(Value::Null);
            let value = match field.kind {
                FieldKind::Relation { target } => {
                    if raw.is_null() {
                        Value::Null
                    } else {
                        Value::Relation(RelationHandle::new(target, raw))
                    }
                }
                _ => raw,
            };
            values.push(value);
        }

        let entity_value = Value::Entity(values);
        self.session
            .identity
            .borrow_mut()
            .insert(cache_key, entity_value.clone());
        Ok(entity_value)
    }

    fn truthy(&self, node: &ExprNode, scope: &Scope<'_>) -> Result<bool, SessionError> {
        Ok(matches!(self.eval(node, scope)?, Value::Bool(true)))
    }

    fn eval(&self, node: &ExprNode, scope: &Scope<'_>) -> Result<Value, SessionError> {
        match node {
            ExprNode::Path { alias, field } => match scope {
                Scope::Row(frame) => {
                    let slot = frame
                        .get(alias)
                        .ok_or_else(|| unknown_alias(alias))?;
                    Ok(slot.as_ref().map_or(Value::Null, |row| {
                        row.get(field).cloned().unwrap_or(Value::Null)
                    }))
                }
                Scope::Group { frames } => self.eval_in_first_frame(node, frames),
            },
            ExprNode::EntityAll { alias } => match scope {
                Scope::Row(frame) => {
                    let entity = self.aliases.get(alias).ok_or_else(|| unknown_alias(alias))?;
                    match frame.get(alias).ok_or_else(|| unknown_alias(alias))? {
                        Some(row) => self.materialize(entity, row),
                        None => Ok(Value::Null),
                    }
                }
                Scope::Group { frames } => self.eval_in_first_frame(node, frames),
            },
            ExprNode::Literal(value) => Ok(value.clone()),
            ExprNode::Compare { op, lhs, rhs } => self.eval_compare(*op, lhs, rhs, scope),
            ExprNode::And(operands) => {
                for operand in operands {
                    if !self.truthy(operand, scope)? {
                        return Ok(Value::Bool(false));
                    }
                }
                Ok(Value::Bool(true))
            }
            ExprNode::Or(operands) => {
                for operand in operands {
                    if self.truthy(operand, scope)? {
                        return Ok(Value::Bool(true));
                    }
                }
                Ok(Value::Bool(false))
            }
            ExprNode::Not(operand) => Ok(Value::Bool(!self.truthy(operand, scope)?)),
            ExprNode::IsNull(operand) => Ok(Value::Bool(self.eval(operand, scope)?.is_null())),
            ExprNode::Arith { op, lhs, rhs } => {
                let lhs = self.eval(lhs, scope)?;
                let rhs = self.eval(rhs, scope)?;
                eval_arith(*op, &lhs, &rhs)
            }
            ExprNode::StrFunc { op, operand } => {
                let operand = self.eval(operand, scope)?;
                match operand {
                    Value::Null => Ok(Value::Null),
                    Value::Text(text) => Ok(Value::Text(match op {
                        StrOp::Lower => text.to_lowercase(),
                        StrOp::Upper => text.to_uppercase(),
                    })),
                    other => Err(type_error("text", &other)),
                }
            }
            ExprNode::Aggregate { op, operand } => match scope {
                Scope::Group { frames } => self.eval_aggregate(*op, operand, frames),
                Scope::Row(_) => Err(SessionError::new("aggregate evaluated outside grouping")),
            },
            ExprNode::Template { template, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, scope)?);
                }
                apply_template(template, &values)
            }
            ExprNode::Subquery(plan) => {
                let mut rows = self.run_nested(plan)?;
                Ok(match rows.first_mut() {
                    Some(row) if !row.is_empty() => row.remove(0),
                    _ => Value::Null,
                })
            }
            ExprNode::Aliased { expr, .. } => self.eval(expr, scope),
        }
    }

    fn eval_in_first_frame(
        &self,
        node: &ExprNode,
        frames: &[Frame],
    ) -> Result<Value, SessionError> {
        frames
            .first()
            .map_or(Ok(Value::Null), |frame| self.eval(node, &Scope::Row(frame)))
    }

    fn eval_compare(
        &self,
        op: CompareOp,
        lhs: &ExprNode,
        rhs: &ExprNode,
        scope: &Scope<'_>,
    ) -> Result<Value, SessionError> {
        let left = self.eval(lhs, scope)?;

        match op {
            CompareOp::In | CompareOp::NotIn => {
                let candidates = match rhs {
                    ExprNode::Subquery(plan) => self.column(plan)?,
                    _ => match self.eval(rhs, scope)? {
                        Value::List(values) => values,
                        other => vec![other],
                    },
                };
                if left.is_null() {
                    return Ok(Value::Bool(false));
                }
                let found = candidates
                    .iter()
                    .any(|candidate| left.compare(candidate) == Some(Ordering::Equal));
                Ok(Value::Bool(if op == CompareOp::In { found } else { !found }))
            }
            CompareOp::Contains | CompareOp::Like | CompareOp::StartsWith => {
                let right = self.eval(rhs, scope)?;
                let (Value::Text(text), Value::Text(probe)) = (&left, &right) else {
                    return Ok(Value::Bool(false));
                };
                let hit = match op {
                    CompareOp::Contains => text.contains(probe.as_str()),
                    CompareOp::StartsWith => text.starts_with(probe.as_str()),
                    _ => like_match(
                        &text.chars().collect::<Vec<_>>(),
                        &probe.chars().collect::<Vec<_>>(),
                    ),
                };
                Ok(Value::Bool(hit))
            }
            _ => {
                let right = self.eval(rhs, scope)?;
                let Some(ordering) = left.compare(&right) else {
                    // Null or mismatched operands match nothing.
                    return Ok(Value::Bool(false));
                };
                let hit = match op {
                    CompareOp::Eq => ordering == Ordering::Equal,
                    CompareOp::Ne => ordering != Ordering::Equal,
                    CompareOp::Lt => ordering == Ordering::Less,
                    CompareOp::Lte => ordering != Ordering::Greater,
                    CompareOp::Gt => ordering == Ordering::Greater,
                    CompareOp::Gte => ordering != Ordering::Less,
                    _ => false,
                };
                Ok(Value::Bool(hit))
            }
        }
    }

    fn eval_aggregate(
        &self,
        op: AggregateOp,
        operand: &ExprNode,
        frames: &[Frame],
    ) -> Result<Value, SessionError> {
        if op == AggregateOp::Count && matches!(operand, ExprNode::EntityAll { .. }) {
            return Ok(Value::Int(frames.len() as i64));
        }

        let mut values = Vec::with_capacity(frames.len());
        for frame in frames {
            let value = self.eval(operand, &Scope::Row(frame))?;
            if !value.is_null() {
                values.push(value);
            }
        }

        match op {
            AggregateOp::Count => Ok(Value::Int(values.len() as i64)),
            AggregateOp::Sum => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                if values.iter().all(|v| matches!(v, Value::Int(_))) {
                    let total: i64 = values
                        .iter()
                        .map(|v| if let Value::Int(i) = v { *i } else { 0 })
                        .sum();
                    Ok(Value::Int(total))
                } else {
                    let mut total = 0.0;
                    for value in &values {
                        total += value
                            .as_f64()
                            .ok_or_else(|| type_error("numeric", value))?;
                    }
                    Ok(Value::Float(total))
                }
            }
            AggregateOp::Avg => {
                if values.is_empty() {
                    return Ok(Value::Null);
                }
                let mut total = 0.0;
                for value in &values {
                    total += value
                        .as_f64()
                        .ok_or_else(|| type_error("numeric", value))?;
                }
                Ok(Value::Float(total / values.len() as f64))
            }
            AggregateOp::Max | AggregateOp::Min => {
                let mut best: Option<Value> = None;
                for value in values {
                    best = Some(match best {
                        None => value,
                        Some(current) => {
                            let replace = match value.compare(&current) {
                                Some(Ordering::Greater) => op == AggregateOp::Max,
                                Some(Ordering::Less) => op == AggregateOp::Min,
                                _ => false,
                            };
                            if replace { value } else { current }
                        }
                    });
                }
                Ok(best.unwrap_or(Value::Null))
            }
        }
    }

    // First column of every row of an uncorrelated subquery.
    fn column(&self, plan: &QueryPlan) -> Result<Vec<Value>, SessionError> {
        let rows = self.run_nested(plan)?;
        Ok(rows
            .into_iter()
            .filter_map(|mut row| {
                if row.is_empty() {
                    None
                } else {
                    Some(row.remove(0))
                }
            })
            .collect())
    }

    fn run_nested(&self, plan: &QueryPlan) -> Result<Vec<Row>, SessionError> {
        let eval = Eval {
            session: self.session,
            tables: self.tables,
            aliases: alias_map(plan),
        };
        eval.run(plan)
    }
}

fn unknown_alias(alias: &str) -> SessionError {
    SessionError::new(format!("unknown alias '{alias}'"))
}

fn type_error(expected: &str, found: &Value) -> SessionError {
    SessionError::new(format!(
        "expected {expected} value, found {}",
        found.kind_name()
    ))
}

fn eval_arith(op: ArithOp, lhs: &Value, rhs: &Value) -> Result<Value, SessionError> {
    if lhs.is_null() || rhs.is_null() {
        return Ok(Value::Null);
    }

    if let (Value::Int(a), Value::Int(b)) = (lhs, rhs) {
        return Ok(Value::Int(match op {
            ArithOp::Add => a + b,
            ArithOp::Sub => a - b,
            ArithOp::Mul => a * b,
        }));
    }

    let (Some(a), Some(b)) = (lhs.as_f64(), rhs.as_f64()) else {
        return Err(type_error("numeric", if lhs.as_f64().is_none() { lhs } else { rhs }));
    };
    Ok(Value::Float(match op {
        ArithOp::Add => a + b,
        ArithOp::Sub => a - b,
        ArithOp::Mul => a * b,
    }))
}

// `%` matches any run, `_` any single character.
fn like_match(text: &[char], pattern: &[char]) -> bool {
    match pattern.first() {
        None => text.is_empty(),
        Some('%') => (0..=text.len()).any(|skip| like_match(&text[skip..], &pattern[1..])),
        Some('_') => !text.is_empty() && like_match(&text[1..], &pattern[1..]),
        Some(expected) => {
            text.first() == Some(expected) && like_match(&text[1..], &pattern[1..])
        }
    }
}

// Interpret the vendor-function template escape hatch.
fn apply_template(template: &str, args: &[Value]) -> Result<Value, SessionError> {
    let name = template
        .strip_prefix("function('")
        .and_then(|rest| rest.split('\'').next())
        .ok_or_else(|| SessionError::new(format!("unsupported template: {template}")))?;

    let text = |value: &Value| -> Result<Option<String>, SessionError> {
        match value {
            Value::Null => Ok(None),
            Value::Text(text) => Ok(Some(text.clone())),
            other => Err(type_error("text", other)),
        }
    };

    match (name, args) {
        ("replace", [subject, from, to]) => {
            let (Some(subject), Some(from), Some(to)) =
                (text(subject)?, text(from)?, text(to)?)
            else {
                return Ok(Value::Null);
            };
            Ok(Value::Text(subject.replace(&from, &to)))
        }
        ("lower", [subject]) => Ok(text(subject)?.map_or(Value::Null, |s| {
            Value::Text(s.to_lowercase())
        })),
        ("upper", [subject]) => Ok(text(subject)?.map_or(Value::Null, |s| {
            Value::Text(s.to_uppercase())
        })),
        _ => Err(SessionError::new(format!(
            "unsupported vendor function '{name}'"
        ))),
    }
}

fn window<T>(items: Vec<T>, offset: u64, limit: Option<u64>) -> Vec<T> {
    items
        .into_iter()
        .skip(usize::try_from(offset).unwrap_or(usize::MAX))
        .take(limit.map_or(usize::MAX, |l| usize::try_from(l).unwrap_or(usize::MAX)))
        .collect()
}

fn sorted_by_keys<T>(units: Vec<T>, keys: Vec<Vec<Value>>, order: &[OrderSpec]) -> Vec<T> {
    let mut indexed: Vec<(Vec<Value>, T)> = keys.into_iter().zip(units).collect();
    indexed.sort_by(|(a, _), (b, _)| compare_keys(a, b, order));
    indexed.into_iter().map(|(_, unit)| unit).collect()
}

fn compare_keys(a: &[Value], b: &[Value], order: &[OrderSpec]) -> Ordering {
    for (i, spec) in order.iter().enumerate() {
        let ordering = order_compare(&a[i], &b[i], spec.direction, spec.nulls);
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}

fn order_compare(a: &Value, b: &Value, direction: OrderDirection, nulls: NullOrder) -> Ordering {
    let a_null = a.is_null();
    let b_null = b.is_null();

    if a_null || b_null {
        if a_null && b_null {
            return Ordering::Equal;
        }
        return match nulls {
            NullOrder::First => {
                if a_null {
                    Ordering::Less
                } else {
                    Ordering::Greater
                }
            }
            NullOrder::Last => {
                if a_null {
                    Ordering::Greater
                } else {
                    Ordering::Less
                }
            }
            // This engine's default: nulls sort as greater than every
            // value, with the direction applied on top.
            NullOrder::DatabaseDefault => {
                let base = if a_null { Ordering::Greater } else { Ordering::Less };
                match direction {
                    OrderDirection::Asc => base,
                    OrderDirection::Desc => base.reverse(),
                }
            }
        };
    }

    let base = a.compare(b).unwrap_or(Ordering::Equal);
    match direction {
        OrderDirection::Asc => base,
        OrderDirection::Desc => base.reverse(),
    }
}
