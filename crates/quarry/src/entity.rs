use crate::{
    expr::{AggregateOp, Expr, ExprNode},
    projection::ValueError,
    value::Value,
};
use serde::{Deserialize, Serialize};
use std::marker::PhantomData;

///
/// FieldKind
///
/// Closed set of logical field kinds an entity can declare.
/// `Relation` is a directed edge to another entity; traversing it yields a
/// joinable reference, never a loaded object.
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum FieldKind {
    Bool,
    Int,
    Float,
    Text,
    Relation { target: &'static str },
}

///
/// FieldDef
///

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub kind: FieldKind,
}

impl FieldDef {
    #[must_use]
    pub const fn new(name: &'static str, kind: FieldKind) -> Self {
        Self { name, kind }
    }
}

///
/// EntityKind
///
/// Static description of a relational row type: entity name, primary key,
/// and field declarations in materialization order.
///

pub trait EntityKind {
    const ENTITY: &'static str;
    const PRIMARY_KEY: &'static str;
    const FIELDS: &'static [FieldDef];
}

///
/// EntityRow
///
/// Positional entity materialization from a whole-entity row slot.
/// `values` carries one value per declared field, in `FIELDS` order.
///

pub trait EntityRow: EntityKind + Sized {
    fn from_values(values: Vec<Value>) -> Result<Self, ValueError>;
}

/// Decode a whole-entity row slot (`Value::Entity`) into a typed entity.
pub fn entity_from_value<E: EntityRow>(value: Value) -> Result<E, ValueError> {
    match value {
        Value::Entity(values) => E::from_values(values),
        other => Err(ValueError::new("entity", &other)),
    }
}

///
/// SourceRef
///
/// Erased source reference carried by plans: entity name plus the alias
/// binding its path expressions.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct SourceRef {
    pub entity: String,
    pub alias: String,
}

impl SourceRef {
    #[must_use]
    pub fn new(entity: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            alias: alias.into(),
        }
    }
}

///
/// RelationPath
///
/// A relationship edge rooted at an aliased source, usable as a join target.
///

#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
pub struct RelationPath {
    pub alias: String,
    pub field: String,
}

///
/// RelationHandle
///
/// Opaque reference to a related row, as surfaced inside materialized
/// entities. Whether the referent is loaded is answered by the session
/// (`Session::is_loaded`), never by this layer.
///

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelationHandle {
    pub entity: String,
    pub key: Box<Value>,
}

impl RelationHandle {
    #[must_use]
    pub fn new(entity: impl Into<String>, key: Value) -> Self {
        Self {
            entity: entity.into(),
            key: Box::new(key),
        }
    }
}

///
/// EntityRef
///
/// Typed, aliased handle to an entity source. Two references to the same
/// entity under different aliases are independent sources (the self-join
/// idiom). All accessors are pure; building paths never touches a session.
///

#[derive(Clone, Debug)]
pub struct EntityRef<E: EntityKind> {
    source: SourceRef,
    _marker: PhantomData<E>,
}

impl<E: EntityKind> EntityRef<E> {
    /// Reference the entity under its default alias (the entity name).
    #[must_use]
    pub fn new() -> Self {
        Self::aliased(E::ENTITY)
    }

    /// Reference the entity under an explicit alias.
    #[must_use]
    pub fn aliased(alias: impl Into<String>) -> Self {
        Self {
            source: SourceRef::new(E::ENTITY, alias),
            _marker: PhantomData,
        }
    }

    #[must_use]
    pub const fn source(&self) -> &SourceRef {
        &self.source
    }

    #[must_use]
    pub fn alias(&self) -> &str {
        &self.source.alias
    }

    /// Typed path expression for a declared field.
    #[must_use]
    pub fn path<T>(&self, field: &str) -> Expr<T> {
        Expr::from_node(ExprNode::Path {
            alias: self.source.alias.clone(),
            field: field.to_string(),
        })
    }

    /// Relationship edge rooted at this reference, usable as a join target.
    #[must_use]
    pub fn relation(&self, field: &str) -> RelationPath {
        RelationPath {
            alias: self.source.alias.clone(),
            field: field.to_string(),
        }
    }

    /// Whole-entity selection expression.
    #[must_use]
    pub fn all(&self) -> Expr<E>
    where
        E: EntityRow,
    {
        Expr::from_node(self.all_node())
    }

    /// Whole-entity selection that absorbs unmatched left-join slots as `None`.
    #[must_use]
    pub fn all_opt(&self) -> Expr<Option<E>>
    where
        E: EntityRow,
    {
        Expr::from_node(self.all_node())
    }

    /// Row-count aggregate over this source.
    #[must_use]
    pub fn count(&self) -> Expr<i64> {
        Expr::from_node(ExprNode::Aggregate {
            op: AggregateOp::Count,
            operand: Box::new(self.all_node()),
        })
    }

    fn all_node(&self) -> ExprNode {
        ExprNode::EntityAll {
            alias: self.source.alias.clone(),
        }
    }
}

impl<E: EntityKind> Default for EntityRef<E> {
    fn default() -> Self {
        Self::new()
    }
}
