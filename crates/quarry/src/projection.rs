//! Result-projection contract: strategies for materializing heterogeneous
//! result rows into typed targets.
//!
//! Strategy selection happens at plan-build time. The precompiled strategy
//! embeds the target's constructor as a typed closure and is the preferred
//! path; the named strategies (fields/accessors) tolerate partial bindings —
//! unmatched source columns are ignored and unmatched members keep their
//! default value. Null column values map to `Option` members; a non-nullable
//! member receiving null is a [`ProjectionError`], not a panic.

use crate::{
    entity::RelationHandle,
    expr::ExprNode,
    plan::{MappedSelection, MappingStrategy, Selection},
    value::Value,
};
use std::sync::Arc;
use thiserror::Error as ThisError;

///
/// ValueError
///
/// A single value did not fit the requested representation.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
#[error("expected {expected}, found {found}")]
pub struct ValueError {
    pub expected: &'static str,
    pub found: String,
}

impl ValueError {
    #[must_use]
    pub fn new(expected: &'static str, found: &Value) -> Self {
        Self {
            expected,
            found: found.kind_name().to_string(),
        }
    }
}

///
/// ProjectionError
///
/// The target shape cannot represent the row.
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ProjectionError {
    #[error("column '{column}': {source}")]
    Column {
        column: String,
        source: ValueError,
    },

    /// No constructor of the target type matches the row's arity.
    #[error("no matching constructor: target takes {expected} values, row has {found}")]
    ConstructorArity { expected: usize, found: usize },

    /// A constructor argument did not fit its positional parameter.
    #[error("constructor argument {index}: {source}")]
    ConstructorArgument { index: usize, source: ValueError },

    #[error("row carries {found} values but the selection has {expected}")]
    RowArity { expected: usize, found: usize },
}

///
/// FromValue
///
/// Typed extraction from one row value. `Option<T>` absorbs `Null`; every
/// other target rejects it with the value error the mapper wraps into a
/// [`ProjectionError`].
///

pub trait FromValue: Sized {
    const EXPECTED: &'static str;

    fn from_value(value: Value) -> Result<Self, ValueError>;
}

impl FromValue for i64 {
    const EXPECTED: &'static str = "int";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Int(v) => Ok(v),
            other => Err(ValueError::new(Self::EXPECTED, &other)),
        }
    }
}

impl FromValue for f64 {
    const EXPECTED: &'static str = "float";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Float(v) => Ok(v),
            // Integer columns widen losslessly into float targets.
            Value::Int(v) => Ok(v as Self),
            other => Err(ValueError::new(Self::EXPECTED, &other)),
        }
    }
}

impl FromValue for bool {
    const EXPECTED: &'static str = "bool";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Bool(v) => Ok(v),
            other => Err(ValueError::new(Self::EXPECTED, &other)),
        }
    }
}

impl FromValue for String {
    const EXPECTED: &'static str = "text";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Text(v) => Ok(v),
            other => Err(ValueError::new(Self::EXPECTED, &other)),
        }
    }
}

impl FromValue for RelationHandle {
    const EXPECTED: &'static str = "relation";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Relation(handle) => Ok(handle),
            other => Err(ValueError::new(Self::EXPECTED, &other)),
        }
    }
}

impl<T: FromValue> FromValue for Option<T> {
    const EXPECTED: &'static str = T::EXPECTED;

    fn from_value(value: Value) -> Result<Self, ValueError> {
        match value {
            Value::Null => Ok(None),
            other => T::from_value(other).map(Some),
        }
    }
}

/// Decode one named column, wrapping value errors with member context.
pub fn decode_column<T: FromValue>(column: &str, value: Value) -> Result<T, ProjectionError> {
    T::from_value(value).map_err(|source| ProjectionError::Column {
        column: column.to_string(),
        source,
    })
}

///
/// ConstructRow
///
/// Positional typed construction — the constructor strategy's target
/// capability. Implementations check arity and argument types themselves.
///

pub trait ConstructRow: Sized {
    fn construct(values: Vec<Value>) -> Result<Self, ProjectionError>;
}

///
/// FieldTarget
///
/// Named member assignment after default construction — the field
/// strategy's target capability. Returns whether the member matched;
/// unmatched names are tolerated by the mapper.
///

pub trait FieldTarget: Default {
    fn assign_field(&mut self, member: &str, value: Value) -> Result<bool, ProjectionError>;
}

///
/// AccessorTarget
///
/// Setter application after default construction — the accessor strategy's
/// target capability. Same unmatched-member tolerance as [`FieldTarget`].
///

pub trait AccessorTarget: Default {
    fn apply_accessor(&mut self, member: &str, value: Value) -> Result<bool, ProjectionError>;
}

/// Typed row mapper carried outside the plan.
pub type RowFn<D> = Arc<dyn Fn(Vec<Value>) -> Result<D, ProjectionError> + Send + Sync>;

///
/// Mapping
///
/// A mapped projection: named expression bindings plus the typed mapper for
/// the selected strategy. The plan carries only the erased descriptor; the
/// mapper stays on the typed execution side.
///

#[derive(Clone)]
pub struct Mapping<D> {
    strategy: MappingStrategy,
    exprs: Vec<ExprNode>,
    mapper: RowFn<D>,
}

impl<D> Mapping<D> {
    pub(crate) fn into_parts(self) -> (Selection, RowFn<D>) {
        (
            Selection::Mapped(MappedSelection {
                strategy: self.strategy,
                bindings: self.exprs,
            }),
            self.mapper,
        )
    }
}

///
/// Projections
///
/// Strategy-indexed constructors for mapped projections.
///

pub struct Projections;

impl Projections {
    /// Constructor strategy: values are handed positionally to the target's
    /// row constructor.
    pub fn constructor<D: ConstructRow + 'static>(
        exprs: impl IntoIterator<Item = ExprNode>,
    ) -> Mapping<D> {
        Mapping {
            strategy: MappingStrategy::Constructor,
            exprs: exprs.into_iter().collect(),
            mapper: Arc::new(D::construct),
        }
    }

    /// Field strategy: values are assigned into members matched by
    /// projection name after default construction.
    pub fn fields<D: FieldTarget + 'static>(exprs: impl IntoIterator<Item = ExprNode>) -> Mapping<D> {
        Self::named(MappingStrategy::Fields, exprs, D::assign_field)
    }

    /// Accessor strategy: values are applied through member setters after
    /// default construction.
    pub fn accessors<D: AccessorTarget + 'static>(exprs: impl IntoIterator<Item = ExprNode>) -> Mapping<D> {
        Self::named(MappingStrategy::Accessors, exprs, D::apply_accessor)
    }

    /// Precompiled strategy: the target's constructor call is embedded at
    /// build time, bypassing name matching entirely.
    pub fn precompiled<D>(
        exprs: impl IntoIterator<Item = ExprNode>,
        construct: impl Fn(Vec<Value>) -> Result<D, ProjectionError> + Send + Sync + 'static,
    ) -> Mapping<D> {
        Mapping {
            strategy: MappingStrategy::Precompiled,
            exprs: exprs.into_iter().collect(),
            mapper: Arc::new(construct),
        }
    }

    fn named<D: Default + 'static>(
        strategy: MappingStrategy,
        exprs: impl IntoIterator<Item = ExprNode>,
        apply: impl Fn(&mut D, &str, Value) -> Result<bool, ProjectionError> + Send + Sync + 'static,
    ) -> Mapping<D> {
        let exprs: Vec<ExprNode> = exprs.into_iter().collect();
        let names: Vec<Option<String>> = exprs
            .iter()
            .map(|e| e.projection_name().map(str::to_string))
            .collect();

        let mapper: RowFn<D> = Arc::new(move |row: Vec<Value>| {
            if row.len() != names.len() {
                return Err(ProjectionError::RowArity {
                    expected: names.len(),
                    found: row.len(),
                });
            }

            let mut target = D::default();
            for (name, value) in names.iter().zip(row) {
                if let Some(name) = name {
                    // Unmatched members are tolerated; the target keeps its
                    // default value for them.
                    let _matched = apply(&mut target, name, value)?;
                }
            }
            Ok(target)
        });

        Mapping {
            strategy,
            exprs,
            mapper,
        }
    }
}
