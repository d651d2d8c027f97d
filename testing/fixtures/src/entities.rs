//! Hand-written entity metadata, path accessors, and projection targets —
//! the analog of a generated query-type layer.

use quarry::prelude::*;

///
/// Group
///

#[derive(Clone, Debug, PartialEq)]
pub struct Group {
    pub id: i64,
    pub name: String,
}

impl EntityKind for Group {
    const ENTITY: &'static str = "group";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldKind::Int),
        FieldDef::new("name", FieldKind::Text),
    ];
}

impl EntityRow for Group {
    fn from_values(values: Vec<Value>) -> Result<Self, ValueError> {
        let [id, name]: [Value; 2] = values
            .try_into()
            .map_err(|values: Vec<Value>| arity_error(&values))?;

        Ok(Self {
            id: i64::from_value(id)?,
            name: String::from_value(name)?,
        })
    }
}

impl FromValue for Group {
    const EXPECTED: &'static str = "entity";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        entity_from_value(value)
    }
}

/// `group` source under its default alias.
#[must_use]
pub fn group() -> EntityRef<Group> {
    EntityRef::new()
}

/// `group` source under an explicit alias (self-join idiom).
#[must_use]
pub fn group_as(alias: &str) -> EntityRef<Group> {
    EntityRef::aliased(alias)
}

///
/// GroupPaths
/// Typed path accessors for `group` references.
///

pub trait GroupPaths {
    fn id(&self) -> Expr<i64>;
    fn name(&self) -> Expr<String>;
}

impl GroupPaths for EntityRef<Group> {
    fn id(&self) -> Expr<i64> {
        self.path("id")
    }

    fn name(&self) -> Expr<String> {
        self.path("name")
    }
}

///
/// User
///
/// `username` is nullable; `group` is a many-to-one edge surfaced as an
/// unresolved relation handle — resolving it is the session's business.
///

#[derive(Clone, Debug, PartialEq)]
pub struct User {
    pub id: i64,
    pub username: Option<String>,
    pub age: i64,
    pub group: Option<RelationHandle>,
}

impl User {
    #[must_use]
    pub fn new(id: i64, username: Option<&str>, age: i64, group_id: Option<i64>) -> Self {
        Self {
            id,
            username: username.map(str::to_string),
            age,
            group: group_id.map(|gid| RelationHandle::new(Group::ENTITY, Value::Int(gid))),
        }
    }
}

impl EntityKind for User {
    const ENTITY: &'static str = "user";
    const PRIMARY_KEY: &'static str = "id";
    const FIELDS: &'static [FieldDef] = &[
        FieldDef::new("id", FieldKind::Int),
        FieldDef::new("username", FieldKind::Text),
        FieldDef::new("age", FieldKind::Int),
        FieldDef::new("group_id", FieldKind::Relation { target: "group" }),
    ];
}

impl EntityRow for User {
    fn from_values(values: Vec<Value>) -> Result<Self, ValueError> {
        let [id, username, age, group]: [Value; 4] = values
            .try_into()
            .map_err(|values: Vec<Value>| arity_error(&values))?;

        Ok(Self {
            id: i64::from_value(id)?,
            username: Option::<String>::from_value(username)?,
            age: i64::from_value(age)?,
            group: Option::<RelationHandle>::from_value(group)?,
        })
    }
}

impl FromValue for User {
    const EXPECTED: &'static str = "entity";

    fn from_value(value: Value) -> Result<Self, ValueError> {
        entity_from_value(value)
    }
}

/// `user` source under its default alias.
#[must_use]
pub fn user() -> EntityRef<User> {
    EntityRef::new()
}

/// `user` source under an explicit alias (self-join/subquery idiom).
#[must_use]
pub fn user_as(alias: &str) -> EntityRef<User> {
    EntityRef::aliased(alias)
}

///
/// UserPaths
/// Typed path accessors for `user` references.
///

pub trait UserPaths {
    fn id(&self) -> Expr<i64>;
    fn username(&self) -> Expr<String>;
    fn age(&self) -> Expr<i64>;
    fn group_id(&self) -> Expr<i64>;
    fn to_group(&self) -> RelationPath;
}

impl UserPaths for EntityRef<User> {
    fn id(&self) -> Expr<i64> {
        self.path("id")
    }

    fn username(&self) -> Expr<String> {
        self.path("username")
    }

    fn age(&self) -> Expr<i64> {
        self.path("age")
    }

    /// Raw foreign-key view of the relationship column.
    fn group_id(&self) -> Expr<i64> {
        self.path("group_id")
    }

    fn to_group(&self) -> RelationPath {
        self.relation("group_id")
    }
}

fn arity_error(values: &[Value]) -> ValueError {
    ValueError {
        expected: "entity field values",
        found: format!("{} values", values.len()),
    }
}

///
/// UserSummary
///
/// Projection target exercised by all four mapping strategies: a positional
/// constructor, public fields, and setter accessors.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserSummary {
    pub username: Option<String>,
    pub age: i64,
}

impl UserSummary {
    #[must_use]
    pub fn new(username: Option<String>, age: i64) -> Self {
        Self { username, age }
    }

    pub fn set_username(&mut self, username: Option<String>) {
        self.username = username;
    }

    pub fn set_age(&mut self, age: i64) {
        self.age = age;
    }
}

impl ConstructRow for UserSummary {
    fn construct(values: Vec<Value>) -> Result<Self, ProjectionError> {
        let [username, age]: [Value; 2] =
            values
                .try_into()
                .map_err(|values: Vec<Value>| ProjectionError::ConstructorArity {
                    expected: 2,
                    found: values.len(),
                })?;

        Ok(Self::new(
            decode_column("username", username)?,
            decode_column("age", age)?,
        ))
    }
}

impl FieldTarget for UserSummary {
    fn assign_field(&mut self, member: &str, value: Value) -> Result<bool, ProjectionError> {
        match member {
            "username" => self.username = decode_column(member, value)?,
            "age" => self.age = decode_column(member, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}

impl AccessorTarget for UserSummary {
    fn apply_accessor(&mut self, member: &str, value: Value) -> Result<bool, ProjectionError> {
        match member {
            "username" => self.set_username(decode_column(member, value)?),
            "age" => self.set_age(decode_column(member, value)?),
            _ => return Ok(false),
        }
        Ok(true)
    }
}

///
/// UserView
///
/// Field-strategy target whose member names differ from the source columns;
/// bindings must be aliased to land.
///

#[derive(Clone, Debug, Default, PartialEq)]
pub struct UserView {
    pub name: Option<String>,
    pub age: i64,
}

impl FieldTarget for UserView {
    fn assign_field(&mut self, member: &str, value: Value) -> Result<bool, ProjectionError> {
        match member {
            "name" => self.name = decode_column(member, value)?,
            "age" => self.age = decode_column(member, value)?,
            _ => return Ok(false),
        }
        Ok(true)
    }
}
