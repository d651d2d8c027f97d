//! Projection mapping strategies against the in-memory reference session.

use quarry::prelude::*;
use quarry_testing_fixtures::{
    User, UserPaths, UserSummary, UserView, seeded_session, user, user_as,
};

fn expected_pairs() -> Vec<(Option<String>, i64)> {
    vec![
        (Some("alice".to_string()), 10),
        (Some("bob".to_string()), 20),
        (Some("carol".to_string()), 30),
        (Some("dave".to_string()), 40),
    ]
}

#[test]
fn single_expression_projection() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let names: Vec<String> = qf.select(u.username()).from(&u).fetch().unwrap();

    assert_eq!(names, vec!["alice", "bob", "carol", "dave"]);
}

#[test]
fn tuple_projection_carries_heterogeneous_columns() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let rows: Vec<(Option<String>, i64)> = qf
        .select((u.path::<Option<String>>("username"), u.age()))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(rows, expected_pairs());
}

#[test]
fn constructor_strategy_reproduces_every_pair() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let summaries: Vec<UserSummary> = qf
        .select(Projections::constructor::<UserSummary>([
            u.username().into(),
            u.age().into(),
        ]))
        .from(&u)
        .fetch()
        .unwrap();

    let pairs: Vec<_> = summaries
        .into_iter()
        .map(|s| (s.username, s.age))
        .collect();
    assert_eq!(pairs, expected_pairs());
}

#[test]
fn field_strategy_assigns_matching_members() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let summaries: Vec<UserSummary> = qf
        .select(Projections::fields::<UserSummary>([
            u.username().into(),
            u.age().into(),
        ]))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(summaries[0], UserSummary::new(Some("alice".to_string()), 10));
    assert_eq!(summaries.len(), 4);
}

#[test]
fn accessor_strategy_applies_setters() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let summaries: Vec<UserSummary> = qf
        .select(Projections::accessors::<UserSummary>([
            u.username().into(),
            u.age().into(),
        ]))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(summaries[3], UserSummary::new(Some("dave".to_string()), 40));
}

#[test]
fn precompiled_strategy_skips_name_matching() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let mapping = Projections::precompiled([u.username().into(), u.age().into()], |row| {
        let [username, age]: [Value; 2] =
            row.try_into()
                .map_err(|row: Vec<Value>| ProjectionError::RowArity {
                    expected: 2,
                    found: row.len(),
                })?;
        Ok(UserSummary::new(
            decode_column("username", username)?,
            decode_column("age", age)?,
        ))
    });

    let summaries: Vec<UserSummary> = qf.select(mapping).from(&u).fetch().unwrap();

    let pairs: Vec<_> = summaries
        .into_iter()
        .map(|s| (s.username, s.age))
        .collect();
    assert_eq!(pairs, expected_pairs());
}

#[test]
fn aliased_bindings_land_on_renamed_members() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let us = user_as("us");

    let views: Vec<UserView> = qf
        .select(Projections::fields::<UserView>([
            u.username().alias("name").into(),
            subselect(us.age().max()).from(&us).scalar().alias("age").into(),
        ]))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(views.len(), 4);
    assert_eq!(views[0].name.as_deref(), Some("alice"));
    // Every row carries the subquery maximum.
    assert!(views.iter().all(|v| v.age == 40));
}

#[test]
fn unmatched_members_keep_their_default() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    // Only `username` is bound; `age` has no matching source column.
    let summaries: Vec<UserSummary> = qf
        .select(Projections::fields::<UserSummary>([u.username().into()]))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(summaries[0], UserSummary::new(Some("alice".to_string()), 0));
}

#[test]
fn unmatched_source_columns_are_ignored() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let summaries: Vec<UserSummary> = qf
        .select(Projections::fields::<UserSummary>([
            u.username().into(),
            u.id().alias("shoe_size").into(),
        ]))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(summaries[0], UserSummary::new(Some("alice".to_string()), 0));
}

#[test]
fn null_into_non_nullable_member_is_a_projection_error() {
    let session = seeded_session();
    session.persist(&User::new(5, None, 50, None));

    let qf = QueryFactory::new(&session);
    let u = user();

    // `String` does not admit null; the nameless row cannot materialize.
    let result: Result<Vec<String>, _> = qf.select(u.username()).from(&u).fetch();

    match result {
        Err(QueryError::Projection(ProjectionError::Column { column, .. })) => {
            assert_eq!(column, "username");
        }
        other => panic!("expected projection error, got {other:?}"),
    }
}

#[test]
fn whole_entity_projection_carries_relation_handles() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let found = qf
        .select_from(&u)
        .filter(u.username().eq("alice"))
        .fetch_one()
        .unwrap()
        .unwrap();

    let handle = found.group.expect("alice belongs to a group");
    assert_eq!(handle.entity, "group");
    assert_eq!(*handle.key, Value::Int(1));
}
