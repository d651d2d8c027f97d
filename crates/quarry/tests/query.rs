//! End-to-end query composition against the in-memory reference session.

use quarry::prelude::*;
use quarry_testing_fixtures::{GroupPaths, User, UserPaths, group, seeded_session, user, user_as};

#[test]
fn filter_by_username_and_age_fetches_one() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let found = qf
        .select_from(&u)
        .filter(u.username().eq("alice").and(u.age().eq(10)))
        .fetch_one()
        .unwrap()
        .unwrap();

    assert_eq!(found.username.as_deref(), Some("alice"));
    assert_eq!(found.age, 10);
}

#[test]
fn multi_clause_filters_drop_absent_criteria() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);

    let search = |username: Option<&str>, age: Option<i64>| -> Vec<User> {
        let u = user();
        qf.select_from(&u)
            .filter_all([
                username.map(|name| u.username().eq(name)),
                age.map(|age| u.age().eq(age)),
            ])
            .fetch()
            .unwrap()
    };

    assert_eq!(search(Some("alice"), Some(10)).len(), 1);
    assert_eq!(search(None, Some(10)).len(), 1);
    assert_eq!(search(Some("bob"), None).len(), 1);
    // All criteria absent: no filter at all.
    assert_eq!(search(None, None).len(), 4);
}

#[test]
fn boolean_builder_assembles_optional_criteria() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let username: Option<&str> = None;
    let min_age: Option<i64> = Some(25);

    let mut builder = BooleanBuilder::new();
    builder
        .and_opt(username.map(|name| u.username().eq(name)))
        .and_opt(min_age.map(|age| u.age().goe(age)));

    let found = qf
        .select_from(&u)
        .filter_all([builder.build()])
        .fetch()
        .unwrap();

    assert_eq!(found.len(), 2);
}

#[test]
fn fetch_terminals_cover_the_result_shapes() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    assert_eq!(qf.select_from(&u).fetch().unwrap().len(), 4);
    assert!(qf.select_from(&u).fetch_first().unwrap().is_some());
    assert_eq!(qf.select_from(&u).fetch_count().unwrap(), 4);
}

#[test]
fn fetch_one_rejects_ambiguity_but_tolerates_emptiness() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let ambiguous = qf.select_from(&u).filter(u.age().gt(20)).fetch_one();
    assert_eq!(ambiguous, Err(QueryError::TooManyResults { matched: 2 }));

    let empty = qf.select_from(&u).filter(u.age().gt(100)).fetch_one();
    assert_eq!(empty, Ok(None));
}

#[test]
fn sort_places_nulls_last_when_asked() {
    let session = seeded_session();
    session.persist(&User::new(5, None, 100, None));
    session.persist(&User::new(6, Some("erin"), 100, None));
    session.persist(&User::new(7, Some("frank"), 100, None));

    let qf = QueryFactory::new(&session);
    let u = user();

    let result = qf
        .select_from(&u)
        .filter(u.age().eq(100))
        .order_by(u.age().desc())
        .order_by(u.username().asc().nulls_last())
        .fetch()
        .unwrap();

    assert_eq!(result[0].username.as_deref(), Some("erin"));
    assert_eq!(result[1].username.as_deref(), Some("frank"));
    assert_eq!(result[2].username, None);
}

#[test]
fn paging_slices_the_ordered_result() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let slice = qf
        .select_from(&u)
        .order_by(u.username().desc())
        .offset(1)
        .limit(2)
        .fetch()
        .unwrap();

    assert_eq!(slice.len(), 2);
    assert_eq!(slice[0].username.as_deref(), Some("carol"));
    assert_eq!(slice[1].username.as_deref(), Some("bob"));
}

#[test]
fn paged_fetch_reports_the_unsliced_total() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let page = qf
        .select_from(&u)
        .order_by(u.username().desc())
        .offset(1)
        .limit(2)
        .fetch_page()
        .unwrap();

    assert_eq!(page.total, 4);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.items.len(), 2);
}

#[test]
fn aggregates_collapse_to_one_row() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let (count, sum, avg, max, min) = qf
        .select((
            u.count(),
            u.age().sum(),
            u.age().avg(),
            u.age().max(),
            u.age().min(),
        ))
        .from(&u)
        .fetch_one()
        .unwrap()
        .unwrap();

    assert_eq!(count, 4);
    assert_eq!(sum, 100);
    assert!((avg - 25.0).abs() < f64::EPSILON);
    assert_eq!(max, 40);
    assert_eq!(min, 10);
}

#[test]
fn grouped_average_age_per_group() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let rows: Vec<(String, f64)> = qf
        .select((g.name(), u.age().avg()))
        .from(&u)
        .join(u.to_group(), &g)
        .group_by(g.name())
        .fetch()
        .unwrap();

    // Group-insertion order, exactly two rows.
    assert_eq!(rows, vec![("ops".to_string(), 15.0), ("eng".to_string(), 35.0)]);
}

#[test]
fn having_filters_grouped_rows() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let rows: Vec<(String, f64)> = qf
        .select((g.name(), u.age().avg()))
        .from(&u)
        .join(u.to_group(), &g)
        .group_by(g.name())
        .having(u.age().avg().gt(20.0))
        .fetch()
        .unwrap();

    assert_eq!(rows, vec![("eng".to_string(), 35.0)]);
}

#[test]
fn relationship_join_filters_through_the_target() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let members = qf
        .select_from(&u)
        .join(u.to_group(), &g)
        .filter(g.name().eq("ops"))
        .fetch()
        .unwrap();

    let names: Vec<_> = members.iter().map(|m| m.username.as_deref()).collect();
    assert_eq!(names, vec![Some("alice"), Some("bob")]);
}

#[test]
fn theta_join_crosses_unrelated_sources() {
    let session = seeded_session();
    session.persist(&User::new(5, Some("ops"), 1, None));
    session.persist(&User::new(6, Some("eng"), 2, None));

    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let matched = qf
        .select_from(&u)
        .from(&g)
        .filter(u.username().eq(&g.name()))
        .fetch()
        .unwrap();

    let names: Vec<_> = matched.iter().map(|m| m.username.as_deref()).collect();
    assert_eq!(names, vec![Some("ops"), Some("eng")]);
}

#[test]
fn left_join_on_keeps_unmatched_left_rows() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let rows: Vec<(User, Option<quarry_testing_fixtures::Group>)> = qf
        .select((u.all(), g.all_opt()))
        .from(&u)
        .left_join(u.to_group(), &g)
        .on(g.name().eq("ops"))
        .fetch()
        .unwrap();

    assert_eq!(rows.len(), 4);
    assert!(rows[0].1.as_ref().is_some_and(|grp| grp.name == "ops"));
    assert!(rows[1].1.is_some());
    // The `on` predicate rejected eng, so its members keep a null right side.
    assert!(rows[2].1.is_none());
    assert!(rows[3].1.is_none());
}

#[test]
fn left_join_against_unrelated_source_matches_by_on_only() {
    let session = seeded_session();
    session.persist(&User::new(5, Some("ops"), 1, None));

    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let rows: Vec<(User, Option<quarry_testing_fixtures::Group>)> = qf
        .select((u.all(), g.all_opt()))
        .from(&u)
        .left_join_source(&g)
        .on(u.username().eq(&g.name()))
        .fetch()
        .unwrap();

    assert_eq!(rows.len(), 5);
    let matched: Vec<_> = rows.iter().filter(|(_, grp)| grp.is_some()).collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].0.username.as_deref(), Some("ops"));
}

#[test]
fn join_row_counts_respect_the_algebra() {
    let session = seeded_session();
    session.persist(&User::new(5, Some("zed"), 50, None));

    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let inner = qf
        .select_from(&u)
        .join_source(&g)
        .on(u.group_id().eq(&g.id()))
        .fetch_count()
        .unwrap();
    let left = qf
        .select_from(&u)
        .left_join_source(&g)
        .on(u.group_id().eq(&g.id()))
        .fetch_count()
        .unwrap();
    let cross_filtered = qf
        .select_from(&u)
        .from(&g)
        .filter(u.group_id().eq(&g.id()))
        .fetch_count()
        .unwrap();

    // Inner join equals the on-filtered cross product; left join keeps the
    // unmatched left row on top of it.
    assert_eq!(inner, cross_filtered);
    assert_eq!(left, inner + 1);
}

#[test]
fn fetch_eager_join_materializes_the_relation() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let lazy = qf
        .select_from(&u)
        .filter(u.username().eq("alice"))
        .fetch_one()
        .unwrap()
        .unwrap();
    let handle = lazy.group.clone().unwrap();
    assert!(!session.is_loaded(&handle));

    session.clear();

    let eager = qf
        .select_from(&u)
        .join(u.to_group(), &g)
        .fetch_join()
        .filter(u.username().eq("alice"))
        .fetch_one()
        .unwrap()
        .unwrap();
    let handle = eager.group.unwrap();
    assert!(session.is_loaded(&handle));
}

#[test]
fn subquery_finds_the_maximum_age() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let us = user_as("us");

    let oldest = qf
        .select_from(&u)
        .filter(u.age().eq(subselect(us.age().max()).from(&us)))
        .fetch()
        .unwrap();

    assert_eq!(oldest.len(), 1);
    assert_eq!(oldest[0].age, 40);
}

#[test]
fn subquery_average_bounds_the_result() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let us = user_as("us");

    let above_average = qf
        .select_from(&u)
        .filter(u.age().goe(subselect(us.age().avg()).from(&us)))
        .fetch()
        .unwrap();

    let ages: Vec<_> = above_average.iter().map(|m| m.age).collect();
    assert_eq!(ages, vec![30, 40]);
}

#[test]
fn subquery_in_restricts_membership() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let us = user_as("us");

    let members = qf
        .select_from(&u)
        .filter(
            u.age()
                .in_select(subselect(us.age()).from(&us).filter(us.age().gt(10))),
        )
        .fetch()
        .unwrap();

    let ages: Vec<_> = members.iter().map(|m| m.age).collect();
    assert_eq!(ages, vec![20, 30, 40]);
}

#[test]
fn scalar_subquery_projects_alongside_columns() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let us = user_as("us");

    let rows: Vec<(String, f64)> = qf
        .select((u.username(), subselect(us.age().avg()).from(&us)))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(rows.len(), 4);
    for (_, average) in rows {
        assert!((average - 25.0).abs() < f64::EPSILON);
    }
}

#[test]
fn vendor_template_rewrites_text() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let rewritten: Vec<String> = qf
        .select(string_template(
            "function('replace', {0}, {1}, {2})",
            [u.username().into(), lit("ali"), lit("AL")],
        ))
        .from(&u)
        .fetch()
        .unwrap();

    assert_eq!(rewritten[0], "ALce");
    assert_eq!(rewritten[1], "bob");
}

#[test]
fn lowercase_transform_matches_already_lower_names() {
    let session = seeded_session();
    session.persist(&User::new(5, Some("ZED"), 50, None));

    let qf = QueryFactory::new(&session);
    let u = user();

    let lower_named: Vec<String> = qf
        .select(u.username())
        .from(&u)
        .filter(u.username().eq(&u.username().lower()))
        .fetch()
        .unwrap();

    assert_eq!(lower_named.len(), 4);
    assert!(!lower_named.contains(&"ZED".to_string()));
}

#[test]
fn in_and_like_predicates_narrow_results() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();

    let picked = qf
        .select_from(&u)
        .filter(u.age().in_([10i64, 40]))
        .fetch()
        .unwrap();
    assert_eq!(picked.len(), 2);

    let liked = qf
        .select_from(&u)
        .filter(u.username().like("%a%"))
        .fetch()
        .unwrap();
    // alice, carol, dave.
    assert_eq!(liked.len(), 3);

    let prefixed = qf
        .select_from(&u)
        .filter(u.username().starts_with("da"))
        .fetch()
        .unwrap();
    assert_eq!(prefixed.len(), 1);
}

#[test]
fn finalized_plans_round_trip_through_serde() {
    let session = seeded_session();
    let qf = QueryFactory::new(&session);
    let u = user();
    let g = group();

    let plan = qf
        .select_from(&u)
        .join(u.to_group(), &g)
        .filter(g.name().eq("ops").or(u.age().gt(30)))
        .order_by(u.username().asc().nulls_last())
        .offset(1)
        .limit(2)
        .plan()
        .unwrap();

    let json = serde_json::to_string(&plan).unwrap();
    let restored: QueryPlan = serde_json::from_str(&json).unwrap();

    assert_eq!(plan, restored);
}
