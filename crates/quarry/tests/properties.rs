//! Property coverage for predicate composition and paging.

use proptest::prelude::*;
use quarry::prelude::*;
use quarry_testing_fixtures::{UserPaths, seeded_session, user};

// Conditionally-present criteria over the seeded dataset.
fn optional_criterion() -> impl Strategy<Value = Option<Predicate>> {
    prop_oneof![
        2 => Just(None::<Predicate>),
        2 => (0i64..60).prop_map(|age| Some(user().age().loe(age))),
        2 => (0i64..6).prop_map(|id| Some(user().id().gt(id))),
        1 => proptest::sample::select(vec!["alice", "bob", "carol", "dave", "zed"])
            .prop_map(|name| Some(user().username().eq(name))),
    ]
}

proptest! {
    // Composing with absent entries is indistinguishable from composing the
    // present entries alone, and an all-absent list matches every row.
    #[test]
    fn absent_criteria_never_change_the_result(
        criteria in proptest::collection::vec(optional_criterion(), 0..5),
    ) {
        let session = seeded_session();
        let qf = QueryFactory::new(&session);
        let u = user();

        let with_absent = qf
            .select_from(&u)
            .filter_all(criteria.clone())
            .fetch()
            .unwrap();
        let present_only = qf
            .select_from(&u)
            .filter_all(criteria.iter().flatten().cloned().map(Some))
            .fetch()
            .unwrap();

        prop_assert_eq!(&with_absent, &present_only);

        if criteria.iter().all(Option::is_none) {
            prop_assert_eq!(with_absent.len(), 4);
        }
    }

    // fetch_page(offset, limit).total == fetch_count(), and the slice never
    // exceeds the limit.
    #[test]
    fn page_totals_ignore_the_window(offset in 0i64..8, limit in 0i64..8) {
        let session = seeded_session();
        let qf = QueryFactory::new(&session);
        let u = user();

        let query = || {
            qf.select_from(&u)
                .order_by(u.username().asc().nulls_last())
                .offset(offset)
                .limit(limit)
        };

        let page = query().fetch_page().unwrap();
        let total = query().fetch_count().unwrap();

        prop_assert_eq!(page.total, total);
        prop_assert!(page.items.len() as u64 <= limit.unsigned_abs());
    }

    // and_all is order-preserving conjunction: a row survives the composed
    // filter exactly when it survives each present criterion alone.
    #[test]
    fn composed_filter_is_the_intersection(
        criteria in proptest::collection::vec(optional_criterion(), 1..4),
    ) {
        let session = seeded_session();
        let qf = QueryFactory::new(&session);
        let u = user();

        let composed = qf
            .select_from(&u)
            .filter_all(criteria.clone())
            .fetch()
            .unwrap();

        let mut expected = qf.select_from(&u).fetch().unwrap();
        for criterion in criteria.into_iter().flatten() {
            let survivors = qf.select_from(&u).filter(criterion).fetch().unwrap();
            expected.retain(|row| survivors.contains(row));
        }

        prop_assert_eq!(composed, expected);
    }
}
