//! Test entities and an in-memory reference session for quarry.
//!
//! The fixtures mirror a small people-and-groups schema: `User` rows with a
//! nullable username and a many-to-one edge to `Group`. `MemorySession`
//! implements the full `Session` contract over in-memory tables, including
//! the identity-map and eager-loading behavior real ORM sessions exhibit,
//! so integration tests can observe cache staleness and fetch-eagerness
//! end to end.

mod entities;
mod session;

pub use entities::{
    Group, GroupPaths, User, UserPaths, UserSummary, UserView, group, group_as, user, user_as,
};
pub use session::{MemorySession, StoredEntity};

/// The standard dataset: groups "ops"/"eng", users aged 10/20 in ops and
/// 30/40 in eng.
#[must_use]
pub fn seeded_session() -> MemorySession {
    let session = MemorySession::new();

    session.persist(&Group {
        id: 1,
        name: "ops".to_string(),
    });
    session.persist(&Group {
        id: 2,
        name: "eng".to_string(),
    });

    session.persist(&User::new(1, Some("alice"), 10, Some(1)));
    session.persist(&User::new(2, Some("bob"), 20, Some(1)));
    session.persist(&User::new(3, Some("carol"), 30, Some(2)));
    session.persist(&User::new(4, Some("dave"), 40, Some(2)));

    session
}
