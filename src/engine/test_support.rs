//! Shared fixtures for unit tests

use chrono::Utc;

use crate::engine::bridge::model::{BridgeLink, Side};
use crate::engine::bridge::store::BridgeLinkStore;
use crate::engine::database::Database;
use crate::engine::dataset::Dataset;

/// Three branches (Abara, Bello, Cole) with a few persons each and the
/// moderators alice (A), bob (B), carol (C), a suspended mallory (A),
/// a plain member dave (A) and the admin root.
pub const SEED_JSON: &str = r#"{
    "branches": [
        { "id": "branch-a", "surname": "Abara", "totalGenerations": 3 },
        { "id": "branch-b", "surname": "Bello", "totalGenerations": 2 },
        { "id": "branch-c", "surname": "Cole", "totalGenerations": 1 }
    ],
    "persons": [
        { "id": "a-obi", "branchId": "branch-a", "fullName": "Obi Abara", "givenName": "Obi", "surname": "Abara", "generationNumber": 1 },
        { "id": "a-ifeoma", "branchId": "branch-a", "fullName": "Ifeoma Eze", "givenName": "Ifeoma", "surname": "Eze", "generationNumber": 1 },
        { "id": "a-chidi", "branchId": "branch-a", "fullName": "Chidi Abara", "givenName": "Chidi", "surname": "Abara", "generationNumber": 2, "fatherId": "a-obi", "motherId": "a-ifeoma" },
        { "id": "a-uche", "branchId": "branch-a", "fullName": "Uche Abara", "givenName": "Uche", "surname": "Abara", "generationNumber": 2, "fatherId": "a-obi" },
        { "id": "b-musa", "branchId": "branch-b", "fullName": "Musa Bello", "givenName": "Musa", "surname": "Bello", "generationNumber": 1 },
        { "id": "b-ada", "branchId": "branch-b", "fullName": "Ada Bello", "givenName": "Ada", "surname": "Bello", "generationNumber": 1 },
        { "id": "b-ngozi", "branchId": "branch-b", "fullName": "Ngozi Bello", "givenName": "Ngozi", "surname": "Bello", "generationNumber": 2, "fatherId": "b-musa", "motherId": "b-ada" },
        { "id": "b-tunde", "branchId": "branch-b", "fullName": "Tunde Bello", "givenName": "Tunde", "surname": "Bello", "generationNumber": 2, "fatherId": "b-musa" },
        { "id": "c-kemi", "branchId": "branch-c", "fullName": "Kemi Cole", "givenName": "Kemi", "surname": "Cole", "generationNumber": 1 }
    ],
    "partnerships": [
        { "id": "a-p1", "branchId": "branch-a", "person1Id": "a-obi", "person2Id": "a-ifeoma", "status": "active" },
        { "id": "b-p1", "branchId": "branch-b", "person1Id": "b-musa", "person2Id": "b-ada", "status": "active" }
    ],
    "users": [
        { "id": "alice", "fullName": "Alice Abara" },
        { "id": "bob", "fullName": "Bob Bello" },
        { "id": "carol", "fullName": "Carol Cole" },
        { "id": "mallory", "fullName": "Mallory Abara" },
        { "id": "dave", "fullName": "Dave Abara" },
        { "id": "root", "fullName": "Site Admin", "globalRole": "ADMIN" }
    ],
    "members": [
        { "branchId": "branch-a", "userId": "alice", "role": "guru" },
        { "branchId": "branch-b", "userId": "bob", "role": "guru" },
        { "branchId": "branch-c", "userId": "carol", "role": "guru" },
        { "branchId": "branch-a", "userId": "mallory", "role": "guru", "status": "suspended" },
        { "branchId": "branch-a", "userId": "dave", "role": "member" }
    ]
}"#;

pub fn seeded_db() -> Database {
    let db = Database::in_memory().unwrap();
    let dataset: Dataset = serde_json::from_str(SEED_JSON).unwrap();
    dataset.apply(&db).unwrap();
    db
}

/// Pending A -> B link requested by alice, written straight to the store
pub fn pending_link(db: &Database, person_id: &str) -> BridgeLink {
    let link = BridgeLink::requested(person_id, "branch-a", "branch-b", "alice");
    let conn = db.get_connection().unwrap();
    BridgeLinkStore::new(&conn).insert(&link).unwrap();
    link
}

/// A -> B link approved by bob on the target side
pub fn approved_link(db: &Database, person_id: &str) -> BridgeLink {
    let mut link = BridgeLink::requested(person_id, "branch-a", "branch-b", "alice");
    link.approve_side(Side::Target, "bob", Utc::now());
    let conn = db.get_connection().unwrap();
    BridgeLinkStore::new(&conn).insert(&link).unwrap();
    link
}
