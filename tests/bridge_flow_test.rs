use rootbridge_lib::engine::bridge::{AwaitingSide, BridgeService, GenerationResolver, LinkStatus};
use rootbridge_lib::engine::database::Database;
use rootbridge_lib::engine::dataset::Dataset;
use rootbridge_lib::engine::error::{BridgeError, ValidationKind};
use rootbridge_lib::engine::tree::EdgeKind;
use serde_json::json;
use std::sync::Arc;

fn family_dataset() -> Dataset {
    serde_json::from_value(json!({
        "branches": [
            { "id": "okafor", "surname": "Okafor", "totalGenerations": 3 },
            { "id": "adeyemi", "surname": "Adeyemi", "totalGenerations": 3 }
        ],
        "persons": [
            { "id": "emeka", "branchId": "okafor", "fullName": "Emeka Okafor", "givenName": "Emeka", "surname": "Okafor", "generationNumber": 1 },
            { "id": "nkechi", "branchId": "okafor", "fullName": "Nkechi Okafor", "givenName": "Nkechi", "surname": "Okafor", "generationNumber": 1 },
            { "id": "ikenna", "branchId": "okafor", "fullName": "Ikenna Okafor", "givenName": "Ikenna", "surname": "Okafor", "generationNumber": 2, "fatherId": "emeka", "motherId": "nkechi" },
            { "id": "tunde", "branchId": "adeyemi", "fullName": "Tunde Adeyemi", "givenName": "Tunde", "surname": "Adeyemi", "generationNumber": 1 },
            { "id": "funmi", "branchId": "adeyemi", "fullName": "Funmi Adeyemi", "givenName": "Funmi", "surname": "Adeyemi", "generationNumber": 2, "fatherId": "tunde" },
            { "id": "bisi", "branchId": "adeyemi", "fullName": "Bisi Adeyemi", "givenName": "Bisi", "surname": "Adeyemi", "generationNumber": 2, "fatherId": "tunde" },
            { "id": "kunle", "branchId": "adeyemi", "fullName": "Kunle Adeyemi", "givenName": "Kunle", "surname": "Adeyemi", "generationNumber": 3 }
        ],
        "partnerships": [
            { "id": "okafor-1", "branchId": "okafor", "person1Id": "emeka", "person2Id": "nkechi", "status": "active" }
        ],
        "users": [
            { "id": "chioma", "fullName": "Chioma Okafor" },
            { "id": "yemi", "fullName": "Yemi Adeyemi" },
            { "id": "admin", "fullName": "Site Admin", "globalRole": "SUPER_GURU" }
        ],
        "members": [
            { "branchId": "okafor", "userId": "chioma", "role": "guru" },
            { "branchId": "adeyemi", "userId": "yemi", "role": "moderator" }
        ]
    }))
    .expect("dataset json")
}

fn setup() -> Result<(tempfile::TempDir, Database, BridgeService), Box<dyn std::error::Error>> {
    let root = tempfile::tempdir()?;
    let db = Database::new(&root.path().join("data").join("rootbridge.db"))?;
    family_dataset().apply(&db)?;
    let service = BridgeService::sqlite(db.clone());
    Ok((root, db, service))
}

#[test]
fn test_request_approve_and_assign_primary() -> Result<(), Box<dyn std::error::Error>> {
    let (_root, _db, service) = setup()?;

    // 1. Okafor asks to bridge in Funmi from Adeyemi
    let link = service.request_link("funmi", "okafor", "chioma", Some("Funmi (Adeyemi)".to_string()), None)?;
    assert_eq!(link.status, LinkStatus::Pending);
    assert_eq!(link.target_branch_id, "adeyemi");
    assert_eq!(link.awaiting_side(), AwaitingSide::Target);

    // 2. Adeyemi approves
    let link = service.approve_link(&link.id, "yemi")?;
    assert_eq!(link.status, LinkStatus::Approved);
    assert_eq!(link.awaiting_side(), AwaitingSide::None);

    // 3. Admin promotes it
    service.set_primary(&link.id, "admin")?;
    let issues = service.list_issues_by_pair()?;
    assert_eq!(issues.len(), 1);
    assert!(issues[0].has_primary);
    assert_eq!(issues[0].primary_link_id.as_deref(), Some(link.id.as_str()));
    Ok(())
}

#[test]
fn test_primary_moves_between_links() -> Result<(), Box<dyn std::error::Error>> {
    let (_root, db, service) = setup()?;

    let l1 = service.request_link("funmi", "okafor", "chioma", None, None)?;
    let l2 = service.request_link("bisi", "okafor", "chioma", None, None)?;
    service.approve_link(&l1.id, "yemi")?;
    service.approve_link(&l2.id, "yemi")?;

    service.set_primary(&l1.id, "admin")?;
    let summary = service.set_primary(&l2.id, "admin")?;

    assert_eq!(summary.primary_link_id.as_deref(), Some(l2.id.as_str()));
    assert!(!service.get_link(&l1.id)?.is_primary);
    assert!(service.get_link(&l2.id)?.is_primary);

    let conn = db.get_connection()?;
    let primaries: i64 = conn.query_row("SELECT COUNT(*) FROM bridge_links WHERE is_primary = 1", [], |r| r.get(0))?;
    assert_eq!(primaries, 1);
    Ok(())
}

#[test]
fn test_generation_override_bounds() -> Result<(), Box<dyn std::error::Error>> {
    let (_root, _db, service) = setup()?;
    let link = service.request_link("funmi", "okafor", "chioma", None, None)?;
    service.approve_link(&link.id, "yemi")?;

    assert!(matches!(
        service.set_generation_override(&link.id, Some(0), "admin"),
        Err(BridgeError::Validation(ValidationKind::OutOfRange(v))) if v == "0"
    ));
    assert!(matches!(
        service.set_generation_override(&link.id, Some(31), "admin"),
        Err(BridgeError::Validation(ValidationKind::OutOfRange(v))) if v == "31"
    ));

    let link = service.set_generation_override(&link.id, Some(5), "admin")?;
    assert_eq!(GenerationResolver::resolve(&link, Some(3)), 5);
    Ok(())
}

#[test]
fn test_tree_skips_link_to_deleted_person() -> Result<(), Box<dyn std::error::Error>> {
    let (_root, db, service) = setup()?;

    // 1. Two approved bridges into Okafor
    let good = service.request_link("funmi", "okafor", "chioma", None, None)?;
    let doomed = service.request_link("kunle", "okafor", "chioma", None, None)?;
    service.approve_link(&good.id, "yemi")?;
    service.approve_link(&doomed.id, "yemi")?;

    // 2. Kunle disappears upstream
    db.get_connection()?
        .execute("DELETE FROM persons WHERE person_id = 'kunle'", [])?;

    // 3. Assembly still succeeds
    let tree = service.assemble_tree("okafor")?;
    assert_eq!(tree.warnings.len(), 1);
    assert_eq!(tree.warnings[0].link_id.as_deref(), Some(doomed.id.as_str()));

    let bridges: Vec<_> = tree.anchor_branch.bridge_edges().collect();
    assert_eq!(bridges.len(), 1);
    assert!(matches!(&bridges[0].kind, EdgeKind::Bridge { link_id, .. } if *link_id == good.id));

    // Okafor's own three members, Funmi's placeholder, and its family edges
    assert_eq!(tree.anchor_branch.nodes.len(), 4);
    assert_eq!(tree.anchor_branch.edges.len(), 4);
    assert_eq!(tree.connected_branches.len(), 1);
    assert_eq!(tree.connected_branches[0].nodes.len(), 3);
    Ok(())
}

#[test]
fn test_concurrent_primary_assignment() -> Result<(), Box<dyn std::error::Error>> {
    let (_root, db, service) = setup()?;

    let mut ids = Vec::new();
    for person in ["funmi", "bisi", "kunle", "tunde"] {
        let link = service.request_link(person, "okafor", "chioma", None, None)?;
        service.approve_link(&link.id, "yemi")?;
        ids.push(link.id);
    }

    // Every admin click races every other one
    let service = Arc::new(service);
    let handles: Vec<_> = ids
        .iter()
        .cycle()
        .take(16)
        .cloned()
        .map(|id| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.set_primary(&id, "admin").map(|_| ()))
        })
        .collect();

    for handle in handles {
        match handle.join().expect("thread panicked") {
            Ok(()) | Err(BridgeError::Conflict(_)) => {}
            Err(e) => return Err(e.into()),
        }
    }

    let conn = db.get_connection()?;
    let primaries: i64 = conn.query_row("SELECT COUNT(*) FROM bridge_links WHERE is_primary = 1", [], |r| r.get(0))?;
    assert_eq!(primaries, 1);
    Ok(())
}
