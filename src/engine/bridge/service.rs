//! Bridge Service
//!
//! Facade the API and CLI call into. Wires the workflow, primacy and
//! generation components to one database and one set of collaborators.

use std::sync::Arc;

use super::candidates::{self, LinkCandidate};
use super::generation::GenerationResolver;
use super::issues::{self, BridgeIssueSummary};
use super::model::{BridgeLink, LinkStatus};
use super::primacy::PrimacyEnforcer;
use super::store::BridgeLinkStore;
use super::workflow::{ApprovalWorkflow, LinkRequest};
use crate::engine::authz::{ModerationRights, SqliteModerationRights};
use crate::engine::database::Database;
use crate::engine::directory::{BranchDirectory, SqliteBranchDirectory};
use crate::engine::error::{validate_id, BridgeError, Result};
use crate::engine::tree::{AssembledTree, TreeAssembler};

pub struct BridgeService {
    db: Database,
    directory: Arc<dyn BranchDirectory>,
    workflow: ApprovalWorkflow,
    primacy: PrimacyEnforcer,
    generation: GenerationResolver,
    assembler: TreeAssembler,
}

impl BridgeService {
    pub fn new(db: Database, rights: Arc<dyn ModerationRights>, directory: Arc<dyn BranchDirectory>) -> Self {
        Self {
            workflow: ApprovalWorkflow::new(db.clone(), rights.clone(), directory.clone()),
            primacy: PrimacyEnforcer::new(db.clone(), rights.clone()),
            generation: GenerationResolver::new(db.clone(), rights),
            assembler: TreeAssembler::new(db.clone(), directory.clone()),
            directory,
            db,
        }
    }

    /// Service over the local store for both rights and branch data
    pub fn sqlite(db: Database) -> Self {
        let rights = Arc::new(SqliteModerationRights::new(db.clone()));
        let directory = Arc::new(SqliteBranchDirectory::new(db.clone()));
        Self::new(db, rights, directory)
    }

    /// A moderator of `requesting_branch_id` asks to bridge in a person from
    /// another branch. The person's home branch becomes the target side.
    pub fn request_link(
        &self,
        person_id: &str,
        requesting_branch_id: &str,
        requested_by: &str,
        display_name: Option<String>,
        notes: Option<String>,
    ) -> Result<BridgeLink> {
        validate_id("person id", person_id)?;
        let person = self
            .directory
            .person(person_id)?
            .ok_or_else(|| BridgeError::not_found("Person", person_id))?;

        self.workflow.request_link(LinkRequest {
            person_id: person.id,
            source_branch_id: requesting_branch_id.to_string(),
            target_branch_id: person.branch_id,
            requested_by: requested_by.to_string(),
            display_name,
            notes,
        })
    }

    pub fn approve_link(&self, link_id: &str, approver_id: &str) -> Result<BridgeLink> {
        self.workflow.approve(link_id, approver_id)
    }

    pub fn reject_link(&self, link_id: &str, actor_id: &str, reason: Option<String>) -> Result<BridgeLink> {
        self.workflow.reject(link_id, actor_id, reason)
    }

    pub fn set_primary(&self, link_id: &str, actor_id: &str) -> Result<BridgeIssueSummary> {
        let link = self.primacy.set_primary(link_id, actor_id)?;
        self.pair_summary(&link)
    }

    pub fn clear_primary(&self, link_id: &str, actor_id: &str) -> Result<BridgeIssueSummary> {
        let link = self.primacy.clear_primary(link_id, actor_id)?;
        self.pair_summary(&link)
    }

    pub fn set_generation_override(&self, link_id: &str, value: Option<i64>, actor_id: &str) -> Result<BridgeLink> {
        self.generation.set_override(link_id, value, actor_id)
    }

    /// Pending and approved links grouped by branch pair
    pub fn list_issues_by_pair(&self) -> Result<Vec<BridgeIssueSummary>> {
        let links = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn).list_active()?
        };
        issues::summarize(links, self.directory.as_ref())
    }

    pub fn assemble_tree(&self, anchor_branch_id: &str) -> Result<AssembledTree> {
        self.assembler.assemble(anchor_branch_id)
    }

    pub fn list_links(&self, branch_id: &str, status: Option<LinkStatus>) -> Result<Vec<BridgeLink>> {
        validate_id("branch id", branch_id)?;
        let conn = self.db.get_connection()?;
        Ok(BridgeLinkStore::new(&conn).list_for_branch(branch_id, status)?)
    }

    /// Persons from other branches that `branch_id` has no open link with,
    /// ordered by full name. `query` matches a name substring, ignoring case.
    pub fn link_candidates(&self, branch_id: &str, query: Option<&str>, limit: Option<usize>) -> Result<Vec<LinkCandidate>> {
        validate_id("branch id", branch_id)?;
        if self.directory.branch(branch_id)?.is_none() {
            return Err(BridgeError::not_found("Branch", branch_id));
        }
        let query = query.map(str::trim).filter(|q| !q.is_empty());
        let persons = self.directory.search_persons(branch_id, query)?;
        let linked = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn).linked_person_ids(branch_id)?
        };
        candidates::select(persons, &linked, candidates::clamp_limit(limit), self.directory.as_ref())
    }

    pub fn get_link(&self, link_id: &str) -> Result<BridgeLink> {
        validate_id("link id", link_id)?;
        let conn = self.db.get_connection()?;
        BridgeLinkStore::new(&conn)
            .get(link_id)?
            .ok_or_else(|| BridgeError::not_found("Link", link_id))
    }

    pub fn status_counts(&self) -> Result<Vec<(LinkStatus, i64)>> {
        let conn = self.db.get_connection()?;
        Ok(BridgeLinkStore::new(&conn).count_by_status()?)
    }

    fn pair_summary(&self, link: &BridgeLink) -> Result<BridgeIssueSummary> {
        let pair = link.pair();
        let links: Vec<BridgeLink> = {
            let conn = self.db.get_connection()?;
            BridgeLinkStore::new(&conn)
                .list_for_pair(&pair)?
                .into_iter()
                .filter(|l| l.status.is_active())
                .collect()
        };
        issues::summarize_pair(&pair, &links, self.directory.as_ref())?
            .ok_or_else(|| BridgeError::not_found("Branch", &pair.pair_id()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::bridge::model::AwaitingSide;
    use crate::engine::error::ConflictKind;
    use crate::engine::test_support::seeded_db;

    #[test]
    fn test_request_targets_home_branch() {
        let service = BridgeService::sqlite(seeded_db());
        let link = service
            .request_link("b-ngozi", "branch-a", "alice", Some("Ngozi".to_string()), None)
            .unwrap();
        assert_eq!(link.source_branch_id, "branch-a");
        assert_eq!(link.target_branch_id, "branch-b");
        assert_eq!(link.awaiting_side(), AwaitingSide::Target);

        assert!(matches!(
            service.request_link("ghost", "branch-a", "alice", None, None),
            Err(BridgeError::NotFound { entity: "Person", .. })
        ));
    }

    #[test]
    fn test_primary_round_trip_returns_pair_summary() {
        let service = BridgeService::sqlite(seeded_db());
        let link = service.request_link("b-ngozi", "branch-a", "alice", None, None).unwrap();
        service.approve_link(&link.id, "bob").unwrap();

        let summary = service.set_primary(&link.id, "root").unwrap();
        assert!(summary.has_primary);
        assert_eq!(summary.primary_link_id.as_deref(), Some(link.id.as_str()));

        let summary = service.clear_primary(&link.id, "root").unwrap();
        assert!(!summary.has_primary);
        assert_eq!(summary.total_links, 1);
    }

    #[test]
    fn test_list_links_and_rejected_excluded_from_issues() {
        let service = BridgeService::sqlite(seeded_db());
        let kept = service.request_link("b-ngozi", "branch-a", "alice", None, None).unwrap();
        let dropped = service.request_link("b-tunde", "branch-a", "alice", None, None).unwrap();
        service
            .reject_link(&dropped.id, "bob", Some("duplicate entry".to_string()))
            .unwrap();

        let issues = service.list_issues_by_pair().unwrap();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].links[0].id, kept.id);

        let rejected = service.list_links("branch-b", Some(LinkStatus::Rejected)).unwrap();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].notes.as_deref(), Some("duplicate entry"));
        assert_eq!(service.list_links("branch-a", None).unwrap().len(), 2);

        assert!(matches!(
            service.set_generation_override(&dropped.id, Some(3), "root"),
            Err(BridgeError::Conflict(ConflictKind::AlreadyResolved))
        ));
    }

    #[test]
    fn test_link_candidates_exclude_open_links() {
        let service = BridgeService::sqlite(seeded_db());
        let ids = |query: Option<&str>| -> Vec<String> {
            service
                .link_candidates("branch-a", query, None)
                .unwrap()
                .into_iter()
                .map(|c| c.id)
                .collect()
        };
        assert_eq!(ids(None), vec!["b-ada", "c-kemi", "b-musa", "b-ngozi", "b-tunde"]);

        // Pending and approved links hide the person, a rejected one does not
        let pending = service.request_link("b-ngozi", "branch-a", "alice", None, None).unwrap();
        let approved = service.request_link("b-musa", "branch-a", "alice", None, None).unwrap();
        service.approve_link(&approved.id, "bob").unwrap();
        let rejected = service.request_link("b-tunde", "branch-a", "alice", None, None).unwrap();
        service.reject_link(&rejected.id, "bob", None).unwrap();
        assert_eq!(ids(None), vec!["b-ada", "c-kemi", "b-tunde"]);
        assert!(!ids(None).contains(&pending.person_id));

        // A link from the other direction counts too: Bello bridged in Chidi
        let chidi = service.request_link("a-chidi", "branch-b", "bob", None, None).unwrap();
        let from_b = service.link_candidates("branch-b", None, None).unwrap();
        assert!(from_b.iter().all(|c| c.id != chidi.person_id));
        assert!(from_b.iter().all(|c| !c.id.starts_with("b-")));

        assert_eq!(ids(Some("  BELLO ")), vec!["b-ada", "b-tunde"]);
        assert_eq!(service.link_candidates("branch-a", None, Some(1)).unwrap().len(), 1);
        assert!(matches!(
            service.link_candidates("branch-z", None, None),
            Err(BridgeError::NotFound { entity: "Branch", .. })
        ));
    }
}
