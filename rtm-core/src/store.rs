//! Dashboard state owner
//!
//! [`DashboardStore`] owns the tree, the requirement records, the gap analysis
//! and every in-flight service call. All mutations go through its methods on
//! the owning thread; service results are folded back in by [`poll`] or
//! [`wait_all`].
//!
//! [`poll`]: DashboardStore::poll
//! [`wait_all`]: DashboardStore::wait_all

use std::sync::mpsc;
use std::sync::Arc;

use crate::config::RtmConfig;
use crate::error::{RtmError, RtmResult};
use crate::fixtures::Workspace;
use crate::gap::{
    suggest_requirement, GapAction, GapAnalysis, GapOutcome, KeywordRecommender, LinkReport,
    LinkTarget, RecommendationResult, Recommender,
};
use crate::ids::IdGenerator;
use crate::models::{normalize_tags, LeafDetails, NavigationNode, NodeType, RequirementStatus};
use crate::navigation::{Activation, DrillNavigator, NavigationEvent, PathResolution};
use crate::notify::NotificationCenter;
use crate::requirement::{DetailTab, KnowledgeDoc, LinkedItem, Requirement, RequirementCatalog};
use crate::service::{BusyFlags, MockServices, PendingOp, ServiceOp};
use crate::table::{RowView, TableModel};
use crate::tree::{NavTree, NodeIdx};

/// Calls waiting for a simulated backend
#[derive(Default)]
struct InFlight {
    recommend: Option<PendingOp<Vec<RecommendationResult>>>,
    link: Option<PendingOp<Vec<(String, LinkTarget)>>>,
    /// Source item id and the pending record
    create: Option<(String, PendingOp<Requirement>)>,
    /// Target requirement id and the pending document
    upload: Option<(String, PendingOp<KnowledgeDoc>)>,
    load: Option<PendingOp<Requirement>>,
}

/// Single owner of the dashboard state
pub struct DashboardStore {
    config: RtmConfig,
    tree: NavTree,
    catalog: RequirementCatalog,
    gap: GapAnalysis,
    navigator: DrillNavigator,
    table: TableModel,
    ids: IdGenerator,
    services: MockServices,
    busy: BusyFlags,
    notifications: NotificationCenter,
    selected: Option<String>,
    detail_tab: DetailTab,
    in_flight: InFlight,
    dirty: bool,
}

impl DashboardStore {
    /// Builds the store with the keyword recommender
    pub fn new(workspace: Workspace, config: RtmConfig) -> RtmResult<Self> {
        Self::with_recommender(workspace, config, Arc::new(KeywordRecommender))
    }

    pub fn with_recommender(
        workspace: Workspace,
        config: RtmConfig,
        recommender: Arc<dyn Recommender>,
    ) -> RtmResult<Self> {
        let tree = NavTree::from_forest(&workspace.forest)?;
        let catalog = RequirementCatalog::new(workspace.requirements);
        let gap = GapAnalysis::new(workspace.unlinked_items, config.match_threshold);
        let ids = IdGenerator::seeded(&tree, &catalog);
        let services = MockServices::new(config.service_config(), recommender);

        let mut table = TableModel::new(config.min_column_width);
        table
            .expansion
            .expand_to_level(&tree, tree.roots(), config.default_expand_level);

        log::debug!(
            "store ready: {} nodes, {} requirements, {} unlinked items",
            tree.len(),
            catalog.len(),
            gap.items().len()
        );

        Ok(Self {
            navigator: DrillNavigator::new(config.broken_path_policy),
            config,
            tree,
            catalog,
            gap,
            table,
            ids,
            services,
            busy: BusyFlags::default(),
            notifications: NotificationCenter::default(),
            selected: None,
            detail_tab: DetailTab::Overview,
            in_flight: InFlight::default(),
            dirty: false,
        })
    }

    pub fn config(&self) -> &RtmConfig {
        &self.config
    }

    pub fn tree(&self) -> &NavTree {
        &self.tree
    }

    pub fn catalog(&self) -> &RequirementCatalog {
        &self.catalog
    }

    pub fn gap(&self) -> &GapAnalysis {
        &self.gap
    }

    pub fn navigator(&self) -> &DrillNavigator {
        &self.navigator
    }

    pub fn table(&self) -> &TableModel {
        &self.table
    }

    pub fn table_mut(&mut self) -> &mut TableModel {
        &mut self.table
    }

    pub fn busy(&self) -> &BusyFlags {
        &self.busy
    }

    pub fn services_mut(&mut self) -> &mut MockServices {
        &mut self.services
    }

    pub fn notifications(&self) -> &NotificationCenter {
        &self.notifications
    }

    pub fn notifications_mut(&mut self) -> &mut NotificationCenter {
        &mut self.notifications
    }

    /// True once the tree, records or items changed since load
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_saved(&mut self) {
        self.dirty = false;
    }

    pub fn subscribe(&mut self) -> mpsc::Receiver<NavigationEvent> {
        self.navigator.subscribe()
    }

    // Navigation

    pub fn drill_in(&mut self, idx: NodeIdx) -> RtmResult<()> {
        self.navigator.drill_in(&self.tree, idx)
    }

    pub fn drill_back(&mut self) -> Option<Option<NodeIdx>> {
        self.navigator.drill_back(&self.tree)
    }

    pub fn jump_to_depth(&mut self, depth: usize) -> bool {
        self.navigator.jump_to_depth(&self.tree, depth)
    }

    pub fn reset_navigation(&mut self) {
        self.navigator.reset(&self.tree)
    }

    pub fn set_external_path<S: AsRef<str>>(&mut self, ids: &[S]) -> RtmResult<PathResolution> {
        self.navigator.set_external_path(&self.tree, ids)
    }

    /// Activates a visible node; a leaf also starts loading its record
    pub fn activate(&mut self, idx: NodeIdx) -> RtmResult<Activation> {
        if self.tree.get(idx).is_some_and(|slot| !slot.is_folder()) {
            self.ensure_not_loading()?;
        }
        let activation = self.navigator.activate(&self.tree, idx)?;
        if let Activation::Opened(leaf) = activation {
            let id = self.tree.node(leaf).id.clone();
            self.request_load(&id)?;
        }
        Ok(activation)
    }

    /// Navigates to a finder hit; a leaf also starts loading its record
    pub fn reveal(&mut self, id: &str) -> RtmResult<Activation> {
        if self.tree.find(id).is_some_and(|idx| !self.tree.is_folder(idx)) {
            self.ensure_not_loading()?;
        }
        let activation = self.navigator.reveal(&self.tree, id)?;
        if let Activation::Opened(_) = activation {
            self.request_load(id)?;
        }
        Ok(activation)
    }

    // Leaves are only selected once their load can start
    fn ensure_not_loading(&self) -> RtmResult<()> {
        if self.busy.loading {
            return Err(RtmError::Busy(ServiceOp::Load));
        }
        Ok(())
    }

    /// Table rows for the current context
    pub fn visible_rows(&self) -> Vec<RowView> {
        self.table
            .rows(&self.tree, self.navigator.visible(&self.tree))
    }

    /// Expands the current context to `level` folder levels
    pub fn expand_to_level(&mut self, level: usize) {
        let roots = self.navigator.visible(&self.tree);
        self.table.expansion.expand_to_level(&self.tree, roots, level);
    }

    pub fn expand_all(&mut self) {
        let roots = self.navigator.visible(&self.tree);
        self.table.expansion.expand_all(&self.tree, roots);
    }

    pub fn collapse_all(&mut self) {
        self.table.expansion.collapse_all();
    }

    pub fn toggle_expanded(&mut self, id: &str) -> bool {
        self.table.expansion.toggle(id)
    }

    // Detail view

    /// Selects a requirement synchronously
    pub fn select_requirement(&mut self, req_id: &str) -> RtmResult<&Requirement> {
        self.catalog.require(req_id)?;
        self.selected = Some(req_id.to_string());
        self.detail_tab = DetailTab::Overview;
        self.catalog.require(req_id)
    }

    pub fn selected_requirement(&self) -> Option<&Requirement> {
        self.selected.as_deref().and_then(|id| self.catalog.get(id))
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn detail_tab(&self) -> DetailTab {
        self.detail_tab
    }

    pub fn set_detail_tab(&mut self, tab: DetailTab) {
        self.detail_tab = tab;
    }

    // Tree edits

    /// Adds an empty folder under `parent` (or at the root) and returns its id
    pub fn add_folder(&mut self, parent: Option<&str>, name: &str) -> RtmResult<String> {
        let parent_idx = parent.map(|id| self.tree.require(id)).transpose()?;
        if let Some(idx) = parent_idx {
            if !self.tree.is_folder(idx) {
                return Err(RtmError::NotAFolder(self.tree.node(idx).id.clone()));
            }
        }

        let id = self.ids.next_folder_id();
        let folder = NavigationNode::folder(id.clone(), name.trim(), NodeType::Folder, Vec::new());
        self.tree.insert(parent_idx, &folder)?;
        self.dirty = true;
        log::info!("added folder {} under {}", id, parent.unwrap_or("<root>"));
        Ok(id)
    }

    /// Replaces the tags of a node, returning the normalized list
    pub fn set_tags<S: AsRef<str>>(&mut self, id: &str, tags: &[S]) -> RtmResult<Vec<String>> {
        let idx = self.tree.require(id)?;
        let tags = normalize_tags(tags);
        self.tree.set_tags(idx, tags.clone());
        self.dirty = true;
        Ok(tags)
    }

    // Gap analysis

    /// Accepts the recommendation of an item
    pub fn accept(&mut self, item_id: &str) -> RtmResult<GapOutcome> {
        let outcome = self.gap.apply(GapAction::Accept(item_id.to_string()))?;
        self.dirty = true;
        Ok(outcome)
    }

    /// Discards the recommendation of an item
    pub fn reject(&mut self, item_id: &str) -> RtmResult<GapOutcome> {
        let outcome = self.gap.apply(GapAction::Reject(item_id.to_string()))?;
        self.dirty = true;
        Ok(outcome)
    }

    /// Starts scoring the given items, or every unlinked item when empty
    pub fn request_recommendations(&mut self, item_ids: &[String]) -> RtmResult<()> {
        let items = self.gap.candidates(item_ids)?;
        self.busy.begin(ServiceOp::Recommend)?;
        let op = self.services.recommend(items, self.catalog.all().to_vec());
        self.in_flight.recommend = Some(op);
        Ok(())
    }

    /// Starts linking `(item id, requirement id)` pairs
    pub fn request_link(&mut self, pairs: &[(String, String)]) -> RtmResult<()> {
        let mut targets = Vec::with_capacity(pairs.len());
        for (item_id, req_id) in pairs {
            if self.gap.get(item_id).is_none() {
                return Err(RtmError::ItemNotFound(item_id.clone()));
            }
            let req = self.catalog.require(req_id)?;
            targets.push((item_id.clone(), LinkTarget::from_requirement(req)));
        }
        self.start_link(targets)
    }

    /// Starts linking every accepted item to its recommendation
    pub fn request_link_accepted(&mut self) -> RtmResult<usize> {
        let targets = self.gap.accepted_links();
        let count = targets.len();
        if count > 0 {
            self.start_link(targets)?;
        }
        Ok(count)
    }

    fn start_link(&mut self, targets: Vec<(String, LinkTarget)>) -> RtmResult<()> {
        self.busy.begin(ServiceOp::Link)?;
        let op = self.services.link(targets);
        self.in_flight.link = Some(op);
        Ok(())
    }

    /// Starts creating a requirement from an item's draft
    ///
    /// Items without a draft get one suggested on the spot. Returns the id
    /// the new requirement will have.
    pub fn request_create(&mut self, item_id: &str) -> RtmResult<String> {
        let item = self
            .gap
            .get(item_id)
            .ok_or_else(|| RtmError::ItemNotFound(item_id.to_string()))?;
        if item.is_linked() {
            return Err(RtmError::ServiceRejected {
                op: ServiceOp::Create,
                reason: format!("{} is already linked", item_id),
            });
        }
        let draft = item.draft.clone().unwrap_or_else(|| suggest_requirement(item));
        let linked = LinkedItem {
            item_id: item.id.clone(),
            title: item.title.clone(),
            kind: item.kind.to_string(),
        };

        self.busy.begin(ServiceOp::Create)?;
        let req_id = self.ids.next_requirement_id();
        let mut requirement = Requirement::new(req_id.clone(), draft.title);
        requirement.description = draft.description;
        requirement.priority = draft.priority;
        requirement.status = RequirementStatus::Draft;
        requirement.linked_items.push(linked);

        let op = self.services.create_requirement(requirement);
        self.in_flight.create = Some((item_id.to_string(), op));
        Ok(req_id)
    }

    /// Starts uploading a knowledge-base document for a requirement
    pub fn request_upload(
        &mut self,
        req_id: &str,
        title: &str,
        file_name: &str,
        size_bytes: u64,
    ) -> RtmResult<()> {
        self.catalog.require(req_id)?;
        self.busy.begin(ServiceOp::Upload)?;
        let op = self
            .services
            .upload(title.to_string(), file_name.to_string(), size_bytes);
        self.in_flight.upload = Some((req_id.to_string(), op));
        Ok(())
    }

    /// Upload progress in percent while an upload is running
    pub fn upload_progress(&mut self) -> Option<u8> {
        self.in_flight
            .upload
            .as_mut()
            .map(|(_, op)| op.progress())
    }

    /// Starts loading a requirement into the detail view
    pub fn request_load(&mut self, req_id: &str) -> RtmResult<()> {
        self.busy.begin(ServiceOp::Load)?;
        let found = self.catalog.get(req_id).cloned();
        let op = self.services.load_requirement(req_id.to_string(), found);
        self.in_flight.load = Some(op);
        Ok(())
    }

    // Resolution

    /// Folds every resolved call into the state without blocking
    ///
    /// Returns the operations that finished during this call.
    pub fn poll(&mut self) -> Vec<ServiceOp> {
        let mut done = Vec::new();

        if let Some(result) = self.in_flight.recommend.as_mut().and_then(|op| op.try_take()) {
            self.in_flight.recommend = None;
            self.finish_recommend(result);
            done.push(ServiceOp::Recommend);
        }
        if let Some(result) = self.in_flight.link.as_mut().and_then(|op| op.try_take()) {
            self.in_flight.link = None;
            self.finish_link(result);
            done.push(ServiceOp::Link);
        }
        if let Some(result) = self.in_flight.create.as_mut().and_then(|(_, op)| op.try_take()) {
            if let Some((item_id, _)) = self.in_flight.create.take() {
                self.finish_create(item_id, result);
            }
            done.push(ServiceOp::Create);
        }
        if let Some(result) = self.in_flight.upload.as_mut().and_then(|(_, op)| op.try_take()) {
            if let Some((req_id, _)) = self.in_flight.upload.take() {
                self.finish_upload(req_id, result);
            }
            done.push(ServiceOp::Upload);
        }
        if let Some(result) = self.in_flight.load.as_mut().and_then(|op| op.try_take()) {
            self.in_flight.load = None;
            self.finish_load(result);
            done.push(ServiceOp::Load);
        }

        done
    }

    /// Blocks until every in-flight call has resolved
    pub fn wait_all(&mut self) -> Vec<ServiceOp> {
        let mut done = Vec::new();

        if let Some(op) = self.in_flight.recommend.take() {
            self.finish_recommend(op.wait());
            done.push(ServiceOp::Recommend);
        }
        if let Some(op) = self.in_flight.link.take() {
            self.finish_link(op.wait());
            done.push(ServiceOp::Link);
        }
        if let Some((item_id, op)) = self.in_flight.create.take() {
            self.finish_create(item_id, op.wait());
            done.push(ServiceOp::Create);
        }
        if let Some((req_id, op)) = self.in_flight.upload.take() {
            self.finish_upload(req_id, op.wait());
            done.push(ServiceOp::Upload);
        }
        if let Some(op) = self.in_flight.load.take() {
            self.finish_load(op.wait());
            done.push(ServiceOp::Load);
        }

        done
    }

    /// Cancels every in-flight call; dropping the handles joins the workers
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = Vec::new();
        if self.in_flight.recommend.take().is_some() {
            cancelled.push(ServiceOp::Recommend);
        }
        if self.in_flight.link.take().is_some() {
            cancelled.push(ServiceOp::Link);
        }
        if self.in_flight.create.take().is_some() {
            cancelled.push(ServiceOp::Create);
        }
        if self.in_flight.upload.take().is_some() {
            cancelled.push(ServiceOp::Upload);
        }
        if self.in_flight.load.take().is_some() {
            cancelled.push(ServiceOp::Load);
        }
        for op in &cancelled {
            self.busy.finish(*op);
            self.notifications.warning(format!("{} cancelled", op));
        }
        cancelled.len()
    }

    fn finish_recommend(&mut self, result: RtmResult<Vec<RecommendationResult>>) {
        self.busy.finish(ServiceOp::Recommend);
        let outcome = result.and_then(|results| self.gap.apply(GapAction::RecommendationsReady(results)));
        match outcome {
            Ok(GapOutcome::Updated { items }) => {
                let stats = self.gap.stats();
                self.dirty = true;
                self.notifications.info(format!(
                    "{} items analyzed: {} auto-accepted, {} need a new requirement",
                    items, stats.accepted, stats.needs_new_requirement
                ));
            }
            Ok(GapOutcome::Linked(_)) => {}
            Err(err) => self.notifications.error(&err),
        }
    }

    fn finish_link(&mut self, result: RtmResult<Vec<(String, LinkTarget)>>) {
        self.busy.finish(ServiceOp::Link);
        let pairs = match result {
            Ok(pairs) => pairs,
            Err(err) => return self.notifications.error(&err),
        };
        match self.gap.apply(GapAction::Linked(pairs.clone())) {
            Ok(GapOutcome::Linked(report)) => {
                self.record_links(&report, &pairs);
                self.report_links(&report);
            }
            Ok(GapOutcome::Updated { .. }) => {}
            Err(err) => self.notifications.error(&err),
        }
    }

    fn finish_create(&mut self, item_id: String, result: RtmResult<Requirement>) {
        self.busy.finish(ServiceOp::Create);
        let requirement = match result {
            Ok(requirement) => requirement,
            Err(err) => return self.notifications.error(&err),
        };

        let target = LinkTarget::from_requirement(&requirement);
        let leaf = NavigationNode::leaf(
            requirement.req_id.clone(),
            requirement.title.clone(),
            LeafDetails {
                requirement_status: Some(requirement.status),
                priority: Some(requirement.priority),
                created_on: Some(chrono::Local::now().date_naive()),
                ..LeafDetails::default()
            },
        );
        if let Err(err) = self.tree.insert(self.navigator.current_folder(), &leaf) {
            return self.notifications.error(&err);
        }
        self.catalog.upsert(requirement);
        self.dirty = true;

        match self.gap.apply(GapAction::RequirementCreated {
            item_id,
            target: target.clone(),
        }) {
            Ok(_) => self
                .notifications
                .success(format!("Created {}: {}", target.req_id, target.title)),
            Err(err) => self.notifications.error(&err),
        }
    }

    fn finish_upload(&mut self, req_id: String, result: RtmResult<KnowledgeDoc>) {
        self.busy.finish(ServiceOp::Upload);
        let doc = match result {
            Ok(doc) => doc,
            Err(err) => return self.notifications.error(&err),
        };
        match self.catalog.get_mut(&req_id) {
            Ok(req) => {
                let message = format!("Uploaded {} to {}", doc.file_name, req_id);
                req.knowledge.push(doc);
                self.dirty = true;
                self.notifications.success(message);
            }
            Err(err) => self.notifications.error(&err),
        }
    }

    fn finish_load(&mut self, result: RtmResult<Requirement>) {
        self.busy.finish(ServiceOp::Load);
        match result {
            Ok(requirement) => {
                self.selected = Some(requirement.req_id);
                self.detail_tab = DetailTab::Overview;
            }
            Err(err) => self.notifications.error(&err),
        }
    }

    fn record_links(&mut self, report: &LinkReport, pairs: &[(String, LinkTarget)]) {
        for (item_id, target) in pairs.iter().filter(|(id, _)| report.linked.contains(id)) {
            let Some(item) = self.gap.get(item_id) else {
                continue;
            };
            let linked = LinkedItem {
                item_id: item.id.clone(),
                title: item.title.clone(),
                kind: item.kind.to_string(),
            };
            match self.catalog.get_mut(&target.req_id) {
                Ok(req) => {
                    if !req.linked_items.iter().any(|l| l.item_id == linked.item_id) {
                        req.linked_items.push(linked);
                    }
                }
                Err(err) => log::warn!("link target vanished: {}", err),
            }
        }
        if !report.linked.is_empty() {
            self.dirty = true;
        }
    }

    fn report_links(&mut self, report: &LinkReport) {
        if !report.linked.is_empty() {
            self.notifications
                .success(format!("Linked {} item(s)", report.linked.len()));
        }
        if !report.already_linked.is_empty() {
            self.notifications.warning(format!(
                "Already linked: {}",
                report.already_linked.join(", ")
            ));
        }
    }

    /// Snapshot of the current state in fixture form
    pub fn to_workspace(&self) -> Workspace {
        Workspace {
            forest: self.tree.to_forest(),
            requirements: self.catalog.all().to_vec(),
            unlinked_items: self.gap.items().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::fixtures::demo_workspace;
    use crate::notify::NotificationLevel;
    use crate::service::ServiceConfig;

    fn store() -> DashboardStore {
        let config = RtmConfig {
            service_delay_ms: 0,
            upload_step_ms: 0,
            ..RtmConfig::default()
        };
        let mut store = DashboardStore::new(demo_workspace(), config).unwrap();
        *store.services_mut() = MockServices::new(ServiceConfig::immediate(), Arc::new(KeywordRecommender));
        store
    }

    #[test]
    fn test_default_expand_level_applied() {
        let store = store();
        assert!(store.table().expansion.is_expanded("PRJ-PAY"));
        assert!(!store.table().expansion.is_expanded("SC-CHK"));
        let rows = store.visible_rows();
        assert_eq!(rows[0].id, "PRJ-PAY");
        assert!(rows.iter().any(|r| r.id == "SC-CHK"));
        assert!(!rows.iter().any(|r| r.id == "PR-CARD"));
    }

    #[test]
    fn test_expand_all_then_collapse() {
        let mut store = store();
        store.expand_all();
        let rows = store.visible_rows();
        assert!(rows.iter().any(|r| r.id == "REQ-005"));
        assert!(rows.iter().any(|r| r.id == "REQ-007"));

        store.collapse_all();
        let ids: Vec<String> = store.visible_rows().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["PRJ-PAY"]);
    }

    #[test]
    fn test_add_folder_and_tags() {
        let mut store = store();
        let id = store.add_folder(Some("SC-ACC"), " Ideas ").unwrap();
        assert_eq!(id, "FLD-002");
        let idx = store.tree().find(&id).unwrap();
        assert_eq!(store.tree().node(idx).name, "Ideas");
        assert_eq!(store.tree().children(idx), Some(&[][..]));
        assert!(store.is_dirty());

        let err = store.add_folder(Some("REQ-004"), "Nope").unwrap_err();
        assert_eq!(err, RtmError::NotAFolder("REQ-004".into()));

        let tags = store.set_tags("REQ-004", &[" auth ", "", "auth", "q3"]).unwrap();
        assert_eq!(tags, vec!["auth".to_string(), "q3".into()]);
        assert_eq!(
            store.set_tags("NOPE", &["x"]).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }

    #[test]
    fn test_activate_leaf_loads_detail() {
        let mut store = store();
        store.reveal("REQ-004").unwrap();
        assert!(store.busy().loading);
        store.wait_all();
        assert!(!store.busy().loading);
        assert_eq!(store.selected_requirement().unwrap().req_id, "REQ-004");
        assert_eq!(store.navigator().depth(), 3);
    }

    #[test]
    fn test_duplicate_request_is_busy() {
        let mut store = store();
        store.request_recommendations(&[]).unwrap();
        assert_eq!(
            store.request_recommendations(&[]).unwrap_err(),
            RtmError::Busy(ServiceOp::Recommend)
        );
        store.wait_all();
        assert!(store.request_recommendations(&[]).is_ok());
    }

    #[test]
    fn test_rejected_link_surfaces_as_toast() {
        let mut store = store();
        store.services_mut().fail_next(ServiceOp::Link, "timeout");
        store
            .request_link(&[("TASK-101".to_string(), "REQ-004".to_string())])
            .unwrap();
        store.wait_all();

        let toast = store.notifications_mut().drain().pop().unwrap();
        assert_eq!(toast.level, NotificationLevel::Error);
        assert_eq!(toast.cause, Some(ErrorKind::Rejected));
        assert!(!store.gap().get("TASK-101").unwrap().is_linked());
        assert!(!store.busy().linking);
    }

    #[test]
    fn test_create_requirement_from_item() {
        let mut store = store();
        store.navigator.reveal(&store.tree, "SC-CHK").unwrap();
        let req_id = store.request_create("ISS-301").unwrap();
        assert_eq!(req_id, "REQ-009");
        store.wait_all();

        let req = store.catalog().require("REQ-009").unwrap();
        assert_eq!(req.linked_items[0].item_id, "ISS-301");
        let item = store.gap().get("ISS-301").unwrap();
        assert_eq!(item.linked_to.as_ref().unwrap().req_id, "REQ-009");
        assert!(item.draft.is_none());

        // the new leaf lands in the current folder
        let path = store.tree().path_to("REQ-009").unwrap();
        assert_eq!(store.tree().node(*path.last().unwrap()).id, "SC-CHK");

        let err = store.request_create("ISS-301").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_create_with_taken_id_leaves_catalog_alone() {
        let mut store = store();
        let req_id = store.request_create("ISS-301").unwrap();
        let squatter = NavigationNode::leaf(req_id.clone(), "Squatter", LeafDetails::default());
        store.tree.insert(None, &squatter).unwrap();
        store.wait_all();

        assert!(store.catalog().get(&req_id).is_none());
        assert!(!store.gap().get("ISS-301").unwrap().is_linked());
        let last = store.notifications().iter().last().unwrap();
        assert_eq!(last.level, NotificationLevel::Error);
    }

    #[test]
    fn test_accept_and_reject_mark_dirty() {
        let mut store = store();
        store.request_recommendations(&[]).unwrap();
        store.wait_all();

        store.mark_saved();
        store.reject("MTG-501").unwrap();
        assert!(store.is_dirty());
        let item = store.gap().get("MTG-501").unwrap();
        assert!(item.recommendation.is_none());
        assert!(!item.is_linked());

        store.mark_saved();
        store.accept("TC-201").unwrap();
        assert!(store.is_dirty());

        store.mark_saved();
        assert!(store.reject("NOPE").is_err());
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_leaf_activation_waits_for_pending_load() {
        let mut store = store();
        let events = store.subscribe();
        store.request_load("REQ-001").unwrap();

        let err = store.reveal("REQ-004").unwrap_err();
        assert_eq!(err, RtmError::Busy(ServiceOp::Load));
        assert!(store.navigator().at_root());
        assert!(events.try_iter().next().is_none());

        // folders still navigate while a load is running
        store.reveal("PR-AUTH").unwrap();
        let leaf = store.tree().find("REQ-004").unwrap();
        assert_eq!(store.activate(leaf).unwrap_err(), RtmError::Busy(ServiceOp::Load));
        assert_eq!(store.navigator().depth(), 3);

        store.wait_all();
        assert_eq!(store.selected_requirement().unwrap().req_id, "REQ-001");
    }

    #[test]
    fn test_upload_attaches_document() {
        let mut store = store();
        store
            .request_upload("REQ-001", "Processor contract", "contract.pdf", 4096)
            .unwrap();
        store.wait_all();
        let req = store.catalog().require("REQ-001").unwrap();
        assert_eq!(req.knowledge.len(), 1);
        assert_eq!(req.knowledge[0].file_name, "contract.pdf");
        assert_eq!(store.upload_progress(), None);
    }

    #[test]
    fn test_cancel_all_clears_busy() {
        let mut store = store();
        *store.services_mut() = MockServices::new(
            ServiceConfig {
                delay: std::time::Duration::from_secs(30),
                ..ServiceConfig::default()
            },
            Arc::new(KeywordRecommender),
        );
        store.request_recommendations(&[]).unwrap();
        store.request_load("REQ-001").unwrap();
        assert_eq!(store.cancel_all(), 2);
        assert!(!store.busy().any());
        assert!(store.poll().is_empty());
    }

    #[test]
    fn test_workspace_snapshot_keeps_edits() {
        let mut store = store();
        store.add_folder(None, "Parking lot").unwrap();
        let ws = store.to_workspace();
        assert_eq!(ws.forest.len(), 2);
        assert_eq!(ws.requirements.len(), 8);
        assert_eq!(ws.unlinked_items.len(), 7);
    }
}
