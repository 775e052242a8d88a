//! Drill-down navigation
//!
//! The sidebar state is the list of folders entered so far. The node list
//! visible at each depth is derived from the tree on demand, so
//! `levels().len() == path().len() + 1` holds by construction.

use serde::{Deserialize, Serialize};
use std::sync::mpsc;

use crate::error::{RtmError, RtmResult};
use crate::models::NodeType;
use crate::tree::{NavTree, NodeIdx};

/// Signals exposed to the page-level container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationEvent {
    /// The entered folder changed; `None` means the root level
    ContextChanged { folder: Option<String> },
    /// A requirement leaf was chosen for the detail view
    NodeSelected { id: String, node_type: NodeType },
}

/// Fans navigation events out to subscribers
#[derive(Debug, Default)]
pub struct ContextBroadcaster {
    subscribers: Vec<mpsc::Sender<NavigationEvent>>,
}

impl ContextBroadcaster {
    /// Registers a new listener
    pub fn subscribe(&mut self) -> mpsc::Receiver<NavigationEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    /// Sends to every live subscriber, dropping the ones that hung up
    pub fn broadcast(&mut self, event: NavigationEvent) {
        log::debug!("navigation event: {:?}", event);
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

/// What to do when an externally supplied path no longer resolves
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BrokenPathPolicy {
    /// Keep the part of the path that still resolves
    #[default]
    Truncate,
    /// Fall back to the root level
    ResetToRoot,
    /// Leave the navigator untouched and return `PathBroken`
    Reject,
}

/// Outcome of an external path rebuild
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// Every step resolved
    Full,
    /// Stopped at `broken_at`, the resolved prefix was kept
    Truncated { broken_at: usize, missing_id: String },
    /// Stopped at `broken_at`, navigation went back to the root
    ResetToRoot { broken_at: usize, missing_id: String },
}

impl PathResolution {
    pub fn is_full(&self) -> bool {
        matches!(self, PathResolution::Full)
    }
}

/// Result of activating a node in the sidebar or table
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// A folder was entered
    Entered(NodeIdx),
    /// A leaf was opened for the detail view
    Opened(NodeIdx),
}

/// One breadcrumb entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub id: String,
    pub name: String,
    /// Depth the navigator returns to when this crumb is clicked
    pub depth: usize,
}

/// Sidebar drill-down state machine
#[derive(Debug, Default)]
pub struct DrillNavigator {
    path: Vec<NodeIdx>,
    policy: BrokenPathPolicy,
    broadcaster: ContextBroadcaster,
}

impl DrillNavigator {
    pub fn new(policy: BrokenPathPolicy) -> Self {
        Self {
            path: Vec::new(),
            policy,
            broadcaster: ContextBroadcaster::default(),
        }
    }

    pub fn policy(&self) -> BrokenPathPolicy {
        self.policy
    }

    pub fn set_policy(&mut self, policy: BrokenPathPolicy) {
        self.policy = policy;
    }

    /// Registers a listener for context and selection events
    pub fn subscribe(&mut self) -> mpsc::Receiver<NavigationEvent> {
        self.broadcaster.subscribe()
    }

    /// Folders entered so far, outermost first
    pub fn path(&self) -> &[NodeIdx] {
        &self.path
    }

    pub fn depth(&self) -> usize {
        self.path.len()
    }

    pub fn at_root(&self) -> bool {
        self.path.is_empty()
    }

    /// The folder whose children are visible, `None` at the root
    pub fn current_folder(&self) -> Option<NodeIdx> {
        self.path.last().copied()
    }

    /// Node list visible at each depth, root level first
    pub fn levels<'t>(&self, tree: &'t NavTree) -> Vec<&'t [NodeIdx]> {
        std::iter::once(tree.roots())
            .chain(
                self.path
                    .iter()
                    .map(|idx| tree.children(*idx).unwrap_or(&[])),
            )
            .collect()
    }

    /// Node list at the current depth
    pub fn visible<'t>(&self, tree: &'t NavTree) -> &'t [NodeIdx] {
        match self.current_folder() {
            Some(idx) => tree.children(idx).unwrap_or(&[]),
            None => tree.roots(),
        }
    }

    pub fn breadcrumb(&self, tree: &NavTree) -> Vec<Crumb> {
        self.path
            .iter()
            .enumerate()
            .map(|(i, idx)| {
                let slot = tree.node(*idx);
                Crumb {
                    id: slot.id.clone(),
                    name: slot.name.clone(),
                    depth: i + 1,
                }
            })
            .collect()
    }

    /// Enters a folder
    pub fn drill_in(&mut self, tree: &NavTree, idx: NodeIdx) -> RtmResult<()> {
        if !tree.is_folder(idx) {
            return Err(RtmError::NotAFolder(tree.node(idx).id.clone()));
        }
        self.path.push(idx);
        log::debug!("drill in: {} (depth {})", tree.node(idx).id, self.path.len());
        self.announce(tree);
        Ok(())
    }

    /// Leaves the current folder; `None` when already at the root
    pub fn drill_back(&mut self, tree: &NavTree) -> Option<Option<NodeIdx>> {
        self.path.pop()?;
        log::debug!("drill back to depth {}", self.path.len());
        self.announce(tree);
        Some(self.current_folder())
    }

    /// Pops back to `depth` entered folders in one step (breadcrumb click)
    ///
    /// Returns `false` without an event when nothing changes.
    pub fn jump_to_depth(&mut self, tree: &NavTree, depth: usize) -> bool {
        if depth >= self.path.len() {
            return false;
        }
        self.path.truncate(depth);
        self.announce(tree);
        true
    }

    /// Collapses to the root level
    pub fn reset(&mut self, tree: &NavTree) {
        if !self.path.is_empty() {
            self.path.clear();
            self.announce(tree);
        }
    }

    /// Rebuilds the path from ids supplied by an external finder
    ///
    /// Each id must name a folder among the nodes visible after the previous
    /// step. An empty list resets to the root. How a broken link is handled
    /// depends on the configured [`BrokenPathPolicy`].
    pub fn set_external_path<S: AsRef<str>>(
        &mut self,
        tree: &NavTree,
        ids: &[S],
    ) -> RtmResult<PathResolution> {
        let mut rebuilt = Vec::with_capacity(ids.len());
        let mut broken = None;
        let mut level = tree.roots();

        for (depth, id) in ids.iter().enumerate() {
            let id = id.as_ref();
            let step = level
                .iter()
                .copied()
                .find(|idx| tree.node(*idx).id == id)
                .and_then(|idx| tree.children(idx).map(|children| (idx, children)));
            match step {
                Some((idx, children)) => {
                    rebuilt.push(idx);
                    level = children;
                }
                None => {
                    broken = Some((depth, id.to_string()));
                    break;
                }
            }
        }

        let resolution = match broken {
            None => PathResolution::Full,
            Some((broken_at, missing_id)) => {
                log::warn!(
                    "external path broken at depth {}: '{}' ({:?})",
                    broken_at,
                    missing_id,
                    self.policy
                );
                match self.policy {
                    BrokenPathPolicy::Truncate => PathResolution::Truncated {
                        broken_at,
                        missing_id,
                    },
                    BrokenPathPolicy::ResetToRoot => {
                        rebuilt.clear();
                        PathResolution::ResetToRoot {
                            broken_at,
                            missing_id,
                        }
                    }
                    BrokenPathPolicy::Reject => {
                        return Err(RtmError::PathBroken {
                            depth: broken_at,
                            missing_id,
                        })
                    }
                }
            }
        };

        let changed = rebuilt != self.path;
        self.path = rebuilt;
        if changed {
            self.announce(tree);
        }
        Ok(resolution)
    }

    /// Navigates to any node by id (finder selection)
    ///
    /// A folder becomes the current context. A leaf makes its parent the
    /// current context and is announced as selected.
    pub fn reveal(&mut self, tree: &NavTree, id: &str) -> RtmResult<Activation> {
        let idx = tree.require(id)?;
        let mut path = tree
            .path_to(id)
            .ok_or_else(|| RtmError::NodeNotFound(id.to_string()))?;
        if tree.is_folder(idx) {
            path.push(idx);
        }

        if path != self.path {
            self.path = path;
            self.announce(tree);
        }

        if tree.is_folder(idx) {
            Ok(Activation::Entered(idx))
        } else {
            self.select(tree, idx);
            Ok(Activation::Opened(idx))
        }
    }

    /// Handles a click on a visible node: folders are entered, leaves opened
    pub fn activate(&mut self, tree: &NavTree, idx: NodeIdx) -> RtmResult<Activation> {
        if tree.is_folder(idx) {
            self.drill_in(tree, idx)?;
            Ok(Activation::Entered(idx))
        } else {
            self.select(tree, idx);
            Ok(Activation::Opened(idx))
        }
    }

    fn select(&mut self, tree: &NavTree, idx: NodeIdx) {
        let slot = tree.node(idx);
        self.broadcaster.broadcast(NavigationEvent::NodeSelected {
            id: slot.id.clone(),
            node_type: slot.node_type,
        });
    }

    fn announce(&mut self, tree: &NavTree) {
        let folder = self.current_folder().map(|idx| tree.node(idx).id.clone());
        self.broadcaster
            .broadcast(NavigationEvent::ContextChanged { folder });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeafDetails, NavigationNode};

    fn scenario_tree() -> NavTree {
        let forest = vec![
            NavigationNode::folder(
                "SC-A",
                "ScopeA",
                NodeType::Scope,
                vec![
                    NavigationNode::folder(
                        "PR-B",
                        "ProcessB",
                        NodeType::Process,
                        vec![
                            NavigationNode::leaf("REQ-1", "Req1", LeafDetails::default()),
                            NavigationNode::leaf("REQ-2", "Req2", LeafDetails::default()),
                        ],
                    ),
                    NavigationNode::folder("PR-C", "ProcessC", NodeType::Process, Vec::new()),
                ],
            ),
            NavigationNode::leaf("REQ-9", "Loose", LeafDetails::default()),
        ];
        NavTree::from_forest(&forest).unwrap()
    }

    fn ids(tree: &NavTree, list: &[NodeIdx]) -> Vec<String> {
        list.iter().map(|i| tree.node(*i).id.clone()).collect()
    }

    #[test]
    fn test_initial_state_is_root() {
        let tree = scenario_tree();
        let nav = DrillNavigator::default();
        assert!(nav.at_root());
        assert_eq!(nav.levels(&tree).len(), 1);
        assert_eq!(ids(&tree, nav.visible(&tree)), vec!["SC-A", "REQ-9"]);
    }

    #[test]
    fn test_drill_into_scope_then_process() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let rx = nav.subscribe();

        nav.drill_in(&tree, tree.find("SC-A").unwrap()).unwrap();
        assert_eq!(nav.levels(&tree).len(), 2);
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A"]);

        nav.drill_in(&tree, tree.find("PR-B").unwrap()).unwrap();
        assert_eq!(nav.levels(&tree).len(), 3);
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A", "PR-B"]);
        assert_eq!(ids(&tree, nav.visible(&tree)), vec!["REQ-1", "REQ-2"]);

        let events: Vec<NavigationEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                NavigationEvent::ContextChanged {
                    folder: Some("SC-A".into())
                },
                NavigationEvent::ContextChanged {
                    folder: Some("PR-B".into())
                },
            ]
        );
    }

    #[test]
    fn test_drill_in_then_back_is_identity() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.drill_in(&tree, tree.find("SC-A").unwrap()).unwrap();

        let path_before = nav.path().to_vec();
        let levels_before: Vec<Vec<NodeIdx>> =
            nav.levels(&tree).iter().map(|l| l.to_vec()).collect();

        for folder in ["PR-B", "PR-C"] {
            nav.drill_in(&tree, tree.find(folder).unwrap()).unwrap();
            nav.drill_back(&tree).unwrap();
            let levels_after: Vec<Vec<NodeIdx>> =
                nav.levels(&tree).iter().map(|l| l.to_vec()).collect();
            assert_eq!(nav.path(), &path_before[..]);
            assert_eq!(levels_after, levels_before);
        }
    }

    #[test]
    fn test_drill_into_leaf_is_rejected() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let err = nav.drill_in(&tree, tree.find("REQ-9").unwrap()).unwrap_err();
        assert_eq!(err, RtmError::NotAFolder("REQ-9".into()));
        assert!(nav.at_root());
    }

    #[test]
    fn test_drill_back_at_root_is_noop() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let rx = nav.subscribe();
        assert_eq!(nav.drill_back(&tree), None);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_drill_back_announces_parent_or_root() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.drill_in(&tree, tree.find("SC-A").unwrap()).unwrap();
        nav.drill_in(&tree, tree.find("PR-B").unwrap()).unwrap();
        let rx = nav.subscribe();

        assert_eq!(nav.drill_back(&tree), Some(tree.find("SC-A")));
        assert_eq!(nav.drill_back(&tree), Some(None));
        let events: Vec<NavigationEvent> = rx.try_iter().collect();
        assert_eq!(
            events,
            vec![
                NavigationEvent::ContextChanged {
                    folder: Some("SC-A".into())
                },
                NavigationEvent::ContextChanged { folder: None },
            ]
        );
    }

    #[test]
    fn test_empty_folder_can_be_entered() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.set_external_path(&tree, &["SC-A", "PR-C"]).unwrap();
        assert_eq!(nav.depth(), 2);
        assert!(nav.visible(&tree).is_empty());
    }

    #[test]
    fn test_external_path_full_then_reset_matches_initial() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let fresh = DrillNavigator::default();

        let resolution = nav.set_external_path(&tree, &["SC-A", "PR-B"]).unwrap();
        assert!(resolution.is_full());
        assert_eq!(nav.levels(&tree).len(), 3);

        let empty: [&str; 0] = [];
        nav.set_external_path(&tree, &empty).unwrap();
        assert_eq!(nav.path(), fresh.path());
        assert_eq!(nav.levels(&tree), fresh.levels(&tree));
    }

    #[test]
    fn test_external_path_truncates_on_broken_link() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::new(BrokenPathPolicy::Truncate);
        let resolution = nav
            .set_external_path(&tree, &["SC-A", "GONE", "PR-B"])
            .unwrap();
        assert_eq!(
            resolution,
            PathResolution::Truncated {
                broken_at: 1,
                missing_id: "GONE".into()
            }
        );
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A"]);
        assert_eq!(nav.levels(&tree).len(), nav.path().len() + 1);
    }

    #[test]
    fn test_external_path_through_leaf_is_broken() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::new(BrokenPathPolicy::Truncate);
        let resolution = nav.set_external_path(&tree, &["REQ-9"]).unwrap();
        assert!(!resolution.is_full());
        assert!(nav.at_root());
    }

    #[test]
    fn test_external_path_skipping_a_level_is_broken() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::new(BrokenPathPolicy::Truncate);
        let resolution = nav.set_external_path(&tree, &["PR-B"]).unwrap();
        assert_eq!(
            resolution,
            PathResolution::Truncated {
                broken_at: 0,
                missing_id: "PR-B".into()
            }
        );
    }

    #[test]
    fn test_external_path_reset_policy() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::new(BrokenPathPolicy::ResetToRoot);
        nav.set_external_path(&tree, &["SC-A"]).unwrap();
        let resolution = nav.set_external_path(&tree, &["SC-A", "GONE"]).unwrap();
        assert!(matches!(resolution, PathResolution::ResetToRoot { broken_at: 1, .. }));
        assert!(nav.at_root());
    }

    #[test]
    fn test_external_path_reject_policy_keeps_state() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::new(BrokenPathPolicy::Reject);
        nav.set_external_path(&tree, &["SC-A"]).unwrap();
        let err = nav.set_external_path(&tree, &["SC-A", "GONE"]).unwrap_err();
        assert_eq!(
            err,
            RtmError::PathBroken {
                depth: 1,
                missing_id: "GONE".into()
            }
        );
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A"]);
    }

    #[test]
    fn test_jump_to_depth_pops_several_levels() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.set_external_path(&tree, &["SC-A", "PR-B"]).unwrap();
        let rx = nav.subscribe();

        assert!(nav.jump_to_depth(&tree, 0));
        assert!(nav.at_root());
        assert!(!nav.jump_to_depth(&tree, 0));
        assert_eq!(rx.try_iter().count(), 1);
    }

    #[test]
    fn test_breadcrumb_depths() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.set_external_path(&tree, &["SC-A", "PR-B"]).unwrap();
        let crumbs = nav.breadcrumb(&tree);
        assert_eq!(crumbs.len(), 2);
        assert_eq!(crumbs[0].name, "ScopeA");
        assert_eq!(crumbs[0].depth, 1);
        assert_eq!(crumbs[1].id, "PR-B");
    }

    #[test]
    fn test_reveal_leaf_enters_parent_and_selects() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let rx = nav.subscribe();

        let activation = nav.reveal(&tree, "REQ-2").unwrap();
        assert_eq!(activation, Activation::Opened(tree.find("REQ-2").unwrap()));
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A", "PR-B"]);

        let events: Vec<NavigationEvent> = rx.try_iter().collect();
        assert_eq!(
            events.last(),
            Some(&NavigationEvent::NodeSelected {
                id: "REQ-2".into(),
                node_type: NodeType::Requirement
            })
        );
    }

    #[test]
    fn test_reveal_folder_enters_it() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        nav.reveal(&tree, "PR-B").unwrap();
        assert_eq!(ids(&tree, nav.path()), vec!["SC-A", "PR-B"]);
        assert!(matches!(
            nav.reveal(&tree, "nope"),
            Err(RtmError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_activate_routes_by_kind() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let leaf = tree.find("REQ-9").unwrap();
        assert_eq!(nav.activate(&tree, leaf).unwrap(), Activation::Opened(leaf));
        assert!(nav.at_root());

        let folder = tree.find("SC-A").unwrap();
        assert_eq!(nav.activate(&tree, folder).unwrap(), Activation::Entered(folder));
        assert_eq!(nav.depth(), 1);
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let tree = scenario_tree();
        let mut nav = DrillNavigator::default();
        let rx = nav.subscribe();
        drop(rx);
        nav.drill_in(&tree, tree.find("SC-A").unwrap()).unwrap();
        assert_eq!(nav.broadcaster.subscriber_count(), 0);
    }
}
