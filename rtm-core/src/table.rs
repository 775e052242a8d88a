//! Tree-table view model
//!
//! Flattens a slice of the navigation tree into display rows, honouring an
//! externally owned expansion map, per-column filters and sibling sorting.
//! Column widths are tracked here as well so every front end resizes the
//! same way.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;

use crate::models::Priority;
use crate::tree::{NavTree, NodeIdx, NodeSlot};

/// Fallback minimum column width
pub const DEFAULT_MIN_COLUMN_WIDTH: f32 = 40.0;

/// Table columns
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKey {
    ReqId,
    Title,
    Type,
    Priority,
    Status,
    CreatedBy,
    CreatedOn,
    Phase,
    Coverage,
    /// A column this model knows nothing about; filters on it are ignored
    Other(String),
}

impl ColumnKey {
    /// Default column set, in display order
    pub fn defaults() -> Vec<ColumnKey> {
        vec![
            ColumnKey::ReqId,
            ColumnKey::Title,
            ColumnKey::Type,
            ColumnKey::Priority,
            ColumnKey::Status,
            ColumnKey::CreatedBy,
            ColumnKey::CreatedOn,
            ColumnKey::Phase,
            ColumnKey::Coverage,
        ]
    }

    /// Parses a column name as typed on the command line or in a header
    pub fn parse(s: &str) -> ColumnKey {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "req_id" | "reqid" | "id" => ColumnKey::ReqId,
            "title" | "name" => ColumnKey::Title,
            "type" => ColumnKey::Type,
            "priority" => ColumnKey::Priority,
            "status" => ColumnKey::Status,
            "created_by" | "owner" => ColumnKey::CreatedBy,
            "created_on" | "created" => ColumnKey::CreatedOn,
            "phase" => ColumnKey::Phase,
            "coverage" => ColumnKey::Coverage,
            _ => ColumnKey::Other(s.to_string()),
        }
    }

    fn default_width(&self) -> f32 {
        match self {
            ColumnKey::ReqId => 110.0,
            ColumnKey::Title => 280.0,
            ColumnKey::Type => 110.0,
            ColumnKey::Priority | ColumnKey::Status => 100.0,
            ColumnKey::CreatedBy | ColumnKey::CreatedOn => 120.0,
            ColumnKey::Phase | ColumnKey::Coverage => 90.0,
            ColumnKey::Other(_) => 100.0,
        }
    }
}

impl fmt::Display for ColumnKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnKey::ReqId => write!(f, "Req ID"),
            ColumnKey::Title => write!(f, "Title"),
            ColumnKey::Type => write!(f, "Type"),
            ColumnKey::Priority => write!(f, "Priority"),
            ColumnKey::Status => write!(f, "Status"),
            ColumnKey::CreatedBy => write!(f, "Created By"),
            ColumnKey::CreatedOn => write!(f, "Created On"),
            ColumnKey::Phase => write!(f, "Phase"),
            ColumnKey::Coverage => write!(f, "Coverage"),
            ColumnKey::Other(name) => write!(f, "{}", name),
        }
    }
}

/// Expanded/collapsed state keyed by node id
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpansionState {
    expanded: HashMap<String, bool>,
}

impl ExpansionState {
    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.get(id).copied().unwrap_or(false)
    }

    pub fn set(&mut self, id: &str, expanded: bool) {
        self.expanded.insert(id.to_string(), expanded);
    }

    /// Flips a node and returns its new state
    pub fn toggle(&mut self, id: &str) -> bool {
        let next = !self.is_expanded(id);
        self.set(id, next);
        next
    }

    pub fn collapse_all(&mut self) {
        self.expanded.clear();
    }

    /// Expands every folder below `roots`
    pub fn expand_all(&mut self, tree: &NavTree, roots: &[NodeIdx]) {
        self.expand_to_level(tree, roots, usize::MAX);
    }

    /// Expands folders shallower than `level` and collapses the rest
    ///
    /// The map is rebuilt from scratch, so repeated calls with the same
    /// arguments produce the same state.
    pub fn expand_to_level(&mut self, tree: &NavTree, roots: &[NodeIdx], level: usize) {
        self.expanded.clear();
        for root in roots {
            self.mark(tree, *root, 0, level);
        }
    }

    fn mark(&mut self, tree: &NavTree, idx: NodeIdx, depth: usize, level: usize) {
        if let Some(children) = tree.children(idx) {
            self.expanded
                .insert(tree.node(idx).id.clone(), depth < level);
            for child in children {
                self.mark(tree, *child, depth + 1, level);
            }
        }
    }

    /// Ids currently expanded, sorted
    pub fn expanded_ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self
            .expanded
            .iter()
            .filter(|(_, open)| **open)
            .map(|(id, _)| id.as_str())
            .collect();
        ids.sort_unstable();
        ids
    }
}

/// Case-insensitive substring filter on one column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnFilter {
    pub column: ColumnKey,
    pub needle: String,
}

impl ColumnFilter {
    pub fn new(column: ColumnKey, needle: impl Into<String>) -> Self {
        Self {
            column,
            needle: needle.into(),
        }
    }

    /// Parses `column=value`
    pub fn parse(spec: &str) -> Option<Self> {
        let (column, needle) = spec.split_once('=')?;
        Some(Self::new(ColumnKey::parse(column), needle.trim()))
    }

    /// Whether this filter can narrow the rows at all
    pub fn is_active(&self) -> bool {
        !self.needle.is_empty()
            && matches!(
                self.column,
                ColumnKey::ReqId
                    | ColumnKey::Title
                    | ColumnKey::Type
                    | ColumnKey::Priority
                    | ColumnKey::Status
            )
    }

    /// Whether a leaf passes this filter
    ///
    /// Columns without a filterable value let every row through.
    pub fn matches(&self, slot: &NodeSlot) -> bool {
        if self.needle.is_empty() {
            return true;
        }
        match filter_value(slot, &self.column) {
            Some(value) => value
                .to_lowercase()
                .contains(&self.needle.to_lowercase()),
            None => true,
        }
    }
}

/// Value a filter compares against, `None` for unsupported columns
fn filter_value(slot: &NodeSlot, column: &ColumnKey) -> Option<String> {
    let details = slot.details();
    match column {
        ColumnKey::ReqId => Some(slot.id.clone()),
        ColumnKey::Title => {
            let owner = details
                .and_then(|d| d.created_by.as_deref())
                .unwrap_or("");
            Some(format!("{} {}", slot.name, owner))
        }
        ColumnKey::Type => Some(slot.node_type.to_string()),
        ColumnKey::Priority => Some(
            details
                .and_then(|d| d.priority)
                .map(|p| p.to_string())
                .unwrap_or_default(),
        ),
        ColumnKey::Status => Some(
            details
                .and_then(|d| d.requirement_status)
                .map(|s| s.to_string())
                .unwrap_or_default(),
        ),
        _ => None,
    }
}

/// Display text of one cell of a leaf row
pub fn cell_text(slot: &NodeSlot, column: &ColumnKey) -> String {
    let details = slot.details();
    match column {
        ColumnKey::ReqId => slot.id.clone(),
        ColumnKey::Title => slot.name.clone(),
        ColumnKey::Type => slot.node_type.to_string(),
        ColumnKey::Priority => details
            .and_then(|d| d.priority)
            .map(|p| p.to_string())
            .unwrap_or_default(),
        ColumnKey::Status => details
            .and_then(|d| d.requirement_status)
            .map(|s| s.to_string())
            .unwrap_or_default(),
        ColumnKey::CreatedBy => details
            .and_then(|d| d.created_by.clone())
            .unwrap_or_default(),
        ColumnKey::CreatedOn => details
            .and_then(|d| d.created_on)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        ColumnKey::Phase => details.and_then(|d| d.phase.clone()).unwrap_or_default(),
        ColumnKey::Coverage => details
            .and_then(|d| d.coverage)
            .map(|c| format!("{}%", c))
            .unwrap_or_default(),
        ColumnKey::Other(_) => String::new(),
    }
}

/// Sibling ordering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec {
    pub column: ColumnKey,
    pub descending: bool,
}

impl SortSpec {
    /// Parses `column` or `column:desc`
    pub fn parse(spec: &str) -> Self {
        match spec.rsplit_once(':') {
            Some((column, dir)) if dir.eq_ignore_ascii_case("desc") => Self {
                column: ColumnKey::parse(column),
                descending: true,
            },
            Some((column, dir)) if dir.eq_ignore_ascii_case("asc") => Self {
                column: ColumnKey::parse(column),
                descending: false,
            },
            _ => Self {
                column: ColumnKey::parse(spec),
                descending: false,
            },
        }
    }

    /// Folders come first ordered by name, then leaves by the sort column
    fn compare(&self, a: &NodeSlot, b: &NodeSlot) -> Ordering {
        let ordering = match (a.details(), b.details()) {
            (None, None) => a.name.to_lowercase().cmp(&b.name.to_lowercase()),
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(da), Some(db)) => match &self.column {
                ColumnKey::Priority => {
                    let rank = |p: Option<Priority>| p.map(|p| p.rank()).unwrap_or(u8::MAX);
                    rank(da.priority).cmp(&rank(db.priority))
                }
                ColumnKey::Coverage => da.coverage.cmp(&db.coverage),
                ColumnKey::CreatedOn => da.created_on.cmp(&db.created_on),
                column => cell_text(a, column)
                    .to_lowercase()
                    .cmp(&cell_text(b, column).to_lowercase()),
            },
        };
        if self.descending {
            ordering.reverse()
        } else {
            ordering
        }
    }
}

/// Per-column widths with a shared minimum
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnLayout {
    widths: HashMap<ColumnKey, f32>,
    min_width: f32,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_COLUMN_WIDTH)
    }
}

impl ColumnLayout {
    pub fn new(min_width: f32) -> Self {
        Self {
            widths: HashMap::new(),
            min_width,
        }
    }

    pub fn min_width(&self) -> f32 {
        self.min_width
    }

    pub fn width(&self, column: &ColumnKey) -> f32 {
        self.widths
            .get(column)
            .copied()
            .unwrap_or_else(|| column.default_width().max(self.min_width))
    }

    /// Sets one column's width, clamped to the minimum; returns the applied width
    pub fn resize(&mut self, column: &ColumnKey, width: f32) -> f32 {
        let applied = if width.is_finite() {
            width.max(self.min_width)
        } else {
            self.min_width
        };
        self.widths.insert(column.clone(), applied);
        applied
    }

    pub fn reset(&mut self) {
        self.widths.clear();
    }
}

/// Kind-specific part of a row
#[derive(Debug, Clone, PartialEq)]
pub enum RowKind {
    /// Toggle affordance, no data cells
    Folder { expanded: bool, child_count: usize },
    /// Clickable requirement with one cell per table column
    Leaf { cells: Vec<String> },
}

/// One flattened table row
#[derive(Debug, Clone, PartialEq)]
pub struct RowView {
    pub idx: NodeIdx,
    pub id: String,
    pub name: String,
    pub depth: usize,
    pub kind: RowKind,
}

impl RowView {
    pub fn is_folder(&self) -> bool {
        matches!(self.kind, RowKind::Folder { .. })
    }
}

/// Table state owned by the dashboard
#[derive(Debug, Clone)]
pub struct TableModel {
    pub columns: Vec<ColumnKey>,
    pub filters: Vec<ColumnFilter>,
    pub sort: Option<SortSpec>,
    pub expansion: ExpansionState,
    pub layout: ColumnLayout,
}

impl Default for TableModel {
    fn default() -> Self {
        Self::new(DEFAULT_MIN_COLUMN_WIDTH)
    }
}

impl TableModel {
    pub fn new(min_column_width: f32) -> Self {
        Self {
            columns: ColumnKey::defaults(),
            filters: Vec::new(),
            sort: None,
            expansion: ExpansionState::default(),
            layout: ColumnLayout::new(min_column_width),
        }
    }

    /// Replaces the filter on `column`; an empty needle removes it
    pub fn set_filter(&mut self, column: ColumnKey, needle: &str) {
        self.filters.retain(|f| f.column != column);
        if !needle.is_empty() {
            self.filters.push(ColumnFilter::new(column, needle));
        }
    }

    pub fn filter_for(&self, column: &ColumnKey) -> Option<&str> {
        self.filters
            .iter()
            .find(|f| &f.column == column)
            .map(|f| f.needle.as_str())
    }

    pub fn clear_filters(&mut self) {
        self.filters.clear();
    }

    fn leaf_matches(&self, slot: &NodeSlot) -> bool {
        self.filters
            .iter()
            .filter(|f| f.is_active())
            .all(|f| f.matches(slot))
    }

    fn is_shown(&self, tree: &NavTree, idx: NodeIdx) -> bool {
        if !self.filters.iter().any(|f| f.is_active()) {
            return true;
        }
        tree.any_leaf(idx, &|slot| self.leaf_matches(slot))
    }

    /// Flattens `roots` into display rows
    pub fn rows(&self, tree: &NavTree, roots: &[NodeIdx]) -> Vec<RowView> {
        let mut rows = Vec::new();
        self.push_rows(tree, roots, 0, &mut rows);
        rows
    }

    fn push_rows(&self, tree: &NavTree, level: &[NodeIdx], depth: usize, rows: &mut Vec<RowView>) {
        let mut siblings: Vec<NodeIdx> = level
            .iter()
            .copied()
            .filter(|idx| self.is_shown(tree, *idx))
            .collect();
        if let Some(sort) = &self.sort {
            siblings.sort_by(|a, b| sort.compare(tree.node(*a), tree.node(*b)));
        }

        for idx in siblings {
            let slot = tree.node(idx);
            match tree.children(idx) {
                Some(children) => {
                    let expanded = self.expansion.is_expanded(&slot.id);
                    rows.push(RowView {
                        idx,
                        id: slot.id.clone(),
                        name: slot.name.clone(),
                        depth,
                        kind: RowKind::Folder {
                            expanded,
                            child_count: children.len(),
                        },
                    });
                    if expanded {
                        self.push_rows(tree, children, depth + 1, rows);
                    }
                }
                None => rows.push(RowView {
                    idx,
                    id: slot.id.clone(),
                    name: slot.name.clone(),
                    depth,
                    kind: RowKind::Leaf {
                        cells: self.columns.iter().map(|c| cell_text(slot, c)).collect(),
                    },
                }),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeafDetails, NavigationNode, NodeType, Priority, RequirementStatus};

    fn leaf(id: &str, name: &str, priority: Priority, owner: &str) -> NavigationNode {
        NavigationNode::leaf(
            id,
            name,
            LeafDetails {
                requirement_status: Some(RequirementStatus::Approved),
                priority: Some(priority),
                created_by: Some(owner.to_string()),
                ..LeafDetails::default()
            },
        )
    }

    fn sample_tree() -> NavTree {
        let forest = vec![
            NavigationNode::folder(
                "SC-A",
                "Scope A",
                NodeType::Scope,
                vec![NavigationNode::folder(
                    "PR-B",
                    "Process B",
                    NodeType::Process,
                    vec![
                        leaf("REQ-007", "Card checkout", Priority::High, "Dana"),
                        leaf("TASK-007", "Wire gateway", Priority::Low, "Lee"),
                    ],
                )],
            ),
            NavigationNode::folder("F-E", "Empty", NodeType::Folder, Vec::new()),
            leaf("REQ-010", "Audit log", Priority::Critical, "Sam"),
        ];
        NavTree::from_forest(&forest).unwrap()
    }

    fn row_ids(rows: &[RowView]) -> Vec<&str> {
        rows.iter().map(|r| r.id.as_str()).collect()
    }

    #[test]
    fn test_collapsed_by_default() {
        let tree = sample_tree();
        let model = TableModel::default();
        let rows = model.rows(&tree, tree.roots());
        assert_eq!(row_ids(&rows), vec!["SC-A", "F-E", "REQ-010"]);
        assert!(rows[0].is_folder());
        assert!(!rows[2].is_folder());
    }

    #[test]
    fn test_expand_to_level_is_idempotent() {
        let tree = sample_tree();
        let mut once = ExpansionState::default();
        once.expand_to_level(&tree, tree.roots(), 1);
        let mut twice = once.clone();
        twice.expand_to_level(&tree, tree.roots(), 1);
        assert_eq!(once, twice);
        assert_eq!(once.expanded_ids(), vec!["F-E", "SC-A"]);
        assert!(!once.is_expanded("PR-B"));
    }

    #[test]
    fn test_expand_to_level_overrides_manual_toggles() {
        let tree = sample_tree();
        let mut state = ExpansionState::default();
        state.toggle("PR-B");
        state.expand_to_level(&tree, tree.roots(), 1);
        assert!(!state.is_expanded("PR-B"));
    }

    #[test]
    fn test_expanded_rows_have_depth() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.expansion.expand_all(&tree, tree.roots());
        let rows = model.rows(&tree, tree.roots());
        assert_eq!(
            row_ids(&rows),
            vec!["SC-A", "PR-B", "REQ-007", "TASK-007", "F-E", "REQ-010"]
        );
        assert_eq!(rows[2].depth, 2);
        match &rows[1].kind {
            RowKind::Folder { expanded, child_count } => {
                assert!(*expanded);
                assert_eq!(*child_count, 2);
            }
            RowKind::Leaf { .. } => panic!("Expected folder row"),
        }
    }

    #[test]
    fn test_req_id_filter_is_case_insensitive_substring() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.expansion.expand_all(&tree, tree.roots());
        model.set_filter(ColumnKey::ReqId, "req-00");
        let rows = model.rows(&tree, tree.roots());
        let ids = row_ids(&rows);
        assert!(ids.contains(&"REQ-007"));
        assert!(!ids.contains(&"TASK-007"));
        assert!(!ids.contains(&"REQ-010"));
        // ancestors of a match stay visible, empty folders do not
        assert!(ids.contains(&"SC-A"));
        assert!(!ids.contains(&"F-E"));
    }

    #[test]
    fn test_title_filter_matches_owner() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.expansion.expand_all(&tree, tree.roots());
        model.set_filter(ColumnKey::Title, "dana");
        let rows = model.rows(&tree, tree.roots());
        let leaves: Vec<&str> = rows
            .iter()
            .filter(|r| !r.is_folder())
            .map(|r| r.id.as_str())
            .collect();
        assert_eq!(leaves, vec!["REQ-007"]);
    }

    #[test]
    fn test_unknown_column_filter_is_ignored() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        let unfiltered = model.rows(&tree, tree.roots());
        model.set_filter(ColumnKey::Other("Sprint".into()), "42");
        model.set_filter(ColumnKey::Phase, "design");
        let rows = model.rows(&tree, tree.roots());
        assert_eq!(rows, unfiltered);
        assert!(row_ids(&rows).contains(&"F-E"));
    }

    #[test]
    fn test_sort_mixed_siblings_is_total() {
        let forest = vec![
            leaf("LOW", "Low item", Priority::Low, "Sam"),
            NavigationNode::folder("F-M", "m", NodeType::Folder, Vec::new()),
            leaf("MED", "Medium item", Priority::Medium, "Sam"),
            NavigationNode::folder("F-A", "a", NodeType::Folder, Vec::new()),
        ];
        let tree = NavTree::from_forest(&forest).unwrap();
        let slots: Vec<&NodeSlot> = tree.roots().iter().map(|idx| tree.node(*idx)).collect();

        for descending in [false, true] {
            let spec = SortSpec {
                column: ColumnKey::Priority,
                descending,
            };
            for a in &slots {
                for b in &slots {
                    for c in &slots {
                        if spec.compare(a, b) == Ordering::Less
                            && spec.compare(b, c) == Ordering::Less
                        {
                            assert_eq!(spec.compare(a, c), Ordering::Less);
                        }
                    }
                    assert_eq!(spec.compare(a, b), spec.compare(b, a).reverse());
                }
            }
        }

        let mut model = TableModel::default();
        model.sort = Some(SortSpec::parse("priority"));
        let rows = model.rows(&tree, tree.roots());
        assert_eq!(row_ids(&rows), vec!["F-A", "F-M", "MED", "LOW"]);
    }

    #[test]
    fn test_set_filter_replaces_and_clears() {
        let mut model = TableModel::default();
        model.set_filter(ColumnKey::Priority, "high");
        model.set_filter(ColumnKey::Priority, "low");
        assert_eq!(model.filters.len(), 1);
        assert_eq!(model.filter_for(&ColumnKey::Priority), Some("low"));
        model.set_filter(ColumnKey::Priority, "");
        assert!(model.filters.is_empty());
    }

    #[test]
    fn test_sort_by_priority_descending_and_ascending() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.expansion.expand_all(&tree, tree.roots());
        model.sort = Some(SortSpec::parse("priority"));
        let pr_b = tree.find("PR-B").unwrap();
        let rows = model.rows(&tree, tree.children(pr_b).unwrap());
        assert_eq!(row_ids(&rows), vec!["REQ-007", "TASK-007"]);

        model.sort = Some(SortSpec::parse("priority:desc"));
        let rows = model.rows(&tree, tree.children(pr_b).unwrap());
        assert_eq!(row_ids(&rows), vec!["TASK-007", "REQ-007"]);
    }

    #[test]
    fn test_folder_rows_match_tree_folders() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.expansion.expand_all(&tree, tree.roots());
        for row in model.rows(&tree, tree.roots()) {
            assert_eq!(row.is_folder(), tree.is_folder(row.idx));
            assert_eq!(row.is_folder(), tree.children(row.idx).is_some());
        }
    }

    #[test]
    fn test_leaf_cells_follow_columns() {
        let tree = sample_tree();
        let mut model = TableModel::default();
        model.columns = vec![ColumnKey::ReqId, ColumnKey::Priority, ColumnKey::CreatedBy];
        let rows = model.rows(&tree, &[tree.find("REQ-010").unwrap()]);
        match &rows[0].kind {
            RowKind::Leaf { cells } => {
                assert_eq!(cells, &vec!["REQ-010".to_string(), "Critical".into(), "Sam".into()])
            }
            RowKind::Folder { .. } => panic!("Expected leaf row"),
        }
    }

    #[test]
    fn test_resize_clamps_and_isolates_columns() {
        let mut layout = ColumnLayout::new(50.0);
        let title_before = layout.width(&ColumnKey::Title);
        assert_eq!(layout.resize(&ColumnKey::ReqId, 10.0), 50.0);
        assert_eq!(layout.width(&ColumnKey::ReqId), 50.0);
        assert_eq!(layout.resize(&ColumnKey::ReqId, 300.0), 300.0);
        assert_eq!(layout.width(&ColumnKey::Title), title_before);
        assert_eq!(layout.resize(&ColumnKey::Status, f32::NAN), 50.0);
    }

    #[test]
    fn test_parse_helpers() {
        assert_eq!(ColumnKey::parse("Req ID"), ColumnKey::ReqId);
        assert_eq!(ColumnKey::parse("created-by"), ColumnKey::CreatedBy);
        assert_eq!(ColumnKey::parse("Sprint"), ColumnKey::Other("Sprint".into()));
        let filter = ColumnFilter::parse("status=approved").unwrap();
        assert_eq!(filter.column, ColumnKey::Status);
        assert_eq!(filter.needle, "approved");
        assert!(ColumnFilter::parse("nonsense").is_none());
        assert!(SortSpec::parse("title:DESC").descending);
    }
}
