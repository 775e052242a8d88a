use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of a navigation node
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum NodeType {
    Requirement,
    Process,
    Scope,
    Project,
    Folder,
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeType::Requirement => write!(f, "Requirement"),
            NodeType::Process => write!(f, "Process"),
            NodeType::Scope => write!(f, "Scope"),
            NodeType::Project => write!(f, "Project"),
            NodeType::Folder => write!(f, "Folder"),
        }
    }
}

/// Whether a node is part of the current delivery scope
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum ScopeStatus {
    #[default]
    InScope,
    OutOfScope,
}

impl fmt::Display for ScopeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeStatus::InScope => write!(f, "In Scope"),
            ScopeStatus::OutOfScope => write!(f, "Out of Scope"),
        }
    }
}

/// Lifecycle status of a requirement
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum RequirementStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Implemented,
    Verified,
    Rejected,
}

impl fmt::Display for RequirementStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequirementStatus::Draft => write!(f, "Draft"),
            RequirementStatus::InReview => write!(f, "In Review"),
            RequirementStatus::Approved => write!(f, "Approved"),
            RequirementStatus::Implemented => write!(f, "Implemented"),
            RequirementStatus::Verified => write!(f, "Verified"),
            RequirementStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// Priority shared by requirements and their artifacts
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Priority {
    Critical,
    High,
    #[default]
    Medium,
    Low,
}

impl Priority {
    /// Sort rank, most urgent first
    pub fn rank(&self) -> u8 {
        match self {
            Priority::Critical => 0,
            Priority::High => 1,
            Priority::Medium => 2,
            Priority::Low => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Priority::Critical => write!(f, "Critical"),
            Priority::High => write!(f, "High"),
            Priority::Medium => write!(f, "Medium"),
            Priority::Low => write!(f, "Low"),
        }
    }
}

/// Fields only a requirement leaf carries
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct LeafDetails {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub requirement_status: Option<RequirementStatus>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<Priority>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_by: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_on: Option<NaiveDate>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Test coverage in percent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<u8>,
}

/// Folder or leaf payload of a node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeBody {
    /// Drillable container; an empty list is still a folder
    Folder { children: Vec<NavigationNode> },
    /// Requirement leaf, opens the detail view
    Leaf(LeafDetails),
}

/// A node of the requirement hierarchy as it appears in fixtures
///
/// In YAML/JSON the presence of a `children` key (even `[]`) marks a folder and
/// its absence marks a leaf. In memory the distinction is carried by [`NodeBody`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NodeRecord", into = "NodeRecord")]
pub struct NavigationNode {
    pub id: String,
    pub name: String,
    pub node_type: NodeType,
    pub status: ScopeStatus,
    pub tags: Vec<String>,
    pub body: NodeBody,
}

impl NavigationNode {
    /// Creates a folder node
    pub fn folder(
        id: impl Into<String>,
        name: impl Into<String>,
        node_type: NodeType,
        children: Vec<NavigationNode>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type,
            status: ScopeStatus::InScope,
            tags: Vec::new(),
            body: NodeBody::Folder { children },
        }
    }

    /// Creates a requirement leaf
    pub fn leaf(id: impl Into<String>, name: impl Into<String>, details: LeafDetails) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            node_type: NodeType::Requirement,
            status: ScopeStatus::InScope,
            tags: Vec::new(),
            body: NodeBody::Leaf(details),
        }
    }

    pub fn with_status(mut self, status: ScopeStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Self {
        self.tags = tags.iter().map(|t| t.to_string()).collect();
        self
    }

    /// True when the node is drillable
    pub fn is_folder(&self) -> bool {
        matches!(self.body, NodeBody::Folder { .. })
    }

    /// Children of a folder, `None` for a leaf
    pub fn children(&self) -> Option<&[NavigationNode]> {
        match &self.body {
            NodeBody::Folder { children } => Some(children),
            NodeBody::Leaf(_) => None,
        }
    }
}

/// Wire shape of a node
#[derive(Serialize, Deserialize)]
struct NodeRecord {
    id: String,
    name: String,
    #[serde(rename = "type")]
    node_type: NodeType,
    #[serde(default)]
    status: ScopeStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    children: Option<Vec<NavigationNode>>,
    #[serde(flatten)]
    details: LeafDetails,
}

impl From<NodeRecord> for NavigationNode {
    fn from(record: NodeRecord) -> Self {
        let body = match record.children {
            Some(children) => NodeBody::Folder { children },
            None => NodeBody::Leaf(record.details),
        };
        Self {
            id: record.id,
            name: record.name,
            node_type: record.node_type,
            status: record.status,
            tags: record.tags,
            body,
        }
    }
}

impl From<NavigationNode> for NodeRecord {
    fn from(node: NavigationNode) -> Self {
        let (children, details) = match node.body {
            NodeBody::Folder { children } => (Some(children), LeafDetails::default()),
            NodeBody::Leaf(details) => (None, details),
        };
        Self {
            id: node.id,
            name: node.name,
            node_type: node.node_type,
            status: node.status,
            tags: node.tags,
            children,
            details,
        }
    }
}

/// Normalizes user-entered tags: trims, drops empties and duplicates, keeps order
pub fn normalize_tags<I, S>(tags: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut out: Vec<String> = Vec::new();
    for tag in tags {
        let tag = tag.as_ref().trim();
        if !tag.is_empty() && !out.iter().any(|t| t == tag) {
            out.push(tag.to_string());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_children_key_marks_folder() {
        let yaml = r#"
- id: SC-1
  name: Checkout
  type: scope
  children: []
- id: REQ-001
  name: Card payment
  type: requirement
  priority: high
"#;
        let nodes: Vec<NavigationNode> = serde_yaml::from_str(yaml).unwrap();
        assert!(nodes[0].is_folder());
        assert_eq!(nodes[0].children().map(|c| c.len()), Some(0));
        assert!(!nodes[1].is_folder());
        assert!(nodes[1].children().is_none());
        match &nodes[1].body {
            NodeBody::Leaf(details) => assert_eq!(details.priority, Some(Priority::High)),
            NodeBody::Folder { .. } => panic!("Expected leaf"),
        }
    }

    #[test]
    fn test_empty_folder_survives_serialization() {
        let node = NavigationNode::folder("F-1", "Backlog", NodeType::Folder, Vec::new());
        let json = serde_json::to_string(&node).unwrap();
        assert!(json.contains("\"children\":[]"));

        let back: NavigationNode = serde_json::from_str(&json).unwrap();
        assert!(back.is_folder());
        assert_eq!(back, node);
    }

    #[test]
    fn test_leaf_does_not_serialize_children() {
        let node = NavigationNode::leaf("REQ-1", "Login", LeafDetails::default());
        let json = serde_json::to_string(&node).unwrap();
        assert!(!json.contains("children"));
    }

    #[test]
    fn test_scope_status_wire_names() {
        let node = NavigationNode::leaf("REQ-1", "Login", LeafDetails::default())
            .with_status(ScopeStatus::OutOfScope);
        let yaml = serde_yaml::to_string(&node).unwrap();
        assert!(yaml.contains("status: out-of-scope"));
    }

    #[test]
    fn test_normalize_tags() {
        let tags = normalize_tags([" ui ", "", "api", "ui"]);
        assert_eq!(tags, vec!["ui".to_string(), "api".to_string()]);
    }

    #[test]
    fn test_priority_rank_order() {
        assert!(Priority::Critical.rank() < Priority::High.rank());
        assert!(Priority::Medium.rank() < Priority::Low.rank());
    }
}
