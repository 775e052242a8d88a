//! Finder: search across the whole hierarchy and report where each hit lives

use crate::tree::{NavTree, NodeIdx};

/// One finder result
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinderHit {
    pub idx: NodeIdx,
    pub id: String,
    pub name: String,
    pub is_folder: bool,
    pub depth: usize,
    /// Ancestor names joined with " / ", empty for top-level nodes
    pub path_label: String,
    /// Ancestor ids, usable as an external navigation path
    pub ancestor_ids: Vec<String>,
}

/// Case-insensitive search over node ids and names
///
/// Hits are ordered by depth, then name, and capped at `limit`.
pub fn find_nodes(tree: &NavTree, query: &str, limit: usize) -> Vec<FinderHit> {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() || limit == 0 {
        return Vec::new();
    }

    let mut hits: Vec<FinderHit> = tree
        .iter()
        .filter(|(_, slot)| {
            slot.id.to_lowercase().contains(&needle) || slot.name.to_lowercase().contains(&needle)
        })
        .filter_map(|(idx, slot)| {
            let ancestors = tree.path_to(&slot.id)?;
            Some(FinderHit {
                idx,
                id: slot.id.clone(),
                name: slot.name.clone(),
                is_folder: slot.is_folder(),
                depth: ancestors.len(),
                path_label: ancestors
                    .iter()
                    .map(|a| tree.node(*a).name.as_str())
                    .collect::<Vec<_>>()
                    .join(" / "),
                ancestor_ids: ancestors.iter().map(|a| tree.node(*a).id.clone()).collect(),
            })
        })
        .collect();

    hits.sort_by(|a, b| {
        a.depth
            .cmp(&b.depth)
            .then_with(|| a.name.to_lowercase().cmp(&b.name.to_lowercase()))
    });
    hits.truncate(limit);
    hits
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{LeafDetails, NavigationNode, NodeType};

    fn tree() -> NavTree {
        NavTree::from_forest(&[NavigationNode::folder(
            "SC-PAY",
            "Payments",
            NodeType::Scope,
            vec![NavigationNode::folder(
                "PR-CARD",
                "Card payments",
                NodeType::Process,
                vec![NavigationNode::leaf(
                    "REQ-001",
                    "Accept card payment",
                    LeafDetails::default(),
                )],
            )],
        )])
        .unwrap()
    }

    #[test]
    fn test_find_orders_by_depth() {
        let tree = tree();
        let hits = find_nodes(&tree, "PAYMENT", 10);
        let ids: Vec<&str> = hits.iter().map(|h| h.id.as_str()).collect();
        assert_eq!(ids, vec!["SC-PAY", "PR-CARD", "REQ-001"]);
        assert_eq!(hits[2].path_label, "Payments / Card payments");
        assert_eq!(hits[2].ancestor_ids, vec!["SC-PAY".to_string(), "PR-CARD".into()]);
        assert!(!hits[2].is_folder);
    }

    #[test]
    fn test_find_by_id_and_limit() {
        let tree = tree();
        assert_eq!(find_nodes(&tree, "req-001", 10).len(), 1);
        assert_eq!(find_nodes(&tree, "pay", 1).len(), 1);
        assert!(find_nodes(&tree, "   ", 10).is_empty());
        assert!(find_nodes(&tree, "zzz", 10).is_empty());
    }
}
