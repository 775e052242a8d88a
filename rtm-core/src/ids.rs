use crate::requirement::{trailing_number, RequirementCatalog};
use crate::tree::NavTree;

/// Hands out ids for nodes and requirements created at runtime
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdGenerator {
    next_folder: u32,
    next_requirement: u32,
}

impl IdGenerator {
    pub const FOLDER_PREFIX: &'static str = "FLD";
    pub const REQUIREMENT_PREFIX: &'static str = "REQ";

    /// Seeds the counters past every id already present
    pub fn seeded(tree: &NavTree, catalog: &RequirementCatalog) -> Self {
        let max_folder = tree
            .iter()
            .filter(|(_, slot)| slot.id.starts_with(Self::FOLDER_PREFIX))
            .filter_map(|(_, slot)| trailing_number(&slot.id))
            .max()
            .unwrap_or(0);
        let max_leaf = tree
            .iter()
            .filter(|(_, slot)| slot.id.starts_with(Self::REQUIREMENT_PREFIX))
            .filter_map(|(_, slot)| trailing_number(&slot.id))
            .max()
            .unwrap_or(0);
        Self {
            next_folder: max_folder + 1,
            next_requirement: max_leaf.max(catalog.max_number()) + 1,
        }
    }

    pub fn next_folder_id(&mut self) -> String {
        let id = format!("{}-{:03}", Self::FOLDER_PREFIX, self.next_folder.max(1));
        self.next_folder = self.next_folder.max(1) + 1;
        id
    }

    pub fn next_requirement_id(&mut self) -> String {
        let id = format!("{}-{:03}", Self::REQUIREMENT_PREFIX, self.next_requirement.max(1));
        self.next_requirement = self.next_requirement.max(1) + 1;
        id
    }
}
