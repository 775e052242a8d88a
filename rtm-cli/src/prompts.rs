use anyhow::Result;
use inquire::{Confirm, Select, Text};
use std::fmt;

use rtm_core::{DashboardStore, DetailTab, NodeIdx, Requirement, UnlinkedItem};

/// One entry of the browse menu
pub enum BrowseChoice {
    Node(NodeIdx),
    Back,
    Quit,
}

struct MenuEntry {
    label: String,
    choice: BrowseChoice,
}

impl fmt::Display for MenuEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

/// Prompts for the next step of an interactive drill-down
pub fn prompt_browse(store: &DashboardStore) -> Result<BrowseChoice> {
    let tree = store.tree();
    let mut entries: Vec<MenuEntry> = store
        .navigator()
        .visible(tree)
        .iter()
        .map(|idx| {
            let slot = tree.node(*idx);
            let label = match tree.children(*idx) {
                Some(children) => format!("▸ {} ({}) [{} items]", slot.name, slot.id, children.len()),
                None => format!("  {} - {}", slot.id, slot.name),
            };
            MenuEntry {
                label,
                choice: BrowseChoice::Node(*idx),
            }
        })
        .collect();

    if !store.navigator().at_root() {
        entries.push(MenuEntry {
            label: "⬅ Back".to_string(),
            choice: BrowseChoice::Back,
        });
    }
    entries.push(MenuEntry {
        label: "Quit".to_string(),
        choice: BrowseChoice::Quit,
    });

    let picked = Select::new("Open:", entries).with_page_size(15).prompt()?;
    Ok(picked.choice)
}

/// Prompts for the name of a new folder
pub fn prompt_folder_name() -> Result<String> {
    let name = Text::new("Folder name:").prompt()?;
    Ok(name)
}

/// Prompts for a parent folder; `None` means the root level
pub fn prompt_parent_folder(store: &DashboardStore) -> Result<Option<String>> {
    const ROOT: &str = "<root level>";

    let mut options = vec![ROOT.to_string()];
    let tree = store.tree();
    for (_, slot) in tree.iter().filter(|(_, slot)| slot.is_folder()) {
        let location = tree
            .path_to(&slot.id)
            .unwrap_or_default()
            .iter()
            .map(|idx| tree.node(*idx).name.as_str())
            .collect::<Vec<_>>()
            .join(" / ");
        if location.is_empty() {
            options.push(format!("{} | {}", slot.id, slot.name));
        } else {
            options.push(format!("{} | {} / {}", slot.id, location, slot.name));
        }
    }

    let selection = Select::new("Parent folder:", options).prompt()?;
    if selection == ROOT {
        return Ok(None);
    }
    Ok(selection.split(" | ").next().map(|id| id.to_string()))
}

/// Prompts for a detail tab to display; `None` leaves the detail view
pub fn prompt_detail_tab(req: &Requirement) -> Result<Option<DetailTab>> {
    let mut options: Vec<String> = DetailTab::ALL.iter().map(|t| t.label(req)).collect();
    options.push("Done".to_string());

    let selection = Select::new("Tab:", options.clone()).prompt()?;
    Ok(options
        .iter()
        .position(|o| *o == selection)
        .and_then(|i| DetailTab::ALL.get(i).copied()))
}

/// Asks whether accepted recommendations should be linked
pub fn confirm_link(count: usize) -> Result<bool> {
    let answer = Confirm::new(&format!("Link {} accepted item(s) now?", count))
        .with_default(true)
        .prompt()?;
    Ok(answer)
}

/// Asks whether a drafted requirement should be created for an item
pub fn confirm_create(item: &UnlinkedItem) -> Result<bool> {
    let Some(draft) = &item.draft else {
        return Ok(false);
    };
    let question = format!(
        "Create \"{}\" ({}, {}) for {}?",
        draft.title, draft.category, draft.priority, item.id
    );
    let answer = Confirm::new(&question).with_default(false).prompt()?;
    Ok(answer)
}
