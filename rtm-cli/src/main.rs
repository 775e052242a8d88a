mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::fs;
use std::io::{self, Write};
use std::path::Path;
use std::thread;
use std::time::Duration;

use rtm_core::fixtures::workspace_to_string;
use rtm_core::requirement::TraceabilitySummary;
use rtm_core::{
    cell_text, find_nodes, get_config_path, load_or_demo, save_workspace, ColumnFilter, ColumnKey,
    DashboardStore, DetailTab, FixtureFormat, NotificationLevel, Priority, Requirement,
    RequirementStatus, RowKind, RtmConfig, ServiceOp, SortSpec, UnlinkedItem,
};

use crate::cli::{Cli, Command, ConfigCommand, GapCommand};
use crate::prompts::BrowseChoice;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => get_config_path()?,
    };

    if let Command::Config(config_cmd) = &cli.command {
        return handle_config_command(config_cmd, &config_path);
    }

    let config = RtmConfig::load_or_default(&config_path)?;
    let (workspace, fixtures_path) = load_or_demo(cli.fixtures.as_deref(), &config)?;
    let mut store = DashboardStore::new(workspace, config).context("Invalid workspace")?;

    match &cli.command {
        Command::Tree {
            path,
            depth,
            filters,
            sort,
            columns,
        } => {
            print_tree(&mut store, path, depth, filters, sort, columns)?;
        }
        Command::Browse => {
            browse(&mut store)?;
        }
        Command::Find { query, open, limit } => {
            find(&mut store, query, *open, *limit)?;
        }
        Command::Show { id, tab } => {
            show_requirement(&mut store, id, tab.as_deref())?;
        }
        Command::Gap(gap_cmd) => {
            handle_gap_command(gap_cmd, &mut store)?;
        }
        Command::AddFolder { name, parent } => {
            add_folder(&mut store, name, parent)?;
        }
        Command::Tag { id, tags } => {
            let tags: Vec<&str> = tags.split(',').collect();
            let applied = store.set_tags(id, &tags)?;
            println!("{} Tags of {}: {}", "✓".green(), id, applied.join(", "));
        }
        Command::Upload { req_id, file, title } => {
            upload(&mut store, req_id, file, title.as_deref())?;
        }
        Command::Export { format, output } => {
            export(&store, format, output.as_deref())?;
        }
        Command::Config(_) => {}
    }

    print_notifications(&mut store);
    persist(&mut store, fixtures_path.as_deref())
}

fn handle_config_command(cmd: &ConfigCommand, config_path: &Path) -> Result<()> {
    match cmd {
        ConfigCommand::Show => {
            let config = RtmConfig::load_or_default(config_path)?;
            println!("{}", "Dashboard config:".blue().bold());
            print!("{}", format_config(&config));
        }
        ConfigCommand::Path => {
            println!("{}", config_path.display());
        }
        ConfigCommand::Init => {
            if config_path.exists() {
                println!(
                    "{} Config already exists at {}",
                    "!".yellow(),
                    config_path.display()
                );
            } else {
                RtmConfig::create_default(config_path)?;
                println!(
                    "{} Wrote default config to {}",
                    "✓".green(),
                    config_path.display()
                );
            }
        }
    }
    Ok(())
}

fn format_config(config: &RtmConfig) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "{}: {}\n",
        "fixtures_path".cyan(),
        config.fixtures_path.as_deref().unwrap_or("-")
    ));
    out.push_str(&format!("{}: {}\n", "service_delay_ms".cyan(), config.service_delay_ms));
    out.push_str(&format!("{}: {}\n", "upload_step_ms".cyan(), config.upload_step_ms));
    out.push_str(&format!("{}: {}\n", "match_threshold".cyan(), config.match_threshold));
    out.push_str(&format!(
        "{}: {}\n",
        "default_expand_level".cyan(),
        config.default_expand_level
    ));
    out.push_str(&format!("{}: {}\n", "min_column_width".cyan(), config.min_column_width));
    out.push_str(&format!(
        "{}: {:?}\n",
        "broken_path_policy".cyan(),
        config.broken_path_policy
    ));
    out.push_str(&format!("{}: {}\n", "finder_limit".cyan(), config.finder_limit));
    out
}

fn persist(store: &mut DashboardStore, fixtures_path: Option<&Path>) -> Result<()> {
    if !store.is_dirty() {
        return Ok(());
    }
    match fixtures_path {
        Some(path) => {
            save_workspace(path, &store.to_workspace())?;
            store.mark_saved();
            println!("{} Saved to {}", "✓".green(), path.display());
        }
        None => {
            println!(
                "{} Changes not saved: using built-in demo data (pass --fixtures to persist)",
                "!".yellow()
            );
        }
    }
    Ok(())
}

fn print_notifications(store: &mut DashboardStore) {
    for notification in store.notifications_mut().drain() {
        match notification.level {
            NotificationLevel::Info => println!("{} {}", "i".blue(), notification.message),
            NotificationLevel::Success => println!("{} {}", "✓".green(), notification.message),
            NotificationLevel::Warning => println!("{} {}", "!".yellow(), notification.message),
            NotificationLevel::Error => {
                println!("{} {}", "✗".red(), notification.message.red())
            }
        }
    }
}

fn parse_id_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

// Tree table

fn print_tree(
    store: &mut DashboardStore,
    path: &Option<String>,
    depth: &Option<usize>,
    filters: &[String],
    sort: &Option<String>,
    columns: &Option<String>,
) -> Result<()> {
    if let Some(path) = path {
        let ids = parse_id_list(path);
        let resolution = store.set_external_path(&ids)?;
        if !resolution.is_full() {
            println!("{} Path partially resolved: {:?}", "!".yellow(), resolution);
        }
    }

    if let Some(depth) = depth {
        store.expand_to_level(*depth);
    }

    for spec in filters {
        let filter = ColumnFilter::parse(spec)
            .with_context(|| format!("Invalid filter '{}', expected column=value", spec))?;
        store.table_mut().set_filter(filter.column, &filter.needle);
    }

    if let Some(sort) = sort {
        store.table_mut().sort = Some(SortSpec::parse(sort));
    }

    if let Some(columns) = columns {
        let keys: Vec<ColumnKey> = parse_id_list(columns)
            .iter()
            .map(|c| ColumnKey::parse(c))
            .collect();
        if !keys.is_empty() {
            store.table_mut().columns = keys;
        }
    }

    print_breadcrumb(store);
    print_rows(store);
    Ok(())
}

fn print_breadcrumb(store: &DashboardStore) {
    let crumbs = store.navigator().breadcrumb(store.tree());
    let mut trail = vec!["Home".to_string()];
    trail.extend(crumbs.into_iter().map(|c| c.name));
    println!("{}", trail.join(" › ").blue().bold());
}

fn column_chars(column: &ColumnKey) -> usize {
    match column {
        ColumnKey::ReqId => 10,
        ColumnKey::Title => 36,
        ColumnKey::Type => 12,
        ColumnKey::Priority => 9,
        ColumnKey::Status => 12,
        ColumnKey::CreatedBy => 16,
        ColumnKey::CreatedOn => 11,
        ColumnKey::Phase => 10,
        ColumnKey::Coverage => 8,
        ColumnKey::Other(_) => 10,
    }
}

fn fit(text: &str, width: usize) -> String {
    if text.chars().count() <= width {
        return format!("{:<width$}", text, width = width);
    }
    let cut: String = text.chars().take(width.saturating_sub(1)).collect();
    format!("{}…", cut)
}

fn print_rows(store: &DashboardStore) {
    let rows = store.visible_rows();
    if rows.is_empty() {
        println!("{}", "No rows match.".yellow());
        return;
    }

    let columns = &store.table().columns;
    let header: Vec<String> = columns
        .iter()
        .map(|c| fit(&c.to_string(), column_chars(c)))
        .collect();
    let header = header.join(" | ");
    println!("{}", header.bold());
    println!("{}", "-".repeat(header.chars().count()));

    let tree = store.tree();
    for row in rows {
        let indent = "  ".repeat(row.depth);
        match &row.kind {
            RowKind::Folder {
                expanded,
                child_count,
            } => {
                let marker = if *expanded { "▾" } else { "▸" };
                let node_type = tree.node(row.idx).node_type;
                println!(
                    "{}",
                    format!(
                        "{}{} {} ({}, {} items)",
                        indent, marker, row.name, node_type, child_count
                    )
                    .cyan()
                );
            }
            RowKind::Leaf { .. } => {
                let slot = tree.node(row.idx);
                let cells: Vec<String> = columns
                    .iter()
                    .map(|c| {
                        let text = match c {
                            ColumnKey::Title => format!("{}{}", indent, cell_text(slot, c)),
                            _ => cell_text(slot, c),
                        };
                        let cell = fit(&text, column_chars(c));
                        match c {
                            ColumnKey::Priority => colorize_priority(slot_priority(slot), cell),
                            ColumnKey::Status => colorize_status(slot_status(slot), cell),
                            _ => cell,
                        }
                    })
                    .collect();
                println!("{}", cells.join(" | "));
            }
        }
    }
}

fn slot_priority(slot: &rtm_core::NodeSlot) -> Option<Priority> {
    slot.details().and_then(|d| d.priority)
}

fn slot_status(slot: &rtm_core::NodeSlot) -> Option<RequirementStatus> {
    slot.details().and_then(|d| d.requirement_status)
}

fn colorize_priority(priority: Option<Priority>, cell: String) -> String {
    match priority {
        Some(Priority::Critical) => cell.red().bold().to_string(),
        Some(Priority::High) => cell.red().to_string(),
        Some(Priority::Medium) => cell.yellow().to_string(),
        Some(Priority::Low) => cell.green().to_string(),
        None => cell,
    }
}

fn colorize_status(status: Option<RequirementStatus>, cell: String) -> String {
    match status {
        Some(RequirementStatus::Draft) => cell.yellow().to_string(),
        Some(RequirementStatus::InReview) => cell.magenta().to_string(),
        Some(RequirementStatus::Approved) => cell.blue().to_string(),
        Some(RequirementStatus::Implemented) | Some(RequirementStatus::Verified) => {
            cell.green().to_string()
        }
        Some(RequirementStatus::Rejected) => cell.red().to_string(),
        None => cell,
    }
}

// Interactive drill-down

fn browse(store: &mut DashboardStore) -> Result<()> {
    loop {
        println!();
        print_breadcrumb(store);
        match prompts::prompt_browse(store)? {
            BrowseChoice::Quit => break,
            BrowseChoice::Back => {
                store.drill_back();
            }
            BrowseChoice::Node(idx) => {
                let is_folder = store.tree().is_folder(idx);
                store.activate(idx)?;
                if !is_folder {
                    store.wait_all();
                    print_notifications(store);
                    browse_detail(store)?;
                }
            }
        }
    }
    Ok(())
}

fn browse_detail(store: &mut DashboardStore) -> Result<()> {
    let Some(req) = store.selected_requirement().cloned() else {
        return Ok(());
    };
    print_overview(&req);
    while let Some(tab) = prompts::prompt_detail_tab(&req)? {
        store.set_detail_tab(tab);
        print_tab(&req, tab);
    }
    store.clear_selection();
    Ok(())
}

// Finder

fn find(store: &mut DashboardStore, query: &str, open: bool, limit: Option<usize>) -> Result<()> {
    let limit = limit.unwrap_or(store.config().finder_limit);
    let hits = find_nodes(store.tree(), query, limit);
    if hits.is_empty() {
        println!("{}", "No matches.".yellow());
        return Ok(());
    }

    for hit in &hits {
        let kind = if hit.is_folder { "folder" } else { "requirement" };
        let location = if hit.path_label.is_empty() {
            "(top level)".to_string()
        } else {
            hit.path_label.clone()
        };
        println!(
            "{:<10} {:<36} {:<12} {}",
            hit.id.green(),
            hit.name,
            kind,
            location.dimmed()
        );
    }

    if open {
        let first = &hits[0];
        store.reveal(&first.id)?;
        if first.is_folder {
            println!();
            print_breadcrumb(store);
            print_rows(store);
        } else {
            store.wait_all();
            if let Some(req) = store.selected_requirement() {
                println!();
                print_overview(req);
            }
        }
    }
    Ok(())
}

// Detail view

fn show_requirement(store: &mut DashboardStore, id: &str, tab: Option<&str>) -> Result<()> {
    let req = store.select_requirement(id)?.clone();
    match tab {
        Some(name) => {
            let tab = DetailTab::parse(name)
                .with_context(|| format!("Unknown tab '{}'", name))?;
            print_tab(&req, tab);
        }
        None => {
            print_overview(&req);
            for tab in DetailTab::ALL.iter().skip(1) {
                if tab.count(&req).unwrap_or(0) > 0 {
                    print_tab(&req, *tab);
                }
            }
        }
    }
    Ok(())
}

fn print_overview(req: &Requirement) {
    println!("{}: {}", "ID".blue(), req.req_id);
    println!("{}: {}", "Title".blue(), req.title);
    if !req.description.is_empty() {
        println!("{}: {}", "Description".blue(), req.description);
    }
    if !req.owner.is_empty() {
        println!("{}: {}", "Owner".blue(), req.owner);
    }
    println!(
        "{}: {}",
        "Priority".blue(),
        colorize_priority(Some(req.priority), req.priority.to_string())
    );
    println!(
        "{}: {}",
        "Status".blue(),
        colorize_status(Some(req.status), req.status.to_string())
    );

    let summary = TraceabilitySummary::for_requirement(req, chrono::Local::now().date_naive());
    let pass_rate = summary
        .pass_rate()
        .map(|p| format!("{}%", p))
        .unwrap_or_else(|| "-".to_string());
    println!(
        "{}: tests {}/{} passed ({}), {} open tasks ({} overdue), {} open issues, {} pending sign-offs",
        "Traceability".blue(),
        summary.tests_passed,
        summary.tests_total,
        pass_rate,
        summary.open_tasks,
        summary.overdue_tasks,
        summary.open_issues,
        summary.pending_sign_offs
    );

    let tabs: Vec<String> = DetailTab::ALL.iter().skip(1).map(|t| t.label(req)).collect();
    println!("{}: {}", "Tabs".blue(), tabs.join(", ").dimmed());
    if !req.linked_items.is_empty() {
        let linked: Vec<String> = req
            .linked_items
            .iter()
            .map(|l| format!("{} ({})", l.item_id, l.kind))
            .collect();
        println!("{}: {}", "Linked items".blue(), linked.join(", "));
    }
}

fn due(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "-".to_string())
}

fn print_tab(req: &Requirement, tab: DetailTab) {
    println!();
    println!("{}", tab.label(req).blue().bold());
    match tab {
        DetailTab::Overview => print_overview(req),
        DetailTab::Tasks => {
            for t in &req.tasks {
                println!(
                    "  {:<10} {:<40} {:<12} {:<16} {}",
                    t.id, t.title, t.status.to_string(), t.assignee, due(t.due_date)
                );
            }
        }
        DetailTab::TestCases => {
            for t in &req.test_cases {
                println!(
                    "  {:<10} {:<40} {:<12} {}",
                    t.id, t.title, t.status.to_string(), t.assignee
                );
            }
        }
        DetailTab::Issues => {
            for i in &req.issues {
                println!(
                    "  {:<10} {:<40} {:<12} {:<9} {}",
                    i.id, i.title, i.status.to_string(), i.priority.to_string(), i.assignee
                );
            }
        }
        DetailTab::SignOffs => {
            for s in &req.sign_offs {
                println!(
                    "  {:<10} {:<20} {:<20} {:<10} {}",
                    s.id, s.role, s.stakeholder, s.status.to_string(), due(s.due_date)
                );
            }
        }
        DetailTab::Ctas => {
            for c in &req.ctas {
                println!(
                    "  {:<10} {:<40} {:<10} {:<16} {}",
                    c.id, c.title, c.status.to_string(), c.assignee, due(c.due_date)
                );
            }
        }
        DetailTab::Meetings => {
            for m in &req.meetings {
                println!(
                    "  {:<10} {:<40} {:<10} {:<16} {}",
                    m.id, m.title, m.status.to_string(), m.organizer, due(m.date)
                );
            }
        }
        DetailTab::Stakeholders => {
            for s in &req.stakeholders {
                println!(
                    "  {:<20} {:<20} {}",
                    s.name,
                    s.role,
                    s.email.as_deref().unwrap_or("")
                );
            }
        }
        DetailTab::Knowledge => {
            for k in &req.knowledge {
                println!(
                    "  {:<30} {:<24} {:>8} KB  {}",
                    k.title,
                    k.file_name,
                    k.size_bytes / 1024,
                    k.uploaded_at.format("%Y-%m-%d %H:%M")
                );
            }
        }
    }
}

// Gap analysis

fn handle_gap_command(cmd: &GapCommand, store: &mut DashboardStore) -> Result<()> {
    match cmd {
        GapCommand::List { all } => {
            list_items(store, *all);
        }
        GapCommand::Analyze { ids, yes } => {
            store.request_recommendations(ids)?;
            println!("{}", "Analyzing unlinked items...".dimmed());
            store.wait_all();
            print_notifications(store);
            list_items(store, false);

            let accepted = store.gap().accepted_links().len();
            if accepted > 0 && (*yes || prompts::confirm_link(accepted)?) {
                store.request_link_accepted()?;
                store.wait_all();
                print_notifications(store);
            }

            if !*yes {
                let drafted: Vec<UnlinkedItem> = store
                    .gap()
                    .unlinked()
                    .filter(|i| i.draft.is_some())
                    .cloned()
                    .collect();
                for item in drafted {
                    if prompts::confirm_create(&item)? {
                        create_from_item(store, &item.id)?;
                    }
                }
            }
        }
        GapCommand::Accept { item } => {
            store.accept(item)?;
            println!("{} Accepted recommendation for {}", "✓".green(), item);
        }
        GapCommand::Reject { item } => {
            store.reject(item)?;
            println!("{} Rejected recommendation for {}", "✓".green(), item);
        }
        GapCommand::Link { item, req_id } => {
            store.request_link(&[(item.clone(), req_id.clone())])?;
            store.wait_all();
        }
        GapCommand::LinkAccepted => {
            let count = store.request_link_accepted()?;
            if count == 0 {
                println!("{}", "No accepted items to link.".yellow());
            }
            store.wait_all();
        }
        GapCommand::Create { item } => {
            create_from_item(store, item)?;
        }
    }
    Ok(())
}

fn create_from_item(store: &mut DashboardStore, item_id: &str) -> Result<()> {
    let req_id = store.request_create(item_id)?;
    log::debug!("creating {} from {}", req_id, item_id);
    store.wait_all();
    print_notifications(store);
    Ok(())
}

fn list_items(store: &DashboardStore, include_linked: bool) {
    let gap = store.gap();
    let stats = gap.stats();
    println!(
        "{} {} total, {} linked, {} accepted, {} need a new requirement",
        "Gap analysis:".blue().bold(),
        stats.total,
        stats.linked,
        stats.accepted,
        stats.needs_new_requirement
    );
    println!(
        "{:<10} | {:<10} | {:<34} | {:<6} | {}",
        "Item", "Kind", "Title", "Score", "State"
    );
    println!("{}", "-".repeat(100));

    for item in gap.items() {
        if item.is_linked() && !include_linked {
            continue;
        }
        let score = item
            .score()
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".to_string());
        let state = if let Some(target) = &item.linked_to {
            format!("linked to {}", target.req_id).green()
        } else if let (true, Some(rec)) = (item.accepted, &item.recommendation) {
            format!("accepted → {} {}", rec.req_id, rec.req_title).blue()
        } else if let Some(rec) = &item.recommendation {
            format!("suggested {} (below {})", rec.req_id, gap.threshold()).yellow()
        } else if let Some(draft) = &item.draft {
            format!("new requirement: {}", draft.title).magenta()
        } else {
            "not analyzed".dimmed()
        };
        println!(
            "{:<10} | {:<10} | {} | {:<6} | {}",
            item.id,
            item.kind.to_string(),
            fit(&item.title, 34),
            score,
            state
        );
    }
}

// Edits

fn add_folder(
    store: &mut DashboardStore,
    name: &Option<String>,
    parent: &Option<String>,
) -> Result<()> {
    let (name, parent) = match name {
        Some(name) => (name.clone(), parent.clone()),
        None => {
            let name = prompts::prompt_folder_name()?;
            let parent = match parent {
                Some(parent) => Some(parent.clone()),
                None => prompts::prompt_parent_folder(store)?,
            };
            (name, parent)
        }
    };
    if name.trim().is_empty() {
        anyhow::bail!("Folder name is required");
    }

    let id = store.add_folder(parent.as_deref(), &name)?;
    println!("{} Added folder {} ({})", "✓".green(), name.trim(), id.green());
    Ok(())
}

fn upload(store: &mut DashboardStore, req_id: &str, file: &Path, title: Option<&str>) -> Result<()> {
    let metadata =
        fs::metadata(file).with_context(|| format!("Failed to read {:?}", file))?;
    let file_name = file
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| file.display().to_string());
    let title = title.map(|t| t.to_string()).unwrap_or_else(|| file_name.clone());

    store.request_upload(req_id, &title, &file_name, metadata.len())?;
    loop {
        if let Some(progress) = store.upload_progress() {
            let filled = (progress / 5) as usize;
            print!(
                "\r[{}{}] {:>3}%",
                "#".repeat(filled),
                " ".repeat(20 - filled),
                progress
            );
            let _ = io::stdout().flush();
        }
        if store.poll().contains(&ServiceOp::Upload) {
            println!();
            break;
        }
        thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

fn export(store: &DashboardStore, format: &str, output: Option<&Path>) -> Result<()> {
    let format = FixtureFormat::parse(format)
        .with_context(|| format!("Unsupported export format '{}', use yaml or json", format))?;
    let content = workspace_to_string(&store.to_workspace(), format)?;
    match output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            fs::write(path, content)
                .with_context(|| format!("Failed to write export to {:?}", path))?;
            println!("{} Exported to {}", "✓".green(), path.display());
        }
        None => print!("{}", content),
    }
    Ok(())
}
