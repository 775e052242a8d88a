use chrono::Utc;
use eframe::egui;
use egui_extras::{Column, TableBuilder};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::Duration;

use rtm_core::{
    find_nodes, save_workspace, ColumnKey, DashboardStore, DetailTab, NavigationEvent, NodeIdx,
    NotificationLevel, Priority, Requirement, RequirementStatus, RowKind, RtmResult, SortSpec,
    TraceabilitySummary, UnlinkedItem,
};

const TOAST_SECONDS: i64 = 5;
const INDENT: f32 = 14.0;

/// Columns that get a filter box above the table
fn filter_columns() -> [ColumnKey; 5] {
    [
        ColumnKey::ReqId,
        ColumnKey::Title,
        ColumnKey::Type,
        ColumnKey::Priority,
        ColumnKey::Status,
    ]
}

fn priority_color(priority: Option<Priority>) -> egui::Color32 {
    match priority {
        Some(Priority::Critical) => egui::Color32::from_rgb(244, 67, 54),
        Some(Priority::High) => egui::Color32::from_rgb(255, 152, 0),
        Some(Priority::Medium) => egui::Color32::from_rgb(74, 158, 255),
        Some(Priority::Low) | None => egui::Color32::GRAY,
    }
}

fn status_color(status: Option<RequirementStatus>) -> egui::Color32 {
    match status {
        Some(RequirementStatus::Approved)
        | Some(RequirementStatus::Implemented)
        | Some(RequirementStatus::Verified) => egui::Color32::from_rgb(76, 175, 80),
        Some(RequirementStatus::Rejected) => egui::Color32::from_rgb(244, 67, 54),
        Some(RequirementStatus::InReview) => egui::Color32::YELLOW,
        Some(RequirementStatus::Draft) | None => egui::Color32::GRAY,
    }
}

fn level_color(level: NotificationLevel) -> egui::Color32 {
    match level {
        NotificationLevel::Info => egui::Color32::from_rgb(74, 158, 255),
        NotificationLevel::Success => egui::Color32::from_rgb(76, 175, 80),
        NotificationLevel::Warning => egui::Color32::YELLOW,
        NotificationLevel::Error => egui::Color32::RED,
    }
}

/// Folder rows only draw the title cell with the expand toggle
fn folder_fills(column: &ColumnKey) -> bool {
    *column == ColumnKey::Title
}

/// Routes a failed store call into the toast queue
fn report<T>(store: &mut DashboardStore, result: RtmResult<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(err) => {
            store.notifications_mut().error(&err);
            None
        }
    }
}

/// Actions collected while drawing and applied once the frame is laid out
#[derive(Default)]
struct PendingActions {
    activate: Option<NodeIdx>,
    reveal: Option<String>,
    open_requirement: Option<String>,
    drill_back: bool,
    jump_to_depth: Option<usize>,
    toggle: Option<String>,
    expand_level: Option<usize>,
    expand_all: bool,
    collapse_all: bool,
    sort_by: Option<ColumnKey>,
    widths: Vec<(ColumnKey, f32)>,
    reset_widths: bool,
    filters: Vec<(ColumnKey, String)>,
    clear_filters: bool,
    tab: Option<DetailTab>,
    close_detail: bool,
    apply_tags: bool,
    upload: bool,
    add_folder: bool,
    analyze: bool,
    link_accepted: bool,
    accept: Option<String>,
    reject: Option<String>,
    create: Option<String>,
    save: bool,
}

pub struct DashboardApp {
    store: DashboardStore,
    fixtures_path: Option<PathBuf>,
    events: mpsc::Receiver<NavigationEvent>,
    context_label: String,

    finder_query: String,
    filter_inputs: HashMap<ColumnKey, String>,
    expand_level: usize,
    // Bumped to drop egui's remembered column widths
    table_epoch: u64,

    show_gap_window: bool,
    show_add_folder: bool,
    folder_name: String,

    detail_for: Option<String>,
    tags_input: String,
    upload_title: String,
    upload_path: String,

    pending: PendingActions,
}

impl DashboardApp {
    pub fn new(mut store: DashboardStore, fixtures_path: Option<PathBuf>) -> Self {
        let events = store.subscribe();
        let expand_level = store.config().default_expand_level;
        Self {
            store,
            fixtures_path,
            events,
            context_label: "All projects".to_string(),
            finder_query: String::new(),
            filter_inputs: HashMap::new(),
            expand_level,
            table_epoch: 0,
            show_gap_window: false,
            show_add_folder: false,
            folder_name: String::new(),
            detail_for: None,
            tags_input: String::new(),
            upload_title: String::new(),
            upload_path: String::new(),
            pending: PendingActions::default(),
        }
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        let events: Vec<NavigationEvent> = self.events.try_iter().collect();
        for event in events {
            match event {
                NavigationEvent::ContextChanged { folder } => {
                    self.context_label = folder
                        .as_deref()
                        .and_then(|id| self.store.tree().find(id))
                        .map(|idx| self.store.tree().node(idx).name.clone())
                        .unwrap_or_else(|| "All projects".to_string());
                    ctx.send_viewport_cmd(egui::ViewportCommand::Title(format!(
                        "RTM Dashboard - {}",
                        self.context_label
                    )));
                }
                NavigationEvent::NodeSelected { id, node_type } => {
                    log::debug!("Selected {} {}", node_type, id);
                }
            }
        }
    }

    fn show_top_panel(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("RTM");
                ui.separator();

                if ui.link("🏠 Home").clicked() {
                    self.pending.jump_to_depth = Some(0);
                }
                for crumb in self.store.navigator().breadcrumb(self.store.tree()) {
                    ui.label("›");
                    if ui.link(&crumb.name).on_hover_text(&crumb.id).clicked() {
                        self.pending.jump_to_depth = Some(crumb.depth);
                    }
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    let can_save = self.fixtures_path.is_some() && self.store.is_dirty();
                    let save = ui.add_enabled(can_save, egui::Button::new("💾 Save"));
                    let save = match &self.fixtures_path {
                        Some(path) => save.on_hover_text(path.display().to_string()),
                        None => save.on_disabled_hover_text("Showing demo data"),
                    };
                    if save.clicked() {
                        self.pending.save = true;
                    }

                    let stats = self.store.gap().stats();
                    if ui
                        .button(format!("🔗 Gap Analysis ({})", stats.unlinked))
                        .clicked()
                    {
                        self.show_gap_window = true;
                    }

                    ui.add(
                        egui::TextEdit::singleline(&mut self.finder_query)
                            .hint_text("Find by id or name")
                            .desired_width(220.0),
                    );
                    ui.label("🔍");
                });
            });
        });
    }

    fn show_nav_panel(&mut self, ctx: &egui::Context) {
        egui::SidePanel::left("nav_panel")
            .min_width(180.0)
            .default_width(260.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let at_root = self.store.navigator().at_root();
                    if ui.add_enabled(!at_root, egui::Button::new("⬅ Back")).clicked() {
                        self.pending.drill_back = true;
                    }
                    ui.strong(&self.context_label);
                });
                ui.separator();

                let tree = self.store.tree();
                let selected = self.store.selected_requirement().map(|r| r.req_id.as_str());
                egui::ScrollArea::vertical()
                    .auto_shrink([false, true])
                    .max_height(ui.available_height() - 40.0)
                    .show(ui, |ui| {
                        for idx in self.store.navigator().visible(tree) {
                            let slot = tree.node(*idx);
                            let label = match tree.children(*idx) {
                                Some(children) => {
                                    format!("📁 {} ({})", slot.name, children.len())
                                }
                                None => format!("📄 {} {}", slot.id, slot.name),
                            };
                            let response = ui
                                .selectable_label(selected == Some(slot.id.as_str()), label)
                                .on_hover_text(format!("{} · {}", slot.node_type, slot.status));
                            if response.clicked() {
                                self.pending.activate = Some(*idx);
                            }
                        }
                    });

                ui.separator();
                if ui.button("➕ New folder").clicked() {
                    self.show_add_folder = true;
                }
            });
    }

    fn show_table(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Expand to level");
            ui.add(egui::DragValue::new(&mut self.expand_level).range(0..=10));
            if ui.button("Apply").clicked() {
                self.pending.expand_level = Some(self.expand_level);
            }
            ui.separator();
            if ui.button("Expand all").clicked() {
                self.pending.expand_all = true;
            }
            if ui.button("Collapse all").clicked() {
                self.pending.collapse_all = true;
            }
            ui.separator();
            if ui.button("Reset widths").clicked() {
                self.pending.reset_widths = true;
            }
        });

        ui.horizontal_wrapped(|ui| {
            for column in filter_columns() {
                ui.label(column.to_string());
                let text = self.filter_inputs.entry(column.clone()).or_default();
                if ui
                    .add(egui::TextEdit::singleline(text).desired_width(90.0))
                    .changed()
                {
                    self.pending.filters.push((column, text.clone()));
                }
            }
            if ui.button("Clear filters").clicked() {
                self.pending.clear_filters = true;
            }
        });
        ui.separator();

        let rows = self.store.visible_rows();
        if rows.is_empty() {
            ui.label("Nothing to show at this level.");
            return;
        }

        let tree = self.store.tree();
        let table = self.store.table();
        let columns = &table.columns;
        let layout = &table.layout;
        let sort = &table.sort;
        let pending = &mut self.pending;
        let text_height = egui::TextStyle::Body.resolve(ui.style()).size;

        ui.push_id(self.table_epoch, |ui| {
            let mut builder = TableBuilder::new(ui)
                .striped(true)
                .resizable(true)
                .cell_layout(egui::Layout::left_to_right(egui::Align::Center));
            for column in columns {
                builder = builder.column(
                    Column::initial(layout.width(column))
                        .at_least(layout.min_width())
                        .clip(true),
                );
            }

            builder
                .header(22.0, |mut header| {
                    for column in columns {
                        header.col(|ui| {
                            let arrow = match sort {
                                Some(spec) if &spec.column == column => {
                                    if spec.descending {
                                        " ⏷"
                                    } else {
                                        " ⏶"
                                    }
                                }
                                _ => "",
                            };
                            if ui
                                .add(egui::Button::new(
                                    egui::RichText::new(format!("{}{}", column, arrow)).strong(),
                                ).frame(false))
                                .clicked()
                            {
                                pending.sort_by = Some(column.clone());
                            }
                            pending.widths.push((column.clone(), ui.max_rect().width()));
                        });
                    }
                })
                .body(|mut body| {
                    for row in &rows {
                        let slot = tree.node(row.idx);
                        body.row(text_height * 1.6, |mut table_row| {
                            for (i, column) in columns.iter().enumerate() {
                                table_row.col(|ui| match &row.kind {
                                    RowKind::Folder {
                                        expanded,
                                        child_count,
                                    } => {
                                        if folder_fills(column) {
                                            ui.add_space(row.depth as f32 * INDENT);
                                            let marker = if *expanded { "▾" } else { "▸" };
                                            if ui.small_button(marker).clicked() {
                                                pending.toggle = Some(row.id.clone());
                                            }
                                            if ui
                                                .link(format!("📁 {} ({})", row.name, child_count))
                                                .clicked()
                                            {
                                                pending.reveal = Some(row.id.clone());
                                            }
                                        }
                                    }
                                    RowKind::Leaf { cells } => {
                                        let details = slot.details();
                                        let text = cells.get(i).cloned().unwrap_or_default();
                                        match column {
                                            ColumnKey::Title => {
                                                ui.add_space(row.depth as f32 * INDENT + 20.0);
                                                if ui.link(text).clicked() {
                                                    pending.open_requirement = Some(row.id.clone());
                                                }
                                            }
                                            ColumnKey::Priority => {
                                                let color =
                                                    priority_color(details.and_then(|d| d.priority));
                                                ui.colored_label(color, text);
                                            }
                                            ColumnKey::Status => {
                                                let color = status_color(
                                                    details.and_then(|d| d.requirement_status),
                                                );
                                                ui.colored_label(color, text);
                                            }
                                            ColumnKey::Coverage => {
                                                match details.and_then(|d| d.coverage) {
                                                    Some(coverage) => {
                                                        ui.add(
                                                            egui::ProgressBar::new(
                                                                coverage as f32 / 100.0,
                                                            )
                                                            .text(text),
                                                        );
                                                    }
                                                    None => {
                                                        ui.label(text);
                                                    }
                                                }
                                            }
                                            _ => {
                                                ui.label(text);
                                            }
                                        }
                                    }
                                });
                            }
                        });
                    }
                });
        });
    }

    fn show_detail_panel(&mut self, ctx: &egui::Context) {
        let loading = self.store.busy().loading;
        let Some(req) = self.store.selected_requirement().cloned() else {
            if loading {
                egui::SidePanel::right("detail_panel")
                    .default_width(420.0)
                    .show(ctx, |ui| {
                        ui.horizontal(|ui| {
                            ui.spinner();
                            ui.label("Loading requirement...");
                        });
                    });
            }
            return;
        };

        if self.detail_for.as_deref() != Some(req.req_id.as_str()) {
            self.tags_input = self
                .store
                .tree()
                .find(&req.req_id)
                .map(|idx| self.store.tree().node(idx).tags.join(", "))
                .unwrap_or_default();
            self.detail_for = Some(req.req_id.clone());
        }

        let tab = self.store.detail_tab();
        let uploading = self.store.busy().uploading;
        let progress = self.store.upload_progress();

        egui::SidePanel::right("detail_panel")
            .min_width(320.0)
            .default_width(440.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading(format!("{} {}", req.req_id, req.title));
                    ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                        if ui.small_button("✖").clicked() {
                            self.pending.close_detail = true;
                        }
                        if loading {
                            ui.spinner();
                        }
                    });
                });

                ui.horizontal_wrapped(|ui| {
                    for candidate in DetailTab::ALL {
                        if ui
                            .selectable_label(tab == candidate, candidate.label(&req))
                            .clicked()
                        {
                            self.pending.tab = Some(candidate);
                        }
                    }
                });
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| match tab {
                    DetailTab::Overview => {
                        show_overview(ui, &req);
                        ui.separator();
                        ui.horizontal(|ui| {
                            ui.label("Tags:");
                            ui.add(
                                egui::TextEdit::singleline(&mut self.tags_input)
                                    .hint_text("comma separated")
                                    .desired_width(200.0),
                            );
                            if ui.button("Apply").clicked() {
                                self.pending.apply_tags = true;
                            }
                        });
                    }
                    DetailTab::Tasks => artifact_grid(
                        ui,
                        "tasks_grid",
                        &["ID", "Title", "Status", "Priority", "Assignee", "Due"],
                        req.tasks
                            .iter()
                            .map(|t| {
                                vec![
                                    t.id.clone(),
                                    t.title.clone(),
                                    t.status.to_string(),
                                    t.priority.to_string(),
                                    t.assignee.clone(),
                                    date_text(t.due_date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::TestCases => artifact_grid(
                        ui,
                        "tests_grid",
                        &["ID", "Title", "Status", "Priority", "Assignee", "Due"],
                        req.test_cases
                            .iter()
                            .map(|t| {
                                vec![
                                    t.id.clone(),
                                    t.title.clone(),
                                    t.status.to_string(),
                                    t.priority.to_string(),
                                    t.assignee.clone(),
                                    date_text(t.due_date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::Issues => artifact_grid(
                        ui,
                        "issues_grid",
                        &["ID", "Title", "Status", "Priority", "Assignee", "Due"],
                        req.issues
                            .iter()
                            .map(|i| {
                                vec![
                                    i.id.clone(),
                                    i.title.clone(),
                                    i.status.to_string(),
                                    i.priority.to_string(),
                                    i.assignee.clone(),
                                    date_text(i.due_date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::SignOffs => artifact_grid(
                        ui,
                        "signoffs_grid",
                        &["ID", "Role", "Stakeholder", "Status", "Due"],
                        req.sign_offs
                            .iter()
                            .map(|s| {
                                vec![
                                    s.id.clone(),
                                    s.role.clone(),
                                    s.stakeholder.clone(),
                                    s.status.to_string(),
                                    date_text(s.due_date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::Ctas => artifact_grid(
                        ui,
                        "ctas_grid",
                        &["ID", "Title", "Status", "Priority", "Assignee", "Due"],
                        req.ctas
                            .iter()
                            .map(|c| {
                                vec![
                                    c.id.clone(),
                                    c.title.clone(),
                                    c.status.to_string(),
                                    c.priority.to_string(),
                                    c.assignee.clone(),
                                    date_text(c.due_date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::Meetings => artifact_grid(
                        ui,
                        "meetings_grid",
                        &["ID", "Title", "Status", "Organizer", "Date"],
                        req.meetings
                            .iter()
                            .map(|m| {
                                vec![
                                    m.id.clone(),
                                    m.title.clone(),
                                    m.status.to_string(),
                                    m.organizer.clone(),
                                    date_text(m.date),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::Stakeholders => artifact_grid(
                        ui,
                        "stakeholders_grid",
                        &["Name", "Role", "Email"],
                        req.stakeholders
                            .iter()
                            .map(|s| {
                                vec![
                                    s.name.clone(),
                                    s.role.clone(),
                                    s.email.clone().unwrap_or_default(),
                                ]
                            })
                            .collect(),
                    ),
                    DetailTab::Knowledge => {
                        artifact_grid(
                            ui,
                            "knowledge_grid",
                            &["Title", "File", "Size", "Uploaded"],
                            req.knowledge
                                .iter()
                                .map(|d| {
                                    vec![
                                        d.title.clone(),
                                        d.file_name.clone(),
                                        format!("{} KB", d.size_bytes.div_ceil(1024)),
                                        d.uploaded_at.format("%Y-%m-%d %H:%M").to_string(),
                                    ]
                                })
                                .collect(),
                        );
                        ui.separator();
                        ui.strong("Upload document");
                        egui::Grid::new("upload_form").num_columns(2).show(ui, |ui| {
                            ui.label("Title:");
                            ui.text_edit_singleline(&mut self.upload_title);
                            ui.end_row();
                            ui.label("File:");
                            ui.text_edit_singleline(&mut self.upload_path);
                            ui.end_row();
                        });
                        match progress {
                            Some(percent) if uploading => {
                                ui.add(
                                    egui::ProgressBar::new(percent as f32 / 100.0)
                                        .show_percentage()
                                        .animate(true),
                                );
                            }
                            _ => {
                                let ready = !self.upload_path.trim().is_empty();
                                if ui
                                    .add_enabled(ready && !uploading, egui::Button::new("⬆ Upload"))
                                    .clicked()
                                {
                                    self.pending.upload = true;
                                }
                            }
                        }
                    }
                });
            });
    }

    fn show_finder_results(&mut self, ctx: &egui::Context) {
        let query = self.finder_query.trim();
        if query.is_empty() {
            return;
        }
        let hits = find_nodes(self.store.tree(), query, self.store.config().finder_limit);

        egui::Window::new("🔍 Results")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::RIGHT_TOP, [-10.0, 40.0])
            .show(ctx, |ui| {
                if hits.is_empty() {
                    ui.label("No matches");
                    return;
                }
                for hit in &hits {
                    let icon = if hit.is_folder { "📁" } else { "📄" };
                    let response = ui.selectable_label(false, format!("{} {} {}", icon, hit.id, hit.name));
                    let response = if hit.path_label.is_empty() {
                        response
                    } else {
                        response.on_hover_text(&hit.path_label)
                    };
                    if response.clicked() {
                        self.pending.reveal = Some(hit.id.clone());
                    }
                }
            });
    }

    fn show_gap_window(&mut self, ctx: &egui::Context) {
        if !self.show_gap_window {
            return;
        }

        let mut open = true;
        let gap = self.store.gap();
        let stats = gap.stats();
        let threshold = gap.threshold();
        let accepted = gap.accepted_links().len();
        let items: Vec<UnlinkedItem> = gap.items().to_vec();
        let busy = self.store.busy().clone();
        let pending = &mut self.pending;

        egui::Window::new("🔗 Gap Analysis")
            .open(&mut open)
            .default_width(780.0)
            .show(ctx, |ui| {
                ui.label(format!(
                    "{} items · {} linked · {} unlinked · {} accepted · {} need a new requirement",
                    stats.total, stats.linked, stats.unlinked, stats.accepted, stats.needs_new_requirement
                ));
                ui.horizontal(|ui| {
                    if ui
                        .add_enabled(!busy.analyzing, egui::Button::new("Analyze all"))
                        .clicked()
                    {
                        pending.analyze = true;
                    }
                    if busy.analyzing {
                        ui.spinner();
                        ui.label("Analyzing...");
                    }
                    ui.separator();
                    if ui
                        .add_enabled(
                            !busy.linking && accepted > 0,
                            egui::Button::new(format!("Link accepted ({})", accepted)),
                        )
                        .clicked()
                    {
                        pending.link_accepted = true;
                    }
                    if busy.linking {
                        ui.spinner();
                    }
                    if busy.creating {
                        ui.spinner();
                        ui.label("Creating requirement...");
                    }
                });
                ui.separator();

                egui::ScrollArea::vertical().show(ui, |ui| {
                    egui::Grid::new("gap_grid")
                        .striped(true)
                        .num_columns(5)
                        .show(ui, |ui| {
                            for heading in ["Item", "Title", "Recommendation", "State", ""] {
                                ui.strong(heading);
                            }
                            ui.end_row();

                            for item in &items {
                                ui.label(format!("{} ({})", item.id, item.kind));
                                ui.label(&item.title);

                                match &item.recommendation {
                                    Some(rec) => {
                                        let color = if rec.score >= threshold {
                                            egui::Color32::from_rgb(76, 175, 80)
                                        } else {
                                            egui::Color32::GRAY
                                        };
                                        ui.colored_label(
                                            color,
                                            format!("{} {}%", rec.req_id, rec.score),
                                        )
                                        .on_hover_text(&rec.req_title);
                                    }
                                    None => match &item.draft {
                                        Some(draft) => {
                                            ui.colored_label(
                                                egui::Color32::YELLOW,
                                                format!("New: {}", draft.title),
                                            );
                                        }
                                        None => {
                                            ui.label("-");
                                        }
                                    },
                                }

                                let state = match (&item.linked_to, item.accepted) {
                                    (Some(target), _) => format!("✔ {}", target.req_id),
                                    (None, true) => "Accepted".to_string(),
                                    (None, false) => "Open".to_string(),
                                };
                                ui.label(state);

                                ui.horizontal(|ui| {
                                    if item.is_linked() {
                                        return;
                                    }
                                    if item.recommendation.is_some() {
                                        if !item.accepted && ui.small_button("Accept").clicked() {
                                            pending.accept = Some(item.id.clone());
                                        }
                                        if ui.small_button("Reject").clicked() {
                                            pending.reject = Some(item.id.clone());
                                        }
                                    } else if ui
                                        .add_enabled(
                                            !busy.creating,
                                            egui::Button::new("Create requirement").small(),
                                        )
                                        .clicked()
                                    {
                                        pending.create = Some(item.id.clone());
                                    }
                                });
                                ui.end_row();
                            }
                        });
                });
            });

        self.show_gap_window = open;
    }

    fn show_add_folder_window(&mut self, ctx: &egui::Context) {
        if !self.show_add_folder {
            return;
        }

        let parent = self
            .store
            .navigator()
            .current_folder()
            .map(|idx| self.store.tree().node(idx).name.clone())
            .unwrap_or_else(|| "root level".to_string());

        let mut open = true;
        egui::Window::new("New folder")
            .open(&mut open)
            .collapsible(false)
            .resizable(false)
            .show(ctx, |ui| {
                ui.label(format!("Inside: {}", parent));
                ui.horizontal(|ui| {
                    ui.label("Name:");
                    ui.text_edit_singleline(&mut self.folder_name);
                });
                ui.horizontal(|ui| {
                    let ready = !self.folder_name.trim().is_empty();
                    if ui.add_enabled(ready, egui::Button::new("Create")).clicked() {
                        self.pending.add_folder = true;
                    }
                    if ui.button("Cancel").clicked() {
                        self.show_add_folder = false;
                        self.folder_name.clear();
                    }
                });
            });
        if !open {
            self.show_add_folder = false;
        }
    }

    fn show_toasts(&mut self, ctx: &egui::Context) {
        self.store
            .notifications_mut()
            .expire(Utc::now(), chrono::Duration::seconds(TOAST_SECONDS));
        if self.store.notifications().is_empty() {
            return;
        }

        egui::Area::new(egui::Id::new("toasts"))
            .anchor(egui::Align2::RIGHT_BOTTOM, [-12.0, -12.0])
            .show(ctx, |ui| {
                for notification in self.store.notifications().iter() {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        ui.colored_label(level_color(notification.level), &notification.message);
                    });
                }
            });
    }

    fn apply_pending(&mut self) {
        let pending = std::mem::take(&mut self.pending);
        let store = &mut self.store;

        // Navigation
        if pending.drill_back {
            store.drill_back();
        }
        if let Some(depth) = pending.jump_to_depth {
            if depth == 0 {
                store.reset_navigation();
            } else {
                store.jump_to_depth(depth);
            }
        }
        if let Some(idx) = pending.activate {
            let result = store.activate(idx);
            report(store, result);
        }
        if let Some(id) = pending.reveal {
            let result = store.reveal(&id);
            if report(store, result).is_some() {
                self.finder_query.clear();
            }
        }
        if let Some(id) = pending.open_requirement {
            let result = store.request_load(&id);
            report(store, result);
        }

        // Table
        if let Some(id) = pending.toggle {
            store.toggle_expanded(&id);
        }
        if let Some(level) = pending.expand_level {
            store.expand_to_level(level);
        }
        if pending.expand_all {
            store.expand_all();
        }
        if pending.collapse_all {
            store.collapse_all();
        }
        if let Some(column) = pending.sort_by {
            let table = store.table_mut();
            table.sort = next_sort(table.sort.take(), column);
        }
        if pending.reset_widths {
            store.table_mut().layout.reset();
            self.table_epoch += 1;
        } else {
            let layout = &mut store.table_mut().layout;
            for (column, width) in pending.widths {
                if (layout.width(&column) - width).abs() > 0.5 {
                    layout.resize(&column, width);
                }
            }
        }
        for (column, needle) in pending.filters {
            store.table_mut().set_filter(column, needle.trim());
        }
        if pending.clear_filters {
            store.table_mut().clear_filters();
            self.filter_inputs.clear();
        }

        // Detail view
        if let Some(tab) = pending.tab {
            store.set_detail_tab(tab);
        }
        if pending.close_detail {
            store.clear_selection();
        }
        if pending.apply_tags {
            if let Some(id) = &self.detail_for {
                let tags: Vec<&str> = self.tags_input.split(',').collect();
                let result = store.set_tags(id, &tags);
                if let Some(applied) = report(store, result) {
                    store
                        .notifications_mut()
                        .success(format!("Tags of {} updated", id));
                    self.tags_input = applied.join(", ");
                }
            }
        }
        if pending.upload {
            if let Some(req_id) = self.detail_for.clone() {
                let path = PathBuf::from(self.upload_path.trim());
                match upload_metadata(&path, &self.upload_title) {
                    Ok((title, file_name, size)) => {
                        let result = store.request_upload(&req_id, &title, &file_name, size);
                        if report(store, result).is_some() {
                            self.upload_title.clear();
                            self.upload_path.clear();
                        }
                    }
                    Err(e) => store
                        .notifications_mut()
                        .warning(format!("Cannot read {}: {}", path.display(), e)),
                }
            }
        }

        // Tree edits
        if pending.add_folder {
            let parent = store
                .navigator()
                .current_folder()
                .map(|idx| store.tree().node(idx).id.clone());
            let result = store.add_folder(parent.as_deref(), &self.folder_name);
            if let Some(id) = report(store, result) {
                store
                    .notifications_mut()
                    .success(format!("Created folder {}", id));
                self.folder_name.clear();
                self.show_add_folder = false;
            }
        }

        // Gap analysis
        if pending.analyze {
            let result = store.request_recommendations(&[]);
            report(store, result);
        }
        if let Some(id) = pending.accept {
            let result = store.accept(&id);
            report(store, result);
        }
        if let Some(id) = pending.reject {
            let result = store.reject(&id);
            report(store, result);
        }
        if pending.link_accepted {
            let result = store.request_link_accepted();
            report(store, result);
        }
        if let Some(id) = pending.create {
            let result = store.request_create(&id);
            report(store, result);
        }

        if pending.save {
            self.save();
        }
    }

    fn save(&mut self) {
        let Some(path) = &self.fixtures_path else {
            self.store
                .notifications_mut()
                .warning("Demo data has no file to save to");
            return;
        };
        match save_workspace(path, &self.store.to_workspace()) {
            Ok(()) => {
                self.store.mark_saved();
                self.store
                    .notifications_mut()
                    .success(format!("Saved {}", path.display()));
            }
            Err(e) => self
                .store
                .notifications_mut()
                .push(NotificationLevel::Error, format!("Error saving: {:#}", e)),
        }
    }
}

impl eframe::App for DashboardApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.store.poll();
        self.drain_events(ctx);

        if ctx.input(|i| i.modifiers.command && i.key_pressed(egui::Key::S)) {
            self.pending.save = true;
        }

        self.show_top_panel(ctx);
        self.show_nav_panel(ctx);
        self.show_detail_panel(ctx);
        egui::CentralPanel::default().show(ctx, |ui| self.show_table(ui));
        self.show_finder_results(ctx);
        self.show_gap_window(ctx);
        self.show_add_folder_window(ctx);
        self.show_toasts(ctx);

        self.apply_pending();

        if self.store.busy().any() {
            ctx.request_repaint_after(Duration::from_millis(50));
        } else if !self.store.notifications().is_empty() {
            ctx.request_repaint_after(Duration::from_millis(500));
        }
    }
}

fn show_overview(ui: &mut egui::Ui, req: &Requirement) {
    egui::Grid::new("overview_grid").num_columns(2).show(ui, |ui| {
        ui.label("Owner:");
        ui.label(&req.owner);
        ui.end_row();
        ui.label("Priority:");
        ui.colored_label(priority_color(Some(req.priority)), req.priority.to_string());
        ui.end_row();
        ui.label("Status:");
        ui.colored_label(status_color(Some(req.status)), req.status.to_string());
        ui.end_row();
    });

    if !req.description.is_empty() {
        ui.add_space(6.0);
        ui.label(&req.description);
    }

    let summary = TraceabilitySummary::for_requirement(req, Utc::now().date_naive());
    ui.add_space(6.0);
    ui.strong("Traceability");
    match summary.pass_rate() {
        Some(rate) => {
            ui.add(
                egui::ProgressBar::new(rate as f32 / 100.0)
                    .text(format!("{}/{} tests passed", summary.tests_passed, summary.tests_total)),
            );
        }
        None => {
            ui.colored_label(egui::Color32::YELLOW, "No test cases");
        }
    }
    if summary.tests_failed > 0 {
        ui.colored_label(egui::Color32::RED, format!("✗ {} failing", summary.tests_failed));
    }
    ui.label(format!(
        "{} open tasks ({} overdue) · {} open issues · {} pending sign-offs",
        summary.open_tasks, summary.overdue_tasks, summary.open_issues, summary.pending_sign_offs
    ));

    if !req.linked_items.is_empty() {
        ui.add_space(6.0);
        ui.strong("Linked items");
        for item in &req.linked_items {
            ui.label(format!("{} ({}) {}", item.item_id, item.kind, item.title));
        }
    }
}

fn artifact_grid(ui: &mut egui::Ui, id: &str, headings: &[&str], rows: Vec<Vec<String>>) {
    if rows.is_empty() {
        ui.label("None");
        return;
    }
    egui::Grid::new(id)
        .striped(true)
        .num_columns(headings.len())
        .show(ui, |ui| {
            for heading in headings {
                ui.strong(*heading);
            }
            ui.end_row();
            for row in rows {
                for cell in row {
                    ui.label(cell);
                }
                ui.end_row();
            }
        });
}

/// Header clicks cycle ascending, descending, unsorted
fn next_sort(current: Option<SortSpec>, column: ColumnKey) -> Option<SortSpec> {
    match current {
        Some(spec) if spec.column == column && !spec.descending => Some(SortSpec {
            column,
            descending: true,
        }),
        Some(spec) if spec.column == column => None,
        _ => Some(SortSpec {
            column,
            descending: false,
        }),
    }
}

fn date_text(date: Option<chrono::NaiveDate>) -> String {
    date.map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_default()
}

/// Title, file name and size for a document upload
fn upload_metadata(path: &Path, title: &str) -> std::io::Result<(String, String, u64)> {
    let size = std::fs::metadata(path)?.len();
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.display().to_string());
    let title = match title.trim() {
        "" => file_name.clone(),
        t => t.to_string(),
    };
    Ok((title, file_name, size))
}
