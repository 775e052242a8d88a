//! Fixture loading and export
//!
//! A workspace file holds the navigation forest, the requirement records and
//! the unlinked items. YAML or JSON is picked from the file extension.

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::RtmConfig;
use crate::gap::{ItemKind, LinkTarget, UnlinkedItem};
use crate::models::{
    LeafDetails, NavigationNode, NodeType, Priority, RequirementStatus, ScopeStatus,
};
use crate::requirement::{
    Cta, CtaStatus, Issue, IssueStatus, Meeting, MeetingStatus, Requirement, SignOff,
    SignOffStatus, Stakeholder, Task, TaskStatus, TestCase, TestCaseStatus,
};

/// Fixture file name looked up in the working directory
pub const LOCAL_FIXTURES_FILE: &str = "rtm.yaml";

/// Everything the dashboard loads at startup
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Workspace {
    #[serde(default)]
    pub forest: Vec<NavigationNode>,
    #[serde(default)]
    pub requirements: Vec<Requirement>,
    #[serde(default)]
    pub unlinked_items: Vec<UnlinkedItem>,
}

/// On-disk encoding of a workspace
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixtureFormat {
    Yaml,
    Json,
}

impl FixtureFormat {
    /// Infers the format from the file extension, YAML by default
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => FixtureFormat::Json,
            Some("yaml") | Some("yml") => FixtureFormat::Yaml,
            _ => FixtureFormat::Yaml,
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "yaml" | "yml" => Some(FixtureFormat::Yaml),
            "json" => Some(FixtureFormat::Json),
            _ => None,
        }
    }
}

/// Serializes a workspace in the given format
pub fn workspace_to_string(workspace: &Workspace, format: FixtureFormat) -> Result<String> {
    match format {
        FixtureFormat::Yaml => {
            serde_yaml::to_string(workspace).context("Failed to serialize workspace as YAML")
        }
        FixtureFormat::Json => serde_json::to_string_pretty(workspace)
            .context("Failed to serialize workspace as JSON"),
    }
}

/// Parses a workspace in the given format
pub fn workspace_from_str(content: &str, format: FixtureFormat) -> Result<Workspace> {
    match format {
        FixtureFormat::Yaml => {
            serde_yaml::from_str(content).context("Failed to parse YAML workspace")
        }
        FixtureFormat::Json => {
            serde_json::from_str(content).context("Failed to parse JSON workspace")
        }
    }
}

/// Loads a workspace file
pub fn load_workspace<P: AsRef<Path>>(path: P) -> Result<Workspace> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixtures file: {:?}", path))?;
    let workspace = workspace_from_str(&content, FixtureFormat::from_path(path))
        .with_context(|| format!("Invalid fixtures file: {:?}", path))?;
    log::info!(
        "loaded {} requirements and {} unlinked items from {:?}",
        workspace.requirements.len(),
        workspace.unlinked_items.len(),
        path
    );
    Ok(workspace)
}

/// Writes a workspace file, creating parent directories as needed
pub fn save_workspace<P: AsRef<Path>>(path: P, workspace: &Workspace) -> Result<()> {
    let path = path.as_ref();
    let content = workspace_to_string(workspace, FixtureFormat::from_path(path))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    fs::write(path, content)
        .with_context(|| format!("Failed to write fixtures to {:?}", path))?;
    Ok(())
}

/// Picks the fixtures file to load
///
/// Order: explicit path, `RTM_FIXTURES`, the config entry, then `rtm.yaml`
/// in the working directory. `None` means the built-in demo data.
pub fn resolve_fixtures_path(explicit: Option<&Path>, config: &RtmConfig) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Ok(path) = std::env::var("RTM_FIXTURES") {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    if let Some(path) = &config.fixtures_path {
        return Some(PathBuf::from(path));
    }
    let local = PathBuf::from(LOCAL_FIXTURES_FILE);
    if local.exists() {
        return Some(local);
    }
    None
}

/// Loads the resolved fixtures file, or the demo workspace when there is none
pub fn load_or_demo(explicit: Option<&Path>, config: &RtmConfig) -> Result<(Workspace, Option<PathBuf>)> {
    match resolve_fixtures_path(explicit, config) {
        Some(path) => Ok((load_workspace(&path)?, Some(path))),
        None => {
            log::info!("no fixtures file found, using demo workspace");
            Ok((demo_workspace(), None))
        }
    }
}

fn date(y: i32, m: u32, d: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(y, m, d)
}

fn leaf(
    id: &str,
    name: &str,
    status: RequirementStatus,
    priority: Priority,
    created_by: &str,
    phase: &str,
    coverage: u8,
) -> NavigationNode {
    NavigationNode::leaf(
        id,
        name,
        LeafDetails {
            requirement_status: Some(status),
            priority: Some(priority),
            created_by: Some(created_by.to_string()),
            created_on: date(2024, 3, 4),
            phase: Some(phase.to_string()),
            coverage: Some(coverage),
        },
    )
}

fn task(id: &str, title: &str, status: TaskStatus, assignee: &str, due: Option<NaiveDate>) -> Task {
    Task {
        id: id.to_string(),
        title: title.to_string(),
        status,
        priority: Priority::Medium,
        assignee: assignee.to_string(),
        due_date: due,
    }
}

fn test_case(id: &str, title: &str, status: TestCaseStatus, assignee: &str) -> TestCase {
    TestCase {
        id: id.to_string(),
        title: title.to_string(),
        status,
        priority: Priority::High,
        assignee: assignee.to_string(),
        due_date: None,
    }
}

fn sign_off(id: &str, role: &str, stakeholder: &str, status: SignOffStatus) -> SignOff {
    SignOff {
        id: id.to_string(),
        role: role.to_string(),
        stakeholder: stakeholder.to_string(),
        status,
        due_date: date(2024, 6, 28),
    }
}

fn stakeholder(name: &str, role: &str) -> Stakeholder {
    Stakeholder {
        name: name.to_string(),
        role: role.to_string(),
        email: None,
    }
}

fn requirement(
    id: &str,
    title: &str,
    description: &str,
    owner: &str,
    priority: Priority,
    status: RequirementStatus,
) -> Requirement {
    let mut req = Requirement::new(id, title);
    req.description = description.to_string();
    req.owner = owner.to_string();
    req.priority = priority;
    req.status = status;
    req
}

/// Small built-in data set used when no fixtures file is configured
pub fn demo_workspace() -> Workspace {
    use Priority::*;
    use RequirementStatus as RS;

    let forest = vec![NavigationNode::folder(
        "PRJ-PAY",
        "Payments Platform",
        NodeType::Project,
        vec![
            NavigationNode::folder(
                "SC-CHK",
                "Checkout",
                NodeType::Scope,
                vec![
                    NavigationNode::folder(
                        "PR-CARD",
                        "Card payments",
                        NodeType::Process,
                        vec![
                            leaf("REQ-001", "Accept card payments", RS::Implemented, Critical, "Dana Whitfield", "Build", 85),
                            leaf("REQ-002", "Tokenize stored cards", RS::Approved, High, "Sam Okafor", "Design", 40),
                        ],
                    ),
                    NavigationNode::folder(
                        "PR-WAL",
                        "Digital wallets",
                        NodeType::Process,
                        vec![leaf("REQ-003", "Support wallet checkout", RS::InReview, Medium, "Dana Whitfield", "Design", 0)],
                    ),
                ],
            )
            .with_tags(&["q3", "revenue"]),
            NavigationNode::folder(
                "SC-ACC",
                "Accounts",
                NodeType::Scope,
                vec![
                    NavigationNode::folder(
                        "PR-AUTH",
                        "Authentication",
                        NodeType::Process,
                        vec![
                            leaf("REQ-004", "Password reset via email", RS::Verified, High, "Lee Park", "Test", 100),
                            leaf("REQ-005", "Two-factor login", RS::Draft, High, "Lee Park", "Discovery", 0),
                        ],
                    ),
                    NavigationNode::folder(
                        "PR-STMT",
                        "Statements",
                        NodeType::Process,
                        vec![leaf("REQ-006", "Export monthly statements", RS::Approved, Low, "Sam Okafor", "Build", 60)],
                    ),
                    leaf("REQ-008", "Audit log retention", RS::InReview, Medium, "Priya Nair", "Design", 20),
                ],
            ),
            NavigationNode::folder(
                "SC-LEG",
                "Legacy migration",
                NodeType::Scope,
                vec![leaf("REQ-007", "Import legacy ledgers", RS::Rejected, Low, "Priya Nair", "Discovery", 0)],
            )
            .with_status(ScopeStatus::OutOfScope),
            NavigationNode::folder("FLD-001", "Backlog", NodeType::Folder, Vec::new()),
        ],
    )];

    let mut req1 = requirement(
        "REQ-001",
        "Accept card payments",
        "Checkout accepts Visa and Mastercard card payments with a clear error when a card is declined.",
        "Dana Whitfield",
        Critical,
        RS::Implemented,
    );
    req1.tasks = vec![
        task("TASK-001", "Integrate card processor SDK", TaskStatus::Done, "Sam Okafor", date(2024, 4, 12)),
        task("TASK-002", "Handle 3-D Secure challenge", TaskStatus::InProgress, "Sam Okafor", date(2024, 5, 20)),
    ];
    req1.test_cases = vec![
        test_case("TC-001", "Successful Visa payment", TestCaseStatus::Passed, "Lee Park"),
        test_case("TC-002", "Expired card rejected", TestCaseStatus::Passed, "Lee Park"),
        test_case("TC-003", "3-D Secure challenge completes", TestCaseStatus::Failed, "Lee Park"),
    ];
    req1.issues = vec![Issue {
        id: "ISS-001".into(),
        title: "Duplicate charge on double click".into(),
        status: IssueStatus::Open,
        priority: Critical,
        assignee: "Sam Okafor".into(),
        due_date: date(2024, 5, 31),
    }];
    req1.sign_offs = vec![
        sign_off("SO-001", "QA Lead", "Lee Park", SignOffStatus::Approved),
        sign_off("SO-002", "Product Owner", "Dana Whitfield", SignOffStatus::Pending),
    ];
    req1.ctas = vec![Cta {
        id: "CTA-001".into(),
        title: "Confirm processor fee schedule".into(),
        status: CtaStatus::Open,
        priority: Medium,
        assignee: "Dana Whitfield".into(),
        due_date: date(2024, 6, 14),
    }];
    req1.meetings = vec![Meeting {
        id: "MTG-001".into(),
        title: "Card payments design review".into(),
        status: MeetingStatus::Completed,
        organizer: "Dana Whitfield".into(),
        date: date(2024, 3, 18),
    }];
    req1.stakeholders = vec![
        stakeholder("Dana Whitfield", "Product Owner"),
        stakeholder("Lee Park", "QA Lead"),
    ];

    let mut req2 = requirement(
        "REQ-002",
        "Tokenize stored cards",
        "Stored card numbers are replaced by processor tokens and never written to our database.",
        "Sam Okafor",
        High,
        RS::Approved,
    );
    req2.tasks = vec![task("TASK-003", "Migrate saved cards to tokens", TaskStatus::Todo, "Sam Okafor", date(2024, 7, 1))];
    req2.test_cases = vec![test_case("TC-004", "No PAN in database dump", TestCaseStatus::NotRun, "Lee Park")];
    req2.sign_offs = vec![sign_off("SO-003", "Security Officer", "Priya Nair", SignOffStatus::Pending)];

    let mut req3 = requirement(
        "REQ-003",
        "Support wallet checkout",
        "Shoppers can pay with Apple Pay or Google Pay during checkout.",
        "Dana Whitfield",
        Medium,
        RS::InReview,
    );
    req3.meetings = vec![Meeting {
        id: "MTG-002".into(),
        title: "Wallet provider onboarding".into(),
        status: MeetingStatus::Scheduled,
        organizer: "Dana Whitfield".into(),
        date: date(2024, 7, 9),
    }];

    let mut req4 = requirement(
        "REQ-004",
        "Password reset via email",
        "Users can reset a forgotten password through a link sent by email.",
        "Lee Park",
        High,
        RS::Verified,
    );
    req4.test_cases = vec![
        test_case("TC-005", "Reset link expires after one hour", TestCaseStatus::Passed, "Lee Park"),
        test_case("TC-006", "Reset link is single use", TestCaseStatus::Passed, "Lee Park"),
    ];
    req4.sign_offs = vec![sign_off("SO-004", "QA Lead", "Lee Park", SignOffStatus::Approved)];

    let mut req5 = requirement(
        "REQ-005",
        "Two-factor login",
        "Users confirm login with a one-time code sent by SMS or an authenticator app.",
        "Lee Park",
        High,
        RS::Draft,
    );
    req5.ctas = vec![Cta {
        id: "CTA-002".into(),
        title: "Choose SMS provider".into(),
        status: CtaStatus::Open,
        priority: High,
        assignee: "Lee Park".into(),
        due_date: date(2024, 5, 3),
    }];

    let mut req6 = requirement(
        "REQ-006",
        "Export monthly statements",
        "Account holders download a PDF or CSV statement for any past month.",
        "Sam Okafor",
        Low,
        RS::Approved,
    );
    req6.tasks = vec![task("TASK-004", "CSV statement writer", TaskStatus::Blocked, "Priya Nair", date(2024, 4, 30))];

    let mut req7 = requirement(
        "REQ-007",
        "Import legacy ledgers",
        "Balances from the legacy ledger system are imported once at cut-over.",
        "Priya Nair",
        Low,
        RS::Rejected,
    );
    req7.stakeholders = vec![stakeholder("Priya Nair", "Finance Lead")];

    let mut req8 = requirement(
        "REQ-008",
        "Audit log retention",
        "Audit logs of payment and account changes are retained for seven years.",
        "Priya Nair",
        Medium,
        RS::InReview,
    );
    req8.sign_offs = vec![sign_off("SO-005", "Compliance Officer", "Priya Nair", SignOffStatus::Pending)];

    let unlinked_items = vec![
        UnlinkedItem::new("TASK-101", ItemKind::Task, "Password reset email template")
            .with_description("Design the email sent for password reset"),
        UnlinkedItem::new("TC-201", ItemKind::TestCase, "Card payment declined flow")
            .with_description("Verify a declined card shows an error"),
        UnlinkedItem::new("ISS-301", ItemKind::Issue, "Checkout crashes on resize")
            .with_description("Layout breaks and the app crashes on small screens"),
        UnlinkedItem::new("DOC-401", ItemKind::Document, "GDPR retention policy")
            .with_description("Retention periods for audit logs"),
        UnlinkedItem::new("MTG-501", ItemKind::Meeting, "Wallet checkout review")
            .with_description("Review wallet checkout scope with product"),
        UnlinkedItem::new("TASK-102", ItemKind::Task, "Slow statement export")
            .with_description("Export takes minutes for large accounts"),
        UnlinkedItem {
            linked_to: Some(LinkTarget::from_requirement(&req2)),
            ..UnlinkedItem::new("TC-202", ItemKind::TestCase, "Token vault failover")
        },
    ]
    .into_iter()
    .map(|mut item| {
        item.source = match item.kind {
            ItemKind::Issue => "Issue tracker".to_string(),
            ItemKind::Document => "Knowledge base".to_string(),
            ItemKind::Meeting => "Calendar".to_string(),
            _ => "Sprint board".to_string(),
        };
        item
    })
    .collect();

    Workspace {
        forest,
        requirements: vec![req1, req2, req3, req4, req5, req6, req7, req8],
        unlinked_items,
    }
}
