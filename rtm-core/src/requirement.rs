//! Requirement records and the detail view model
//!
//! A requirement owns its artifacts by embedding; artifacts have no identity
//! outside their parent list.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RtmError, RtmResult};
use crate::models::{Priority, RequirementStatus};

macro_rules! status_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        #[serde(rename_all = "kebab-case")]
        pub enum $name {
            $($variant),+
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $($name::$variant => f.write_str($label)),+
                }
            }
        }
    };
}

status_enum!(
    /// Status of an implementation task
    TaskStatus { Todo => "To Do", InProgress => "In Progress", Blocked => "Blocked", Done => "Done" }
);
status_enum!(
    /// Result of the last test run
    TestCaseStatus { NotRun => "Not Run", Passed => "Passed", Failed => "Failed", Blocked => "Blocked" }
);
status_enum!(
    IssueStatus { Open => "Open", InProgress => "In Progress", Resolved => "Resolved", Closed => "Closed" }
);
status_enum!(
    SignOffStatus { Pending => "Pending", Approved => "Approved", Rejected => "Rejected" }
);
status_enum!(
    /// Call-to-action follow-up status
    CtaStatus { Open => "Open", Completed => "Completed" }
);
status_enum!(
    MeetingStatus { Scheduled => "Scheduled", Completed => "Completed", Cancelled => "Cancelled" }
);

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    pub status: TaskStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestCase {
    pub id: String,
    pub title: String,
    pub status: TestCaseStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub id: String,
    pub title: String,
    pub status: IssueStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignOff {
    pub id: String,
    /// Role that has to sign, e.g. "QA Lead"
    pub role: String,
    pub stakeholder: String,
    pub status: SignOffStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cta {
    pub id: String,
    pub title: String,
    pub status: CtaStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub assignee: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub due_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meeting {
    pub id: String,
    pub title: String,
    pub status: MeetingStatus,
    #[serde(default)]
    pub organizer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<NaiveDate>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stakeholder {
    pub name: String,
    pub role: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Knowledge-base document attached to a requirement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeDoc {
    pub id: String,
    pub title: String,
    pub file_name: String,
    pub size_bytes: u64,
    pub uploaded_at: DateTime<Utc>,
}

/// Reference to an item linked through gap analysis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkedItem {
    pub item_id: String,
    pub title: String,
    pub kind: String,
}

/// Full requirement record behind a leaf node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Requirement {
    /// Same string as the leaf node id
    pub req_id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub owner: String,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub status: RequirementStatus,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tasks: Vec<Task>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub test_cases: Vec<TestCase>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<Issue>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sign_offs: Vec<SignOff>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ctas: Vec<Cta>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub meetings: Vec<Meeting>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub stakeholders: Vec<Stakeholder>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub knowledge: Vec<KnowledgeDoc>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub linked_items: Vec<LinkedItem>,
}

impl Requirement {
    pub fn new(req_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            req_id: req_id.into(),
            title: title.into(),
            description: String::new(),
            owner: String::new(),
            priority: Priority::Medium,
            status: RequirementStatus::Draft,
            tasks: Vec::new(),
            test_cases: Vec::new(),
            issues: Vec::new(),
            sign_offs: Vec::new(),
            ctas: Vec::new(),
            meetings: Vec::new(),
            stakeholders: Vec::new(),
            knowledge: Vec::new(),
            linked_items: Vec::new(),
        }
    }

    /// Trailing number of the id, e.g. 7 for "REQ-007"
    pub fn number(&self) -> Option<u32> {
        trailing_number(&self.req_id)
    }
}

/// Parses the digits at the end of an id
pub fn trailing_number(id: &str) -> Option<u32> {
    let digits: String = id
        .chars()
        .rev()
        .take_while(|c| c.is_ascii_digit())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();
    digits.parse().ok()
}

/// Tabs of the detail panel
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DetailTab {
    #[default]
    Overview,
    Tasks,
    TestCases,
    Issues,
    SignOffs,
    Ctas,
    Meetings,
    Stakeholders,
    Knowledge,
}

impl DetailTab {
    pub const ALL: [DetailTab; 9] = [
        DetailTab::Overview,
        DetailTab::Tasks,
        DetailTab::TestCases,
        DetailTab::Issues,
        DetailTab::SignOffs,
        DetailTab::Ctas,
        DetailTab::Meetings,
        DetailTab::Stakeholders,
        DetailTab::Knowledge,
    ];

    /// Parses a tab name such as "test-cases" or "signoffs"
    pub fn parse(s: &str) -> Option<DetailTab> {
        let key: String = s
            .chars()
            .filter(|c| c.is_ascii_alphanumeric())
            .collect::<String>()
            .to_lowercase();
        match key.as_str() {
            "overview" => Some(DetailTab::Overview),
            "tasks" => Some(DetailTab::Tasks),
            "testcases" | "tests" => Some(DetailTab::TestCases),
            "issues" => Some(DetailTab::Issues),
            "signoffs" => Some(DetailTab::SignOffs),
            "ctas" => Some(DetailTab::Ctas),
            "meetings" => Some(DetailTab::Meetings),
            "stakeholders" => Some(DetailTab::Stakeholders),
            "knowledge" | "kb" => Some(DetailTab::Knowledge),
            _ => None,
        }
    }

    /// Number of entries the tab lists; `None` for the overview
    pub fn count(&self, req: &Requirement) -> Option<usize> {
        match self {
            DetailTab::Overview => None,
            DetailTab::Tasks => Some(req.tasks.len()),
            DetailTab::TestCases => Some(req.test_cases.len()),
            DetailTab::Issues => Some(req.issues.len()),
            DetailTab::SignOffs => Some(req.sign_offs.len()),
            DetailTab::Ctas => Some(req.ctas.len()),
            DetailTab::Meetings => Some(req.meetings.len()),
            DetailTab::Stakeholders => Some(req.stakeholders.len()),
            DetailTab::Knowledge => Some(req.knowledge.len()),
        }
    }

    /// Label with count, e.g. "Tasks (3)"
    pub fn label(&self, req: &Requirement) -> String {
        match self.count(req) {
            Some(n) => format!("{} ({})", self, n),
            None => self.to_string(),
        }
    }
}

impl fmt::Display for DetailTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DetailTab::Overview => write!(f, "Overview"),
            DetailTab::Tasks => write!(f, "Tasks"),
            DetailTab::TestCases => write!(f, "Test Cases"),
            DetailTab::Issues => write!(f, "Issues"),
            DetailTab::SignOffs => write!(f, "Sign-offs"),
            DetailTab::Ctas => write!(f, "CTAs"),
            DetailTab::Meetings => write!(f, "Meetings"),
            DetailTab::Stakeholders => write!(f, "Stakeholders"),
            DetailTab::Knowledge => write!(f, "Knowledge Base"),
        }
    }
}

/// Traceability health of one requirement
#[derive(Debug, Clone, PartialEq)]
pub struct TraceabilitySummary {
    pub tests_total: usize,
    pub tests_passed: usize,
    pub tests_failed: usize,
    pub open_tasks: usize,
    pub overdue_tasks: usize,
    pub open_issues: usize,
    pub pending_sign_offs: usize,
}

impl TraceabilitySummary {
    /// Summarizes `req` as of `today`
    pub fn for_requirement(req: &Requirement, today: NaiveDate) -> Self {
        let open_tasks: Vec<&Task> = req
            .tasks
            .iter()
            .filter(|t| t.status != TaskStatus::Done)
            .collect();
        Self {
            tests_total: req.test_cases.len(),
            tests_passed: req
                .test_cases
                .iter()
                .filter(|t| t.status == TestCaseStatus::Passed)
                .count(),
            tests_failed: req
                .test_cases
                .iter()
                .filter(|t| t.status == TestCaseStatus::Failed)
                .count(),
            open_tasks: open_tasks.len(),
            overdue_tasks: open_tasks
                .iter()
                .filter(|t| t.due_date.map(|d| d < today).unwrap_or(false))
                .count(),
            open_issues: req
                .issues
                .iter()
                .filter(|i| matches!(i.status, IssueStatus::Open | IssueStatus::InProgress))
                .count(),
            pending_sign_offs: req
                .sign_offs
                .iter()
                .filter(|s| s.status == SignOffStatus::Pending)
                .count(),
        }
    }

    /// Passed tests as a percentage, `None` without tests
    pub fn pass_rate(&self) -> Option<u8> {
        if self.tests_total == 0 {
            return None;
        }
        Some(((self.tests_passed * 100) / self.tests_total) as u8)
    }
}

/// All requirement records, in fixture order
#[derive(Debug, Clone, Default)]
pub struct RequirementCatalog {
    requirements: Vec<Requirement>,
}

impl RequirementCatalog {
    pub fn new(requirements: Vec<Requirement>) -> Self {
        Self { requirements }
    }

    pub fn all(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn get(&self, req_id: &str) -> Option<&Requirement> {
        self.requirements.iter().find(|r| r.req_id == req_id)
    }

    pub fn require(&self, req_id: &str) -> RtmResult<&Requirement> {
        self.get(req_id)
            .ok_or_else(|| RtmError::RequirementNotFound(req_id.to_string()))
    }

    pub fn get_mut(&mut self, req_id: &str) -> RtmResult<&mut Requirement> {
        self.requirements
            .iter_mut()
            .find(|r| r.req_id == req_id)
            .ok_or_else(|| RtmError::RequirementNotFound(req_id.to_string()))
    }

    /// Adds or replaces a record
    pub fn upsert(&mut self, requirement: Requirement) {
        match self
            .requirements
            .iter_mut()
            .find(|r| r.req_id == requirement.req_id)
        {
            Some(existing) => *existing = requirement,
            None => self.requirements.push(requirement),
        }
    }

    /// Highest trailing number among requirement ids
    pub fn max_number(&self) -> u32 {
        self.requirements
            .iter()
            .filter_map(|r| r.number())
            .max()
            .unwrap_or(0)
    }
}
