pub mod config;
pub mod error;
pub mod finder;
pub mod fixtures;
pub mod gap;
pub mod ids;
pub mod models;
pub mod navigation;
pub mod notify;
pub mod requirement;
pub mod service;
pub mod store;
pub mod table;
pub mod tree;

// Re-export commonly used types
pub use config::{get_config_path, RtmConfig};
pub use error::{ErrorKind, RtmError, RtmResult};
pub use finder::{find_nodes, FinderHit};
pub use fixtures::{
    demo_workspace, load_or_demo, load_workspace, save_workspace, FixtureFormat, Workspace,
};
pub use gap::{
    GapAction, GapAnalysis, GapOutcome, GapStats, ItemKind, KeywordRecommender, LinkReport,
    LinkTarget, Recommendation, Recommender, RequirementCategory, RequirementDraft,
    UnlinkedItem, DEFAULT_MATCH_THRESHOLD,
};
pub use ids::IdGenerator;
pub use models::{
    LeafDetails, NavigationNode, NodeBody, NodeType, Priority, RequirementStatus, ScopeStatus,
};
pub use navigation::{
    Activation, BrokenPathPolicy, Crumb, DrillNavigator, NavigationEvent, PathResolution,
};
pub use notify::{Notification, NotificationCenter, NotificationLevel};
pub use requirement::{DetailTab, Requirement, RequirementCatalog, TraceabilitySummary};
pub use service::{BusyFlags, MockServices, PendingOp, ServiceConfig, ServiceOp};
pub use store::DashboardStore;
pub use table::{
    cell_text, ColumnFilter, ColumnKey, ColumnLayout, ExpansionState, RowKind, RowView, SortSpec,
    TableModel,
};
pub use tree::{NavTree, NodeIdx, NodeSlot};
