use std::sync::Arc;

use rtm_core::{
    demo_workspace, load_workspace, save_workspace, BrokenPathPolicy, ColumnKey, DashboardStore,
    KeywordRecommender, MockServices, NavigationEvent, PathResolution, RtmConfig, RtmError,
    ServiceConfig, ServiceOp,
};
use tempfile::TempDir;

fn store_with(config: RtmConfig) -> DashboardStore {
    let mut store = DashboardStore::new(demo_workspace(), config).unwrap();
    *store.services_mut() =
        MockServices::new(ServiceConfig::immediate(), Arc::new(KeywordRecommender));
    store
}

fn store() -> DashboardStore {
    store_with(RtmConfig::default())
}

#[test]
fn test_finder_reveal_then_back_out() {
    let mut store = store();
    let events = store.subscribe();

    store.reveal("PR-AUTH").unwrap();
    let crumbs: Vec<String> = store
        .navigator()
        .breadcrumb(store.tree())
        .into_iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(crumbs, vec!["PRJ-PAY", "SC-ACC", "PR-AUTH"]);

    let ids: Vec<String> = store.visible_rows().into_iter().map(|r| r.id).collect();
    assert_eq!(ids, vec!["REQ-004", "REQ-005"]);

    assert!(store.jump_to_depth(1));
    assert_eq!(store.navigator().depth(), 1);
    store.reset_navigation();
    assert!(store.navigator().at_root());

    let received: Vec<NavigationEvent> = events.try_iter().collect();
    assert_eq!(
        received,
        vec![
            NavigationEvent::ContextChanged {
                folder: Some("PR-AUTH".into())
            },
            NavigationEvent::ContextChanged {
                folder: Some("PRJ-PAY".into())
            },
            NavigationEvent::ContextChanged { folder: None },
        ]
    );
}

#[test]
fn test_external_path_policies() {
    let broken = ["PRJ-PAY", "SC-ACC", "PR-GONE"];

    let mut store = store();
    let resolution = store.set_external_path(&broken).unwrap();
    assert_eq!(
        resolution,
        PathResolution::Truncated {
            broken_at: 2,
            missing_id: "PR-GONE".into()
        }
    );
    assert_eq!(store.navigator().depth(), 2);

    let mut store = store_with(RtmConfig {
        broken_path_policy: BrokenPathPolicy::ResetToRoot,
        ..RtmConfig::default()
    });
    store.set_external_path(&["PRJ-PAY"]).unwrap();
    let resolution = store.set_external_path(&broken).unwrap();
    assert!(matches!(resolution, PathResolution::ResetToRoot { .. }));
    assert!(store.navigator().at_root());

    let mut store = store_with(RtmConfig {
        broken_path_policy: BrokenPathPolicy::Reject,
        ..RtmConfig::default()
    });
    store.set_external_path(&["PRJ-PAY"]).unwrap();
    let err = store.set_external_path(&broken).unwrap_err();
    assert_eq!(
        err,
        RtmError::PathBroken {
            depth: 2,
            missing_id: "PR-GONE".into()
        }
    );
    assert_eq!(store.navigator().depth(), 1);
}

#[test]
fn test_filter_inside_entered_scope() {
    let mut store = store();
    store.set_external_path(&["PRJ-PAY", "SC-ACC"]).unwrap();
    store.expand_to_level(2);
    store.table_mut().set_filter(ColumnKey::Title, "lee park");

    let ids: Vec<String> = store.visible_rows().into_iter().map(|r| r.id).collect();
    // PR-STMT has no match and REQ-008 is by someone else
    assert_eq!(ids, vec!["PR-AUTH", "REQ-004", "REQ-005"]);
}

#[test]
fn test_gap_analysis_session() {
    let mut store = store();
    store.request_recommendations(&[]).unwrap();
    assert!(store.busy().analyzing);
    store.wait_all();

    let gap = store.gap();
    let task = gap.get("TASK-101").unwrap();
    assert_eq!(task.recommendation.as_ref().unwrap().req_id, "REQ-004");
    assert_eq!(task.score(), Some(70));
    assert!(task.accepted);

    let meeting = gap.get("MTG-501").unwrap();
    assert_eq!(meeting.recommendation.as_ref().unwrap().req_id, "REQ-003");
    assert!(meeting.accepted);

    let issue = gap.get("ISS-301").unwrap();
    assert!(!issue.accepted);
    assert!(issue.draft.is_some());

    // already linked items are left alone
    assert!(gap.get("TC-202").unwrap().recommendation.is_none());

    store.reject("MTG-501").unwrap();
    let linked = store.request_link_accepted().unwrap();
    assert_eq!(linked, 1);
    store.wait_all();

    assert!(store.gap().get("TASK-101").unwrap().is_linked());
    assert!(!store.gap().get("MTG-501").unwrap().is_linked());
    let req = store.catalog().require("REQ-004").unwrap();
    assert_eq!(req.linked_items.len(), 1);
    assert_eq!(req.linked_items[0].item_id, "TASK-101");

    // linking again reports the item as already linked
    store
        .request_link(&[("TASK-101".to_string(), "REQ-001".to_string())])
        .unwrap();
    store.wait_all();
    let task = store.gap().get("TASK-101").unwrap();
    assert_eq!(task.linked_to.as_ref().unwrap().req_id, "REQ-004");
    assert!(store
        .notifications()
        .iter()
        .any(|n| n.message.contains("Already linked: TASK-101")));
}

#[test]
fn test_rejected_recommendation_keeps_state() {
    let mut store = store();
    store
        .services_mut()
        .fail_next(ServiceOp::Recommend, "model offline");
    store.request_recommendations(&[]).unwrap();
    store.wait_all();

    assert!(store.gap().items().iter().all(|i| i.recommendation.is_none()));
    assert!(!store.busy().analyzing);
    let last = store.notifications().iter().last().unwrap();
    assert_eq!(last.message, "Recommend rejected: model offline");
}

#[test]
fn test_edits_survive_export() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("workspace.json");

    let mut store = store();
    let folder = store.add_folder(Some("FLD-001"), "Spikes").unwrap();
    store.set_tags("REQ-001", &["pci"]).unwrap();
    save_workspace(&path, &store.to_workspace()).unwrap();

    let reloaded = DashboardStore::new(load_workspace(&path).unwrap(), RtmConfig::default()).unwrap();
    let idx = reloaded.tree().find(&folder).unwrap();
    assert!(reloaded.tree().is_folder(idx));
    let req = reloaded.tree().find("REQ-001").unwrap();
    assert_eq!(reloaded.tree().node(req).tags, vec!["pci".to_string()]);
}
