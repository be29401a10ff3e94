//! Planner integration tests over literal JSON snapshots.

use std::io::Write;

use vpa_disruption::{InPlaceDecision, RecordingEventSink};
use vpa_state::{AttemptStore, MemoryAttemptStore, RedbAttemptStore};
use vpa_types::UpdaterConfig;
use vpa_updater::{PlanAction, Snapshot, run_plan, seed_attempts};

fn snapshot(mode: &str, pods: &str, attempts: &str, now: u64) -> Snapshot {
    let json = format!(
        r#"{{
            "policy": {{
                "name": "web",
                "updatePolicy": {{"updateMode": "{mode}"}},
                "recommendations": [{{"containerName": "app", "target": {{"cpu": "500m"}}}}]
            }},
            "controllers": [{{"kind": "ReplicaSet", "name": "web-7d9", "replicas": 3}}],
            "pods": [{pods}],
            "attempts": {{{attempts}}},
            "now": {now}
        }}"#
    );
    Snapshot::from_json_str(&json).unwrap()
}

fn pod(name: &str, condition: &str) -> String {
    format!(
        r#"{{
            "metadata": {{
                "name": "{name}",
                "ownerReferences": [{{"kind": "ReplicaSet", "name": "web-7d9", "controller": true}}]
            }},
            "spec": {{"containers": [{{"name": "app", "resources": {{"requests": {{"cpu": "250m"}}}}}}]}},
            "status": {{"conditions": [{condition}]}}
        }}"#
    )
}

fn three_idle_pods() -> String {
    ["web-0", "web-1", "web-2"]
        .iter()
        .map(|n| pod(n, ""))
        .collect::<Vec<_>>()
        .join(",")
}

async fn plan(snapshot: &Snapshot) -> vpa_updater::PlanReport {
    let attempts = seed_attempts(snapshot, None).unwrap();
    run_plan(snapshot, &UpdaterConfig::default(), attempts, &RecordingEventSink::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn evict_mode_spends_the_budget_once() {
    let report = plan(&snapshot("Recreate", &three_idle_pods(), "", 0)).await;

    let actions: Vec<_> = report.entries.iter().map(|e| e.action).collect();
    assert_eq!(actions, vec![PlanAction::Evict, PlanAction::Skip, PlanAction::Skip]);
    assert_eq!(report.groups.len(), 1);
    assert_eq!(report.groups[0].stats.evicted, 1);
    assert!(
        report.entries[1]
            .detail
            .as_deref()
            .unwrap()
            .contains("budget exceeded")
    );
}

#[tokio::test]
async fn in_place_mode_resizes_within_budget() {
    let report = plan(&snapshot("InPlace", &three_idle_pods(), "", 0)).await;

    assert_eq!(report.count(PlanAction::ResizeInPlace), 1);
    assert_eq!(report.entries[0].decision, Some(InPlaceDecision::Approved));
    assert_eq!(report.entries[1].decision, Some(InPlaceDecision::Deferred));
    assert_eq!(report.groups[0].stats.in_place_update_initiated, 1);
}

#[tokio::test]
async fn stalled_resize_is_planned_as_fallback_eviction() {
    let stuck = pod("web-0", r#"{"type": "PodResizeInProgress", "status": "True"}"#);
    let pods = format!("{stuck},{},{}", pod("web-1", ""), pod("web-2", ""));
    let two_hours = 2 * 3600 * 1000;
    let report = plan(&snapshot("InPlaceOrRecreate", &pods, r#""default/web-0": 0"#, two_hours)).await;

    assert_eq!(report.entries[0].decision, Some(InPlaceDecision::Evict));
    assert_eq!(report.entries[0].action, PlanAction::FallbackEvict);
    assert_eq!(report.groups[0].stats.evicted, 1);
    assert_eq!(report.count(PlanAction::ResizeInPlace), 0);
}

#[tokio::test]
async fn json_report_shape() {
    let report = plan(&snapshot("Recreate", &three_idle_pods(), "", 0)).await;
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["policy"], "default/web");
    assert_eq!(json["entries"][0]["action"], "evict");
    assert_eq!(json["groups"][0]["owner"]["kind"], "ReplicaSet");
    assert!(json["entries"][0].get("decision").is_none());
}

#[tokio::test]
async fn stale_attempts_of_vanished_pods_are_pruned() {
    let day = 24 * 3600 * 1000;
    let report = plan(&snapshot(
        "InPlace",
        &three_idle_pods(),
        r#""default/gone": 0, "default/web-1": 0"#,
        day,
    ))
    .await;
    assert_eq!(report.pruned_attempts, 1);
}

#[test]
fn snapshot_file_and_persisted_attempts_are_loaded() {
    let dir = tempfile::tempdir().unwrap();

    let snapshot_path = dir.path().join("pass.json");
    let mut file = std::fs::File::create(&snapshot_path).unwrap();
    write!(file, r#"{{"policy": {{"name": "web"}}, "attempts": {{"default/web-0": 1000}}}}"#).unwrap();
    let snapshot = Snapshot::from_file(&snapshot_path).unwrap();

    let store = RedbAttemptStore::open(&dir.path().join("attempts.redb")).unwrap();
    store
        .record("default/web-1", std::time::UNIX_EPOCH)
        .unwrap();

    let seeded: MemoryAttemptStore = seed_attempts(&snapshot, Some(&store)).unwrap();
    assert_eq!(seeded.entries().unwrap().len(), 2);
    assert!(store.get("default/web-0").unwrap().is_none());
}

#[test]
fn missing_snapshot_file_is_an_error() {
    let err = Snapshot::from_file(std::path::Path::new("/nonexistent/pass.json")).unwrap_err();
    assert!(err.to_string().contains("failed to read snapshot"));
}
