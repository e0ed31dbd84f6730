mod common;

use cloudplug_engine::CloudError;
use cloudplug_tencent::cbs::{
    DISK_STATE_ATTACHED, DISK_STATE_ATTACHING, DISK_STATE_DETACHING, DISK_STATE_UNATTACHED,
};
use common::{FakeCloud, PROVIDER_PARAMS, invoke, outputs};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::time::Instant;

fn volume(guid: &str, disk_type: &str) -> Value {
    json!({
        "callbackParameter": format!("cb-{}", guid),
        "guid": guid,
        "provider_params": PROVIDER_PARAMS,
        "disk_type": disk_type,
        "disk_size": "50",
        "disk_charge_type": "POSTPAID_BY_HOUR",
        "instance_id": "ins-1",
    })
}

fn existing(guid: &str, id: &str) -> Value {
    let mut input = volume(guid, "CLOUD_PREMIUM");
    input["id"] = json!(id);
    input
}

fn termination(guid: &str, id: &str) -> Value {
    json!({ "guid": guid, "provider_params": PROVIDER_PARAMS, "id": id })
}

#[tokio::test(start_paused = true)]
async fn test_create_reports_every_item_outcome() {
    let cloud = FakeCloud::new();
    let registry = cloud.registry();

    let report = invoke(
        &registry,
        "storage",
        "create",
        json!([
            volume("g1", "CLOUD_PREMIUM"),
            volume("g2", ""),
            volume("g3", "CLOUD_SSD"),
        ]),
    )
    .await;

    assert!(matches!(report.error, Some(CloudError::Validation(_))));

    let outputs = outputs(&report);
    assert_eq!(outputs.len(), 3);

    assert_eq!(outputs[0]["errorCode"], "0");
    assert_eq!(outputs[0]["guid"], "g1");
    assert_eq!(outputs[0]["id"], "disk-1");
    assert_eq!(outputs[0]["callbackParameter"], "cb-g1");

    assert_eq!(outputs[1]["errorCode"], "1");
    assert_eq!(outputs[1]["guid"], "g2");
    assert!(
        outputs[1]["errorMessage"]
            .as_str()
            .unwrap()
            .contains("DiskType is empty")
    );
    assert!(outputs[1].get("id").is_none());

    assert_eq!(outputs[2]["errorCode"], "0");
    assert_eq!(outputs[2]["id"], "disk-2");

    assert_eq!(cloud.count("cbs.CreateDisks"), 2);
    assert_eq!(cloud.count("cbs.AttachDisks"), 2);

    let disk = cloud.disk("disk-1").unwrap();
    assert_eq!(disk.disk_state, DISK_STATE_ATTACHED);
    assert_eq!(disk.instance_id, "ins-1");
}

#[tokio::test(start_paused = true)]
async fn test_create_with_attached_id_is_idempotent() {
    let cloud = FakeCloud::new();
    cloud.with_disk("disk-9", DISK_STATE_ATTACHED, "ins-1");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([existing("g1", "disk-9")]),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(outputs(&report)[0]["id"], "disk-9");
    assert_eq!(cloud.count("cbs.CreateDisks"), 0);
    assert_eq!(cloud.count("cbs.AttachDisks"), 0);
}

#[tokio::test(start_paused = true)]
async fn test_create_with_unattached_id_only_attaches() {
    let cloud = FakeCloud::new();
    cloud.with_disk("disk-9", DISK_STATE_UNATTACHED, "");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([existing("g1", "disk-9")]),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(cloud.count("cbs.CreateDisks"), 0);
    assert_eq!(cloud.count("cbs.AttachDisks"), 1);
    assert_eq!(cloud.disk("disk-9").unwrap().instance_id, "ins-1");
}

#[tokio::test(start_paused = true)]
async fn test_attach_conflict_issues_no_mutation() {
    let cloud = FakeCloud::new();
    cloud.with_disk("disk-9", DISK_STATE_ATTACHED, "ins-other");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([existing("g1", "disk-9")]),
    )
    .await;

    assert!(matches!(report.error, Some(CloudError::Conflict { .. })));
    let outputs = outputs(&report);
    assert_eq!(outputs[0]["errorCode"], "1");
    assert!(
        outputs[0]["errorMessage"]
            .as_str()
            .unwrap()
            .contains("already attached to ins-other")
    );
    assert_eq!(cloud.count("cbs.AttachDisks"), 0);
    assert_eq!(cloud.count("cbs.DetachDisks"), 0);
    assert_eq!(cloud.disk("disk-9").unwrap().instance_id, "ins-other");
}

#[tokio::test(start_paused = true)]
async fn test_create_timeout_keeps_assigned_id() {
    let cloud = FakeCloud::new();
    cloud.pending_polls(25);

    let started = Instant::now();
    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([volume("g1", "CLOUD_PREMIUM")]),
    )
    .await;

    // 20 queries at a 5 s interval, no sleep after the last one
    assert_eq!(started.elapsed(), Duration::from_secs(95));
    assert_eq!(cloud.count("cbs.DescribeDisks"), 20);

    let error = report.error.as_ref().unwrap();
    assert!(matches!(error, CloudError::ConvergenceTimeout { attempts: 20, .. }));
    assert!(error.requires_resubmit());

    let outputs = outputs(&report);
    assert_eq!(outputs[0]["errorCode"], "1");
    assert_eq!(outputs[0]["id"], "disk-1");
}

#[tokio::test(start_paused = true)]
async fn test_create_rejection_does_not_stop_the_batch() {
    let cloud = FakeCloud::new();
    cloud.reject("cbs.CreateDisks", 1);

    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([volume("g1", "CLOUD_PREMIUM"), volume("g2", "CLOUD_PREMIUM")]),
    )
    .await;

    assert!(matches!(report.error, Some(CloudError::RemoteRejection(_))));
    let outputs = outputs(&report);
    assert_eq!(outputs.len(), 2);
    assert_eq!(outputs[0]["errorCode"], "1");
    assert_eq!(outputs[1]["errorCode"], "0");
    assert_eq!(outputs[1]["id"], "disk-1");
}

#[tokio::test(start_paused = true)]
async fn test_query_failure_is_not_retried() {
    let cloud = FakeCloud::new();
    cloud.reject("cbs.DescribeDisks", 1);

    let report = invoke(
        &cloud.registry(),
        "storage",
        "create",
        json!([existing("g1", "disk-9")]),
    )
    .await;

    assert!(matches!(report.error, Some(CloudError::QueryFailed(_))));
    assert_eq!(cloud.calls(), vec!["cbs.DescribeDisks"]);
}

#[tokio::test(start_paused = true)]
async fn test_location_and_api_secret_replace_provider_params() {
    let cloud = FakeCloud::new();
    let input = json!({
        "guid": "g1",
        "location": "Region=ap-shanghai;AvailableZone=ap-shanghai-2",
        "api_secret": "SecretID=AKIDtest;SecretKey=secret",
        "disk_type": "CLOUD_PREMIUM",
        "disk_size": "100",
        "disk_charge_type": "PREPAID",
        "disk_charge_period": "1",
        "instance_id": "ins-1",
    });

    let report = invoke(&cloud.registry(), "storage", "create", json!([input])).await;

    assert!(report.is_success());
    assert_eq!(cloud.regions(), vec!["ap-shanghai"]);
}

#[tokio::test(start_paused = true)]
async fn test_missing_connection_is_reported_per_item() {
    let cloud = FakeCloud::new();
    let input = json!({
        "guid": "g1",
        "location": "Region=ap-shanghai",
        "disk_type": "CLOUD_PREMIUM",
        "disk_size": "100",
        "disk_charge_type": "POSTPAID_BY_HOUR",
        "instance_id": "ins-1",
    });

    let report = invoke(&cloud.registry(), "storage", "create", json!([input])).await;

    let outputs = outputs(&report);
    assert_eq!(outputs[0]["errorCode"], "1");
    assert!(
        outputs[0]["errorMessage"]
            .as_str()
            .unwrap()
            .contains("APISecret is empty")
    );
    assert!(cloud.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_detaches_first() {
    let cloud = FakeCloud::new();
    cloud.with_disk("disk-9", DISK_STATE_ATTACHED, "ins-1");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "terminate",
        json!([termination("g1", "disk-9")]),
    )
    .await;

    assert!(report.is_success());
    let outputs = outputs(&report);
    assert_eq!(outputs[0]["errorCode"], "0");
    assert_eq!(outputs[0]["request_id"], "req-terminate-disk-9");

    let mutations: Vec<String> = cloud
        .calls()
        .into_iter()
        .filter(|call| !call.starts_with("cbs.Describe"))
        .collect();
    assert_eq!(mutations, vec!["cbs.DetachDisks", "cbs.TerminateDisks"]);
    assert!(cloud.disk("disk-9").is_none());
}

fn mutations(cloud: &FakeCloud) -> Vec<String> {
    cloud
        .calls()
        .into_iter()
        .filter(|call| !call.starts_with("cbs.Describe"))
        .collect()
}

#[tokio::test(start_paused = true)]
async fn test_terminate_attaching_volume_waits_then_detaches() {
    let cloud = FakeCloud::new();
    cloud.with_moving_disk("disk-7", DISK_STATE_ATTACHING, DISK_STATE_ATTACHED, "ins-1");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "terminate",
        json!([termination("g1", "disk-7")]),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(mutations(&cloud), vec!["cbs.DetachDisks", "cbs.TerminateDisks"]);
    assert!(cloud.disk("disk-7").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_detaching_volume_waits_for_unattached() {
    let cloud = FakeCloud::new();
    cloud.with_moving_disk("disk-8", DISK_STATE_DETACHING, DISK_STATE_UNATTACHED, "ins-1");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "terminate",
        json!([termination("g1", "disk-8")]),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(mutations(&cloud), vec!["cbs.TerminateDisks"]);
    assert!(cloud.disk("disk-8").is_none());
}

#[tokio::test(start_paused = true)]
async fn test_terminate_absent_volume_is_a_no_op() {
    let cloud = FakeCloud::new();
    cloud.with_disk("disk-1", DISK_STATE_UNATTACHED, "");

    let report = invoke(
        &cloud.registry(),
        "storage",
        "terminate",
        json!([termination("g1", "disk-gone"), termination("g2", "disk-1")]),
    )
    .await;

    assert!(report.is_success());
    assert_eq!(outputs(&report).len(), 2);
    assert_eq!(cloud.count("cbs.TerminateDisks"), 1);
    assert_eq!(cloud.count("cbs.DetachDisks"), 0);
}
