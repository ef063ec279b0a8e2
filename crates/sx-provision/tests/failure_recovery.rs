//! Failure handling and resumption.
//!
//! # Invariants Tested
//!
//! 1. **Lookup misses**: unknown pools and tenants fail fast with 404 codes,
//!    make no remote calls and are reported once
//! 2. **Resume**: progress saved before a failure is kept and the next
//!    invocation continues at the first unset field
//! 3. **Adoption after lost checkpoint**: a resource created before a failed
//!    save is adopted, not created twice
//! 4. **Best-effort reporting**: reporter failures never change the outcome

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod common;

use chrono::Utc;
use sx_core::ResourcePoolId;
use sx_gcloud::messaging::memory::MessagingCall;
use sx_gcloud::warehouse::memory::WarehouseCall;
use sx_provision::{ProvisionError, ProvisioningState, ResourceField, StepKind, StepOutcome};

use common::{Harness, PROVIDER_PROJECT, pool_id, project};

// ============================================================================
// Lookup misses
// ============================================================================

#[tokio::test]
async fn unknown_pool_fails_without_remote_calls() {
    let h = Harness::new();
    let missing = ResourcePoolId::new("missing-pool").unwrap();

    let err = h.provisioner.provision(project(), &missing).await.unwrap_err();
    assert_eq!(err.code(), "RESOURCE_GROUP_NOT_FOUND");
    assert_eq!(err.status(), 404);

    assert_eq!(h.remote_call_count(), 0);
    assert!(h.tenants.lookups().unwrap().is_empty());
    assert!(h.store.history().unwrap().is_empty());

    let reports = h.reporter.reports().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].error_name, "LookupNotFound");
    assert_eq!(reports[0].project_id, Some(42));
    assert_eq!(reports[0].input_data["resource_pool_id"], "missing-pool");
}

#[tokio::test]
async fn unknown_tenant_fails_without_remote_calls() {
    let h = Harness::new();
    let unknown = sx_core::ProjectId::new(7).unwrap();

    let err = h.provisioner.provision(unknown, &pool_id()).await.unwrap_err();
    assert_eq!(err.code(), "PROJECT_NOT_FOUND");
    assert_eq!(err.status(), 404);
    assert_eq!(h.remote_call_count(), 0);
    assert!(h.store.history().unwrap().is_empty());
    assert_eq!(h.reporter.reports().unwrap().len(), 1);
}

#[tokio::test]
async fn unreachable_tenant_registry_is_an_internal_error() {
    let h = Harness::new();
    h.tenants.set_unavailable(true).unwrap();

    let err = h.provisioner.provision(project(), &pool_id()).await.unwrap_err();
    assert_eq!(err, ProvisionError::ProvisioningFailed);
    assert_eq!(err.body().message, "Internal server error");
    assert_eq!(h.remote_call_count(), 0);

    let reports = h.reporter.reports().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].error_name, "MetadataError");
    assert!(reports[0].process_info["step"].is_null());
}

// ============================================================================
// Scenario D: resume after a crash following step 1
// ============================================================================

#[tokio::test]
async fn resumes_after_dataset_checkpoint() {
    let h = Harness::new();
    let mut seeded = ProvisioningState::new(project(), "st-42", PROVIDER_PROJECT, Utc::now());
    seeded.record(ResourceField::DatasetId, "sx_42").unwrap();
    h.store.insert(seeded).unwrap();
    h.warehouse.insert_dataset("sx_42").unwrap();

    let report = h.provisioner.provision(project(), &pool_id()).await.unwrap();
    assert_eq!(report.steps[0].step, StepKind::CreateDataset);
    assert_eq!(report.steps[0].outcome, StepOutcome::Skipped);

    let calls = h.warehouse.calls().unwrap();
    assert!(!calls.contains(&WarehouseCall::DatasetExists("sx_42".into())));
    assert!(!calls.contains(&WarehouseCall::CreateDataset("sx_42".into())));
    assert_eq!(
        calls.first(),
        Some(&WarehouseCall::TableExists(
            "sx_42".into(),
            "raw_events".into()
        ))
    );

    let state = h.stored().await;
    assert!(state.is_complete());
    assert_eq!(state.stream_id, "st-42");
}

#[tokio::test]
async fn resumes_after_remote_create_failure() {
    let h = Harness::new();
    h.warehouse.fail_creates_of("identified_events").unwrap();

    let err = h.provisioner.provision(project(), &pool_id()).await.unwrap_err();
    assert_eq!(err, ProvisionError::ProvisioningFailed);

    let partial = h.stored().await;
    assert_eq!(partial.warehouse.dataset_id.as_deref(), Some("sx_42"));
    assert_eq!(partial.warehouse.raw_events_table_id.as_deref(), Some("raw_events"));
    assert!(partial.warehouse.identified_events_table_id.is_none());
    assert!(partial.messaging.collector_topic_id.is_none());
    assert!(h.messaging.calls().unwrap().is_empty());

    let reports = h.reporter.reports().unwrap();
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].error_name, "RemoteCreateError");
    assert_eq!(
        reports[0].process_info["step"],
        "create_identified_events_table"
    );
    assert_eq!(
        reports[0].process_info["completed_steps"],
        serde_json::json!(["create_dataset", "create_raw_events_table"])
    );
    assert!(
        reports[0]
            .error_stack
            .as_deref()
            .unwrap()
            .contains("injected failure")
    );

    h.warehouse.clear_failures().unwrap();
    let creates_before = h.warehouse.create_calls().unwrap().len();
    let report = h.provisioner.provision(project(), &pool_id()).await.unwrap();

    assert_eq!(
        report.created(),
        vec![
            StepKind::CreateIdentifiedEventsTable,
            StepKind::CreateExcludedReferrersView,
            StepKind::CreateAdCostsTable,
            StepKind::CreateCollectorTopic,
            StepKind::CreateWarehouseSinkSubscription,
            StepKind::CreateProcessorSubscription,
        ]
    );
    let new_creates = &h.warehouse.create_calls().unwrap()[creates_before..];
    assert_eq!(
        new_creates.first(),
        Some(&WarehouseCall::CreateTable(
            "sx_42".into(),
            "identified_events".into()
        ))
    );
    assert!(h.stored().await.is_complete());
}

#[tokio::test]
async fn failed_subscription_keeps_topic() {
    let h = Harness::new();
    h.messaging
        .fail_creates_of("collector_42_warehouse_sink")
        .unwrap();

    h.provisioner
        .provision(project(), &pool_id())
        .await
        .unwrap_err();
    let partial = h.stored().await;
    assert_eq!(
        partial.messaging.collector_topic_id.as_deref(),
        Some("collector_42")
    );
    assert!(partial.messaging.warehouse_sink_subscription_id.is_none());
    assert!(partial.messaging.processor_subscription_id.is_none());

    h.messaging.clear_failures().unwrap();
    h.provisioner.provision(project(), &pool_id()).await.unwrap();

    let topic_creates = h
        .messaging
        .create_calls()
        .unwrap()
        .into_iter()
        .filter(|c| matches!(c, MessagingCall::CreateTopic(_)))
        .count();
    assert_eq!(topic_creates, 1);
}

// ============================================================================
// Persistence failures
// ============================================================================

#[tokio::test]
async fn lost_checkpoint_is_recovered_by_adoption() {
    let h = Harness::new();
    h.store.fail_saves(true).unwrap();

    let err = h.provisioner.provision(project(), &pool_id()).await.unwrap_err();
    assert_eq!(err.status(), 500);

    // The dataset exists remotely but was never recorded.
    assert!(h.warehouse.dataset("sx_42").unwrap().is_some());
    assert!(h.stored().await.warehouse.dataset_id.is_none());
    assert_eq!(h.reporter.reports().unwrap()[0].error_name, "PersistenceError");

    h.store.fail_saves(false).unwrap();
    let report = h.provisioner.provision(project(), &pool_id()).await.unwrap();
    assert_eq!(report.steps[0].outcome, StepOutcome::Adopted);

    let dataset_creates = h
        .warehouse
        .create_calls()
        .unwrap()
        .into_iter()
        .filter(|c| matches!(c, WarehouseCall::CreateDataset(_)))
        .count();
    assert_eq!(dataset_creates, 1);
    assert!(h.stored().await.is_complete());
}

#[tokio::test]
async fn checkpoint_for_other_provider_project_is_rejected() {
    let h = Harness::new();
    h.store
        .insert(ProvisioningState::new(
            project(),
            "st-42",
            "other-provider",
            Utc::now(),
        ))
        .unwrap();

    let err = h.provisioner.provision(project(), &pool_id()).await.unwrap_err();
    assert_eq!(err, ProvisionError::ProvisioningFailed);
    assert_eq!(h.remote_call_count(), 0);
    assert_eq!(h.reporter.reports().unwrap()[0].error_name, "InvalidInputError");
}

// ============================================================================
// Best-effort reporting
// ============================================================================

#[tokio::test]
async fn reporter_failure_does_not_mask_lookup_miss() {
    let h = Harness::new();
    h.reporter.set_failing(true).unwrap();
    let missing = ResourcePoolId::new("missing-pool").unwrap();

    let err = h.provisioner.provision(project(), &missing).await.unwrap_err();
    assert_eq!(
        err,
        ProvisionError::ResourcePoolNotFound {
            resource_pool_id: missing
        }
    );
}

#[tokio::test]
async fn reporter_failure_does_not_mask_step_failure() {
    let h = Harness::new();
    h.reporter.set_failing(true).unwrap();
    h.warehouse.fail_creates_of("sx_42").unwrap();

    let err = h.provisioner.provision(project(), &pool_id()).await.unwrap_err();
    assert_eq!(err, ProvisionError::ProvisioningFailed);
    assert_eq!(h.reporter.reports().unwrap().len(), 1);
}
