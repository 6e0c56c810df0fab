use chrono::{TimeZone, Utc};
use onramp_core::store::Statement;
use onramp_core::{
    open_store_in_memory, ActionReader, ActionWriter, CallContext, Metadata, PluginId,
    PluginInstanceAction, Reader, RepoError, Store, Writer,
};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use uuid::Uuid;

fn setup() -> (Arc<Store>, Reader, Writer) {
    let store = Arc::new(open_store_in_memory().expect("in-memory store should open"));
    let reader = Reader::new(Arc::clone(&store));
    let writer = Writer::new(Arc::clone(&store));
    (store, reader, writer)
}

fn instance_id() -> String {
    format!("inst-{}", Uuid::new_v4())
}

fn sample_metadata() -> Metadata {
    Metadata {
        tenant_id: "tenant-1".to_string(),
        subscription_id: "sub-1".to_string(),
        client_id: "client-1".to_string(),
        client_secret_key: "projects/p/secrets/azure-client/versions/1".to_string(),
        google_service_account: "sync@p.iam.gserviceaccount.com".to_string(),
        last_sync_time: Some(Utc.with_ymd_and_hms(2024, 4, 2, 10, 15, 30).single().expect("valid timestamp")),
        sync_status: "SUCCEEDED".to_string(),
        integration_location: "us-central1".to_string(),
        trigger_id: "api_trigger/azure-sync".to_string(),
        integration_version_id: "v-17".to_string(),
        integration_name: "azure-apim-sync".to_string(),
    }
}

#[test]
fn list_for_unknown_instance_is_not_found() {
    let (_, reader, _) = setup();
    let ctx = CallContext::background();

    let err = reader
        .list_actions(&ctx, PluginId::CustomAzure, "missing")
        .expect_err("listing should fail");
    assert!(matches!(err, RepoError::NotFound(target) if target == "custom-azure/missing"));
}

#[test]
fn get_missing_action_is_not_found() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")],
        )
        .expect("insert should succeed");

    let err = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "other")
        .expect_err("lookup should fail");
    assert!(err.is_not_found());
}

#[test]
fn get_existing_action_matches_lookup_key() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync"),
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "discover"),
            ],
        )
        .expect("insert should succeed");

    let action = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "discover")
        .expect("action should exist");
    assert_eq!(action.plugin_id, PluginId::CustomAzure);
    assert_eq!(action.plugin_instance_id, instance);
    assert_eq!(action.action_id, "discover");
}

#[test]
fn insert_batch_is_listed_in_full() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    let before = Utc::now();
    let actions: Vec<_> = ["a", "b", "c"]
        .iter()
        .map(|id| PluginInstanceAction::new(PluginId::CustomAzure, &instance, *id))
        .collect();

    let commit_time = writer.insert_actions(&ctx, &actions).expect("insert should succeed");
    assert!(commit_time >= before);

    let listed = reader
        .list_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("instance should have actions");
    let ids: Vec<_> = listed.iter().map(|a| a.action_id.as_str()).collect();
    assert_eq!(ids, vec!["a", "b", "c"]);
    for action in &listed {
        assert_eq!(action.creation_time, action.last_modified_time);
        assert!(action.creation_time >= before);
        assert!(action.metadata.is_empty());
    }
}

#[test]
fn list_is_scoped_to_plugin_and_instance() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "a")],
        )
        .expect("insert should succeed");
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::Unspecified, &instance, "b")],
        )
        .expect("insert should succeed");

    let azure = reader
        .list_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("instance should have actions");
    assert_eq!(azure.len(), 1);
    assert_eq!(azure[0].action_id, "a");
}

#[test]
fn duplicate_in_batch_rejects_whole_batch() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "existing")],
        )
        .expect("insert should succeed");

    let err = writer
        .insert_actions(
            &ctx,
            &[
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "fresh"),
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "existing"),
            ],
        )
        .expect_err("insert should fail");
    assert!(err.is_duplicate());

    let listed = reader
        .list_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("instance should have actions");
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].action_id, "existing");
}

#[test]
fn update_refreshes_modified_time_and_keeps_creation_time() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")],
        )
        .expect("insert should succeed");
    let inserted = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("action should exist");

    thread::sleep(Duration::from_millis(5));
    let updated_input = inserted.clone().with_metadata(sample_metadata());
    writer.update_action(&ctx, &updated_input).expect("update should succeed");

    let updated = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("action should exist");
    assert_eq!(updated.creation_time, inserted.creation_time);
    assert!(updated.last_modified_time > inserted.last_modified_time);
    assert_eq!(updated.metadata, sample_metadata());
}

#[test]
fn update_with_empty_metadata_keeps_stored_metadata() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")
                .with_metadata(sample_metadata())],
        )
        .expect("insert should succeed");

    thread::sleep(Duration::from_millis(5));
    writer
        .update_action(
            &ctx,
            &PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync"),
        )
        .expect("update should succeed");

    let stored = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("action should exist");
    assert_eq!(stored.metadata, sample_metadata());
    assert!(stored.last_modified_time > stored.creation_time);
}

#[test]
fn update_missing_action_is_not_found() {
    let (_, _, writer) = setup();
    let ctx = CallContext::background();

    let err = writer
        .update_action(
            &ctx,
            &PluginInstanceAction::new(PluginId::CustomAzure, "nobody", "sync")
                .with_metadata(sample_metadata()),
        )
        .expect_err("update should fail");
    assert!(matches!(err, RepoError::NotFound(target) if target == "custom-azure/nobody/sync"));
}

#[test]
fn delete_removes_every_action_of_instance() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    let other = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "a"),
                PluginInstanceAction::new(PluginId::CustomAzure, &instance, "b"),
            ],
        )
        .expect("insert should succeed");
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &other, "a")],
        )
        .expect("insert should succeed");

    writer
        .delete_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("delete should succeed");

    assert!(reader
        .list_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect_err("listing should fail")
        .is_not_found());
    assert_eq!(
        reader
            .list_actions(&ctx, PluginId::CustomAzure, &other)
            .expect("instance should have actions")
            .len(),
        1
    );
}

#[test]
fn delete_is_idempotent() {
    let (_, _, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "a")],
        )
        .expect("insert should succeed");

    writer
        .delete_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("delete should succeed");
    writer
        .delete_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("delete should succeed");
    writer
        .delete_actions(&ctx, PluginId::CustomAzure, "never-registered")
        .expect("delete should succeed");
}

#[test]
fn metadata_round_trips_field_for_field() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    let action = PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")
        .with_metadata(sample_metadata());
    writer.insert_actions(&ctx, &[action.clone()]).expect("insert should succeed");

    let listed = reader
        .list_actions(&ctx, PluginId::CustomAzure, &instance)
        .expect("instance should have actions");
    assert_eq!(listed[0].metadata, action.metadata);
}

#[test]
fn malformed_stored_metadata_reports_column() {
    let (store, reader, _) = setup();
    let ctx = CallContext::background();
    store
        .read_write_transaction(&ctx, |txn| {
            txn.execute_update(&Statement::new(
                "INSERT INTO OnRampPluginInstanceActions \
                 (PluginID, PluginInstanceID, ActionID, Metadata, CreationTime, LastModifiedTime) \
                 VALUES ('custom-azure', 'broken', 'sync', '{oops', \
                         '2024-01-01 00:00:00+00:00', '2024-01-01 00:00:00+00:00')",
            ))
        })
        .expect("transaction should commit");

    let err = reader
        .get_action(&ctx, PluginId::CustomAzure, "broken", "sync")
        .expect_err("lookup should fail");
    assert!(matches!(err, RepoError::ColumnDecode { column: "Metadata", .. }));
}

#[test]
fn cancelled_context_surfaces_store_cancellation() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    ctx.cancel();

    let err = reader
        .list_actions(&ctx, PluginId::CustomAzure, "any")
        .expect_err("listing should fail");
    assert_eq!(err.store_code(), Some(onramp_core::StatusCode::Cancelled));

    let err = writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, "any", "a")],
        )
        .expect_err("insert should fail");
    assert_eq!(err.store_code(), Some(onramp_core::StatusCode::Cancelled));
}

#[test]
fn expired_deadline_surfaces_deadline_exceeded() {
    let (_, _, writer) = setup();
    let ctx = CallContext::with_timeout(Duration::ZERO);

    let err = writer
        .delete_actions(&ctx, PluginId::CustomAzure, "any")
        .expect_err("delete should fail");
    assert_eq!(
        err.store_code(),
        Some(onramp_core::StatusCode::DeadlineExceeded)
    );
}

#[test]
fn concurrent_writers_share_one_store() {
    let (_, reader, writer) = setup();
    let instances: Vec<String> = (0..8).map(|_| instance_id()).collect();

    let handles: Vec<_> = instances
        .iter()
        .cloned()
        .map(|instance| {
            let writer = writer.clone();
            thread::spawn(move || {
                let ctx = CallContext::background();
                let actions: Vec<_> = (0..4)
                    .map(|n| {
                        PluginInstanceAction::new(PluginId::CustomAzure, &instance, format!("a{n}"))
                    })
                    .collect();
                writer.insert_actions(&ctx, &actions).expect("insert should succeed")
            })
        })
        .collect();
    let mut commit_times: Vec<_> = handles.into_iter().map(|h| h.join().expect("thread should not panic")).collect();

    let ctx = CallContext::background();
    for instance in &instances {
        let listed = reader
            .list_actions(&ctx, PluginId::CustomAzure, instance)
            .expect("instance should have actions");
        assert_eq!(listed.len(), 4);
    }

    commit_times.sort();
    commit_times.dedup();
    assert_eq!(commit_times.len(), instances.len());
}

#[test]
fn audit_timestamps_match_commit_timestamps() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();

    let inserted_at = writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")],
        )
        .expect("insert should succeed");
    let stored = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("inserted action should be readable");
    assert_eq!(stored.creation_time, inserted_at);
    assert_eq!(stored.last_modified_time, inserted_at);

    let updated_at = writer
        .update_action(&ctx, &stored.clone().with_metadata(sample_metadata()))
        .expect("update should succeed");
    let stored = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("updated action should be readable");
    assert!(updated_at > inserted_at);
    assert_eq!(stored.creation_time, inserted_at);
    assert_eq!(stored.last_modified_time, updated_at);
}

#[test]
fn concurrent_updates_leave_latest_commit_as_modified_time() {
    let (_, reader, writer) = setup();
    let ctx = CallContext::background();
    let instance = instance_id();
    writer
        .insert_actions(
            &ctx,
            &[PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")],
        )
        .expect("insert should succeed");

    let handles: Vec<_> = (0..8)
        .map(|n| {
            let writer = writer.clone();
            let instance = instance.clone();
            thread::spawn(move || {
                let metadata = Metadata {
                    sync_status: format!("RUN-{n}"),
                    ..Metadata::default()
                };
                writer
                    .update_action(
                        &CallContext::background(),
                        &PluginInstanceAction::new(PluginId::CustomAzure, &instance, "sync")
                            .with_metadata(metadata),
                    )
                    .expect("update should succeed")
            })
        })
        .collect();
    let latest = handles
        .into_iter()
        .map(|handle| handle.join().expect("writer thread should not panic"))
        .max()
        .expect("at least one update ran");

    let stored = reader
        .get_action(&ctx, PluginId::CustomAzure, &instance, "sync")
        .expect("action should be readable");
    assert_eq!(stored.last_modified_time, latest);
    assert!(stored.last_modified_time > stored.creation_time);
}
