//! # Configuration Store Properties
//!
//! Random edit sequences checked against a plain map model, plus a random
//! multi-session workload through the full server.

#[cfg(test)]
mod tests {
    use crate::fixtures::{TestServer, WAIT};
    use nc_05_subsystem_coordinator::{CompositeSubsystem, CoordinatorConfig};
    use nc_telemetry::SESSIONS_TOTAL;
    use netconf_server::adapters::ConfigStore;
    use proptest::prelude::*;
    use rand::seq::SliceRandom;
    use rand::Rng;
    use serde_json::{json, Value};
    use shared_types::{ChangeOperation, ChangeSet, Datastore, ReplyBody, SessionId};
    use std::collections::BTreeMap;
    use std::sync::Arc;

    const PATHS: [&str; 4] = ["/system/hostname", "/system/contact", "/ntp/server", "/dns/search"];

    fn operation() -> impl Strategy<Value = ChangeOperation> {
        prop_oneof![
            Just(ChangeOperation::Create),
            Just(ChangeOperation::Merge),
            Just(ChangeOperation::Replace),
            Just(ChangeOperation::Delete),
        ]
    }

    /// One edit per transaction: path index, operation, scalar value.
    fn edits() -> impl Strategy<Value = Vec<(usize, ChangeOperation, u16)>> {
        prop::collection::vec((0..PATHS.len(), operation(), any::<u16>()), 1..40)
    }

    /// Whether the model accepts the edit, applying it if so.
    fn model_apply(model: &mut BTreeMap<String, Value>, path: &str, op: ChangeOperation, value: u16) -> bool {
        let exists = model.contains_key(path);
        match op {
            ChangeOperation::Create if exists => false,
            ChangeOperation::Delete if !exists => false,
            ChangeOperation::Delete => {
                model.remove(path);
                true
            }
            _ => {
                model.insert(path.to_string(), json!(value));
                true
            }
        }
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_store_matches_model(edits in edits()) {
            let rt = tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap();
            let store = Arc::new(ConfigStore::new("config-store"));
            let coordinator = CompositeSubsystem::new(CoordinatorConfig::default());
            coordinator.register(store.clone());
            let mut model = BTreeMap::new();

            for (index, op, value) in edits {
                let path = PATHS[index];
                let value_json = (op != ChangeOperation::Delete).then(|| json!(value));
                let change_set = ChangeSet::builder(Datastore::Running)
                    .origin(SessionId(1))
                    .change(path, op, value_json)
                    .build();

                let applied = rt.block_on(coordinator.apply(change_set)).is_ok();
                prop_assert_eq!(applied, model_apply(&mut model, path, op, value));
            }

            let expected: serde_json::Map<String, Value> = model.into_iter().collect();
            prop_assert_eq!(store.contents(Datastore::Running), Value::Object(expected));
            prop_assert_eq!(store.contents(Datastore::Candidate), json!({}));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_random_workload_keeps_store_consistent() {
        let before = SESSIONS_TOTAL.with_label_values(&["established"]).get();
        let server = TestServer::start();
        let mut clients = vec![
            server.connect("admin").await,
            server.connect("operator").await,
            server.connect("auditor").await,
        ];

        let mut rng = rand::thread_rng();
        let mut last_written: BTreeMap<&str, Value> = BTreeMap::new();
        for round in 0..60u32 {
            let path = *PATHS.choose(&mut rng).unwrap();
            let value = json!(rng.gen_range(0..10_000));
            let client = clients.choose_mut(&mut rng).unwrap();
            let edit = json!({
                "target": "running",
                "changes": [ { "path": path, "operation": "merge", "value": value.clone() } ]
            });
            let reply = client.call("edit-config", edit).await;
            assert_eq!(reply.body, ReplyBody::Ok, "round {round}");
            last_written.insert(path, value);
        }

        let expected: serde_json::Map<String, Value> = last_written
            .into_iter()
            .map(|(path, value)| (path.to_string(), value))
            .collect();
        let reply = clients[0].call("get-config", json!({ "target": "running" })).await;
        assert_eq!(reply.body, ReplyBody::Data(Value::Object(expected)));

        tokio::time::timeout(WAIT, async {
            while SESSIONS_TOTAL.with_label_values(&["established"]).get() < before + 3 {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("established sessions not counted");

        server.stop().await;
    }
}
