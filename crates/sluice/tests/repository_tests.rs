// SPDX-License-Identifier: AGPL-3.0-only
// Copyright (C) 2024 Jonathan Lee
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License version 3
// as published by the Free Software Foundation.
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the GNU Affero General Public License for more details.
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see https://www.gnu.org/licenses/.

mod common;
use common::{assemble_yaml, executor, paused_state, services};
use serde_json::json;
use sluice::config::RepositoryConfigSection;
use sluice::engine::{Action, FnAction};
use sluice::{
    AttributeMap, Event, ExternalContext, FlowExecutionKey, FlowExecutionRepository,
    RepositoryError, RequestContext,
};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;
const WIZARD: &str = r#"
id: wizard
states:
  - id: step
    type: view
    transitions:
      - on: next
        to: step
      - on: forget
        to: step
        history: discard
      - on: reset
        to: step
        history: invalidate
      - on: finish
        to: done
  - id: done
    type: end
"#;
fn wizard(config: RepositoryConfigSection) -> (sluice::FlowExecutor, Arc<sluice::DefaultFlowExecutionRepository>) {
    executor(vec![assemble_yaml(WIZARD, &services(Vec::new()))], config)
}
fn launch(executor: &sluice::FlowExecutor) -> FlowExecutionKey {
    executor
        .launch_execution("wizard", AttributeMap::new(), &ExternalContext::new())
        .expect("launch")
        .key()
        .expect("paused")
}
fn signal(executor: &sluice::FlowExecutor, key: &FlowExecutionKey, event: &str) -> FlowExecutionKey {
    executor
        .resume_execution(&key.to_string(), Some(Event::new(event)), &ExternalContext::new())
        .expect("resume")
        .key()
        .expect("paused")
}
#[test]
fn issued_keys_round_trip_through_their_string_form() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let first = launch(&executor);
    let second = signal(&executor, &first, "next");
    for key in [first, second] {
        let encoded = key.to_string();
        assert_eq!(repository.parse_flow_execution_key(&encoded).expect("parse"), key);
        assert_eq!(encoded.parse::<FlowExecutionKey>().expect("parse"), key);
    }
    assert_eq!(first.conversation_id(), second.conversation_id());
    assert_ne!(first.snapshot_id(), second.snapshot_id());
    let malformed = repository.parse_flow_execution_key("not-a-key").unwrap_err();
    assert!(matches!(malformed, RepositoryError::BadFlowExecutionKey { .. }));
}
#[test]
fn ended_execution_cannot_be_resumed() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let key = launch(&executor);
    let ended = executor
        .resume_execution(&key.to_string(), Some(Event::new("finish")), &ExternalContext::new())
        .expect("finish");
    assert_eq!(ended.outcome().expect("ended").id, "done");
    let error = executor
        .resume_execution(&key.to_string(), Some(Event::new("next")), &ExternalContext::new())
        .unwrap_err();
    assert!(error.is_no_such_execution());
    assert_eq!(repository.conversation_count(), 0);
}
#[test]
fn preserved_history_keeps_earlier_snapshots_resumable() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let first = launch(&executor);
    let second = signal(&executor, &first, "next");
    assert_eq!(repository.snapshot_count(&first.conversation_id()), 2);
    let again = executor
        .resume_execution(&first.to_string(), None, &ExternalContext::new())
        .expect("back button");
    assert_eq!(paused_state(&again), "step");
    assert_ne!(again.key(), Some(second));
}
#[test]
fn discard_and_invalidate_prune_history() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let first = launch(&executor);
    let second = signal(&executor, &first, "next");
    let third = signal(&executor, &second, "forget");
    let error = executor
        .resume_execution(&second.to_string(), None, &ExternalContext::new())
        .unwrap_err();
    assert!(error.is_no_such_execution());
    assert_eq!(repository.snapshot_count(&first.conversation_id()), 2);
    let fourth = signal(&executor, &third, "reset");
    assert_eq!(repository.snapshot_count(&first.conversation_id()), 1);
    for stale in [first, third] {
        let error = executor
            .resume_execution(&stale.to_string(), None, &ExternalContext::new())
            .unwrap_err();
        assert!(error.is_no_such_execution(), "{} should be gone", stale);
    }
    signal(&executor, &fourth, "next");
}
#[test]
fn snapshot_limit_drops_oldest_snapshot() {
    let config = RepositoryConfigSection {
        max_snapshots: 2,
        ..RepositoryConfigSection::default()
    };
    let (executor, repository) = wizard(config);
    let first = launch(&executor);
    let second = signal(&executor, &first, "next");
    let third = signal(&executor, &second, "next");
    assert_eq!(repository.snapshot_count(&first.conversation_id()), 2);
    let error = repository.get_flow_execution(&first).unwrap_err();
    assert!(matches!(error, RepositoryError::NoSuchFlowExecution { .. }));
    assert!(repository.get_flow_execution(&third).is_ok());
}
#[test]
fn conversation_limit_evicts_oldest_conversation() {
    let config = RepositoryConfigSection {
        max_conversations: 2,
        ..RepositoryConfigSection::default()
    };
    let (executor, repository) = wizard(config);
    let oldest = launch(&executor);
    thread::sleep(Duration::from_millis(5));
    let middle = launch(&executor);
    thread::sleep(Duration::from_millis(5));
    let newest = launch(&executor);
    assert_eq!(repository.conversation_count(), 2);
    assert!(repository.get_flow_execution(&oldest).is_err());
    assert!(repository.get_flow_execution(&middle).is_ok());
    assert_eq!(
        repository.conversation_flow_id(&newest.conversation_id()).as_deref(),
        Some("wizard")
    );
}
#[test]
fn concurrent_resumes_of_one_key_are_serialized() {
    let observed = Arc::new(Mutex::new(Vec::new()));
    let seen = Arc::clone(&observed);
    let bump: Arc<dyn Action> = Arc::new(FnAction::new(
        "bump",
        move |context: &mut RequestContext<'_>| {
            let count = context.conversation_scope().get_i64("count").unwrap_or(0);
            seen.lock().expect("observed").push(count);
            thread::sleep(Duration::from_millis(50));
            context.conversation_scope_mut().put("count", json!(count + 1));
            Ok(Event::success())
        },
    ));
    let flow = assemble_yaml(
        r#"
id: counter
states:
  - id: tally
    type: view
    transitions:
      - on: bump
        to: tally
        actions: [bump]
"#,
        &services(vec![("bump", bump)]),
    );
    let (executor, repository) = executor(vec![flow], RepositoryConfigSection::default());
    let executor = Arc::new(executor);
    let key = executor
        .launch_execution("counter", AttributeMap::new(), &ExternalContext::new())
        .expect("launch")
        .key()
        .expect("paused");
    let handles: Vec<_> = (0..2)
        .map(|i| {
            let executor = Arc::clone(&executor);
            thread::spawn(move || {
                let external = ExternalContext::new().with_request_id(format!("request-{i}"));
                executor
                    .resume_execution(&key.to_string(), Some(Event::new("bump")), &external)
                    .expect("resume")
                    .key()
                    .expect("paused")
            })
        })
        .collect();
    let keys: Vec<FlowExecutionKey> = handles
        .into_iter()
        .map(|handle| handle.join().expect("thread"))
        .collect();
    assert_ne!(keys[0], keys[1]);
    let mut observed = observed.lock().expect("observed").clone();
    observed.sort();
    assert_eq!(observed, vec![0, 1]);
    let latest = repository.get_flow_execution(&keys[1]).expect("stored");
    assert_eq!(latest.conversation_scope().get_i64("count"), Some(2));
}
#[test]
fn lock_is_released_after_a_failed_request() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let key = launch(&executor);
    let error = executor
        .resume_execution(&key.to_string(), Some(Event::new("unknown")), &ExternalContext::new())
        .unwrap_err();
    assert!(!error.is_no_such_execution());
    let lock = repository.get_lock(&key).expect("lock");
    assert!(!lock.is_locked());
    signal(&executor, &key, "next");
}
#[test]
fn default_config_never_evicts_live_conversations() {
    let (executor, repository) = wizard(RepositoryConfigSection::default());
    let first = launch(&executor);
    for _ in 0..8 {
        launch(&executor);
    }
    assert_eq!(repository.conversation_count(), 9);
    signal(&executor, &first, "next");
}
#[test]
fn conversation_limit_skips_locked_conversations() {
    let config = RepositoryConfigSection {
        max_conversations: 1,
        ..RepositoryConfigSection::default()
    };
    let (executor, repository) = wizard(config);
    let held = launch(&executor);
    let lock = repository.get_lock(&held).expect("lock");
    let guard = lock.lock("in-flight").expect("acquire");
    let other = launch(&executor);
    assert_eq!(repository.conversation_count(), 2);
    let mut execution = repository.get_flow_execution(&held).expect("still stored");
    repository.put_flow_execution(&mut execution).expect("store while locked");
    drop(guard);
    thread::sleep(Duration::from_millis(5));
    launch(&executor);
    assert_eq!(repository.conversation_count(), 1);
    assert!(repository.get_flow_execution(&held).is_err());
    assert!(repository.get_flow_execution(&other).is_err());
}
#[test]
fn idle_conversation_expires() {
    let config = RepositoryConfigSection {
        conversation_timeout_secs: 1,
        ..RepositoryConfigSection::default()
    };
    let (executor, repository) = wizard(config);
    let key = launch(&executor);
    thread::sleep(Duration::from_millis(1_200));
    let error = executor
        .resume_execution(&key.to_string(), Some(Event::new("next")), &ExternalContext::new())
        .unwrap_err();
    assert!(matches!(
        error,
        sluice::FlowExecutorError::Repository(RepositoryError::FlowExecutionExpired { .. })
    ));
    assert!(error.is_no_such_execution());
    assert_eq!(repository.conversation_count(), 0);
}
