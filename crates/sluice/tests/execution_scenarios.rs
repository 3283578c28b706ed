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
use common::{
    assemble_yaml, counting_action, executor, failing_action, paused_state, services,
    signaling_action, RecordingHandler,
};
use serde_json::json;
use sluice::builder::{FlowAuthoring, FlowProgram, ViewOptions};
use sluice::config::RepositoryConfigSection;
use sluice::engine::{ExceptionHandlerSet, FlowExecutionExceptionHandler, MappingError, StateParts};
use sluice::{
    AttributeMap, Event, ExternalContext, FlowAssembler, FlowBuilderContext, FlowBuilderError,
    FlowExecutionError, FlowExecutorError, ProgramFlowBuilder,
};
use std::sync::atomic::Ordering;
use std::sync::Arc;
#[test]
fn submit_runs_action_state_once_and_pauses_at_next_view() {
    let (count, calls) = counting_action("count");
    let services = services(vec![("count", count), ("ok", signaling_action("ok", "success"))]);
    let flow = assemble_yaml(
        r#"
id: scenario-a
states:
  - id: view1
    type: view
    transitions:
      - on: submit
        to: action1
  - id: action1
    type: action
    on_entry: [count]
    actions: [ok]
    transitions:
      - on: success
        to: view2
  - id: view2
    type: view
"#,
        &services,
    );
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("scenario-a", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    assert_eq!(paused_state(&launched), "view1");
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    let key = launched.key().expect("key").to_string();
    let resumed = executor
        .resume_execution(&key, Some(Event::new("submit")), &ExternalContext::new())
        .expect("resume");
    assert_eq!(paused_state(&resumed), "view2");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}
const DECISION: &str = r#"
id: scenario-b
inputs:
  - name: flag
vars:
  - name: flag
    value: false
states:
  - id: decide
    type: decision
    ifs:
      - test: "flowScope.flag == true"
        then: stateA
        else: stateB
  - id: stateA
    type: view
  - id: stateB
    type: view
"#;
#[test]
fn decision_falls_through_to_unconditional_branch() {
    let flow = assemble_yaml(DECISION, &services(Vec::new()));
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let result = executor
        .launch_execution(
            "scenario-b",
            AttributeMap::new().with("flag", json!(false)),
            &ExternalContext::new(),
        )
        .expect("launch");
    assert_eq!(paused_state(&result), "stateB");
    let result = executor
        .launch_execution(
            "scenario-b",
            AttributeMap::new().with("flag", json!(true)),
            &ExternalContext::new(),
        )
        .expect("launch");
    assert_eq!(paused_state(&result), "stateA");
}
/// Action state `charge` fails with a payment error; handler #1 only accepts
/// inventory errors, handler #2 accepts payment errors.
struct Checkout {
    first: Arc<RecordingHandler>,
    second: Arc<RecordingHandler>,
}
impl FlowProgram for Checkout {
    fn states(&self, flow: &mut FlowAuthoring) -> Result<(), FlowBuilderError> {
        let handlers: Vec<Arc<dyn FlowExecutionExceptionHandler>> =
            vec![self.first.clone(), self.second.clone()];
        let parts = StateParts {
            exception_handlers: ExceptionHandlerSet::from(handlers),
            ..StateParts::new("charge")
        };
        let transitions = vec![flow.transition(Some("success"), Some("receipt"))?];
        let actions = vec![flow.action("charge")?];
        flow.add_action_state(parts, actions, transitions)?;
        for id in ["receipt", "outOfStock", "paymentFailed"] {
            flow.add_view_state(StateParts::new(id), id, ViewOptions::default(), Vec::new())?;
        }
        Ok(())
    }
}
#[test]
fn second_matching_handler_routes_and_first_is_not_invoked() {
    let first = RecordingHandler::new("inventory", "outOfStock");
    let second = RecordingHandler::new("payment", "paymentFailed");
    let services = services(vec![("charge", failing_action("charge", "payment"))]);
    let program = Checkout {
        first: first.clone(),
        second: second.clone(),
    };
    let flow = FlowAssembler::new(
        Box::new(ProgramFlowBuilder::new(Arc::new(program))),
        FlowBuilderContext::new("scenario-c", services),
    )
    .assemble_flow()
    .expect("assemble");
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let result = executor
        .launch_execution("scenario-c", AttributeMap::new(), &ExternalContext::new())
        .expect("handled error should not surface");
    assert_eq!(paused_state(&result), "paymentFailed");
    assert_eq!(first.handled(), 0);
    assert_eq!(second.handled(), 1);
}
#[test]
fn subflow_maps_input_and_output_and_parent_transitions_on_outcome() {
    let services = services(Vec::new());
    let child = assemble_yaml(
        r#"
id: child
inputs:
  - name: childInput
    required: true
states:
  - id: work
    type: view
    transitions:
      - on: next
        to: finished
  - id: finished
    type: end
    outputs:
      - name: childOutput
        value: requestParameters.result
"#,
        &services,
    );
    let parent = assemble_yaml(
        r#"
id: parent
vars:
  - name: parentVar
    value: 1
states:
  - id: delegate
    type: subflow
    subflow: child
    inputs:
      - name: childInput
        value: flowScope.parentVar
    outputs:
      - name: childOutput
        value: flowScope.parentVar
    transitions:
      - on: finished
        to: done
  - id: done
    type: view
"#,
        &services,
    );
    let (executor, _) = executor(vec![parent, child], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("parent", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    let sluice::FlowExecutionResult::Paused { flow_id, view, key, .. } = &launched else {
        panic!("expected paused result, got {:?}", launched);
    };
    assert_eq!(flow_id, "child");
    let model = &view.as_ref().expect("rendered view").model;
    assert_eq!(model["flowScope"]["childInput"], json!(1));
    let external = ExternalContext::new().with_parameter("result", json!(42));
    let resumed = executor
        .resume_execution(&key.to_string(), Some(Event::new("next")), &external)
        .expect("resume");
    let sluice::FlowExecutionResult::Paused { flow_id, state_id, view, .. } = &resumed else {
        panic!("expected paused result, got {:?}", resumed);
    };
    assert_eq!(flow_id, "parent");
    assert_eq!(state_id, "done");
    let model = &view.as_ref().expect("rendered view").model;
    assert_eq!(model["flowScope"]["parentVar"], json!(42));
}
const ORDERED: &str = r#"
id: ordered
states:
  - id: start
    type: view
    transitions:
      - on: go
        to: first
      - on: go
        to: second
  - id: first
    type: view
  - id: second
    type: view
  - id: global
    type: view
global_transitions:
  - on: go
    to: global
  - on: escape
    to: global
"#;
#[test]
fn first_declared_matching_transition_wins() {
    let flow = assemble_yaml(ORDERED, &services(Vec::new()));
    let swapped = assemble_yaml(
        &ORDERED.replacen("to: first", "to: tmp", 1)
            .replacen("to: second", "to: first", 1)
            .replacen("to: tmp", "to: second", 1)
            .replace("id: ordered", "id: swapped"),
        &services(Vec::new()),
    );
    let (executor, _) = executor(vec![flow, swapped], RepositoryConfigSection::default());
    for (flow_id, expected) in [("ordered", "first"), ("swapped", "second")] {
        let launched = executor
            .launch_execution(flow_id, AttributeMap::new(), &ExternalContext::new())
            .expect("launch");
        let key = launched.key().expect("key").to_string();
        let resumed = executor
            .resume_execution(&key, Some(Event::new("go")), &ExternalContext::new())
            .expect("resume");
        assert_eq!(paused_state(&resumed), expected, "flow {}", flow_id);
    }
}
#[test]
fn global_transitions_apply_after_state_transitions() {
    let flow = assemble_yaml(ORDERED, &services(Vec::new()));
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("ordered", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    let key = launched.key().expect("key").to_string();
    let resumed = executor
        .resume_execution(&key, Some(Event::new("escape")), &ExternalContext::new())
        .expect("resume");
    assert_eq!(paused_state(&resumed), "global");
}
#[test]
fn vetoed_transition_does_not_fall_through() {
    let services = services(vec![("deny", signaling_action("deny", "error"))]);
    let flow = assemble_yaml(
        r#"
id: guarded
states:
  - id: form
    type: view
    transitions:
      - on: submit
        to: accepted
        actions: [deny]
      - on: submit
        to: fallback
  - id: accepted
    type: view
  - id: fallback
    type: view
"#,
        &services,
    );
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("guarded", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    let key = launched.key().expect("key").to_string();
    let error = executor
        .resume_execution(&key, Some(Event::new("submit")), &ExternalContext::new())
        .unwrap_err();
    assert!(matches!(
        error,
        FlowExecutorError::Execution(FlowExecutionError::TransitionVetoed { ref state_id, .. }) if state_id == "form"
    ));
    let refreshed = executor
        .resume_execution(&key, None, &ExternalContext::new())
        .expect("snapshot is untouched by the failed request");
    assert_eq!(paused_state(&refreshed), "form");
}
#[test]
fn unmatched_event_is_reported() {
    let flow = assemble_yaml(ORDERED, &services(Vec::new()));
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("ordered", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    let key = launched.key().expect("key").to_string();
    let error = executor
        .resume_execution(&key, Some(Event::new("nothing")), &ExternalContext::new())
        .unwrap_err();
    assert!(matches!(
        error,
        FlowExecutorError::Execution(FlowExecutionError::NoMatchingTransition { ref event_id, .. }) if event_id == "nothing"
    ));
}
#[test]
fn missing_required_input_fails_the_launch() {
    let flow = assemble_yaml(
        r#"
id: needs-customer
inputs:
  - name: customer
    required: true
states:
  - id: greet
    type: view
"#,
        &services(Vec::new()),
    );
    let (executor, repository) = executor(vec![flow], RepositoryConfigSection::default());
    let error = executor
        .launch_execution("needs-customer", AttributeMap::new(), &ExternalContext::new())
        .unwrap_err();
    match error {
        FlowExecutorError::Execution(FlowExecutionError::Mapping { errors, .. }) => {
            assert_eq!(errors.len(), 1);
            assert!(matches!(errors[0], MappingError::Required { .. }));
        }
        other => panic!("unexpected error {:?}", other),
    }
    assert_eq!(repository.conversation_count(), 0);
}
#[test]
fn flow_exception_handler_exposes_error_in_flash_scope() {
    let services = services(vec![("explode", failing_action("explode", "backend.timeout"))]);
    let flow = assemble_yaml(
        r#"
id: fragile
states:
  - id: call
    type: action
    actions: [explode]
    transitions:
      - on: success
        to: done
  - id: done
    type: view
  - id: failed
    type: view
exception_handlers:
  - on_exception: backend
    to: failed
"#,
        &services,
    );
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let result = executor
        .launch_execution("fragile", AttributeMap::new(), &ExternalContext::new())
        .expect("handled");
    let sluice::FlowExecutionResult::Paused { state_id, view, .. } = &result else {
        panic!("expected paused result, got {:?}", result);
    };
    assert_eq!(state_id, "failed");
    let flash = &view.as_ref().expect("rendered view").model["flashScope"];
    assert_eq!(flash["flowExecutionException"]["kind"], json!("backend.timeout"));
    assert_eq!(flash["rootCauseException"], json!("backend.timeout: simulated failure"));
}
#[test]
fn end_state_outcome_carries_mapped_output() {
    let flow = assemble_yaml(
        r#"
id: quick
vars:
  - name: total
    value: 12
states:
  - id: confirm
    type: view
    transitions:
      - on: confirm
        to: done
  - id: done
    type: end
outputs:
  - name: total
    value: flowScope.total
"#,
        &services(Vec::new()),
    );
    let (executor, repository) = executor(vec![flow], RepositoryConfigSection::default());
    let launched = executor
        .launch_execution("quick", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    let key = launched.key().expect("key").to_string();
    let ended = executor
        .resume_execution(&key, Some(Event::new("confirm")), &ExternalContext::new())
        .expect("resume");
    let outcome = ended.outcome().expect("ended");
    assert_eq!(outcome.id, "done");
    assert_eq!(outcome.output.get("total"), Some(&json!(12)));
    assert_eq!(repository.conversation_count(), 0);
}
#[derive(Default)]
struct Journal {
    entries: std::sync::Mutex<Vec<String>>,
}
impl Journal {
    fn push(&self, entry: String) {
        self.entries.lock().expect("journal").push(entry);
    }
}
impl sluice::execution::FlowExecutionListener for Journal {
    fn session_started(&self, _context: &sluice::RequestContext<'_>, flow: &sluice::Flow) {
        self.push(format!("started:{}", flow.id()));
    }
    fn state_entered(&self, _context: &sluice::RequestContext<'_>, _previous: Option<&str>, state: &sluice::State) {
        self.push(format!("entered:{}", state.id()));
    }
    fn paused(&self, context: &sluice::RequestContext<'_>) {
        self.push(format!("paused:{}", context.current_state_id().unwrap_or_default()));
    }
    fn resuming(&self, _context: &sluice::RequestContext<'_>) {
        self.push("resuming".to_string());
    }
    fn session_ended(&self, _context: &sluice::RequestContext<'_>, flow: &sluice::Flow, _output: &AttributeMap) {
        self.push(format!("ended:{}", flow.id()));
    }
}
#[test]
fn listeners_observe_lifecycle_of_selected_flows() {
    use sluice::execution::{FlowExecutionFactory, FlowIdCriteria, StaticFlowExecutionListenerLoader};
    let services = services(Vec::new());
    let quick = assemble_yaml(
        r#"
id: watched
states:
  - id: ask
    type: view
    transitions:
      - on: done
        to: finish
  - id: finish
    type: end
"#,
        &services,
    );
    let unwatched = assemble_yaml(&ORDERED.replace("id: ordered", "id: unwatched"), &services);
    let journal = Arc::new(Journal::default());
    let mut loader = StaticFlowExecutionListenerLoader::new();
    loader.add_listener(FlowIdCriteria::parse("watched"), journal.clone());
    let locator = common::registry(vec![quick, unwatched]);
    let factory = FlowExecutionFactory::new(locator.clone()).with_listener_loader(Arc::new(loader));
    let repository = Arc::new(sluice::DefaultFlowExecutionRepository::new(
        factory.clone(),
        RepositoryConfigSection::default(),
    ));
    let executor = sluice::FlowExecutor::new(locator, factory, repository);
    let key = executor
        .launch_execution("watched", AttributeMap::new(), &ExternalContext::new())
        .expect("launch")
        .key()
        .expect("paused");
    executor
        .resume_execution(&key.to_string(), Some(Event::new("done")), &ExternalContext::new())
        .expect("resume");
    executor
        .launch_execution("unwatched", AttributeMap::new(), &ExternalContext::new())
        .expect("launch");
    assert_eq!(
        *journal.entries.lock().expect("journal"),
        vec![
            "started:watched",
            "entered:ask",
            "paused:ask",
            "resuming",
            "entered:finish",
            "ended:watched",
        ]
    );
}
#[test]
fn decision_else_applies_before_later_branches() {
    let flow = assemble_yaml(
        r#"
id: chained
inputs:
  - name: a
  - name: b
states:
  - id: decide
    type: decision
    ifs:
      - test: "flowScope.a == true"
        then: x
        else: y
      - test: "flowScope.b == true"
        then: z
  - id: x
    type: view
  - id: y
    type: view
  - id: z
    type: view
"#,
        &services(Vec::new()),
    );
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let result = executor
        .launch_execution(
            "chained",
            AttributeMap::new().with("a", json!(false)).with("b", json!(true)),
            &ExternalContext::new(),
        )
        .expect("launch");
    assert_eq!(paused_state(&result), "y");
}
#[test]
fn dynamic_target_naming_unknown_state_fails_the_request_only() {
    let flow = assemble_yaml(
        r#"
id: routed
inputs:
  - name: next
states:
  - id: pick
    type: view
    transitions:
      - on: go
        to: "${flowScope.next}"
  - id: done
    type: end
"#,
        &services(Vec::new()),
    );
    let (executor, _) = executor(vec![flow], RepositoryConfigSection::default());
    let key = executor
        .launch_execution(
            "routed",
            AttributeMap::new().with("next", json!("ghost")),
            &ExternalContext::new(),
        )
        .expect("launch")
        .key()
        .expect("paused");
    let error = executor
        .resume_execution(&key.to_string(), Some(Event::new("go")), &ExternalContext::new())
        .unwrap_err();
    assert!(matches!(
        error,
        FlowExecutorError::Execution(FlowExecutionError::TargetStateNotFound { ref target, .. })
            if target == "ghost"
    ));
    assert!(error.is_recoverable());
    let refreshed = executor
        .resume_execution(&key.to_string(), None, &ExternalContext::new())
        .expect("refresh");
    assert_eq!(paused_state(&refreshed), "pick");
}
#[test]
fn subflow_id_is_resolved_from_an_expression() {
    let services = services(Vec::new());
    let parent = assemble_yaml(
        r#"
id: dispatcher
inputs:
  - name: child
states:
  - id: delegate
    type: subflow
    subflow: "${flowScope.child}"
    transitions:
      - on: finished
        to: done
  - id: done
    type: end
"#,
        &services,
    );
    let child = assemble_yaml(
        r#"
id: worker
states:
  - id: finished
    type: end
"#,
        &services,
    );
    let (executor, _) = executor(vec![parent, child], RepositoryConfigSection::default());
    let result = executor
        .launch_execution(
            "dispatcher",
            AttributeMap::new().with("child", json!("worker")),
            &ExternalContext::new(),
        )
        .expect("launch");
    assert_eq!(result.outcome().expect("ended").id, "done");
    let error = executor
        .launch_execution(
            "dispatcher",
            AttributeMap::new().with("child", json!("absent")),
            &ExternalContext::new(),
        )
        .unwrap_err();
    assert!(matches!(
        error,
        FlowExecutorError::Execution(FlowExecutionError::SubflowNotFound { .. })
    ));
}
