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

use sluice::builder::FlowBuilderServices;
use sluice::engine::StateParts;
use sluice::{
    Flow, FlowAssembler, FlowBuilder, FlowBuilderContext, FlowBuilderError, FlowDefinitionLocator,
    FlowDefinitionRegistry, FlowLocatorError,
};
use std::fs::{self, File};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::{Duration, SystemTime};
/// Records every builder call and fails in `fail_in` when set.
struct RecordingBuilder {
    calls: Arc<Mutex<Vec<&'static str>>>,
    fail_in: Option<&'static str>,
    context: Option<FlowBuilderContext>,
}
impl RecordingBuilder {
    fn record(&mut self, phase: &'static str) -> Result<(), FlowBuilderError> {
        self.calls.lock().expect("calls").push(phase);
        if self.fail_in == Some(phase) {
            return Err(FlowBuilderError::MalformedModel {
                resource: "recording".to_string(),
                reason: format!("failure in {phase}"),
            });
        }
        Ok(())
    }
}
impl FlowBuilder for RecordingBuilder {
    fn init(&mut self, context: &FlowBuilderContext) -> Result<(), FlowBuilderError> {
        self.context = Some(context.clone());
        self.record("init")
    }
    fn build_variables(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_variables")
    }
    fn build_input_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_input_mapper")
    }
    fn build_start_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_start_actions")
    }
    fn build_states(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_states")
    }
    fn build_global_transitions(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_global_transitions")
    }
    fn build_end_actions(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_end_actions")
    }
    fn build_output_mapper(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_output_mapper")
    }
    fn build_exception_handlers(&mut self) -> Result<(), FlowBuilderError> {
        self.record("build_exception_handlers")
    }
    fn get_flow(&mut self) -> Result<Flow, FlowBuilderError> {
        self.record("get_flow")?;
        let context = self
            .context
            .as_ref()
            .ok_or_else(|| FlowBuilderError::NotInitialized("get_flow".to_string()))?;
        let factory = context.factory();
        let mut flow = factory.create_flow(context.flow_id(), context.attributes().clone());
        factory.create_end_state(&mut flow, StateParts::new("end"), None, None)?;
        Ok(flow)
    }
    fn dispose(&mut self) {
        self.calls.lock().expect("calls").push("dispose");
        self.context = None;
    }
}
fn recording_assembler(fail_in: Option<&'static str>) -> (FlowAssembler, Arc<Mutex<Vec<&'static str>>>) {
    let calls = Arc::new(Mutex::new(Vec::new()));
    let builder = RecordingBuilder {
        calls: Arc::clone(&calls),
        fail_in,
        context: None,
    };
    let context = FlowBuilderContext::new("recorded", FlowBuilderServices::default());
    (FlowAssembler::new(Box::new(builder), context), calls)
}
#[test]
fn assembler_drives_phases_in_contract_order() {
    let (mut assembler, calls) = recording_assembler(None);
    let flow = assembler.assemble_flow().expect("assemble");
    assert_eq!(flow.id(), "recorded");
    assert_eq!(flow.start_state(), "end");
    assert_eq!(
        *calls.lock().expect("calls"),
        vec![
            "init",
            "build_variables",
            "build_input_mapper",
            "build_start_actions",
            "build_states",
            "build_global_transitions",
            "build_end_actions",
            "build_output_mapper",
            "build_exception_handlers",
            "get_flow",
            "dispose",
        ]
    );
}
#[test]
fn dispose_runs_when_a_phase_fails_and_builder_is_reusable() {
    let (mut assembler, calls) = recording_assembler(Some("build_states"));
    let error = assembler.assemble_flow().unwrap_err();
    assert!(matches!(error, FlowBuilderError::MalformedModel { .. }));
    assert_eq!(
        *calls.lock().expect("calls"),
        vec![
            "init",
            "build_variables",
            "build_input_mapper",
            "build_start_actions",
            "build_states",
            "dispose",
        ]
    );
    calls.lock().expect("calls").clear();
    assert!(assembler.assemble_flow().is_err());
    assert_eq!(calls.lock().expect("calls").first(), Some(&"init"));
    assert_eq!(calls.lock().expect("calls").last(), Some(&"dispose"));
}
#[test]
fn model_with_dangling_target_fails_validation() {
    let model = sluice::FlowModel::parse(
        r#"{"id":"broken","states":[{"id":"a","type":"view","transitions":[{"on":"go","to":"nowhere"}]}]}"#,
        sluice::model::ModelFormat::Json,
        "broken.json",
    )
    .expect("parse");
    let context = FlowBuilderContext::new("broken", FlowBuilderServices::default());
    let error = FlowAssembler::new(Box::new(sluice::ModelFlowBuilder::from_model(model)), context)
        .assemble_flow()
        .unwrap_err();
    assert!(matches!(
        error,
        FlowBuilderError::InvalidTarget { ref target, .. } if target == "nowhere"
    ));
}
fn write_model(path: &Path, start: &str, age: Duration) {
    fs::write(
        path,
        format!(
            "id: editable\nstates:\n  - id: {start}\n    type: view\n    transitions:\n      - on: go\n        to: finish\n  - id: finish\n    type: end\n"
        ),
    )
    .expect("write model");
    touch(path, age);
}
/// Sets the modification time explicitly; coarse filesystem clocks would
/// otherwise hide quick successive edits.
fn touch(path: &Path, age: Duration) {
    let file = File::options().write(true).open(path).expect("open model");
    file.set_modified(SystemTime::now() - age).expect("set mtime");
}
#[test]
fn registry_reassembles_changed_model_files() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("editable.yaml");
    write_model(&path, "first", Duration::from_secs(300));
    let registry = FlowDefinitionRegistry::new();
    registry.register_model_file("editable", &path, FlowBuilderServices::default(), true);
    let original = registry.get_flow_definition("editable").expect("assemble");
    assert_eq!(original.start_state(), "first");
    let cached = registry.get_flow_definition("editable").expect("cached");
    assert!(Arc::ptr_eq(&original, &cached));
    write_model(&path, "second", Duration::from_secs(200));
    let refreshed = registry.get_flow_definition("editable").expect("reassemble");
    assert_eq!(refreshed.start_state(), "second");
    assert!(!Arc::ptr_eq(&original, &refreshed));
    assert_eq!(original.start_state(), "first");
    fs::write(&path, "states: [").expect("write broken model");
    touch(&path, Duration::from_secs(100));
    let error = registry.get_flow_definition("editable").unwrap_err();
    assert!(matches!(error, FlowLocatorError::Assembly { .. }));
    write_model(&path, "third", Duration::from_secs(50));
    let repaired = registry.get_flow_definition("editable").expect("repaired");
    assert_eq!(repaired.start_state(), "third");
}
#[test]
fn invalid_edit_keeps_failing_until_fixed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("editable.yaml");
    write_model(&path, "first", Duration::from_secs(300));
    let registry = FlowDefinitionRegistry::new();
    registry.register_model_file("editable", &path, FlowBuilderServices::default(), true);
    registry.get_flow_definition("editable").expect("assemble");
    fs::write(
        &path,
        "id: editable\nstates:\n  - id: first\n    type: view\n    transitions:\n      - on: go\n        to: nowhere\n",
    )
    .expect("write dangling model");
    touch(&path, Duration::from_secs(200));
    for _ in 0..2 {
        let error = registry.get_flow_definition("editable").unwrap_err();
        assert!(matches!(
            error,
            FlowLocatorError::Assembly {
                source: FlowBuilderError::InvalidTarget { .. },
                ..
            }
        ));
    }
    write_model(&path, "second", Duration::from_secs(100));
    let repaired = registry.get_flow_definition("editable").expect("repaired");
    assert_eq!(repaired.start_state(), "second");
    let cached = registry.get_flow_definition("editable").expect("cached");
    assert!(Arc::ptr_eq(&repaired, &cached));
}
#[test]
fn registry_without_refresh_keeps_first_assembly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("editable.yaml");
    write_model(&path, "first", Duration::from_secs(300));
    let registry = FlowDefinitionRegistry::new();
    registry.register_model_file("editable", &path, FlowBuilderServices::default(), false);
    let original = registry.get_flow_definition("editable").expect("assemble");
    write_model(&path, "second", Duration::from_secs(200));
    let again = registry.get_flow_definition("editable").expect("cached");
    assert!(Arc::ptr_eq(&original, &again));
    registry.refresh().expect("explicit refresh");
    assert_eq!(
        registry.get_flow_definition("editable").expect("refreshed").start_state(),
        "second"
    );
}
#[test]
fn registry_falls_back_to_parent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("shared.yaml");
    write_model(&path, "first", Duration::from_secs(10));
    let parent = FlowDefinitionRegistry::new();
    parent.register_model_file("shared", &path, FlowBuilderServices::default(), true);
    let child = FlowDefinitionRegistry::with_parent(Arc::new(parent));
    assert!(!child.contains("shared"));
    assert!(child.get_flow_definition("shared").is_ok());
    assert!(matches!(
        child.get_flow_definition("missing"),
        Err(FlowLocatorError::NoSuchFlowDefinition { .. })
    ));
}
