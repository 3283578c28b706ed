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

//! Declarative flow description. Pure data, read from JSON, YAML or TOML.

use crate::engine::History;
use crate::errors::FlowBuilderError;
use crate::execution::AttributeMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FlowModel {
    pub id: Option<String>,
    /// Defaults to the first declared state.
    pub start_state: Option<String>,
    pub attributes: AttributeMap,
    pub vars: Vec<VarModel>,
    pub inputs: Vec<MappingModel>,
    pub outputs: Vec<MappingModel>,
    pub on_start: Vec<ActionModel>,
    pub on_end: Vec<ActionModel>,
    pub states: Vec<StateModel>,
    pub global_transitions: Vec<TransitionModel>,
    pub exception_handlers: Vec<ExceptionHandlerModel>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateModel {
    pub id: String,
    #[serde(flatten)]
    pub kind: StateKindModel,
    #[serde(default)]
    pub on_entry: Vec<ActionModel>,
    #[serde(default)]
    pub on_exit: Vec<ActionModel>,
    #[serde(default)]
    pub exception_handlers: Vec<ExceptionHandlerModel>,
    #[serde(default)]
    pub attributes: AttributeMap,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StateKindModel {
    View {
        /// View id or template; the state id when absent.
        view: Option<String>,
        #[serde(default)]
        redirect: bool,
        #[serde(default)]
        popup: bool,
        #[serde(default)]
        vars: Vec<VarModel>,
        #[serde(default)]
        on_render: Vec<ActionModel>,
        #[serde(default)]
        transitions: Vec<TransitionModel>,
    },
    Action {
        #[serde(default)]
        actions: Vec<ActionModel>,
        #[serde(default)]
        transitions: Vec<TransitionModel>,
    },
    Decision {
        #[serde(default)]
        ifs: Vec<IfModel>,
    },
    Subflow {
        /// Flow id, or a `${}` expression resolved on entry.
        subflow: String,
        #[serde(default)]
        inputs: Vec<MappingModel>,
        #[serde(default)]
        outputs: Vec<MappingModel>,
        #[serde(default)]
        transitions: Vec<TransitionModel>,
    },
    End {
        view: Option<String>,
        #[serde(default)]
        outputs: Vec<MappingModel>,
    },
}
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransitionModel {
    /// Event id, `*`, or a `${}` criteria expression. Absent means always.
    pub on: Option<String>,
    pub on_exception: Option<String>,
    pub to: Option<String>,
    /// Execution criteria; each must signal success.
    pub actions: Vec<ActionModel>,
    pub history: Option<History>,
    pub attributes: AttributeMap,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionModel {
    Named(String),
    Bean {
        bean: String,
    },
    Evaluate {
        evaluate: String,
        #[serde(default)]
        result: Option<String>,
        #[serde(default)]
        result_type: Option<String>,
    },
    Set {
        set: String,
        value: String,
        #[serde(default, rename = "type")]
        type_conversion: Option<String>,
    },
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappingModel {
    pub name: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default, rename = "type")]
    pub type_conversion: Option<String>,
    #[serde(default)]
    pub required: bool,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IfModel {
    pub test: String,
    pub then: String,
    #[serde(default, rename = "else")]
    pub otherwise: Option<String>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VarModel {
    pub name: String,
    #[serde(default)]
    pub value: Option<Value>,
    #[serde(default)]
    pub expression: Option<String>,
}
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExceptionHandlerModel {
    pub on_exception: String,
    pub to: String,
}
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelFormat {
    Json,
    Yaml,
    Toml,
}
impl ModelFormat {
    pub fn from_path(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "json" => Some(ModelFormat::Json),
            "yaml" | "yml" => Some(ModelFormat::Yaml),
            "toml" => Some(ModelFormat::Toml),
            _ => None,
        }
    }
}
impl FlowModel {
    pub fn parse(source: &str, format: ModelFormat, resource: &str) -> Result<Self, FlowBuilderError> {
        let malformed = |reason: String| FlowBuilderError::MalformedModel {
            resource: resource.to_string(),
            reason,
        };
        match format {
            ModelFormat::Json => serde_json::from_str(source).map_err(|e| malformed(e.to_string())),
            ModelFormat::Yaml => serde_yaml::from_str(source).map_err(|e| malformed(e.to_string())),
            ModelFormat::Toml => toml::from_str(source).map_err(|e| malformed(e.to_string())),
        }
    }
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, FlowBuilderError> {
        let path = path.as_ref();
        let resource = path.display().to_string();
        let format = ModelFormat::from_path(path).ok_or_else(|| FlowBuilderError::MalformedModel {
            resource: resource.clone(),
            reason: "unsupported file extension".to_string(),
        })?;
        let source = std::fs::read_to_string(path)?;
        Self::parse(&source, format, &resource)
    }
    /// Flow id declared in the model, else the file stem of `path`.
    pub fn id_or_file_stem(&self, path: &Path) -> Option<String> {
        self.id.clone().or_else(|| {
            path.file_stem()
                .and_then(|stem| stem.to_str())
                .map(str::to_string)
        })
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn parses_yaml_states() {
        let model = FlowModel::parse(
            r#"
id: checkout
states:
  - id: cart
    type: view
    transitions:
      - on: next
        to: pay
  - id: pay
    type: action
    actions:
      - charge
      - evaluate: "flowScope.total > 0"
    transitions:
      - on: "yes"
        to: done
  - id: done
    type: end
"#,
            ModelFormat::Yaml,
            "checkout.yaml",
        )
        .unwrap();
        assert_eq!(model.id.as_deref(), Some("checkout"));
        assert_eq!(model.states.len(), 3);
        match &model.states[1].kind {
            StateKindModel::Action { actions, .. } => {
                assert_eq!(actions[0], ActionModel::Named("charge".to_string()));
                assert!(matches!(actions[1], ActionModel::Evaluate { .. }));
            }
            other => panic!("unexpected kind {:?}", other),
        }
        assert!(matches!(model.states[2].kind, StateKindModel::End { .. }));
    }
    #[test]
    fn parses_toml_decision() {
        let model = FlowModel::parse(
            r#"
[[states]]
id = "route"
type = "decision"
ifs = [{ test = "flowScope.vip", then = "fast", else = "slow" }]

[[states]]
id = "fast"
type = "end"

[[states]]
id = "slow"
type = "end"
"#,
            ModelFormat::Toml,
            "route.toml",
        )
        .unwrap();
        match &model.states[0].kind {
            StateKindModel::Decision { ifs } => {
                assert_eq!(ifs[0].otherwise.as_deref(), Some("slow"));
            }
            other => panic!("unexpected kind {:?}", other),
        }
    }
    #[test]
    fn unknown_state_type_is_malformed() {
        let error = FlowModel::parse(
            r#"{"states":[{"id":"a","type":"teleport"}]}"#,
            ModelFormat::Json,
            "bad.json",
        )
        .unwrap_err();
        assert!(matches!(error, FlowBuilderError::MalformedModel { .. }));
    }
}
