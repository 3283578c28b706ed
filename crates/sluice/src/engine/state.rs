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

use super::action::Action;
use super::exception::ExceptionHandlerSet;
use super::mapping::Mapper;
use super::transition::Transition;
use super::variable::FlowVariable;
use super::view::ViewFactory;
use crate::execution::AttributeMap;
use crate::expression::Expression;
use std::fmt;
use std::sync::Arc;
/// Fields every state variant shares.
#[derive(Clone, Default)]
pub struct StateParts {
    pub id: String,
    pub entry_actions: Vec<Arc<dyn Action>>,
    pub exit_actions: Vec<Arc<dyn Action>>,
    pub exception_handlers: ExceptionHandlerSet,
    pub attributes: AttributeMap,
}
impl StateParts {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}
pub struct ActionState {
    pub(crate) actions: Vec<Arc<dyn Action>>,
    pub(crate) transitions: Vec<Transition>,
}
impl ActionState {
    pub fn actions(&self) -> &[Arc<dyn Action>] {
        &self.actions
    }
}
pub struct ViewState {
    pub(crate) view_factory: Arc<dyn ViewFactory>,
    pub(crate) render_actions: Vec<Arc<dyn Action>>,
    pub(crate) variables: Vec<FlowVariable>,
    pub(crate) redirect: bool,
    pub(crate) popup: bool,
    pub(crate) transitions: Vec<Transition>,
}
impl ViewState {
    pub fn view_factory(&self) -> &Arc<dyn ViewFactory> {
        &self.view_factory
    }
    pub fn render_actions(&self) -> &[Arc<dyn Action>] {
        &self.render_actions
    }
    pub fn variables(&self) -> &[FlowVariable] {
        &self.variables
    }
    pub fn redirect(&self) -> bool {
        self.redirect
    }
    pub fn popup(&self) -> bool {
        self.popup
    }
}
/// Routing only: the first transition whose criteria hold is taken.
pub struct DecisionState {
    pub(crate) transitions: Vec<Transition>,
}
#[derive(Debug, Clone)]
pub enum SubflowRef {
    Static(String),
    /// Resolved at execution time to a flow id.
    Dynamic(Arc<dyn Expression>),
}
pub struct SubflowState {
    pub(crate) subflow: SubflowRef,
    pub(crate) input_mapper: Option<Mapper>,
    pub(crate) output_mapper: Option<Mapper>,
    pub(crate) transitions: Vec<Transition>,
}
impl SubflowState {
    pub fn subflow(&self) -> &SubflowRef {
        &self.subflow
    }
    pub fn input_mapper(&self) -> Option<&Mapper> {
        self.input_mapper.as_ref()
    }
    pub fn output_mapper(&self) -> Option<&Mapper> {
        self.output_mapper.as_ref()
    }
}
pub struct EndState {
    pub(crate) final_response: Option<Arc<dyn Action>>,
    pub(crate) output_mapper: Option<Mapper>,
}
impl EndState {
    pub fn final_response(&self) -> Option<&Arc<dyn Action>> {
        self.final_response.as_ref()
    }
    pub fn output_mapper(&self) -> Option<&Mapper> {
        self.output_mapper.as_ref()
    }
}
pub enum StateKind {
    Action(ActionState),
    View(ViewState),
    Decision(DecisionState),
    Subflow(SubflowState),
    End(EndState),
}
impl StateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            StateKind::Action(_) => "action",
            StateKind::View(_) => "view",
            StateKind::Decision(_) => "decision",
            StateKind::Subflow(_) => "subflow",
            StateKind::End(_) => "end",
        }
    }
}
pub struct State {
    id: String,
    kind: StateKind,
    entry_actions: Vec<Arc<dyn Action>>,
    exit_actions: Vec<Arc<dyn Action>>,
    exception_handlers: ExceptionHandlerSet,
    attributes: AttributeMap,
}
impl fmt::Debug for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("State")
            .field("id", &self.id)
            .field("kind", &self.kind.as_str())
            .field("transitions", &self.transitions())
            .finish_non_exhaustive()
    }
}
impl State {
    pub(crate) fn new(parts: StateParts, kind: StateKind) -> Self {
        Self {
            id: parts.id,
            kind,
            entry_actions: parts.entry_actions,
            exit_actions: parts.exit_actions,
            exception_handlers: parts.exception_handlers,
            attributes: parts.attributes,
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }
    pub fn kind(&self) -> &StateKind {
        &self.kind
    }
    pub fn entry_actions(&self) -> &[Arc<dyn Action>] {
        &self.entry_actions
    }
    pub fn exit_actions(&self) -> &[Arc<dyn Action>] {
        &self.exit_actions
    }
    pub fn exception_handlers(&self) -> &ExceptionHandlerSet {
        &self.exception_handlers
    }
    pub fn attributes(&self) -> &AttributeMap {
        &self.attributes
    }
    pub fn transitions(&self) -> &[Transition] {
        match &self.kind {
            StateKind::Action(s) => &s.transitions,
            StateKind::View(s) => &s.transitions,
            StateKind::Decision(s) => &s.transitions,
            StateKind::Subflow(s) => &s.transitions,
            StateKind::End(_) => &[],
        }
    }
    pub fn is_view_state(&self) -> bool {
        matches!(self.kind, StateKind::View(_))
    }
    pub fn is_end_state(&self) -> bool {
        matches!(self.kind, StateKind::End(_))
    }
}
