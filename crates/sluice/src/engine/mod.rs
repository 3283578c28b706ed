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

pub mod action;
pub mod conversion;
pub mod exception;
pub mod flow;
pub mod mapping;
pub mod state;
pub mod transition;
pub mod variable;
pub mod view;
pub use action::{Action, ActionError, EvaluateAction, FnAction, SetAction, TypeConversion};
pub use conversion::{ConversionError, ConversionService, DefaultConversionService};
pub use exception::{
    ExceptionHandlerSet, ExceptionHandling, FlowExecutionExceptionHandler,
    TransitionExecutingHandler,
};
pub use flow::Flow;
pub use mapping::{Mapper, Mapping, MappingError, MappingResults};
pub use state::{
    ActionState, DecisionState, EndState, State, StateKind, StateParts, SubflowRef, SubflowState,
    ViewState,
};
pub use transition::{History, TargetStateResolver, Transition, TransitionCriteria};
pub use variable::{FlowVariable, VariableValue};
pub use view::{
    NamedViewFactory, NamedViewFactoryCreator, RenderAction, RenderedView, ViewFactory,
    ViewFactoryCreator,
};
