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

pub mod context;
mod control;
pub mod event;
#[allow(clippy::module_inception)]
pub mod execution;
pub mod factory;
pub mod listener;
pub mod scope;
pub mod session;
pub use context::RequestContext;
pub use event::{Event, ExternalContext, ERROR_EVENT, SUCCESS_EVENT};
pub use execution::{
    FlowExecution, FlowExecutionOutcome, FlowExecutionSnapshot, FlowExecutionStatus,
    FlowSessionSnapshot,
};
pub use factory::FlowExecutionFactory;
pub use listener::{
    FlowExecutionListener, FlowExecutionListenerLoader, FlowIdCriteria,
    StaticFlowExecutionListenerLoader,
};
pub use scope::{AttributeMap, ScopeType};
pub use session::{FlowSession, FlowSessionStatus};
