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

//! Conversational flow engine: flows are assembled once from a model into an
//! immutable graph, then executed per conversation, paused at view states and
//! stored between requests under an opaque key.
pub mod builder;
pub mod config;
pub mod engine;
pub mod errors;
pub mod execution;
pub mod executor;
pub mod expression;
pub mod logging;
pub mod model;
pub mod registry;
pub mod repository;
pub use builder::{
    FlowArtifactFactory, FlowAssembler, FlowBuilder, FlowBuilderContext, FlowBuilderServices,
    ModelFlowBuilder, ProgramFlowBuilder,
};
pub use config::SluiceConfig;
pub use engine::{Action, Flow, State, StateKind, Transition};
pub use errors::{
    FlowBuilderError, FlowExecutionError, FlowExecutorError, FlowLocatorError, RepositoryError,
};
pub use execution::{
    AttributeMap, Event, ExternalContext, FlowExecution, FlowExecutionStatus, RequestContext,
};
pub use executor::{FlowExecutionResult, FlowExecutor};
pub use model::FlowModel;
pub use registry::{FlowDefinitionLocator, FlowDefinitionRegistry};
pub use repository::{DefaultFlowExecutionRepository, FlowExecutionKey, FlowExecutionRepository};
