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

pub mod default;
pub mod key;
pub mod lock;
pub use default::DefaultFlowExecutionRepository;
pub use key::FlowExecutionKey;
pub use lock::{FlowExecutionLock, FlowExecutionLockGuard};
use crate::errors::RepositoryError;
use crate::execution::FlowExecution;
use std::sync::Arc;
/// Stores paused executions between requests. Callers hold the
/// conversation lock from `get_lock` around get, resume and put.
pub trait FlowExecutionRepository: Send + Sync {
    fn parse_flow_execution_key(&self, encoded: &str) -> Result<FlowExecutionKey, RepositoryError> {
        encoded.parse()
    }
    fn get_lock(&self, key: &FlowExecutionKey) -> Result<Arc<FlowExecutionLock>, RepositoryError>;
    fn get_flow_execution(&self, key: &FlowExecutionKey) -> Result<FlowExecution, RepositoryError>;
    /// Stores a snapshot of `execution`, assigning and returning its new key.
    fn put_flow_execution(
        &self,
        execution: &mut FlowExecution,
    ) -> Result<FlowExecutionKey, RepositoryError>;
    /// Drops the whole conversation `execution` belongs to.
    fn remove_flow_execution(&self, execution: &FlowExecution) -> Result<(), RepositoryError>;
}
