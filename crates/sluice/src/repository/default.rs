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

use super::key::FlowExecutionKey;
use super::lock::FlowExecutionLock;
use super::FlowExecutionRepository;
use crate::config::RepositoryConfigSection;
use crate::engine::History;
use crate::errors::RepositoryError;
use crate::execution::{AttributeMap, FlowExecution, FlowExecutionFactory, FlowExecutionSnapshot};
use crate::logging;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
struct Conversation {
    flow_id: String,
    lock: Arc<FlowExecutionLock>,
    snapshots: VecDeque<(u32, Vec<u8>)>,
    next_snapshot_id: u32,
    scope: AttributeMap,
    created_at: DateTime<Utc>,
    last_accessed: DateTime<Utc>,
}
/// In-memory repository keeping serialized snapshots per conversation.
/// Conversation scope lives on the conversation and is shared by all of its
/// snapshots.
pub struct DefaultFlowExecutionRepository {
    factory: FlowExecutionFactory,
    conversations: DashMap<Uuid, Conversation>,
    config: RepositoryConfigSection,
}
impl DefaultFlowExecutionRepository {
    pub fn new(factory: FlowExecutionFactory, config: RepositoryConfigSection) -> Self {
        Self {
            factory,
            conversations: DashMap::new(),
            config,
        }
    }
    pub fn conversation_count(&self) -> usize {
        self.conversations.len()
    }
    pub fn snapshot_count(&self, conversation_id: &Uuid) -> usize {
        self.conversations
            .get(conversation_id)
            .map_or(0, |conversation| conversation.snapshots.len())
    }
    /// Flow id of the conversation's root execution.
    pub fn conversation_flow_id(&self, conversation_id: &Uuid) -> Option<String> {
        self.conversations
            .get(conversation_id)
            .map(|conversation| conversation.flow_id.clone())
    }
    fn is_expired(&self, conversation: &Conversation) -> bool {
        let Some(timeout) = self.config.conversation_timeout() else {
            return false;
        };
        (Utc::now() - conversation.last_accessed)
            .to_std()
            .is_ok_and(|idle| idle > timeout)
    }
    /// Looks up a live conversation, dropping it when it has expired.
    fn check_live(&self, key: &FlowExecutionKey) -> Result<(), RepositoryError> {
        let expired = match self.conversations.get(&key.conversation_id()) {
            Some(conversation) => self.is_expired(&conversation),
            None => {
                return Err(RepositoryError::NoSuchFlowExecution {
                    key: key.to_string(),
                })
            }
        };
        if expired {
            self.conversations.remove(&key.conversation_id());
            info!(key = %key, "Conversation expired");
            return Err(RepositoryError::FlowExecutionExpired {
                key: key.to_string(),
            });
        }
        Ok(())
    }
    fn purge_expired(&self) {
        if self.config.conversation_timeout().is_none() {
            return;
        }
        self.conversations.retain(|_, conversation| {
            conversation.lock.is_locked() || !self.is_expired(conversation)
        });
    }
    /// Evicts the oldest conversations nobody holds the lock on. When every
    /// conversation is locked the limit is exceeded until one is released.
    fn evict_if_full(&self) {
        let max = self.config.max_conversations;
        while max > 0 && self.conversations.len() >= max {
            let oldest = self
                .conversations
                .iter()
                .filter(|entry| !entry.lock.is_locked())
                .min_by_key(|entry| entry.created_at)
                .map(|entry| *entry.key());
            let Some(oldest) = oldest else {
                debug!(conversations = self.conversations.len(), "All conversations locked, limit exceeded");
                break;
            };
            self.conversations.remove(&oldest);
            info!(conversation = %oldest.simple(), "Evicted oldest conversation");
        }
    }
    fn serialize(
        execution: &FlowExecution,
        key: Option<FlowExecutionKey>,
    ) -> Result<Vec<u8>, RepositoryError> {
        serde_json::to_vec(&execution.snapshot()).map_err(|source| RepositoryError::Snapshot {
            key: key.map_or_else(|| "<new>".to_string(), |k| k.to_string()),
            source,
        })
    }
}
impl FlowExecutionRepository for DefaultFlowExecutionRepository {
    fn get_lock(&self, key: &FlowExecutionKey) -> Result<Arc<FlowExecutionLock>, RepositoryError> {
        self.check_live(key)?;
        self.conversations
            .get(&key.conversation_id())
            .map(|conversation| Arc::clone(&conversation.lock))
            .ok_or_else(|| RepositoryError::NoSuchFlowExecution {
                key: key.to_string(),
            })
    }
    #[instrument(skip(self, key), fields(key = %key))]
    fn get_flow_execution(&self, key: &FlowExecutionKey) -> Result<FlowExecution, RepositoryError> {
        self.check_live(key)?;
        let (bytes, scope) = {
            let mut conversation = self
                .conversations
                .get_mut(&key.conversation_id())
                .ok_or_else(|| RepositoryError::NoSuchFlowExecution {
                    key: key.to_string(),
                })?;
            let bytes = conversation
                .snapshots
                .iter()
                .find(|(id, _)| *id == key.snapshot_id())
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| RepositoryError::NoSuchFlowExecution {
                    key: key.to_string(),
                })?;
            conversation.last_accessed = Utc::now();
            (bytes, conversation.scope.clone())
        };
        let snapshot: FlowExecutionSnapshot =
            serde_json::from_slice(&bytes).map_err(|source| RepositoryError::Snapshot {
                key: key.to_string(),
                source,
            })?;
        logging::log_repository_event("restored", &key.to_string());
        Ok(self.factory.restore(snapshot, scope, *key)?)
    }
    #[instrument(skip(self, execution), fields(flow_id = %execution.definition().id()))]
    fn put_flow_execution(
        &self,
        execution: &mut FlowExecution,
    ) -> Result<FlowExecutionKey, RepositoryError> {
        let bytes = Self::serialize(execution, execution.key())?;
        let now = Utc::now();
        let key = match execution.key() {
            None => {
                self.purge_expired();
                self.evict_if_full();
                let conversation_id = Uuid::new_v4();
                let key = FlowExecutionKey::new(conversation_id, 1);
                self.conversations.insert(
                    conversation_id,
                    Conversation {
                        flow_id: execution.definition().id().to_string(),
                        lock: Arc::new(FlowExecutionLock::new(
                            conversation_id.simple().to_string(),
                            self.config.lock_timeout(),
                        )),
                        snapshots: VecDeque::from([(1, bytes)]),
                        next_snapshot_id: 2,
                        scope: execution.conversation_scope().clone(),
                        created_at: now,
                        last_accessed: now,
                    },
                );
                key
            }
            Some(previous) => {
                let mut conversation = self
                    .conversations
                    .get_mut(&previous.conversation_id())
                    .ok_or_else(|| RepositoryError::NoSuchFlowExecution {
                        key: previous.to_string(),
                    })?;
                match execution.history_policy() {
                    History::Preserve => {}
                    History::Discard => conversation
                        .snapshots
                        .retain(|(id, _)| *id != previous.snapshot_id()),
                    History::Invalidate => conversation.snapshots.clear(),
                }
                let snapshot_id = conversation.next_snapshot_id;
                conversation.next_snapshot_id += 1;
                conversation.snapshots.push_back((snapshot_id, bytes));
                let max = self.config.max_snapshots;
                while max > 0 && conversation.snapshots.len() > max {
                    conversation.snapshots.pop_front();
                }
                conversation.scope = execution.conversation_scope().clone();
                conversation.last_accessed = now;
                debug!(
                    conversation = %previous.conversation_id().simple(),
                    snapshots = conversation.snapshots.len(),
                    "Snapshot stored"
                );
                FlowExecutionKey::new(previous.conversation_id(), snapshot_id)
            }
        };
        execution.set_key(key);
        logging::log_repository_event("stored", &key.to_string());
        Ok(key)
    }
    fn remove_flow_execution(&self, execution: &FlowExecution) -> Result<(), RepositoryError> {
        let Some(key) = execution.key() else {
            return Ok(());
        };
        self.conversations
            .remove(&key.conversation_id())
            .map(|_| logging::log_repository_event("removed", &key.to_string()))
            .ok_or_else(|| RepositoryError::NoSuchFlowExecution {
                key: key.to_string(),
            })
    }
}
