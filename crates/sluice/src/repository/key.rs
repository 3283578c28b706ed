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

use crate::errors::RepositoryError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;
static KEY_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new("^e([0-9a-f]{32})s([0-9]+)$").unwrap());
/// Identifies one snapshot of one conversation, encoded as
/// `e<conversation>s<snapshot>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FlowExecutionKey {
    conversation_id: Uuid,
    snapshot_id: u32,
}
impl FlowExecutionKey {
    pub fn new(conversation_id: Uuid, snapshot_id: u32) -> Self {
        Self {
            conversation_id,
            snapshot_id,
        }
    }
    pub fn conversation_id(&self) -> Uuid {
        self.conversation_id
    }
    pub fn snapshot_id(&self) -> u32 {
        self.snapshot_id
    }
}
impl fmt::Display for FlowExecutionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "e{}s{}", self.conversation_id.simple(), self.snapshot_id)
    }
}
impl FromStr for FlowExecutionKey {
    type Err = RepositoryError;
    fn from_str(encoded: &str) -> Result<Self, Self::Err> {
        let bad = |reason: &str| RepositoryError::BadFlowExecutionKey {
            key: encoded.to_string(),
            reason: reason.to_string(),
        };
        let captures = KEY_PATTERN
            .captures(encoded)
            .ok_or_else(|| bad("expected the form e<conversation>s<snapshot>"))?;
        let conversation_id =
            Uuid::parse_str(&captures[1]).map_err(|_| bad("conversation id is not a uuid"))?;
        let snapshot_id = captures[2]
            .parse::<u32>()
            .map_err(|_| bad("snapshot id out of range"))?;
        Ok(Self::new(conversation_id, snapshot_id))
    }
}
impl Serialize for FlowExecutionKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}
impl<'de> Deserialize<'de> for FlowExecutionKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer)?
            .parse()
            .map_err(serde::de::Error::custom)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn encodes_and_parses() {
        let key = FlowExecutionKey::new(Uuid::new_v4(), 7);
        let encoded = key.to_string();
        assert!(encoded.starts_with('e'));
        assert!(encoded.ends_with("s7"));
        assert_eq!(encoded.parse::<FlowExecutionKey>().unwrap(), key);
    }
    #[test]
    fn rejects_malformed_keys() {
        for encoded in ["", "e1s1", "x0123456789abcdef0123456789abcdefs1", "e0123456789abcdef0123456789abcdefs"] {
            let error = encoded.parse::<FlowExecutionKey>().unwrap_err();
            assert!(matches!(error, RepositoryError::BadFlowExecutionKey { .. }));
        }
    }
    #[test]
    fn serializes_as_string() {
        let key = FlowExecutionKey::new(Uuid::nil(), 2);
        let json = serde_json::to_string(&key).unwrap();
        assert_eq!(json, "\"e00000000000000000000000000000000s2\"");
        let back: FlowExecutionKey = serde_json::from_str(&json).unwrap();
        assert_eq!(back, key);
    }
}
