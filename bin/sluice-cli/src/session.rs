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

use anyhow::Result;
use serde_json::Value;
use sluice::{
    AttributeMap, Event, ExternalContext, FlowDefinitionRegistry, FlowExecutionResult,
    FlowExecutor, SluiceConfig,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing::warn;

pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    raw.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .ok_or_else(|| format!("expected KEY=VALUE, got '{raw}'"))
}

/// JSON when it parses, otherwise the raw string.
fn to_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn print_result(result: &FlowExecutionResult) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(result)?);
    Ok(())
}

/// Reads `event [key=value ...]` lines. An empty line re-renders the
/// current view, `quit` leaves.
pub fn run(
    registry: Arc<FlowDefinitionRegistry>,
    config: &SluiceConfig,
    flow_id: &str,
    input: Vec<(String, String)>,
) -> Result<()> {
    let executor = FlowExecutor::with_defaults(registry, &config.repository);
    let input: AttributeMap = input.into_iter().map(|(k, v)| (k, to_value(&v))).collect();
    let mut result = executor.launch_execution(flow_id, input, &ExternalContext::new())?;
    print_result(&result)?;
    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    while let Some(key) = result.key() {
        print!("{}> ", result.state_id().unwrap_or_default());
        io::stdout().flush()?;
        let Some(line) = lines.next().transpose()? else {
            break;
        };
        let line = line.trim();
        if line == "quit" {
            break;
        }
        let mut words = line.split_whitespace();
        let mut external = ExternalContext::new();
        let event = match words.next() {
            None => None,
            Some(id) => {
                let mut event = Event::new(id);
                for word in words {
                    match parse_pair(word) {
                        Ok((name, value)) => {
                            let value = to_value(&value);
                            event = event.with_attribute(name.clone(), value.clone());
                            external = external.with_parameter(name, value);
                        }
                        Err(message) => warn!("{message}"),
                    }
                }
                Some(event)
            }
        };
        match executor.resume_execution(&key.to_string(), event, &external) {
            Ok(next) => {
                result = next;
                print_result(&result)?;
            }
            Err(error) if error.is_no_such_execution() => {
                eprintln!("{error}; launch the flow again");
                break;
            }
            Err(error) => eprintln!("request failed: {error}"),
        }
    }
    Ok(())
}
#[cfg(test)]
mod tests {
    use super::*;
    #[test]
    fn pairs_split_on_first_equals() {
        assert_eq!(
            parse_pair("query=a=b").unwrap(),
            ("query".to_string(), "a=b".to_string())
        );
        assert!(parse_pair("=x").is_err());
        assert!(parse_pair("flag").is_err());
    }
    #[test]
    fn values_prefer_json() {
        assert_eq!(to_value("3"), serde_json::json!(3));
        assert_eq!(to_value("true"), serde_json::json!(true));
        assert_eq!(to_value("plain"), serde_json::json!("plain"));
    }
}
