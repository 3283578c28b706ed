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

use tracing::{debug, error, info};
pub fn log_assembly_phase(flow_id: &str, phase: &str) {
    debug!(flow_id = flow_id, phase = phase, "Assembly phase");
}
pub fn log_state_entered(flow_id: &str, state_id: &str) {
    debug!(flow_id = flow_id, state_id = state_id, "State entered");
}
pub fn log_event_signaled(flow_id: &str, state_id: Option<&str>, event_id: &str) {
    debug!(
        flow_id = flow_id,
        state_id = state_id.unwrap_or("<none>"),
        event_id = event_id,
        "Event signaled"
    );
}
pub fn log_transition(flow_id: &str, from: &str, to: &str) {
    debug!(flow_id = flow_id, from = from, to = to, "Transition executing");
}
pub fn log_session_ended(flow_id: &str, outcome: &str, root: bool) {
    info!(
        flow_id = flow_id,
        outcome = outcome,
        root = root,
        "Flow session ended"
    );
}
pub fn log_repository_event(event: &str, key: &str) {
    debug!(event = event, key = key, "Repository event");
}
pub fn log_error(context: &str, error: &dyn std::error::Error) {
    error!(
        context = context,
        error = %error,
        "Execution error"
    );
}
