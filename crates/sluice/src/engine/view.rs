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

use super::action::{Action, ActionError};
use crate::execution::{Event, RequestContext, ScopeType};
use crate::expression::{value_to_string, Expression};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
/// What a view factory hands back. The engine only stores it for the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderedView {
    pub view_id: String,
    pub model: Value,
}
pub trait ViewFactory: Send + Sync {
    fn create_view(&self, context: &RequestContext<'_>) -> Result<RenderedView, ActionError>;
}
/// Produces one view factory per view expression found in a flow model.
pub trait ViewFactoryCreator: Send + Sync {
    fn create_view_factory(&self, view_id: Arc<dyn Expression>) -> Arc<dyn ViewFactory>;
}
/// Resolves the view id and exposes the flash, view and flow scopes as the model.
#[derive(Debug)]
pub struct NamedViewFactory {
    view_id: Arc<dyn Expression>,
}
impl NamedViewFactory {
    pub fn new(view_id: Arc<dyn Expression>) -> Self {
        Self { view_id }
    }
}
impl ViewFactory for NamedViewFactory {
    fn create_view(&self, context: &RequestContext<'_>) -> Result<RenderedView, ActionError> {
        let view_id = value_to_string(&self.view_id.get_value(context)?);
        let mut model = Map::new();
        for scope in [ScopeType::Flash, ScopeType::View, ScopeType::Flow] {
            if let Some(attributes) = context.scope(scope) {
                model.insert(scope.as_str().to_string(), attributes.to_value());
            }
        }
        Ok(RenderedView {
            view_id,
            model: Value::Object(model),
        })
    }
}
#[derive(Debug, Default, Clone, Copy)]
pub struct NamedViewFactoryCreator;
impl ViewFactoryCreator for NamedViewFactoryCreator {
    fn create_view_factory(&self, view_id: Arc<dyn Expression>) -> Arc<dyn ViewFactory> {
        Arc::new(NamedViewFactory::new(view_id))
    }
}
/// Renders a view as an action, used for an end state's final response.
pub struct RenderAction {
    factory: Arc<dyn ViewFactory>,
}
impl RenderAction {
    pub fn new(factory: Arc<dyn ViewFactory>) -> Self {
        Self { factory }
    }
}
impl Action for RenderAction {
    fn execute(&self, context: &mut RequestContext<'_>) -> Result<Event, ActionError> {
        let view = self.factory.create_view(context)?;
        context.set_rendered_view(view);
        Ok(Event::success())
    }
}
