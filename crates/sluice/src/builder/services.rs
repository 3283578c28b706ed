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

use crate::engine::{
    Action, ConversionService, DefaultConversionService, NamedViewFactoryCreator, TypeConversion,
    ViewFactoryCreator,
};
use crate::errors::FlowBuilderError;
use crate::expression::{Expression, ExpressionParser, ParserContext, SimpleExpressionParser};
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
/// Named actions that flow models refer to by `bean`.
#[derive(Default)]
pub struct ActionRegistry {
    actions: RwLock<HashMap<String, Arc<dyn Action>>>,
}
impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }
    /// Replaces any action already registered under `name`.
    pub fn register(&self, name: impl Into<String>, action: Arc<dyn Action>) {
        self.actions.write().insert(name.into(), action);
    }
    pub fn get(&self, name: &str) -> Result<Arc<dyn Action>, FlowBuilderError> {
        self.actions
            .read()
            .get(name)
            .cloned()
            .ok_or_else(|| FlowBuilderError::ArtifactNotFound {
                kind: "action".to_string(),
                id: name.to_string(),
            })
    }
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.actions.read().keys().cloned().collect();
        names.sort();
        names
    }
}
/// Collaborators a builder uses to turn model strings into runtime artifacts.
#[derive(Clone)]
pub struct FlowBuilderServices {
    expression_parser: Arc<dyn ExpressionParser>,
    conversion_service: Arc<dyn ConversionService>,
    view_factory_creator: Arc<dyn ViewFactoryCreator>,
    actions: Arc<ActionRegistry>,
}
impl Default for FlowBuilderServices {
    fn default() -> Self {
        Self {
            expression_parser: Arc::new(SimpleExpressionParser),
            conversion_service: Arc::new(DefaultConversionService::new()),
            view_factory_creator: Arc::new(NamedViewFactoryCreator),
            actions: Arc::new(ActionRegistry::new()),
        }
    }
}
impl FlowBuilderServices {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_expression_parser(mut self, parser: Arc<dyn ExpressionParser>) -> Self {
        self.expression_parser = parser;
        self
    }
    pub fn with_conversion_service(mut self, service: Arc<dyn ConversionService>) -> Self {
        self.conversion_service = service;
        self
    }
    pub fn with_view_factory_creator(mut self, creator: Arc<dyn ViewFactoryCreator>) -> Self {
        self.view_factory_creator = creator;
        self
    }
    pub fn with_actions(mut self, actions: Arc<ActionRegistry>) -> Self {
        self.actions = actions;
        self
    }
    pub fn expression_parser(&self) -> &Arc<dyn ExpressionParser> {
        &self.expression_parser
    }
    pub fn conversion_service(&self) -> &Arc<dyn ConversionService> {
        &self.conversion_service
    }
    pub fn view_factory_creator(&self) -> &Arc<dyn ViewFactoryCreator> {
        &self.view_factory_creator
    }
    pub fn actions(&self) -> &Arc<ActionRegistry> {
        &self.actions
    }
    pub fn parse(&self, expression: &str) -> Result<Arc<dyn Expression>, FlowBuilderError> {
        Ok(self
            .expression_parser
            .parse_expression(expression, &ParserContext::eval())?)
    }
    pub fn parse_template(&self, template: &str) -> Result<Arc<dyn Expression>, FlowBuilderError> {
        Ok(self
            .expression_parser
            .parse_expression(template, &ParserContext::template())?)
    }
    /// Unsupported type names are construction errors.
    pub fn conversion(&self, target_type: &str) -> Result<TypeConversion, FlowBuilderError> {
        if !self.conversion_service.supports(target_type) {
            return Err(FlowBuilderError::ArtifactNotFound {
                kind: "type conversion".to_string(),
                id: target_type.to_string(),
            });
        }
        Ok(TypeConversion {
            target_type: target_type.to_string(),
            service: Arc::clone(&self.conversion_service),
        })
    }
    pub fn action(&self, name: &str) -> Result<Arc<dyn Action>, FlowBuilderError> {
        self.actions.get(name)
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::FnAction;
    use crate::execution::Event;
    fn noop(name: &str) -> Arc<dyn Action> {
        Arc::new(FnAction::new(name, |_context| Ok(Event::success())))
    }
    #[test]
    fn registry_lists_sorted_names_and_rejects_unknown() {
        let registry = ActionRegistry::new();
        registry.register("validate", noop("validate"));
        registry.register("charge", noop("charge"));
        registry.register("charge", noop("charge"));
        assert_eq!(registry.names(), vec!["charge", "validate"]);
        assert!(registry.get("charge").is_ok());
        assert!(matches!(
            registry.get("refund"),
            Err(FlowBuilderError::ArtifactNotFound { ref kind, ref id }) if kind == "action" && id == "refund"
        ));
    }
}
