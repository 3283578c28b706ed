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

use super::action::TypeConversion;
use crate::expression::{Expression, PropertyResolver};
use serde_json::Value;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MappingError {
    #[error("Required value '{source_expression}' is missing for '{target}'")]
    Required {
        source_expression: String,
        target: String,
    },
    #[error("Could not read '{source_expression}': {message}")]
    SourceAccess {
        source_expression: String,
        message: String,
    },
    #[error("Could not write '{target}': {message}")]
    TargetAccess { target: String, message: String },
    #[error("Could not convert '{source_expression}' to {target_type}: {message}")]
    TypeConversion {
        source_expression: String,
        target_type: String,
        message: String,
    },
}
/// Copies one value from a source expression to a target expression.
#[derive(Debug, Clone)]
pub struct Mapping {
    source: Arc<dyn Expression>,
    target: Arc<dyn Expression>,
    conversion: Option<TypeConversion>,
    required: bool,
}
impl Mapping {
    pub fn new(source: Arc<dyn Expression>, target: Arc<dyn Expression>) -> Self {
        Self {
            source,
            target,
            conversion: None,
            required: false,
        }
    }
    pub fn with_conversion(mut self, conversion: TypeConversion) -> Self {
        self.conversion = Some(conversion);
        self
    }
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
    pub fn is_required(&self) -> bool {
        self.required
    }
    pub fn source_expression(&self) -> &str {
        self.source.expression_string()
    }
    pub fn target_expression(&self) -> &str {
        self.target.expression_string()
    }
    fn map(
        &self,
        source: &dyn PropertyResolver,
        target: &mut dyn PropertyResolver,
    ) -> Result<Value, MappingError> {
        let mut value =
            self.source
                .get_value(source)
                .map_err(|e| MappingError::SourceAccess {
                    source_expression: self.source_expression().to_string(),
                    message: e.to_string(),
                })?;
        let empty = match &value {
            Value::Null => true,
            Value::String(s) => s.is_empty(),
            _ => false,
        };
        if self.required && empty {
            return Err(MappingError::Required {
                source_expression: self.source_expression().to_string(),
                target: self.target_expression().to_string(),
            });
        }
        if let Some(conversion) = &self.conversion {
            value = conversion
                .apply(value)
                .map_err(|e| MappingError::TypeConversion {
                    source_expression: self.source_expression().to_string(),
                    target_type: conversion.target_type.clone(),
                    message: e.to_string(),
                })?;
        }
        self.target
            .set_value(target, value.clone())
            .map_err(|e| MappingError::TargetAccess {
                target: self.target_expression().to_string(),
                message: e.to_string(),
            })?;
        Ok(value)
    }
}
#[derive(Debug, Clone)]
pub struct MappingResult {
    pub source: String,
    pub target: String,
    pub outcome: Result<Value, MappingError>,
}
#[derive(Debug, Clone, Default)]
pub struct MappingResults {
    results: Vec<MappingResult>,
}
impl MappingResults {
    pub fn results(&self) -> &[MappingResult] {
        &self.results
    }
    pub fn has_errors(&self) -> bool {
        self.results.iter().any(|r| r.outcome.is_err())
    }
    pub fn errors(&self) -> impl Iterator<Item = &MappingError> {
        self.results.iter().filter_map(|r| r.outcome.as_ref().err())
    }
    pub fn into_errors(self) -> Vec<MappingError> {
        self.results
            .into_iter()
            .filter_map(|r| r.outcome.err())
            .collect()
    }
}
/// Ordered mappings between two attribute sources. Every mapping runs, even
/// after an earlier one failed, so all problems are reported together.
#[derive(Debug, Clone, Default)]
pub struct Mapper {
    mappings: Vec<Mapping>,
}
impl Mapper {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn add_mapping(&mut self, mapping: Mapping) -> &mut Self {
        self.mappings.push(mapping);
        self
    }
    pub fn mappings(&self) -> &[Mapping] {
        &self.mappings
    }
    pub fn is_empty(&self) -> bool {
        self.mappings.is_empty()
    }
    pub fn map(
        &self,
        source: &dyn PropertyResolver,
        target: &mut dyn PropertyResolver,
    ) -> MappingResults {
        let results = self
            .mappings
            .iter()
            .map(|mapping| MappingResult {
                source: mapping.source_expression().to_string(),
                target: mapping.target_expression().to_string(),
                outcome: mapping.map(source, target),
            })
            .collect::<Vec<_>>();
        debug!(
            mappings = results.len(),
            failed = results.iter().filter(|r| r.outcome.is_err()).count(),
            "Attribute mapping complete"
        );
        MappingResults { results }
    }
}
