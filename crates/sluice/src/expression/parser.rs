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

use super::{
    is_truthy, split_path, value_to_string, EvaluationError, Expression, ExpressionParseError,
    ExpressionParser, ParserContext, PropertyResolver,
};
use serde_json::Value;
use std::cmp::Ordering;
use std::sync::Arc;
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOp {
    Equals,
    NotEquals,
    GreaterThan,
    LessThan,
    GreaterThanOrEqual,
    LessThanOrEqual,
    Contains,
}
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Literal(Value),
    Path(Vec<String>),
    Not(Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Compare {
        op: CompareOp,
        left: Box<Node>,
        right: Box<Node>,
    },
}
#[derive(Debug, Clone, PartialEq)]
enum Token {
    Ident(String),
    Number(Value),
    Str(String),
    Op(CompareOp),
    And,
    Or,
    Not,
    True,
    False,
    Null,
    LParen,
    RParen,
}
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleExpressionParser;
impl ExpressionParser for SimpleExpressionParser {
    fn parse_expression(
        &self,
        expression: &str,
        context: &ParserContext,
    ) -> Result<Arc<dyn Expression>, ExpressionParseError> {
        if context.template {
            return Ok(Arc::new(parse_template(expression)?));
        }
        let node = parse_node(strip_delimiters(expression.trim()))?;
        Ok(Arc::new(SimpleExpression {
            source: expression.to_string(),
            node,
        }))
    }
}
pub fn is_template(source: &str) -> bool {
    source.contains("${")
}
fn strip_delimiters(source: &str) -> &str {
    source
        .strip_prefix("${")
        .and_then(|rest| rest.strip_suffix('}'))
        .map_or(source, str::trim)
}
#[derive(Debug)]
pub struct SimpleExpression {
    source: String,
    node: Node,
}
impl SimpleExpression {
    pub fn node(&self) -> &Node {
        &self.node
    }
}
impl Expression for SimpleExpression {
    fn get_value(&self, context: &dyn PropertyResolver) -> Result<Value, EvaluationError> {
        Ok(evaluate(&self.node, context))
    }
    fn set_value(
        &self,
        context: &mut dyn PropertyResolver,
        value: Value,
    ) -> Result<(), EvaluationError> {
        match &self.node {
            Node::Path(path) => context.set_property(path, value),
            _ => Err(EvaluationError::NotSettable {
                expression: self.source.clone(),
            }),
        }
    }
    fn expression_string(&self) -> &str {
        &self.source
    }
    fn is_settable(&self) -> bool {
        matches!(self.node, Node::Path(_))
    }
}
#[derive(Debug)]
enum Segment {
    Text(String),
    Expr(Node),
}
#[derive(Debug)]
pub struct TemplateExpression {
    source: String,
    segments: Vec<Segment>,
}
impl Expression for TemplateExpression {
    fn get_value(&self, context: &dyn PropertyResolver) -> Result<Value, EvaluationError> {
        if let [Segment::Expr(node)] = self.segments.as_slice() {
            return Ok(evaluate(node, context));
        }
        let mut rendered = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Text(text) => rendered.push_str(text),
                Segment::Expr(node) => rendered.push_str(&value_to_string(&evaluate(node, context))),
            }
        }
        Ok(Value::String(rendered))
    }
    fn set_value(
        &self,
        context: &mut dyn PropertyResolver,
        value: Value,
    ) -> Result<(), EvaluationError> {
        match self.segments.as_slice() {
            [Segment::Expr(Node::Path(path))] => context.set_property(path, value),
            _ => Err(EvaluationError::NotSettable {
                expression: self.source.clone(),
            }),
        }
    }
    fn expression_string(&self) -> &str {
        &self.source
    }
    fn is_settable(&self) -> bool {
        matches!(self.segments.as_slice(), [Segment::Expr(Node::Path(_))])
    }
}
fn parse_template(source: &str) -> Result<TemplateExpression, ExpressionParseError> {
    let mut segments = Vec::new();
    let mut rest = source;
    while let Some(start) = rest.find("${") {
        if start > 0 {
            segments.push(Segment::Text(rest[..start].to_string()));
        }
        let after = &rest[start + 2..];
        let end = after
            .find('}')
            .ok_or_else(|| ExpressionParseError::UnterminatedTemplate(source.to_string()))?;
        segments.push(Segment::Expr(parse_node(&after[..end])?));
        rest = &after[end + 1..];
    }
    if !rest.is_empty() || segments.is_empty() {
        segments.push(Segment::Text(rest.to_string()));
    }
    Ok(TemplateExpression {
        source: source.to_string(),
        segments,
    })
}
pub fn parse_node(source: &str) -> Result<Node, ExpressionParseError> {
    let tokens = tokenize(source)?;
    if tokens.is_empty() {
        return Err(ExpressionParseError::InvalidFormat {
            message: "empty expression".to_string(),
            expression: source.to_string(),
        });
    }
    let mut parser = Parser {
        tokens: &tokens,
        pos: 0,
        source,
    };
    let node = parser.parse_or()?;
    if let Some(token) = tokens.get(parser.pos) {
        return Err(ExpressionParseError::UnexpectedToken {
            token: format!("{token:?}"),
            expression: source.to_string(),
        });
    }
    Ok(node)
}
fn expects_operand(tokens: &[Token]) -> bool {
    matches!(
        tokens.last(),
        None | Some(Token::Op(_) | Token::And | Token::Or | Token::Not | Token::LParen)
    )
}
fn tokenize(source: &str) -> Result<Vec<Token>, ExpressionParseError> {
    let chars: Vec<char> = source.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < chars.len() {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        match c {
            c if c.is_whitespace() => i += 1,
            '(' => {
                tokens.push(Token::LParen);
                i += 1;
            }
            ')' => {
                tokens.push(Token::RParen);
                i += 1;
            }
            '\'' | '"' => {
                let mut text = String::new();
                let mut j = i + 1;
                loop {
                    let Some(&ch) = chars.get(j) else {
                        return Err(ExpressionParseError::UnterminatedString(source.to_string()));
                    };
                    if ch == '\\' {
                        if let Some(&escaped) = chars.get(j + 1) {
                            text.push(escaped);
                            j += 2;
                            continue;
                        }
                    }
                    if ch == c {
                        break;
                    }
                    text.push(ch);
                    j += 1;
                }
                tokens.push(Token::Str(text));
                i = j + 1;
            }
            '=' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::Equals));
                i += 2;
            }
            '!' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::NotEquals));
                i += 2;
            }
            '!' => {
                tokens.push(Token::Not);
                i += 1;
            }
            '>' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::GreaterThanOrEqual));
                i += 2;
            }
            '>' => {
                tokens.push(Token::Op(CompareOp::GreaterThan));
                i += 1;
            }
            '<' if next == Some('=') => {
                tokens.push(Token::Op(CompareOp::LessThanOrEqual));
                i += 2;
            }
            '<' => {
                tokens.push(Token::Op(CompareOp::LessThan));
                i += 1;
            }
            '&' if next == Some('&') => {
                tokens.push(Token::And);
                i += 2;
            }
            '|' if next == Some('|') => {
                tokens.push(Token::Or);
                i += 2;
            }
            c if c.is_ascii_digit()
                || (c == '-'
                    && next.is_some_and(|n| n.is_ascii_digit())
                    && expects_operand(&tokens)) =>
            {
                let mut j = i + 1;
                while j < chars.len() && (chars[j].is_ascii_digit() || chars[j] == '.') {
                    j += 1;
                }
                let text: String = chars[i..j].iter().collect();
                tokens.push(Token::Number(parse_number(&text, source)?));
                i = j;
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut j = i + 1;
                while j < chars.len()
                    && (chars[j].is_alphanumeric() || chars[j] == '_' || chars[j] == '.')
                {
                    j += 1;
                }
                let word: String = chars[i..j].iter().collect();
                tokens.push(match word.as_str() {
                    "and" => Token::And,
                    "or" => Token::Or,
                    "not" => Token::Not,
                    "true" => Token::True,
                    "false" => Token::False,
                    "null" => Token::Null,
                    "contains" => Token::Op(CompareOp::Contains),
                    _ => Token::Ident(word),
                });
                i = j;
            }
            other => {
                return Err(ExpressionParseError::UnexpectedToken {
                    token: other.to_string(),
                    expression: source.to_string(),
                })
            }
        }
    }
    Ok(tokens)
}
fn parse_number(text: &str, source: &str) -> Result<Value, ExpressionParseError> {
    let invalid = || ExpressionParseError::InvalidFormat {
        message: format!("invalid number '{text}'"),
        expression: source.to_string(),
    };
    if !text.contains('.') {
        if let Ok(n) = text.parse::<i64>() {
            return Ok(Value::from(n));
        }
    }
    let n = text.parse::<f64>().map_err(|_| invalid())?;
    serde_json::Number::from_f64(n)
        .map(Value::Number)
        .ok_or_else(invalid)
}
struct Parser<'a> {
    tokens: &'a [Token],
    pos: usize,
    source: &'a str,
}
impl Parser<'_> {
    fn eat(&mut self, token: &Token) -> bool {
        if self.tokens.get(self.pos) == Some(token) {
            self.pos += 1;
            true
        } else {
            false
        }
    }
    fn parse_or(&mut self) -> Result<Node, ExpressionParseError> {
        let mut left = self.parse_and()?;
        while self.eat(&Token::Or) {
            let right = self.parse_and()?;
            left = Node::Or(Box::new(left), Box::new(right));
        }
        Ok(left)
    }
    fn parse_and(&mut self) -> Result<Node, ExpressionParseError> {
        let mut left = self.parse_unary()?;
        while self.eat(&Token::And) {
            let right = self.parse_unary()?;
            left = Node::And(Box::new(left), Box::new(right));
        }
        Ok(left)
    }
    fn parse_unary(&mut self) -> Result<Node, ExpressionParseError> {
        if self.eat(&Token::Not) {
            return Ok(Node::Not(Box::new(self.parse_unary()?)));
        }
        self.parse_comparison()
    }
    fn parse_comparison(&mut self) -> Result<Node, ExpressionParseError> {
        let left = self.parse_primary()?;
        if let Some(Token::Op(op)) = self.tokens.get(self.pos).cloned() {
            self.pos += 1;
            let right = self.parse_primary()?;
            return Ok(Node::Compare {
                op,
                left: Box::new(left),
                right: Box::new(right),
            });
        }
        Ok(left)
    }
    fn parse_primary(&mut self) -> Result<Node, ExpressionParseError> {
        let token = self.tokens.get(self.pos).cloned().ok_or_else(|| {
            ExpressionParseError::InvalidFormat {
                message: "unexpected end of expression".to_string(),
                expression: self.source.to_string(),
            }
        })?;
        self.pos += 1;
        match token {
            Token::Ident(path) => Ok(Node::Path(split_path(&path))),
            Token::Number(value) => Ok(Node::Literal(value)),
            Token::Str(text) => Ok(Node::Literal(Value::String(text))),
            Token::True => Ok(Node::Literal(Value::Bool(true))),
            Token::False => Ok(Node::Literal(Value::Bool(false))),
            Token::Null => Ok(Node::Literal(Value::Null)),
            Token::LParen => {
                let inner = self.parse_or()?;
                if !self.eat(&Token::RParen) {
                    return Err(ExpressionParseError::InvalidFormat {
                        message: "missing ')'".to_string(),
                        expression: self.source.to_string(),
                    });
                }
                Ok(inner)
            }
            other => Err(ExpressionParseError::UnexpectedToken {
                token: format!("{other:?}"),
                expression: self.source.to_string(),
            }),
        }
    }
}
pub fn evaluate(node: &Node, context: &dyn PropertyResolver) -> Value {
    match node {
        Node::Literal(value) => value.clone(),
        Node::Path(path) => context.get_property(path).unwrap_or(Value::Null),
        Node::Not(inner) => Value::Bool(!is_truthy(&evaluate(inner, context))),
        Node::And(left, right) => Value::Bool(
            is_truthy(&evaluate(left, context)) && is_truthy(&evaluate(right, context)),
        ),
        Node::Or(left, right) => Value::Bool(
            is_truthy(&evaluate(left, context)) || is_truthy(&evaluate(right, context)),
        ),
        Node::Compare { op, left, right } => Value::Bool(compare(
            *op,
            &evaluate(left, context),
            &evaluate(right, context),
        )),
    }
}
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}
fn values_equal(left: &Value, right: &Value) -> bool {
    if let (Value::Number(a), Value::Number(b)) = (left, right) {
        return match (a.as_f64(), b.as_f64()) {
            (Some(x), Some(y)) => (x - y).abs() < f64::EPSILON,
            _ => a == b,
        };
    }
    match (left, right) {
        (Value::String(s), other) | (other, Value::String(s))
            if !other.is_string() && !other.is_null() =>
        {
            *s == value_to_string(other)
        }
        _ => left == right,
    }
}
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (as_number(left), as_number(right)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => match (left, right) {
            (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
            _ => None,
        },
    }
}
fn compare(op: CompareOp, left: &Value, right: &Value) -> bool {
    match op {
        CompareOp::Equals => values_equal(left, right),
        CompareOp::NotEquals => !values_equal(left, right),
        CompareOp::Contains => match left {
            Value::String(haystack) => haystack.contains(&value_to_string(right)),
            Value::Array(items) => items.iter().any(|item| values_equal(item, right)),
            Value::Object(map) => map.contains_key(&value_to_string(right)),
            _ => false,
        },
        CompareOp::GreaterThan => ordering(left, right) == Some(Ordering::Greater),
        CompareOp::LessThan => ordering(left, right) == Some(Ordering::Less),
        CompareOp::GreaterThanOrEqual => matches!(
            ordering(left, right),
            Some(Ordering::Greater | Ordering::Equal)
        ),
        CompareOp::LessThanOrEqual => {
            matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal))
        }
    }
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::AttributeMap;
    use serde_json::json;

    fn scope() -> AttributeMap {
        let mut attrs = AttributeMap::new();
        attrs.put("count", json!(3));
        attrs.put("name", json!("ada"));
        attrs.put("flags", json!(["a", "b"]));
        attrs.put("order", json!({"total": 12.5, "lines": [{"sku": "x1"}]}));
        attrs
    }

    fn eval(source: &str) -> Value {
        SimpleExpressionParser
            .parse_expression(source, &ParserContext::eval())
            .unwrap()
            .get_value(&scope())
            .unwrap()
    }

    #[test]
    fn comparisons_and_logic() {
        assert_eq!(eval("count > 2"), json!(true));
        assert_eq!(eval("count >= 3 && name == 'ada'"), json!(true));
        assert_eq!(eval("count < 3 or not (name != \"ada\")"), json!(true));
        assert_eq!(eval("order.total <= 12"), json!(false));
        assert_eq!(eval("flags contains 'b'"), json!(true));
        assert_eq!(eval("name contains 'd'"), json!(true));
        assert_eq!(eval("count == '3'"), json!(true));
        assert_eq!(eval("-1 < count"), json!(true));
    }

    #[test]
    fn paths_navigate_objects_and_arrays() {
        assert_eq!(eval("order.lines.0.sku"), json!("x1"));
        assert_eq!(eval("missing.value"), Value::Null);
        assert_eq!(eval("${count}"), json!(3));
    }

    #[test]
    fn templates_render_or_pass_through() {
        let parser = SimpleExpressionParser;
        let single = parser
            .parse_expression("${count}", &ParserContext::template())
            .unwrap();
        assert_eq!(single.get_value(&scope()).unwrap(), json!(3));
        let mixed = parser
            .parse_expression("hello-${name}-${count}", &ParserContext::template())
            .unwrap();
        assert_eq!(mixed.get_value(&scope()).unwrap(), json!("hello-ada-3"));
        let plain = parser
            .parse_expression("view1", &ParserContext::template())
            .unwrap();
        assert_eq!(plain.get_value(&scope()).unwrap(), json!("view1"));
        assert!(!plain.is_settable());
    }

    #[test]
    fn set_value_on_paths_only() {
        let parser = SimpleExpressionParser;
        let mut attrs = scope();
        let target = parser
            .parse_expression("order.customer.id", &ParserContext::eval())
            .unwrap();
        assert!(target.is_settable());
        target.set_value(&mut attrs, json!(7)).unwrap();
        assert_eq!(attrs.get("order").unwrap()["customer"]["id"], json!(7));
        let literal = parser
            .parse_expression("count > 1", &ParserContext::eval())
            .unwrap();
        assert!(matches!(
            literal.set_value(&mut attrs, json!(1)),
            Err(EvaluationError::NotSettable { .. })
        ));
    }

    #[test]
    fn malformed_expressions_are_rejected() {
        let parser = SimpleExpressionParser;
        for source in ["", "count >", "(count", "'open", "count # 2", "a b"] {
            assert!(
                parser
                    .parse_expression(source, &ParserContext::eval())
                    .is_err(),
                "expected '{source}' to fail"
            );
        }
        assert!(matches!(
            parser.parse_expression("${open", &ParserContext::template()),
            Err(ExpressionParseError::UnterminatedTemplate(_))
        ));
    }
}
