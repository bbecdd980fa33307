//! Key condition expressions.
//!
//! Only conjunctions of equality tests are supported:
//! `email = :email AND isActive = :active`.

use serde_json::Value;

use super::{Document, Query, StoreError, StoreResult};

/// One `attribute = :placeholder` test with its bound value.
#[derive(Debug, Clone, PartialEq)]
pub struct Condition {
    pub attribute: String,
    pub value: Value,
}

/// Parsed, value-resolved query expression.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyCondition {
    pub conditions: Vec<Condition>,
}

impl KeyCondition {
    /// Parse the expression of a query and resolve its placeholders.
    pub fn parse(query: &Query) -> StoreResult<Self> {
        let expression = query.expression.trim();
        if expression.is_empty() {
            return Err(StoreError::Expression("empty expression".into()));
        }

        let conditions = split_conjunction(expression)
            .into_iter()
            .map(|clause| parse_clause(clause, &query.values))
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Self { conditions })
    }

    /// Whether an item satisfies every condition.
    pub fn matches(&self, item: &Document) -> bool {
        self.conditions
            .iter()
            .all(|c| item.get(&c.attribute) == Some(&c.value))
    }
}

fn split_conjunction(expression: &str) -> Vec<&str> {
    let mut clauses = Vec::new();
    let mut rest = expression;
    loop {
        let lower = rest.to_ascii_lowercase();
        match lower.find(" and ") {
            Some(pos) => {
                clauses.push(&rest[..pos]);
                rest = &rest[pos + 5..];
            }
            None => {
                clauses.push(rest);
                return clauses;
            }
        }
    }
}

fn parse_clause(clause: &str, values: &Document) -> StoreResult<Condition> {
    let (attribute, placeholder) = clause
        .split_once('=')
        .map(|(a, p)| (a.trim(), p.trim()))
        .ok_or_else(|| {
            StoreError::Expression(format!("expected `attr = :value` in `{}`", clause))
        })?;

    if !is_identifier(attribute) {
        return Err(StoreError::Expression(format!(
            "invalid attribute name `{}`",
            attribute
        )));
    }
    if !placeholder.starts_with(':') || !is_identifier(&placeholder[1..]) {
        return Err(StoreError::Expression(format!(
            "invalid placeholder `{}`",
            placeholder
        )));
    }

    let value = values
        .get(placeholder)
        .cloned()
        .ok_or_else(|| StoreError::Expression(format!("unbound placeholder `{}`", placeholder)))?;

    Ok(Condition {
        attribute: attribute.to_string(),
        value,
    })
}

fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
