//! Strict parsing of oracle replies into [`Decision`]s.
//!
//! The reply must hold exactly one decision per submitted context, in the
//! same order. It may be a bare JSON array or an object with a `decisions`
//! array, optionally wrapped in a fenced markdown code block. Nothing else
//! is repaired: a missing flag is a schema error and any malformed value is
//! a validation error, both fatal for the tick.
//!
//! Per decision, checks run in this order:
//! 1. the decision is a JSON object
//! 2. an `agent_id` echo, if present, matches the context
//! 3. each flag (`move`, `combat`, `credit`, `reproduce`) is present and boolean
//! 4. each payload whose flag is true is present and well-formed
//!
//! A payload sent alongside a false flag is ignored.

use serde_json::Value;

use sugarscape_types::{AgentContext, AgentId, Decision, DecisionCategory, Position};

use crate::error::{Location, OracleError};

/// Flags in the order they are checked.
const FLAG_ORDER: [DecisionCategory; 4] = [
    DecisionCategory::Move,
    DecisionCategory::Combat,
    DecisionCategory::Credit,
    DecisionCategory::Reproduce,
];

/// Longest excerpt of a bad value quoted in an error.
const MAX_EXCERPT: usize = 120;

/// Parse and validate a reply against the contexts it answers.
///
/// # Errors
///
/// Returns [`OracleError::Schema`] or [`OracleError::Validation`]
/// identifying the first offending decision, field and value.
pub fn parse_decisions(raw: &str, contexts: &[AgentContext]) -> Result<Vec<Decision>, OracleError> {
    let trimmed = raw.trim();
    let body = extract_json_from_codeblock(trimmed).unwrap_or(trimmed);
    let json: Value = serde_json::from_str(body).map_err(|e| OracleError::Validation {
        at: Location::Response,
        field: "decisions",
        value: excerpt(body),
        reason: format!("reply is not valid JSON: {e}"),
    })?;

    let items = decision_array(&json)?;
    if items.len() != contexts.len() {
        return Err(OracleError::Validation {
            at: Location::Response,
            field: "decisions",
            value: format!("{} decisions", items.len()),
            reason: format!("expected exactly {} decisions", contexts.len()),
        });
    }

    items
        .iter()
        .zip(contexts)
        .enumerate()
        .map(|(index, (item, context))| {
            let at = Location::Decision {
                index,
                agent_id: context.agent_id,
            };
            parse_one(item, at, context.agent_id)
        })
        .collect()
}

/// Locate the decision list in the reply.
fn decision_array(json: &Value) -> Result<&Vec<Value>, OracleError> {
    match json {
        Value::Array(items) => Ok(items),
        Value::Object(map) => match map.get("decisions") {
            Some(Value::Array(items)) => Ok(items),
            Some(other) => Err(OracleError::Validation {
                at: Location::Response,
                field: "decisions",
                value: excerpt(&other.to_string()),
                reason: "expected an array".to_owned(),
            }),
            None => Err(OracleError::Schema {
                at: Location::Response,
                field: "decisions",
            }),
        },
        other => Err(OracleError::Validation {
            at: Location::Response,
            field: "decisions",
            value: excerpt(&other.to_string()),
            reason: "expected an array or an object with a `decisions` array".to_owned(),
        }),
    }
}

fn parse_one(item: &Value, at: Location, expected: AgentId) -> Result<Decision, OracleError> {
    let Value::Object(map) = item else {
        return Err(OracleError::Validation {
            at,
            field: "decision",
            value: excerpt(&item.to_string()),
            reason: "expected an object".to_owned(),
        });
    };

    if let Some(echo) = map.get("agent_id") {
        let id = parse_agent_id(echo, at, "agent_id")?;
        if id != expected {
            return Err(OracleError::Validation {
                at,
                field: "agent_id",
                value: echo.to_string(),
                reason: format!("decision is for agent {id}, expected agent {expected}"),
            });
        }
    }

    let mut flags = [false; 4];
    for (slot, category) in flags.iter_mut().zip(FLAG_ORDER) {
        let field = category.as_str();
        *slot = match map.get(field) {
            None => return Err(OracleError::Schema { at, field }),
            Some(Value::Bool(flag)) => *flag,
            Some(other) => {
                return Err(OracleError::Validation {
                    at,
                    field,
                    value: excerpt(&other.to_string()),
                    reason: "expected a boolean".to_owned(),
                });
            }
        };
    }
    let [relocate, combat, credit, reproduce] = flags;

    let mut decision = Decision {
        relocate,
        combat,
        credit,
        reproduce,
        ..Decision::abstain()
    };
    if relocate {
        let value = required_payload(map, at, DecisionCategory::Move)?;
        decision.move_target_cell = Some(parse_cell(value, at)?);
    }
    if combat {
        let field = DecisionCategory::Combat.payload_field();
        let value = required_payload(map, at, DecisionCategory::Combat)?;
        decision.combat_target_id = Some(parse_agent_id(value, at, field)?);
    }
    if credit {
        let field = DecisionCategory::Credit.payload_field();
        let value = required_payload(map, at, DecisionCategory::Credit)?;
        decision.credit_partner_id = Some(parse_agent_id(value, at, field)?);
    }
    if reproduce {
        let field = DecisionCategory::Reproduce.payload_field();
        let value = required_payload(map, at, DecisionCategory::Reproduce)?;
        decision.reproduce_with_id = Some(parse_agent_id(value, at, field)?);
    }
    Ok(decision)
}

/// The payload for a category whose flag is true.
fn required_payload<'a>(
    map: &'a serde_json::Map<String, Value>,
    at: Location,
    category: DecisionCategory,
) -> Result<&'a Value, OracleError> {
    match map.get(category.payload_field()) {
        Some(value) if !value.is_null() => Ok(value),
        other => Err(OracleError::Validation {
            at,
            field: category.payload_field(),
            value: other.map_or_else(|| "<absent>".to_owned(), ToString::to_string),
            reason: format!("required when `{}` is true", category.as_str()),
        }),
    }
}

fn parse_agent_id(value: &Value, at: Location, field: &'static str) -> Result<AgentId, OracleError> {
    value.as_u64().map(AgentId::new).ok_or_else(|| OracleError::Validation {
        at,
        field,
        value: excerpt(&value.to_string()),
        reason: "expected a non-negative integer agent id".to_owned(),
    })
}

/// Accepts `[x, y]` or `{"x": .., "y": ..}`.
fn parse_cell(value: &Value, at: Location) -> Result<Position, OracleError> {
    let field = DecisionCategory::Move.payload_field();
    let invalid = |reason: &str| OracleError::Validation {
        at,
        field,
        value: excerpt(&value.to_string()),
        reason: reason.to_owned(),
    };
    let (x, y) = match value {
        Value::Array(items) => match items.as_slice() {
            [x, y] => (x, y),
            _ => return Err(invalid("expected exactly two coordinates [x, y]")),
        },
        Value::Object(map) => match (map.get("x"), map.get("y")) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(invalid("expected an object with `x` and `y`")),
        },
        _ => return Err(invalid("expected [x, y] or {\"x\": .., \"y\": ..}")),
    };
    let coordinate = |v: &Value| v.as_u64().and_then(|n| u32::try_from(n).ok());
    match (coordinate(x), coordinate(y)) {
        (Some(x), Some(y)) => Ok(Position::new(x, y)),
        _ => Err(invalid("coordinates must be non-negative integers")),
    }
}

/// Extract JSON from a markdown code block.
fn extract_json_from_codeblock(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_fence = open.checked_add(3)?;
    let rest = text.get(after_fence..)?;
    // Skip the info string (e.g. `json`) up to the end of the line.
    let body_start = rest.find('\n').and_then(|nl| nl.checked_add(1)).unwrap_or(0);
    let body = rest.get(body_start..)?;
    let end = body.find("```")?;
    body.get(..end).map(str::trim)
}

fn excerpt(text: &str) -> String {
    if text.chars().count() <= MAX_EXCERPT {
        return text.to_owned();
    }
    let mut cut: String = text.chars().take(MAX_EXCERPT).collect();
    cut.push_str("...");
    cut
}
