//! Parse -> schema validation -> auto-remediation -> revalidation pipeline
//! for the raw LLM completion text (spec.md §4.5).

use crate::domain::errors::ValidationError;
use crate::domain::orchestrator::schema::AgentOutputs;
use serde_json::Value;

/// Runs the full validation pipeline. On the first parse/schema failure,
/// attempts one remediation pass and revalidates; any residual violation
/// returns `ValidationError`.
pub fn parse_and_validate(raw: &str) -> Result<AgentOutputs, ValidationError> {
    match try_parse(raw) {
        Ok(outputs) => Ok(outputs),
        Err(_) => {
            let remediated = remediate(raw);
            try_parse(&remediated).map_err(|e| ValidationError::ParseFailed {
                reason: format!("remediation did not produce valid output: {e}"),
            })
        }
    }
}

fn try_parse(raw: &str) -> Result<AgentOutputs, String> {
    let value: Value = serde_json::from_str(raw).map_err(|e| e.to_string())?;
    let array = value.as_array().ok_or("top-level value is not a JSON array")?;
    if array.len() != 4 {
        return Err(format!("expected 4 agent objects, found {}", array.len()));
    }

    let clipped: Vec<Value> = array.iter().cloned().map(clip_confidence_fields).collect();

    let signal = serde_json::from_value(clipped[0].clone()).map_err(|e| format!("signal: {e}"))?;
    let risk = serde_json::from_value(clipped[1].clone()).map_err(|e| format!("risk: {e}"))?;
    let context = serde_json::from_value(clipped[2].clone()).map_err(|e| format!("context: {e}"))?;
    let synthesis: crate::domain::orchestrator::schema::SynthesisAgentOutput =
        serde_json::from_value(clipped[3].clone()).map_err(|e| format!("synthesis: {e}"))?;

    Ok(AgentOutputs {
        signal,
        risk,
        context,
        synthesis,
    })
}

/// Clips `confidence`-like numeric fields to `[0, 1]` in place; leaves other
/// fields untouched. Applied before strict deserialization so a slightly
/// out-of-range model output doesn't fail schema validation outright.
fn clip_confidence_fields(mut value: Value) -> Value {
    if let Some(obj) = value.as_object_mut() {
        for key in ["confidence", "regime_confidence", "signal_regime_fit"] {
            if let Some(v) = obj.get(key)
                && let Some(n) = v.as_f64()
            {
                obj.insert(key.to_string(), Value::from(n.clamp(0.0, 1.0)));
            }
        }
        if let Some(synthesis) = obj.get_mut("final_decision")
            && let Some(inner) = synthesis.as_object_mut()
            && let Some(v) = inner.get("confidence")
            && let Some(n) = v.as_f64()
        {
            inner.insert("confidence".to_string(), Value::from(n.clamp(0.0, 1.0)));
        }
    }
    value
}

/// Auto-remediation: strips stray prose before/after the JSON array, fixes
/// trailing commas, and casts numeric strings to numbers (spec.md §4.5).
fn remediate(raw: &str) -> String {
    let trimmed = extract_json_array_slice(raw);
    let no_trailing_commas = strip_trailing_commas(trimmed);
    cast_numeric_strings(&no_trailing_commas)
}

fn extract_json_array_slice(raw: &str) -> &str {
    let start = raw.find('[');
    let end = raw.rfind(']');
    match (start, end) {
        (Some(s), Some(e)) if e > s => &raw[s..=e],
        _ => raw,
    }
}

fn strip_trailing_commas(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let chars: Vec<char> = input.chars().collect();
    let mut i = 0;
    while i < chars.len() {
        if chars[i] == ',' {
            let mut j = i + 1;
            while j < chars.len() && chars[j].is_whitespace() {
                j += 1;
            }
            if j < chars.len() && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }
    out
}

/// Casts quoted numeric literals (`"0.5"`) to bare numbers so strict
/// deserialization into `f64`/`Decimal` fields succeeds.
fn cast_numeric_strings(input: &str) -> String {
    let value: Result<Value, _> = serde_json::from_str(input);
    match value {
        Ok(v) => serde_json::to_string(&cast_value(v)).unwrap_or_else(|_| input.to_string()),
        Err(_) => input.to_string(),
    }
}

fn cast_value(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (k, maybe_cast_numeric_string(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.into_iter().map(cast_value).collect()),
        other => other,
    }
}

fn maybe_cast_numeric_string(value: Value) -> Value {
    match &value {
        Value::String(s) => {
            if let Ok(n) = s.parse::<f64>() {
                Value::from(n)
            } else {
                cast_value(value)
            }
        }
        Value::Object(_) | Value::Array(_) => cast_value(value),
        _ => value,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"[
        {"action":"BUY","confidence":0.8,"reasoning":"bullish"},
        {"approved":true,"confidence":0.7,"position_size_adjustment":1.0,"stop_loss_required":true},
        {"regime":"TRENDING_UP","regime_confidence":0.9,"signal_regime_fit":0.85},
        {"final_decision":{"action":"BUY","lots":1.0,"stop_loss":1.0950,"take_profit":1.1100,"confidence":0.75,"reasoning":"agrees"}}
    ]"#;

    #[test]
    fn test_parses_clean_response() {
        let outputs = parse_and_validate(VALID).unwrap();
        assert!(outputs.risk.approved);
    }

    #[test]
    fn test_remediates_stray_prose_and_trailing_commas() {
        let noisy = format!("Here is my analysis:\n{VALID}\nThanks!").replace("\"bullish\"}", "\"bullish\",}");
        let outputs = parse_and_validate(&noisy).unwrap();
        assert_eq!(outputs.signal.reasoning, "bullish");
    }

    #[test]
    fn test_clips_out_of_range_confidence() {
        let noisy = VALID.replace("\"confidence\":0.8", "\"confidence\":1.5");
        let outputs = parse_and_validate(&noisy).unwrap();
        assert!(outputs.signal.confidence <= 1.0);
    }

    #[test]
    fn test_casts_numeric_strings() {
        let noisy = VALID.replace("\"confidence\":0.8", "\"confidence\":\"0.8\"");
        let outputs = parse_and_validate(&noisy).unwrap();
        assert_eq!(outputs.signal.confidence, 0.8);
    }

    #[test]
    fn test_residual_violation_fails() {
        let broken = r#"[{"action":"BUY"}]"#;
        let result = parse_and_validate(broken);
        assert!(result.is_err());
    }
}
