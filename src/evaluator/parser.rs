// src/evaluator/parser.rs — Tool-call payload audit and validation
//
// The emitted arguments are read twice from the same text. The audit pass
// records top-level key order and skips every value; the structural pass
// decodes nested objects. Neither pass sees the other's output.

use std::fmt;

use serde::de::{Deserializer as _, IgnoredAny, MapAccess, Visitor};
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;

use super::rubric::{CANONICAL_KEY_ORDER, CHECK_NAMES, FLAG_NAMES, REQUIRED_FIELDS, TOOL_NAME};
use crate::provider::ModelResponse;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("no submit_evaluation tool call in response")]
    MissingToolCall,

    #[error("tool arguments are not a JSON object: {0}")]
    Malformed(String),

    #[error("missing required fields: {}", .0.join(", "))]
    MissingFields(Vec<String>),

    #[error("score is not numeric: {0}")]
    InvalidScore(String),

    #[error("score {0} outside 0..=10")]
    ScoreOutOfRange(f64),

    #[error("vocabulary_specificity is not numeric: {0}")]
    InvalidVocabulary(String),

    #[error("vocabulary_specificity {0} outside 1..=10")]
    VocabularyOutOfRange(f64),

    #[error("checks is not an object: {0}")]
    InvalidChecks(String),

    #[error("missing check booleans: {}", .0.join(", "))]
    MissingChecks(Vec<String>),

    #[error("unexpected checks: {}", .0.join(", "))]
    UnexpectedChecks(Vec<String>),

    #[error("check {name} has non-boolean value {value}")]
    NonBooleanCheck { name: String, value: String },

    #[error("flags must be a list of strings: {0}")]
    InvalidFlags(String),
}

/// Top-level keys in the order the model emitted them.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyOrderReport {
    pub keys: Vec<String>,
}

impl KeyOrderReport {
    /// The canonical order, with `flags` optional.
    pub fn expected(&self) -> Vec<&'static str> {
        let has_flags = self.keys.iter().any(|k| k == "flags");
        CANONICAL_KEY_ORDER
            .iter()
            .copied()
            .filter(|k| *k != "flags" || has_flags)
            .collect()
    }

    pub fn is_canonical(&self) -> bool {
        self.keys.iter().map(String::as_str).eq(self.expected())
    }

    pub fn joined(&self) -> String {
        self.keys.join(",")
    }
}

struct KeyOrderVisitor;

impl<'de> Visitor<'de> for KeyOrderVisitor {
    type Value = Vec<String>;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON object")
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<Self::Value, A::Error> {
        let mut keys = Vec::new();
        while let Some(key) = map.next_key::<String>()? {
            map.next_value::<IgnoredAny>()?;
            keys.push(key);
        }
        Ok(keys)
    }
}

/// Audit pass: top-level keys only, values are skipped unread.
pub fn audit_key_order(raw: &str) -> Result<KeyOrderReport, ValidationError> {
    let mut de = serde_json::Deserializer::from_str(raw);
    let keys = (&mut de)
        .deserialize_map(KeyOrderVisitor)
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    de.end()
        .map_err(|e| ValidationError::Malformed(e.to_string()))?;
    Ok(KeyOrderReport { keys })
}

/// Structural pass: the full object with nested values intact.
pub fn decode_payload(raw: &str) -> Result<Map<String, Value>, ValidationError> {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(other) => Err(ValidationError::Malformed(other.to_string())),
        Err(e) => Err(ValidationError::Malformed(e.to_string())),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RubricChecks {
    pub has_verse_refs: bool,
    pub any_factual_error_detected: bool,
    pub only_generic_motifs: bool,
    pub counterargument_considered: bool,
    pub lxx_mt_numbering_acknowledged: bool,
}

impl RubricChecks {
    /// (name, value) pairs in declaration order.
    pub fn entries(&self) -> [(&'static str, bool); 5] {
        [
            ("has_verse_refs", self.has_verse_refs),
            ("any_factual_error_detected", self.any_factual_error_detected),
            ("only_generic_motifs", self.only_generic_motifs),
            ("counterargument_considered", self.counterargument_considered),
            ("lxx_mt_numbering_acknowledged", self.lxx_mt_numbering_acknowledged),
        ]
    }

    fn from_value(value: &Value) -> Result<Self, ValidationError> {
        let obj = value
            .as_object()
            .ok_or_else(|| ValidationError::InvalidChecks(value.to_string()))?;

        let missing: Vec<String> = CHECK_NAMES
            .iter()
            .filter(|n| !obj.contains_key(**n))
            .map(|n| n.to_string())
            .collect();
        if !missing.is_empty() {
            return Err(ValidationError::MissingChecks(missing));
        }
        let unexpected: Vec<String> = obj
            .keys()
            .filter(|k| !CHECK_NAMES.contains(&k.as_str()))
            .cloned()
            .collect();
        if !unexpected.is_empty() {
            return Err(ValidationError::UnexpectedChecks(unexpected));
        }

        let get = |name: &str| -> Result<bool, ValidationError> {
            match &obj[name] {
                Value::Bool(b) => Ok(*b),
                Value::Number(n) if n.as_f64() == Some(0.0) => Ok(false),
                Value::Number(n) if n.as_f64() == Some(1.0) => Ok(true),
                other => Err(ValidationError::NonBooleanCheck {
                    name: name.to_string(),
                    value: other.to_string(),
                }),
            }
        };

        Ok(Self {
            has_verse_refs: get("has_verse_refs")?,
            any_factual_error_detected: get("any_factual_error_detected")?,
            only_generic_motifs: get("only_generic_motifs")?,
            counterargument_considered: get("counterargument_considered")?,
            lxx_mt_numbering_acknowledged: get("lxx_mt_numbering_acknowledged")?,
        })
    }
}

/// A validated evaluation, fields in canonical order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationPayload {
    pub justification: String,
    pub checks: RubricChecks,
    pub vocabulary_specificity: f64,
    pub flags: Vec<String>,
    pub score: f64,
}

impl EvaluationPayload {
    /// Flags outside the declared enumeration. Kept, but worth a warning.
    pub fn unknown_flags(&self) -> Vec<&str> {
        self.flags
            .iter()
            .map(String::as_str)
            .filter(|f| !FLAG_NAMES.contains(f))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvaluation {
    pub call_id: String,
    pub payload: EvaluationPayload,
    pub key_order: KeyOrderReport,
}

fn numeric(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }?;
    n.is_finite().then_some(n)
}

/// Validate the structured payload decoded from tool arguments.
pub fn validate(map: &Map<String, Value>) -> Result<EvaluationPayload, ValidationError> {
    let missing: Vec<String> = REQUIRED_FIELDS
        .iter()
        .filter(|f| !map.contains_key(**f))
        .map(|f| f.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ValidationError::MissingFields(missing));
    }

    let score = numeric(&map["score"])
        .ok_or_else(|| ValidationError::InvalidScore(map["score"].to_string()))?;
    if !(0.0..=10.0).contains(&score) {
        return Err(ValidationError::ScoreOutOfRange(score));
    }

    let vocab = &map["vocabulary_specificity"];
    let vocabulary_specificity =
        numeric(vocab).ok_or_else(|| ValidationError::InvalidVocabulary(vocab.to_string()))?;
    if !(1.0..=10.0).contains(&vocabulary_specificity) {
        return Err(ValidationError::VocabularyOutOfRange(vocabulary_specificity));
    }

    let checks = RubricChecks::from_value(&map["checks"])?;

    let flags = match map.get("flags") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|v| v.as_str().map(str::to_string))
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| ValidationError::InvalidFlags(Value::Array(items.clone()).to_string()))?,
        Some(other) => return Err(ValidationError::InvalidFlags(other.to_string())),
    };

    let justification = match &map["justification"] {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    };

    Ok(EvaluationPayload {
        justification,
        checks,
        vocabulary_specificity,
        flags,
        score,
    })
}

/// Find the forced tool call and run both passes over its arguments.
pub fn parse_tool_call(response: &ModelResponse) -> Result<ParsedEvaluation, ValidationError> {
    let call = response
        .tool_calls
        .iter()
        .find(|c| c.name == TOOL_NAME)
        .ok_or(ValidationError::MissingToolCall)?;

    let key_order = audit_key_order(&call.arguments)?;
    let structure = decode_payload(&call.arguments)?;
    let payload = validate(&structure)?;

    Ok(ParsedEvaluation {
        call_id: call.id.clone(),
        payload,
        key_order,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ToolCall;
    use crate::usage::UsageTokens;
    use pretty_assertions::assert_eq;

    const CANONICAL: &str = r#"{"justification":"Shared rare root.","checks":{"has_verse_refs":true,"any_factual_error_detected":false,"only_generic_motifs":false,"counterargument_considered":true,"lxx_mt_numbering_acknowledged":false},"vocabulary_specificity":6,"flags":[],"score":5}"#;

    fn response_with(name: &str, arguments: &str) -> ModelResponse {
        ModelResponse {
            output_text: String::new(),
            tool_calls: vec![ToolCall {
                id: "call_1".into(),
                name: name.into(),
                arguments: arguments.into(),
            }],
            usage: UsageTokens::default(),
            raw: Value::Null,
        }
    }

    fn parse(arguments: &str) -> Result<ParsedEvaluation, ValidationError> {
        parse_tool_call(&response_with("submit_evaluation", arguments))
    }

    #[test]
    fn test_canonical_payload() {
        let parsed = parse(CANONICAL).unwrap();
        assert!(parsed.key_order.is_canonical());
        assert_eq!(parsed.payload.score, 5.0);
        assert_eq!(parsed.payload.vocabulary_specificity, 6.0);
        assert!(parsed.payload.checks.has_verse_refs);
        assert_eq!(parsed.call_id, "call_1");
    }

    #[test]
    fn test_audit_ignores_nested_keys() {
        let report = audit_key_order(CANONICAL).unwrap();
        assert_eq!(
            report.keys,
            vec!["justification", "checks", "vocabulary_specificity", "flags", "score"]
        );
        assert_eq!(report.joined(), "justification,checks,vocabulary_specificity,flags,score");
    }

    #[test]
    fn test_out_of_order_keys_still_valid() {
        let raw = r#"{"score":3,"checks":{"lxx_mt_numbering_acknowledged":false,"has_verse_refs":true,"only_generic_motifs":true,"counterargument_considered":false,"any_factual_error_detected":false},"justification":"Generic.","vocabulary_specificity":2}"#;
        let parsed = parse(raw).unwrap();
        assert!(!parsed.key_order.is_canonical());
        assert_eq!(parsed.key_order.keys[0], "score");

        // checks stays a nested object, independent of the audit pass
        let stored = serde_json::to_value(parsed.payload.checks).unwrap();
        assert!(stored.is_object());
        assert_eq!(stored["has_verse_refs"], true);
        assert_eq!(stored["only_generic_motifs"], true);
    }

    #[test]
    fn test_flags_optional_in_canonical_order() {
        let report = KeyOrderReport {
            keys: vec![
                "justification".into(),
                "checks".into(),
                "vocabulary_specificity".into(),
                "score".into(),
            ],
        };
        assert!(report.is_canonical());
    }

    #[test]
    fn test_missing_tool_call() {
        let err = parse_tool_call(&response_with("other_tool", CANONICAL)).unwrap_err();
        assert_eq!(err, ValidationError::MissingToolCall);
    }

    #[test]
    fn test_missing_fields() {
        let err = parse(r#"{"justification":"x","score":4}"#).unwrap_err();
        assert_eq!(
            err,
            ValidationError::MissingFields(vec!["checks".into(), "vocabulary_specificity".into()])
        );
    }

    #[test]
    fn test_score_out_of_range() {
        let raw = CANONICAL.replace(r#""score":5"#, r#""score":11"#);
        assert_eq!(parse(&raw).unwrap_err(), ValidationError::ScoreOutOfRange(11.0));
    }

    #[test]
    fn test_score_numeric_string() {
        let raw = CANONICAL.replace(r#""score":5"#, r#""score":"7.5""#);
        assert_eq!(parse(&raw).unwrap().payload.score, 7.5);
    }

    #[test]
    fn test_score_not_numeric() {
        let raw = CANONICAL.replace(r#""score":5"#, r#""score":"high""#);
        assert!(matches!(parse(&raw).unwrap_err(), ValidationError::InvalidScore(_)));
    }

    #[test]
    fn test_vocabulary_out_of_range() {
        let raw = CANONICAL.replace(r#""vocabulary_specificity":6"#, r#""vocabulary_specificity":0"#);
        assert_eq!(parse(&raw).unwrap_err(), ValidationError::VocabularyOutOfRange(0.0));
    }

    #[test]
    fn test_checks_accept_zero_one() {
        let raw = CANONICAL
            .replace(r#""has_verse_refs":true"#, r#""has_verse_refs":1"#)
            .replace(r#""only_generic_motifs":false"#, r#""only_generic_motifs":0"#);
        let checks = parse(&raw).unwrap().payload.checks;
        assert!(checks.has_verse_refs);
        assert!(!checks.only_generic_motifs);
    }

    #[test]
    fn test_checks_accept_float_zero_one() {
        let raw = CANONICAL
            .replace(r#""has_verse_refs":true"#, r#""has_verse_refs":1.0"#)
            .replace(r#""counterargument_considered":true"#, r#""counterargument_considered":0.0"#);
        let checks = parse(&raw).unwrap().payload.checks;
        assert!(checks.has_verse_refs);
        assert!(!checks.counterargument_considered);
    }

    #[test]
    fn test_checks_reject_other_values() {
        let raw = CANONICAL.replace(r#""has_verse_refs":true"#, r#""has_verse_refs":"yes""#);
        assert!(matches!(
            parse(&raw).unwrap_err(),
            ValidationError::NonBooleanCheck { ref name, .. } if name == "has_verse_refs"
        ));

        let half = CANONICAL.replace(r#""has_verse_refs":true"#, r#""has_verse_refs":0.5"#);
        assert!(matches!(
            parse(&half).unwrap_err(),
            ValidationError::NonBooleanCheck { ref value, .. } if value == "0.5"
        ));
    }

    #[test]
    fn test_checks_exact_set() {
        let missing = CANONICAL.replace(r#""has_verse_refs":true,"#, "");
        assert_eq!(
            parse(&missing).unwrap_err(),
            ValidationError::MissingChecks(vec!["has_verse_refs".into()])
        );

        let extra = CANONICAL.replace(r#""has_verse_refs":true,"#, r#""has_verse_refs":true,"bonus":true,"#);
        assert_eq!(
            parse(&extra).unwrap_err(),
            ValidationError::UnexpectedChecks(vec!["bonus".into()])
        );

        let flat = CANONICAL.replace(
            r#"{"has_verse_refs":true,"any_factual_error_detected":false,"only_generic_motifs":false,"counterargument_considered":true,"lxx_mt_numbering_acknowledged":false}"#,
            r#"[true,false,false,true,false]"#,
        );
        assert!(matches!(parse(&flat).unwrap_err(), ValidationError::InvalidChecks(_)));
    }

    #[test]
    fn test_flags() {
        let raw = CANONICAL.replace(r#""flags":[]"#, r#""flags":["generic","made_up"]"#);
        let payload = parse(&raw).unwrap().payload;
        assert_eq!(payload.flags, vec!["generic", "made_up"]);
        assert_eq!(payload.unknown_flags(), vec!["made_up"]);

        let null = CANONICAL.replace(r#""flags":[]"#, r#""flags":null"#);
        assert!(parse(&null).unwrap().payload.flags.is_empty());

        let bad = CANONICAL.replace(r#""flags":[]"#, r#""flags":"generic""#);
        assert!(matches!(parse(&bad).unwrap_err(), ValidationError::InvalidFlags(_)));
    }

    #[test]
    fn test_malformed_arguments() {
        assert!(matches!(parse("[1,2]").unwrap_err(), ValidationError::Malformed(_)));
        assert!(matches!(parse("{\"score\":").unwrap_err(), ValidationError::Malformed(_)));
    }

    #[test]
    fn test_payload_serializes_in_canonical_order() {
        let payload = parse(CANONICAL).unwrap().payload;
        let text = serde_json::to_string(&payload).unwrap();
        let report = audit_key_order(&text).unwrap();
        assert!(report.is_canonical());
    }
}
