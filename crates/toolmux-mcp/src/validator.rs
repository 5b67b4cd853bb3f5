//! Tool argument validation.
//!
//! Two independent passes over the arguments of a call:
//!
//! 1. **Schema**: required properties, declared types, string length and
//!    numeric range. Properties the schema does not declare pass through.
//! 2. **Security**: every string anywhere in the arguments is scanned for
//!    shell/path metacharacters and excessive length.
//!
//! Validation never coerces. The only rewrite is truncation of over-long
//! strings to `maxLength`, and since that is itself reported as an error the
//! truncated copy is only ever observable internally.

use serde_json::{Map, Value};
use toolmux_core::{Tool, ValidationResult};

/// Longest string accepted anywhere in the arguments.
pub const MAX_PARAMETER_LENGTH: usize = 10_000;

/// Substrings flagged by the security pass.
const DANGEROUS_PATTERNS: &[&str] = &["../", "$(", "`", "|", ";", "&"];

/// Validate `params` for `tool_name`, where `tool` is its resolved definition
/// (`None` if no connected server exposes it).
pub fn validate_parameters(
    tool_name: &str,
    tool: Option<&Tool>,
    params: &Value,
) -> ValidationResult {
    let Some(tool) = tool else {
        return ValidationResult::invalid(vec![format!(
            "Tool \"{tool_name}\" not found in any connected MCP server"
        )]);
    };

    let Some(object) = params.as_object() else {
        return ValidationResult::invalid(vec![
            "Tool parameters must be a valid object".to_string(),
        ]);
    };

    let mut errors = Vec::new();
    let sanitized = check_schema(&tool.input_schema, object, &mut errors);
    scan_value(params, "", &mut errors);

    if errors.is_empty() {
        ValidationResult::valid(Value::Object(sanitized))
    } else {
        ValidationResult::invalid(errors)
    }
}

/// Schema pass. Returns the (possibly truncated) copy of `object`.
fn check_schema(
    schema: &Value,
    object: &Map<String, Value>,
    errors: &mut Vec<String>,
) -> Map<String, Value> {
    let mut sanitized = object.clone();

    if schema.get("type").and_then(Value::as_str) != Some("object") {
        return sanitized;
    }

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        for name in required.iter().filter_map(Value::as_str) {
            if !object.contains_key(name) {
                errors.push(format!("Missing required property: {name}"));
            }
        }
    }

    let Some(properties) = schema.get("properties").and_then(Value::as_object) else {
        return sanitized;
    };

    for (name, prop) in properties {
        let Some(value) = object.get(name) else {
            continue;
        };
        let declared = prop.get("type");

        if let Some(declared) = declared
            && !type_matches(declared, value)
        {
            errors.push(format!(
                "Property \"{name}\" should be of type {}, got {}",
                type_label(declared),
                json_type_name(value)
            ));
        }

        match value {
            Value::String(text) if declares(declared, &["string"]) => {
                let length = text.chars().count();
                if let Some(min) = prop.get("minLength").and_then(Value::as_u64)
                    && (length as u64) < min
                {
                    errors.push(format!(
                        "Property \"{name}\" should be at least {min} characters long"
                    ));
                }
                if let Some(max) = prop.get("maxLength").and_then(Value::as_u64)
                    && (length as u64) > max
                {
                    errors.push(format!(
                        "Property \"{name}\" should be at most {max} characters long"
                    ));
                    let keep = usize::try_from(max).unwrap_or(usize::MAX);
                    let truncated = text.chars().take(keep).collect();
                    sanitized.insert(name.clone(), Value::String(truncated));
                }
            }
            Value::Number(number) if declares(declared, &["number", "integer"]) => {
                let Some(actual) = number.as_f64() else {
                    continue;
                };
                if let Some(min) = prop.get("minimum")
                    && min.as_f64().is_some_and(|min| actual < min)
                {
                    errors.push(format!("Property \"{name}\" should be at least {min}"));
                }
                if let Some(max) = prop.get("maximum")
                    && max.as_f64().is_some_and(|max| actual > max)
                {
                    errors.push(format!("Property \"{name}\" should be at most {max}"));
                }
            }
            _ => {}
        }
    }

    sanitized
}

/// Whether the declared `type` (string or list of strings) names any of `names`.
fn declares(declared: Option<&Value>, names: &[&str]) -> bool {
    match declared {
        Some(Value::String(t)) => names.contains(&t.as_str()),
        Some(Value::Array(list)) => list
            .iter()
            .filter_map(Value::as_str)
            .any(|t| names.contains(&t)),
        _ => false,
    }
}

fn type_matches(declared: &Value, value: &Value) -> bool {
    match declared {
        Value::String(t) => single_type_matches(t, value),
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .any(|t| single_type_matches(t, value)),
        // Not a type we can interpret; no constraint.
        _ => true,
    }
}

fn single_type_matches(name: &str, value: &Value) -> bool {
    match name {
        "string" => value.is_string(),
        "number" => value.is_number(),
        "integer" => {
            value.is_i64() || value.is_u64() || value.as_f64().is_some_and(|n| n.fract() == 0.0)
        }
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        "null" => value.is_null(),
        _ => false,
    }
}

fn type_label(declared: &Value) -> String {
    match declared {
        Value::String(t) => t.clone(),
        Value::Array(list) => list
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" | "),
        other => other.to_string(),
    }
}

const fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Security pass: recurse through objects and arrays, flag strings.
fn scan_value(value: &Value, path: &str, errors: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let location = if path.is_empty() { "parameter" } else { path };
            for pattern in DANGEROUS_PATTERNS {
                if text.contains(pattern) {
                    errors.push(format!(
                        "Potentially dangerous pattern detected in {location}: {pattern}"
                    ));
                }
            }

            let length = text.chars().count();
            if length > MAX_PARAMETER_LENGTH {
                let location = if path.is_empty() { "value" } else { path };
                errors.push(format!(
                    "Parameter {location} is too long ({length} characters, max {MAX_PARAMETER_LENGTH})"
                ));
            }
        }
        Value::Object(map) => {
            for (key, child) in map {
                scan_value(child, &join_path(path, key), errors);
            }
        }
        Value::Array(items) => {
            for (index, child) in items.iter().enumerate() {
                scan_value(child, &join_path(path, &index.to_string()), errors);
            }
        }
        _ => {}
    }
}

fn join_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{parent}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolmux_core::ToolDescriptor;

    fn tool_with_schema(schema: Value) -> Tool {
        Tool::from_descriptor(
            ToolDescriptor::new("tool1").with_input_schema(schema),
            "s1",
        )
    }

    fn file_tool() -> Tool {
        tool_with_schema(json!({
            "type": "object",
            "properties": {
                "file_path": {"type": "string", "minLength": 1, "maxLength": 10},
                "count": {"type": "integer", "minimum": 1, "maximum": 5},
                "tags": {"type": "array"}
            },
            "required": ["file_path"]
        }))
    }

    #[test]
    fn test_unknown_tool_fails_regardless_of_arguments() {
        let result = validate_parameters("nope", None, &json!("not even an object"));
        assert!(!result.is_valid);
        assert_eq!(
            result.errors,
            vec!["Tool \"nope\" not found in any connected MCP server"]
        );
    }

    #[test]
    fn test_non_object_parameters() {
        let tool = file_tool();
        for params in [json!(null), json!("x"), json!(3), json!([1, 2])] {
            let result = validate_parameters("tool1", Some(&tool), &params);
            assert_eq!(result.errors, vec!["Tool parameters must be a valid object"]);
        }
    }

    #[test]
    fn test_valid_parameters_pass_through() {
        let tool = file_tool();
        let params = json!({"file_path": "notes.txt", "count": 3, "tags": ["a"], "extra": true});

        let result = validate_parameters("tool1", Some(&tool), &params);

        assert!(result.is_valid, "{:?}", result.errors);
        assert_eq!(result.sanitized_parameters, Some(params));
    }

    #[test]
    fn test_missing_required_property() {
        let result = validate_parameters("tool1", Some(&file_tool()), &json!({}));
        assert_eq!(result.errors, vec!["Missing required property: file_path"]);
        assert!(result.sanitized_parameters.is_none());
    }

    #[test]
    fn test_type_mismatch_is_not_coerced() {
        let result = validate_parameters(
            "tool1",
            Some(&file_tool()),
            &json!({"file_path": 42, "count": "3"}),
        );

        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"Property \"file_path\" should be of type string, got number".to_string()));
        assert!(result
            .errors
            .contains(&"Property \"count\" should be of type integer, got string".to_string()));
    }

    #[test]
    fn test_integer_accepts_whole_floats_only() {
        let tool = file_tool();
        let ok = validate_parameters("tool1", Some(&tool), &json!({"file_path": "a", "count": 2.0}));
        assert!(ok.is_valid);

        let bad = validate_parameters("tool1", Some(&tool), &json!({"file_path": "a", "count": 2.5}));
        assert_eq!(
            bad.errors,
            vec!["Property \"count\" should be of type integer, got number"]
        );
    }

    #[test]
    fn test_numeric_range_is_not_clamped() {
        let result = validate_parameters(
            "tool1",
            Some(&file_tool()),
            &json!({"file_path": "a", "count": 9}),
        );
        assert_eq!(result.errors, vec!["Property \"count\" should be at most 5"]);

        let result = validate_parameters(
            "tool1",
            Some(&file_tool()),
            &json!({"file_path": "a", "count": 0}),
        );
        assert_eq!(result.errors, vec!["Property \"count\" should be at least 1"]);
    }

    #[test]
    fn test_max_length_reports_and_truncates() {
        let long = "x".repeat(50);
        let object = json!({"file_path": long});
        let mut errors = Vec::new();

        let sanitized = check_schema(
            &file_tool().input_schema,
            object.as_object().unwrap(),
            &mut errors,
        );

        assert_eq!(
            errors,
            vec!["Property \"file_path\" should be at most 10 characters long"]
        );
        assert_eq!(sanitized["file_path"], json!("x".repeat(10)));

        let result = validate_parameters("tool1", Some(&file_tool()), &object);
        assert!(!result.is_valid);
        assert!(result.sanitized_parameters.is_none());
    }

    #[test]
    fn test_min_length_counts_characters() {
        let result = validate_parameters("tool1", Some(&file_tool()), &json!({"file_path": ""}));
        assert_eq!(
            result.errors,
            vec!["Property \"file_path\" should be at least 1 characters long"]
        );

        // Ten multibyte characters fit a maxLength of 10.
        let result = validate_parameters(
            "tool1",
            Some(&file_tool()),
            &json!({"file_path": "éééééééééé"}),
        );
        assert!(result.is_valid);
    }

    #[test]
    fn test_union_types() {
        let tool = tool_with_schema(json!({
            "type": "object",
            "properties": {"value": {"type": ["string", "null"]}}
        }));

        assert!(validate_parameters("tool1", Some(&tool), &json!({"value": null})).is_valid);
        let result = validate_parameters("tool1", Some(&tool), &json!({"value": 1}));
        assert_eq!(
            result.errors,
            vec!["Property \"value\" should be of type string | null, got number"]
        );
    }

    #[test]
    fn test_unknown_type_name_is_a_mismatch() {
        let tool = tool_with_schema(json!({
            "type": "object",
            "properties": {"when": {"type": "date"}}
        }));
        let result = validate_parameters("tool1", Some(&tool), &json!({"when": "2024-01-01"}));
        assert_eq!(
            result.errors,
            vec!["Property \"when\" should be of type date, got string"]
        );
    }

    #[test]
    fn test_path_traversal_is_flagged() {
        let result = validate_parameters(
            "tool1",
            Some(&file_tool()),
            &json!({"file_path": "../../etc/passwd"}),
        );

        assert!(!result.is_valid);
        assert!(result
            .errors
            .contains(&"Potentially dangerous pattern detected in file_path: ../".to_string()));
    }

    #[test]
    fn test_security_scan_recurses_with_paths() {
        let tool = tool_with_schema(json!({"type": "object"}));
        let params = json!({
            "options": {"cmd": "ls | wc"},
            "items": ["ok", "a; rm -rf /", {"deep": "$(whoami) & `id`"}]
        });

        let result = validate_parameters("tool1", Some(&tool), &params);

        assert_eq!(
            result.errors,
            vec![
                "Potentially dangerous pattern detected in items.1: ;",
                "Potentially dangerous pattern detected in items.2.deep: $(",
                "Potentially dangerous pattern detected in items.2.deep: `",
                "Potentially dangerous pattern detected in items.2.deep: &",
                "Potentially dangerous pattern detected in options.cmd: |",
            ]
        );
    }

    #[test]
    fn test_overlong_string_is_flagged_without_schema() {
        let tool = tool_with_schema(Value::Null);
        let params = json!({"blob": "a".repeat(MAX_PARAMETER_LENGTH + 1)});

        let result = validate_parameters("tool1", Some(&tool), &params);

        assert_eq!(
            result.errors,
            vec!["Parameter blob is too long (10001 characters, max 10000)"]
        );
    }
}
