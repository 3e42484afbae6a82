//! Record validation utilities.

use crate::execution::MigrationStep;
use crate::schema;
use jsonschema::JSONSchema;
use serde_json::Value;
use thiserror::Error;

/// Validation error type.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Schema validation failed: {0}")]
    SchemaError(String),

    #[error("Inconsistent record: {0}")]
    Inconsistent(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Result of record validation.
#[derive(Debug)]
pub struct ValidationResult {
    pub valid: bool,
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<String>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn add_error(&mut self, error: ValidationError) {
        self.valid = false;
        self.errors.push(error);
    }

    pub fn add_warning(&mut self, warning: String) {
        self.warnings.push(warning);
    }
}

impl Default for ValidationResult {
    fn default() -> Self {
        Self::new()
    }
}

fn validate_against(schema_value: &Value, record: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = ValidationResult::new();

    let compiled = JSONSchema::compile(schema_value)
        .map_err(|e| ValidationError::SchemaError(e.to_string()))?;

    let validation = compiled.validate(record);
    if let Err(errors) = validation {
        for error in errors {
            result.add_error(ValidationError::SchemaError(format!(
                "{} at {}",
                error, error.instance_path
            )));
        }
    }

    Ok(result)
}

/// Validate an analysis record against the JSON schema and its invariants.
pub fn validate_analysis(analysis: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = validate_against(&schema::analysis_schema(), analysis)?;

    let mappings = analysis
        .get("policy_mappings")
        .and_then(|m| m.as_array())
        .cloned()
        .unwrap_or_default();

    if let Some(count) = analysis.get("policy_count").and_then(|c| c.as_u64()) {
        if count as usize != mappings.len() {
            result.add_error(ValidationError::Inconsistent(format!(
                "policy_count {} does not match {} policy mappings",
                count,
                mappings.len()
            )));
        }
    }

    let mut seen = std::collections::HashSet::new();
    for mapping in &mappings {
        if let Some(source) = mapping.get("source_policy").and_then(|s| s.as_str()) {
            if !seen.insert(source.to_string()) {
                result.add_error(ValidationError::Inconsistent(format!(
                    "policy {} mapped more than once",
                    source
                )));
            }
        }
    }

    if let Some(custom) = analysis.get("custom_policies").and_then(|c| c.as_array()) {
        for policy in custom.iter().filter_map(|p| p.as_str()) {
            if !seen.contains(policy) {
                result.add_error(ValidationError::Inconsistent(format!(
                    "custom policy {} has no mapping",
                    policy
                )));
            }
        }
    }

    Ok(result)
}

/// Validate an execution record against the JSON schema and its invariants.
pub fn validate_execution(execution: &Value) -> Result<ValidationResult, ValidationError> {
    let mut result = validate_against(&schema::execution_schema(), execution)?;

    let status = execution
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown");
    let present = |field: &str| execution.get(field).map(|v| !v.is_null()).unwrap_or(false);

    let steps_failed = execution
        .get("steps_failed")
        .and_then(|s| s.as_array())
        .map(|s| s.len())
        .unwrap_or(0);
    if steps_failed > 0 && status != "failed" {
        result.add_error(ValidationError::Inconsistent(format!(
            "{} failed steps recorded but status is {}",
            steps_failed, status
        )));
    }

    if present("converted_bundle") {
        let generated = MigrationStep::GenerateBundle.label();
        let completed = execution
            .get("steps_completed")
            .and_then(|s| s.as_array())
            .map(|steps| steps.iter().any(|s| s.as_str() == Some(generated)))
            .unwrap_or(false);
        if !completed {
            result.add_error(ValidationError::Inconsistent(
                "converted bundle present but the generation step never completed".to_string(),
            ));
        }
    }

    if present("deployment_reference") && status != "completed" {
        result.add_error(ValidationError::Inconsistent(format!(
            "deployment reference set while status is {}",
            status
        )));
    }

    if present("error_message") && status != "failed" {
        result.add_error(ValidationError::Inconsistent(format!(
            "error message set while status is {}",
            status
        )));
    }

    if (status == "completed" || status == "failed") && !present("completed_at") {
        result.add_warning(format!("{} execution has no completed_at", status));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::execution::{MigrationExecution, Transition};

    #[test]
    fn test_validate_analysis_minimal() {
        let analysis = serde_json::json!({
            "id": "a1",
            "proxy_id": "p1",
            "proxy_name": "weather",
            "complexity_score": 31.5,
            "complexity_level": "moderate",
            "policy_count": 1,
            "custom_policies": ["CustomThing"],
            "policy_mappings": [{
                "source_policy": "CustomThing",
                "target_equivalent": "Manual Migration Required",
                "complexity_tier": "complex",
                "notes": "Custom policy requires manual analysis and migration",
                "requires_custom_code": true
            }],
            "dependencies": [],
            "migration_effort": "4-8 hours",
            "recommendations": "No AI recommendations available",
            "status": "completed",
            "analyzed_at": "2024-01-01T00:00:00Z"
        });

        let result = validate_analysis(&analysis).unwrap();
        assert!(result.valid, "Errors: {:?}", result.errors);
    }

    #[test]
    fn test_validate_analysis_count_mismatch() {
        let analysis = serde_json::json!({
            "id": "a1",
            "proxy_id": "p1",
            "proxy_name": "weather",
            "complexity_score": 120,
            "complexity_level": "complex",
            "policy_count": 2,
            "custom_policies": [],
            "policy_mappings": [],
            "dependencies": [],
            "migration_effort": "1-3 days",
            "recommendations": "",
            "status": "completed",
            "analyzed_at": "2024-01-01T00:00:00Z"
        });

        let result = validate_analysis(&analysis).unwrap();
        assert!(!result.valid);
        assert!(result.errors.len() >= 2);
    }

    #[test]
    fn test_validate_execution_record() {
        let mut exec = MigrationExecution::new("a1", "weather", "c1");
        exec.apply(Transition::Begin).unwrap();
        let value = serde_json::to_value(&exec).unwrap();

        let result = validate_execution(&value).unwrap();
        assert!(result.valid, "Errors: {:?}", result.errors);
    }

    #[test]
    fn test_validate_execution_inconsistent() {
        let mut value = serde_json::to_value(MigrationExecution::new("a1", "weather", "c1")).unwrap();
        value["steps_failed"] = serde_json::json!(["Validating source proxy"]);
        value["converted_bundle"] = serde_json::json!("<APIProxy/>");

        let result = validate_execution(&value).unwrap();
        assert!(!result.valid);
        assert_eq!(result.errors.len(), 2);
    }
}
