//! JSON schema definitions for persisted records.

/// JSON Schema for an analysis record.
pub const ANALYSIS_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://edgeshift.dev/schemas/analysis.json",
  "title": "EdgeShift Proxy Analysis",
  "type": "object",
  "required": [
    "id", "proxy_id", "proxy_name", "complexity_score", "complexity_level",
    "policy_count", "custom_policies", "policy_mappings", "dependencies",
    "migration_effort", "recommendations", "status", "analyzed_at"
  ],
  "properties": {
    "id": { "type": "string", "minLength": 1 },
    "proxy_id": { "type": "string", "minLength": 1 },
    "proxy_name": { "type": "string" },
    "complexity_score": { "type": "number", "minimum": 0, "maximum": 100 },
    "complexity_level": { "type": "string", "enum": ["simple", "moderate", "complex"] },
    "policy_count": { "type": "integer", "minimum": 0 },
    "custom_policies": { "type": "array", "items": { "type": "string" } },
    "policy_mappings": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["source_policy", "target_equivalent", "complexity_tier", "notes", "requires_custom_code"],
        "properties": {
          "source_policy": { "type": "string", "minLength": 1 },
          "target_equivalent": { "type": "string", "minLength": 1 },
          "complexity_tier": { "type": "string", "enum": ["simple", "moderate", "complex"] },
          "notes": { "type": "string" },
          "requires_custom_code": { "type": "boolean" }
        }
      }
    },
    "dependencies": { "type": "array", "items": { "type": "string" } },
    "migration_effort": { "type": "string" },
    "recommendations": { "type": "string" },
    "status": { "type": "string", "enum": ["pending", "completed", "failed"] },
    "analyzed_at": { "type": "string", "format": "date-time" }
  }
}"#;

/// JSON Schema for a migration execution record.
pub const EXECUTION_SCHEMA: &str = r#"{
  "$schema": "https://json-schema.org/draft/2020-12/schema",
  "$id": "https://edgeshift.dev/schemas/execution.json",
  "title": "EdgeShift Migration Execution",
  "type": "object",
  "required": [
    "id", "analysis_id", "proxy_name", "credentials_id", "status", "progress",
    "current_step", "steps_completed", "steps_failed", "log", "created_at"
  ],
  "properties": {
    "id": { "type": "string", "minLength": 1 },
    "analysis_id": { "type": "string", "minLength": 1 },
    "proxy_name": { "type": "string" },
    "credentials_id": { "type": "string" },
    "status": {
      "type": "string",
      "enum": ["pending", "preparing", "converting", "validating", "deploying", "completed", "failed"]
    },
    "progress": { "type": "integer", "minimum": 0, "maximum": 100 },
    "current_step": { "type": "string" },
    "steps_completed": { "type": "array", "items": { "type": "string" } },
    "steps_failed": { "type": "array", "items": { "type": "string" } },
    "log": {
      "type": "array",
      "items": {
        "type": "object",
        "required": ["at", "message"],
        "properties": {
          "at": { "type": "string", "format": "date-time" },
          "message": { "type": "string" }
        }
      }
    },
    "converted_bundle": { "type": ["string", "null"] },
    "deployment_reference": { "type": ["string", "null"] },
    "error_message": { "type": ["string", "null"] },
    "created_at": { "type": "string", "format": "date-time" },
    "started_at": { "type": ["string", "null"], "format": "date-time" },
    "completed_at": { "type": ["string", "null"], "format": "date-time" }
  }
}"#;

/// Get the analysis schema as a parsed JSON value.
pub fn analysis_schema() -> serde_json::Value {
    serde_json::from_str(ANALYSIS_SCHEMA).expect("Invalid analysis schema")
}

/// Get the execution schema as a parsed JSON value.
pub fn execution_schema() -> serde_json::Value {
    serde_json::from_str(EXECUTION_SCHEMA).expect("Invalid execution schema")
}
