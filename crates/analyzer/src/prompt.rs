//! Prompt rendering for oracle requests.

use crate::oracle::OracleRequest;
use edgeshift_common::{Error, Result};
use edgeshift_redaction::Redactor;
use edgeshift_schema::PolicyMapping;
use handlebars::Handlebars;
use serde_json::json;

/// Characters of descriptor text sent with a scoring request.
pub const SCORING_EXCERPT_CHARS: usize = 2000;

/// Characters of descriptor text sent with a conversion request.
pub const CONVERSION_EXCERPT_CHARS: usize = 3000;

pub const SCORING_SYSTEM_PROMPT: &str = "You are an expert in Apigee Edge to Apigee X migrations. Analyze proxy configurations and provide migration complexity assessments.";

pub const CONVERSION_SYSTEM_PROMPT: &str = "You are an expert in converting Apigee Edge configurations to Apigee X format. Generate valid Apigee X proxy bundles.";

const SCORING_TEMPLATE: &str = r#"Analyze this Apigee Edge proxy configuration for migration to Apigee X:

Policies found: {{policies}}

Proxy content preview:
{{excerpt}}...

Provide a JSON response with:
1. complexity_score (0-100, where 0=simple, 100=very complex)
2. complexity_reasoning (why this score)
3. migration_effort (estimated hours/days)
4. key_challenges (list of main migration challenges)
5. recommendations (specific migration recommendations)
6. custom_policies (list of any custom/non-standard policies detected)

Focus on:
- Custom JavaScript/Node.js code
- Non-standard policy usage
- Complex integrations
- Deprecated features
- Security implications
"#;

const CONVERSION_TEMPLATE: &str = r#"Convert this Apigee Edge proxy configuration to Apigee X format:

Original Edge Configuration:
{{excerpt}}...

Policy Mappings to Apply:
{{mappings}}

Requirements:
1. Convert all policies to Apigee X equivalents
2. Update policy configurations for Apigee X compatibility
3. Ensure proper flow structure
4. Handle custom policies appropriately
5. Return valid XML configuration

Generate the complete Apigee X proxy bundle XML.
"#;

const SCORING_MAX_TOKENS: u32 = 2000;
const CONVERSION_MAX_TOKENS: u32 = 4000;
const TEMPERATURE: f32 = 0.1;

/// Renders redacted, size-bounded oracle requests.
pub struct PromptRenderer {
    registry: Handlebars<'static>,
    redactor: Redactor,
}

impl PromptRenderer {
    pub fn new() -> Result<Self> {
        Self::with_redactor(Redactor::new())
    }

    pub fn with_redactor(redactor: Redactor) -> Result<Self> {
        let mut registry = Handlebars::new();
        registry.register_escape_fn(handlebars::no_escape);
        registry
            .register_template_string("scoring", SCORING_TEMPLATE)
            .map_err(|e| Error::Template(e.to_string()))?;
        registry
            .register_template_string("conversion", CONVERSION_TEMPLATE)
            .map_err(|e| Error::Template(e.to_string()))?;

        Ok(Self { registry, redactor })
    }

    /// Request for a complexity opinion on a proxy.
    pub fn scoring_request(&self, policies: &[String], descriptor: &str) -> Result<OracleRequest> {
        let prompt = self
            .registry
            .render(
                "scoring",
                &json!({
                    "policies": policies.join(", "),
                    "excerpt": self.excerpt(descriptor, SCORING_EXCERPT_CHARS),
                }),
            )
            .map_err(|e| Error::Template(e.to_string()))?;

        Ok(OracleRequest {
            system: SCORING_SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens: SCORING_MAX_TOKENS,
            temperature: TEMPERATURE,
        })
    }

    /// Request for a converted descriptor.
    pub fn conversion_request(
        &self,
        descriptor: &str,
        mappings: &[PolicyMapping],
    ) -> Result<OracleRequest> {
        let prompt = self
            .registry
            .render(
                "conversion",
                &json!({
                    "excerpt": self.excerpt(descriptor, CONVERSION_EXCERPT_CHARS),
                    "mappings": serde_json::to_string_pretty(mappings)?,
                }),
            )
            .map_err(|e| Error::Template(e.to_string()))?;

        Ok(OracleRequest {
            system: CONVERSION_SYSTEM_PROMPT.to_string(),
            prompt,
            max_tokens: CONVERSION_MAX_TOKENS,
            temperature: TEMPERATURE,
        })
    }

    /// Redact, then keep at most `max_chars` characters.
    fn excerpt(&self, text: &str, max_chars: usize) -> String {
        truncate_chars(&self.redactor.redact(text).content, max_chars)
    }
}

/// Keep at most `max_chars` characters of `text`.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((index, _)) => text[..index].to_string(),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("abcdef", 3), "abc");
        assert_eq!(truncate_chars("abc", 3), "abc");
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("", 10), "");
    }

    #[test]
    fn test_scoring_request() {
        let renderer = PromptRenderer::new().unwrap();
        let prefix = "<APIProxy name=\"a&b\">";
        let descriptor = format!("{}{}</APIProxy>", prefix, "x".repeat(5000));
        let request = renderer
            .scoring_request(&["Quota".to_string(), "JavaScript".to_string()], &descriptor)
            .unwrap();

        assert_eq!(request.system, SCORING_SYSTEM_PROMPT);
        assert_eq!(request.max_tokens, 2000);
        assert!(request.prompt.contains("Policies found: Quota, JavaScript"));
        assert!(request.prompt.contains("<APIProxy name=\"a&b\">"));
        assert!(request.prompt.contains(&format!("{}...", "x".repeat(2000 - prefix.len()))));
        assert!(!request.prompt.contains(&"x".repeat(2001)));
    }

    #[test]
    fn test_conversion_request_redacts_secrets() {
        let renderer = PromptRenderer::new().unwrap();
        let descriptor = "<BasicAuthentication><Password>hunter2</Password></BasicAuthentication>";
        let mappings = vec![PolicyMapping::manual("CustomThing")];
        let request = renderer.conversion_request(descriptor, &mappings).unwrap();

        assert_eq!(request.system, CONVERSION_SYSTEM_PROMPT);
        assert_eq!(request.max_tokens, 4000);
        assert!(!request.prompt.contains("hunter2"));
        assert!(request.prompt.contains("\"source_policy\": \"CustomThing\""));
        assert!(request.prompt.contains("Manual Migration Required"));
    }
}
