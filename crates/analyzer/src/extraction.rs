//! Policy and metadata extraction from a canonical bundle.
//!
//! Extraction runs an ordered list of strategies, each contributing zero or
//! more policy identifiers. Contributions are unioned into a [`PolicySet`].

use crate::xml::XmlElement;
use edgeshift_schema::bundle::is_binary_marker;
use edgeshift_schema::{CanonicalBundle, ProxyMetadata, ResourceDescriptor, ResourceKind};
use std::collections::HashSet;
use tracing::{debug, warn};

/// Unique policy identifiers in first-seen order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PolicySet {
    policies: Vec<String>,
    seen: HashSet<String>,
}

impl PolicySet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a policy; blank and duplicate identifiers are ignored.
    pub fn insert(&mut self, policy: &str) -> bool {
        let policy = policy.trim();
        if policy.is_empty() || self.seen.contains(policy) {
            return false;
        }
        self.seen.insert(policy.to_string());
        self.policies.push(policy.to_string());
        true
    }

    pub fn len(&self) -> usize {
        self.policies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.policies.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.policies.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.policies.clone()
    }
}

impl<'a> FromIterator<&'a str> for PolicySet {
    fn from_iter<I: IntoIterator<Item = &'a str>>(iter: I) -> Self {
        let mut set = PolicySet::new();
        for policy in iter {
            set.insert(policy);
        }
        set
    }
}

/// A source of policy identifiers within a bundle.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, bundle: &CanonicalBundle) -> Vec<String>;
}

/// `<Policies><Policy>..</Policy></Policies>` in the root descriptor.
pub struct DeclaredPolicies;

/// `<Step><Name>..</Name></Step>` references anywhere in the root descriptor.
pub struct FlowSteps;

/// Policy documents: the root tag when parseable, else the file stem.
pub struct PolicyDocuments;

/// Declarations and step references in proxy and target endpoint documents.
pub struct EndpointDocuments;

impl ExtractionStrategy for DeclaredPolicies {
    fn name(&self) -> &'static str {
        "declared-policies"
    }

    fn extract(&self, bundle: &CanonicalBundle) -> Vec<String> {
        bundle
            .main_config
            .as_deref()
            .and_then(|doc| parse_logged("root descriptor", doc))
            .map(|root| declared_policies(&root))
            .unwrap_or_default()
    }
}

impl ExtractionStrategy for FlowSteps {
    fn name(&self) -> &'static str {
        "flow-steps"
    }

    fn extract(&self, bundle: &CanonicalBundle) -> Vec<String> {
        bundle
            .main_config
            .as_deref()
            .and_then(|doc| parse_logged("root descriptor", doc))
            .map(|root| step_references(&root))
            .unwrap_or_default()
    }
}

impl ExtractionStrategy for PolicyDocuments {
    fn name(&self) -> &'static str {
        "policy-documents"
    }

    fn extract(&self, bundle: &CanonicalBundle) -> Vec<String> {
        bundle
            .policy_documents
            .iter()
            .map(|(stem, content)| {
                if is_binary_marker(content) {
                    return stem.clone();
                }
                match XmlElement::parse(content) {
                    Ok(root) => root.name,
                    Err(e) => {
                        debug!("Policy document {} is not parseable: {}", stem, e);
                        stem.clone()
                    }
                }
            })
            .collect()
    }
}

impl ExtractionStrategy for EndpointDocuments {
    fn name(&self) -> &'static str {
        "endpoint-documents"
    }

    fn extract(&self, bundle: &CanonicalBundle) -> Vec<String> {
        let documents = bundle
            .proxy_endpoints
            .iter()
            .map(|(name, doc)| (format!("proxy endpoint {}", name), doc))
            .chain(
                bundle
                    .target_endpoints
                    .iter()
                    .map(|(name, doc)| (format!("target endpoint {}", name), doc)),
            );

        let mut policies = Vec::new();
        for (label, doc) in documents {
            if let Some(root) = parse_logged(&label, doc) {
                policies.extend(declared_policies(&root));
                policies.extend(step_references(&root));
            }
        }
        policies
    }
}

/// Strategies applied by [`PolicyExtractor::default`], in order.
pub fn default_strategies() -> Vec<Box<dyn ExtractionStrategy>> {
    vec![
        Box::new(DeclaredPolicies),
        Box::new(FlowSteps),
        Box::new(EndpointDocuments),
        Box::new(PolicyDocuments),
    ]
}

/// Unions the contributions of its strategies.
pub struct PolicyExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl PolicyExtractor {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Extract the policy set and metadata of a bundle.
    pub fn extract(&self, bundle: &CanonicalBundle) -> (PolicySet, ProxyMetadata) {
        (self.extract_policies(bundle), extract_metadata(bundle))
    }

    pub fn extract_policies(&self, bundle: &CanonicalBundle) -> PolicySet {
        let mut set = PolicySet::new();
        for strategy in &self.strategies {
            let found = strategy.extract(bundle);
            let added = found.iter().filter(|p| set.insert(p)).count();
            debug!(
                "Strategy {} found {} policies ({} new)",
                strategy.name(),
                found.len(),
                added
            );
        }
        set
    }
}

impl Default for PolicyExtractor {
    fn default() -> Self {
        Self::new(default_strategies())
    }
}

/// Read proxy metadata from the root descriptor and the bundle maps.
pub fn extract_metadata(bundle: &CanonicalBundle) -> ProxyMetadata {
    let mut metadata = ProxyMetadata {
        policy_document_count: bundle.policy_documents.len(),
        resource_count: bundle.resource_documents.len(),
        proxy_endpoints: bundle.proxy_endpoints.keys().cloned().collect(),
        target_endpoints: bundle.target_endpoints.keys().cloned().collect(),
        ..Default::default()
    };

    if let Some(root) = bundle
        .main_config
        .as_deref()
        .and_then(|doc| parse_logged("root descriptor", doc))
    {
        if let Some(name) = root.attr("name") {
            metadata.name = name.to_string();
        }
        metadata.base_paths = root
            .descendants_named("VirtualHost")
            .into_iter()
            .map(|v| v.text.clone())
            .filter(|t| !t.is_empty())
            .collect();
        metadata.target_servers = root
            .descendants_named("TargetEndpoint")
            .into_iter()
            .filter_map(|t| t.attr("name"))
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .collect();
    }

    metadata.resources = bundle
        .resource_documents
        .keys()
        .map(|path| ResourceDescriptor {
            path: path.clone(),
            kind: ResourceKind::from_path(path),
        })
        .collect();

    metadata
}

fn parse_logged(label: &str, content: &str) -> Option<XmlElement> {
    if is_binary_marker(content) {
        return None;
    }
    match XmlElement::parse(content) {
        Ok(root) => Some(root),
        Err(e) => {
            warn!("Skipping {}: {}", label, e);
            None
        }
    }
}

fn declared_policies(root: &XmlElement) -> Vec<String> {
    root.child("Policies")
        .map(|section| {
            section
                .children_named("Policy")
                .map(|p| p.text.clone())
                .collect()
        })
        .unwrap_or_default()
}

fn step_references(root: &XmlElement) -> Vec<String> {
    root.descendants_named("Step")
        .into_iter()
        .filter_map(|step| step.child("Name"))
        .map(|name| name.text.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use edgeshift_schema::BINARY_FILE_MARKER;

    const DESCRIPTOR: &str = r#"<APIProxy name="orders">
    <Policies>
        <Policy>VerifyAPIKey</Policy>
        <Policy>Quota</Policy>
    </Policies>
    <ProxyEndpoint name="default">
        <PreFlow>
            <Request><Step><Name>VerifyAPIKey</Name></Step></Request>
        </PreFlow>
        <Flows>
            <Flow name="create">
                <Request><Step><Name>JavaScript</Name></Step></Request>
            </Flow>
        </Flows>
        <PostFlow>
            <Response><Step><Name>  XMLtoJSON </Name></Step></Response>
        </PostFlow>
        <HTTPProxyConnection>
            <BasePath>/orders</BasePath>
            <VirtualHost>default</VirtualHost>
            <VirtualHost>secure</VirtualHost>
        </HTTPProxyConnection>
    </ProxyEndpoint>
    <TargetEndpoint name="orders-backend"/>
    <TargetEndpoint name="audit-backend"/>
</APIProxy>"#;

    #[test]
    fn test_declared_and_step_policies() {
        let bundle = CanonicalBundle::single_file(DESCRIPTOR);
        let set = PolicyExtractor::default().extract_policies(&bundle);
        assert_eq!(
            set.to_vec(),
            vec!["VerifyAPIKey", "Quota", "JavaScript", "XMLtoJSON"]
        );
    }

    #[test]
    fn test_metadata() {
        let bundle = CanonicalBundle::single_file(DESCRIPTOR);
        let metadata = extract_metadata(&bundle);
        assert_eq!(metadata.name, "orders");
        assert_eq!(metadata.base_paths, vec!["default", "secure"]);
        assert_eq!(metadata.target_servers, vec!["orders-backend", "audit-backend"]);
        assert!(metadata.resources.is_empty());
    }

    #[test]
    fn test_metadata_defaults_without_descriptor() {
        let mut bundle = CanonicalBundle::default();
        bundle
            .resource_documents
            .insert("apiproxy/resources/jsc/a.js".to_string(), "x".to_string());
        let metadata = extract_metadata(&bundle);
        assert_eq!(metadata.name, "Unknown");
        assert_eq!(metadata.resource_count, 1);
        assert_eq!(metadata.resources[0].kind, ResourceKind::Script);
    }

    #[test]
    fn test_bundle_sources_are_unioned() {
        let mut bundle = CanonicalBundle::single_file(
            "<APIProxy name=\"a\"><Policies><Policy>Quota</Policy></Policies></APIProxy>",
        );
        bundle
            .policy_documents
            .insert("Spike-1".to_string(), "<SpikeArrest name=\"Spike-1\"/>".to_string());
        bundle
            .policy_documents
            .insert("Broken".to_string(), "<Broken>".to_string());
        bundle
            .policy_documents
            .insert("Blob".to_string(), BINARY_FILE_MARKER.to_string());
        bundle.proxy_endpoints.insert(
            "default".to_string(),
            "<ProxyEndpoint><PreFlow><Request><Step><Name>Quota</Name></Step><Step><Name>Auth</Name></Step></Request></PreFlow></ProxyEndpoint>".to_string(),
        );
        bundle
            .target_endpoints
            .insert("backend".to_string(), "<TargetEndpoint".to_string());

        let set = PolicyExtractor::default().extract_policies(&bundle);
        assert_eq!(set.len(), 5);
        for policy in ["Quota", "Auth", "SpikeArrest", "Broken", "Blob"] {
            assert!(set.iter().any(|p| p == policy), "missing {}", policy);
        }
    }

    #[test]
    fn test_malformed_root_contributes_nothing() {
        let bundle = CanonicalBundle::single_file("<APIProxy><Policies>");
        let (set, metadata) = PolicyExtractor::default().extract(&bundle);
        assert!(set.is_empty());
        assert_eq!(metadata, ProxyMetadata::default());
    }

    #[test]
    fn test_policy_set_dedup() {
        let set: PolicySet = ["A", " A ", "", "B", "A"].into_iter().collect();
        assert_eq!(set.to_vec(), vec!["A", "B"]);
    }
}
