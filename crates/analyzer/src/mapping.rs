//! Known policy equivalents on the target platform.

use edgeshift_schema::{ComplexityTier, PolicyMapping};
use serde::Serialize;

/// One row of the mapping table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MappingEntry {
    pub source: &'static str,
    pub target: &'static str,
    pub tier: ComplexityTier,
    pub notes: &'static str,
}

impl MappingEntry {
    const fn new(
        source: &'static str,
        target: &'static str,
        tier: ComplexityTier,
        notes: &'static str,
    ) -> Self {
        Self {
            source,
            target,
            tier,
            notes,
        }
    }

    /// Build the mapping record for a policy found in a proxy.
    pub fn to_mapping(&self) -> PolicyMapping {
        PolicyMapping {
            source_policy: self.source.to_string(),
            target_equivalent: self.target.to_string(),
            complexity_tier: self.tier,
            notes: self.notes.to_string(),
            requires_custom_code: self.tier == ComplexityTier::Complex,
        }
    }
}

use ComplexityTier::{Complex, Moderate, Simple};

const DEFAULT_ENTRIES: &[MappingEntry] = &[
    // Authentication & security
    MappingEntry::new("OAuth2", "OAuthV2", Simple, "Direct mapping with minimal changes"),
    MappingEntry::new("VerifyAPIKey", "VerifyAPIKey", Simple, "Same policy, no changes needed"),
    MappingEntry::new("BasicAuthentication", "BasicAuthentication", Simple, "Direct mapping"),
    MappingEntry::new("SAML", "SAMLAssertion", Moderate, "May require configuration adjustments"),
    // Rate limiting
    MappingEntry::new("Quota", "Quota", Simple, "Direct mapping"),
    MappingEntry::new("SpikeArrest", "SpikeArrest", Simple, "No changes needed"),
    MappingEntry::new("ConcurrentRateLimit", "ConcurrentRateLimit", Simple, "Direct mapping"),
    // Transformation
    MappingEntry::new("JSONtoXML", "JSONtoXML", Simple, "Direct mapping"),
    MappingEntry::new("XMLtoJSON", "XMLtoJSON", Simple, "Direct mapping"),
    MappingEntry::new("XSL", "XSL", Moderate, "May need XSLT validation"),
    // Custom code
    MappingEntry::new("JavaScript", "JavaScript", Complex, "Requires code review and testing"),
    MappingEntry::new("Node.js", "NodeJS", Complex, "May require updates to Node.js runtime"),
    MappingEntry::new("Python", "Python", Complex, "Custom runtime policy, needs migration planning"),
    // Traffic management
    MappingEntry::new("LoadBalancer", "LoadBalancing", Moderate, "Configuration may need updates"),
    MappingEntry::new("ServiceCallout", "ServiceCallout", Simple, "Direct mapping"),
    MappingEntry::new("RaiseFault", "RaiseFault", Simple, "Direct mapping"),
];

/// Static knowledge base of policy equivalents.
#[derive(Debug, Clone)]
pub struct MappingTable {
    entries: Vec<MappingEntry>,
}

impl MappingTable {
    /// Table with a custom set of entries.
    pub fn with_entries(entries: Vec<MappingEntry>) -> Self {
        Self { entries }
    }

    /// Exact, case-sensitive lookup by source policy identifier.
    pub fn lookup(&self, policy: &str) -> Option<&MappingEntry> {
        self.entries.iter().find(|e| e.source == policy)
    }

    pub fn entries(&self) -> &[MappingEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for MappingTable {
    fn default() -> Self {
        Self::with_entries(DEFAULT_ENTRIES.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_table() {
        let table = MappingTable::default();
        assert_eq!(table.len(), 16);

        let oauth = table.lookup("OAuth2").unwrap();
        assert_eq!(oauth.target, "OAuthV2");
        assert_eq!(oauth.tier, Simple);

        assert_eq!(table.lookup("Node.js").unwrap().target, "NodeJS");
        assert!(table.lookup("verifyapikey").is_none());
        assert!(table.lookup("CustomThing").is_none());
    }

    #[test]
    fn test_custom_code_follows_tier() {
        let table = MappingTable::default();
        for entry in table.entries() {
            let mapping = entry.to_mapping();
            assert_eq!(mapping.requires_custom_code, entry.tier == Complex);
            assert!(!mapping.is_manual());
        }
    }

    #[test]
    fn test_sources_are_unique() {
        let table = MappingTable::default();
        let mut sources: Vec<&str> = table.entries().iter().map(|e| e.source).collect();
        sources.sort();
        sources.dedup();
        assert_eq!(sources.len(), table.len());
    }
}
