//! Canonical bundle types - output of the bundle parser.

use edgeshift_common::{FileFormat, Timestamp};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Stored in place of content that could not be decoded as text.
pub const BINARY_FILE_MARKER: &str = "[Binary File]";

/// Normalized in-memory form of an uploaded proxy artifact.
///
/// A single descriptor upload only populates `main_config`. An archive upload
/// fills the document maps from the well-known bundle directories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalBundle {
    /// Primary proxy descriptor (apiproxy.xml for archives).
    pub main_config: Option<String>,
    /// Policy documents keyed by file stem.
    pub policy_documents: BTreeMap<String, String>,
    /// Resource files keyed by archive-relative path.
    pub resource_documents: BTreeMap<String, String>,
    /// Proxy-side endpoint descriptors keyed by file stem.
    pub proxy_endpoints: BTreeMap<String, String>,
    /// Target-side endpoint descriptors keyed by file stem.
    pub target_endpoints: BTreeMap<String, String>,
    /// Every file found in the archive, for auditing.
    pub file_list: Vec<String>,
}

impl CanonicalBundle {
    /// Bundle for a single descriptor file.
    pub fn single_file(content: impl Into<String>) -> Self {
        Self {
            main_config: Some(content.into()),
            ..Default::default()
        }
    }

    /// Text handed to the oracle: the root descriptor, else the first proxy
    /// endpoint, else nothing.
    pub fn descriptor_text(&self) -> &str {
        if let Some(main) = self.main_config.as_deref().filter(|m| !m.is_empty()) {
            return main;
        }
        self.proxy_endpoints
            .values()
            .next()
            .map(String::as_str)
            .unwrap_or("")
    }

    /// True when nothing but the main descriptor is populated.
    pub fn is_single_file(&self) -> bool {
        self.policy_documents.is_empty()
            && self.resource_documents.is_empty()
            && self.proxy_endpoints.is_empty()
            && self.target_endpoints.is_empty()
            && self.file_list.is_empty()
    }
}

/// Check whether a stored document is the binary placeholder.
pub fn is_binary_marker(content: &str) -> bool {
    content == BINARY_FILE_MARKER
}

/// An uploaded proxy artifact after parsing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyFile {
    pub id: String,
    /// Original upload filename.
    pub filename: String,
    pub file_format: FileFormat,
    pub bundle: CanonicalBundle,
    /// SHA256 of the raw upload.
    pub checksum: String,
    pub size_bytes: u64,
    pub uploaded_at: Timestamp,
}

/// Kind of a bundled resource file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceKind {
    /// JavaScript.
    Script,
    /// Python.
    AlternateScript,
    /// Java sources or archives.
    Compiled,
    /// WSDL or XSD.
    Schema,
    Unknown,
}

impl ResourceKind {
    /// Classify a resource by its file extension.
    pub fn from_path(path: &str) -> Self {
        let extension = std::path::Path::new(path)
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        match extension.as_str() {
            "js" => ResourceKind::Script,
            "py" => ResourceKind::AlternateScript,
            "java" | "jar" => ResourceKind::Compiled,
            "wsdl" | "xsd" => ResourceKind::Schema,
            _ => ResourceKind::Unknown,
        }
    }
}

/// A typed resource entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceDescriptor {
    pub path: String,
    pub kind: ResourceKind,
}

/// Basic proxy information read from the descriptors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyMetadata {
    pub name: String,
    pub base_paths: Vec<String>,
    pub target_servers: Vec<String>,
    pub resources: Vec<ResourceDescriptor>,
    pub policy_document_count: usize,
    pub resource_count: usize,
    pub proxy_endpoints: Vec<String>,
    pub target_endpoints: Vec<String>,
}

impl Default for ProxyMetadata {
    fn default() -> Self {
        Self {
            name: "Unknown".to_string(),
            base_paths: Vec::new(),
            target_servers: Vec::new(),
            resources: Vec::new(),
            policy_document_count: 0,
            resource_count: 0,
            proxy_endpoints: Vec::new(),
            target_endpoints: Vec::new(),
        }
    }
}
