//! Upload parsing into the canonical bundle form.

use crate::xml::XmlElement;
use edgeshift_common::{hash, Error, FileFormat, Result, Timestamp};
use edgeshift_schema::{CanonicalBundle, ProxyFile, BINARY_FILE_MARKER};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;
use zip::ZipArchive;

const ROOT_DESCRIPTOR: &str = "apiproxy.xml";
const POLICIES_DIR: &str = "policies";
const RESOURCE_DIRS: [&str; 3] = ["resources/jsc", "resources/py", "resources/java"];

/// Upload limit assumed when the caller does not pass one.
pub const DEFAULT_UPLOAD_LIMIT: u64 = 100 * 1024 * 1024;

/// How far an archive may expand relative to the upload limit.
pub const MAX_EXPANSION_RATIO: u64 = 10;

/// Bounds applied while extracting an uploaded archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveLimits {
    pub max_entries: usize,
    pub max_total_bytes: u64,
}

impl ArchiveLimits {
    /// Limits for uploads of at most `upload_limit` bytes.
    pub fn from_upload_limit(upload_limit: u64) -> Self {
        Self {
            max_entries: 10_000,
            max_total_bytes: upload_limit.saturating_mul(MAX_EXPANSION_RATIO),
        }
    }
}

impl Default for ArchiveLimits {
    fn default() -> Self {
        Self::from_upload_limit(DEFAULT_UPLOAD_LIMIT)
    }
}

/// Parse raw upload bytes given the declared file extension.
pub fn parse_bundle(bytes: &[u8], extension: &str) -> Result<CanonicalBundle> {
    let format: FileFormat = extension.parse()?;
    parse_bundle_as(bytes, format)
}

/// Parse raw upload bytes of a known format.
pub fn parse_bundle_as(bytes: &[u8], format: FileFormat) -> Result<CanonicalBundle> {
    parse_bundle_with_limits(bytes, format, &ArchiveLimits::default())
}

/// Parse raw upload bytes, extracting archives within `limits`.
pub fn parse_bundle_with_limits(
    bytes: &[u8],
    format: FileFormat,
    limits: &ArchiveLimits,
) -> Result<CanonicalBundle> {
    match format {
        FileFormat::Zip => parse_archive(bytes, limits),
        FileFormat::Xml | FileFormat::Json => parse_single_file(bytes, format),
    }
}

/// Parse an upload and wrap it into a `ProxyFile` record.
pub fn ingest_upload(filename: &str, bytes: &[u8]) -> Result<ProxyFile> {
    ingest_upload_with_limits(filename, bytes, &ArchiveLimits::default())
}

/// [`ingest_upload`] with explicit archive limits.
pub fn ingest_upload_with_limits(
    filename: &str,
    bytes: &[u8],
    limits: &ArchiveLimits,
) -> Result<ProxyFile> {
    let file_format = FileFormat::from_filename(filename)?;
    let bundle = parse_bundle_with_limits(bytes, file_format, limits)?;

    info!(
        "Ingested {} ({} bytes, {} files)",
        filename,
        bytes.len(),
        bundle.file_list.len().max(1)
    );

    Ok(ProxyFile {
        id: edgeshift_common::new_id(),
        filename: filename.to_string(),
        file_format,
        bundle,
        checksum: hash::sha256_bytes(bytes),
        size_bytes: bytes.len() as u64,
        uploaded_at: Timestamp::now(),
    })
}

fn parse_single_file(bytes: &[u8], format: FileFormat) -> Result<CanonicalBundle> {
    let content = std::str::from_utf8(bytes)
        .map_err(|e| Error::InvalidFormat(format!("File is not valid UTF-8 text: {}", e)))?;

    match format {
        FileFormat::Json => {
            serde_json::from_str::<serde_json::Value>(content)
                .map_err(|e| Error::InvalidFormat(format!("Invalid JSON: {}", e)))?;
        }
        _ => {
            XmlElement::parse(content)?;
        }
    }

    Ok(CanonicalBundle::single_file(content))
}

fn parse_archive(bytes: &[u8], limits: &ArchiveLimits) -> Result<CanonicalBundle> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| Error::InvalidBundleStructure(format!("Invalid ZIP archive: {}", e)))?;

    // Removed on drop, whatever the outcome below.
    let workspace = tempfile::tempdir()?;
    extract_archive(&mut archive, workspace.path(), limits)?;

    read_extracted(workspace.path())
}

/// Write every entry under `dest`, counting decompressed bytes as they are
/// written rather than trusting the sizes declared in the archive.
fn extract_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    dest: &Path,
    limits: &ArchiveLimits,
) -> Result<()> {
    if archive.len() > limits.max_entries {
        return Err(Error::InvalidBundleStructure(format!(
            "Archive has {} entries, more than the {} allowed",
            archive.len(),
            limits.max_entries
        )));
    }

    let mut remaining = limits.max_total_bytes;
    for index in 0..archive.len() {
        let mut entry = archive
            .by_index(index)
            .map_err(|e| Error::InvalidBundleStructure(format!("Unreadable archive entry: {}", e)))?;
        let Some(relative) = entry.enclosed_name() else {
            warn!("Skipping archive entry with unsafe path {}", entry.name());
            continue;
        };
        let target = dest.join(relative);

        if entry.is_dir() {
            std::fs::create_dir_all(&target)?;
            continue;
        }
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let name = entry.name().to_string();
        let mut out = File::create(&target)?;
        let mut bounded = (&mut entry).take(remaining.saturating_add(1));
        let written = std::io::copy(&mut bounded, &mut out).map_err(|e| {
            Error::InvalidBundleStructure(format!("Failed to extract {}: {}", name, e))
        })?;
        if written > remaining {
            return Err(Error::InvalidBundleStructure(format!(
                "Archive expands beyond {} bytes",
                limits.max_total_bytes
            )));
        }
        remaining -= written;
    }

    Ok(())
}

fn read_extracted(root: &Path) -> Result<CanonicalBundle> {
    let mut bundle = CanonicalBundle::default();

    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if entry.file_type().is_file() {
            bundle.file_list.push(relative_path(root, entry.path()));
        }
    }
    bundle.file_list.sort();
    debug!("Archive contains {} files", bundle.file_list.len());

    let descriptor = locate_root_descriptor(root).ok_or_else(|| {
        Error::InvalidBundleStructure("No apiproxy.xml found in bundle".to_string())
    })?;
    bundle.main_config = Some(read_document(&descriptor)?);

    if let Some(policies_dir) = locate_policies_dir(root) {
        bundle.policy_documents = read_xml_dir(&policies_dir)?;
    }
    if bundle.policy_documents.is_empty() {
        warn!("No policy documents found in bundle, may be a simple proxy");
    }

    let apiproxy = root.join("apiproxy");
    bundle.proxy_endpoints = read_xml_dir(&apiproxy.join("proxies"))?;
    bundle.target_endpoints = read_xml_dir(&apiproxy.join("targets"))?;

    for dir in RESOURCE_DIRS {
        let resource_dir = apiproxy.join(dir);
        if !resource_dir.is_dir() {
            continue;
        }
        for entry in WalkDir::new(&resource_dir).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if entry.file_type().is_file() {
                bundle
                    .resource_documents
                    .insert(relative_path(root, entry.path()), read_document(entry.path())?);
            }
        }
    }

    info!(
        "Parsed bundle: {} policies, {} resources, {} proxy endpoints, {} target endpoints",
        bundle.policy_documents.len(),
        bundle.resource_documents.len(),
        bundle.proxy_endpoints.len(),
        bundle.target_endpoints.len()
    );

    Ok(bundle)
}

fn locate_root_descriptor(root: &Path) -> Option<PathBuf> {
    let expected = root.join("apiproxy").join(ROOT_DESCRIPTOR);
    if expected.is_file() {
        return Some(expected);
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_file() && e.file_name() == ROOT_DESCRIPTOR)
        .map(|e| e.into_path())
}

fn locate_policies_dir(root: &Path) -> Option<PathBuf> {
    let expected = root.join("apiproxy").join(POLICIES_DIR);
    if expected.is_dir() {
        return Some(expected);
    }

    WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok())
        .find(|e| e.file_type().is_dir() && e.file_name() == POLICIES_DIR)
        .map(|e| e.into_path())
}

/// `*.xml` files directly inside `dir`, keyed by file stem.
fn read_xml_dir(dir: &Path) -> Result<BTreeMap<String, String>> {
    let mut documents = BTreeMap::new();
    if !dir.is_dir() {
        return Ok(documents);
    }

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() || path.extension().map(|e| e != "xml").unwrap_or(true) {
            continue;
        }
        let Some(stem) = path.file_stem().map(|s| s.to_string_lossy().to_string()) else {
            continue;
        };
        documents.insert(stem, read_document(&path)?);
    }

    Ok(documents)
}

/// Read a file as text, substituting the binary marker for undecodable content.
fn read_document(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path)?;
    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(_) => {
            debug!("Binary content in {}", path.display());
            Ok(BINARY_FILE_MARKER.to_string())
        }
    }
}

fn relative_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}
