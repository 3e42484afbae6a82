//! Upload file format definitions.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format of an uploaded proxy artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileFormat {
    Xml,
    Json,
    Zip,
}

impl fmt::Display for FileFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileFormat::Xml => write!(f, "xml"),
            FileFormat::Json => write!(f, "json"),
            FileFormat::Zip => write!(f, "zip"),
        }
    }
}

impl FromStr for FileFormat {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim_start_matches('.').to_lowercase().as_str() {
            "xml" => Ok(FileFormat::Xml),
            "json" => Ok(FileFormat::Json),
            "zip" => Ok(FileFormat::Zip),
            _ => Err(crate::Error::UnsupportedFormat(format!(
                "{} (expected xml, json or zip)",
                s
            ))),
        }
    }
}

impl FileFormat {
    /// Determine the format from a filename's extension.
    pub fn from_filename(filename: &str) -> crate::Result<Self> {
        let extension = std::path::Path::new(filename)
            .extension()
            .map(|e| e.to_string_lossy().to_string())
            .unwrap_or_default();
        extension.parse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_file_format() {
        assert_eq!(FileFormat::from_str("xml").unwrap(), FileFormat::Xml);
        assert_eq!(FileFormat::from_str(".JSON").unwrap(), FileFormat::Json);
        assert_eq!(FileFormat::from_str("Zip").unwrap(), FileFormat::Zip);
        assert!(FileFormat::from_str("yaml").is_err());
    }

    #[test]
    fn test_from_filename() {
        assert_eq!(
            FileFormat::from_filename("weather-proxy.ZIP").unwrap(),
            FileFormat::Zip
        );
        assert_eq!(
            FileFormat::from_filename("apiproxy.xml").unwrap(),
            FileFormat::Xml
        );
        assert!(FileFormat::from_filename("README").is_err());
    }

    #[test]
    fn test_display_file_format() {
        assert_eq!(FileFormat::Xml.to_string(), "xml");
        assert_eq!(FileFormat::Zip.to_string(), "zip");
    }
}
