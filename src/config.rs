//! Report configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::text::Rgb;

/// Brand blue used for headings and table heads.
pub const DEFAULT_BRAND_COLOR: Rgb = Rgb(0, 153, 255);

const DEFAULT_PHOTO_TIMEOUT_SECS: u64 = 5;

/// Errors raised while loading a [`ReportConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read report configuration {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The configuration file is not valid JSON for [`ReportConfig`].
    #[error("invalid report configuration {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// Branding and loading parameters shared by every generated report.
///
/// Every field has a default, so a configuration file only needs to list the
/// values it changes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    /// Company name printed top-right in the brand colour.
    pub company_name: String,
    /// Document title printed under the company name.
    pub document_title: String,
    /// Logo reference (URL or path) resolved through the image loader.
    pub logo: Option<String>,
    /// Brand colour as RGB.
    pub brand_color: Rgb,
    /// Timeout for fetching a single remote image, in seconds.
    pub photo_timeout_secs: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            company_name: "OSTECNICO".to_owned(),
            document_title: "Ordem de Serviço".to_owned(),
            logo: None,
            brand_color: DEFAULT_BRAND_COLOR,
            photo_timeout_secs: DEFAULT_PHOTO_TIMEOUT_SECS,
        }
    }
}

impl ReportConfig {
    /// Reads a configuration from a JSON file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let bytes = fs::read(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Sets the logo reference and returns the updated configuration.
    pub fn with_logo(mut self, logo: impl Into<Option<String>>) -> Self {
        self.logo = logo.into();
        self
    }

    /// Timeout applied to each remote image request.
    pub fn photo_timeout(&self) -> Duration {
        Duration::from_secs(self.photo_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let config: ReportConfig =
            serde_json::from_str(r#"{"logo":"assets/logo-full.jpg","brand_color":[10,20,30]}"#)
                .expect("parse config");
        assert_eq!(config.company_name, "OSTECNICO");
        assert_eq!(config.logo.as_deref(), Some("assets/logo-full.jpg"));
        assert_eq!(config.brand_color, Rgb(10, 20, 30));
        assert_eq!(config.photo_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn missing_file_reports_path() {
        let err = ReportConfig::from_path("/__ostecnico_missing__/config.json").unwrap_err();
        assert!(err.to_string().contains("__ostecnico_missing__"));
    }
}
