//! Install image reference resolution.

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum ImageSource {
    /// HTTP(S): https://mirror.example.com/rhcos-live.iso
    Http { url: String },
    /// Local file on the deploy host: file:///srv/iso/live.iso or ./live.iso
    File { path: String },
}

#[derive(Debug, Error)]
pub enum SourceError {
    #[error("empty install image reference")]
    Empty,
    #[error("unsupported image scheme: {0}")]
    UnsupportedScheme(String),
}

impl ImageSource {
    pub fn parse(reference: &str) -> Result<Self, SourceError> {
        let reference = reference.trim();
        if reference.is_empty() {
            return Err(SourceError::Empty);
        }

        if reference.starts_with("https://") || reference.starts_with("http://") {
            Ok(ImageSource::Http { url: reference.to_string() })
        } else if let Some(path) = reference.strip_prefix("file://") {
            Ok(ImageSource::File { path: path.to_string() })
        } else if reference.contains("://") {
            Err(SourceError::UnsupportedScheme(reference.to_string()))
        } else {
            Ok(ImageSource::File { path: reference.to_string() })
        }
    }

    pub fn scheme(&self) -> &'static str {
        match self {
            ImageSource::Http { .. } => "http",
            ImageSource::File { .. } => "file",
        }
    }

    /// Name the image is staged under on the management controller.
    pub fn file_name(&self) -> String {
        let tail = match self {
            ImageSource::Http { url } => {
                let without_query = url.split(['?', '#']).next().unwrap_or(url);
                without_query.rsplit('/').next().unwrap_or_default().to_string()
            }
            ImageSource::File { path } => Path::new(path)
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
        };

        if tail.is_empty() {
            "install.iso".to_string()
        } else {
            tail
        }
    }
}

impl std::fmt::Display for ImageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ImageSource::Http { url } => f.write_str(url),
            ImageSource::File { path } => f.write_str(path),
        }
    }
}
