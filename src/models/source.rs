//! Project source file models.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Source file discovered under the project root.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// Relative path from project root
    pub path: PathBuf,

    /// Absolute path on disk
    pub absolute_path: PathBuf,

    /// Detected kind
    pub kind: SourceKind,

    /// File size in bytes
    pub size: u64,

    /// File content (loaded on demand)
    pub content: Option<String>,
}

impl SourceFile {
    /// Build an in-memory source file, mostly useful for tests and embedding.
    pub fn in_memory(path: impl Into<PathBuf>, content: impl Into<String>) -> Self {
        let path = path.into();
        let content = content.into();
        Self {
            kind: SourceKind::from_path(&path),
            absolute_path: path.clone(),
            path,
            size: content.len() as u64,
            content: Some(content),
        }
    }

    /// Load the file content if not already loaded.
    pub fn load_content(&mut self) -> std::io::Result<&str> {
        let content = match self.content.take() {
            Some(content) => content,
            None => std::fs::read_to_string(&self.absolute_path)?,
        };
        Ok(self.content.insert(content).as_str())
    }
}

/// Kinds of files the auditor understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// Java compilation unit
    Java,
    /// XML document that may hold SQL mapping statements
    MapperXml,
    /// Anything else
    Unknown,
}

impl SourceKind {
    /// Detect the kind from a file extension.
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "java" => SourceKind::Java,
            "xml" => SourceKind::MapperXml,
            _ => SourceKind::Unknown,
        }
    }

    /// Detect the kind from a path.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|e| e.to_str())
            .map(Self::from_extension)
            .unwrap_or(SourceKind::Unknown)
    }

    /// Whether the corpus builder should read files of this kind.
    pub fn is_supported(&self) -> bool {
        !matches!(self, SourceKind::Unknown)
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceKind::Java => write!(f, "Java"),
            SourceKind::MapperXml => write!(f, "Mapper XML"),
            SourceKind::Unknown => write!(f, "Unknown"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_detection() {
        assert_eq!(SourceKind::from_path(Path::new("a/B.java")), SourceKind::Java);
        assert_eq!(SourceKind::from_path(Path::new("UserMapper.XML")), SourceKind::MapperXml);
        assert_eq!(SourceKind::from_path(Path::new("README")), SourceKind::Unknown);
        assert!(!SourceKind::Unknown.is_supported());
    }

    #[test]
    fn test_in_memory_content() {
        let mut file = SourceFile::in_memory("Foo.java", "class Foo {}");
        assert_eq!(file.kind, SourceKind::Java);
        assert_eq!(file.load_content().unwrap(), "class Foo {}");
    }
}
