//! Compiled unit artifacts.
//!
//! Both Hardhat (`<root>/contracts/<Unit>.sol/<Unit>.json`, `bytecode` as a hex
//! string) and Foundry (`<root>/<Unit>.sol/<Unit>.json`, `bytecode.object`)
//! layouts are understood.

use std::path::{Path, PathBuf};

use alloy_core::primitives::Bytes;
use anyhow::{Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum BytecodeField {
    Hex(Bytes),
    Object { object: Bytes },
}

#[derive(Debug, Deserialize)]
struct ArtifactFile {
    bytecode: BytecodeField,
}

/// A unit's creation bytecode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub bytecode: Bytes,
    pub path: PathBuf,
}

impl Artifact {
    /// SHA-256 of the creation bytecode, hex encoded.
    pub fn code_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(&self.bytecode);
        hex::encode(hasher.finalize())
    }
}

/// Looks artifacts up under a root directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn candidates(&self, name: &str) -> [PathBuf; 3] {
        let file = format!("{name}.json");
        let source_dir = format!("{name}.sol");
        [
            self.root.join("contracts").join(&source_dir).join(&file),
            self.root.join(&source_dir).join(&file),
            self.root.join(&file),
        ]
    }

    /// Load the artifact of `name`.
    pub fn load(&self, name: &str) -> Result<Artifact> {
        let path = self
            .candidates(name)
            .into_iter()
            .find(|path| path.exists())
            .with_context(|| format!("No artifact for {name} under {}", self.root.display()))?;

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read artifact {}", path.display()))?;
        let file: ArtifactFile = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse artifact {}", path.display()))?;

        let bytecode = match file.bytecode {
            BytecodeField::Hex(bytes) | BytecodeField::Object { object: bytes } => bytes,
        };

        if bytecode.is_empty() {
            anyhow::bail!(
                "Artifact {} has no creation bytecode (abstract unit or interface?)",
                path.display()
            );
        }

        tracing::trace!(
            unit = name,
            path = %path.display(),
            size = bytecode.len(),
            "Loaded artifact"
        );

        Ok(Artifact {
            name: name.to_string(),
            bytecode,
            path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    fn write(path: &Path, content: &str) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_load_hardhat_artifact() {
        let temp_dir = TempDir::new("cornfield-artifacts").unwrap();
        write(
            &temp_dir.path().join("contracts/Corn.sol/Corn.json"),
            r#"{ "contractName": "Corn", "abi": [], "bytecode": "0x60806040" }"#,
        );

        let artifact = ArtifactStore::new(temp_dir.path()).load("Corn").unwrap();
        assert_eq!(artifact.bytecode, Bytes::from(vec![0x60, 0x80, 0x60, 0x40]));
        assert_eq!(artifact.code_hash().len(), 64);
    }

    #[test]
    fn test_load_foundry_artifact() {
        let temp_dir = TempDir::new("cornfield-artifacts").unwrap();
        write(
            &temp_dir.path().join("CornDEX.sol/CornDEX.json"),
            r#"{ "abi": [], "bytecode": { "object": "0x6001", "linkReferences": {} } }"#,
        );

        let artifact = ArtifactStore::new(temp_dir.path()).load("CornDEX").unwrap();
        assert_eq!(artifact.bytecode, Bytes::from(vec![0x60, 0x01]));
    }

    #[test]
    fn test_missing_and_empty_artifacts() {
        let temp_dir = TempDir::new("cornfield-artifacts").unwrap();
        let store = ArtifactStore::new(temp_dir.path());

        assert!(store.load("Lending").is_err());

        write(
            &temp_dir.path().join("ICorn.json"),
            r#"{ "bytecode": "0x" }"#,
        );
        assert!(store.load("ICorn").is_err());
    }

    #[test]
    fn test_code_hash_tracks_bytecode() {
        let a = Artifact {
            name: "Corn".into(),
            bytecode: Bytes::from(vec![1, 2, 3]),
            path: PathBuf::new(),
        };
        let b = Artifact {
            bytecode: Bytes::from(vec![1, 2, 4]),
            ..a.clone()
        };

        assert_eq!(a.code_hash(), a.clone().code_hash());
        assert_ne!(a.code_hash(), b.code_hash());
    }
}
