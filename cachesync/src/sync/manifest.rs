//! Typed model of the two manifest documents.
//!
//! The partition list (`caches.xml`) looks like:
//!
//! ```text
//! <Caches>
//!   <Cache ID="base" Version="3" />
//! </Caches>
//! ```
//!
//! and each partition's file list (`diff/<id>/info.xml`) like:
//!
//! ```text
//! <CacheInfo>
//!   <ContentFile Name="data.bin" Size="1000" SHA1Hash="..." CompressedSize="400" />
//! </CacheInfo>
//! ```
//!
//! Unknown elements and attributes are ignored. Document order is preserved.

use std::path::{Component, Path, PathBuf};

use serde::Deserialize;

use super::checksum::DIGEST_HEX_LEN;
use super::error::{ManifestError, SyncError, SyncResult};

/// A named, versioned grouping of declared files on the remote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Partition {
    /// Opaque identifier, used as a URL path segment.
    pub id: String,
    /// Server-side version. Advisory only.
    pub version: u64,
}

/// One remote-declared file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeclaredFile {
    /// Relative name, used both as URL segment and local path.
    pub name: String,
    /// Uncompressed size in bytes.
    pub size: u64,
    /// Declared SHA-1 digest (hex, any case).
    pub digest: String,
    /// Size of the payload as transported.
    pub compressed_size: u64,
}

impl DeclaredFile {
    /// Whether the remote payload is transport-compressed.
    ///
    /// Decided solely by the declared sizes, never by inspecting contents.
    pub fn is_compressed(&self) -> bool {
        self.compressed_size != self.size
    }

    /// Check that the declared digest is 40 hexadecimal characters.
    ///
    /// Checked per file so one bad declaration does not block its siblings.
    pub fn check_digest(&self) -> SyncResult<()> {
        if is_valid_digest(&self.digest) {
            Ok(())
        } else {
            Err(SyncError::InvalidDigest {
                name: self.name.clone(),
                digest: self.digest.clone(),
            })
        }
    }

    /// Resolve the local path of this file under `root`.
    ///
    /// Names that are empty, absolute, or contain `..` components are
    /// rejected. Both `/` and `\` separate components.
    pub fn local_path(&self, root: &Path) -> SyncResult<PathBuf> {
        let unsafe_name = || SyncError::UnsafePath {
            name: self.name.clone(),
        };

        let mut path = root.to_path_buf();
        let mut pushed = 0;

        if self.name.starts_with(['/', '\\']) {
            return Err(unsafe_name());
        }

        for segment in self.name.split(['/', '\\']) {
            if segment.is_empty() || segment == "." {
                continue;
            }
            let mut components = Path::new(segment).components();
            match (components.next(), components.next()) {
                (Some(Component::Normal(part)), None) => {
                    path.push(part);
                    pushed += 1;
                }
                _ => return Err(unsafe_name()),
            }
        }

        if pushed == 0 {
            return Err(unsafe_name());
        }
        Ok(path)
    }
}

#[derive(Debug, Deserialize)]
struct CachesDocument {
    #[serde(rename = "Cache", default)]
    caches: Vec<CacheElement>,
}

#[derive(Debug, Deserialize)]
struct CacheElement {
    #[serde(rename = "@ID")]
    id: String,
    #[serde(rename = "@Version", default)]
    version: u64,
}

#[derive(Debug, Deserialize)]
struct CacheInfoDocument {
    #[serde(rename = "ContentFile", default)]
    files: Vec<ContentFileElement>,
}

#[derive(Debug, Deserialize)]
struct ContentFileElement {
    #[serde(rename = "@Name")]
    name: String,
    #[serde(rename = "@Size")]
    size: u64,
    #[serde(rename = "@SHA1Hash")]
    digest: String,
    #[serde(rename = "@CompressedSize")]
    compressed_size: Option<u64>,
}

/// Parse a partition-list document.
pub fn parse_partition_list(xml: &str) -> Result<Vec<Partition>, ManifestError> {
    let document: CachesDocument = quick_xml::de::from_str(xml)?;

    Ok(document
        .caches
        .into_iter()
        .map(|c| Partition {
            id: c.id,
            version: c.version,
        })
        .collect())
}

/// Parse a per-partition file-list document.
///
/// A missing `CompressedSize` means the payload is stored uncompressed.
pub fn parse_file_list(xml: &str) -> Result<Vec<DeclaredFile>, ManifestError> {
    let document: CacheInfoDocument = quick_xml::de::from_str(xml)?;

    Ok(document
        .files
        .into_iter()
        .map(|f| DeclaredFile {
            compressed_size: f.compressed_size.unwrap_or(f.size),
            name: f.name,
            size: f.size,
            digest: f.digest,
        })
        .collect())
}

fn is_valid_digest(digest: &str) -> bool {
    digest.len() == DIGEST_HEX_LEN && digest.bytes().all(|b| b.is_ascii_hexdigit())
}
