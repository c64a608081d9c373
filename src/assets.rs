//! Bundled UI asset table
//!
//! The build script embeds the UI build directory as an ordered list of
//! `(name, data)` pairs. Every name starts with [`ASSET_PREFIX`].

use hyper::body::Bytes;
use std::collections::HashMap;

mod bundled {
    include!(concat!(env!("OUT_DIR"), "/bundled_assets.rs"));
}

/// Prefix shared by every asset name
pub const ASSET_PREFIX: &str = "src/build";

/// Name of the single-page-app shell document
pub const INDEX_ASSET: &str = "src/build/index.html";

/// A named, immutable byte blob
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedBlob {
    name: String,
    data: Bytes,
}

impl NamedBlob {
    pub fn new(name: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            data: data.into(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cheap handle to the blob contents
    pub fn data(&self) -> Bytes {
        self.data.clone()
    }
}

/// Lookup table from full virtual path to blob
///
/// Built once from an ordered collection; a later duplicate name replaces
/// an earlier one.
#[derive(Debug, Clone, Default)]
pub struct AssetTable {
    files: HashMap<String, NamedBlob>,
}

impl AssetTable {
    pub fn get(&self, name: &str) -> Option<&NamedBlob> {
        self.files.get(name)
    }
}

impl FromIterator<NamedBlob> for AssetTable {
    fn from_iter<I: IntoIterator<Item = NamedBlob>>(iter: I) -> Self {
        let mut files = HashMap::new();
        for blob in iter {
            files.insert(blob.name.clone(), blob);
        }
        Self { files }
    }
}

/// Assets embedded into the binary at build time
pub fn bundled() -> AssetTable {
    bundled::BUNDLED_FILES
        .iter()
        .map(|(name, data)| NamedBlob::new(*name, Bytes::from_static(*data)))
        .collect()
}
