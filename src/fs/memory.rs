//! In-memory file system over the bundled asset table
//!
//! Request paths are mapped onto asset names under [`ASSET_PREFIX`]. The
//! index document is stamped with build provenance once per instance and
//! served for every path that has no asset of its own.

use super::{path, FileSystem, FsError, ServedFile};
use crate::assets::{AssetTable, ASSET_PREFIX, INDEX_ASSET};
use crate::build_info::BuildInfo;
use crate::logger;
use chrono::SecondsFormat;
use hyper::body::Bytes;
use std::sync::{Arc, OnceLock};

/// Request path that always resolves to the stamped index
pub const INDEX_PATH: &str = "/index.html";

const CLOSING_TAG: &[u8] = b"</html>";

/// Asset-backed [`FileSystem`]
pub struct MemoryFs {
    root: String,
    files: AssetTable,
    index: Arc<StampedIndex>,
}

impl MemoryFs {
    pub fn new(root: impl Into<String>, files: AssetTable, build: Arc<dyn BuildInfo>) -> Self {
        let source = files
            .get(INDEX_ASSET)
            .map(crate::assets::NamedBlob::data);
        Self {
            root: root.into(),
            files,
            index: Arc::new(StampedIndex {
                source,
                build,
                stamped: OnceLock::new(),
            }),
        }
    }

    /// Compute the stamped index on a background thread
    ///
    /// Only moves the one-time cost off the first request; lookups racing
    /// with the warm-up wait for the same computation.
    pub fn spawn_warm_up(&self) {
        let index = Arc::clone(&self.index);
        let spawned = std::thread::Builder::new()
            .name("index-warm-up".to_string())
            .spawn(move || {
                index.get();
            });
        if let Err(e) = spawned {
            logger::log_warning(&format!("Failed to start index warm-up: {e}"));
        }
    }

    fn index(&self) -> Result<ServedFile, FsError> {
        let data = self.index.get();
        if data.is_empty() {
            return Err(FsError::NotFound);
        }
        Ok(ServedFile::new(INDEX_ASSET, data.clone()))
    }
}

impl FileSystem for MemoryFs {
    fn open(&self, request_path: &str) -> Result<ServedFile, FsError> {
        let file = path::strip_mount_root(request_path, &self.root);
        if file == INDEX_PATH {
            return self.index();
        }
        if let Some(blob) = self.files.get(&format!("{ASSET_PREFIX}{file}")) {
            return Ok(ServedFile::new(blob.name(), blob.data()));
        }
        // Unknown paths belong to client-side routing
        self.index()
    }
}

/// Index document with provenance stamped in, computed at most once
struct StampedIndex {
    source: Option<Bytes>,
    build: Arc<dyn BuildInfo>,
    stamped: OnceLock<Bytes>,
}

impl StampedIndex {
    /// Empty when the asset table has no index document
    fn get(&self) -> &Bytes {
        self.stamped.get_or_init(|| match &self.source {
            Some(source) => {
                let stamped = stamp_index(source, self.build.as_ref());
                logger::log_index_stamped(stamped.len());
                stamped
            }
            None => {
                logger::log_index_missing(INDEX_ASSET);
                Bytes::new()
            }
        })
    }
}

/// Render the provenance comment block, closing tag included
pub fn provenance_footer(build: &dyn BuildInfo) -> String {
    format!(
        "\n\n<!-- Version: {} -->\n<!-- GitCommit: {} ({}) -->\n<!-- BuildDate: {} -->\n\n</html>",
        build.version(),
        build.git_commit(),
        build.git_tree_state(),
        build
            .build_date()
            .to_rfc3339_opts(SecondsFormat::Secs, true),
    )
}

/// Replace the first closing document tag with the provenance footer
///
/// Documents without a closing tag are returned unchanged.
pub fn stamp_index(source: &[u8], build: &dyn BuildInfo) -> Bytes {
    let Some(pos) = source
        .windows(CLOSING_TAG.len())
        .position(|w| w == CLOSING_TAG)
    else {
        return Bytes::copy_from_slice(source);
    };

    let footer = provenance_footer(build);
    let mut data = Vec::with_capacity(source.len() + footer.len());
    data.extend_from_slice(&source[..pos]);
    data.extend_from_slice(footer.as_bytes());
    data.extend_from_slice(&source[pos + CLOSING_TAG.len()..]);
    Bytes::from(data)
}
