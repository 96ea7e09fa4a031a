use std::path::PathBuf;

/// Errors that abort loading or indexing a feed.
///
/// References that do not resolve and unknown route types are not errors: the
/// affected rows are skipped and counted in [`crate::join::SkipCounts`].
#[derive(Debug, thiserror::Error)]
pub enum FeedError {
    #[error("Failed to read GTFS feed {path:?}: {source}")]
    FeedRead {
        path: PathBuf,
        #[source]
        source: gtfs_structures::Error,
    },

    #[error("Failed to open {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read archive {path:?}: {source}")]
    Archive {
        path: PathBuf,
        #[source]
        source: zip::result::ZipError,
    },

    #[error("Failed to parse {table} in {path:?}: {source}")]
    Csv {
        path: PathBuf,
        table: &'static str,
        #[source]
        source: csv::Error,
    },

    #[error("Malformed record in {table} ({id}): {reason}")]
    MalformedRecord {
        table: &'static str,
        id: String,
        reason: String,
    },
}

impl FeedError {
    pub fn malformed(table: &'static str, id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            table,
            id: id.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, FeedError>;

/// Errors while loading municipality borders.
#[derive(Debug, thiserror::Error)]
pub enum BorderError {
    #[error("Failed to read borders {path:?}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid GeoJSON borders: {0}")]
    Parse(#[from] geojson::Error),
}
