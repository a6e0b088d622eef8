use std::path::PathBuf;

/// A `char` record that cannot be turned into a `GlyphRecord`.
///
/// Any of these aborts the whole fix: no partially corrected text is produced.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("line {line}: malformed char record, missing {}", .fields.join(", "))]
    MissingFields {
        line: usize,
        fields: Vec<&'static str>,
    },
    #[error("line {line}: malformed char record, {key}={value:?} is not a 32-bit integer")]
    InvalidValue {
        line: usize,
        key: &'static str,
        value: String,
    },
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Descriptor(#[from] DescriptorError),
    #[error("{}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write report: {0}")]
    Report(#[from] serde_json::Error),
    #[error("empty sweep range {from}..={to}")]
    EmptyRange { from: u32, to: u32 },
}

impl Error {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
