use crate::field::FieldKey;

/// A save/clear payload that must not reach the store.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    #[error("pageId is required")]
    MissingPageId,

    #[error("pageId '{0}' may only contain letters, digits, '-' and '_'")]
    InvalidPageId(String),

    #[error("titleblock.{field} must be a number between 0 and 1")]
    TitleblockOutOfRange { field: &'static str },

    #[error("titleblock width and height must be greater than 0")]
    TitleblockEmpty,

    #[error("areas[{index}]: unknown field '{key}'")]
    UnknownField { index: usize, key: String },

    #[error("areas[{index}].{field} must be a number between 0 and 1")]
    AreaOutOfRange { index: usize, field: &'static str },

    #[error("areas[{index}]: width_rel and height_rel must be greater than 0")]
    AreaEmpty { index: usize },

    #[error("areas[{index}]: '{key}' already has an area")]
    DuplicateField { index: usize, key: FieldKey },

    #[error("invalid request body: {0}")]
    Malformed(String),
}

/// Failures of the page-record store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("page '{0}' not found")]
    NotFound(String),

    #[error("invalid page id '{0}'")]
    InvalidId(String),

    #[error("store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("page record is corrupt: {0}")]
    Corrupt(#[from] serde_json::Error),
}

/// Failures talking to the page service from the editor.
#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// Non-2xx answer; `message` is the server's own error text when it sent one.
    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("could not read image '{path}': {source}")]
    ImageRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("could not decode page image: {0}")]
    Decode(#[from] image::ImageError),
}
