use thiserror::Error;

use crate::blockchain::ChainError;
use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("Unknown asset: {0}")]
    UnknownAsset(String),

    #[error("Malformed cached asset data: {0}")]
    MalformedCacheData(String),

    #[error("Token {0} is not ERC20 conformant")]
    NotErc20Conformant(String),

    #[error("Token {0} is not ERC721 conformant")]
    NotErc721Conformant(String),

    #[error("Unknown token kind: {0}")]
    UnknownTokenKind(String),

    #[error("Invalid asset edit: {0}")]
    InvalidEdit(String),

    #[error("Remote source unavailable: {0}")]
    RemoteUnavailable(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl AssetError {
    /// The item does not expose the metadata its declared kind requires.
    /// Batch callers skip such items and carry on.
    pub fn is_conformance_error(&self) -> bool {
        matches!(
            self,
            AssetError::NotErc20Conformant(_)
                | AssetError::NotErc721Conformant(_)
                | AssetError::UnknownTokenKind(_)
        )
    }
}

impl From<ChainError> for AssetError {
    fn from(err: ChainError) -> Self {
        AssetError::RemoteUnavailable(err.to_string())
    }
}

impl From<ValidationError> for AssetError {
    fn from(err: ValidationError) -> Self {
        match err {
            ValidationError::UnknownTokenKind(kind) => AssetError::UnknownTokenKind(kind),
            other => AssetError::Input(other.to_string()),
        }
    }
}
