//! Top-level error type, unifying the per-module errors into one enum the
//! CLI layer can map to an exit code.

use thiserror::Error;

use crate::catalogue::CatalogueError;
use crate::corpus::CorpusError;
use crate::results::ResultsError;
use crate::store::StoreError;
use crate::tokenizer::TokenizerError;

/// Invalid flag combination, missing required file, or other misconfiguration.
#[derive(Error, Debug)]
pub enum ConfigurationError {
    #[error("{0}")]
    Message(String),
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Unified error type for the tacl library.
#[derive(Error, Debug)]
pub enum TaclError {
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
    #[error(transparent)]
    Corpus(#[from] CorpusError),
    #[error(transparent)]
    Catalogue(#[from] CatalogueError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Results(#[from] ResultsError),
    #[error(transparent)]
    Tokenizer(#[from] TokenizerError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TaclError {
    /// Exit code per spec §6/§7: 2 for usage/configuration errors, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            TaclError::Configuration(_) => 2,
            _ => 1,
        }
    }
}
