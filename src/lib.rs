//! tacl — a set-algebraic n-gram analysis engine for labelled corpora of
//! textual witnesses.
//!
//! A corpus of plain-text witnesses is tokenized and indexed into n-grams
//! of configurable sizes; labels assigned via a catalogue partition
//! witnesses into comparison groups; the query engine and the in-memory
//! results algebra compose to answer questions like "what n-grams occur in
//! group A but not group B" over that index.

pub mod catalogue;
pub mod cli;
pub mod corpus;
pub mod error;
pub mod ngram;
pub mod results;
pub mod store;
pub mod tokenizer;

pub use catalogue::Catalogue;
pub use corpus::Corpus;
pub use error::TaclError;
pub use results::Results;
pub use store::DataStore;
pub use tokenizer::Tokenizer;
