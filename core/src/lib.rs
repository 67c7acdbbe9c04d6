//! Write-once term index over a document collection, with k-means clustering
//! computed directly on its sparse forward lists.

mod builder;
pub mod config;
pub mod dictionary;
pub mod document;
pub mod error;
pub mod index;
pub mod kmeans;
mod normalise;
pub mod parallel;
pub mod persist;
pub mod stats;
pub mod trie;
mod verify;

pub use config::KMeansConfig;
pub use dictionary::Dictionary;
pub use document::{RawDocument, TermCounts};
pub use error::{IndexError, Result};
pub use index::{
    ClassId, DocId, DocumentInfo, Posting, PostingIndex, PostingList, Postings, TermId, TotalIndex,
    NO_POSTING, UNASSIGNED,
};
pub use kmeans::{KMeansRun, Purity, Termination};
