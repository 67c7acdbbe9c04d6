use crate::error::Result;
use crate::index::{TermId, TotalIndex};

/// Corpus statistics used by class-aware feature scoring. Built only from the
/// read-only iteration primitives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassInfo {
    /// Class id -> number of documents labelled with it.
    pub documents_with_class: Vec<u32>,
    /// Term id -> number of documents containing it.
    pub documents_with_term: Vec<u32>,
}

impl ClassInfo {
    pub fn compute(index: &TotalIndex) -> Result<Self> {
        let mut documents_with_class = vec![0u32; index.classes.len()];
        for info in &index.documents {
            for &class in &info.class_ids {
                if let Some(n) = documents_with_class.get_mut(class as usize) {
                    *n += 1;
                }
            }
        }

        let mut documents_with_term = vec![0u32; index.term_count()];
        for (term, n) in documents_with_term.iter_mut().enumerate() {
            index.for_each_posting_of_term(term as TermId, |_| *n += 1)?;
        }

        Ok(Self { documents_with_class, documents_with_term })
    }

    pub fn class_count(&self) -> usize {
        self.documents_with_class.len()
    }
}
