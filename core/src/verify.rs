use crate::error::{IndexError, Result};
use crate::index::{PostingIndex, TotalIndex};

impl TotalIndex {
    /// Checks the structural invariants of both posting sides: every list is
    /// non-empty, links stay inside the arena, entities strictly increase and
    /// name an existing term, document or class.
    pub fn verify(&self) -> Result<()> {
        if self.forward.len() != self.documents.len() {
            return Err(IndexError::corruption(format!(
                "{} forward lists for {} documents",
                self.forward.len(),
                self.documents.len()
            )));
        }
        if self.inverse.len() > self.dictionary.len() {
            return Err(IndexError::corruption(format!(
                "{} inverse lists for {} dictionary terms",
                self.inverse.len(),
                self.dictionary.len()
            )));
        }

        let classes = self.classes.len();
        for (doc_id, info) in self.documents.iter().enumerate() {
            if let Some(class) = info.class_ids.iter().find(|&&c| c as usize >= classes) {
                return Err(IndexError::corruption(format!(
                    "document {doc_id} has class {class} of {classes}"
                )));
            }
            let postings = check_list(&self.forward, doc_id as u32, "document", self.term_count())?;
            if postings != info.unique_length as usize {
                return Err(IndexError::corruption(format!(
                    "document {doc_id} has {postings} postings but unique length {}",
                    info.unique_length
                )));
            }
        }
        for term_id in 0..self.inverse.len() {
            check_list(&self.inverse, term_id as u32, "term", self.document_count())?;
        }
        Ok(())
    }
}

/// Walks one list and returns its length. Entities must be below `bound`.
fn check_list(index: &PostingIndex, id: u32, kind: &str, bound: usize) -> Result<usize> {
    let offsets = index.offsets(id)?;
    if offsets.is_empty() {
        return Err(IndexError::corruption(format!("{kind} {id} has no postings")));
    }
    let entities = offsets.iter().map(|&offset| index.postings[offset].entity_id);
    let mut previous: Option<u32> = None;
    for entity in entities {
        if previous.is_some_and(|p| p >= entity) {
            return Err(IndexError::corruption(format!(
                "{kind} {id}: entity {entity} follows {}",
                previous.unwrap_or_default()
            )));
        }
        previous = Some(entity);
    }
    if let Some(last) = previous.filter(|&e| e as usize >= bound) {
        return Err(IndexError::corruption(format!("{kind} {id}: entity {last} out of range 0..{bound}")));
    }
    let tail = index.lists[id as usize].last;
    if offsets.last().map(|&o| o as i32) != Some(tail) {
        return Err(IndexError::corruption(format!("{kind} {id}: tail does not end the list")));
    }
    Ok(offsets.len())
}
