use crate::document::RawDocument;
use crate::error::{IndexError, Result};
use crate::index::{DocId, DocumentInfo, TermId, TotalIndex};

impl TotalIndex {
    /// Appends one document to both posting sides and returns its id.
    ///
    /// Documents without terms are rejected; `add_many` filters them. On a
    /// `Corruption` error the index must be discarded.
    pub fn add(&mut self, doc: &RawDocument) -> Result<DocId> {
        if doc.terms.is_empty() {
            return Err(IndexError::EmptyDocument(doc.name.clone()));
        }
        if self.forward.len() != self.documents.len() {
            return Err(IndexError::corruption(format!(
                "{} forward lists for {} documents",
                self.forward.len(),
                self.documents.len()
            )));
        }
        let doc_id = DocId::try_from(self.documents.len())
            .map_err(|_| IndexError::input("document id space exhausted"))?;

        let mut postings: Vec<(TermId, u32)> = Vec::with_capacity(doc.terms.len());
        doc.terms
            .for_each(|term, count| postings.push((self.dictionary.get(term), count)));
        postings.sort_unstable_by_key(|&(term_id, _)| term_id);
        self.check_inverse_slots(&postings)?;

        let class_ids = doc
            .classes
            .iter()
            .map(|class| self.classes.get(class.as_bytes()))
            .collect();
        self.documents
            .push(DocumentInfo::new(doc.name.clone(), class_ids, doc.length));
        self.forward.push_list();

        for (term_id, count) in postings {
            self.forward.append(doc_id, term_id, count)?;
            self.documents[doc_id as usize].unique_length += 1;

            if term_id as usize == self.inverse.len() {
                self.inverse.push_list();
            }
            self.inverse.append(term_id, doc_id, count)?;
        }
        Ok(doc_id)
    }

    /// Adds every document in order, skipping those without terms. Returns the
    /// number of documents indexed.
    pub fn add_many<I>(&mut self, docs: I) -> Result<usize>
    where
        I: IntoIterator<Item = RawDocument>,
    {
        let mut added = 0usize;
        let mut skipped = 0usize;
        for doc in docs {
            if doc.terms.is_empty() {
                tracing::warn!(name = %doc.name, "skipping document without terms");
                skipped += 1;
                continue;
            }
            self.add(&doc)?;
            added += 1;
        }
        tracing::info!(
            added,
            skipped,
            documents = self.document_count(),
            terms = self.term_count(),
            "indexed documents"
        );
        Ok(added)
    }

    /// An inverse list may only be opened for the term id equal to the current
    /// list count. `postings` must be sorted by term id.
    fn check_inverse_slots(&self, postings: &[(TermId, u32)]) -> Result<()> {
        let mut next_slot = self.inverse.len();
        for &(term_id, _) in postings {
            let term = term_id as usize;
            if term == next_slot {
                next_slot += 1;
            } else if term > next_slot {
                return Err(IndexError::corruption(format!(
                    "term {term_id} posted before its inverse slot exists ({next_slot} lists)"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::{NO_POSTING, UNASSIGNED};

    fn doc(name: &str, terms: &[(&str, u32)]) -> RawDocument {
        terms
            .iter()
            .fold(RawDocument::new(name, vec![], 1), |d, &(t, c)| d.with_term(t, c))
    }

    #[test]
    fn add_links_forward_and_inverse() {
        let mut index = TotalIndex::new();
        let id = index.add(&doc("d0", &[("b", 1), ("a", 3)])).unwrap();
        assert_eq!(id, 0);

        let info = &index.documents[0];
        assert_eq!(info.unique_length, 2);
        assert_eq!(info.cluster_id, UNASSIGNED);

        let forward: Vec<_> = index.document_postings(0).unwrap().map(|p| p.entity_id).collect();
        assert_eq!(forward, vec![0, 1]);
        let last = index.forward.lists[0].last as usize;
        assert_eq!(index.forward.postings[last].next, NO_POSTING);
        assert_eq!(index.term_count(), 2);
    }

    #[test]
    fn empty_document_is_rejected() {
        let mut index = TotalIndex::new();
        let err = index.add(&RawDocument::new("empty", vec![], 0)).unwrap_err();
        assert!(matches!(err, IndexError::EmptyDocument(name) if name == "empty"));
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn add_many_skips_empty_documents() {
        let mut index = TotalIndex::new();
        let added = index
            .add_many(vec![
                doc("d0", &[("a", 1)]),
                RawDocument::new("empty", vec![], 0),
                doc("d1", &[("a", 2)]),
            ])
            .unwrap();
        assert_eq!(added, 2);
        assert_eq!(index.documents[1].name, "d1");
    }

    #[test]
    fn term_without_inverse_slot_is_corruption() {
        let mut index = TotalIndex::new();
        // Allocate an id that never receives an inverse list.
        index.dictionary.get(b"ghost");
        let err = index.add(&doc("d0", &[("foo", 1)])).unwrap_err();
        assert!(matches!(err, IndexError::Corruption(_)));
        assert!(!err.is_recoverable());
        assert_eq!(index.document_count(), 0);
    }

    #[test]
    fn classes_get_surrogate_ids() {
        let mut index = TotalIndex::new();
        let mut d0 = doc("d0", &[("a", 1)]);
        d0.classes = vec!["sports".into(), "dodgeball".into()];
        let mut d1 = doc("d1", &[("a", 1)]);
        d1.classes = vec!["dodgeball".into()];
        index.add(&d0).unwrap();
        index.add(&d1).unwrap();
        assert_eq!(index.documents[0].class_ids, vec![0, 1]);
        assert_eq!(index.documents[1].class_ids, vec![1]);
        assert_eq!(index.classes.name(1).as_deref(), Some("dodgeball"));
    }
}
