use crate::index::{TotalIndex, NO_POSTING};

impl TotalIndex {
    /// Sets `normalized_count = count / unique_length` on every forward posting.
    pub fn normalise(&mut self) {
        for (doc_id, info) in self.documents.iter().enumerate() {
            if info.unique_length == 0 {
                continue;
            }
            let unique = info.unique_length as f32;
            let Some(list) = self.forward.lists.get(doc_id) else {
                continue;
            };
            let mut next = list.first;
            while next != NO_POSTING {
                let Some(posting) = self.forward.postings.get_mut(next as usize) else {
                    break;
                };
                posting.normalized_count = posting.count as f32 / unique;
                next = posting.next;
            }
        }
        tracing::debug!(documents = self.documents.len(), "normalised forward postings");
    }
}

#[cfg(test)]
mod tests {
    use crate::document::RawDocument;
    use crate::index::TotalIndex;

    #[test]
    fn count_over_unique_length() {
        let mut index = TotalIndex::new();
        index
            .add(&RawDocument::new("doc0", vec![], 3).with_term("foo", 2).with_term("bar", 1))
            .unwrap();
        index
            .add(&RawDocument::new("doc1", vec![], 2).with_term("bar", 1).with_term("qux", 1))
            .unwrap();
        index.normalise();

        let norms = |doc| {
            index
                .document_postings(doc)
                .unwrap()
                .map(|p| p.normalized_count)
                .collect::<Vec<_>>()
        };
        assert_eq!(norms(0), vec![1.0, 0.5]);
        assert_eq!(norms(1), vec![0.5, 0.5]);
    }
}
