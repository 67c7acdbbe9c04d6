use serde::{Deserialize, Serialize};

use crate::dictionary::Dictionary;
use crate::error::{IndexError, Result};

pub type TermId = u32;
pub type DocId = u32;
pub type ClassId = u32;

/// End-of-list marker for posting links and empty list heads.
pub const NO_POSTING: i32 = -1;
/// `DocumentInfo::cluster_id` before the first assignment pass.
pub const UNASSIGNED: i32 = -1;

/// One node of a posting list. `entity_id` is a term id in the forward index and a
/// document id in the inverse index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Posting {
    pub entity_id: u32,
    pub count: u32,
    pub normalized_count: f32,
    /// Arena offset of the next node, or `NO_POSTING`.
    pub next: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingList {
    pub first: i32,
    pub last: i32,
}

impl PostingList {
    pub const EMPTY: PostingList = PostingList { first: NO_POSTING, last: NO_POSTING };

    pub fn is_empty(&self) -> bool {
        self.first == NO_POSTING
    }
}

/// Posting lists for one side of the index, all stored in a single arena.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PostingIndex {
    /// Indexed by entity id.
    pub lists: Vec<PostingList>,
    pub postings: Vec<Posting>,
}

impl PostingIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of posting lists.
    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }

    /// Opens a new empty list and returns its id.
    pub fn push_list(&mut self) -> u32 {
        self.lists.push(PostingList::EMPTY);
        (self.lists.len() - 1) as u32
    }

    pub fn list(&self, id: u32) -> Option<&PostingList> {
        self.lists.get(id as usize)
    }

    /// Links a new posting after the tail of list `id`. Entities must arrive in
    /// strictly increasing order.
    pub fn append(&mut self, id: u32, entity_id: u32, count: u32) -> Result<()> {
        let offset = i32::try_from(self.postings.len())
            .map_err(|_| IndexError::corruption("posting arena exceeds i32 offsets"))?;
        let list = self
            .lists
            .get_mut(id as usize)
            .ok_or_else(|| IndexError::corruption(format!("no posting list {id}")))?;

        if list.last == NO_POSTING {
            list.first = offset;
        } else {
            let tail = self
                .postings
                .get_mut(list.last as usize)
                .ok_or_else(|| IndexError::corruption(format!("dangling tail in list {id}")))?;
            if tail.entity_id >= entity_id {
                return Err(IndexError::corruption(format!(
                    "list {id}: entity {entity_id} appended after {}",
                    tail.entity_id
                )));
            }
            tail.next = offset;
        }
        list.last = offset;

        self.postings.push(Posting { entity_id, count, normalized_count: 0.0, next: NO_POSTING });
        Ok(())
    }

    /// Walks list `id` from head to tail.
    pub fn iter(&self, id: u32) -> Result<Postings<'_>> {
        let list = self
            .list(id)
            .ok_or_else(|| IndexError::corruption(format!("no posting list {id}")))?;
        Ok(Postings { arena: &self.postings, next: list.first })
    }

    /// Arena offsets of list `id`, head to tail.
    pub(crate) fn offsets(&self, id: u32) -> Result<Vec<usize>> {
        let list = self
            .list(id)
            .ok_or_else(|| IndexError::corruption(format!("no posting list {id}")))?;
        let mut offsets = Vec::new();
        let mut next = list.first;
        while next != NO_POSTING {
            let posting = self.postings.get(next as usize).ok_or_else(|| {
                IndexError::corruption(format!("list {id} links to missing posting {next}"))
            })?;
            if offsets.len() == self.postings.len() {
                return Err(IndexError::corruption(format!("list {id} contains a cycle")));
            }
            offsets.push(next as usize);
            next = posting.next;
        }
        Ok(offsets)
    }
}

/// Iterator over one posting list. Stops at the end marker; a link outside the
/// arena also ends the walk (`verify` reports it).
pub struct Postings<'a> {
    arena: &'a [Posting],
    next: i32,
}

impl<'a> Iterator for Postings<'a> {
    type Item = &'a Posting;

    fn next(&mut self) -> Option<Self::Item> {
        if self.next < 0 {
            return None;
        }
        let posting = self.arena.get(self.next as usize)?;
        self.next = posting.next;
        Some(posting)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub name: String,
    pub class_ids: Vec<ClassId>,
    /// Token count of the document.
    pub length: u32,
    /// Number of distinct terms, i.e. forward postings.
    pub unique_length: u32,
    /// Assigned cluster, or `UNASSIGNED`.
    pub cluster_id: i32,
}

impl DocumentInfo {
    pub fn new(name: String, class_ids: Vec<ClassId>, length: u32) -> Self {
        Self { name, class_ids, length, unique_length: 0, cluster_id: UNASSIGNED }
    }

    pub fn cluster(&self) -> Option<usize> {
        usize::try_from(self.cluster_id).ok()
    }
}

/// The whole index: dictionaries, document table and both posting sides.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TotalIndex {
    pub dictionary: Dictionary,
    pub classes: Dictionary,
    pub documents: Vec<DocumentInfo>,
    /// Document id -> (term id, count).
    pub forward: PostingIndex,
    /// Term id -> (document id, count).
    pub inverse: PostingIndex,
    /// Dense centroids of the last clustering run. Never persisted with the index.
    #[serde(skip)]
    pub centroids: Vec<Vec<f64>>,
}

impl TotalIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Number of terms with an inverse list.
    pub fn term_count(&self) -> usize {
        self.inverse.len()
    }

    pub fn document(&self, id: DocId) -> Option<&DocumentInfo> {
        self.documents.get(id as usize)
    }

    pub fn document_postings(&self, id: DocId) -> Result<Postings<'_>> {
        self.forward.iter(id)
    }

    pub fn term_postings(&self, id: TermId) -> Result<Postings<'_>> {
        self.inverse.iter(id)
    }

    pub fn for_each_posting_of_document<F>(&self, id: DocId, f: F) -> Result<()>
    where
        F: FnMut(&Posting),
    {
        self.document_postings(id)?.for_each(f);
        Ok(())
    }

    pub fn for_each_posting_of_term<F>(&self, id: TermId, f: F) -> Result<()>
    where
        F: FnMut(&Posting),
    {
        self.term_postings(id)?.for_each(f);
        Ok(())
    }

    pub fn is_clustered(&self) -> bool {
        !self.centroids.is_empty()
    }
}
