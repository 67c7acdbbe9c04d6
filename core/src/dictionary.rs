use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::trie::Trie;

/// Surrogate-key allocator for terms and class labels.
///
/// Ids are dense and handed out in first-seen order starting at 0. Mutation is
/// single-writer; share it behind `&` only once construction is done.
#[derive(Debug, Clone, Default)]
pub struct Dictionary {
    trie: Trie,
    /// Reverse map, id -> bytes.
    terms: Vec<Vec<u8>>,
}

impl Dictionary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Looks `term` up, allocating the next id if it has not been seen.
    pub fn get(&mut self, term: &[u8]) -> u32 {
        let next = self.terms.len() as u32;
        let id = self.trie.get_or_put(term, next);
        if id == next {
            self.terms.push(term.to_vec());
        }
        id
    }

    /// Looks `term` up without allocating.
    pub fn lookup(&self, term: &[u8]) -> Option<u32> {
        self.trie.get(term)
    }

    pub fn inverse(&self, id: u32) -> Option<&[u8]> {
        self.terms.get(id as usize).map(Vec::as_slice)
    }

    /// Lossy UTF-8 view of `inverse`, for reports.
    pub fn name(&self, id: u32) -> Option<String> {
        self.inverse(id).map(|bytes| String::from_utf8_lossy(bytes).into_owned())
    }

    pub fn len(&self) -> usize {
        self.terms.len()
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[u8])> {
        self.terms
            .iter()
            .enumerate()
            .map(|(id, term)| (id as u32, term.as_slice()))
    }

    /// Rebuilds a dictionary whose ids are the positions in `terms`.
    pub fn from_terms(terms: Vec<Vec<u8>>) -> Result<Self, String> {
        let mut dictionary = Dictionary::new();
        for (position, term) in terms.into_iter().enumerate() {
            let id = dictionary.get(&term);
            if id as usize != position {
                return Err(format!(
                    "duplicate entry {:?} at position {position}, first seen as id {id}",
                    String::from_utf8_lossy(&term)
                ));
            }
        }
        Ok(dictionary)
    }
}

impl PartialEq for Dictionary {
    fn eq(&self, other: &Self) -> bool {
        self.terms == other.terms
    }
}

// Persisted as the id-ordered term list; the trie is rebuilt on load.
impl Serialize for Dictionary {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.terms)
    }
}

impl<'de> Deserialize<'de> for Dictionary {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let terms = Vec::<Vec<u8>>::deserialize(deserializer)?;
        Dictionary::from_terms(terms).map_err(D::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_dense_and_stable() {
        let mut dic = Dictionary::new();
        assert_eq!(dic.get(b"foobar"), 0);
        assert_eq!(dic.get(b"provid"), 1);
        assert_eq!(dic.get(b"pro"), 2);
        assert_eq!(dic.get(b"provid"), 1);
        assert_eq!(dic.len(), 3);
        assert_eq!(dic.inverse(2), Some(&b"pro"[..]));
        assert_eq!(dic.inverse(3), None);
    }

    #[test]
    fn lookup_does_not_allocate() {
        let mut dic = Dictionary::new();
        dic.get(b"foo");
        assert_eq!(dic.lookup(b"foo"), Some(0));
        assert_eq!(dic.lookup(b"bar"), None);
        assert_eq!(dic.len(), 1);
    }

    #[test]
    fn from_terms_rejects_duplicates() {
        assert!(Dictionary::from_terms(vec![b"a".to_vec(), b"a".to_vec()]).is_err());
        let dic = Dictionary::from_terms(vec![b"a".to_vec(), b"b".to_vec()]).unwrap();
        assert_eq!(dic.lookup(b"b"), Some(1));
    }

    #[test]
    fn bincode_round_trip() {
        let mut dic = Dictionary::new();
        for term in ["politics", "sports", "dodgeball"] {
            dic.get(term.as_bytes());
        }
        let bytes = bincode::serialize(&dic).unwrap();
        let back: Dictionary = bincode::deserialize(&bytes).unwrap();
        assert_eq!(back.iter().collect::<Vec<_>>(), dic.iter().collect::<Vec<_>>());
        assert_eq!(back.lookup(b"sports"), Some(1));
    }
}
