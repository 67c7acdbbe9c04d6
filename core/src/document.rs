use crate::trie::Trie;

/// Term -> occurrence count multiset for one document.
#[derive(Debug, Clone, Default)]
pub struct TermCounts {
    counts: Trie,
}

impl TermCounts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Counts one more occurrence of `term`.
    pub fn add(&mut self, term: &[u8]) {
        self.add_n(term, 1);
    }

    /// Counts `n` more occurrences; the count saturates at `u32::MAX`.
    pub fn add_n(&mut self, term: &[u8], n: u32) {
        if n == 0 {
            return;
        }
        self.counts.put_with(term, |c| c.saturating_add(n), n);
    }

    pub fn get(&self, term: &[u8]) -> u32 {
        self.counts.get(term).unwrap_or(0)
    }

    /// Number of distinct terms.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        let mut total = 0u64;
        self.counts.walk(|_, count| total += u64::from(count));
        total
    }

    pub fn for_each<F: FnMut(&[u8], u32)>(&self, visit: F) {
        self.counts.walk(visit);
    }

    pub fn to_pairs(&self) -> Vec<(Vec<u8>, u32)> {
        let mut pairs = Vec::with_capacity(self.len());
        self.counts.walk(|term, count| pairs.push((term.to_vec(), count)));
        pairs
    }
}

impl<T: AsRef<[u8]>> FromIterator<T> for TermCounts {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut counts = TermCounts::new();
        for term in iter {
            counts.add(term.as_ref());
        }
        counts
    }
}

/// One document as handed over by a producer: metadata plus its term multiset.
#[derive(Debug, Clone, Default)]
pub struct RawDocument {
    pub name: String,
    pub classes: Vec<String>,
    /// Token length before de-duplication.
    pub length: u32,
    pub terms: TermCounts,
}

impl RawDocument {
    pub fn new(name: impl Into<String>, classes: Vec<String>, length: u32) -> Self {
        Self { name: name.into(), classes, length, terms: TermCounts::new() }
    }

    /// Builds a document from its token stream; `length` is the token count.
    pub fn from_tokens<I, T>(name: impl Into<String>, classes: Vec<String>, tokens: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: AsRef<[u8]>,
    {
        let mut length = 0u32;
        let terms = tokens
            .into_iter()
            .inspect(|_| length = length.saturating_add(1))
            .collect::<TermCounts>();
        Self { name: name.into(), classes, length, terms }
    }

    pub fn with_term(mut self, term: &str, count: u32) -> Self {
        self.terms.add_n(term.as_bytes(), count);
        self
    }
}
