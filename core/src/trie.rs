//! Byte-string automaton mapping words to `u32` values.
//!
//! Nodes live in flat vectors addressed by node id; node 0 is the root. Every
//! accepting node carries a value.

use std::collections::HashMap;

const ROOT: u32 = 0;

#[derive(Debug, Clone)]
pub struct Trie {
    transitions: HashMap<(u32, u8), u32>,
    /// Outgoing edges per node, in insertion order. Drives `walk`.
    children: Vec<Vec<(u8, u32)>>,
    values: Vec<Option<u32>>,
    len: usize,
}

impl Default for Trie {
    fn default() -> Self {
        Self::new()
    }
}

impl Trie {
    pub fn new() -> Self {
        Self {
            transitions: HashMap::new(),
            children: vec![Vec::new()],
            values: vec![None],
            len: 0,
        }
    }

    /// Number of stored words.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Follows `word` as far as the automaton allows. Returns the last node reached
    /// and how many bytes were consumed.
    fn traverse(&self, word: &[u8]) -> (u32, usize) {
        let mut node = ROOT;
        for (i, &label) in word.iter().enumerate() {
            match self.transitions.get(&(node, label)) {
                Some(&next) => node = next,
                None => return (node, i),
            }
        }
        (node, word.len())
    }

    pub fn get(&self, word: &[u8]) -> Option<u32> {
        let (node, consumed) = self.traverse(word);
        if consumed < word.len() {
            return None;
        }
        self.values[node as usize]
    }

    pub fn contains(&self, word: &[u8]) -> bool {
        self.get(word).is_some()
    }

    /// Stores `value` under `word`, replacing any previous value.
    pub fn put(&mut self, word: &[u8], value: u32) -> u32 {
        let node = self.accepting_node(word);
        if self.values[node as usize].replace(value).is_none() {
            self.len += 1;
        }
        value
    }

    /// Returns the stored value, or stores `value` and returns it.
    pub fn get_or_put(&mut self, word: &[u8], value: u32) -> u32 {
        match self.get(word) {
            Some(existing) => existing,
            None => self.put(word, value),
        }
    }

    /// Replaces an existing value with `update(old)`, or stores `default`.
    pub fn put_with<F>(&mut self, word: &[u8], update: F, default: u32) -> u32
    where
        F: FnOnce(u32) -> u32,
    {
        let value = match self.get(word) {
            Some(old) => update(old),
            None => default,
        };
        self.put(word, value)
    }

    /// Visits every stored word depth-first, children in insertion order.
    pub fn walk<F>(&self, mut visit: F)
    where
        F: FnMut(&[u8], u32),
    {
        let mut word = Vec::new();
        self.walk_from(ROOT, &mut word, &mut visit);
    }

    fn walk_from<F>(&self, node: u32, word: &mut Vec<u8>, visit: &mut F)
    where
        F: FnMut(&[u8], u32),
    {
        if let Some(value) = self.values[node as usize] {
            visit(word, value);
        }
        for &(label, child) in &self.children[node as usize] {
            word.push(label);
            self.walk_from(child, word, visit);
            word.pop();
        }
    }

    fn accepting_node(&mut self, word: &[u8]) -> u32 {
        let (mut node, consumed) = self.traverse(word);
        for &label in &word[consumed..] {
            let next = self.values.len() as u32;
            self.values.push(None);
            self.children.push(Vec::new());
            self.transitions.insert((node, label), next);
            self.children[node as usize].push((label, next));
            node = next;
        }
        node
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn put_and_get() {
        let mut trie = Trie::new();
        trie.put(b"foo", 42);
        trie.put(b"fob", 43);
        trie.put(b"bar", 44);

        assert_eq!(trie.get(b"foo"), Some(42));
        assert_eq!(trie.get(b"fob"), Some(43));
        assert_eq!(trie.get(b"bar"), Some(44));
        assert_eq!(trie.get(b"fo"), None);
        assert_eq!(trie.get(b"foobar"), None);
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn get_or_put_keeps_first_value() {
        let mut trie = Trie::new();
        assert_eq!(trie.get_or_put(b"qux", 5), 5);
        assert_eq!(trie.get(b"qux"), Some(5));
        assert_eq!(trie.get_or_put(b"qux", 1), 5);
        assert_eq!(trie.len(), 1);
    }

    #[test]
    fn prefix_words_are_distinct() {
        let mut trie = Trie::new();
        trie.put(b"provid", 0);
        trie.put(b"pro", 1);
        trie.put(b"", 2);
        assert_eq!(trie.get(b"provid"), Some(0));
        assert_eq!(trie.get(b"pro"), Some(1));
        assert_eq!(trie.get(b""), Some(2));
        assert_eq!(trie.len(), 3);
    }

    #[test]
    fn put_with_updates_existing() {
        let mut trie = Trie::new();
        trie.put_with(b"foo", |c| c + 1, 1);
        trie.put_with(b"foo", |c| c + 1, 1);
        trie.put_with(b"bar", |c| c + 1, 1);
        assert_eq!(trie.get(b"foo"), Some(2));
        assert_eq!(trie.get(b"bar"), Some(1));
    }

    #[test]
    fn walk_visits_depth_first_in_insertion_order() {
        let mut trie = Trie::new();
        trie.put(b"ab", 0);
        trie.put(b"b", 1);
        trie.put(b"aa", 2);
        trie.put(b"a", 3);

        let mut seen = Vec::new();
        trie.walk(|word, value| seen.push((word.to_vec(), value)));
        assert_eq!(
            seen,
            vec![
                (b"a".to_vec(), 3),
                (b"ab".to_vec(), 0),
                (b"aa".to_vec(), 2),
                (b"b".to_vec(), 1),
            ]
        );
    }
}
