use anyhow::{Context, Result};
use lazy_static::lazy_static;
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use termindex::RawDocument;
use unicode_normalization::UnicodeNormalization;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(?u)\p{L}[\p{L}'-]*").expect("valid regex");
    static ref STEMMER: Stemmer = Stemmer::create(Algorithm::English);
}

const ENGLISH_STOPWORDS: &[&str] = &[
    "a","about","above","after","again","against","all","am","an","and","any","are","as","at",
    "be","because","been","before","being","below","between","both","but","by",
    "can","cannot","could","did","do","does","doing","down","during",
    "each","few","for","from","further",
    "had","has","have","having","he","her","here","hers","herself","him","himself","his","how",
    "i","if","in","into","is","it","its","itself",
    "me","more","most","my","myself",
    "no","nor","not","of","off","on","once","only","or","other","ought","our","ours","ourselves","out","over","own",
    "said","same","she","should","so","some","such",
    "than","that","the","their","theirs","them","themselves","then","there","these","they","this","those","through","to","too",
    "under","until","up","very",
    "was","we","were","what","when","where","which","while","who","whom","why","will","with","would",
    "you","your","yours","yourself","yourselves",
];

/// Turns raw text into stemmed terms: NFKC, lowercase, letter runs, stopword
/// removal, Snowball English stemming.
pub struct Tokenizer {
    stopwords: HashSet<String>,
}

impl Default for Tokenizer {
    fn default() -> Self {
        Self::english()
    }
}

impl Tokenizer {
    pub fn english() -> Self {
        Self { stopwords: ENGLISH_STOPWORDS.iter().map(|w| w.to_string()).collect() }
    }

    /// One stopword per line; blank lines are ignored.
    pub fn from_stopword_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("reading stopwords from {}", path.display()))?;
        let stopwords = text
            .lines()
            .map(|line| line.trim().to_lowercase())
            .filter(|line| !line.is_empty())
            .collect();
        Ok(Self { stopwords })
    }

    pub fn is_stopword(&self, word: &str) -> bool {
        self.stopwords.contains(word)
    }

    pub fn tokenize(&self, text: &str) -> Vec<String> {
        let normalized = text.nfkc().collect::<String>().to_lowercase();
        WORD.find_iter(&normalized)
            .map(|m| m.as_str().trim_matches(|c| c == '\'' || c == '-'))
            .filter(|word| !word.is_empty() && !self.is_stopword(word))
            .map(|word| STEMMER.stem(word).into_owned())
            .collect()
    }

    /// Builds the producer tuple for one document.
    pub fn count(&self, name: &str, classes: Vec<String>, body: &str) -> RawDocument {
        RawDocument::from_tokens(name, classes, self.tokenize(body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_and_stems() {
        let words = Tokenizer::english().tokenize("Running Runners RUN! The café's menu.");
        assert!(words.contains(&"run".to_string()));
        assert!(words.iter().any(|w| w.starts_with("caf")));
        assert!(!words.contains(&"the".to_string()));
    }

    #[test]
    fn drops_numbers_and_punctuation() {
        let words = Tokenizer::english().tokenize("42 -- 3.5% ... oil!");
        assert_eq!(words, vec!["oil".to_string()]);
    }

    #[test]
    fn stopword_file_replaces_builtin_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stopwords");
        fs::write(&path, "oil\n\nBarrel\n").unwrap();
        let tokenizer = Tokenizer::from_stopword_file(&path).unwrap();
        assert_eq!(tokenizer.tokenize("the oil barrels"), vec!["the".to_string(), "barrel".to_string()]);
    }

    #[test]
    fn count_sets_length_and_terms() {
        let doc = Tokenizer::english().count("d", vec!["grain".into()], "wheat wheat corn and");
        assert_eq!(doc.length, 3);
        assert_eq!(doc.terms.get(b"wheat"), 2);
        assert_eq!(doc.terms.get(b"corn"), 1);
    }
}
