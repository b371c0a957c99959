use async_trait::async_trait;
use fxhash::FxHashMap;
use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;

use super::{RetrievalError, SchemaContextProvider, TextSplitter};

const K1: f64 = 1.2;
const B: f64 = 0.75;

/// In-memory BM25 index over schema documentation chunks
#[derive(Debug)]
pub struct LexicalIndex {
    chunks: Vec<String>,
    term_freqs: Vec<FxHashMap<String, u32>>,
    doc_lengths: Vec<usize>,
    doc_freqs: FxHashMap<String, u32>,
    avg_length: f64,
}

impl LexicalIndex {
    /// Index pre-chunked text. Blank chunks are skipped.
    pub fn build(chunks: Vec<String>) -> Result<Self, RetrievalError> {
        let chunks: Vec<String> = chunks
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect();
        if chunks.is_empty() {
            return Err(RetrievalError::EmptyCorpus);
        }

        let mut term_freqs = Vec::with_capacity(chunks.len());
        let mut doc_lengths = Vec::with_capacity(chunks.len());
        let mut doc_freqs: FxHashMap<String, u32> = FxHashMap::default();

        for chunk in &chunks {
            let terms = tokenize(chunk);
            doc_lengths.push(terms.len());

            let mut freqs: FxHashMap<String, u32> = FxHashMap::default();
            for term in terms {
                *freqs.entry(term).or_insert(0) += 1;
            }
            for term in freqs.keys() {
                *doc_freqs.entry(term.clone()).or_insert(0) += 1;
            }
            term_freqs.push(freqs);
        }

        let avg_length = doc_lengths.iter().sum::<usize>() as f64 / chunks.len() as f64;

        tracing::debug!(
            chunks = chunks.len(),
            terms = doc_freqs.len(),
            "Built lexical schema index"
        );

        Ok(Self {
            chunks,
            term_freqs,
            doc_lengths,
            doc_freqs,
            avg_length,
        })
    }

    /// Split whole documents and index the resulting chunks
    pub fn from_documents(
        documents: &[String],
        splitter: &TextSplitter,
    ) -> Result<Self, RetrievalError> {
        let chunks = documents
            .iter()
            .flat_map(|doc| splitter.split(doc))
            .collect();
        Self::build(chunks)
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Top `k` chunks for `query`.
    ///
    /// Chunks with no matching terms keep their corpus order after the
    /// scored ones, so the result always holds `min(k, len)` entries.
    pub fn search(&self, query: &str, k: usize) -> Vec<String> {
        let query_terms = tokenize(query);

        let mut scored: Vec<(usize, f64)> = (0..self.chunks.len())
            .map(|i| (i, self.score(i, &query_terms)))
            .collect();

        // Stable sort keeps ties in corpus order
        scored.sort_by(|a, b| b.1.total_cmp(&a.1));

        scored
            .into_iter()
            .take(k)
            .map(|(i, _)| self.chunks[i].clone())
            .collect()
    }

    fn score(&self, doc: usize, query_terms: &[String]) -> f64 {
        let n = self.chunks.len() as f64;
        let freqs = &self.term_freqs[doc];
        let length_norm = if self.avg_length > 0.0 {
            self.doc_lengths[doc] as f64 / self.avg_length
        } else {
            0.0
        };

        query_terms
            .iter()
            .filter_map(|term| {
                let tf = *freqs.get(term)? as f64;
                let df = *self.doc_freqs.get(term)? as f64;
                let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                Some(idf * tf * (K1 + 1.0) / (tf + K1 * (1.0 - B + B * length_norm)))
            })
            .sum()
    }
}

#[async_trait]
impl SchemaContextProvider for LexicalIndex {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(self.search(query, k))
    }
}

fn word_regex() -> &'static Regex {
    static WORD: OnceLock<Regex> = OnceLock::new();
    WORD.get_or_init(|| Regex::new(r"[a-z0-9_]+").expect("valid word regex"))
}

/// Lowercased word terms; snake_case identifiers also yield their parts
fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    let mut terms = Vec::new();

    for word in word_regex().find_iter(&lowered) {
        let word = word.as_str();
        terms.push(word.to_string());
        if word.contains('_') {
            terms.extend(
                word.split('_')
                    .filter(|part| !part.is_empty())
                    .map(str::to_string),
            );
        }
    }

    terms
}

/// Load documentation from a file, or from every `.txt`/`.md` file in a
/// directory (sorted by file name)
pub fn load_documents(path: &Path) -> Result<Vec<String>, RetrievalError> {
    let io_err = |source| RetrievalError::Io {
        path: path.to_path_buf(),
        source,
    };

    if path.is_file() {
        return Ok(vec![std::fs::read_to_string(path).map_err(io_err)?]);
    }

    let mut files: Vec<_> = std::fs::read_dir(path)
        .map_err(io_err)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.is_file()
                && matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("txt") | Some("md")
                )
        })
        .collect();
    files.sort();

    let mut documents = Vec::with_capacity(files.len());
    for file in files {
        let text = std::fs::read_to_string(&file).map_err(|source| RetrievalError::Io {
            path: file.clone(),
            source,
        })?;
        documents.push(text);
    }

    if documents.is_empty() {
        return Err(RetrievalError::EmptyCorpus);
    }

    tracing::info!(
        path = %path.display(),
        documents = documents.len(),
        "Loaded schema documentation"
    );
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn corpus() -> LexicalIndex {
        LexicalIndex::build(vec![
            "CREATE TABLE employees (id INTEGER, name TEXT, salary REAL, department_id INTEGER)"
                .to_string(),
            "CREATE TABLE departments (id INTEGER, name TEXT, budget REAL)".to_string(),
            "CREATE TABLE projects (id INTEGER, title TEXT, deadline TEXT)".to_string(),
        ])
        .unwrap()
    }

    #[test]
    fn test_empty_corpus_is_rejected() {
        assert!(matches!(
            LexicalIndex::build(vec!["   ".to_string()]),
            Err(RetrievalError::EmptyCorpus)
        ));
    }

    #[test]
    fn test_search_ranks_matching_chunk_first() {
        let index = corpus();
        let results = index.search("average salary of employees", 1);
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("employees"));
    }

    #[test]
    fn test_snake_case_parts_match() {
        let index = corpus();
        let results = index.search("which department", 1);
        assert!(results[0].contains("department_id"));
    }

    #[test]
    fn test_unscored_chunks_fill_to_k() {
        let index = corpus();
        let results = index.search("budget", 3);
        assert_eq!(results.len(), 3);
        assert!(results[0].contains("departments"));
        // Remaining chunks keep corpus order
        assert!(results[1].contains("employees"));
        assert!(results[2].contains("projects"));
    }

    #[test]
    fn test_k_larger_than_corpus() {
        assert_eq!(corpus().search("anything", 10).len(), 3);
    }

    #[tokio::test]
    async fn test_provider_impl() {
        let index = corpus();
        let provider: &dyn SchemaContextProvider = &index;
        let results = provider.retrieve("project deadline", 2).await.unwrap();
        assert_eq!(results.len(), 2);
        assert!(results[0].contains("projects"));
    }

    #[test]
    fn test_load_documents_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.md"), "second").unwrap();
        std::fs::write(dir.path().join("a.txt"), "first").unwrap();
        std::fs::write(dir.path().join("ignored.csv"), "x,y").unwrap();

        let docs = load_documents(dir.path()).unwrap();
        assert_eq!(docs, vec!["first".to_string(), "second".to_string()]);
    }

    #[test]
    fn test_load_documents_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("schema.md");
        std::fs::write(&file, "employees(id, name)").unwrap();

        assert_eq!(load_documents(&file).unwrap(), vec!["employees(id, name)"]);
    }

    #[test]
    fn test_load_documents_missing_path() {
        let err = load_documents(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RetrievalError::Io { .. }));
    }
}
