use super::*;
use std::cell::Cell;
use tempfile::TempDir;

/// Counts letters a-z; fails on any text containing "FAIL"
struct LetterEmbedder {
    calls: Cell<usize>,
}

impl LetterEmbedder {
    fn new() -> Self {
        Self {
            calls: Cell::new(0),
        }
    }
}

impl Embedder for LetterEmbedder {
    fn model_id(&self) -> &str {
        "letters"
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.set(self.calls.get() + 1);
        if text.contains("FAIL") {
            anyhow::bail!("model unavailable");
        }
        let mut vector = vec![0.0; 26];
        for c in text.to_ascii_lowercase().bytes().filter(u8::is_ascii_lowercase) {
            vector[usize::from(c - b'a')] += 1.0;
        }
        Ok(vector)
    }
}

fn write_corpus(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().expect("should create temp dir");
    for (name, content) in files {
        fs::write(dir.path().join(name), content).expect("should write corpus file");
    }
    dir
}

fn chunking(fragment_size: usize) -> ChunkingConfig {
    ChunkingConfig { fragment_size }
}

#[test]
fn builds_from_all_documents() {
    let corpus = write_corpus(&[
        ("A.txt", "The cat sleeps. It is calm."),
        ("B.txt", "Stock markets rose today."),
        ("C.txt", "The cat plays with yarn."),
    ]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let (snapshot, stats) = builder.build(corpus.path()).expect("build should succeed");

    assert_eq!(snapshot.len(), 3);
    assert_eq!(snapshot.index().len(), snapshot.fragments().len());
    assert_eq!(snapshot.model(), "letters");
    assert_eq!(snapshot.fragment_size(), 500);
    assert_eq!(
        stats,
        IndexingStats {
            documents_found: 3,
            documents_indexed: 3,
            documents_skipped: 0,
            fragments_created: 3,
            errors_encountered: 0,
        }
    );

    let documents: Vec<&str> = snapshot
        .fragments()
        .iter()
        .map(|f| f.document.as_str())
        .collect();
    assert_eq!(documents, vec!["A.txt", "B.txt", "C.txt"]);
}

#[test]
fn fragments_keep_document_order() {
    let corpus = write_corpus(&[("story.txt", "First part here. Second part here. Third part here.")]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(20));

    let (snapshot, _) = builder.build(corpus.path()).expect("build should succeed");

    let fragments = snapshot.fragments();
    assert_eq!(fragments.len(), 3);
    assert_eq!(fragments[0].text, "First part here.");
    assert_eq!(
        fragments.iter().map(|f| f.ordinal).collect::<Vec<_>>(),
        vec![0, 1, 2]
    );
}

#[test]
fn embedding_failure_skips_whole_document() {
    let corpus = write_corpus(&[
        ("good.txt", "The cat sleeps."),
        ("bad.txt", "This part is fine. FAIL happens here."),
    ]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(20));

    let (snapshot, stats) = builder.build(corpus.path()).expect("build should succeed");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.fragments()[0].document, "good.txt");
    assert_eq!(stats.documents_skipped, 1);
    assert_eq!(stats.errors_encountered, 1);
}

#[test]
fn binary_and_directories_are_skipped() {
    let corpus = write_corpus(&[("notes.txt", "The cat plays with yarn.")]);
    fs::write(
        corpus.path().join("image.png"),
        [0x89, b'P', b'N', b'G', 0x00, 0x00, 0x01],
    )
    .expect("should write binary file");
    fs::create_dir(corpus.path().join("nested")).expect("should create subdirectory");

    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let (snapshot, stats) = builder.build(corpus.path()).expect("build should succeed");

    assert_eq!(snapshot.len(), 1);
    assert_eq!(stats.documents_found, 2);
    assert_eq!(stats.errors_encountered, 1);
}

#[test]
fn empty_documents_are_not_errors() {
    let corpus = write_corpus(&[("empty.txt", ""), ("A.txt", "The cat sleeps.")]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let (_, stats) = builder.build(corpus.path()).expect("build should succeed");

    assert_eq!(stats.documents_skipped, 1);
    assert_eq!(stats.errors_encountered, 0);
}

#[test]
fn empty_corpus_is_an_error() {
    let corpus = write_corpus(&[]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let result = builder.build(corpus.path());
    assert!(matches!(result, Err(RetrievalError::EmptyCorpus(_))));
}

#[test]
fn corpus_with_only_failures_is_empty() {
    let corpus = write_corpus(&[("bad.txt", "FAIL.")]);
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let result = builder.build(corpus.path());
    assert!(matches!(result, Err(RetrievalError::EmptyCorpus(_))));
    assert_eq!(embedder.calls.get(), 1);
}

#[test]
fn missing_corpus_directory() {
    let dir = TempDir::new().expect("should create temp dir");
    let embedder = LetterEmbedder::new();
    let builder = IndexBuilder::new(&embedder, chunking(500));

    let result = builder.build(&dir.path().join("missing"));
    assert!(matches!(result, Err(RetrievalError::Corpus(_))));
}

#[test]
fn discover_documents_sorted() {
    let corpus = write_corpus(&[("b.txt", "b"), ("a.txt", "a"), ("c.md", "c")]);

    let documents = discover_documents(corpus.path()).expect("discovery should succeed");
    let names: Vec<String> = documents.iter().map(|p| document_name(p)).collect();

    assert_eq!(names, vec!["a.txt", "b.txt", "c.md"]);
}
