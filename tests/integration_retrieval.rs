#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

// End-to-end retrieval tests with a deterministic keyword embedder

use context_index::config::Config;
use context_index::embeddings::Embedder;
use context_index::embeddings::chunking::ChunkingConfig;
use context_index::{IndexBuilder, IndexStore, RetrievalEngine, RetrievalError};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const KEYWORDS: [&str; 6] = ["cat", "market", "yarn", "sleep", "stock", "calm"];

/// One dimension per keyword, counting occurrences
struct KeywordEmbedder {
    model: &'static str,
}

impl KeywordEmbedder {
    fn new() -> Self {
        Self { model: "keywords-v1" }
    }
}

impl Embedder for KeywordEmbedder {
    fn model_id(&self) -> &str {
        self.model
    }

    fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        let lower = text.to_lowercase();
        Ok(KEYWORDS
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect())
    }
}

struct Workspace {
    _dir: TempDir,
    corpus: PathBuf,
    store: IndexStore,
}

fn workspace(files: &[(&str, &str)]) -> Workspace {
    let dir = TempDir::new().expect("should create temp dir");
    let corpus = dir.path().join("context");
    fs::create_dir(&corpus).expect("should create corpus dir");
    for (name, content) in files {
        fs::write(corpus.join(name), content).expect("should write document");
    }
    let store = IndexStore::new(dir.path().join("data").join("index.bin"));
    Workspace {
        _dir: dir,
        corpus,
        store,
    }
}

fn cat_corpus() -> Workspace {
    workspace(&[
        ("A.txt", "The cat sleeps. It is calm."),
        ("B.txt", "Stock markets rose today."),
        ("C.txt", "The cat plays with yarn."),
    ])
}

fn open(workspace: &Workspace, chunking: &ChunkingConfig) -> RetrievalEngine<KeywordEmbedder> {
    RetrievalEngine::open(
        KeywordEmbedder::new(),
        &workspace.store,
        &workspace.corpus,
        chunking,
    )
    .expect("engine should open")
}

#[test]
fn cat_query_returns_cat_fragments() {
    let workspace = cat_corpus();
    let engine = open(&workspace, &ChunkingConfig::default());

    let hits = engine
        .search_hits("Tell me about cats", 2, 500)
        .expect("search should succeed");

    let documents: Vec<&str> = hits.iter().map(|hit| hit.document.as_str()).collect();
    assert_eq!(documents.len(), 2);
    assert!(documents.contains(&"A.txt"));
    assert!(documents.contains(&"C.txt"));
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance));
}

#[test]
fn budget_is_never_exceeded() {
    let workspace = cat_corpus();
    let engine = open(&workspace, &ChunkingConfig { fragment_size: 16 });

    for query in ["cat", "markets", "yarn and sleep", "calm stock"] {
        for max_characters in [0, 10, 16, 30, 60, 2000] {
            let results = engine
                .search(query, 10, max_characters)
                .expect("search should succeed");
            let used: usize = results.iter().map(|text| text.chars().count()).sum();
            assert!(used <= max_characters, "{query} used {used} of {max_characters}");
        }
    }
}

#[test]
fn top_k_larger_than_index() {
    let workspace = cat_corpus();
    let engine = open(&workspace, &ChunkingConfig::default());

    let results = engine.search("cat", 100, 2000).expect("search should succeed");
    assert_eq!(results.len(), 3);
}

#[test]
fn persisted_index_serves_without_corpus() {
    let workspace = cat_corpus();
    let first = open(&workspace, &ChunkingConfig::default());
    let expected = first.search("yarn", 3, 2000).expect("search should succeed");

    fs::remove_dir_all(&workspace.corpus).expect("should remove corpus");

    let reopened = open(&workspace, &ChunkingConfig::default());
    assert_eq!(
        reopened.search("yarn", 3, 2000).expect("search should succeed"),
        expected
    );
    assert_eq!(reopened.snapshot(), first.snapshot());
}

#[test]
fn rebuilding_unchanged_corpus_is_deterministic() {
    let workspace = cat_corpus();
    let embedder = KeywordEmbedder::new();
    let builder = IndexBuilder::new(&embedder, ChunkingConfig { fragment_size: 16 });

    let (first, first_stats) = builder.build(&workspace.corpus).expect("build should succeed");
    let (second, second_stats) = builder.build(&workspace.corpus).expect("build should succeed");

    assert_eq!(first.fragments(), second.fragments());
    assert_eq!(first.index(), second.index());
    assert_eq!(first_stats, second_stats);
}

#[test]
fn corrupt_blob_is_rebuilt() {
    let workspace = cat_corpus();
    let path = workspace.store.path().to_path_buf();
    fs::create_dir_all(path.parent().expect("blob has a parent")).expect("should create data dir");
    fs::write(&path, b"not an index").expect("should write garbage");

    let engine = open(&workspace, &ChunkingConfig::default());
    assert_eq!(engine.snapshot().map(|s| s.len()), Some(3));
    assert!(workspace.store.load().is_ok());
}

#[test]
fn model_change_rebuilds_index() {
    let workspace = cat_corpus();
    open(&workspace, &ChunkingConfig::default());

    let other = KeywordEmbedder {
        model: "keywords-v2",
    };
    let engine = RetrievalEngine::open(
        other,
        &workspace.store,
        &workspace.corpus,
        &ChunkingConfig::default(),
    )
    .expect("engine should open");

    assert_eq!(engine.snapshot().map(|s| s.model()), Some("keywords-v2"));
    assert_eq!(
        workspace.store.load().expect("blob should load").model(),
        "keywords-v2"
    );
}

#[test]
fn empty_corpus_cannot_be_indexed() {
    let workspace = workspace(&[]);
    let result = RetrievalEngine::open(
        KeywordEmbedder::new(),
        &workspace.store,
        &workspace.corpus,
        &ChunkingConfig::default(),
    );

    assert!(matches!(result, Err(RetrievalError::EmptyCorpus(_))));
    assert!(!workspace.store.path().exists());
}

#[test]
fn legacy_encoded_documents_are_indexed() {
    let workspace = workspace(&[("B.txt", "Stock markets rose today.")]);
    let text = "Le cat market est très animé, près du marché où les élèves achètent \
        leur goûter et où le café est préparé à côté de l'église.";
    let (bytes, _, _) = encoding_rs::WINDOWS_1252.encode(text);
    fs::write(workspace.corpus.join("fr.txt"), &bytes).expect("should write document");

    let engine = open(&workspace, &ChunkingConfig::default());
    let hits = engine.search_hits("cat", 1, 2000).expect("search should succeed");

    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].document, "fr.txt");
    assert!(hits[0].text.contains("près"));
    assert!(hits[0].text.contains("marché"));
}

#[test]
fn config_paths_drive_the_store() {
    let dir = TempDir::new().expect("should create temp dir");
    let config = Config::load(dir.path()).expect("defaults should load");

    fs::create_dir_all(config.corpus_dir()).expect("should create corpus dir");
    fs::write(config.corpus_dir().join("A.txt"), "The cat sleeps.").expect("should write");

    let store = IndexStore::new(config.index_path());
    let engine = RetrievalEngine::open(
        KeywordEmbedder::new(),
        &store,
        &config.corpus_dir(),
        &config.chunking,
    )
    .expect("engine should open");

    let results = engine
        .search("cat", config.retrieval.top_k, config.retrieval.max_characters)
        .expect("search should succeed");
    assert_eq!(results, vec!["The cat sleeps."]);
    assert!(Path::new(&config.index_path()).exists());
}
