//! In-process stand-ins for the hosted services.

use async_trait::async_trait;
use std::{
    sync::{
        atomic::{AtomicBool, AtomicUsize, Ordering},
        Arc, Mutex,
    },
    time::Duration,
};

use crate::{
    app::{App, Providers},
    config::Config,
    providers::{FileExtractor, HistoryTurn, LanguageModel, ProviderError, Transcriber},
    semantic::{EmbeddingError, EmbeddingProvider},
};

/// Embeds by keyword: the first registered keyword contained in the text
/// picks the vector, anything else maps to `fallback`.
pub struct FakeEmbedder {
    dims: usize,
    keywords: Vec<(String, Vec<f32>)>,
    fallback: Vec<f32>,
    /// Length of the vectors actually returned, to simulate a misbehaving provider
    output_dims: usize,
    pub fail: AtomicBool,
    pub calls: AtomicUsize,
}

impl FakeEmbedder {
    pub fn new(dims: usize) -> Self {
        let mut fallback = vec![0.0; dims];
        if let Some(last) = fallback.last_mut() {
            *last = 1.0;
        }
        Self {
            dims,
            keywords: Vec::new(),
            fallback,
            output_dims: dims,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with(mut self, keyword: &str, vector: Vec<f32>) -> Self {
        assert_eq!(vector.len(), self.dims);
        self.keywords.push((keyword.to_string(), vector));
        self
    }

    pub fn failing(self) -> Self {
        self.fail.store(true, Ordering::SeqCst);
        self
    }

    pub fn returning_dims(mut self, output_dims: usize) -> Self {
        self.output_dims = output_dims;
        self
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut vector = self
            .keywords
            .iter()
            .find(|(keyword, _)| text.contains(keyword.as_str()))
            .map(|(_, v)| v.clone())
            .unwrap_or_else(|| self.fallback.clone());
        vector.resize(self.output_dims, 0.5);
        vector
    }
}

#[async_trait]
impl EmbeddingProvider for FakeEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::EmbeddingFailed("quota exceeded".into()));
        }
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn model_name(&self) -> &str {
        "fake-embedder"
    }

    fn dimensions(&self) -> usize {
        self.dims
    }
}

/// Records every prompt it is given and answers with a canned reply.
pub struct FakeLlm {
    reply: String,
    delay: Option<Duration>,
    fail: bool,
    pub prompts: Mutex<Vec<(String, Vec<HistoryTurn>)>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            delay: None,
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::replying("")
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::replying("too late")
        }
    }

    pub fn last_prompt(&self) -> (String, Vec<HistoryTurn>) {
        self.prompts
            .lock()
            .unwrap()
            .last()
            .cloned()
            .expect("model was never called")
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl LanguageModel for FakeLlm {
    async fn complete(&self, system: &str, history: &[HistoryTurn]) -> Result<String, ProviderError> {
        self.prompts
            .lock()
            .unwrap()
            .push((system.to_string(), history.to_vec()));

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail {
            return Err(ProviderError::Other("model overloaded".into()));
        }
        Ok(self.reply.clone())
    }
}

pub struct FakeTranscriber {
    pub text: String,
}

#[async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, _audio: Vec<u8>, _filename: &str) -> Result<String, ProviderError> {
        Ok(self.text.clone())
    }
}

pub struct TestApp {
    pub app: Arc<App>,
    pub embedder: Arc<FakeEmbedder>,
    pub llm: Arc<FakeLlm>,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.external_timeout_secs = 5;
    config.chunking.chunk_size = 10;
    config.chunking.overlap = 2;
    config
}

pub fn test_app_with(
    config: &Config,
    embedder: FakeEmbedder,
    llm: FakeLlm,
    transcript: &str,
) -> TestApp {
    let embedder = Arc::new(embedder);
    let llm = Arc::new(llm);
    let providers = Providers {
        embedder: embedder.clone(),
        llm: llm.clone(),
        transcriber: Arc::new(FakeTranscriber {
            text: transcript.to_string(),
        }),
        extractor: Arc::new(FileExtractor),
    };

    TestApp {
        app: Arc::new(App::new(config, providers)),
        embedder,
        llm,
    }
}

pub fn test_app(embedder: FakeEmbedder, llm: FakeLlm) -> TestApp {
    test_app_with(&test_config(), embedder, llm, "")
}
