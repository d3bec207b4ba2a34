use anyhow::{Context, Result};
use std::sync::Arc;

use super::App;
use crate::{
    config::{Config, EmbeddingBackend},
    providers::{
        DocumentExtractor, FileExtractor, LanguageModel, OpenAiChat, OpenAiClient, OpenAiWhisper,
        Transcriber,
    },
    semantic::{self, EmbeddingProvider, LocalEmbeddings, OpenAiEmbeddings},
};

/// External collaborators the application talks to.
#[derive(Clone)]
pub struct Providers {
    pub embedder: Arc<dyn EmbeddingProvider>,
    pub llm: Arc<dyn LanguageModel>,
    pub transcriber: Arc<dyn Transcriber>,
    pub extractor: Arc<dyn DocumentExtractor>,
}

/// Builds configuration and providers for the binary.
pub struct AppFactory;

impl AppFactory {
    /// Load (creating on first run) the config from the default base path.
    pub fn load_config() -> Result<Config> {
        let base_path = Config::default_base_path()?;
        Config::load_with(&base_path)
            .with_context(|| format!("failed to load config from {}", base_path.display()))
    }

    /// Wire up an application around providers built from `config`.
    ///
    /// Loading a local embedding model blocks (and may download), so call
    /// this before the async runtime starts.
    pub fn create_app(config: &Config) -> Result<App> {
        let providers = Self::create_providers(config)?;
        Ok(App::new(config, providers))
    }

    pub fn create_providers(config: &Config) -> Result<Providers> {
        let api_key = config.api_key().with_context(|| {
            format!(
                "no API key found, set the {} environment variable",
                config.api_key_env
            )
        })?;

        let client = |base_url: &Option<String>| OpenAiClient::new(api_key.clone(), base_url.as_deref());

        let llm = OpenAiChat::new(
            client(&config.completion.base_url),
            &config.completion.model,
            config.completion.temperature,
            config.completion.max_tokens,
        );
        let transcriber = OpenAiWhisper::new(
            client(&config.transcription.base_url),
            &config.transcription.model,
        );

        let embeddings = &config.embeddings;
        let embedder: Arc<dyn EmbeddingProvider> = match embeddings.provider {
            EmbeddingBackend::OpenAi => Arc::new(
                OpenAiEmbeddings::new(client(&embeddings.base_url))
                    .with_model(embeddings.model.clone(), embeddings.dimensions),
            ),
            EmbeddingBackend::Local => {
                // the default model name belongs to the hosted provider
                let model = if embeddings.model == semantic::openai::DEFAULT_MODEL {
                    semantic::DEFAULT_LOCAL_MODEL
                } else {
                    embeddings.model.as_str()
                };
                log::info!("loading local embedding model {model}");
                Arc::new(
                    LocalEmbeddings::new(model, config.base_path().to_path_buf())
                        .with_context(|| format!("failed to load embedding model {model}"))?,
                )
            }
        };

        log::info!(
            "embeddings: {} ({} dims), completion: {}, transcription: {}",
            embedder.model_name(),
            embedder.dimensions(),
            config.completion.model,
            config.transcription.model
        );

        Ok(Providers {
            embedder,
            llm: Arc::new(llm),
            transcriber: Arc::new(transcriber),
            extractor: Arc::new(FileExtractor),
        })
    }
}
