//! Application wiring: the shared registry plus the components that write to
//! and read from it.

pub mod errors;
pub mod factory;
pub mod guard;

use std::sync::Arc;

pub use errors::{AppError, Service};
pub use factory::{AppFactory, Providers};
pub use guard::ExternalCalls;

use crate::{
    assistant::Assistant, config::Config, eid::Eid, ingest::Ingestor, registry::SessionRegistry,
    session::Session,
};

pub const DEFAULT_SESSION_NAME: &str = "Untitled Session";
pub const DEFAULT_CLASS_NAME: &str = "General";

pub struct App {
    registry: Arc<SessionRegistry>,
    pub ingest: Ingestor,
    pub assistant: Assistant,
}

impl App {
    pub fn new(config: &Config, providers: Providers) -> Self {
        let registry = Arc::new(SessionRegistry::new());
        let calls = ExternalCalls::new(config.external_timeout());

        let ingest = Ingestor::new(
            Arc::clone(&registry),
            Arc::clone(&providers.embedder),
            providers.transcriber,
            providers.extractor,
            config.chunking.clone(),
            calls.clone(),
        );
        let assistant = Assistant::new(
            Arc::clone(&registry),
            providers.embedder,
            providers.llm,
            config.retrieval.clone(),
            calls,
        );

        Self {
            registry,
            ingest,
            assistant,
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Create a session with a fresh id. Blank names fall back to defaults.
    pub fn create_session(
        &self,
        name: Option<&str>,
        class_name: Option<&str>,
    ) -> Result<Session, AppError> {
        let pick = |value: Option<&str>, default: &'static str| {
            value
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        self.registry.create_session(
            Eid::new(),
            &pick(name, DEFAULT_SESSION_NAME),
            &pick(class_name, DEFAULT_CLASS_NAME),
        )
    }
}
