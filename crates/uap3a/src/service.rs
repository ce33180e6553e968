//! Shared service context: credentials and model weights.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::ProcessorConfig;
use crate::engine::{AudioProcessingEngine, Credentials};
use crate::events::EventSink;
use crate::models::ModelSet;
use crate::processor::{Processor, ProcessorOptions};

/// Settings a [`Service`] is initialized with.
#[derive(derive_more::Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceConfig {
    pub app_id: String,
    #[debug(skip)]
    pub license: String,
    /// Directory holding the model weight files.
    pub resource_path: PathBuf,
}

impl ServiceConfig {
    pub fn new(
        app_id: impl Into<String>,
        license: impl Into<String>,
        resource_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            app_id: app_id.into(),
            license: license.into(),
            resource_path: resource_path.into(),
        }
    }

    fn credentials(&self) -> Credentials {
        Credentials {
            app_id: self.app_id.clone(),
            license: self.license.clone(),
        }
    }
}

/// Appends a trailing `/` to `path` unless it already ends with one.
///
/// An empty path becomes `/`.
pub fn normalize_resource_path(path: &Path) -> PathBuf {
    let mut text = path.to_string_lossy().into_owned();
    if !text.ends_with('/') {
        text.push('/');
    }
    PathBuf::from(text)
}

/// Initialized service: validated settings plus the loaded models.
///
/// Processors created from a service share its model buffers but do not
/// borrow the service; it can be dropped while they are still in use.
#[derive(Debug, Clone)]
pub struct Service {
    config: ServiceConfig,
    models: ModelSet,
}

impl Service {
    /// Normalizes the resource path and loads every model found there.
    ///
    /// Missing model files are logged and leave their slot empty.
    pub fn initialize(mut config: ServiceConfig) -> Self {
        config.resource_path = normalize_resource_path(&config.resource_path);
        let models = ModelSet::load_from_dir(&config.resource_path);
        tracing::info!(
            app_id = %config.app_id,
            resource_path = %config.resource_path.display(),
            models = models.loaded_count(),
            "service initialized"
        );
        Self { config, models }
    }

    /// Builds a service from models that are already in memory.
    pub fn with_models(config: ServiceConfig, models: ModelSet) -> Self {
        Self { config, models }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn models(&self) -> &ModelSet {
        &self.models
    }

    /// Brings up `engine` as a new processor.
    ///
    /// See [`Processor`] for the construction sequence. Engine failures
    /// during construction are logged, not returned.
    pub fn create_processor(
        &self,
        engine: Box<dyn AudioProcessingEngine>,
        events: Arc<dyn EventSink>,
        config: &ProcessorConfig,
        options: ProcessorOptions,
    ) -> Processor {
        Processor::new(
            engine,
            events,
            self.config.credentials(),
            self.models.resource_configs(),
            config,
            options,
        )
    }
}
