//! AI model weight loading.
//!
//! The engine consumes four model blobs, each identified by a fixed name
//! and stored under a fixed file name in the resource directory. Blobs are
//! read once into immutable reference-counted buffers and shared by every
//! processor created from the same service.

use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use std::sync::Arc;

/// The four model slots understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelKind {
    /// Standard-latency AI noise suppression.
    Ains,
    /// Low-latency AI noise suppression.
    AinsLowLatency,
    /// Standard-latency AI echo cancellation.
    Ainlp,
    /// Low-latency AI echo cancellation.
    AinlpLowLatency,
}

impl ModelKind {
    /// All slots, in the order they are pushed to the engine.
    pub const ALL: [Self; 4] = [
        Self::Ains,
        Self::AinsLowLatency,
        Self::Ainlp,
        Self::AinlpLowLatency,
    ];

    /// The model name the engine expects.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ains => "ains",
            Self::AinsLowLatency => "ains_ll",
            Self::Ainlp => "ainlp",
            Self::AinlpLowLatency => "ainlp_ll",
        }
    }

    /// File name of the weights inside the resource directory.
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Ains => "CLDNNWeights.bin",
            Self::AinsLowLatency => "CLDNNLLWeights.bin",
            Self::Ainlp => "YNetWeights.bin",
            Self::AinlpLowLatency => "YNetLLWeights.bin",
        }
    }

    const fn index(self) -> usize {
        match self {
            Self::Ains => 0,
            Self::AinsLowLatency => 1,
            Self::Ainlp => 2,
            Self::AinlpLowLatency => 3,
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A loaded model blob.
#[derive(derive_more::Debug, Clone, PartialEq, Eq)]
pub struct ModelResource {
    kind: ModelKind,
    #[debug("{} bytes", data.len())]
    data: Arc<[u8]>,
}

impl ModelResource {
    pub fn new(kind: ModelKind, data: Arc<[u8]>) -> Self {
        Self { kind, data }
    }

    /// Reads the weights for `kind` from `dir`.
    pub fn load(kind: ModelKind, dir: &Path) -> io::Result<Self> {
        let data = fs::read(dir.join(kind.file_name()))?;
        Ok(Self::new(kind, data.into()))
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn name(&self) -> &'static str {
        self.kind.name()
    }

    pub fn data(&self) -> &Arc<[u8]> {
        &self.data
    }

    /// Size of the blob in bytes.
    pub fn size(&self) -> usize {
        self.data.len()
    }

    /// Engine-side description of this blob.
    pub fn to_resource_config(&self) -> AiModelResourceConfig {
        AiModelResourceConfig {
            model_name: Some(self.name()),
            model_data: Some(Arc::clone(&self.data)),
            model_data_size: Some(self.size()),
        }
    }
}

/// Model description handed to the engine.
///
/// A config with every field unset stands for a slot that was never
/// loaded; the engine treats it as absent.
#[derive(derive_more::Debug, Clone, Default, PartialEq, Eq)]
pub struct AiModelResourceConfig {
    pub model_name: Option<&'static str>,
    #[debug(skip)]
    pub model_data: Option<Arc<[u8]>>,
    pub model_data_size: Option<usize>,
}

impl AiModelResourceConfig {
    pub fn is_empty(&self) -> bool {
        self.model_name.is_none() && self.model_data.is_none() && self.model_data_size.is_none()
    }
}

/// The four model slots of a service. Missing files leave their slot empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelSet {
    slots: [Option<ModelResource>; 4],
}

impl ModelSet {
    /// Loads every model found in `dir`.
    ///
    /// Missing or unreadable files are logged and skipped; the engine then
    /// runs without that model.
    pub fn load_from_dir(dir: &Path) -> Self {
        let mut set = Self::default();
        for kind in ModelKind::ALL {
            match ModelResource::load(kind, dir) {
                Ok(resource) => {
                    tracing::info!(model = %kind, bytes = resource.size(), "loaded model");
                    set.insert(resource);
                }
                Err(err) => {
                    tracing::warn!(
                        model = %kind,
                        path = %dir.join(kind.file_name()).display(),
                        %err,
                        "model not loaded"
                    );
                }
            }
        }
        set
    }

    /// Stores `resource` in its slot, replacing any previous blob.
    pub fn insert(&mut self, resource: ModelResource) {
        let index = resource.kind().index();
        self.slots[index] = Some(resource);
    }

    pub fn get(&self, kind: ModelKind) -> Option<&ModelResource> {
        self.slots[kind.index()].as_ref()
    }

    /// Number of slots holding a blob.
    pub fn loaded_count(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// One engine config per slot in [`ModelKind::ALL`] order, empty for
    /// slots that were not loaded.
    pub fn resource_configs(&self) -> [AiModelResourceConfig; 4] {
        ModelKind::ALL.map(|kind| {
            self.get(kind)
                .map(ModelResource::to_resource_config)
                .unwrap_or_default()
        })
    }
}
