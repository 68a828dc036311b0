use std::{
    collections::BTreeMap,
    env, fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow};
use llmserve_core::{
    DecodeParameters, DecodeParametersPatch, ModelKind, PromptTemplate, runtime::DeviceKind,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::resource_resolver::ModelResources;

/// Environment variable pointing at an explicit configuration file.
pub const CONFIG_ENV: &str = "LLMSERVE_CONFIG";
pub const DEFAULT_MODEL_ID: &str = "gemma-3-1b";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub models: ModelRegistry,
    pub inference: InferenceSettings,
    pub server: ServerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelRegistry {
    pub active: String,
    pub entries: BTreeMap<String, ModelEntry>,
}

impl Default for ModelRegistry {
    fn default() -> Self {
        let mut entries = BTreeMap::new();
        ensure_default_model_entries(&mut entries);
        Self {
            active: DEFAULT_MODEL_ID.to_string(),
            entries,
        }
    }
}

fn ensure_default_model_entries(entries: &mut BTreeMap<String, ModelEntry>) {
    entries
        .entry(DEFAULT_MODEL_ID.to_string())
        .or_insert_with(gemma_3_1b_entry);
}

fn gemma_3_1b_entry() -> ModelEntry {
    ModelEntry {
        kind: Some(ModelKind::Gemma3),
        weights: Some(PathBuf::from(
            "models/gemma-3-1b/google_gemma-3-1b-it-Q4_K_M.gguf",
        )),
        tokenizer: Some(PathBuf::from("models/gemma-3-1b/tokenizer.json")),
        defaults: ModelDefaults::default(),
    }
}

/// A GGUF checkpoint the server may load.
///
/// Paths left unset resolve to `<models_dir>/<id>/model.gguf` and
/// `<models_dir>/<id>/tokenizer.json`. `kind` is read from the GGUF header
/// when absent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelEntry {
    pub kind: Option<ModelKind>,
    pub weights: Option<PathBuf>,
    pub tokenizer: Option<PathBuf>,
    pub defaults: ModelDefaults,
}

/// Inference settings a model entry layers over the global ones.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelDefaults {
    pub inference: InferenceOverride,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceSettings {
    pub device: DeviceKind,
    pub template: PromptTemplate,
    /// Upper bound on prompt plus completion tokens.
    pub context_length: usize,
    /// Stop strings added to every chat-mode request.
    pub chat_stop: Vec<String>,
    #[serde(flatten)]
    pub decode: DecodeParameters,
}

impl Default for InferenceSettings {
    fn default() -> Self {
        Self {
            device: DeviceKind::Cpu,
            template: PromptTemplate::Plain,
            context_length: 2048,
            chat_stop: vec!["<eos>".to_string(), "<|endoftext|>".to_string()],
            decode: DecodeParameters::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
    /// Maximum number of requests waiting for the inference worker.
    pub queue_capacity: usize,
    /// Model loaded in the background once the server is listening. An
    /// empty string turns warmup off.
    #[serde(serialize_with = "serialize_warmup")]
    pub warmup: Option<String>,
    pub models_dir: PathBuf,
}

fn serialize_warmup<S: serde::Serializer>(
    warmup: &Option<String>,
    serializer: S,
) -> std::result::Result<S::Ok, S::Error> {
    serializer.serialize_str(warmup.as_deref().unwrap_or_default())
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            queue_capacity: 100,
            warmup: Some(DEFAULT_MODEL_ID.to_string()),
            models_dir: PathBuf::from("models"),
        }
    }
}

/// Where the configuration was read from.
#[derive(Debug, Clone)]
pub struct ConfigDescriptor {
    pub path: PathBuf,
    /// The file did not exist and was written with defaults.
    pub created: bool,
}

impl AppConfig {
    /// Load `override_path`, `$LLMSERVE_CONFIG` or the platform default, in
    /// that order, writing defaults first when the file does not exist.
    pub fn load_or_init(override_path: Option<&Path>) -> Result<(Self, ConfigDescriptor)> {
        let path = match override_path {
            Some(path) => path.to_path_buf(),
            None => default_config_path()?,
        };
        load_physical_config(&path)
    }

    pub fn load_with_overrides(overrides: &ConfigOverrides) -> Result<(Self, ConfigDescriptor)> {
        let (mut config, descriptor) = Self::load_or_init(overrides.config_path.as_deref())?;
        config.apply_overrides(overrides);
        config.normalise();
        Ok((config, descriptor))
    }

    pub fn normalise(&mut self) {
        ensure_default_model_entries(&mut self.models.entries);
        if !self.models.entries.contains_key(&self.models.active) {
            self.models
                .entries
                .insert(self.models.active.clone(), ModelEntry::default());
        }
        self.inference.chat_stop.retain(|stop| !stop.is_empty());
        self.inference.decode.stop.retain(|stop| !stop.is_empty());
        self.server.warmup = self
            .server
            .warmup
            .take()
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty());
    }

    pub fn active_model_resources(&self) -> Result<ModelResources> {
        self.model_resources(&self.models.active)
    }

    pub fn model_resources(&self, model_id: &str) -> Result<ModelResources> {
        let entry = self
            .models
            .entries
            .get(model_id)
            .ok_or_else(|| anyhow!("model `{model_id}` not found in configuration"))?;
        Ok(ModelResources::resolve(
            model_id,
            entry,
            &self.server.models_dir,
        ))
    }

    /// Apply model selection, resource paths and server settings.
    ///
    /// Inference overrides are not folded in here; they are layered per
    /// model by [`AppConfig::effective_inference_for_model`] so that model
    /// defaults sit between the file and the command line.
    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(model_id) = overrides.model_id.as_ref() {
            self.models.active = model_id.clone();
            self.models.entries.entry(model_id.clone()).or_default();
        }

        if let Some(entry) = self.models.entries.get_mut(&self.models.active) {
            if let Some(path) = overrides.tokenizer.as_ref() {
                entry.tokenizer = Some(path.clone());
            }
            if let Some(path) = overrides.weights.as_ref() {
                entry.weights = Some(path.clone());
            }
        }

        let server = &overrides.server;
        if let Some(host) = server.host.as_ref() {
            self.server.host = host.clone();
        }
        if let Some(port) = server.port {
            self.server.port = port;
        }
        if let Some(capacity) = server.queue_capacity {
            self.server.queue_capacity = capacity;
        }
        if let Some(dir) = server.models_dir.as_ref() {
            self.server.models_dir = dir.clone();
        }
        if server.no_warmup {
            self.server.warmup = None;
        } else if let Some(model_id) = server.warmup.as_ref().or(overrides.model_id.as_ref()) {
            // An explicit `--model` also becomes the warmup target.
            self.server.warmup = Some(model_id.clone());
        }
    }

    pub fn effective_inference_for_model(
        &self,
        model_id: &str,
        base_inference: &InferenceSettings,
        runtime_overrides: &InferenceOverride,
    ) -> Result<InferenceSettings> {
        let Some(entry) = self.models.entries.get(model_id) else {
            return Err(anyhow!("requested model `{model_id}` is not available"));
        };

        let mut effective = base_inference.clone();
        // Priority: config baseline -> model defaults -> runtime args.
        effective += &entry.defaults.inference;
        effective += runtime_overrides;
        Ok(effective)
    }
}

pub fn default_config_path() -> Result<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV).filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(path));
    }
    let dir = dirs::config_dir()
        .ok_or_else(|| anyhow!("no platform config directory; set {CONFIG_ENV}"))?;
    Ok(dir.join("llmserve").join("config.toml"))
}

fn load_physical_config(path: &Path) -> Result<(AppConfig, ConfigDescriptor)> {
    let path_buf = path.to_path_buf();
    if !path.exists() {
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {}", parent.display()))?;
        }
        let mut cfg = AppConfig::default();
        cfg.normalise();
        let descriptor = ConfigDescriptor {
            path: path_buf,
            created: true,
        };
        save_config(&descriptor, &cfg)?;
        info!(path = %descriptor.path.display(), "wrote default configuration");
        return Ok((cfg, descriptor));
    }

    let contents = fs::read_to_string(&path_buf)
        .with_context(|| format!("failed to read configuration from {}", path_buf.display()))?;
    let mut cfg: AppConfig = toml::from_str(&contents)
        .with_context(|| format!("failed to parse configuration at {}", path_buf.display()))?;
    cfg.normalise();
    Ok((
        cfg,
        ConfigDescriptor {
            path: path_buf,
            created: false,
        },
    ))
}

#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub config_path: Option<PathBuf>,
    pub model_id: Option<String>,
    pub tokenizer: Option<PathBuf>,
    pub weights: Option<PathBuf>,
    pub inference: InferenceOverride,
    pub server: ServerOverride,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceOverride {
    pub device: Option<DeviceKind>,
    pub template: Option<PromptTemplate>,
    pub context_length: Option<usize>,
    pub chat_stop: Option<Vec<String>>,
    #[serde(flatten)]
    pub decode: DecodeParametersPatch,
}

impl std::ops::AddAssign<&InferenceOverride> for InferenceSettings {
    fn add_assign(&mut self, rhs: &InferenceOverride) {
        if let Some(device) = rhs.device {
            self.device = device;
        }
        if let Some(template) = rhs.template {
            self.template = template;
        }
        if let Some(context_length) = rhs.context_length.filter(|len| *len > 0) {
            self.context_length = context_length;
        }
        if let Some(chat_stop) = rhs.chat_stop.as_ref() {
            self.chat_stop = chat_stop.iter().filter(|s| !s.is_empty()).cloned().collect();
        }

        self.decode += &rhs.decode;
    }
}

#[derive(Debug, Default, Clone)]
pub struct ServerOverride {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub queue_capacity: Option<usize>,
    pub warmup: Option<String>,
    pub no_warmup: bool,
    pub models_dir: Option<PathBuf>,
}

pub fn save_config(descriptor: &ConfigDescriptor, config: &AppConfig) -> Result<()> {
    let serialized = toml::to_string_pretty(config)?;
    fs::write(&descriptor.path, serialized).with_context(|| {
        format!(
            "failed to write configuration to {}",
            descriptor.path.display()
        )
    })
}
