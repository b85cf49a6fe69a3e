//! Configuration: compiled defaults, layered with an optional TOML file,
//! then with `IGNIS_`-prefixed environment variables.
//!
//! Layering order (later wins): [`LoggerConfig::default`] → TOML file →
//! environment. Every recognized option round-trips through a plain string
//! so the environment layer and the TOML layer can share one parser per
//! field.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::constants::{DEFAULT_BATCH_SIZE, DEFAULT_CAPACITY, ENV_PREFIX};
use crate::error::{Error, Result};
use crate::idle::IdleStrategyKind;
use crate::record::Level;
use crate::ring::BackpressurePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Architecture {
    Single,
    Sharded,
}

impl Architecture {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "single_ring" | "single" => Some(Self::Single),
            "sharded" => Some(Self::Sharded),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncoderKind {
    Json,
    Text,
    Binary,
}

impl EncoderKind {
    pub fn parse(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "text" => Some(Self::Text),
            "binary" => Some(Self::Binary),
            _ => None,
        }
    }
}

/// The on-disk/on-the-wire shape of a logger's configuration. Every field
/// is optional so a partial TOML file only overrides what it names.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    pub level: Option<String>,
    pub output: Option<String>,
    pub encoder: Option<String>,
    pub capacity: Option<usize>,
    pub batch_size: Option<usize>,
    pub backpressure_policy: Option<String>,
    pub architecture: Option<String>,
    pub num_rings: Option<usize>,
    pub idle_strategy: Option<String>,
    pub enable_caller: Option<bool>,
    pub enable_stack_trace: Option<bool>,
    pub sampler: Option<String>,
    pub name: Option<String>,
}

/// Fully resolved, validated configuration for one logger instance.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub level: Level,
    pub output: String,
    pub encoder: EncoderKind,
    pub capacity: usize,
    pub batch_size: usize,
    pub backpressure_policy: BackpressurePolicy,
    pub architecture: Architecture,
    pub num_rings: usize,
    pub idle_strategy: IdleStrategyKind,
    pub enable_caller: bool,
    pub enable_stack_trace: bool,
    pub sampler: Option<String>,
    pub name: String,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: Level::Info,
            output: "stdout".to_string(),
            encoder: EncoderKind::Json,
            capacity: DEFAULT_CAPACITY,
            batch_size: DEFAULT_BATCH_SIZE,
            backpressure_policy: BackpressurePolicy::DropOnFull,
            architecture: Architecture::Single,
            num_rings: 4,
            idle_strategy: IdleStrategyKind::Progressive,
            enable_caller: false,
            enable_stack_trace: false,
            sampler: None,
            name: "root".to_string(),
        }
    }
}

impl LoggerConfig {
    /// Loads defaults, layers an optional TOML file, then environment
    /// overrides, validating the result.
    pub fn load(toml_path: Option<&Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Some(path) = toml_path {
            let contents = std::fs::read_to_string(path)?;
            let file: ConfigFile = toml::from_str(&contents)
                .map_err(|e| Error::config(format!("invalid TOML at {}: {e}", path.display())))?;
            config.apply_file(file)?;
        }
        config.apply_env(std::env::vars())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file_str(contents: &str) -> Result<Self> {
        let mut config = Self::default();
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| Error::config(format!("invalid TOML: {e}")))?;
        config.apply_file(file)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_file(&mut self, file: ConfigFile) -> Result<()> {
        if let Some(v) = file.level {
            self.level = Level::parse(&v).ok_or_else(|| Error::config(format!("unknown level {v}")))?;
        }
        if let Some(v) = file.output {
            self.output = v;
        }
        if let Some(v) = file.encoder {
            self.encoder =
                EncoderKind::parse(&v).ok_or_else(|| Error::config(format!("unknown encoder {v}")))?;
        }
        if let Some(v) = file.capacity {
            self.capacity = v;
        }
        if let Some(v) = file.batch_size {
            self.batch_size = v;
        }
        if let Some(v) = file.backpressure_policy {
            self.backpressure_policy = BackpressurePolicy::parse(&v)
                .ok_or_else(|| Error::config(format!("unknown backpressure_policy {v}")))?;
        }
        if let Some(v) = file.architecture {
            self.architecture =
                Architecture::parse(&v).ok_or_else(|| Error::config(format!("unknown architecture {v}")))?;
        }
        if let Some(v) = file.num_rings {
            self.num_rings = v;
        }
        if let Some(v) = file.idle_strategy {
            self.idle_strategy = IdleStrategyKind::parse(&v)
                .ok_or_else(|| Error::config(format!("unknown idle_strategy {v}")))?;
        }
        if let Some(v) = file.enable_caller {
            self.enable_caller = v;
        }
        if let Some(v) = file.enable_stack_trace {
            self.enable_stack_trace = v;
        }
        if let Some(v) = file.sampler {
            self.sampler = Some(v);
        }
        if let Some(v) = file.name {
            self.name = v;
        }
        Ok(())
    }

    fn apply_env<I: IntoIterator<Item = (String, String)>>(&mut self, vars: I) -> Result<()> {
        let overrides: HashMap<String, String> = vars
            .into_iter()
            .filter_map(|(k, v)| {
                k.strip_prefix(ENV_PREFIX).map(|rest| (rest.to_ascii_lowercase(), v))
            })
            .collect();

        if let Some(v) = overrides.get("level") {
            self.level = Level::parse(v).ok_or_else(|| Error::config(format!("unknown level {v}")))?;
        }
        if let Some(v) = overrides.get("output") {
            self.output = v.clone();
        }
        if let Some(v) = overrides.get("encoder") {
            self.encoder =
                EncoderKind::parse(v).ok_or_else(|| Error::config(format!("unknown encoder {v}")))?;
        }
        if let Some(v) = overrides.get("capacity") {
            self.capacity =
                v.parse().map_err(|_| Error::config(format!("invalid capacity {v}")))?;
        }
        if let Some(v) = overrides.get("batch_size") {
            self.batch_size =
                v.parse().map_err(|_| Error::config(format!("invalid batch_size {v}")))?;
        }
        if let Some(v) = overrides.get("backpressure_policy") {
            self.backpressure_policy = BackpressurePolicy::parse(v)
                .ok_or_else(|| Error::config(format!("unknown backpressure_policy {v}")))?;
        }
        if let Some(v) = overrides.get("architecture") {
            self.architecture =
                Architecture::parse(v).ok_or_else(|| Error::config(format!("unknown architecture {v}")))?;
        }
        if let Some(v) = overrides.get("num_rings") {
            self.num_rings =
                v.parse().map_err(|_| Error::config(format!("invalid num_rings {v}")))?;
        }
        if let Some(v) = overrides.get("idle_strategy") {
            self.idle_strategy = IdleStrategyKind::parse(v)
                .ok_or_else(|| Error::config(format!("unknown idle_strategy {v}")))?;
        }
        if let Some(v) = overrides.get("enable_caller") {
            self.enable_caller =
                v.parse().map_err(|_| Error::config(format!("invalid enable_caller {v}")))?;
        }
        if let Some(v) = overrides.get("enable_stack_trace") {
            self.enable_stack_trace =
                v.parse().map_err(|_| Error::config(format!("invalid enable_stack_trace {v}")))?;
        }
        if let Some(v) = overrides.get("sampler") {
            self.sampler = Some(v.clone());
        }
        if let Some(v) = overrides.get("name") {
            self.name = v.clone();
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if !self.capacity.is_power_of_two() || self.capacity < 2 {
            return Err(Error::config(format!("capacity must be a power of two >= 2, got {}", self.capacity)));
        }
        if self.batch_size == 0 || self.batch_size > self.capacity {
            return Err(Error::config(format!(
                "batch_size must be in [1, {}], got {}",
                self.capacity, self.batch_size
            )));
        }
        if self.num_rings == 0 || !self.num_rings.is_power_of_two() {
            return Err(Error::config(format!("num_rings must be a power of two >= 1, got {}", self.num_rings)));
        }
        Ok(())
    }
}
