//! Synthesis configuration
//!
//! A run is described by a `pptree.toml` file or built directly. Every field
//! has a default, so an empty file is a valid configuration:
//!
//! ```toml
//! width = 16
//! start = "sklansky"
//! transforms = "BI@7,4"
//! top-module = "adder16"
//! mapping = "structural"
//!
//! [engine]
//! validate = true
//! ```

use crate::error::ConfigError;
use crate::export::{check_module_name, MappingPolicy};
use crate::topology::{Topology, MAX_WIDTH};
use crate::transform::{EngineConfig, TransformDescriptor};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Parameters of one synthesis run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SynthConfig {
    /// Operand width in bits
    pub width: usize,
    /// Starting topology name
    pub start: String,
    /// Descriptor string applied to the starting topology
    pub transforms: String,
    /// Name of the emitted module
    pub top_module: String,
    /// Cell mapping policy
    pub mapping: MappingPolicy,
    pub engine: EngineConfig,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            width: 32,
            start: Topology::RippleCarry.name().to_string(),
            transforms: String::new(),
            top_module: "adder".to_string(),
            mapping: MappingPolicy::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl SynthConfig {
    /// Load a configuration file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents =
            std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_str(&contents)
    }

    /// Parse a configuration from TOML text
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        let config: SynthConfig = toml::from_str(s).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize back to TOML
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Check field values without building anything
    ///
    /// The transform sequence is checked first, matching [`crate::synthesize`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        TransformDescriptor::parse_sequence(&self.transforms)
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        if self.width == 0 || self.width > MAX_WIDTH {
            return Err(ConfigError::Invalid(format!(
                "width {} must be between 1 and {}",
                self.width, MAX_WIDTH
            )));
        }
        self.start
            .parse::<Topology>()
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;
        check_module_name(&self.top_module).map_err(|e| ConfigError::Invalid(e.to_string()))?;
        Ok(())
    }
}
