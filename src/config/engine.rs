//! Engine-wide configuration

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;

use crate::core::ConfigError;

use super::channel::{ChannelConfig, ChannelSemantics};

/// Default channel configuration plus per-channel overrides
#[derive(Debug, Clone)]
pub struct EngineConfig<K> {
    /// Configuration for channels without an override
    pub default_channel: ChannelConfig,
    /// Per-channel overrides
    pub channels: HashMap<K, ChannelConfig>,
}

impl<K> Default for EngineConfig<K> {
    fn default() -> Self {
        Self {
            default_channel: ChannelConfig::default(),
            channels: HashMap::new(),
        }
    }
}

impl<K: Eq + Hash> EngineConfig<K> {
    /// Configuration that applies to a channel
    pub fn channel(&self, channel: &K) -> ChannelConfig {
        self.channels
            .get(channel)
            .copied()
            .unwrap_or(self.default_channel)
    }

    /// Check every channel config against engine limits
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.default_channel.validate()?;
        self.channels.values().try_for_each(ChannelConfig::validate)
    }
}

/// Builder for creating an [`EngineConfig`]
#[derive(Debug)]
pub struct EngineConfigBuilder<K> {
    config: EngineConfig<K>,
}

impl<K: Eq + Hash> EngineConfigBuilder<K> {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
        }
    }

    /// Set the default coalesce window
    pub fn coalesce_window(mut self, window: Duration) -> Self {
        self.config.default_channel = self.config.default_channel.with_coalesce_window(window);
        self
    }

    /// Set the default channel semantics
    pub fn semantics(mut self, semantics: ChannelSemantics) -> Self {
        self.config.default_channel = self.config.default_channel.with_semantics(semantics);
        self
    }

    /// Override the configuration of one channel
    pub fn channel(mut self, channel: K, config: ChannelConfig) -> Self {
        self.config.channels.insert(channel, config);
        self
    }

    /// Validate and build the configuration
    pub fn build(self) -> Result<EngineConfig<K>, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl<K: Eq + Hash> Default for EngineConfigBuilder<K> {
    fn default() -> Self {
        Self::new()
    }
}
