// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Executor configuration and the per-frame flag snapshot derived from it.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};

/// Environment variable forcing bypass mode on or off.
pub const ENV_BYPASS: &str = "STRATA_RHI_BYPASS";
/// Environment variable enabling or disabling the execution thread.
pub const ENV_USE_THREAD: &str = "STRATA_RHI_USE_THREAD";
/// Environment variable enabling or disabling parallel algorithms.
pub const ENV_PARALLEL: &str = "STRATA_RHI_PARALLEL";

/// How translate batches of one parallel submission relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TranslateOrdering {
    /// Batches translate concurrently. Submission is still in order.
    #[default]
    Independent,
    /// Batch `n` starts translating only once batch `n - 1` has finished.
    Chained,
    /// Batches translate one after the other on the recording thread.
    Serial,
}

/// Parallel translate tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelTranslateConfig {
    /// Number of translate worker threads. Zero translates on the recording thread.
    pub worker_threads: usize,
    /// Below this many batches, lists are submitted one by one instead.
    pub min_lists_for_parallel_translate: usize,
    /// Small lists are merged into one batch until it holds this many commands.
    pub min_commands_per_translate: usize,
    /// Whether small lists are merged at all.
    pub merge_small_lists: bool,
    /// Ordering policy between batches.
    pub ordering: TranslateOrdering,
}

impl Default for ParallelTranslateConfig {
    fn default() -> Self {
        Self {
            worker_threads: 2,
            min_lists_for_parallel_translate: 2,
            min_commands_per_translate: 32,
            merge_small_lists: true,
            ordering: TranslateOrdering::Independent,
        }
    }
}

/// Command arena sizing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArenaConfig {
    /// Size of one arena chunk in bytes.
    pub chunk_size: usize,
    /// Hard limit of bytes one list may allocate before recording is fatal.
    pub max_bytes: usize,
    /// Number of reset arenas kept for reuse.
    pub pooled_arenas: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            chunk_size: 64 * 1024,
            max_bytes: 256 * 1024 * 1024,
            pooled_arenas: 16,
        }
    }
}

/// Configuration of a command list executor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Execute every call directly instead of recording it.
    pub bypass: bool,
    /// Allow parallel translation of sub-lists.
    pub use_parallel_algorithms: bool,
    /// Replay dispatched lists on a dedicated execution thread.
    pub use_rhi_thread: bool,
    /// Wait for the execution thread after every dispatch.
    pub force_rhi_flush: bool,
    /// Flush the execution thread after every parallel submission.
    pub flush_on_queue_parallel_submit: bool,
    /// Parallel translate tuning.
    pub parallel_translate: ParallelTranslateConfig,
    /// Arena sizing.
    pub arena: ArenaConfig,
    /// Number of slots in the GPU fence ring.
    pub fence_ring_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            bypass: false,
            use_parallel_algorithms: true,
            use_rhi_thread: true,
            force_rhi_flush: false,
            flush_on_queue_parallel_submit: false,
            parallel_translate: ParallelTranslateConfig::default(),
            arena: ArenaConfig::default(),
            fence_ring_size: crate::fence::MAX_FENCE_INDICES,
        }
    }
}

impl ExecutorConfig {
    /// A configuration that executes everything inline on the calling thread.
    pub fn inline() -> Self {
        Self {
            use_rhi_thread: false,
            use_parallel_algorithms: false,
            ..Default::default()
        }
    }

    /// Parses a configuration from JSON. Missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serializes the configuration to pretty-printed JSON.
    pub fn to_json_string(&self) -> Result<String, ConfigError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks that the executor can run with this configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.arena.chunk_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "arena.chunk_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.arena.max_bytes < self.arena.chunk_size {
            return Err(ConfigError::InvalidValue {
                field: "arena.max_bytes",
                reason: format!(
                    "{} is smaller than one chunk ({} bytes)",
                    self.arena.max_bytes, self.arena.chunk_size
                ),
            });
        }
        if self.fence_ring_size == 0 {
            return Err(ConfigError::InvalidValue {
                field: "fence_ring_size",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.parallel_translate.min_lists_for_parallel_translate == 0 {
            return Err(ConfigError::InvalidValue {
                field: "parallel_translate.min_lists_for_parallel_translate",
                reason: "must be at least 1".to_string(),
            });
        }
        Ok(())
    }

    /// Applies the `STRATA_RHI_*` environment overrides.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        self.apply_overrides_from(|name| std::env::var(name).ok())
    }

    /// Applies overrides looked up through `lookup` instead of the process environment.
    pub fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let targets: [(&'static str, &mut bool); 3] = [
            (ENV_BYPASS, &mut self.bypass),
            (ENV_USE_THREAD, &mut self.use_rhi_thread),
            (ENV_PARALLEL, &mut self.use_parallel_algorithms),
        ];
        for (variable, flag) in targets {
            if let Some(value) = lookup(variable) {
                *flag = parse_bool(variable, &value)?;
                log::debug!("Config override {variable}={}", *flag);
            }
        }
        Ok(())
    }
}

fn parse_bool(variable: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "on" | "yes" => Ok(true),
        "0" | "false" | "off" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            variable,
            value: value.to_string(),
        }),
    }
}

/// The flags a frame records with, latched once per frame from the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FrameFlags {
    /// Calls go straight to the back end.
    pub bypass: bool,
    /// Parallel translation is allowed. Never set together with `bypass`.
    pub use_parallel_algorithms: bool,
    /// Dispatched lists replay on the execution thread. Never set together with `bypass`.
    pub use_rhi_thread: bool,
}

impl FrameFlags {
    /// Derives the snapshot for the next frame.
    pub fn latch(config: &ExecutorConfig) -> Self {
        let bypass = config.bypass;
        Self {
            bypass,
            use_parallel_algorithms: !bypass && config.use_parallel_algorithms,
            use_rhi_thread: !bypass && config.use_rhi_thread,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config_is_valid() {
        let config = ExecutorConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.fence_ring_size, 4096);
        assert_eq!(config.parallel_translate.min_lists_for_parallel_translate, 2);
    }

    #[test]
    fn test_partial_json_keeps_defaults() -> anyhow::Result<()> {
        let config = ExecutorConfig::from_json_str(
            r#"{ "bypass": true, "parallel_translate": { "ordering": "chained" } }"#,
        )?;
        assert!(config.bypass);
        assert!(config.use_rhi_thread);
        assert_eq!(config.parallel_translate.ordering, TranslateOrdering::Chained);
        assert_eq!(config.parallel_translate.worker_threads, 2);
        Ok(())
    }

    #[test]
    fn test_json_round_trip_preserves_values() -> anyhow::Result<()> {
        let mut config = ExecutorConfig::inline();
        config.fence_ring_size = 64;
        let parsed = ExecutorConfig::from_json_str(&config.to_json_string()?)?;
        assert_eq!(parsed, config);
        Ok(())
    }

    #[test]
    fn test_malformed_json_is_a_parse_error() {
        let err = ExecutorConfig::from_json_str("{ bypass: ").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let err = ExecutorConfig::from_json_str(r#"{ "fence_ring_size": 0 }"#).unwrap_err();
        assert!(err.to_string().contains("fence_ring_size"));

        let err = ExecutorConfig::from_json_str(
            r#"{ "arena": { "chunk_size": 1024, "max_bytes": 512 } }"#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidValue {
                field: "arena.max_bytes",
                ..
            }
        ));
    }

    #[test]
    fn test_env_overrides() {
        let env: HashMap<&str, &str> = [(ENV_BYPASS, "1"), (ENV_PARALLEL, "off")].into();
        let mut config = ExecutorConfig::default();
        config
            .apply_overrides_from(|name| env.get(name).map(|v| v.to_string()))
            .unwrap();
        assert!(config.bypass);
        assert!(!config.use_parallel_algorithms);
        assert!(config.use_rhi_thread);
    }

    #[test]
    fn test_env_override_rejects_garbage() {
        let mut config = ExecutorConfig::default();
        let err = config
            .apply_overrides_from(|name| (name == ENV_USE_THREAD).then(|| "maybe".to_string()))
            .unwrap_err();
        assert!(matches!(
            err,
            ConfigError::InvalidOverride {
                variable: ENV_USE_THREAD,
                ..
            }
        ));
    }

    #[test]
    fn test_bypass_disables_parallel_and_thread() {
        let config = ExecutorConfig {
            bypass: true,
            ..Default::default()
        };
        let flags = FrameFlags::latch(&config);
        assert!(flags.bypass);
        assert!(!flags.use_parallel_algorithms);
        assert!(!flags.use_rhi_thread);

        let flags = FrameFlags::latch(&ExecutorConfig::default());
        assert!(!flags.bypass && flags.use_parallel_algorithms && flags.use_rhi_thread);
    }
}
