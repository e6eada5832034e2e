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

//! Errors surfaced by the executor's fallible operations.

use strata_core::ConfigError;
use thiserror::Error;

/// An error raised while creating or reconfiguring a [`crate::CommandListExecutor`].
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The configuration was rejected.
    #[error("invalid executor configuration: {0}")]
    Config(#[from] ConfigError),

    /// A worker or execution thread could not be started.
    #[error("failed to spawn thread '{name}'")]
    ThreadSpawn {
        /// The thread's name.
        name: String,
        /// The OS error.
        #[source]
        source: std::io::Error,
    },
}
