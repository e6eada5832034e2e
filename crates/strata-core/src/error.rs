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

//! Error types for the core crate.

use std::fmt;

/// An error raised while loading or validating an [`crate::ExecutorConfig`].
#[derive(Debug)]
pub enum ConfigError {
    /// The configuration source could not be parsed.
    Parse {
        /// The underlying parser message.
        source_error: String,
    },
    /// A field holds a value the executor cannot run with.
    InvalidValue {
        /// The offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: String,
    },
    /// An environment override holds a value that is not a boolean.
    InvalidOverride {
        /// The environment variable.
        variable: &'static str,
        /// The rejected value.
        value: String,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse { source_error } => {
                write!(f, "Failed to parse executor configuration: {source_error}")
            }
            ConfigError::InvalidValue { field, reason } => {
                write!(f, "Invalid value for '{field}': {reason}")
            }
            ConfigError::InvalidOverride { variable, value } => {
                write!(
                    f,
                    "Environment override {variable}='{value}' is not a boolean"
                )
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<serde_json::Error> for ConfigError {
    fn from(err: serde_json::Error) -> Self {
        ConfigError::Parse {
            source_error: err.to_string(),
        }
    }
}
