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

//! Logging initialisation.

use env_logger::{Builder, Env};

/// Initialises `env_logger` with an `info` default, filtered by `RUST_LOG`.
///
/// Returns `false` if a logger was already installed; calling it again is harmless.
pub fn init_logging() -> bool {
    Builder::from_env(Env::default().default_filter_or("info"))
        .try_init()
        .is_ok()
}

/// Like [`init_logging`], but captured by the test harness and defaulting to `debug`.
pub fn init_test_logging() -> bool {
    Builder::from_env(Env::default().default_filter_or("debug"))
        .is_test(true)
        .try_init()
        .is_ok()
}
