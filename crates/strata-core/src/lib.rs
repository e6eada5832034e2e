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

//! # Strata Core
//!
//! Foundational crate containing resource ids, the back-end context contracts,
//! configuration, the command arena and the synchronisation primitives shared
//! by the command-list runtime and the back ends.

#![warn(missing_docs)]

pub mod api;
pub mod arena;
pub mod config;
pub mod context;
pub mod debug;
pub mod error;
pub mod fence;
pub mod lock;
pub mod sync;

pub use config::{
    ArenaConfig, ExecutorConfig, FrameFlags, ParallelTranslateConfig, TranslateOrdering,
};
pub use context::{
    CommandContext, ComputeContext, ContextContainer, ParallelContextProvider,
    SharedCommandContext, SharedComputeContext,
};
pub use error::ConfigError;
pub use sync::CompletionEvent;
