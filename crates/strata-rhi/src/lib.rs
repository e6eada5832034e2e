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

//! # Strata RHI
//!
//! Deferred command recording and execution. Callers record graphics and
//! compute work into command lists; the [`CommandListExecutor`] replays them in
//! order against a back-end context, inline or on a dedicated execution thread,
//! optionally translating batches of lists in parallel.

#![warn(missing_docs)]

mod command;
pub mod error;
pub mod executor;
pub mod immediate;
pub mod list;
pub mod prelude;
pub mod registry;
pub mod stats;

mod dispatch;
mod pool;
mod recorded;
mod thread;
mod translate;

pub use error::ExecutorError;
pub use executor::CommandListExecutor;
pub use immediate::{
    BufferLock, ImmediateAsyncComputeCommandList, ImmediateCommandList, ImmediateFlushType,
    RhiThreadStall,
};
pub use list::{
    AsyncCommandList, CommandList, CommandListBase, ComputeCommandList, ComputeCommands,
    GraphicsCommands, ListKind, ListState, LocalUniformBuffer, PendingCommandList,
};
pub use registry::ListRegistry;
pub use stats::ExecutorStats;
