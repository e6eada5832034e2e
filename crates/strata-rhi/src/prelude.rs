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

//! Everything needed to record and execute command lists.
//!
//! ```
//! use strata_rhi::prelude::*;
//! ```

pub use crate::executor::CommandListExecutor;
pub use crate::immediate::{
    BufferLock, ImmediateAsyncComputeCommandList, ImmediateCommandList, ImmediateFlushType,
};
pub use crate::list::{
    AsyncCommandList, CommandList, ComputeCommandList, ComputeCommands, GraphicsCommands,
    LocalUniformBuffer, PendingCommandList,
};
pub use strata_core::api::*;
pub use strata_core::{CompletionEvent, ExecutorConfig};
