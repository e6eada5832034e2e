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

//! # Strata Infra
//!
//! Concrete back ends for the command-list runtime: a recording back end
//! that captures every call, a null back end and a logging decorator, plus
//! logging initialisation.

#![warn(missing_docs)]

pub mod logging;
pub mod null;
pub mod recording;
pub mod telemetry;

pub use logging::LoggingContext;
pub use null::NullContext;
pub use recording::{
    BackendCall, CallLog, RecordedCall, RecordingContainer, RecordingContext,
    RecordingParallelProvider,
};
pub use telemetry::{init_logging, init_test_logging};
