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

//! Integration tests for the concrete back ends driven by a real executor.

use strata_core::api::{BufferId, LockMode, ShaderStage, UniformLayoutId};
use strata_core::ExecutorConfig;
use strata_infra::{BackendCall, CallLog, LoggingContext, NullContext, RecordingContext};
use strata_rhi::{CommandListExecutor, ComputeCommands, GraphicsCommands, ImmediateFlushType};

#[test]
fn test_logging_context_forwards_every_call() -> anyhow::Result<()> {
    strata_infra::init_test_logging();
    let log = CallLog::new();
    let context = LoggingContext::new("main", Box::new(RecordingContext::new(log.clone())));
    let mut executor =
        CommandListExecutor::new(ExecutorConfig::default(), Box::new(context), None)?;

    let mut list = executor.create_command_list();
    list.push_event("Shadows", 0);
    let uniforms = list.build_local_uniform_buffer(UniformLayoutId(1), &[1; 4]);
    list.set_local_uniform_buffer(ShaderStage::Vertex, 0, &uniforms);
    list.draw_primitive(0, 12, 1);
    list.pop_event();
    executor.execute_list(list);

    let immediate = executor.immediate();
    immediate.update_buffer(BufferId(5), 0, &[4, 3, 2, 1]);
    let lock = immediate.lock_buffer(BufferId(5), 0, 4, LockMode::ReadOnly);
    assert_eq!(lock.data(), &[4, 3, 2, 1]);
    immediate.unlock_buffer(lock);

    assert_eq!(
        log.names(),
        vec![
            "PushEvent",
            "CreateUniformBuffer",
            "SetUniformBuffer",
            "DrawPrimitive",
            "PopEvent",
            "UpdateBuffer",
            "ReadBuffer",
        ]
    );
    Ok(())
}

#[test]
fn test_recording_contexts_share_one_log() {
    let log = CallLog::new();
    let mut executor = CommandListExecutor::new(
        ExecutorConfig::inline(),
        Box::new(RecordingContext::new(log.clone())),
        Some(Box::new(RecordingContext::with_label("compute", log.clone()))),
    )
    .unwrap();

    executor.immediate().draw_primitive(0, 1, 1);
    let mut compute = executor.create_compute_command_list();
    compute.dispatch_compute(2, 1, 1);
    executor.execute_compute_list(compute);
    executor
        .immediate()
        .immediate_flush(ImmediateFlushType::FlushRhiThread);

    let entries = log.entries();
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].context, "graphics");
    assert_eq!(entries[1].context, "compute");
    assert_eq!(entries[1].call, BackendCall::DispatchCompute { x: 2, y: 1, z: 1 });
    assert_eq!(log.calls_for("compute").len(), 1);

    log.clear();
    assert!(log.is_empty());
}

#[test]
fn test_null_context_runs_a_threaded_executor() {
    let mut executor =
        CommandListExecutor::new(ExecutorConfig::default(), Box::new(NullContext::default()), None)
            .unwrap();
    let mut list = executor.create_command_list();
    for i in 0..256 {
        list.draw_primitive(i, 1, 1);
    }
    executor.execute_list(list);
    executor.wait_for_rhi_thread_tasks();
    assert_eq!(executor.stats().commands_executed, 256);
}
