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

//! Integration tests for list lifetimes, frame pacing, fences, buffer locks
//! and the execution thread's control surface.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use strata_infra::{BackendCall, CallLog, RecordingContext};
use strata_rhi::prelude::*;
use strata_rhi::ListRegistry;
use strata_rhi::{ExecutorError, ListState};

fn recording_executor(config: ExecutorConfig) -> (CommandListExecutor, CallLog) {
    strata_infra::init_test_logging();
    let log = CallLog::new();
    let context = RecordingContext::new(log.clone());
    let executor =
        CommandListExecutor::new(config, Box::new(context), None).expect("executor starts");
    (executor, log)
}

fn threaded() -> ExecutorConfig {
    ExecutorConfig {
        use_parallel_algorithms: false,
        ..Default::default()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// List lifecycle
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_list_executes_in_place_and_resets() {
    let registry = ListRegistry::new(Default::default());
    let log = CallLog::new();
    let mut context = RecordingContext::new(log.clone());

    let mut list = CommandList::new(&registry);
    list.draw_primitive(0, 2, 1);
    let first_uid = list.uid();
    list.execute_on(&mut context);
    assert_eq!(list.state(), ListState::Executed);

    list.reset();
    assert_eq!(list.state(), ListState::Recording);
    assert_ne!(list.uid(), first_uid);
    assert_eq!(list.num_commands(), 0);

    list.draw_primitive(1, 2, 1);
    list.execute_on(&mut context);
    assert_eq!(log.names(), vec!["DrawPrimitive", "DrawPrimitive"]);
}

#[test]
#[should_panic(expected = "executed twice without an intervening reset")]
fn test_executing_a_list_twice_panics() {
    let registry = ListRegistry::new(Default::default());
    let mut context = RecordingContext::new(CallLog::new());
    let mut list = CommandList::new(&registry);
    list.draw_primitive(0, 1, 1);
    list.execute_on(&mut context);
    list.execute_on(&mut context);
}

#[test]
#[should_panic(expected = "not by command list")]
fn test_uniform_buffer_from_another_list_panics() {
    let (executor, _log) = recording_executor(ExecutorConfig::inline());
    let mut first = executor.create_command_list();
    let mut second = executor.create_command_list();
    let uniforms = first.build_local_uniform_buffer(UniformLayoutId(1), &[0; 16]);
    second.set_local_uniform_buffer(ShaderStage::Pixel, 0, &uniforms);
}

#[test]
fn test_local_uniform_buffer_is_created_at_replay() {
    let (mut executor, log) = recording_executor(threaded());
    let mut list = executor.create_command_list();
    let uniforms = list.build_local_uniform_buffer(UniformLayoutId(2), &[9; 8]);
    list.set_local_uniform_buffer(ShaderStage::Vertex, 3, &uniforms);
    assert!(log.is_empty());

    executor.execute_list(list);
    executor.wait_for_rhi_thread_tasks();

    let calls = log.calls();
    let BackendCall::CreateUniformBuffer { layout, contents, buffer } = &calls[0] else {
        panic!("expected a uniform buffer creation, got {:?}", calls[0]);
    };
    assert_eq!(*layout, UniformLayoutId(2));
    assert_eq!(contents, &vec![9; 8]);
    assert_eq!(
        calls[1],
        BackendCall::SetUniformBuffer {
            stage: ShaderStage::Vertex,
            base_index: 3,
            buffer: *buffer,
        }
    );
}

#[test]
#[should_panic(expected = "not by command list")]
fn test_bypass_uniform_buffer_expires_at_flush() {
    let (mut executor, _log) = recording_executor(ExecutorConfig {
        bypass: true,
        ..Default::default()
    });
    let uniforms = executor
        .immediate()
        .build_local_uniform_buffer(UniformLayoutId(4), &[1; 16]);
    executor.immediate().end_frame();
    executor
        .immediate()
        .set_local_uniform_buffer(ShaderStage::Pixel, 0, &uniforms);
}

#[test]
fn test_outstanding_lists_are_counted() {
    let (mut executor, _log) = recording_executor(threaded());
    assert_eq!(executor.outstanding_cmd_lists(), 2);

    let list = executor.create_command_list();
    let (recorder, pending) = executor.create_async_command_list();
    assert_eq!(executor.outstanding_cmd_lists(), 4);
    assert_eq!(executor.stats().outstanding_lists, 4);

    drop(list);
    recorder.finish();
    executor.immediate().queue_async_command_list_submit(pending);
    executor
        .immediate()
        .immediate_flush(ImmediateFlushType::FlushRhiThread);

    executor.check_no_outstanding_cmd_lists();
}

#[test]
#[should_panic(expected = "1 command lists are outstanding")]
fn test_latch_with_live_list_panics() {
    let (mut executor, _log) = recording_executor(threaded());
    let _forgotten = executor.create_compute_command_list();
    let _ = executor.latch_bypass();
}

#[test]
fn test_latch_switches_between_bypass_and_thread() -> anyhow::Result<()> {
    let (mut executor, log) = recording_executor(threaded());
    assert!(executor.is_rhi_thread_active());

    executor.set_config(ExecutorConfig::from_json_str(r#"{ "bypass": true }"#)?)?;
    executor.immediate().draw_primitive(0, 1, 1);
    executor.latch_bypass()?;
    assert!(executor.is_bypass());
    assert!(!executor.is_rhi_thread_active());
    assert_eq!(log.len(), 1);

    executor.immediate().draw_primitive(1, 1, 1);
    assert_eq!(log.len(), 2);

    executor.set_config(threaded())?;
    executor.latch_bypass()?;
    assert!(!executor.is_bypass());
    assert!(executor.is_rhi_thread_active());
    Ok(())
}

#[test]
fn test_rejected_config_keeps_the_old_one() {
    let (mut executor, _log) = recording_executor(threaded());
    let mut config = threaded();
    config.fence_ring_size = 0;
    let err = executor.set_config(config).unwrap_err();
    assert!(matches!(err, ExecutorError::Config(_)));
    assert_eq!(executor.config(), &threaded());
}

// ─────────────────────────────────────────────────────────────────────────────
// Frames and fences
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_end_frame_retires_the_previous_frame() {
    let mut config = threaded();
    config.fence_ring_size = 4;
    let (mut executor, log) = recording_executor(config);

    for frame in 0..6u64 {
        assert_eq!(executor.frame_number(), frame);
        let immediate = executor.immediate();
        immediate.begin_frame();
        let fence = immediate.alloc_fence();
        immediate.write_gpu_fence(fence);
        let second = immediate.alloc_fence();
        immediate.write_gpu_fence(second);
        immediate.end_frame();
        assert_eq!(executor.fences().frame_of(fence), Some(frame));
    }

    assert_eq!(executor.frame_number(), 6);
    assert_eq!(executor.fences().retired_through(), Some(4));
    executor.wait_for_rhi_thread_tasks();
    let frames = log
        .names()
        .into_iter()
        .filter(|name| *name == "EndFrame")
        .count();
    assert_eq!(frames, 6);
}

#[test]
#[should_panic(expected = "fence ring overflow")]
fn test_fence_ring_overflow_panics() {
    let mut config = ExecutorConfig::inline();
    config.fence_ring_size = 2;
    let (executor, _log) = recording_executor(config);
    for _ in 0..3 {
        executor.alloc_fence();
    }
}

#[test]
fn test_retired_slots_are_reused() {
    let mut config = ExecutorConfig::inline();
    config.fence_ring_size = 2;
    let (executor, _log) = recording_executor(config);
    let first = executor.alloc_fence();
    executor.alloc_fence();
    executor.retire_frame(executor.frame_number());
    assert_eq!(executor.alloc_fence(), first);
}

#[test]
fn test_rhi_thread_fence_signals_in_list_order() {
    let (mut executor, log) = recording_executor(threaded());
    let immediate = executor.immediate();
    immediate.draw_primitive(0, 1, 1);
    let fence = immediate.rhi_thread_fence();
    assert!(!fence.is_complete());

    immediate.wait_on_rhi_thread_fence(&fence);
    assert!(fence.is_complete());
    assert_eq!(log.names(), vec!["DrawPrimitive"]);
}

#[test]
fn test_present_is_paced() {
    let (mut executor, log) = recording_executor(threaded());
    for _ in 0..3 {
        let immediate = executor.immediate();
        immediate.begin_drawing_viewport(ViewportId(1), None);
        immediate.draw_primitive(0, 1, 1);
        immediate.end_drawing_viewport(ViewportId(1), true, false);
    }
    executor.wait_for_rhi_thread_tasks();
    assert_eq!(
        log.calls().last(),
        Some(&BackendCall::EndDrawingViewport {
            viewport: ViewportId(1),
            present: true,
            lock_to_vsync: false,
        })
    );
    assert_eq!(log.len(), 9);
}

// ─────────────────────────────────────────────────────────────────────────────
// Buffer locks
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_write_lock_uploads_on_unlock() {
    let (mut executor, log) = recording_executor(threaded());
    let immediate = executor.immediate();
    let mut lock = immediate.lock_buffer(BufferId(4), 8, 4, LockMode::WriteOnly);
    assert_eq!(lock.data(), &[0; 4]);
    lock.data_mut().copy_from_slice(&[1, 2, 3, 4]);
    assert_eq!(immediate.lock_tracker().total_memory_outstanding(), 4);

    immediate.unlock_buffer(lock);
    assert_eq!(immediate.lock_tracker().outstanding_locks(), 0);
    immediate.immediate_flush(ImmediateFlushType::FlushRhiThread);

    assert_eq!(
        log.calls(),
        vec![BackendCall::UpdateBuffer {
            buffer: BufferId(4),
            offset: 8,
            data: vec![1, 2, 3, 4],
        }]
    );
}

#[test]
fn test_read_lock_sees_recorded_writes() {
    let (mut executor, _log) = recording_executor(threaded());
    let immediate = executor.immediate();
    immediate.update_buffer(BufferId(2), 0, &[7; 8]);

    let lock = immediate.lock_buffer(BufferId(2), 4, 8, LockMode::ReadOnly);
    assert_eq!(lock.data(), &[7, 7, 7, 7, 0, 0, 0, 0]);
    immediate.unlock_buffer(lock);
    assert!(!immediate.has_commands());
}

#[test]
#[should_panic(expected = "already locked")]
fn test_double_lock_panics() {
    let (mut executor, _log) = recording_executor(ExecutorConfig::inline());
    let immediate = executor.immediate();
    let _first = immediate.lock_buffer(BufferId(1), 0, 4, LockMode::WriteOnly);
    let _second = immediate.lock_buffer(BufferId(1), 0, 4, LockMode::WriteOnly);
}

#[test]
#[should_panic(expected = "mismatched buffer lock")]
fn test_unlocking_a_foreign_lock_panics() {
    let (mut first, _) = recording_executor(ExecutorConfig::inline());
    let (mut second, _) = recording_executor(ExecutorConfig::inline());
    let lock = first
        .immediate()
        .lock_buffer(BufferId(1), 0, 4, LockMode::WriteOnly);
    second.immediate().unlock_buffer(lock);
}

// ─────────────────────────────────────────────────────────────────────────────
// Execution thread control
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_stall_gives_direct_context_access() {
    let (mut executor, log) = recording_executor(threaded());
    executor.immediate().draw_primitive(0, 1, 1);

    let stall = executor
        .immediate()
        .stall_rhi_thread()
        .expect("execution thread is running");
    assert_eq!(log.len(), 1);
    assert!(!executor.is_rhi_thread_completely_flushed());
    stall.context().set_stencil_ref(3);
    drop(stall);

    executor.immediate().draw_primitive(1, 1, 1);
    executor
        .immediate()
        .immediate_flush(ImmediateFlushType::FlushRhiThread);
    assert!(executor.is_rhi_thread_completely_flushed());
    assert_eq!(
        log.names(),
        vec!["DrawPrimitive", "SetStencilRef", "DrawPrimitive"]
    );
}

#[test]
fn test_stall_without_thread_is_none() {
    let (mut executor, _log) = recording_executor(ExecutorConfig::inline());
    assert!(executor.immediate().stall_rhi_thread().is_none());
}

#[test]
fn test_lambdas_run_in_list_order() {
    let (mut executor, log) = recording_executor(threaded());
    let runs = Arc::new(AtomicUsize::new(0));
    let immediate = executor.immediate();
    for i in 0..3 {
        let runs = Arc::clone(&runs);
        immediate.enqueue_lambda(move |ctx| {
            assert_eq!(runs.fetch_add(1, Ordering::SeqCst), i);
            ctx.set_stencil_ref(i as u32);
        });
    }
    immediate.immediate_flush(ImmediateFlushType::FlushRhiThread);

    assert_eq!(runs.load(Ordering::SeqCst), 3);
    assert_eq!(
        log.calls(),
        vec![
            BackendCall::SetStencilRef(0),
            BackendCall::SetStencilRef(1),
            BackendCall::SetStencilRef(2),
        ]
    );
}

#[test]
fn test_dispatch_prerequisite_delays_execution() {
    let (mut executor, log) = recording_executor(threaded());
    let upload = CompletionEvent::new();
    let immediate = executor.immediate();
    immediate.add_dispatch_prerequisite(upload.clone());
    immediate.draw_primitive(0, 1, 1);
    immediate.immediate_flush(ImmediateFlushType::DispatchToRhiThread);

    assert!(log.is_empty());
    upload.signal();
    executor.wait_for_rhi_thread_tasks();
    assert_eq!(log.len(), 1);
}

#[test]
fn test_stats_count_replayed_work() {
    let (mut executor, _log) = recording_executor(threaded());
    let mut list = executor.create_command_list();
    for i in 0..3 {
        list.draw_primitive(i, 1, 1);
    }
    executor.execute_list(list);
    executor.immediate().draw_primitive(3, 1, 1);
    executor
        .immediate()
        .immediate_flush(ImmediateFlushType::FlushRhiThread);

    let stats = executor.stats();
    assert_eq!(stats.lists_executed, 1);
    assert_eq!(stats.immediate_lists_executed, 1);
    assert_eq!(stats.commands_executed, 4);
    assert!(stats.bytes_replayed > 0);
    assert_eq!(stats.outstanding_lists, 2);
}

#[test]
fn test_shutdown_flushes_recorded_work() {
    let (mut executor, log) = recording_executor(threaded());
    executor.immediate().draw_primitive(0, 1, 1);
    executor.shutdown();
    assert!(!executor.is_rhi_thread_active());
    assert_eq!(log.len(), 1);
}
