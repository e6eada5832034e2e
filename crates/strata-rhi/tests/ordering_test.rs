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

//! Integration tests for the order in which recorded work reaches the back end.
//!
//! Every test drives a real executor over the recording back end and checks
//! the exact call trace it observed.

use std::thread;
use strata_core::TranslateOrdering;
use strata_infra::{BackendCall, CallLog, RecordingContext};
use strata_rhi::prelude::*;
use strata_rhi::ImmediateFlushType;

fn executor_with(config: ExecutorConfig, context: RecordingContext) -> CommandListExecutor {
    strata_infra::init_test_logging();
    CommandListExecutor::new(config, Box::new(context), None).expect("executor starts")
}

fn recording_executor(config: ExecutorConfig) -> (CommandListExecutor, CallLog) {
    let log = CallLog::new();
    let executor = executor_with(config, RecordingContext::new(log.clone()));
    (executor, log)
}

fn threaded() -> ExecutorConfig {
    ExecutorConfig {
        use_parallel_algorithms: false,
        ..Default::default()
    }
}

fn bypass() -> ExecutorConfig {
    ExecutorConfig {
        bypass: true,
        ..Default::default()
    }
}

fn target(id: u64) -> RenderTargetView {
    RenderTargetView::new(TextureId(id), PixelFormat::Rgba8Unorm)
}

fn draw(base_vertex: u32, num_primitives: u32) -> BackendCall {
    BackendCall::DrawPrimitive {
        base_vertex,
        num_primitives,
        num_instances: 1,
    }
}

fn flush(executor: &mut CommandListExecutor) {
    executor
        .immediate()
        .immediate_flush(ImmediateFlushType::FlushRhiThread);
}

/// A workload touching payload-carrying commands, passes and local uniform buffers.
fn record_workload<L: GraphicsCommands>(list: &mut L) {
    list.push_event("Frame", 0x00ff_00ff);
    list.set_render_targets(&[target(1)], None);
    list.set_viewport(Viewport::new(1280.0, 720.0));
    let uniforms = list.build_local_uniform_buffer(UniformLayoutId(7), &[3u8; 48]);
    list.set_local_uniform_buffer(ShaderStage::Vertex, 0, &uniforms);
    list.set_graphics_pipeline(&GraphicsPipelineDesc::default());
    list.set_shader_parameter(ShaderStage::Pixel, 0, 4, &[1, 2, 3, 4]);
    list.draw_primitive(0, 100, 1);
    list.transition_resources(&[TransitionInfo::texture(
        TextureId(1),
        ResourceAccess::Readable,
    )]);
    list.begin_render_pass(&RenderPassInfo::single(target(2)));
    list.draw_indexed_primitive(&DrawIndexedArgs {
        index_buffer: BufferId(9),
        base_vertex_index: -4,
        first_instance: 0,
        num_vertices: 300,
        start_index: 12,
        num_primitives: 100,
        num_instances: 2,
    });
    list.end_render_pass();
    list.update_buffer(BufferId(1), 0, &[5; 16]);
    list.copy_buffer_region(BufferId(2), 0, BufferId(1), 0, 16);
    list.pop_event();
}

// ─────────────────────────────────────────────────────────────────────────────
// Program order
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_render_target_draw_scenario() {
    for config in [ExecutorConfig::inline(), threaded()] {
        let (mut executor, log) = recording_executor(config);
        let mut list = executor.create_command_list();
        list.set_render_targets(&[target(0xA)], None);
        list.draw_primitive(0, 100, 1);
        list.set_render_targets(&[target(0xB)], None);
        list.draw_primitive(0, 50, 1);
        assert_eq!(list.num_commands(), 4);

        executor.execute_list(list);
        executor.wait_for_rhi_thread_tasks();

        assert_eq!(
            log.calls(),
            vec![
                BackendCall::SetRenderTargets {
                    color: vec![target(0xA)],
                    depth_stencil: None,
                },
                draw(0, 100),
                BackendCall::SetRenderTargets {
                    color: vec![target(0xB)],
                    depth_stencil: None,
                },
                draw(0, 50),
            ]
        );
    }
}

#[test]
fn test_many_commands_keep_program_order() {
    let (mut executor, log) = recording_executor(threaded());
    let mut list = executor.create_command_list();
    for i in 0..5_000 {
        list.draw_primitive(i, 1, 1);
    }
    executor.execute_list(list);
    executor.wait_for_rhi_thread_tasks();

    let calls = log.calls();
    assert_eq!(calls.len(), 5_000);
    assert!(calls.iter().zip(0..).all(|(call, i)| *call == draw(i, 1)));
}

#[test]
fn test_pipeline_picks_up_bound_render_targets() {
    let (mut executor, log) = recording_executor(ExecutorConfig::inline());
    let mut list = executor.create_command_list();
    let mut info = RenderPassInfo::single(target(1));
    info.color_targets.push(RenderTargetView::new(TextureId(2), PixelFormat::R32Float));
    list.begin_render_pass(&info);
    list.set_graphics_pipeline(&GraphicsPipelineDesc::default());
    list.end_render_pass();
    executor.execute_list(list);

    let calls = log.calls();
    let BackendCall::SetGraphicsPipeline(desc) = &calls[1] else {
        panic!("expected a pipeline bind, got {:?}", calls[1]);
    };
    assert_eq!(desc.num_render_targets, 2);
    assert_eq!(desc.render_target_formats[0], PixelFormat::Rgba8Unorm);
    assert_eq!(desc.render_target_formats[1], PixelFormat::R32Float);
}

// ─────────────────────────────────────────────────────────────────────────────
// Bypass equivalence
// ─────────────────────────────────────────────────────────────────────────────

fn trace_of(config: ExecutorConfig) -> Vec<BackendCall> {
    let (mut executor, log) = recording_executor(config);
    let mut list = executor.create_command_list();
    record_workload(&mut list);
    executor.execute_list(list);

    record_workload(executor.immediate());
    flush(&mut executor);
    log.calls()
}

#[test]
fn test_bypass_matches_deferred_execution() {
    let deferred = trace_of(ExecutorConfig::inline());
    assert!(!deferred.is_empty());
    assert_eq!(trace_of(bypass()), deferred);
    assert_eq!(trace_of(threaded()), deferred);
}

#[test]
fn test_bypass_calls_reach_back_end_immediately() {
    let (executor, log) = recording_executor(bypass());
    let mut list = executor.create_command_list();
    list.draw_primitive(0, 3, 1);
    assert_eq!(log.calls(), vec![draw(0, 3)]);
    assert_eq!(list.num_commands(), 0);
    assert_eq!(list.used_memory(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Sub-lists
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_sub_lists_execute_where_they_were_queued() {
    for config in [ExecutorConfig::inline(), threaded()] {
        let (mut executor, log) = recording_executor(config);
        let mut sub_list = executor.create_command_list();
        sub_list.draw_primitive(1, 1, 1);

        let immediate = executor.immediate();
        immediate.draw_primitive(0, 1, 1);
        immediate.queue_command_list_submit(sub_list);
        immediate.enqueue_lambda(|ctx| ctx.set_stencil_ref(7));
        immediate.draw_primitive(2, 1, 1);
        flush(&mut executor);

        assert_eq!(
            log.calls(),
            vec![draw(0, 1), draw(1, 1), BackendCall::SetStencilRef(7), draw(2, 1)]
        );
    }
}

#[test]
fn test_async_list_recorded_on_another_thread_keeps_its_slot() {
    for config in [ExecutorConfig::inline(), threaded(), bypass()] {
        let (mut executor, log) = recording_executor(config);
        let (mut recorder, pending) = executor.create_async_command_list();

        // In bypass the queue call waits for the recording, so start it first.
        let worker = thread::spawn(move || {
            recorder.draw_primitive(1, 1, 1);
            recorder.draw_primitive(2, 1, 1);
            recorder.finish();
        });
        executor.immediate().draw_primitive(0, 1, 1);
        executor.immediate().queue_async_command_list_submit(pending);
        executor.immediate().draw_primitive(3, 1, 1);
        flush(&mut executor);
        worker.join().unwrap();

        assert_eq!(log.calls(), vec![draw(0, 1), draw(1, 1), draw(2, 1), draw(3, 1)]);
    }
}

#[test]
fn test_async_list_finished_early_replays_at_its_slot_in_bypass() {
    let (mut executor, log) = recording_executor(bypass());
    let (mut recorder, pending) = executor.create_async_command_list();
    thread::spawn(move || {
        recorder.draw_primitive(1, 1, 1);
        recorder.draw_primitive(2, 1, 1);
        recorder.finish();
    })
    .join()
    .unwrap();
    assert!(log.is_empty());

    executor.immediate().draw_primitive(0, 1, 1);
    executor.immediate().queue_async_command_list_submit(pending);
    executor.immediate().draw_primitive(3, 1, 1);

    assert_eq!(log.calls(), vec![draw(0, 1), draw(1, 1), draw(2, 1), draw(3, 1)]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Parallel translate
// ─────────────────────────────────────────────────────────────────────────────

fn parallel_config(ordering: TranslateOrdering, use_rhi_thread: bool) -> ExecutorConfig {
    let mut config = ExecutorConfig {
        use_rhi_thread,
        ..Default::default()
    };
    config.parallel_translate.ordering = ordering;
    config.parallel_translate.min_commands_per_translate = 1;
    config
}

fn submit_parallel(executor: &mut CommandListExecutor, lists: u32) {
    let lists: Vec<CommandList> = (0..lists)
        .map(|i| {
            let mut list = executor.create_command_list();
            list.draw_primitive(i * 10, 1, 1);
            list.draw_primitive(i * 10 + 1, 1, 1);
            list
        })
        .collect();
    executor
        .immediate()
        .queue_parallel_async_command_list_submit(lists);
    flush(executor);
}

#[test]
fn test_parallel_translate_submits_in_order() {
    let orderings = [
        TranslateOrdering::Independent,
        TranslateOrdering::Chained,
        TranslateOrdering::Serial,
    ];
    for ordering in orderings {
        for use_rhi_thread in [false, true] {
            let log = CallLog::new();
            let context = RecordingContext::new(log.clone()).with_parallel_translate();
            let provider = context.provider().unwrap();
            let mut executor = executor_with(parallel_config(ordering, use_rhi_thread), context);

            submit_parallel(&mut executor, 4);

            let mut expected = Vec::new();
            for i in 0..4 {
                expected.push(BackendCall::SubmitContainer { index: i, num: 4 });
                expected.push(draw(i as u32 * 10, 1));
                expected.push(draw(i as u32 * 10 + 1, 1));
            }
            assert_eq!(log.calls(), expected, "{ordering:?}, thread: {use_rhi_thread}");
            assert_eq!(provider.containers_created(), 4);
            assert_eq!(executor.stats().parallel_batches, 4);
        }
    }
}

#[test]
fn test_declined_containers_fall_back_to_sub_lists() {
    let log = CallLog::new();
    let context = RecordingContext::new(log.clone()).with_declining_parallel_translate();
    let config = parallel_config(TranslateOrdering::Independent, true);
    let mut executor = executor_with(config, context);

    submit_parallel(&mut executor, 3);

    assert_eq!(
        log.calls(),
        vec![draw(0, 1), draw(1, 1), draw(10, 1), draw(11, 1), draw(20, 1), draw(21, 1)]
    );
    assert_eq!(executor.stats().parallel_batches, 0);
}

#[test]
fn test_small_submissions_are_not_translated() {
    let log = CallLog::new();
    let context = RecordingContext::new(log.clone()).with_parallel_translate();
    let provider = context.provider().unwrap();
    let mut config = parallel_config(TranslateOrdering::Independent, true);
    // Four lists of two commands merge into a single batch.
    config.parallel_translate.min_commands_per_translate = 32;
    let mut executor = executor_with(config, context);

    submit_parallel(&mut executor, 4);

    assert_eq!(log.calls().len(), 8);
    assert!(!log.names().contains(&"SubmitContainer"));
    assert_eq!(provider.containers_created(), 0);
}

#[test]
fn test_parallel_flag_off_submits_in_order() {
    let log = CallLog::new();
    let context = RecordingContext::new(log.clone()).with_parallel_translate();
    let provider = context.provider().unwrap();
    let mut config = parallel_config(TranslateOrdering::Independent, true);
    config.use_parallel_algorithms = false;
    let mut executor = executor_with(config, context);

    submit_parallel(&mut executor, 2);

    assert_eq!(log.calls(), vec![draw(0, 1), draw(1, 1), draw(10, 1), draw(11, 1)]);
    assert_eq!(provider.containers_created(), 0);
}

// ─────────────────────────────────────────────────────────────────────────────
// Async compute
// ─────────────────────────────────────────────────────────────────────────────

fn compute_executor(config: ExecutorConfig) -> (CommandListExecutor, CallLog) {
    strata_infra::init_test_logging();
    let log = CallLog::new();
    let executor = CommandListExecutor::new(
        config,
        Box::new(RecordingContext::new(log.clone())),
        Some(Box::new(RecordingContext::with_label("compute", log.clone()))),
    )
    .expect("executor starts");
    (executor, log)
}

#[test]
fn test_async_compute_runs_after_earlier_graphics_work() {
    for config in [ExecutorConfig::inline(), threaded(), bypass()] {
        let (mut executor, log) = compute_executor(config);
        executor.immediate().draw_primitive(0, 1, 1);
        executor.async_compute().set_compute_pipeline(ComputePipelineId(4));
        executor.async_compute().dispatch_compute(8, 8, 1);
        executor.dispatch_async_compute();
        executor.immediate().draw_primitive(1, 1, 1);
        flush(&mut executor);

        let trace: Vec<(String, &'static str)> = log
            .entries()
            .into_iter()
            .map(|entry| (entry.context, entry.call.name()))
            .collect();
        let expected: Vec<(String, &'static str)> = [
            ("graphics", "DrawPrimitive"),
            ("compute", "SetComputePipeline"),
            ("compute", "DispatchCompute"),
            ("compute", "SubmitCommandsHint"),
            ("graphics", "DrawPrimitive"),
        ]
        .into_iter()
        .map(|(context, name)| (context.to_string(), name))
        .collect();
        assert_eq!(trace, expected);
    }
}

#[test]
fn test_compute_list_executes_on_compute_context() {
    let (mut executor, log) = compute_executor(threaded());
    let mut list = executor.create_compute_command_list();
    list.clear_uav(UavId(3), [0; 4]);
    list.dispatch_compute(1, 1, 1);
    executor.immediate().draw_primitive(0, 1, 1);
    executor.execute_compute_list(list);
    executor.wait_for_rhi_thread_tasks();

    assert_eq!(log.calls_for("graphics"), vec![draw(0, 1)]);
    assert_eq!(
        log.calls_for("compute"),
        vec![
            BackendCall::ClearUav {
                uav: UavId(3),
                values: [0; 4],
            },
            BackendCall::DispatchCompute { x: 1, y: 1, z: 1 },
        ]
    );
    assert_eq!(log.names(), vec!["DrawPrimitive", "ClearUav", "DispatchCompute"]);
}
