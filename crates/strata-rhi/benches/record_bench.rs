use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;
use strata_core::TranslateOrdering;
use strata_infra::{CallLog, NullContext, RecordingContext};
use strata_rhi::prelude::*;

fn executor(config: ExecutorConfig) -> CommandListExecutor {
    CommandListExecutor::new(config, Box::new(NullContext::default()), None).unwrap()
}

fn record_draws(list: &mut CommandList, draws: u32) {
    list.set_render_targets(
        &[RenderTargetView::new(TextureId(1), PixelFormat::Rgba8Unorm)],
        None,
    );
    for i in 0..draws {
        list.set_shader_parameter(ShaderStage::Vertex, 0, 0, &i.to_le_bytes());
        list.draw_primitive(i, 2, 1);
    }
}

fn bench_record_and_execute(c: &mut Criterion) {
    let mut group = c.benchmark_group("Record and execute");

    for draws in [100u32, 1_000, 10_000] {
        let configs = [
            ("inline", ExecutorConfig::inline()),
            (
                "rhi thread",
                ExecutorConfig {
                    use_parallel_algorithms: false,
                    ..Default::default()
                },
            ),
            (
                "bypass",
                ExecutorConfig {
                    bypass: true,
                    ..Default::default()
                },
            ),
        ];
        for (name, config) in configs {
            let mut executor = executor(config);
            group.bench_with_input(BenchmarkId::new(name, draws), &draws, |b, &draws| {
                b.iter(|| {
                    let mut list = executor.create_command_list();
                    record_draws(&mut list, draws);
                    black_box(list.used_memory());
                    executor.execute_list(list);
                    executor.wait_for_rhi_thread_tasks();
                });
            });
        }
    }

    group.finish();
}

fn bench_parallel_submit(c: &mut Criterion) {
    let mut group = c.benchmark_group("Parallel submit");

    for ordering in [
        TranslateOrdering::Independent,
        TranslateOrdering::Chained,
        TranslateOrdering::Serial,
    ] {
        let mut config = ExecutorConfig::default();
        config.parallel_translate.ordering = ordering;
        config.parallel_translate.worker_threads = 4;
        let log = CallLog::new();
        let context = RecordingContext::new(log.clone()).with_parallel_translate();
        let mut executor = CommandListExecutor::new(config, Box::new(context), None).unwrap();
        group.bench_function(format!("{ordering:?} x8"), |b| {
            b.iter(|| {
                log.clear();
                let lists: Vec<CommandList> = (0..8)
                    .map(|_| {
                        let mut list = executor.create_command_list();
                        record_draws(&mut list, 500);
                        list
                    })
                    .collect();
                let immediate = executor.immediate();
                immediate.queue_parallel_async_command_list_submit(lists);
                immediate.immediate_flush(ImmediateFlushType::FlushRhiThread);
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_record_and_execute, bench_parallel_submit);
criterion_main!(benches);
