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

//! Parallel translate: replaying groups of sub-lists into back-end context
//! containers on worker threads, ahead of their in-order submission.

use crate::command::ControlCommand;
use crate::dispatch::Backend;
use crate::pool::TaskPool;
use crate::recorded::{RecordedList, ReplayTarget};
use std::ops::Range;
use std::sync::Arc;
use strata_core::context::ContextContainer;
use strata_core::{CompletionEvent, ParallelTranslateConfig, TranslateOrdering};

/// Groups consecutive lists into translate batches.
///
/// With merging on, lists accumulate into a batch until it holds at least
/// `min_commands_per_translate` commands. Batches never reorder lists.
pub(crate) fn plan_batches(sizes: &[usize], config: &ParallelTranslateConfig) -> Vec<Range<usize>> {
    if !config.merge_small_lists {
        return (0..sizes.len()).map(|i| i..i + 1).collect();
    }
    let mut batches = Vec::new();
    let mut start = 0;
    let mut commands = 0;
    for (index, size) in sizes.iter().enumerate() {
        commands += size;
        if commands >= config.min_commands_per_translate {
            batches.push(start..index + 1);
            start = index + 1;
            commands = 0;
        }
    }
    if start < sizes.len() {
        batches.push(start..sizes.len());
    }
    batches
}

/// Turns `lists` into the control commands that submit them in order.
///
/// When parallel translate applies, each batch is replayed into its own
/// container and the returned commands wait for and submit those containers.
/// Otherwise every list becomes a plain sub-list submission.
pub(crate) fn translate_lists(
    lists: Vec<RecordedList>,
    enabled: bool,
    config: &ParallelTranslateConfig,
    backend: &Arc<Backend>,
    pool: Option<&TaskPool>,
) -> Vec<ControlCommand> {
    let lists: Vec<RecordedList> = lists.into_iter().filter(|l| !l.is_empty()).collect();
    let Some(provider) = backend.provider.as_ref().filter(|_| enabled) else {
        return submit_in_order(lists);
    };
    let sizes: Vec<usize> = lists.iter().map(RecordedList::num_commands).collect();
    let batches = plan_batches(&sizes, config);
    if batches.len() < config.min_lists_for_parallel_translate {
        return submit_in_order(lists);
    }

    let num = batches.len();
    let containers: Option<Vec<Box<dyn ContextContainer>>> = (0..num)
        .map(|index| provider.create_container(index, num))
        .collect();
    let Some(containers) = containers else {
        log::debug!(
            "Back end declined a translate container; submitting {} lists in order",
            lists.len()
        );
        return submit_in_order(lists);
    };

    let mut lists = lists.into_iter();
    let mut commands = Vec::with_capacity(num);
    let mut previous: Option<CompletionEvent> = None;
    for ((index, range), container) in batches.into_iter().enumerate().zip(containers) {
        let batch: Vec<RecordedList> = lists.by_ref().take(range.len()).collect();
        let (handoff_tx, handoff_rx) = crossbeam_channel::bounded(1);
        let translated = CompletionEvent::new();
        let wait_for = match config.ordering {
            TranslateOrdering::Chained => previous.replace(translated.clone()),
            _ => None,
        };
        let guard = translated.guard();
        let stats_backend = Arc::clone(backend);
        let task = move || {
            let _translated = guard;
            if let Some(event) = wait_for {
                event.wait();
            }
            let mut container = container;
            for list in batch {
                let bytes = list.used_memory();
                let executed = list.execute(ReplayTarget::Graphics(container.context()), None);
                stats_backend.stats.record_list(false, executed, bytes);
            }
            container.finish();
            if handoff_tx.send(container).is_err() {
                log::warn!("Translated batch {index} of {num} has no submitter left");
            }
        };
        match (config.ordering, pool) {
            (TranslateOrdering::Serial, _) | (_, None) => task(),
            (_, Some(pool)) => pool.spawn(task),
        }
        commands.push(ControlCommand::WaitForAndSubmitTranslated {
            index,
            num,
            handoff: handoff_rx,
        });
    }
    backend.stats.record_parallel_batches(num);
    log::debug!("Queued {num} parallel translate batches ({:?})", config.ordering);
    commands
}

fn submit_in_order(lists: Vec<RecordedList>) -> Vec<ControlCommand> {
    lists.into_iter().map(ControlCommand::SubmitSubList).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(min_commands: usize, merge: bool) -> ParallelTranslateConfig {
        ParallelTranslateConfig {
            min_commands_per_translate: min_commands,
            merge_small_lists: merge,
            ..Default::default()
        }
    }

    #[test]
    fn test_small_lists_are_merged() {
        let batches = plan_batches(&[10, 10, 15, 40, 5], &config(32, true));
        assert_eq!(batches, vec![0..3, 3..4, 4..5]);
    }

    #[test]
    fn test_no_merge_gives_one_batch_per_list() {
        let batches = plan_batches(&[1, 2, 3], &config(32, false));
        assert_eq!(batches, vec![0..1, 1..2, 2..3]);
    }

    #[test]
    fn test_batches_cover_every_list_in_order() {
        let sizes = [3, 90, 1, 1, 1, 64, 2];
        let batches = plan_batches(&sizes, &config(16, true));
        let covered: Vec<usize> = batches.iter().flat_map(|r| r.clone()).collect();
        assert_eq!(covered, (0..sizes.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_empty_input_has_no_batches() {
        assert!(plan_batches(&[], &config(32, true)).is_empty());
    }
}
