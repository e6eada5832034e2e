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

//! Routing of recorded lists to the back end, inline or through the
//! execution thread.

use crate::error::ExecutorError;
use crate::immediate::RhiThreadStall;
use crate::pool::TaskPool;
use crate::recorded::{RecordedList, ReplayTarget};
use crate::stats::StatCounters;
use crate::thread::{RhiJob, RhiThread};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use strata_core::api::{BufferId, GpuFenceId};
use strata_core::context::{
    lock_context, share_command_context, share_compute_context, CommandContext, ComputeContext,
    ParallelContextProvider, SharedCommandContext, SharedComputeContext,
};
use strata_core::fence::FenceAllocator;
use strata_core::CompletionEvent;

/// The back-end contexts plus what the execution thread shares with the
/// recording thread.
pub(crate) struct Backend {
    pub(crate) graphics: SharedCommandContext,
    pub(crate) compute: Option<SharedComputeContext>,
    pub(crate) provider: Option<Arc<dyn ParallelContextProvider>>,
    pub(crate) stats: StatCounters,
    stalled: AtomicBool,
}

impl Backend {
    pub(crate) fn new(
        graphics: Box<dyn CommandContext>,
        compute: Option<Box<dyn ComputeContext>>,
    ) -> Self {
        let provider = graphics.parallel_provider();
        Self {
            graphics: share_command_context(graphics),
            compute: compute.map(share_compute_context),
            provider,
            stats: StatCounters::default(),
            stalled: AtomicBool::new(false),
        }
    }

    /// Replays `list` on the context matching its queue.
    ///
    /// Prerequisites are awaited before any context is locked.
    pub(crate) fn execute(&self, mut list: RecordedList) {
        list.wait_prerequisites();
        let immediate = list.kind().is_immediate();
        let bytes = list.used_memory();
        let executed = match (&self.compute, list.kind().is_compute()) {
            (Some(slot), true) => {
                let mut ctx = lock_context(slot);
                list.execute(ReplayTarget::Compute(&mut **ctx), None)
            }
            _ => {
                let mut ctx = lock_context(&self.graphics);
                list.execute(ReplayTarget::Graphics(&mut **ctx), self.compute.as_ref())
            }
        };
        self.stats.record_list(immediate, executed, bytes);
    }

    pub(crate) fn graphics(&self) -> MutexGuard<'_, Box<dyn CommandContext>> {
        lock_context(&self.graphics)
    }

    pub(crate) fn set_stalled(&self, stalled: bool) {
        self.stalled.store(stalled, Ordering::SeqCst);
    }

    pub(crate) fn is_stalled(&self) -> bool {
        self.stalled.load(Ordering::SeqCst)
    }
}

#[derive(Clone)]
struct DispatchedWork {
    started: CompletionEvent,
    done: CompletionEvent,
}

/// Sends recorded work where it executes and tracks the last dispatch.
pub(crate) struct Dispatcher {
    backend: Arc<Backend>,
    thread: Mutex<Option<RhiThread>>,
    last: Mutex<Option<DispatchedWork>>,
    pool: Option<TaskPool>,
    force_flush: AtomicBool,
    fences: FenceAllocator,
    frame: AtomicU64,
}

impl Dispatcher {
    pub(crate) fn new(
        backend: Backend,
        use_rhi_thread: bool,
        translate_workers: usize,
        fence_ring_size: usize,
    ) -> Result<Self, ExecutorError> {
        let backend = Arc::new(backend);
        let thread = if use_rhi_thread {
            Some(RhiThread::spawn(Arc::clone(&backend))?)
        } else {
            None
        };
        let pool = if translate_workers > 0 {
            Some(TaskPool::new(translate_workers)?)
        } else {
            None
        };
        Ok(Self {
            backend,
            thread: Mutex::new(thread),
            last: Mutex::new(None),
            pool,
            force_flush: AtomicBool::new(false),
            fences: FenceAllocator::new(fence_ring_size),
            frame: AtomicU64::new(0),
        })
    }

    pub(crate) fn backend(&self) -> &Arc<Backend> {
        &self.backend
    }

    pub(crate) fn pool(&self) -> Option<&TaskPool> {
        self.pool.as_ref()
    }

    /// Executes `list` inline, or queues it on the execution thread.
    pub(crate) fn dispatch(&self, list: RecordedList) {
        if list.is_empty() {
            return;
        }
        let queued = {
            let thread = lock(&self.thread);
            match thread.as_ref() {
                Some(thread) => {
                    let work = DispatchedWork {
                        started: CompletionEvent::new(),
                        done: CompletionEvent::new(),
                    };
                    log::trace!(
                        "Dispatching command list {} ({} commands) to the RHI thread",
                        list.uid(),
                        list.num_commands()
                    );
                    thread.submit(RhiJob::Execute {
                        list,
                        started: work.started.clone(),
                        done: work.done.clone(),
                    });
                    Ok(work)
                }
                None => Err(list),
            }
        };
        match queued {
            Ok(work) => {
                *lock(&self.last) = Some(work.clone());
                if self.force_flush.load(Ordering::Relaxed) {
                    work.done.wait();
                }
            }
            Err(list) => self.backend.execute(list),
        }
    }

    /// Blocks until the last dispatch started executing.
    pub(crate) fn wait_for_dispatch(&self) {
        if let Some(work) = self.last_work() {
            work.started.wait();
        }
    }

    /// Blocks until everything dispatched so far has executed.
    pub(crate) fn wait_for_rhi_thread_tasks(&self) {
        if let Some(work) = self.last_work() {
            work.done.wait();
        }
    }

    pub(crate) fn is_rhi_thread_active(&self) -> bool {
        lock(&self.thread).is_some()
    }

    /// Whether nothing dispatched is still pending and the thread is not stalled.
    pub(crate) fn is_completely_flushed(&self) -> bool {
        let drained = self
            .last_work()
            .map_or(true, |work| work.done.is_complete() || work.done.has_failed());
        drained && !self.backend.is_stalled()
    }

    /// Starts or stops the execution thread. Stopping drains it first.
    pub(crate) fn set_rhi_thread_enabled(&self, enabled: bool) -> Result<(), ExecutorError> {
        let mut thread = lock(&self.thread);
        match (enabled, thread.is_some()) {
            (true, false) => {
                *thread = Some(RhiThread::spawn(Arc::clone(&self.backend))?);
            }
            (false, true) => {
                drop(thread);
                self.wait_for_rhi_thread_tasks();
                if let Some(mut stopped) = lock(&self.thread).take() {
                    stopped.stop();
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub(crate) fn set_force_flush(&self, force: bool) {
        self.force_flush.store(force, Ordering::Relaxed);
    }

    /// Parks the execution thread once it drained the queued work.
    pub(crate) fn stall(&self) -> Option<RhiThreadStall> {
        let thread = lock(&self.thread);
        let thread = thread.as_ref()?;
        let parked = CompletionEvent::new();
        let (resume, receiver) = crossbeam_channel::bounded(1);
        thread.submit(RhiJob::Stall {
            parked: parked.clone(),
            resume: receiver,
        });
        parked.wait();
        log::debug!("RHI thread stalled.");
        Some(RhiThreadStall::new(Arc::clone(&self.backend), resume))
    }

    /// Reads buffer contents back from the back end. The caller flushes first.
    pub(crate) fn read_buffer(&self, buffer: BufferId, offset: u64, size: u64) -> Vec<u8> {
        self.backend.graphics().read_buffer(buffer, offset, size)
    }

    pub(crate) fn fences(&self) -> &FenceAllocator {
        &self.fences
    }

    pub(crate) fn alloc_fence(&self) -> GpuFenceId {
        self.fences.alloc(self.frame_number())
    }

    pub(crate) fn frame_number(&self) -> u64 {
        self.frame.load(Ordering::SeqCst)
    }

    pub(crate) fn advance_frame(&self) -> u64 {
        self.frame.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Drains and joins the execution thread. Safe to call more than once.
    pub(crate) fn shutdown(&self) {
        let stopped = lock(&self.thread).take();
        if let Some(mut thread) = stopped {
            thread.stop();
        }
    }

    fn last_work(&self) -> Option<DispatchedWork> {
        lock(&self.last).clone()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
