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

//! The execution thread.
//!
//! One long-lived thread replays dispatched lists in FIFO order. Jobs carry
//! completion events so the recording thread can wait on the start or the
//! end of any dispatch.

use crate::dispatch::Backend;
use crate::error::ExecutorError;
use crate::recorded::RecordedList;
use crossbeam_channel::{Receiver, Sender};
use std::sync::Arc;
use std::thread;
use strata_core::CompletionEvent;

/// Name given to the execution thread.
pub(crate) const RHI_THREAD_NAME: &str = "strata-rhi";

pub(crate) enum RhiJob {
    Execute {
        list: RecordedList,
        started: CompletionEvent,
        done: CompletionEvent,
    },
    /// Parks the thread until `resume` yields or disconnects.
    Stall {
        parked: CompletionEvent,
        resume: Receiver<()>,
    },
    Shutdown,
}

impl RhiJob {
    fn fail(self) {
        match self {
            RhiJob::Execute { started, done, .. } => {
                started.fail();
                done.fail();
            }
            RhiJob::Stall { parked, .. } => parked.fail(),
            RhiJob::Shutdown => {}
        }
    }
}

/// Fails every job still queued when the thread unwinds.
struct DrainOnPanic {
    receiver: Receiver<RhiJob>,
}

impl Drop for DrainOnPanic {
    fn drop(&mut self) {
        if thread::panicking() {
            log::error!("RHI thread panicked; failing queued work.");
            while let Ok(job) = self.receiver.try_recv() {
                job.fail();
            }
        }
    }
}

pub(crate) struct RhiThread {
    sender: Sender<RhiJob>,
    handle: Option<thread::JoinHandle<()>>,
}

impl RhiThread {
    pub(crate) fn spawn(backend: Arc<Backend>) -> Result<Self, ExecutorError> {
        let (sender, receiver) = crossbeam_channel::unbounded();
        let handle = thread::Builder::new()
            .name(RHI_THREAD_NAME.to_string())
            .spawn(move || {
                log::info!("RHI thread started.");
                let drain = DrainOnPanic { receiver };
                while let Ok(job) = drain.receiver.recv() {
                    match job {
                        RhiJob::Execute {
                            list,
                            started,
                            done,
                        } => {
                            let _done = done.guard();
                            started.signal();
                            backend.execute(list);
                        }
                        RhiJob::Stall { parked, resume } => {
                            backend.set_stalled(true);
                            parked.signal();
                            let _ = resume.recv();
                            backend.set_stalled(false);
                        }
                        RhiJob::Shutdown => break,
                    }
                }
                log::info!("RHI thread stopped.");
            })
            .map_err(|source| ExecutorError::ThreadSpawn {
                name: RHI_THREAD_NAME.to_string(),
                source,
            })?;
        Ok(Self {
            sender,
            handle: Some(handle),
        })
    }

    /// Queues a job. A job the thread can no longer accept is failed.
    pub(crate) fn submit(&self, job: RhiJob) {
        if let Err(rejected) = self.sender.send(job) {
            log::error!("RHI thread is gone; failing submitted work.");
            rejected.into_inner().fail();
        }
    }

    /// Stops the thread after the queued jobs ran, and joins it.
    pub(crate) fn stop(&mut self) {
        let Some(handle) = self.handle.take() else {
            return;
        };
        let _ = self.sender.send(RhiJob::Shutdown);
        if handle.join().is_err() {
            log::error!("RHI thread terminated with a panic.");
        }
    }
}

impl Drop for RhiThread {
    fn drop(&mut self) {
        self.stop();
    }
}
