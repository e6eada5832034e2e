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

//! A small pool of worker threads for parallel translate.

use crate::error::ExecutorError;
use crossbeam_channel::Sender;
use std::panic::{self, AssertUnwindSafe};
use std::thread;

type Task = Box<dyn FnOnce() + Send>;

pub(crate) struct TaskPool {
    sender: Option<Sender<Task>>,
    workers: Vec<thread::JoinHandle<()>>,
}

impl TaskPool {
    pub(crate) fn new(threads: usize) -> Result<Self, ExecutorError> {
        let (sender, receiver) = crossbeam_channel::unbounded::<Task>();
        let mut workers = Vec::with_capacity(threads);
        for index in 0..threads {
            let receiver = receiver.clone();
            let name = format!("strata-translate-{index}");
            let handle = thread::Builder::new()
                .name(name.clone())
                .spawn(move || {
                    while let Ok(task) = receiver.recv() {
                        // A failed task settles its own events; the worker survives it.
                        if panic::catch_unwind(AssertUnwindSafe(task)).is_err() {
                            log::error!("Translate task panicked on {}.", name);
                        }
                    }
                })
                .map_err(|source| ExecutorError::ThreadSpawn {
                    name: format!("strata-translate-{index}"),
                    source,
                })?;
            workers.push(handle);
        }
        log::debug!("Started {threads} translate workers.");
        Ok(Self {
            sender: Some(sender),
            workers,
        })
    }

    pub(crate) fn spawn<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        if let Some(sender) = &self.sender {
            if let Err(rejected) = sender.send(Box::new(task)) {
                rejected.into_inner()();
            }
        }
    }
}

impl Drop for TaskPool {
    fn drop(&mut self) {
        self.sender.take();
        for worker in self.workers.drain(..) {
            let _ = worker.join();
        }
    }
}
