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

//! Lists recorded on another thread and submitted before they are finished.

use super::{CommandList, CommandListBase, ComputeCommands, GraphicsCommands};
use crate::recorded::RecordedList;
use crossbeam_channel::{Receiver, Sender};
use std::ops::Deref;

/// The recording half of an asynchronously recorded list.
///
/// Recording finishes when the list is dropped or [`AsyncCommandList::finish`]
/// is called; the matching [`PendingCommandList`] then becomes ready.
pub struct AsyncCommandList {
    list: Option<CommandList>,
    sender: Sender<RecordedList>,
}

impl AsyncCommandList {
    pub(crate) fn new(list: CommandList, sender: Sender<RecordedList>) -> Self {
        Self {
            list: Some(list),
            sender,
        }
    }

    /// Ends recording and hands the list to whoever waits on it.
    pub fn finish(self) {}

    fn list(&self) -> &CommandList {
        self.list
            .as_ref()
            .expect("async command list is alive until dropped")
    }
}

impl ComputeCommands for AsyncCommandList {
    fn list_base(&mut self) -> &mut CommandListBase {
        &mut self
            .list
            .as_mut()
            .expect("async command list is alive until dropped")
            .base
    }
}

impl GraphicsCommands for AsyncCommandList {}

impl Deref for AsyncCommandList {
    type Target = CommandListBase;

    fn deref(&self) -> &CommandListBase {
        &self.list().base
    }
}

impl Drop for AsyncCommandList {
    fn drop(&mut self) {
        let Some(list) = self.list.take() else {
            return;
        };
        let uid = list.uid();
        if self.sender.send(list.into_recorded()).is_err() {
            log::debug!("Async command list {uid} finished after its pending handle was dropped");
        }
    }
}

/// A handle to a list still being recorded elsewhere.
///
/// Queue it on the immediate list; execution blocks on it at the point it was
/// queued, preserving submission order.
pub struct PendingCommandList {
    receiver: Receiver<RecordedList>,
    uid: u32,
}

impl PendingCommandList {
    pub(crate) fn new(receiver: Receiver<RecordedList>, uid: u32) -> Self {
        Self { receiver, uid }
    }

    /// UID of the list being recorded.
    pub fn uid(&self) -> u32 {
        self.uid
    }

    /// Whether recording has finished.
    pub fn is_ready(&self) -> bool {
        !self.receiver.is_empty()
    }

    /// Blocks until recording finishes.
    ///
    /// # Panics
    ///
    /// Panics if the recording half was lost without finishing, which only
    /// happens when the recording thread panicked.
    pub(crate) fn wait(self) -> RecordedList {
        match self.receiver.recv() {
            Ok(list) => list,
            Err(_) => panic!(
                "async command list {} was abandoned before it finished recording",
                self.uid
            ),
        }
    }
}

impl std::fmt::Debug for PendingCommandList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCommandList")
            .field("uid", &self.uid)
            .field("ready", &self.is_ready())
            .finish()
    }
}

/// Creates a connected recording/pending pair around `list`.
pub(crate) fn async_pair(list: CommandList) -> (AsyncCommandList, PendingCommandList) {
    let (sender, receiver) = crossbeam_channel::bounded(1);
    let uid = list.uid();
    (
        AsyncCommandList::new(list, sender),
        PendingCommandList::new(receiver, uid),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ListRegistry;
    use std::thread;
    use strata_core::ArenaConfig;

    #[test]
    fn test_pending_list_receives_recording_from_another_thread() {
        let registry = ListRegistry::new(ArenaConfig::default());
        let (mut recorder, pending) = async_pair(CommandList::new(&registry));
        assert!(!pending.is_ready());
        let handle = thread::spawn(move || {
            recorder.draw_primitive(0, 1, 1);
            recorder.draw_primitive(3, 1, 1);
            recorder.finish();
        });
        let uid = pending.uid();
        let recorded = pending.wait();
        handle.join().unwrap();
        assert_eq!(recorded.uid(), uid);
        assert_eq!(recorded.num_commands(), 2);
    }
}
