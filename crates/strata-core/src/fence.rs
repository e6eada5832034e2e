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

//! The GPU fence ring allocator.

use crate::api::GpuFenceId;
use std::sync::{Mutex, PoisonError};

/// Default number of slots in the fence ring.
pub const MAX_FENCE_INDICES: usize = 4096;

#[derive(Debug, Clone, Copy, Default)]
struct FenceSlot {
    frame: Option<u64>,
    value: Option<u64>,
}

#[derive(Debug)]
struct FenceRing {
    slots: Vec<FenceSlot>,
    next: usize,
    retired_through: Option<u64>,
}

/// Hands out GPU fence slots from a fixed-size ring.
///
/// Every slot remembers the frame it was allocated in. A slot can only be
/// handed out again once that frame has been retired, so a fence still
/// awaited by the GPU is never aliased by a new one.
#[derive(Debug)]
pub struct FenceAllocator {
    ring: Mutex<FenceRing>,
}

impl FenceAllocator {
    /// Creates a ring with `capacity` slots.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "fence ring needs at least one slot");
        Self {
            ring: Mutex::new(FenceRing {
                slots: vec![FenceSlot::default(); capacity],
                next: 0,
                retired_through: None,
            }),
        }
    }

    /// Number of slots in the ring.
    pub fn capacity(&self) -> usize {
        self.ring().slots.len()
    }

    /// Allocates the next slot for a fence written during `frame`.
    ///
    /// # Panics
    ///
    /// Panics if the slot is still owned by a frame that has not been retired.
    pub fn alloc(&self, frame: u64) -> GpuFenceId {
        let mut ring = self.ring();
        let index = ring.next;
        if let Some(owner) = ring.slots[index].frame {
            let retired = ring.retired_through.is_some_and(|done| owner <= done);
            assert!(
                retired,
                "fence ring overflow: slot {index} is still in use by frame {owner}; more than {} fences were allocated before it retired",
                ring.slots.len()
            );
        }
        ring.slots[index] = FenceSlot {
            frame: Some(frame),
            value: None,
        };
        ring.next = (index + 1) % ring.slots.len();
        GpuFenceId(index as u32)
    }

    /// Marks every frame up to and including `frame` as finished on the GPU.
    pub fn retire_frame(&self, frame: u64) {
        let mut ring = self.ring();
        ring.retired_through = Some(ring.retired_through.map_or(frame, |done| done.max(frame)));
    }

    /// The most recent retired frame.
    pub fn retired_through(&self) -> Option<u64> {
        self.ring().retired_through
    }

    /// Stores the back end's completion value for `fence`.
    pub fn set_value(&self, fence: GpuFenceId, value: u64) {
        self.ring().slots[fence.0 as usize].value = Some(value);
    }

    /// The back end's completion value for `fence`, if it has been written.
    pub fn value(&self, fence: GpuFenceId) -> Option<u64> {
        self.ring().slots[fence.0 as usize].value
    }

    /// The frame `fence` was last allocated in.
    pub fn frame_of(&self, fence: GpuFenceId) -> Option<u64> {
        self.ring().slots[fence.0 as usize].frame
    }

    fn ring(&self) -> std::sync::MutexGuard<'_, FenceRing> {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for FenceAllocator {
    fn default() -> Self {
        Self::new(MAX_FENCE_INDICES)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_fences_within_a_frame_never_alias() {
        let fences = FenceAllocator::new(16);
        let ids: HashSet<_> = (0..16).map(|_| fences.alloc(0)).collect();
        assert_eq!(ids.len(), 16);
    }

    #[test]
    fn test_slots_recycle_after_retirement() {
        let fences = FenceAllocator::new(4);
        for _ in 0..4 {
            fences.alloc(0);
        }
        fences.retire_frame(0);
        let reused = fences.alloc(1);
        assert_eq!(reused, GpuFenceId(0));
        assert_eq!(fences.frame_of(reused), Some(1));
        assert_eq!(fences.value(reused), None);
    }

    #[test]
    fn test_fence_values() {
        let fences = FenceAllocator::new(4);
        let fence = fences.alloc(3);
        fences.set_value(fence, 42);
        assert_eq!(fences.value(fence), Some(42));
    }

    #[test]
    #[should_panic(expected = "fence ring overflow")]
    fn test_wrapping_onto_an_outstanding_frame_is_fatal() {
        let fences = FenceAllocator::new(4);
        for _ in 0..5 {
            fences.alloc(0);
        }
    }

    #[test]
    #[should_panic(expected = "fence ring overflow")]
    fn test_retiring_an_older_frame_is_not_enough() {
        let fences = FenceAllocator::new(2);
        fences.alloc(0);
        fences.alloc(1);
        fences.retire_frame(0);
        fences.alloc(2);
        fences.alloc(2);
    }
}
