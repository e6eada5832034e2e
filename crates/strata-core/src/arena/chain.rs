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

struct Slot<T> {
    value: Option<T>,
    next: Option<u32>,
}

/// An arena of command slots linked head to tail by index.
///
/// Appending is O(1). Draining walks the links from the head, moving each value
/// out of its slot exactly once.
pub struct CommandChain<T> {
    slots: Vec<Slot<T>>,
    head: Option<u32>,
    tail: Option<u32>,
}

impl<T> Default for CommandChain<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            head: None,
            tail: None,
        }
    }
}

impl<T> CommandChain<T> {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `value` after the current tail and returns its slot index.
    pub fn push(&mut self, value: T) -> u32 {
        let index = u32::try_from(self.slots.len()).expect("command chain exceeds u32 slots");
        self.slots.push(Slot {
            value: Some(value),
            next: None,
        });
        match self.tail {
            Some(tail) => self.slots[tail as usize].next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
        index
    }

    /// Number of values appended since the chain was last emptied.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether nothing has been appended.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Iterates over the values still in the chain, head first.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        let mut cursor = self.head;
        std::iter::from_fn(move || {
            while let Some(index) = cursor {
                let slot = &self.slots[index as usize];
                cursor = slot.next;
                if let Some(value) = slot.value.as_ref() {
                    return Some(value);
                }
            }
            None
        })
    }

    /// Moves every value out in append order, handing each to `f`.
    ///
    /// Returns the number of values visited. The chain is empty afterwards.
    pub fn drain_in_order<F: FnMut(T)>(&mut self, mut f: F) -> usize {
        let mut cursor = self.head.take();
        self.tail = None;
        let mut visited = 0;
        while let Some(index) = cursor {
            let slot = &mut self.slots[index as usize];
            cursor = slot.next;
            if let Some(value) = slot.value.take() {
                f(value);
                visited += 1;
            }
        }
        self.slots.clear();
        visited
    }

    /// Drops every value without visiting it.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.head = None;
        self.tail = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_append_order() {
        let mut chain = CommandChain::new();
        for i in 0..5 {
            chain.push(i);
        }
        assert_eq!(chain.iter().copied().collect::<Vec<_>>(), vec![0, 1, 2, 3, 4]);

        let mut seen = Vec::new();
        assert_eq!(chain.drain_in_order(|v| seen.push(v)), 5);
        assert_eq!(seen, vec![0, 1, 2, 3, 4]);
        assert!(chain.is_empty());
        assert_eq!(chain.len(), 0);
    }

    #[test]
    fn test_values_are_dropped_exactly_once() {
        use std::rc::Rc;
        let marker = Rc::new(());
        let mut chain = CommandChain::new();
        chain.push(Rc::clone(&marker));
        chain.push(Rc::clone(&marker));
        assert_eq!(Rc::strong_count(&marker), 3);
        chain.drain_in_order(drop);
        assert_eq!(Rc::strong_count(&marker), 1);

        chain.push(Rc::clone(&marker));
        chain.clear();
        assert_eq!(Rc::strong_count(&marker), 1);
    }
}
