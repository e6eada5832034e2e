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

//! Debug marker bookkeeping for a replay.

use std::collections::VecDeque;

/// Deepest marker nesting tracked. Deeper pushes evict the outermost marker.
pub const MAX_MARKER_DEPTH: usize = 32;

/// The stack of debug markers open at the current point of a replay.
#[derive(Debug, Default, Clone)]
pub struct DebugContext {
    markers: VecDeque<String>,
    evicted: usize,
}

impl DebugContext {
    /// Creates an empty marker stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a marker.
    pub fn push_marker(&mut self, name: &str) {
        if self.markers.len() == MAX_MARKER_DEPTH {
            self.markers.pop_front();
            self.evicted += 1;
        }
        self.markers.push_back(name.to_owned());
    }

    /// Closes the innermost marker and returns its name if it is still tracked.
    pub fn pop_marker(&mut self) -> Option<String> {
        match self.markers.pop_back() {
            Some(name) => Some(name),
            None => {
                self.evicted = self.evicted.saturating_sub(1);
                None
            }
        }
    }

    /// Number of tracked open markers.
    pub fn depth(&self) -> usize {
        self.markers.len()
    }

    /// The open markers, outermost first.
    pub fn markers(&self) -> impl Iterator<Item = &str> + '_ {
        self.markers.iter().map(String::as_str)
    }

    /// The open markers joined with `/`, e.g. `Frame/Shadows/Cascade0`.
    pub fn current_path(&self) -> String {
        let path = self.markers().collect::<Vec<_>>().join("/");
        if self.evicted > 0 {
            format!(".../{path}")
        } else {
            path
        }
    }

    /// Whether every opened marker has been closed.
    pub fn is_balanced(&self) -> bool {
        self.markers.is_empty() && self.evicted == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_pop_path() {
        let mut debug = DebugContext::new();
        debug.push_marker("Frame");
        debug.push_marker("Shadows");
        assert_eq!(debug.current_path(), "Frame/Shadows");
        assert_eq!(debug.pop_marker().as_deref(), Some("Shadows"));
        assert_eq!(debug.pop_marker().as_deref(), Some("Frame"));
        assert!(debug.is_balanced());
    }

    #[test]
    fn test_overflow_evicts_oldest() {
        let mut debug = DebugContext::new();
        for i in 0..MAX_MARKER_DEPTH + 2 {
            debug.push_marker(&format!("m{i}"));
        }
        assert_eq!(debug.depth(), MAX_MARKER_DEPTH);
        assert_eq!(debug.markers().next(), Some("m2"));
        assert!(debug.current_path().starts_with(".../m2/"));

        for _ in 0..MAX_MARKER_DEPTH + 2 {
            debug.pop_marker();
        }
        assert!(debug.is_balanced());
    }
}
