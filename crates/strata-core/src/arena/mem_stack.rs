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

use bytemuck::Pod;
use std::sync::atomic::{AtomicU32, Ordering};

/// The largest alignment [`MemStack::alloc`] accepts.
pub const MAX_ALIGNMENT: usize = 16;

const BLOCK: usize = std::mem::size_of::<u128>();

static NEXT_STACK_ID: AtomicU32 = AtomicU32::new(1);

/// A handle to bytes allocated from a [`MemStack`].
///
/// The handle remembers which stack and which generation of that stack it came
/// from, so reading it after the stack was reset is caught instead of returning
/// whatever the next list wrote there.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScratchRange {
    stack: u32,
    generation: u32,
    chunk: u32,
    offset: u32,
    len: u32,
}

impl ScratchRange {
    /// Number of bytes in the range.
    pub fn len(&self) -> usize {
        self.len as usize
    }

    /// Whether the range is empty.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

struct Chunk {
    // u128 blocks keep every chunk 16-byte aligned.
    storage: Box<[u128]>,
    used: usize,
}

impl Chunk {
    fn with_capacity(bytes: usize) -> Self {
        Self {
            storage: vec![0u128; bytes.div_ceil(BLOCK)].into_boxed_slice(),
            used: 0,
        }
    }

    fn capacity(&self) -> usize {
        self.storage.len() * BLOCK
    }

    fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.storage)
    }

    fn bytes_mut(&mut self) -> &mut [u8] {
        bytemuck::cast_slice_mut(&mut self.storage)
    }
}

/// A chunked bump allocator with whole-stack reset.
pub struct MemStack {
    id: u32,
    generation: u32,
    chunks: Vec<Chunk>,
    current: usize,
    chunk_size: usize,
    max_bytes: usize,
    used: usize,
}

impl MemStack {
    /// Creates an empty stack. No memory is reserved until the first allocation.
    pub fn new(chunk_size: usize, max_bytes: usize) -> Self {
        assert!(chunk_size > 0, "arena chunk size must be non-zero");
        assert!(
            max_bytes <= u32::MAX as usize,
            "arena limit of {max_bytes} bytes does not fit 32-bit offsets"
        );
        Self {
            id: NEXT_STACK_ID.fetch_add(1, Ordering::Relaxed),
            generation: 0,
            chunks: Vec::new(),
            current: 0,
            chunk_size,
            max_bytes,
            used: 0,
        }
    }

    /// Allocates `size` zeroed bytes aligned to `align`, valid until [`MemStack::reset`].
    ///
    /// # Panics
    ///
    /// Panics if `align` is not a power of two up to [`MAX_ALIGNMENT`], or if the
    /// allocation would exceed the stack's byte limit.
    pub fn alloc(&mut self, size: usize, align: usize) -> ScratchRange {
        assert!(
            align.is_power_of_two() && align <= MAX_ALIGNMENT,
            "arena alignment must be a power of two no greater than {MAX_ALIGNMENT}, got {align}"
        );
        if size == 0 {
            return self.range(0, 0, 0);
        }
        let (index, offset) = self.find_space(size, align);
        let padding = offset - self.chunks[index].used;
        assert!(
            self.used + padding + size <= self.max_bytes,
            "command list arena exhausted: {size} bytes requested with {} of {} bytes in use",
            self.used,
            self.max_bytes
        );

        let chunk = &mut self.chunks[index];
        self.used += padding + size;
        chunk.used = offset + size;
        chunk.bytes_mut()[offset..offset + size].fill(0);
        self.range(index, offset, size)
    }

    /// Copies `data` into the stack.
    pub fn alloc_copy(&mut self, data: &[u8], align: usize) -> ScratchRange {
        let range = self.alloc(data.len(), align);
        self.bytes_mut(range).copy_from_slice(data);
        range
    }

    /// Copies a string into the stack.
    pub fn alloc_str(&mut self, text: &str) -> ScratchRange {
        self.alloc_copy(text.as_bytes(), 1)
    }

    /// Copies a plain-old-data value into the stack.
    pub fn alloc_pod<T: Pod>(&mut self, value: &T) -> ScratchRange {
        self.alloc_copy(
            bytemuck::bytes_of(value),
            std::mem::align_of::<T>().min(MAX_ALIGNMENT),
        )
    }

    /// Copies a slice of plain-old-data values into the stack.
    pub fn alloc_slice<T: Pod>(&mut self, values: &[T]) -> ScratchRange {
        self.alloc_copy(
            bytemuck::cast_slice(values),
            std::mem::align_of::<T>().min(MAX_ALIGNMENT),
        )
    }

    /// The bytes behind `range`.
    pub fn bytes(&self, range: ScratchRange) -> &[u8] {
        self.check(range);
        if range.is_empty() {
            return &[];
        }
        let start = range.offset as usize;
        &self.chunks[range.chunk as usize].bytes()[start..start + range.len()]
    }

    /// The bytes behind `range`, mutably.
    pub fn bytes_mut(&mut self, range: ScratchRange) -> &mut [u8] {
        self.check(range);
        if range.is_empty() {
            return &mut [];
        }
        let start = range.offset as usize;
        &mut self.chunks[range.chunk as usize].bytes_mut()[start..start + range.len()]
    }

    /// The string stored by [`MemStack::alloc_str`].
    pub fn str_at(&self, range: ScratchRange) -> &str {
        std::str::from_utf8(self.bytes(range)).expect("scratch range was allocated from a &str")
    }

    /// Reads back a value stored by [`MemStack::alloc_pod`].
    pub fn read_pod<T: Pod>(&self, range: ScratchRange) -> T {
        assert_eq!(
            range.len(),
            std::mem::size_of::<T>(),
            "scratch range size does not match the requested type"
        );
        bytemuck::pod_read_unaligned(self.bytes(range))
    }

    /// Bytes handed out since the last reset, alignment padding included.
    pub fn used_bytes(&self) -> usize {
        self.used
    }

    /// Bytes reserved by the stack's chunks.
    pub fn reserved_bytes(&self) -> usize {
        self.chunks.iter().map(Chunk::capacity).sum()
    }

    /// Reclaims every allocation. Ranges handed out before are invalid afterwards.
    pub fn reset(&mut self) {
        self.generation = self.generation.wrapping_add(1);
        for chunk in &mut self.chunks {
            chunk.used = 0;
        }
        self.current = 0;
        self.used = 0;
    }

    fn find_space(&mut self, size: usize, align: usize) -> (usize, usize) {
        while let Some(chunk) = self.chunks.get(self.current) {
            let offset = align_up(chunk.used, align);
            if offset + size <= chunk.capacity() {
                return (self.current, offset);
            }
            self.current += 1;
        }
        // Oversized requests get a dedicated chunk.
        self.chunks.push(Chunk::with_capacity(size.max(self.chunk_size)));
        self.current = self.chunks.len() - 1;
        (self.current, 0)
    }

    fn range(&self, chunk: usize, offset: usize, len: usize) -> ScratchRange {
        ScratchRange {
            stack: self.id,
            generation: self.generation,
            chunk: chunk as u32,
            offset: offset as u32,
            len: len as u32,
        }
    }

    fn check(&self, range: ScratchRange) {
        assert_eq!(
            range.stack, self.id,
            "scratch range was allocated from a different arena"
        );
        assert_eq!(
            range.generation, self.generation,
            "stale scratch range: allocated in arena generation {} but the arena is at generation {}",
            range.generation, self.generation
        );
    }
}

impl std::fmt::Debug for MemStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemStack")
            .field("id", &self.id)
            .field("generation", &self.generation)
            .field("chunks", &self.chunks.len())
            .field("used", &self.used)
            .field("max_bytes", &self.max_bytes)
            .finish()
    }
}

fn align_up(value: usize, align: usize) -> usize {
    (value + align - 1) & !(align - 1)
}
