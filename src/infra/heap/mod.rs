//! Constant-time heap over a caller-provided arena (half-fit algorithm).
//!
//! The arena is split into fragments. Every fragment starts with a 16-byte
//! header stored in the arena itself:
//!
//! ```text
//! Bytes  0-3  : offset of the next fragment in address order (u32::MAX = none)
//! Bytes  4-7  : offset of the previous fragment in address order
//! Bytes  8-11 : fragment size, header included (multiple of FRAGMENT_SIZE_MIN)
//! Bytes 12-15 : 1 when allocated, 0 when free
//! Bytes 16-23 : free fragments only: next/previous fragment in the same bin
//! ```
//!
//! Free fragments are kept in bins by `floor(log2(size / FRAGMENT_SIZE_MIN))`
//! and a bitmask records the non-empty bins. Allocation rounds the request up
//! to a power of two, so any fragment from the first non-empty bin at or above
//! the optimal one fits: a single bit scan, no list walk. Freeing merges the
//! fragment with its free neighbours in address order, so churn never leaves
//! permanent fragmentation behind. Both operations run in bounded time that
//! does not depend on the call history.
use crate::error::HeapError;

//==================================================================================Constants

/// Bytes reserved at the start of every fragment.
pub const HEADER_SIZE: usize = 16;
/// Smallest fragment; every fragment size is a multiple of it.
pub const FRAGMENT_SIZE_MIN: usize = 32;

const NUM_BINS: usize = 32;
const NONE: u32 = u32::MAX;

const NEXT: usize = 0;
const PREV: usize = 4;
const SIZE: usize = 8;
const USED: usize = 12;
const NEXT_FREE: usize = 16;
const PREV_FREE: usize = 20;

//==================================================================================Memory resource
/// Handle to an allocated region of a [`MemoryResource`].
///
/// Not `Clone`: [`MemoryResource::free`] consumes it, so safe code cannot free
/// the same region twice.
#[derive(Debug, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Block {
    offset: u32,
    len: u32,
}

impl Block {
    /// Number of usable bytes (the amount that was requested).
    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

/// Allocation capability handed to the transfer engine.
///
/// Implementations must serve both calls in bounded time; the pump calls them
/// on every received frame.
pub trait MemoryResource {
    /// Reserve `amount` bytes; `None` when exhausted or when `amount` is zero.
    fn allocate(&mut self, amount: usize) -> Option<Block>;
    /// Return a block obtained from this resource.
    fn free(&mut self, block: Block);
    /// Read access to the bytes of `block`.
    fn bytes(&self, block: &Block) -> &[u8];
    /// Write access to the bytes of `block`.
    fn bytes_mut(&mut self, block: &Block) -> &mut [u8];
}

//==================================================================================Diagnostics
/// Usage counters, refreshed on every allocate/free.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Diagnostics {
    /// Usable arena size (rounded down to whole fragments).
    pub capacity: usize,
    /// Bytes currently held by allocated fragments, headers included.
    pub allocated: usize,
    /// Highest value `allocated` reached.
    pub peak_allocated: usize,
    /// Largest amount ever requested.
    pub peak_request_size: usize,
    /// Number of requests that could not be served.
    pub oom_count: u64,
    /// Blocks handed out and not yet freed.
    pub live_blocks: usize,
}

//==================================================================================O1Heap
/// Half-fit heap owning a mutable arena for its whole lifetime.
///
/// Not synchronised: every call goes through `&mut self`, which keeps all
/// accesses on the context that owns the node.
pub struct O1Heap<'a> {
    arena: &'a mut [u8],
    bins: [u32; NUM_BINS],
    nonempty_bin_mask: u32,
    diagnostics: Diagnostics,
}

impl<'a> O1Heap<'a> {
    /// Take ownership of `arena` and format it as a single free fragment.
    pub fn new(arena: &'a mut [u8]) -> Result<Self, HeapError> {
        let size = arena.len();
        if size > NONE as usize {
            return Err(HeapError::ArenaTooLarge { size });
        }
        let capacity = size / FRAGMENT_SIZE_MIN * FRAGMENT_SIZE_MIN;
        if capacity < FRAGMENT_SIZE_MIN {
            return Err(HeapError::ArenaTooSmall { size });
        }

        let mut heap = Self {
            arena,
            bins: [NONE; NUM_BINS],
            nonempty_bin_mask: 0,
            diagnostics: Diagnostics {
                capacity,
                ..Diagnostics::default()
            },
        };
        heap.set(0, NEXT, NONE);
        heap.set(0, PREV, NONE);
        heap.set(0, SIZE, capacity as u32);
        heap.set(0, USED, 0);
        heap.rebin(0);
        Ok(heap)
    }

    /// Snapshot of the usage counters.
    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    /// Walk the whole arena and check the structural invariants.
    ///
    /// Linear in the number of fragments: meant for tests and debugging, never
    /// for the allocation path.
    pub fn invariants_hold(&self) -> bool {
        let mut offset = 0u32;
        let mut prev = NONE;
        let mut total = 0usize;
        let mut allocated = 0usize;
        let mut live = 0usize;
        let mut prev_free = false;

        while offset != NONE {
            if self.get(offset, PREV) != prev {
                return false;
            }
            let size = self.get(offset, SIZE) as usize;
            if size < FRAGMENT_SIZE_MIN || size % FRAGMENT_SIZE_MIN != 0 {
                return false;
            }
            let used = self.get(offset, USED) == 1;
            if used {
                allocated += size;
                live += 1;
            } else if prev_free {
                // Two adjacent free fragments should have been merged.
                return false;
            }
            prev_free = !used;
            total += size;
            prev = offset;
            offset = self.get(offset, NEXT);
        }

        if total != self.diagnostics.capacity
            || allocated != self.diagnostics.allocated
            || live != self.diagnostics.live_blocks
        {
            return false;
        }

        for (index, head) in self.bins.iter().enumerate() {
            let flagged = self.nonempty_bin_mask & (1 << index) != 0;
            if flagged != (*head != NONE) {
                return false;
            }
            let mut fragment = *head;
            while fragment != NONE {
                if self.get(fragment, USED) != 0
                    || bin_index(self.get(fragment, SIZE) as usize) != index
                {
                    return false;
                }
                fragment = self.get(fragment, NEXT_FREE);
            }
        }
        true
    }

    //==================================================================================Header access
    fn get(&self, fragment: u32, field: usize) -> u32 {
        let at = fragment as usize + field;
        let mut raw = [0u8; 4];
        raw.copy_from_slice(&self.arena[at..at + 4]);
        u32::from_le_bytes(raw)
    }

    fn set(&mut self, fragment: u32, field: usize, value: u32) {
        let at = fragment as usize + field;
        self.arena[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    //==================================================================================Bins
    /// Push a free fragment at the head of its bin.
    fn rebin(&mut self, fragment: u32) {
        let index = bin_index(self.get(fragment, SIZE) as usize);
        let head = self.bins[index];
        self.set(fragment, NEXT_FREE, head);
        self.set(fragment, PREV_FREE, NONE);
        if head != NONE {
            self.set(head, PREV_FREE, fragment);
        }
        self.bins[index] = fragment;
        self.nonempty_bin_mask |= 1 << index;
    }

    /// Detach a free fragment from its bin.
    fn unbin(&mut self, fragment: u32) {
        let index = bin_index(self.get(fragment, SIZE) as usize);
        let next = self.get(fragment, NEXT_FREE);
        let prev = self.get(fragment, PREV_FREE);
        if next != NONE {
            self.set(next, PREV_FREE, prev);
        }
        if prev != NONE {
            self.set(prev, NEXT_FREE, next);
        } else {
            self.bins[index] = next;
            if next == NONE {
                self.nonempty_bin_mask &= !(1 << index);
            }
        }
    }

    fn out_of_memory(&mut self) -> Option<Block> {
        self.diagnostics.oom_count += 1;
        #[cfg(feature = "defmt")]
        defmt::warn!(
            "Heap exhausted: {} of {} bytes in use",
            self.diagnostics.allocated,
            self.diagnostics.capacity
        );
        None
    }
}

impl MemoryResource for O1Heap<'_> {
    fn allocate(&mut self, amount: usize) -> Option<Block> {
        if amount == 0 {
            return None;
        }
        self.diagnostics.peak_request_size = self.diagnostics.peak_request_size.max(amount);

        // Round header + payload up to a power of two no smaller than the minimum fragment.
        let fragment_size = match amount
            .checked_add(HEADER_SIZE)
            .and_then(usize::checked_next_power_of_two)
        {
            Some(size) if size <= self.diagnostics.capacity => size.max(FRAGMENT_SIZE_MIN),
            _ => return self.out_of_memory(),
        };

        let optimal_bin = (fragment_size / FRAGMENT_SIZE_MIN).trailing_zeros();
        let candidates = self.nonempty_bin_mask & !((1u32 << optimal_bin) - 1);
        if candidates == 0 {
            return self.out_of_memory();
        }
        let fragment = self.bins[candidates.trailing_zeros() as usize];
        self.unbin(fragment);

        let available = self.get(fragment, SIZE) as usize;
        let leftover = available - fragment_size;
        if leftover >= FRAGMENT_SIZE_MIN {
            // Split: the tail becomes a new free fragment.
            let tail = fragment + fragment_size as u32;
            let next = self.get(fragment, NEXT);
            self.set(tail, NEXT, next);
            self.set(tail, PREV, fragment);
            self.set(tail, SIZE, leftover as u32);
            self.set(tail, USED, 0);
            if next != NONE {
                self.set(next, PREV, tail);
            }
            self.set(fragment, NEXT, tail);
            self.set(fragment, SIZE, fragment_size as u32);
            self.rebin(tail);
        }
        self.set(fragment, USED, 1);

        let size = self.get(fragment, SIZE) as usize;
        self.diagnostics.allocated += size;
        self.diagnostics.peak_allocated = self
            .diagnostics
            .peak_allocated
            .max(self.diagnostics.allocated);
        self.diagnostics.live_blocks += 1;

        Some(Block {
            offset: fragment,
            len: amount as u32,
        })
    }

    fn free(&mut self, block: Block) {
        let mut fragment = block.offset;
        if fragment as usize + HEADER_SIZE > self.diagnostics.capacity
            || self.get(fragment, USED) != 1
        {
            // Not one of ours, or already released.
            #[cfg(feature = "defmt")]
            defmt::error!("Ignoring free of unknown block at {}", fragment);
            return;
        }

        let size = self.get(fragment, SIZE);
        self.diagnostics.allocated -= size as usize;
        self.diagnostics.live_blocks -= 1;
        self.set(fragment, USED, 0);

        let prev = self.get(fragment, PREV);
        if prev != NONE && self.get(prev, USED) == 0 {
            self.unbin(prev);
            let next = self.get(fragment, NEXT);
            let merged = self.get(prev, SIZE) + self.get(fragment, SIZE);
            self.set(prev, SIZE, merged);
            self.set(prev, NEXT, next);
            if next != NONE {
                self.set(next, PREV, prev);
            }
            fragment = prev;
        }

        let next = self.get(fragment, NEXT);
        if next != NONE && self.get(next, USED) == 0 {
            self.unbin(next);
            let after = self.get(next, NEXT);
            let merged = self.get(fragment, SIZE) + self.get(next, SIZE);
            self.set(fragment, SIZE, merged);
            self.set(fragment, NEXT, after);
            if after != NONE {
                self.set(after, PREV, fragment);
            }
        }

        self.rebin(fragment);
    }

    fn bytes(&self, block: &Block) -> &[u8] {
        let start = block.offset as usize + HEADER_SIZE;
        &self.arena[start..start + block.len()]
    }

    fn bytes_mut(&mut self, block: &Block) -> &mut [u8] {
        let start = block.offset as usize + HEADER_SIZE;
        &mut self.arena[start..start + block.len()]
    }
}

/// Bin holding free fragments of `size` bytes.
#[inline]
fn bin_index(size: usize) -> usize {
    let units = (size / FRAGMENT_SIZE_MIN) as u32;
    (u32::BITS - 1 - units.leading_zeros()) as usize
}
