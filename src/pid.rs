//! Packet identifier allocator: a set of free intervals over `[1, 65535]`.

use std::collections::BTreeMap;
use std::sync::Mutex;

/// Thread-safe packet-id allocator. Concurrent callers are serialized by a
/// short critical section; `std::sync::Mutex` is sufficient
/// here because the critical section never suspends.
pub struct PidAllocator {
    /// Maps an interval's start to its (inclusive) end.
    free: Mutex<BTreeMap<u16, u16>>,
}

impl Default for PidAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl PidAllocator {
    /// Create an allocator with the full range `[1, 65535]` free.
    #[must_use]
    pub fn new() -> Self {
        let mut free = BTreeMap::new();
        free.insert(1u16, 65535u16);
        Self {
            free: Mutex::new(free),
        }
    }

    /// Allocate the lowest available packet id, or 0 if the range is exhausted.
    pub fn allocate(&self) -> u16 {
        let mut free = self.free.lock().unwrap();
        let Some((&start, &end)) = free.iter().next() else {
            return 0;
        };
        free.remove(&start);
        if start != end {
            free.insert(start + 1, end);
        }
        start
    }

    /// Return `pid` to the free set, merging with adjacent intervals.
    ///
    /// # Panics
    /// Panics if `pid` is 0: callers must not attempt to free the reserved
    /// QoS-0 sentinel value.
    pub fn free(&self, pid: u16) {
        assert_ne!(pid, 0, "packet id 0 is never allocated");
        let mut free = self.free.lock().unwrap();

        let mut new_start = pid;
        let mut new_end = pid;

        // Merge with the preceding interval if it ends right before `pid`.
        if pid > 1 {
            if let Some((&start, &end)) = free.range(..pid).next_back() {
                if end + 1 == pid {
                    new_start = start;
                    free.remove(&start);
                }
            }
        }
        // Merge with the following interval if it starts right after `pid`.
        if new_end < 65535 {
            if let Some(&end) = free.get(&(new_end + 1)) {
                free.remove(&(new_end + 1));
                new_end = end;
            }
        }
        free.insert(new_start, new_end);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn exhausts_then_recovers_one_slot() {
        let alloc = PidAllocator::new();
        let mut seen = HashSet::new();
        for _ in 0..65535 {
            let pid = alloc.allocate();
            assert_ne!(pid, 0);
            assert!(seen.insert(pid), "pid {pid} allocated twice");
        }
        assert_eq!(alloc.allocate(), 0);

        alloc.free(42);
        assert_eq!(alloc.allocate(), 42);
        assert_eq!(alloc.allocate(), 0);
    }

    #[test]
    fn random_alloc_free_preserves_multiset_identity() {
        // A small deterministic LCG stands in for `rand` so this test has no
        // external dependency on RNG behavior across versions.
        let alloc = PidAllocator::new();
        let mut allocated = HashSet::new();
        let mut state: u64 = 0x1234_5678_9abc_def0;
        let mut next = || {
            state = state.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);
            (state >> 33) as u32
        };

        for _ in 0..20_000 {
            if allocated.is_empty() || next() % 2 == 0 {
                let pid = alloc.allocate();
                if pid != 0 {
                    assert!(allocated.insert(pid));
                }
            } else {
                let &pid = allocated.iter().next().unwrap();
                allocated.remove(&pid);
                alloc.free(pid);
            }
        }

        // Drain whatever remains free and confirm it is exactly the
        // complement of what's allocated.
        let mut still_free = HashSet::new();
        loop {
            let pid = alloc.allocate();
            if pid == 0 {
                break;
            }
            still_free.insert(pid);
        }
        let mut full: HashSet<u16> = (1..=65535).collect();
        for pid in &allocated {
            full.remove(pid);
        }
        assert_eq!(still_free, full);
    }
}
