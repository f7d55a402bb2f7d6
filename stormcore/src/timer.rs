use std::cmp::Reverse;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// Handle to a timer slot. Sessions store these directly; a default
/// (`NULL`) or stale handle can always be cancelled safely.
#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct TimerHandle {
    slot: usize,
    generation: u64,
}

impl TimerHandle {
    pub const NULL: TimerHandle = TimerHandle {
        slot: usize::MAX,
        generation: 0,
    };

    #[inline]
    pub fn is_null(&self) -> bool {
        self.slot == usize::MAX
    }
}

impl Default for TimerHandle {
    fn default() -> TimerHandle {
        TimerHandle::NULL
    }
}

struct Slot<J> {
    generation: u64,
    armed: bool,
    expiry: Instant,
    period: Option<Duration>,
    job: Option<J>,
}

#[derive(Eq, PartialEq, Ord, PartialOrd)]
struct HeapEntry {
    expiry: Instant,
    seq: u64,
    slot: usize,
    generation: u64,
}

/// Single-threaded cooperative timer wheel. Owns all deferred work for the
/// protocol engines; jobs are plain `Copy` values dispatched by the caller.
///
/// Entries with equal expiry fire in insertion order. Cancellation is
/// idempotent and tolerates null and stale handles. Re-arming an armed
/// handle is defined as cancel-then-insert.
pub struct TimerWheel<J: Copy> {
    slots: Vec<Slot<J>>,
    free: Vec<usize>,
    heap: BinaryHeap<Reverse<HeapEntry>>,
    seq: u64,
}

impl<J: Copy> TimerWheel<J> {
    pub fn new() -> TimerWheel<J> {
        TimerWheel {
            slots: Vec::new(),
            free: Vec::new(),
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    /// Arms `handle` to fire `job` after `delay`. A `period` makes the
    /// timer re-schedule itself on every expiry until cancelled.
    pub fn arm(
        &mut self,
        handle: &mut TimerHandle,
        job: J,
        delay: Duration,
        period: Option<Duration>,
        now: Instant,
    ) {
        self.cancel(handle);

        let slot = match self.free.pop() {
            Some(slot) => slot,
            None => {
                self.slots.push(Slot {
                    generation: 0,
                    armed: false,
                    expiry: now,
                    period: None,
                    job: None,
                });
                self.slots.len() - 1
            }
        };

        let entry = &mut self.slots[slot];
        entry.armed = true;
        entry.expiry = now + delay;
        entry.period = period;
        entry.job = Some(job);

        *handle = TimerHandle {
            slot,
            generation: entry.generation,
        };

        self.push_heap(slot);
    }

    /// Cancels the timer behind `handle` and nulls the handle. A no-op for
    /// null handles, already-fired one-shots and stale generations; the
    /// matching heap entries are discarded lazily.
    pub fn cancel(&mut self, handle: &mut TimerHandle) {
        if !handle.is_null() {
            if let Some(slot) = self.slots.get_mut(handle.slot) {
                if slot.generation == handle.generation && slot.armed {
                    Self::release(slot, &mut self.free, handle.slot);
                }
            }
        }
        *handle = TimerHandle::NULL;
    }

    #[inline]
    pub fn is_armed(&self, handle: TimerHandle) -> bool {
        !handle.is_null()
            && self
                .slots
                .get(handle.slot)
                .map_or(false, |slot| slot.generation == handle.generation && slot.armed)
    }

    /// Number of currently armed timers.
    pub fn armed_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.armed).count()
    }

    /// Pops the next due job, if any. Periodic timers re-schedule
    /// themselves before the job is returned, so a job is free to re-arm or
    /// cancel its own handle.
    pub fn next_due(&mut self, now: Instant) -> Option<J> {
        loop {
            let (slot_idx, generation, expiry) = match self.heap.peek() {
                Some(Reverse(entry)) => (entry.slot, entry.generation, entry.expiry),
                None => return None,
            };

            let stale = {
                let slot = &self.slots[slot_idx];
                slot.generation != generation || !slot.armed || slot.expiry != expiry
            };
            if stale {
                self.heap.pop();
                continue;
            }

            if expiry > now {
                return None;
            }

            self.heap.pop();

            let job;
            {
                let slot = &mut self.slots[slot_idx];
                job = slot.job;
                match slot.period {
                    Some(period) => {
                        slot.expiry = expiry + period;
                    }
                    None => {
                        Self::release(slot, &mut self.free, slot_idx);
                    }
                }
            }
            if self.slots[slot_idx].armed {
                self.push_heap(slot_idx);
            }

            return job;
        }
    }

    fn push_heap(&mut self, slot: usize) {
        let entry = &self.slots[slot];
        self.seq += 1;
        self.heap.push(Reverse(HeapEntry {
            expiry: entry.expiry,
            seq: self.seq,
            slot,
            generation: entry.generation,
        }));
    }

    fn release(slot: &mut Slot<J>, free: &mut Vec<usize>, index: usize) {
        slot.armed = false;
        slot.job = None;
        slot.period = None;
        slot.generation += 1;
        free.push(index);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECOND: Duration = Duration::from_secs(1);

    fn drain(wheel: &mut TimerWheel<u32>, now: Instant) -> Vec<u32> {
        let mut jobs = Vec::new();
        while let Some(job) = wheel.next_due(now) {
            jobs.push(job);
        }
        jobs
    }

    #[test]
    fn test_one_shot_fires_once() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();
        let mut handle = TimerHandle::NULL;

        wheel.arm(&mut handle, 1, SECOND, None, now);

        assert!(wheel.is_armed(handle));
        assert_eq!(drain(&mut wheel, now), Vec::<u32>::new());
        assert_eq!(drain(&mut wheel, now + SECOND), vec![1]);
        assert_eq!(drain(&mut wheel, now + 10 * SECOND), Vec::<u32>::new());
        assert!(!wheel.is_armed(handle));
    }

    #[test]
    fn test_periodic_reschedules() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();
        let mut handle = TimerHandle::NULL;

        wheel.arm(&mut handle, 7, SECOND, Some(SECOND), now);

        assert_eq!(drain(&mut wheel, now + SECOND), vec![7]);
        assert_eq!(drain(&mut wheel, now + 2 * SECOND), vec![7]);
        assert!(wheel.is_armed(handle));

        wheel.cancel(&mut handle);
        assert_eq!(drain(&mut wheel, now + 3 * SECOND), Vec::<u32>::new());
    }

    #[test]
    fn test_periodic_catches_up() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();
        let mut handle = TimerHandle::NULL;

        wheel.arm(&mut handle, 7, SECOND, Some(SECOND), now);

        // Three periods elapsed without a poll; each expiry is delivered.
        assert_eq!(drain(&mut wheel, now + 3 * SECOND), vec![7, 7, 7]);
    }

    #[test]
    fn test_same_expiry_dispatches_in_insertion_order() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();
        let mut a = TimerHandle::NULL;
        let mut b = TimerHandle::NULL;
        let mut c = TimerHandle::NULL;

        wheel.arm(&mut a, 1, SECOND, None, now);
        wheel.arm(&mut b, 2, SECOND, None, now);
        wheel.arm(&mut c, 3, SECOND, None, now);

        assert_eq!(drain(&mut wheel, now + SECOND), vec![1, 2, 3]);
    }

    #[test]
    fn test_cancel_null_and_stale_is_noop() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();

        let mut null = TimerHandle::NULL;
        wheel.cancel(&mut null);

        // Stale: the slot was recycled by a newer timer.
        let mut old = TimerHandle::NULL;
        wheel.arm(&mut old, 1, SECOND, None, now);
        let stale = old;
        wheel.cancel(&mut old);

        let mut fresh = TimerHandle::NULL;
        wheel.arm(&mut fresh, 2, SECOND, None, now);

        let mut stale = stale;
        wheel.cancel(&mut stale);

        // The newer timer still fires.
        assert!(wheel.is_armed(fresh));
        assert_eq!(drain(&mut wheel, now + SECOND), vec![2]);
    }

    #[test]
    fn test_rearm_is_cancel_then_insert() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();
        let mut handle = TimerHandle::NULL;

        wheel.arm(&mut handle, 1, SECOND, None, now);
        wheel.arm(&mut handle, 2, 3 * SECOND, None, now);

        assert_eq!(wheel.armed_count(), 1);
        assert_eq!(drain(&mut wheel, now + SECOND), Vec::<u32>::new());
        assert_eq!(drain(&mut wheel, now + 3 * SECOND), vec![2]);
    }

    #[test]
    fn test_slot_recycling_keeps_handles_distinct() {
        let now = Instant::now();
        let mut wheel = TimerWheel::new();

        let mut first = TimerHandle::NULL;
        wheel.arm(&mut first, 1, SECOND, None, now);
        assert_eq!(drain(&mut wheel, now + SECOND), vec![1]);

        // The fired one-shot left a stale handle; recycling the slot must
        // not make it cancel the new occupant.
        let stale = first;
        let mut second = TimerHandle::NULL;
        wheel.arm(&mut second, 2, SECOND, None, now);

        let mut stale = stale;
        wheel.cancel(&mut stale);

        assert_eq!(drain(&mut wheel, now + 2 * SECOND), vec![2]);
    }
}
