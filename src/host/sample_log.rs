// src/host/sample_log.rs

use crate::common::frame::Payload;

/// Slots kept per port.
pub const SAMPLE_LOG_DEPTH: usize = 16;

/// One logged DATA payload.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RawSample {
    pub mode: u8,
    pub payload: Payload,
    /// Ticks since this slot was written.
    pub age_ticks: u32,
}

/// Fixed-depth ring of the most recent samples of one port.
#[derive(Debug, Clone)]
pub struct SampleLog {
    slots: [RawSample; SAMPLE_LOG_DEPTH],
    /// Index of the most recently written slot.
    cursor: usize,
    written: usize,
}

impl SampleLog {
    pub fn new() -> Self {
        SampleLog {
            slots: core::array::from_fn(|_| RawSample::default()),
            cursor: 0,
            written: 0,
        }
    }

    pub fn clear(&mut self) {
        *self = Self::new();
    }

    /// Writes `payload` into the next slot and resets its staleness.
    pub fn record(&mut self, mode: u8, payload: &[u8]) {
        if self.written > 0 {
            self.cursor = (self.cursor + 1) % SAMPLE_LOG_DEPTH;
        }
        let slot = &mut self.slots[self.cursor];
        slot.mode = mode;
        slot.payload.clear();
        // Callers hand in frame payloads, which always fit.
        let _ = slot.payload.try_extend_from_slice(payload);
        slot.age_ticks = 0;
        self.written = self.written.saturating_add(1);
    }

    /// Ages every written slot by one tick. Slots fill from index 0, so the
    /// first `live` slots are exactly the written ones.
    pub fn tick(&mut self) {
        let live = self.written.min(SAMPLE_LOG_DEPTH);
        for slot in self.slots.iter_mut().take(live) {
            slot.age_ticks = slot.age_ticks.saturating_add(1);
        }
    }

    pub fn latest(&self) -> Option<&RawSample> {
        if self.written == 0 {
            None
        } else {
            Some(&self.slots[self.cursor])
        }
    }

    /// Samples from newest to oldest.
    pub fn iter_recent(&self) -> impl Iterator<Item = &RawSample> + '_ {
        let live = self.written.min(SAMPLE_LOG_DEPTH);
        (0..live).map(move |back| {
            let idx = (self.cursor + SAMPLE_LOG_DEPTH - back) % SAMPLE_LOG_DEPTH;
            &self.slots[idx]
        })
    }

    /// Total samples recorded since the last clear.
    pub fn total_written(&self) -> usize {
        self.written
    }
}

impl Default for SampleLog {
    fn default() -> Self {
        Self::new()
    }
}
