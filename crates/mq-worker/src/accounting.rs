//! Per-post progress arithmetic.
//!
//! The worker owns the band [30, 100]: anything below 30 happened before the
//! job reached the queue. The 70-point working band is split evenly across
//! media items, and each item's allotment is split again by phase: 10% for
//! the download, then for video 70% tracked live across renditions and 20%
//! on completion, for images the remaining 90% on completion. The running
//! total is capped at 95 until finalisation reports 100.
//!
//! Every mutation is a `max`, so a single item's contribution can only grow.

/// Floor of the worker-owned band.
pub const BASE_PROGRESS: f64 = 30.0;

/// Points distributed across items.
pub const WORK_BAND: f64 = 70.0;

/// Running total cap before finalisation.
pub const PRE_FINALIZE_CAP: f64 = 95.0;

/// Share of an item's allotment granted after its download.
const DOWNLOAD_SHARE: f64 = 0.1;

/// Share of a video item's allotment tracked across its renditions.
const ENCODE_SHARE: f64 = 0.7;

/// Tracks how much of the working band each item has earned.
#[derive(Debug)]
pub struct ProgressLedger {
    per_item: f64,
    contributions: Vec<f64>,
}

impl ProgressLedger {
    pub fn new(total_items: usize) -> Self {
        Self {
            per_item: WORK_BAND / total_items as f64,
            contributions: vec![0.0; total_items],
        }
    }

    /// Points one item is worth.
    pub fn per_item(&self) -> f64 {
        self.per_item
    }

    /// Credit a previously-completed item during resumption.
    pub fn restore_completed(&mut self, index: usize) {
        self.raise(index, self.per_item);
    }

    /// Credit an item's download phase.
    pub fn record_download(&mut self, index: usize) {
        self.raise(index, DOWNLOAD_SHARE * self.per_item);
    }

    /// Credit live encode progress for a video item.
    ///
    /// `completed` renditions count fully; the one in flight counts by its
    /// live percentage. With no live readings the completed count alone
    /// still drives a coarse per-rendition tick.
    pub fn record_encode(&mut self, index: usize, completed: u32, total: u32, percentage: f64) {
        if total == 0 {
            return;
        }
        let fraction =
            (f64::from(completed) + percentage.clamp(0.0, 100.0) / 100.0) / f64::from(total);
        let earned = self.per_item * (DOWNLOAD_SHARE + ENCODE_SHARE * fraction.min(1.0));
        self.raise(index, earned);
    }

    /// Credit an item's full allotment once its result is recorded.
    pub fn complete_item(&mut self, index: usize) {
        self.raise(index, self.per_item);
    }

    /// Current cumulative percentage, capped below finalisation.
    pub fn percentage(&self) -> f64 {
        let sum: f64 = self.contributions.iter().sum();
        (BASE_PROGRESS + sum).min(PRE_FINALIZE_CAP)
    }

    fn raise(&mut self, index: usize, value: f64) {
        if value > self.contributions[index] {
            self.contributions[index] = value;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
    }

    #[test]
    fn test_starts_at_base() {
        let ledger = ProgressLedger::new(3);
        assert_close(ledger.percentage(), 30.0);
    }

    #[test]
    fn test_restored_item_counts_fully() {
        // One of two items already done: 30 + 70/2.
        let mut ledger = ProgressLedger::new(2);
        ledger.restore_completed(0);
        assert_close(ledger.percentage(), 65.0);
    }

    #[test]
    fn test_download_then_encode_then_complete() {
        let mut ledger = ProgressLedger::new(1);

        ledger.record_download(0);
        assert_close(ledger.percentage(), 37.0);

        // Halfway through the only rendition: 30 + 70*(0.1 + 0.7*0.5).
        ledger.record_encode(0, 0, 1, 50.0);
        assert_close(ledger.percentage(), 61.5);

        // Encode finished: 30 + 70*0.8 = 86.
        ledger.record_encode(0, 1, 1, 0.0);
        assert_close(ledger.percentage(), 86.0);

        // Completion bump hits the cap (30 + 70 clamps to 95).
        ledger.complete_item(0);
        assert_close(ledger.percentage(), 95.0);
    }

    #[test]
    fn test_encode_fraction_spans_renditions() {
        let mut ledger = ProgressLedger::new(1);
        ledger.record_download(0);

        // First of two renditions fully encoded, second untouched.
        ledger.record_encode(0, 1, 2, 0.0);
        assert_close(ledger.percentage(), 30.0 + 70.0 * (0.1 + 0.7 * 0.5));

        // Second rendition halfway: fraction 0.75.
        ledger.record_encode(0, 1, 2, 50.0);
        assert_close(ledger.percentage(), 30.0 + 70.0 * (0.1 + 0.7 * 0.75));
    }

    #[test]
    fn test_contribution_never_regresses() {
        let mut ledger = ProgressLedger::new(2);
        ledger.record_encode(0, 1, 2, 50.0);
        let before = ledger.percentage();

        // A stale lower reading must not pull the item back.
        ledger.record_encode(0, 0, 2, 10.0);
        assert_close(ledger.percentage(), before);

        ledger.record_download(0);
        assert_close(ledger.percentage(), before);
    }

    #[test]
    fn test_encode_cannot_exceed_allotted_share() {
        let mut ledger = ProgressLedger::new(2);
        // Absurd readings stay within download + encode shares.
        ledger.record_encode(0, 5, 2, 250.0);
        assert_close(ledger.percentage(), 30.0 + 35.0 * 0.8);
    }

    #[test]
    fn test_image_split() {
        // Image items: 10% on download, the rest on completion.
        let mut ledger = ProgressLedger::new(2);
        ledger.record_download(0);
        assert_close(ledger.percentage(), 33.5);
        ledger.complete_item(0);
        assert_close(ledger.percentage(), 65.0);
    }

    #[test]
    fn test_all_complete_caps_at_95() {
        let mut ledger = ProgressLedger::new(3);
        for i in 0..3 {
            ledger.complete_item(i);
        }
        assert_close(ledger.percentage(), 95.0);
    }

    #[test]
    fn test_zero_renditions_ignored() {
        let mut ledger = ProgressLedger::new(1);
        ledger.record_encode(0, 0, 0, 50.0);
        assert_close(ledger.percentage(), 30.0);
    }
}
