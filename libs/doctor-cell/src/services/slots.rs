use chrono::{Duration, NaiveDate};
use tracing::{debug, warn};

use shared_config::{AppConfig, DEFAULT_SLOT_DURATION_MINUTES, MAX_SLOT_DURATION_MINUTES};

use crate::models::{day_of_week, AvailabilityWindow, CandidateSlot};

/// Cuts availability windows into fixed-length candidate slots.
///
/// Slots start at the window start and advance by the slot length; a trailing
/// remainder shorter than one slot is dropped, so a window shorter than the
/// slot length yields nothing.
#[derive(Debug, Clone, Copy)]
pub struct SlotGenerator {
    slot_length: Duration,
}

impl Default for SlotGenerator {
    fn default() -> Self {
        Self::new(DEFAULT_SLOT_DURATION_MINUTES)
    }
}

impl SlotGenerator {
    pub fn new(slot_minutes: i64) -> Self {
        let slot_minutes = if (1..=MAX_SLOT_DURATION_MINUTES).contains(&slot_minutes) {
            slot_minutes
        } else {
            warn!(
                "Slot length must be 1..={} minutes, got {} - using {}",
                MAX_SLOT_DURATION_MINUTES, slot_minutes, DEFAULT_SLOT_DURATION_MINUTES
            );
            DEFAULT_SLOT_DURATION_MINUTES
        };

        Self {
            slot_length: Duration::minutes(slot_minutes),
        }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(config.slot_duration_minutes)
    }

    pub fn slot_minutes(&self) -> i64 {
        self.slot_length.num_minutes()
    }

    /// Candidate slots for `date`, concatenated in window order.
    ///
    /// Windows for other weekdays and malformed windows are skipped.
    pub fn generate(&self, date: NaiveDate, windows: &[AvailabilityWindow]) -> Vec<CandidateSlot> {
        let weekday = day_of_week(date);
        let mut slots = Vec::new();

        for window in windows {
            if window.day_of_week != weekday {
                debug!("Skipping window {} for day {} while generating day {}", window.id, window.day_of_week, weekday);
                continue;
            }
            if !window.is_valid() {
                warn!("Skipping malformed availability window {} ({} - {})", window.id, window.start_time, window.end_time);
                continue;
            }

            slots.extend(self.slots_for_window(date, window));
        }

        debug!("Generated {} candidate slots for {}", slots.len(), date);
        slots
    }

    pub fn slots_for_window(&self, date: NaiveDate, window: &AvailabilityWindow) -> Vec<CandidateSlot> {
        let window_end = window.ends_at(date);
        let mut current_start = window.starts_at(date);
        let mut slots = Vec::new();

        while let Some(slot_end) = current_start
            .checked_add_signed(self.slot_length)
            .filter(|end| *end <= window_end)
        {
            slots.push(CandidateSlot {
                start_time: current_start,
                end_time: slot_end,
            });
            current_start = slot_end;
        }

        slots
    }
}
