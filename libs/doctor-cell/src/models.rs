use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Directory entry for a doctor; its id is the doctor's user id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub full_name: String,
    pub specialty: String,
}

/// Recurring weekly block during which a doctor accepts appointments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailabilityWindow {
    pub id: Uuid,
    pub doctor_id: Uuid,
    pub day_of_week: u8, // 0 = Sunday, 1 = Monday, etc.
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

impl AvailabilityWindow {
    pub fn is_valid(&self) -> bool {
        self.day_of_week <= 6 && self.start_time < self.end_time
    }

    /// Window start anchored on `date`.
    pub fn starts_at(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.start_time).and_utc()
    }

    /// Window end anchored on `date`.
    pub fn ends_at(&self, date: NaiveDate) -> DateTime<Utc> {
        date.and_time(self.end_time).and_utc()
    }

    /// Whether `[start, end)` falls inside this window on the window's weekday.
    pub fn covers(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> bool {
        let date = start.date_naive();
        // Windows never cross midnight.
        if end.date_naive() != date {
            return false;
        }

        day_of_week(date) == self.day_of_week
            && shared_utils::interval::interval_contains(self.starts_at(date), self.ends_at(date), start, end)
    }
}

/// Ephemeral `[start_time, end_time)` interval offered for booking. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CandidateSlot {
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
}

impl CandidateSlot {
    pub fn duration_minutes(&self) -> i64 {
        (self.end_time - self.start_time).num_minutes()
    }
}

/// Day-of-week index used by availability windows (Sunday = 0).
pub fn day_of_week(date: NaiveDate) -> u8 {
    date.weekday().num_days_from_sunday() as u8
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateWindowRequest {
    pub day_of_week: u8,
    pub start_time: NaiveTime,
    pub end_time: NaiveTime,
}

/// Registers a doctor. `doctor_id` may only be chosen by an admin;
/// a doctor always registers under their own user id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDoctorRequest {
    pub doctor_id: Option<Uuid>,
    pub full_name: String,
    pub specialty: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorSearchQuery {
    pub specialty: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorProfileResponse {
    pub doctor: Doctor,
    pub windows: Vec<AvailabilityWindow>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoctorScheduleResponse {
    pub doctor_id: Uuid,
    pub windows: Vec<AvailabilityWindow>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(day: u8, start: (u32, u32), end: (u32, u32)) -> AvailabilityWindow {
        AvailabilityWindow {
            id: Uuid::new_v4(),
            doctor_id: Uuid::new_v4(),
            day_of_week: day,
            start_time: NaiveTime::from_hms_opt(start.0, start.1, 0).unwrap(),
            end_time: NaiveTime::from_hms_opt(end.0, end.1, 0).unwrap(),
        }
    }

    #[test]
    fn sunday_is_zero() {
        let sunday = NaiveDate::from_ymd_opt(2030, 1, 6).unwrap();
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        assert_eq!(day_of_week(sunday), 0);
        assert_eq!(day_of_week(monday), 1);
    }

    #[test]
    fn inverted_window_is_invalid() {
        assert!(window(1, (9, 0), (12, 0)).is_valid());
        assert!(!window(1, (12, 0), (9, 0)).is_valid());
        assert!(!window(7, (9, 0), (12, 0)).is_valid());
    }

    #[test]
    fn covers_checks_weekday_and_bounds() {
        let monday = NaiveDate::from_ymd_opt(2030, 1, 7).unwrap();
        let at = |h, m| monday.and_hms_opt(h, m, 0).unwrap().and_utc();
        let morning = window(1, (9, 0), (12, 0));

        assert!(morning.covers(at(9, 0), at(9, 30)));
        assert!(morning.covers(at(11, 30), at(12, 0)));
        assert!(!morning.covers(at(11, 45), at(12, 15)));
        assert!(!window(2, (9, 0), (12, 0)).covers(at(9, 0), at(9, 30)));
    }
}
