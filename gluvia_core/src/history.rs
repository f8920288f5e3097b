//! Dose history loading over a recent window.

use crate::wal::{read_records, DoseRecord};
use crate::{Error, MealSlot, Result};
use chrono::{DateTime, Duration, NaiveDate, TimeZone, Utc};
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::Path;

pub const MIN_HISTORY_DAYS: i64 = 1;
pub const MAX_HISTORY_DAYS: i64 = 30;

/// Records from the last `period_days` days, newest first
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct DoseHistory {
    pub period_days: i64,
    pub total_entries: usize,
    pub doses: Vec<DoseRecord>,
}

/// Load dose records recorded no earlier than `days` days before `now`.
///
/// Records stamped after `now` (a pinned evaluation clock) are kept. Returns
/// records sorted by `recorded_at`, newest first.
pub fn load_recent_doses(path: &Path, days: i64, now: DateTime<Utc>) -> Result<DoseHistory> {
    if !(MIN_HISTORY_DAYS..=MAX_HISTORY_DAYS).contains(&days) {
        return Err(Error::InvalidInput(format!(
            "Days must be between {} and {}, got {}",
            MIN_HISTORY_DAYS, MAX_HISTORY_DAYS, days
        )));
    }

    let cutoff = now - Duration::days(days);
    let mut doses: Vec<DoseRecord> = read_records(path)?
        .into_iter()
        .filter(|r| r.recorded_at >= cutoff)
        .collect();

    doses.sort_by(|a, b| b.recorded_at.cmp(&a.recorded_at));

    tracing::info!("Loaded {} dose records from last {} days", doses.len(), days);

    Ok(DoseHistory {
        period_days: days,
        total_entries: doses.len(),
        doses,
    })
}

/// Latest record per meal on `date`, as seen in the `tz` time zone
pub fn latest_per_meal<'a, Tz: TimeZone>(
    records: &'a [DoseRecord],
    date: NaiveDate,
    tz: &Tz,
) -> BTreeMap<MealSlot, &'a DoseRecord> {
    let mut latest: BTreeMap<MealSlot, &DoseRecord> = BTreeMap::new();

    for record in records {
        if record.recorded_at.with_timezone(tz).date_naive() != date {
            continue;
        }
        match latest.get(&record.meal) {
            Some(existing) if existing.recorded_at >= record.recorded_at => {}
            _ => {
                latest.insert(record.meal, record);
            }
        }
    }

    latest
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wal::{dose_log_path, DoseLogSink, DoseStatus, JsonlSink};
    use uuid::Uuid;

    fn record(meal: MealSlot, recorded_at: DateTime<Utc>, units: f64) -> DoseRecord {
        DoseRecord {
            id: Uuid::new_v4(),
            meal,
            insulin_name: "Humalog".into(),
            insulin_class: "rapid".into(),
            prescribed_dose: 10.0,
            actual_dose: Some(units),
            status: DoseStatus::Taken,
            recorded_at,
            gap_minutes: None,
            recommended_dose: None,
            advice: String::new(),
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_window_and_ordering() {
        let dir = tempfile::tempdir().unwrap();
        let path = dose_log_path(dir.path());
        let mut sink = JsonlSink::new(&path);

        sink.append(&record(MealSlot::Breakfast, now() - Duration::days(5), 10.0))
            .unwrap();
        sink.append(&record(MealSlot::Lunch, now() - Duration::days(1), 11.0))
            .unwrap();
        sink.append(&record(MealSlot::Dinner, now() - Duration::days(10), 12.0))
            .unwrap();

        let history = load_recent_doses(&path, 7, now()).unwrap();
        assert_eq!(history.period_days, 7);
        assert_eq!(history.total_entries, 2);
        assert_eq!(history.doses[0].meal, MealSlot::Lunch);
        assert_eq!(history.doses[1].meal, MealSlot::Breakfast);
    }

    #[test]
    fn test_records_after_now_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        let path = dose_log_path(dir.path());
        let mut sink = JsonlSink::new(&path);

        sink.append(&record(MealSlot::Dinner, now() + Duration::hours(6), 20.0))
            .unwrap();

        let history = load_recent_doses(&path, 1, now()).unwrap();
        assert_eq!(history.total_entries, 1);
    }

    #[test]
    fn test_days_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dose_log_path(dir.path());

        for days in [0, 31, -3] {
            assert!(matches!(
                load_recent_doses(&path, days, now()),
                Err(Error::InvalidInput(_))
            ));
        }
        assert!(load_recent_doses(&path, 30, now()).unwrap().doses.is_empty());
    }

    #[test]
    fn test_latest_per_meal_keeps_newest_same_day() {
        let today = now().date_naive();
        let records = vec![
            record(MealSlot::Breakfast, now() - Duration::hours(3), 10.0),
            record(MealSlot::Breakfast, now() - Duration::hours(2), 12.0),
            record(MealSlot::Lunch, now() - Duration::hours(1), 15.0),
            record(MealSlot::Dinner, now() - Duration::days(1), 20.0),
        ];

        let latest = latest_per_meal(&records, today, &Utc);
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&MealSlot::Breakfast].actual_dose, Some(12.0));
        assert_eq!(latest[&MealSlot::Lunch].actual_dose, Some(15.0));
        assert!(!latest.contains_key(&MealSlot::Dinner));
    }
}
