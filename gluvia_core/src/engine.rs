//! Dose advisory engine.
//!
//! Evaluates one meal at a time against its prescription entry:
//!
//! 1. **No response** → not logged, take the prescribed dose as usual
//! 2. **Meal skipped** → 0 units now, eat first
//! 3. **Dose taken** → compare actual against prescribed (correct / over / under)
//! 4. **Dose missed** → needs the meal time; the gap since the meal is checked
//!    against the entry's onset and then against the insulin decision table
//!
//! Per-meal results are folded into a [`Summary`] whose risk triggers
//! (multiple overdoses, excess units) are reported independently.

use crate::insulin::LatePolicy;
use crate::zone::{is_past_or_current, minutes_elapsed};
use crate::{
    format_units, AdvisoryResult, DoseResponse, InsulinType, MealCount, PrescriptionEntry,
    StatusKind,
};
use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of overdosed meals that triggers the critical warning
pub const OVERDOSE_COUNT_THRESHOLD: usize = 2;

/// Total excess units above which the excess warning fires (strictly greater)
pub const EXCESS_UNITS_THRESHOLD: f64 = 10.0;

const DOSE_TOLERANCE: f64 = 1e-9;

/// Recommended action for a dose that was not taken
#[derive(Clone, Debug, PartialEq)]
pub struct MissedDoseAdvice {
    pub status: StatusKind,
    pub dose: f64,
    pub advice: String,
}

/// Decide what to take for a missed dose, `gap_minutes` after the meal.
///
/// Within the onset window (inclusive) the full dose is always advised. Past
/// it, the insulin class decides between a partial dose and its
/// beyond-threshold policy.
pub fn adjust_missed_dose(
    insulin_type: &InsulinType,
    prescribed_dose: f64,
    onset_minutes: u32,
    gap_minutes: u32,
) -> MissedDoseAdvice {
    if gap_minutes <= onset_minutes {
        return MissedDoseAdvice {
            status: StatusKind::MissedWithinOnset,
            dose: prescribed_dose,
            advice: format!(
                "Take full dose now ({} units) - within onset period.",
                format_units(prescribed_dose)
            ),
        };
    }

    let Some(class) = insulin_type.class() else {
        return MissedDoseAdvice {
            status: StatusKind::UnknownType,
            dose: 0.0,
            advice: format!(
                "Unknown insulin type '{}' - consult your healthcare provider.",
                insulin_type
            ),
        };
    };

    let profile = class.profile();

    if gap_minutes <= profile.late_threshold_minutes {
        let partial = prescribed_dose * profile.partial_fraction;
        return MissedDoseAdvice {
            status: StatusKind::MissedLatePartial,
            dose: partial,
            advice: format!(
                "Take partial dose ({} units) now (after onset).",
                format_units(partial)
            ),
        };
    }

    match profile.beyond_threshold {
        LatePolicy::Withhold { advice } => MissedDoseAdvice {
            status: StatusKind::MissedLateNone,
            dose: 0.0,
            advice: advice.to_string(),
        },
        LatePolicy::FullDoseNextSchedule { advice } => MissedDoseAdvice {
            status: StatusKind::MissedLongFollowup,
            dose: prescribed_dose,
            advice: advice.to_string(),
        },
    }
}

/// Evaluate one meal.
///
/// `response` is `None` when the user gave no answer for this meal. `now` must
/// be the same instant for every meal of one evaluation.
pub fn evaluate_meal(
    entry: &PrescriptionEntry,
    response: Option<&DoseResponse>,
    now: NaiveTime,
) -> AdvisoryResult {
    let prescribed = entry.prescribed_dose;
    let past_or_current = is_past_or_current(entry.meal, now);

    let mut result = AdvisoryResult {
        meal: entry.meal,
        status: StatusKind::NotLogged,
        recommended_dose: None,
        advice: String::new(),
        actual_dose: None,
        gap_minutes: None,
        excess_units: 0.0,
        is_past_or_current: past_or_current,
    };

    let Some(response) = response else {
        result.recommended_dose = Some(prescribed);
        result.advice = if past_or_current {
            format!(
                "Take {} units as usual; please update your dose status.",
                format_units(prescribed)
            )
        } else {
            format!("Take {} units as usual when the time comes.", format_units(prescribed))
        };
        return result;
    };

    if !response.meal_taken {
        result.status = StatusKind::MealSkipped;
        result.recommended_dose = Some(0.0);
        result.advice = format!(
            "Eat first, then take your {} units.",
            format_units(prescribed)
        );
        tracing::debug!("{}: meal skipped", entry.meal);
        return result;
    }

    if response.dose_was_taken() {
        let actual = response.actual_dose.unwrap_or(prescribed);
        result.actual_dose = Some(actual);

        if (actual - prescribed).abs() <= DOSE_TOLERANCE {
            result.status = StatusKind::CorrectDose;
            result.advice = format!("Took {} units as prescribed.", format_units(actual));
        } else if actual > prescribed {
            let excess = actual - prescribed;
            result.status = StatusKind::Overdose;
            result.excess_units = excess;
            result.advice = format!(
                "You took {} units, which is {} units MORE than prescribed ({}). Monitor blood sugar closely!",
                format_units(actual),
                format_units(excess),
                format_units(prescribed)
            );
            tracing::warn!(
                "{}: overdose of {} units ({} taken, {} prescribed)",
                entry.meal,
                excess,
                actual,
                prescribed
            );
        } else {
            result.status = StatusKind::Underdose;
            result.advice = format!(
                "You took {} units, which is LESS than prescribed ({}). Monitor sugar levels.",
                format_units(actual),
                format_units(prescribed)
            );
        }
        return result;
    }

    let Some(meal_time) = response.reported_meal_time else {
        result.status = StatusKind::AwaitingMealTime;
        result.advice = "Enter the time you had this meal (HH:MM) to get dose advice.".into();
        return result;
    };

    let gap = minutes_elapsed(meal_time, now);
    let missed = adjust_missed_dose(&entry.insulin_type, prescribed, entry.onset_minutes, gap);

    tracing::debug!(
        "{}: missed dose, {} min since meal -> {:?} ({} units)",
        entry.meal,
        gap,
        missed.status,
        missed.dose
    );

    result.status = missed.status;
    result.recommended_dose = Some(missed.dose);
    result.advice = missed.advice;
    result.gap_minutes = Some(gap);
    result
}

// ============================================================================
// Aggregation
// ============================================================================

/// Aggregate over all meals of one evaluation
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct Summary {
    pub total_meals_processed: usize,
    pub overdoses_detected: usize,
    /// Sum of `actual - prescribed` over overdosed meals, unrounded
    pub total_excess_units: f64,
    pub requires_medical_attention: bool,
}

/// Whether an overdose pattern needs medical attention
pub fn requires_medical_attention(overdoses_detected: usize, total_excess_units: f64) -> bool {
    overdoses_detected >= OVERDOSE_COUNT_THRESHOLD || total_excess_units > EXCESS_UNITS_THRESHOLD
}

/// Summarize results, counting meals the user submitted a response for
pub fn summarize(results: &[AdvisoryResult]) -> Summary {
    summarize_with(results, MealCount::Submitted)
}

/// Summarize results with an explicit meal counting convention
pub fn summarize_with(results: &[AdvisoryResult], count: MealCount) -> Summary {
    let total_meals_processed = match count {
        MealCount::Submitted => results
            .iter()
            .filter(|r| r.status != StatusKind::NotLogged)
            .count(),
        MealCount::Visited => results.iter().filter(|r| r.is_past_or_current).count(),
    };

    let mut excesses: Vec<f64> = results
        .iter()
        .filter(|r| r.status == StatusKind::Overdose)
        .map(|r| r.excess_units)
        .collect();

    // Sum in a fixed order so permuted input gives bit-identical totals
    excesses.sort_by(f64::total_cmp);
    let overdoses_detected = excesses.len();
    let total_excess_units: f64 = excesses.iter().sum();

    Summary {
        total_meals_processed,
        overdoses_detected,
        total_excess_units,
        requires_medical_attention: requires_medical_attention(
            overdoses_detected,
            total_excess_units,
        ),
    }
}

/// Independent risk triggers raised by a summary
#[derive(Clone, Debug, PartialEq)]
pub enum RiskWarning {
    /// Two or more meals were overdosed
    MultipleOverdoses { count: usize, total_excess_units: f64 },
    /// More than the threshold of excess units in total
    ExcessUnits { total_excess_units: f64 },
}

impl RiskWarning {
    /// User-facing lines for this warning
    pub fn messages(&self) -> Vec<String> {
        match self {
            RiskWarning::MultipleOverdoses {
                count,
                total_excess_units,
            } => vec![
                format!("CRITICAL: Multiple overdoses detected ({} meals)!", count),
                format!(
                    "Total excess insulin: {} units - contact doctor immediately!",
                    format_units(*total_excess_units)
                ),
            ],
            RiskWarning::ExcessUnits { total_excess_units } => vec![
                format!(
                    "WARNING: High excess insulin detected ({} units)",
                    format_units(*total_excess_units)
                ),
                "Monitor blood sugar every 30 minutes!".to_string(),
            ],
        }
    }
}

impl fmt::Display for RiskWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.messages().join(" "))
    }
}

impl Summary {
    /// Risk warnings, each trigger evaluated on its own
    pub fn risk_warnings(&self) -> Vec<RiskWarning> {
        let mut warnings = Vec::new();

        if self.overdoses_detected >= OVERDOSE_COUNT_THRESHOLD {
            warnings.push(RiskWarning::MultipleOverdoses {
                count: self.overdoses_detected,
                total_excess_units: self.total_excess_units,
            });
        }

        if self.total_excess_units > EXCESS_UNITS_THRESHOLD {
            warnings.push(RiskWarning::ExcessUnits {
                total_excess_units: self.total_excess_units,
            });
        }

        warnings
    }
}

/// Per-meal overdose line, `None` unless the result is an overdose
pub fn overdose_warning(result: &AdvisoryResult) -> Option<String> {
    (result.status == StatusKind::Overdose).then(|| {
        format!(
            "{}: OVERDOSE of {} units detected!",
            result.meal.label(),
            format_units(result.excess_units)
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{InsulinClass, MealSlot};

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    fn entry(class: InsulinClass, dose: f64) -> PrescriptionEntry {
        PrescriptionEntry {
            meal: MealSlot::Breakfast,
            insulin_name: "Test".into(),
            insulin_type: class.into(),
            prescribed_dose: dose,
            onset_minutes: class.profile().onset_minutes,
        }
    }

    /// Evaluate a missed breakfast dose `gap` minutes after an 08:00 meal
    fn missed_after(class: InsulinClass, dose: f64, gap: u32) -> AdvisoryResult {
        let meal_time = t(8, 0);
        let now = meal_time + chrono::Duration::minutes(gap as i64);
        let response = DoseResponse::missed(MealSlot::Breakfast, Some(meal_time));
        evaluate_meal(&entry(class, dose), Some(&response), now)
    }

    #[test]
    fn test_not_logged_recommends_prescribed() {
        crate::logging::init_test();
        let result = evaluate_meal(&entry(InsulinClass::Rapid, 10.0), None, t(7, 0));
        assert_eq!(result.status, StatusKind::NotLogged);
        assert_eq!(result.recommended_dose, Some(10.0));
        assert!(result.advice.contains("as usual"));
    }

    #[test]
    fn test_gap_equal_to_onset_is_full_dose() {
        for class in InsulinClass::ALL {
            let onset = class.profile().onset_minutes;
            let result = missed_after(class, 10.0, onset);
            assert_eq!(result.status, StatusKind::MissedWithinOnset, "{:?}", class);
            assert_eq!(result.recommended_dose, Some(10.0), "{:?}", class);
        }
    }

    #[test]
    fn test_rapid_partial_at_threshold() {
        let result = missed_after(InsulinClass::Rapid, 10.0, 60);
        assert_eq!(result.status, StatusKind::MissedLatePartial);
        assert!((result.recommended_dose.unwrap() - 6.0).abs() < 1e-9);
        assert!(result.advice.contains("6.0"));
    }

    #[test]
    fn test_rapid_beyond_threshold_withholds() {
        let result = missed_after(InsulinClass::Rapid, 10.0, 61);
        assert_eq!(result.status, StatusKind::MissedLateNone);
        assert_eq!(result.recommended_dose, Some(0.0));
        assert!(result.advice.contains("monitor"));
    }

    #[test]
    fn test_long_beyond_threshold_keeps_full_dose() {
        let result = missed_after(InsulinClass::Long, 20.0, 481);
        assert_eq!(result.status, StatusKind::MissedLongFollowup);
        assert_eq!(result.recommended_dose, Some(20.0));
        assert!(result.advice.contains("provider"));
    }

    #[test]
    fn test_other_classes_withhold_beyond_threshold() {
        for class in [
            InsulinClass::Rapid,
            InsulinClass::Short,
            InsulinClass::Intermediate,
            InsulinClass::Mixed,
        ] {
            let beyond = class.profile().late_threshold_minutes + 1;
            let result = missed_after(class, 20.0, beyond);
            assert_eq!(result.status, StatusKind::MissedLateNone, "{:?}", class);
            assert_eq!(result.recommended_dose, Some(0.0), "{:?}", class);
        }
    }

    #[test]
    fn test_partial_fractions() {
        let cases = [
            (InsulinClass::Short, 100, 5.0),
            (InsulinClass::Intermediate, 200, 7.5),
            (InsulinClass::Long, 300, 5.0),
            (InsulinClass::Mixed, 150, 7.0),
        ];
        for (class, gap, expected) in cases {
            let result = missed_after(class, 10.0, gap);
            assert_eq!(result.status, StatusKind::MissedLatePartial, "{:?}", class);
            assert!((result.recommended_dose.unwrap() - expected).abs() < 1e-9);
        }
    }

    #[test]
    fn test_unknown_type_beyond_onset() {
        let mut e = entry(InsulinClass::Rapid, 10.0);
        e.insulin_type = InsulinType::parse("ultra-rapid");
        let response = DoseResponse::missed(MealSlot::Breakfast, Some(t(8, 0)));

        let late = evaluate_meal(&e, Some(&response), t(9, 0));
        assert_eq!(late.status, StatusKind::UnknownType);
        assert_eq!(late.recommended_dose, Some(0.0));
        assert!(late.advice.contains("provider"));

        let early = evaluate_meal(&e, Some(&response), t(8, 10));
        assert_eq!(early.status, StatusKind::MissedWithinOnset);
        assert_eq!(early.recommended_dose, Some(10.0));
    }

    #[test]
    fn test_meal_skipped_short_circuits() {
        let mut response = DoseResponse::taken(MealSlot::Breakfast, 50.0);
        response.meal_taken = false;
        response.reported_meal_time = Some(t(3, 0));

        let result = evaluate_meal(&entry(InsulinClass::Rapid, 10.0), Some(&response), t(9, 0));
        assert_eq!(result.status, StatusKind::MealSkipped);
        assert_eq!(result.recommended_dose, Some(0.0));
        assert_eq!(result.excess_units, 0.0);
    }

    #[test]
    fn test_taken_dose_classification() {
        let e = entry(InsulinClass::Rapid, 10.0);

        let correct = evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 10.0)), t(9, 0));
        assert_eq!(correct.status, StatusKind::CorrectDose);

        let over = evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 15.0)), t(9, 0));
        assert_eq!(over.status, StatusKind::Overdose);
        assert_eq!(over.excess_units, 5.0);

        let under = evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 6.0)), t(9, 0));
        assert_eq!(under.status, StatusKind::Underdose);
        assert_eq!(under.excess_units, 0.0);
    }

    #[test]
    fn test_taken_without_amount_assumes_prescribed() {
        let mut response = DoseResponse::taken(MealSlot::Breakfast, 0.0);
        response.actual_dose = None;
        let result = evaluate_meal(&entry(InsulinClass::Rapid, 10.0), Some(&response), t(9, 0));
        assert_eq!(result.status, StatusKind::CorrectDose);
        assert_eq!(result.actual_dose, Some(10.0));
    }

    #[test]
    fn test_missed_without_time_asks_for_it() {
        let response = DoseResponse::missed(MealSlot::Breakfast, None);
        let result = evaluate_meal(&entry(InsulinClass::Rapid, 10.0), Some(&response), t(9, 0));
        assert_eq!(result.status, StatusKind::AwaitingMealTime);
        assert_eq!(result.recommended_dose, None);
        assert!(result.advice.contains("HH:MM"));
    }

    #[test]
    fn test_meal_time_after_now_is_previous_day() {
        let mut e = entry(InsulinClass::Intermediate, 10.0);
        e.meal = MealSlot::Snack;
        let response = DoseResponse::missed(MealSlot::Snack, Some(t(23, 0)));

        let result = evaluate_meal(&e, Some(&response), t(0, 30));
        assert_eq!(result.gap_minutes, Some(90));
        assert_eq!(result.status, StatusKind::MissedWithinOnset);
    }

    #[test]
    fn test_requires_medical_attention() {
        assert!(requires_medical_attention(2, 3.0));
        assert!(requires_medical_attention(1, 11.0));
        assert!(!requires_medical_attention(1, 5.0));
        assert!(!requires_medical_attention(1, 10.0));
    }

    #[test]
    fn test_risk_warnings_fire_independently() {
        let both = Summary {
            total_meals_processed: 3,
            overdoses_detected: 2,
            total_excess_units: 12.0,
            requires_medical_attention: true,
        };
        assert_eq!(both.risk_warnings().len(), 2);

        let count_only = Summary {
            total_excess_units: 4.0,
            ..both.clone()
        };
        assert!(matches!(
            count_only.risk_warnings().as_slice(),
            [RiskWarning::MultipleOverdoses { count: 2, .. }]
        ));

        let excess_only = Summary {
            overdoses_detected: 1,
            ..both
        };
        let warnings = excess_only.risk_warnings();
        assert!(matches!(warnings.as_slice(), [RiskWarning::ExcessUnits { .. }]));
        assert!(warnings[0]
            .messages()
            .contains(&"Monitor blood sugar every 30 minutes!".to_string()));
    }

    #[test]
    fn test_overdose_warning_text() {
        let e = entry(InsulinClass::Rapid, 10.0);
        let over = evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 15.0)), t(9, 0));
        assert_eq!(
            overdose_warning(&over).unwrap(),
            "BREAKFAST: OVERDOSE of 5.0 units detected!"
        );

        let correct = evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 10.0)), t(9, 0));
        assert!(overdose_warning(&correct).is_none());
    }

    #[test]
    fn test_summarize_counting_conventions() {
        let e = entry(InsulinClass::Rapid, 10.0);
        let now = t(9, 0);
        let mut lunch = e.clone();
        lunch.meal = MealSlot::Lunch;

        let results = vec![
            evaluate_meal(&e, Some(&DoseResponse::taken(MealSlot::Breakfast, 10.0)), now),
            evaluate_meal(&lunch, None, now),
        ];

        assert_eq!(summarize_with(&results, MealCount::Submitted).total_meals_processed, 1);
        // lunch is still in the future at 09:00
        assert_eq!(summarize_with(&results, MealCount::Visited).total_meals_processed, 1);

        let results_after_lunch = vec![
            evaluate_meal(&e, None, t(13, 0)),
            evaluate_meal(&lunch, None, t(13, 0)),
        ];
        assert_eq!(summarize(&results_after_lunch).total_meals_processed, 0);
        assert_eq!(
            summarize_with(&results_after_lunch, MealCount::Visited).total_meals_processed,
            2
        );
    }
}
