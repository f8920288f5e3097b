//! Safety checks on reported insulin doses.
//!
//! These never reject a submission: each check returns warnings that are
//! shown next to the advisory results.

use crate::insulin::UNRECOGNIZED_MAX_SINGLE_DOSE;
use crate::{format_units, InsulinType, MealSlot};
use std::fmt;

/// Any single dose above this is dangerous regardless of class
pub const ABSOLUTE_MAX_SINGLE_DOSE: f64 = 200.0;

/// Multiplier over the class limit at which a dose is dangerously high
pub const DANGER_FACTOR: f64 = 1.5;

/// Total units per day
pub const MAX_DAILY_TOTAL: f64 = 200.0;

/// Rapid plus short acting units per day
pub const MAX_BOLUS_DAILY: f64 = 100.0;

/// A dose that was actually injected, as seen by the daily checks
#[derive(Clone, Debug, PartialEq)]
pub struct TakenDose {
    pub meal: MealSlot,
    pub insulin_type: InsulinType,
    pub units: f64,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SafetyWarning {
    /// Zero or negative units reported as taken
    InvalidDose { meal: MealSlot, units: f64 },
    /// Above the single-dose limit for the insulin class
    ExceedsClassLimit {
        meal: MealSlot,
        units: f64,
        insulin_type: InsulinType,
        limit: f64,
    },
    /// Far above the class limit, or above the absolute ceiling
    DangerouslyHigh { meal: MealSlot, units: f64 },
    DailyTotalExceeded { total: f64 },
    FastActingTotalExceeded { total: f64 },
}

impl fmt::Display for SafetyWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SafetyWarning::InvalidDose { meal, units } => write!(
                f,
                "{}: reported dose of {} units is not valid - dose must be greater than 0",
                meal.label(),
                format_units(*units)
            ),
            SafetyWarning::ExceedsClassLimit {
                meal,
                units,
                insulin_type,
                limit,
            } => write!(
                f,
                "CRITICAL: {} units at {} exceeds safe limit for {} insulin ({} units)",
                format_units(*units),
                meal,
                insulin_type,
                format_units(*limit)
            ),
            SafetyWarning::DangerouslyHigh { meal, units } => write!(
                f,
                "DANGER: {} units at {} is dangerously high - contact doctor immediately",
                format_units(*units),
                meal
            ),
            SafetyWarning::DailyTotalExceeded { total } => write!(
                f,
                "CRITICAL: Daily total {} units exceeds safe limit ({} units)",
                format_units(*total),
                format_units(MAX_DAILY_TOTAL)
            ),
            SafetyWarning::FastActingTotalExceeded { total } => write!(
                f,
                "WARNING: Fast-acting insulin total {} units exceeds recommended daily limit ({} units)",
                format_units(*total),
                format_units(MAX_BOLUS_DAILY)
            ),
        }
    }
}

/// Largest safe single dose for an insulin type
pub fn max_single_dose(insulin_type: &InsulinType) -> f64 {
    insulin_type
        .class()
        .map(|class| class.profile().max_single_dose)
        .unwrap_or(UNRECOGNIZED_MAX_SINGLE_DOSE)
}

/// Check one taken dose against its class limit
pub fn check_single_dose(dose: &TakenDose) -> Vec<SafetyWarning> {
    let mut warnings = Vec::new();

    if dose.units <= 0.0 {
        warnings.push(SafetyWarning::InvalidDose {
            meal: dose.meal,
            units: dose.units,
        });
        return warnings;
    }

    let limit = max_single_dose(&dose.insulin_type);

    if dose.units > limit {
        warnings.push(SafetyWarning::ExceedsClassLimit {
            meal: dose.meal,
            units: dose.units,
            insulin_type: dose.insulin_type.clone(),
            limit,
        });
    }

    if dose.units > limit * DANGER_FACTOR || dose.units > ABSOLUTE_MAX_SINGLE_DOSE {
        tracing::error!(
            "Dangerously high dose reported for {}: {} units",
            dose.meal,
            dose.units
        );
        warnings.push(SafetyWarning::DangerouslyHigh {
            meal: dose.meal,
            units: dose.units,
        });
    }

    warnings
}

/// Check the day's taken doses against the daily totals
pub fn check_daily_total(doses: &[TakenDose]) -> Vec<SafetyWarning> {
    let mut warnings = Vec::new();

    let positive = doses.iter().filter(|d| d.units > 0.0);
    let total: f64 = positive.clone().map(|d| d.units).sum();
    let fast_acting: f64 = positive
        .filter(|d| d.insulin_type.class().is_some_and(|c| c.is_fast_acting()))
        .map(|d| d.units)
        .sum();

    if total > MAX_DAILY_TOTAL {
        warnings.push(SafetyWarning::DailyTotalExceeded { total });
    }

    if fast_acting > MAX_BOLUS_DAILY {
        warnings.push(SafetyWarning::FastActingTotalExceeded { total: fast_acting });
    }

    warnings
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::InsulinClass;

    fn dose(class: InsulinClass, units: f64) -> TakenDose {
        TakenDose {
            meal: MealSlot::Breakfast,
            insulin_type: class.into(),
            units,
        }
    }

    #[test]
    fn test_normal_dose_has_no_warnings() {
        assert!(check_single_dose(&dose(InsulinClass::Rapid, 10.0)).is_empty());
        assert!(check_single_dose(&dose(InsulinClass::Rapid, 25.0)).is_empty());
    }

    #[test]
    fn test_dose_over_class_limit() {
        let warnings = check_single_dose(&dose(InsulinClass::Rapid, 35.0));
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].to_string().contains("CRITICAL"));
    }

    #[test]
    fn test_dangerously_high_dose() {
        let warnings = check_single_dose(&dose(InsulinClass::Rapid, 50.0));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SafetyWarning::DangerouslyHigh { .. })));

        let warnings = check_single_dose(&dose(InsulinClass::Long, 250.0));
        assert!(warnings
            .iter()
            .any(|w| matches!(w, SafetyWarning::DangerouslyHigh { .. })));
    }

    #[test]
    fn test_zero_and_negative_doses() {
        for units in [0.0, -5.0] {
            let warnings = check_single_dose(&dose(InsulinClass::Rapid, units));
            assert!(matches!(
                warnings.as_slice(),
                [SafetyWarning::InvalidDose { .. }]
            ));
        }
    }

    #[test]
    fn test_unrecognized_type_uses_default_limit() {
        let d = TakenDose {
            meal: MealSlot::Lunch,
            insulin_type: InsulinType::parse("experimental"),
            units: 31.0,
        };
        assert_eq!(check_single_dose(&d).len(), 1);
    }

    #[test]
    fn test_daily_total_normal() {
        let doses = [
            dose(InsulinClass::Rapid, 10.0),
            dose(InsulinClass::Short, 15.0),
            dose(InsulinClass::Long, 20.0),
        ];
        assert!(check_daily_total(&doses).is_empty());
    }

    #[test]
    fn test_daily_total_exceeded() {
        let doses = [
            dose(InsulinClass::Rapid, 100.0),
            dose(InsulinClass::Short, 80.0),
            dose(InsulinClass::Long, 50.0),
        ];
        let warnings = check_daily_total(&doses);
        assert!(matches!(
            warnings[0],
            SafetyWarning::DailyTotalExceeded { total } if total == 230.0
        ));
        // rapid + short = 180 also trips the bolus limit
        assert_eq!(warnings.len(), 2);
    }

    #[test]
    fn test_fast_acting_limit_only() {
        let doses = [
            dose(InsulinClass::Rapid, 60.0),
            dose(InsulinClass::Short, 50.0),
            dose(InsulinClass::Long, 20.0),
        ];
        let warnings = check_daily_total(&doses);
        assert_eq!(
            warnings,
            vec![SafetyWarning::FastActingTotalExceeded { total: 110.0 }]
        );
    }
}
