//! Fixed pharmacokinetic table for the five insulin classes.
//!
//! Every late-dose decision the engine makes is read from this table, including
//! the long-acting fallback that keeps the full dose instead of withholding it.

use crate::InsulinClass;

/// What to do once the late threshold for a class has passed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LatePolicy {
    /// Recommend 0 units and tell the user to monitor
    Withhold { advice: &'static str },
    /// Recommend the full dose on the next scheduled slot and involve a provider
    FullDoseNextSchedule { advice: &'static str },
}

impl LatePolicy {
    pub fn advice(&self) -> &'static str {
        match self {
            LatePolicy::Withhold { advice } | LatePolicy::FullDoseNextSchedule { advice } => advice,
        }
    }
}

/// One row of the insulin decision table
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct InsulinProfile {
    pub class: InsulinClass,
    /// Default onset when a prescription is created from the template
    pub onset_minutes: u32,
    /// Last minute (inclusive) at which a partial dose is still advised
    pub late_threshold_minutes: u32,
    /// Fraction of the prescribed dose advised between onset and threshold
    pub partial_fraction: f64,
    pub beyond_threshold: LatePolicy,
    /// Largest single dose considered safe for this class (units)
    pub max_single_dose: f64,
}

const INSULIN_TABLE: [InsulinProfile; 5] = [
    InsulinProfile {
        class: InsulinClass::Rapid,
        onset_minutes: 15,
        late_threshold_minutes: 60,
        partial_fraction: 0.60,
        beyond_threshold: LatePolicy::Withhold {
            advice: "Too late for rapid dose; monitor blood sugar closely.",
        },
        max_single_dose: 30.0,
    },
    InsulinProfile {
        class: InsulinClass::Short,
        onset_minutes: 30,
        late_threshold_minutes: 120,
        partial_fraction: 0.50,
        beyond_threshold: LatePolicy::Withhold {
            advice: "Too late for short-acting insulin; monitor blood sugar.",
        },
        max_single_dose: 40.0,
    },
    InsulinProfile {
        class: InsulinClass::Intermediate,
        onset_minutes: 90,
        late_threshold_minutes: 240,
        partial_fraction: 0.75,
        beyond_threshold: LatePolicy::Withhold {
            advice: "Missed dose; monitor blood sugar closely.",
        },
        max_single_dose: 60.0,
    },
    InsulinProfile {
        class: InsulinClass::Long,
        onset_minutes: 60,
        late_threshold_minutes: 480,
        partial_fraction: 0.50,
        beyond_threshold: LatePolicy::FullDoseNextSchedule {
            advice: "Too late for previous dose; take the full dose at the next scheduled time and consult your provider.",
        },
        max_single_dose: 80.0,
    },
    InsulinProfile {
        class: InsulinClass::Mixed,
        onset_minutes: 30,
        late_threshold_minutes: 180,
        partial_fraction: 0.70,
        beyond_threshold: LatePolicy::Withhold {
            advice: "Too late for mixed dose; monitor blood sugar.",
        },
        max_single_dose: 50.0,
    },
];

/// Single-dose ceiling applied to insulin types outside the table
pub const UNRECOGNIZED_MAX_SINGLE_DOSE: f64 = 30.0;

impl InsulinClass {
    /// Look up the table row for this class
    pub fn profile(self) -> &'static InsulinProfile {
        let idx = match self {
            InsulinClass::Rapid => 0,
            InsulinClass::Short => 1,
            InsulinClass::Intermediate => 2,
            InsulinClass::Long => 3,
            InsulinClass::Mixed => 4,
        };
        &INSULIN_TABLE[idx]
    }
}

/// The whole table, in class order
pub fn insulin_table() -> &'static [InsulinProfile] {
    &INSULIN_TABLE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_rows_match_their_class() {
        for class in InsulinClass::ALL {
            assert_eq!(class.profile().class, class);
        }
        assert_eq!(insulin_table().len(), 5);
    }

    #[test]
    fn test_thresholds_follow_onset() {
        for profile in insulin_table() {
            assert!(profile.late_threshold_minutes > profile.onset_minutes);
            assert!(profile.partial_fraction > 0.0 && profile.partial_fraction < 1.0);
        }
    }

    #[test]
    fn test_only_long_keeps_full_dose_beyond_threshold() {
        for profile in insulin_table() {
            let keeps_dose = matches!(
                profile.beyond_threshold,
                LatePolicy::FullDoseNextSchedule { .. }
            );
            assert_eq!(keeps_dose, profile.class == InsulinClass::Long);
        }
    }

    #[test]
    fn test_rapid_row() {
        let rapid = InsulinClass::Rapid.profile();
        assert_eq!(rapid.onset_minutes, 15);
        assert_eq!(rapid.late_threshold_minutes, 60);
        assert_eq!(rapid.partial_fraction, 0.60);
        assert!(rapid.beyond_threshold.advice().contains("monitor"));
    }
}
