//! Core domain types for the Gluvia dose advisory system.
//!
//! This module defines the fundamental types used throughout the system:
//! - Meal slots and the configurable slot sets
//! - Insulin classes as prescribed
//! - Prescription entries and per-meal dose responses
//! - Advisory results produced by the engine

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Meal Slots
// ============================================================================

/// One of the canonical meal slots, in day order.
///
/// The derived ordering is the canonical schedule order and is used to decide
/// whether a meal is past or current relative to the active meal zone.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum MealSlot {
    Breakfast,
    MidMorning,
    Lunch,
    Dinner,
    Snack,
}

impl MealSlot {
    /// All five slots in canonical order
    pub const ALL: [MealSlot; 5] = [
        MealSlot::Breakfast,
        MealSlot::MidMorning,
        MealSlot::Lunch,
        MealSlot::Dinner,
        MealSlot::Snack,
    ];

    /// Wire key used in prescriptions and questionnaire input
    pub fn as_str(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "breakfast",
            MealSlot::MidMorning => "mid_morning",
            MealSlot::Lunch => "lunch",
            MealSlot::Dinner => "dinner",
            MealSlot::Snack => "snack",
        }
    }

    /// Human-readable name for tables
    pub fn title(self) -> &'static str {
        match self {
            MealSlot::Breakfast => "Breakfast",
            MealSlot::MidMorning => "Mid-morning",
            MealSlot::Lunch => "Lunch",
            MealSlot::Dinner => "Dinner",
            MealSlot::Snack => "Snack",
        }
    }

    /// Upper-case label used for zones and warnings (e.g. `MID_MORNING`)
    pub fn label(self) -> String {
        self.as_str().to_uppercase()
    }

    /// Parse a wire key, case-insensitively
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "breakfast" => Some(MealSlot::Breakfast),
            "mid_morning" | "midmorning" => Some(MealSlot::MidMorning),
            "lunch" => Some(MealSlot::Lunch),
            "dinner" => Some(MealSlot::Dinner),
            "snack" => Some(MealSlot::Snack),
            _ => None,
        }
    }
}

impl fmt::Display for MealSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which meal slots a surface iterates over
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SlotSet {
    /// breakfast, mid_morning, lunch, dinner, snack
    #[default]
    Full,
    /// breakfast, lunch, dinner
    Reduced,
}

impl SlotSet {
    pub fn slots(self) -> &'static [MealSlot] {
        const REDUCED: [MealSlot; 3] = [MealSlot::Breakfast, MealSlot::Lunch, MealSlot::Dinner];
        match self {
            SlotSet::Full => &MealSlot::ALL,
            SlotSet::Reduced => &REDUCED,
        }
    }

    pub fn contains(self, slot: MealSlot) -> bool {
        self.slots().contains(&slot)
    }
}

/// How `total_meals_processed` is counted in a summary
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum MealCount {
    /// Meals the user submitted a response for
    #[default]
    Submitted,
    /// Meals that are past or current relative to now
    Visited,
}

// ============================================================================
// Insulin Types
// ============================================================================

/// Pharmacokinetic class of an insulin
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum InsulinClass {
    Rapid,
    Short,
    Intermediate,
    Long,
    Mixed,
}

impl InsulinClass {
    pub const ALL: [InsulinClass; 5] = [
        InsulinClass::Rapid,
        InsulinClass::Short,
        InsulinClass::Intermediate,
        InsulinClass::Long,
        InsulinClass::Mixed,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            InsulinClass::Rapid => "rapid",
            InsulinClass::Short => "short",
            InsulinClass::Intermediate => "intermediate",
            InsulinClass::Long => "long",
            InsulinClass::Mixed => "mixed",
        }
    }

    /// Rapid and short acting insulin count towards the daily bolus total
    pub fn is_fast_acting(self) -> bool {
        matches!(self, InsulinClass::Rapid | InsulinClass::Short)
    }
}

/// Insulin type as written on a prescription.
///
/// Anything outside the five known classes is kept verbatim so the engine can
/// degrade to an `unknown_type` advisory instead of failing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(from = "String", into = "String")]
pub enum InsulinType {
    Known(InsulinClass),
    Unrecognized(String),
}

impl InsulinType {
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "rapid" => InsulinType::Known(InsulinClass::Rapid),
            "short" => InsulinType::Known(InsulinClass::Short),
            "intermediate" => InsulinType::Known(InsulinClass::Intermediate),
            "long" => InsulinType::Known(InsulinClass::Long),
            "mixed" => InsulinType::Known(InsulinClass::Mixed),
            _ => InsulinType::Unrecognized(s.trim().to_string()),
        }
    }

    pub fn class(&self) -> Option<InsulinClass> {
        match self {
            InsulinType::Known(class) => Some(*class),
            InsulinType::Unrecognized(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            InsulinType::Known(class) => class.as_str(),
            InsulinType::Unrecognized(raw) => raw,
        }
    }
}

impl From<InsulinClass> for InsulinType {
    fn from(class: InsulinClass) -> Self {
        InsulinType::Known(class)
    }
}

impl From<String> for InsulinType {
    fn from(s: String) -> Self {
        InsulinType::parse(&s)
    }
}

impl From<InsulinType> for String {
    fn from(t: InsulinType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for InsulinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Prescription and Response Types
// ============================================================================

/// A validated prescription line for one meal.
///
/// Built through [`crate::prescription::Prescription::entries`], which rejects
/// entries missing a dose, onset or insulin type.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PrescriptionEntry {
    pub meal: MealSlot,
    pub insulin_name: String,
    pub insulin_type: InsulinType,
    /// Units; always > 0
    pub prescribed_dose: f64,
    pub onset_minutes: u32,
}

/// What the user reported for one meal in one evaluation cycle
#[derive(Clone, Debug, PartialEq)]
pub struct DoseResponse {
    pub meal: MealSlot,
    pub meal_taken: bool,
    /// `None` when the user did not say; inferred from `actual_dose`
    pub dose_taken: Option<bool>,
    pub actual_dose: Option<f64>,
    pub reported_meal_time: Option<NaiveTime>,
}

impl DoseResponse {
    /// A response saying the meal was eaten and `units` were injected
    pub fn taken(meal: MealSlot, units: f64) -> Self {
        Self {
            meal,
            meal_taken: true,
            dose_taken: Some(true),
            actual_dose: Some(units),
            reported_meal_time: None,
        }
    }

    /// A response saying the meal was eaten at `meal_time` but no dose was taken
    pub fn missed(meal: MealSlot, meal_time: Option<NaiveTime>) -> Self {
        Self {
            meal,
            meal_taken: true,
            dose_taken: Some(false),
            actual_dose: None,
            reported_meal_time: meal_time,
        }
    }

    /// A response saying the meal itself was skipped
    pub fn skipped(meal: MealSlot) -> Self {
        Self {
            meal,
            meal_taken: false,
            dose_taken: None,
            actual_dose: None,
            reported_meal_time: None,
        }
    }

    /// Whether the dose counts as taken, inferring from `actual_dose` when unset
    pub fn dose_was_taken(&self) -> bool {
        self.dose_taken.unwrap_or(self.actual_dose.is_some())
    }
}

// ============================================================================
// Advisory Types
// ============================================================================

/// Outcome classification for one meal
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StatusKind {
    NotLogged,
    MealSkipped,
    CorrectDose,
    Overdose,
    Underdose,
    MissedWithinOnset,
    MissedLatePartial,
    MissedLateNone,
    MissedLongFollowup,
    AwaitingMealTime,
    UnknownType,
}

impl StatusKind {
    /// Short status shown in the schedule table
    pub fn label(self) -> &'static str {
        match self {
            StatusKind::NotLogged => "Scheduled",
            StatusKind::MealSkipped => "Meal skipped",
            StatusKind::CorrectDose => "Correct dose taken",
            StatusKind::Overdose => "OVERDOSE WARNING",
            StatusKind::Underdose => "Underdose",
            StatusKind::MissedWithinOnset
            | StatusKind::MissedLatePartial
            | StatusKind::MissedLateNone
            | StatusKind::MissedLongFollowup
            | StatusKind::UnknownType => "Missed dose",
            StatusKind::AwaitingMealTime => "Meal time needed",
        }
    }

    /// Statuses where the user injected a dose
    pub fn is_taken(self) -> bool {
        matches!(
            self,
            StatusKind::CorrectDose | StatusKind::Overdose | StatusKind::Underdose
        )
    }

    /// Statuses computed from a missed dose and a reported meal time
    pub fn is_missed(self) -> bool {
        matches!(
            self,
            StatusKind::MissedWithinOnset
                | StatusKind::MissedLatePartial
                | StatusKind::MissedLateNone
                | StatusKind::MissedLongFollowup
                | StatusKind::UnknownType
        )
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Advisory computed for one meal
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct AdvisoryResult {
    pub meal: MealSlot,
    pub status: StatusKind,
    /// Units to take now, at full precision. `None` once a dose was taken or
    /// while the meal time is still unknown.
    pub recommended_dose: Option<f64>,
    pub advice: String,
    pub actual_dose: Option<f64>,
    pub gap_minutes: Option<u32>,
    /// `actual - prescribed` for overdoses, otherwise 0
    pub excess_units: f64,
    pub is_past_or_current: bool,
}

/// Round a unit quantity to one decimal place for display
pub fn round_units(units: f64) -> f64 {
    (units * 10.0).round() / 10.0
}

/// Format a unit quantity with one decimal place
pub fn format_units(units: f64) -> String {
    format!("{:.1}", round_units(units))
}
