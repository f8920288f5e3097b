//! Prescription documents and their validation.
//!
//! A prescription maps meal keys to `{insulin, dose, type, onset}` as produced
//! by prescription upload. Raw entries are kept loosely typed so that a missing
//! or malformed field surfaces as [`Error::Configuration`] for that meal rather
//! than as a parse failure of the whole document.

use crate::{Error, InsulinClass, InsulinType, MealSlot, PrescriptionEntry, Result, SlotSet};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// One meal as written on the prescription
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct RawPrescriptionEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub insulin: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dose: Option<Value>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub insulin_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub onset: Option<Value>,
}

/// A complete prescription with optional prescriber metadata
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct Prescription {
    #[serde(alias = "prescription_data")]
    pub meals: BTreeMap<String, RawPrescriptionEntry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_phone: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub doctor_email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clinic_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prescription_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Read a number that may arrive as a JSON number or a numeric string
pub(crate) fn numeric_value(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    number.filter(|v| v.is_finite())
}

impl RawPrescriptionEntry {
    /// Validate this entry for `meal`
    pub fn to_entry(&self, meal: MealSlot) -> Result<PrescriptionEntry> {
        let dose_value = self
            .dose
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::configuration(meal.as_str(), "missing dose"))?;
        let prescribed_dose = numeric_value(dose_value)
            .ok_or_else(|| Error::configuration(meal.as_str(), "dose must be a number"))?;
        if prescribed_dose <= 0.0 {
            return Err(Error::configuration(
                meal.as_str(),
                "dose must be greater than 0",
            ));
        }

        let onset_value = self
            .onset
            .as_ref()
            .filter(|v| !v.is_null())
            .ok_or_else(|| Error::configuration(meal.as_str(), "missing onset"))?;
        let onset_minutes = numeric_value(onset_value)
            .filter(|v| *v >= 0.0 && v.fract() == 0.0 && *v <= u32::MAX as f64)
            .ok_or_else(|| {
                Error::configuration(meal.as_str(), "onset must be a whole number of minutes")
            })? as u32;

        let insulin_type = self
            .insulin_type
            .as_deref()
            .filter(|s| !s.trim().is_empty())
            .map(InsulinType::parse)
            .ok_or_else(|| Error::configuration(meal.as_str(), "missing insulin type"))?;

        let insulin_name = self
            .insulin
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| "Unknown".to_string());

        Ok(PrescriptionEntry {
            meal,
            insulin_name,
            insulin_type,
            prescribed_dose,
            onset_minutes,
        })
    }
}

impl Prescription {
    /// Validated entries for the slots in `slots`, in canonical order.
    ///
    /// Meals not on the prescription are skipped. A present but incomplete
    /// entry is an error.
    pub fn entries(&self, slots: SlotSet) -> Result<Vec<PrescriptionEntry>> {
        let mut entries = Vec::new();
        let mut seen = BTreeSet::new();
        for (key, raw) in &self.meals {
            let Some(meal) = MealSlot::parse(key) else {
                tracing::debug!("Ignoring prescription entry for unknown meal '{}'", key);
                continue;
            };
            if !seen.insert(meal) {
                return Err(Error::configuration(meal.as_str(), "duplicate entry for meal"));
            }
            if slots.contains(meal) {
                entries.push(raw.to_entry(meal)?);
            }
        }
        entries.sort_by_key(|e| e.meal);
        Ok(entries)
    }

    /// Full structural validation before a prescription is stored
    pub fn validate(&self) -> Result<()> {
        if self.meals.is_empty() {
            return Err(Error::InvalidInput(
                "prescription must contain at least one meal".into(),
            ));
        }

        let entries = self.entries(SlotSet::Full)?;
        if entries.is_empty() {
            return Err(Error::InvalidInput(
                "prescription has no recognised meal entries".into(),
            ));
        }

        for entry in &entries {
            if let InsulinType::Unrecognized(raw) = &entry.insulin_type {
                tracing::warn!(
                    "Prescription for {} uses unrecognised insulin type '{}'; late-dose advice will defer to the provider",
                    entry.meal,
                    raw
                );
            }
        }

        Ok(())
    }

    /// Parse a prescription document from JSON
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}

fn template_entry(insulin: &str, dose: f64, class: InsulinClass) -> RawPrescriptionEntry {
    RawPrescriptionEntry {
        insulin: Some(insulin.into()),
        dose: Some(Value::from(dose)),
        insulin_type: Some(class.as_str().into()),
        onset: Some(Value::from(class.profile().onset_minutes)),
    }
}

/// Sample prescription used when the user has not stored one yet
static DEFAULT_PRESCRIPTION: Lazy<Prescription> = Lazy::new(|| {
    let mut meals = BTreeMap::new();
    meals.insert(
        MealSlot::Breakfast.as_str().into(),
        template_entry("Humalog", 10.0, InsulinClass::Rapid),
    );
    meals.insert(
        MealSlot::MidMorning.as_str().into(),
        template_entry("Regular", 8.0, InsulinClass::Short),
    );
    meals.insert(
        MealSlot::Lunch.as_str().into(),
        template_entry("Novolin N", 15.0, InsulinClass::Intermediate),
    );
    meals.insert(
        MealSlot::Dinner.as_str().into(),
        template_entry("Lantus", 20.0, InsulinClass::Long),
    );
    meals.insert(
        MealSlot::Snack.as_str().into(),
        template_entry("Mix 70/30", 12.0, InsulinClass::Mixed),
    );
    Prescription {
        meals,
        ..Default::default()
    }
});

/// Get a reference to the built-in sample prescription
pub fn default_prescription() -> &'static Prescription {
    &DEFAULT_PRESCRIPTION
}
