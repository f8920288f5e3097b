//! Daily questionnaire and template surfaces.
//!
//! Both take the caller's `now` once and hold it fixed for every meal, so all
//! gap computations in one submission agree with each other.

use crate::engine::{evaluate_meal, overdose_warning, summarize_with, Summary};
use crate::prescription::{numeric_value, Prescription};
use crate::safety::{check_daily_total, check_single_dose, TakenDose};
use crate::zone::{format_clock_time, is_past_or_current, parse_clock_time, resolve_zone, scheduled_time};
use crate::{
    round_units, AdvisoryResult, DoseResponse, MealCount, MealSlot, PrescriptionEntry, Result,
    SlotSet, StatusKind,
};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Per-surface knobs for one evaluation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EvaluationOptions {
    pub slot_set: SlotSet,
    pub meal_count: MealCount,
}

// ============================================================================
// Response Parsing
// ============================================================================

fn default_true() -> bool {
    true
}

/// One meal's answer as submitted
#[derive(Debug, Deserialize)]
struct ResponseInput {
    #[serde(default = "default_true")]
    meal_taken: bool,
    #[serde(default, alias = "taken")]
    dose_taken: Option<bool>,
    #[serde(default)]
    actual_dose: Option<Value>,
    #[serde(default, alias = "meal_time")]
    reported_meal_time: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum QuestionnaireInput {
    Wrapped {
        responses: BTreeMap<String, ResponseInput>,
    },
    Bare(BTreeMap<String, ResponseInput>),
}

/// Responses keyed by meal, plus warnings about input that had to be coerced
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParsedResponses {
    pub responses: BTreeMap<MealSlot, DoseResponse>,
    pub warnings: Vec<String>,
}

impl ParsedResponses {
    pub fn insert(&mut self, response: DoseResponse) {
        self.responses.insert(response.meal, response);
    }
}

impl FromIterator<DoseResponse> for ParsedResponses {
    fn from_iter<I: IntoIterator<Item = DoseResponse>>(iter: I) -> Self {
        let mut parsed = ParsedResponses::default();
        for response in iter {
            parsed.insert(response);
        }
        parsed
    }
}

/// Parse questionnaire JSON, either `{"responses": {...}}` or a bare meal map.
///
/// Malformed values never fail the parse: a non-numeric dose becomes 0 and an
/// unreadable meal time is dropped, each with a warning.
pub fn parse_responses(json: &str) -> Result<ParsedResponses> {
    let raw = match serde_json::from_str::<QuestionnaireInput>(json)? {
        QuestionnaireInput::Wrapped { responses } => responses,
        QuestionnaireInput::Bare(responses) => responses,
    };

    let mut parsed = ParsedResponses::default();

    for (key, input) in raw {
        let Some(meal) = MealSlot::parse(&key) else {
            tracing::warn!("Ignoring response for unknown meal '{}'", key);
            parsed
                .warnings
                .push(format!("Unknown meal '{}' in responses was ignored", key));
            continue;
        };

        if parsed.responses.contains_key(&meal) {
            tracing::warn!("Duplicate response for {} under key '{}'", meal, key);
            parsed.warnings.push(format!(
                "Duplicate response for {} under '{}' ignored",
                meal.label(),
                key
            ));
            continue;
        }

        let actual_dose = match input.actual_dose {
            None | Some(Value::Null) => None,
            Some(value) => Some(numeric_value(&value).unwrap_or_else(|| {
                tracing::warn!("Non-numeric dose for {}: {}; treating as 0", meal, value);
                parsed
                    .warnings
                    .push(format!("Invalid dose for {}: {} (treated as 0 units)", meal, value));
                0.0
            })),
        };

        let reported_meal_time = input.reported_meal_time.as_deref().and_then(|raw| {
            let parsed_time = parse_clock_time(raw);
            if parsed_time.is_none() {
                parsed
                    .warnings
                    .push(format!("Invalid time format for {}: {}", meal, raw));
            }
            parsed_time
        });

        parsed.insert(DoseResponse {
            meal,
            meal_taken: input.meal_taken,
            dose_taken: input.dose_taken,
            actual_dose,
            reported_meal_time,
        });
    }

    Ok(parsed)
}

// ============================================================================
// Questionnaire
// ============================================================================

/// A prescription entry together with the advisory computed for it
#[derive(Clone, Debug, PartialEq)]
pub struct MealEvaluation {
    pub entry: PrescriptionEntry,
    pub result: AdvisoryResult,
}

/// One formatted row of the schedule table
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ScheduleRow {
    pub meal: String,
    pub meal_slot: MealSlot,
    pub insulin: String,
    pub insulin_type: String,
    pub prescribed_dose: f64,
    pub status_kind: StatusKind,
    pub status: String,
    /// Rounded to one decimal place
    pub recommended_dose: Option<f64>,
    pub actual_dose: Option<f64>,
    pub gap_minutes: Option<u32>,
    pub advice: String,
    pub is_past_or_current: bool,
}

impl From<&MealEvaluation> for ScheduleRow {
    fn from(eval: &MealEvaluation) -> Self {
        ScheduleRow {
            meal: eval.entry.meal.title().to_string(),
            meal_slot: eval.entry.meal,
            insulin: eval.entry.insulin_name.clone(),
            insulin_type: eval.entry.insulin_type.to_string(),
            prescribed_dose: eval.entry.prescribed_dose,
            status_kind: eval.result.status,
            status: eval.result.status.label().to_string(),
            recommended_dose: eval.result.recommended_dose.map(round_units),
            actual_dose: eval.result.actual_dose,
            gap_minutes: eval.result.gap_minutes,
            advice: eval.result.advice.clone(),
            is_past_or_current: eval.result.is_past_or_current,
        }
    }
}

/// Result of one questionnaire submission
#[derive(Clone, Debug, Serialize)]
pub struct QuestionnaireReport {
    pub current_time: String,
    pub current_zone: String,
    pub schedule: Vec<ScheduleRow>,
    pub warnings: Vec<String>,
    pub critical_warnings: Vec<String>,
    pub summary: Summary,
    #[serde(skip)]
    pub evaluations: Vec<MealEvaluation>,
}

/// Evaluate every prescribed meal in the active slot set.
///
/// Fails only when the prescription itself is unusable; every other problem
/// degrades into a per-meal result or a warning.
pub fn process_questionnaire(
    prescription: &Prescription,
    responses: &ParsedResponses,
    now: NaiveDateTime,
    options: EvaluationOptions,
) -> Result<QuestionnaireReport> {
    let entries = prescription.entries(options.slot_set)?;
    let now_time = now.time();
    let zone = resolve_zone(now_time);

    let mut warnings = responses.warnings.clone();

    for meal in responses.responses.keys() {
        if !entries.iter().any(|e| e.meal == *meal) {
            warnings.push(format!(
                "{} is not on the active prescription schedule - response ignored",
                meal.label()
            ));
        }
    }

    let mut evaluations = Vec::with_capacity(entries.len());
    let mut taken = Vec::new();

    for entry in entries {
        let result = evaluate_meal(&entry, responses.responses.get(&entry.meal), now_time);

        if result.status.is_taken() {
            if let Some(units) = result.actual_dose {
                let dose = TakenDose {
                    meal: entry.meal,
                    insulin_type: entry.insulin_type.clone(),
                    units,
                };
                warnings.extend(check_single_dose(&dose).iter().map(ToString::to_string));
                taken.push(dose);
            }
        }

        if let Some(warning) = overdose_warning(&result) {
            warnings.push(warning);
        }

        evaluations.push(MealEvaluation { entry, result });
    }

    warnings.extend(check_daily_total(&taken).iter().map(ToString::to_string));

    let results: Vec<AdvisoryResult> = evaluations.iter().map(|e| e.result.clone()).collect();
    let summary = summarize_with(&results, options.meal_count);

    let risks = summary.risk_warnings();
    if !risks.is_empty() {
        tracing::error!(
            "Critical overdose pattern: {} overdoses, {} excess units",
            summary.overdoses_detected,
            summary.total_excess_units
        );
    }
    let critical_warnings = risks.iter().flat_map(|w| w.messages()).collect();

    tracing::info!(
        "Processed questionnaire at {}: {} meals, {} overdoses",
        format_clock_time(now_time),
        summary.total_meals_processed,
        summary.overdoses_detected
    );

    Ok(QuestionnaireReport {
        current_time: format_clock_time(now_time),
        current_zone: zone.label(),
        schedule: evaluations.iter().map(ScheduleRow::from).collect(),
        warnings,
        critical_warnings,
        summary,
        evaluations,
    })
}

// ============================================================================
// Template
// ============================================================================

/// Sample answer shown next to each template row
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ExampleInput {
    pub taken: bool,
    pub actual_dose: f64,
    pub meal_time: String,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TemplateRow {
    pub meal: String,
    pub meal_time: MealSlot,
    pub scheduled_time: String,
    pub insulin: String,
    pub prescribed_dose: f64,
    pub insulin_type: String,
    pub onset: u32,
    pub is_past_or_current: bool,
    pub example_input: ExampleInput,
}

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TemplateInstructions {
    pub meal_taken: &'static str,
    pub taken: &'static str,
    pub actual_dose: &'static str,
    pub meal_time: &'static str,
}

const INSTRUCTIONS: TemplateInstructions = TemplateInstructions {
    meal_taken: "false if you skipped the meal (defaults to true)",
    taken: "true if you took the dose, false if missed",
    actual_dose: "number of units taken (required if taken=true)",
    meal_time: "HH:MM format when you had the meal (required if taken=false)",
};

const TEMPLATE_WARNINGS: [&str; 3] = [
    "Entering multiple high doses will trigger critical warnings",
    "System will alert if total excess insulin > 10 units",
    "Multiple overdoses require immediate medical attention",
];

#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct TemplateReport {
    pub current_time: String,
    pub current_zone: String,
    pub template: Vec<TemplateRow>,
    pub instructions: TemplateInstructions,
    pub warnings: Vec<String>,
}

/// Build the questionnaire template for `now`
pub fn build_template(
    prescription: &Prescription,
    slot_set: SlotSet,
    now: NaiveDateTime,
) -> Result<TemplateReport> {
    let now_time = now.time();

    let template = prescription
        .entries(slot_set)?
        .into_iter()
        .map(|entry| {
            let scheduled = format_clock_time(scheduled_time(entry.meal));
            TemplateRow {
                meal: entry.meal.title().to_string(),
                meal_time: entry.meal,
                scheduled_time: scheduled.clone(),
                insulin: entry.insulin_name.clone(),
                prescribed_dose: entry.prescribed_dose,
                insulin_type: entry.insulin_type.to_string(),
                onset: entry.onset_minutes,
                is_past_or_current: is_past_or_current(entry.meal, now_time),
                example_input: ExampleInput {
                    taken: true,
                    actual_dose: entry.prescribed_dose,
                    meal_time: scheduled,
                },
            }
        })
        .collect();

    Ok(TemplateReport {
        current_time: format_clock_time(now_time),
        current_zone: resolve_zone(now_time).label(),
        template,
        instructions: INSTRUCTIONS,
        warnings: TEMPLATE_WARNINGS.iter().map(|w| w.to_string()).collect(),
    })
}
