#![forbid(unsafe_code)]

//! Core domain model and advisory logic for Gluvia.
//!
//! This crate provides:
//! - Domain types (meal slots, insulin classes, prescriptions, responses)
//! - The insulin decision table and meal-zone resolver
//! - The dose advisory engine, aggregation and risk warnings
//! - Safety checks on reported doses
//! - Questionnaire and template surfaces
//! - Persistence (prescription store, dose log, history)

pub mod types;
pub mod error;
pub mod insulin;
pub mod zone;
pub mod engine;
pub mod safety;
pub mod prescription;
pub mod questionnaire;
pub mod config;
pub mod logging;
pub mod store;
pub mod wal;
pub mod history;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use engine::{evaluate_meal, summarize, summarize_with, RiskWarning, Summary};
pub use prescription::{default_prescription, Prescription};
pub use questionnaire::{
    build_template, parse_responses, process_questionnaire, EvaluationOptions, QuestionnaireReport,
    TemplateReport,
};
pub use store::PrescriptionStore;
pub use wal::{DoseLogSink, DoseRecord, JsonlSink};
pub use history::{latest_per_meal, load_recent_doses, DoseHistory};
