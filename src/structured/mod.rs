//! Structured output: action-plan schemas, `response_format` construction, and
//! normalization of raw replies into canonical plan JSON.
//!
//! # Examples
//!
//! ```
//! use embodied_eval::structured::normalize;
//!
//! let raw = "```json\n{\"language_plan\": \"open the drawer\"}\n```";
//! assert_eq!(normalize(raw).unwrap(), r#"{"language_plan":"open the drawer"}"#);
//! ```

pub mod error;
pub mod json_mode;
pub mod plan;
pub mod repair;
pub mod schema;
pub mod validator;

pub use error::ValidationError;
pub use json_mode::{JsonMode, JsonModeConfig};
pub use plan::{
    ActionPlan, ExecutableAction, LanguageManipulationPlan, LanguagePlan, ManipulationAction,
    ManipulationPlan, SingleStepManipulationPlan, SingleStepPlan,
};
pub use repair::{normalize, Normalizer};
pub use schema::{close_objects, inline_schema_for, PlanSchema, TaskDomain, SCHEMA_NAME};
pub use validator::PlanValidator;
