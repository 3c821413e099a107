//! Schema selection for the four action-plan variants.

use schemars::gen::SchemaSettings;
use schemars::JsonSchema;
use serde_json::Value;

use super::plan::{
    ActionPlan, LanguageManipulationPlan, LanguagePlan, ManipulationPlan, SingleStepManipulationPlan,
    SingleStepPlan,
};

/// Name every schema is registered under in `response_format`.
pub const SCHEMA_NAME: &str = "embodied_planning";

/// Task domain of the benchmark environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TaskDomain {
    Manipulation,
    #[default]
    Other,
}

impl TaskDomain {
    /// `manip` selects manipulation; anything else (including nothing) is `Other`.
    pub fn from_task_type(task_type: Option<&str>) -> Self {
        match task_type {
            Some("manip") | Some("manipulation") => TaskDomain::Manipulation,
            _ => TaskDomain::Other,
        }
    }
}

/// One of the four canonical plan schemas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PlanSchema {
    pub language_only: bool,
    pub domain: TaskDomain,
}

impl PlanSchema {
    pub fn new(language_only: bool, domain: TaskDomain) -> Self {
        Self {
            language_only,
            domain,
        }
    }

    pub fn all() -> [PlanSchema; 4] {
        [
            PlanSchema::new(false, TaskDomain::Other),
            PlanSchema::new(true, TaskDomain::Other),
            PlanSchema::new(false, TaskDomain::Manipulation),
            PlanSchema::new(true, TaskDomain::Manipulation),
        ]
    }

    /// Full-plan JSON Schema for this variant.
    pub fn json_schema(&self) -> Value {
        match (self.language_only, self.domain) {
            (false, TaskDomain::Other) => inline_schema_for::<ActionPlan>(),
            (true, TaskDomain::Other) => inline_schema_for::<LanguagePlan>(),
            (false, TaskDomain::Manipulation) => inline_schema_for::<ManipulationPlan>(),
            (true, TaskDomain::Manipulation) => inline_schema_for::<LanguageManipulationPlan>(),
        }
    }

    /// Single-step schema; ignores `language_only` since only vision models use it.
    pub fn single_step_schema(&self) -> Value {
        match self.domain {
            TaskDomain::Other => inline_schema_for::<SingleStepPlan>(),
            TaskDomain::Manipulation => inline_schema_for::<SingleStepManipulationPlan>(),
        }
    }

    pub fn label(&self) -> &'static str {
        match (self.language_only, self.domain) {
            (false, TaskDomain::Other) => "vlm",
            (true, TaskDomain::Other) => "llm",
            (false, TaskDomain::Manipulation) => "vlm_manip",
            (true, TaskDomain::Manipulation) => "llm_manip",
        }
    }
}

/// Draft-07 schema with nested types inlined; providers reject `$ref` unevenly.
pub fn inline_schema_for<T: JsonSchema>() -> Value {
    let generator = SchemaSettings::draft07()
        .with(|s| {
            s.inline_subschemas = true;
            s.option_add_null_type = false;
        })
        .into_generator();
    let root = generator.into_root_schema_for::<T>();
    let mut value = serde_json::to_value(&root).unwrap_or_else(|_| serde_json::json!({}));
    if let Value::Object(ref mut map) = value {
        map.remove("$schema");
        map.remove("title");
        map.remove("definitions");
    }
    value
}

/// Mark every object in `schema` as closed (`additionalProperties: false`).
///
/// Strict structured-output endpoints reject schemas that leave objects open.
pub fn close_objects(schema: &mut Value) {
    match schema {
        Value::Object(map) => {
            if map.contains_key("properties") {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
            }
            for value in map.values_mut() {
                close_objects(value);
            }
        }
        Value::Array(items) => items.iter_mut().for_each(close_objects),
        _ => {}
    }
}
