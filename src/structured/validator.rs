//! Plan validator backed by the `jsonschema` crate.

use jsonschema::{Draft, JSONSchema};
use serde_json::Value;

use super::error::ValidationError;
use super::schema::PlanSchema;
use crate::error::{Error, ErrorContext};

/// Compiled validator for one of the four plan schemas, or its single-step form.
pub struct PlanValidator {
    plan: PlanSchema,
    single_step: bool,
    schema: JSONSchema,
}

impl std::fmt::Debug for PlanValidator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanValidator")
            .field("plan", &self.plan)
            .field("single_step", &self.single_step)
            .finish()
    }
}

impl PlanValidator {
    /// Validator for the full multi-step plan.
    pub fn new(plan: PlanSchema) -> Result<Self, Error> {
        Self::compile(plan, false)
    }

    /// Validator for the single-step plan sent with `json_object` requests.
    pub fn single_step(plan: PlanSchema) -> Result<Self, Error> {
        Self::compile(plan, true)
    }

    fn compile(plan: PlanSchema, single_step: bool) -> Result<Self, Error> {
        let schema_value = if single_step {
            plan.single_step_schema()
        } else {
            plan.json_schema()
        };
        let schema = JSONSchema::options()
            .with_draft(Draft::Draft7)
            .compile(&schema_value)
            .map_err(|e| {
                Error::configuration_with_context(
                    format!("failed to compile plan schema: {}", e),
                    ErrorContext::new()
                        .with_field_path(plan.label())
                        .with_source("plan_validator"),
                )
            })?;
        Ok(Self {
            plan,
            single_step,
            schema,
        })
    }

    pub fn plan(&self) -> PlanSchema {
        self.plan
    }

    pub fn is_single_step(&self) -> bool {
        self.single_step
    }

    /// Name used in violation messages, e.g. `vlm` or `vlm single-step`.
    pub fn label(&self) -> String {
        if self.single_step {
            format!("{} single-step", self.plan.label())
        } else {
            self.plan.label().to_string()
        }
    }

    /// Empty vec means the value conforms.
    pub fn violations(&self, value: &Value) -> Vec<ValidationError> {
        match self.schema.validate(value) {
            Ok(()) => Vec::new(),
            Err(errors) => errors
                .map(|e| {
                    let path = e.instance_path.to_string();
                    if path.is_empty() {
                        ValidationError::without_path(e.to_string())
                    } else {
                        ValidationError::with_path(e.to_string(), path)
                    }
                })
                .collect(),
        }
    }

    pub fn is_valid(&self, value: &Value) -> bool {
        self.schema.is_valid(value)
    }
}
