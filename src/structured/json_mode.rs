//! `response_format` construction for OpenAI-compatible endpoints.

use serde_json::{json, Value};

use super::schema::{close_objects, PlanSchema, SCHEMA_NAME};

/// JSON mode options for structured output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JsonMode {
    /// `json_object` with a single-step schema hint (Fireworks style)
    Json,
    /// `json_schema` with the full plan schema
    JsonSchema,
    /// No `response_format`; the reply is repaired after the fact
    Off,
}

impl JsonMode {
    /// Get the string representation for API requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            JsonMode::Json => "json_object",
            JsonMode::JsonSchema => "json_schema",
            JsonMode::Off => "",
        }
    }
}

impl std::fmt::Display for JsonMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Resolved `response_format` for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonModeConfig {
    pub mode: JsonMode,
    pub schema: Option<Value>,
    pub schema_name: String,
    /// Only Gemini's structured-parse endpoint is sent `strict: true`
    pub strict: bool,
}

impl JsonModeConfig {
    pub fn for_plan(mode: JsonMode, plan: PlanSchema, strict: bool) -> Self {
        let mut schema = match mode {
            JsonMode::JsonSchema => Some(plan.json_schema()),
            JsonMode::Json => Some(plan.single_step_schema()),
            JsonMode::Off => None,
        };
        if strict {
            schema.iter_mut().for_each(close_objects);
        }
        Self {
            mode,
            schema,
            schema_name: SCHEMA_NAME.to_string(),
            strict,
        }
    }

    /// Value for the `response_format` request field, `None` when mode is off.
    ///
    /// ```json
    /// {"type": "json_schema", "json_schema": {"name": "embodied_planning", "schema": {...}}}
    /// {"type": "json_object", "schema": {...}}
    /// ```
    pub fn to_openai_format(&self) -> Option<Value> {
        match (self.mode, &self.schema) {
            (JsonMode::Off, _) => None,
            (JsonMode::Json, Some(schema)) => Some(json!({
                "type": self.mode.as_str(),
                "schema": schema,
            })),
            (JsonMode::Json, None) => Some(json!({ "type": self.mode.as_str() })),
            (JsonMode::JsonSchema, schema) => {
                let mut inner = json!({
                    "name": self.schema_name,
                    "schema": schema.clone().unwrap_or_else(|| json!({"type": "object"})),
                });
                if self.strict {
                    inner["strict"] = Value::Bool(true);
                }
                Some(json!({
                    "type": self.mode.as_str(),
                    "json_schema": inner,
                }))
            }
        }
    }
}
