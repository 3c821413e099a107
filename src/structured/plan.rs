//! Action-plan types the models are asked to produce.
//!
//! One struct per generation guide. JSON Schemas for `response_format` are derived
//! from these with `schemars`, so the wire schema and the Rust shape cannot drift.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Discrete high-level skill, identified by its index in the environment's action list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ExecutableAction {
    /// The action ID to select from the available actions given by the prompt
    pub action_id: i64,
    /// The name of the action
    pub action_name: String,
}

/// Discretized end-effector command, e.g. `[x, y, z, roll, pitch, yaw, gripper]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ManipulationAction {
    /// Discretized gripper pose and open/close state
    pub action: Vec<i64>,
}

/// Vision-language plan for high-level environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ActionPlan {
    /// Describe the color and shape of each object in the detection box
    pub visual_state_description: String,
    /// Summarize the history of interactions and any available environmental feedback
    pub reasoning_and_reflection: String,
    /// The list of actions to achieve the user instruction, in natural language
    pub language_plan: String,
    /// A list of actions needed to achieve the user instruction
    pub executable_plan: Vec<ExecutableAction>,
}

/// Language-only plan for high-level environments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LanguagePlan {
    pub reasoning_and_reflection: String,
    pub language_plan: String,
    pub executable_plan: Vec<ExecutableAction>,
}

/// Vision-language plan for manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ManipulationPlan {
    pub visual_state_description: String,
    pub reasoning_and_reflection: String,
    pub language_plan: String,
    pub executable_plan: Vec<ManipulationAction>,
}

/// Language-only plan for manipulation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct LanguageManipulationPlan {
    pub reasoning_and_reflection: String,
    pub language_plan: String,
    pub executable_plan: Vec<ManipulationAction>,
}

/// Single-step plan, used where only `json_object` mode is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SingleStepPlan {
    pub visual_state_description: String,
    pub reasoning_and_reflection: String,
    pub language_plan: String,
    pub executable_plan: ExecutableAction,
}

/// Single-step manipulation plan, used where only `json_object` mode is available.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SingleStepManipulationPlan {
    pub visual_state_description: String,
    pub reasoning_and_reflection: String,
    pub language_plan: String,
    pub executable_plan: ManipulationAction,
}
