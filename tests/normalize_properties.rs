//! Normalizer behaviour over realistic model replies.

use embodied_eval::structured::{
    ActionPlan, ExecutableAction, LanguageManipulationPlan, LanguagePlan, ManipulationAction,
    ManipulationPlan, PlanValidator,
};
use embodied_eval::{normalize, Error, Normalizer, PlanSchema, TaskDomain};
use serde_json::Value;

const MESSY_REPLIES: &[&str] = &[
    "```json\n{\"language_plan\": \"find a mug\", \"executable_plan\": [{\"action_id\": 12, \"action_name\": \"find a Mug\"}]}\n```",
    "Sure, here you go:\n{\"language_plan\": \"go\", \"executable_plan\": [],}\nGood luck!",
    "{\"reasoning_and_reflection\": \"the \"blue\" block is closer\", \"language_plan\": \"pick it\"",
    "{\"visual_state_description\": \"a table\nwith two bowls\", \"executable_plan\": [{\"action\": [10, 20, 30, 0, 60, 25, 1]}]}",
    "{\"a\": 1}",
    "{\"language_plan\": \"open it\", \"executable_plan\": []}\nNote: the format was\n```\nplain text\n```",
    "I think {\"language_plan\": \"wait\", \"executable_plan\": [{\"action_id\": 0, \"action_name\": \"noop\"}]} then ```done``` {maybe}",
];

fn action_plan() -> ActionPlan {
    ActionPlan {
        visual_state_description: "A kitchen counter with an apple and a knife.".into(),
        reasoning_and_reflection: "The apple must be sliced before it is put away.".into(),
        language_plan: "Pick up the knife, slice the apple.".into(),
        executable_plan: vec![
            ExecutableAction { action_id: 3, action_name: "find a ButterKnife".into() },
            ExecutableAction { action_id: 41, action_name: "slice the Apple".into() },
        ],
    }
}

fn grip() -> ManipulationAction {
    ManipulationAction { action: vec![52, 40, 17, 6, 61, 36, 1] }
}

#[test]
fn test_normalize_is_idempotent() {
    for raw in MESSY_REPLIES {
        let once = normalize(raw).unwrap_or_else(|e| panic!("{raw:?}: {e}"));
        let twice = normalize(&once).unwrap();
        assert_eq!(once, twice, "{raw:?}");
    }
}

#[test]
fn test_every_output_is_an_object() {
    for raw in MESSY_REPLIES {
        let v: Value = serde_json::from_str(&normalize(raw).unwrap()).unwrap();
        assert!(v.is_object());
    }
}

#[test]
fn test_four_plan_schemas_round_trip() {
    let plan = action_plan();
    let docs = [
        (PlanSchema::new(false, TaskDomain::Other), serde_json::to_string_pretty(&plan).unwrap()),
        (
            PlanSchema::new(true, TaskDomain::Other),
            serde_json::to_string(&LanguagePlan {
                reasoning_and_reflection: plan.reasoning_and_reflection.clone(),
                language_plan: plan.language_plan.clone(),
                executable_plan: plan.executable_plan.clone(),
            })
            .unwrap(),
        ),
        (
            PlanSchema::new(false, TaskDomain::Manipulation),
            serde_json::to_string(&ManipulationPlan {
                visual_state_description: "Red cube left of a green star.".into(),
                reasoning_and_reflection: "Grasp the cube from above.".into(),
                language_plan: "Move over the cube, close the gripper.".into(),
                executable_plan: vec![grip(), grip()],
            })
            .unwrap(),
        ),
        (
            PlanSchema::new(true, TaskDomain::Manipulation),
            serde_json::to_string(&LanguageManipulationPlan {
                reasoning_and_reflection: "Grasp the cube from above.".into(),
                language_plan: "Close the gripper.".into(),
                executable_plan: vec![grip()],
            })
            .unwrap(),
        ),
    ];

    for (schema, doc) in docs {
        let normalizer = Normalizer::with_schema(schema).unwrap();
        let fenced = format!("```json\n{doc}\n```");
        let out = normalizer.normalize(&fenced).unwrap();
        let expected: Value = serde_json::from_str(&doc).unwrap();
        assert_eq!(out, serde_json::to_string(&expected).unwrap(), "{}", schema.label());
        assert!(PlanValidator::new(schema).unwrap().is_valid(&expected));
    }
}

#[test]
fn test_parsed_plan_matches_typed_struct() {
    let plan = action_plan();
    let raw = format!("My answer:\n{}\nThat's all.", serde_json::to_string(&plan).unwrap());
    let back: ActionPlan = serde_json::from_str(&normalize(&raw).unwrap()).unwrap();
    assert_eq!(back, plan);
}

#[test]
fn test_key_order_is_preserved() {
    let out = normalize(r#"{"zeta": 1, "alpha": 2, "mid": 3}"#).unwrap();
    assert_eq!(out, r#"{"zeta":1,"alpha":2,"mid":3}"#);
}

#[test]
fn test_plan_in_wrong_schema_is_rejected() {
    let doc = serde_json::to_string(&action_plan()).unwrap();
    let manip = Normalizer::with_schema(PlanSchema::new(false, TaskDomain::Manipulation)).unwrap();
    match manip.normalize(&doc).unwrap_err() {
        Error::MalformedResponse { reason, .. } => assert!(reason.contains("vlm_manip")),
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_minimal_plans_pass_unchanged() {
    let minimal = [
        r#"{"visual_state_description":"","reasoning_and_reflection":"","language_plan":"","executable_plan":[]}"#,
        r#"{"reasoning_and_reflection":"","language_plan":"","executable_plan":[]}"#,
        r#"{"visual_state_description":"","reasoning_and_reflection":"","language_plan":"","executable_plan":[{"action":[1,2,3,0,0,0,1]}]}"#,
        r#"{"reasoning_and_reflection":"","language_plan":"","executable_plan":[{"action":[0]}]}"#,
    ];
    for (schema, doc) in PlanSchema::all().into_iter().zip(minimal) {
        let normalizer = Normalizer::with_schema(schema).unwrap();
        assert_eq!(normalizer.normalize(doc).unwrap(), doc, "{}", schema.label());
    }
}

#[test]
fn test_trailing_commentary_keeps_plan() {
    let plan = action_plan();
    let doc = serde_json::to_string(&plan).unwrap();
    let replies = [
        format!("{doc}\nNote: I followed the format in\n```\nthe prompt\n```"),
        format!("Plan: {doc} and then ```done``` {{see above}}"),
        format!("{doc}\n```json\n{{\"unrelated\": true}}\n```"),
    ];
    for raw in &replies {
        let back: ActionPlan = serde_json::from_str(&normalize(raw).unwrap()).unwrap();
        assert_eq!(back, plan, "{raw:?}");
    }
}

#[test]
fn test_fenced_minimal_object() {
    assert_eq!(normalize("```json\n{\"a\":1}\n```").unwrap(), r#"{"a":1}"#);
}
