//! Benchmarks for reply normalization
//!
//! This benchmark measures:
//! - Pass-through of already valid plans
//! - The repair path (fence, commentary, stray quotes, truncation)
//! - Schema-checked normalization

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use embodied_eval::{Normalizer, PlanSchema, TaskDomain};

const VALID_PLAN: &str = r#"{"visual_state_description": "A countertop with a red apple, a knife and an open fridge.", "reasoning_and_reflection": "The apple must be chilled, so it goes into the fridge after picking it up.", "language_plan": "Find the apple, pick it up, find the fridge, put the apple in it.", "executable_plan": [{"action_id": 12, "action_name": "find a Apple"}, {"action_id": 88, "action_name": "pick up the Apple"}, {"action_id": 40, "action_name": "find a Fridge"}, {"action_id": 133, "action_name": "put down the object in hand"}]}"#;

fn messy_inputs() -> Vec<(&'static str, String)> {
    vec![
        ("fenced", format!("```json\n{VALID_PLAN}\n```")),
        ("commentary", format!("Here is my plan:\n{VALID_PLAN}\nLet me know if you need more.")),
        ("stray_quotes", VALID_PLAN.replace("a red apple", "a \"red\" apple")),
        ("truncated", VALID_PLAN[..VALID_PLAN.len() - 40].to_string()),
    ]
}

fn bench_pass_through(c: &mut Criterion) {
    let normalizer = Normalizer::new();
    let mut group = c.benchmark_group("normalize_valid");
    group.throughput(Throughput::Bytes(VALID_PLAN.len() as u64));
    group.bench_function("plain", |b| b.iter(|| normalizer.normalize(black_box(VALID_PLAN))));
    group.finish();
}

fn bench_repair(c: &mut Criterion) {
    let normalizer = Normalizer::new();
    let mut group = c.benchmark_group("normalize_repair");
    for (name, input) in messy_inputs() {
        group.throughput(Throughput::Bytes(input.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, input| {
            b.iter(|| normalizer.normalize(black_box(input)))
        });
    }
    group.finish();
}

fn bench_schema_checked(c: &mut Criterion) {
    let Ok(normalizer) = Normalizer::with_schema(PlanSchema::new(false, TaskDomain::Other)) else {
        return;
    };
    c.bench_function("normalize_with_schema", |b| {
        b.iter(|| normalizer.normalize(black_box(VALID_PLAN)))
    });
}

criterion_group!(benches, bench_pass_through, bench_repair, bench_schema_checked);
criterion_main!(benches);
