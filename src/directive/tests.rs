use std::cell::Cell;

use anyhow::{Result, bail};
use serde_json::{Map, Value, json};

use super::transport::ChunkStream;
use super::types::DirectionType;
use super::*;
use crate::error::CoreError;

fn payload(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => panic!("fixture must be an object, got {other}"),
    }
}

#[test]
fn forward_directive_parses_with_offsets() {
    let directive = LocationDirective::from_payload(&payload(json!({
        "reference_point": "XQ15",
        "direction_type": "forward",
        "distance": "50m",
        "direction_reference_point": 16,
        "lateral_offset": {"direction": "left", "distance": 3},
        "vertical_offset": {"direction": "up", "distance": "1.5米"},
        "confidence": 0.95
    })))
    .expect("forward directive should validate");

    assert_eq!(directive.reference, "XQ15");
    assert_eq!(
        directive.placement,
        Placement::Forward {
            toward: "16".to_string(),
            distance: 50.0
        }
    );
    assert_eq!(
        directive.lateral_offset,
        Some(LateralOffset {
            side: Side::Left,
            distance: 3.0
        })
    );
    assert_eq!(
        directive.vertical_offset,
        Some(VerticalOffset {
            direction: Vertical::Up,
            distance: 1.5
        })
    );
    assert_eq!(directive.confidence, 0.95);
}

#[test]
fn chinese_keys_are_accepted() {
    let directive = LocationDirective::from_payload(&payload(json!({
        "参考点号": "D3",
        "方向类型": "between",
        "方向参考点号": "D4",
        "侧向偏移": {"方向": "右", "距离": 2},
        "置信度": 0.75
    })))
    .expect("chinese-keyed directive should validate");

    assert_eq!(directive.direction_type(), DirectionType::Between);
    assert_eq!(
        directive.placement,
        Placement::Between {
            toward: "D4".to_string(),
            distance: None
        }
    );
    assert_eq!(directive.lateral_offset.map(|offset| offset.side), Some(Side::Right));
}

#[test]
fn missing_reference_point_is_rejected() {
    let error = LocationDirective::from_payload(&payload(json!({
        "direction_type": "forward",
        "distance": 10
    })))
    .expect_err("reference point is required");
    assert!(matches!(error, CoreError::InvalidDirective { .. }));
}

#[test]
fn forward_without_direction_point_is_rejected() {
    let error = LocationDirective::from_payload(&payload(json!({
        "reference_point": "A",
        "direction_type": "forward",
        "distance": 10
    })))
    .expect_err("forward needs a second point");
    assert!(error.to_string().contains("forward directive"));
}

#[test]
fn unrecognised_type_and_incomplete_offsets_fall_back() {
    let directive = LocationDirective::from_payload(&payload(json!({
        "reference_point": "A",
        "direction_type": "diagonal",
        "lateral_offset": {"direction": "left", "distance": 0},
        "vertical_offset": {"direction": "sideways", "distance": 4}
    })))
    .expect("lenient directive should validate");

    assert_eq!(directive.placement, Placement::Unknown);
    assert_eq!(directive.lateral_offset, None);
    assert_eq!(directive.vertical_offset, None);
    assert_eq!(directive.confidence, 0.8);
    assert!(!directive.confidence_stated);
}

fn forward_reply() -> String {
    "Reasoning first. Then the answer:\n```json\n{\"reference_point\": \"A\", \"direction_type\": \"forward\", \"distance\": 50, \"direction_reference_point\": \"B\", \"confidence\": 0.9}\n```".to_string()
}

#[test]
fn resolver_recovers_directive_from_reasoning_reply() {
    let model = |_prompt: &str| -> Result<String> { Ok(forward_reply()) };
    let mut resolver = DirectiveResolver::new(model);

    let directive = resolver
        .resolve("A点向B点前进50米")
        .expect("directive should resolve");
    assert_eq!(directive.reference, "A");
    assert_eq!(directive.direction_type(), DirectionType::Forward);
}

#[test]
fn resolver_caches_per_exact_description() {
    let calls = Cell::new(0_usize);
    let model = |_prompt: &str| -> Result<String> {
        calls.set(calls.get() + 1);
        Ok(forward_reply())
    };
    let mut resolver = DirectiveResolver::new(model).with_cache(DirectiveCache::new());

    assert!(resolver.resolve("A forward 50").is_some());
    assert!(resolver.resolve("A forward 50").is_some());
    assert!(resolver.resolve("A forward 50 ").is_some());

    assert_eq!(calls.get(), 2);
    let cache = resolver.cache().expect("cache is enabled");
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.hits(), 1);
}

#[test]
fn resolver_without_cache_calls_model_every_time() {
    let calls = Cell::new(0_usize);
    let model = |_prompt: &str| -> Result<String> {
        calls.set(calls.get() + 1);
        Ok(forward_reply())
    };
    let mut resolver = DirectiveResolver::new(model);

    resolver.resolve("A forward 50");
    resolver.resolve("A forward 50");
    assert_eq!(calls.get(), 2);
    assert!(resolver.cache().is_none());
}

#[test]
fn resolver_degrades_failures_to_none() {
    let failing = |_prompt: &str| -> Result<String> { bail!("connection reset") };
    assert!(DirectiveResolver::new(failing).resolve("anything").is_none());

    let rambling = |_prompt: &str| -> Result<String> { Ok("I am not sure.".to_string()) };
    assert!(DirectiveResolver::new(rambling).resolve("anything").is_none());

    let no_reference =
        |_prompt: &str| -> Result<String> { Ok(r#"{"direction_type": "forward"}"#.to_string()) };
    assert!(DirectiveResolver::new(no_reference).resolve("anything").is_none());
}

struct StreamingOnly;

impl DirectiveModel for StreamingOnly {
    fn send(&self, _prompt: &str) -> Result<String> {
        bail!("only streaming is supported")
    }

    fn stream<'a>(&'a self, _prompt: &str) -> Result<ChunkStream<'a>> {
        let chunks = ["{\"reference_point\": ", "\"A\", \"direction_type\": ", "\"lateral\"}"];
        Ok(Box::new(chunks.into_iter().map(|chunk| Ok(chunk.to_string()))))
    }
}

#[test]
fn streaming_reply_is_drained_before_parsing() {
    let mut resolver = DirectiveResolver::new(StreamingOnly).with_streaming(true);
    let directive = resolver.resolve("beside A").expect("streamed directive resolves");
    assert_eq!(directive.placement, Placement::Lateral);

    let mut blocking = DirectiveResolver::new(StreamingOnly);
    assert!(blocking.resolve("beside A").is_none());
}

#[test]
fn resolver_prompt_carries_description() {
    let seen = std::cell::RefCell::new(String::new());
    let model = |prompt: &str| -> Result<String> {
        *seen.borrow_mut() = prompt.to_string();
        Ok(forward_reply())
    };
    DirectiveResolver::new(model).resolve("XQ15 forward 20m");
    assert!(seen.borrow().contains("XQ15 forward 20m"));
}

#[cfg(unix)]
#[test]
fn command_model_round_trips_through_external_program() {
    let model = CommandModel::from_command_line("cat").expect("command parses");
    assert_eq!(model.send("hello\nworld").expect("cat echoes"), "hello\nworld");

    let chunks = model
        .stream("a\nb")
        .expect("stream starts")
        .collect::<Result<Vec<String>>>()
        .expect("stream drains");
    assert_eq!(chunks, vec!["a\n".to_string(), "b\n".to_string()]);
}

#[cfg(unix)]
#[test]
fn command_model_reports_failing_program() {
    let model = CommandModel::from_command_line("false").expect("command parses");
    assert!(model.send("prompt").is_err());
    assert!(CommandModel::from_command_line("   ").is_err());
}
