use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use serde_json::{Map, Value};
use tracing::trace;

use super::{ComposeKind, ComposeStep, ReducerNode, resolve};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;

/// Applies composition steps strictly in order, each one to the previous
/// step's output.
pub fn apply_compose<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    steps: &'a [ComposeStep],
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        let mut acc = acc;
        for step in steps {
            trace!(step = %step.kind, entity = acc.context_id().unwrap_or("-"), "compose step");
            acc = apply_step(engine, acc, step).await?;
        }
        Ok(acc)
    }
    .boxed()
}

async fn apply_step(
    engine: &Engine,
    acc: Accumulator,
    step: &ComposeStep,
) -> Result<Accumulator, EngineError> {
    let transform = &step.transform;
    match step.kind {
        ComposeKind::Map => {
            let items = expect_array(&acc, step.kind)?;
            let mapped = each_element(engine, &acc, items, transform).await?;
            Ok(acc.with_value(Value::Array(mapped)))
        }
        ComposeKind::Filter => {
            let items = expect_array(&acc, step.kind)?;
            let tests = each_element(engine, &acc, items.clone(), transform).await?;
            let kept = items
                .into_iter()
                .zip(tests)
                .filter(|(_, test)| dp_expr::is_truthy(test))
                .map(|(item, _)| item)
                .collect();
            Ok(acc.with_value(Value::Array(kept)))
        }
        ComposeKind::Find => {
            let items = expect_array(&acc, step.kind)?;
            for item in items {
                let test = resolve(engine, acc.derive_value(item.clone()), transform).await?;
                if dp_expr::is_truthy(&test.value) {
                    return Ok(acc.with_value(item));
                }
            }
            Ok(acc.with_value(Value::Null))
        }
        ComposeKind::OmitKeys => {
            let mut object = expect_object(&acc, step.kind)?;
            let keys = key_list(transform);
            object.retain(|key, _| !keys.contains(&key.as_str()));
            Ok(acc.with_value(Value::Object(object)))
        }
        ComposeKind::PickKeys => {
            let mut object = expect_object(&acc, step.kind)?;
            let keys = key_list(transform);
            object.retain(|key, _| keys.contains(&key.as_str()));
            Ok(acc.with_value(Value::Object(object)))
        }
        ComposeKind::MapKeys => {
            expect_object(&acc, step.kind)?;
            let resolved = resolve_object(engine, &acc, step).await?;
            Ok(acc.with_value(Value::Object(resolved)))
        }
        ComposeKind::AddKeys => {
            let mut object = expect_object(&acc, step.kind)?;
            object.extend(resolve_object(engine, &acc, step).await?);
            Ok(acc.with_value(Value::Object(object)))
        }
        ComposeKind::AddValues => {
            let mut object = expect_object(&acc, step.kind)?;
            if let ReducerNode::Literal(Value::Object(values)) = transform {
                object.extend(values.clone());
            }
            Ok(acc.with_value(Value::Object(object)))
        }
    }
}

/// Runs `transform` once per element, concurrently, keeping input order.
async fn each_element(
    engine: &Engine,
    acc: &Accumulator,
    items: Vec<Value>,
    transform: &ReducerNode,
) -> Result<Vec<Value>, EngineError> {
    let pending = items
        .into_iter()
        .map(|item| resolve(engine, acc.derive_value(item), transform));
    join_all(pending)
        .await
        .into_iter()
        .map(|result| result.map(|acc| acc.value))
        .collect()
}

async fn resolve_object(
    engine: &Engine,
    acc: &Accumulator,
    step: &ComposeStep,
) -> Result<Map<String, Value>, EngineError> {
    match resolve(engine, acc.clone(), &step.transform).await?.value {
        Value::Object(map) => Ok(map),
        other => Err(EngineError::type_mismatch(
            step_context(acc, step.kind),
            "object",
            &other,
        )),
    }
}

fn key_list(transform: &ReducerNode) -> Vec<&str> {
    match transform {
        ReducerNode::Literal(Value::Array(keys)) => keys.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn expect_array(acc: &Accumulator, kind: ComposeKind) -> Result<Vec<Value>, EngineError> {
    match &acc.value {
        Value::Array(items) => Ok(items.clone()),
        other => Err(EngineError::type_mismatch(step_context(acc, kind), "array", other)),
    }
}

fn expect_object(acc: &Accumulator, kind: ComposeKind) -> Result<Map<String, Value>, EngineError> {
    match &acc.value {
        Value::Object(map) => Ok(map.clone()),
        other => Err(EngineError::type_mismatch(step_context(acc, kind), "object", other)),
    }
}

fn step_context(acc: &Accumulator, kind: ComposeKind) -> String {
    match acc.context_id() {
        Some(id) => format!("{id} {kind}"),
        None => kind.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::TransformOptions;
    use crate::reducer::RawReducer;
    use serde_json::json;

    fn step(kind: ComposeKind, raw: impl Into<RawReducer>) -> ComposeStep {
        ComposeStep {
            kind,
            transform: raw.into().parse().unwrap(),
        }
    }

    fn literal_step(kind: ComposeKind, data: Value) -> ComposeStep {
        ComposeStep {
            kind,
            transform: ReducerNode::Literal(data),
        }
    }

    async fn run(steps: &[ComposeStep], value: Value) -> Result<Value, EngineError> {
        let engine = Engine::builder().build().unwrap();
        let acc = Accumulator::new(value, &TransformOptions::default());
        apply_compose(&engine, acc, steps).await.map(|acc| acc.value)
    }

    fn people() -> Value {
        json!([
            { "name": "ada", "active": true },
            { "name": "bob", "active": false },
            { "name": "cy", "active": true }
        ])
    }

    #[tokio::test]
    async fn filter_then_map_keeps_order() {
        let steps = [
            step(ComposeKind::Filter, "$active"),
            step(ComposeKind::Map, "$name"),
        ];
        assert_eq!(run(&steps, people()).await.unwrap(), json!(["ada", "cy"]));
    }

    #[tokio::test]
    async fn find_yields_the_first_match_or_null() {
        let steps = [step(ComposeKind::Find, "$active")];
        assert_eq!(
            run(&steps, people()).await.unwrap(),
            json!({ "name": "ada", "active": true })
        );
        let steps = [step(ComposeKind::Find, "$missing")];
        assert_eq!(run(&steps, people()).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn map_after_find_is_a_type_mismatch() {
        let steps = [
            step(ComposeKind::Find, "$active"),
            step(ComposeKind::Map, "$name"),
        ];
        let err = run(&steps, people()).await.unwrap_err();
        assert_eq!(err.name(), "TypeMismatch");
    }

    #[tokio::test]
    async fn object_steps_reshape_keys() {
        let steps = [
            literal_step(ComposeKind::OmitKeys, json!(["secret"])),
            literal_step(ComposeKind::AddValues, json!({ "fixed": true })),
            step(ComposeKind::AddKeys, json!({ "upper": "$name" })),
        ];
        let out = run(&steps, json!({ "name": "ada", "secret": "x" })).await.unwrap();
        assert_eq!(out, json!({ "name": "ada", "fixed": true, "upper": "ada" }));
    }

    #[tokio::test]
    async fn pick_and_map_keys() {
        let steps = [literal_step(ComposeKind::PickKeys, json!(["a", "c"]))];
        let out = run(&steps, json!({ "a": 1, "b": 2, "c": 3 })).await.unwrap();
        assert_eq!(out, json!({ "a": 1, "c": 3 }));

        let steps = [step(ComposeKind::MapKeys, json!({ "total": "$a" }))];
        let out = run(&steps, json!({ "a": 1, "b": 2 })).await.unwrap();
        assert_eq!(out, json!({ "total": 1 }));
    }

    #[tokio::test]
    async fn object_steps_reject_arrays() {
        let steps = [literal_step(ComposeKind::PickKeys, json!(["a"]))];
        let err = run(&steps, json!([1])).await.unwrap_err();
        assert_eq!(err.name(), "TypeMismatch");
    }
}
