use futures::FutureExt;
use futures::future::{BoxFuture, join_all};
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::trace;

use super::{ReducerNode, Select, compose};
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::entity::lifecycle;
use crate::error::EngineError;

/// Runs one reducer node against `acc` and returns the updated accumulator.
///
/// Entity references run the full lifecycle of the referenced entity on a
/// derived accumulator; only the child's value flows back into the caller.
pub fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    node: &'a ReducerNode,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        match node {
            ReducerNode::Literal(value) => Ok(acc.with_value(value.clone())),
            ReducerNode::Transform(expression) => {
                let value = engine
                    .evaluator()
                    .evaluate(expression, &acc)
                    .await
                    .map_err(|err| expression_error(expression, err))?;
                Ok(acc.with_value(value))
            }
            ReducerNode::Function(f) => {
                let value = f
                    .invoke(acc.clone())
                    .await
                    .map_err(EngineError::from_user)?;
                Ok(acc.with_value(value))
            }
            ReducerNode::EntityRef(id) => {
                let entity = engine.registry().require(id.as_str())?;
                trace!(entity = %id, path = %acc.path_display(), "resolving entity reference");
                let child = lifecycle::resolve_entity(engine, &acc, entity).await?;
                Ok(acc.with_value(child.value))
            }
            ReducerNode::Composite(steps) => compose::apply_compose(engine, acc, steps).await,
            ReducerNode::Hash(members) => resolve_hash(engine, acc, members).await,
            ReducerNode::Chain(nodes) => {
                let mut acc = acc;
                for node in nodes {
                    acc = resolve(engine, acc, node).await?;
                }
                Ok(acc)
            }
            ReducerNode::Select(select) => resolve_select(engine, acc, select).await,
        }
    }
    .boxed()
}

/// Every member runs against the same input; results merge in key order. The
/// first failing member in key order wins, and siblings still run to completion.
async fn resolve_hash(
    engine: &Engine,
    acc: Accumulator,
    members: &IndexMap<String, ReducerNode>,
) -> Result<Accumulator, EngineError> {
    let pending = members
        .values()
        .map(|node| resolve(engine, acc.clone(), node));
    let results = join_all(pending).await;

    let mut merged = Map::with_capacity(members.len());
    for (key, result) in members.keys().zip(results) {
        merged.insert(key.clone(), result?.value);
    }
    Ok(acc.with_value(Value::Object(merged)))
}

/// The first case resolving truthy picks its branch; otherwise the default,
/// otherwise `null`.
pub fn resolve_select<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    select: &'a Select,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        for (idx, case) in select.cases.iter().enumerate() {
            let test = resolve(engine, acc.clone(), &case.case).await?;
            if dp_expr::is_truthy(&test.value) {
                trace!(case = idx, "select case matched");
                return resolve(engine, acc, &case.then).await;
            }
        }
        match &select.default {
            Some(default) => resolve(engine, acc, default).await,
            None => Ok(acc.with_value(Value::Null)),
        }
    }
    .boxed()
}

fn expression_error(expression: &str, err: anyhow::Error) -> EngineError {
    match err.downcast::<dp_expr::EvalError>() {
        Ok(source) => EngineError::Expression {
            expression: expression.to_string(),
            source,
        },
        Err(other) => EngineError::from_user(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::TransformOptions;
    use crate::reducer::{RawReducer, ReducerFn, SelectCase};
    use serde_json::json;
    use std::time::Duration;

    fn engine() -> Engine {
        Engine::builder().build().unwrap()
    }

    fn acc(value: Value) -> Accumulator {
        Accumulator::new(value, &TransformOptions::default())
    }

    fn parse(raw: impl Into<RawReducer>) -> ReducerNode {
        raw.into().parse().unwrap()
    }

    #[tokio::test]
    async fn identity_passes_the_value_through() {
        let engine = engine();
        let out = resolve(&engine, acc(json!({ "a": 1 })), &ReducerNode::identity())
            .await
            .unwrap();
        assert_eq!(out.value, json!({ "a": 1 }));
    }

    #[tokio::test]
    async fn pipe_strings_apply_left_to_right() {
        let engine = engine();
        let node = parse("$a | $b");
        let out = resolve(&engine, acc(json!({ "a": { "b": 5 } })), &node)
            .await
            .unwrap();
        assert_eq!(out.value, json!(5));
    }

    #[tokio::test]
    async fn hash_merges_in_key_order_regardless_of_completion() {
        let engine = engine();
        let slow = ReducerFn::future(|_| async {
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(json!("slow"))
        });
        let node = parse(RawReducer::object([
            ("first", RawReducer::from(slow)),
            ("second", RawReducer::from("$x")),
        ]));
        let out = resolve(&engine, acc(json!({ "x": 2 })), &node).await.unwrap();
        assert_eq!(out.value, json!({ "first": "slow", "second": 2 }));
        let keys: Vec<&String> = out.value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn hash_rejects_with_the_first_failing_member_in_key_order() {
        let engine = engine();
        let late = ReducerFn::future(|_| async {
            tokio::time::sleep(Duration::from_millis(10)).await;
            Err(anyhow::anyhow!("late failure"))
        });
        let early = ReducerFn::sync(|_| Err(anyhow::anyhow!("early failure")));
        let node = parse(RawReducer::object([
            ("a", RawReducer::from(late)),
            ("b", RawReducer::from(early)),
        ]));
        let err = resolve(&engine, acc(json!({})), &node).await.unwrap_err();
        assert_eq!(err.name(), "TransformError");
        assert_eq!(err.to_string(), "late failure");
    }

    #[tokio::test]
    async fn callback_functions_complete_through_their_handle() {
        let engine = engine();
        let node = parse(ReducerFn::callback(|acc, done| {
            let doubled = acc.value.as_i64().unwrap_or_default() * 2;
            done.ok(json!(doubled));
        }));
        let out = resolve(&engine, acc(json!(21)), &node).await.unwrap();
        assert_eq!(out.value, json!(42));
    }

    #[tokio::test]
    async fn callback_errors_reject() {
        let engine = engine();
        let node = parse(ReducerFn::callback(|_, done| done.fail(anyhow::anyhow!("nope"))));
        let err = resolve(&engine, acc(json!(null)), &node).await.unwrap_err();
        assert_eq!(err.name(), "TransformError");
    }

    #[tokio::test]
    async fn dropped_callback_handles_reject() {
        let engine = engine();
        let node = parse(ReducerFn::callback(|_, done| drop(done)));
        let err = resolve(&engine, acc(json!(null)), &node).await.unwrap_err();
        assert_eq!(err.name(), "TransformError");
        assert_eq!(err.to_string(), "callback reducer dropped its completion handle");
    }

    #[tokio::test]
    async fn malformed_expressions_are_expression_errors() {
        let engine = engine();
        let node = ReducerNode::Transform("$a..".into());
        let err = resolve(&engine, acc(json!({})), &node).await.unwrap_err();
        assert_eq!(err.name(), "ExpressionError");
    }

    #[tokio::test]
    async fn unknown_references_are_not_found() {
        let engine = engine();
        let node = parse("entry:missing");
        let err = resolve(&engine, acc(json!({})), &node).await.unwrap_err();
        assert_eq!(err.name(), "EntityNotFound");
    }

    #[tokio::test]
    async fn select_takes_the_first_truthy_case() {
        let engine = engine();
        let select = Select {
            cases: vec![
                SelectCase {
                    case: parse("$missing"),
                    then: parse(json!("first")),
                },
                SelectCase {
                    case: parse("$flag"),
                    then: parse(json!("second")),
                },
            ],
            default: Some(Box::new(parse(json!("fallback")))),
        };
        let out = resolve_select(&engine, acc(json!({ "flag": true })), &select)
            .await
            .unwrap();
        assert_eq!(out.value, json!("second"));

        let out = resolve_select(&engine, acc(json!({})), &select).await.unwrap();
        assert_eq!(out.value, json!("fallback"));
    }

    #[tokio::test]
    async fn select_without_match_or_default_is_null() {
        let engine = engine();
        let select = Select {
            cases: vec![SelectCase {
                case: parse("$nope"),
                then: parse(json!(1)),
            }],
            default: None,
        };
        let out = resolve_select(&engine, acc(json!({})), &select).await.unwrap();
        assert_eq!(out.value, Value::Null);
    }
}
