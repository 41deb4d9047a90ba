use async_trait::async_trait;
use serde_json::Value;

use super::traits::ExpressionEvaluator;
use crate::accumulator::Accumulator;

/// Default evaluator: `dp-expr` paths such as `$a.b[0]` or `$..locals.x`.
#[derive(Debug, Default, Clone, Copy)]
pub struct PathEvaluator;

#[async_trait]
impl ExpressionEvaluator for PathEvaluator {
    async fn evaluate(&self, expression: &str, acc: &Accumulator) -> anyhow::Result<Value> {
        Ok(dp_expr::eval_path(expression, &acc.scope())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::accumulator::TransformOptions;
    use serde_json::json;

    #[tokio::test]
    async fn reads_value_and_locals() {
        let options = TransformOptions::new().with_locals(json!({ "itemPath": "/source1" }));
        let acc = Accumulator::new(json!({ "a": [10, 20] }), &options);
        let evaluator = PathEvaluator;
        assert_eq!(evaluator.evaluate("$a[1]", &acc).await.unwrap(), json!(20));
        assert_eq!(
            evaluator.evaluate("$..locals.itemPath", &acc).await.unwrap(),
            json!("/source1")
        );
    }

    #[tokio::test]
    async fn syntax_errors_keep_their_type() {
        let acc = Accumulator::new(json!({}), &TransformOptions::default());
        let err = PathEvaluator.evaluate("$a[", &acc).await.unwrap_err();
        assert!(err.downcast_ref::<dp_expr::EvalError>().is_some());
    }
}
