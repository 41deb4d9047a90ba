use futures::FutureExt;
use futures::future::BoxFuture;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::debug;

use super::{Entity, EntityKind};
use crate::accumulator::Accumulator;
use crate::adapters::RequestParams;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reducer::{self, RawDefinition, RawReducer, ReducerNode};

/// Url template plus the reducer producing per-call request options
/// (`method`, `headers`, `query`, `body`).
#[derive(Debug, Clone)]
pub struct RequestSpec {
    pub url: String,
    pub options: ReducerNode,
}

pub(super) fn create(raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    let url = match raw.get("url").map(|raw| raw.as_data()) {
        Some(Some(Value::String(url))) if !url.trim().is_empty() => url.clone(),
        Some(_) => return Err(EngineError::configuration("url must be a non-empty string")),
        None => return Err(EngineError::configuration("request entities require a url")),
    };
    let options = match raw.get("options") {
        Some(options) => options_node(options)?,
        None => ReducerNode::Literal(Value::Object(Map::new())),
    };
    Ok(EntityKind::Request(RequestSpec { url, options }))
}

/// Request data members are taken verbatim when authored as JSON, so arrays in
/// a body stay arrays. `method` and natively authored reducers still parse.
fn options_node(raw: &RawReducer) -> Result<ReducerNode, EngineError> {
    let Some(entries) = raw.as_object() else {
        return raw.parse();
    };
    let mut members = IndexMap::with_capacity(entries.len());
    for (key, value) in entries {
        let node = match (key.as_str(), value.as_data()) {
            ("body" | "query" | "headers", Some(data)) => ReducerNode::Literal(data.clone()),
            _ => value.parse()?,
        };
        members.insert(key, node);
    }
    Ok(ReducerNode::Hash(members))
}

pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    entity: &'a Entity,
    spec: &'a RequestSpec,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    async move {
        let acc = reducer::resolve(engine, acc, &entity.value).await?;
        let options = reducer::resolve(engine, acc.clone(), &spec.options)
            .await?
            .value;
        let url = render_url(&spec.url, &acc)?;
        let params = request_params(entity, url, options, &acc)?;
        debug!(entity = %entity.id, method = %params.method, url = %params.url, "dispatching request");
        let response = engine
            .requests()
            .execute(&params)
            .await
            .map_err(EngineError::Request)?;
        Ok(acc.with_value(response))
    }
    .boxed()
}

fn request_params(
    entity: &Entity,
    url: String,
    options: Value,
    acc: &Accumulator,
) -> Result<RequestParams, EngineError> {
    let context = || format!("{} options", entity.id);
    let mut options = match options {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => return Err(EngineError::type_mismatch(context(), "object", &other)),
    };
    let method = match options.remove("method") {
        None | Some(Value::Null) => "GET".to_string(),
        Some(Value::String(method)) => method.to_uppercase(),
        Some(other) => return Err(EngineError::type_mismatch(context(), "string method", &other)),
    };
    let headers = string_map(options.remove("headers"), context)?;
    let query = string_map(options.remove("query"), context)?;
    let body = options.remove("body").filter(|body| !body.is_null());
    Ok(RequestParams {
        url,
        method,
        headers,
        query,
        body,
        locals: acc.locals.clone(),
    })
}

fn string_map(
    value: Option<Value>,
    context: impl Fn() -> String,
) -> Result<IndexMap<String, String>, EngineError> {
    let map = match value {
        None | Some(Value::Null) => return Ok(IndexMap::new()),
        Some(Value::Object(map)) => map,
        Some(other) => return Err(EngineError::type_mismatch(context(), "object", &other)),
    };
    Ok(map
        .into_iter()
        .map(|(key, value)| (key, display_value(&value)))
        .collect())
}

/// Replaces `{value.x}`, `{locals.x}` and `{params.x}` placeholders.
fn render_url(template: &str, acc: &Accumulator) -> Result<String, EngineError> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let close = after.find('}').ok_or_else(|| {
            EngineError::configuration(format!("unterminated placeholder in url '{template}'"))
        })?;
        let expression = format!("$..{}", after[..close].trim());
        let value = dp_expr::eval_path(&expression, &acc.scope()).map_err(|source| {
            EngineError::Expression {
                expression: expression.clone(),
                source,
            }
        })?;
        out.push_str(&display_value(&value));
        rest = &after[close + 1..];
    }
    out.push_str(rest);
    Ok(out)
}

fn display_value(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
