use futures::future::BoxFuture;

use super::EntityKind;
use crate::accumulator::Accumulator;
use crate::engine::Engine;
use crate::error::EngineError;
use crate::reducer::{self, RawDefinition, Select, SelectCase};

/// `select` is an ordered list of `{ case, do }` objects; `default` is optional.
pub(super) fn create(raw: &RawDefinition) -> Result<EntityKind, EngineError> {
    let items = match raw.get("select") {
        Some(select) => select
            .as_list()
            .ok_or_else(|| EngineError::configuration("select must be an array"))?,
        None => Vec::new(),
    };
    let mut cases = Vec::with_capacity(items.len());
    for (idx, item) in items.iter().enumerate() {
        let entries = item.as_object().ok_or_else(|| {
            EngineError::configuration(format!("select[{idx}] must be an object"))
        })?;
        let mut case = None;
        let mut then = None;
        for (key, value) in &entries {
            match key.as_str() {
                "case" => case = Some(value.parse()?),
                "do" => then = Some(value.parse()?),
                other => {
                    return Err(EngineError::configuration(format!(
                        "select[{idx}]: unsupported key '{other}'"
                    )));
                }
            }
        }
        let (Some(case), Some(then)) = (case, then) else {
            return Err(EngineError::configuration(format!(
                "select[{idx}] requires both 'case' and 'do'"
            )));
        };
        cases.push(SelectCase { case, then });
    }
    let default = raw
        .get("default")
        .map(|raw| raw.parse().map(Box::new))
        .transpose()?;
    if cases.is_empty() && default.is_none() {
        return Err(EngineError::configuration(
            "control entities need at least one select case or a default",
        ));
    }
    Ok(EntityKind::Control(Select { cases, default }))
}

pub(super) fn resolve<'a>(
    engine: &'a Engine,
    acc: Accumulator,
    select: &'a Select,
) -> BoxFuture<'a, Result<Accumulator, EngineError>> {
    reducer::resolve_select(engine, acc, select)
}
