//! Shared fixtures for the integration tests.
//!
//! Each integration test compiles this module separately, so some helpers may
//! look unused from one test file while another relies on them.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dp_engine::{
    Engine, RawDefinition, RawReducer, RecordingSink, ReducerFn, RequestAdapter, RequestParams,
    StaticRequestAdapter,
};
use once_cell::sync::OnceCell;
use serde_json::{Value, json};

pub const REMOTE: &str = "http://remote.test";

static TRACING: OnceCell<()> = OnceCell::new();

/// Installs a `RUST_LOG`-driven subscriber once per test binary.
pub fn init_tracing() {
    TRACING.get_or_init(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn remote(path: &str) -> String {
    format!("{REMOTE}{path}")
}

/// Input tree used by the branch/leaf fixtures: depth 3 with branching.
pub fn tree_data() -> Value {
    json!({
        "tree": {
            "id": "1",
            "children": [
                { "id": "1.0", "children": [] },
                {
                    "id": "1.1",
                    "children": [
                        { "id": "1.1.0", "children": [] },
                        { "id": "1.1.1", "children": [] }
                    ]
                }
            ]
        },
        "a": { "b": { "c": 1 } }
    })
}

/// Entity definitions written as JSON.
pub fn json_entities() -> Value {
    json!({
        "entry:a0": {},
        "entry:a1": { "value": "$a.b.c" },

        "hash:branchLeafNesting": {
            "value": "$tree",
            "mapKeys": { "label": "$id", "leafs": "$children | collection:leafs" }
        },
        "collection:leafs": { "map": "hash:branchLeafNode" },
        "hash:branchLeafNode": {
            "mapKeys": { "label": "$id", "leafs": "$children | collection:leafs" }
        },

        "request:source1": { "url": "http://remote.test/source1" },
        "request:source2": { "url": "http://remote.test/source2" },
        "request:fromLocals": { "url": "http://remote.test{locals.itemPath}" },
        "request:fromValue": { "url": "http://remote.test{value.itemPath}" },
        "request:postIds": {
            "url": "http://remote.test/ids",
            "options": {
                "method": "POST",
                "headers": { "x-batch": "1" },
                "body": { "ids": [1, 2, 3] }
            }
        },
        "entry:callRequest": { "value": "request:source1" },
        "entry:callDynamicRequestFromLocals": { "value": "request:fromLocals" },
        "hash:callsRequest": { "value": "request:source1" },
        "entry:hashThatCallsRequest": { "value": "hash:callsRequest" },
        "model:multipleSources": {
            "sources": {
                "s1": "request:source1 | $source",
                "s2": "request:source2 | $result"
            }
        },
        "entry:callHashThatCallsMultipleRequests": { "value": "model:multipleSources" },
        "collection:fetchEach": { "map": "request:fromValue" },
        "entry:nestedRequests": { "value": "request:source1 | $sources | collection:fetchEach" },
        "hash:siblingFailure": {
            "value": { "ok": "request:source1", "bad": "request:missing" }
        },

        "schema:a.1.0": {
            "schema": {
                "type": "object",
                "properties": {
                    "foo": { "type": "number" },
                    "bar": { "type": "string" }
                },
                "required": ["foo", "bar"]
            }
        },

        "model:tracedViaOptions": { "value": "$a" },
        "model:tracedViaParams": { "value": "$a", "params": { "trace": true } },
        "entry:tracedParent": { "value": "model:tracedViaParams" },

        "collection:activeNames": { "filter": "$active", "map": "$name" },
        "collection:firstActive": { "compose": [{ "filter": "$active" }, { "find": "$name" }] },
        "hash:publicProfile": {
            "omitKeys": ["secret"],
            "addValues": { "kind": "profile" },
            "addKeys": { "display": "$name" }
        },

        "hash:tagged": {
            "mapKeys": { "name": "$name", "tags": { "$literal": ["a", "b"] } }
        },

        "entry:first": { "value": "first" },
        "entry:second": { "value": "second" },
        "entry:fallback": { "value": "fallback" },
        "control:pick": {
            "select": [
                { "case": "$useFirst", "do": "entry:first" },
                { "case": "$useSecond", "do": "entry:second" }
            ],
            "default": "entry:fallback"
        }
    })
}

/// Definitions that embed inline callables.
pub fn function_entities() -> Vec<(&'static str, RawDefinition)> {
    vec![
        (
            "hash:requestAndExtend",
            RawDefinition::new()
                .with("value", "request:source1")
                .with("pickKeys", json!(["ok"]))
                .with(
                    "addKeys",
                    RawReducer::object([(
                        "newOk",
                        ReducerFn::sync(|acc| Ok(json!(format!("{}ok", acc.value["ok"])))),
                    )]),
                ),
        ),
        (
            "entry:callHashWithRequestAndExtendResult",
            RawDefinition::new().with("value", "hash:requestAndExtend"),
        ),
        (
            "entry:recovers",
            RawDefinition::new()
                .with(
                    "value",
                    ReducerFn::sync(|_| Err(anyhow::anyhow!("boom"))),
                )
                .with(
                    "error",
                    ReducerFn::sync(|acc| {
                        let name = acc.error.as_ref().map(|info| info.name.clone());
                        Ok(json!({ "recovered": acc.value["message"], "name": name }))
                    }),
                ),
        ),
        (
            "entry:failsHard",
            RawDefinition::new().with(
                "value",
                ReducerFn::sync(|_| Err(anyhow::anyhow!("boom"))),
            ),
        ),
        (
            "entry:callbackFails",
            RawDefinition::new().with(
                "value",
                ReducerFn::callback(|_, done| done.fail(anyhow::anyhow!("callback failed"))),
            ),
        ),
        (
            "entry:schemaRecovers",
            RawDefinition::new()
                .with("value", "schema:a.1.0")
                .with("error", "$errors"),
        ),
    ]
}

/// Canned responses for the request fixtures.
pub fn remote_routes() -> StaticRequestAdapter {
    StaticRequestAdapter::new()
        .with_json(
            remote("/source1"),
            json!({
                "ok": true,
                "source": "source1",
                "sources": [{ "itemPath": "/source2" }, { "itemPath": "/source3" }]
            }),
        )
        .with_json(remote("/source2"), json!({ "result": "source2" }))
        .with_json(remote("/source3"), json!({ "result": "source3" }))
        .with_route("POST", remote("/ids"), json!({ "stored": 3 }))
}

pub struct Fixture {
    pub engine: Engine,
    pub requests: StaticRequestAdapter,
    pub trace: RecordingSink,
}

pub fn fixture() -> Fixture {
    fixture_with(remote_routes(), HashMap::new())
}

/// Fixture whose request adapter holds back the listed urls by their delay.
pub fn fixture_with(requests: StaticRequestAdapter, delays: HashMap<String, Duration>) -> Fixture {
    init_tracing();
    let trace = RecordingSink::new();
    let adapter = DelayedRequests {
        inner: requests.clone(),
        delays,
    };
    let mut builder = Engine::builder()
        .entities_json(json_entities())
        .expect("fixture entities are objects")
        .requests(Arc::new(adapter))
        .trace_sink(Arc::new(trace.clone()));
    for (id, raw) in function_entities() {
        builder = builder.entity(id, raw);
    }
    let engine = builder.build().expect("fixture entities are valid");
    Fixture {
        engine,
        requests,
        trace,
    }
}

struct DelayedRequests {
    inner: StaticRequestAdapter,
    delays: HashMap<String, Duration>,
}

#[async_trait]
impl RequestAdapter for DelayedRequests {
    fn name(&self) -> &str {
        "request.delayed"
    }

    async fn execute(&self, params: &RequestParams) -> anyhow::Result<Value> {
        if let Some(delay) = self.delays.get(&params.url) {
            tokio::time::sleep(*delay).await;
        }
        self.inner.execute(params).await
    }
}
