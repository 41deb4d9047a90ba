//! Executable reducer tree: the closed node set every raw configuration value
//! is parsed into, plus the resolver that runs it.

mod compose;
mod function;
mod raw;
mod resolve;

use std::fmt;

use indexmap::IndexMap;
use serde_json::Value;

use crate::entity::EntityId;

pub use compose::apply_compose;
pub use function::{ReducerFn, ReducerFuture};
pub use raw::{RawDefinition, RawReducer};
pub use resolve::{resolve, resolve_select};

/// One normalized resolution step.
#[derive(Debug, Clone)]
pub enum ReducerNode {
    /// Replaces the working value.
    Literal(Value),
    /// Opaque expression handed to the configured evaluator.
    Transform(String),
    Function(ReducerFn),
    EntityRef(EntityId),
    /// Ordered map/filter/find (or object) steps.
    Composite(Vec<ComposeStep>),
    /// Named reducers resolved concurrently, merged in key order.
    Hash(IndexMap<String, ReducerNode>),
    /// Sequential application; empty means identity.
    Chain(Vec<ReducerNode>),
    Select(Select),
}

impl ReducerNode {
    pub fn identity() -> Self {
        ReducerNode::Chain(Vec::new())
    }

    pub fn is_identity(&self) -> bool {
        matches!(self, ReducerNode::Chain(nodes) if nodes.is_empty())
    }
}

impl Default for ReducerNode {
    fn default() -> Self {
        Self::identity()
    }
}

/// Conditional dispatch: the first truthy `case` picks its branch.
#[derive(Debug, Clone, Default)]
pub struct Select {
    pub cases: Vec<SelectCase>,
    pub default: Option<Box<ReducerNode>>,
}

#[derive(Debug, Clone)]
pub struct SelectCase {
    pub case: ReducerNode,
    pub then: ReducerNode,
}

#[derive(Debug, Clone)]
pub struct ComposeStep {
    pub kind: ComposeKind,
    pub transform: ReducerNode,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ComposeKind {
    Filter,
    Map,
    Find,
    OmitKeys,
    PickKeys,
    MapKeys,
    AddValues,
    AddKeys,
}

impl ComposeKind {
    /// Sequence modifiers in inline precedence order.
    pub const COLLECTION: &'static [ComposeKind] =
        &[ComposeKind::Filter, ComposeKind::Map, ComposeKind::Find];

    /// Object modifiers in inline precedence order.
    pub const HASH: &'static [ComposeKind] = &[
        ComposeKind::OmitKeys,
        ComposeKind::PickKeys,
        ComposeKind::MapKeys,
        ComposeKind::AddValues,
        ComposeKind::AddKeys,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ComposeKind::Filter => "filter",
            ComposeKind::Map => "map",
            ComposeKind::Find => "find",
            ComposeKind::OmitKeys => "omitKeys",
            ComposeKind::PickKeys => "pickKeys",
            ComposeKind::MapKeys => "mapKeys",
            ComposeKind::AddValues => "addValues",
            ComposeKind::AddKeys => "addKeys",
        }
    }

    pub fn parse(key: &str) -> Option<Self> {
        Self::COLLECTION
            .iter()
            .chain(Self::HASH)
            .copied()
            .find(|kind| kind.as_str() == key)
    }

    /// Kinds whose argument is plain data rather than a reducer.
    pub fn takes_literal(self) -> bool {
        matches!(
            self,
            ComposeKind::OmitKeys | ComposeKind::PickKeys | ComposeKind::AddValues
        )
    }
}

impl fmt::Display for ComposeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
