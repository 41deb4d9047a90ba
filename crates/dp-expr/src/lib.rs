//! Path expression evaluation over JSON values plus the value helpers the engine shares.

mod path;
mod value;

pub use path::{EvalError, EvalResult, PathExpr, PathRoot, Scope, Segment, eval_path};
pub use value::{is_truthy, kind};
