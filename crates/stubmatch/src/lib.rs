// Mountebank-compatible predicate evaluation for service virtualization stubs.
//
// A predicate is parsed once (`Predicate::from_json`) and evaluated many times
// against request records (`Engine::evaluate`).

// ===== Predicate model =====
pub mod encoding;
pub mod error;
pub mod predicate;
pub mod request;

// ===== Evaluation =====
pub mod engine;
pub mod normalize;
pub mod operators;
pub mod resolver;
pub mod selector;

// ===== Support =====
pub mod cache;
pub mod config;

pub use cache::{CacheMetrics, PatternCache};
pub use config::{EngineConfig, PatternCacheConfig};
pub use encoding::Encoding;
pub use engine::Engine;
pub use error::{ErrorKind, PredicateError, Result};
pub use predicate::{FieldSpec, Operator, Predicate, PredicateParameters};
pub use request::Request;
pub use selector::{JsonPathSelector, SelectorKind, XPathSelector};
