//! Mockingbird: a programmable HTTP stub server.
//!
//! Mappings pair a request matcher with a response; the engine resolves
//! each incoming request to at most one mapping, honoring time windows,
//! probability sampling, scenario state and a fixed ranking order.

pub mod config;
pub mod engine;
pub mod evaluator;
pub mod mapping;
pub mod matchers;
pub mod metrics;
pub mod random;
pub mod recording;
pub mod request;
pub mod response;
pub mod scenario;
pub mod selector;
pub mod server;

pub use engine::Engine;
pub use mapping::{Mapping, MappingBuilder, MappingError, MappingRegistry, TimeSettings};
pub use request::{BodyData, RequestMessage};
pub use response::{ResponseMessage, ResponseProvider};
pub use selector::{MappingMatch, MappingSelector, Resolution};
