use thiserror::Error;

/// Errors detected while assembling the engine.
///
/// Everything that can go wrong once events flow (missing namespaces,
/// unknown sinks, failed deliveries, slow syncs) is logged instead.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("no rules registered")]
    NoRules,

    #[error("kind {name:?} is wanted as both {first} and {second}")]
    ConflictingWant {
        name: String,
        first: String,
        second: String,
    },
}
