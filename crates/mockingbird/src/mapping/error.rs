use uuid::Uuid;

/// Reasons a mapping is rejected at registration.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MappingError {
    #[error("mapping {id}: probability {probability} is outside [0, 1]")]
    InvalidProbability { id: Uuid, probability: f64 },
    #[error("mapping {id}: path '{path}' must start with '/'")]
    InvalidPath { id: Uuid, path: String },
    #[error("mapping {id}: times in same state must be at least 1")]
    InvalidStateTimes { id: Uuid },
}
