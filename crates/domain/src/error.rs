//! Domain error types.

use common::{DayId, KeySpace, ScheduleId, TripId};
use thiserror::Error;
use trip_store::StoreError;

use crate::trip::TripError;

/// Which capacity limit a pre-flight count hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapacityScope {
    Trip,
    Day,
}

impl std::fmt::Display for CapacityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapacityScope::Trip => write!(f, "trip"),
            CapacityScope::Day => write!(f, "day"),
        }
    }
}

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// An error occurred in the planner store.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// An error occurred in the trip aggregate.
    #[error("Trip error: {0}")]
    Trip(#[from] TripError),

    /// Trip not found.
    #[error("Trip not found: {0}")]
    TripNotFound(TripId),

    /// Day not found.
    #[error("Day not found: {0}")]
    DayNotFound(DayId),

    /// Schedule not found.
    #[error("Schedule not found: {0}")]
    ScheduleNotFound(ScheduleId),

    /// Too many schedules already exist in the trip or on the day.
    #[error("Capacity exceeded: a {scope} holds at most {limit} schedules")]
    CapacityExceeded { scope: CapacityScope, limit: u64 },

    /// Persisted rows violate an aggregate invariant.
    #[error("Invalid record: {0}")]
    InvalidRecord(String),

    /// The service and its store disagree on order key bounds.
    #[error("Key space mismatch: configured {configured:?}, store uses {store:?}")]
    KeySpaceMismatch {
        configured: KeySpace,
        store: KeySpace,
    },
}

impl DomainError {
    /// Returns true for key exhaustion, whether raised by the aggregate or
    /// by a bulk store operation.
    pub fn is_recoverable(&self) -> bool {
        match self {
            DomainError::Trip(e) => e.is_recoverable(),
            DomainError::Store(StoreError::RangeExceeded { .. }) => true,
            _ => false,
        }
    }

    /// Returns true if the error stems from the caller's request rather than
    /// from the system.
    pub fn is_client_error(&self) -> bool {
        match self {
            DomainError::Trip(e) => !e.is_recoverable(),
            DomainError::TripNotFound(_)
            | DomainError::DayNotFound(_)
            | DomainError::ScheduleNotFound(_)
            | DomainError::CapacityExceeded { .. } => true,
            DomainError::Store(_)
            | DomainError::InvalidRecord(_)
            | DomainError::KeySpaceMismatch { .. } => false,
        }
    }
}
