//! Status codes reported to the host dispatcher.

use serde::{Deserialize, Serialize};

use crate::errors::LookupError;

/// Outcome of a directory call as the host sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Status {
    Success,
    /// No such key, or the enumeration is exhausted.
    NotFound,
    /// The policy source could not be opened or read.
    Unavailable,
    /// The buffer was too small; retry the same call with a larger one.
    TryAgain,
}

impl Status {
    pub fn of<T>(result: &Result<T, LookupError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(err) => Status::from(err),
        }
    }
}

impl From<&LookupError> for Status {
    fn from(err: &LookupError) -> Self {
        match err {
            LookupError::NotFound => Status::NotFound,
            LookupError::Unavailable(_) => Status::Unavailable,
            LookupError::InsufficientCapacity { .. } => Status::TryAgain,
        }
    }
}

impl std::fmt::Display for Status {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::NotFound => write!(f, "not_found"),
            Self::Unavailable => write!(f, "unavailable"),
            Self::TryAgain => write!(f, "try_again"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_of_results() {
        assert_eq!(Status::of(&Ok::<(), LookupError>(())), Status::Success);
        assert_eq!(
            Status::of::<()>(&Err(LookupError::NotFound)),
            Status::NotFound
        );
        assert_eq!(
            Status::of::<()>(&Err(LookupError::Unavailable("gone".into()))),
            Status::Unavailable
        );
        assert_eq!(
            Status::of::<()>(&Err(LookupError::InsufficientCapacity {
                needed: 10,
                available: 0
            })),
            Status::TryAgain
        );
        assert_eq!(Status::TryAgain.to_string(), "try_again");
    }
}
