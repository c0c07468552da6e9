#![forbid(unsafe_code)]

//! The update collaborator contract and the errors it surfaces.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use natural_core::Map;

/// A service able to persist a partial record immediately.
///
/// This is the only capability a [`DebounceCoalescer`](super::DebounceCoalescer)
/// needs from a data service. `fields` always contains the entity id under
/// the `"id"` key.
#[async_trait]
pub trait UpdateTarget: Send + Sync + 'static {
    /// What a successful update yields, typically the updated record.
    type Output: Clone + Send + Sync + 'static;
    /// Failure reported by the service.
    type Error: Send + Sync + 'static;

    async fn update_now(&self, fields: Map) -> Result<Self::Output, Self::Error>;
}

/// Why a debounced update did not produce a result.
pub enum DebounceError<E> {
    /// The entry was cancelled before its update was issued.
    Cancelled,
    /// The update was issued and failed. Every caller that debounced into the
    /// same entry receives the same error.
    Update(Arc<E>),
    /// The update call panicked. Carries the panic message.
    Panicked(String),
}

impl<E> Clone for DebounceError<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Cancelled => Self::Cancelled,
            Self::Update(err) => Self::Update(Arc::clone(err)),
            Self::Panicked(message) => Self::Panicked(message.clone()),
        }
    }
}

impl<E: fmt::Debug> fmt::Debug for DebounceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => f.write_str("Cancelled"),
            Self::Update(err) => f.debug_tuple("Update").field(err).finish(),
            Self::Panicked(message) => f.debug_tuple("Panicked").field(message).finish(),
        }
    }
}

impl<E: fmt::Display> fmt::Display for DebounceError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cancelled => write!(f, "debounced update was cancelled"),
            Self::Update(err) => write!(f, "debounced update failed: {err}"),
            Self::Panicked(message) => write!(f, "debounced update panicked: {message}"),
        }
    }
}

impl<E: std::error::Error + 'static> std::error::Error for DebounceError<E> {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Cancelled | Self::Panicked(_) => None,
            Self::Update(err) => Some(&**err),
        }
    }
}

impl<E> DebounceError<E> {
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// The service error, if the update was issued and failed.
    #[must_use]
    pub fn update_error(&self) -> Option<&E> {
        match self {
            Self::Cancelled | Self::Panicked(_) => None,
            Self::Update(err) => Some(err.as_ref()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error as _;

    #[derive(Debug)]
    struct Boom;

    impl fmt::Display for Boom {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn clone_shares_the_service_error() {
        let err = DebounceError::Update(Arc::new(Boom));
        let copy = err.clone();
        match (&err, &copy) {
            (DebounceError::Update(a), DebounceError::Update(b)) => assert!(Arc::ptr_eq(a, b)),
            _ => unreachable!(),
        }
    }

    #[test]
    fn display_and_source() {
        let err = DebounceError::Update(Arc::new(Boom));
        assert_eq!(err.to_string(), "debounced update failed: boom");
        assert!(err.source().is_some());
        assert!(err.update_error().is_some());

        let cancelled = DebounceError::<Boom>::Cancelled;
        assert!(cancelled.is_cancelled());
        assert!(cancelled.source().is_none());

        let panicked = DebounceError::<Boom>::Panicked("index out of bounds".into());
        assert_eq!(panicked.to_string(), "debounced update panicked: index out of bounds");
        assert!(panicked.update_error().is_none());
        assert!(!panicked.is_cancelled());
    }
}
