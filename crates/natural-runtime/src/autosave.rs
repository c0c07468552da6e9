#![forbid(unsafe_code)]

//! Save-as-you-type for one record.
//!
//! [`AutoSave`] wires a [`CumulativeChanges`] session to a shared
//! [`DebounceCoalescer`]: every snapshot of the edited record is reduced to
//! its touched fields, those fields are debounced, and once the update
//! succeeds they are committed into the baseline.
//!
//! Because the differences are cumulative, each debounce call carries every
//! field touched since the last successful save. A cycle that gets cancelled
//! or fails is therefore repaired by the next snapshot without any replay
//! bookkeeping here. For the same reason a later save always carries a
//! superset of an earlier one's fields, so when several saves settle
//! together only the newest one is committed.

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use futures::future::BoxFuture;
use natural_core::Map;

use crate::cumulative_changes::CumulativeChanges;
use crate::debounce::{DebounceCoalescer, DebounceError, UpdateTarget};

#[derive(Debug, Default)]
struct Session {
    changes: CumulativeChanges,
    /// Sequence number of the last save that reached the coalescer.
    issued: u64,
    /// Sequence number of the last save committed into the baseline.
    committed: u64,
}

/// Debounced persistence of one entity through a shared coalescer.
pub struct AutoSave<T: ?Sized + UpdateTarget> {
    coalescer: Arc<DebounceCoalescer<T>>,
    target: Arc<T>,
    id: String,
    session: Mutex<Session>,
}

impl<T: ?Sized + UpdateTarget> AutoSave<T> {
    /// Start editing entity `id`, whose persisted state is `baseline`.
    #[must_use]
    pub fn new(
        coalescer: Arc<DebounceCoalescer<T>>,
        target: Arc<T>,
        id: impl Into<String>,
        baseline: &Map,
    ) -> Self {
        let mut session = Session::default();
        session.changes.initialize(baseline);
        Self {
            coalescer,
            target,
            id: id.into(),
            session: Mutex::new(session),
        }
    }

    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Persist `snapshot`, the full current state of the edited record.
    ///
    /// Resolves to `Ok(None)` without contacting the service when nothing was
    /// touched, otherwise to the service's output once the debounced update
    /// that carried these fields settles.
    ///
    /// # Errors
    ///
    /// The [`DebounceError`] of the cycle these fields were sent with. The
    /// fields stay touched and are sent again with the next snapshot.
    pub async fn save(&self, snapshot: &Map) -> Result<Option<T::Output>, DebounceError<T::Error>> {
        let (sequence, fields) = {
            let mut session = self.session();
            let Some(fields) = session.changes.differences(snapshot) else {
                return Ok(None);
            };
            session.issued += 1;
            (session.issued, fields)
        };
        let output = self
            .coalescer
            .debounce(&self.target, &self.id, fields.clone())
            .await?;

        let mut session = self.session();
        if sequence > session.committed {
            session.changes.commit(&fields);
            session.committed = sequence;
        }
        Ok(Some(output))
    }

    /// Send the pending update of this record now. Errors are not reported.
    pub fn flush(&self) -> BoxFuture<'static, ()> {
        self.coalescer.flush_one(&self.target, &self.id)
    }

    /// Drop the pending update of this record. Touched fields are kept and
    /// go out with the next [`save`](Self::save).
    pub fn cancel(&self) {
        self.coalescer.cancel_one(&self.target, &self.id);
    }

    /// Whether some touched field has not been saved yet.
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.session().changes.is_dirty()
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: ?Sized + UpdateTarget> fmt::Debug for AutoSave<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AutoSave")
            .field("id", &self.id)
            .field("dirty", &self.is_dirty())
            .finish()
    }
}
