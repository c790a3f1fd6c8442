//! Optimistic read-compute-swap loop shared by every mutating operation.

use tracing::{debug, error, warn};

use crate::{
    dao::{session_store::Versioned, storage::StorageError},
    error::ServiceError,
    services::{presence, sse_events},
    state::{
        SharedState,
        session::{Session, now_ms},
        transitions::{Outcome, TransitionContext, TransitionError},
    },
};

/// Result of a transition once the runner is done with it.
#[derive(Debug)]
pub struct Applied<T> {
    /// Document as stored after the operation.
    pub session: Session,
    /// Value produced by the transition.
    pub value: T,
    /// Whether a new revision was written.
    pub committed: bool,
}

/// Load the room `code`, compute `transition` on it and swap the result in.
///
/// A conflicting swap discards the computed document and starts over from a
/// fresh read with a fresh clock, up to the configured attempt budget. After a
/// successful swap the new snapshot is published on the room's stream and the
/// player whose turn just started is notified over presence, unless the
/// transition asked for a quiet write.
pub async fn apply_transition<T, F>(
    state: &SharedState,
    code: &str,
    operation: &'static str,
    mut transition: F,
) -> Result<Applied<T>, ServiceError>
where
    F: FnMut(&Session, &mut TransitionContext<'_>) -> Result<Outcome<T>, TransitionError>,
{
    let store = state.require_session_store().await?;
    let attempts = state.config().max_transition_attempts().max(1);

    for attempt in 1..=attempts {
        let Versioned { revision, document } = store
            .load(code.to_string())
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("room `{code}` not found")))?;

        let outcome = {
            let mut ctx = TransitionContext::new(now_ms(), state.rules());
            transition(&document, &mut ctx)?
        };

        let (next, value, announce) = match outcome {
            Outcome::NoOp(value) => {
                return Ok(Applied {
                    session: document,
                    value,
                    committed: false,
                });
            }
            Outcome::Commit(next, value) => (next, value, true),
            Outcome::Quiet(next, value) => (next, value, false),
        };

        if let Err(violation) = next.check_invariants() {
            error!(room = %code, operation, %violation, "transition produced an invalid document");
            return Err(ServiceError::InvalidState(violation));
        }

        match store
            .compare_and_swap(code.to_string(), revision, next.clone())
            .await
        {
            Ok(_) => {
                if announce {
                    sse_events::broadcast_session(state, &next);
                    presence::notify_turn_change(state, &document, &next);
                }
                return Ok(Applied {
                    session: next,
                    value,
                    committed: true,
                });
            }
            Err(StorageError::Conflict { .. }) => {
                debug!(room = %code, operation, attempt, "concurrent write detected; recomputing");
            }
            Err(err) => return Err(err.into()),
        }
    }

    warn!(room = %code, operation, attempts, "giving up after repeated write conflicts");
    Err(ServiceError::Contention {
        room: code.to_string(),
        attempts,
    })
}
