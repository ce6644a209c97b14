//! Read-model rebuild by replaying the event log.
//!
//! Replay reads the log from the beginning and feeds every `incoming-message`
//! through the same projection as the live projector. It never publishes, so
//! rebuilding leaves the log untouched, and the read model's idempotent writes
//! make it safe to run over rows that already exist.

use parley_core::error::DomainError;
use parley_core::read_model::MessageRepository;
use parley_core::store::EventStore;
use serde::Serialize;
use tracing::{error, info, instrument};

use crate::application::projector::apply_projection;
use crate::domain::events::INCOMING_MESSAGE;

/// Outcome of a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReplaySummary {
    /// Log rows read.
    pub scanned: u64,
    /// Read-model rows written or confirmed.
    pub projected: u64,
    /// `incoming-message` rows left out because their payload is unusable.
    pub skipped: u64,
    /// Highest log position read.
    pub last_log_id: i64,
}

/// Replays the whole log into `messages`, `batch_size` rows at a time.
///
/// # Errors
///
/// Returns `DomainError::Validation` for a non-positive batch size. Stops at
/// the first log read or read-model write error; rows whose payload cannot be
/// projected are logged and counted in `skipped` instead.
#[instrument(skip(store, messages))]
pub async fn rebuild_projection(
    store: &dyn EventStore,
    messages: &dyn MessageRepository,
    batch_size: i64,
) -> Result<ReplaySummary, DomainError> {
    if batch_size <= 0 {
        return Err(DomainError::Validation(
            "batch_size must be positive".to_owned(),
        ));
    }

    let mut summary = ReplaySummary {
        scanned: 0,
        projected: 0,
        skipped: 0,
        last_log_id: 0,
    };

    loop {
        let batch = store.load_from(summary.last_log_id, batch_size).await?;
        let Some(last) = batch.last() else {
            break;
        };
        summary.last_log_id = last.log_id;

        for stored in &batch {
            summary.scanned += 1;
            if stored.event_type != INCOMING_MESSAGE {
                continue;
            }
            match apply_projection(stored, messages).await {
                Ok(_) => summary.projected += 1,
                Err(
                    err @ (DomainError::Validation(_) | DomainError::ProjectionTypeMismatch { .. }),
                ) => {
                    error!(
                        error = %err,
                        log_id = stored.log_id,
                        event_id = %stored.event_id,
                        "logged event cannot be projected, skipped"
                    );
                    summary.skipped += 1;
                }
                Err(err) => return Err(err),
            }
        }

        if i64::try_from(batch.len()).unwrap_or(i64::MAX) < batch_size {
            break;
        }
    }

    info!(
        scanned = summary.scanned,
        projected = summary.projected,
        skipped = summary.skipped,
        last_log_id = summary.last_log_id,
        "read model rebuilt"
    );
    Ok(summary)
}
