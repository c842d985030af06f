//! `PostgreSQL` implementation of the ledger read traits.
//!
//! [`PgLedger::read_view`] runs the event and holdings queries inside one
//! `REPEATABLE READ, READ ONLY` transaction, so both results come from the
//! same database snapshot even while producers keep appending. Event rows
//! are streamed rather than buffered by the driver.
//!
//! The write helpers ([`PgLedger::insert_events`], [`PgLedger::set_holding`])
//! exist for fixture import and integration tests. Production writes come
//! from upstream producers.

use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use bourse_ledger::{
    ActivityLedger, EventQuery, HoldingsReader, LedgerReadError, LedgerSource, LedgerView,
};
use bourse_types::{ActivityEvent, ActivityKind, EntityId, EventId, ShareHolding};

use crate::error::{DbError, unavailable};

/// Default batch size for event inserts.
const DEFAULT_BATCH_SIZE: usize = 500;

const SELECT_EVENTS: &str = r"SELECT id, entity_id, kind, occurred_at
      FROM activity_events
      WHERE entity_id = $1
        AND occurred_at >= $2
        AND occurred_at <= $3
        AND kind = ANY($4::TEXT[])
      ORDER BY occurred_at, id";

const SELECT_TOTAL_SHARES: &str = r"SELECT COALESCE(SUM(shares), 0)::BIGINT
      FROM holdings
      WHERE entity_id = $1";

/// Ledger reader backed by `PostgreSQL`.
#[derive(Debug, Clone)]
pub struct PgLedger {
    pool: PgPool,
    batch_size: usize,
}

impl PgLedger {
    /// Create a reader over an existing pool.
    pub const fn new(pool: PgPool) -> Self {
        Self {
            pool,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// Set the batch size for inserts.
    #[must_use]
    pub const fn with_batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    /// Batch-insert activity events, ignoring ids that already exist.
    ///
    /// Each batch is one `INSERT ... SELECT FROM UNNEST` in its own
    /// transaction.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::OutOfRange`] if an entity id does not fit in
    /// `BIGINT`, or [`DbError::Postgres`] if the insert fails.
    pub async fn insert_events(&self, events: &[ActivityEvent]) -> Result<(), DbError> {
        if events.is_empty() {
            return Ok(());
        }

        for chunk in events.chunks(self.batch_size.max(1)) {
            let len = chunk.len();
            let mut ids: Vec<Uuid> = Vec::with_capacity(len);
            let mut entities: Vec<i64> = Vec::with_capacity(len);
            let mut kinds: Vec<String> = Vec::with_capacity(len);
            let mut timestamps: Vec<DateTime<Utc>> = Vec::with_capacity(len);

            for event in chunk {
                ids.push(event.id.into_inner());
                entities.push(id_to_db(event.entity_id)?);
                kinds.push(event.kind.as_str().to_owned());
                timestamps.push(event.timestamp);
            }

            let mut tx = self.pool.begin().await?;
            sqlx::query(
                r"INSERT INTO activity_events (id, entity_id, kind, occurred_at)
                  SELECT * FROM UNNEST($1::UUID[], $2::BIGINT[], $3::TEXT[], $4::TIMESTAMPTZ[])
                  ON CONFLICT (id) DO NOTHING",
            )
            .bind(ids)
            .bind(entities)
            .bind(kinds)
            .bind(timestamps)
            .execute(&mut *tx)
            .await?;
            tx.commit().await?;
        }

        tracing::debug!(count = events.len(), "Inserted activity events (batch UNNEST)");
        Ok(())
    }

    /// Record a holder's share count, replacing any previous value.
    ///
    /// # Errors
    ///
    /// Returns [`DbError::OutOfRange`] if an id or the share count does not
    /// fit in `BIGINT`, or [`DbError::Postgres`] if the upsert fails.
    pub async fn set_holding(&self, holding: &ShareHolding) -> Result<(), DbError> {
        let shares = i64::try_from(holding.shares)
            .map_err(|_err| DbError::OutOfRange(format!("shares {}", holding.shares)))?;
        sqlx::query(
            r"INSERT INTO holdings (entity_id, holder_id, shares)
              VALUES ($1, $2, $3)
              ON CONFLICT (entity_id, holder_id)
              DO UPDATE SET shares = EXCLUDED.shares, updated_at = now()",
        )
        .bind(id_to_db(holding.entity_id)?)
        .bind(id_to_db(holding.holder_id)?)
        .bind(shares)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

impl ActivityLedger for PgLedger {
    async fn list_events(&self, query: &EventQuery) -> Result<Vec<ActivityEvent>, LedgerReadError> {
        select_events(&self.pool, query).await
    }

    async fn tracked_entities(&self) -> Result<Vec<EntityId>, LedgerReadError> {
        let mut rows = sqlx::query_scalar::<_, i64>(
            r"SELECT entity_id FROM activity_events
              UNION
              SELECT entity_id FROM holdings
              ORDER BY 1",
        )
        .fetch(&self.pool);

        let mut entities = Vec::new();
        while let Some(raw) = rows.try_next().await.map_err(unavailable)? {
            entities.push(id_from_db(raw)?);
        }
        Ok(entities)
    }
}

impl HoldingsReader for PgLedger {
    async fn total_shares(&self, entity_id: EntityId) -> Result<u64, LedgerReadError> {
        select_total_shares(&self.pool, entity_id).await
    }
}

impl LedgerSource for PgLedger {
    async fn read_view(&self, query: &EventQuery) -> Result<LedgerView, LedgerReadError> {
        let mut tx = self.pool.begin().await.map_err(unavailable)?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL REPEATABLE READ, READ ONLY")
            .execute(&mut *tx)
            .await
            .map_err(unavailable)?;

        let events = select_events(&mut *tx, query).await?;
        let total_shares = select_total_shares(&mut *tx, query.entity_id).await?;

        // Read-only: commit and rollback are equivalent; commit releases
        // the snapshot promptly.
        tx.commit().await.map_err(unavailable)?;

        Ok(LedgerView {
            events,
            total_shares,
        })
    }
}

async fn select_events<'c, E>(
    executor: E,
    query: &EventQuery,
) -> Result<Vec<ActivityEvent>, LedgerReadError>
where
    E: PgExecutor<'c>,
{
    let entity = query_id(query.entity_id)?;
    let kinds: Vec<String> = query
        .kinds
        .iter()
        .map(|kind| kind.as_str().to_owned())
        .collect();

    let mut rows = sqlx::query_as::<_, ActivityEventRow>(SELECT_EVENTS)
        .bind(entity)
        .bind(query.since)
        .bind(query.until)
        .bind(kinds)
        .fetch(executor);

    let mut events = Vec::new();
    while let Some(row) = rows.try_next().await.map_err(unavailable)? {
        events.push(row.into_event()?);
    }
    Ok(events)
}

async fn select_total_shares<'c, E>(executor: E, entity_id: EntityId) -> Result<u64, LedgerReadError>
where
    E: PgExecutor<'c>,
{
    let total: i64 = sqlx::query_scalar(SELECT_TOTAL_SHARES)
        .bind(query_id(entity_id)?)
        .fetch_one(executor)
        .await
        .map_err(unavailable)?;
    u64::try_from(total).map_err(|_err| LedgerReadError::Corrupt {
        message: format!("negative share total {total} for entity {entity_id}"),
    })
}

/// A row from the `activity_events` table.
///
/// Uses runtime types rather than compile-time checked types to
/// avoid requiring a live database during builds.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActivityEventRow {
    /// Event identifier.
    pub id: Uuid,
    /// Entity snowflake, stored as `BIGINT`.
    pub entity_id: i64,
    /// Activity kind name.
    pub kind: String,
    /// When the event happened.
    pub occurred_at: DateTime<Utc>,
}

impl ActivityEventRow {
    /// Convert into the domain type, rejecting rows no producer could write.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerReadError::Corrupt`] for a negative entity id or an
    /// unknown kind.
    pub fn into_event(self) -> Result<ActivityEvent, LedgerReadError> {
        let kind: ActivityKind = self.kind.parse().map_err(|e| LedgerReadError::Corrupt {
            message: format!("event {}: {e}", self.id),
        })?;
        Ok(ActivityEvent {
            id: EventId::from(self.id),
            entity_id: id_from_db(self.entity_id)?,
            timestamp: self.occurred_at,
            kind,
        })
    }
}

fn id_to_db(id: EntityId) -> Result<i64, DbError> {
    i64::try_from(id.get()).map_err(|_err| DbError::OutOfRange(format!("entity id {id}")))
}

/// Ids above `i64::MAX` can never have been stored, so querying one is a
/// caller error rather than an outage.
fn query_id(id: EntityId) -> Result<i64, LedgerReadError> {
    i64::try_from(id.get()).map_err(|_err| LedgerReadError::Corrupt {
        message: format!("entity id {id} exceeds the BIGINT range"),
    })
}

fn id_from_db(raw: i64) -> Result<EntityId, LedgerReadError> {
    u64::try_from(raw)
        .map(EntityId)
        .map_err(|_err| LedgerReadError::Corrupt {
            message: format!("negative entity id {raw}"),
        })
}
