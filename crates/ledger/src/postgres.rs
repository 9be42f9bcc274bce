use async_trait::async_trait;
use chrono::{DateTime, Utc};
use domain::{
    Hold, HoldStatus, Money, StatusCounts, Tier, TicketStatus, TicketUnit, TransitionMetadata,
};
use sqlx::{PgConnection, PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::{
    HoldId, HolderRef, LedgerError, Result, TicketId, TierId, UnitQuery,
    store::{InventoryLedger, validate_transition},
};

const UNIT_COLUMNS: &str = "ticket_id, tier_id, status, holder_ref, hold_id, hold_expires_at, created_at, sold_at, redeemed_at";
const HOLD_COLUMNS: &str =
    "hold_id, tier_id, ticket_ids, holder_ref, created_at, expires_at, status";

/// PostgreSQL-backed inventory ledger.
///
/// Compare-and-set is a single conditional `UPDATE`, so the database's
/// row-level atomicity provides the per-unit linearizability.
#[derive(Clone)]
pub struct PostgresLedger {
    pool: PgPool,
}

impl PostgresLedger {
    /// Creates a new PostgreSQL ledger.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    fn row_to_tier(row: PgRow) -> Result<Tier> {
        let capacity: i64 = row.try_get("total_capacity")?;
        Ok(Tier {
            tier_id: TierId::new(row.try_get::<String, _>("tier_id")?),
            total_capacity: u32::try_from(capacity).map_err(|_| {
                LedgerError::InvalidArgument(format!("stored capacity {capacity} out of range"))
            })?,
            price: Money::from_cents(row.try_get("price_cents")?),
            created_at: row.try_get("created_at")?,
            halted: row.try_get("halted")?,
        })
    }

    fn row_to_unit(row: PgRow) -> Result<TicketUnit> {
        let status: String = row.try_get("status")?;
        Ok(TicketUnit {
            ticket_id: TicketId::from_uuid(row.try_get::<Uuid, _>("ticket_id")?),
            tier_id: TierId::new(row.try_get::<String, _>("tier_id")?),
            status: status.parse()?,
            holder_ref: row
                .try_get::<Option<String>, _>("holder_ref")?
                .map(HolderRef::new),
            hold_id: row
                .try_get::<Option<Uuid>, _>("hold_id")?
                .map(HoldId::from_uuid),
            hold_expires_at: row.try_get("hold_expires_at")?,
            created_at: row.try_get("created_at")?,
            sold_at: row.try_get("sold_at")?,
            redeemed_at: row.try_get("redeemed_at")?,
        })
    }

    fn row_to_hold(row: PgRow) -> Result<Hold> {
        let status: String = row.try_get("status")?;
        let ticket_ids: Vec<Uuid> = row.try_get("ticket_ids")?;
        Ok(Hold {
            hold_id: HoldId::from_uuid(row.try_get::<Uuid, _>("hold_id")?),
            tier_id: TierId::new(row.try_get::<String, _>("tier_id")?),
            ticket_ids: ticket_ids.into_iter().map(TicketId::from_uuid).collect(),
            holder_ref: HolderRef::new(row.try_get::<String, _>("holder_ref")?),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            status: status.parse()?,
        })
    }

    async fn unit_exists(&self, ticket_id: TicketId) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM ticket_units WHERE ticket_id = $1)",
        )
        .bind(ticket_id.as_uuid())
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn insert_tier(conn: &mut PgConnection, tier: &Tier) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO tiers (tier_id, total_capacity, price_cents, created_at, halted)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(tier.tier_id.as_str())
        .bind(i64::from(tier.total_capacity))
        .bind(tier.price.cents())
        .bind(tier.created_at)
        .bind(tier.halted)
        .execute(&mut *conn)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return LedgerError::TierAlreadyExists(tier.tier_id.clone());
            }
            LedgerError::Database(e)
        })?;

        Ok(())
    }

    /// Inserts available units, keeping `ids` order in the `seq` column.
    async fn insert_units(
        conn: &mut PgConnection,
        tier_id: &TierId,
        ids: &[TicketId],
        created_at: DateTime<Utc>,
    ) -> Result<()> {
        let uuids: Vec<Uuid> = ids.iter().map(TicketId::as_uuid).collect();

        sqlx::query(
            r#"
            INSERT INTO ticket_units (ticket_id, tier_id, status, created_at)
            SELECT id, $2, 'available', $3
            FROM UNNEST($1::uuid[]) WITH ORDINALITY AS t(id, ord)
            ORDER BY ord
            "#,
        )
        .bind(uuids)
        .bind(tier_id.as_str())
        .bind(created_at)
        .execute(&mut *conn)
        .await?;

        Ok(())
    }

    async fn hold_exists(&self, hold_id: HoldId) -> Result<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM holds WHERE hold_id = $1)")
                .bind(hold_id.as_uuid())
                .fetch_one(&self.pool)
                .await?;
        Ok(exists)
    }
}

#[async_trait]
impl InventoryLedger for PostgresLedger {
    async fn create_tier(&self, tier: Tier) -> Result<()> {
        let mut conn = self.pool.acquire().await?;
        Self::insert_tier(&mut conn, &tier).await
    }

    async fn create_tier_with_units(&self, tier: Tier) -> Result<Vec<TicketId>> {
        let mut tx = self.pool.begin().await?;
        Self::insert_tier(&mut tx, &tier).await?;

        let ids: Vec<TicketId> = (0..tier.total_capacity).map(|_| TicketId::new()).collect();
        if !ids.is_empty() {
            Self::insert_units(&mut tx, &tier.tier_id, &ids, tier.created_at).await?;
        }

        tx.commit().await?;
        Ok(ids)
    }

    async fn get_tier(&self, tier_id: &TierId) -> Result<Option<Tier>> {
        let row: Option<PgRow> = sqlx::query(
            r#"
            SELECT tier_id, total_capacity, price_cents, created_at, halted
            FROM tiers
            WHERE tier_id = $1
            "#,
        )
        .bind(tier_id.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_tier).transpose()
    }

    async fn halt_tier(&self, tier_id: &TierId) -> Result<()> {
        let result = sqlx::query("UPDATE tiers SET halted = TRUE WHERE tier_id = $1")
            .bind(tier_id.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(LedgerError::TierNotFound(tier_id.clone()));
        }
        Ok(())
    }

    async fn create_units(
        &self,
        tier_id: &TierId,
        count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Vec<TicketId>> {
        if count == 0 {
            return Err(LedgerError::InvalidArgument(
                "unit count must be greater than 0".to_string(),
            ));
        }

        let mut tx = self.pool.begin().await?;

        // Lock the tier row so concurrent allocations serialize on capacity
        let row: Option<PgRow> =
            sqlx::query("SELECT total_capacity, halted FROM tiers WHERE tier_id = $1 FOR UPDATE")
                .bind(tier_id.as_str())
                .fetch_optional(&mut *tx)
                .await?;
        let row = row.ok_or_else(|| LedgerError::TierNotFound(tier_id.clone()))?;
        let capacity: i64 = row.try_get("total_capacity")?;
        let halted: bool = row.try_get("halted")?;
        if halted {
            return Err(LedgerError::TierHalted(tier_id.clone()));
        }

        let existing: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM ticket_units WHERE tier_id = $1")
                .bind(tier_id.as_str())
                .fetch_one(&mut *tx)
                .await?;

        if existing + i64::from(count) > capacity {
            return Err(LedgerError::Capacity {
                tier_id: tier_id.clone(),
                capacity: u32::try_from(capacity).unwrap_or(u32::MAX),
                existing: u64::try_from(existing).unwrap_or(0),
                requested: count,
            });
        }

        let ids: Vec<TicketId> = (0..count).map(|_| TicketId::new()).collect();
        Self::insert_units(&mut tx, tier_id, &ids, created_at).await?;

        tx.commit().await?;
        Ok(ids)
    }

    async fn try_transition(
        &self,
        ticket_id: TicketId,
        expected: TicketStatus,
        next: TicketStatus,
        metadata: &TransitionMetadata,
    ) -> Result<bool> {
        validate_transition(expected, next, metadata)?;

        let mut sql = String::from("UPDATE ticket_units SET status = $1");
        let mut param_count = 1;

        match next {
            TicketStatus::Held => {
                sql.push_str(", holder_ref = $2, hold_id = $3, hold_expires_at = $4");
                param_count = 4;
            }
            TicketStatus::Sold => {
                sql.push_str(", sold_at = $2, hold_expires_at = NULL");
                param_count = 2;
            }
            TicketStatus::Redeemed => {
                sql.push_str(", redeemed_at = $2");
                param_count = 2;
            }
            TicketStatus::Released | TicketStatus::Available => {
                sql.push_str(", holder_ref = NULL, hold_id = NULL, hold_expires_at = NULL");
            }
        }

        param_count += 1;
        sql.push_str(&format!(" WHERE ticket_id = ${param_count}"));
        param_count += 1;
        sql.push_str(&format!(" AND status = ${param_count}"));

        let pinned_hold = match expected {
            TicketStatus::Held => metadata.hold_id,
            _ => None,
        };
        if pinned_hold.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND hold_id = ${param_count}"));
        }

        let mut query = sqlx::query(&sql).bind(next.as_str());
        match next {
            TicketStatus::Held => {
                query = query
                    .bind(metadata.holder_ref.as_ref().map(|h| h.as_str().to_string()))
                    .bind(metadata.hold_id.map(|h| h.as_uuid()))
                    .bind(metadata.hold_expires_at);
            }
            TicketStatus::Sold | TicketStatus::Redeemed => {
                query = query.bind(metadata.at);
            }
            TicketStatus::Released | TicketStatus::Available => {}
        }
        query = query.bind(ticket_id.as_uuid()).bind(expected.as_str());
        if let Some(hold_id) = pinned_hold {
            query = query.bind(hold_id.as_uuid());
        }

        let result = query.execute(&self.pool).await?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        if !self.unit_exists(ticket_id).await? {
            return Err(LedgerError::TicketNotFound(ticket_id));
        }
        Ok(false)
    }

    async fn get_unit(&self, ticket_id: TicketId) -> Result<Option<TicketUnit>> {
        let row: Option<PgRow> = sqlx::query(&format!(
            "SELECT {UNIT_COLUMNS} FROM ticket_units WHERE ticket_id = $1"
        ))
        .bind(ticket_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_unit).transpose()
    }

    async fn get_units(&self, ticket_ids: &[TicketId]) -> Result<Vec<TicketUnit>> {
        let uuids: Vec<Uuid> = ticket_ids.iter().map(TicketId::as_uuid).collect();
        let rows = sqlx::query(&format!(
            "SELECT {UNIT_COLUMNS} FROM ticket_units WHERE ticket_id = ANY($1) ORDER BY created_at ASC, seq ASC"
        ))
        .bind(uuids)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_unit).collect()
    }

    async fn find_units(&self, query: UnitQuery) -> Result<Vec<TicketUnit>> {
        let mut sql = format!("SELECT {UNIT_COLUMNS} FROM ticket_units WHERE 1=1");
        let mut param_count = 0;

        // Build dynamic query
        if query.tier_id.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND tier_id = ${param_count}"));
        }
        if query.status.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND status = ${param_count}"));
        }
        if query.holder_ref.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND holder_ref = ${param_count}"));
        }
        if query.hold_expires_before.is_some() {
            param_count += 1;
            sql.push_str(&format!(" AND hold_expires_at < ${param_count}"));
        }

        sql.push_str(" ORDER BY created_at ASC, seq ASC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }

        let mut sqlx_query = sqlx::query(&sql);

        if let Some(tier_id) = query.tier_id {
            sqlx_query = sqlx_query.bind(tier_id.as_str().to_string());
        }
        if let Some(status) = query.status {
            sqlx_query = sqlx_query.bind(status.as_str());
        }
        if let Some(holder) = query.holder_ref {
            sqlx_query = sqlx_query.bind(holder.as_str().to_string());
        }
        if let Some(before) = query.hold_expires_before {
            sqlx_query = sqlx_query.bind(before);
        }
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_unit).collect()
    }

    async fn status_counts(&self, tier_id: &TierId) -> Result<StatusCounts> {
        if self.get_tier(tier_id).await?.is_none() {
            return Err(LedgerError::TierNotFound(tier_id.clone()));
        }

        let rows = sqlx::query(
            r#"
            SELECT status, COUNT(*) AS n
            FROM ticket_units
            WHERE tier_id = $1
            GROUP BY status
            "#,
        )
        .bind(tier_id.as_str())
        .fetch_all(&self.pool)
        .await?;

        let mut counts = StatusCounts::default();
        for row in rows {
            let status: String = row.try_get("status")?;
            let n: i64 = row.try_get("n")?;
            counts.record(status.parse()?, u64::try_from(n).unwrap_or(0));
        }
        Ok(counts)
    }

    async fn insert_hold(&self, hold: Hold) -> Result<()> {
        let ticket_ids: Vec<Uuid> = hold.ticket_ids.iter().map(TicketId::as_uuid).collect();

        sqlx::query(&format!(
            "INSERT INTO holds ({HOLD_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7)"
        ))
        .bind(hold.hold_id.as_uuid())
        .bind(hold.tier_id.as_str())
        .bind(ticket_ids)
        .bind(hold.holder_ref.as_str())
        .bind(hold.created_at)
        .bind(hold.expires_at)
        .bind(hold.status.as_str())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return LedgerError::HoldAlreadyExists(hold.hold_id);
            }
            LedgerError::Database(e)
        })?;

        Ok(())
    }

    async fn get_hold(&self, hold_id: HoldId) -> Result<Option<Hold>> {
        let row: Option<PgRow> =
            sqlx::query(&format!("SELECT {HOLD_COLUMNS} FROM holds WHERE hold_id = $1"))
                .bind(hold_id.as_uuid())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_hold).transpose()
    }

    async fn set_hold_status(
        &self,
        hold_id: HoldId,
        expected: HoldStatus,
        next: HoldStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE holds SET status = $1 WHERE hold_id = $2 AND status = $3")
            .bind(next.as_str())
            .bind(hold_id.as_uuid())
            .bind(expected.as_str())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 1 {
            return Ok(true);
        }
        if !self.hold_exists(hold_id).await? {
            return Err(LedgerError::HoldNotFound(hold_id));
        }
        Ok(false)
    }

    async fn extend_hold(
        &self,
        hold_id: HoldId,
        current: DateTime<Utc>,
        new_expires_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE holds SET expires_at = $1
            WHERE hold_id = $2 AND status = 'active' AND expires_at = $3
            "#,
        )
        .bind(new_expires_at)
        .bind(hold_id.as_uuid())
        .bind(current)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            tx.rollback().await?;
            if !self.hold_exists(hold_id).await? {
                return Err(LedgerError::HoldNotFound(hold_id));
            }
            return Ok(false);
        }

        sqlx::query(
            "UPDATE ticket_units SET hold_expires_at = $1 WHERE hold_id = $2 AND status = 'held'",
        )
        .bind(new_expires_at)
        .bind(hold_id.as_uuid())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }

    async fn expired_holds(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<Hold>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {HOLD_COLUMNS} FROM holds
            WHERE status = 'active' AND expires_at < $1
              AND tier_id NOT IN (SELECT tier_id FROM tiers WHERE halted)
            ORDER BY expires_at ASC
            LIMIT $2
            "#
        ))
        .bind(now)
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_hold).collect()
    }
}
