use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{
    PgPool, Postgres, Row,
    postgres::{PgArguments, PgRow},
    query::Query,
};
use uuid::Uuid;

use crate::{
    CartLine, CartLineId, CatalogItem, ItemId, Money, Result, ShopperId, StoreError,
    TransactionQuery, TransactionRecord, TransactionSummary,
    store::{Cart, Catalog, Ledger, Settlement, SettlementReceipt, check_cart_settlement},
};

const ITEM_COLUMNS: &str = "id, name, price, category, quantity_available";

const LINE_COLUMNS: &str = "l.id, l.shopper_id, l.item_id, i.name AS item_name, \
                            i.price AS unit_price, l.quantity, l.reserved_at";

const TRANSACTION_COLUMNS: &str =
    "transaction_id, product_code, total_amount, status, ref_id, created_at";

/// PostgreSQL-backed store implementation.
///
/// Stock changes are single conditional `UPDATE`s, so the row lock taken by
/// PostgreSQL serializes concurrent reservations of the same item.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
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

    fn row_to_item(row: PgRow) -> Result<CatalogItem> {
        let category: String = row.try_get("category")?;
        Ok(CatalogItem {
            id: ItemId::new(row.try_get("id")?),
            name: row.try_get("name")?,
            price: Money::new(row.try_get::<Decimal, _>("price")?),
            category: category.parse().map_err(StoreError::Corrupt)?,
            available: to_u32(row.try_get("quantity_available")?)?,
        })
    }

    fn row_to_line(row: PgRow) -> Result<CartLine> {
        Ok(CartLine {
            id: CartLineId::new(row.try_get("id")?),
            shopper_id: ShopperId::from_uuid(row.try_get::<Uuid, _>("shopper_id")?),
            item_id: ItemId::new(row.try_get("item_id")?),
            item_name: row.try_get("item_name")?,
            unit_price: Money::new(row.try_get::<Decimal, _>("unit_price")?),
            quantity: to_u32(row.try_get("quantity")?)?,
            reserved_at: row.try_get("reserved_at")?,
        })
    }

    fn row_to_record(row: PgRow) -> Result<TransactionRecord> {
        let status: String = row.try_get("status")?;
        Ok(TransactionRecord {
            transaction_id: row.try_get("transaction_id")?,
            product_code: row.try_get("product_code")?,
            total_amount: Money::new(row.try_get::<Decimal, _>("total_amount")?),
            status: status.parse().map_err(StoreError::Corrupt)?,
            ref_id: row.try_get("ref_id")?,
            created_at: row.try_get("created_at")?,
        })
    }

    async fn insert_record<'e, E>(executor: E, record: &TransactionRecord) -> Result<()>
    where
        E: sqlx::Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            r#"
            INSERT INTO payment_transactions (transaction_id, product_code, total_amount, status, ref_id, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(&record.transaction_id)
        .bind(&record.product_code)
        .bind(record.total_amount.amount())
        .bind(record.status.as_str())
        .bind(&record.ref_id)
        .bind(record.created_at)
        .execute(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_unique_violation()
            {
                return StoreError::DuplicateTransaction(record.transaction_id.clone());
            }
            StoreError::Database(e)
        })?;
        Ok(())
    }
}

fn to_u32(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| StoreError::Corrupt(format!("negative quantity {value}")))
}

fn to_i32(value: u32) -> Result<i32> {
    i32::try_from(value).map_err(|_| StoreError::Corrupt(format!("quantity {value} is too large")))
}

/// Escapes `%`, `_` and `\` so a search term matches literally under ILIKE.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Appends the WHERE clause for a ledger query. Returns the next free
/// parameter number.
fn push_filters(sql: &mut String, query: &TransactionQuery) -> usize {
    let mut param_count = 0;
    sql.push_str(" WHERE 1=1");

    if query.status.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND status = ${param_count}"));
    }
    if query.search.is_some() {
        param_count += 1;
        sql.push_str(&format!(
            " AND (transaction_id ILIKE ${param_count} OR product_code ILIKE ${param_count} OR ref_id ILIKE ${param_count})"
        ));
    }
    if query.from_timestamp.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND created_at >= ${param_count}"));
    }
    if query.to_timestamp.is_some() {
        param_count += 1;
        sql.push_str(&format!(" AND created_at <= ${param_count}"));
    }
    param_count
}

fn bind_filters<'q>(
    mut sqlx_query: Query<'q, Postgres, PgArguments>,
    query: &TransactionQuery,
) -> Query<'q, Postgres, PgArguments> {
    if let Some(status) = query.status {
        sqlx_query = sqlx_query.bind(status.as_str());
    }
    if let Some(ref term) = query.search {
        sqlx_query = sqlx_query.bind(like_pattern(term));
    }
    if let Some(from_ts) = query.from_timestamp {
        sqlx_query = sqlx_query.bind(from_ts);
    }
    if let Some(to_ts) = query.to_timestamp {
        sqlx_query = sqlx_query.bind(to_ts);
    }
    sqlx_query
}

#[async_trait]
impl Catalog for PostgresStore {
    async fn get_item(&self, item_id: ItemId) -> Result<Option<CatalogItem>> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM catalog_items WHERE id = $1"
        ))
        .bind(item_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_item).transpose()
    }

    async fn put_item(&self, item: CatalogItem) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO catalog_items (id, name, price, category, quantity_available)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET
                name = EXCLUDED.name,
                price = EXCLUDED.price,
                category = EXCLUDED.category,
                quantity_available = EXCLUDED.quantity_available
            "#,
        )
        .bind(item.id.as_i64())
        .bind(&item.name)
        .bind(item.price.amount())
        .bind(item.category.as_str())
        .bind(to_i32(item.available)?)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn delete_item(&self, item_id: ItemId) -> Result<()> {
        // cart_lines cascade
        sqlx::query("DELETE FROM catalog_items WHERE id = $1")
            .bind(item_id.as_i64())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn reserve(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog_items
            SET quantity_available = quantity_available - $2
            WHERE id = $1 AND quantity_available >= $2
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id.as_i64())
        .bind(to_i32(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_item(row);
        }

        match self.get_item(item_id).await? {
            Some(item) => Err(StoreError::OutOfStock {
                item_id,
                name: item.name,
                requested: quantity,
                available: item.available,
            }),
            None => Err(StoreError::ItemNotFound(item_id)),
        }
    }

    async fn release(&self, item_id: ItemId, quantity: u32) -> Result<CatalogItem> {
        let row = sqlx::query(&format!(
            r#"
            UPDATE catalog_items
            SET quantity_available = quantity_available + $2
            WHERE id = $1
            RETURNING {ITEM_COLUMNS}
            "#
        ))
        .bind(item_id.as_i64())
        .bind(to_i32(quantity)?)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_item)
            .transpose()?
            .ok_or(StoreError::ItemNotFound(item_id))
    }
}

#[async_trait]
impl Cart for PostgresStore {
    async fn lines_for(&self, shopper: ShopperId) -> Result<Vec<CartLine>> {
        let rows = sqlx::query(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM cart_lines l
            JOIN catalog_items i ON i.id = l.item_id
            WHERE l.shopper_id = $1
            ORDER BY l.id ASC
            "#
        ))
        .bind(shopper.as_uuid())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_line).collect()
    }

    async fn get_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<Option<CartLine>> {
        let row = sqlx::query(&format!(
            r#"
            SELECT {LINE_COLUMNS}
            FROM cart_lines l
            JOIN catalog_items i ON i.id = l.item_id
            WHERE l.shopper_id = $1 AND l.id = $2
            "#
        ))
        .bind(shopper.as_uuid())
        .bind(line_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_line).transpose()
    }

    async fn add_unit(&self, shopper: ShopperId, item_id: ItemId) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            r#"
            WITH l AS (
                INSERT INTO cart_lines (shopper_id, item_id, quantity, reserved_at)
                VALUES ($1, $2, 1, NOW())
                ON CONFLICT ON CONSTRAINT unique_shopper_item DO UPDATE SET
                    quantity = cart_lines.quantity + 1,
                    reserved_at = EXCLUDED.reserved_at
                RETURNING *
            )
            SELECT {LINE_COLUMNS}
            FROM l
            JOIN catalog_items i ON i.id = l.item_id
            "#
        ))
        .bind(shopper.as_uuid())
        .bind(item_id.as_i64())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.is_foreign_key_violation()
            {
                return StoreError::ItemNotFound(item_id);
            }
            StoreError::Database(e)
        })?;

        Self::row_to_line(row)
    }

    async fn increment_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            r#"
            WITH l AS (
                UPDATE cart_lines
                SET quantity = quantity + 1, reserved_at = NOW()
                WHERE id = $1 AND shopper_id = $2
                RETURNING *
            )
            SELECT {LINE_COLUMNS}
            FROM l
            JOIN catalog_items i ON i.id = l.item_id
            "#
        ))
        .bind(line_id.as_i64())
        .bind(shopper.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_line)
            .transpose()?
            .ok_or(StoreError::CartLineNotFound(line_id))
    }

    async fn decrement_line(
        &self,
        shopper: ShopperId,
        line_id: CartLineId,
    ) -> Result<Option<CartLine>> {
        let row = sqlx::query(&format!(
            r#"
            WITH l AS (
                UPDATE cart_lines
                SET quantity = quantity - 1
                WHERE id = $1 AND shopper_id = $2 AND quantity > 1
                RETURNING *
            )
            SELECT {LINE_COLUMNS}
            FROM l
            JOIN catalog_items i ON i.id = l.item_id
            "#
        ))
        .bind(line_id.as_i64())
        .bind(shopper.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        if let Some(row) = row {
            return Self::row_to_line(row).map(Some);
        }

        // Either the line is already at 1 or it does not exist.
        match self.get_line(shopper, line_id).await? {
            Some(_) => Ok(None),
            None => Err(StoreError::CartLineNotFound(line_id)),
        }
    }

    async fn delete_line(&self, shopper: ShopperId, line_id: CartLineId) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            r#"
            WITH l AS (
                DELETE FROM cart_lines
                WHERE id = $1 AND shopper_id = $2
                RETURNING *
            )
            SELECT {LINE_COLUMNS}
            FROM l
            JOIN catalog_items i ON i.id = l.item_id
            "#
        ))
        .bind(line_id.as_i64())
        .bind(shopper.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_line)
            .transpose()?
            .ok_or(StoreError::CartLineNotFound(line_id))
    }

    #[tracing::instrument(skip(self))]
    async fn release_expired(&self, cutoff: DateTime<Utc>) -> Result<Vec<CartLine>> {
        // Both data-modifying CTEs run against the same snapshot, so the final
        // SELECT still sees the deleted lines and the pre-restock item rows.
        let rows = sqlx::query(&format!(
            r#"
            WITH l AS (
                DELETE FROM cart_lines
                WHERE reserved_at < $1
                RETURNING *
            ),
            restocked AS (
                UPDATE catalog_items ci
                SET quantity_available = ci.quantity_available + expired.total
                FROM (
                    SELECT item_id, SUM(quantity)::INTEGER AS total
                    FROM l
                    GROUP BY item_id
                ) expired
                WHERE ci.id = expired.item_id
            )
            SELECT {LINE_COLUMNS}
            FROM l
            JOIN catalog_items i ON i.id = l.item_id
            ORDER BY l.id ASC
            "#
        ))
        .bind(cutoff)
        .fetch_all(&self.pool)
        .await?;

        let lines = rows
            .into_iter()
            .map(Self::row_to_line)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(released = lines.len(), "Released expired cart lines");
        Ok(lines)
    }
}

#[async_trait]
impl Ledger for PostgresStore {
    async fn record(&self, record: TransactionRecord) -> Result<()> {
        Self::insert_record(&self.pool, &record).await
    }

    #[tracing::instrument(skip(self, record), fields(transaction_id = %record.transaction_id))]
    async fn settle(
        &self,
        record: TransactionRecord,
        settlement: Settlement,
    ) -> Result<SettlementReceipt> {
        let mut tx = self.pool.begin().await?;

        // Ledger row first: a concurrent settlement of the same identifier
        // blocks on the primary key and then fails as a duplicate.
        Self::insert_record(&mut *tx, &record).await?;

        let receipt = match settlement {
            Settlement::ClearCart {
                shopper,
                expected_subtotal,
            } => {
                let rows = sqlx::query(&format!(
                    r#"
                    SELECT {LINE_COLUMNS}
                    FROM cart_lines l
                    JOIN catalog_items i ON i.id = l.item_id
                    WHERE l.shopper_id = $1
                    ORDER BY l.id ASC
                    FOR UPDATE OF l
                    "#
                ))
                .bind(shopper.as_uuid())
                .fetch_all(&mut *tx)
                .await?;

                let lines = rows
                    .into_iter()
                    .map(Self::row_to_line)
                    .collect::<Result<Vec<_>>>()?;
                check_cart_settlement(&lines, expected_subtotal)?;

                let ids: Vec<i64> = lines.iter().map(|l| l.id.as_i64()).collect();
                sqlx::query("DELETE FROM cart_lines WHERE shopper_id = $1 AND id = ANY($2)")
                    .bind(shopper.as_uuid())
                    .bind(&ids)
                    .execute(&mut *tx)
                    .await?;

                SettlementReceipt::CartCleared(lines)
            }
            Settlement::ConsumeItem { item_id, quantity } => {
                let row = sqlx::query(&format!(
                    r#"
                    UPDATE catalog_items
                    SET quantity_available = quantity_available - $2
                    WHERE id = $1 AND quantity_available >= $2
                    RETURNING {ITEM_COLUMNS}
                    "#
                ))
                .bind(item_id.as_i64())
                .bind(to_i32(quantity)?)
                .fetch_optional(&mut *tx)
                .await?;

                let row = row.ok_or_else(|| {
                    StoreError::SettlementRejected(format!(
                        "cannot consume {quantity} unit(s) of item {item_id}"
                    ))
                })?;
                SettlementReceipt::ItemConsumed(Self::row_to_item(row)?)
            }
        };

        tx.commit().await?;
        Ok(receipt)
    }

    async fn get_transaction(&self, transaction_id: &str) -> Result<Option<TransactionRecord>> {
        let row = sqlx::query(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM payment_transactions WHERE transaction_id = $1"
        ))
        .bind(transaction_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_record).transpose()
    }

    async fn query_transactions(&self, query: TransactionQuery) -> Result<Vec<TransactionRecord>> {
        let mut sql = format!("SELECT {TRANSACTION_COLUMNS} FROM payment_transactions");
        let mut param_count = push_filters(&mut sql, &query);

        sql.push_str(" ORDER BY created_at DESC, transaction_id DESC");

        if query.limit.is_some() {
            param_count += 1;
            sql.push_str(&format!(" LIMIT ${param_count}"));
        }
        if query.offset.is_some() {
            param_count += 1;
            sql.push_str(&format!(" OFFSET ${param_count}"));
        }

        let mut sqlx_query = bind_filters(sqlx::query(&sql), &query);
        if let Some(limit) = query.limit {
            sqlx_query = sqlx_query.bind(limit as i64);
        }
        if let Some(offset) = query.offset {
            sqlx_query = sqlx_query.bind(offset as i64);
        }

        let rows = sqlx_query.fetch_all(&self.pool).await?;
        rows.into_iter().map(Self::row_to_record).collect()
    }

    async fn count_transactions(&self, query: TransactionQuery) -> Result<u64> {
        let mut sql = String::from("SELECT COUNT(*) AS n FROM payment_transactions");
        push_filters(&mut sql, &query);

        let row = bind_filters(sqlx::query(&sql), &query)
            .fetch_one(&self.pool)
            .await?;
        let n: i64 = row.try_get("n")?;
        Ok(n as u64)
    }

    async fn summary(&self) -> Result<TransactionSummary> {
        let row = sqlx::query(
            r#"
            SELECT
                COUNT(*) AS total,
                COUNT(*) FILTER (WHERE status = 'PENDING') AS pending,
                COUNT(*) FILTER (WHERE status = 'COMPLETE') AS complete
            FROM payment_transactions
            "#,
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(TransactionSummary {
            total: row.try_get::<i64, _>("total")? as u64,
            pending: row.try_get::<i64, _>("pending")? as u64,
            complete: row.try_get::<i64, _>("complete")? as u64,
        })
    }
}
