//! sqlx implementation of the store and catalog traits.

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::time::Duration;
use uuid::Uuid;
use wishlist_core::error::StoreError;
use wishlist_core::store::{Catalog, CatalogAdmin, ReservationStore, StoreFuture};
use wishlist_core::types::{
    Item, ItemId, Money, NewReservation, OwnerId, Reservation, ReservationId, ReservationStatus,
    ReserverToken, Wishlist, WishlistId,
};

const RESERVATION_COLUMNS: &str =
    "id, item_id, amount_cents, is_full_reservation, created_at, reserver_token, status";
const ITEM_COLUMNS: &str =
    "id, wishlist_id, title, price_cents, allow_contributions, created_at, sort_order";
const WISHLIST_COLUMNS: &str = "id, owner_id, title, description, public_slug, deadline, \
                                created_at, owner_notification_key";

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    item_id: Uuid,
    amount_cents: i64,
    is_full_reservation: bool,
    created_at: DateTime<Utc>,
    reserver_token: String,
    status: String,
}

impl TryFrom<ReservationRow> for Reservation {
    type Error = StoreError;

    fn try_from(row: ReservationRow) -> Result<Self, Self::Error> {
        let status = match row.status.as_str() {
            "active" => ReservationStatus::Active,
            "cancelled" => ReservationStatus::Cancelled,
            other => {
                return Err(StoreError::Corrupt(format!(
                    "Invalid reservation status: {other}"
                )));
            },
        };
        Ok(Self {
            id: ReservationId::from_uuid(row.id),
            item_id: ItemId::from_uuid(row.item_id),
            amount: cents(row.amount_cents)?,
            is_full_reservation: row.is_full_reservation,
            created_at: row.created_at,
            reserver_token: ReserverToken::from_string(row.reserver_token),
            status,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid,
    wishlist_id: Uuid,
    title: String,
    price_cents: Option<i64>,
    allow_contributions: bool,
    created_at: DateTime<Utc>,
    sort_order: i32,
}

impl TryFrom<ItemRow> for Item {
    type Error = StoreError;

    fn try_from(row: ItemRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: ItemId::from_uuid(row.id),
            wishlist_id: WishlistId::from_uuid(row.wishlist_id),
            title: row.title,
            price: row.price_cents.map(cents).transpose()?,
            allow_contributions: row.allow_contributions,
            created_at: row.created_at,
            sort_order: row.sort_order,
        })
    }
}

#[derive(sqlx::FromRow)]
struct WishlistRow {
    id: Uuid,
    owner_id: Uuid,
    title: String,
    description: Option<String>,
    public_slug: String,
    deadline: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    owner_notification_key: Option<String>,
}

impl From<WishlistRow> for Wishlist {
    fn from(row: WishlistRow) -> Self {
        Self {
            id: WishlistId::from_uuid(row.id),
            owner_id: OwnerId::from_uuid(row.owner_id),
            title: row.title,
            description: row.description,
            public_slug: row.public_slug,
            deadline: row.deadline,
            created_at: row.created_at,
            owner_notification_key: row.owner_notification_key,
        }
    }
}

fn cents(value: i64) -> Result<Money, StoreError> {
    u64::try_from(value)
        .map(Money::from_cents)
        .map_err(|_| StoreError::Corrupt(format!("Negative amount: {value}")))
}

fn to_db_cents(money: Money) -> Result<i64, StoreError> {
    i64::try_from(money.cents())
        .map_err(|_| StoreError::Database(format!("Amount out of range: {money}")))
}

fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> StoreError {
    move |e| {
        tracing::error!(operation, error = %e, "Database operation failed");
        metrics::counter!("wishlist_store_errors_total", "operation" => operation).increment(1);
        StoreError::Database(format!("Failed to {operation}: {e}"))
    }
}

// ============================================================================
// Store
// ============================================================================

/// `PostgreSQL`-backed reservation store and catalog.
///
/// # Schema
///
/// See `migrations/0001_create_wishlist_tables.sql`. Reservations are never
/// deleted; cancellation flips `status` to `cancelled`.
#[derive(Clone, Debug)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Connect with a bounded pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the connection fails.
    pub async fn connect(
        database_url: &str,
        max_connections: u32,
        connect_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(connect_timeout)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;

        Ok(Self::from_pool(pool))
    }

    /// Create a store using an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    /// Round-trip a trivial query. Used by readiness checks.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the database is unreachable.
    pub async fn ping(&self) -> Result<(), StoreError> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(db_error("ping"))?;
        Ok(())
    }

    /// Get the underlying connection pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Insert or replace a wishlist.
    ///
    /// Bypasses slug allocation; new wishlists go through [`CatalogAdmin`].
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the upsert fails.
    pub async fn upsert_wishlist(&self, wishlist: &Wishlist) -> Result<(), StoreError> {
        sqlx::query(
            r"
            INSERT INTO wishlists (
                id, owner_id, title, description, public_slug, deadline, created_at,
                owner_notification_key
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                public_slug = EXCLUDED.public_slug,
                deadline = EXCLUDED.deadline,
                owner_notification_key = EXCLUDED.owner_notification_key
            ",
        )
        .bind(wishlist.id.as_uuid())
        .bind(wishlist.owner_id.as_uuid())
        .bind(&wishlist.title)
        .bind(&wishlist.description)
        .bind(&wishlist.public_slug)
        .bind(wishlist.deadline)
        .bind(wishlist.created_at)
        .bind(&wishlist.owner_notification_key)
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert wishlist"))?;
        Ok(())
    }

    /// Insert or replace an item.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the upsert fails.
    pub async fn upsert_item(&self, item: &Item) -> Result<(), StoreError> {
        let price_cents = item.price.map(to_db_cents).transpose()?;
        sqlx::query(
            r"
            INSERT INTO items (
                id, wishlist_id, title, price_cents, allow_contributions, created_at, sort_order
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                price_cents = EXCLUDED.price_cents,
                allow_contributions = EXCLUDED.allow_contributions,
                sort_order = EXCLUDED.sort_order
            ",
        )
        .bind(item.id.as_uuid())
        .bind(item.wishlist_id.as_uuid())
        .bind(&item.title)
        .bind(price_cents)
        .bind(item.allow_contributions)
        .bind(item.created_at)
        .bind(item.sort_order)
        .execute(&self.pool)
        .await
        .map_err(db_error("upsert item"))?;
        Ok(())
    }
}

impl ReservationStore for PostgresStore {
    fn list_active_reservations(&self, item_id: ItemId) -> StoreFuture<'_, Vec<Reservation>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {RESERVATION_COLUMNS} FROM reservations \
                 WHERE item_id = $1 AND status = 'active' \
                 ORDER BY created_at, id"
            );
            let rows: Vec<ReservationRow> = sqlx::query_as(&query)
                .bind(item_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("list reservations"))?;

            rows.into_iter().map(Reservation::try_from).collect()
        })
    }

    fn insert_reservation(&self, reservation: NewReservation) -> StoreFuture<'_, Reservation> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO reservations ({RESERVATION_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, 'active') \
                 RETURNING {RESERVATION_COLUMNS}"
            );
            let row: ReservationRow = sqlx::query_as(&query)
                .bind(Uuid::new_v4())
                .bind(reservation.item_id.as_uuid())
                .bind(to_db_cents(reservation.amount)?)
                .bind(reservation.is_full_reservation)
                .bind(reservation.created_at)
                .bind(reservation.reserver_token.as_str())
                .fetch_one(&self.pool)
                .await
                .map_err(db_error("insert reservation"))?;

            Reservation::try_from(row)
        })
    }

    fn get_reservation(&self, id: ReservationId) -> StoreFuture<'_, Option<Reservation>> {
        Box::pin(async move {
            let query = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1");
            let row: Option<ReservationRow> = sqlx::query_as(&query)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get reservation"))?;

            row.map(Reservation::try_from).transpose()
        })
    }

    fn cancel_reservation(&self, id: ReservationId) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result = sqlx::query(
                "UPDATE reservations SET status = 'cancelled' WHERE id = $1 AND status = 'active'",
            )
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(db_error("cancel reservation"))?;

            Ok(result.rows_affected() == 1)
        })
    }
}

impl Catalog for PostgresStore {
    fn get_item(&self, item_id: ItemId) -> StoreFuture<'_, Option<Item>> {
        Box::pin(async move {
            let query = format!("SELECT {ITEM_COLUMNS} FROM items WHERE id = $1");
            let row: Option<ItemRow> = sqlx::query_as(&query)
                .bind(item_id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get item"))?;

            row.map(Item::try_from).transpose()
        })
    }

    fn get_wishlist(&self, id: WishlistId) -> StoreFuture<'_, Option<Wishlist>> {
        Box::pin(async move {
            let query = format!("SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE id = $1");
            let row: Option<WishlistRow> = sqlx::query_as(&query)
                .bind(id.as_uuid())
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get wishlist"))?;

            Ok(row.map(Wishlist::from))
        })
    }

    fn get_wishlist_by_slug<'a>(&'a self, slug: &'a str) -> StoreFuture<'a, Option<Wishlist>> {
        Box::pin(async move {
            let query = format!("SELECT {WISHLIST_COLUMNS} FROM wishlists WHERE public_slug = $1");
            let row: Option<WishlistRow> = sqlx::query_as(&query)
                .bind(slug)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("get wishlist by slug"))?;

            Ok(row.map(Wishlist::from))
        })
    }

    fn list_items(&self, wishlist_id: WishlistId) -> StoreFuture<'_, Vec<Item>> {
        Box::pin(async move {
            let query = format!(
                "SELECT {ITEM_COLUMNS} FROM items WHERE wishlist_id = $1 \
                 ORDER BY sort_order, created_at"
            );
            let rows: Vec<ItemRow> = sqlx::query_as(&query)
                .bind(wishlist_id.as_uuid())
                .fetch_all(&self.pool)
                .await
                .map_err(db_error("list items"))?;

            rows.into_iter().map(Item::try_from).collect()
        })
    }
}

impl CatalogAdmin for PostgresStore {
    fn create_wishlist(&self, wishlist: Wishlist) -> StoreFuture<'_, Option<Wishlist>> {
        Box::pin(async move {
            let query = format!(
                "INSERT INTO wishlists ({WISHLIST_COLUMNS}) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
                 ON CONFLICT (public_slug) DO NOTHING \
                 RETURNING {WISHLIST_COLUMNS}"
            );
            let row: Option<WishlistRow> = sqlx::query_as(&query)
                .bind(wishlist.id.as_uuid())
                .bind(wishlist.owner_id.as_uuid())
                .bind(&wishlist.title)
                .bind(&wishlist.description)
                .bind(&wishlist.public_slug)
                .bind(wishlist.deadline)
                .bind(wishlist.created_at)
                .bind(&wishlist.owner_notification_key)
                .fetch_optional(&self.pool)
                .await
                .map_err(db_error("create wishlist"))?;

            Ok(row.map(Wishlist::from))
        })
    }

    fn create_item(&self, item: Item) -> StoreFuture<'_, Item> {
        Box::pin(async move {
            self.upsert_item(&item).await?;
            Ok(item)
        })
    }

    fn set_notification_key(&self, id: WishlistId, key: Option<String>) -> StoreFuture<'_, bool> {
        Box::pin(async move {
            let result =
                sqlx::query("UPDATE wishlists SET owner_notification_key = $2 WHERE id = $1")
                    .bind(id.as_uuid())
                    .bind(key)
                    .execute(&self.pool)
                    .await
                    .map_err(db_error("set notification key"))?;

            Ok(result.rows_affected() == 1)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_cents_are_corrupt() {
        assert!(matches!(cents(-1), Err(StoreError::Corrupt(_))));
        assert_eq!(cents(6_000).ok(), Some(Money::from_cents(6_000)));
    }

    #[test]
    fn unknown_status_is_corrupt() {
        let row = ReservationRow {
            id: Uuid::new_v4(),
            item_id: Uuid::new_v4(),
            amount_cents: 100,
            is_full_reservation: false,
            created_at: Utc::now(),
            reserver_token: "t".to_string(),
            status: "refunded".to_string(),
        };
        assert!(matches!(Reservation::try_from(row), Err(StoreError::Corrupt(_))));
    }
}
