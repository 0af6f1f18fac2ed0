//! PostgreSQL-backed store implementation.

use async_trait::async_trait;
use common::{CartId, OrderId, UserId};
use domain::{Cart, CartOwner, Coupon, CouponError, DeliveryInfo, Order, OrderStatus};
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::store::{CouponRedemption, StorefrontStore};

/// PostgreSQL store.
///
/// Coupon documents are authoritative for static fields only; the live
/// `used_count` lives in its own column (for the conditional redemption
/// update) and `used_by` in the `coupon_redemptions` table.
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
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    fn row_to_cart(row: &PgRow) -> Result<Cart> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }

    fn row_to_order(row: &PgRow) -> Result<Order> {
        let doc: serde_json::Value = row.try_get("doc")?;
        Ok(serde_json::from_value(doc)?)
    }

    async fn hydrate_coupon(&self, row: &PgRow) -> Result<Coupon> {
        let doc: serde_json::Value = row.try_get("doc")?;
        let mut coupon: Coupon = serde_json::from_value(doc)?;

        let used_count: i64 = row.try_get("used_count")?;
        coupon.used_count = used_count as u32;
        coupon.max_uses = row
            .try_get::<Option<i64>, _>("max_uses")?
            .map(|m| m as u32);

        let users: Vec<Uuid> =
            sqlx::query_scalar("SELECT user_id FROM coupon_redemptions WHERE code = $1")
                .bind(&coupon.code)
                .fetch_all(&self.pool)
                .await?;
        coupon.used_by = users.into_iter().map(UserId::from_uuid).collect();

        Ok(coupon)
    }
}

#[async_trait]
impl StorefrontStore for PostgresStore {
    async fn get_cart(&self, id: CartId) -> Result<Option<Cart>> {
        let row = sqlx::query("SELECT doc FROM carts WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_cart(&r)).transpose()
    }

    async fn find_cart_for_owner(&self, owner: &CartOwner) -> Result<Option<Cart>> {
        let row = match owner {
            CartOwner::User(user) => {
                sqlx::query("SELECT doc FROM carts WHERE owner_user = $1")
                    .bind(user.as_uuid())
                    .fetch_optional(&self.pool)
                    .await?
            }
            CartOwner::Session(session) => {
                sqlx::query("SELECT doc FROM carts WHERE owner_session = $1")
                    .bind(session)
                    .fetch_optional(&self.pool)
                    .await?
            }
        };
        row.map(|r| Self::row_to_cart(&r)).transpose()
    }

    async fn upsert_cart(&self, cart: &Cart) -> Result<()> {
        let (owner_user, owner_session) = match &cart.owner {
            CartOwner::User(user) => (Some(user.as_uuid()), None),
            CartOwner::Session(session) => (None, Some(session.clone())),
        };

        sqlx::query(
            r#"
            INSERT INTO carts (id, owner_user, owner_session, doc, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE SET doc = EXCLUDED.doc, updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(cart.id.as_uuid())
        .bind(owner_user)
        .bind(owner_session)
        .bind(serde_json::to_value(cart)?)
        .bind(cart.updated_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn get_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query("SELECT code, used_count, max_uses, doc FROM coupons WHERE code = $1")
            .bind(code.to_uppercase())
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(Some(self.hydrate_coupon(&row).await?)),
            None => Ok(None),
        }
    }

    async fn put_coupon(&self, coupon: &Coupon) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO coupons (code, used_count, max_uses, doc)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (code) DO UPDATE
                SET used_count = EXCLUDED.used_count,
                    max_uses = EXCLUDED.max_uses,
                    doc = EXCLUDED.doc
            "#,
        )
        .bind(&coupon.code)
        .bind(coupon.used_count as i64)
        .bind(coupon.max_uses.map(|m| m as i64))
        .bind(serde_json::to_value(coupon)?)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM coupon_redemptions WHERE code = $1")
            .bind(&coupon.code)
            .execute(&mut *tx)
            .await?;
        for user in &coupon.used_by {
            sqlx::query("INSERT INTO coupon_redemptions (code, user_id) VALUES ($1, $2)")
                .bind(&coupon.code)
                .bind(user.as_uuid())
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    async fn get_order(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_order(&r)).transpose()
    }

    async fn find_order_by_payment(
        &self,
        gateway_order_id: &str,
        gateway_payment_id: &str,
    ) -> Result<Option<Order>> {
        let row = sqlx::query(
            "SELECT doc FROM orders WHERE gateway_order_id = $1 AND gateway_payment_id = $2",
        )
        .bind(gateway_order_id)
        .bind(gateway_payment_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(|r| Self::row_to_order(&r)).transpose()
    }

    async fn find_order_by_awb(&self, awb_code: &str) -> Result<Option<Order>> {
        let row = sqlx::query("SELECT doc FROM orders WHERE awb_code = $1")
            .bind(awb_code)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Self::row_to_order(&r)).transpose()
    }

    async fn list_orders_for_user(&self, user: UserId) -> Result<Vec<Order>> {
        let rows = sqlx::query("SELECT doc FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user.as_uuid())
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(Self::row_to_order).collect()
    }

    async fn update_delivery(
        &self,
        id: OrderId,
        delivery: &DeliveryInfo,
        order_status: OrderStatus,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query("SELECT doc FROM orders WHERE id = $1 FOR UPDATE")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?
            .ok_or(StoreError::OrderNotFound(id))?;

        let mut order = Self::row_to_order(&row)?;
        order.delivery_info = delivery.clone();
        order.order_status = order_status;

        sqlx::query("UPDATE orders SET doc = $2, awb_code = $3 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(serde_json::to_value(&order)?)
            .bind(delivery.awb_code.as_deref())
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }

    #[tracing::instrument(skip(self, order, redemption), fields(order_id = %order.id))]
    async fn commit_checkout(
        &self,
        order: &Order,
        redemption: Option<CouponRedemption>,
        cart_id: CartId,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        // 1. Insert the order. The unique constraint on the payment pair
        //    turns a concurrent duplicate commit into a typed error.
        sqlx::query(
            r#"
            INSERT INTO orders (id, user_id, gateway_order_id, gateway_payment_id, awb_code, doc, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(order.id.as_uuid())
        .bind(order.user.map(|u| u.as_uuid()))
        .bind(&order.payment_info.gateway_order_id)
        .bind(&order.payment_info.gateway_payment_id)
        .bind(order.delivery_info.awb_code.as_deref())
        .bind(serde_json::to_value(order)?)
        .bind(order.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("unique_payment_confirmation")
            {
                return StoreError::DuplicateOrder {
                    gateway_order_id: order.payment_info.gateway_order_id.clone(),
                    gateway_payment_id: order.payment_info.gateway_payment_id.clone(),
                };
            }
            StoreError::Database(e)
        })?;

        // 2. Conditional coupon redemption: compare-and-swap on the usage
        //    cap, one-per-user enforced by the redemptions primary key.
        if let Some(redemption) = redemption {
            if let Some(user) = redemption.user {
                sqlx::query("INSERT INTO coupon_redemptions (code, user_id) VALUES ($1, $2)")
                    .bind(&redemption.code)
                    .bind(user.as_uuid())
                    .execute(&mut *tx)
                    .await
                    .map_err(|e| {
                        if let sqlx::Error::Database(ref db_err) = e
                            && db_err.constraint() == Some("coupon_redemptions_pkey")
                        {
                            return StoreError::CouponRedemption(CouponError::AlreadyUsed);
                        }
                        StoreError::Database(e)
                    })?;
            }

            let updated = sqlx::query(
                r#"
                UPDATE coupons SET used_count = used_count + 1
                WHERE code = $1 AND (max_uses IS NULL OR used_count < max_uses)
                "#,
            )
            .bind(&redemption.code)
            .execute(&mut *tx)
            .await?;

            if updated.rows_affected() == 0 {
                return Err(StoreError::CouponRedemption(CouponError::Exhausted));
            }
        }

        // 3. Clear the cart within the same transaction.
        let cart_row = sqlx::query("SELECT doc FROM carts WHERE id = $1 FOR UPDATE")
            .bind(cart_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await?;
        if let Some(row) = cart_row {
            let mut cart = Self::row_to_cart(&row)?;
            cart.clear();
            sqlx::query("UPDATE carts SET doc = $2, updated_at = $3 WHERE id = $1")
                .bind(cart_id.as_uuid())
                .bind(serde_json::to_value(&cart)?)
                .bind(cart.updated_at)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        metrics::counter!("orders_committed_total").increment(1);
        Ok(())
    }
}
