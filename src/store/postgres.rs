use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::types::Json;
use uuid::Uuid;

use super::{CartRepository, OrderRepository, Store, StoreError};
use crate::domain::aggregates::{Cart, CartLineItem, CustomerContact, Order, OrderLine, OrderParts};
use crate::domain::value_objects::{PaymentInfo, UserId};

#[derive(Debug, sqlx::FromRow)]
struct CartRow {
    items: Json<Vec<CartLineItem>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    user_id: String,
    items: Json<Vec<OrderLine>>,
    shipping_address: String,
    payment_info: Json<PaymentInfo>,
    customer: Json<CustomerContact>,
    total_price: Decimal,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(r: OrderRow) -> Self {
        Order::restore(OrderParts {
            id: r.id,
            user_id: UserId::new(r.user_id),
            items: r.items.0,
            shipping_address: r.shipping_address,
            payment_info: r.payment_info.0,
            customer: r.customer.0,
            total_price: r.total_price,
            is_paid: r.is_paid,
            paid_at: r.paid_at,
            created_at: r.created_at,
        })
    }
}

/// Postgres-backed store. Carts are one JSONB document per user; orders are
/// append-only rows.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new().max_connections(max_connections).connect(database_url).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self::new(pool))
    }
}

#[async_trait]
impl CartRepository for PgStore {
    async fn find_cart(&self, user_id: &UserId) -> Result<Option<Cart>, StoreError> {
        let row = sqlx::query_as::<_, CartRow>("SELECT items, created_at, updated_at FROM carts WHERE user_id = $1")
            .bind(user_id.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.map(|r| Cart::restore(user_id.clone(), r.items.0, r.created_at, r.updated_at)))
    }

    async fn save_cart(&self, cart: &Cart) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO carts (user_id, items, created_at, updated_at) VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id) DO UPDATE SET items = EXCLUDED.items, updated_at = EXCLUDED.updated_at",
        )
        .bind(cart.user_id().as_str())
        .bind(Json(cart.items()))
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn delete_cart(&self, user_id: &UserId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM carts WHERE user_id = $1")
            .bind(user_id.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[async_trait]
impl OrderRepository for PgStore {
    async fn insert_order(&self, order: &Order) -> Result<(), StoreError> {
        let p = order.parts();
        sqlx::query(
            "INSERT INTO orders (id, user_id, items, shipping_address, payment_info, customer, total_price, is_paid, paid_at, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
        )
        .bind(p.id)
        .bind(p.user_id.as_str())
        .bind(Json(&p.items))
        .bind(&p.shipping_address)
        .bind(Json(&p.payment_info))
        .bind(Json(&p.customer))
        .bind(p.total_price)
        .bind(p.is_paid)
        .bind(p.paid_at)
        .bind(p.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let rows = sqlx::query_as::<_, OrderRow>(
            "SELECT id, user_id, items, shipping_address, payment_info, customer, total_price, is_paid, paid_at, created_at \
             FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Order::from).collect())
    }
}

impl Store for PgStore {
    fn backend_tag(&self) -> &'static str {
        "postgres"
    }
}
