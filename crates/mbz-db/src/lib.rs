//! Postgres persistence for the minibazaar order ledger.
//!
//! # Exactly-once transitions
//!
//! [`transition_status`] is the storage half of the order workflow: a
//! single conditional UPDATE (`set status = $to where id = $id and
//! status = $from`) whose affected-row count decides the winner. Two
//! concurrent callers racing the same transition cannot both succeed,
//! and the caller only fires the notification side effect when this
//! function returns `true`.

use std::collections::HashMap;

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use mbz_schemas::{NewOrder, OrderRecord, OrderStatus, ProductSnapshot};
use rust_decimal::Decimal;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use uuid::Uuid;

pub const ENV_DB_URL: &str = "MBZ_DATABASE_URL";

/// Connect to Postgres using MBZ_DATABASE_URL.
pub async fn connect_from_env() -> Result<PgPool> {
    let url = std::env::var(ENV_DB_URL)
        .with_context(|| format!("missing env var {ENV_DB_URL}"))?;

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(&url)
        .await
        .context("failed to connect to Postgres")?;

    Ok(pool)
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Products
// ---------------------------------------------------------------------------

/// Insert or update a product row. The catalog proper lives outside this
/// core; this is the seeding surface the daemon and tests use.
pub async fn upsert_product(pool: &PgPool, product: &ProductSnapshot) -> Result<()> {
    sqlx::query(
        r#"
        insert into products (id, seller_id, title, price, is_active)
        values ($1, $2, $3, $4, $5)
        on conflict (id) do update
            set title = excluded.title,
                price = excluded.price,
                is_active = excluded.is_active
        "#,
    )
    .bind(product.id)
    .bind(product.seller_id)
    .bind(&product.title)
    .bind(product.price)
    .bind(product.is_active)
    .execute(pool)
    .await
    .context("upsert_product failed")?;

    Ok(())
}

/// Fetch one product, `None` when it does not exist.
pub async fn get_product(pool: &PgPool, product_id: Uuid) -> Result<Option<ProductSnapshot>> {
    let row = sqlx::query(
        r#"
        select id, seller_id, title, price, is_active
        from products
        where id = $1
        "#,
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
    .context("get_product failed")?;

    row.map(|r| product_from_row(&r)).transpose()
}

/// Catalog view for cart resolution: every requested product that still
/// exists, keyed by id. Missing ids are simply absent from the map; the
/// cart drops them at iteration time.
pub async fn get_products(
    pool: &PgPool,
    product_ids: &[Uuid],
) -> Result<HashMap<Uuid, ProductSnapshot>> {
    if product_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let rows = sqlx::query(
        r#"
        select id, seller_id, title, price, is_active
        from products
        where id = any($1)
        "#,
    )
    .bind(product_ids)
    .fetch_all(pool)
    .await
    .context("get_products failed")?;

    let mut map = HashMap::with_capacity(rows.len());
    for row in &rows {
        let p = product_from_row(row)?;
        map.insert(p.id, p);
    }
    Ok(map)
}

fn product_from_row(row: &sqlx::postgres::PgRow) -> Result<ProductSnapshot> {
    Ok(ProductSnapshot {
        id: row.try_get("id")?,
        seller_id: row.try_get("seller_id")?,
        title: row.try_get("title")?,
        price: row.try_get::<Decimal, _>("price")?,
        is_active: row.try_get("is_active")?,
    })
}

// ---------------------------------------------------------------------------
// Orders
// ---------------------------------------------------------------------------

/// Insert the orders produced by one checkout submission.
///
/// All rows land in a single transaction: a multi-item checkout either
/// creates every order or none of them. Returns the new order ids in
/// submission order.
pub async fn insert_orders(pool: &PgPool, orders: &[NewOrder]) -> Result<Vec<Uuid>> {
    let mut tx = pool.begin().await.context("begin checkout tx failed")?;
    let mut ids = Vec::with_capacity(orders.len());
    let now: DateTime<Utc> = Utc::now();

    for order in orders {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            insert into orders (
                id, buyer_id, product_id, quantity, total_price, status,
                created_at, address, phone
            ) values ($1, $2, $3, $4, $5, 'P', $6, $7, $8)
            "#,
        )
        .bind(id)
        .bind(order.buyer_id)
        .bind(order.product_id)
        .bind(order.quantity as i32)
        .bind(order.total_price)
        .bind(now)
        .bind(&order.address)
        .bind(&order.phone)
        .execute(&mut *tx)
        .await
        .context("insert order row failed")?;
        ids.push(id);
    }

    tx.commit().await.context("commit checkout tx failed")?;
    Ok(ids)
}

/// Fetch one order joined with its product's seller, `None` when it does
/// not exist. The join gives workflow guards the owning seller without a
/// second query.
pub async fn get_order(pool: &PgPool, order_id: Uuid) -> Result<Option<OrderRecord>> {
    let row = sqlx::query(
        r#"
        select
            o.id, o.buyer_id, o.product_id, p.seller_id,
            o.quantity, o.total_price, o.status, o.created_at,
            o.address, o.phone
        from orders o
        join products p on p.id = o.product_id
        where o.id = $1
        "#,
    )
    .bind(order_id)
    .fetch_optional(pool)
    .await
    .context("get_order failed")?;

    row.map(|r| order_from_row(&r)).transpose()
}

fn order_from_row(row: &sqlx::postgres::PgRow) -> Result<OrderRecord> {
    let code: String = row.try_get("status")?;
    let Some(status) = OrderStatus::from_code(code.trim()) else {
        bail!("orders row carries unknown status code {code:?}");
    };
    let quantity: i32 = row.try_get("quantity")?;

    Ok(OrderRecord {
        id: row.try_get("id")?,
        buyer_id: row.try_get("buyer_id")?,
        product_id: row.try_get("product_id")?,
        seller_id: row.try_get("seller_id")?,
        quantity: quantity as u32,
        total_price: row.try_get::<Decimal, _>("total_price")?,
        status,
        created_at: row.try_get("created_at")?,
        address: row.try_get("address")?,
        phone: row.try_get("phone")?,
    })
}

/// Conditionally advance an order's status: exactly-once semantics.
///
/// Returns `true` when exactly one row moved from `from` to `to`;
/// `false` means the order does not exist or is no longer in `from`
/// (e.g. a concurrent caller already won the transition). No lock, no
/// read-modify-write; the WHERE clause is the guard.
pub async fn transition_status(
    pool: &PgPool,
    order_id: Uuid,
    from: OrderStatus,
    to: OrderStatus,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        update orders
        set status = $3
        where id = $1 and status = $2
        "#,
    )
    .bind(order_id)
    .bind(from.as_code())
    .bind(to.as_code())
    .execute(pool)
    .await
    .context("transition_status failed")?;

    Ok(result.rows_affected() == 1)
}

// ---------------------------------------------------------------------------
// Dashboard counters
// ---------------------------------------------------------------------------

/// Count a seller's orders in any of the given statuses (via the product
/// join; orders do not carry the seller directly).
pub async fn count_seller_orders(
    pool: &PgPool,
    seller_id: Uuid,
    statuses: &[OrderStatus],
) -> Result<i64> {
    let codes: Vec<String> = statuses.iter().map(|s| s.as_code().to_string()).collect();
    let (n,): (i64,) = sqlx::query_as(
        r#"
        select count(*)::bigint
        from orders o
        join products p on p.id = o.product_id
        where p.seller_id = $1 and o.status = any($2)
        "#,
    )
    .bind(seller_id)
    .bind(&codes)
    .fetch_one(pool)
    .await
    .context("count_seller_orders failed")?;

    Ok(n)
}

/// Count a buyer's orders in any of the given statuses.
pub async fn count_buyer_orders(
    pool: &PgPool,
    buyer_id: Uuid,
    statuses: &[OrderStatus],
) -> Result<i64> {
    let codes: Vec<String> = statuses.iter().map(|s| s.as_code().to_string()).collect();
    let (n,): (i64,) = sqlx::query_as(
        r#"
        select count(*)::bigint
        from orders
        where buyer_id = $1 and status = any($2)
        "#,
    )
    .bind(buyer_id)
    .bind(&codes)
    .fetch_one(pool)
    .await
    .context("count_buyer_orders failed")?;

    Ok(n)
}
