//! PostgreSQL store.
//!
//! Lock order inside a transaction is always cart row, then product rows by
//! id, then order row. Stock is only ever moved with guarded relative
//! updates so a stale read can never oversell.
//!
//! Transactions run at the default READ COMMITTED level. Every value a write
//! depends on is read after the lock covering it is held.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::domain::aggregates::{
    Cart, CartChange, CartCommand, CartItem, CustomerContext, DeliveryProfile, Order, OrderCommand, OrderDetail,
    Product,
};
use crate::domain::checkout::{self, CheckoutRequest};
use crate::domain::value_objects::{ContactSnapshot, Money};
use crate::store::{CommerceStore, OrderFilter, OrderStats, OrderUpdate, Page, PageRequest};
use crate::{CommerceError, Result};

pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Row lock taken on products read alongside a cart.
#[derive(Clone, Copy, PartialEq, Eq)]
enum ProductLock {
    None,
    Share,
    Update,
}

impl ProductLock {
    fn clause(self) -> &'static str {
        match self {
            ProductLock::None => "",
            ProductLock::Share => " FOR SHARE OF p",
            ProductLock::Update => " FOR UPDATE OF p",
        }
    }
}

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    customer_id: Uuid,
    total_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct CartItemRow {
    id: Uuid,
    product_id: Uuid,
    quantity: i32,
    price_at_addition: i64,
    selected: bool,
    created_at: DateTime<Utc>,
    title: String,
    price: i64,
    stock: i32,
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid,
    title: String,
    price: i64,
    quantity: i32,
}

#[derive(sqlx::FromRow)]
struct ProfileRow {
    id: Uuid,
    customer_id: Uuid,
    full_name: String,
    phone: String,
    address: String,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    customer_id: Uuid,
    customer_email: String,
    customer_name: String,
    customer_phone: String,
    customer_address: String,
    note: Option<String>,
    payment_method: String,
    status: String,
    payment_status: String,
    total_price: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct DetailRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    product_title: String,
    quantity: i32,
    price_at_order: i64,
}

const ORDER_COLUMNS: &str = "id, customer_id, customer_email, customer_name, customer_phone, customer_address, \
     note, payment_method, status, payment_status, total_price, created_at, updated_at";

fn count(value: i32) -> Result<u32> {
    u32::try_from(value).map_err(|_| CommerceError::Storage(format!("negative quantity {value} in storage")))
}

fn db_count(value: u32) -> i32 {
    i32::try_from(value).unwrap_or(i32::MAX)
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product::new(row.id, row.title, Money::new(row.price), u32::try_from(row.quantity).unwrap_or(0))
    }
}

impl From<ProfileRow> for DeliveryProfile {
    fn from(row: ProfileRow) -> Self {
        DeliveryProfile {
            id: row.id,
            customer_id: row.customer_id,
            full_name: row.full_name,
            phone: row.phone,
            address: row.address,
        }
    }
}

fn order_from_rows(row: OrderRow, details: Vec<DetailRow>) -> Result<Order> {
    let details = details
        .into_iter()
        .map(|d| {
            Ok(OrderDetail {
                id: d.id,
                product_id: d.product_id,
                product_title: d.product_title,
                quantity: count(d.quantity)?,
                price_at_order: Money::new(d.price_at_order),
            })
        })
        .collect::<Result<Vec<_>>>()?;
    Ok(Order::from_parts(
        row.id,
        row.customer_id,
        row.customer_email,
        ContactSnapshot { full_name: row.customer_name, phone: row.customer_phone, address: row.customer_address },
        row.note,
        row.payment_method.parse()?,
        row.status.parse()?,
        row.payment_status.parse()?,
        Money::new(row.total_price),
        details,
        row.created_at,
        row.updated_at,
    ))
}

/// `%` and `_` in user input match literally.
fn like_pattern(fragment: &str) -> String {
    let escaped = fragment.to_lowercase().replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_");
    format!("%{escaped}%")
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, filter: &OrderFilter) {
    qb.push(" WHERE TRUE");
    if let Some(id) = filter.customer_id {
        qb.push(" AND customer_id = ").push_bind(id);
    }
    if let Some(id) = filter.order_id {
        qb.push(" AND id = ").push_bind(id);
    }
    if let Some(status) = filter.status {
        qb.push(" AND status = ").push_bind(status.as_str());
    }
    if let Some(status) = filter.payment_status {
        qb.push(" AND payment_status = ").push_bind(status.as_str());
    }
    if let Some(phone) = filter.customer_phone.as_deref().filter(|p| !p.is_empty()) {
        qb.push(" AND LOWER(customer_phone) LIKE ").push_bind(like_pattern(phone));
    }
    if let Some(from) = filter.from {
        qb.push(" AND created_at >= ").push_bind(from);
    }
    if let Some(to) = filter.to {
        qb.push(" AND created_at <= ").push_bind(to);
    }
}

/// One statement over every product in the cart plus `also`, locked in id
/// order. Postgres takes row locks as sorted rows are emitted.
fn lock_products_sql(lock: ProductLock) -> String {
    format!(
        "SELECT p.id, p.title, p.price, p.quantity FROM products p \
         WHERE p.id IN (SELECT product_id FROM cart_items WHERE cart_id = $1) OR p.id = $2 \
         ORDER BY p.id{}",
        lock.clause()
    )
}

/// Loads the cart. With a lock, the cart row is locked first and then the
/// products, including `also` (a product about to be added), which are
/// returned as read under the lock.
async fn fetch_cart(
    conn: &mut PgConnection, customer_id: Uuid, lock: ProductLock, also: Option<Uuid>,
) -> Result<(Cart, Vec<Product>)> {
    let cart_sql = if lock == ProductLock::None {
        "SELECT id, customer_id, total_price, created_at, updated_at FROM carts WHERE customer_id = $1"
    } else {
        "SELECT id, customer_id, total_price, created_at, updated_at FROM carts WHERE customer_id = $1 FOR UPDATE"
    };
    let cart = sqlx::query_as::<_, CartRow>(cart_sql)
        .bind(customer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(CommerceError::CartNotFound)?;

    let locked = if lock == ProductLock::None {
        Vec::new()
    } else {
        sqlx::query_as::<_, ProductRow>(&lock_products_sql(lock))
            .bind(cart.id)
            .bind(also)
            .fetch_all(&mut *conn)
            .await?
            .into_iter()
            .map(Product::from)
            .collect()
    };

    let mut rows = sqlx::query_as::<_, CartItemRow>(
        "SELECT ci.id, ci.product_id, ci.quantity, ci.price_at_addition, ci.selected, ci.created_at, \
         p.title, p.price, p.quantity AS stock \
         FROM cart_items ci JOIN products p ON p.id = ci.product_id \
         WHERE ci.cart_id = $1",
    )
    .bind(cart.id)
    .fetch_all(&mut *conn)
    .await?;
    rows.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

    let items = rows
        .into_iter()
        .map(|row| {
            Ok(CartItem {
                id: row.id,
                product: Product::new(row.product_id, row.title, Money::new(row.price), count(row.stock)?),
                quantity: count(row.quantity)?,
                price_at_addition: Money::new(row.price_at_addition),
                selected: row.selected,
                created_at: row.created_at,
            })
        })
        .collect::<Result<Vec<_>>>()?;

    let cart = Cart::from_parts(cart.id, cart.customer_id, Money::new(cart.total_price), items, cart.created_at, cart.updated_at);
    Ok((cart, locked))
}

async fn save_cart(conn: &mut PgConnection, cart: &Cart) -> Result<()> {
    sqlx::query("UPDATE carts SET total_price = $2, updated_at = $3 WHERE id = $1")
        .bind(cart.id())
        .bind(cart.total().amount())
        .bind(cart.updated_at())
        .execute(&mut *conn)
        .await?;

    let kept: Vec<Uuid> = cart.items().iter().map(|i| i.id).collect();
    sqlx::query("DELETE FROM cart_items WHERE cart_id = $1 AND NOT (id = ANY($2))")
        .bind(cart.id())
        .bind(kept.as_slice())
        .execute(&mut *conn)
        .await?;

    for item in cart.items() {
        sqlx::query(
            "INSERT INTO cart_items (id, cart_id, product_id, quantity, price_at_addition, selected, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) \
             ON CONFLICT (id) DO UPDATE SET quantity = EXCLUDED.quantity, \
             price_at_addition = EXCLUDED.price_at_addition, selected = EXCLUDED.selected",
        )
        .bind(item.id)
        .bind(cart.id())
        .bind(item.product.id())
        .bind(db_count(item.quantity))
        .bind(item.price_at_addition.amount())
        .bind(item.selected)
        .bind(item.created_at)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn fetch_details(conn: &mut PgConnection, order_ids: &[Uuid]) -> Result<Vec<DetailRow>> {
    Ok(sqlx::query_as::<_, DetailRow>(
        "SELECT id, order_id, product_id, product_title, quantity, price_at_order \
         FROM order_details WHERE order_id = ANY($1) ORDER BY order_id, id",
    )
    .bind(order_ids)
    .fetch_all(&mut *conn)
    .await?)
}

async fn hydrate(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut details = fetch_details(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let (mine, rest): (Vec<DetailRow>, Vec<DetailRow>) =
                std::mem::take(&mut details).into_iter().partition(|d| d.order_id == row.id);
            details = rest;
            order_from_rows(row, mine)
        })
        .collect()
}

#[async_trait]
impl CommerceStore for PostgresStore {
    async fn create_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let cart = Cart::new(customer_id);
        let inserted = sqlx::query(
            "INSERT INTO carts (id, customer_id, total_price, created_at, updated_at) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (customer_id) DO NOTHING",
        )
        .bind(cart.id())
        .bind(customer_id)
        .bind(cart.total().amount())
        .bind(cart.created_at())
        .bind(cart.updated_at())
        .execute(&self.pool)
        .await?;
        if inserted.rows_affected() == 0 {
            return Err(CommerceError::CartAlreadyExists);
        }
        Ok(cart)
    }

    async fn load_cart(&self, customer_id: Uuid) -> Result<Cart> {
        let mut conn = self.pool.acquire().await?;
        Ok(fetch_cart(&mut conn, customer_id, ProductLock::None, None).await?.0)
    }

    async fn apply_cart_command(&self, customer_id: Uuid, command: &CartCommand) -> Result<(Cart, CartChange)> {
        let added = match command {
            CartCommand::AddItem { product_id, .. } => Some(*product_id),
            _ => None,
        };
        let mut tx = self.pool.begin().await?;
        let (mut cart, locked) = fetch_cart(&mut tx, customer_id, ProductLock::Share, added).await?;
        let product = added.and_then(|id| locked.into_iter().find(|p| p.id() == id));
        let change = cart.apply(command, product)?;
        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok((cart, change))
    }

    async fn place_order(&self, customer: &CustomerContext, request: &CheckoutRequest) -> Result<Order> {
        let mut tx = self.pool.begin().await?;
        let (mut cart, _) = fetch_cart(&mut tx, customer.user_id, ProductLock::Update, None).await?;
        let profile: DeliveryProfile = sqlx::query_as::<_, ProfileRow>(
            "SELECT id, customer_id, full_name, phone, address FROM delivery_profiles WHERE id = $1",
        )
        .bind(request.delivery_profile_id)
        .fetch_optional(&mut *tx)
        .await?
        .map(DeliveryProfile::from)
        .ok_or(CommerceError::ProfileNotFound(request.delivery_profile_id))?;

        let placement = checkout::place_order(&mut cart, customer, &profile, request)?;
        let order = &placement.order;

        sqlx::query(
            "INSERT INTO orders (id, customer_id, customer_email, customer_name, customer_phone, customer_address, \
             note, payment_method, status, payment_status, total_price, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
        )
        .bind(order.id())
        .bind(order.customer_id())
        .bind(order.customer_email())
        .bind(&order.contact().full_name)
        .bind(&order.contact().phone)
        .bind(&order.contact().address)
        .bind(order.note())
        .bind(order.payment_method().as_str())
        .bind(order.status().as_str())
        .bind(order.payment_status().as_str())
        .bind(order.total().amount())
        .bind(order.created_at())
        .bind(order.updated_at())
        .execute(&mut *tx)
        .await?;

        for detail in order.details() {
            sqlx::query(
                "INSERT INTO order_details (id, order_id, product_id, product_title, quantity, price_at_order) \
                 VALUES ($1, $2, $3, $4, $5, $6)",
            )
            .bind(detail.id)
            .bind(order.id())
            .bind(detail.product_id)
            .bind(&detail.product_title)
            .bind(db_count(detail.quantity))
            .bind(detail.price_at_order.amount())
            .execute(&mut *tx)
            .await?;
        }

        for (product_id, quantity) in &placement.stock_taken {
            let taken = sqlx::query("UPDATE products SET quantity = quantity - $2 WHERE id = $1 AND quantity >= $2")
                .bind(product_id)
                .bind(db_count(*quantity))
                .execute(&mut *tx)
                .await?;
            if taken.rows_affected() == 0 {
                // Rolled back on drop.
                return Err(CommerceError::Storage(format!("stock for product {product_id} moved under lock")));
            }
        }

        save_cart(&mut tx, &cart).await?;
        tx.commit().await?;
        Ok(placement.order)
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Order> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))?;
        let details = fetch_details(&mut conn, &[order_id]).await?;
        order_from_rows(row, details)
    }

    async fn update_order(&self, order_id: Uuid, command: OrderCommand) -> Result<OrderUpdate> {
        let mut tx = self.pool.begin().await?;
        let row = sqlx::query_as::<_, OrderRow>(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"))
            .bind(order_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| CommerceError::OrderNotFound(order_id.to_string()))?;
        let details = fetch_details(&mut tx, &[order_id]).await?;
        let mut order = order_from_rows(row, details)?;

        let transition = order.apply(command)?;
        if !transition.changed {
            return Ok(OrderUpdate { order, transition });
        }

        sqlx::query("UPDATE orders SET status = $2, payment_status = $3, updated_at = $4 WHERE id = $1")
            .bind(order.id())
            .bind(order.status().as_str())
            .bind(order.payment_status().as_str())
            .bind(order.updated_at())
            .execute(&mut *tx)
            .await?;

        if transition.restock {
            let mut lines = order.stock_lines();
            lines.sort_by_key(|(product_id, _)| *product_id);
            for (product_id, quantity) in lines {
                sqlx::query("UPDATE products SET quantity = quantity + $2 WHERE id = $1")
                    .bind(product_id)
                    .bind(db_count(quantity))
                    .execute(&mut *tx)
                    .await?;
            }
        }

        tx.commit().await?;
        Ok(OrderUpdate { order, transition })
    }

    async fn list_orders(&self, filter: &OrderFilter, page: PageRequest) -> Result<Page<Order>> {
        let mut conn = self.pool.acquire().await?;

        let mut counter = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM orders");
        push_filters(&mut counter, filter);
        let (total,): (i64,) = counter.build_query_as().fetch_one(&mut *conn).await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {ORDER_COLUMNS} FROM orders"));
        push_filters(&mut select, filter);
        select
            .push(" ORDER BY created_at DESC, id DESC LIMIT ")
            .push_bind(i64::from(page.per_page()))
            .push(" OFFSET ")
            .push_bind(i64::try_from(page.offset()).unwrap_or(i64::MAX));
        let rows: Vec<OrderRow> = select.build_query_as().fetch_all(&mut *conn).await?;

        let orders = hydrate(&mut conn, rows).await?;
        Ok(Page::new(orders, u64::try_from(total).unwrap_or(0), page))
    }

    async fn order_stats(&self, newest: usize) -> Result<OrderStats> {
        let mut conn = self.pool.acquire().await?;
        let (total, revenue): (i64, i64) = sqlx::query_as(
            "SELECT COUNT(*), COALESCE(SUM(total_price) FILTER (WHERE status = 'DELIVERED'), 0)::BIGINT FROM orders",
        )
        .fetch_one(&mut *conn)
        .await?;
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders ORDER BY created_at DESC, id DESC LIMIT $1"
        ))
        .bind(i64::try_from(newest).unwrap_or(i64::MAX))
        .fetch_all(&mut *conn)
        .await?;
        Ok(OrderStats {
            total_orders: u64::try_from(total).unwrap_or(0),
            revenue: Money::new(revenue),
            newest: hydrate(&mut conn, rows).await?,
        })
    }
}
