use shop_admin_api::{
    config::database_url_from_env,
    db::{create_orm_conn, run_migrations},
};
use sqlx::PgPool;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let database_url = database_url_from_env()?;

    let orm = create_orm_conn(&database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;
    let pool = orm.get_postgres_connection_pool();

    let apparel = ensure_category(pool, "Apparel").await?;
    let kitchen = ensure_category(pool, "Kitchen").await?;
    let books = ensure_category(pool, "Books").await?;

    let hoodie = ensure_product(pool, "Axum Hoodie", "Warm hoodie for Rustaceans", 5500, apparel).await?;
    let mug = ensure_product(pool, "Ferris Mug", "Coffee tastes better with Ferris", 1200, kitchen).await?;
    let ebook = ensure_product(pool, "E-book: Async Rust", "Learn async Rust patterns", 2500, books).await?;

    let pending = seed_order(
        pool,
        "pending",
        "pending",
        None,
        &[(hoodie, 1, 5500), (mug, 2, 1200)],
    )
    .await?;
    let approved = seed_order(
        pool,
        "approved",
        "approved",
        Some("pi_seed_approved"),
        &[(ebook, 1, 2500)],
    )
    .await?;

    println!("Seed completed. Orders: pending #{pending}, approved #{approved}");
    Ok(())
}

async fn ensure_category(pool: &PgPool, name: &str) -> anyhow::Result<i32> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO categories (name)
        VALUES ($1)
        ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
        RETURNING id
        "#,
    )
    .bind(name)
    .fetch_one(pool)
    .await?;

    println!("Ensured category {name} (id={id})");
    Ok(id)
}

async fn ensure_product(
    pool: &PgPool,
    name: &str,
    description: &str,
    price: i64,
    category_id: i32,
) -> anyhow::Result<i32> {
    let (id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO products (name, description, price, category_id)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (name) DO UPDATE SET category_id = EXCLUDED.category_id
        RETURNING id
        "#,
    )
    .bind(name)
    .bind(description)
    .bind(price)
    .bind(category_id)
    .fetch_one(pool)
    .await?;
    Ok(id)
}

async fn seed_order(
    pool: &PgPool,
    order_status: &str,
    payment_status: &str,
    payment_intent_id: Option<&str>,
    lines: &[(i32, i32, i64)],
) -> anyhow::Result<i32> {
    let total: i64 = lines
        .iter()
        .map(|(_, quantity, price)| i64::from(*quantity) * price)
        .sum();

    let mut tx = pool.begin().await?;
    let (order_id,): (i32,) = sqlx::query_as(
        r#"
        INSERT INTO order_headers
            (order_total, order_status, payment_status, payment_intent_id,
             payment_date, name, phone, address, city, postal_code)
        VALUES ($1, $2, $3, $4, CASE WHEN $4::text IS NULL THEN NULL ELSE NOW() END,
                'Ferris Crab', '555-0100', '1 Harbor Way', 'Portland', '97201')
        RETURNING id
        "#,
    )
    .bind(total)
    .bind(order_status)
    .bind(payment_status)
    .bind(payment_intent_id)
    .fetch_one(&mut *tx)
    .await?;

    for (product_id, quantity, price) in lines {
        sqlx::query(
            r#"
            INSERT INTO order_details (order_header_id, product_id, quantity, price)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(order_id)
        .bind(product_id)
        .bind(quantity)
        .bind(price)
        .execute(&mut *tx)
        .await?;
    }
    tx.commit().await?;

    println!("Seeded {order_status} order #{order_id} (total={total})");
    Ok(order_id)
}
