//! Connect to PostgreSQL from environment variables and log every statement.
//!
//! Run with: cargo run --example postgres_env -p dbkit
//!
//! Set connection settings in a .env file or the environment, e.g.:
//! DB_HOST=localhost DB_DATABASE=dbkit_example DB_USERNAME=postgres DB_PASSWORD=postgres

use dbkit::{ConnectionConfig, Database, DbError, PostgresDriver, record};

#[tokio::main]
async fn main() -> Result<(), DbError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "dbkit=debug".into()),
        )
        .init();

    let mut db = Database::<PostgresDriver>::connect(&ConnectionConfig::new())
        .await?
        .with_tracing();

    db.execute(
        "CREATE TABLE IF NOT EXISTS dbkit_users (
            id BIGSERIAL PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            age INT
        )",
        &[],
    )
    .await?;
    db.execute("DELETE FROM dbkit_users", &[]).await?;

    let id = db
        .insert_get_id("dbkit_users", &record! { "name" => "alice", "age" => 31 }, "id")
        .await?;
    println!("alice has id {id:?}");

    db.update_multiple(
        "dbkit_users",
        &[record! { "id" => id, "age" => 32 }],
        "id",
    )
    .await?;

    let adults = db
        .table("dbkit_users")
        .where_cmp("age", ">=", 18)
        .order_by("name", "asc")
        .get(&mut db)
        .await?;
    println!("{} adult(s)", adults.len());

    // Unique violation: reported as a query error with the statement attached.
    match db.insert("dbkit_users", &record! { "name" => "alice" }).await {
        Ok(_) => println!("unexpected success"),
        Err(e) => println!("{} ({})", e.message(), e.debug_info()),
    }

    Ok(())
}
