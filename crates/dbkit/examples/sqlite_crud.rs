//! CRUD helpers and the query builder on an in-memory SQLite database.
//!
//! Run with: cargo run --example sqlite_crud -p dbkit

use dbkit::{ConnectionConfig, Database, DbError, Event, SqliteDriver, raw, record};

#[tokio::main]
async fn main() -> Result<(), DbError> {
    let config = ConnectionConfig::new().database(":memory:");
    let mut db = Database::<SqliteDriver>::connect(&config).await?;

    db.on(Event::Query, |p| {
        if let (Some(sql), Some(duration)) = (&p.sql, p.duration) {
            println!("  [{duration:?}] {sql}");
        }
    });

    db.execute(
        "CREATE TABLE orders (id INTEGER PRIMARY KEY, customer TEXT NOT NULL, status TEXT, total REAL)",
        &[],
    )
    .await?;

    // ============================================
    // Insert
    // ============================================
    println!("=== insert ===");
    let seed = [
        ("alice", "paid", 40.0),
        ("alice", "paid", 75.5),
        ("bob", "paid", 12.0),
        ("bob", "void", 300.0),
    ];
    for (customer, status, total) in seed {
        let id = db
            .insert_get_id(
                "orders",
                &record! { "customer" => customer, "status" => status, "total" => total },
                "id",
            )
            .await?;
        println!("inserted order {id:?}");
    }

    // ============================================
    // Query builder
    // ============================================
    println!("\n=== grouped totals ===");
    let big_spenders = db
        .table("orders")
        .select([raw("customer"), raw("SUM(total) as spent")])
        .where_eq("status", "paid")
        .group_by(["customer"])
        .having(raw("SUM(total)"), ">", 50)
        .order_by("customer", "asc")
        .get(&mut db)
        .await?;
    for row in &big_spenders {
        println!("{:?} spent {:?}", row.get("customer"), row.get("spent"));
    }

    let paid = db.table("orders").where_eq("status", "paid");
    println!("paid orders: {}", paid.count(&mut db).await?);
    println!("largest paid: {:?}", paid.max(&mut db, "total").await?);

    // ============================================
    // Transaction
    // ============================================
    println!("\n=== transaction ===");
    let result = db
        .transaction(async |db| -> Result<(), DbError> {
            db.delete("orders", &record! { "status" => "void" }).await?;
            Err(DbError::query("refund desk is closed"))
        })
        .await;
    println!("rolled back: {result:?}");
    println!(
        "void orders still present: {}",
        db.table("orders").where_eq("status", "void").exists(&mut db).await?
    );

    Ok(())
}
