//! CRUD helpers against an in-memory SQLite database.

#![cfg(feature = "sqlite")]

use dbkit::{ConnectionConfig, Database, DbResult, SqliteDriver, Value, record};

async fn users_db() -> DbResult<Database<SqliteDriver>> {
    let mut db = Database::<SqliteDriver>::connect(&ConnectionConfig::new().database(":memory:")).await?;
    db.execute(
        "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT NOT NULL UNIQUE, age INTEGER, deleted_at TEXT)",
        &[],
    )
    .await?;
    Ok(db)
}

#[tokio::test]
async fn insert_and_find() {
    let mut db = users_db().await.unwrap();

    let affected = db
        .insert("users", &record! { "name" => "alice", "age" => 31 })
        .await
        .unwrap();
    assert_eq!(affected, 1);

    let id = db
        .insert_get_id("users", &record! { "name" => "bob", "age" => 17 }, "id")
        .await
        .unwrap();
    assert_eq!(id, Some(2));

    let bob = db
        .find_one("users", &record! { "id" => 2 })
        .await
        .unwrap()
        .unwrap();
    assert_eq!(bob.try_get::<String>("name").unwrap(), "bob");
    assert_eq!(bob.try_get::<i64>("age").unwrap(), 17);
    assert_eq!(bob.get("deleted_at"), Some(&Value::Null));

    let none = db.find_one("users", &record! { "name" => "carol" }).await.unwrap();
    assert!(none.is_none());

    let all = db.find_all("users", &[]).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[tokio::test]
async fn update_and_delete_report_affected_rows() {
    let mut db = users_db().await.unwrap();
    for (name, age) in [("a", 10), ("b", 20), ("c", 30)] {
        db.insert("users", &record! { "name" => name, "age" => age })
            .await
            .unwrap();
    }

    let updated = db
        .update("users", &record! { "age" => 99 }, &record! { "name" => "b" })
        .await
        .unwrap();
    assert_eq!(updated, 1);

    let missing = db
        .update("users", &record! { "age" => 1 }, &record! { "name" => "zzz" })
        .await
        .unwrap();
    assert_eq!(missing, 0);

    let deleted = db
        .delete("users", &record! { "deleted_at" => None::<String> })
        .await
        .unwrap();
    assert_eq!(deleted, 3);
}

#[tokio::test]
async fn safety_gates_leave_data_untouched() {
    let mut db = users_db().await.unwrap();
    db.insert("users", &record! { "name" => "a" }).await.unwrap();

    assert!(db.delete("users", &[]).await.unwrap_err().is_query());
    assert!(
        db.update("users", &record! { "age" => 1 }, &[])
            .await
            .unwrap_err()
            .is_query()
    );
    assert_eq!(db.table("users").count(&mut db).await.unwrap(), 1);
}

#[tokio::test]
async fn constraint_violation_is_query_error_with_statement() {
    let mut db = users_db().await.unwrap();
    db.insert("users", &record! { "name" => "dup" }).await.unwrap();

    let err = db
        .insert("users", &record! { "name" => "dup" })
        .await
        .unwrap_err();
    assert!(err.is_query());
    assert_eq!(err.message(), "Unique constraint violation");
    assert!(err.debug_info().contains(r#"INSERT INTO "users""#));
}

#[tokio::test]
async fn update_multiple_is_atomic() {
    let mut db = users_db().await.unwrap();
    for name in ["a", "b"] {
        db.insert("users", &record! { "name" => name }).await.unwrap();
    }

    let total = db
        .update_multiple(
            "users",
            &[
                record! { "id" => 1, "age" => 5 },
                record! { "id" => 2, "age" => 6 },
            ],
            "id",
        )
        .await
        .unwrap();
    assert_eq!(total, 2);

    // second row collides with the UNIQUE name of row 1
    let err = db
        .update_multiple(
            "users",
            &[
                record! { "id" => 1, "age" => 50 },
                record! { "id" => 2, "name" => "a" },
            ],
            "id",
        )
        .await
        .unwrap_err();
    assert!(err.is_query());
    assert!(!db.in_transaction());

    let first = db.find_one("users", &record! { "id" => 1 }).await.unwrap().unwrap();
    assert_eq!(first.get("age"), Some(&Value::Int(5)));
}

#[tokio::test]
async fn connection_config_from_toml() {
    let config = ConnectionConfig::from_toml_str(
        r#"
        database = ":memory:"

        [extras]
        foreign_keys = "true"
        "#,
    )
    .unwrap();
    let mut db = Database::<SqliteDriver>::connect(&config).await.unwrap();
    let rows = db.query("PRAGMA foreign_keys", &[]).await.unwrap();
    assert_eq!(rows[0].get_index(0), Some(&Value::Int(1)));
}
