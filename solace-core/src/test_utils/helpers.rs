// File: solace-core/src/test_utils/helpers.rs

use sqlx::{Pool, Postgres, PgConnection, Connection};
use sqlx::postgres::PgPoolOptions;
use crate::Error;
use crate::db::Database;

const TEST_DB: &str = "solace_test";

/// Create the test database if it does not exist yet.
pub async fn ensure_test_database_exists() -> Result<(), Error> {
    let admin_url = std::env::var("DATABASE_ADMIN_URL")
        .unwrap_or_else(|_| "postgres://solace@localhost/postgres".to_string());

    let mut conn = PgConnection::connect(&admin_url).await?;

    let create_db_sql = format!("CREATE DATABASE {TEST_DB};");
    match sqlx::query(&create_db_sql).execute(&mut conn).await {
        Ok(_) => println!("Created test DB '{TEST_DB}'."),
        // 42P04 => duplicate_database
        Err(e) if e.as_database_error().and_then(|d| d.code()).as_deref() == Some("42P04") => {
            println!("Test DB '{TEST_DB}' already exists; ignoring.");
        }
        Err(e) => return Err(Error::Database(e)),
    }

    Ok(())
}

/// Pool against `TEST_DATABASE_URL`, else `postgres://solace@localhost/solace_test`.
pub async fn create_test_db_pool() -> Result<Pool<Postgres>, Error> {
    let url = std::env::var("TEST_DATABASE_URL")
        .unwrap_or_else(|_| format!("postgres://solace@localhost/{TEST_DB}"));

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&url)
        .await?;

    Ok(pool)
}

/// Wipes out test data so each test can start fresh.
pub async fn clean_database(pool: &Pool<Postgres>) -> Result<(), Error> {
    sqlx::query(r#"
        TRUNCATE TABLE
            chat_messages,
            chat_sessions,
            scheduled_sessions,
            peer_supporters,
            users
        RESTART IDENTITY CASCADE;
    "#)
        .execute(pool)
        .await?;

    Ok(())
}

/// Inserts a user row and returns its id.
pub async fn insert_user(pool: &Pool<Postgres>, name: &str, role: &str) -> Result<i64, Error> {
    let id: i64 = sqlx::query_scalar(
        r#"INSERT INTO users (name, role) VALUES ($1, $2) RETURNING id"#,
    )
        .bind(name)
        .bind(role)
        .fetch_one(pool)
        .await?;
    Ok(id)
}

/// Inserts a user plus its `peer_supporters` profile.
pub async fn insert_supporter(pool: &Pool<Postgres>, name: &str, is_verified: bool) -> Result<i64, Error> {
    let id = insert_user(pool, name, "peer_supporter").await?;
    sqlx::query(
        r#"INSERT INTO peer_supporters (user_id, display_name, is_verified) VALUES ($1, $2, $3)"#,
    )
        .bind(id)
        .bind(name)
        .bind(is_verified)
        .execute(pool)
        .await?;
    Ok(id)
}

/// Returns a migrated, empty test DB handle.
pub async fn setup_test_database() -> Result<Database, Error> {
    ensure_test_database_exists().await?;

    let pool = create_test_db_pool().await?;
    let db = Database::from_pool(pool);
    db.migrate().await?;
    clean_database(db.pool()).await?;

    Ok(db)
}
