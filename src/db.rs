use anyhow::{Context, Result};
use sqlx::MySqlPool;
use sqlx::mysql::MySqlPoolOptions;
use std::time::Duration;

use crate::auth::password::hash_password;
use crate::config::Config;
use crate::model::role::ADMIN_ROLE;

pub async fn init_db(config: &Config) -> Result<MySqlPool> {
    let pool = MySqlPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("failed to run database migrations")?;

    Ok(pool)
}

/// Creates the configured administrator account unless a user with that NIP exists.
pub async fn bootstrap_admin(pool: &MySqlPool, nip: &str, password: &str) -> Result<bool> {
    let existing = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM users WHERE nip = ?")
        .bind(nip)
        .fetch_one(pool)
        .await?;
    if existing > 0 {
        return Ok(false);
    }

    let role_id = sqlx::query_scalar::<_, u64>("SELECT id FROM roles WHERE code = ?")
        .bind(ADMIN_ROLE)
        .fetch_optional(pool)
        .await?
        .context("ADMIN role missing, migrations incomplete")?;

    let hashed = hash_password(password).map_err(|e| anyhow::anyhow!("{e}"))?;

    sqlx::query(
        r#"
        INSERT INTO users (nip, full_name, password, role_id)
        VALUES (?, 'Administrator', ?, ?)
        "#,
    )
    .bind(nip)
    .bind(hashed)
    .bind(role_id)
    .execute(pool)
    .await?;

    Ok(true)
}

/// Row builders for tests that run against a migrated database.
#[cfg(test)]
pub mod fixtures {
    use chrono::NaiveDate;
    use sqlx::MySqlPool;

    use crate::config::Config;

    pub fn config() -> Config {
        Config::from_lookup(|k| match k {
            "SERVER_ADDR" => Some("127.0.0.1:0".into()),
            "DATABASE_URL" => Some("mysql://localhost/absensi".into()),
            "JWT_SECRET" => Some("fixture-secret".into()),
            _ => None,
        })
        .unwrap()
    }

    pub async fn department(pool: &MySqlPool, code: &str) -> u64 {
        sqlx::query("INSERT INTO departments (code, name) VALUES (?, ?)")
            .bind(code)
            .bind(format!("Bidang {code}"))
            .execute(pool)
            .await
            .unwrap()
            .last_insert_id()
    }

    /// Active user holding one of the seeded roles.
    pub async fn user(pool: &MySqlPool, nip: &str, role_code: &str, department_id: Option<u64>) -> u64 {
        sqlx::query(
            r#"
            INSERT INTO users (nip, full_name, password, role_id, department_id)
            SELECT ?, ?, 'not-a-hash', id, ? FROM roles WHERE code = ?
            "#,
        )
        .bind(nip)
        .bind(format!("Pegawai {nip}"))
        .bind(department_id)
        .bind(role_code)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_id()
    }

    pub async fn attendance(pool: &MySqlPool, user_id: u64, date: NaiveDate, status: &str) {
        sqlx::query("INSERT INTO attendances (user_id, date, status) VALUES (?, ?, ?)")
            .bind(user_id)
            .bind(date)
            .bind(status)
            .execute(pool)
            .await
            .unwrap();
    }

    pub async fn attendance_status(pool: &MySqlPool, user_id: u64, date: NaiveDate) -> Option<String> {
        sqlx::query_scalar::<_, String>("SELECT status FROM attendances WHERE user_id = ? AND date = ?")
            .bind(user_id)
            .bind(date)
            .fetch_optional(pool)
            .await
            .unwrap()
    }
}
