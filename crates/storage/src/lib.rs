use std::str::FromStr;

use chrono::Utc;
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow},
    Pool, Row, Sqlite,
};
use thiserror::Error;

use shared::domain::{
    level_title, CompletedOrder, EventFlags, Order, Player, UserId, MAX_LEVEL, ORDERS_PER_LEVEL,
};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("user {0} not found")]
    NotFound(UserId),
    #[error("storage failure: {0}")]
    Storage(#[from] sqlx::Error),
    #[error("corrupted order payload: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// What a single completed order did to the player's progression.
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub total_orders: i64,
    pub leveled_up: bool,
    pub level_title: String,
    pub total_crosses: i64,
}

impl Storage {
    pub async fn new(database_url: &str) -> StoreResult<Self> {
        let connect_options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        ensure_schema(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> StoreResult<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }

    pub async fn ensure_user(&self, user_id: UserId, first_name: &str) -> StoreResult<()> {
        let first_name = if first_name.trim().is_empty() {
            "Guest"
        } else {
            first_name
        };
        sqlx::query("INSERT OR IGNORE INTO users (user_id, first_name) VALUES (?, ?)")
            .bind(user_id.0)
            .bind(first_name)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// Ensure-then-load. NotFound is only reachable if the row vanishes
    /// between the insert and the select.
    pub async fn fetch_user(&self, user_id: UserId, first_name: &str) -> StoreResult<Player> {
        self.ensure_user(user_id, first_name).await?;
        self.get_user(user_id)
            .await?
            .ok_or(StoreError::NotFound(user_id))
    }

    pub async fn get_user(&self, user_id: UserId) -> StoreResult<Option<Player>> {
        let row = sqlx::query(
            "SELECT user_id, first_name, level, total_orders, total_crosses,
                    has_student_done, has_critic_done, has_dirty_plate_done, has_second_chef_done
             FROM users WHERE user_id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.as_ref().map(player_from_row))
    }

    pub async fn save_active_order(&self, user_id: UserId, order: &Order) -> StoreResult<()> {
        let payload = serde_json::to_string(order)?;
        let updated = sqlx::query("UPDATE users SET active_order_json = ? WHERE user_id = ?")
            .bind(payload)
            .bind(user_id.0)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if updated == 0 {
            return Err(StoreError::NotFound(user_id));
        }
        Ok(())
    }

    pub async fn get_active_order(&self, user_id: UserId) -> StoreResult<Option<Order>> {
        let row = sqlx::query("SELECT active_order_json FROM users WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        match row.get::<Option<String>, _>(0) {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    pub async fn clear_active_order(&self, user_id: UserId) -> StoreResult<()> {
        sqlx::query("UPDATE users SET active_order_json = NULL WHERE user_id = ?")
            .bind(user_id.0)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn get_last_order(&self, user_id: UserId) -> StoreResult<Option<CompletedOrder>> {
        let row = sqlx::query("SELECT last_order_json FROM users WHERE user_id = ?")
            .bind(user_id.0)
            .fetch_optional(&self.pool)
            .await?;
        let Some(row) = row else {
            return Ok(None);
        };
        match row.get::<Option<String>, _>(0) {
            Some(payload) => Ok(Some(serde_json::from_str(&payload)?)),
            None => Ok(None),
        }
    }

    /// The atomic completion transition: bump counters, set the one-time flag
    /// for the order's tag, retain the active order as the new last order and
    /// clear it, levelling up at most one step. Runs inside a single
    /// transaction so concurrent completions for one user serialize on the
    /// row instead of double-counting.
    pub async fn complete_order(
        &self,
        user_id: UserId,
        tag: Option<&str>,
        order_crosses: i64,
    ) -> StoreResult<CompletionSummary> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query(
            "SELECT total_orders, total_crosses, level,
                    has_student_done, has_critic_done, has_dirty_plate_done, has_second_chef_done,
                    active_order_json
             FROM users WHERE user_id = ?",
        )
        .bind(user_id.0)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(StoreError::NotFound(user_id))?;

        let total_orders = row.get::<i64, _>(0) + 1;
        let total_crosses = row.get::<i64, _>(1) + order_crosses;
        let prev_level = row.get::<i64, _>(2);
        let mut flags = EventFlags {
            student_done: row.get::<bool, _>(3),
            critic_done: row.get::<bool, _>(4),
            dirty_plate_done: row.get::<bool, _>(5),
            second_chef_done: row.get::<bool, _>(6),
        };
        if let Some(tag) = tag {
            flags.mark_done(tag);
        }

        // The order being finished becomes the last order; an empty or absent
        // active order leaves the previous last order in place.
        let last_order_json = match row.get::<Option<String>, _>(7) {
            Some(payload) => {
                let active: Order = serde_json::from_str(&payload)?;
                if active.dishes.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&CompletedOrder {
                        dishes: active.dishes,
                        crosses: order_crosses,
                        tag: tag.map(str::to_string),
                        completed_at: Utc::now(),
                    })?)
                }
            }
            None => None,
        };

        let mut level = prev_level;
        if total_orders % ORDERS_PER_LEVEL == 0 && level < MAX_LEVEL {
            level += 1;
        }

        sqlx::query(
            "UPDATE users SET total_orders = ?, total_crosses = ?, level = ?,
                    has_student_done = ?, has_critic_done = ?,
                    has_dirty_plate_done = ?, has_second_chef_done = ?,
                    last_order_json = COALESCE(?, last_order_json),
                    active_order_json = NULL
             WHERE user_id = ?",
        )
        .bind(total_orders)
        .bind(total_crosses)
        .bind(level)
        .bind(flags.student_done)
        .bind(flags.critic_done)
        .bind(flags.dirty_plate_done)
        .bind(flags.second_chef_done)
        .bind(last_order_json)
        .bind(user_id.0)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        Ok(CompletionSummary {
            total_orders,
            leveled_up: level != prev_level,
            level_title: level_title(level),
            total_crosses,
        })
    }

    pub async fn leaderboard(&self, limit: Option<i64>) -> StoreResult<Vec<Player>> {
        let rows = if let Some(limit) = limit {
            sqlx::query(
                "SELECT user_id, first_name, level, total_orders, total_crosses,
                        has_student_done, has_critic_done, has_dirty_plate_done, has_second_chef_done
                 FROM users
                 ORDER BY total_orders DESC, level DESC
                 LIMIT ?",
            )
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(
                "SELECT user_id, first_name, level, total_orders, total_crosses,
                        has_student_done, has_critic_done, has_dirty_plate_done, has_second_chef_done
                 FROM users
                 ORDER BY total_orders DESC, level DESC",
            )
            .fetch_all(&self.pool)
            .await?
        };
        Ok(rows.iter().map(player_from_row).collect())
    }

    /// Administrative bulk reset: deletes every user row unconditionally.
    pub async fn reset_all(&self) -> StoreResult<u64> {
        let result = sqlx::query("DELETE FROM users").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }
}

fn player_from_row(row: &SqliteRow) -> Player {
    Player {
        user_id: UserId(row.get::<i64, _>(0)),
        first_name: row
            .get::<Option<String>, _>(1)
            .unwrap_or_else(|| "Guest".to_string()),
        level: row.get::<i64, _>(2),
        total_orders: row.get::<i64, _>(3),
        total_crosses: row.get::<i64, _>(4),
        flags: EventFlags {
            student_done: row.get::<bool, _>(5),
            critic_done: row.get::<bool, _>(6),
            dirty_plate_done: row.get::<bool, _>(7),
            second_chef_done: row.get::<bool, _>(8),
        },
    }
}

async fn ensure_schema(pool: &Pool<Sqlite>) -> StoreResult<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            user_id              INTEGER PRIMARY KEY,
            first_name           TEXT,
            level                INTEGER NOT NULL DEFAULT 0,
            total_orders         INTEGER NOT NULL DEFAULT 0,
            total_crosses        INTEGER NOT NULL DEFAULT 0,
            has_student_done     INTEGER NOT NULL DEFAULT 0,
            has_critic_done      INTEGER NOT NULL DEFAULT 0,
            has_dirty_plate_done INTEGER NOT NULL DEFAULT 0,
            has_second_chef_done INTEGER NOT NULL DEFAULT 0,
            active_order_json    TEXT,
            last_order_json      TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Databases created before these columns existed get them added in place.
    let pragma_rows = sqlx::query("PRAGMA table_info(users)")
        .fetch_all(pool)
        .await?;
    let mut present: Vec<String> = Vec::with_capacity(pragma_rows.len());
    for row in pragma_rows {
        present.push(row.try_get("name")?);
    }

    let migrations = [
        (
            "total_crosses",
            "ALTER TABLE users ADD COLUMN total_crosses INTEGER NOT NULL DEFAULT 0",
        ),
        (
            "has_critic_done",
            "ALTER TABLE users ADD COLUMN has_critic_done INTEGER NOT NULL DEFAULT 0",
        ),
        (
            "has_dirty_plate_done",
            "ALTER TABLE users ADD COLUMN has_dirty_plate_done INTEGER NOT NULL DEFAULT 0",
        ),
        (
            "has_second_chef_done",
            "ALTER TABLE users ADD COLUMN has_second_chef_done INTEGER NOT NULL DEFAULT 0",
        ),
        (
            "last_order_json",
            "ALTER TABLE users ADD COLUMN last_order_json TEXT",
        ),
    ];
    for (column, ddl) in migrations {
        if !present.iter().any(|name| name == column) {
            sqlx::query(ddl).execute(pool).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
