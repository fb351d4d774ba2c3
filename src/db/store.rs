//! SQLite-backed store for users and sessions.

use std::str::FromStr;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};

/// A registered account row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    pub ip: String,
    pub role: String,
    pub created_at: i64,
}

/// A server-side session row.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: i64,
    pub expires_at: i64,
}

/// Result of a registration attempt under the per-IP account cap.
#[derive(Debug)]
pub enum RegisterOutcome {
    Created(User),
    IpCapExceeded,
}

/// Pooled access to the SQLite database.
///
/// Cloning is cheap; all clones share the same pool.
#[derive(Clone)]
pub struct Store {
    pool: SqlitePool,
}

impl Store {
    /// Open (or create) the database file and build a connection pool.
    pub async fn connect(path: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// In-memory database for tests.
    ///
    /// Each SQLite connection gets its own `:memory:` database, so the pool
    /// is capped at a single connection.
    pub async fn connect_in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        Ok(Self { pool })
    }

    /// Apply embedded schema migrations.
    pub async fn migrate(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await
    }

    // ---- users ----

    /// Register a new account, enforcing the per-IP cap inside the same
    /// transaction as the insert.
    ///
    /// The touch statement escalates to SQLite's write lock before the count
    /// is read, so two concurrent registrations from one IP cannot both see
    /// the cap as unreached. `max_accounts_per_ip = None` disables the cap.
    pub async fn register_account(
        &self,
        username: &str,
        password_hash: &str,
        ip: &str,
        max_accounts_per_ip: Option<i64>,
    ) -> Result<RegisterOutcome, sqlx::Error> {
        let mut tx = self.pool.begin().await?;

        // Write-intent touch: a no-op UPDATE that forces the write lock early.
        sqlx::query("UPDATE users SET ip = ip WHERE ip = ?1")
            .bind(ip)
            .execute(&mut *tx)
            .await?;

        if let Some(max) = max_accounts_per_ip {
            if !ip.is_empty() {
                let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ip = ?1")
                    .bind(ip)
                    .fetch_one(&mut *tx)
                    .await?;
                if count >= max {
                    // Dropping the transaction rolls back the touch.
                    return Ok(RegisterOutcome::IpCapExceeded);
                }
            }
        }

        let user = sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, ip) VALUES (?1, ?2, ?3) \
             RETURNING id, username, password_hash, ip, role, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .bind(ip)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(RegisterOutcome::Created(user))
    }

    /// Insert a user directly, bypassing guards. Admin CLI only.
    pub async fn create_user(
        &self,
        username: &str,
        password_hash: &str,
        ip: &str,
        role: &str,
    ) -> Result<User, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "INSERT INTO users (username, password_hash, ip, role) VALUES (?1, ?2, ?3, ?4) \
             RETURNING id, username, password_hash, ip, role, created_at",
        )
        .bind(username)
        .bind(password_hash)
        .bind(ip)
        .bind(role)
        .fetch_one(&self.pool)
        .await
    }

    pub async fn user_by_username(&self, username: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, ip, role, created_at \
             FROM users WHERE username = ?1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn user_by_id(&self, id: i64) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, ip, role, created_at \
             FROM users WHERE id = ?1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn count_users_by_ip(&self, ip: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE ip = ?1")
            .bind(ip)
            .fetch_one(&self.pool)
            .await
    }

    /// Delete a user by name. Returns false when no such user existed.
    pub async fn delete_user(&self, username: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE username = ?1")
            .bind(username)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Change a user's role. Returns the updated row, or None if the user
    /// does not exist.
    pub async fn set_role(&self, username: &str, role: &str) -> Result<Option<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = ?1 WHERE username = ?2 \
             RETURNING id, username, password_hash, ip, role, created_at",
        )
        .bind(role)
        .bind(username)
        .fetch_optional(&self.pool)
        .await
    }

    pub async fn list_users(&self) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, ip, role, created_at \
             FROM users ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await
    }

    // ---- sessions ----

    pub async fn create_session(
        &self,
        token: &str,
        user_id: i64,
        expires_at: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query("INSERT INTO sessions (token, user_id, expires_at) VALUES (?1, ?2, ?3)")
            .bind(token)
            .bind(user_id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn session_by_token(&self, token: &str) -> Result<Option<Session>, sqlx::Error> {
        sqlx::query_as::<_, Session>(
            "SELECT token, user_id, expires_at FROM sessions WHERE token = ?1",
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await
    }

    /// Delete a session by token. Deleting an absent token is not an error.
    pub async fn delete_session(&self, token: &str) -> Result<(), sqlx::Error> {
        sqlx::query("DELETE FROM sessions WHERE token = ?1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn test_store() -> Store {
        let store = Store::connect_in_memory().await.unwrap();
        store.migrate().await.unwrap();
        store
    }

    #[tokio::test]
    async fn register_and_fetch_user() {
        let store = test_store().await;

        let outcome = store
            .register_account("alice", "hash", "10.0.0.1", None)
            .await
            .unwrap();
        let user = match outcome {
            RegisterOutcome::Created(u) => u,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(user.username, "alice");
        assert_eq!(user.role, "user");

        let fetched = store.user_by_username("alice").await.unwrap().unwrap();
        assert_eq!(fetched.id, user.id);
        assert!(store.user_by_username("bob").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_username_is_unique_violation() {
        let store = test_store().await;

        store
            .register_account("alice", "hash", "", None)
            .await
            .unwrap();
        let err = store
            .register_account("alice", "hash", "", None)
            .await
            .unwrap_err();

        let db_err = err.as_database_error().expect("database error");
        assert!(db_err.is_unique_violation());
    }

    #[tokio::test]
    async fn per_ip_cap_blocks_third_account() {
        let store = test_store().await;

        for name in ["a1", "a2"] {
            let outcome = store
                .register_account(name, "hash", "10.0.0.5", Some(2))
                .await
                .unwrap();
            assert!(matches!(outcome, RegisterOutcome::Created(_)));
        }

        let outcome = store
            .register_account("a3", "hash", "10.0.0.5", Some(2))
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::IpCapExceeded));

        // A different IP is unaffected.
        let outcome = store
            .register_account("b1", "hash", "10.0.0.6", Some(2))
            .await
            .unwrap();
        assert!(matches!(outcome, RegisterOutcome::Created(_)));
    }

    #[tokio::test]
    async fn empty_ip_bypasses_cap() {
        let store = test_store().await;

        for name in ["a1", "a2", "a3"] {
            let outcome = store
                .register_account(name, "hash", "", Some(1))
                .await
                .unwrap();
            assert!(matches!(outcome, RegisterOutcome::Created(_)));
        }
    }

    #[tokio::test]
    async fn session_lifecycle() {
        let store = test_store().await;
        let user = match store
            .register_account("alice", "hash", "", None)
            .await
            .unwrap()
        {
            RegisterOutcome::Created(u) => u,
            other => panic!("unexpected outcome: {:?}", other),
        };

        store.create_session("tok", user.id, 4102444800).await.unwrap();
        let sess = store.session_by_token("tok").await.unwrap().unwrap();
        assert_eq!(sess.user_id, user.id);

        store.delete_session("tok").await.unwrap();
        assert!(store.session_by_token("tok").await.unwrap().is_none());

        // Deleting again is a no-op, not an error.
        store.delete_session("tok").await.unwrap();
    }

    #[tokio::test]
    async fn role_updates() {
        let store = test_store().await;
        store
            .create_user("alice", "hash", "", "user")
            .await
            .unwrap();

        let user = store.set_role("alice", "admin").await.unwrap().unwrap();
        assert_eq!(user.role, "admin");

        assert!(store.set_role("nobody", "admin").await.unwrap().is_none());
        assert!(store.delete_user("alice").await.unwrap());
        assert!(!store.delete_user("alice").await.unwrap());
    }
}
