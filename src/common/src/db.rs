use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{PgPool, Postgres, Row, Sqlite, SqlitePool, Transaction, postgres::PgRow, query};
use thiserror::Error;
use uuid::Uuid;

use crate::model::{AuditRecord, Enrollment, HostedSession, Profile, SubscriptionRecord, SubscriptionSnapshot};

/// Store provides an interface to the account database (PostgreSQL or SQLite).
#[derive(Clone)]
pub enum Store {
    Postgres(PgPool),
    Sqlite(SqlitePool),
}

/// Failure modes of the single-transaction account purge.
#[derive(Debug, Error)]
pub enum PurgeError {
    /// The purge transaction could not be started; no row was touched and
    /// the caller may fall back to stepwise deletes.
    #[error("could not start purge transaction: {0}")]
    NotStarted(#[source] sqlx::Error),
    /// The purge transaction started but a statement failed. Everything was
    /// rolled back locally, but the attempt must be treated as fatal.
    #[error("purge transaction aborted: {0}")]
    Aborted(#[source] sqlx::Error),
}

/// Row counts from one cascade pass over an account, plus the subscription
/// snapshot captured before the mirror row went away.
#[derive(Debug, Clone, Default)]
pub struct PurgeReport {
    pub audit_records: u64,
    pub enrollments: u64,
    pub sessions: u64,
    pub subscription_rows: u64,
    pub profile_deleted: bool,
    pub subscription: Option<SubscriptionSnapshot>,
}

impl Store {
    /// Create a new Store client and initialize schema.
    pub async fn new(dsn: &str) -> Result<Self, sqlx::Error> {
        log::info!("Connecting to account database with DSN: {dsn}");

        let store = if dsn.starts_with("sqlite:") {
            // Add mode=rwc to create database file if it doesn't exist
            let dsn_with_create = if dsn.contains('?') {
                if dsn.contains("mode=") {
                    dsn.to_string()
                } else {
                    format!("{dsn}&mode=rwc")
                }
            } else {
                format!("{dsn}?mode=rwc")
            };

            // SQLite does not enforce REFERENCES clauses unless the pragma is
            // set on every connection. The cascade's delete order depends on
            // those constraints being live.
            let mut options = SqlitePoolOptions::new().after_connect(|conn, _meta| {
                Box::pin(async move {
                    query("PRAGMA foreign_keys = ON").execute(conn).await?;
                    Ok(())
                })
            });

            // An in-memory SQLite database exists per connection; more than
            // one pooled connection would each see an empty schema.
            if dsn.contains(":memory:") || dsn.contains("mode=memory") {
                options = options.max_connections(1);
            }

            let pool = options.connect(&dsn_with_create).await.map_err(|e| {
                log::error!("Failed to connect to SQLite database with DSN '{dsn_with_create}': {e}");
                e
            })?;
            Store::Sqlite(pool)
        } else {
            let pool = PgPool::connect(dsn).await.map_err(|e| {
                log::error!("Failed to connect to PostgreSQL database with DSN '{dsn}': {e}");
                e
            })?;
            Store::Postgres(pool)
        };

        store.init().await.map_err(|e| {
            log::error!("Failed to initialize account schema: {e}");
            e
        })?;
        log::info!("Account store ready");
        Ok(store)
    }

    /// Initialize account tables if they do not exist.
    ///
    /// Children carry NOT NULL foreign keys to their parents, so any delete
    /// that runs out of order fails instead of leaving orphans behind.
    async fn init(&self) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let create_profiles = r#"
                CREATE TABLE IF NOT EXISTS profiles (
                    account_id TEXT PRIMARY KEY,
                    email TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    billing_customer_id TEXT,
                    created_at TEXT NOT NULL
                )"#;
                query(create_profiles).execute(pool).await?;

                let create_sessions = r#"
                CREATE TABLE IF NOT EXISTS hosted_sessions (
                    id TEXT PRIMARY KEY,
                    host_id TEXT NOT NULL REFERENCES profiles(account_id),
                    title TEXT NOT NULL,
                    starts_at TEXT NOT NULL,
                    status TEXT NOT NULL
                )"#;
                query(create_sessions).execute(pool).await?;

                let create_enrollments = r#"
                CREATE TABLE IF NOT EXISTS enrollments (
                    id TEXT PRIMARY KEY,
                    session_id TEXT NOT NULL REFERENCES hosted_sessions(id),
                    profile_id TEXT NOT NULL REFERENCES profiles(account_id),
                    status TEXT NOT NULL,
                    created_at TEXT NOT NULL
                )"#;
                query(create_enrollments).execute(pool).await?;

                let create_audit = r#"
                CREATE TABLE IF NOT EXISTS audit_records (
                    id TEXT PRIMARY KEY,
                    profile_id TEXT NOT NULL REFERENCES profiles(account_id),
                    action TEXT NOT NULL,
                    detail TEXT,
                    created_at TEXT NOT NULL
                )"#;
                query(create_audit).execute(pool).await?;

                let create_subscriptions = r#"
                CREATE TABLE IF NOT EXISTS subscription_records (
                    profile_id TEXT PRIMARY KEY REFERENCES profiles(account_id),
                    subscription_id TEXT NOT NULL,
                    customer_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    current_period_end TEXT
                )"#;
                query(create_subscriptions).execute(pool).await?;
            }
            Store::Postgres(pool) => {
                let create_profiles = r#"
                CREATE TABLE IF NOT EXISTS profiles (
                    account_id UUID PRIMARY KEY,
                    email TEXT NOT NULL,
                    display_name TEXT NOT NULL,
                    billing_customer_id TEXT,
                    created_at TIMESTAMPTZ NOT NULL
                )"#;
                query(create_profiles).execute(pool).await?;

                let create_sessions = r#"
                CREATE TABLE IF NOT EXISTS hosted_sessions (
                    id UUID PRIMARY KEY,
                    host_id UUID NOT NULL REFERENCES profiles(account_id),
                    title TEXT NOT NULL,
                    starts_at TIMESTAMPTZ NOT NULL,
                    status TEXT NOT NULL
                )"#;
                query(create_sessions).execute(pool).await?;

                let create_enrollments = r#"
                CREATE TABLE IF NOT EXISTS enrollments (
                    id UUID PRIMARY KEY,
                    session_id UUID NOT NULL REFERENCES hosted_sessions(id),
                    profile_id UUID NOT NULL REFERENCES profiles(account_id),
                    status TEXT NOT NULL,
                    created_at TIMESTAMPTZ NOT NULL
                )"#;
                query(create_enrollments).execute(pool).await?;

                let create_audit = r#"
                CREATE TABLE IF NOT EXISTS audit_records (
                    id UUID PRIMARY KEY,
                    profile_id UUID NOT NULL REFERENCES profiles(account_id),
                    action TEXT NOT NULL,
                    detail TEXT,
                    created_at TIMESTAMPTZ NOT NULL
                )"#;
                query(create_audit).execute(pool).await?;

                let create_subscriptions = r#"
                CREATE TABLE IF NOT EXISTS subscription_records (
                    profile_id UUID PRIMARY KEY REFERENCES profiles(account_id),
                    subscription_id TEXT NOT NULL,
                    customer_id TEXT NOT NULL,
                    status TEXT NOT NULL,
                    current_period_end TIMESTAMPTZ
                )"#;
                query(create_subscriptions).execute(pool).await?;
            }
        }

        Ok(())
    }

    /// Close the underlying connection pool.
    pub async fn close(&self) {
        match self {
            Store::Postgres(pool) => pool.close().await,
            Store::Sqlite(pool) => pool.close().await,
        }
    }

    /// Insert an account profile.
    pub async fn insert_profile(&self, profile: &Profile) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO profiles (account_id, email, display_name, billing_customer_id, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#;
                query(stmt)
                    .bind(profile.account_id.to_string())
                    .bind(&profile.email)
                    .bind(&profile.display_name)
                    .bind(&profile.billing_customer_id)
                    .bind(profile.created_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO profiles (account_id, email, display_name, billing_customer_id, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#;
                query(stmt)
                    .bind(profile.account_id)
                    .bind(&profile.email)
                    .bind(&profile.display_name)
                    .bind(&profile.billing_customer_id)
                    .bind(profile.created_at)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Insert a hosted session.
    pub async fn insert_hosted_session(&self, session: &HostedSession) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO hosted_sessions (id, host_id, title, starts_at, status)
                VALUES (?, ?, ?, ?, ?)
                "#;
                query(stmt)
                    .bind(session.id.to_string())
                    .bind(session.host_id.to_string())
                    .bind(&session.title)
                    .bind(session.starts_at.to_rfc3339())
                    .bind(session.status.as_str())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO hosted_sessions (id, host_id, title, starts_at, status)
                VALUES ($1, $2, $3, $4, $5)
                "#;
                query(stmt)
                    .bind(session.id)
                    .bind(session.host_id)
                    .bind(&session.title)
                    .bind(session.starts_at)
                    .bind(session.status.as_str())
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Insert an enrollment.
    pub async fn insert_enrollment(&self, enrollment: &Enrollment) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO enrollments (id, session_id, profile_id, status, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#;
                query(stmt)
                    .bind(enrollment.id.to_string())
                    .bind(enrollment.session_id.to_string())
                    .bind(enrollment.profile_id.to_string())
                    .bind(enrollment.status.as_str())
                    .bind(enrollment.created_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO enrollments (id, session_id, profile_id, status, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#;
                query(stmt)
                    .bind(enrollment.id)
                    .bind(enrollment.session_id)
                    .bind(enrollment.profile_id)
                    .bind(enrollment.status.as_str())
                    .bind(enrollment.created_at)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Insert an audit record.
    pub async fn insert_audit_record(&self, record: &AuditRecord) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO audit_records (id, profile_id, action, detail, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#;
                query(stmt)
                    .bind(record.id.to_string())
                    .bind(record.profile_id.to_string())
                    .bind(&record.action)
                    .bind(&record.detail)
                    .bind(record.created_at.to_rfc3339())
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO audit_records (id, profile_id, action, detail, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#;
                query(stmt)
                    .bind(record.id)
                    .bind(record.profile_id)
                    .bind(&record.action)
                    .bind(&record.detail)
                    .bind(record.created_at)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Insert or update the subscription mirror row for a profile.
    pub async fn upsert_subscription_record(
        &self,
        record: &SubscriptionRecord,
    ) -> Result<(), sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                INSERT INTO subscription_records (profile_id, subscription_id, customer_id, status, current_period_end)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (profile_id) DO UPDATE SET
                    subscription_id = excluded.subscription_id,
                    customer_id = excluded.customer_id,
                    status = excluded.status,
                    current_period_end = excluded.current_period_end
                "#;
                query(stmt)
                    .bind(record.profile_id.to_string())
                    .bind(&record.subscription_id)
                    .bind(&record.customer_id)
                    .bind(&record.status)
                    .bind(record.current_period_end.map(|t| t.to_rfc3339()))
                    .execute(pool)
                    .await?;
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                INSERT INTO subscription_records (profile_id, subscription_id, customer_id, status, current_period_end)
                VALUES ($1, $2, $3, $4, $5)
                ON CONFLICT (profile_id) DO UPDATE SET
                    subscription_id = excluded.subscription_id,
                    customer_id = excluded.customer_id,
                    status = excluded.status,
                    current_period_end = excluded.current_period_end
                "#;
                query(stmt)
                    .bind(record.profile_id)
                    .bind(&record.subscription_id)
                    .bind(&record.customer_id)
                    .bind(&record.status)
                    .bind(record.current_period_end)
                    .execute(pool)
                    .await?;
            }
        }
        Ok(())
    }

    /// Fetch a profile by account id.
    pub async fn get_profile(&self, account_id: Uuid) -> Result<Option<Profile>, sqlx::Error> {
        let stmt_sqlite = r#"
        SELECT account_id, email, display_name, billing_customer_id, created_at
        FROM profiles WHERE account_id = ?
        "#;
        let stmt_pg = r#"
        SELECT account_id, email, display_name, billing_customer_id, created_at
        FROM profiles WHERE account_id = $1
        "#;
        match self {
            Store::Sqlite(pool) => {
                let row = query(stmt_sqlite)
                    .bind(account_id.to_string())
                    .fetch_optional(pool)
                    .await?;
                row.map(|r| Self::profile_from_sqlite_row(&r)).transpose()
            }
            Store::Postgres(pool) => {
                let row = query(stmt_pg).bind(account_id).fetch_optional(pool).await?;
                Ok(row.map(|r| Profile {
                    account_id: r.get("account_id"),
                    email: r.get("email"),
                    display_name: r.get("display_name"),
                    billing_customer_id: r.get("billing_customer_id"),
                    created_at: r.get("created_at"),
                }))
            }
        }
    }

    /// Read the subscription mirror row for an account, if any.
    pub async fn subscription_snapshot(
        &self,
        account_id: Uuid,
    ) -> Result<Option<SubscriptionSnapshot>, sqlx::Error> {
        let stmt_sqlite = r#"
        SELECT subscription_id, customer_id, status, current_period_end
        FROM subscription_records WHERE profile_id = ?
        "#;
        let stmt_pg = r#"
        SELECT subscription_id, customer_id, status, current_period_end
        FROM subscription_records WHERE profile_id = $1
        "#;
        match self {
            Store::Sqlite(pool) => {
                let row = query(stmt_sqlite)
                    .bind(account_id.to_string())
                    .fetch_optional(pool)
                    .await?;
                row.map(|r| Self::snapshot_from_sqlite_row(&r)).transpose()
            }
            Store::Postgres(pool) => {
                let row = query(stmt_pg).bind(account_id).fetch_optional(pool).await?;
                Ok(row.map(|r| Self::snapshot_from_pg_row(&r)))
            }
        }
    }

    /// Count upcoming sessions hosted by this account that are in a blocking
    /// status and still have at least one committed enrollment.
    pub async fn blocking_session_count(
        &self,
        host_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<u64, sqlx::Error> {
        match self {
            Store::Sqlite(pool) => {
                let stmt = r#"
                SELECT COUNT(*) AS cnt
                FROM hosted_sessions s
                WHERE s.host_id = ?
                  AND s.status IN ('published', 'active')
                  AND s.starts_at > ?
                  AND EXISTS (
                      SELECT 1 FROM enrollments e
                      WHERE e.session_id = s.id AND e.status IN ('confirmed', 'paid')
                  )
                "#;
                let row = query(stmt)
                    .bind(host_id.to_string())
                    .bind(now.to_rfc3339())
                    .fetch_one(pool)
                    .await?;
                let count: i64 = row.get("cnt");
                Ok(count as u64)
            }
            Store::Postgres(pool) => {
                let stmt = r#"
                SELECT COUNT(*) AS cnt
                FROM hosted_sessions s
                WHERE s.host_id = $1
                  AND s.status IN ('published', 'active')
                  AND s.starts_at > $2
                  AND EXISTS (
                      SELECT 1 FROM enrollments e
                      WHERE e.session_id = s.id AND e.status IN ('confirmed', 'paid')
                  )
                "#;
                let row = query(stmt).bind(host_id).bind(now).fetch_one(pool).await?;
                let count: i64 = row.get("cnt");
                Ok(count as u64)
            }
        }
    }

    /// Delete all audit records for an account. Returns rows deleted.
    pub async fn delete_audit_records(&self, account_id: Uuid) -> Result<u64, sqlx::Error> {
        let stmt_sqlite = "DELETE FROM audit_records WHERE profile_id = ?";
        let stmt_pg = "DELETE FROM audit_records WHERE profile_id = $1";
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()),
        }
    }

    /// Delete the account's own enrollments in anyone's sessions.
    pub async fn delete_attendee_enrollments(&self, account_id: Uuid) -> Result<u64, sqlx::Error> {
        let stmt_sqlite = "DELETE FROM enrollments WHERE profile_id = ?";
        let stmt_pg = "DELETE FROM enrollments WHERE profile_id = $1";
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()),
        }
    }

    /// Delete other attendees' enrollments in sessions hosted by this
    /// account. Must run before the sessions themselves are deleted.
    pub async fn delete_hosted_session_enrollments(
        &self,
        account_id: Uuid,
    ) -> Result<u64, sqlx::Error> {
        let stmt_sqlite = r#"
        DELETE FROM enrollments
        WHERE session_id IN (SELECT id FROM hosted_sessions WHERE host_id = ?)
        "#;
        let stmt_pg = r#"
        DELETE FROM enrollments
        WHERE session_id IN (SELECT id FROM hosted_sessions WHERE host_id = $1)
        "#;
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()),
        }
    }

    /// Delete all sessions hosted by this account.
    pub async fn delete_hosted_sessions(&self, account_id: Uuid) -> Result<u64, sqlx::Error> {
        let stmt_sqlite = "DELETE FROM hosted_sessions WHERE host_id = ?";
        let stmt_pg = "DELETE FROM hosted_sessions WHERE host_id = $1";
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()),
        }
    }

    /// Delete the subscription mirror row.
    pub async fn delete_subscription_record(&self, account_id: Uuid) -> Result<u64, sqlx::Error> {
        let stmt_sqlite = "DELETE FROM subscription_records WHERE profile_id = ?";
        let stmt_pg = "DELETE FROM subscription_records WHERE profile_id = $1";
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()),
        }
    }

    /// Delete the profile row itself. Fails on live foreign keys, so every
    /// child table must be emptied for this account first.
    pub async fn delete_profile(&self, account_id: Uuid) -> Result<bool, sqlx::Error> {
        let stmt_sqlite = "DELETE FROM profiles WHERE account_id = ?";
        let stmt_pg = "DELETE FROM profiles WHERE account_id = $1";
        match self {
            Store::Sqlite(pool) => Ok(query(stmt_sqlite)
                .bind(account_id.to_string())
                .execute(pool)
                .await?
                .rows_affected()
                > 0),
            Store::Postgres(pool) => Ok(query(stmt_pg)
                .bind(account_id)
                .execute(pool)
                .await?
                .rows_affected()
                > 0),
        }
    }

    /// Remove every row belonging to an account in one transaction: audit
    /// records, enrollments (own, then those on hosted sessions), hosted
    /// sessions, the subscription mirror, and finally the profile. The
    /// subscription snapshot is captured inside the transaction before its
    /// row is deleted.
    ///
    /// An account with no remaining rows purges successfully with zero
    /// counts, which is what makes retries of the deletion flow idempotent.
    pub async fn purge_account(&self, account_id: Uuid) -> Result<PurgeReport, PurgeError> {
        match self {
            Store::Sqlite(pool) => {
                let mut tx = pool.begin().await.map_err(PurgeError::NotStarted)?;
                match Self::purge_sqlite_steps(&mut tx, account_id).await {
                    Ok(report) => {
                        tx.commit().await.map_err(PurgeError::Aborted)?;
                        Ok(report)
                    }
                    Err(e) => {
                        // Roll back explicitly so the statement error, not a
                        // drop-time rollback error, is what surfaces.
                        let _ = tx.rollback().await;
                        Err(PurgeError::Aborted(e))
                    }
                }
            }
            Store::Postgres(pool) => {
                let mut tx = pool.begin().await.map_err(PurgeError::NotStarted)?;
                match Self::purge_pg_steps(&mut tx, account_id).await {
                    Ok(report) => {
                        tx.commit().await.map_err(PurgeError::Aborted)?;
                        Ok(report)
                    }
                    Err(e) => {
                        let _ = tx.rollback().await;
                        Err(PurgeError::Aborted(e))
                    }
                }
            }
        }
    }

    async fn purge_sqlite_steps(
        tx: &mut Transaction<'_, Sqlite>,
        account_id: Uuid,
    ) -> Result<PurgeReport, sqlx::Error> {
        let id = account_id.to_string();
        let mut report = PurgeReport::default();

        let snapshot_stmt = r#"
        SELECT subscription_id, customer_id, status, current_period_end
        FROM subscription_records WHERE profile_id = ?
        "#;
        if let Some(row) = query(snapshot_stmt).bind(&id).fetch_optional(&mut **tx).await? {
            report.subscription = Some(Self::snapshot_from_sqlite_row(&row)?);
        }

        report.audit_records = query("DELETE FROM audit_records WHERE profile_id = ?")
            .bind(&id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.enrollments = query("DELETE FROM enrollments WHERE profile_id = ?")
            .bind(&id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.enrollments += query(
            "DELETE FROM enrollments WHERE session_id IN (SELECT id FROM hosted_sessions WHERE host_id = ?)",
        )
        .bind(&id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        report.sessions = query("DELETE FROM hosted_sessions WHERE host_id = ?")
            .bind(&id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.subscription_rows = query("DELETE FROM subscription_records WHERE profile_id = ?")
            .bind(&id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.profile_deleted = query("DELETE FROM profiles WHERE account_id = ?")
            .bind(&id)
            .execute(&mut **tx)
            .await?
            .rows_affected()
            > 0;

        Ok(report)
    }

    async fn purge_pg_steps(
        tx: &mut Transaction<'_, Postgres>,
        account_id: Uuid,
    ) -> Result<PurgeReport, sqlx::Error> {
        let mut report = PurgeReport::default();

        let snapshot_stmt = r#"
        SELECT subscription_id, customer_id, status, current_period_end
        FROM subscription_records WHERE profile_id = $1
        "#;
        if let Some(row) = query(snapshot_stmt)
            .bind(account_id)
            .fetch_optional(&mut **tx)
            .await?
        {
            report.subscription = Some(Self::snapshot_from_pg_row(&row));
        }

        report.audit_records = query("DELETE FROM audit_records WHERE profile_id = $1")
            .bind(account_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.enrollments = query("DELETE FROM enrollments WHERE profile_id = $1")
            .bind(account_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.enrollments += query(
            "DELETE FROM enrollments WHERE session_id IN (SELECT id FROM hosted_sessions WHERE host_id = $1)",
        )
        .bind(account_id)
        .execute(&mut **tx)
        .await?
        .rows_affected();
        report.sessions = query("DELETE FROM hosted_sessions WHERE host_id = $1")
            .bind(account_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.subscription_rows = query("DELETE FROM subscription_records WHERE profile_id = $1")
            .bind(account_id)
            .execute(&mut **tx)
            .await?
            .rows_affected();
        report.profile_deleted = query("DELETE FROM profiles WHERE account_id = $1")
            .bind(account_id)
            .execute(&mut **tx)
            .await?
            .rows_affected()
            > 0;

        Ok(report)
    }

    fn profile_from_sqlite_row(row: &SqliteRow) -> Result<Profile, sqlx::Error> {
        let id_str: String = row.get("account_id");
        let created_str: String = row.get("created_at");

        let account_id = Uuid::parse_str(&id_str)
            .map_err(|_| sqlx::Error::Decode("Invalid UUID format".into()))?;
        let created_at = DateTime::parse_from_rfc3339(&created_str)
            .map_err(|_| sqlx::Error::Decode("Invalid timestamp format".into()))?
            .with_timezone(&Utc);

        Ok(Profile {
            account_id,
            email: row.get("email"),
            display_name: row.get("display_name"),
            billing_customer_id: row.get("billing_customer_id"),
            created_at,
        })
    }

    fn snapshot_from_sqlite_row(row: &SqliteRow) -> Result<SubscriptionSnapshot, sqlx::Error> {
        let period_end: Option<String> = row.get("current_period_end");
        let current_period_end = period_end
            .map(|s| {
                DateTime::parse_from_rfc3339(&s)
                    .map(|t| t.with_timezone(&Utc))
                    .map_err(|_| sqlx::Error::Decode("Invalid timestamp format".into()))
            })
            .transpose()?;

        Ok(SubscriptionSnapshot {
            subscription_id: row.get("subscription_id"),
            customer_id: row.get("customer_id"),
            status: row.get("status"),
            current_period_end,
        })
    }

    fn snapshot_from_pg_row(row: &PgRow) -> SubscriptionSnapshot {
        SubscriptionSnapshot {
            subscription_id: row.get("subscription_id"),
            customer_id: row.get("customer_id"),
            status: row.get("status"),
            current_period_end: row.get("current_period_end"),
        }
    }
}
