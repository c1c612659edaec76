use anyhow::{Context, Result};
use futures_util::TryStreamExt;
use roster_core::{
    ActivityStore,
    config::DbConfig,
    models::{
        ActivitySnapshot, AggregateSummary, LanguageMap, Member, MemberActivity, MemberRef,
        PullRequestSummary,
    },
};
use sqlx::{
    Pool, Row, Sqlite,
    migrate::MigrateDatabase,
    sqlite::{SqlitePoolOptions, SqliteRow},
};
use time::OffsetDateTime;

#[derive(Clone)]
pub struct Database {
    pub pool: Pool<Sqlite>,
}

const ACTIVITY_COLUMNS: &str = "public_repos, private_repos, followers, following, commits, \
    pull_requests, merged_prs, open_prs, closed_prs, issues, recent_prs, total_stars, \
    total_forks, languages, last_updated";

impl Database {
    pub async fn new(config: &DbConfig) -> Result<Self> {
        let in_memory = config.url.contains(":memory:") || config.url.contains("mode=memory");
        if !in_memory && !Sqlite::database_exists(&config.url).await.unwrap_or(false) {
            tracing::info!(url = %config.url, "Creating database");
            Sqlite::create_database(&config.url).await.context("Failed to create database")?;
            tracing::info!("Database created");
        }
        let mut options = SqlitePoolOptions::new();
        if in_memory {
            // Every connection to an in-memory database gets its own copy
            options = options.max_connections(1).idle_timeout(None).max_lifetime(None);
        }
        let pool = options.connect(&config.url).await.context("Failed to connect to database")?;
        sqlx::migrate!("../../migrations")
            .run(&pool)
            .await
            .context("Failed to run database migrations")?;
        Ok(Self { pool })
    }

    pub async fn close(&self) { self.pool.close().await }

    /// Create or update a member profile. Activity is left untouched.
    pub async fn upsert_member(&self, member: &Member) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO members (id, name, github_login, created_at, updated_at)
            VALUES (?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
            ON CONFLICT (id) DO UPDATE
            SET name = EXCLUDED.name, github_login = EXCLUDED.github_login, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(&member.id)
        .bind(&member.name)
        .bind(member.external_id.as_deref().filter(|s| !s.is_empty()))
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to save member {}", member.id))?;
        Ok(())
    }

    pub async fn get_members(&self) -> Result<Vec<Member>> {
        let mut stream = sqlx::query("SELECT id, name, github_login FROM members ORDER BY id")
            .fetch(&self.pool);
        let mut members = Vec::new();
        while let Some(row) = stream.try_next().await? {
            members.push(Member {
                id: row.try_get("id")?,
                name: row.try_get("name")?,
                external_id: row.try_get("github_login")?,
            });
        }
        Ok(members)
    }
}

impl ActivityStore for Database {
    async fn list_members(&self) -> Result<Vec<MemberRef>> {
        let mut stream =
            sqlx::query("SELECT id, github_login FROM members ORDER BY id").fetch(&self.pool);
        let mut members = Vec::new();
        while let Some(row) = stream.try_next().await? {
            members.push(member_ref_from_row(&row)?);
        }
        Ok(members)
    }

    async fn get_activity(&self, id: &str) -> Result<Option<ActivitySnapshot>> {
        let row = sqlx::query(&format!(
            "SELECT {ACTIVITY_COLUMNS} FROM member_activity WHERE member_id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .with_context(|| format!("Failed to fetch activity for member {id}"))?;
        row.as_ref().map(activity_from_row).transpose()
    }

    async fn merge_activity(&self, id: &str, activity: &ActivitySnapshot) -> Result<()> {
        let recent_prs = serde_json::to_string(&activity.recent_prs)?;
        let languages = serde_json::to_string(&activity.languages)?;
        sqlx::query(&format!(
            r#"
            INSERT INTO member_activity (member_id, {ACTIVITY_COLUMNS})
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (member_id) DO UPDATE
            SET public_repos = EXCLUDED.public_repos,
                private_repos = EXCLUDED.private_repos,
                followers = EXCLUDED.followers,
                following = EXCLUDED.following,
                commits = EXCLUDED.commits,
                pull_requests = EXCLUDED.pull_requests,
                merged_prs = EXCLUDED.merged_prs,
                open_prs = EXCLUDED.open_prs,
                closed_prs = EXCLUDED.closed_prs,
                issues = EXCLUDED.issues,
                recent_prs = EXCLUDED.recent_prs,
                total_stars = EXCLUDED.total_stars,
                total_forks = EXCLUDED.total_forks,
                languages = EXCLUDED.languages,
                last_updated = EXCLUDED.last_updated
            "#
        ))
        .bind(id)
        .bind(to_db(activity.public_repos))
        .bind(to_db(activity.private_repos))
        .bind(to_db(activity.followers))
        .bind(to_db(activity.following))
        .bind(to_db(activity.commits))
        .bind(to_db(activity.pull_requests))
        .bind(to_db(activity.merged_prs))
        .bind(to_db(activity.open_prs))
        .bind(to_db(activity.closed_prs))
        .bind(to_db(activity.issues))
        .bind(recent_prs)
        .bind(to_db(activity.total_stars))
        .bind(to_db(activity.total_forks))
        .bind(languages)
        .bind(activity.last_updated)
        .execute(&self.pool)
        .await
        .with_context(|| format!("Failed to update activity for member {id}"))?;
        Ok(())
    }

    async fn list_member_activity(&self) -> Result<Vec<MemberActivity>> {
        let columns = ACTIVITY_COLUMNS
            .split(", ")
            .map(|c| format!("a.{c} AS {c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            r#"
            SELECT m.id AS id, m.github_login AS github_login, a.member_id AS member_id, {columns}
            FROM members m LEFT JOIN member_activity a ON a.member_id = m.id
            ORDER BY m.id
            "#
        );
        let mut stream = sqlx::query(&query).fetch(&self.pool);
        let mut result = Vec::new();
        while let Some(row) = stream.try_next().await? {
            let member = member_ref_from_row(&row)?;
            let has_activity = row.try_get::<Option<String>, _>("member_id")?.is_some();
            let activity =
                if has_activity { activity_from_row(&row)? } else { ActivitySnapshot::default() };
            result.push(MemberActivity { member, activity });
        }
        Ok(result)
    }

    async fn get_summary(&self, key: &str) -> Result<Option<AggregateSummary>> {
        let Some(data) = sqlx::query_scalar::<_, String>("SELECT data FROM summaries WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .with_context(|| format!("Failed to fetch summary {key}"))?
        else {
            return Ok(None);
        };
        // An undecodable row reads as absent and is replaced by the next upsert
        match serde_json::from_str(&data) {
            Ok(summary) => Ok(Some(summary)),
            Err(e) => {
                tracing::warn!("Ignoring malformed summary {}: {}", key, e);
                Ok(None)
            }
        }
    }

    async fn upsert_summary(&self, key: &str, summary: &AggregateSummary) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let existing = sqlx::query_scalar::<_, String>("SELECT data FROM summaries WHERE key = ?")
            .bind(key)
            .fetch_optional(&mut *tx)
            .await?;
        let mut data = match existing.as_deref().map(serde_json::from_str::<serde_json::Value>) {
            Some(Ok(value)) if value.is_object() => value,
            Some(_) => {
                tracing::warn!("Replacing malformed summary {}", key);
                serde_json::Value::Object(Default::default())
            }
            None => serde_json::Value::Object(Default::default()),
        };
        merge_json(&mut data, serde_json::to_value(summary)?);
        sqlx::query(
            r#"
            INSERT INTO summaries (key, data, updated_at)
            VALUES (?, ?, CURRENT_TIMESTAMP)
            ON CONFLICT (key) DO UPDATE
            SET data = EXCLUDED.data, updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(key)
        .bind(serde_json::to_string(&data)?)
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to save summary {key}"))?;
        tx.commit().await?;
        Ok(())
    }
}

/// Shallow field-level merge of `patch` into `target`.
fn merge_json(target: &mut serde_json::Value, patch: serde_json::Value) {
    match (target, patch) {
        (serde_json::Value::Object(target), serde_json::Value::Object(patch)) => {
            target.extend(patch);
        }
        (target, patch) => *target = patch,
    }
}

fn member_ref_from_row(row: &SqliteRow) -> Result<MemberRef> {
    let login: Option<String> = row.try_get("github_login")?;
    let external_id = login.unwrap_or_default();
    Ok(MemberRef { id: row.try_get("id")?, connected: !external_id.is_empty(), external_id })
}

fn activity_from_row(row: &SqliteRow) -> Result<ActivitySnapshot> {
    let count = |column: &str| -> Result<u64> {
        Ok(from_db(row.try_get::<Option<i64>, _>(column)?.unwrap_or_default()))
    };
    let recent_prs: Option<String> = row.try_get("recent_prs")?;
    let recent_prs = match recent_prs.as_deref() {
        Some(data) => serde_json::from_str::<Vec<PullRequestSummary>>(data)
            .context("Failed to decode recent pull requests")?,
        None => Vec::new(),
    };
    let languages: Option<String> = row.try_get("languages")?;
    let languages = match languages.as_deref() {
        Some(data) => {
            serde_json::from_str::<LanguageMap>(data).context("Failed to decode languages")?
        }
        None => LanguageMap::new(),
    };
    Ok(ActivitySnapshot {
        public_repos: count("public_repos")?,
        private_repos: count("private_repos")?,
        followers: count("followers")?,
        following: count("following")?,
        commits: count("commits")?,
        pull_requests: count("pull_requests")?,
        merged_prs: count("merged_prs")?,
        open_prs: count("open_prs")?,
        closed_prs: count("closed_prs")?,
        issues: count("issues")?,
        recent_prs,
        total_stars: count("total_stars")?,
        total_forks: count("total_forks")?,
        languages,
        last_updated: row.try_get::<Option<OffsetDateTime>, _>("last_updated")?,
    })
}

// SQLite integers are signed
fn to_db(value: u64) -> i64 { i64::try_from(value).unwrap_or(i64::MAX) }

fn from_db(value: i64) -> u64 { u64::try_from(value).unwrap_or(0) }
