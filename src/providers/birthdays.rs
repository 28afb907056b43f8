use std::path::PathBuf;

use anyhow::{Context, Result};
use sqlx::postgres::PgConnectOptions;
use sqlx::sqlite::SqliteConnectOptions;
use sqlx::{Connection, PgConnection, SqliteConnection};

use super::{FireContext, Provider, Section};
use crate::config::{BirthdayBackend, BirthdaysConfig};

const HEADER: &str = "День рождения у 🎂: \n";

/// A table of `(date "DD-MM", name)` records.
#[async_trait::async_trait]
pub trait BirthdayStore: Send + Sync {
    async fn names_on(&self, date: &str) -> Result<Vec<String>>;
}

pub struct PgBirthdayStore {
    options: PgConnectOptions,
}

impl PgBirthdayStore {
    pub fn new(config: &BirthdaysConfig) -> Result<Self> {
        let host = config
            .host
            .as_deref()
            .context("Postgres host is not configured")?;
        let database = config
            .database
            .as_deref()
            .context("Postgres database is not configured")?;

        let mut options = PgConnectOptions::new()
            .host(host)
            .port(config.port)
            .database(database);
        if let Some(user) = &config.user {
            options = options.username(user);
        }
        if let Some(password) = &config.password {
            options = options.password(password);
        }
        Ok(Self { options })
    }
}

#[async_trait::async_trait]
impl BirthdayStore for PgBirthdayStore {
    async fn names_on(&self, date: &str) -> Result<Vec<String>> {
        let mut conn = PgConnection::connect_with(&self.options)
            .await
            .context("Failed to connect to Postgres")?;
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM birthdays WHERE date = $1")
            .bind(date)
            .fetch_all(&mut conn)
            .await
            .context("Failed to query birthdays")?;
        conn.close().await.ok();
        Ok(names)
    }
}

/// Birthdays kept in a local SQLite file.
pub struct SqliteBirthdayStore {
    path: PathBuf,
}

impl SqliteBirthdayStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait::async_trait]
impl BirthdayStore for SqliteBirthdayStore {
    async fn names_on(&self, date: &str) -> Result<Vec<String>> {
        let options = SqliteConnectOptions::new()
            .filename(&self.path)
            .read_only(true);
        let mut conn = SqliteConnection::connect_with(&options)
            .await
            .with_context(|| format!("Failed to open {}", self.path.display()))?;
        let names = sqlx::query_scalar::<_, String>("SELECT name FROM birthdays WHERE date = ?")
            .bind(date)
            .fetch_all(&mut conn)
            .await
            .context("Failed to query birthdays")?;
        conn.close().await.ok();
        Ok(names)
    }
}

pub fn open_store(config: &BirthdaysConfig) -> Result<Box<dyn BirthdayStore>> {
    match config.backend {
        BirthdayBackend::Postgres => Ok(Box::new(PgBirthdayStore::new(config)?)),
        BirthdayBackend::Sqlite => {
            let path = config
                .path
                .clone()
                .context("SQLite path is not configured")?;
            Ok(Box::new(SqliteBirthdayStore::new(path)))
        }
    }
}

pub struct BirthdaysProvider {
    store: Box<dyn BirthdayStore>,
}

impl BirthdaysProvider {
    pub fn new(store: Box<dyn BirthdayStore>) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Provider for BirthdaysProvider {
    fn name(&self) -> &str {
        "birthdays"
    }

    fn section(&self) -> Section {
        Section::Birthdays
    }

    async fn fetch(&self, ctx: &FireContext) -> Result<String> {
        let date = ctx.today().format("%d-%m").to_string();
        let names = self.store.names_on(&date).await?;
        tracing::info!("Found {} birthdays for {date}", names.len());
        Ok(format_birthdays(&names))
    }
}

fn format_birthdays(names: &[String]) -> String {
    if names.is_empty() {
        return String::new();
    }
    format!("{HEADER}{}", names.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::collect;
    use crate::providers::tests::ctx;
    use std::sync::{Arc, Mutex};

    struct MemoryStore {
        rows: Vec<(&'static str, &'static str)>,
        queried: Arc<Mutex<Vec<String>>>,
    }

    #[async_trait::async_trait]
    impl BirthdayStore for MemoryStore {
        async fn names_on(&self, date: &str) -> Result<Vec<String>> {
            self.queried.lock().unwrap().push(date.to_string());
            Ok(self
                .rows
                .iter()
                .filter(|(d, _)| *d == date)
                .map(|(_, n)| n.to_string())
                .collect())
        }
    }

    struct BrokenStore;

    #[async_trait::async_trait]
    impl BirthdayStore for BrokenStore {
        async fn names_on(&self, _date: &str) -> Result<Vec<String>> {
            anyhow::bail!("DB error")
        }
    }

    fn memory(rows: Vec<(&'static str, &'static str)>) -> MemoryStore {
        MemoryStore {
            rows,
            queried: Arc::new(Mutex::new(Vec::new())),
        }
    }

    #[tokio::test]
    async fn test_formats_todays_birthdays() {
        let provider = BirthdaysProvider::new(Box::new(memory(vec![
            ("01-01", "John"),
            ("02-01", "Nobody"),
            ("01-01", "Jane"),
        ])));
        let text = provider.fetch(&ctx(1, 1)).await.unwrap();
        assert_eq!(text, "День рождения у 🎂: \nJohn\nJane");
    }

    #[tokio::test]
    async fn test_queries_zero_padded_date() {
        let queried = Arc::new(Mutex::new(Vec::new()));
        let store = MemoryStore {
            rows: vec![("05-03", "March")],
            queried: queried.clone(),
        };
        let provider = BirthdaysProvider::new(Box::new(store));
        let text = provider.fetch(&ctx(5, 3)).await.unwrap();
        assert_eq!(text, "День рождения у 🎂: \nMarch");
        assert_eq!(queried.lock().unwrap().as_slice(), ["05-03"]);
    }

    #[tokio::test]
    async fn test_no_birthdays_is_empty_string() {
        let provider = BirthdaysProvider::new(Box::new(memory(vec![])));
        assert_eq!(provider.fetch(&ctx(1, 1)).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_store_error_becomes_absent() {
        let providers: Vec<Box<dyn Provider>> =
            vec![Box::new(BirthdaysProvider::new(Box::new(BrokenStore)))];
        let facts = collect(&providers, &ctx(1, 1)).await;
        assert!(facts[0].content.is_none());
        assert!(!facts[0].is_critical);
    }

    #[tokio::test]
    async fn test_sqlite_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birthdays.db");

        let options = SqliteConnectOptions::new()
            .filename(&path)
            .create_if_missing(true);
        let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
        sqlx::query("CREATE TABLE birthdays (date TEXT NOT NULL, name TEXT NOT NULL)")
            .execute(&mut conn)
            .await
            .unwrap();
        for (date, name) in [("01-01", "John"), ("01-01", "Jane"), ("14-02", "Val")] {
            sqlx::query("INSERT INTO birthdays (date, name) VALUES (?, ?)")
                .bind(date)
                .bind(name)
                .execute(&mut conn)
                .await
                .unwrap();
        }
        conn.close().await.unwrap();

        let provider = BirthdaysProvider::new(Box::new(SqliteBirthdayStore::new(&path)));
        assert_eq!(
            provider.fetch(&ctx(1, 1)).await.unwrap(),
            "День рождения у 🎂: \nJohn\nJane"
        );
        assert_eq!(provider.fetch(&ctx(2, 1)).await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_missing_sqlite_file_becomes_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteBirthdayStore::new(dir.path().join("absent.db"));
        let providers: Vec<Box<dyn Provider>> = vec![Box::new(BirthdaysProvider::new(Box::new(store)))];
        let facts = collect(&providers, &ctx(1, 1)).await;
        assert!(facts[0].content.is_none());
    }

    #[tokio::test]
    async fn test_postgres_connect_failure_becomes_absent() {
        let config = BirthdaysConfig {
            host: Some("127.0.0.1".into()),
            port: 1,
            database: Some("bot".into()),
            ..BirthdaysConfig::default()
        };
        let store = PgBirthdayStore::new(&config).unwrap();
        let providers: Vec<Box<dyn Provider>> = vec![Box::new(BirthdaysProvider::new(Box::new(store)))];
        let facts = collect(&providers, &ctx(1, 1)).await;
        assert!(facts[0].content.is_none());
    }

    #[test]
    fn test_open_store_requires_settings() {
        let config = BirthdaysConfig {
            backend: BirthdayBackend::Sqlite,
            ..BirthdaysConfig::default()
        };
        assert!(open_store(&config).is_err());
        assert!(open_store(&BirthdaysConfig::default()).is_err());
    }
}
