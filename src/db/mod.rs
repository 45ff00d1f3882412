use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::error::{AppError, AppResult};
use crate::models::{NewProduct, Product};

#[cfg(test)]
pub mod memory;

const RETRY_INITIAL_DELAY: Duration = Duration::from_secs(1);
const RETRY_MAX_DELAY: Duration = Duration::from_secs(30);

/// Persistence operations the HTTP handlers need.
#[async_trait]
pub trait ProductStore: Send + Sync {
    /// All products in insertion order.
    async fn list(&self) -> AppResult<Vec<Product>>;

    async fn get(&self, id: Uuid) -> AppResult<Option<Product>>;

    async fn insert(&self, product: &NewProduct) -> AppResult<Product>;
}

// ── Pool lifecycle ────────────────────────────────────────────────────────────

/// Builds the pool without connecting. Only a malformed URL fails here.
pub fn connect_lazy(database_url: &str, max_connections: u32) -> anyhow::Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(max_connections)
        .acquire_timeout(Duration::from_secs(5))
        .connect_lazy(database_url)?;
    Ok(pool)
}

/// Opens the first connection and applies pending migrations.
pub async fn initialise(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Runs `attempt` until it succeeds, doubling the pause between failures up to
/// `max_delay`. Returns the number of attempts made.
pub async fn retry_with_backoff<F, Fut>(
    mut attempt: F,
    initial_delay: Duration,
    max_delay: Duration,
) -> u32
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<()>>,
{
    let mut delay = initial_delay;
    let mut attempts = 0;

    loop {
        attempts += 1;
        match attempt().await {
            Ok(()) => return attempts,
            Err(e) => {
                error!(
                    error = %e,
                    attempt = attempts,
                    retry_in_ms = delay.as_millis(),
                    "PostgreSQL connection error"
                );
                tokio::time::sleep(delay).await;
                delay = (delay * 2).min(max_delay);
            }
        }
    }
}

/// Runs [`initialise`] in the background until it succeeds. Requests made
/// before then fail individually; the server keeps listening.
pub fn spawn_initialise(pool: PgPool) {
    tokio::spawn(async move {
        info!("Connecting to PostgreSQL and running migrations...");
        let attempts = retry_with_backoff(
            || {
                let pool = pool.clone();
                async move { initialise(&pool).await }
            },
            RETRY_INITIAL_DELAY,
            RETRY_MAX_DELAY,
        )
        .await;
        info!(attempts, "Connected to PostgreSQL, migrations complete.");
    });
}

/// Picks the store for this process. A missing or malformed connection string
/// is logged and yields an [`UnavailableStore`] so the server still starts.
pub fn store_from_config(config: &Config) -> Arc<dyn ProductStore> {
    let Some(database_url) = config.database_url.as_deref() else {
        error!("DATABASE_URL is not set; product endpoints will fail");
        return Arc::new(UnavailableStore::new("DATABASE_URL is not set"));
    };

    match connect_lazy(database_url, config.max_connections) {
        Ok(pool) => {
            spawn_initialise(pool.clone());
            Arc::new(PgProductStore::new(pool))
        }
        Err(e) => {
            error!(error = %e, "Invalid DATABASE_URL; product endpoints will fail");
            Arc::new(UnavailableStore::new(format!("invalid DATABASE_URL: {}", e)))
        }
    }
}

// ── Unavailable store ─────────────────────────────────────────────────────────

/// Stands in when no pool could be built. Every call fails with `reason`.
pub struct UnavailableStore {
    reason: String,
}

impl UnavailableStore {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self) -> AppResult<T> {
        warn!(reason = %self.reason, "Store unavailable");
        Err(AppError::Internal(self.reason.clone()))
    }
}

#[async_trait]
impl ProductStore for UnavailableStore {
    async fn list(&self) -> AppResult<Vec<Product>> {
        self.fail()
    }

    async fn get(&self, _id: Uuid) -> AppResult<Option<Product>> {
        self.fail()
    }

    async fn insert(&self, _product: &NewProduct) -> AppResult<Product> {
        self.fail()
    }
}

// ── Postgres store ────────────────────────────────────────────────────────────

#[derive(Clone)]
pub struct PgProductStore {
    pool: PgPool,
}

impl PgProductStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProductStore for PgProductStore {
    async fn list(&self) -> AppResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, inventory, created_at
             FROM products ORDER BY seq ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    async fn get(&self, id: Uuid) -> AppResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            "SELECT id, name, price, inventory, created_at
             FROM products WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    async fn insert(&self, product: &NewProduct) -> AppResult<Product> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            INSERT INTO products (name, price, inventory, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING id, name, price, inventory, created_at
            "#,
        )
        .bind(&product.name)
        .bind(product.price)
        .bind(product.inventory)
        .bind(product.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(product)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use chrono::{DurationRound, Utc};

    use super::*;

    fn config(url: Option<&str>) -> Config {
        Config {
            database_url: url.map(str::to_string),
            host: "0.0.0.0".to_string(),
            port: 5001,
            max_connections: 2,
        }
    }

    #[tokio::test]
    async fn lazy_pool_does_not_connect() {
        // Nothing listens on port 1; building the pool must still succeed.
        let pool = connect_lazy("postgres://postgres@127.0.0.1:1/products", 2).unwrap();
        assert_eq!(pool.size(), 0);
    }

    #[tokio::test]
    async fn malformed_url_is_rejected() {
        assert!(connect_lazy("not a url", 2).is_err());
    }

    #[tokio::test]
    async fn retry_runs_again_after_failure() {
        let calls = Arc::new(AtomicU32::new(0));

        let attempts = retry_with_backoff(
            || {
                let calls = calls.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        anyhow::bail!("connection refused");
                    }
                    Ok(())
                }
            },
            Duration::from_millis(1),
            Duration::from_millis(2),
        )
        .await;

        assert_eq!(attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn retry_stops_on_first_success() {
        let attempts = retry_with_backoff(
            || async { Ok(()) },
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(attempts, 1);
    }

    #[tokio::test]
    async fn missing_url_yields_unavailable_store() {
        let store = store_from_config(&config(None));
        let err = store.list().await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref m) if m.contains("DATABASE_URL")));
    }

    #[tokio::test]
    async fn malformed_url_yields_unavailable_store() {
        let store = store_from_config(&config(Some("not a url")));
        let err = store.get(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, AppError::Internal(ref m) if m.contains("invalid DATABASE_URL")));
    }

    /// Runs against a real database only when `DATABASE_URL` is set.
    #[tokio::test]
    async fn pg_store_round_trips_in_insertion_order() {
        let Ok(url) = std::env::var("DATABASE_URL") else {
            return;
        };
        let pool = connect_lazy(&url, 2).unwrap();
        initialise(&pool).await.unwrap();
        let store = PgProductStore::new(pool);

        // Postgres keeps microseconds; truncate so the round trip compares equal.
        let created_at = Utc::now()
            .duration_trunc(chrono::Duration::microseconds(1))
            .unwrap();
        let mut inserted = Vec::new();
        for (name, inventory) in [("Zebra Mug", 2.5), ("Apple Crate", 0.0), ("Mango Box", 7.0)] {
            let product = store
                .insert(&NewProduct {
                    name: name.to_string(),
                    price: 3.25,
                    inventory,
                    created_at,
                })
                .await
                .unwrap();
            assert_eq!(product.name, name);
            assert_eq!(product.inventory, inventory);
            assert_eq!(product.created_at, created_at);
            inserted.push(product);
        }

        let ours: Vec<Product> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .filter(|p| inserted.iter().any(|i| i.id == p.id))
            .collect();
        assert_eq!(ours, inserted);

        let fetched = store.get(inserted[1].id).await.unwrap();
        assert_eq!(fetched.as_ref(), Some(&inserted[1]));
        assert_eq!(store.get(Uuid::new_v4()).await.unwrap(), None);
    }
}
