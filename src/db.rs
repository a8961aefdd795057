use std::time::Duration;

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

pub async fn create_pool(database_url: &str) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(30))
        .max_lifetime(Duration::from_secs(1800))
        .test_before_acquire(true)
        .connect(database_url)
        .await
}

pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}

#[cfg(test)]
pub mod testing {
    //! Throwaway Postgres databases for query tests.
    //!
    //! Uses `TEST_DATABASE_URL` when set, otherwise one shared container
    //! started on first use. Every call gets its own freshly migrated
    //! database so tests can run in parallel.

    use std::sync::atomic::{AtomicUsize, Ordering};

    use sqlx::{Executor, PgPool};
    use testcontainers::runners::AsyncRunner;
    use testcontainers::{ContainerAsync, ImageExt};
    use testcontainers_modules::postgres::Postgres;
    use tokio::sync::OnceCell;
    use url::Url;

    struct SharedPostgres {
        admin_url: Url,
        // Keeps the container alive for the whole test run.
        _container: Option<ContainerAsync<Postgres>>,
    }

    static SHARED: OnceCell<SharedPostgres> = OnceCell::const_new();
    static NEXT_DATABASE: AtomicUsize = AtomicUsize::new(0);

    async fn shared() -> &'static SharedPostgres {
        SHARED
            .get_or_init(|| async {
                if let Ok(url) = std::env::var("TEST_DATABASE_URL") {
                    return SharedPostgres {
                        admin_url: Url::parse(&url).expect("TEST_DATABASE_URL is not a URL"),
                        _container: None,
                    };
                }

                let container = Postgres::default()
                    .with_tag("16")
                    .start()
                    .await
                    .expect("Failed to start Postgres container");
                let host = container.get_host().await.expect("container host");
                let port = container
                    .get_host_port_ipv4(5432)
                    .await
                    .expect("container port");
                SharedPostgres {
                    admin_url: Url::parse(&format!("postgres://postgres:postgres@{host}:{port}/postgres"))
                        .expect("container URL"),
                    _container: Some(container),
                }
            })
            .await
    }

    pub async fn fresh_pool() -> PgPool {
        let shared = shared().await;
        let name = format!(
            "talentd_test_{}_{}",
            std::process::id(),
            NEXT_DATABASE.fetch_add(1, Ordering::Relaxed)
        );

        let admin = PgPool::connect(shared.admin_url.as_str()).await.unwrap();
        admin
            .execute(format!(r#"CREATE DATABASE "{name}""#).as_str())
            .await
            .unwrap();
        admin.close().await;

        let mut url = shared.admin_url.clone();
        url.set_path(&name);
        let pool = PgPool::connect(url.as_str()).await.unwrap();
        super::run_migrations(&pool).await.unwrap();
        pool
    }
}
