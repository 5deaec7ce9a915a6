//! Database Test Utilities
//!
//! Testcontainer management, schema setup and seeding helpers for
//! integration tests against PostgreSQL.

use fake::faker::address::en::StreetName;
use fake::faker::internet::en::SafeEmail;
use fake::faker::name::en::Name;
use fake::Fake;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;
use testcontainers::{
    core::{IntoContainerPort, WaitFor},
    runners::AsyncRunner,
    ContainerAsync, GenericImage, ImageExt,
};
use tokio::sync::OnceCell;
use uuid::Uuid;

use core_kernel::{PropertyId, UserId};

const POSTGRES_IMAGE: &str = "postgres";
const POSTGRES_TAG: &str = "16-alpine";
const POSTGRES_USER: &str = "test_user";
const POSTGRES_PASSWORD: &str = "test_password";
const POSTGRES_DB: &str = "rentora_test";

type TestResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

/// Configuration for test database
#[derive(Debug, Clone)]
pub struct TestDatabaseConfig {
    pub user: String,
    pub password: String,
    pub database: String,
    pub host: String,
    pub port: u16,
}

impl Default for TestDatabaseConfig {
    fn default() -> Self {
        Self {
            user: POSTGRES_USER.to_string(),
            password: POSTGRES_PASSWORD.to_string(),
            database: POSTGRES_DB.to_string(),
            host: "localhost".to_string(),
            port: 5432,
        }
    }
}

impl TestDatabaseConfig {
    pub fn connection_url(&self) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{}",
            self.user, self.password, self.host, self.port, self.database
        )
    }
}

/// A PostgreSQL test container with the payments schema applied
pub struct TestDatabase {
    _container: ContainerAsync<GenericImage>,
    pub config: TestDatabaseConfig,
    pub pool: PgPool,
}

impl TestDatabase {
    /// Starts a new PostgreSQL container and applies the schema
    ///
    /// # Errors
    ///
    /// Returns an error if the container fails to start or the schema fails
    /// to apply
    pub async fn new() -> TestResult<Self> {
        let container = GenericImage::new(POSTGRES_IMAGE, POSTGRES_TAG)
            .with_exposed_port(5432.tcp())
            .with_wait_for(WaitFor::message_on_stderr(
                "database system is ready to accept connections",
            ))
            .with_env_var("POSTGRES_USER", POSTGRES_USER)
            .with_env_var("POSTGRES_PASSWORD", POSTGRES_PASSWORD)
            .with_env_var("POSTGRES_DB", POSTGRES_DB)
            .start()
            .await?;

        let port = container.get_host_port_ipv4(5432).await?;
        let host = container.get_host().await?.to_string();

        let config = TestDatabaseConfig {
            host,
            port,
            ..TestDatabaseConfig::default()
        };

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect(&config.connection_url())
            .await?;

        let test_db = Self {
            _container: container,
            config,
            pool,
        };
        test_db.init_schema().await?;

        Ok(test_db)
    }

    async fn init_schema(&self) -> TestResult<()> {
        let schema = include_str!("../../../migrations/20240101000001_payments_schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Clears all data while preserving the schema
    pub async fn clear_data(&self) -> TestResult<()> {
        let tables = [
            "payments",
            "maintenance_requests",
            "bookings",
            "tenancies",
            "properties",
            "users",
        ];

        for table in tables {
            sqlx::query(&format!("TRUNCATE TABLE {} CASCADE", table))
                .execute(&self.pool)
                .await?;
        }

        Ok(())
    }

    /// Inserts a user with a generated name and email
    pub async fn seed_user(&self, role: &str) -> TestResult<UserId> {
        let id = Uuid::now_v7();
        let name: String = Name().fake();
        let email: String = SafeEmail().fake();
        sqlx::query("INSERT INTO users (id, name, email, role) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(name)
            .bind(format!("{}.{}", id.simple(), email))
            .bind(role)
            .execute(&self.pool)
            .await?;
        Ok(UserId::from_uuid(id))
    }

    /// Inserts a property owned by `owner`
    pub async fn seed_property(&self, title: &str, owner: Option<UserId>) -> TestResult<PropertyId> {
        let id = Uuid::now_v7();
        let street: String = StreetName().fake();
        sqlx::query("INSERT INTO properties (id, title, address, owner_id) VALUES ($1, $2, $3, $4)")
            .bind(id)
            .bind(title)
            .bind(format!("{} {}", (1..200).fake::<u16>(), street))
            .bind(owner.map(Uuid::from))
            .execute(&self.pool)
            .await?;
        Ok(PropertyId::from_uuid(id))
    }

    /// Inserts a tenancy record and returns its id
    pub async fn seed_tenancy(&self, property: PropertyId, tenant: UserId) -> TestResult<Uuid> {
        let id = Uuid::now_v7();
        sqlx::query(
            "INSERT INTO tenancies (id, property_id, tenant_id, label, status) VALUES ($1, $2, $3, $4, 'active')",
        )
        .bind(id)
        .bind(Uuid::from(property))
        .bind(Uuid::from(tenant))
        .bind("12 month assured shorthold")
        .execute(&self.pool)
        .await?;
        Ok(id)
    }
}

/// Global test database for shared integration tests
static SHARED_TEST_DB: OnceCell<Arc<TestDatabase>> = OnceCell::const_new();

/// Gets or creates a shared test database instance
///
/// # Panics
///
/// Panics if the database fails to initialize
pub async fn get_shared_test_database() -> Arc<TestDatabase> {
    SHARED_TEST_DB
        .get_or_init(|| async {
            Arc::new(
                TestDatabase::new()
                    .await
                    .expect("Failed to create shared test database"),
            )
        })
        .await
        .clone()
}

/// Creates an isolated test database for a single test
pub async fn create_isolated_test_database() -> TestResult<TestDatabase> {
    TestDatabase::new().await
}

/// Helper macro for running database tests
#[macro_export]
macro_rules! db_test {
    ($name:ident, $body:expr) => {
        #[tokio::test]
        #[ignore = "requires Docker"]
        async fn $name() {
            let db = $crate::database::create_isolated_test_database()
                .await
                .expect("Failed to create test database");
            let pool = db.pool();
            $body
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_connection_url() {
        let config = TestDatabaseConfig::default();
        let url = config.connection_url();

        assert!(url.starts_with("postgres://"));
        assert!(url.contains(POSTGRES_USER));
        assert!(url.contains(POSTGRES_DB));
    }
}
