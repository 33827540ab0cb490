//! rustls transport for Postgres.
//!
//! The pool's `custom_setup` hook and the migration runner both connect
//! through here. Native roots are loaded once per process.

use std::future::Future;
use std::sync::{Arc, OnceLock};

use diesel::ConnectionError;
use diesel_async::AsyncPgConnection;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use rustls::ClientConfig;
use tokio_postgres::{Client, Connection};
use tokio_postgres_rustls::MakeRustlsConnect;

static CLIENT_CONFIG: OnceLock<Arc<ClientConfig>> = OnceLock::new();

fn client_config() -> Arc<ClientConfig> {
    CLIENT_CONFIG
        .get_or_init(|| {
            let loaded = rustls_native_certs::load_native_certs();
            for err in &loaded.errors {
                tracing::warn!("Skipping unreadable native certificate: {}", err);
            }
            let mut roots = rustls::RootCertStore::empty();
            let (added, ignored) = roots.add_parsable_certificates(loaded.certs);
            tracing::debug!("Loaded {} native roots ({} ignored)", added, ignored);

            Arc::new(
                ClientConfig::builder()
                    .with_root_certificates(roots)
                    .with_no_client_auth(),
            )
        })
        .clone()
}

fn connector() -> MakeRustlsConnect {
    MakeRustlsConnect::new((*client_config()).clone())
}

/// `custom_setup` for the deadpool-managed diesel pool.
pub fn establish_tls_connection(
    url: &str,
) -> BoxFuture<'_, diesel::ConnectionResult<AsyncPgConnection>> {
    async move {
        let (client, conn) = tokio_postgres::connect(url, connector())
            .await
            .map_err(|e| ConnectionError::BadConnection(e.to_string()))?;
        AsyncPgConnection::try_from_client_and_connection(client, conn).await
    }
    .boxed()
}

/// Drive the connection half on its own task and hand back the client.
fn detach<S, T>(client: Client, connection: Connection<S, T>) -> Client
where
    Connection<S, T>: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::error!("Migration connection closed with error: {}", e);
        }
    });
    client
}

/// Plain tokio-postgres client for the migration runner.
pub async fn connect_raw(url: &str, no_tls: bool) -> Result<Client, tokio_postgres::Error> {
    if no_tls {
        let (client, connection) = tokio_postgres::connect(url, tokio_postgres::NoTls).await?;
        Ok(detach(client, connection))
    } else {
        let (client, connection) = tokio_postgres::connect(url, connector()).await?;
        Ok(detach(client, connection))
    }
}
