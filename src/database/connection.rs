use log::error;
use openssl::error::ErrorStack;
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use std::future::Future;
use thiserror::Error;
use tokio_postgres::{Client, NoTls};
use url::Url;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("invalid database URL: {0}")]
    Url(#[from] url::ParseError),
    #[error("TLS setup failed: {0}")]
    Tls(#[from] ErrorStack),
    #[error(transparent)]
    Postgres(#[from] tokio_postgres::Error),
}

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, ErrorStack> {
    let mut builder = SslConnector::builder(SslMethod::tls())?;
    builder.set_ca_file(sslrootcert_path)?;
    Ok(MakeTlsConnector::new(builder.build()))
}

/// Remove the `sslrootcert` parameter, which libpq understands but
/// tokio-postgres does not.
///
/// # Returns
/// The URL to connect with and the CA file path, if one was given
pub fn split_sslrootcert(database_url: &str) -> Result<(String, Option<String>), DatabaseError> {
    let url = Url::parse(database_url)?;

    let mut sslrootcert_path = None;
    let mut clean_params = Vec::new();
    for (key, value) in url.query_pairs() {
        if key == "sslrootcert" {
            sslrootcert_path = Some(value.into_owned());
        } else {
            clean_params.push((key.into_owned(), value.into_owned()));
        }
    }

    let mut clean_url = url.clone();
    clean_url.set_query(None);
    if !clean_params.is_empty() {
        clean_url.query_pairs_mut().extend_pairs(clean_params);
    }
    Ok((clean_url.to_string(), sslrootcert_path))
}

/// Open a client, over TLS when the URL names a CA file.
pub async fn connect(database_url: &str) -> Result<Client, DatabaseError> {
    let (clean_url, sslrootcert_path) = split_sslrootcert(database_url)?;

    let client = match sslrootcert_path {
        Some(path) => {
            let connector = create_ssl_connector(&path)?;
            let (client, connection) = tokio_postgres::connect(&clean_url, connector).await?;
            drive(connection);
            client
        }
        None => {
            let (client, connection) = tokio_postgres::connect(&clean_url, NoTls).await?;
            drive(connection);
            client
        }
    };
    Ok(client)
}

fn drive<F>(connection: F)
where
    F: Future<Output = Result<(), tokio_postgres::Error>> + Send + 'static,
{
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            error!("Connection error: {}", e);
        }
    });
}
