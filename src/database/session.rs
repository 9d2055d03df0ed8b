use log::{error, info, warn};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_postgres::Client;

use crate::database::connection::connect;
use crate::database::operations::insert_record;
use crate::upload::{Credential, DeliveryChannel, DeliveryRecord};

struct Session {
    client: Arc<Client>,
    expires_at: Instant,
}

/// PostgreSQL session used as the delivery credential
///
/// Requesting a token opens a fresh session in the background; it counts as
/// valid until it expires or the server closes it.
pub struct PgSession {
    database_url: String,
    table: String,
    session: Arc<Mutex<Option<Session>>>,
}

impl PgSession {
    pub fn new(database_url: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
            table: table.into(),
            session: Arc::new(Mutex::new(None)),
        }
    }

    fn client(&self) -> Option<Arc<Client>> {
        let guard = self.session.lock().ok()?;
        guard
            .as_ref()
            .filter(|session| session.expires_at > Instant::now() && !session.client.is_closed())
            .map(|session| Arc::clone(&session.client))
    }
}

impl Credential for PgSession {
    fn is_token_valid(&self) -> bool {
        self.client().is_some()
    }

    fn request_token(&mut self, expiry: Duration) {
        if let Ok(mut guard) = self.session.lock() {
            *guard = None;
        }

        let database_url = self.database_url.clone();
        let slot = Arc::clone(&self.session);
        tokio::spawn(async move {
            match connect(&database_url).await {
                Ok(client) => {
                    info!("Database session open for {} s", expiry.as_secs());
                    if let Ok(mut guard) = slot.lock() {
                        *guard = Some(Session {
                            client: Arc::new(client),
                            expires_at: Instant::now() + expiry,
                        });
                    }
                }
                Err(e) => error!("Failed to open database session: {}", e),
            }
        });
    }
}

impl DeliveryChannel for PgSession {
    async fn submit(&mut self, record: &DeliveryRecord) -> bool {
        let Some(client) = self.client() else {
            warn!("No database session for delivery");
            return false;
        };
        match insert_record(&client, &self.table, record).await {
            Ok(_) => true,
            Err(e) => {
                error!("Failed to store record: {}", e);
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upload::record::RecordBuilder;

    #[tokio::test]
    async fn no_session_until_requested() {
        let mut session = PgSession::new("postgres://station@127.0.0.1:1/weather", "weather_data");
        assert!(!session.is_token_valid());

        let record = RecordBuilder::new().text("time", "12:10:00").build();
        assert!(!session.submit(&record).await);
    }
}
