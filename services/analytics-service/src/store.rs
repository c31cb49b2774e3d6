use async_trait::async_trait;
use serde_json::Value;
use tokio_postgres::{Client, NoTls, Row};
use uuid::Uuid;

use crate::db;
use crate::error::StoreError;
use crate::models::{Ack, Event};

/// Persistence seam used by the handlers. Implementations must be safe to
/// share across concurrent requests.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Writes one event document. No retry on failure.
    async fn persist(&self, event: &Event) -> Result<Ack, StoreError>;

    async fn find(&self, id: Uuid) -> Result<Option<Event>, StoreError>;

    async fn ping(&self) -> Result<(), StoreError>;
}

pub struct PgEventStore {
    client: Client,
    insert_sql: String,
    select_sql: String,
}

impl PgEventStore {
    /// Connects, checks the server answers and makes sure the events table
    /// exists. Any failure here is a startup failure.
    pub async fn connect(database_url: &str, table: &str) -> Result<Self, StoreError> {
        let (client, connection) = tokio_postgres::connect(database_url, NoTls)
            .await
            .map_err(StoreError::Connect)?;
        tokio::spawn(async move {
            // Drive the connection in the background.
            if let Err(err) = connection.await {
                tracing::error!(error = %err, "database connection error");
            }
        });

        let store = Self {
            client,
            insert_sql: db::insert_event_sql(table),
            select_sql: db::select_event_sql(table),
        };
        store.ping().await?;
        store
            .client
            .batch_execute(db::create_table_sql(table).as_str())
            .await
            .map_err(StoreError::EnsureTable)?;
        tracing::info!(table, "event store ready");
        Ok(store)
    }

    fn ensure_open(&self) -> Result<(), StoreError> {
        if self.client.is_closed() {
            return Err(StoreError::Unavailable("connection closed".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl EventStore for PgEventStore {
    async fn persist(&self, event: &Event) -> Result<Ack, StoreError> {
        self.ensure_open()?;
        let meta = event.meta.clone().map(Value::Object);
        self.client
            .execute(
                self.insert_sql.as_str(),
                &[
                    &event.id,
                    &event.installation_id,
                    &event.event_type,
                    &meta,
                    &event.created_at,
                    &event.stored_at,
                ],
            )
            .await
            .map_err(StoreError::Insert)?;

        Ok(Ack {
            id: event.id,
            installation_id: event.installation_id.clone(),
        })
    }

    async fn find(&self, id: Uuid) -> Result<Option<Event>, StoreError> {
        self.ensure_open()?;
        let row = self
            .client
            .query_opt(self.select_sql.as_str(), &[&id])
            .await
            .map_err(StoreError::Select)?;
        row.map(|row| event_from_row(&row)).transpose()
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.ensure_open()?;
        self.client
            .simple_query(db::SQL_PING)
            .await
            .map_err(StoreError::Ping)?;
        Ok(())
    }
}

fn event_from_row(row: &Row) -> Result<Event, StoreError> {
    let meta: Option<Value> = row.try_get("meta").map_err(StoreError::Select)?;
    Ok(Event {
        id: row.try_get("_id").map_err(StoreError::Select)?,
        installation_id: row.try_get("installation_id").map_err(StoreError::Select)?,
        event_type: row.try_get("event_type").map_err(StoreError::Select)?,
        meta: match meta {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        },
        created_at: row.try_get("created_at").map_err(StoreError::Select)?,
        stored_at: row.try_get("stored_at").map_err(StoreError::Select)?,
    })
}
