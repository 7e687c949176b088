use chrono::Utc;
use sea_query::{Expr, Iden, Order, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use serde_json::json;
use sqlx::{FromRow, Row};

use super::{Result, SqliteStore};
use crate::webhook::WebhookEvent;

#[derive(Iden)]
enum BelvoWebhookEvents {
    Table,
    Id,
    WebhookId,
    WebhookType,
    ProcessType,
    WebhookCode,
    LinkId,
    RequestId,
    ExternalId,
    HasErrors,
    ErrorDetails,
    Data,
    ProcessedAt,
}

/// A stored audit row for one received webhook.
#[derive(Debug, Clone, PartialEq)]
pub struct WebhookEventRecord {
    pub id: String,
    pub webhook_id: String,
    pub webhook_type: String,
    pub process_type: String,
    pub webhook_code: String,
    pub link_id: String,
    pub request_id: String,
    pub external_id: String,
    pub has_errors: bool,
    pub error_details: Option<String>,
    pub data: String,
    pub processed_at: String,
}

impl<'r, R: sqlx::Row> sqlx::FromRow<'r, R> for WebhookEventRecord
where
    std::string::String: sqlx::Decode<'r, <R as Row>::Database> + sqlx::Type<<R as Row>::Database>,
    Option<String>: sqlx::Decode<'r, <R as Row>::Database> + sqlx::Type<<R as Row>::Database>,
    bool: sqlx::Decode<'r, <R as Row>::Database> + sqlx::Type<<R as Row>::Database>,
    &'static str: sqlx::ColumnIndex<R>,
{
    fn from_row(row: &'r R) -> ::std::result::Result<Self, sqlx::Error> {
        Ok(WebhookEventRecord {
            id: row.try_get("id")?,
            webhook_id: row.try_get("webhook_id")?,
            webhook_type: row.try_get("webhook_type")?,
            process_type: row.try_get("process_type")?,
            webhook_code: row.try_get("webhook_code")?,
            link_id: row.try_get("link_id")?,
            request_id: row.try_get("request_id")?,
            external_id: row.try_get("external_id")?,
            has_errors: row.try_get("has_errors")?,
            error_details: row.try_get("error_details")?,
            data: row.try_get("data")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    /// Appends one row per call; the same webhook delivered twice is
    /// recorded twice.
    pub async fn save(&self, event: &WebhookEvent) -> Result<()> {
        let has_errors = event.has_errors();
        let error_details = if has_errors {
            Some(serde_json::to_string(&json!({ "errors": event.errors() }))?)
        } else {
            None
        };
        let data = match &event.data {
            Some(data) => serde_json::to_string(data)?,
            None => "{}".to_string(),
        };

        let (query, values) = Query::insert()
            .into_table(BelvoWebhookEvents::Table)
            .columns([
                BelvoWebhookEvents::Id,
                BelvoWebhookEvents::WebhookId,
                BelvoWebhookEvents::WebhookType,
                BelvoWebhookEvents::ProcessType,
                BelvoWebhookEvents::WebhookCode,
                BelvoWebhookEvents::LinkId,
                BelvoWebhookEvents::RequestId,
                BelvoWebhookEvents::ExternalId,
                BelvoWebhookEvents::HasErrors,
                BelvoWebhookEvents::ErrorDetails,
                BelvoWebhookEvents::Data,
                BelvoWebhookEvents::ProcessedAt,
            ])
            .values_panic(vec![
                ulid::Ulid::new().to_string().into(),
                event.webhook_id.as_str().into(),
                event.webhook_type.as_str().into(),
                event.process_type.as_str().into(),
                event.webhook_code.as_str().into(),
                event.link_id.as_str().into(),
                event.request_id.as_str().into(),
                event.external_id.as_str().into(),
                has_errors.into(),
                error_details.into(),
                data.into(),
                Utc::now().to_rfc3339().into(),
            ])
            .build_sqlx(SqliteQueryBuilder);

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }

    /// Most recently processed events first, optionally for a single link.
    pub async fn recent(&self, limit: u64, link_id: Option<&str>) -> Result<Vec<WebhookEventRecord>> {
        let mut select = Query::select();
        select
            .columns([
                BelvoWebhookEvents::Id,
                BelvoWebhookEvents::WebhookId,
                BelvoWebhookEvents::WebhookType,
                BelvoWebhookEvents::ProcessType,
                BelvoWebhookEvents::WebhookCode,
                BelvoWebhookEvents::LinkId,
                BelvoWebhookEvents::RequestId,
                BelvoWebhookEvents::ExternalId,
                BelvoWebhookEvents::HasErrors,
                BelvoWebhookEvents::ErrorDetails,
                BelvoWebhookEvents::Data,
                BelvoWebhookEvents::ProcessedAt,
            ])
            .from(BelvoWebhookEvents::Table)
            .order_by(BelvoWebhookEvents::ProcessedAt, Order::Desc)
            .limit(limit);
        if let Some(link_id) = link_id {
            select.and_where(Expr::col(BelvoWebhookEvents::LinkId).eq(link_id));
        }
        let (query, values) = select.build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&query, values)
            .fetch_all(&mut self.0.conn.acquire().await?)
            .await?;

        let mut events = Vec::with_capacity(rows.len());
        for row in rows {
            events.push(WebhookEventRecord::from_row(&row)?);
        }

        Ok(events)
    }
}
