mod account;
mod onboarding;
mod owner;
mod txn;
mod webhook;

use std::collections::HashMap;
use std::sync::Arc;

use axum::async_trait;
use belvo::{Account, Owner, RawObject, Transaction};
use chrono::{DateTime, Utc};
use sea_query::{Iden, OnConflict, Query, SqliteQueryBuilder, Value};
use sea_query_binder::{SqlxBinder, SqlxValues};
use sqlx::Error as SqlxError;
use thiserror::Error;
use tracing::{error, info, warn};

pub use webhook::WebhookEventRecord;

use crate::webhook::WebhookEvent;

#[derive(Debug, Error)]
pub enum Error {
    #[error("no user found for link_id: {0}")]
    UserNotFound(String),
    #[error("more than one user found for link_id: {0}")]
    AmbiguousLink(String),
    #[error("invalid user_id format for link_id: {0}")]
    InvalidUserId(String),
    #[error("failed to save {entity} {id}")]
    Save {
        entity: &'static str,
        id: String,
        #[source]
        source: Box<Error>,
    },
    #[error(transparent)]
    Parse(#[from] serde_json::Error),
    #[error(transparent)]
    Migration(#[from] sqlx::migrate::MigrateError),
    #[error(transparent)]
    Database(#[from] SqlxError),
}

impl PartialEq for Error {
    fn eq(&self, other: &Error) -> bool {
        self.to_string() == other.to_string()
    }
}

pub type Result<T> = ::std::result::Result<T, Error>;

/// Persistence operations the webhook pipeline depends on.
///
/// Every entity write is an upsert keyed on the provider identifier, so
/// replaying the same batch converges to the same rows.
#[async_trait]
pub trait Gateway: Send + Sync {
    /// Appends the audit row for an inbound event.
    async fn save_webhook_event(&self, event: &WebhookEvent) -> Result<()>;

    async fn user_id_by_link(&self, link_id: &str) -> Result<String>;

    /// Stops at the first failing owner.
    async fn save_owners(&self, owners: &[Owner], link_id: &str, user_id: &str) -> Result<()>;

    /// Stops at the first failing account.
    async fn save_accounts(&self, accounts: &[Account], link_id: &str, user_id: &str)
        -> Result<()>;

    /// Skips failing transactions and keeps going.
    async fn save_transactions(
        &self,
        transactions: &[Transaction],
        link_id: &str,
        user_id: &str,
    ) -> Result<()>;
}

#[derive(Debug, Clone)]
pub struct SqliteStore {
    conn: Arc<sqlx::pool::Pool<sqlx::sqlite::Sqlite>>,
}

impl SqliteStore {
    pub async fn new(uri: &str) -> Result<Self> {
        let mut options = sqlx::sqlite::SqlitePoolOptions::new();
        if uri.contains(":memory:") {
            // Every connection to an in-memory database opens a fresh one.
            options = options
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None);
        }
        let pool = options.connect(uri).await?;

        {
            let mut conn = pool.acquire().await?;
            sqlx::migrate!("./migrations").run(&mut conn).await?;
        }

        Ok(Self {
            conn: Arc::new(pool),
        })
    }

    pub fn owners(&self) -> owner::Store {
        owner::Store::new(self)
    }

    pub fn accounts(&self) -> account::Store {
        account::Store::new(self)
    }

    pub fn txns(&self) -> txn::Store {
        txn::Store::new(self)
    }

    pub fn webhook_events(&self) -> webhook::Store {
        webhook::Store::new(self)
    }

    pub fn onboarding(&self) -> onboarding::Store {
        onboarding::Store::new(self)
    }
}

#[async_trait]
impl Gateway for SqliteStore {
    #[tracing::instrument(skip(self, event), fields(webhook_id = %event.webhook_id))]
    async fn save_webhook_event(&self, event: &WebhookEvent) -> Result<()> {
        self.webhook_events().save(event).await?;
        info!("saved webhook event");

        Ok(())
    }

    async fn user_id_by_link(&self, link_id: &str) -> Result<String> {
        let user_id = self.onboarding().user_id(link_id).await?;
        info!(link_id, user_id = %user_id, "found user for link");

        Ok(user_id)
    }

    #[tracing::instrument(skip(self, owners), fields(count = owners.len()))]
    async fn save_owners(&self, owners: &[Owner], link_id: &str, user_id: &str) -> Result<()> {
        let store = self.owners();
        for owner in owners {
            if let Err(err) = store.upsert(owner, link_id, user_id).await {
                error!(owner_id = %owner.id, error = %err, "failed to save owner");
                return Err(Error::Save {
                    entity: "owner",
                    id: owner.id.clone(),
                    source: Box::new(err),
                });
            }
        }

        info!("saved owners");
        Ok(())
    }

    #[tracing::instrument(skip(self, accounts), fields(count = accounts.len()))]
    async fn save_accounts(
        &self,
        accounts: &[Account],
        link_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let store = self.accounts();
        for account in accounts {
            if let Err(err) = store.upsert(account, link_id, user_id).await {
                error!(account_id = %account.id, error = %err, "failed to save account");
                return Err(Error::Save {
                    entity: "account",
                    id: account.id.clone(),
                    source: Box::new(err),
                });
            }
        }

        info!("saved accounts");
        Ok(())
    }

    #[tracing::instrument(skip(self, transactions), fields(count = transactions.len()))]
    async fn save_transactions(
        &self,
        transactions: &[Transaction],
        link_id: &str,
        user_id: &str,
    ) -> Result<()> {
        // One snapshot for the whole batch.
        let account_ids = match self.accounts().resolve_ids(link_id).await {
            Ok(ids) => ids,
            Err(err) => {
                warn!(error = %err, "failed to resolve account ids, saving without account link");
                HashMap::new()
            }
        };

        let store = self.txns();
        let mut saved = 0usize;
        for tx in transactions {
            let account_id = account_ids.get(&tx.account).map(String::as_str);
            match store.upsert(tx, account_id, link_id, user_id).await {
                Ok(()) => saved += 1,
                Err(err) => {
                    error!(transaction_id = %tx.id, error = %err, "failed to save transaction, skipping");
                }
            }
        }

        info!(saved, skipped = transactions.len() - saved, "saved transactions");
        Ok(())
    }
}

/// `INSERT ... ON CONFLICT (key) DO UPDATE` over exactly the given columns.
/// The surrogate `id` is only written on insert so it survives updates, and
/// columns left out of `row` keep whatever value they already had.
fn upsert<C>(table: C, id: C, key: C, row: Vec<(C, Value)>) -> (String, SqlxValues)
where
    C: Iden + Copy + PartialEq + 'static,
{
    let update: Vec<C> = row
        .iter()
        .map(|(column, _)| *column)
        .filter(|column| *column != id && *column != key)
        .collect();
    let (columns, values): (Vec<C>, Vec<Value>) = row.into_iter().unzip();

    Query::insert()
        .into_table(table)
        .columns(columns)
        .values_panic(values.into_iter().map(Into::into))
        .on_conflict(OnConflict::column(key).update_columns(update).to_owned())
        .build_sqlx(SqliteQueryBuilder)
}

fn timestamp(t: &Option<DateTime<Utc>>) -> Value {
    t.map(|t| t.to_rfc3339()).into()
}

fn json(raw: &RawObject) -> Result<String> {
    Ok(serde_json::to_string(raw)?)
}
