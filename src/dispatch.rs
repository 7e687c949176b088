use thiserror::Error;
use tracing::{error, info, warn};

use crate::store::{self, Gateway};
use crate::upstream::{AccountSource, OwnerSource, TransactionSource};
use crate::webhook::{WebhookError, WebhookEvent, WebhookType};

/// How a well-formed event ended when nothing failed along the way.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// Data was synchronized, or there was nothing to do for the event type.
    Succeeded,
    /// The provider flagged the event as failed; nothing was fetched.
    ErrorReported(Vec<WebhookError>),
    /// No usable user is onboarded for the event's link.
    UserNotFound,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("failed to fetch {kind} for link {link_id}: {source:#}")]
    Fetch {
        kind: WebhookType,
        link_id: String,
        source: anyhow::Error,
    },
    #[error("failed to save {kind} for link {link_id}: {source}")]
    Save {
        kind: WebhookType,
        link_id: String,
        source: store::Error,
    },
}

/// Runs the fetch and persist pipeline selected by an event's type.
pub struct Dispatcher<S, G> {
    source: S,
    gateway: G,
}

impl<S, G> Dispatcher<S, G>
where
    S: OwnerSource + AccountSource + TransactionSource + Send + Sync,
    G: Gateway,
{
    pub fn new(source: S, gateway: G) -> Self {
        Self { source, gateway }
    }

    #[tracing::instrument(
        skip(self, event),
        fields(
            webhook_id = %event.webhook_id,
            webhook_type = %event.webhook_type,
            link_id = %event.link_id,
        )
    )]
    pub async fn dispatch(&self, event: &WebhookEvent) -> Result<Outcome, Error> {
        info!(
            process_type = %event.process(),
            webhook_code = %event.webhook_code,
            "received webhook"
        );

        if let Err(err) = self.gateway.save_webhook_event(event).await {
            error!(error = %err, "failed to save webhook event");
        }

        if event.has_errors() {
            let errors = event.errors();
            warn!(errors = ?errors, "webhook reports provider errors");
            return Ok(Outcome::ErrorReported(errors));
        }

        let link_id = event.link_id.as_str();
        let user_id = match self.gateway.user_id_by_link(link_id).await {
            Ok(user_id) => user_id,
            Err(err) => {
                error!(error = %err, "failed to find user for link");
                return Ok(Outcome::UserNotFound);
            }
        };

        let kind = event.kind();
        match &kind {
            WebhookType::Owners => {
                let owners = self.fetch(&kind, link_id, self.source.owners(link_id)).await?;
                if owners.is_empty() {
                    info!("no owners to process");
                    return Ok(Outcome::Succeeded);
                }
                self.gateway
                    .save_owners(&owners, link_id, &user_id)
                    .await
                    .map_err(|source| save_error(&kind, link_id, source))?;
                info!(count = owners.len(), "processed owners");
            }
            WebhookType::Accounts => {
                let accounts = self
                    .fetch(&kind, link_id, self.source.accounts(link_id))
                    .await?;
                if accounts.is_empty() {
                    info!("no accounts to process");
                    return Ok(Outcome::Succeeded);
                }
                self.gateway
                    .save_accounts(&accounts, link_id, &user_id)
                    .await
                    .map_err(|source| save_error(&kind, link_id, source))?;
                info!(count = accounts.len(), "processed accounts");
            }
            WebhookType::Transactions => {
                let transactions = self
                    .fetch(&kind, link_id, self.source.transactions(link_id))
                    .await?;
                if transactions.is_empty() {
                    info!("no transactions to process");
                    return Ok(Outcome::Succeeded);
                }
                self.gateway
                    .save_transactions(&transactions, link_id, &user_id)
                    .await
                    .map_err(|source| save_error(&kind, link_id, source))?;
                info!(count = transactions.len(), "processed transactions");
            }
            WebhookType::Other(ty) => {
                info!(webhook_type = %ty, "ignoring unhandled webhook type");
            }
        }

        Ok(Outcome::Succeeded)
    }

    async fn fetch<T, F>(&self, kind: &WebhookType, link_id: &str, fut: F) -> Result<Vec<T>, Error>
    where
        F: std::future::Future<Output = anyhow::Result<Vec<T>>>,
    {
        fut.await.map_err(|source| {
            error!(error = %format!("{:#}", source), "failed to fetch {}", kind);
            Error::Fetch {
                kind: kind.clone(),
                link_id: link_id.to_string(),
                source,
            }
        })
    }
}

fn save_error(kind: &WebhookType, link_id: &str, source: store::Error) -> Error {
    error!(error = %source, "failed to save {}", kind);
    Error::Save {
        kind: kind.clone(),
        link_id: link_id.to_string(),
        source,
    }
}
