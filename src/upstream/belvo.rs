use anyhow::Result;
use axum::async_trait;

use ::belvo::{Account, Client, Owner, Transaction};

use crate::upstream::{AccountSource, OwnerSource, TransactionSource};

#[async_trait]
impl OwnerSource for Client {
    async fn owners(&self, link_id: &str) -> Result<Vec<Owner>> {
        Ok(Client::owners(self, link_id).await?)
    }
}

#[async_trait]
impl AccountSource for Client {
    async fn accounts(&self, link_id: &str) -> Result<Vec<Account>> {
        Ok(Client::accounts(self, link_id).await?)
    }
}

#[async_trait]
impl TransactionSource for Client {
    async fn transactions(&self, link_id: &str) -> Result<Vec<Transaction>> {
        Ok(Client::transactions(self, link_id).await?)
    }
}
