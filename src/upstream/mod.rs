pub mod belvo;

use anyhow::Result;
use axum::async_trait;

use ::belvo::{Account, Owner, Transaction};

#[async_trait]
pub trait OwnerSource {
    async fn owners(&self, link_id: &str) -> Result<Vec<Owner>>;
}

#[async_trait]
pub trait AccountSource {
    async fn accounts(&self, link_id: &str) -> Result<Vec<Account>>;
}

#[async_trait]
pub trait TransactionSource {
    async fn transactions(&self, link_id: &str) -> Result<Vec<Transaction>>;
}
