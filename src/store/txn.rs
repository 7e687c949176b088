use belvo::Transaction;
use chrono::Utc;
use sea_query::{Iden, Value};

use super::{json, timestamp, upsert, Result, SqliteStore};

#[derive(Iden, Clone, Copy, PartialEq)]
enum BelvoTransactions {
    Table,
    Id,
    BelvoId,
    LinkId,
    UserId,
    AccountId,
    AccountBelvoId,
    ValueDate,
    AccountingDate,
    Amount,
    Balance,
    Currency,
    Description,
    Observations,
    Category,
    Subcategory,
    Reference,
    Type,
    Status,
    MerchantName,
    MerchantWebsite,
    CreditCardData,
    CollectedAt,
    RawData,
    UpdatedAt,
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    /// `account_id` is the internal account id when it could be resolved.
    /// Without it the stored link, if any, is left untouched.
    pub async fn upsert(
        &self,
        tx: &Transaction,
        account_id: Option<&str>,
        link_id: &str,
        user_id: &str,
    ) -> Result<()> {
        let mut row: Vec<(BelvoTransactions, Value)> = vec![
            (BelvoTransactions::Id, ulid::Ulid::new().to_string().into()),
            (BelvoTransactions::BelvoId, tx.id.as_str().into()),
            (BelvoTransactions::LinkId, link_id.into()),
            (BelvoTransactions::UserId, user_id.into()),
            (BelvoTransactions::AccountBelvoId, tx.account.as_str().into()),
            (BelvoTransactions::ValueDate, tx.value_date.as_str().into()),
            (
                BelvoTransactions::AccountingDate,
                tx.accounting_date.as_str().into(),
            ),
            (BelvoTransactions::Amount, tx.amount.into()),
            (BelvoTransactions::Balance, tx.balance.into()),
            (BelvoTransactions::Currency, tx.currency.as_str().into()),
            (BelvoTransactions::Description, tx.description.as_str().into()),
            (
                BelvoTransactions::Observations,
                tx.observations.as_str().into(),
            ),
            (BelvoTransactions::Category, tx.category.as_str().into()),
            (BelvoTransactions::Subcategory, tx.subcategory.as_str().into()),
            (BelvoTransactions::Reference, tx.reference.as_str().into()),
            (BelvoTransactions::Type, tx.ty.as_str().into()),
            (BelvoTransactions::Status, tx.status.as_str().into()),
            (BelvoTransactions::CollectedAt, timestamp(&tx.collected_at)),
            (BelvoTransactions::RawData, json(&tx.raw)?.into()),
            (BelvoTransactions::UpdatedAt, Utc::now().to_rfc3339().into()),
        ];

        if let Some(account_id) = account_id {
            row.push((BelvoTransactions::AccountId, account_id.into()));
        }
        if let Some(merchant) = &tx.merchant {
            row.push((BelvoTransactions::MerchantName, merchant.name.as_str().into()));
            row.push((
                BelvoTransactions::MerchantWebsite,
                merchant.website.as_str().into(),
            ));
        }
        if let Some(data) = &tx.credit_card_data {
            row.push((BelvoTransactions::CreditCardData, json(data)?.into()));
        }

        let (query, values) = upsert(
            BelvoTransactions::Table,
            BelvoTransactions::Id,
            BelvoTransactions::BelvoId,
            row,
        );

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }
}
