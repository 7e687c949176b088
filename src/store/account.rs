use std::collections::HashMap;

use belvo::Account;
use chrono::Utc;
use sea_query::{Expr, Iden, Query, SqliteQueryBuilder, Value};
use sea_query_binder::SqlxBinder;
use sqlx::Row;

use super::{json, timestamp, upsert, Result, SqliteStore};

#[derive(Iden, Clone, Copy, PartialEq)]
enum BelvoAccounts {
    Table,
    Id,
    BelvoId,
    LinkId,
    UserId,
    Name,
    Number,
    Type,
    Category,
    BalanceType,
    Currency,
    BankProductId,
    InternalIdentification,
    PublicIdentificationName,
    PublicIdentificationValue,
    Institution,
    InstitutionType,
    BalanceCurrent,
    BalanceAvailable,
    CreditData,
    LoanData,
    FundsData,
    LastAccessedAt,
    CollectedAt,
    RawData,
    UpdatedAt,
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    pub async fn upsert(&self, account: &Account, link_id: &str, user_id: &str) -> Result<()> {
        let mut row: Vec<(BelvoAccounts, Value)> = vec![
            (BelvoAccounts::Id, ulid::Ulid::new().to_string().into()),
            (BelvoAccounts::BelvoId, account.id.as_str().into()),
            (BelvoAccounts::LinkId, link_id.into()),
            (BelvoAccounts::UserId, user_id.into()),
            (BelvoAccounts::Name, account.name.as_str().into()),
            (BelvoAccounts::Number, account.number.as_str().into()),
            (BelvoAccounts::Type, account.ty.as_str().into()),
            (BelvoAccounts::Category, account.category.as_str().into()),
            (BelvoAccounts::BalanceType, account.balance_type.as_str().into()),
            (BelvoAccounts::Currency, account.currency.as_str().into()),
            (
                BelvoAccounts::BankProductId,
                account.bank_product_id.as_str().into(),
            ),
            (
                BelvoAccounts::InternalIdentification,
                account.internal_identification.as_str().into(),
            ),
            (
                BelvoAccounts::PublicIdentificationName,
                account.public_identification_name.as_str().into(),
            ),
            (
                BelvoAccounts::PublicIdentificationValue,
                account.public_identification_value.as_str().into(),
            ),
            (BelvoAccounts::CollectedAt, timestamp(&account.collected_at)),
            (BelvoAccounts::RawData, json(&account.raw)?.into()),
            (BelvoAccounts::UpdatedAt, Utc::now().to_rfc3339().into()),
        ];

        // Nested objects are flattened only when present.
        if let Some(institution) = &account.institution {
            row.push((BelvoAccounts::Institution, institution.name.as_str().into()));
            row.push((
                BelvoAccounts::InstitutionType,
                institution.ty.as_str().into(),
            ));
        }
        if let Some(balance) = &account.balance {
            row.push((BelvoAccounts::BalanceCurrent, balance.current.into()));
            row.push((BelvoAccounts::BalanceAvailable, balance.available.into()));
        }
        if account.last_accessed_at.is_some() {
            row.push((
                BelvoAccounts::LastAccessedAt,
                timestamp(&account.last_accessed_at),
            ));
        }
        if let Some(data) = &account.credit_data {
            row.push((BelvoAccounts::CreditData, json(data)?.into()));
        }
        if let Some(data) = &account.loan_data {
            row.push((BelvoAccounts::LoanData, json(data)?.into()));
        }
        if let Some(data) = &account.funds_data {
            row.push((BelvoAccounts::FundsData, json(data)?.into()));
        }

        let (query, values) = upsert(
            BelvoAccounts::Table,
            BelvoAccounts::Id,
            BelvoAccounts::BelvoId,
            row,
        );

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }

    /// Maps provider account ids to internal ids for every account of the
    /// link that has both populated.
    pub async fn resolve_ids(&self, link_id: &str) -> Result<HashMap<String, String>> {
        let (query, values) = Query::select()
            .columns([BelvoAccounts::Id, BelvoAccounts::BelvoId])
            .from(BelvoAccounts::Table)
            .and_where(Expr::col(BelvoAccounts::LinkId).eq(link_id))
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&query, values)
            .fetch_all(&mut self.0.conn.acquire().await?)
            .await?;

        let mut ids = HashMap::with_capacity(rows.len());
        for row in rows {
            let id: Option<String> = row.try_get("id")?;
            let belvo_id: Option<String> = row.try_get("belvo_id")?;

            match (belvo_id, id) {
                (Some(belvo_id), Some(id)) if !belvo_id.is_empty() && !id.is_empty() => {
                    ids.insert(belvo_id, id);
                }
                _ => continue,
            }
        }

        Ok(ids)
    }
}
