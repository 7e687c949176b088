use belvo::Owner;
use chrono::Utc;
use sea_query::Iden;

use super::{json, timestamp, upsert, Result, SqliteStore};

#[derive(Iden, Clone, Copy, PartialEq)]
enum BelvoOwners {
    Table,
    Id,
    BelvoId,
    LinkId,
    UserId,
    DisplayName,
    Email,
    PhoneNumber,
    Address,
    InternalIdentification,
    FirstName,
    LastName,
    SecondLastName,
    CollectedAt,
    RawData,
    UpdatedAt,
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    pub async fn upsert(&self, owner: &Owner, link_id: &str, user_id: &str) -> Result<()> {
        let (query, values) = upsert(
            BelvoOwners::Table,
            BelvoOwners::Id,
            BelvoOwners::BelvoId,
            vec![
                (BelvoOwners::Id, ulid::Ulid::new().to_string().into()),
                (BelvoOwners::BelvoId, owner.id.as_str().into()),
                (BelvoOwners::LinkId, link_id.into()),
                (BelvoOwners::UserId, user_id.into()),
                (BelvoOwners::DisplayName, owner.display_name.as_str().into()),
                (BelvoOwners::Email, owner.email.as_str().into()),
                (BelvoOwners::PhoneNumber, owner.phone_number.as_str().into()),
                (BelvoOwners::Address, owner.address.as_str().into()),
                (
                    BelvoOwners::InternalIdentification,
                    owner.internal_identification.as_str().into(),
                ),
                (BelvoOwners::FirstName, owner.first_name.as_str().into()),
                (BelvoOwners::LastName, owner.last_name.as_str().into()),
                (
                    BelvoOwners::SecondLastName,
                    owner.second_last_name.as_str().into(),
                ),
                (BelvoOwners::CollectedAt, timestamp(&owner.collected_at)),
                (BelvoOwners::RawData, json(&owner.raw)?.into()),
                (BelvoOwners::UpdatedAt, Utc::now().to_rfc3339().into()),
            ],
        );

        sqlx::query_with(&query, values)
            .execute(&mut self.0.conn.acquire().await?)
            .await?;

        Ok(())
    }
}
