use sea_query::{Expr, Iden, Query, SqliteQueryBuilder};
use sea_query_binder::SqlxBinder;
use sqlx::Row;

use super::{Error, Result, SqliteStore};

#[derive(Iden)]
enum UserOnboarding {
    Table,
    UserId,
    BelvoLinkId,
}

pub struct Store<'a>(&'a SqliteStore);

impl<'a> Store<'a> {
    pub fn new(store: &'a SqliteStore) -> Self {
        Self(store)
    }

    /// The single user onboarded with `link_id`.
    pub async fn user_id(&self, link_id: &str) -> Result<String> {
        let (query, values) = Query::select()
            .column(UserOnboarding::UserId)
            .from(UserOnboarding::Table)
            .and_where(Expr::col(UserOnboarding::BelvoLinkId).eq(link_id))
            .limit(2)
            .build_sqlx(SqliteQueryBuilder);

        let rows = sqlx::query_with(&query, values)
            .fetch_all(&mut self.0.conn.acquire().await?)
            .await?;

        match rows.as_slice() {
            [] => Err(Error::UserNotFound(link_id.to_string())),
            [row] => match row.try_get::<Option<String>, _>("user_id")? {
                Some(user_id) if !user_id.is_empty() => Ok(user_id),
                _ => Err(Error::InvalidUserId(link_id.to_string())),
            },
            _ => Err(Error::AmbiguousLink(link_id.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::store::tests::TestStore;

    use super::*;

    #[tokio::test]
    async fn finds_onboarded_user() {
        let store = TestStore::new().await;
        store.onboard(Some("u1"), "link-42").await;
        store.onboard(Some("u2"), "link-7").await;

        assert_eq!(
            store.db().onboarding().user_id("link-42").await,
            Ok("u1".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_link() {
        let store = TestStore::new().await;

        assert_eq!(
            store.db().onboarding().user_id("link-42").await,
            Err(Error::UserNotFound("link-42".to_string()))
        );
    }

    #[tokio::test]
    async fn link_shared_by_two_users() {
        let store = TestStore::new().await;
        store.onboard(Some("u1"), "link-42").await;
        store.onboard(Some("u2"), "link-42").await;

        assert_eq!(
            store.db().onboarding().user_id("link-42").await,
            Err(Error::AmbiguousLink("link-42".to_string()))
        );
    }

    #[tokio::test]
    async fn missing_user_id() {
        let store = TestStore::new().await;
        store.onboard(None, "link-42").await;
        store.onboard(Some(""), "link-7").await;

        let onboarding = store.db().onboarding();
        assert_eq!(
            onboarding.user_id("link-42").await,
            Err(Error::InvalidUserId("link-42".to_string()))
        );
        assert_eq!(
            onboarding.user_id("link-7").await,
            Err(Error::InvalidUserId("link-7".to_string()))
        );
    }
}
