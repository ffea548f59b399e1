//! Activities storage

use async_graphql::{ComplexObject, Context, SimpleObject, scalar};
use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::{Deserialize, Serialize};
use sqlx::prelude::{FromRow, Type};
use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;
use uuid::Uuid;

use crate::model::Model;
use crate::model::auth::Session;
use crate::model::users::{Role, User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Activity {0} not found")]
    NotFound(ActivityId),
}

/// Number of activities returned by `Activity::latest`
pub const LATEST_ACTIVITIES: i64 = 3;

const ACTIVITY_COLUMNS: &str = "id, name, city, description, price, owner, created_at";

/// Activity ID newtype
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct ActivityId(Uuid);

scalar!(ActivityId);

impl std::fmt::Display for ActivityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl ActivityId {
    /// Random id, not pointing to any stored activity
    #[cfg(test)]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// Activity offered in a city
#[derive(Debug, Clone, PartialEq, SimpleObject, FromRow)]
#[graphql(complex)]
pub struct Activity {
    pub id: ActivityId,
    pub name: String,
    pub city: String,
    pub description: String,
    pub price: i32,
    /// Creator of the activity
    #[graphql(skip)]
    #[sqlx(rename = "owner")]
    pub owner_id: UserId,
    #[graphql(skip)]
    pub created_at: DateTime<Utc>,
}

/// Diagnostic data visible to admins only
#[derive(Debug, Clone, PartialEq, SimpleObject)]
pub struct ActivityDebug {
    pub created_at: DateTime<Utc>,
}

#[ComplexObject]
impl Activity {
    /// User who created the activity
    async fn owner(&self, ctx: &Context<'_>) -> async_graphql::Result<User> {
        let model: &Model = ctx.data()?;
        let owner = self.owner_id.fetch(model.db()).await?;
        Ok(owner.ok_or("Owner not found")?)
    }

    /// Admin-only diagnostics, `null` for everyone else
    async fn debug(&self, ctx: &Context<'_>) -> Option<ActivityDebug> {
        let session = ctx.data_opt::<Session>()?;
        (session.role == Role::Admin).then(|| ActivityDebug {
            created_at: self.created_at,
        })
    }
}

/// Optional narrowing of activities in a city
#[derive(Debug, Clone, Default)]
pub struct CityFilter {
    /// Case-insensitive fragment of the activity name
    pub name: Option<String>,
    /// Maximal price, inclusive
    pub max_price: Option<i32>,
}

impl Activity {
    /// Checks if activity with given id exists
    pub async fn exists(
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        id: ActivityId,
    ) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("select exists(select 1 from activities where id = ?)")
                .bind(id)
                .fetch_one(db)
                .await?;

        Ok(exists)
    }

    /// Fetches the activity by it's id
    pub async fn fetch(
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        id: ActivityId,
    ) -> Result<Option<Self>> {
        let activity =
            sqlx::query_as(&format!("select {ACTIVITY_COLUMNS} from activities where id = ?"))
                .bind(id)
                .fetch_optional(db)
                .await?;

        Ok(activity)
    }

    /// Fetches all existing activities out of the given ids in a single query
    ///
    /// Ids without a matching activity are skipped. No particular order is guaranteed.
    pub async fn fetch_many(
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        ids: &[ActivityId],
    ) -> Result<Vec<Self>> {
        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "select {ACTIVITY_COLUMNS} from activities where id in ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(")");

        let activities = query.build_query_as().fetch_all(db).await?;
        Ok(activities)
    }

    /// All activities, oldest first
    pub async fn all(db: impl sqlx::Executor<'_, Database = Sqlite>) -> Result<Vec<Self>> {
        let activities = sqlx::query_as(&format!(
            "select {ACTIVITY_COLUMNS} from activities order by created_at, rowid"
        ))
        .fetch_all(db)
        .await?;

        Ok(activities)
    }

    /// Most recently created activities, newest first
    pub async fn latest(db: impl sqlx::Executor<'_, Database = Sqlite>) -> Result<Vec<Self>> {
        let activities = sqlx::query_as(&format!(
            "select {ACTIVITY_COLUMNS} from activities order by created_at desc, rowid desc limit ?"
        ))
        .bind(LATEST_ACTIVITIES)
        .fetch_all(db)
        .await?;

        Ok(activities)
    }

    /// Activities created by the user, oldest first
    pub async fn by_owner(
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        owner: UserId,
    ) -> Result<Vec<Self>> {
        let activities = sqlx::query_as(&format!(
            "select {ACTIVITY_COLUMNS} from activities where owner = ? order by created_at, rowid"
        ))
        .bind(owner)
        .fetch_all(db)
        .await?;

        Ok(activities)
    }

    /// Activities in the city matching the filter, oldest first
    pub async fn by_city(
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        city: &str,
        filter: CityFilter,
    ) -> Result<Vec<Self>> {
        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "select {ACTIVITY_COLUMNS} from activities where city = "
        ));
        query.push_bind(city);

        if let Some(name) = filter.name {
            query
                .push(" and instr(lower(name), lower(")
                .push_bind(name)
                .push(")) > 0");
        }

        if let Some(max_price) = filter.max_price {
            query.push(" and price <= ").push_bind(max_price);
        }

        query.push(" order by created_at, rowid");

        let activities = query.build_query_as().fetch_all(db).await?;
        Ok(activities)
    }

    /// Distinct cities having any activity, alphabetically
    pub async fn cities(db: impl sqlx::Executor<'_, Database = Sqlite>) -> Result<Vec<String>> {
        let rows: Vec<(String,)> =
            sqlx::query_as("select distinct city from activities order by city")
                .fetch_all(db)
                .await?;

        Ok(rows.into_iter().map(|(city,)| city).collect())
    }
}

/// Data of an activity to be created
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub name: String,
    pub city: String,
    pub description: String,
    pub price: i32,
}

impl NewActivity {
    /// Helper to create an activity
    pub fn new(
        name: impl Into<String>,
        city: impl Into<String>,
        description: impl Into<String>,
        price: i32,
    ) -> Self {
        Self {
            name: name.into(),
            city: city.into(),
            description: description.into(),
            price,
        }
    }

    /// Creates activity in the database
    pub async fn create(
        self,
        db: impl sqlx::Executor<'_, Database = Sqlite>,
        owner: UserId,
    ) -> Result<Activity> {
        let activity = Activity {
            id: ActivityId(Uuid::new_v4()),
            name: self.name,
            city: self.city,
            description: self.description,
            price: self.price,
            owner_id: owner,
            created_at: Utc::now(),
        };

        sqlx::query(
            "insert into activities(id, name, city, description, price, owner, created_at)\
             values (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(activity.id)
        .bind(&activity.name)
        .bind(&activity.city)
        .bind(&activity.description)
        .bind(activity.price)
        .bind(activity.owner_id)
        .bind(activity.created_at)
        .execute(db)
        .await?;

        Ok(activity)
    }
}
