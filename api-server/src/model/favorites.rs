//! Users favorite activities
//!
//! Favorites are stored as an ordered JSON array of activity ids on the user row. Adding and
//! removing a favorite is a single `update ... returning` statement, so two concurrent changes for
//! the same user never lose each other. Reordering replaces the whole array - concurrent reorders
//! are last-writer-wins.
//!
//! Removing an activity does not touch favorites referring to it. Such stale ids are skipped when
//! listing favorites, but they still take part in the reorder permutation check.

use std::collections::{HashMap, HashSet};

use color_eyre::Result;
use color_eyre::eyre::ensure;
use sqlx::types::Json;
use thiserror::Error;

use crate::model::activities::{Activity, ActivityId};
use crate::model::users::{USER_COLUMNS, User, UserId};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("User not found")]
    UserNotFound,
    #[error("Activity {0} not found")]
    ActivityNotFound(ActivityId),
    #[error("Activity ids have to be a permutation of the current favorite activities")]
    InvalidOrder,
}

impl UserId {
    /// Appends the activity to favorites unless it is already there
    ///
    /// Adding an activity twice keeps its original position.
    pub async fn add_favorite(
        self,
        db: impl sqlx::Acquire<'_, Database = sqlx::Sqlite>,
        activity_id: ActivityId,
    ) -> Result<User> {
        let mut conn = db.acquire().await?;

        ensure!(
            Activity::exists(&mut *conn, activity_id).await?,
            Error::ActivityNotFound(activity_id)
        );

        let user = sqlx::query_as::<_, User>(&format!(
            "update users set favorite_activity_ids = case \
                 when exists (select 1 from json_each(users.favorite_activity_ids) where value = ?1) \
                     then favorite_activity_ids \
                 else json_insert(favorite_activity_ids, '$[#]', ?1) \
             end \
             where id = ?2 \
             returning {USER_COLUMNS}"
        ))
        .bind(activity_id.to_string())
        .bind(self)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::UserNotFound)?;

        Ok(user)
    }

    /// Removes the activity from favorites, keeping the order of the remaining ones
    ///
    /// Removing an activity which is not a favorite is a no-op.
    pub async fn remove_favorite(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        activity_id: ActivityId,
    ) -> Result<User> {
        let user = sqlx::query_as::<_, User>(&format!(
            "update users set favorite_activity_ids = ( \
                 select json_group_array(value) from json_each(users.favorite_activity_ids) \
                 where value <> ?1 \
             ) \
             where id = ?2 \
             returning {USER_COLUMNS}"
        ))
        .bind(activity_id.to_string())
        .bind(self)
        .fetch_optional(db)
        .await?
        .ok_or(Error::UserNotFound)?;

        Ok(user)
    }

    /// Replaces favorites with the same activities in the new order
    pub async fn reorder_favorites(
        self,
        db: impl sqlx::Acquire<'_, Database = sqlx::Sqlite>,
        activity_ids: Vec<ActivityId>,
    ) -> Result<User> {
        let mut conn = db.acquire().await?;

        let user = User::fetch(&mut *conn, self)
            .await?
            .ok_or(Error::UserNotFound)?;
        ensure!(
            is_permutation(&user.favorite_activity_ids, &activity_ids),
            Error::InvalidOrder
        );

        let user = sqlx::query_as::<_, User>(&format!(
            "update users set favorite_activity_ids = ?1 where id = ?2 returning {USER_COLUMNS}"
        ))
        .bind(Json(activity_ids))
        .bind(self)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or(Error::UserNotFound)?;

        Ok(user)
    }

    /// Favorite activities in the favorites order
    ///
    /// Favorites pointing to no longer existing activities are skipped.
    pub async fn favorite_activities(
        self,
        db: impl sqlx::Acquire<'_, Database = sqlx::Sqlite>,
    ) -> Result<Vec<Activity>> {
        let mut conn = db.acquire().await?;

        let ids = User::fetch(&mut *conn, self)
            .await?
            .ok_or(Error::UserNotFound)?
            .favorite_activity_ids;

        if ids.is_empty() {
            return Ok(vec![]);
        }

        let mut activities = Activity::fetch_many(&mut *conn, &ids).await?;

        let positions: HashMap<ActivityId, usize> = ids
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();
        activities.sort_by_key(|activity| positions.get(&activity.id).copied());

        Ok(activities)
    }
}

/// Checks if `proposed` holds exactly the ids of `current`, each of them once
fn is_permutation(current: &[ActivityId], proposed: &[ActivityId]) -> bool {
    if current.len() != proposed.len() {
        return false;
    }

    let current: HashSet<_> = current.iter().collect();
    let proposed_set: HashSet<_> = proposed.iter().collect();

    proposed_set.len() == proposed.len() && proposed_set == current
}
