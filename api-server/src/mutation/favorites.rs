//! Favorite activities mutations

use async_graphql::{Context, Object, Result};
use tracing::{info, instrument};

use crate::model::activities::ActivityId;
use crate::model::users::User;
use crate::model::{Model, api_error, require_session};

#[derive(Debug, Default)]
pub struct FavoritesMutations;

#[Object]
impl FavoritesMutations {
    /// Adds the activity at the end of the favorites. Already favorite activity stays in place.
    #[instrument(skip(self, ctx))]
    pub async fn add_favorite_activity(
        &self,
        ctx: &Context<'_>,
        activity_id: ActivityId,
    ) -> Result<User> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        let user = session
            .user_id
            .add_favorite(model.db(), activity_id)
            .await
            .map_err(api_error)?;

        info!(favorites = user.favorite_activity_ids.len(), "Favorite added");
        Ok(user)
    }

    /// Removes the activity from the favorites
    #[instrument(skip(self, ctx))]
    pub async fn remove_favorite_activity(
        &self,
        ctx: &Context<'_>,
        activity_id: ActivityId,
    ) -> Result<User> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        let user = session
            .user_id
            .remove_favorite(model.db(), activity_id)
            .await
            .map_err(api_error)?;

        info!(favorites = user.favorite_activity_ids.len(), "Favorite removed");
        Ok(user)
    }

    /// Reorders favorites. The ids have to be exactly the current favorites, in the new order.
    #[instrument(skip(self, ctx))]
    pub async fn reorder_favorite_activities(
        &self,
        ctx: &Context<'_>,
        activity_ids: Vec<ActivityId>,
    ) -> Result<User> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        let user = session
            .user_id
            .reorder_favorites(model.db(), activity_ids)
            .await
            .map_err(api_error)?;

        info!(favorites = user.favorite_activity_ids.len(), "Favorites reordered");
        Ok(user)
    }
}
