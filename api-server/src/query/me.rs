//! Queries about the calling user

use async_graphql::{Context, Object, Result};
use tracing::instrument;

use crate::model::activities::Activity;
use crate::model::users::{self, User};
use crate::model::{Model, api_error, require_session};

#[derive(Debug, Default)]
pub struct MeQueries;

#[Object]
impl MeQueries {
    /// Currently logged in user
    #[instrument(skip(self, ctx))]
    async fn get_me(&self, ctx: &Context<'_>) -> Result<User> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        let user = session.user_id.fetch(model.db()).await.map_err(api_error)?;
        user.ok_or_else(|| api_error(users::Error::NotFound.into()))
    }

    /// Favorite activities of the logged in user, in the order the user has chosen
    #[instrument(skip(self, ctx))]
    async fn my_favorite_activities(&self, ctx: &Context<'_>) -> Result<Vec<Activity>> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        session
            .user_id
            .favorite_activities(model.db())
            .await
            .map_err(api_error)
    }
}
