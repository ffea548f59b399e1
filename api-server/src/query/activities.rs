//! Activity related queries

use async_graphql::{Context, Object, Result};
use tracing::instrument;

use crate::model::activities::{self, Activity, ActivityId, CityFilter};
use crate::model::{Model, api_error, require_session};

#[derive(Debug, Default)]
pub struct ActivitiesQueries;

#[Object]
impl ActivitiesQueries {
    /// All activities, oldest first
    #[instrument(skip(self, ctx))]
    async fn get_activities(&self, ctx: &Context<'_>) -> Result<Vec<Activity>> {
        let model: &Model = ctx.data()?;
        Activity::all(model.db()).await.map_err(api_error)
    }

    /// Most recently created activities
    #[instrument(skip(self, ctx))]
    async fn get_latest_activities(&self, ctx: &Context<'_>) -> Result<Vec<Activity>> {
        let model: &Model = ctx.data()?;
        Activity::latest(model.db()).await.map_err(api_error)
    }

    /// Activities created by the logged in user
    #[instrument(skip(self, ctx))]
    async fn get_activities_by_user(&self, ctx: &Context<'_>) -> Result<Vec<Activity>> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;
        Activity::by_owner(model.db(), session.user_id)
            .await
            .map_err(api_error)
    }

    /// Cities with at least one activity
    #[instrument(skip(self, ctx))]
    async fn get_cities(&self, ctx: &Context<'_>) -> Result<Vec<String>> {
        let model: &Model = ctx.data()?;
        Activity::cities(model.db()).await.map_err(api_error)
    }

    /// Activities in the city, optionally narrowed to names containing `activity` and to prices
    /// not exceeding `price`
    #[instrument(skip(self, ctx))]
    async fn get_activities_by_city(
        &self,
        ctx: &Context<'_>,
        city: String,
        activity: Option<String>,
        price: Option<i32>,
    ) -> Result<Vec<Activity>> {
        let model: &Model = ctx.data()?;
        let filter = CityFilter {
            name: activity,
            max_price: price,
        };

        Activity::by_city(model.db(), &city, filter)
            .await
            .map_err(api_error)
    }

    /// Single activity
    #[instrument(skip(self, ctx))]
    async fn get_activity(&self, ctx: &Context<'_>, id: ActivityId) -> Result<Activity> {
        let model: &Model = ctx.data()?;

        let activity = Activity::fetch(model.db(), id).await.map_err(api_error)?;
        activity.ok_or_else(|| api_error(activities::Error::NotFound(id).into()))
    }
}
