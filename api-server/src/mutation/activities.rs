//! Activity related mutations

use async_graphql::{Context, InputObject, Object, Result};
use tracing::{info, instrument};

use crate::model::activities::{Activity, NewActivity};
use crate::model::{Model, api_error, require_session};

#[derive(Debug, InputObject)]
pub struct CreateActivityInput {
    #[graphql(validator(max_length = 100, regex = r"^[a-zA-Z0-9\s\-_']+$"))]
    pub name: String,
    #[graphql(validator(max_length = 50, regex = r"^[a-zA-Z\s\-']+$"))]
    pub city: String,
    #[graphql(validator(min_length = 1, max_length = 500))]
    pub description: String,
    #[graphql(validator(minimum = 1))]
    pub price: i32,
}

#[derive(Debug, Default)]
pub struct ActivitiesMutations;

#[Object]
impl ActivitiesMutations {
    /// Creates an activity owned by the logged in user
    #[instrument(skip(self, ctx))]
    pub async fn create_activity(
        &self,
        ctx: &Context<'_>,
        create_activity_input: CreateActivityInput,
    ) -> Result<Activity> {
        let session = require_session(ctx)?;
        let model: &Model = ctx.data()?;

        let CreateActivityInput {
            name,
            city,
            description,
            price,
        } = create_activity_input;

        let activity = NewActivity::new(name, city, description, price)
            .create(model.db(), session.user_id)
            .await
            .map_err(api_error)?;

        info!(activity_id = %activity.id, "Activity created");
        Ok(activity)
    }
}
