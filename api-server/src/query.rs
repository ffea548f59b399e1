//! Main query entry point

use async_graphql::MergedObject;
use derivative::Derivative;

mod activities;
mod me;

#[derive(Debug, MergedObject, Derivative)]
#[derivative(Default = "new")]
pub struct Query(activities::ActivitiesQueries, me::MeQueries);
