//! Mutations main entry point

use async_graphql::MergedObject;
use derivative::Derivative;

mod activities;
mod auth;
mod favorites;

#[derive(Debug, MergedObject, Derivative)]
#[derivative(Default = "new")]
pub struct Mutation(
    auth::AuthMutations,
    activities::ActivitiesMutations,
    favorites::FavoritesMutations,
);
