//! Registration and session mutations

use async_graphql::{Context, InputObject, Object, Result, SimpleObject};
use tracing::{info, instrument};

use crate::model::auth::{Session, SessionToken};
use crate::model::users::{NewUser, User, check_password_strength};
use crate::model::{Model, api_error};

#[derive(Debug, InputObject)]
pub struct SignUpInput {
    #[graphql(validator(email))]
    pub email: String,
    #[graphql(validator(min_length = 8))]
    pub password: String,
    #[graphql(validator(min_length = 1))]
    pub first_name: String,
    #[graphql(validator(min_length = 1))]
    pub last_name: String,
}

#[derive(Debug, InputObject)]
pub struct SignInInput {
    #[graphql(validator(email))]
    pub email: String,
    #[graphql(validator(min_length = 1))]
    pub password: String,
}

/// Result of logging in
#[derive(Debug, SimpleObject)]
pub struct SignIn {
    /// Token to be passed in `Authorization: Session [token]` header
    pub access_token: SessionToken,
    pub user: User,
}

#[derive(Debug, Default)]
pub struct AuthMutations;

#[Object]
impl AuthMutations {
    /// Registers a new user
    #[instrument(skip(self, ctx, sign_up_input), fields(email = %sign_up_input.email))]
    pub async fn register(&self, ctx: &Context<'_>, sign_up_input: SignUpInput) -> Result<User> {
        let model: &Model = ctx.data()?;
        check_password_strength(&sign_up_input.password).map_err(api_error)?;

        let SignUpInput {
            email,
            password,
            first_name,
            last_name,
        } = sign_up_input;

        let user = NewUser::new(email, password, first_name, last_name)
            .create(model.db())
            .await
            .map_err(api_error)?;

        info!(user_id = %user.id, "User registered");
        Ok(user)
    }

    /// Opens a new session
    ///
    /// Besides returning the token, the session cookie is set on the response.
    #[instrument(skip(self, ctx, sign_in_input), fields(email = %sign_in_input.email))]
    pub async fn login(&self, ctx: &Context<'_>, sign_in_input: SignInInput) -> Result<SignIn> {
        let model: &Model = ctx.data()?;

        let user = User::authenticate(model.db(), &sign_in_input.email, &sign_in_input.password)
            .await
            .map_err(api_error)?;
        let session = user.create_session(model.db()).await.map_err(api_error)?;

        let cookie = session.token.cookie(model.session_config());
        ctx.append_http_header("set-cookie", cookie.to_string());

        info!(user_id = %user.id, "User logged in");
        Ok(SignIn {
            access_token: session.token,
            user,
        })
    }

    /// Closes the current session and clears the session cookie
    ///
    /// Succeeds for anonymous callers as well.
    #[instrument(skip(self, ctx))]
    pub async fn logout(&self, ctx: &Context<'_>) -> Result<bool> {
        let model: &Model = ctx.data()?;

        if let Some(session) = ctx.data_opt::<Session>() {
            let user_id = session.user_id;
            session.clone().expire(model.db()).await.map_err(api_error)?;
            info!(%user_id, "User logged out");
        }

        let cookie = SessionToken::removal_cookie(model.session_config());
        ctx.append_http_header("set-cookie", cookie.to_string());

        Ok(true)
    }
}
