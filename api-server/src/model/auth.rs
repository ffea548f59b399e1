//! Authoriazation data

use std::time::Duration;

use actix_web::cookie::{Cookie, SameSite};
use actix_web::http::header::HeaderValue;
use async_graphql::scalar;
use chrono::{DateTime, TimeDelta, Utc};
use color_eyre::Result;
use color_eyre::eyre::OptionExt;
use pasetors::claims::{Claims, ClaimsValidationRules};
use pasetors::footer::Footer;
use pasetors::keys::{AsymmetricKeyPair, AsymmetricPublicKey, Generate};
use pasetors::paserk::{self, FormatAsPaserk};
use pasetors::token::UntrustedToken;
use pasetors::version4::V4;
use pasetors::{Public, public};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config;
use crate::model::users::{Role, UserId};

#[derive(Debug, Error)]
pub enum Error {
    #[error("Token doesn't exist")]
    NonExistingToken,
    #[error("Missing user id on a token")]
    MissingUserId,
    #[error("Missing token id on a token")]
    MissingTokenId,
    #[error("Missing session data")]
    MissingClaims,
    #[error("Invalid session claim {0}")]
    InvalidSessionClaim(&'static str),
    #[error("Invalid authorization format")]
    InvalidAuthorization,
    #[error("Invalid authorization scheme")]
    InvalidAuthorizationScheme,
}

/// PASETO implicit assertion for session tokens
const SESSION_APP_SECRET: &[u8] = b"ActivitiesAppSessionTokenSecret";

/// Name of the cookie carrying the session token
pub const SESSION_COOKIE: &str = "session";

/// Session data atached to Paseto session token
///
/// Session token is what actually gives access to any priviledges - logging in is there only to
/// obtain the session token.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    /// User authorized by this token
    pub user_id: UserId,
    /// Role of the user at the moment of logging in
    pub role: Role,
}

impl SessionData {
    //// Appends data to the session claims
    fn append(&self, mut claims: Claims) -> Result<Claims> {
        claims.issuer(&self.user_id.to_string())?;
        claims.add_additional("role", self.role.as_str())?;
        Ok(claims)
    }

    /// Builds session data from token claims
    fn from_claims(claims: &Claims) -> Result<Self> {
        let user_id = claims.get_claim("iss").ok_or_eyre(Error::MissingUserId)?;
        let role = claims
            .get_claim("role")
            .and_then(|role| role.as_str())
            .ok_or(Error::InvalidSessionClaim("role"))?;

        Ok(SessionData {
            user_id: user_id.as_str().ok_or_eyre(Error::MissingUserId)?.parse()?,
            role: role.parse()?,
        })
    }
}

/// Newtype for session token string
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionToken(String);

scalar!(SessionToken);

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl SessionToken {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// Extracts the token from the `Authorization: Session [token]` header value
    pub fn from_authorization(header: &str) -> Result<Self, Error> {
        let (scheme, token) = header
            .split_once(' ')
            .ok_or(Error::InvalidAuthorization)?;

        match scheme {
            "Session" => Ok(Self(token.to_owned())),
            _ => Err(Error::InvalidAuthorizationScheme),
        }
    }

    /// Authenticates a token returning session
    pub async fn authenticate(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Session> {
        Session::authenticate(db, self).await
    }

    pub fn into_header(self) -> Result<HeaderValue> {
        HeaderValue::from_str(&self.0).map_err(Into::into)
    }

    /// Http-only cookie carrying this token
    pub fn cookie(&self, config: &config::Session) -> Cookie<'static> {
        session_cookie(self.0.clone(), config)
    }

    /// Cookie instructing the client to drop the session cookie
    pub fn removal_cookie(config: &config::Session) -> Cookie<'static> {
        let mut cookie = session_cookie(String::new(), config);
        cookie.make_removal();
        cookie
    }

    /// Extracts the key id from the token footer
    fn key_id(&self) -> Result<String> {
        let token = UntrustedToken::<Public, V4>::try_from(&self.0)?;
        let mut footer = Footer::new();
        footer.parse_bytes(token.untrusted_footer())?;

        let key_id = footer
            .get_claim("kid")
            .ok_or_eyre(Error::MissingTokenId)?
            .as_str()
            .ok_or_eyre(Error::MissingTokenId)?;

        Ok(key_id.to_owned())
    }
}

fn session_cookie(value: String, config: &config::Session) -> Cookie<'static> {
    let mut cookie = Cookie::new(SESSION_COOKIE, value);
    cookie.set_path("/");
    cookie.set_http_only(true);
    cookie.set_secure(config.secure_cookie);
    cookie.set_same_site(SameSite::Lax);
    if let Some(domain) = &config.cookie_domain {
        cookie.set_domain(domain.clone());
    }
    cookie
}

/// Session data
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// User ID for this session
    pub user_id: UserId,
    /// User role for this session
    pub role: Role,
    /// Session token
    pub token: SessionToken,
    /// Session expiration time
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Creates a new session for given user storing it in DB
    pub async fn create(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        user_id: UserId,
        role: Role,
    ) -> Result<Self> {
        let (session, kid, pk) = Self::new(user_id, role)?;

        sqlx::query("insert into session_tokens (id, public_key, expires_at) values (?, ?, ?)")
            .bind(kid)
            .bind(pk)
            .bind(session.expires_at)
            .execute(db)
            .await?;

        Ok(session)
    }

    /// Verifies a session token, returnign the authenticated session on success
    pub async fn authenticate(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        session_token: SessionToken,
    ) -> Result<Self> {
        let key_id = session_token.key_id()?;

        let (key,): (String,) =
            sqlx::query_as("select public_key from session_tokens where id = ?")
                .bind(key_id)
                .fetch_optional(db)
                .await?
                .ok_or_eyre(Error::NonExistingToken)?;

        let key = AsymmetricPublicKey::<V4>::try_from(key.as_str())?;

        let token = UntrustedToken::<Public, V4>::try_from(&session_token.0)?;
        let rules = ClaimsValidationRules::new();
        let token = public::verify(&key, &token, &rules, None, Some(SESSION_APP_SECRET))?;

        let claims = token.payload_claims().ok_or_eyre(Error::MissingClaims)?;
        let session = SessionData::from_claims(claims)?;

        Ok(Self {
            user_id: session.user_id,
            role: session.role,
            token: session_token,
            expires_at: expires_at(claims)?,
        })
    }

    /// Checks if the session expires in less than `period`
    pub fn expires_within(&self, period: TimeDelta) -> bool {
        self.expires_at - Utc::now() < period
    }

    /// Expires session removing it's entry in database
    pub async fn expire(self, db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>) -> Result<()> {
        let key_id = self.token.key_id()?;

        sqlx::query("delete from session_tokens where id = ?")
            .bind(key_id)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Refreshes the session creating a new one, and updating the database entry to use new `key_id` and `public_key`.
    pub async fn refresh(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Self> {
        let prev_kid = self.token.key_id()?;
        let (session, kid, pk) = Self::new(self.user_id, self.role)?;

        sqlx::query(
            "update session_tokens set id = ?, public_key = ?, expires_at = ? where id = ?",
        )
        .bind(kid)
        .bind(pk)
        .bind(session.expires_at)
        .bind(prev_kid)
        .execute(db)
        .await?;

        Ok(session)
    }

    /// Cleans expired sessions from database.
    pub async fn cleanup(db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>) -> Result<()> {
        let now = Utc::now();
        sqlx::query("delete from session_tokens where expires_at < ?")
            .bind(now)
            .execute(db)
            .await?;
        Ok(())
    }

    /// Creates new session for an user.
    ///
    /// The session data are not stored in the database. The `(session, key_id, public_key)` tuple is returned instead
    /// for the purpose of storing the session.
    fn new(user_id: UserId, role: Role) -> Result<(Self, String, String)> {
        let key_pair = AsymmetricKeyPair::<V4>::generate()?;
        let key_id = paserk::Id::from(&key_pair.public);

        let session = SessionData { user_id, role };
        let valid_duration = Duration::from_hours(24);

        let claims = Claims::new_expires_in(&valid_duration)?;
        let claims = session.append(claims)?;
        let expires_at = expires_at(&claims)?;

        // Key id collisions are ignored - they are extremely unlikely, and the worst outcome is
        // that someone elses session expires.
        let mut kid = String::new();
        key_id.fmt(&mut kid)?;

        let mut pk = String::new();
        key_pair.public.fmt(&mut pk)?;

        let mut footer = Footer::new();
        footer.key_id(&key_id);

        let token = public::sign(
            &key_pair.secret,
            &claims,
            Some(&footer),
            Some(SESSION_APP_SECRET),
        )?;

        let session = Self {
            user_id,
            role,
            token: SessionToken(token),
            expires_at,
        };

        Ok((session, kid, pk))
    }
}

/// Retrieves `expires_at` from the session claims.
fn expires_at(claims: &Claims) -> Result<DateTime<Utc>> {
    let expires_at = claims
        .get_claim("exp")
        .and_then(|expires_at| expires_at.as_str())
        .ok_or(Error::InvalidSessionClaim("exp"))?;
    expires_at.parse().map_err(Into::into)
}
