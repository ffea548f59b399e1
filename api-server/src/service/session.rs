//! Session management
//!
//! The session token is taken from the `Authorization: Session [token]` header, or from the
//! session cookie if there is no such header. A broken header rejects the request, while a broken
//! cookie is ignored and the request proceeds as anonymous. Sessions close to expiration are
//! replaced with fresh ones, and the new token is returned in the `x-session-token` header.

use actix_web::body::MessageBody;
use actix_web::dev::{ServiceRequest, ServiceResponse};
use actix_web::error::{ErrorInternalServerError, ErrorUnauthorized};
use actix_web::http::header::{self, HeaderName};
use actix_web::middleware::Next;
use actix_web::web::Data;
use actix_web::{Error, HttpMessage};
use chrono::TimeDelta;
use tracing::debug;

use crate::model::Model;
use crate::model::auth::{SESSION_COOKIE, Session, SessionToken};

const SESSION_TOKEN_HEADER: HeaderName = HeaderName::from_static("x-session-token");

/// Sessions expiring sooner than this are refreshed
const REFRESH_PERIOD: TimeDelta = TimeDelta::hours(1);

/// Where the session token came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenSource {
    Header,
    Cookie,
}

/// Authenticates the session from the `Authorization` header
async fn header_session(model: &Model, auth_header: &str) -> Result<Session, Error> {
    let token = SessionToken::from_authorization(auth_header)
        .map_err(|err| ErrorUnauthorized(err.to_string()))?;

    token
        .authenticate(model.db())
        .await
        .map_err(|err| ErrorUnauthorized(err.to_string()))
}

pub async fn middleware<B>(req: ServiceRequest, next: Next<B>) -> Result<ServiceResponse<B>, Error>
where
    B: MessageBody + 'static,
{
    let model: Data<Model> = req
        .app_data()
        .cloned()
        .ok_or_else(|| ErrorInternalServerError("Missing model"))?;

    let session = match req.headers().get(header::AUTHORIZATION) {
        Some(auth_header) => {
            let auth_header = auth_header
                .to_str()
                .map_err(|err| ErrorUnauthorized(err.to_string()))?;

            let session = header_session(&model, auth_header).await?;
            Some((session, TokenSource::Header))
        }
        None => match req.cookie(SESSION_COOKIE) {
            Some(cookie) => match SessionToken::new(cookie.value())
                .authenticate(model.db())
                .await
            {
                Ok(session) => Some((session, TokenSource::Cookie)),
                Err(err) => {
                    debug!(error = %err, "Ignoring invalid session cookie");
                    None
                }
            },
            None => None,
        },
    };

    let mut refreshed = None;
    if let Some((mut session, source)) = session {
        if session.expires_within(REFRESH_PERIOD) {
            session = session
                .refresh(model.db())
                .await
                .map_err(|err| ErrorInternalServerError(err.to_string()))?;

            debug!(user_id = %session.user_id, "Session refreshed");
            refreshed = Some((session.token.clone(), source));
        }

        req.extensions_mut().insert::<Session>(session);
    }

    let mut response = next.call(req).await?;
    if let Some((token, source)) = refreshed {
        if source == TokenSource::Cookie {
            response
                .response_mut()
                .add_cookie(&token.cookie(model.session_config()))
                .map_err(|err| ErrorInternalServerError(err.to_string()))?;
        }

        let header_value = token
            .into_header()
            .map_err(|err| ErrorInternalServerError(err.to_string()))?;
        response
            .headers_mut()
            .insert(SESSION_TOKEN_HEADER, header_value);
    }
    Ok(response)
}
