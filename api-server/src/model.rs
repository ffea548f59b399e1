//! Service global context

use std::path::PathBuf;
use std::str::FromStr;

use color_eyre::{Report, Result};

pub mod activities;
pub mod auth;
pub mod favorites;
pub mod seed;
pub mod users;

use async_graphql::{Context, EmptySubscription, ErrorExtensions};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use thiserror::Error;
use tracing::error;

use crate::config;
use crate::model::auth::Session;
use crate::mutation::Mutation;
use crate::query::Query;
use crate::service::Schema;

#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error("Invalid SQLite path: {path}")]
    InvalidSQLitePath { path: PathBuf },
}

/// Context for GraphQL schema
#[derive(Clone)]
pub struct Model {
    /// Database access
    db: sqlx::SqlitePool,
    /// Session cookie settings
    session: config::Session,
}

impl Model {
    /// Context for testing purposes - using the in-memory SQLite database
    pub async fn test() -> Result<Self> {
        let db = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_lazy_with(in_memory()?);

        sqlx::migrate!("model/migrations").run(&db).await?;

        Ok(Self {
            db,
            session: config::Session::default(),
        })
    }

    /// Context from configuration
    ///
    /// If the database is created in-memory, the migrations are being executed automatically. If database is
    /// file based migrations would be executed only if requested by configuration.
    pub async fn with_config(db: config::Database, session: config::Session) -> Result<Self> {
        use config::Database::*;

        let db = match db {
            Memory { max_connections } => {
                // The database lives as long as any connection to it does
                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .idle_timeout(None)
                    .max_lifetime(None)
                    .connect_lazy_with(in_memory()?);

                sqlx::migrate!("model/migrations").run(&pool).await?;
                pool
            }

            SqLite {
                path,
                max_connections,
                migrate,
            } => {
                let path = path
                    .as_path()
                    .to_str()
                    .ok_or_else(|| Error::InvalidSQLitePath { path: path.clone() })?;

                let opts = SqliteConnectOptions::new()
                    .filename(path)
                    .create_if_missing(true)
                    .foreign_keys(true);

                let pool = SqlitePoolOptions::new()
                    .max_connections(max_connections)
                    .connect_lazy_with(opts);

                if migrate {
                    sqlx::migrate!("model/migrations").run(&pool).await?;
                }

                pool
            }
        };

        Ok(Self { db, session })
    }

    /// Buids schema with attached context
    pub fn schema(&self) -> Schema {
        Schema::build(Query::new(), Mutation::new(), EmptySubscription)
            .data(self.clone())
            .finish()
    }

    /// Accesses the DB pool
    pub fn db(&self) -> &sqlx::SqlitePool {
        &self.db
    }

    /// Session cookie settings
    pub fn session_config(&self) -> &config::Session {
        &self.session
    }

    /// Performs cleanup on the model
    pub async fn cleanup(&self) -> Result<()> {
        Session::cleanup(&self.db).await
    }
}

/// Connection options for a fresh in-memory database shared by all connections of a pool
fn in_memory() -> Result<SqliteConnectOptions> {
    let opts = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
    Ok(opts)
}

/// Session of the calling user, failing for anonymous requests
pub fn require_session<'a>(ctx: &Context<'a>) -> async_graphql::Result<&'a Session> {
    ctx.data_opt::<Session>().ok_or_else(|| {
        async_graphql::Error::new("Unauthorized")
            .extend_with(|_, ext| ext.set("code", "UNAUTHENTICATED"))
    })
}

/// Translates a model failure into GraphQL error carrying the `code` extension
///
/// Errors not recognized as caller mistakes are logged and reported with a generic message.
pub fn api_error(report: Report) -> async_graphql::Error {
    let code = if let Some(err) = report.downcast_ref::<favorites::Error>() {
        match err {
            favorites::Error::UserNotFound | favorites::Error::ActivityNotFound(_) => "NOT_FOUND",
            favorites::Error::InvalidOrder => "BAD_USER_INPUT",
        }
    } else if let Some(err) = report.downcast_ref::<users::Error>() {
        match err {
            users::Error::NotFound => "NOT_FOUND",
            users::Error::InvalidCredentials => "UNAUTHENTICATED",
            _ => "BAD_USER_INPUT",
        }
    } else if report.downcast_ref::<activities::Error>().is_some() {
        "NOT_FOUND"
    } else {
        error!(error = ?report, "Request failed");
        return async_graphql::Error::new("Internal server error")
            .extend_with(|_, ext| ext.set("code", "INTERNAL_SERVER_ERROR"));
    };

    async_graphql::Error::new(report.to_string()).extend_with(|_, ext| ext.set("code", code))
}
