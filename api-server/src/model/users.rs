//! Service users storage

use async_graphql::{Enum, SimpleObject, scalar};
use base64::prelude::*;
use color_eyre::eyre::{Result, ensure};
use serde::{Deserialize, Serialize};
use sha3::{Digest, Sha3_256};
use sqlx::prelude::{FromRow, Type};
use thiserror::Error;
use uuid::Uuid;

use crate::model::activities::ActivityId;
use crate::model::auth::Session;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("Invalid user id format")]
    InvalidUserId,
    #[error("Invalid user role: {0}")]
    InvalidRole(String),
    #[error("User not found")]
    NotFound,
    #[error("Email already exists")]
    EmailTaken,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error(
        "Password must contain at least one lowercase letter, one uppercase letter, and one number"
    )]
    WeakPassword,
}

/// Secret mixed into every password digest. Like the session secret it should eventually be
/// provided at build time.
const PASSWORD_APP_SECRET: &str = "ActivitiesAppPasswordSecret";

/// Columns making up the `User` row, in `FromRow` order
pub(crate) const USER_COLUMNS: &str =
    "id, email, first_name, last_name, role, favorite_activity_ids";

/// Newtype for user id
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(transparent)]
#[serde(transparent)]
pub struct UserId(Uuid);

scalar!(UserId);

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for UserId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let id = Uuid::parse_str(s).map_err(|_| Error::InvalidUserId)?;
        Ok(Self(id))
    }
}

impl UserId {
    /// Fetches `User` with this id from database
    pub async fn fetch(
        self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Option<User>> {
        User::fetch(db, self).await
    }

    /// Random id, not pointing to any stored user
    #[cfg(test)]
    pub fn random() -> Self {
        Self(Uuid::new_v4())
    }
}

/// User privileges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Enum, Type)]
#[sqlx(rename_all = "UPPERCASE")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "USER",
            Self::Admin => "ADMIN",
        }
    }
}

impl std::str::FromStr for Role {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USER" => Ok(Self::User),
            "ADMIN" => Ok(Self::Admin),
            _ => Err(Error::InvalidRole(s.to_owned())),
        }
    }
}

/// User queryable data
#[derive(Debug, Clone, PartialEq, SimpleObject, FromRow)]
pub struct User {
    pub id: UserId,
    /// Login, unique in the system
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    /// Favorite activities, in the order chosen by the user
    #[sqlx(json)]
    pub favorite_activity_ids: Vec<ActivityId>,
}

impl User {
    /// Fetches user from the database
    pub async fn fetch(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        user_id: UserId,
    ) -> Result<Option<Self>> {
        let user = sqlx::query_as(&format!("select {USER_COLUMNS} from users where id = ?"))
            .bind(user_id)
            .fetch_optional(db)
            .await?;

        Ok(user)
    }

    /// Verifies user credentials, returning the user on success
    ///
    /// Unknown email and wrong password are indistinguishable for the caller.
    pub async fn authenticate(
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
        email: &str,
        password: &str,
    ) -> Result<Self> {
        let row: Option<CredentialsRow> = sqlx::query_as(&format!(
            "select {USER_COLUMNS}, password_salt, password_digest from users where email = ?"
        ))
        .bind(email)
        .fetch_optional(db)
        .await?;

        let row = row.ok_or(Error::InvalidCredentials)?;
        let credentials = Credentials {
            salt: row.password_salt,
            digest: row
                .password_digest
                .try_into()
                .map_err(|_| Error::InvalidCredentials)?,
        };

        ensure!(credentials.verify(password), Error::InvalidCredentials);
        Ok(row.user)
    }

    /// Number of registered users
    pub async fn count(db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("select count(*) from users")
            .fetch_one(db)
            .await?;
        Ok(count)
    }

    /// Creates a session for this user
    pub async fn create_session(
        &self,
        db: impl sqlx::Executor<'_, Database = sqlx::Sqlite>,
    ) -> Result<Session> {
        Session::create(db, self.id, self.role).await
    }
}

/// Data of a user to be registered
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
}

impl NewUser {
    /// Helper to create a regular user
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            role: Role::User,
        }
    }

    pub fn with_role(self, role: Role) -> Self {
        Self { role, ..self }
    }

    /// Creates user in the database
    pub async fn create(self, db: impl sqlx::Acquire<'_, Database = sqlx::Sqlite>) -> Result<User> {
        let mut conn = db.acquire().await?;

        let (taken,): (bool,) = sqlx::query_as("select exists(select 1 from users where email = ?)")
            .bind(&self.email)
            .fetch_one(&mut *conn)
            .await?;
        ensure!(!taken, Error::EmailTaken);

        let user_id = UserId(Uuid::new_v4());
        let credentials = Credentials::generate(&self.password);

        sqlx::query(
            "insert into users(id, email, first_name, last_name, role, password_salt, password_digest)\
             values (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&self.email)
        .bind(&self.first_name)
        .bind(&self.last_name)
        .bind(self.role)
        .bind(credentials.salt)
        .bind(credentials.digest.as_slice())
        .execute(&mut *conn)
        .await?;

        Ok(User {
            id: user_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role: self.role,
            favorite_activity_ids: vec![],
        })
    }
}

/// Checks if password mixes lowercase letters, uppercase letters and digits
pub fn check_password_strength(password: &str) -> Result<()> {
    let lowercase = password.chars().any(|c| c.is_ascii_lowercase());
    let uppercase = password.chars().any(|c| c.is_ascii_uppercase());
    let digit = password.chars().any(|c| c.is_ascii_digit());

    ensure!(lowercase && uppercase && digit, Error::WeakPassword);
    Ok(())
}

#[derive(FromRow)]
struct CredentialsRow {
    #[sqlx(flatten)]
    user: User,
    password_salt: Uuid,
    password_digest: Vec<u8>,
}

/// Stored password data
///
/// The password itself is never stored. The digest is a hash of `{APP_SECRET}.{salt}.{password}`
/// where the salt is a random Uuid generated per user and compressed with Base64, so equal
/// passwords of different users produce different digests.
#[derive(Debug, Clone)]
struct Credentials {
    salt: Uuid,
    digest: [u8; 32],
}

impl Credentials {
    fn generate(password: &str) -> Self {
        let salt = Uuid::new_v4();
        let digest = Self::digest(salt, password);
        Self { salt, digest }
    }

    fn digest(salt: Uuid, password: &str) -> [u8; 32] {
        let salt = BASE64_STANDARD.encode(salt.as_bytes());
        let data = format!("{PASSWORD_APP_SECRET}.{salt}.{password}");

        let mut hasher = Sha3_256::new();
        hasher.update(data.as_bytes());
        hasher.finalize().into()
    }

    fn verify(&self, password: &str) -> bool {
        Self::digest(self.salt, password) == self.digest
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::SqlitePool;

    async fn setup_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("model/migrations").run(&pool).await.unwrap();
        pool
    }

    fn user1() -> NewUser {
        NewUser::new("user1@test.fr", "Password1", "John", "Doe")
    }

    #[tokio::test]
    async fn users_empty_initially() {
        let pool = setup_pool().await;
        assert_eq!(User::count(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn creating_users() {
        let pool = setup_pool().await;

        let user1 = user1().create(&pool).await.unwrap();
        assert_eq!(user1.role, Role::User);
        assert!(user1.favorite_activity_ids.is_empty());
        assert_eq!(user1.id.fetch(&pool).await.unwrap().unwrap(), user1);

        let user2 = NewUser::new("admin@test.fr", "Password1", "Jane", "Doe")
            .with_role(Role::Admin)
            .create(&pool)
            .await
            .unwrap();
        assert_ne!(user1.id, user2.id);
        assert_eq!(user2.id.fetch(&pool).await.unwrap().unwrap().role, Role::Admin);

        assert_eq!(User::count(&pool).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn email_cannot_collide() {
        let pool = setup_pool().await;

        user1().create(&pool).await.unwrap();
        let err = NewUser::new("user1@test.fr", "Other1pass", "Other", "User")
            .create(&pool)
            .await
            .unwrap_err();

        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::EmailTaken));
        assert_eq!(User::count(&pool).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn authenticate_with_valid_password() {
        let pool = setup_pool().await;

        let user = user1().create(&pool).await.unwrap();
        let authenticated = User::authenticate(&pool, "user1@test.fr", "Password1")
            .await
            .unwrap();

        assert_eq!(authenticated, user);
    }

    #[tokio::test]
    async fn authenticate_with_invalid_credentials_fails() {
        let pool = setup_pool().await;
        user1().create(&pool).await.unwrap();

        let err = User::authenticate(&pool, "user1@test.fr", "password1")
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::InvalidCredentials));

        let err = User::authenticate(&pool, "nobody@test.fr", "Password1")
            .await
            .unwrap_err();
        assert_eq!(err.downcast_ref::<Error>(), Some(&Error::InvalidCredentials));
    }

    #[tokio::test]
    async fn arbitrary_user_is_not_fetched() {
        let pool = setup_pool().await;
        let user = UserId::random().fetch(&pool).await.unwrap();
        assert!(user.is_none());
    }

    #[test]
    fn password_strength() {
        check_password_strength("Password1").unwrap();
        assert!(check_password_strength("password1").is_err());
        assert!(check_password_strength("PASSWORD1").is_err());
        assert!(check_password_strength("Password").is_err());
    }

    #[test]
    fn role_roundtrips_through_str() {
        assert_eq!("ADMIN".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!(Role::User.as_str().parse::<Role>().unwrap(), Role::User);
        assert_eq!(
            "root".parse::<Role>().unwrap_err(),
            Error::InvalidRole("root".to_owned())
        );
    }
}
