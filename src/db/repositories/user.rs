use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use tokio::task;

use crate::config::SecurityConfig;
use crate::entities::{password_history, users};

/// How many previous hashes are retained (and checked) per user
pub const PASSWORD_HISTORY_DEPTH: u64 = 100;

/// User data returned from repository (without sensitive password hash)
#[derive(Debug, Clone)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub position: String,
    pub role: String,
    pub profile_picture: Option<String>,
    pub must_change_password: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl From<users::Model> for User {
    fn from(model: users::Model) -> Self {
        Self {
            id: model.id,
            username: model.username,
            last_name: model.last_name,
            first_name: model.first_name,
            middle_name: model.middle_name,
            position: model.position,
            role: model.role,
            profile_picture: model.profile_picture,
            must_change_password: model.must_change_password,
            created_at: model.created_at,
            updated_at: model.updated_at,
        }
    }
}

/// Fields for creating a user (password still in the clear, hashed here)
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password: String,
    pub last_name: String,
    pub first_name: String,
    pub middle_name: String,
    pub position: String,
    pub role: String,
}

/// Partial update for a user; `None` leaves the column untouched
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub username: Option<String>,
    pub last_name: Option<String>,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub position: Option<String>,
    pub role: Option<String>,
    pub profile_picture: Option<Option<String>>,
}

impl UserUpdate {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.last_name.is_none()
            && self.first_name.is_none()
            && self.middle_name.is_none()
            && self.position.is_none()
            && self.role.is_none()
            && self.profile_picture.is_none()
    }
}

#[derive(Debug, Clone, serde::Serialize)]
pub struct UserStats {
    pub total_users: u64,
    pub admin_count: u64,
    pub user_count: u64,
    pub pending_password_change: u64,
    pub users_with_picture: u64,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Get user by username
    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")?;

        Ok(user.map(User::from))
    }

    /// Get user by ID
    pub async fn get_by_id(&self, id: i32) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")?;

        Ok(user.map(User::from))
    }

    /// Verify a login attempt, returning the user on success.
    /// Note: This uses `spawn_blocking` because Argon2 verification is
    /// CPU-intensive and would block the async runtime if run directly.
    pub async fn verify_credentials(
        &self,
        username: &str,
        password: &str,
    ) -> Result<Option<User>> {
        let user = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let hash = user.password_hash.clone();
        let password = password.to_string();
        let is_valid = task::spawn_blocking(move || verify_hash(&password, &hash))
            .await
            .context("Password verification task panicked")??;

        Ok(is_valid.then(|| User::from(user)))
    }

    /// Verify the current password of an already-identified user
    pub async fn verify_password_for_id(&self, user_id: i32, password: &str) -> Result<bool> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password verification")?;

        let Some(user) = user else {
            return Ok(false);
        };

        let hash = user.password_hash;
        let password = password.to_string();
        let is_valid = task::spawn_blocking(move || verify_hash(&password, &hash))
            .await
            .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Create a user and record the initial hash in the history window
    pub async fn create(&self, new_user: NewUser, config: &SecurityConfig) -> Result<User> {
        let password = new_user.password.clone();
        let config = config.clone();
        let password_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let active = users::ActiveModel {
            username: Set(new_user.username),
            password_hash: Set(password_hash.clone()),
            last_name: Set(new_user.last_name),
            first_name: Set(new_user.first_name),
            middle_name: Set(new_user.middle_name),
            position: Set(new_user.position),
            role: Set(new_user.role),
            profile_picture: Set(None),
            must_change_password: Set(true),
            created_at: Set(now.clone()),
            updated_at: Set(now.clone()),
            ..Default::default()
        };

        let res = users::Entity::insert(active).exec(&txn).await?;
        let user_id = res.last_insert_id;

        let history = password_history::ActiveModel {
            user_id: Set(user_id),
            password_hash: Set(password_hash),
            created_at: Set(now),
            ..Default::default()
        };
        password_history::Entity::insert(history).exec(&txn).await?;

        txn.commit().await?;

        self.prune_history(user_id).await?;

        self.get_by_id(user_id)
            .await?
            .context("User vanished right after insert")
    }

    /// Apply a partial update to profile fields
    pub async fn update(&self, user_id: i32, update: UserUpdate) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for update")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let mut active: users::ActiveModel = user.into();
        if let Some(username) = update.username {
            active.username = Set(username);
        }
        if let Some(last_name) = update.last_name {
            active.last_name = Set(last_name);
        }
        if let Some(first_name) = update.first_name {
            active.first_name = Set(first_name);
        }
        if let Some(middle_name) = update.middle_name {
            active.middle_name = Set(middle_name);
        }
        if let Some(position) = update.position {
            active.position = Set(position);
        }
        if let Some(role) = update.role {
            active.role = Set(role);
        }
        if let Some(profile_picture) = update.profile_picture {
            active.profile_picture = Set(profile_picture);
        }
        active.updated_at = Set(chrono::Utc::now().to_rfc3339());

        let updated = active.update(&self.conn).await?;
        Ok(Some(User::from(updated)))
    }

    /// Delete a user; `password_history`, `refresh_tokens` and `qr_tokens`
    /// rows follow via cascade.
    pub async fn delete(&self, user_id: i32) -> Result<bool> {
        let result = users::Entity::delete_by_id(user_id)
            .exec(&self.conn)
            .await
            .context("Failed to delete user")?;

        Ok(result.rows_affected > 0)
    }

    /// Username uniqueness probe for friendly 409s before insert
    pub async fn username_exists(&self, username: &str) -> Result<bool> {
        let count = users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .count(&self.conn)
            .await
            .context("Failed to count users by username")?;

        Ok(count > 0)
    }

    /// Paged listing with optional search (username/first/last name) and
    /// role filter. Returns `(users, total_matching)`.
    pub async fn list(
        &self,
        page: u64,
        limit: u64,
        search: Option<&str>,
        role: Option<&str>,
    ) -> Result<(Vec<User>, u64)> {
        let mut query = users::Entity::find().order_by_desc(users::Column::CreatedAt);

        if let Some(term) = search {
            query = query.filter(
                Condition::any()
                    .add(users::Column::Username.contains(term))
                    .add(users::Column::FirstName.contains(term))
                    .add(users::Column::LastName.contains(term)),
            );
        }

        if let Some(role) = role {
            query = query.filter(users::Column::Role.eq(role));
        }

        let paginator = query.paginate(&self.conn, limit);
        let total = paginator.num_items().await?;
        let items = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((items.into_iter().map(User::from).collect(), total))
    }

    pub async fn stats(&self) -> Result<UserStats> {
        let total_users = users::Entity::find().count(&self.conn).await?;
        let admin_count = users::Entity::find()
            .filter(users::Column::Role.eq("admin"))
            .count(&self.conn)
            .await?;
        let user_count = users::Entity::find()
            .filter(users::Column::Role.eq("user"))
            .count(&self.conn)
            .await?;
        let pending_password_change = users::Entity::find()
            .filter(users::Column::MustChangePassword.eq(true))
            .count(&self.conn)
            .await?;
        let users_with_picture = users::Entity::find()
            .filter(users::Column::ProfilePicture.is_not_null())
            .count(&self.conn)
            .await?;

        Ok(UserStats {
            total_users,
            admin_count,
            user_count,
            pending_password_change,
            users_with_picture,
        })
    }

    // ========================================================================
    // Password History
    // ========================================================================

    /// Check a candidate password against the retained history, newest
    /// first, stopping at the first match.
    pub async fn is_password_reused(&self, user_id: i32, candidate: &str) -> Result<bool> {
        let hashes: Vec<String> = password_history::Entity::find()
            .select_only()
            .column(password_history::Column::PasswordHash)
            .filter(password_history::Column::UserId.eq(user_id))
            .order_by_desc(password_history::Column::CreatedAt)
            .order_by_desc(password_history::Column::Id)
            .limit(PASSWORD_HISTORY_DEPTH)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query password history")?;

        if hashes.is_empty() {
            return Ok(false);
        }

        let candidate = candidate.to_string();
        let reused = task::spawn_blocking(move || {
            for hash in &hashes {
                if verify_hash(&candidate, hash)? {
                    return Ok(true);
                }
            }
            Ok::<bool, anyhow::Error>(false)
        })
        .await
        .context("Password history comparison task panicked")??;

        Ok(reused)
    }

    /// Replace a user's password after self-service change. The new hash
    /// lands on the user row and the OLD hash is appended to history, both
    /// in one transaction; `must_change_password` is cleared.
    pub async fn change_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password change")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let old_hash = user.password_hash.clone();
        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.must_change_password = Set(false);
        active.updated_at = Set(now.clone());
        let updated = active.update(&txn).await?;

        let history = password_history::ActiveModel {
            user_id: Set(user_id),
            password_hash: Set(old_hash),
            created_at: Set(now),
            ..Default::default()
        };
        password_history::Entity::insert(history).exec(&txn).await?;

        txn.commit().await?;

        self.prune_history(user_id).await?;

        Ok(Some(User::from(updated)))
    }

    /// Admin-forced reset: same shape as `change_password` but re-arms
    /// `must_change_password` so the owner rotates at next login.
    pub async fn reset_password(
        &self,
        user_id: i32,
        new_password: &str,
        config: &SecurityConfig,
    ) -> Result<Option<User>> {
        let user = users::Entity::find_by_id(user_id)
            .one(&self.conn)
            .await
            .context("Failed to query user for password reset")?;

        let Some(user) = user else {
            return Ok(None);
        };

        let old_hash = user.password_hash.clone();
        let password = new_password.to_string();
        let config = config.clone();
        let new_hash = task::spawn_blocking(move || hash_password(&password, Some(&config)))
            .await
            .context("Password hashing task panicked")??;

        let now = chrono::Utc::now().to_rfc3339();

        let txn = self.conn.begin().await?;

        let mut active: users::ActiveModel = user.into();
        active.password_hash = Set(new_hash);
        active.must_change_password = Set(true);
        active.updated_at = Set(now.clone());
        let updated = active.update(&txn).await?;

        let history = password_history::ActiveModel {
            user_id: Set(user_id),
            password_hash: Set(old_hash),
            created_at: Set(now),
            ..Default::default()
        };
        password_history::Entity::insert(history).exec(&txn).await?;

        txn.commit().await?;

        self.prune_history(user_id).await?;

        Ok(Some(User::from(updated)))
    }

    /// Drop history rows older than the newest `PASSWORD_HISTORY_DEPTH`
    async fn prune_history(&self, user_id: i32) -> Result<()> {
        let keep: Vec<i32> = password_history::Entity::find()
            .select_only()
            .column(password_history::Column::Id)
            .filter(password_history::Column::UserId.eq(user_id))
            .order_by_desc(password_history::Column::CreatedAt)
            .order_by_desc(password_history::Column::Id)
            .limit(PASSWORD_HISTORY_DEPTH)
            .into_tuple()
            .all(&self.conn)
            .await
            .context("Failed to query history ids for pruning")?;

        password_history::Entity::delete_many()
            .filter(password_history::Column::UserId.eq(user_id))
            .filter(password_history::Column::Id.is_not_in(keep))
            .exec(&self.conn)
            .await
            .context("Failed to prune password history")?;

        Ok(())
    }

    /// History row count for a user (test and stats support)
    pub async fn history_len(&self, user_id: i32) -> Result<u64> {
        let count = password_history::Entity::find()
            .filter(password_history::Column::UserId.eq(user_id))
            .count(&self.conn)
            .await
            .context("Failed to count password history")?;

        Ok(count)
    }
}

/// Verify a candidate password against a stored PHC-format hash
fn verify_hash(candidate: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

    let argon2 = Argon2::default();
    Ok(argon2
        .verify_password(candidate.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Hash a password using Argon2id with optional custom params.
/// If config is None, uses default (high memory) params.
pub fn hash_password(password: &str, config: Option<&SecurityConfig>) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let argon2 = if let Some(cfg) = config {
        let params = Params::new(
            cfg.argon2_memory_cost_kib,
            cfg.argon2_time_cost,
            cfg.argon2_parallelism,
            None, // output length (use default)
        )
        .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
        Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
    } else {
        Argon2::default()
    };

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}
