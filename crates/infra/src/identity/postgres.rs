//! Postgres-backed credential store and revocation list.
//!
//! The store ports are synchronous; each call runs its query on the ambient
//! tokio runtime via `block_in_place`, so callers must be on a multi-threaded
//! runtime.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Conflict` |
//! | Database (other) | any other | `Unavailable` |
//! | Decode / ColumnDecode | N/A | `Corrupt` |
//! | Other | N/A | `Unavailable` |

use std::future::Future;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use tracing::instrument;

use crm_auth::{
    CredentialStore, NewUser, Profile, ProfileFields, RevocationList, RoleAssignment, RoleGrant,
    RoleKind, RoleSource, RoleTarget, StoreError, TargetType, UserAccount, UserDirectory,
};
use crm_core::{ProfileId, RoleAssignmentId, UserId};

/// Schema for the identity tables (idempotent).
pub const IDENTITY_SCHEMA: &str = include_str!("../../migrations/0001_identity.sql");

/// Create the identity tables if they do not exist.
pub async fn migrate(pool: &PgPool) -> Result<(), StoreError> {
    sqlx::raw_sql(IDENTITY_SCHEMA)
        .execute(pool)
        .await
        .map_err(|e| map_sqlx_error("migrate", e))?;
    Ok(())
}

fn block_on<F, T>(fut: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    let handle = tokio::runtime::Handle::try_current().map_err(|_| {
        StoreError::Unavailable("Postgres stores require a tokio runtime".to_string())
    })?;
    tokio::task::block_in_place(|| handle.block_on(fut))
}

const USER_COLUMNS: &str =
    "id, email, first_name, last_name, password_hash, is_active, is_superuser, is_staff, date_joined";
const PROFILE_COLUMNS: &str =
    "id, user_id, surname, name, patronymic, telegram, email, course, university, vk, job";
const ROLE_COLUMNS: &str = "id, user_id, role_type, target_type, target_id";

#[derive(Debug, Clone)]
pub struct PostgresCredentialStore {
    pool: PgPool,
}

impl PostgresCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[instrument(skip(self), err)]
    async fn user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM crm_users WHERE id = $1"))
            .bind(id.get())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_id", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self, email), err)]
    async fn user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        let row = sqlx::query(&format!("SELECT {USER_COLUMNS} FROM crm_users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("find_user_by_email", e))?;
        row.as_ref().map(user_from_row).transpose()
    }

    #[instrument(skip(self), err)]
    async fn roles_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM crm_role_assignments WHERE user_id = $1 ORDER BY id"
        ))
        .bind(user.get())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("role_assignments_for", e))?;
        rows.iter().map(role_from_row).collect()
    }

    async fn insert_user(&self, user: NewUser) -> Result<UserAccount, StoreError> {
        let row = sqlx::query(&format!(
            "INSERT INTO crm_users (email, first_name, last_name, password_hash, is_active, is_superuser, is_staff) \
             VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.is_staff)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("create_user", e))?;
        user_from_row(&row)
    }

    async fn save_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE crm_users SET email = $2, first_name = $3, last_name = $4, password_hash = $5, \
             is_active = $6, is_superuser = $7, is_staff = $8 WHERE id = $1",
        )
        .bind(user.id.get())
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_active)
        .bind(user.is_superuser)
        .bind(user.is_staff)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("update_user", e))?;
        if result.rows_affected() == 0 {
            return Err(StoreError::Corrupt(format!("user {} does not exist", user.id)));
        }
        Ok(())
    }

    async fn profile_where(&self, column: &str, value: i64) -> Result<Option<Profile>, StoreError> {
        let row = sqlx::query(&format!(
            "SELECT {PROFILE_COLUMNS} FROM crm_profiles WHERE {column} = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("find_profile", e))?;
        row.as_ref().map(profile_from_row).transpose()
    }

    async fn write_profile(&self, user: UserId, f: ProfileFields) -> Result<Profile, StoreError> {
        let course = i32::try_from(f.course)
            .map_err(|_| StoreError::Corrupt(format!("course {} out of range", f.course)))?;
        let row = sqlx::query(&format!(
            "INSERT INTO crm_profiles (user_id, surname, name, patronymic, telegram, email, course, university, vk, job) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (user_id) DO UPDATE SET surname = EXCLUDED.surname, name = EXCLUDED.name, \
             patronymic = EXCLUDED.patronymic, telegram = EXCLUDED.telegram, email = EXCLUDED.email, \
             course = EXCLUDED.course, university = EXCLUDED.university, vk = EXCLUDED.vk, job = EXCLUDED.job \
             RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user.get())
        .bind(&f.surname)
        .bind(&f.name)
        .bind(&f.patronymic)
        .bind(&f.telegram)
        .bind(&f.email)
        .bind(course)
        .bind(&f.university)
        .bind(&f.vk)
        .bind(&f.job)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("upsert_profile", e))?;
        profile_from_row(&row)
    }

    async fn grant(&self, grant: RoleGrant) -> Result<RoleAssignment, StoreError> {
        // The no-op update makes RETURNING yield the existing row on conflict.
        let row = sqlx::query(&format!(
            "INSERT INTO crm_role_assignments (user_id, role_type, target_type, target_id) \
             VALUES ($1, $2, $3, $4) \
             ON CONFLICT (user_id, role_type, target_type, target_id) DO UPDATE SET role_type = EXCLUDED.role_type \
             RETURNING {ROLE_COLUMNS}"
        ))
        .bind(grant.user_id.get())
        .bind(grant.role.as_str())
        .bind(grant.target.target_type.as_str())
        .bind(grant.target.target_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("assign_role", e))?;
        role_from_row(&row)
    }

    async fn delete_role(&self, id: RoleAssignmentId) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM crm_role_assignments WHERE id = $1")
            .bind(id.get())
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("remove_role", e))?;
        Ok(result.rows_affected() > 0)
    }

    async fn all_roles(&self) -> Result<Vec<RoleAssignment>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {ROLE_COLUMNS} FROM crm_role_assignments ORDER BY id"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("list_role_assignments", e))?;
        rows.iter().map(role_from_row).collect()
    }

    async fn delete_target(&self, target: &RoleTarget) -> Result<usize, StoreError> {
        let result = sqlx::query(
            "DELETE FROM crm_role_assignments WHERE target_type = $1 AND target_id = $2",
        )
        .bind(target.target_type.as_str())
        .bind(target.target_id)
        .execute(&self.pool)
        .await
        .map_err(|e| map_sqlx_error("remove_assignments_for_target", e))?;
        Ok(result.rows_affected() as usize)
    }
}

impl UserDirectory for PostgresCredentialStore {
    fn find_user_by_id(&self, id: UserId) -> Result<Option<UserAccount>, StoreError> {
        block_on(self.user_by_id(id))
    }

    fn find_user_by_email(&self, email: &str) -> Result<Option<UserAccount>, StoreError> {
        block_on(self.user_by_email(email))
    }
}

impl RoleSource for PostgresCredentialStore {
    fn role_assignments_for(&self, user: UserId) -> Result<Vec<RoleAssignment>, StoreError> {
        block_on(self.roles_for(user))
    }
}

impl CredentialStore for PostgresCredentialStore {
    fn create_user(&self, user: NewUser) -> Result<UserAccount, StoreError> {
        block_on(self.insert_user(user))
    }

    fn update_user(&self, user: &UserAccount) -> Result<(), StoreError> {
        block_on(self.save_user(user))
    }

    fn find_profile(&self, user: UserId) -> Result<Option<Profile>, StoreError> {
        block_on(self.profile_where("user_id", user.get()))
    }

    fn find_profile_by_id(&self, id: ProfileId) -> Result<Option<Profile>, StoreError> {
        block_on(self.profile_where("id", id.get()))
    }

    fn upsert_profile(&self, user: UserId, fields: ProfileFields) -> Result<Profile, StoreError> {
        block_on(self.write_profile(user, fields))
    }

    fn assign_role(&self, grant: RoleGrant) -> Result<RoleAssignment, StoreError> {
        block_on(self.grant(grant))
    }

    fn remove_role(&self, id: RoleAssignmentId) -> Result<bool, StoreError> {
        block_on(self.delete_role(id))
    }

    fn list_role_assignments(&self) -> Result<Vec<RoleAssignment>, StoreError> {
        block_on(self.all_roles())
    }

    fn remove_assignments_for_target(&self, target: &RoleTarget) -> Result<usize, StoreError> {
        block_on(self.delete_target(target))
    }
}

/// Revocation list backed by `crm_revoked_tokens`; the primary key on `jti`
/// gives atomic add-and-check.
#[derive(Debug, Clone)]
pub struct PostgresRevocationList {
    pool: PgPool,
}

impl PostgresRevocationList {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete rows whose token has expired anyway.
    pub async fn purge_expired(&self, now: DateTime<Utc>) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM crm_revoked_tokens WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("purge_expired", e))?;
        Ok(result.rows_affected())
    }
}

impl RevocationList for PostgresRevocationList {
    fn revoke(&self, jti: &str, expires_at: DateTime<Utc>) -> Result<bool, StoreError> {
        block_on(async {
            let result = sqlx::query(
                "INSERT INTO crm_revoked_tokens (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING",
            )
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| map_sqlx_error("revoke", e))?;
            Ok(result.rows_affected() == 1)
        })
    }

    fn is_revoked(&self, jti: &str) -> Result<bool, StoreError> {
        block_on(async {
            let row = sqlx::query("SELECT 1 FROM crm_revoked_tokens WHERE jti = $1")
                .bind(jti)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| map_sqlx_error("is_revoked", e))?;
            Ok(row.is_some())
        })
    }
}

fn user_from_row(row: &PgRow) -> Result<UserAccount, StoreError> {
    Ok(UserAccount {
        id: UserId::new(row.try_get("id").map_err(corrupt)?),
        email: row.try_get("email").map_err(corrupt)?,
        first_name: row.try_get("first_name").map_err(corrupt)?,
        last_name: row.try_get("last_name").map_err(corrupt)?,
        password_hash: row.try_get("password_hash").map_err(corrupt)?,
        is_active: row.try_get("is_active").map_err(corrupt)?,
        is_superuser: row.try_get("is_superuser").map_err(corrupt)?,
        is_staff: row.try_get("is_staff").map_err(corrupt)?,
        date_joined: row.try_get("date_joined").map_err(corrupt)?,
    })
}

fn profile_from_row(row: &PgRow) -> Result<Profile, StoreError> {
    let course: i32 = row.try_get("course").map_err(corrupt)?;
    Ok(Profile {
        id: ProfileId::new(row.try_get("id").map_err(corrupt)?),
        user_id: UserId::new(row.try_get("user_id").map_err(corrupt)?),
        surname: row.try_get("surname").map_err(corrupt)?,
        name: row.try_get("name").map_err(corrupt)?,
        patronymic: row.try_get("patronymic").map_err(corrupt)?,
        telegram: row.try_get("telegram").map_err(corrupt)?,
        email: row.try_get("email").map_err(corrupt)?,
        course: u32::try_from(course)
            .map_err(|_| StoreError::Corrupt(format!("negative course {course}")))?,
        university: row.try_get("university").map_err(corrupt)?,
        vk: row.try_get("vk").map_err(corrupt)?,
        job: row.try_get("job").map_err(corrupt)?,
    })
}

fn role_from_row(row: &PgRow) -> Result<RoleAssignment, StoreError> {
    let role: String = row.try_get("role_type").map_err(corrupt)?;
    let target_type: String = row.try_get("target_type").map_err(corrupt)?;
    let target_type = TargetType::from_str(&target_type)
        .map_err(|e| StoreError::Corrupt(e.to_string()))?;
    Ok(RoleAssignment {
        id: RoleAssignmentId::new(row.try_get("id").map_err(corrupt)?),
        user_id: UserId::new(row.try_get("user_id").map_err(corrupt)?),
        role: RoleKind::new(role),
        target: RoleTarget::new(target_type, row.try_get("target_id").map_err(corrupt)?),
    })
}

fn corrupt(err: sqlx::Error) -> StoreError {
    StoreError::Corrupt(err.to_string())
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("database error in {}: {}", operation, db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(msg),
                _ => StoreError::Unavailable(msg),
            }
        }
        sqlx::Error::Decode(e) => StoreError::Corrupt(format!("decode error in {operation}: {e}")),
        sqlx::Error::ColumnDecode { index, source } => StoreError::Corrupt(format!(
            "column {index} failed to decode in {operation}: {source}"
        )),
        sqlx::Error::PoolClosed => {
            StoreError::Unavailable(format!("connection pool closed in {operation}"))
        }
        other => StoreError::Unavailable(format!("sqlx error in {operation}: {other}")),
    }
}
