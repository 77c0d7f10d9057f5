//! People, user accounts and the profiles linking them

use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::error::DatabaseError;

const PERSON_COLUMNS: &str = r#"
    person_id, first_name, middle_name, last_name, preferred_name, email,
    mailing_address, phone_number, orcid_id, home_page, math_review_id,
    institution, dietary_restrictions, gender, ethnicity, created_at, updated_at
"#;

const USER_COLUMNS: &str = r#"
    user_id, username, email, first_name, last_name, is_active, is_staff,
    is_superuser, permissions, orcid_id, date_joined, last_login
"#;

/// Repository for people and the accounts that sign in as them
#[derive(Debug, Clone)]
pub struct PeopleRepository {
    pool: PgPool,
}

impl PeopleRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // ========================================================================
    // People
    // ========================================================================

    pub async fn get_person(&self, person_id: Uuid) -> Result<PersonRow, DatabaseError> {
        sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {} FROM people WHERE person_id = $1",
            PERSON_COLUMNS
        ))
        .bind(person_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Person", person_id))
    }

    /// Case-insensitive email lookup
    pub async fn find_person_by_email(&self, email: &str) -> Result<Option<PersonRow>, DatabaseError> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {} FROM people WHERE lower(email) = lower($1) LIMIT 1",
            PERSON_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn find_person_by_orcid(&self, orcid_id: &str) -> Result<Option<PersonRow>, DatabaseError> {
        let row = sqlx::query_as::<_, PersonRow>(&format!(
            "SELECT {} FROM people WHERE orcid_id = $1",
            PERSON_COLUMNS
        ))
        .bind(orcid_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_person(&self, person: &PersonRow) -> Result<PersonRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_person(&mut conn, person).await
    }

    pub async fn update_person(&self, person: &PersonRow) -> Result<PersonRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        update_person(&mut conn, person).await
    }

    // ========================================================================
    // Accounts
    // ========================================================================

    pub async fn get_user(&self, user_id: Uuid) -> Result<UserRow, DatabaseError> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE user_id = $1",
            USER_COLUMNS
        ))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("User", user_id))
    }

    pub async fn find_user_by_orcid(&self, orcid_id: &str) -> Result<Option<UserRow>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE orcid_id = $1 OR username = $1 LIMIT 1",
            USER_COLUMNS
        ))
        .bind(orcid_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Oldest account with the email, case-insensitive
    pub async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRow>, DatabaseError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE lower(email) = lower($1) ORDER BY date_joined LIMIT 1",
            USER_COLUMNS
        ))
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn insert_user(&self, user: &UserRow) -> Result<UserRow, DatabaseError> {
        let mut conn = self.pool.acquire().await?;
        insert_user(&mut conn, user).await
    }

    pub async fn get_profile_for_user(&self, user_id: Uuid) -> Result<Option<ProfileRow>, DatabaseError> {
        let row = sqlx::query_as::<_, ProfileRow>(
            r#"
            SELECT profile_id, user_id, person_id, email_verified, created_at, last_login_at
            FROM user_profiles
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Writes the account, person and profile of a login in one transaction
    ///
    /// New rows are inserted, existing ones updated; the profile is keyed
    /// by its user.
    pub async fn save_login(
        &self,
        user: &UserRow,
        user_created: bool,
        person: &PersonRow,
        person_created: bool,
        profile: &ProfileRow,
    ) -> Result<(), DatabaseError> {
        let mut tx: Transaction<'_, Postgres> = self.pool.begin().await?;

        if user_created {
            insert_user(&mut tx, user).await?;
        } else {
            touch_user(&mut tx, user).await?;
        }
        if person_created {
            insert_person(&mut tx, person).await?;
        } else {
            update_person(&mut tx, person).await?;
        }

        sqlx::query(
            r#"
            INSERT INTO user_profiles (
                profile_id, user_id, person_id, email_verified, created_at, last_login_at
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                person_id = EXCLUDED.person_id,
                email_verified = EXCLUDED.email_verified,
                last_login_at = EXCLUDED.last_login_at
            "#,
        )
        .bind(profile.profile_id)
        .bind(profile.user_id)
        .bind(profile.person_id)
        .bind(profile.email_verified)
        .bind(profile.created_at)
        .bind(profile.last_login_at)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(())
    }
}

async fn insert_person(
    conn: &mut sqlx::PgConnection,
    person: &PersonRow,
) -> Result<PersonRow, DatabaseError> {
    let row = sqlx::query_as::<_, PersonRow>(&format!(
        r#"
        INSERT INTO people (
            person_id, first_name, middle_name, last_name, preferred_name, email,
            mailing_address, phone_number, orcid_id, home_page, math_review_id,
            institution, dietary_restrictions, gender, ethnicity, created_at, updated_at
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)
        RETURNING {}
        "#,
        PERSON_COLUMNS
    ))
    .bind(person.person_id)
    .bind(&person.first_name)
    .bind(&person.middle_name)
    .bind(&person.last_name)
    .bind(&person.preferred_name)
    .bind(&person.email)
    .bind(&person.mailing_address)
    .bind(&person.phone_number)
    .bind(&person.orcid_id)
    .bind(&person.home_page)
    .bind(&person.math_review_id)
    .bind(&person.institution)
    .bind(&person.dietary_restrictions)
    .bind(&person.gender)
    .bind(&person.ethnicity)
    .bind(person.created_at)
    .bind(person.updated_at)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

async fn update_person(
    conn: &mut sqlx::PgConnection,
    person: &PersonRow,
) -> Result<PersonRow, DatabaseError> {
    sqlx::query_as::<_, PersonRow>(&format!(
        r#"
        UPDATE people SET
            first_name = $2, middle_name = $3, last_name = $4, preferred_name = $5,
            email = $6, mailing_address = $7, phone_number = $8, orcid_id = $9,
            home_page = $10, math_review_id = $11, institution = $12,
            dietary_restrictions = $13, gender = $14, ethnicity = $15, updated_at = $16
        WHERE person_id = $1
        RETURNING {}
        "#,
        PERSON_COLUMNS
    ))
    .bind(person.person_id)
    .bind(&person.first_name)
    .bind(&person.middle_name)
    .bind(&person.last_name)
    .bind(&person.preferred_name)
    .bind(&person.email)
    .bind(&person.mailing_address)
    .bind(&person.phone_number)
    .bind(&person.orcid_id)
    .bind(&person.home_page)
    .bind(&person.math_review_id)
    .bind(&person.institution)
    .bind(&person.dietary_restrictions)
    .bind(&person.gender)
    .bind(&person.ethnicity)
    .bind(person.updated_at)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or_else(|| DatabaseError::not_found("Person", person.person_id))
}

async fn insert_user(conn: &mut sqlx::PgConnection, user: &UserRow) -> Result<UserRow, DatabaseError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        r#"
        INSERT INTO users (
            user_id, username, email, first_name, last_name, is_active, is_staff,
            is_superuser, permissions, orcid_id, date_joined, last_login
        ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
        RETURNING {}
        "#,
        USER_COLUMNS
    ))
    .bind(user.user_id)
    .bind(&user.username)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(user.is_active)
    .bind(user.is_staff)
    .bind(user.is_superuser)
    .bind(&user.permissions)
    .bind(&user.orcid_id)
    .bind(user.date_joined)
    .bind(user.last_login)
    .fetch_one(&mut *conn)
    .await?;
    Ok(row)
}

/// Refreshes the fields a login may change; staff flags are left alone
async fn touch_user(conn: &mut sqlx::PgConnection, user: &UserRow) -> Result<(), DatabaseError> {
    let result = sqlx::query(
        r#"
        UPDATE users SET
            email = $2, first_name = $3, last_name = $4, orcid_id = $5, last_login = $6
        WHERE user_id = $1
        "#,
    )
    .bind(user.user_id)
    .bind(&user.email)
    .bind(&user.first_name)
    .bind(&user.last_name)
    .bind(&user.orcid_id)
    .bind(user.last_login)
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DatabaseError::not_found("User", user.user_id));
    }
    Ok(())
}

/// Row from the `people` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct PersonRow {
    pub person_id: Uuid,
    pub first_name: Option<String>,
    pub middle_name: Option<String>,
    pub last_name: Option<String>,
    pub preferred_name: Option<String>,
    pub email: Option<String>,
    pub mailing_address: Option<String>,
    pub phone_number: Option<String>,
    pub orcid_id: Option<String>,
    pub home_page: Option<String>,
    pub math_review_id: Option<String>,
    pub institution: Option<String>,
    pub dietary_restrictions: Option<String>,
    pub gender: Option<String>,
    pub ethnicity: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Row from the `users` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub user_id: Uuid,
    pub username: String,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: bool,
    pub is_staff: bool,
    pub is_superuser: bool,
    pub permissions: Vec<String>,
    pub orcid_id: Option<String>,
    pub date_joined: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}

/// Row from the `user_profiles` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProfileRow {
    pub profile_id: Uuid,
    pub user_id: Uuid,
    pub person_id: Uuid,
    pub email_verified: bool,
    pub created_at: DateTime<Utc>,
    pub last_login_at: DateTime<Utc>,
}
