//! Program catalogue repository

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use crate::error::DatabaseError;

const PROGRAM_COLUMNS: &str = r#"
    program_id, code, title, abbreviation, program_type, organizers, location,
    application_deadline, start_date, end_date, description, online,
    created_at, updated_at
"#;

/// Repository for programs
#[derive(Debug, Clone)]
pub struct ProgramRepository {
    pool: PgPool,
}

impl ProgramRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn get_by_id(&self, program_id: Uuid) -> Result<ProgramRow, DatabaseError> {
        sqlx::query_as::<_, ProgramRow>(&format!(
            "SELECT {} FROM programs WHERE program_id = $1",
            PROGRAM_COLUMNS
        ))
        .bind(program_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Program", program_id))
    }

    pub async fn get_by_code(&self, code: i32) -> Result<ProgramRow, DatabaseError> {
        sqlx::query_as::<_, ProgramRow>(&format!(
            "SELECT {} FROM programs WHERE code = $1",
            PROGRAM_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| DatabaseError::not_found("Program", code))
    }

    /// Programs with the given ids; unknown ids are skipped
    pub async fn get_many(&self, program_ids: &[Uuid]) -> Result<Vec<ProgramRow>, DatabaseError> {
        if program_ids.is_empty() {
            return Ok(Vec::new());
        }
        let rows = sqlx::query_as::<_, ProgramRow>(&format!(
            "SELECT {} FROM programs WHERE program_id = ANY($1) ORDER BY start_date NULLS FIRST, code",
            PROGRAM_COLUMNS
        ))
        .bind(program_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Filtered listing
    ///
    /// Only the filters that are set are added to the WHERE clause.
    pub async fn search(&self, filter: &ProgramFilter) -> Result<Vec<ProgramRow>, DatabaseError> {
        let mut builder: QueryBuilder<'_, Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM programs WHERE TRUE", PROGRAM_COLUMNS));

        if let Some(program_type) = filter.program_type {
            builder.push(" AND program_type = ").push_bind(program_type);
        }
        if let Some(date) = filter.ends_on_or_after {
            builder.push(" AND end_date >= ").push_bind(date);
        }
        if let Some(at) = filter.deadline_on_or_after {
            builder.push(" AND application_deadline >= ").push_bind(at);
        }
        if !filter.exclude.is_empty() {
            builder
                .push(" AND NOT (program_id = ANY(")
                .push_bind(filter.exclude.clone())
                .push("))");
        }

        builder.push(if filter.order_by_deadline {
            " ORDER BY application_deadline NULLS FIRST, code"
        } else {
            " ORDER BY start_date NULLS FIRST, code"
        });

        if let Some(limit) = filter.limit {
            builder.push(" LIMIT ").push_bind(i64::from(limit));
        }

        let rows = builder
            .build_query_as::<ProgramRow>()
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn insert(&self, program: &ProgramRow) -> Result<ProgramRow, DatabaseError> {
        let row = sqlx::query_as::<_, ProgramRow>(&format!(
            r#"
            INSERT INTO programs (
                program_id, code, title, abbreviation, program_type, organizers, location,
                application_deadline, start_date, end_date, description, online,
                created_at, updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING {}
            "#,
            PROGRAM_COLUMNS
        ))
        .bind(program.program_id)
        .bind(program.code)
        .bind(&program.title)
        .bind(&program.abbreviation)
        .bind(program.program_type)
        .bind(&program.organizers)
        .bind(&program.location)
        .bind(program.application_deadline)
        .bind(program.start_date)
        .bind(program.end_date)
        .bind(&program.description)
        .bind(program.online)
        .bind(program.created_at)
        .bind(program.updated_at)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match DatabaseError::from(&e) {
            DatabaseError::DuplicateEntry(_) => {
                DatabaseError::duplicate("Program", "code", program.code)
            }
            other => other,
        })?;
        Ok(row)
    }
}

/// Filters for [`ProgramRepository::search`]
#[derive(Debug, Clone, Default)]
pub struct ProgramFilter {
    pub program_type: Option<ProgramType>,
    pub ends_on_or_after: Option<NaiveDate>,
    pub deadline_on_or_after: Option<DateTime<Utc>>,
    pub exclude: Vec<Uuid>,
    pub order_by_deadline: bool,
    pub limit: Option<u32>,
}

/// Database enum for program types
#[derive(Debug, Clone, Copy, PartialEq, Eq, sqlx::Type)]
#[sqlx(type_name = "program_type", rename_all = "lowercase")]
pub enum ProgramType {
    Workshop,
    Square,
    Meeting,
    Vworkshop,
    Vsquare,
    Community,
}

/// Row from the `programs` table
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProgramRow {
    pub program_id: Uuid,
    pub code: i32,
    pub title: String,
    pub abbreviation: Option<String>,
    pub program_type: ProgramType,
    pub organizers: serde_json::Value,
    pub location: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
