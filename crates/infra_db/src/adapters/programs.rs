//! PostgreSQL Program Adapter

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};

use core_kernel::{DomainPort, HealthCheckResult, HealthCheckable, PortError, ProgramId};
use domain_programs::{Organizer, Program, ProgramOrder, ProgramPort, ProgramQuery, ProgramType};

use crate::error::DatabaseError;
use crate::repositories::programs::{
    ProgramFilter, ProgramRepository, ProgramRow, ProgramType as DbProgramType,
};

/// PostgreSQL-backed implementation of the ProgramPort trait
#[derive(Debug, Clone)]
pub struct PostgresProgramAdapter {
    repository: ProgramRepository,
    pool: PgPool,
}

impl PostgresProgramAdapter {
    pub fn new(pool: PgPool) -> Self {
        Self {
            repository: ProgramRepository::new(pool.clone()),
            pool,
        }
    }
}

impl DomainPort for PostgresProgramAdapter {}

#[async_trait]
impl HealthCheckable for PostgresProgramAdapter {
    async fn health_check(&self) -> HealthCheckResult {
        super::check_pool(&self.pool, "postgres-program-adapter").await
    }
}

#[async_trait]
impl ProgramPort for PostgresProgramAdapter {
    #[instrument(skip(self), fields(program_id = %id))]
    async fn get_program(&self, id: ProgramId) -> Result<Program, PortError> {
        let row = self.repository.get_by_id(*id.as_uuid()).await?;
        Ok(row_to_program(row)?)
    }

    #[instrument(skip(self))]
    async fn get_program_by_code(&self, code: i32) -> Result<Program, PortError> {
        let row = self.repository.get_by_code(code).await?;
        Ok(row_to_program(row)?)
    }

    #[instrument(skip(self, ids), fields(count = ids.len()))]
    async fn get_programs(&self, ids: &[ProgramId]) -> Result<Vec<Program>, PortError> {
        let uuids: Vec<_> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = self.repository.get_many(&uuids).await?;
        rows.into_iter()
            .map(|row| row_to_program(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self))]
    async fn find_programs(&self, query: &ProgramQuery) -> Result<Vec<Program>, PortError> {
        debug!("Searching programs");
        let filter = ProgramFilter {
            program_type: query.program_type.map(domain_to_db_program_type),
            ends_on_or_after: query.ends_on_or_after,
            deadline_on_or_after: query.deadline_on_or_after,
            exclude: query.exclude.iter().map(|id| *id.as_uuid()).collect(),
            order_by_deadline: query.order == ProgramOrder::Deadline,
            limit: query.limit,
        };
        let rows = self.repository.search(&filter).await?;
        rows.into_iter()
            .map(|row| row_to_program(row).map_err(PortError::from))
            .collect()
    }

    #[instrument(skip(self, program), fields(code = program.code))]
    async fn create_program(&self, program: &Program) -> Result<Program, PortError> {
        debug!("Creating program");
        let row = self.repository.insert(&program_to_row(program)?).await?;
        Ok(row_to_program(row)?)
    }
}

// ============================================================================
// Conversions
// ============================================================================

fn domain_to_db_program_type(program_type: ProgramType) -> DbProgramType {
    match program_type {
        ProgramType::Workshop => DbProgramType::Workshop,
        ProgramType::Square => DbProgramType::Square,
        ProgramType::Meeting => DbProgramType::Meeting,
        ProgramType::Vworkshop => DbProgramType::Vworkshop,
        ProgramType::Vsquare => DbProgramType::Vsquare,
        ProgramType::Community => DbProgramType::Community,
    }
}

fn db_to_domain_program_type(program_type: DbProgramType) -> ProgramType {
    match program_type {
        DbProgramType::Workshop => ProgramType::Workshop,
        DbProgramType::Square => ProgramType::Square,
        DbProgramType::Meeting => ProgramType::Meeting,
        DbProgramType::Vworkshop => ProgramType::Vworkshop,
        DbProgramType::Vsquare => ProgramType::Vsquare,
        DbProgramType::Community => ProgramType::Community,
    }
}

fn row_to_program(row: ProgramRow) -> Result<Program, DatabaseError> {
    let organizers: Vec<Organizer> = serde_json::from_value(row.organizers)?;
    Ok(Program {
        id: ProgramId::from_uuid(row.program_id),
        code: row.code,
        title: row.title,
        abbreviation: row.abbreviation,
        program_type: db_to_domain_program_type(row.program_type),
        organizers,
        location: row.location,
        application_deadline: row.application_deadline,
        start_date: row.start_date,
        end_date: row.end_date,
        description: row.description,
        online: row.online,
        created_at: row.created_at,
        updated_at: row.updated_at,
    })
}

fn program_to_row(program: &Program) -> Result<ProgramRow, DatabaseError> {
    Ok(ProgramRow {
        program_id: *program.id.as_uuid(),
        code: program.code,
        title: program.title.clone(),
        abbreviation: program.abbreviation.clone(),
        program_type: domain_to_db_program_type(program.program_type),
        organizers: serde_json::to_value(&program.organizers)?,
        location: program.location.clone(),
        application_deadline: program.application_deadline,
        start_date: program.start_date,
        end_date: program.end_date,
        description: program.description.clone(),
        online: program.online,
        created_at: program.created_at,
        updated_at: program.updated_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use domain_programs::NewProgram;

    #[test]
    fn test_program_row_round_trip_keeps_organizers() {
        let program = Program::create(NewProgram {
            code: 2207,
            title: "Higher Teichmüller theory".into(),
            abbreviation: Some("hightech".into()),
            program_type: ProgramType::Vsquare,
            organizers: vec![Organizer {
                name: "Sofia Kovalevskaya".into(),
                email: Some("sk@example.org".into()),
            }],
            location: None,
            application_deadline: None,
            start_date: NaiveDate::from_ymd_opt(2026, 1, 12),
            end_date: NaiveDate::from_ymd_opt(2026, 1, 16),
            description: None,
            online: true,
        })
        .unwrap();

        let row = program_to_row(&program).unwrap();
        assert_eq!(row.program_type, DbProgramType::Vsquare);
        assert_eq!(row_to_program(row).unwrap(), program);
    }

    #[test]
    fn test_malformed_organizers_are_a_serialization_error() {
        let mut row = program_to_row(
            &Program::create(NewProgram {
                code: 1,
                title: "t".into(),
                abbreviation: None,
                program_type: ProgramType::Meeting,
                organizers: vec![],
                location: None,
                application_deadline: None,
                start_date: None,
                end_date: None,
                description: None,
                online: false,
            })
            .unwrap(),
        )
        .unwrap();
        row.organizers = serde_json::json!({"not": "a list"});
        assert!(matches!(row_to_program(row), Err(DatabaseError::SerializationError(_))));
    }
}
