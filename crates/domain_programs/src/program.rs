//! Program entity

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use core_kernel::ProgramId;
use crate::error::ProgramError;

/// Kind of program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProgramType {
    Workshop,
    /// Structured Quartet Research Ensemble
    Square,
    Meeting,
    /// Virtual workshop
    Vworkshop,
    /// Virtual SQuaRE
    Vsquare,
    Community,
}

impl ProgramType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgramType::Workshop => "WORKSHOP",
            ProgramType::Square => "SQUARE",
            ProgramType::Meeting => "MEETING",
            ProgramType::Vworkshop => "VWORKSHOP",
            ProgramType::Vsquare => "VSQUARE",
            ProgramType::Community => "COMMUNITY",
        }
    }

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            ProgramType::Workshop => "Workshop",
            ProgramType::Square => "SQuaRE",
            ProgramType::Meeting => "Meeting",
            ProgramType::Vworkshop => "Virtual Workshop",
            ProgramType::Vsquare => "Virtual SQuaRE",
            ProgramType::Community => "Community",
        }
    }
}

impl fmt::Display for ProgramType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProgramType {
    type Err = ProgramError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "WORKSHOP" => Ok(ProgramType::Workshop),
            "SQUARE" => Ok(ProgramType::Square),
            "MEETING" => Ok(ProgramType::Meeting),
            "VWORKSHOP" => Ok(ProgramType::Vworkshop),
            "VSQUARE" => Ok(ProgramType::Vsquare),
            "COMMUNITY" => Ok(ProgramType::Community),
            _ => Err(ProgramError::validation(format!("Unknown program type: {}", s))),
        }
    }
}

/// A workshop, SQuaRE, meeting or other program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub id: ProgramId,
    /// Institute-assigned program number, unique
    pub code: i32,
    pub title: String,
    pub abbreviation: Option<String>,
    pub program_type: ProgramType,
    /// Organizer names and emails, in listing order
    pub organizers: Vec<Organizer>,
    pub location: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    pub online: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A program organizer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organizer {
    pub name: String,
    pub email: Option<String>,
}

/// Data for creating a program
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProgram {
    pub code: i32,
    pub title: String,
    pub abbreviation: Option<String>,
    pub program_type: ProgramType,
    #[serde(default)]
    pub organizers: Vec<Organizer>,
    pub location: Option<String>,
    pub application_deadline: Option<DateTime<Utc>>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub description: Option<String>,
    #[serde(default)]
    pub online: bool,
}

impl Program {
    /// Creates a program after checking its basic shape
    ///
    /// # Errors
    ///
    /// Returns a validation error for an empty or over-long title, a
    /// non-positive code, or an end date before the start date
    pub fn create(new: NewProgram) -> Result<Self, ProgramError> {
        let title = new.title.trim().to_string();
        if title.is_empty() || title.len() > 255 {
            return Err(ProgramError::validation("Title must be 1-255 characters"));
        }
        if new.code <= 0 {
            return Err(ProgramError::validation("Program code must be positive"));
        }
        if let (Some(start), Some(end)) = (new.start_date, new.end_date) {
            if end < start {
                return Err(ProgramError::validation("End date is before start date"));
            }
        }

        let now = Utc::now();
        Ok(Self {
            id: ProgramId::new_v7(),
            code: new.code,
            title,
            abbreviation: new.abbreviation,
            program_type: new.program_type,
            organizers: new.organizers,
            location: new.location,
            application_deadline: new.application_deadline,
            start_date: new.start_date,
            end_date: new.end_date,
            description: new.description,
            online: new.online,
            created_at: now,
            updated_at: now,
        })
    }

    /// Whether applications are open: a deadline is set and has not passed
    pub fn is_accepting_applications(&self, now: DateTime<Utc>) -> bool {
        self.application_deadline.map_or(false, |deadline| deadline >= now)
    }

    /// Whether the program has started as of the given local date
    pub fn has_started(&self, today: NaiveDate) -> bool {
        self.start_date.map_or(false, |start| start <= today)
    }

    /// Whether the program is over as of the given local date
    pub fn has_ended(&self, today: NaiveDate) -> bool {
        self.end_date.map_or(false, |end| end < today)
    }

    /// Display label, e.g. `1042: Arithmetic Statistics`
    pub fn label(&self) -> String {
        format!("{}: {}", self.code, self.title)
    }
}
