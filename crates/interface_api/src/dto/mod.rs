//! Request and response bodies

pub mod auth;
pub mod people;
pub mod programs;
pub mod reimbursements;

use serde::Deserialize;

/// `?limit=` on list endpoints
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<u32>,
}

impl LimitQuery {
    /// The requested limit clamped to `1..=max`, or `default`
    pub fn resolve(&self, default: u32, max: u32) -> u32 {
        self.limit.map_or(default, |l| l.clamp(1, max))
    }
}
