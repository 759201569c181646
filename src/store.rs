//! Collaborator interfaces for the guidance and analytics engines
//!
//! The engines are pure read/derive functions over three stores: the
//! read-only catalog, the append-only execution log and the caregiver
//! vitals log. Any backend can implement these; this crate ships a SQLite
//! adapter in [`crate::storage`].

use chrono::NaiveDate;

use crate::error::CoreError;
use crate::model::{
    DoseRule, ExecutionRecord, Medication, MealType, NewExecution, RecurringProcedure,
    ScheduleEntry, VitalsEntry,
};

/// A schedule entry with its medication joined.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledDose {
    pub schedule: ScheduleEntry,
    pub medication: Medication,
}

/// Read access to the medication/procedure catalog.
pub trait CatalogReader {
    /// Active schedule entries applying on the given weekday (0 = Sunday),
    /// medication joined, ordered by scheduled time.
    fn active_schedules_for_weekday(&self, weekday: u8) -> Result<Vec<ScheduledDose>, CoreError>;

    /// Active schedule entries for a meal context on the given weekday,
    /// ordered by scheduled time.
    fn active_schedules_for_meal(
        &self,
        meal: MealType,
        weekday: u8,
    ) -> Result<Vec<ScheduledDose>, CoreError>;

    /// First medication whose name contains the fragment
    /// (case-insensitive), dose rules joined in catalog order.
    fn find_medication_by_name(&self, fragment: &str) -> Result<Option<Medication>, CoreError>;

    /// All dose rules flagged clinically critical, across all medications.
    fn critical_dose_rules(&self) -> Result<Vec<DoseRule>, CoreError>;

    /// All active recurring procedures, in catalog order.
    fn active_procedures(&self) -> Result<Vec<RecurringProcedure>, CoreError>;
}

/// Append-only log of executed guidance items.
pub trait ExecutionLog {
    /// Append one execution record. Duplicate marks produce duplicate
    /// records; the log enforces no uniqueness.
    fn append(&self, execution: &NewExecution) -> Result<(), CoreError>;

    /// All executions recorded within the given UTC calendar day.
    fn executions_for_utc_day(&self, day: NaiveDate) -> Result<Vec<ExecutionRecord>, CoreError>;
}

/// Read access to the caregiver's meal-time vitals log.
pub trait VitalsReader {
    /// Entries for one caregiver dated `from` or later.
    fn entries_since(
        &self,
        caregiver_id: i64,
        from: NaiveDate,
    ) -> Result<Vec<VitalsEntry>, CoreError>;

    /// Entries for one caregiver dated within `[from, to]` inclusive.
    fn entries_between(
        &self,
        caregiver_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VitalsEntry>, CoreError>;

    /// Entries for one caregiver on an exact date.
    fn entries_on(&self, caregiver_id: i64, date: NaiveDate) -> Result<Vec<VitalsEntry>, CoreError>;
}
