//! SQLite adapter for the catalog, execution log and vitals log
//!
//! Implements the collaborator traits from [`crate::store`] over one
//! SQLite database. The write helpers exist for the surrounding CRUD
//! layer (and tests) to populate the stores; the engines themselves only
//! read, except for the execution-log append.

use chrono::{DateTime, NaiveDate, NaiveTime, SecondsFormat, Utc};
use rusqlite::{params, Connection, Row};
use std::path::Path;

use crate::error::CoreError;
use crate::model::{
    DoseRule, ExecutionCategory, ExecutionRecord, MealType, Medication, MedicationCategory,
    NewExecution, ProcedureCategory, RecurringProcedure, ScheduleEntry, VitalsEntry, WeekdaySet,
};
use crate::store::{CatalogReader, ExecutionLog, ScheduledDose, VitalsReader};

const DATE_FMT: &str = "%Y-%m-%d";
const TIME_FMT: &str = "%H:%M:%S";

/// SQLite database holding the catalog and both logs.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Create or open a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, CoreError> {
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a transient in-memory database.
    pub fn open_in_memory() -> Result<Self, CoreError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CoreError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS medications (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                dosage TEXT NOT NULL,
                unit TEXT NOT NULL,
                category INTEGER NOT NULL,
                instructions TEXT
            );

            CREATE TABLE IF NOT EXISTS medication_schedules (
                id INTEGER PRIMARY KEY,
                medication_id INTEGER NOT NULL REFERENCES medications(id),
                time_of_day TEXT NOT NULL,
                weekdays INTEGER NOT NULL,
                meal_context INTEGER,
                before_meal INTEGER NOT NULL DEFAULT 1,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS insulin_dose_rules (
                id INTEGER PRIMARY KEY,
                medication_id INTEGER NOT NULL REFERENCES medications(id),
                glucose_min INTEGER NOT NULL,
                glucose_max INTEGER,
                dose_units INTEGER NOT NULL,
                administer INTEGER NOT NULL DEFAULT 1,
                critical INTEGER NOT NULL DEFAULT 0,
                emergency_contact TEXT,
                emergency_phone TEXT
            );

            CREATE TABLE IF NOT EXISTS recurring_procedures (
                id INTEGER PRIMARY KEY,
                name TEXT NOT NULL,
                category INTEGER NOT NULL,
                interval_days INTEGER NOT NULL,
                start_date TEXT NOT NULL,
                end_date TEXT,
                instructions TEXT,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS guidance_executions (
                id INTEGER PRIMARY KEY,
                category INTEGER NOT NULL,
                reference_id INTEGER NOT NULL,
                caregiver_id INTEGER NOT NULL,
                executed_at TEXT NOT NULL,
                note TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_executions_at
                ON guidance_executions(executed_at);

            CREATE TABLE IF NOT EXISTS vitals_entries (
                id INTEGER PRIMARY KEY,
                caregiver_id INTEGER NOT NULL,
                meal INTEGER NOT NULL,
                entry_date TEXT NOT NULL,
                time_before TEXT NOT NULL,
                time_after TEXT NOT NULL,
                glucose_before INTEGER NOT NULL DEFAULT 0,
                glucose_after INTEGER NOT NULL DEFAULT 0,
                slow_insulin_units INTEGER NOT NULL DEFAULT 0,
                fast_insulin_units INTEGER NOT NULL DEFAULT 0,
                temperature REAL,
                oxygen_saturation INTEGER,
                systolic INTEGER,
                diastolic INTEGER,
                medications_taken TEXT NOT NULL DEFAULT '[]',
                note TEXT,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_vitals_caregiver_date
                ON vitals_entries(caregiver_id, entry_date);",
        )?;
        Ok(Self { conn })
    }

    /// Insert a medication; the id field is ignored and assigned by the
    /// database. Dose rules are inserted separately.
    pub fn insert_medication(&self, medication: &Medication) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO medications (name, dosage, unit, category, instructions)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                medication.name,
                medication.dosage,
                medication.unit,
                medication.category.code(),
                medication.instructions,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_schedule(&self, schedule: &ScheduleEntry) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO medication_schedules
                (medication_id, time_of_day, weekdays, meal_context, before_meal, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                schedule.medication_id,
                schedule.time_of_day.format(TIME_FMT).to_string(),
                schedule.weekdays.bits() as i64,
                schedule.meal_context.map(MealType::code),
                schedule.before_meal,
                schedule.active,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_dose_rule(&self, rule: &DoseRule) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO insulin_dose_rules
                (medication_id, glucose_min, glucose_max, dose_units,
                 administer, critical, emergency_contact, emergency_phone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                rule.medication_id,
                rule.min_glucose,
                rule.max_glucose,
                rule.dose_units,
                rule.administer,
                rule.critical,
                rule.emergency_contact,
                rule.emergency_phone,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_procedure(&self, procedure: &RecurringProcedure) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO recurring_procedures
                (name, category, interval_days, start_date, end_date, instructions, active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                procedure.name,
                procedure.category.code(),
                procedure.interval_days,
                procedure.start_date.format(DATE_FMT).to_string(),
                procedure.end_date.map(|d| d.format(DATE_FMT).to_string()),
                procedure.instructions,
                procedure.active,
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    pub fn insert_vitals_entry(&self, entry: &VitalsEntry) -> Result<i64, CoreError> {
        self.conn.execute(
            "INSERT INTO vitals_entries
                (caregiver_id, meal, entry_date, time_before, time_after,
                 glucose_before, glucose_after, slow_insulin_units, fast_insulin_units,
                 temperature, oxygen_saturation, systolic, diastolic,
                 medications_taken, note, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                entry.caregiver_id,
                entry.meal.code(),
                entry.date.format(DATE_FMT).to_string(),
                entry.time_before.format(TIME_FMT).to_string(),
                entry.time_after.format(TIME_FMT).to_string(),
                entry.glucose_before,
                entry.glucose_after,
                entry.slow_insulin_units,
                entry.fast_insulin_units,
                entry.temperature,
                entry.oxygen_saturation,
                entry.systolic,
                entry.diastolic,
                serde_json::to_string(&entry.medications_taken)?,
                entry.note,
                entry.created_at.to_rfc3339_opts(SecondsFormat::Secs, true),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn dose_rules_for(&self, medication_id: i64) -> Result<Vec<DoseRule>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, medication_id, glucose_min, glucose_max, dose_units,
                    administer, critical, emergency_contact, emergency_phone
             FROM insulin_dose_rules WHERE medication_id = ?1 ORDER BY id",
        )?;
        let rules = stmt
            .query_map(params![medication_id], row_to_dose_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }
}

const SCHEDULE_JOIN_COLUMNS: &str = "s.id, s.medication_id, s.time_of_day, s.weekdays, \
     s.meal_context, s.before_meal, s.active, \
     m.name, m.dosage, m.unit, m.category, m.instructions";

const VITALS_SELECT: &str = "SELECT id, caregiver_id, meal, entry_date, time_before, time_after, \
     glucose_before, glucose_after, slow_insulin_units, fast_insulin_units, \
     temperature, oxygen_saturation, systolic, diastolic, \
     medications_taken, note, created_at \
     FROM vitals_entries";

impl CatalogReader for SqliteStore {
    fn active_schedules_for_weekday(&self, weekday: u8) -> Result<Vec<ScheduledDose>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_JOIN_COLUMNS}
             FROM medication_schedules s
             JOIN medications m ON m.id = s.medication_id
             WHERE s.active = 1 AND (s.weekdays >> ?1) & 1 != 0
             ORDER BY s.time_of_day"
        ))?;
        let rows = stmt
            .query_map(params![weekday as i64], row_to_scheduled_dose)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn active_schedules_for_meal(
        &self,
        meal: MealType,
        weekday: u8,
    ) -> Result<Vec<ScheduledDose>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {SCHEDULE_JOIN_COLUMNS}
             FROM medication_schedules s
             JOIN medications m ON m.id = s.medication_id
             WHERE s.active = 1 AND s.meal_context = ?1 AND (s.weekdays >> ?2) & 1 != 0
             ORDER BY s.time_of_day"
        ))?;
        let rows = stmt
            .query_map(params![meal.code(), weekday as i64], row_to_scheduled_dose)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find_medication_by_name(&self, fragment: &str) -> Result<Option<Medication>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, dosage, unit, category, instructions
             FROM medications ORDER BY id",
        )?;
        let medications = stmt
            .query_map([], row_to_medication)?
            .collect::<Result<Vec<_>, _>>()?;

        // Substring match in Rust so accented names compare
        // case-insensitively, which SQLite LIKE does not do.
        let needle = fragment.to_lowercase();
        let found = medications
            .into_iter()
            .find(|m| m.name.to_lowercase().contains(&needle));

        match found {
            Some(mut medication) => {
                medication.dose_rules = self.dose_rules_for(medication.id)?;
                Ok(Some(medication))
            }
            None => Ok(None),
        }
    }

    fn critical_dose_rules(&self) -> Result<Vec<DoseRule>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, medication_id, glucose_min, glucose_max, dose_units,
                    administer, critical, emergency_contact, emergency_phone
             FROM insulin_dose_rules WHERE critical = 1 ORDER BY id",
        )?;
        let rules = stmt
            .query_map([], row_to_dose_rule)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rules)
    }

    fn active_procedures(&self) -> Result<Vec<RecurringProcedure>, CoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, name, category, interval_days, start_date, end_date, instructions, active
             FROM recurring_procedures WHERE active = 1 ORDER BY id",
        )?;
        let procedures = stmt
            .query_map([], row_to_procedure)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(procedures)
    }
}

impl ExecutionLog for SqliteStore {
    fn append(&self, execution: &NewExecution) -> Result<(), CoreError> {
        self.conn.execute(
            "INSERT INTO guidance_executions
                (category, reference_id, caregiver_id, executed_at, note)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                execution.category.code(),
                execution.reference_id,
                execution.caregiver_id,
                execution
                    .executed_at
                    .to_rfc3339_opts(SecondsFormat::Secs, true),
                execution.note,
            ],
        )?;
        Ok(())
    }

    fn executions_for_utc_day(&self, day: NaiveDate) -> Result<Vec<ExecutionRecord>, CoreError> {
        let start = day.and_time(NaiveTime::MIN).and_utc();
        let end = start + chrono::Duration::days(1);
        let mut stmt = self.conn.prepare(
            "SELECT id, category, reference_id, caregiver_id, executed_at, note
             FROM guidance_executions
             WHERE executed_at >= ?1 AND executed_at < ?2
             ORDER BY executed_at",
        )?;
        let records = stmt
            .query_map(
                params![
                    start.to_rfc3339_opts(SecondsFormat::Secs, true),
                    end.to_rfc3339_opts(SecondsFormat::Secs, true)
                ],
                row_to_execution,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(records)
    }
}

impl VitalsReader for SqliteStore {
    fn entries_since(
        &self,
        caregiver_id: i64,
        from: NaiveDate,
    ) -> Result<Vec<VitalsEntry>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "{VITALS_SELECT} WHERE caregiver_id = ?1 AND entry_date >= ?2
             ORDER BY entry_date, time_before"
        ))?;
        let entries = stmt
            .query_map(
                params![caregiver_id, from.format(DATE_FMT).to_string()],
                row_to_vitals,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn entries_between(
        &self,
        caregiver_id: i64,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<VitalsEntry>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "{VITALS_SELECT} WHERE caregiver_id = ?1 AND entry_date >= ?2 AND entry_date <= ?3
             ORDER BY entry_date, time_before"
        ))?;
        let entries = stmt
            .query_map(
                params![
                    caregiver_id,
                    from.format(DATE_FMT).to_string(),
                    to.format(DATE_FMT).to_string()
                ],
                row_to_vitals,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    fn entries_on(
        &self,
        caregiver_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<VitalsEntry>, CoreError> {
        let mut stmt = self.conn.prepare(&format!(
            "{VITALS_SELECT} WHERE caregiver_id = ?1 AND entry_date = ?2
             ORDER BY time_before"
        ))?;
        let entries = stmt
            .query_map(
                params![caregiver_id, date.format(DATE_FMT).to_string()],
                row_to_vitals,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }
}

// ============= Row mappers =============

fn bad_column(index: usize, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, message.into())
}

fn parse_date(index: usize, text: &str) -> Result<NaiveDate, rusqlite::Error> {
    NaiveDate::parse_from_str(text, DATE_FMT)
        .map_err(|e| bad_column(index, format!("bad date '{text}': {e}")))
}

fn parse_time(index: usize, text: &str) -> Result<NaiveTime, rusqlite::Error> {
    NaiveTime::parse_from_str(text, TIME_FMT)
        .map_err(|e| bad_column(index, format!("bad time '{text}': {e}")))
}

fn parse_instant(index: usize, text: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(text)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| bad_column(index, format!("bad timestamp '{text}': {e}")))
}

fn row_to_medication(row: &Row) -> Result<Medication, rusqlite::Error> {
    let category_code: i64 = row.get(4)?;
    Ok(Medication {
        id: row.get(0)?,
        name: row.get(1)?,
        dosage: row.get(2)?,
        unit: row.get(3)?,
        category: MedicationCategory::from_code(category_code)
            .ok_or_else(|| bad_column(4, format!("unknown medication category {category_code}")))?,
        instructions: row.get(5)?,
        dose_rules: Vec::new(),
    })
}

fn row_to_scheduled_dose(row: &Row) -> Result<ScheduledDose, rusqlite::Error> {
    let time_text: String = row.get(2)?;
    let weekday_bits: i64 = row.get(3)?;
    let meal_code: Option<i64> = row.get(4)?;
    let category_code: i64 = row.get(10)?;
    Ok(ScheduledDose {
        schedule: ScheduleEntry {
            id: row.get(0)?,
            medication_id: row.get(1)?,
            time_of_day: parse_time(2, &time_text)?,
            weekdays: WeekdaySet::from_bits(weekday_bits as u8),
            meal_context: match meal_code {
                Some(code) => Some(
                    MealType::from_code(code)
                        .ok_or_else(|| bad_column(4, format!("unknown meal code {code}")))?,
                ),
                None => None,
            },
            before_meal: row.get(5)?,
            active: row.get(6)?,
        },
        medication: Medication {
            id: row.get(1)?,
            name: row.get(7)?,
            dosage: row.get(8)?,
            unit: row.get(9)?,
            category: MedicationCategory::from_code(category_code).ok_or_else(|| {
                bad_column(10, format!("unknown medication category {category_code}"))
            })?,
            instructions: row.get(11)?,
            dose_rules: Vec::new(),
        },
    })
}

fn row_to_dose_rule(row: &Row) -> Result<DoseRule, rusqlite::Error> {
    Ok(DoseRule {
        id: row.get(0)?,
        medication_id: row.get(1)?,
        min_glucose: row.get(2)?,
        max_glucose: row.get(3)?,
        dose_units: row.get(4)?,
        administer: row.get(5)?,
        critical: row.get(6)?,
        emergency_contact: row.get(7)?,
        emergency_phone: row.get(8)?,
    })
}

fn row_to_procedure(row: &Row) -> Result<RecurringProcedure, rusqlite::Error> {
    let category_code: i64 = row.get(2)?;
    let start_text: String = row.get(4)?;
    let end_text: Option<String> = row.get(5)?;
    Ok(RecurringProcedure {
        id: row.get(0)?,
        name: row.get(1)?,
        category: ProcedureCategory::from_code(category_code)
            .ok_or_else(|| bad_column(2, format!("unknown procedure category {category_code}")))?,
        interval_days: row.get(3)?,
        start_date: parse_date(4, &start_text)?,
        end_date: match end_text {
            Some(text) => Some(parse_date(5, &text)?),
            None => None,
        },
        instructions: row.get(6)?,
        active: row.get(7)?,
    })
}

fn row_to_execution(row: &Row) -> Result<ExecutionRecord, rusqlite::Error> {
    let category_code: i64 = row.get(1)?;
    let at_text: String = row.get(4)?;
    Ok(ExecutionRecord {
        id: row.get(0)?,
        category: ExecutionCategory::from_code(category_code)
            .ok_or_else(|| bad_column(1, format!("unknown execution category {category_code}")))?,
        reference_id: row.get(2)?,
        caregiver_id: row.get(3)?,
        executed_at: parse_instant(4, &at_text)?,
        note: row.get(5)?,
    })
}

fn row_to_vitals(row: &Row) -> Result<VitalsEntry, rusqlite::Error> {
    let meal_code: i64 = row.get(2)?;
    let date_text: String = row.get(3)?;
    let before_text: String = row.get(4)?;
    let after_text: String = row.get(5)?;
    let medications_json: String = row.get(14)?;
    let created_text: String = row.get(16)?;
    Ok(VitalsEntry {
        id: row.get(0)?,
        caregiver_id: row.get(1)?,
        meal: MealType::from_code(meal_code)
            .ok_or_else(|| bad_column(2, format!("unknown meal code {meal_code}")))?,
        date: parse_date(3, &date_text)?,
        time_before: parse_time(4, &before_text)?,
        time_after: parse_time(5, &after_text)?,
        glucose_before: row.get(6)?,
        glucose_after: row.get(7)?,
        slow_insulin_units: row.get(8)?,
        fast_insulin_units: row.get(9)?,
        temperature: row.get(10)?,
        oxygen_saturation: row.get(11)?,
        systolic: row.get(12)?,
        diastolic: row.get(13)?,
        medications_taken: serde_json::from_str(&medications_json)
            .map_err(|e| bad_column(14, format!("bad medications list: {e}")))?,
        note: row.get(15)?,
        created_at: parse_instant(16, &created_text)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn store() -> SqliteStore {
        let _ = env_logger::builder().is_test(true).try_init();
        SqliteStore::open_in_memory().unwrap()
    }

    fn medication(name: &str) -> Medication {
        Medication {
            id: 0,
            name: name.into(),
            dosage: "100".into(),
            unit: "UI".into(),
            category: MedicationCategory::Injectable,
            instructions: None,
            dose_rules: Vec::new(),
        }
    }

    fn schedule(medication_id: i64, time: (u32, u32), weekdays: WeekdaySet) -> ScheduleEntry {
        ScheduleEntry {
            id: 0,
            medication_id,
            time_of_day: NaiveTime::from_hms_opt(time.0, time.1, 0).unwrap(),
            weekdays,
            meal_context: Some(MealType::Almoco),
            before_meal: true,
            active: true,
        }
    }

    #[test]
    fn schedules_filter_by_weekday_mask() {
        let store = store();
        let med_id = store.insert_medication(&medication("Pantoprazol")).unwrap();
        // Weekdays only (Mon-Fri).
        store
            .insert_schedule(&schedule(med_id, (8, 0), WeekdaySet::from_days(&[1, 2, 3, 4, 5])))
            .unwrap();
        // Every day.
        store
            .insert_schedule(&schedule(med_id, (12, 0), WeekdaySet::ALL))
            .unwrap();

        let sunday = store.active_schedules_for_weekday(0).unwrap();
        assert_eq!(sunday.len(), 1);
        assert_eq!(
            sunday[0].schedule.time_of_day,
            NaiveTime::from_hms_opt(12, 0, 0).unwrap()
        );

        let monday = store.active_schedules_for_weekday(1).unwrap();
        assert_eq!(monday.len(), 2);
        // Ordered by scheduled time.
        assert!(monday[0].schedule.time_of_day < monday[1].schedule.time_of_day);
        assert_eq!(monday[0].medication.name, "Pantoprazol");
    }

    #[test]
    fn inactive_schedules_are_excluded() {
        let store = store();
        let med_id = store.insert_medication(&medication("Lyrica")).unwrap();
        let mut inactive = schedule(med_id, (8, 0), WeekdaySet::ALL);
        inactive.active = false;
        store.insert_schedule(&inactive).unwrap();
        assert!(store.active_schedules_for_weekday(1).unwrap().is_empty());
    }

    #[test]
    fn meal_filter_includes_weekday() {
        let store = store();
        let med_id = store.insert_medication(&medication("Crestor")).unwrap();
        let mut lunch = schedule(med_id, (12, 0), WeekdaySet::from_days(&[1]));
        lunch.meal_context = Some(MealType::Almoco);
        store.insert_schedule(&lunch).unwrap();

        assert_eq!(
            store
                .active_schedules_for_meal(MealType::Almoco, 1)
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .active_schedules_for_meal(MealType::Almoco, 2)
            .unwrap()
            .is_empty());
        assert!(store
            .active_schedules_for_meal(MealType::Jantar, 1)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn medication_lookup_is_case_insensitive_with_rules_joined() {
        let store = store();
        let med_id = store
            .insert_medication(&medication("Insulina Humalog (Rápida)"))
            .unwrap();
        store
            .insert_dose_rule(&DoseRule {
                id: 0,
                medication_id: med_id,
                min_glucose: 181,
                max_glucose: Some(250),
                dose_units: 4,
                administer: true,
                critical: false,
                emergency_contact: None,
                emergency_phone: None,
            })
            .unwrap();

        let found = store.find_medication_by_name("humalog").unwrap().unwrap();
        assert_eq!(found.id, med_id);
        assert_eq!(found.dose_rules.len(), 1);

        let by_accent = store.find_medication_by_name("rápida").unwrap().unwrap();
        assert_eq!(by_accent.id, med_id);

        assert!(store.find_medication_by_name("lantus").unwrap().is_none());
    }

    #[test]
    fn execution_day_window_is_utc() {
        let store = store();
        let caregiver = 7;
        let base = NewExecution {
            category: ExecutionCategory::Medication,
            reference_id: 1,
            caregiver_id: caregiver,
            executed_at: Utc.with_ymd_and_hms(2024, 1, 29, 23, 50, 0).unwrap(),
            note: None,
        };
        store.append(&base).unwrap();
        // 23:50 Brazil local on Jan 29 is 02:50 UTC on Jan 30; it lands in
        // the UTC Jan 30 window even though the caregiver saw Jan 29.
        store
            .append(&NewExecution {
                reference_id: 2,
                executed_at: Utc.with_ymd_and_hms(2024, 1, 30, 2, 50, 0).unwrap(),
                ..base.clone()
            })
            .unwrap();

        let jan29 = store
            .executions_for_utc_day(NaiveDate::from_ymd_opt(2024, 1, 29).unwrap())
            .unwrap();
        assert_eq!(jan29.len(), 1);
        assert_eq!(jan29[0].reference_id, 1);

        let jan30 = store
            .executions_for_utc_day(NaiveDate::from_ymd_opt(2024, 1, 30).unwrap())
            .unwrap();
        assert_eq!(jan30.len(), 1);
        assert_eq!(jan30[0].reference_id, 2);
    }

    #[test]
    fn vitals_round_trip_and_ranges() {
        let store = store();
        let entry = VitalsEntry {
            id: 0,
            caregiver_id: 3,
            meal: MealType::Cafe,
            date: NaiveDate::from_ymd_opt(2024, 1, 29).unwrap(),
            time_before: NaiveTime::from_hms_opt(7, 30, 0).unwrap(),
            time_after: NaiveTime::from_hms_opt(9, 30, 0).unwrap(),
            glucose_before: 150,
            glucose_after: 210,
            slow_insulin_units: 12,
            fast_insulin_units: 4,
            temperature: Some(36.5),
            oxygen_saturation: Some(97),
            systolic: Some(120),
            diastolic: Some(80),
            medications_taken: vec!["Pantoprazol 40mg".into(), "Xarelto 2,5mg".into()],
            note: Some("tranquilo".into()),
            created_at: Utc.with_ymd_and_hms(2024, 1, 29, 12, 0, 0).unwrap(),
        };
        store.insert_vitals_entry(&entry).unwrap();

        let on_day = store
            .entries_on(3, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap())
            .unwrap();
        assert_eq!(on_day.len(), 1);
        assert_eq!(on_day[0].glucose_after, 210);
        assert_eq!(on_day[0].medications_taken.len(), 2);
        assert_eq!(on_day[0].temperature, Some(36.5));

        // Ownership scoping: another caregiver sees nothing.
        assert!(store
            .entries_on(4, NaiveDate::from_ymd_opt(2024, 1, 29).unwrap())
            .unwrap()
            .is_empty());

        assert_eq!(
            store
                .entries_since(3, NaiveDate::from_ymd_opt(2024, 1, 1).unwrap())
                .unwrap()
                .len(),
            1
        );
        assert!(store
            .entries_since(3, NaiveDate::from_ymd_opt(2024, 1, 30).unwrap())
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .entries_between(
                    3,
                    NaiveDate::from_ymd_opt(2024, 1, 29).unwrap(),
                    NaiveDate::from_ymd_opt(2024, 1, 29).unwrap()
                )
                .unwrap()
                .len(),
            1
        );
    }
}
