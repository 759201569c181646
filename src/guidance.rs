//! Guidance engine: what must happen now, insulin dose recommendation and
//! critical alerts
//!
//! All answers derive from the catalog, the execution log and the current
//! Brazil-local time. The only write path is [`GuidanceEngine::mark_executed`],
//! which appends to the execution log. Note the day-window asymmetry: the
//! "executed today" check uses the UTC calendar day (as the log is queried),
//! while scheduled times compare against Brazil-local wall-clock time.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::clock::{self, LocalNow};
use crate::error::CoreError;
use crate::model::{ExecutionCategory, ExecutionRecord, MealType, NewExecution};
use crate::store::{CatalogReader, ExecutionLog, ScheduledDose};

/// Items scheduled within this many minutes of now count as current.
const NOW_WINDOW_MINUTES: i64 = 30;
/// Cap on the upcoming-items list.
const UPCOMING_LIMIT: usize = 5;
/// Priority shown for every item in the per-meal view.
const MEAL_VIEW_PRIORITY: u8 = 2;
/// Name fragments that identify the fast-acting insulin in the catalog.
const FAST_INSULIN_KEYWORDS: [&str; 2] = ["Humalog", "Rápida"];
/// Name reported when no fast-acting insulin is cataloged.
const DEFAULT_INSULIN_NAME: &str = "Insulina Humalog";

fn procedure_time() -> NaiveTime {
    // Procedures carry no schedule of their own; they surface at 18:00.
    NaiveTime::from_hms_opt(18, 0, 0).expect("18:00 is a valid time")
}

/// A single actionable instruction with a scheduled time and priority.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuidanceItem {
    pub id: i64,
    /// Uppercase kind label: medication route or "PROCEDIMENTO".
    pub kind: String,
    pub name: String,
    pub dosage: String,
    pub instructions: Option<String>,
    pub scheduled_time: NaiveTime,
    pub meal_context: Option<String>,
    /// 1 = urgent, 2 = normal, 3 = can wait.
    pub priority: u8,
    pub executed: bool,
}

/// Critical glucose alert derived from the dose-rule catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CriticalAlert {
    pub alert_type: String,
    pub message: String,
    pub emergency_contact: Option<String>,
    pub phone: Option<String>,
}

/// The next recurring procedure coming due.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NextProcedure {
    pub name: String,
    pub due_date: NaiveDate,
    pub days_remaining: i64,
    pub instructions: Option<String>,
}

/// Everything the caregiver should see "around now".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayGuidance {
    pub current_datetime: NaiveDateTime,
    pub weekday: String,
    pub now_items: Vec<GuidanceItem>,
    pub upcoming_items: Vec<GuidanceItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alerts: Option<Vec<CriticalAlert>>,
    pub next_procedure: Option<NextProcedure>,
}

/// Fast-acting insulin recommendation for a glucose reading.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InsulinDose {
    pub insulin_name: String,
    pub glucose: i32,
    pub recommended_dose: i32,
    pub administer: bool,
    pub warning: Option<String>,
    pub emergency_contact: Option<String>,
    pub emergency_phone: Option<String>,
}

/// Caller request to record a guidance item as done.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct MarkExecutedRequest {
    /// Wire category label, e.g. "MEDICAMENTO"; parsed case-insensitively.
    pub category: String,
    pub reference_id: i64,
    pub note: Option<String>,
}

pub struct GuidanceEngine<'a, C, E> {
    catalog: &'a C,
    executions: &'a E,
}

impl<'a, C: CatalogReader, E: ExecutionLog> GuidanceEngine<'a, C, E> {
    pub fn new(catalog: &'a C, executions: &'a E) -> Self {
        Self { catalog, executions }
    }

    /// Guidance for the current moment, split into "now" and "upcoming".
    pub fn today_guidance(&self, current_glucose: Option<i32>) -> Result<DayGuidance, CoreError> {
        self.today_guidance_at(&clock::now(), current_glucose)
    }

    /// Same as [`Self::today_guidance`] for an explicit instant.
    pub fn today_guidance_at(
        &self,
        now: &LocalNow,
        current_glucose: Option<i32>,
    ) -> Result<DayGuidance, CoreError> {
        let executions = self.executions.executions_for_utc_day(now.utc.date_naive())?;
        let schedules = self.catalog.active_schedules_for_weekday(now.weekday_index())?;

        let mut now_items = Vec::new();
        let mut upcoming_items = Vec::new();
        for dose in &schedules {
            let offset_minutes = (dose.schedule.time_of_day - now.time).num_minutes();
            let executed =
                is_executed(&executions, ExecutionCategory::Medication, dose.schedule.id);
            let item = item_from_schedule(
                dose,
                priority_for(dose.schedule.time_of_day, now.time),
                executed,
            );
            if offset_minutes.abs() <= NOW_WINDOW_MINUTES {
                now_items.push(item);
            } else if offset_minutes > NOW_WINDOW_MINUTES {
                upcoming_items.push(item);
            }
        }

        for procedure in self.catalog.active_procedures()? {
            if procedure.due_on(now.date) {
                let executed =
                    is_executed(&executions, ExecutionCategory::Procedure, procedure.id);
                now_items.push(GuidanceItem {
                    id: procedure.id,
                    kind: "PROCEDIMENTO".to_string(),
                    name: procedure.name.clone(),
                    dosage: format!("A cada {} dias", procedure.interval_days),
                    instructions: procedure.instructions.clone(),
                    scheduled_time: procedure_time(),
                    meal_context: Some(MealType::Jantar.label().to_string()),
                    priority: 1,
                    executed,
                });
            }
        }

        now_items.sort_by_key(|item| (item.priority, item.scheduled_time));
        upcoming_items.truncate(UPCOMING_LIMIT);

        let alerts = match current_glucose {
            Some(glucose) => Some(self.check_critical_alerts(glucose)?),
            None => None,
        };
        let next_procedure = self.next_cyclic_procedure_on(now.date)?;

        debug!(
            "day guidance at {}: {} now, {} upcoming",
            now.time,
            now_items.len(),
            upcoming_items.len()
        );

        Ok(DayGuidance {
            current_datetime: now.date.and_time(now.time),
            weekday: now.weekday_name().to_string(),
            now_items,
            upcoming_items,
            alerts,
            next_procedure,
        })
    }

    /// Guidance items for one meal context, matched case-insensitively.
    /// An unknown label matches nothing.
    pub fn guidance_for_meal(&self, context: &str) -> Result<Vec<GuidanceItem>, CoreError> {
        self.guidance_for_meal_at(context, &clock::now())
    }

    pub fn guidance_for_meal_at(
        &self,
        context: &str,
        now: &LocalNow,
    ) -> Result<Vec<GuidanceItem>, CoreError> {
        let Some(meal) = MealType::from_label(context) else {
            return Ok(Vec::new());
        };
        let executions = self.executions.executions_for_utc_day(now.utc.date_naive())?;
        let schedules = self
            .catalog
            .active_schedules_for_meal(meal, now.weekday_index())?;
        Ok(schedules
            .iter()
            .map(|dose| {
                let executed =
                    is_executed(&executions, ExecutionCategory::Medication, dose.schedule.id);
                item_from_schedule(dose, MEAL_VIEW_PRIORITY, executed)
            })
            .collect())
    }

    /// Recommend a fast-acting insulin dose for the given reading.
    pub fn calculate_insulin_dose(
        &self,
        glucose: i32,
        at_time: Option<NaiveTime>,
    ) -> Result<InsulinDose, CoreError> {
        let time = at_time.unwrap_or_else(|| clock::now().time);
        self.calculate_insulin_dose_at(glucose, time)
    }

    pub fn calculate_insulin_dose_at(
        &self,
        glucose: i32,
        time: NaiveTime,
    ) -> Result<InsulinDose, CoreError> {
        let mut insulin = None;
        for keyword in FAST_INSULIN_KEYWORDS {
            if let Some(found) = self.catalog.find_medication_by_name(keyword)? {
                insulin = Some(found);
                break;
            }
        }

        let insulin = match insulin {
            Some(medication) if !medication.dose_rules.is_empty() => medication,
            _ => {
                return Ok(InsulinDose {
                    insulin_name: DEFAULT_INSULIN_NAME.to_string(),
                    glucose,
                    recommended_dose: 0,
                    administer: false,
                    warning: Some("Configuração de dosagem não encontrada".to_string()),
                    emergency_contact: None,
                    emergency_phone: None,
                })
            }
        };

        // First rule in catalog order whose range contains the reading;
        // overlap/gap validation is a catalog data-quality concern.
        let Some(rule) = insulin.dose_rules.iter().find(|r| r.contains(glucose)) else {
            return Ok(InsulinDose {
                insulin_name: insulin.name.clone(),
                glucose,
                recommended_dose: 0,
                administer: false,
                warning: Some("HGT fora das faixas configuradas".to_string()),
                emergency_contact: None,
                emergency_phone: None,
            });
        };

        let night = is_night(time);
        let warning = if rule.critical {
            Some(format!(
                "⚠️ ALERTA CRÍTICO: HGT {} - Entre em contato com {}",
                glucose,
                rule.emergency_contact.as_deref().unwrap_or("")
            ))
        } else if night && rule.administer {
            Some("⚠️ Atenção: Evitar aplicar insulina Humalog à noite".to_string())
        } else {
            None
        };

        info!(
            "insulin dose for HGT {}: {} UI, administer={}",
            glucose,
            rule.dose_units,
            rule.administer && !night
        );

        Ok(InsulinDose {
            insulin_name: insulin.name.clone(),
            glucose,
            recommended_dose: rule.dose_units,
            // Night suppression applies regardless of which warning fired.
            administer: rule.administer && !night,
            warning,
            emergency_contact: rule.emergency_contact.clone(),
            emergency_phone: rule.emergency_phone.clone(),
        })
    }

    /// One alert per critical dose rule containing the reading, no dedup.
    pub fn check_critical_alerts(&self, glucose: i32) -> Result<Vec<CriticalAlert>, CoreError> {
        let rules = self.catalog.critical_dose_rules()?;
        Ok(rules
            .into_iter()
            .filter(|rule| rule.contains(glucose))
            .map(|rule| CriticalAlert {
                alert_type: "HGT_CRITICO".to_string(),
                message: format!("HGT em {glucose} mg/dL - Nível crítico detectado!"),
                emergency_contact: rule.emergency_contact,
                phone: rule.emergency_phone,
            })
            .collect())
    }

    /// The active procedure whose next due date is closest; ties go to the
    /// first catalog row.
    pub fn next_cyclic_procedure(&self) -> Result<Option<NextProcedure>, CoreError> {
        self.next_cyclic_procedure_on(clock::now().date)
    }

    pub fn next_cyclic_procedure_on(
        &self,
        today: NaiveDate,
    ) -> Result<Option<NextProcedure>, CoreError> {
        let mut next: Option<NextProcedure> = None;
        let mut best_days = i64::MAX;
        for procedure in self.catalog.active_procedures()? {
            if let Some(due) = procedure.next_due(today) {
                let days = (due - today).num_days();
                if days >= 0 && days < best_days {
                    best_days = days;
                    next = Some(NextProcedure {
                        name: procedure.name,
                        due_date: due,
                        days_remaining: days,
                        instructions: procedure.instructions,
                    });
                }
            }
        }
        Ok(next)
    }

    /// Record a guidance item as executed. Appends unconditionally: a
    /// duplicate mark produces a duplicate record.
    pub fn mark_executed(
        &self,
        caregiver_id: i64,
        request: &MarkExecutedRequest,
    ) -> Result<bool, CoreError> {
        let category = ExecutionCategory::from_label(&request.category)
            .ok_or_else(|| CoreError::InvalidCategory(request.category.clone()))?;
        self.executions.append(&NewExecution {
            category,
            reference_id: request.reference_id,
            caregiver_id,
            executed_at: Utc::now(),
            note: request.note.clone(),
        })?;
        info!(
            "execution recorded: {} ref {} by caregiver {}",
            request.category, request.reference_id, caregiver_id
        );
        Ok(true)
    }
}

/// Priority by proximity of the scheduled time to now: within 15 minutes
/// urgent, within an hour normal, otherwise it can wait.
fn priority_for(scheduled: NaiveTime, now: NaiveTime) -> u8 {
    let minutes = (scheduled - now).num_minutes().abs();
    if minutes <= 15 {
        1
    } else if minutes <= 60 {
        2
    } else {
        3
    }
}

fn is_night(time: NaiveTime) -> bool {
    time.hour() >= 20 || time.hour() < 6
}

fn is_executed(executions: &[ExecutionRecord], category: ExecutionCategory, id: i64) -> bool {
    executions
        .iter()
        .any(|e| e.category == category && e.reference_id == id)
}

fn item_from_schedule(dose: &ScheduledDose, priority: u8, executed: bool) -> GuidanceItem {
    GuidanceItem {
        id: dose.schedule.id,
        kind: dose.medication.category.label().to_string(),
        name: dose.medication.name.clone(),
        dosage: format!("{} {}", dose.medication.dosage, dose.medication.unit),
        instructions: dose.medication.instructions.clone(),
        scheduled_time: dose.schedule.time_of_day,
        meal_context: dose.schedule.meal_context.map(|m| m.label().to_string()),
        priority,
        executed,
    }
}
