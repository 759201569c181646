//! Retrospective analytics over the caregiver vitals log
//!
//! Time in range, hierarchical alerts, weekly heatmap, daily timeline,
//! insulin effectiveness and pattern detection. Everything here is a pure
//! derivation from logged entries within a date window; window boundaries
//! are UTC calendar days. Empty data is a normal state, never an error:
//! every function degrades to zero counts and empty lists.

use std::collections::BTreeMap;

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike, Utc};
use log::debug;
use serde::Serialize;

use crate::bands::{self, GlucoseBand};
use crate::error::CoreError;
use crate::model::{MealType, VitalsEntry};
use crate::store::{CatalogReader, VitalsReader};

/// Default lookback for windowed analytics.
pub const DEFAULT_WINDOW_DAYS: i64 = 30;
/// Default heatmap span.
pub const DEFAULT_HEATMAP_WEEKS: i64 = 4;

/// Severity tier of a derived alert.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AlertSeverity {
    #[serde(rename = "critical")]
    Critical,
    #[serde(rename = "warning")]
    Warning,
    #[serde(rename = "info")]
    Info,
}

/// Percentage and count of readings per glucose band over a window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeInRange {
    pub total_readings: usize,
    pub percent_very_low: f64,
    pub percent_low: f64,
    pub percent_ideal: f64,
    pub percent_high: f64,
    pub percent_very_high: f64,
    pub count_very_low: usize,
    pub count_low: usize,
    pub count_ideal: usize,
    pub count_high: usize,
    pub count_very_high: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trend: Option<Trend>,
}

impl TimeInRange {
    fn empty() -> Self {
        TimeInRange {
            total_readings: 0,
            percent_very_low: 0.0,
            percent_low: 0.0,
            percent_ideal: 0.0,
            percent_high: 0.0,
            percent_very_high: 0.0,
            count_very_low: 0,
            count_low: 0,
            count_ideal: 0,
            count_high: 0,
            count_very_high: 0,
            trend: None,
        }
    }
}

/// Change in the ideal-band percentage against the preceding window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Trend {
    /// Percentage-point change, rounded to one decimal.
    pub ideal_percent_change: f64,
    /// "melhora", "piora" or "estavel".
    pub direction: String,
}

/// One derived alert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Alert {
    pub severity: AlertSeverity,
    pub alert_type: String,
    pub title: String,
    pub message: String,
    pub action: Option<String>,
    pub occurred_on: Option<NaiveDate>,
}

/// Alerts over the trailing week, bucketed by severity.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveAlerts {
    pub critical: Vec<Alert>,
    pub warning: Vec<Alert>,
    pub info: Vec<Alert>,
}

/// One weekday/period bucket of the heatmap.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HeatmapCell {
    pub weekday: String,
    pub period: String,
    /// Mean glucose rounded to the nearest integer; 0 without data.
    pub mean_glucose: f64,
    /// "sem_dados", "controlado", "atencao" or "critico".
    pub status: String,
    pub readings: usize,
}

/// 7 weekdays by 3 day-periods, weekday-major order.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Heatmap {
    pub cells: Vec<HeatmapCell>,
    pub weekday_labels: Vec<String>,
    pub period_labels: Vec<String>,
}

/// One meal event on the daily timeline.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimelineEvent {
    pub timestamp: NaiveDateTime,
    pub kind: String,
    pub title: String,
    pub description: String,
    pub glucose_before: i32,
    pub glucose_after: i32,
    /// Post minus pre, present only when both were measured.
    pub delta: Option<i32>,
    /// "critico", "atencao" or "ok".
    pub severity: String,
    pub medications: Vec<String>,
    pub insulin_dose: Option<i32>,
}

/// Aggregate outcome of one fast-insulin dose amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsulinEffectiveness {
    pub dose_units: i32,
    /// Mean pre-to-post drop in mg/dL, rounded; negative when glucose rose.
    pub mean_reduction: f64,
    /// Fixed estimate, not derived from the data.
    pub time_to_effect_minutes: i64,
    /// Share of applications where glucose dropped, 0-100 rounded.
    pub success_rate: f64,
    pub applications: usize,
}

/// A detected recurring pattern in the log.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Pattern {
    /// "spike_recorrente", "hipoglicemia_horario" or "tendencia_alta".
    pub kind: String,
    pub title: String,
    pub description: String,
    pub possible_causes: Vec<String>,
    pub recommendation: String,
    pub severity: AlertSeverity,
    pub occurrences: Vec<NaiveDate>,
}

pub struct AnalyticsEngine<'a, V, C> {
    vitals: &'a V,
    catalog: &'a C,
}

impl<'a, V: VitalsReader, C: CatalogReader> AnalyticsEngine<'a, V, C> {
    pub fn new(vitals: &'a V, catalog: &'a C) -> Self {
        Self { vitals, catalog }
    }

    /// Band distribution of all readings in the trailing window, with a
    /// trend against the preceding window of equal length.
    pub fn time_in_range(
        &self,
        caregiver_id: i64,
        window_days: i64,
    ) -> Result<TimeInRange, CoreError> {
        self.time_in_range_on(caregiver_id, window_days, utc_today())
    }

    pub fn time_in_range_on(
        &self,
        caregiver_id: i64,
        window_days: i64,
        today: NaiveDate,
    ) -> Result<TimeInRange, CoreError> {
        let from = today - Duration::days(window_days);
        let entries = self.vitals.entries_since(caregiver_id, from)?;
        let readings: Vec<i32> = entries.iter().flat_map(VitalsEntry::readings).collect();
        if readings.is_empty() {
            return Ok(TimeInRange::empty());
        }

        let mut counts = [0usize; 5];
        for &g in &readings {
            counts[band_index(GlucoseBand::classify(g))] += 1;
        }
        let total = readings.len();
        let percent = |count: usize| round1(count as f64 / total as f64 * 100.0);

        let trend = self.ideal_trend_on(caregiver_id, window_days, today, &readings)?;
        debug!(
            "time in range for caregiver {caregiver_id}: {total} readings over {window_days} days"
        );

        Ok(TimeInRange {
            total_readings: total,
            percent_very_low: percent(counts[0]),
            percent_low: percent(counts[1]),
            percent_ideal: percent(counts[2]),
            percent_high: percent(counts[3]),
            percent_very_high: percent(counts[4]),
            count_very_low: counts[0],
            count_low: counts[1],
            count_ideal: counts[2],
            count_high: counts[3],
            count_very_high: counts[4],
            trend,
        })
    }

    /// Ideal-percentage trend versus the window immediately before the
    /// current one. Needs at least 3 entries and 1 reading back there.
    fn ideal_trend_on(
        &self,
        caregiver_id: i64,
        window_days: i64,
        today: NaiveDate,
        current_readings: &[i32],
    ) -> Result<Option<Trend>, CoreError> {
        let current_start = today - Duration::days(window_days);
        let previous_start = current_start - Duration::days(window_days);
        let previous_end = current_start - Duration::days(1);

        let previous_entries =
            self.vitals
                .entries_between(caregiver_id, previous_start, previous_end)?;
        if previous_entries.len() < 3 {
            return Ok(None);
        }
        let previous: Vec<i32> = previous_entries
            .iter()
            .flat_map(VitalsEntry::readings)
            .collect();
        if previous.is_empty() || current_readings.is_empty() {
            return Ok(None);
        }

        let change = ideal_percent(current_readings) - ideal_percent(&previous);
        let direction = if change > 2.0 {
            "melhora"
        } else if change < -2.0 {
            "piora"
        } else {
            "estavel"
        };
        Ok(Some(Trend {
            ideal_percent_change: round1(change),
            direction: direction.to_string(),
        }))
    }

    /// Hierarchical alerts over the trailing 7 days.
    pub fn active_alerts(&self, caregiver_id: i64) -> Result<ActiveAlerts, CoreError> {
        self.active_alerts_on(caregiver_id, utc_today())
    }

    pub fn active_alerts_on(
        &self,
        caregiver_id: i64,
        today: NaiveDate,
    ) -> Result<ActiveAlerts, CoreError> {
        let entries = self
            .vitals
            .entries_since(caregiver_id, today - Duration::days(7))?;

        let mut critical = Vec::new();
        let mut warning = Vec::new();
        let mut info = Vec::new();

        let todays: Vec<&VitalsEntry> = entries.iter().filter(|e| e.date == today).collect();
        let hypos = todays
            .iter()
            .filter(|e| e.readings().any(|g| g < bands::LOW))
            .count();
        if hypos > 0 {
            critical.push(Alert {
                severity: AlertSeverity::Critical,
                alert_type: "HIPOGLICEMIA".to_string(),
                title: "Hipoglicemia Detectada".to_string(),
                message: format!("{hypos} valor(es) abaixo de 70 mg/dL hoje"),
                action: Some("Contatar o médico responsável".to_string()),
                occurred_on: Some(today),
            });
        }
        let severe_highs = todays
            .iter()
            .filter(|e| e.readings().any(|g| g > 300))
            .count();
        if severe_highs > 0 {
            critical.push(Alert {
                severity: AlertSeverity::Critical,
                alert_type: "HIPERGLICEMIA_SEVERA".to_string(),
                title: "Glicemia Muito Alta".to_string(),
                message: format!("{severe_highs} valor(es) acima de 300 mg/dL hoje"),
                action: Some("Verificar dosagem de insulina".to_string()),
                occurred_on: Some(today),
            });
        }

        // Per-meal post-meal mean over the whole week.
        for meal in MealType::all() {
            let post: Vec<i32> = entries
                .iter()
                .filter(|e| e.meal == meal && e.glucose_after > 0)
                .map(|e| e.glucose_after)
                .collect();
            if post.is_empty() {
                continue;
            }
            let mean = mean_of(&post);
            if mean > 200.0 {
                warning.push(Alert {
                    severity: AlertSeverity::Warning,
                    alert_type: "PADRAO_ALTA".to_string(),
                    title: "Padrão de Glicemia Alta".to_string(),
                    message: format!(
                        "Glicemia média de {} mg/dL após {}",
                        mean.round(),
                        meal.display_name()
                    ),
                    action: Some("Ver recomendações".to_string()),
                    occurred_on: None,
                });
            }
        }

        let procedures = self.catalog.active_procedures()?;
        for procedure in &procedures {
            if let Some(due) = procedure.next_due(today) {
                let days = (due - today).num_days();
                if (0..=2).contains(&days) {
                    warning.push(Alert {
                        severity: AlertSeverity::Warning,
                        alert_type: "PROCEDIMENTO_PROXIMO".to_string(),
                        title: format!("{} em breve", procedure.name),
                        message: if days == 0 {
                            "Hoje!".to_string()
                        } else {
                            format!("Em {days} dia(s)")
                        },
                        action: procedure.instructions.clone(),
                        occurred_on: Some(due),
                    });
                }
            }
        }

        let streak = consecutive_days_in_target(&entries);
        if streak >= 3 {
            info.push(Alert {
                severity: AlertSeverity::Info,
                alert_type: "DIAS_EM_META".to_string(),
                title: "Excelente Controle!".to_string(),
                message: format!("{streak} dias consecutivos com glicemia na meta"),
                action: None,
                occurred_on: None,
            });
        }

        let upcoming = procedures
            .iter()
            .filter_map(|p| p.next_due(today).map(|due| (p, due)))
            .filter(|(_, due)| (*due - today).num_days() > 2)
            .min_by_key(|(_, due)| *due);
        if let Some((procedure, due)) = upcoming {
            let days = (due - today).num_days();
            info.push(Alert {
                severity: AlertSeverity::Info,
                alert_type: "PROCEDIMENTO_FUTURO".to_string(),
                title: procedure.name.clone(),
                message: format!("Próxima aplicação em {days} dias ({})", due.format("%d/%m")),
                action: None,
                occurred_on: Some(due),
            });
        }

        Ok(ActiveAlerts {
            critical,
            warning,
            info,
        })
    }

    /// Mean glucose per weekday and day-period over the trailing weeks.
    pub fn weekly_heatmap(&self, caregiver_id: i64, weeks: i64) -> Result<Heatmap, CoreError> {
        self.weekly_heatmap_on(caregiver_id, weeks, utc_today())
    }

    pub fn weekly_heatmap_on(
        &self,
        caregiver_id: i64,
        weeks: i64,
        today: NaiveDate,
    ) -> Result<Heatmap, CoreError> {
        let from = today - Duration::days(weeks * 7);
        let entries = self.vitals.entries_since(caregiver_id, from)?;

        let mut cells = Vec::with_capacity(WEEKDAY_LABELS.len() * PERIOD_LABELS.len());
        for (weekday, weekday_label) in WEEKDAY_LABELS.iter().enumerate() {
            for (period, period_label) in PERIOD_LABELS.iter().enumerate() {
                let readings: Vec<i32> = entries
                    .iter()
                    .filter(|e| {
                        e.weekday_index() as usize == weekday
                            && period_of_hour(e.time_before.hour()) == period
                    })
                    .flat_map(VitalsEntry::readings)
                    .collect();

                if readings.is_empty() {
                    cells.push(HeatmapCell {
                        weekday: weekday_label.to_string(),
                        period: period_label.to_string(),
                        mean_glucose: 0.0,
                        status: "sem_dados".to_string(),
                        readings: 0,
                    });
                    continue;
                }

                let mean = mean_of(&readings);
                let status = if mean < f64::from(bands::LOW) || mean > f64::from(bands::HIGH_MAX) {
                    "critico"
                } else if mean > f64::from(bands::IDEAL_MAX) {
                    "atencao"
                } else {
                    "controlado"
                };
                cells.push(HeatmapCell {
                    weekday: weekday_label.to_string(),
                    period: period_label.to_string(),
                    mean_glucose: mean.round(),
                    status: status.to_string(),
                    readings: readings.len(),
                });
            }
        }

        Ok(Heatmap {
            cells,
            weekday_labels: WEEKDAY_LABELS.iter().map(|s| s.to_string()).collect(),
            period_labels: PERIOD_LABELS.iter().map(|s| s.to_string()).collect(),
        })
    }

    /// Meal events of one calendar date, ordered by pre-meal time.
    pub fn daily_timeline(
        &self,
        caregiver_id: i64,
        date: NaiveDate,
    ) -> Result<Vec<TimelineEvent>, CoreError> {
        let mut entries = self.vitals.entries_on(caregiver_id, date)?;
        entries.sort_by_key(|e| e.time_before);

        Ok(entries
            .into_iter()
            .map(|entry| {
                let delta = (entry.glucose_before > 0 && entry.glucose_after > 0)
                    .then(|| entry.glucose_after - entry.glucose_before);
                TimelineEvent {
                    timestamp: date.and_time(entry.time_before),
                    kind: "refeicao".to_string(),
                    title: entry.meal.display_name().to_string(),
                    description: format!(
                        "HGT: {} → {} mg/dL",
                        entry.glucose_before, entry.glucose_after
                    ),
                    glucose_before: entry.glucose_before,
                    glucose_after: entry.glucose_after,
                    delta,
                    severity: event_severity(&entry).to_string(),
                    medications: entry.medications_taken,
                    insulin_dose: (entry.fast_insulin_units > 0)
                        .then_some(entry.fast_insulin_units),
                }
            })
            .collect())
    }

    /// Glucose reduction per fast-insulin dose amount, ascending by dose.
    pub fn insulin_effectiveness(
        &self,
        caregiver_id: i64,
        window_days: i64,
    ) -> Result<Vec<InsulinEffectiveness>, CoreError> {
        self.insulin_effectiveness_on(caregiver_id, window_days, utc_today())
    }

    pub fn insulin_effectiveness_on(
        &self,
        caregiver_id: i64,
        window_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<InsulinEffectiveness>, CoreError> {
        let from = today - Duration::days(window_days);
        let entries = self.vitals.entries_since(caregiver_id, from)?;

        let mut by_dose: BTreeMap<i32, Vec<&VitalsEntry>> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.fast_insulin_units > 0) {
            by_dose.entry(entry.fast_insulin_units).or_default().push(entry);
        }

        let mut stats = Vec::new();
        for (dose, group) in by_dose {
            let reductions: Vec<i32> = group
                .iter()
                .filter(|e| e.glucose_before > 0 && e.glucose_after > 0)
                .map(|e| e.glucose_before - e.glucose_after)
                .collect();
            // Doses never applied with both readings measured say nothing.
            if reductions.is_empty() {
                continue;
            }
            let successes = reductions.iter().filter(|&&r| r > 0).count();
            stats.push(InsulinEffectiveness {
                dose_units: dose,
                mean_reduction: mean_of(&reductions).round(),
                time_to_effect_minutes: 120,
                success_rate: (successes as f64 / reductions.len() as f64 * 100.0).round(),
                applications: group.len(),
            });
        }
        Ok(stats)
    }

    /// Three independent heuristics: recurring post-meal spikes,
    /// time-localized hypoglycemia and a rising weekly trend.
    pub fn detect_patterns(
        &self,
        caregiver_id: i64,
        window_days: i64,
    ) -> Result<Vec<Pattern>, CoreError> {
        self.detect_patterns_on(caregiver_id, window_days, utc_today())
    }

    pub fn detect_patterns_on(
        &self,
        caregiver_id: i64,
        window_days: i64,
        today: NaiveDate,
    ) -> Result<Vec<Pattern>, CoreError> {
        let from = today - Duration::days(window_days);
        let mut entries = self.vitals.entries_since(caregiver_id, from)?;
        entries.sort_by_key(|e| e.date);

        let mut patterns = Vec::new();

        for meal in MealType::all() {
            let spikes: Vec<&VitalsEntry> = entries
                .iter()
                .filter(|e| {
                    e.meal == meal
                        && e.glucose_before > 0
                        && e.glucose_after > 0
                        && f64::from(e.glucose_after - e.glucose_before)
                            / f64::from(e.glucose_before)
                            > 0.4
                })
                .collect();
            if spikes.len() >= 3 {
                let meal_name = meal.display_name();
                patterns.push(Pattern {
                    kind: "spike_recorrente".to_string(),
                    title: format!("Picos após {meal_name}"),
                    description: format!(
                        "Glicemia sobe mais de 40% após {meal_name} em {} ocasiões",
                        spikes.len()
                    ),
                    possible_causes: vec![
                        "Carboidratos em excesso".to_string(),
                        "Insulina insuficiente".to_string(),
                        "Alimentação muito rápida".to_string(),
                    ],
                    recommendation: format!(
                        "Considere ajustar a dose de insulina pré-{}",
                        meal_name.to_lowercase()
                    ),
                    severity: AlertSeverity::Warning,
                    occurrences: spikes.iter().map(|e| e.date).collect(),
                });
            }
        }

        // Hypoglycemia episodes bucketed into four 6-hour day periods.
        let mut hypo_buckets: BTreeMap<u32, Vec<NaiveDate>> = BTreeMap::new();
        for entry in entries.iter().filter(|e| e.readings().any(|g| g < bands::LOW)) {
            hypo_buckets
                .entry(entry.time_before.hour() / 6)
                .or_default()
                .push(entry.date);
        }
        for (bucket, dates) in hypo_buckets {
            if dates.len() < 2 {
                continue;
            }
            let period = match bucket {
                0 => "madrugada (0h-6h)",
                1 => "manhã (6h-12h)",
                2 => "tarde (12h-18h)",
                _ => "noite (18h-24h)",
            };
            patterns.push(Pattern {
                kind: "hipoglicemia_horario".to_string(),
                title: format!("Hipoglicemias na {period}"),
                description: format!("{} episódios de hipoglicemia neste período", dates.len()),
                possible_causes: vec![
                    "Dose de insulina alta".to_string(),
                    "Refeição insuficiente".to_string(),
                    "Exercício físico".to_string(),
                ],
                recommendation: "Monitorar glicemia mais frequentemente neste horário"
                    .to_string(),
                severity: AlertSeverity::Warning,
                occurrences: dates,
            });
        }

        let week_ago = today - Duration::days(7);
        let fortnight_ago = today - Duration::days(14);
        let recent: Vec<&VitalsEntry> = entries.iter().filter(|e| e.date >= week_ago).collect();
        let prior: Vec<&VitalsEntry> = entries
            .iter()
            .filter(|e| e.date >= fortnight_ago && e.date < week_ago)
            .collect();
        if recent.len() >= 5 && prior.len() >= 5 {
            let recent_post: Vec<i32> = recent
                .iter()
                .filter(|e| e.glucose_after > 0)
                .map(|e| e.glucose_after)
                .collect();
            let prior_post: Vec<i32> = prior
                .iter()
                .filter(|e| e.glucose_after > 0)
                .map(|e| e.glucose_after)
                .collect();
            if !recent_post.is_empty() && !prior_post.is_empty() {
                let recent_mean = mean_of(&recent_post);
                let prior_mean = mean_of(&prior_post);
                if recent_mean > prior_mean * 1.15 {
                    patterns.push(Pattern {
                        kind: "tendencia_alta".to_string(),
                        title: "Tendência de Alta".to_string(),
                        description: format!(
                            "Glicemia média subiu de {} para {} mg/dL",
                            prior_mean.round(),
                            recent_mean.round()
                        ),
                        possible_causes: vec![
                            "Mudança na alimentação".to_string(),
                            "Redução de atividade física".to_string(),
                            "Estresse".to_string(),
                        ],
                        recommendation: "Revisar hábitos alimentares e doses de insulina"
                            .to_string(),
                        severity: AlertSeverity::Warning,
                        occurrences: Vec::new(),
                    });
                }
            }
        }

        Ok(patterns)
    }
}

const WEEKDAY_LABELS: [&str; 7] = ["Dom", "Seg", "Ter", "Qua", "Qui", "Sex", "Sáb"];
const PERIOD_LABELS: [&str; 3] = ["Manhã", "Tarde", "Noite"];

fn utc_today() -> NaiveDate {
    Utc::now().date_naive()
}

fn band_index(band: GlucoseBand) -> usize {
    match band {
        GlucoseBand::MuitoBaixo => 0,
        GlucoseBand::Baixo => 1,
        GlucoseBand::Ideal => 2,
        GlucoseBand::Alto => 3,
        GlucoseBand::MuitoAlto => 4,
    }
}

fn period_of_hour(hour: u32) -> usize {
    if (6..12).contains(&hour) {
        0
    } else if (12..18).contains(&hour) {
        1
    } else {
        2
    }
}

fn ideal_percent(readings: &[i32]) -> f64 {
    let ideal = readings.iter().filter(|&&g| GlucoseBand::in_target(g)).count();
    ideal as f64 / readings.len() as f64 * 100.0
}

fn mean_of(values: &[i32]) -> f64 {
    values.iter().map(|&v| f64::from(v)).sum::<f64>() / values.len() as f64
}

fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

/// Trailing streak of days whose every measured reading was in target.
/// Days without entries do not appear and do not break the streak; a day
/// with entries but no measured readings does.
fn consecutive_days_in_target(entries: &[VitalsEntry]) -> usize {
    let mut by_day: BTreeMap<NaiveDate, Vec<i32>> = BTreeMap::new();
    for entry in entries {
        by_day.entry(entry.date).or_default().extend(entry.readings());
    }
    let mut streak = 0;
    for readings in by_day.values().rev() {
        if readings.is_empty() || !readings.iter().all(|&g| GlucoseBand::in_target(g)) {
            break;
        }
        streak += 1;
    }
    streak
}

/// Worst severity among the entry's measured readings.
fn event_severity(entry: &VitalsEntry) -> &'static str {
    let readings: Vec<i32> = entry.readings().collect();
    if readings.is_empty() {
        return "ok";
    }
    if readings.iter().any(|&g| g < bands::VERY_LOW || g > 300) {
        "critico"
    } else if readings.iter().any(|&g| g < bands::LOW || g > bands::HIGH_MAX) {
        "atencao"
    } else {
        "ok"
    }
}
