//! Clock/locale adapter for the fixed Brazil time zone
//!
//! Every guidance window and display date is computed in Brazil local time.
//! Zone resolution tries the IANA id first, then the legacy alias, and
//! finally falls back to a fixed UTC-3 offset, so callers always get a
//! usable zone. The first successful resolution is cached for the process
//! lifetime.

use std::sync::OnceLock;

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use log::warn;

#[derive(Debug, Clone, Copy)]
enum BrazilZone {
    Named(Tz),
    Fixed(FixedOffset),
}

static ZONE: OnceLock<BrazilZone> = OnceLock::new();

fn resolve_zone() -> BrazilZone {
    if let Ok(tz) = "America/Sao_Paulo".parse::<Tz>() {
        return BrazilZone::Named(tz);
    }
    if let Ok(tz) = "Brazil/East".parse::<Tz>() {
        return BrazilZone::Named(tz);
    }
    warn!("no named Brazil time zone available, falling back to fixed UTC-3");
    match FixedOffset::west_opt(3 * 3600) {
        Some(offset) => BrazilZone::Fixed(offset),
        // 3 hours is always a representable offset
        None => unreachable!("UTC-3 is a valid fixed offset"),
    }
}

fn zone() -> BrazilZone {
    *ZONE.get_or_init(resolve_zone)
}

/// A resolved "now": the UTC instant plus its Brazil-local projection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LocalNow {
    /// The instant this snapshot was taken.
    pub utc: DateTime<Utc>,
    /// Calendar date in Brazil local time.
    pub date: NaiveDate,
    /// Wall-clock time in Brazil local time.
    pub time: NaiveTime,
    /// Local weekday.
    pub weekday: Weekday,
}

impl LocalNow {
    /// Weekday ordinal used across the core: 0 = Sunday .. 6 = Saturday.
    pub fn weekday_index(&self) -> u8 {
        self.weekday.num_days_from_sunday() as u8
    }

    /// Weekday name in Portuguese.
    pub fn weekday_name(&self) -> &'static str {
        weekday_name_pt(self.weekday)
    }
}

/// Snapshot the current instant in the Brazil zone.
pub fn now() -> LocalNow {
    at(Utc::now())
}

/// Project an arbitrary UTC instant into the Brazil zone.
pub fn at(utc: DateTime<Utc>) -> LocalNow {
    let local: DateTime<FixedOffset> = match zone() {
        BrazilZone::Named(tz) => utc.with_timezone(&tz).fixed_offset(),
        BrazilZone::Fixed(offset) => utc.with_timezone(&offset),
    };
    LocalNow {
        utc,
        date: local.date_naive(),
        time: local.time(),
        weekday: local.weekday(),
    }
}

/// Portuguese weekday name, as displayed to caregivers.
pub fn weekday_name_pt(weekday: Weekday) -> &'static str {
    match weekday {
        Weekday::Sun => "Domingo",
        Weekday::Mon => "Segunda-feira",
        Weekday::Tue => "Terça-feira",
        Weekday::Wed => "Quarta-feira",
        Weekday::Thu => "Quinta-feira",
        Weekday::Fri => "Sexta-feira",
        Weekday::Sat => "Sábado",
    }
}
