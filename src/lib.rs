//! Guidance and analytics core for a diabetes caregiving log.
//!
//! Caregivers of one patient log meal-time glucose readings, insulin doses
//! and medication adherence; this crate derives the actionable side of that
//! data. The [`guidance`] engine answers "what must happen now": scheduled
//! medications around the current time, the fast-insulin dose for a glucose
//! reading, critical-range alerts and recurring-procedure due dates. The
//! [`analytics`] engine answers "how is it going": time in range, weekly
//! heatmaps, daily timelines, insulin effectiveness and recurring patterns.
//!
//! Both engines are pure read/derive layers over three collaborator traits
//! in [`store`]; [`storage`] ships the SQLite implementation. All wall-clock
//! decisions resolve through [`clock`], which pins the patient's Brazilian
//! time zone once per process.

pub mod analytics;
pub mod bands;
pub mod clock;
pub mod error;
pub mod guidance;
pub mod model;
pub mod store;
pub mod storage;

pub use analytics::AnalyticsEngine;
pub use bands::GlucoseBand;
pub use error::CoreError;
pub use guidance::GuidanceEngine;
pub use storage::SqliteStore;
