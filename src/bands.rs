//! Glucose band thresholds and classification (mg/dL)
//!
//! The analytics engine classifies every reading into one of five clinical
//! bands. Thresholds follow the values configured for the patient:
//! severe hypoglycemia below 54, target range 70-180, severe
//! hyperglycemia above 250.

use serde::{Deserialize, Serialize};

/// Severe hypoglycemia threshold (exclusive lower bound of "low").
pub const VERY_LOW: i32 = 54;
/// Hypoglycemia threshold and lower bound of the target range.
pub const LOW: i32 = 70;
/// Upper bound of the target range (inclusive).
pub const IDEAL_MAX: i32 = 180;
/// Upper bound of "high" (inclusive); above this is severe hyperglycemia.
pub const HIGH_MAX: i32 = 250;

/// Classification of a glucose reading into the five clinical bands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum GlucoseBand {
    #[serde(rename = "muito_baixo")]
    MuitoBaixo,
    #[serde(rename = "baixo")]
    Baixo,
    #[serde(rename = "ideal")]
    Ideal,
    #[serde(rename = "alto")]
    Alto,
    #[serde(rename = "muito_alto")]
    MuitoAlto,
}

impl GlucoseBand {
    /// Classify a reading in mg/dL.
    pub fn classify(mg_dl: i32) -> Self {
        if mg_dl < VERY_LOW {
            GlucoseBand::MuitoBaixo
        } else if mg_dl < LOW {
            GlucoseBand::Baixo
        } else if mg_dl <= IDEAL_MAX {
            GlucoseBand::Ideal
        } else if mg_dl <= HIGH_MAX {
            GlucoseBand::Alto
        } else {
            GlucoseBand::MuitoAlto
        }
    }

    /// Whether the reading sits in the clinically ideal band.
    pub fn in_target(mg_dl: i32) -> bool {
        (LOW..=IDEAL_MAX).contains(&mg_dl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification_boundaries() {
        assert_eq!(GlucoseBand::classify(53), GlucoseBand::MuitoBaixo);
        assert_eq!(GlucoseBand::classify(54), GlucoseBand::Baixo);
        assert_eq!(GlucoseBand::classify(69), GlucoseBand::Baixo);
        assert_eq!(GlucoseBand::classify(70), GlucoseBand::Ideal);
        assert_eq!(GlucoseBand::classify(180), GlucoseBand::Ideal);
        assert_eq!(GlucoseBand::classify(181), GlucoseBand::Alto);
        assert_eq!(GlucoseBand::classify(250), GlucoseBand::Alto);
        assert_eq!(GlucoseBand::classify(251), GlucoseBand::MuitoAlto);
    }

    #[test]
    fn bands_partition_the_domain() {
        // Every value lands in exactly one band.
        for g in 0..=500 {
            let band = GlucoseBand::classify(g);
            let memberships = [
                g < VERY_LOW,
                (VERY_LOW..LOW).contains(&g),
                (LOW..=IDEAL_MAX).contains(&g),
                g > IDEAL_MAX && g <= HIGH_MAX,
                g > HIGH_MAX,
            ];
            assert_eq!(memberships.iter().filter(|&&m| m).count(), 1);
            let expected = match memberships.iter().position(|&m| m) {
                Some(0) => GlucoseBand::MuitoBaixo,
                Some(1) => GlucoseBand::Baixo,
                Some(2) => GlucoseBand::Ideal,
                Some(3) => GlucoseBand::Alto,
                _ => GlucoseBand::MuitoAlto,
            };
            assert_eq!(band, expected);
        }
    }

    #[test]
    fn in_target_matches_ideal_band() {
        assert!(GlucoseBand::in_target(70));
        assert!(GlucoseBand::in_target(180));
        assert!(!GlucoseBand::in_target(69));
        assert!(!GlucoseBand::in_target(181));
    }
}
