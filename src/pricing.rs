//! Trade-in price calculation
//!
//! A quote runs in a fixed order: the condition factor scales the base price,
//! every damage flag then deducts its percentage of that post-condition price,
//! and the result is clamped at zero. Each monetary aggregate is rounded to
//! cents with half-up semantics.
use chrono::{DateTime, Datelike, Utc};
use rand::Rng;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

const REFERENCE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
const REFERENCE_SUFFIX_LEN: usize = 6;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConditionLevel {
    #[n(0)]
    SehrGut,
    #[n(1)]
    Gut,
    #[n(2)]
    Gebraucht,
    #[n(3)]
    StarkGebraucht,
    #[n(4)]
    Defekt,
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DamageFlag {
    #[n(0)]
    DisplayKratzer,
    #[n(1)]
    DisplayRiss,
    #[n(2)]
    DisplayDefekt,
    #[n(3)]
    GehaeuseKratzer,
    #[n(4)]
    GehaeuseDelle,
    #[n(5)]
    AkkuSchwach,
    #[n(6)]
    KameraDefekt,
    #[n(7)]
    TastenDefekt,
    #[n(8)]
    Wasserschaden,
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
#[error("unknown {kind} `{value}`")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

impl UnknownVariant {
    pub(crate) fn new(kind: &'static str, value: &str) -> Self {
        Self {
            kind,
            value: value.to_owned(),
        }
    }
}

impl ConditionLevel {
    pub const ALL: [ConditionLevel; 5] = [
        ConditionLevel::SehrGut,
        ConditionLevel::Gut,
        ConditionLevel::Gebraucht,
        ConditionLevel::StarkGebraucht,
        ConditionLevel::Defekt,
    ];

    /// Multiplicative factor applied to the base price.
    pub fn factor(self) -> Decimal {
        match self {
            ConditionLevel::SehrGut => Decimal::ONE,
            ConditionLevel::Gut => Decimal::new(85, 2),
            ConditionLevel::Gebraucht => Decimal::new(70, 2),
            ConditionLevel::StarkGebraucht => Decimal::new(50, 2),
            ConditionLevel::Defekt => Decimal::new(20, 2),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ConditionLevel::SehrGut => "SEHR_GUT",
            ConditionLevel::Gut => "GUT",
            ConditionLevel::Gebraucht => "GEBRAUCHT",
            ConditionLevel::StarkGebraucht => "STARK_GEBRAUCHT",
            ConditionLevel::Defekt => "DEFEKT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ConditionLevel::SehrGut => "Sehr gut",
            ConditionLevel::Gut => "Gut",
            ConditionLevel::Gebraucht => "Gebraucht",
            ConditionLevel::StarkGebraucht => "Stark gebraucht",
            ConditionLevel::Defekt => "Defekt",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            ConditionLevel::SehrGut => "Wie neu, keine sichtbaren Gebrauchsspuren",
            ConditionLevel::Gut => "Leichte Gebrauchsspuren, voll funktionsfähig",
            ConditionLevel::Gebraucht => "Deutliche Gebrauchsspuren, voll funktionsfähig",
            ConditionLevel::StarkGebraucht => {
                "Starke Gebrauchsspuren, eingeschränkte Optik, funktionsfähig"
            }
            ConditionLevel::Defekt => "Nicht oder nur teilweise funktionsfähig",
        }
    }
}

impl DamageFlag {
    pub const ALL: [DamageFlag; 9] = [
        DamageFlag::DisplayKratzer,
        DamageFlag::DisplayRiss,
        DamageFlag::DisplayDefekt,
        DamageFlag::GehaeuseKratzer,
        DamageFlag::GehaeuseDelle,
        DamageFlag::AkkuSchwach,
        DamageFlag::KameraDefekt,
        DamageFlag::TastenDefekt,
        DamageFlag::Wasserschaden,
    ];

    /// Share of the post-condition price deducted for this defect.
    pub fn deduction_percent(self) -> Decimal {
        match self {
            DamageFlag::DisplayKratzer => Decimal::new(5, 2),
            DamageFlag::DisplayRiss => Decimal::new(20, 2),
            DamageFlag::DisplayDefekt => Decimal::new(50, 2),
            DamageFlag::GehaeuseKratzer => Decimal::new(2, 2),
            DamageFlag::GehaeuseDelle => Decimal::new(5, 2),
            DamageFlag::AkkuSchwach => Decimal::new(10, 2),
            DamageFlag::KameraDefekt => Decimal::new(15, 2),
            DamageFlag::TastenDefekt => Decimal::new(8, 2),
            DamageFlag::Wasserschaden => Decimal::new(50, 2),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DamageFlag::DisplayKratzer => "DISPLAY_KRATZER",
            DamageFlag::DisplayRiss => "DISPLAY_RISS",
            DamageFlag::DisplayDefekt => "DISPLAY_DEFEKT",
            DamageFlag::GehaeuseKratzer => "GEHAEUSE_KRATZER",
            DamageFlag::GehaeuseDelle => "GEHAEUSE_DELLE",
            DamageFlag::AkkuSchwach => "AKKU_SCHWACH",
            DamageFlag::KameraDefekt => "KAMERA_DEFEKT",
            DamageFlag::TastenDefekt => "TASTEN_DEFEKT",
            DamageFlag::Wasserschaden => "WASSERSCHADEN",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            DamageFlag::DisplayKratzer => "Kratzer auf dem Display",
            DamageFlag::DisplayRiss => "Riss im Display",
            DamageFlag::DisplayDefekt => "Display defekt (Pixelfehler, keine Anzeige)",
            DamageFlag::GehaeuseKratzer => "Kratzer am Gehäuse",
            DamageFlag::GehaeuseDelle => "Dellen oder Verformungen am Gehäuse",
            DamageFlag::AkkuSchwach => "Akkukapazität deutlich reduziert",
            DamageFlag::KameraDefekt => "Kamera defekt",
            DamageFlag::TastenDefekt => "Tasten ohne Funktion",
            DamageFlag::Wasserschaden => "Wasserschaden",
        }
    }
}

impl fmt::Display for ConditionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Display for DamageFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionLevel {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|level| level.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("condition level", s))
    }
}

impl FromStr for DamageFlag {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|flag| flag.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("damage flag", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageDeduction {
    pub flag: DamageFlag,
    pub percent: Decimal,
    pub deduction_euro: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub base_price_euro: Decimal,
    pub condition_level: ConditionLevel,
    pub condition_factor: Decimal,
    pub condition_deduction_euro: Decimal,
    pub damage_deductions: Vec<DamageDeduction>,
    pub total_damage_deduction_euro: Decimal,
    pub final_price_euro: Decimal,
}

/// Rounds to cents, half away from zero.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Computes an itemized quote.
///
/// Flags are applied in the order given. Repeated flags are not merged, so a
/// flag listed twice is deducted twice. The final price never drops below
/// zero, but individual deductions are not capped.
pub fn calculate_price(
    base_price_euro: Decimal,
    condition_level: ConditionLevel,
    damage_flags: &[DamageFlag],
) -> PriceBreakdown {
    let condition_factor = condition_level.factor();
    let price_after_condition = base_price_euro * condition_factor;
    let condition_deduction_euro = round2(base_price_euro - price_after_condition);

    let damage_deductions: Vec<DamageDeduction> = damage_flags
        .iter()
        .map(|&flag| {
            let percent = flag.deduction_percent();
            DamageDeduction {
                flag,
                percent,
                deduction_euro: round2(price_after_condition * percent),
            }
        })
        .collect();

    let total_damage_deduction_euro =
        round2(damage_deductions.iter().map(|d| d.deduction_euro).sum());

    let final_price_euro =
        round2(price_after_condition - total_damage_deduction_euro).max(Decimal::ZERO);

    PriceBreakdown {
        base_price_euro,
        condition_level,
        condition_factor,
        condition_deduction_euro,
        damage_deductions,
        total_damage_deduction_euro,
        final_price_euro,
    }
}

/// Formats an amount the German way: `1.234,56 €`.
pub fn format_euro(amount: Decimal) -> String {
    let mut rounded = round2(amount);
    rounded.rescale(2);
    let plain = rounded.abs().to_string();
    let (integer, fraction) = plain.split_once('.').unwrap_or((plain.as_str(), "00"));

    let mut grouped = String::with_capacity(integer.len() + integer.len() / 3);
    for (i, digit) in integer.chars().enumerate() {
        if i > 0 && (integer.len() - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }

    let sign = if rounded.is_sign_negative() && !rounded.is_zero() {
        "-"
    } else {
        ""
    };
    format!("{sign}{grouped},{fraction} €")
}

/// Reference code of the form `BY-YYYYMM-XXXXXX`.
///
/// Collisions are possible and not checked here.
pub fn generate_reference_code() -> String {
    reference_code_at(Utc::now(), &mut rand::thread_rng())
}

pub(crate) fn reference_code_at<R: Rng + ?Sized>(now: DateTime<Utc>, rng: &mut R) -> String {
    let suffix: String = (0..REFERENCE_SUFFIX_LEN)
        .map(|_| REFERENCE_ALPHABET[rng.gen_range(0..REFERENCE_ALPHABET.len())] as char)
        .collect();
    format!("BY-{:04}{:02}-{suffix}", now.year(), now.month())
}

pub fn get_condition_description(level: ConditionLevel) -> &'static str {
    level.description()
}

pub fn get_damage_description(flag: DamageFlag) -> &'static str {
    flag.description()
}
