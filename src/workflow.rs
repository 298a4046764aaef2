//! Offer status workflow
//!
//! The successor table in [`OfferStatus::next_statuses`] is the only place
//! transitions are defined. Everything else here (terminal detection,
//! progress, step lists, timelines) is a display lookup.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::pricing::UnknownVariant;

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    minicbor::Encode,
    minicbor::Decode,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OfferStatus {
    #[n(0)]
    Entwurf,
    #[n(1)]
    AngebotErstellt,
    #[n(2)]
    GeraetEingesendet,
    #[n(3)]
    InPruefung,
    #[n(4)]
    AngebotAngepasst,
    #[n(5)]
    Akzeptiert,
    #[n(6)]
    Abgelehnt,
    #[n(7)]
    AuszahlungInitiiert,
    #[n(8)]
    Ausgezahlt,
    #[n(9)]
    Storniert,
}

/// The linear path an offer takes when nothing goes wrong.
pub const HAPPY_PATH: [OfferStatus; 6] = [
    OfferStatus::AngebotErstellt,
    OfferStatus::GeraetEingesendet,
    OfferStatus::InPruefung,
    OfferStatus::Akzeptiert,
    OfferStatus::AuszahlungInitiiert,
    OfferStatus::Ausgezahlt,
];

// off-path statuses are shown after this many completed happy-path steps
const OFF_PATH_COMPLETED_STEPS: usize = 3;

impl OfferStatus {
    pub const ALL: [OfferStatus; 10] = [
        OfferStatus::Entwurf,
        OfferStatus::AngebotErstellt,
        OfferStatus::GeraetEingesendet,
        OfferStatus::InPruefung,
        OfferStatus::AngebotAngepasst,
        OfferStatus::Akzeptiert,
        OfferStatus::Abgelehnt,
        OfferStatus::AuszahlungInitiiert,
        OfferStatus::Ausgezahlt,
        OfferStatus::Storniert,
    ];

    pub fn next_statuses(self) -> &'static [OfferStatus] {
        use OfferStatus::*;
        match self {
            Entwurf => &[AngebotErstellt, Storniert],
            AngebotErstellt => &[GeraetEingesendet, Storniert],
            GeraetEingesendet => &[InPruefung],
            InPruefung => &[AngebotAngepasst, Akzeptiert, Abgelehnt],
            AngebotAngepasst => &[Akzeptiert, Abgelehnt, Storniert],
            Akzeptiert => &[AuszahlungInitiiert],
            AuszahlungInitiiert => &[Ausgezahlt],
            Abgelehnt | Ausgezahlt | Storniert => &[],
        }
    }

    pub fn can_transition_to(self, to: OfferStatus) -> bool {
        self.next_statuses().contains(&to)
    }

    pub fn is_terminal(self) -> bool {
        self.next_statuses().is_empty()
    }

    /// Fixed progress shown to the customer. All end states report 100.
    pub fn progress_percentage(self) -> u8 {
        match self {
            OfferStatus::Entwurf => 0,
            OfferStatus::AngebotErstellt => 15,
            OfferStatus::GeraetEingesendet => 30,
            OfferStatus::InPruefung => 50,
            OfferStatus::AngebotAngepasst => 60,
            OfferStatus::Akzeptiert => 70,
            OfferStatus::AuszahlungInitiiert => 85,
            OfferStatus::Ausgezahlt | OfferStatus::Abgelehnt | OfferStatus::Storniert => 100,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            OfferStatus::Entwurf => "ENTWURF",
            OfferStatus::AngebotErstellt => "ANGEBOT_ERSTELLT",
            OfferStatus::GeraetEingesendet => "GERAET_EINGESENDET",
            OfferStatus::InPruefung => "IN_PRUEFUNG",
            OfferStatus::AngebotAngepasst => "ANGEBOT_ANGEPASST",
            OfferStatus::Akzeptiert => "AKZEPTIERT",
            OfferStatus::Abgelehnt => "ABGELEHNT",
            OfferStatus::AuszahlungInitiiert => "AUSZAHLUNG_INITIIERT",
            OfferStatus::Ausgezahlt => "AUSGEZAHLT",
            OfferStatus::Storniert => "STORNIERT",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            OfferStatus::Entwurf => "Entwurf",
            OfferStatus::AngebotErstellt => "Angebot erstellt",
            OfferStatus::GeraetEingesendet => "Gerät eingesendet",
            OfferStatus::InPruefung => "In Prüfung",
            OfferStatus::AngebotAngepasst => "Angebot angepasst",
            OfferStatus::Akzeptiert => "Akzeptiert",
            OfferStatus::Abgelehnt => "Abgelehnt",
            OfferStatus::AuszahlungInitiiert => "Auszahlung initiiert",
            OfferStatus::Ausgezahlt => "Ausgezahlt",
            OfferStatus::Storniert => "Storniert",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            OfferStatus::Entwurf => "Das Angebot wurde noch nicht abgeschickt.",
            OfferStatus::AngebotErstellt => {
                "Ihr Angebot wurde erstellt. Bitte senden Sie uns Ihr Gerät zu."
            }
            OfferStatus::GeraetEingesendet => "Wir haben Ihr Gerät erhalten.",
            OfferStatus::InPruefung => "Ihr Gerät wird von unseren Technikern geprüft.",
            OfferStatus::AngebotAngepasst => {
                "Nach der Prüfung haben wir den Ankaufspreis angepasst. Bitte bestätigen Sie das neue Angebot."
            }
            OfferStatus::Akzeptiert => "Das Angebot wurde akzeptiert.",
            OfferStatus::Abgelehnt => "Das Angebot wurde abgelehnt.",
            OfferStatus::AuszahlungInitiiert => "Die Auszahlung wurde veranlasst.",
            OfferStatus::Ausgezahlt => "Der Betrag wurde auf Ihr Konto überwiesen.",
            OfferStatus::Storniert => "Das Angebot wurde storniert.",
        }
    }
}

impl fmt::Display for OfferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OfferStatus {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| UnknownVariant::new("offer status", s))
    }
}

pub fn is_valid_transition(from: OfferStatus, to: OfferStatus) -> bool {
    from.can_transition_to(to)
}

pub fn get_next_statuses(status: OfferStatus) -> Vec<OfferStatus> {
    status.next_statuses().to_vec()
}

pub fn is_terminal_status(status: OfferStatus) -> bool {
    status.is_terminal()
}

pub fn get_progress_percentage(status: OfferStatus) -> u8 {
    status.progress_percentage()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepState {
    Completed,
    Current,
    Upcoming,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusStep {
    pub status: OfferStatus,
    pub label: &'static str,
    pub state: StepState,
}

/// Progress steps for display.
///
/// Statuses off the happy path (cancelled, rejected, adjusted) show the first
/// three steps as completed followed by the actual status as current.
pub fn get_status_steps(current: OfferStatus) -> Vec<StatusStep> {
    let step = |status: OfferStatus, state: StepState| StatusStep {
        status,
        label: status.label(),
        state,
    };

    match current {
        OfferStatus::Storniert | OfferStatus::Abgelehnt | OfferStatus::AngebotAngepasst => {
            let mut steps: Vec<StatusStep> = HAPPY_PATH[..OFF_PATH_COMPLETED_STEPS]
                .iter()
                .map(|&status| step(status, StepState::Completed))
                .collect();
            steps.push(step(current, StepState::Current));
            steps
        }
        _ => {
            let position = HAPPY_PATH.iter().position(|&s| s == current);
            HAPPY_PATH
                .iter()
                .enumerate()
                .map(|(index, &status)| {
                    let state = match position {
                        Some(p) if index < p => StepState::Completed,
                        Some(p) if index == p => StepState::Current,
                        _ => StepState::Upcoming,
                    };
                    step(status, state)
                })
                .collect()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusHistoryEntry {
    pub status: OfferStatus,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimelineEntry {
    pub status: OfferStatus,
    pub timestamp: DateTime<Utc>,
    pub title: &'static str,
    pub description: &'static str,
}

/// Maps each history entry to a timeline entry, keeping order and length.
pub fn generate_timeline(history: &[StatusHistoryEntry]) -> Vec<TimelineEntry> {
    history
        .iter()
        .map(|entry| TimelineEntry {
            status: entry.status,
            timestamp: entry.timestamp,
            title: entry.status.label(),
            description: entry.status.description(),
        })
        .collect()
}
