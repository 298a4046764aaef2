//! Persisted offer record and its status history
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::str::FromStr;

use crate::error::{OfferError, WorkflowError};
use crate::pricing::{ConditionLevel, DamageFlag, PriceBreakdown, calculate_price};
use crate::workflow::{OfferStatus, StatusHistoryEntry};

#[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Serialize)]
pub struct TimeStamp(DateTime<Utc>);

impl TimeStamp {
    pub fn now() -> Self {
        Self(Utc::now())
    }
    pub fn to_datetime_utc(&self) -> DateTime<Utc> {
        self.0
    }
}

impl From<DateTime<Utc>> for TimeStamp {
    fn from(value: DateTime<Utc>) -> Self {
        TimeStamp(value)
    }
}

impl<C> minicbor::Encode<C> for TimeStamp {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        if let Some(nsec) = self.0.timestamp_nanos_opt() {
            return e.i64(nsec)?.ok();
        }

        Err(minicbor::encode::Error::message(
            "timestamp outside the nanosecond range",
        ))
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TimeStamp {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(TimeStamp(DateTime::from_timestamp_nanos(d.i64()?)))
    }
}

// Decimal has no CBOR mapping, so amounts are stored as their exact string form
#[derive(Debug, PartialEq, Eq, Clone, Copy, Serialize)]
pub struct Money(pub Decimal);

impl<C> minicbor::Encode<C> for Money {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(&self.0.to_string())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for Money {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Decimal::from_str(d.str()?)
            .map(Money)
            .map_err(|_| minicbor::decode::Error::message("invalid decimal amount"))
    }
}

#[derive(Debug, PartialEq, Eq, Clone, minicbor::Encode, minicbor::Decode, Serialize)]
pub struct StatusChange {
    #[n(0)]
    pub status: OfferStatus,
    #[n(1)]
    pub changed_at: TimeStamp,
}

/// Caller input for a new offer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OfferRequest {
    pub device_model: String,
    pub base_price_euro: Decimal,
    pub condition: ConditionLevel,
    pub damage_flags: Vec<DamageFlag>,
}

#[derive(Debug, PartialEq, Eq, Clone, minicbor::Encode, minicbor::Decode, Serialize)]
pub struct Offer {
    #[n(0)]
    pub id: String, // bech32 encoded uuid7
    #[n(1)]
    pub reference_code: String,
    #[n(2)]
    pub device_model: String,
    #[n(3)]
    pub base_price: Money,
    #[n(4)]
    pub condition: ConditionLevel,
    #[n(5)]
    pub damage_flags: Vec<DamageFlag>,
    #[n(6)]
    pub quoted_price: Money, // preliminary price from the pricing engine
    #[n(7)]
    pub final_price: Money, // differs from quoted_price after an adjustment
    #[n(8)]
    pub status: OfferStatus,
    #[n(9)]
    pub history: Vec<StatusChange>,
    #[n(10)]
    pub payout_reference: Option<String>,
}

impl Offer {
    pub fn new(
        id: String,
        reference_code: String,
        request: OfferRequest,
    ) -> Result<Self, OfferError> {
        if request.base_price_euro < Decimal::ZERO {
            return Err(OfferError::NegativeBasePrice(request.base_price_euro));
        }

        let quote = calculate_price(
            request.base_price_euro,
            request.condition,
            &request.damage_flags,
        );

        Ok(Self {
            id,
            reference_code,
            device_model: request.device_model,
            base_price: Money(request.base_price_euro),
            condition: request.condition,
            damage_flags: request.damage_flags,
            quoted_price: Money(quote.final_price_euro),
            final_price: Money(quote.final_price_euro),
            status: OfferStatus::Entwurf,
            history: vec![StatusChange {
                status: OfferStatus::Entwurf,
                changed_at: TimeStamp::now(),
            }],
            payout_reference: None,
        })
    }

    /// Recomputes the itemized quote from the stored inputs.
    pub fn price_breakdown(&self) -> PriceBreakdown {
        calculate_price(self.base_price.0, self.condition, &self.damage_flags)
    }

    /// Applies a status change if the workflow allows it. The record is left
    /// untouched on rejection.
    pub fn apply_transition(&mut self, to: OfferStatus) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::Terminal(self.status));
        }
        if !self.status.can_transition_to(to) {
            return Err(WorkflowError::InvalidTransition {
                from: self.status,
                to,
            });
        }

        self.status = to;
        self.history.push(StatusChange {
            status: to,
            changed_at: TimeStamp::now(),
        });
        Ok(())
    }

    pub fn status_history(&self) -> Vec<StatusHistoryEntry> {
        self.history
            .iter()
            .map(|change| StatusHistoryEntry {
                status: change.status,
                timestamp: change.changed_at.to_datetime_utc(),
            })
            .collect()
    }
}
