//! Offer pricing, workflow and payout core
//!
//! A caller prices a device with [`pricing::calculate_price`], stores the
//! offer, gates every status change through [`workflow`], and starts the
//! payout through a [`payment::PaymentProvider`] once the offer is accepted.
//! [`security`], [`redact`] and [`rate_limit`] are used around all of it at the
//! request boundary. [`service::OfferService`] wires these together over an
//! embedded store.

pub mod config;
pub mod error;
pub mod offer;
pub mod payment;
pub mod pricing;
pub mod rate_limit;
pub mod redact;
pub mod security;
pub mod service;
pub mod utils;
pub mod workflow;

pub use config::EngineConfig;
pub use error::{OfferError, PaymentError, WorkflowError};
pub use pricing::{ConditionLevel, DamageFlag, PriceBreakdown, calculate_price};
pub use workflow::OfferStatus;
