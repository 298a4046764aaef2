use crate::workflow::OfferStatus;
use rust_decimal::Decimal;

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum WorkflowError {
    #[error("Transition from {from} to {to} is not allowed")]
    InvalidTransition { from: OfferStatus, to: OfferStatus },
    #[error("Offer is in terminal status {0}")]
    Terminal(OfferStatus),
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum PaymentError {
    #[error("Transfer amount must be positive, got {0}")]
    InvalidAmount(Decimal),
    #[error("Recipient IBAN failed validation")]
    InvalidIban,
    #[error("Transfer reference must not be empty")]
    MissingReference,
}

#[derive(thiserror::Error, Debug)]
pub enum OfferError {
    #[error("Offer {0} was not found")]
    NotFound(String),
    #[error("Base price must not be negative, got {0}")]
    NegativeBasePrice(Decimal),
    #[error("Adjusted price must not be negative, got {0}")]
    NegativeAdjustedPrice(Decimal),
    #[error("Payout requires status AKZEPTIERT, offer is {0}")]
    PayoutNotAllowed(OfferStatus),
    #[error("Offer {0} was changed by a concurrent operation")]
    Conflict(String),
    #[error("Offer has no payout reference")]
    MissingPayoutReference,
    #[error("Failed to encode offer record")]
    Encode,
}
