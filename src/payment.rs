//! Payout providers
//!
//! [`MockPaymentProvider`] simulates a bank transfer that moves through
//! `INITIATED -> PENDING -> PROCESSING -> COMPLETED | FAILED` on timers. Each
//! transfer is driven by its own spawned task which is aborted on
//! cancellation. Every advance also re-checks the prior status under the
//! transfer map lock, so a cancel that lands between the check and the abort
//! still wins.
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid7::uuid7;

use crate::error::PaymentError;
use crate::security::{MASK, is_valid_iban, mask_iban};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Currency {
    #[default]
    EUR,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Initiated,
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl PaymentStatus {
    pub fn is_settled(self) -> bool {
        matches!(self, PaymentStatus::Completed | PaymentStatus::Failed)
    }
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BankDetails {
    pub account_holder: String,
    pub iban: String,
    pub bic: Option<String>,
}

// keeps the holder's name and raw account numbers out of logs
impl fmt::Debug for BankDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BankDetails")
            .field("account_holder", &MASK)
            .field("iban", &mask_iban(&self.iban))
            .field("bic", &self.bic.as_ref().map(|_| MASK))
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub amount: Decimal,
    pub currency: Currency,
    pub recipient: BankDetails,
    /// Shown on the recipient's statement, usually the offer reference code.
    pub reference: String,
}

impl PaymentRequest {
    pub fn new(amount: Decimal, recipient: BankDetails, reference: impl Into<String>) -> Self {
        Self {
            amount,
            currency: Currency::EUR,
            recipient,
            reference: reference.into(),
        }
    }

    pub fn validate(&self) -> Result<(), PaymentError> {
        if self.amount <= Decimal::ZERO {
            return Err(PaymentError::InvalidAmount(self.amount));
        }
        if !is_valid_iban(&self.recipient.iban) {
            return Err(PaymentError::InvalidIban);
        }
        if self.reference.trim().is_empty() {
            return Err(PaymentError::MissingReference);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResult {
    pub success: bool,
    pub provider_reference: String,
    pub status: PaymentStatus,
    pub estimated_arrival: Option<DateTime<Utc>>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &'static str;

    async fn initiate_transfer(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResult, PaymentError>;

    /// Unknown references report [`PaymentStatus::Failed`].
    async fn check_status(&self, provider_reference: &str) -> PaymentStatus;

    /// True if the transfer was cancelled, false if it had already settled
    /// or does not exist.
    async fn cancel_transfer(&self, provider_reference: &str) -> bool;
}

/// Delays and outcome odds of the simulated transfer lifecycle.
#[derive(Debug, Clone, PartialEq)]
pub struct MockTimings {
    pub to_pending: Duration,
    pub to_processing: Duration,
    pub to_settled: Duration,
    /// Probability in `[0, 1]` that a processed transfer fails.
    pub failure_rate: f64,
}

impl Default for MockTimings {
    fn default() -> Self {
        Self {
            to_pending: Duration::from_secs(2),
            to_processing: Duration::from_secs(5),
            to_settled: Duration::from_secs(10),
            failure_rate: 0.1,
        }
    }
}

struct Transfer {
    request: PaymentRequest,
    status: PaymentStatus,
    progression: Option<JoinHandle<()>>,
}

type TransferMap = Arc<Mutex<HashMap<String, Transfer>>>;

#[derive(Default)]
pub struct MockPaymentProvider {
    transfers: TransferMap,
    timings: MockTimings,
}

impl MockPaymentProvider {
    pub fn new(timings: MockTimings) -> Self {
        Self {
            transfers: Arc::default(),
            timings,
        }
    }

    /// The request a transfer was initiated with.
    pub async fn transfer_request(&self, provider_reference: &str) -> Option<PaymentRequest> {
        let transfers = self.transfers.lock().await;
        transfers.get(provider_reference).map(|t| t.request.clone())
    }

    fn spawn_progression(&self, reference: String) -> JoinHandle<()> {
        let transfers = Arc::clone(&self.transfers);
        let timings = self.timings.clone();

        tokio::spawn(async move {
            tokio::time::sleep(timings.to_pending).await;
            let pending = advance(
                &transfers,
                &reference,
                PaymentStatus::Initiated,
                PaymentStatus::Pending,
            );
            if !pending.await {
                return;
            }

            tokio::time::sleep(timings.to_processing).await;
            let processing = advance(
                &transfers,
                &reference,
                PaymentStatus::Pending,
                PaymentStatus::Processing,
            );
            if !processing.await {
                return;
            }

            tokio::time::sleep(timings.to_settled).await;
            let outcome = if rand::random::<f64>() < timings.failure_rate {
                PaymentStatus::Failed
            } else {
                PaymentStatus::Completed
            };
            advance(&transfers, &reference, PaymentStatus::Processing, outcome).await;
        })
    }
}

/// Moves a transfer from `expected` to `next`, returning false if its status
/// changed in the meantime.
async fn advance(
    transfers: &TransferMap,
    reference: &str,
    expected: PaymentStatus,
    next: PaymentStatus,
) -> bool {
    let mut transfers = transfers.lock().await;
    match transfers.get_mut(reference) {
        Some(transfer) if transfer.status == expected => {
            transfer.status = next;
            if next.is_settled() {
                transfer.progression = None;
            }
            debug!(reference, from = ?expected, to = ?next, "mock transfer advanced");
            true
        }
        _ => false,
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    fn name(&self) -> &'static str {
        ProviderKind::Mock.as_str()
    }

    async fn initiate_transfer(
        &self,
        request: PaymentRequest,
    ) -> Result<PaymentResult, PaymentError> {
        request.validate()?;

        let reference = format!("MOCK-{}", uuid7());
        info!(
            reference = %reference,
            amount = %request.amount,
            recipient = ?request.recipient,
            "mock transfer initiated"
        );

        // the entry must exist before the progression task can observe it
        let mut transfers = self.transfers.lock().await;
        transfers.insert(
            reference.clone(),
            Transfer {
                request,
                status: PaymentStatus::Initiated,
                progression: None,
            },
        );
        let handle = self.spawn_progression(reference.clone());
        if let Some(transfer) = transfers.get_mut(&reference) {
            transfer.progression = Some(handle);
        }
        drop(transfers);

        Ok(PaymentResult {
            success: true,
            provider_reference: reference,
            status: PaymentStatus::Initiated,
            estimated_arrival: Some(Utc::now() + chrono::Duration::days(1)),
        })
    }

    async fn check_status(&self, provider_reference: &str) -> PaymentStatus {
        let transfers = self.transfers.lock().await;
        transfers
            .get(provider_reference)
            .map(|t| t.status)
            .unwrap_or(PaymentStatus::Failed)
    }

    async fn cancel_transfer(&self, provider_reference: &str) -> bool {
        let mut transfers = self.transfers.lock().await;
        let Some(transfer) = transfers.get_mut(provider_reference) else {
            return false;
        };
        if transfer.status.is_settled() {
            return false;
        }

        transfer.status = PaymentStatus::Cancelled;
        if let Some(progression) = transfer.progression.take() {
            progression.abort();
        }
        info!(reference = provider_reference, "mock transfer cancelled");
        true
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    Mock,
    Sepa,
    Stripe,
}

impl ProviderKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProviderKind::Mock => "mock",
            ProviderKind::Sepa => "sepa",
            ProviderKind::Stripe => "stripe",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(ProviderKind::Mock),
            "sepa" | "bank_transfer" => Ok(ProviderKind::Sepa),
            "stripe" => Ok(ProviderKind::Stripe),
            other => Err(other.to_owned()),
        }
    }
}

/// Selects a provider by name.
///
/// Only the mock exists. Every other name, known or not, logs a warning and
/// gets the mock, which is not acceptable outside development.
pub fn create_payment_provider(name: &str, timings: MockTimings) -> Arc<dyn PaymentProvider> {
    match name.parse::<ProviderKind>() {
        Ok(ProviderKind::Mock) => {}
        Ok(kind) => warn!(
            provider = kind.as_str(),
            "payment provider not implemented, falling back to mock"
        ),
        Err(unknown) => warn!(
            provider = %unknown,
            "unknown payment provider, falling back to mock"
        ),
    }
    Arc::new(MockPaymentProvider::new(timings))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bank() -> BankDetails {
        BankDetails {
            account_holder: "Max Mustermann".into(),
            iban: "DE89370400440532013000".into(),
            bic: Some("COBADEFFXXX".into()),
        }
    }

    #[test]
    fn debug_output_masks_account() {
        let rendered = format!("{:?}", bank());
        assert!(!rendered.contains("Max Mustermann"));
        assert!(!rendered.contains("DE89370400440532013000"));
        assert!(!rendered.contains("COBADEFFXXX"));
        assert!(rendered.contains("DE89 **** **** 3000"));
    }

    #[test]
    fn request_validation() {
        assert!(
            PaymentRequest::new(Decimal::from(10), bank(), "BY-202401-ABCDEF")
                .validate()
                .is_ok()
        );
        assert_eq!(
            PaymentRequest::new(Decimal::ZERO, bank(), "ref").validate(),
            Err(PaymentError::InvalidAmount(Decimal::ZERO))
        );

        let mut broken = bank();
        broken.iban = "DE00123".into();
        assert_eq!(
            PaymentRequest::new(Decimal::ONE, broken, "ref").validate(),
            Err(PaymentError::InvalidIban)
        );
        assert_eq!(
            PaymentRequest::new(Decimal::ONE, bank(), "  ").validate(),
            Err(PaymentError::MissingReference)
        );
    }

    #[test]
    fn provider_names_parse() {
        assert_eq!("MOCK".parse::<ProviderKind>(), Ok(ProviderKind::Mock));
        assert_eq!("bank_transfer".parse::<ProviderKind>(), Ok(ProviderKind::Sepa));
        assert!("paypal".parse::<ProviderKind>().is_err());
    }

    #[test]
    fn factory_falls_back_to_mock() {
        for name in ["mock", "sepa", "stripe", "paypal"] {
            let provider = create_payment_provider(name, MockTimings::default());
            assert_eq!(provider.name(), "mock");
        }
    }
}
