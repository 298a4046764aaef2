//! Offer lifecycle over the embedded store
//!
//! Each operation loads the offer, checks the workflow, and writes the
//! updated record back. Rejected operations never write.
use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::error::OfferError;
use crate::offer::{Money, Offer, OfferRequest};
use crate::payment::{BankDetails, PaymentProvider, PaymentRequest, PaymentStatus};
use crate::pricing::{format_euro, generate_reference_code, round2};
use crate::redact::redact_sensitive_data;
use crate::utils;
use crate::workflow::{OfferStatus, TimelineEntry, generate_timeline};

pub struct OfferService {
    instance: Arc<sled::Db>,
}

impl OfferService {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    fn save(&self, offer: &Offer) -> anyhow::Result<()> {
        let encoded = minicbor::to_vec(offer).map_err(|_| OfferError::Encode)?;
        self.instance.insert(offer.id.as_bytes(), encoded)?;
        self.instance.flush()?;
        Ok(())
    }

    // Writes `next` only if the stored record still equals `current`.
    fn swap(&self, offer_id: &str, current: &[u8], next: &Offer) -> anyhow::Result<Vec<u8>> {
        let encoded = minicbor::to_vec(next).map_err(|_| OfferError::Encode)?;
        self.instance
            .compare_and_swap(
                offer_id.as_bytes(),
                Some(current),
                Some(encoded.as_slice()),
            )?
            .map_err(|_| OfferError::Conflict(offer_id.to_owned()))?;
        self.instance.flush()?;
        Ok(encoded)
    }

    fn release(&self, offer_id: &str, claimed: &[u8], accepted: &[u8]) {
        match self
            .instance
            .compare_and_swap(offer_id.as_bytes(), Some(claimed), Some(accepted))
        {
            Ok(Ok(())) => {
                if let Err(err) = self.instance.flush() {
                    warn!(offer_id, error = %err, "failed to flush released payout claim");
                }
            }
            Ok(Err(_)) => warn!(offer_id, "payout claim changed before it was released"),
            Err(err) => warn!(offer_id, error = %err, "failed to release payout claim"),
        }
    }

    pub fn get_offer(&self, offer_id: &str) -> anyhow::Result<Offer> {
        let bytes = self
            .instance
            .get(offer_id.as_bytes())?
            .ok_or_else(|| OfferError::NotFound(offer_id.to_owned()))?;
        Ok(minicbor::decode(&bytes)?)
    }

    /// Prices the device and stores a new draft offer.
    pub fn create_offer(&self, request: OfferRequest) -> anyhow::Result<Offer> {
        let offer = Offer::new(utils::new_offer_id()?, generate_reference_code(), request)?;
        self.save(&offer)?;

        audit(&offer, "offer created", json!({ "quotedPrice": format_euro(offer.quoted_price.0) }));
        Ok(offer)
    }

    /// Moves an offer to `to` if the workflow allows it.
    pub fn transition(&self, offer_id: &str, to: OfferStatus) -> anyhow::Result<Offer> {
        let mut offer = self.get_offer(offer_id)?;
        let from = offer.status;

        if let Err(rejection) = offer.apply_transition(to) {
            warn!(offer_id, %from, %to, "status change rejected");
            return Err(rejection.into());
        }
        self.save(&offer)?;

        audit(&offer, "status changed", json!({ "from": from, "to": to }));
        Ok(offer)
    }

    /// Records a revised price after inspection.
    pub fn adjust_offer(&self, offer_id: &str, price: Decimal) -> anyhow::Result<Offer> {
        if price < Decimal::ZERO {
            return Err(OfferError::NegativeAdjustedPrice(price).into());
        }
        let mut offer = self.get_offer(offer_id)?;
        offer.apply_transition(OfferStatus::AngebotAngepasst)?;
        offer.final_price = Money(round2(price));
        self.save(&offer)?;

        audit(
            &offer,
            "offer adjusted",
            json!({
                "quotedPrice": format_euro(offer.quoted_price.0),
                "finalPrice": format_euro(offer.final_price.0),
            }),
        );
        Ok(offer)
    }

    /// Starts the transfer for an accepted offer.
    ///
    /// The offer is claimed as `AUSZAHLUNG_INITIIERT` before the provider is
    /// called, so concurrent calls start at most one transfer. A refused
    /// transfer releases the claim again.
    pub async fn start_payout(
        &self,
        offer_id: &str,
        provider: &dyn PaymentProvider,
        recipient: BankDetails,
    ) -> anyhow::Result<Offer> {
        let stored = self
            .instance
            .get(offer_id.as_bytes())?
            .ok_or_else(|| OfferError::NotFound(offer_id.to_owned()))?;
        let mut offer: Offer = minicbor::decode(&stored)?;
        if offer.status != OfferStatus::Akzeptiert {
            return Err(OfferError::PayoutNotAllowed(offer.status).into());
        }

        let request = PaymentRequest::new(
            offer.final_price.0,
            recipient,
            offer.reference_code.clone(),
        );
        request.validate()?;
        let payload = serde_json::to_value(&request)?;

        offer.apply_transition(OfferStatus::AuszahlungInitiiert)?;
        let claimed = self.swap(offer_id, &stored, &offer)?;

        let result = match provider.initiate_transfer(request).await {
            Ok(result) => result,
            Err(refused) => {
                self.release(offer_id, &claimed, &stored);
                return Err(refused.into());
            }
        };

        offer.payout_reference = Some(result.provider_reference.clone());
        if let Err(err) = self.swap(offer_id, &claimed, &offer) {
            error!(
                offer_id,
                provider_reference = %result.provider_reference,
                "failed to store payout reference, cancelling transfer"
            );
            if provider.cancel_transfer(&result.provider_reference).await {
                self.release(offer_id, &claimed, &stored);
            }
            return Err(err);
        }

        audit(
            &offer,
            "payout initiated",
            json!({
                "provider": provider.name(),
                "providerReference": result.provider_reference,
                "request": payload,
            }),
        );
        Ok(offer)
    }

    /// Polls the provider and completes the offer once the transfer landed.
    pub async fn sync_payout(
        &self,
        offer_id: &str,
        provider: &dyn PaymentProvider,
    ) -> anyhow::Result<PaymentStatus> {
        let mut offer = self.get_offer(offer_id)?;
        let reference = offer
            .payout_reference
            .clone()
            .ok_or(OfferError::MissingPayoutReference)?;

        let status = provider.check_status(&reference).await;
        match status {
            PaymentStatus::Completed if offer.status == OfferStatus::AuszahlungInitiiert => {
                offer.apply_transition(OfferStatus::Ausgezahlt)?;
                self.save(&offer)?;
                audit(&offer, "payout completed", json!({ "providerReference": reference }));
            }
            PaymentStatus::Failed | PaymentStatus::Cancelled => {
                warn!(
                    offer_id,
                    provider_reference = %reference,
                    ?status,
                    "payout did not complete"
                );
            }
            _ => {}
        }
        Ok(status)
    }

    pub fn timeline(&self, offer_id: &str) -> anyhow::Result<Vec<TimelineEntry>> {
        let offer = self.get_offer(offer_id)?;
        Ok(generate_timeline(&offer.status_history()))
    }
}

// audit payloads may carry bank data, so they are always redacted
fn audit(offer: &Offer, event: &str, details: serde_json::Value) {
    let details = redact_sensitive_data(&details);
    info!(
        offer_id = %offer.id,
        reference = %offer.reference_code,
        status = %offer.status,
        details = %details,
        "{event}"
    );
}
