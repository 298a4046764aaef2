//! Timer-driven behaviour of the mock payment provider
//!
//! All tests run on a paused clock, so the simulated delays elapse instantly
//! and each checkpoint lands between two scheduled advances.

use bayern_ankauf::error::PaymentError;
use bayern_ankauf::payment::{
    BankDetails, MockPaymentProvider, MockTimings, PaymentProvider, PaymentRequest, PaymentStatus,
};
use rust_decimal::Decimal;
use std::time::Duration;
use tokio::time::sleep;

fn request(amount: i64) -> PaymentRequest {
    PaymentRequest::new(
        Decimal::from(amount),
        BankDetails {
            account_holder: "Max Mustermann".into(),
            iban: "DE89370400440532013000".into(),
            bic: Some("COBADEFFXXX".into()),
        },
        "BY-202405-K3X9QZ",
    )
}

fn mock(failure_rate: f64) -> MockPaymentProvider {
    MockPaymentProvider::new(MockTimings {
        failure_rate,
        ..MockTimings::default()
    })
}

#[tokio::test(start_paused = true)]
async fn initiate_always_starts_initiated() {
    let provider = mock(0.0);
    let result = provider.initiate_transfer(request(250)).await.unwrap();

    assert!(result.success);
    assert_eq!(result.status, PaymentStatus::Initiated);
    assert!(result.provider_reference.starts_with("MOCK-"));
    assert!(result.estimated_arrival.is_some());
    assert_eq!(provider.check_status(&result.provider_reference).await, PaymentStatus::Initiated);
}

#[tokio::test(start_paused = true)]
async fn transfer_moves_through_each_stage() {
    let provider = mock(0.0);
    let reference = provider.initiate_transfer(request(250)).await.unwrap().provider_reference;

    // advances fire at 2s, 7s and 17s
    sleep(Duration::from_secs(3)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Pending);

    sleep(Duration::from_secs(5)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Processing);

    sleep(Duration::from_secs(10)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn processing_can_fail() {
    let provider = mock(1.0);
    let reference = provider.initiate_transfer(request(250)).await.unwrap().provider_reference;

    sleep(Duration::from_secs(20)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Failed);
    assert!(!provider.cancel_transfer(&reference).await);
}

#[tokio::test(start_paused = true)]
async fn cancelled_transfer_stays_cancelled() {
    let provider = mock(0.0);
    let reference = provider.initiate_transfer(request(250)).await.unwrap().provider_reference;

    sleep(Duration::from_secs(3)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Pending);
    assert!(provider.cancel_transfer(&reference).await);

    sleep(Duration::from_secs(60)).await;
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Cancelled);
}

#[tokio::test(start_paused = true)]
async fn completed_transfer_cannot_be_cancelled() {
    let provider = mock(0.0);
    let reference = provider.initiate_transfer(request(250)).await.unwrap().provider_reference;

    sleep(Duration::from_secs(20)).await;
    assert!(!provider.cancel_transfer(&reference).await);
    assert_eq!(provider.check_status(&reference).await, PaymentStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn transfers_progress_independently() {
    let provider = mock(0.0);
    let first = provider.initiate_transfer(request(100)).await.unwrap().provider_reference;
    sleep(Duration::from_secs(5)).await;
    let second = provider.initiate_transfer(request(200)).await.unwrap().provider_reference;

    assert_ne!(first, second);
    assert!(provider.cancel_transfer(&second).await);

    sleep(Duration::from_secs(15)).await;
    assert_eq!(provider.check_status(&first).await, PaymentStatus::Completed);
    assert_eq!(provider.check_status(&second).await, PaymentStatus::Cancelled);
}

#[tokio::test]
async fn unknown_reference_fails_closed() {
    let provider = mock(0.0);

    assert_eq!(provider.check_status("MOCK-unknown").await, PaymentStatus::Failed);
    assert!(!provider.cancel_transfer("MOCK-unknown").await);
    assert!(provider.transfer_request("MOCK-unknown").await.is_none());
}

#[tokio::test]
async fn invalid_requests_are_refused() {
    let provider = mock(0.0);

    assert_eq!(
        provider.initiate_transfer(request(0)).await,
        Err(PaymentError::InvalidAmount(Decimal::ZERO))
    );
    assert_eq!(
        provider.initiate_transfer(request(-10)).await,
        Err(PaymentError::InvalidAmount(Decimal::from(-10)))
    );
}
