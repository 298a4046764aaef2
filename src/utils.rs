//! Identifier helpers

use bech32::Bech32m;
use uuid7::uuid7;

pub const OFFER_ID_HRP: &str = "offer";

// fresh uuid7 encoded with the given human-readable prefix
pub fn new_uuid_to_bech32(hrp: &str) -> anyhow::Result<String> {
    let hrp = bech32::Hrp::parse(hrp)?;
    Ok(bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())?)
}

pub fn new_offer_id() -> anyhow::Result<String> {
    new_uuid_to_bech32(OFFER_ID_HRP)
}
