//! Identifier generation

use super::error::ApprovalError;
use bech32::Bech32m;
use uuid7::uuid7;

// construct a unique, time ordered id then encode using bech32
pub fn new_uuid_to_bech32(hrp: &str) -> Result<String, ApprovalError> {
    let hrp = bech32::Hrp::parse(hrp).map_err(|e| ApprovalError::Identifier(e.to_string()))?;
    let encode = bech32::encode::<Bech32m>(hrp, uuid7().as_bytes())
        .map_err(|e| ApprovalError::Identifier(e.to_string()))?;
    Ok(encode)
}

/// Plain uuid7 string, used as the id of domain records created through the hook.
pub fn new_record_id() -> String {
    uuid7().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approval_ids_carry_hrp() {
        let id = new_uuid_to_bech32("approval_").unwrap();
        assert!(id.starts_with("approval_1"));
    }

    #[test]
    fn empty_hrp_is_rejected() {
        assert!(matches!(
            new_uuid_to_bech32(""),
            Err(ApprovalError::Identifier(_))
        ));
    }

    #[test]
    fn record_ids_are_unique() {
        assert_ne!(new_record_id(), new_record_id());
    }
}
