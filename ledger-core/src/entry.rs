//! Immutable ledger entries

use crate::{
    canonical::{canonical_encode, Payload},
    crypto::{chain_digest, hash_bytes, Digest},
    Error, Result,
};
use serde::{Deserialize, Serialize};

/// One committed record of the forensic ledger
///
/// `entry_hash` and `chain_hash` are pure functions of `payload` and
/// `prev_hash`. `prev_hash == None` marks the genesis link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    payload: Payload,
    entry_hash: Digest,
    prev_hash: Option<Digest>,
    chain_hash: Digest,
}

impl LedgerEntry {
    /// Build an entry linked to `prev_hash`
    pub fn new(payload: Payload, prev_hash: Option<Digest>) -> Self {
        let entry_hash = hash_bytes(&canonical_encode(&payload));
        let chain_hash = chain_digest(prev_hash.as_ref(), &entry_hash);

        Self {
            payload,
            entry_hash,
            prev_hash,
            chain_hash,
        }
    }

    /// Recorded payload
    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// SHA-256 of the canonical payload
    pub fn entry_hash(&self) -> &Digest {
        &self.entry_hash
    }

    /// Chain value of the predecessor (`None` at genesis)
    pub fn prev_hash(&self) -> Option<&Digest> {
        self.prev_hash.as_ref()
    }

    /// Cumulative chain value of this entry
    pub fn chain_hash(&self) -> &Digest {
        &self.chain_hash
    }

    /// Whether this entry opens the chain
    pub fn is_genesis(&self) -> bool {
        self.prev_hash.is_none()
    }

    /// Recompute both hashes and compare with the stored ones
    pub fn verify(&self) -> std::result::Result<(), String> {
        let entry_hash = hash_bytes(&canonical_encode(&self.payload));
        if entry_hash != self.entry_hash {
            return Err(format!(
                "entry_hash mismatch: stored {}, computed {}",
                self.entry_hash, entry_hash
            ));
        }

        let chain_hash = chain_digest(self.prev_hash.as_ref(), &entry_hash);
        if chain_hash != self.chain_hash {
            return Err(format!(
                "chain_hash mismatch: stored {}, computed {}",
                self.chain_hash, chain_hash
            ));
        }

        Ok(())
    }
}

/// Verify a sequence of entries forms one unbroken chain from genesis
pub fn verify_chain<'a, I>(entries: I) -> Result<()>
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut expected_prev: Option<Digest> = None;

    for (index, entry) in entries.into_iter().enumerate() {
        if entry.prev_hash != expected_prev {
            return Err(Error::ChainIntegrity {
                index,
                reason: format!(
                    "prev_hash {} does not link to {}",
                    display_link(entry.prev_hash.as_ref()),
                    display_link(expected_prev.as_ref()),
                ),
            });
        }

        entry
            .verify()
            .map_err(|reason| Error::ChainIntegrity { index, reason })?;

        expected_prev = Some(entry.chain_hash);
    }

    Ok(())
}

fn display_link(link: Option<&Digest>) -> String {
    link.map_or_else(|| "genesis".to_string(), Digest::to_hex)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::to_payload;
    use serde_json::json;

    fn payload(value: serde_json::Value) -> Payload {
        to_payload(&value).unwrap()
    }

    #[test]
    fn test_entry_hash_is_sha256_of_canonical_bytes() {
        let p = payload(json!({"nested": {"z": 1, "a": 2}, "amount": 100, "asset": "V1"}));
        let entry = LedgerEntry::new(p, None);

        let expected = hash_bytes(br#"{"amount":100,"asset":"V1","nested":{"a":2,"z":1}}"#);
        assert_eq!(entry.entry_hash(), &expected);
        assert!(entry.is_genesis());
        assert_eq!(
            entry.chain_hash(),
            &hash_bytes(expected.to_hex().as_bytes())
        );
    }

    #[test]
    fn test_entry_is_pure() {
        let prev = hash_bytes(b"prev");
        let a = LedgerEntry::new(payload(json!({"val": 1})), Some(prev));
        let b = LedgerEntry::new(payload(json!({"val": 1})), Some(prev));
        assert_eq!(a, b);

        let c = LedgerEntry::new(payload(json!({"val": 1})), None);
        assert_eq!(a.entry_hash(), c.entry_hash());
        assert_ne!(a.chain_hash(), c.chain_hash());
    }

    #[test]
    fn test_verify_detects_tampered_payload() {
        let entry = LedgerEntry::new(payload(json!({"amount": 100})), None);
        let mut json = serde_json::to_value(&entry).unwrap();
        json["payload"]["amount"] = json!(101);
        let tampered: LedgerEntry = serde_json::from_value(json).unwrap();

        assert!(entry.verify().is_ok());
        assert!(tampered.verify().unwrap_err().contains("entry_hash"));
    }

    #[test]
    fn test_verify_chain_detects_relinking() {
        let first = LedgerEntry::new(payload(json!({"n": 1})), None);
        let second = LedgerEntry::new(payload(json!({"n": 2})), Some(*first.chain_hash()));
        let orphan = LedgerEntry::new(payload(json!({"n": 3})), Some(*first.chain_hash()));

        assert!(verify_chain([&first, &second]).is_ok());

        let err = verify_chain([&first, &second, &orphan]).unwrap_err();
        assert!(matches!(err, Error::ChainIntegrity { index: 2, .. }));

        let err = verify_chain([&second]).unwrap_err();
        assert!(matches!(err, Error::ChainIntegrity { index: 0, .. }));
    }

    #[test]
    fn test_serialized_shape() {
        let entry = LedgerEntry::new(payload(json!({"n": 1})), None);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["prev_hash"], serde_json::Value::Null);
        assert_eq!(json["entry_hash"], json!(entry.entry_hash().to_hex()));
        assert_eq!(json["chain_hash"], json!(entry.chain_hash().to_hex()));
    }
}
