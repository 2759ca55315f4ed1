use std::fmt;

use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// RSA key parameters in transfer form.
///
/// Every field is a big-endian unsigned integer. The public form carries only
/// `modulus` and `public_exponent`; a private key carries all eight fields.
/// Field order here is the order on the wire and must not change.
///
/// ```text
/// modulus              n
/// publicExponent       e
/// privateExponent      d          (private only)
/// primeP / primeQ      p, q       (private only)
/// exponentDP/DQ        d mod p-1, d mod q-1   (private only)
/// coefficientInverseQ  q^-1 mod p (private only)
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RsaParameters {
    #[serde(with = "crate::b64")]
    pub modulus: Vec<u8>,
    #[serde(with = "crate::b64")]
    pub public_exponent: Vec<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::b64::option")]
    pub private_exponent: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::b64::option")]
    pub prime_p: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::b64::option")]
    pub prime_q: Option<Vec<u8>>,
    #[serde(
        rename = "exponentDP",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::b64::option"
    )]
    pub exponent_dp: Option<Vec<u8>>,
    #[serde(
        rename = "exponentDQ",
        default,
        skip_serializing_if = "Option::is_none",
        with = "crate::b64::option"
    )]
    pub exponent_dq: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none", with = "crate::b64::option")]
    pub coefficient_inverse_q: Option<Vec<u8>>,
}

impl RsaParameters {
    /// Public-only parameter set.
    pub fn public(modulus: Vec<u8>, public_exponent: Vec<u8>) -> Self {
        Self {
            modulus,
            public_exponent,
            private_exponent: None,
            prime_p: None,
            prime_q: None,
            exponent_dp: None,
            exponent_dq: None,
            coefficient_inverse_q: None,
        }
    }

    /// True when every private field is present.
    pub fn is_private(&self) -> bool {
        self.private_exponent.is_some()
            && self.prime_p.is_some()
            && self.prime_q.is_some()
            && self.exponent_dp.is_some()
            && self.exponent_dq.is_some()
            && self.coefficient_inverse_q.is_some()
    }

    /// The public subset of these parameters.
    pub fn to_public(&self) -> Self {
        Self::public(self.modulus.clone(), self.public_exponent.clone())
    }
}

// Private fields never reach logs.
impl fmt::Debug for RsaParameters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RsaParameters")
            .field("modulus_len", &self.modulus.len())
            .field("public_exponent", &self.public_exponent)
            .field("private", &self.is_private())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_private() -> RsaParameters {
        RsaParameters {
            modulus: vec![0xC3, 0x01, 0x7F, 0x00],
            public_exponent: vec![0x01, 0x00, 0x01],
            private_exponent: Some(vec![0x11, 0x22, 0x33, 0x44]),
            prime_p: Some(vec![0x00, 0x0B]),
            prime_q: Some(vec![0x0D, 0x00]),
            exponent_dp: Some(vec![0x05, 0x06]),
            exponent_dq: Some(vec![0x07, 0x08]),
            coefficient_inverse_q: Some(vec![0x09, 0x0A]),
        }
    }

    #[test]
    fn public_form_omits_private_fields() {
        let params = sample_private().to_public();
        let json = serde_json::to_value(&params).unwrap();
        let obj = json.as_object().unwrap();

        assert_eq!(obj.len(), 2);
        assert_eq!(obj["modulus"], "wwF/AA==");
        assert_eq!(obj["publicExponent"], "AQAB");
        assert!(!params.is_private());
    }

    #[test]
    fn private_form_uses_wire_field_names() {
        let json = serde_json::to_string(&sample_private()).unwrap();
        let names: Vec<&str> = [
            "\"modulus\"",
            "\"publicExponent\"",
            "\"privateExponent\"",
            "\"primeP\"",
            "\"primeQ\"",
            "\"exponentDP\"",
            "\"exponentDQ\"",
            "\"coefficientInverseQ\"",
        ]
        .to_vec();

        // Declaration order is wire order.
        let positions: Vec<usize> = names.iter().map(|n| json.find(n).unwrap()).collect();
        let mut sorted = positions.clone();
        sorted.sort_unstable();
        assert_eq!(positions, sorted);
    }

    #[test]
    fn json_roundtrip_preserves_leading_zero_bytes() {
        let params = sample_private();
        let json = serde_json::to_string(&params).unwrap();
        let parsed: RsaParameters = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, params);
        assert_eq!(parsed.prime_p.as_deref(), Some(&[0x00, 0x0B][..]));
        assert!(parsed.is_private());
    }

    #[test]
    fn rejects_bad_base64_and_unknown_fields() {
        let bad_b64 = r#"{"modulus":"not base64!","publicExponent":"AQAB"}"#;
        assert!(serde_json::from_str::<RsaParameters>(bad_b64).is_err());

        let unknown = r#"{"modulus":"AQ==","publicExponent":"AQAB","d":"AQ=="}"#;
        assert!(serde_json::from_str::<RsaParameters>(unknown).is_err());
    }

    #[test]
    fn partial_private_fields_are_not_private() {
        let mut params = sample_private();
        params.prime_q = None;
        assert!(!params.is_private());
    }

    #[test]
    fn debug_hides_private_exponent() {
        let debug = format!("{:?}", sample_private());
        assert!(debug.contains("modulus_len: 4"));
        assert!(!debug.contains("17")); // 0x11 from the private exponent
    }
}
