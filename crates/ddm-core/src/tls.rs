//! Certificate validation policy: chain/expiry/hostname checks with optional
//! per-host SHA-256 thumbprint pinning.
//!
//! This is a pure decision component; the curl-multi backend collects peer
//! certificate info per handle (`CURLINFO_CERTINFO`) and asks a `CertificateGate`
//! whether to accept the transfer before the segment result is reported.

use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;

/// Outcome of a certificate handshake as reported by the HTTP layer, before
/// the gate's pinning override is applied.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChainReport {
    pub expired: bool,
    pub chain_valid: bool,
    pub hostname_matches: bool,
}

impl ChainReport {
    fn has_policy_error(&self) -> bool {
        self.expired || !self.chain_valid || !self.hostname_matches
    }
}

/// Gate decision with a human-readable reason when rejecting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    Accept,
    Reject(String),
}

impl GateDecision {
    pub fn is_accept(&self) -> bool {
        matches!(self, GateDecision::Accept)
    }
}

/// Validates peer certificates: rejects on expiry, chain errors, or hostname
/// mismatch; a pinned host overrides the chain outcome with thumbprint equality.
#[derive(Debug, Clone, Default)]
pub struct CertificateGate {
    /// When true (default), any non-pin policy error is fatal. When false,
    /// policy errors are accepted (still worth logging by the caller).
    pub strict: bool,
    /// Host (case-insensitive) -> pinned SHA-256 thumbprint, lowercase hex.
    pinned_thumbprints: HashMap<String, String>,
}

impl CertificateGate {
    pub fn new(strict: bool, pinned_thumbprints: HashMap<String, String>) -> Self {
        let pinned_thumbprints = pinned_thumbprints
            .into_iter()
            .map(|(h, t)| (h.to_ascii_lowercase(), t.to_ascii_lowercase()))
            .collect();
        Self { strict, pinned_thumbprints }
    }

    pub fn from_config(cfg: &crate::config::CertificateConfig) -> Self {
        Self::new(cfg.strict, cfg.pinned_thumbprints.clone())
    }

    fn pin_for(&self, host: &str) -> Option<&str> {
        self.pinned_thumbprints.get(&host.to_ascii_lowercase()).map(String::as_str)
    }

    /// Returns the pin for `host` formatted for libcurl's `CURLOPT_PINNEDPUBLICKEYHASH`
    /// (`sha256//<base64-spki-hash>`), or `None` if the host has no pin configured.
    pub fn curl_pin_for(&self, host: &str) -> Option<String> {
        self.pin_for(host).map(|p| format!("sha256//{}", p))
    }

    /// Evaluates a handshake outcome for `host`. `thumbprint`, if present, is the
    /// SHA-256 hex digest of the leaf certificate's DER bytes.
    pub fn evaluate(&self, host: &str, chain: ChainReport, thumbprint: Option<&str>) -> GateDecision {
        if let Some(pin) = self.pin_for(host) {
            return match thumbprint {
                Some(t) if t.eq_ignore_ascii_case(pin) => GateDecision::Accept,
                Some(t) => GateDecision::Reject(format!(
                    "certificate thumbprint {} does not match pin {} for {}",
                    t, pin, host
                )),
                None => GateDecision::Reject(format!("no certificate thumbprint available to check pin for {}", host)),
            };
        }

        if chain.has_policy_error() {
            let reason = describe_policy_error(&chain);
            return if self.strict {
                GateDecision::Reject(reason)
            } else {
                GateDecision::Accept
            };
        }
        GateDecision::Accept
    }
}

fn describe_policy_error(chain: &ChainReport) -> String {
    let mut reasons = Vec::new();
    if chain.expired {
        reasons.push("certificate expired");
    }
    if !chain.chain_valid {
        reasons.push("certificate chain invalid");
    }
    if !chain.hostname_matches {
        reasons.push("hostname mismatch");
    }
    reasons.join(", ")
}

/// Error raised when a certificate thumbprint cannot be computed from a PEM blob.
#[derive(Debug)]
pub struct ThumbprintError(String);

impl fmt::Display for ThumbprintError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid PEM certificate: {}", self.0)
    }
}

impl std::error::Error for ThumbprintError {}

/// Computes the SHA-256 thumbprint (lowercase hex) of a PEM-encoded certificate's
/// DER body, as returned by libcurl's `CURLINFO_CERTINFO`.
pub fn sha256_thumbprint_from_pem(pem: &str) -> Result<String, ThumbprintError> {
    let body: String = pem
        .lines()
        .filter(|l| !l.starts_with("-----"))
        .collect::<Vec<_>>()
        .join("");
    if body.is_empty() {
        return Err(ThumbprintError("empty certificate body".to_string()));
    }
    let der = base64_decode(&body).map_err(ThumbprintError)?;
    let mut hasher = Sha256::new();
    hasher.update(&der);
    Ok(hex::encode(hasher.finalize()))
}

/// Minimal base64 (standard alphabet, with padding) decoder so thumbprinting
/// does not pull in a dedicated base64 dependency for one call site.
fn base64_decode(input: &str) -> Result<Vec<u8>, String> {
    fn val(c: u8) -> Option<u8> {
        match c {
            b'A'..=b'Z' => Some(c - b'A'),
            b'a'..=b'z' => Some(c - b'a' + 26),
            b'0'..=b'9' => Some(c - b'0' + 52),
            b'+' => Some(62),
            b'/' => Some(63),
            _ => None,
        }
    }
    let cleaned: Vec<u8> = input.bytes().filter(|b| *b != b'=' && !b.is_ascii_whitespace()).collect();
    let mut out = Vec::with_capacity(cleaned.len() * 3 / 4);
    for chunk in cleaned.chunks(4) {
        let mut buf = [0u8; 4];
        for (i, c) in chunk.iter().enumerate() {
            buf[i] = val(*c).ok_or_else(|| "invalid base64 byte".to_string())?;
        }
        let n = chunk.len();
        let combined = (buf[0] as u32) << 18 | (buf[1] as u32) << 12 | (buf[2] as u32) << 6 | (buf[3] as u32);
        out.push((combined >> 16) as u8);
        if n > 2 {
            out.push((combined >> 8) as u8);
        }
        if n > 3 {
            out.push(combined as u8);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_clean_chain_by_default() {
        let gate = CertificateGate::new(true, HashMap::new());
        let chain = ChainReport { expired: false, chain_valid: true, hostname_matches: true };
        assert_eq!(gate.evaluate("example.com", chain, None), GateDecision::Accept);
    }

    #[test]
    fn strict_rejects_expired() {
        let gate = CertificateGate::new(true, HashMap::new());
        let chain = ChainReport { expired: true, chain_valid: true, hostname_matches: true };
        assert!(!gate.evaluate("example.com", chain, None).is_accept());
    }

    #[test]
    fn non_strict_accepts_policy_errors() {
        let gate = CertificateGate::new(false, HashMap::new());
        let chain = ChainReport { expired: true, chain_valid: false, hostname_matches: false };
        assert_eq!(gate.evaluate("example.com", chain, None), GateDecision::Accept);
    }

    #[test]
    fn pin_overrides_chain_outcome_on_match() {
        let mut pins = HashMap::new();
        pins.insert("EXAMPLE.com".to_string(), "AB12".to_string());
        let gate = CertificateGate::new(true, pins);
        let chain = ChainReport { expired: true, chain_valid: false, hostname_matches: false };
        assert_eq!(gate.evaluate("example.com", chain, Some("ab12")), GateDecision::Accept);
    }

    #[test]
    fn pin_rejects_on_mismatch_even_with_clean_chain() {
        let mut pins = HashMap::new();
        pins.insert("example.com".to_string(), "ab12".to_string());
        let gate = CertificateGate::new(true, pins);
        let chain = ChainReport { expired: false, chain_valid: true, hostname_matches: true };
        assert!(!gate.evaluate("example.com", chain, Some("ffff")).is_accept());
    }

    #[test]
    fn thumbprint_from_pem_matches_known_digest() {
        // "hello\n" base64-encoded, used only to exercise the decoder (not a real cert).
        let pem = "-----BEGIN CERTIFICATE-----\naGVsbG8K\n-----END CERTIFICATE-----\n";
        let thumb = sha256_thumbprint_from_pem(pem).unwrap();
        assert_eq!(thumb, "5891b5b522d5df086d0ff0b110fbd9d21bb4fc7163af34d08286a2e846f6be03");
    }
}
