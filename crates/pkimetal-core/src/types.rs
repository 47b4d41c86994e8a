//! Shared data model for the dispatch core: the request/result shapes that flow between
//! dispatch (C6), the engine registry (C5), and adapters (C7).

use std::sync::Arc;
use std::time::Instant;

use async_channel::Sender;

use crate::profile::ProfileId;
use crate::severity::Severity;

/// The name every sentinel/meta result is attributed to when it did not come from an engine.
pub const PKIMETAL_NAME: &str = "pkimetal";
/// Terminates an engine's result stream for one request.
pub const END_OF_RESULTS: &str = "[EndOfResults]";

/// One decoded input routed to the applicable engines. Immutable once built: every field is
/// set at construction and never mutated afterwards.
#[derive(Clone)]
pub struct LintingRequest {
    /// Trimmed base64 of the original input, forwarded verbatim to subprocess engines.
    pub b64_input: String,
    /// Decoded DER bytes (already dummy-signature-wrapped for TBS inputs).
    pub decoded_input: Arc<Vec<u8>>,
    /// True when `decoded_input` parses as a certificate (as opposed to a CRL or OCSP response).
    /// In-process adapters that need the parsed certificate re-parse `decoded_input` on demand
    /// rather than this request carrying a borrowed `X509Certificate`, which would make the
    /// struct self-referential.
    pub is_certificate: bool,
    pub profile_id: ProfileId,
    pub queued_at: Instant,
    pub checks_added: Vec<String>,
    pub checks_disabled: Vec<String>,
    pub resp_tx: Sender<LintingResult>,
}

impl LintingRequest {
    /// Parses `decoded_input` as a certificate, when applicable. Returns `None` for CRL/OCSP
    /// inputs or if the bytes no longer parse (should not happen for a request already routed
    /// past autodetection).
    pub fn parsed_certificate(&self) -> Option<x509_parser::certificate::X509Certificate<'_>> {
        if !self.is_certificate {
            return None;
        }
        x509_parser::certificate::X509Certificate::from_der(&self.decoded_input)
            .ok()
            .map(|(_, cert)| cert)
    }
}

/// One finding (or meta/sentinel record) produced by an engine.
#[derive(Debug, Clone)]
pub struct LintingResult {
    pub engine_name: String,
    pub field: Option<String>,
    pub finding: String,
    pub severity: Severity,
    pub code: Option<String>,
}

impl LintingResult {
    pub fn finding(engine_name: impl Into<String>, severity: Severity, finding: impl Into<String>) -> Self {
        Self {
            engine_name: engine_name.into(),
            field: None,
            finding: finding.into(),
            severity,
            code: None,
        }
    }

    pub fn meta(engine_name: impl Into<String>, finding: impl Into<String>) -> Self {
        Self::finding(engine_name, Severity::Meta, finding)
    }

    pub fn end_of_results(engine_name: impl Into<String>) -> Self {
        Self::meta(engine_name, END_OF_RESULTS)
    }

    pub fn is_end_of_results(&self) -> bool {
        self.severity == Severity::Meta && self.finding == END_OF_RESULTS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_of_results_sentinel_is_recognised() {
        let r = LintingResult::end_of_results(PKIMETAL_NAME);
        assert!(r.is_end_of_results());
        assert_eq!(r.engine_name, PKIMETAL_NAME);
    }

    #[test]
    fn ordinary_finding_is_not_end_of_results() {
        let r = LintingResult::finding("zlint", Severity::Error, "e_bad_thing");
        assert!(!r.is_end_of_results());
    }
}
