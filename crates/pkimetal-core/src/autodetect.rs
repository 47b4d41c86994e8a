//! Profile Autodetector (C3): maps an endpoint kind plus a decoded, dummy-signature-wrapped
//! input to exactly one [`ProfileId`]. Total and deterministic: every call returns a profile,
//! never an error -- an unrecognised shape always falls back to the nearest RFC 5280 profile.

use x509_parser::extensions::ParsedExtension;
use x509_parser::prelude::*;

use crate::ccadb::{CcadbTable, IssuerCapability, RecordType};
use crate::profile::ProfileId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Certificate,
    Crl,
    Ocsp,
}

// Extended Key Usage OIDs beyond the handful x509-parser exposes as named booleans.
const OID_DOCUMENT_SIGNING: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x03, 0x24];
const OID_PRECERTIFICATE_SIGNING: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xD6, 0x79, 0x02, 0x04, 0x04];
const OID_MS_DOCUMENT_SIGNING: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0x82, 0x37, 0x0A, 0x03, 0x0C];
const OID_ADOBE_DOCUMENT_SIGNING: &[u8] = &[0x2A, 0x86, 0x48, 0x86, 0xF7, 0x2F, 0x01, 0x01, 0x05];

// Extension OIDs.
const OID_PRECERTIFICATE_POISON: &[u8] = &[0x2B, 0x06, 0x01, 0x04, 0x01, 0xD6, 0x79, 0x02, 0x04, 0x03];
const OID_QC_STATEMENTS: &[u8] = &[0x2B, 0x06, 0x01, 0x05, 0x05, 0x07, 0x01, 0x03];

// ETSI QC statement ids (ETSI EN 319 412-5) and the eIDAS PSD2 statement.
const OID_QCS_COMPLIANCE: &[u8] = &[0x04, 0x00, 0x8E, 0x46, 0x01, 0x01];
const OID_QCS_PSD2: &[u8] = &[0x04, 0x00, 0x81, 0x98, 0x27, 0x02];

// Subject RDN attribute types that mark a subject as a natural (as opposed to legal) person.
const OID_GIVEN_NAME: &[u8] = &[0x55, 0x04, 0x2A];
const OID_SURNAME: &[u8] = &[0x55, 0x04, 0x04];
const OID_PSEUDONYM: &[u8] = &[0x55, 0x04, 0x41];

// CABForum Certificate Policy OIDs, all under the 2.23.140.1 arc (encoded prefix 67 81 0C 01).
const OID_POLICY_TLSSERVER_TBR_DV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x02, 0x01];
const OID_POLICY_TLSSERVER_TBR_OV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x02, 0x02];
const OID_POLICY_TLSSERVER_TBR_IV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x02, 0x03];
const OID_POLICY_TLSSERVER_TEVG_EV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x01];
const OID_POLICY_SMIME_SBR_ARC: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05];
const OID_POLICY_SMIME_SBR_MV_LEGACY: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x01, 0x01];
const OID_POLICY_SMIME_SBR_MV_MULTIPURPOSE: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x01, 0x02];
const OID_POLICY_SMIME_SBR_MV_STRICT: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x01, 0x03];
const OID_POLICY_SMIME_SBR_OV_LEGACY: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x02, 0x01];
const OID_POLICY_SMIME_SBR_OV_MULTIPURPOSE: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x02, 0x02];
const OID_POLICY_SMIME_SBR_OV_STRICT: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x02, 0x03];
const OID_POLICY_SMIME_SBR_SV_LEGACY: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x03, 0x01];
const OID_POLICY_SMIME_SBR_SV_MULTIPURPOSE: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x03, 0x02];
const OID_POLICY_SMIME_SBR_SV_STRICT: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x03, 0x03];
const OID_POLICY_SMIME_SBR_IV_LEGACY: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x04, 0x01];
const OID_POLICY_SMIME_SBR_IV_MULTIPURPOSE: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x04, 0x02];
const OID_POLICY_SMIME_SBR_IV_STRICT: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x05, 0x04, 0x03];
const OID_POLICY_CODESIGNING_CSBR_OV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x04, 0x01];
const OID_POLICY_CODESIGNING_CSBR_EV: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x03];
const OID_POLICY_TIMESTAMPING_CSBR: &[u8] = &[0x67, 0x81, 0x0C, 0x01, 0x04, 0x02];

/// QC-statement-derived qualification flags (ETSI EN 319 412 / eIDAS).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct QcFlags {
    is_eidas_qualified: bool,
    is_psd2: bool,
}

fn extension<'a>(cert: &'a X509Certificate<'a>, oid: &[u8]) -> Option<&'a x509_parser::extensions::X509Extension<'a>> {
    cert.extensions().iter().find(|e| e.oid.as_bytes() == oid)
}

fn has_extension(cert: &X509Certificate<'_>, oid: &[u8]) -> bool {
    extension(cert, oid).is_some()
}

fn is_precertificate(cert: &X509Certificate<'_>) -> bool {
    has_extension(cert, OID_PRECERTIFICATE_POISON)
}

/// Scans the raw DER of the `QCStatements` extension for the statement ids we care about. The
/// extension's `SEQUENCE OF QCStatement` is not a shape x509-parser models, so this walks each
/// element's leading `statementId` OID with the same minimal TLV reader used to unwrap TBS input.
fn qc_flags(cert: &X509Certificate<'_>) -> QcFlags {
    let mut flags = QcFlags::default();
    let Some(ext) = extension(cert, OID_QC_STATEMENTS) else {
        return flags;
    };

    // Outer SEQUENCE OF QCStatement.
    let Some((0x30, mut statements, _)) = crate::decode::read_tlv(ext.value) else {
        return flags;
    };
    while let Some((0x30, statement, rest)) = crate::decode::read_tlv(statements) {
        if let Some((0x06, statement_id, _)) = crate::decode::read_tlv(statement) {
            if statement_id == OID_QCS_COMPLIANCE {
                flags.is_eidas_qualified = true;
            } else if statement_id == OID_QCS_PSD2 {
                flags.is_psd2 = true;
            }
        }
        statements = rest;
    }
    flags
}

fn is_natural_person(cert: &X509Certificate<'_>) -> bool {
    cert.subject().iter().any(|rdn| {
        rdn.iter().any(|attr| {
            let oid = attr.attr_type().as_bytes();
            oid == OID_GIVEN_NAME || oid == OID_SURNAME || oid == OID_PSEUDONYM
        })
    })
}

fn policy_oids<'a>(cert: &'a X509Certificate<'a>) -> Vec<&'a [u8]> {
    match cert.extensions().iter().find_map(|e| match e.parsed_extension() {
        ParsedExtension::CertificatePolicies(p) => Some(p),
        _ => None,
    }) {
        Some(policies) => policies.iter().map(|p| p.policy_id.as_bytes()).collect(),
        None => Vec::new(),
    }
}

fn eku(cert: &X509Certificate<'_>) -> Option<&x509_parser::extensions::ExtendedKeyUsage<'_>> {
    cert.extensions().iter().find_map(|e| match e.parsed_extension() {
        ParsedExtension::ExtendedKeyUsage(eku) => Some(eku),
        _ => None,
    })
}

fn is_ca(cert: &X509Certificate<'_>) -> bool {
    cert.extensions()
        .iter()
        .find_map(|e| match e.parsed_extension() {
            ParsedExtension::BasicConstraints(bc) => Some(bc.ca),
            _ => None,
        })
        .unwrap_or(false)
}

fn authority_key_identifier<'a>(cert: &'a X509Certificate<'a>) -> Option<&'a [u8]> {
    cert.extensions().iter().find_map(|e| match e.parsed_extension() {
        ParsedExtension::AuthorityKeyIdentifier(aki) => aki.key_identifier.as_ref().map(|k| k.0),
        _ => None,
    })
}

fn subject_key_identifier<'a>(cert: &'a X509Certificate<'a>) -> Option<&'a [u8]> {
    cert.extensions().iter().find_map(|e| match e.parsed_extension() {
        ParsedExtension::SubjectKeyIdentifier(ski) => Some(ski.0),
        _ => None,
    })
}

/// A certificate is a root iff its basic constraints mark it as a CA, it is self-signed, subject
/// equals issuer, and (when both are present) its AKI matches its own SKI.
fn is_root(cert: &X509Certificate<'_>) -> bool {
    if !is_ca(cert) {
        return false;
    }
    if cert.subject() != cert.issuer() {
        return false;
    }
    if let (Some(aki), Some(ski)) = (authority_key_identifier(cert), subject_key_identifier(cert)) {
        if aki != ski {
            return false;
        }
    }
    // An unsupported signature algorithm is not treated as disqualifying: this gateway still
    // needs to classify and lint certificates it cannot cryptographically verify.
    !matches!(cert.verify_signature(None), Err(X509Error::SignatureVerificationError))
}

fn strongest_root_profile(cap: Option<&IssuerCapability>) -> ProfileId {
    match cap {
        Some(c) if c.tls_ev_capable => ProfileId::TevgRootTlsServer,
        Some(c) if c.tls_capable => ProfileId::TbrRootTlsServer,
        Some(c) if c.smime_capable => ProfileId::SbrRootSmime,
        Some(c) if c.code_signing_capable => ProfileId::CsbrRootCodesigning,
        _ => ProfileId::Rfc5280Root,
    }
}

fn issuer_capability<'a>(cert: &X509Certificate<'_>, ccadb: &'a CcadbTable) -> Option<&'a IssuerCapability> {
    authority_key_identifier(cert).and_then(|aki| ccadb.lookup_by_key_identifier(aki))
}

fn detect_subordinate_tls_server_profile(policies: &[&[u8]], cap: Option<&IssuerCapability>) -> ProfileId {
    for p in policies {
        if *p == OID_POLICY_TLSSERVER_TBR_DV || *p == OID_POLICY_TLSSERVER_TBR_OV || *p == OID_POLICY_TLSSERVER_TBR_IV {
            return ProfileId::TbrSubordinateTlsServer;
        } else if *p == OID_POLICY_TLSSERVER_TEVG_EV {
            return ProfileId::TevgSubordinateTlsServer;
        }
    }
    match cap {
        Some(c) if c.tls_ev_capable => ProfileId::TevgSubordinateTlsServer,
        Some(c) if c.tls_capable => ProfileId::TbrSubordinateTlsServer,
        _ => ProfileId::Rfc5280Subordinate,
    }
}

fn detect_leaf_smime_profile(policies: &[&[u8]]) -> ProfileId {
    for p in policies {
        let hit = match *p {
            x if x == OID_POLICY_SMIME_SBR_MV_LEGACY => Some(ProfileId::SbrLeafSmimeMvLegacy),
            x if x == OID_POLICY_SMIME_SBR_MV_MULTIPURPOSE => Some(ProfileId::SbrLeafSmimeMvMultipurpose),
            x if x == OID_POLICY_SMIME_SBR_MV_STRICT => Some(ProfileId::SbrLeafSmimeMvStrict),
            x if x == OID_POLICY_SMIME_SBR_OV_LEGACY => Some(ProfileId::SbrLeafSmimeOvLegacy),
            x if x == OID_POLICY_SMIME_SBR_OV_MULTIPURPOSE => Some(ProfileId::SbrLeafSmimeOvMultipurpose),
            x if x == OID_POLICY_SMIME_SBR_OV_STRICT => Some(ProfileId::SbrLeafSmimeOvStrict),
            x if x == OID_POLICY_SMIME_SBR_SV_LEGACY => Some(ProfileId::SbrLeafSmimeSvLegacy),
            x if x == OID_POLICY_SMIME_SBR_SV_MULTIPURPOSE => Some(ProfileId::SbrLeafSmimeSvMultipurpose),
            x if x == OID_POLICY_SMIME_SBR_SV_STRICT => Some(ProfileId::SbrLeafSmimeSvStrict),
            x if x == OID_POLICY_SMIME_SBR_IV_LEGACY => Some(ProfileId::SbrLeafSmimeIvLegacy),
            x if x == OID_POLICY_SMIME_SBR_IV_MULTIPURPOSE => Some(ProfileId::SbrLeafSmimeIvMultipurpose),
            x if x == OID_POLICY_SMIME_SBR_IV_STRICT => Some(ProfileId::SbrLeafSmimeIvStrict),
            _ => None,
        };
        if let Some(id) = hit {
            return id;
        }
    }
    ProfileId::Rfc5280LeafSmime
}

fn detect_subordinate_smime_profile(policies: &[&[u8]], cap: Option<&IssuerCapability>) -> ProfileId {
    if policies.iter().any(|p| p.starts_with(OID_POLICY_SMIME_SBR_ARC)) {
        return ProfileId::SbrSubordinateSmime;
    }
    if cap.map(|c| c.smime_capable).unwrap_or(false) {
        return ProfileId::SbrSubordinateSmime;
    }
    ProfileId::Rfc5280Subordinate
}

fn detect_leaf_code_signing_profile(policies: &[&[u8]]) -> ProfileId {
    for p in policies {
        if *p == OID_POLICY_CODESIGNING_CSBR_OV {
            return ProfileId::CsbrLeafCodesigningOv;
        } else if *p == OID_POLICY_CODESIGNING_CSBR_EV {
            return ProfileId::CsbrLeafCodesigningEv;
        }
    }
    ProfileId::Rfc5280LeafCodesigning
}

fn detect_subordinate_code_signing_profile(policies: &[&[u8]], cap: Option<&IssuerCapability>) -> ProfileId {
    for p in policies {
        if *p == OID_POLICY_CODESIGNING_CSBR_OV || *p == OID_POLICY_CODESIGNING_CSBR_EV {
            return ProfileId::CsbrSubordinateCodesigning;
        }
    }
    if cap.map(|c| c.code_signing_capable).unwrap_or(false) {
        return ProfileId::CsbrSubordinateCodesigning;
    }
    ProfileId::Rfc5280Subordinate
}

fn detect_leaf_time_stamping_profile(policies: &[&[u8]]) -> ProfileId {
    if policies.iter().any(|p| *p == OID_POLICY_TIMESTAMPING_CSBR) {
        ProfileId::CsbrLeafTimestamping
    } else {
        ProfileId::Rfc5280LeafTimestamping
    }
}

fn detect_subordinate_time_stamping_profile(policies: &[&[u8]]) -> ProfileId {
    if policies.iter().any(|p| *p == OID_POLICY_TIMESTAMPING_CSBR) {
        ProfileId::CsbrSubordinateTimestamping
    } else {
        ProfileId::Rfc5280Subordinate
    }
}

fn has_eku(eku: &x509_parser::extensions::ExtendedKeyUsage<'_>, wanted: &[u8]) -> bool {
    eku.other.iter().any(|o| o.as_bytes() == wanted)
}

/// C3 entry point for certificate input. `fingerprint` is the SHA-256 fingerprint of the decoded
/// certificate, used only when the certificate is itself a root.
pub fn detect_certificate_profile(cert: &X509Certificate<'_>, ccadb: &CcadbTable, fingerprint: &[u8; 32]) -> ProfileId {
    if is_root(cert) {
        let cap = ccadb
            .lookup_by_fingerprint(fingerprint)
            .filter(|c| c.record_type == RecordType::Root);
        return strongest_root_profile(cap);
    }

    if !is_ca(cert) {
        return detect_leaf_profile(cert, ccadb);
    }

    detect_subordinate_profile(cert, ccadb)
}

fn detect_subordinate_profile(cert: &X509Certificate<'_>, ccadb: &CcadbTable) -> ProfileId {
    let policies = policy_oids(cert);
    let cap = issuer_capability(cert, ccadb);

    if let Some(eku) = eku(cert) {
        let profile = if eku.server_auth {
            Some(detect_subordinate_tls_server_profile(&policies, cap))
        } else if eku.email_protection {
            Some(detect_subordinate_smime_profile(&policies, cap))
        } else if eku.code_signing {
            Some(detect_subordinate_code_signing_profile(&policies, cap))
        } else if eku.time_stamping {
            Some(detect_subordinate_time_stamping_profile(&policies))
        } else {
            None
        };
        if let Some(p) = profile {
            return p;
        }
        if has_eku(eku, OID_PRECERTIFICATE_SIGNING) {
            return ProfileId::TbrSubordinatePrecertSigning;
        }
    }
    ProfileId::Rfc5280Subordinate
}

fn detect_leaf_profile(cert: &X509Certificate<'_>, ccadb: &CcadbTable) -> ProfileId {
    let policies = policy_oids(cert);
    let precert = is_precertificate(cert);
    let qc = qc_flags(cert);
    let natural_person = is_natural_person(cert);
    let cap = issuer_capability(cert, ccadb);

    if let Some(eku) = eku(cert) {
        if eku.server_auth {
            let policy_based = detect_leaf_tls_server_profile(&policies, precert, qc, natural_person);
            if policy_based != ProfileId::Rfc5280LeafTlsServer {
                return policy_based;
            }
            return match cap {
                Some(c) if c.tls_ev_capable => {
                    if precert {
                        ProfileId::TevgLeafTlsServerEvPrecertificate
                    } else {
                        ProfileId::TevgLeafTlsServerEv
                    }
                }
                Some(c) if c.tls_capable => {
                    if precert {
                        ProfileId::TbrLeafTlsServerDvPrecertificate
                    } else {
                        ProfileId::TbrLeafTlsServerDv
                    }
                }
                _ => ProfileId::Rfc5280LeafTlsServer,
            };
        }
        if eku.email_protection {
            return detect_leaf_smime_profile(&policies);
        }
        if eku.code_signing {
            let policy_based = detect_leaf_code_signing_profile(&policies);
            if policy_based != ProfileId::Rfc5280LeafCodesigning {
                return policy_based;
            }
            return match cap {
                Some(c) if c.code_signing_capable => ProfileId::CsbrLeafCodesigningOv,
                _ => ProfileId::Rfc5280LeafCodesigning,
            };
        }
        if eku.time_stamping {
            return detect_leaf_time_stamping_profile(&policies);
        }
        if eku.ocsp_signing {
            return ProfileId::Rfc5280LeafOcspsigning;
        }
        if has_eku(eku, OID_DOCUMENT_SIGNING) || has_eku(eku, OID_MS_DOCUMENT_SIGNING) || has_eku(eku, OID_ADOBE_DOCUMENT_SIGNING) {
            return ProfileId::Rfc5280LeafDocumentsigning;
        }
        if eku.client_auth {
            return ProfileId::Rfc5280LeafTlsClient;
        }
    }
    ProfileId::Rfc5280Leaf
}

/// Selects a TLS-server leaf (or its precertificate variant) from a CABForum policy OID, upgraded
/// to the ETSI QNCP-w variant when the certificate carries an eIDAS-qualified QC statement.
fn detect_leaf_tls_server_profile(policies: &[&[u8]], precert: bool, qc: QcFlags, natural_person: bool) -> ProfileId {
    for p in policies {
        let found = if *p == OID_POLICY_TLSSERVER_TBR_DV {
            Some((ProfileId::TbrLeafTlsServerDv, ProfileId::TbrLeafTlsServerDvPrecertificate))
        } else if *p == OID_POLICY_TLSSERVER_TBR_OV {
            Some((ProfileId::TbrLeafTlsServerOv, ProfileId::TbrLeafTlsServerOvPrecertificate))
        } else if *p == OID_POLICY_TLSSERVER_TBR_IV {
            Some((ProfileId::TbrLeafTlsServerIv, ProfileId::TbrLeafTlsServerIvPrecertificate))
        } else if *p == OID_POLICY_TLSSERVER_TEVG_EV {
            Some((ProfileId::TevgLeafTlsServerEv, ProfileId::TevgLeafTlsServerEvPrecertificate))
        } else {
            None
        };
        if let Some((plain, pre)) = found {
            if qc.is_eidas_qualified {
                return etsi_qncpw_profile(natural_person, precert);
            }
            return if precert { pre } else { plain };
        }
    }
    if qc.is_eidas_qualified {
        return etsi_qncpw_profile(natural_person, precert);
    }
    ProfileId::Rfc5280LeafTlsServer
}

fn etsi_qncpw_profile(natural_person: bool, precert: bool) -> ProfileId {
    match (natural_person, precert) {
        (true, false) => ProfileId::EtsiQncpwLeafTlsServerNaturalPerson,
        (true, true) => ProfileId::EtsiQncpwLeafTlsServerNaturalPersonPrecertificate,
        (false, false) => ProfileId::EtsiQncpwLeafTlsServerLegalPerson,
        (false, true) => ProfileId::EtsiQncpwLeafTlsServerLegalPersonPrecertificate,
    }
}

/// C3 entry point for CRL input: classifies by the issuer's CCADB capability, looked up by AKI.
pub fn detect_crl_profile(aki: Option<&[u8]>, ccadb: &CcadbTable) -> ProfileId {
    let Some(aki) = aki else {
        return ProfileId::Rfc5280Crl;
    };
    match ccadb.lookup_by_key_identifier(aki) {
        Some(cap) if cap.record_type == RecordType::Root => {
            if cap.tls_capable {
                ProfileId::TbrArl
            } else {
                ProfileId::Rfc5280Arl
            }
        }
        Some(cap) => {
            if cap.tls_capable {
                ProfileId::TbrCrl
            } else {
                ProfileId::Rfc5280Crl
            }
        }
        None => ProfileId::Rfc5280Crl,
    }
}

/// C3 entry point for OCSP input: OCSP responses have no profile variants.
pub fn detect_ocsp_profile() -> ProfileId {
    ProfileId::Rfc6960OcspResponse
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_crl_profile_defaults_to_rfc5280_without_aki() {
        let ccadb = CcadbTable::empty();
        assert_eq!(detect_crl_profile(None, &ccadb), ProfileId::Rfc5280Crl);
    }

    #[test]
    fn detect_crl_profile_falls_back_when_issuer_unknown() {
        let ccadb = CcadbTable::empty();
        assert_eq!(detect_crl_profile(Some(b"unknown-ski"), &ccadb), ProfileId::Rfc5280Crl);
    }

    #[test]
    fn detect_ocsp_profile_is_constant() {
        assert_eq!(detect_ocsp_profile(), ProfileId::Rfc6960OcspResponse);
    }

    #[test]
    fn strongest_root_profile_prefers_ev_over_tls_over_smime_over_codesigning() {
        let cap = IssuerCapability {
            record_type: RecordType::Root,
            tls_capable: true,
            tls_ev_capable: true,
            smime_capable: true,
            code_signing_capable: true,
        };
        assert_eq!(strongest_root_profile(Some(&cap)), ProfileId::TevgRootTlsServer);
    }

    #[test]
    fn strongest_root_profile_falls_back_to_rfc5280_without_capability() {
        assert_eq!(strongest_root_profile(None), ProfileId::Rfc5280Root);
    }

    #[test]
    fn etsi_qncpw_profile_distinguishes_person_and_precert() {
        assert_eq!(etsi_qncpw_profile(true, false), ProfileId::EtsiQncpwLeafTlsServerNaturalPerson);
        assert_eq!(etsi_qncpw_profile(true, true), ProfileId::EtsiQncpwLeafTlsServerNaturalPersonPrecertificate);
        assert_eq!(etsi_qncpw_profile(false, false), ProfileId::EtsiQncpwLeafTlsServerLegalPerson);
        assert_eq!(etsi_qncpw_profile(false, true), ProfileId::EtsiQncpwLeafTlsServerLegalPersonPrecertificate);
    }

    #[test]
    fn detect_leaf_tls_server_profile_upgrades_qualified_dv_to_etsi_natural_person() {
        let qc = QcFlags { is_eidas_qualified: true, is_psd2: false };
        let policies = vec![OID_POLICY_TLSSERVER_TBR_DV];
        assert_eq!(
            detect_leaf_tls_server_profile(&policies, false, qc, true),
            ProfileId::EtsiQncpwLeafTlsServerNaturalPerson
        );
    }

    #[test]
    fn detect_leaf_tls_server_profile_keeps_plain_profile_without_qualification() {
        let qc = QcFlags::default();
        let policies = vec![OID_POLICY_TLSSERVER_TBR_OV];
        assert_eq!(detect_leaf_tls_server_profile(&policies, false, qc, true), ProfileId::TbrLeafTlsServerOv);
        assert_eq!(detect_leaf_tls_server_profile(&policies, true, qc, true), ProfileId::TbrLeafTlsServerOvPrecertificate);
    }

    #[test]
    fn detect_subordinate_smime_profile_matches_arc_prefix() {
        let policies = vec![OID_POLICY_SMIME_SBR_MV_LEGACY];
        assert_eq!(detect_subordinate_smime_profile(&policies, None), ProfileId::SbrSubordinateSmime);
    }
}
