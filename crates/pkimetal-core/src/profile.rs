//! Profile registry (C1): enumerates every certificate/CRL/OCSP conformance profile this
//! service knows about, and the derived sets membership queries throughout the dispatch core
//! rely on.

use std::sync::OnceLock;

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[repr(u16)]
pub enum ProfileId {
    Autodetect = 0,
    // RFC 5280.
    Rfc5280Root,
    Rfc5280Subordinate,
    Rfc5280Leaf,
    Rfc5280LeafTlsClient,
    Rfc5280LeafTlsServer,
    Rfc5280LeafSmime,
    Rfc5280LeafCodesigning,
    Rfc5280LeafTimestamping,
    Rfc5280LeafDocumentsigning,
    Rfc5280LeafOcspsigning,
    Rfc5280Crl,
    Rfc5280Arl,
    // RFC 6960.
    Rfc6960OcspResponse,
    // CABForum TLS Baseline Requirements.
    TbrRootTlsServer,
    TbrCrossTlsServer,
    TbrCrossUnrestricted,
    TbrSubordinateTlsServer,
    TbrSubordinateTlsServerInternalUnconstrained,
    TbrSubordinateTlsServerInternalConstrained,
    TbrSubordinateTlsServerExternalUnconstrained,
    TbrSubordinateTlsServerExternalConstrained,
    TbrSubordinatePrecertSigning,
    TbrLeafTlsServerDv,
    TbrLeafTlsServerDvPrecertificate,
    TbrLeafTlsServerOv,
    TbrLeafTlsServerOvPrecertificate,
    TbrLeafTlsServerIv,
    TbrLeafTlsServerIvPrecertificate,
    TbrLeafOcspSigning,
    TbrCrl,
    TbrArl,
    // CABForum TLS Extended Validation Guidelines.
    TevgRootTlsServer,
    TevgSubordinateTlsServer,
    TevgSubordinateTlsServerExternalUnconstrained,
    TevgSubordinateTlsServerExternalConstrained,
    TevgLeafTlsServerEv,
    TevgLeafTlsServerEvPrecertificate,
    // CABForum S/MIME Baseline Requirements.
    SbrRootSmime,
    SbrSubordinateSmime,
    SbrLeafSmimeMvLegacy,
    SbrLeafSmimeMvMultipurpose,
    SbrLeafSmimeMvStrict,
    SbrLeafSmimeOvLegacy,
    SbrLeafSmimeOvMultipurpose,
    SbrLeafSmimeOvStrict,
    SbrLeafSmimeSvLegacy,
    SbrLeafSmimeSvMultipurpose,
    SbrLeafSmimeSvStrict,
    SbrLeafSmimeIvLegacy,
    SbrLeafSmimeIvMultipurpose,
    SbrLeafSmimeIvStrict,
    // CABForum Code Signing Baseline Requirements.
    CsbrRootCodesigning,
    CsbrRootTimestamping,
    CsbrSubordinateCodesigning,
    CsbrSubordinateTimestamping,
    CsbrLeafCodesigningOv,
    CsbrLeafCodesigningEv,
    CsbrLeafTimestamping,
    // ETSI EN 319 412 (qualified-certificate policy, "QNCP-w": Qualified Naming and Certificate
    // Policy for website authentication). Not present in the reference implementation; added
    // per the expanded profile registry (SPEC_FULL.md C1/C3).
    EtsiQncpwLeafTlsServerNaturalPerson,
    EtsiQncpwLeafTlsServerNaturalPersonPrecertificate,
    EtsiQncpwLeafTlsServerLegalPerson,
    EtsiQncpwLeafTlsServerLegalPersonPrecertificate,
}

#[derive(Debug, Clone, Serialize)]
pub struct Profile {
    pub name: &'static str,
    pub source: &'static str,
    pub description: &'static str,
    pub autodetectable: bool,
}

macro_rules! profile_table {
    ($(($id:ident, $name:literal, $source:literal, $desc:literal, $auto:literal)),* $(,)?) => {
        fn build_all_profiles() -> FxHashMap<ProfileId, Profile> {
            let mut m = FxHashMap::default();
            $(
                m.insert(ProfileId::$id, Profile {
                    name: $name,
                    source: $source,
                    description: $desc,
                    autodetectable: $auto,
                });
            )*
            m
        }
    };
}

profile_table! {
    (Autodetect, "autodetect", "", "AUTO-DETECT", false),
    (Rfc5280Root, "rfc5280_root", "RFC5280", "Root CA Certificate", true),
    (Rfc5280Subordinate, "rfc5280_subordinate", "RFC5280", "Subordinate CA Certificate", true),
    (Rfc5280Leaf, "rfc5280_leaf", "RFC5280", "Leaf Certificate", true),
    (Rfc5280LeafTlsClient, "rfc5280_leaf_tlsclient", "RFC5280", "TLS Client Certificate", true),
    (Rfc5280LeafTlsServer, "rfc5280_leaf_tlsserver", "RFC5280", "TLS Server Certificate", true),
    (Rfc5280LeafSmime, "rfc5280_leaf_smime", "RFC5280", "S/MIME Certificate", true),
    (Rfc5280LeafCodesigning, "rfc5280_leaf_codesigning", "RFC5280", "Code Signing Certificate", true),
    (Rfc5280LeafTimestamping, "rfc5280_leaf_timestamping", "RFC5280", "Time Stamping Certificate", true),
    (Rfc5280LeafDocumentsigning, "rfc5280_leaf_documentsigning", "RFC5280", "Document Signing Certificate", true),
    (Rfc5280LeafOcspsigning, "rfc5280_leaf_ocspsigning", "RFC5280", "OCSP Signing Certificate", true),
    (Rfc5280Crl, "rfc5280_crl", "RFC5280", "Certificate Revocation List", true),
    (Rfc5280Arl, "rfc5280_arl", "RFC5280", "Authority Revocation List", false),
    (Rfc6960OcspResponse, "rfc6960_ocspresponse", "RFC6960", "OCSP Response", true),
    (TbrRootTlsServer, "tbr_root_tlsserver", "TLS BRs", "TLS Server Root CA Certificate", false),
    (TbrCrossTlsServer, "tbr_cross_tlsserver", "TLS BRs", "TLS Server Cross-Certified Subordinate CA Certificate", false),
    (TbrCrossUnrestricted, "tbr_cross_unrestricted", "TLS BRs", "Unrestricted TLS Server Cross-Certified Subordinate CA Certificate", false),
    (TbrSubordinateTlsServer, "tbr_subordinate_tlsserver", "TLS BRs", "TLS Server Subordinate CA Certificate", true),
    (TbrSubordinateTlsServerInternalUnconstrained, "tbr_subordinate_tlsserver_internal_unconstrained", "TLS BRs", "Unconstrained Internal TLS Server Subordinate CA Certificate", false),
    (TbrSubordinateTlsServerInternalConstrained, "tbr_subordinate_tlsserver_internal_constrained", "TLS BRs", "Constrained Internal TLS Server Subordinate CA Certificate", false),
    (TbrSubordinateTlsServerExternalUnconstrained, "tbr_subordinate_tlsserver_external_unconstrained", "TLS BRs", "Unconstrained External TLS Server Subordinate CA Certificate", false),
    (TbrSubordinateTlsServerExternalConstrained, "tbr_subordinate_tlsserver_external_constrained", "TLS BRs", "Constrained External TLS Server Subordinate CA Certificate", false),
    (TbrSubordinatePrecertSigning, "tbr_subordinate_precertsigning", "TLS BRs", "Precertificate Signing Subordinate CA Certificate", true),
    (TbrLeafTlsServerDv, "tbr_leaf_tlsserver_dv", "TLS BRs", "TLS Server Certificate: Domain Validated", true),
    (TbrLeafTlsServerDvPrecertificate, "tbr_leaf_tlsserver_dv_precertificate", "TLS BRs", "TLS Server Precertificate: Domain Validated", true),
    (TbrLeafTlsServerOv, "tbr_leaf_tlsserver_ov", "TLS BRs", "TLS Server Certificate: Organization Validated", true),
    (TbrLeafTlsServerOvPrecertificate, "tbr_leaf_tlsserver_ov_precertificate", "TLS BRs", "TLS Server Precertificate: Organization Validated", true),
    (TbrLeafTlsServerIv, "tbr_leaf_tlsserver_iv", "TLS BRs", "TLS Server Certificate: Individual Validated", true),
    (TbrLeafTlsServerIvPrecertificate, "tbr_leaf_tlsserver_iv_precertificate", "TLS BRs", "TLS Server Precertificate: Individual Validated", true),
    (TbrLeafOcspSigning, "tbr_leaf_ocspsigning", "TLS BRs", "OCSP Signing Certificate", false),
    (TbrCrl, "tbr_crl", "TLS BRs", "Certificate Revocation List", false),
    (TbrArl, "tbr_arl", "TLS BRs", "Authority Revocation List", false),
    (TevgRootTlsServer, "tevg_root_tlsserver", "TLS EVGs", "EV TLS Server Root CA Certificate", false),
    (TevgSubordinateTlsServer, "tevg_subordinate_tlsserver", "TLS EVGs", "EV TLS Subordinate CA Certificate", true),
    (TevgSubordinateTlsServerExternalUnconstrained, "tevg_subordinate_tlsserver_external_unconstrained", "TLS EVGs", "Unconstrained External EV TLS Server Subordinate CA Certificate", false),
    (TevgSubordinateTlsServerExternalConstrained, "tevg_subordinate_tlsserver_external_constrained", "TLS EVGs", "Constrained External EV TLS Server Subordinate CA Certificate", false),
    (TevgLeafTlsServerEv, "tevg_leaf_tlsserver_ev", "TLS EVGs", "TLS Server Certificate: Extended Validation", true),
    (TevgLeafTlsServerEvPrecertificate, "tevg_leaf_tlsserver_ev_precertificate", "TLS EVGs", "TLS Server Precertificate: Extended Validation", true),
    (SbrRootSmime, "sbr_root_smime", "S/MIME BRs", "S/MIME Root CA Certificate", false),
    (SbrSubordinateSmime, "sbr_subordinate_smime", "S/MIME BRs", "S/MIME Subordinate CA Certificate", true),
    (SbrLeafSmimeMvLegacy, "sbr_leaf_smime_mv_legacy", "S/MIME BRs", "S/MIME Certificate: Mailbox Validated, Legacy", true),
    (SbrLeafSmimeMvMultipurpose, "sbr_leaf_smime_mv_multipurpose", "S/MIME BRs", "S/MIME Certificate: Mailbox Validated, Multipurpose", true),
    (SbrLeafSmimeMvStrict, "sbr_leaf_smime_mv_strict", "S/MIME BRs", "S/MIME Certificate: Mailbox Validated, Strict", true),
    (SbrLeafSmimeOvLegacy, "sbr_leaf_smime_ov_legacy", "S/MIME BRs", "S/MIME Certificate: Organization Validated, Legacy", true),
    (SbrLeafSmimeOvMultipurpose, "sbr_leaf_smime_ov_multipurpose", "S/MIME BRs", "S/MIME Certificate: Organization Validated, Multipurpose", true),
    (SbrLeafSmimeOvStrict, "sbr_leaf_smime_ov_strict", "S/MIME BRs", "S/MIME Certificate: Organization Validated, Strict", true),
    (SbrLeafSmimeSvLegacy, "sbr_leaf_smime_sv_legacy", "S/MIME BRs", "S/MIME Certificate: Sponsor Validated, Legacy", true),
    (SbrLeafSmimeSvMultipurpose, "sbr_leaf_smime_sv_multipurpose", "S/MIME BRs", "S/MIME Certificate: Sponsor Validated, Multipurpose", true),
    (SbrLeafSmimeSvStrict, "sbr_leaf_smime_sv_strict", "S/MIME BRs", "S/MIME Certificate: Sponsor Validated, Strict", true),
    (SbrLeafSmimeIvLegacy, "sbr_leaf_smime_iv_legacy", "S/MIME BRs", "S/MIME Certificate: Individual Validated, Legacy", true),
    (SbrLeafSmimeIvMultipurpose, "sbr_leaf_smime_iv_multipurpose", "S/MIME BRs", "S/MIME Certificate: Individual Validated, Multipurpose", true),
    (SbrLeafSmimeIvStrict, "sbr_leaf_smime_iv_strict", "S/MIME BRs", "S/MIME Certificate: Individual Validated, Strict", true),
    (CsbrRootCodesigning, "csbr_root_codesigning", "Code Signing BRs", "Code Signing Root CA Certificate", false),
    (CsbrRootTimestamping, "csbr_root_timestamping", "Code Signing BRs", "Time Stamping Root CA Certificate", false),
    (CsbrSubordinateCodesigning, "csbr_subordinate_codesigning", "Code Signing BRs", "Code Signing Subordinate CA Certificate", true),
    (CsbrSubordinateTimestamping, "csbr_subordinate_timestamping", "Code Signing BRs", "Time Stamping Subordinate CA Certificate", true),
    (CsbrLeafCodesigningOv, "csbr_leaf_codesigning_ov", "Code Signing BRs", "Code Signing Certificate: Organization Validated", true),
    (CsbrLeafCodesigningEv, "csbr_leaf_codesigning_ev", "Code Signing BRs", "Code Signing Certificate: Extended Validation", true),
    (CsbrLeafTimestamping, "csbr_leaf_timestamping", "Code Signing BRs", "Time Stamping Certificate", true),
    (EtsiQncpwLeafTlsServerNaturalPerson, "etsi_qncpw_leaf_tlsserver_naturalperson", "ETSI EN 319 412", "QNCP-w TLS Server Certificate: Qualified, Natural Person", true),
    (EtsiQncpwLeafTlsServerNaturalPersonPrecertificate, "etsi_qncpw_leaf_tlsserver_naturalperson_precertificate", "ETSI EN 319 412", "QNCP-w TLS Server Precertificate: Qualified, Natural Person", true),
    (EtsiQncpwLeafTlsServerLegalPerson, "etsi_qncpw_leaf_tlsserver_legalperson", "ETSI EN 319 412", "QNCP-w TLS Server Certificate: Qualified, Legal Person", true),
    (EtsiQncpwLeafTlsServerLegalPersonPrecertificate, "etsi_qncpw_leaf_tlsserver_legalperson_precertificate", "ETSI EN 319 412", "QNCP-w TLS Server Precertificate: Qualified, Legal Person", true),
}

struct Registry {
    profiles: FxHashMap<ProfileId, Profile>,
    crl: FxHashSet<ProfileId>,
    ocsp: FxHashSet<ProfileId>,
    root: FxHashSet<ProfileId>,
    subordinate: FxHashSet<ProfileId>,
    sbr_leaf: FxHashSet<ProfileId>,
    tbr_tevg_leaf: FxHashSet<ProfileId>,
    tbr_tevg_certificate: FxHashSet<ProfileId>,
    non_cabforum: FxHashSet<ProfileId>,
    non_certificate: FxHashSet<ProfileId>,
    etsi_certificate: FxHashSet<ProfileId>,
}

fn build_registry() -> Registry {
    let profiles = build_all_profiles();

    let mut crl = FxHashSet::default();
    let mut ocsp = FxHashSet::default();
    let mut root = FxHashSet::default();
    let mut subordinate = FxHashSet::default();
    let mut sbr_leaf = FxHashSet::default();
    let mut tbr_tevg_leaf = FxHashSet::default();

    // First pass: sets that don't intersect with other lists.
    for (id, p) in &profiles {
        if p.name.ends_with("_crl") || p.name.ends_with("_arl") {
            crl.insert(*id);
        } else if p.name.ends_with("_ocspresponse") {
            ocsp.insert(*id);
        } else if p.name.contains("_root_") {
            root.insert(*id);
        } else if p.name.contains("_subordinate_") || p.name.contains("_cross_") {
            subordinate.insert(*id);
        } else if p.name.starts_with("sbr_leaf_") {
            sbr_leaf.insert(*id);
        } else if p.name.starts_with("tbr_leaf_") || p.name.starts_with("tevg_leaf_") {
            tbr_tevg_leaf.insert(*id);
        }
    }

    // Second pass: NonCabforum intersects with other lists; TbrTevgCertificate needs crl/ocsp first.
    let mut non_cabforum = FxHashSet::default();
    let mut tbr_tevg_certificate = FxHashSet::default();
    for (id, p) in &profiles {
        if p.name.starts_with("rfc") {
            non_cabforum.insert(*id);
        } else if (p.name.starts_with("tbr_") || p.name.starts_with("tevg_"))
            && !crl.contains(id)
            && !ocsp.contains(id)
        {
            tbr_tevg_certificate.insert(*id);
        }
    }

    // Third pass: NonCertificate = Crl ∪ Ocsp.
    let non_certificate: FxHashSet<ProfileId> = crl.union(&ocsp).copied().collect();

    // EtsiCertificate: all ETSI-sourced profiles.
    let etsi_certificate: FxHashSet<ProfileId> = profiles
        .iter()
        .filter(|(_, p)| p.name.starts_with("etsi_"))
        .map(|(id, _)| *id)
        .collect();

    Registry {
        profiles,
        crl,
        ocsp,
        root,
        subordinate,
        sbr_leaf,
        tbr_tevg_leaf,
        tbr_tevg_certificate,
        non_cabforum,
        non_certificate,
        etsi_certificate,
    }
}

fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

pub fn profile(id: ProfileId) -> &'static Profile {
    registry()
        .profiles
        .get(&id)
        .expect("every ProfileId variant has a registered Profile")
}

pub fn all_profiles_ordered() -> Vec<(ProfileId, &'static Profile)> {
    let reg = registry();
    let mut v: Vec<_> = reg.profiles.iter().map(|(id, p)| (*id, p)).collect();
    v.sort_by_key(|(id, _)| *id);
    v
}

pub fn by_name(name: &str) -> Option<ProfileId> {
    registry()
        .profiles
        .iter()
        .find(|(_, p)| p.name == name)
        .map(|(id, _)| *id)
}

pub fn is_crl(id: ProfileId) -> bool {
    registry().crl.contains(&id)
}
pub fn is_ocsp(id: ProfileId) -> bool {
    registry().ocsp.contains(&id)
}
pub fn is_root(id: ProfileId) -> bool {
    registry().root.contains(&id)
}
pub fn is_subordinate(id: ProfileId) -> bool {
    registry().subordinate.contains(&id)
}
pub fn is_sbr_leaf(id: ProfileId) -> bool {
    registry().sbr_leaf.contains(&id)
}
pub fn is_tbr_tevg_leaf(id: ProfileId) -> bool {
    registry().tbr_tevg_leaf.contains(&id)
}
pub fn is_tbr_tevg_certificate(id: ProfileId) -> bool {
    registry().tbr_tevg_certificate.contains(&id)
}
pub fn is_non_cabforum(id: ProfileId) -> bool {
    registry().non_cabforum.contains(&id)
}
pub fn is_non_certificate(id: ProfileId) -> bool {
    registry().non_certificate.contains(&id)
}
pub fn is_etsi_certificate(id: ProfileId) -> bool {
    registry().etsi_certificate.contains(&id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_certificate_is_union_of_crl_and_ocsp() {
        let reg = registry();
        let union: FxHashSet<ProfileId> = reg.crl.union(&reg.ocsp).copied().collect();
        assert_eq!(reg.non_certificate, union);
    }

    #[test]
    fn root_and_subordinate_are_disjoint() {
        let reg = registry();
        assert!(reg.root.is_disjoint(&reg.subordinate));
    }

    #[test]
    fn tbr_tevg_leaf_is_subset_of_tbr_tevg_certificate() {
        let reg = registry();
        assert!(reg.tbr_tevg_leaf.is_subset(&reg.tbr_tevg_certificate));
    }

    #[test]
    fn every_profile_id_has_a_unique_name() {
        let mut names: Vec<&str> = registry().profiles.values().map(|p| p.name).collect();
        names.sort_unstable();
        let before = names.len();
        names.dedup();
        assert_eq!(before, names.len());
    }

    #[test]
    fn by_name_round_trips() {
        let id = ProfileId::TbrLeafTlsServerDv;
        assert_eq!(by_name(profile(id).name), Some(id));
    }

    #[test]
    fn crl_excludes_ocsp_response() {
        assert!(!is_crl(ProfileId::Rfc6960OcspResponse));
        assert!(is_crl(ProfileId::Rfc5280Crl));
        assert!(is_crl(ProfileId::TbrArl));
    }

    #[test]
    fn plain_rfc5280_root_is_not_in_cabforum_root_set() {
        // Matches the reference implementation's substring-based classification: "rfc5280_root"
        // has no trailing underscore after "root", so it does not match "_root_".
        assert!(!is_root(ProfileId::Rfc5280Root));
        assert!(is_root(ProfileId::TbrRootTlsServer));
    }

    #[test]
    fn etsi_certificate_set_is_etsi_sourced_only() {
        assert!(is_etsi_certificate(ProfileId::EtsiQncpwLeafTlsServerNaturalPerson));
        assert!(!is_etsi_certificate(ProfileId::Rfc5280Leaf));
    }
}
