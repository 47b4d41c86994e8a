//! CCADB capability table (C4): an in-memory lookup from a CA certificate's SHA-256 fingerprint
//! or Subject Key Identifier to the trust programs it participates in, loaded once from a CSV
//! export of Mozilla's Common CA Database ("All Certificate Records" report).

use std::path::Path;

use rustc_hash::FxHashMap;
use tracing::{info, warn};

pub const CCADB_RECORD_ROOT: &str = "Root Certificate";
pub const CCADB_RECORD_INTERMEDIATE: &str = "Intermediate Certificate";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordType {
    Root,
    Intermediate,
    Other(String),
}

impl From<&str> for RecordType {
    fn from(s: &str) -> Self {
        match s {
            CCADB_RECORD_ROOT => RecordType::Root,
            CCADB_RECORD_INTERMEDIATE => RecordType::Intermediate,
            other => RecordType::Other(other.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssuerCapability {
    pub record_type: RecordType,
    pub tls_capable: bool,
    pub tls_ev_capable: bool,
    pub smime_capable: bool,
    pub code_signing_capable: bool,
}

impl IssuerCapability {
    fn merge_from(&mut self, other: &IssuerCapability) {
        if other.record_type == RecordType::Root {
            self.record_type = RecordType::Root;
        }
        self.tls_capable |= other.tls_capable;
        self.tls_ev_capable |= other.tls_ev_capable;
        self.smime_capable |= other.smime_capable;
        self.code_signing_capable |= other.code_signing_capable;
    }
}

/// By-fingerprint and by-key-identifier capability tables. Built once at boot from a CSV file;
/// read-only thereafter. Either table may be empty (the CSV file is optional: its absence only
/// degrades autodetection to the RFC5280 defaults, it is never a boot-time fatal error).
#[derive(Debug, Default)]
pub struct CcadbTable {
    by_fingerprint: FxHashMap<[u8; 32], IssuerCapability>,
    by_key_identifier: FxHashMap<Vec<u8>, IssuerCapability>,
}

impl CcadbTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn lookup_by_fingerprint(&self, fingerprint: &[u8; 32]) -> Option<&IssuerCapability> {
        self.by_fingerprint.get(fingerprint)
    }

    pub fn lookup_by_key_identifier(&self, ski: &[u8]) -> Option<&IssuerCapability> {
        self.by_key_identifier.get(ski)
    }

    /// Reads and parses the CCADB "All Certificate Records" CSV export. Missing, empty or
    /// malformed files are logged and treated as an empty table rather than a fatal error,
    /// matching the reference implementation.
    pub fn load_from_file(path: &Path) -> Self {
        let data = match std::fs::read_to_string(path) {
            Ok(d) => d,
            Err(err) => {
                info!(csv_filename = %path.display(), error = %err, "CCADB CSV file could not be read");
                return Self::empty();
            }
        };
        Self::load_from_str(&data)
    }

    pub fn load_from_str(data: &str) -> Self {
        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::Fields)
            .from_reader(data.as_bytes());

        let headers = match reader.headers() {
            Ok(h) => h.clone(),
            Err(err) => {
                warn!(error = %err, "CCADB CSV file could not be parsed");
                return Self::empty();
            }
        };

        let idx = |name: &str| headers.iter().position(|h| h == name);
        let (
            Some(idx_fingerprint),
            Some(idx_ski),
            Some(idx_record_type),
            Some(idx_tls),
            Some(idx_tls_ev),
            Some(idx_smime),
            Some(idx_codesigning),
        ) = (
            idx("SHA-256 Fingerprint"),
            idx("Subject Key Identifier"),
            idx("Certificate Record Type"),
            idx("TLS Capable"),
            idx("TLS EV Capable"),
            idx("S/MIME Capable"),
            idx("Code Signing Capable"),
        )
        else {
            warn!("CCADB CSV data is missing one or more expected headers");
            return Self::empty();
        };

        let mut by_fingerprint = FxHashMap::default();
        let mut by_key_identifier: FxHashMap<Vec<u8>, IssuerCapability> = FxHashMap::default();

        for record in reader.records() {
            let Ok(line) = record else {
                continue;
            };
            let greatest = [
                idx_fingerprint,
                idx_ski,
                idx_record_type,
                idx_tls,
                idx_tls_ev,
                idx_smime,
                idx_codesigning,
            ]
            .into_iter()
            .max()
            .unwrap_or(0);
            if line.len() <= greatest {
                warn!(line = ?line, "CCADB CSV line is missing one or more expected fields");
                continue;
            }

            let cap = IssuerCapability {
                record_type: RecordType::from(&line[idx_record_type]),
                tls_capable: &line[idx_tls] == "True",
                tls_ev_capable: &line[idx_tls_ev] == "True",
                smime_capable: &line[idx_smime] == "True",
                code_signing_capable: &line[idx_codesigning] == "True",
            };

            match hex::decode(&line[idx_fingerprint]) {
                Ok(bytes) if bytes.len() == 32 => {
                    let mut arr = [0u8; 32];
                    arr.copy_from_slice(&bytes);
                    by_fingerprint.insert(arr, cap.clone());
                }
                _ => {
                    warn!(value = %line[idx_fingerprint], "CCADB CSV fingerprint is not valid hex");
                }
            }

            let ski_key = line[idx_ski].as_bytes().to_vec();
            by_key_identifier
                .entry(ski_key)
                .and_modify(|existing| existing.merge_from(&cap))
                .or_insert(cap);
        }

        Self {
            by_fingerprint,
            by_key_identifier,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint_hex(fill: u8) -> String {
        hex::encode([fill; 32])
    }

    fn csv_fixture() -> String {
        format!(
            "SHA-256 Fingerprint,Subject Key Identifier,Certificate Record Type,TLS Capable,TLS EV Capable,S/MIME Capable,Code Signing Capable\n\
{},KEYID1,Root Certificate,True,True,False,False\n\
{},KEYID2,Intermediate Certificate,True,False,False,False\n\
{},KEYID2,Root Certificate,False,False,True,False\n",
            fingerprint_hex(0xAA),
            fingerprint_hex(0xBB),
            fingerprint_hex(0xCC),
        )
    }

    #[test]
    fn loads_fingerprint_and_key_identifier_entries() {
        let table = CcadbTable::load_from_str(&csv_fixture());
        let fp: [u8; 32] = [0xAA; 32];
        assert!(table.lookup_by_fingerprint(&fp).unwrap().tls_ev_capable);
    }

    #[test]
    fn key_identifier_collisions_merge_with_or_semantics_and_upgrade_to_root() {
        let table = CcadbTable::load_from_str(&csv_fixture());
        let merged = table.lookup_by_key_identifier(b"KEYID2").unwrap();
        assert_eq!(merged.record_type, RecordType::Root);
        assert!(merged.tls_capable);
        assert!(merged.smime_capable);
    }

    #[test]
    fn missing_file_yields_empty_table_not_an_error() {
        let table = CcadbTable::load_from_file(Path::new("/nonexistent/AllCertificateRecords.csv"));
        assert!(table.lookup_by_key_identifier(b"anything").is_none());
    }

    #[test]
    fn malformed_header_yields_empty_table() {
        let table = CcadbTable::load_from_str("not,the,right,headers\n1,2,3,4\n");
        assert!(table.lookup_by_key_identifier(b"anything").is_none());
    }
}
