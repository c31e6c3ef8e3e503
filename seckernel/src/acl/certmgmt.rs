//! Cert-management ACL: which certificate subtypes support which
//! cert-management message.

use lazy_static::lazy_static;
use seckernel_types::{KernelError, KernelResult, MessageKind, SubtypeA, SubtypeMask};

pub struct CertmgmtAclEntry {
    pub kind: MessageKind,
    pub legal_subtypes: SubtypeMask,
}

lazy_static! {
    pub static ref CERTMGMT_ACL: Vec<CertmgmtAclEntry> = vec![
        CertmgmtAclEntry {
            kind: MessageKind::CertSign,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE | SubtypeA::CERT_CRL),
        },
        CertmgmtAclEntry {
            kind: MessageKind::CertSigCheck,
            legal_subtypes: SubtypeMask::from_a(
                SubtypeA::CERT_CERTIFICATE | SubtypeA::CERT_CRL | SubtypeA::CERT_REVOCATION
            ),
        },
        CertmgmtAclEntry {
            kind: MessageKind::CertExport,
            legal_subtypes: SubtypeMask::from_a(
                SubtypeA::CERT_CERTIFICATE
                    | SubtypeA::CERT_REQUEST
                    | SubtypeA::CERT_REVOCATION
                    | SubtypeA::CERT_CRL,
            ),
        },
        CertmgmtAclEntry {
            kind: MessageKind::CertMgmt,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CERT_REQUEST),
        },
    ];
}

pub fn check(kind: MessageKind, subtype: SubtypeMask) -> KernelResult<()> {
    CERTMGMT_ACL
        .iter()
        .find(|e| e.kind == kind)
        .filter(|e| e.legal_subtypes.matches(subtype))
        .map(|_| ())
        .ok_or(KernelError::NotAvail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_request_cannot_be_signed() {
        let subtype = SubtypeMask::from_a(SubtypeA::CERT_REQUEST);
        assert_eq!(check(MessageKind::CertSign, subtype), Err(KernelError::NotAvail));
    }

    #[test]
    fn a_certificate_can_be_exported() {
        let subtype = SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE);
        assert!(check(MessageKind::CertExport, subtype).is_ok());
    }
}
