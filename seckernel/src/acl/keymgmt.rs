//! Key-management ACL: which keyset subtypes support which key-management
//! message, and whether the operation is available to an external caller at
//! all (key material rarely is, outside of explicit get/set).

use lazy_static::lazy_static;
use seckernel_types::{KernelError, KernelResult, MessageKind, SubtypeB, SubtypeMask};

pub struct KeymgmtAclEntry {
    pub kind: MessageKind,
    pub legal_subtypes: SubtypeMask,
    pub external_permitted: bool,
}

lazy_static! {
    pub static ref KEYMGMT_ACL: Vec<KeymgmtAclEntry> = vec![
        KeymgmtAclEntry {
            kind: MessageKind::KeysetGetKey,
            legal_subtypes: all_keysets(),
            external_permitted: true,
        },
        KeymgmtAclEntry {
            kind: MessageKind::KeysetSetKey,
            legal_subtypes: all_keysets(),
            external_permitted: true,
        },
        KeymgmtAclEntry {
            kind: MessageKind::KeysetDeleteKey,
            legal_subtypes: all_keysets(),
            external_permitted: true,
        },
        KeymgmtAclEntry {
            kind: MessageKind::KeysetGetFirstCert,
            legal_subtypes: all_keysets(),
            external_permitted: true,
        },
        KeymgmtAclEntry {
            kind: MessageKind::KeysetGetNextCert,
            legal_subtypes: all_keysets(),
            external_permitted: true,
        },
    ];
}

fn all_keysets() -> SubtypeMask {
    SubtypeMask::from_b(
        SubtypeB::KEYSET_FILE | SubtypeB::KEYSET_DATABASE | SubtypeB::KEYSET_LDAP | SubtypeB::KEYSET_HTTP,
    )
}

pub fn check(kind: MessageKind, subtype: SubtypeMask, caller_is_external: bool) -> KernelResult<()> {
    let entry = KEYMGMT_ACL
        .iter()
        .find(|e| e.kind == kind)
        .ok_or(KernelError::NotAvail)?;
    if !entry.legal_subtypes.matches(subtype) {
        return Err(KernelError::NotAvail);
    }
    if caller_is_external && !entry.external_permitted {
        return Err(KernelError::Permission);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_a_non_keyset_subtype() {
        let subtype = SubtypeMask::from_a(seckernel_types::SubtypeA::CTX_CONV);
        assert_eq!(
            check(MessageKind::KeysetGetKey, subtype, false),
            Err(KernelError::NotAvail)
        );
    }

    #[test]
    fn accepts_any_keyset_backend() {
        let subtype = SubtypeMask::from_b(SubtypeB::KEYSET_LDAP);
        assert!(check(MessageKind::KeysetGetKey, subtype, true).is_ok());
    }
}
