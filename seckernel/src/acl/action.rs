//! Action ACL: which object subtypes an action kind even makes sense on,
//! independent of the per-object `ActionPermissions` grant an individual
//! object carries (that part lives on `ObjectRecord` itself).

use lazy_static::lazy_static;
use seckernel_types::{ActionKind, KernelError, KernelResult, SubtypeA, SubtypeMask};

pub struct ActionAclEntry {
    pub kind: ActionKind,
    pub legal_subtypes: SubtypeMask,
}

lazy_static! {
    pub static ref ACTION_ACL: Vec<ActionAclEntry> = vec![
        ActionAclEntry {
            kind: ActionKind::Encrypt,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_PKC),
        },
        ActionAclEntry {
            kind: ActionKind::Decrypt,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_PKC),
        },
        ActionAclEntry {
            kind: ActionKind::Sign,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_PKC),
        },
        ActionAclEntry {
            kind: ActionKind::SigCheck,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_PKC),
        },
        ActionAclEntry {
            kind: ActionKind::Hash,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_HASH | SubtypeA::CTX_MAC),
        },
        ActionAclEntry {
            kind: ActionKind::GenKey,
            legal_subtypes: SubtypeMask::from_a(
                SubtypeA::CTX_CONV | SubtypeA::CTX_PKC | SubtypeA::CTX_MAC
            ),
        },
    ];
}

pub fn legal_on(kind: ActionKind, subtype: SubtypeMask) -> bool {
    ACTION_ACL
        .iter()
        .find(|e| e.kind == kind)
        .map(|e| e.legal_subtypes.matches(subtype))
        .unwrap_or(false)
}

/// Combines the static legality check with an object's own granted access
/// level. Callers still need to separately check `usage_count`/`forward_count`.
pub fn check_action(
    kind: ActionKind,
    subtype: SubtypeMask,
    granted: seckernel_types::AccessLevel,
    caller_is_external: bool,
) -> KernelResult<()> {
    if !legal_on(kind, subtype) {
        return Err(KernelError::NotAvail);
    }
    if granted.permits(caller_is_external) {
        Ok(())
    } else {
        Err(KernelError::Permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seckernel_types::AccessLevel;

    #[test]
    fn hash_is_not_legal_on_a_conventional_cipher_context() {
        let subtype = SubtypeMask::from_a(SubtypeA::CTX_CONV);
        assert!(!legal_on(ActionKind::Hash, subtype));
    }

    #[test]
    fn internal_only_grant_blocks_an_external_caller() {
        let subtype = SubtypeMask::from_a(SubtypeA::CTX_PKC);
        let result = check_action(ActionKind::Sign, subtype, AccessLevel::InternalOnly, true);
        assert_eq!(result, Err(KernelError::Permission));
    }
}
