//! Mechanism ACL: which (action, mechanism) pairs are implemented at all.
//! Concrete algorithm bodies live outside this crate; this table only
//! answers "does the dispatcher even know this combination", so an
//! unimplemented mechanism fails fast with a clear error rather than
//! reaching a handler that doesn't exist.

use lazy_static::lazy_static;
use seckernel_types::{ActionKind, KernelError, KernelResult};

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MechanismId {
    Pkcs1,
    Oaep,
    Pss,
    Cbc,
    Cfb,
    Ofb,
    Ecb,
    HmacSha1,
    Pkcs5,
}

lazy_static! {
    static ref MECHANISM_ACL: Vec<(ActionKind, MechanismId)> = vec![
        (ActionKind::Encrypt, MechanismId::Cbc),
        (ActionKind::Encrypt, MechanismId::Cfb),
        (ActionKind::Encrypt, MechanismId::Ofb),
        (ActionKind::Encrypt, MechanismId::Ecb),
        (ActionKind::Encrypt, MechanismId::Oaep),
        (ActionKind::Decrypt, MechanismId::Cbc),
        (ActionKind::Decrypt, MechanismId::Cfb),
        (ActionKind::Decrypt, MechanismId::Ofb),
        (ActionKind::Decrypt, MechanismId::Ecb),
        (ActionKind::Decrypt, MechanismId::Oaep),
        (ActionKind::Sign, MechanismId::Pkcs1),
        (ActionKind::Sign, MechanismId::Pss),
        (ActionKind::SigCheck, MechanismId::Pkcs1),
        (ActionKind::SigCheck, MechanismId::Pss),
        (ActionKind::Hash, MechanismId::HmacSha1),
        (ActionKind::GenKey, MechanismId::Pkcs5),
    ];
}

pub fn is_implemented(action: ActionKind, mechanism: MechanismId) -> bool {
    MECHANISM_ACL.iter().any(|(a, m)| *a == action && *m == mechanism)
}

pub fn check(action: ActionKind, mechanism: MechanismId) -> KernelResult<()> {
    if is_implemented(action, mechanism) {
        Ok(())
    } else {
        Err(KernelError::NotAvail)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ecb_is_not_a_signature_mechanism() {
        assert!(!is_implemented(ActionKind::Sign, MechanismId::Ecb));
        assert_eq!(check(ActionKind::Sign, MechanismId::Ecb), Err(KernelError::NotAvail));
    }

    #[test]
    fn pkcs1_signing_is_implemented() {
        assert!(is_implemented(ActionKind::Sign, MechanismId::Pkcs1));
    }
}
