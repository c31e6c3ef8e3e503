//! Object type and subtype tags.
//!
//! The subtype representation deliberately stays a
//! bitmask pair, not a sum type, because the ACL tables do a cheap
//! mask-and against it. We keep two independent `bitflags!` words ("class A"
//! and "class B") exactly as the source's two subtype classes, and a
//! `SubtypeMask` pairing them so ACL table rows can express "legal on these
//! subtypes" with one value per class.

use bitflags::bitflags;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ObjectType {
    Context,
    Certificate,
    Keyset,
    Envelope,
    Session,
    Device,
    User,
}

bitflags! {
    /// Class-A subtype bits: context and certificate variants.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct SubtypeA: u32 {
        // Context subtypes.
        const CTX_CONV      = 0b0000_0001; // conventional (symmetric) cipher
        const CTX_PKC       = 0b0000_0010; // public-key
        const CTX_HASH      = 0b0000_0100;
        const CTX_MAC       = 0b0000_1000;

        // Certificate subtypes.
        const CERT_CERTIFICATE  = 0b0001_0000;
        const CERT_REQUEST      = 0b0010_0000;
        const CERT_REVOCATION   = 0b0100_0000;
        const CERT_CRL          = 0b1000_0000;
    }
}

bitflags! {
    /// Class-B subtype bits: keyset, envelope, session, device and user
    /// variants.
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct SubtypeB: u32 {
        const KEYSET_FILE     = 0b0000_0001;
        const KEYSET_DATABASE = 0b0000_0010;
        const KEYSET_LDAP     = 0b0000_0100;
        const KEYSET_HTTP     = 0b0000_1000;

        const ENVELOPE_DATA   = 0b0001_0000;
        const ENVELOPE_PGP    = 0b0010_0000;

        const SESSION_SSL     = 0b0100_0000;
        const SESSION_SSH     = 0b1000_0000;

        const DEVICE_SYSTEM   = 0b0001_0000_0000;
        const DEVICE_PKCS11   = 0b0010_0000_0000;
        const DEVICE_CRYPTOAPI = 0b0100_0000_0000;
        const DEVICE_FORTEZZA = 0b1000_0000_0000;

        const USER_NORMAL     = 0b0001_0000_0000_0000;
        const USER_SO         = 0b0010_0000_0000_0000;
    }
}

/// A two-word subtype mask, matching one or more subtype bits across either
/// class. An ACL row stores one of these per legal-subtype field; a
/// particular object's subtype lives entirely in one class (the default
/// user is the sole exception, simultaneously `USER_NORMAL` and `USER_SO`,
/// which still fits in one class).
#[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
pub struct SubtypeMask {
    pub class_a: SubtypeA,
    pub class_b: SubtypeB,
}

impl SubtypeMask {
    pub const NONE: SubtypeMask = SubtypeMask {
        class_a: SubtypeA::empty(),
        class_b: SubtypeB::empty(),
    };

    pub fn from_a(bits: SubtypeA) -> Self {
        SubtypeMask {
            class_a: bits,
            class_b: SubtypeB::empty(),
        }
    }

    pub fn from_b(bits: SubtypeB) -> Self {
        SubtypeMask {
            class_a: SubtypeA::empty(),
            class_b: bits,
        }
    }

    /// True iff `subtype` (which must itself be a power-of-two-populated
    /// value within one class) matches any bit this mask allows.
    pub fn matches(&self, subtype: SubtypeMask) -> bool {
        self.class_a.intersects(subtype.class_a) || self.class_b.intersects(subtype.class_b)
    }

    /// Invariant 2: a well-formed object subtype is a single set bit,
    /// entirely within one class.
    pub fn is_well_formed_single(&self) -> bool {
        match (self.class_a.bits().count_ones(), self.class_b.bits().count_ones()) {
            (1, 0) | (0, 1) => true,
            // The default user object is simultaneously USER_NORMAL and
            // USER_SO -- the one documented exception.
            (0, 2) => *self == SubtypeMask::from_b(SubtypeB::USER_NORMAL | SubtypeB::USER_SO),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_matches_by_class() {
        let acl_legal = SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_PKC);
        let obj = SubtypeMask::from_a(SubtypeA::CTX_CONV);
        assert!(acl_legal.matches(obj));

        let obj_hash = SubtypeMask::from_a(SubtypeA::CTX_HASH);
        assert!(!acl_legal.matches(obj_hash));
    }

    #[test]
    fn default_user_is_the_documented_dual_subtype_exception() {
        let default_user = SubtypeMask::from_b(SubtypeB::USER_NORMAL | SubtypeB::USER_SO);
        assert!(default_user.is_well_formed_single());

        let bogus = SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_HASH);
        assert!(!bogus.is_well_formed_single());
    }
}
