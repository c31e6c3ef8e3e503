//! Attribute ACL: which attributes are legal on which object subtypes, what
//! access each corner of (internal/external x low/high state) grants, and
//! the range or allowed-value check each attribute's value must pass.

use lazy_static::lazy_static;
use seckernel_types::{
    AttrAccess, AttributeFlags, AttributeId, AttributeValueType, KernelError, KernelResult,
    SubtypeA, SubtypeB, SubtypeMask,
};

/// A value-range constraint, checked after the type check.
#[derive(Clone, Debug)]
pub enum RangeCheck {
    None,
    Boolean,
    Numeric { min: i64, max: i64 },
    Length { min: usize, max: usize },
    Time,
    /// The value must match one of a small set of exact lengths or codes.
    AllowedValues(&'static [i64]),
    /// Composite check: the value must fall within `[min, max]` *and*
    /// match one of `allowed` -- used for attributes whose legal values are
    /// a numeric range plus a handful of special out-of-range sentinels
    /// (the attribute-group cursor's negative movement codes alongside its
    /// positive extension-id range).
    SubrangeAndAllowed {
        min: i64,
        max: i64,
        allowed: &'static [i64],
    },
}

impl RangeCheck {
    pub fn check_numeric(&self, value: i64) -> bool {
        match self {
            RangeCheck::None => true,
            RangeCheck::Boolean => value == 0 || value == 1,
            RangeCheck::Numeric { min, max } => value >= *min && value <= *max,
            RangeCheck::Time => value >= 0,
            RangeCheck::AllowedValues(allowed) => allowed.contains(&value),
            RangeCheck::SubrangeAndAllowed { min, max, allowed } => {
                (value >= *min && value <= *max) || allowed.contains(&value)
            }
            RangeCheck::Length { .. } => true,
        }
    }

    pub fn check_length(&self, len: usize) -> bool {
        match self {
            RangeCheck::Length { min, max } => len >= *min && len <= *max,
            RangeCheck::AllowedValues(allowed) => allowed.contains(&(len as i64)),
            _ => true,
        }
    }
}

/// One (internal/external x low/high-state) corner's grant for one
/// attribute.
#[derive(Copy, Clone, Debug, Default)]
pub struct AccessCorners {
    pub ext_low: AttrAccess,
    pub ext_high: AttrAccess,
    pub int_low: AttrAccess,
    pub int_high: AttrAccess,
}

impl AccessCorners {
    pub fn for_caller(&self, internal: bool, high_state: bool) -> AttrAccess {
        match (internal, high_state) {
            (false, false) => self.ext_low,
            (false, true) => self.ext_high,
            (true, false) => self.int_low,
            (true, true) => self.int_high,
        }
    }
}

pub struct AttributeAclEntry {
    pub id: AttributeId,
    pub legal_subtypes: SubtypeMask,
    pub value_type: AttributeValueType,
    pub flags: AttributeFlags,
    pub access: AccessCorners,
    pub range: RangeCheck,
}

lazy_static! {
    pub static ref ATTRIBUTE_ACL: Vec<AttributeAclEntry> = build_table();
}

fn all_contexts() -> SubtypeMask {
    SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_PKC | SubtypeA::CTX_HASH | SubtypeA::CTX_MAC)
}

fn build_table() -> Vec<AttributeAclEntry> {
    use AttributeValueType as T;
    let rw_ext_low = AttrAccess::READ | AttrAccess::WRITE | AttrAccess::DELETE;
    let r_only = AttrAccess::READ;
    let none = AttrAccess::empty();

    vec![
        AttributeAclEntry {
            id: AttributeId::Status,
            legal_subtypes: all_contexts(),
            value_type: T::Boolean,
            flags: AttributeFlags::TRIGGER,
            access: AccessCorners {
                ext_low: AttrAccess::WRITE,
                ext_high: r_only,
                int_low: rw_ext_low,
                int_high: r_only,
            },
            range: RangeCheck::Boolean,
        },
        AttributeAclEntry {
            id: AttributeId::Key,
            legal_subtypes: all_contexts(),
            value_type: T::ByteString,
            flags: AttributeFlags::TRIGGER,
            access: AccessCorners {
                ext_low: AttrAccess::WRITE,
                ext_high: none,
                int_low: rw_ext_low,
                int_high: none,
            },
            range: RangeCheck::Length { min: 8, max: 512 },
        },
        AttributeAclEntry {
            id: AttributeId::Mode,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_CONV),
            value_type: T::Numeric,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: r_only,
                int_low: rw_ext_low,
                int_high: r_only,
            },
            range: RangeCheck::Numeric { min: 0, max: 4 },
        },
        AttributeAclEntry {
            id: AttributeId::KeyingIterations,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CTX_CONV | SubtypeA::CTX_MAC),
            value_type: T::Numeric,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: r_only,
                int_low: rw_ext_low,
                int_high: r_only,
            },
            range: RangeCheck::Numeric { min: 1, max: 20_000 },
        },
        AttributeAclEntry {
            id: AttributeId::ForwardCount,
            legal_subtypes: all_contexts(),
            value_type: T::Numeric,
            flags: AttributeFlags::PROPERTY,
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: rw_ext_low,
                int_low: rw_ext_low,
                int_high: rw_ext_low,
            },
            range: RangeCheck::Numeric { min: 0, max: i64::MAX },
        },
        AttributeAclEntry {
            id: AttributeId::UsageCount,
            legal_subtypes: all_contexts(),
            value_type: T::Numeric,
            flags: AttributeFlags::PROPERTY,
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: rw_ext_low,
                int_low: rw_ext_low,
                int_high: rw_ext_low,
            },
            range: RangeCheck::Numeric { min: 0, max: i64::MAX },
        },
        AttributeAclEntry {
            id: AttributeId::HighSecurity,
            legal_subtypes: all_contexts(),
            value_type: T::Boolean,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: AttrAccess::WRITE,
                ext_high: none,
                int_low: rw_ext_low,
                int_high: none,
            },
            range: RangeCheck::Boolean,
        },
        AttributeAclEntry {
            id: AttributeId::SubjectAltName,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE | SubtypeA::CERT_REQUEST),
            value_type: T::SpecialAcl,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: r_only,
                int_low: rw_ext_low,
                int_high: r_only,
            },
            range: RangeCheck::None,
        },
        AttributeAclEntry {
            id: AttributeId::IpAddress,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE | SubtypeA::CERT_REQUEST),
            value_type: T::ByteString,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: r_only,
                int_low: rw_ext_low,
                int_high: r_only,
            },
            // Exactly 4 bytes (IPv4) or 16 bytes (IPv6); nothing in between
            // is a legal encoding.
            range: RangeCheck::AllowedValues(&[4, 16]),
        },
        AttributeAclEntry {
            id: AttributeId::CurrentGroup,
            legal_subtypes: SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE | SubtypeA::CERT_REQUEST),
            value_type: T::Numeric,
            flags: AttributeFlags::RETRIGGERABLE,
            access: AccessCorners {
                ext_low: rw_ext_low,
                ext_high: rw_ext_low,
                int_low: rw_ext_low,
                int_high: rw_ext_low,
            },
            // Positive values select an extension id directly; a handful of
            // small negative values are cursor-movement codes (first, next,
            // previous, last).
            range: RangeCheck::SubrangeAndAllowed {
                min: 0,
                max: 10_000,
                allowed: &[-4, -3, -2, -1],
            },
        },
        AttributeAclEntry {
            id: AttributeId::Entropy,
            legal_subtypes: SubtypeMask::from_b(SubtypeB::DEVICE_SYSTEM),
            value_type: T::ByteString,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: AttrAccess::WRITE,
                ext_high: AttrAccess::WRITE,
                int_low: AttrAccess::WRITE,
                int_high: AttrAccess::WRITE,
            },
            range: RangeCheck::Length { min: 1, max: 1 << 16 },
        },
        AttributeAclEntry {
            id: AttributeId::EntropyQuality,
            legal_subtypes: SubtypeMask::from_b(SubtypeB::DEVICE_SYSTEM),
            value_type: T::Numeric,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: AttrAccess::WRITE,
                ext_high: AttrAccess::WRITE,
                int_low: AttrAccess::WRITE,
                int_high: AttrAccess::WRITE,
            },
            range: RangeCheck::Numeric { min: 1, max: 100 },
        },
        AttributeAclEntry {
            id: AttributeId::Random,
            legal_subtypes: SubtypeMask::from_b(SubtypeB::DEVICE_SYSTEM),
            value_type: T::ByteString,
            flags: AttributeFlags::empty(),
            access: AccessCorners {
                ext_low: r_only,
                ext_high: r_only,
                int_low: r_only,
                int_high: r_only,
            },
            range: RangeCheck::Length { min: 1, max: 1 << 16 },
        },
    ]
}

pub fn lookup(id: AttributeId) -> &'static AttributeAclEntry {
    ATTRIBUTE_ACL
        .iter()
        .find(|e| e.id == id)
        .expect("every AttributeId has a table row")
}

/// Check that `caller` (internal/external, against an object currently in
/// `high_state`, with the given `subtype`) may perform `access` on `id`.
pub fn check_access(
    id: AttributeId,
    subtype: SubtypeMask,
    internal: bool,
    high_state: bool,
    access: AttrAccess,
) -> KernelResult<()> {
    let entry = lookup(id);
    if !entry.legal_subtypes.matches(subtype) {
        return Err(KernelError::NotAvail);
    }
    let granted = entry.access.for_caller(internal, high_state);
    if granted.contains(access) {
        Ok(())
    } else {
        Err(KernelError::Permission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_is_write_only_externally_before_init() {
        let subtype = SubtypeMask::from_a(SubtypeA::CTX_CONV);
        assert!(check_access(AttributeId::Status, subtype, false, false, AttrAccess::WRITE).is_ok());
        assert!(check_access(AttributeId::Status, subtype, false, false, AttrAccess::READ).is_err());
    }

    #[test]
    fn wrong_subtype_is_not_available_not_a_permission_error() {
        let subtype = SubtypeMask::from_a(SubtypeA::CERT_CERTIFICATE);
        assert_eq!(
            check_access(AttributeId::Mode, subtype, true, false, AttrAccess::READ),
            Err(KernelError::NotAvail)
        );
    }

    #[test]
    fn ip_address_length_must_be_four_or_sixteen() {
        let entry = lookup(AttributeId::IpAddress);
        assert!(entry.range.check_length(4));
        assert!(entry.range.check_length(16));
        assert!(!entry.range.check_length(5));
    }

    #[test]
    fn current_group_accepts_subrange_or_movement_code() {
        let entry = lookup(AttributeId::CurrentGroup);
        assert!(entry.range.check_numeric(42));
        assert!(entry.range.check_numeric(-1));
        assert!(!entry.range.check_numeric(-5));
    }
}
