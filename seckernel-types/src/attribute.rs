//! Attribute identifiers and the value-type/flag vocabulary the attribute
//! ACL is keyed on.
//!
//! The source defines on the order of a hundred and fifty attributes; this
//! is a representative subset covering every attribute the worked examples
//! and kernel self-tests actually exercise, plus the handful the CSPRNG
//! needs. Adding another attribute is adding one more `AttributeId` variant
//! and one more row to `seckernel::acl::attribute::ATTRIBUTE_ACL` -- the
//! representation does not special-case any particular attribute.

use bitflags::bitflags;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum AttributeId {
    /// Write `Ok` to move an object out of `not-initialised`.
    Status,
    /// Key material. Trigger attribute for contexts.
    Key,
    /// Block cipher mode (ECB/CBC/CFB/OFB).
    Mode,
    /// Password-based key derivation iteration count.
    KeyingIterations,
    /// Remaining permitted ownership transfers.
    ForwardCount,
    /// Remaining permitted uses.
    UsageCount,
    /// Write `true` to lock `ForwardCount` from further reads or writes.
    HighSecurity,
    /// Certificate extension container.
    SubjectAltName,
    /// IP address alternative name (exactly 4 or exactly 16 bytes).
    IpAddress,
    /// Cursor-movement code (negative) or extension id (positive) selecting
    /// the "current" entry in a multi-valued attribute group.
    CurrentGroup,
    /// Raw entropy bytes fed to the CSPRNG pool.
    Entropy,
    /// Caller's quality claim (1-100) for the bytes just added.
    EntropyQuality,
    /// Output: random bytes drawn from the CSPRNG.
    Random,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum AttributeValueType {
    Boolean,
    Numeric,
    ObjectHandle,
    ByteString,
    WideString,
    Time,
    /// Dispatches to a nested, subtype-specific ACL (e.g. certificate
    /// extensions) instead of a flat range.
    SpecialAcl,
}

bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct AttributeFlags: u8 {
        /// A successful write moves the object from low to high state.
        const TRIGGER  = 0b0000_0001;
        /// Kernel-owned (refcount, locked, forward-count): read-only to
        /// external callers, never user-settable from scratch.
        const PROPERTY = 0b0000_0010;
        /// May still be rewritten after the object reaches high state
        /// (the one exception to "high state locks security attributes").
        const RETRIGGERABLE = 0b0000_0100;
    }
}

/// Read/write/delete access granted at one (caller-internality x
/// object-state) corner of the attribute access matrix.
bitflags! {
    #[derive(Copy, Clone, Eq, PartialEq, Debug, Default)]
    pub struct AttrAccess: u8 {
        const READ   = 0b001;
        const WRITE  = 0b010;
        const DELETE = 0b100;
    }
}
