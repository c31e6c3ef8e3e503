//! The message: the one primitive visible across the kernel boundary.
//!
//! Messages are the only primitive visible across the
//! boundary. Each is a 4-tuple (handle, kind, data-pointer-or-null,
//! small-integer)." `Message` is that 4-tuple; `target` is carried alongside
//! it rather than inside it purely so the dispatcher can match on `kind`
//! without destructuring a handle out of every arm.

use crate::attribute::AttributeId;
use crate::handle::Handle;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum MessageKind {
    Destroy,
    IncRefCount,
    DecRefCount,
    GetDependent,
    SetDependent,
    Clone,

    GetAttribute,
    SetAttribute,
    DeleteAttribute,
    GetAttributeString,
    SetAttributeString,

    Compare,
    Check,

    Encrypt,
    Decrypt,
    Sign,
    SigCheck,
    Hash,
    GenKey,
    GenIv,

    CertSign,
    CertSigCheck,
    CertExport,

    DeviceQueryCapability,
    DeviceExport,
    DeviceImport,
    DeviceSign,
    DeviceSigCheck,
    DeviceDerive,
    DeviceCreateObject,
    DeviceCreateObjectIndirect,

    EnvPushData,
    EnvPopData,

    KeysetGetKey,
    KeysetSetKey,
    KeysetDeleteKey,
    KeysetGetFirstCert,
    KeysetGetNextCert,

    CertMgmt,
}

impl MessageKind {
    /// Destroy, refcount, and status-read messages remain valid even after
    /// the kernel has begun shutting down.
    pub fn survives_shutdown(self) -> bool {
        matches!(
            self,
            MessageKind::Destroy
                | MessageKind::IncRefCount
                | MessageKind::DecRefCount
                | MessageKind::GetAttribute
        )
    }
}

/// The payload carried alongside a message's small integer `value`. Most
/// messages carry no buffer at all; `Bytes` covers key material, wrapped
/// blobs, and string attributes, while object-handle-typed attributes are
/// carried directly in `value` rather than boxed up as a buffer.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub enum MessageData {
    #[default]
    None,
    Bytes(Vec<u8>),
}

#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Message {
    pub target: Handle,
    pub kind: MessageKind,
    pub data: MessageData,
    pub value: i32,
    /// Which attribute a `{Get,Set,Delete}Attribute{,String}` message
    /// addresses. Unused (and ignored) by every other message kind.
    pub attribute: Option<AttributeId>,
    /// Set by internal (kernel-issued) callers; grants access to
    /// internal-only objects and attributes.
    pub internal: bool,
}

impl Message {
    pub fn new(target: Handle, kind: MessageKind) -> Self {
        Message {
            target,
            kind,
            data: MessageData::None,
            value: 0,
            attribute: None,
            internal: false,
        }
    }

    pub fn with_value(mut self, value: i32) -> Self {
        self.value = value;
        self
    }

    pub fn with_bytes(mut self, bytes: Vec<u8>) -> Self {
        self.data = MessageData::Bytes(bytes);
        self
    }

    pub fn with_attribute(mut self, attribute: AttributeId) -> Self {
        self.attribute = Some(attribute);
        self
    }

    pub fn internal(mut self) -> Self {
        self.internal = true;
        self
    }
}
