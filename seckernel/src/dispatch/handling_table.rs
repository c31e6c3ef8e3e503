//! Static per-message-kind properties the dispatcher consults before ever
//! touching an object: is this an action message (and if so, which action),
//! is it an attribute message, does it remain legal mid-shutdown.

use seckernel_types::{ActionKind, MessageKind};

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum AttributeOp {
    Get,
    Set,
    Delete,
}

pub fn action_of(kind: MessageKind) -> Option<ActionKind> {
    match kind {
        MessageKind::Encrypt => Some(ActionKind::Encrypt),
        MessageKind::Decrypt => Some(ActionKind::Decrypt),
        MessageKind::Sign => Some(ActionKind::Sign),
        MessageKind::SigCheck => Some(ActionKind::SigCheck),
        MessageKind::Hash => Some(ActionKind::Hash),
        MessageKind::GenKey => Some(ActionKind::GenKey),
        _ => None,
    }
}

pub fn attribute_op_of(kind: MessageKind) -> Option<AttributeOp> {
    match kind {
        MessageKind::GetAttribute | MessageKind::GetAttributeString => Some(AttributeOp::Get),
        MessageKind::SetAttribute | MessageKind::SetAttributeString => Some(AttributeOp::Set),
        MessageKind::DeleteAttribute => Some(AttributeOp::Delete),
        _ => None,
    }
}

/// Whether a message consumes a unit of `usage_count` on success (action
/// messages do; bookkeeping and attribute messages don't).
pub fn consumes_usage(kind: MessageKind) -> bool {
    action_of(kind).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encrypt_maps_to_the_encrypt_action() {
        assert_eq!(action_of(MessageKind::Encrypt), Some(ActionKind::Encrypt));
    }

    #[test]
    fn destroy_is_neither_an_action_nor_an_attribute_message() {
        assert_eq!(action_of(MessageKind::Destroy), None);
        assert_eq!(attribute_op_of(MessageKind::Destroy), None);
    }
}
