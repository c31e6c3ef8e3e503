//! Shared vocabulary for the security kernel: handles, object/subtype tags,
//! messages, attributes, action kinds, and the return-code taxonomy.
//!
//! This crate has no behaviour of its own -- see `seckernel` for the
//! reference monitor that gives these types meaning.

pub mod action;
pub mod attribute;
pub mod error;
pub mod handle;
pub mod message;
pub mod object_type;

pub use action::{AccessLevel, ActionKind, ActionPermissions};
pub use attribute::{AttrAccess, AttributeFlags, AttributeId, AttributeValueType};
pub use error::{ArgPosition, KernelError, KernelResult};
pub use handle::Handle;
pub use message::{Message, MessageData, MessageKind};
pub use object_type::{ObjectType, SubtypeA, SubtypeB, SubtypeMask};
