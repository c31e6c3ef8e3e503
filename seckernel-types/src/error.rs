//! The kernel's return-code vocabulary.
//!
//! Every fallible kernel operation returns `Result<T, KernelError>`. The
//! variants are a direct translation of the source's small-negative-integer
//! return codes; there is deliberately no "catch-all"
//! variant, since the whole point of the taxonomy is that callers can match
//! on it exhaustively.

/// Which argument position a caller-error return code blames.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ArgPosition {
    Object,
    Value,
    Num1,
    Num2,
    Str1,
    Str2,
}

#[derive(thiserror::Error, Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum KernelError {
    /// The requested action is not available for this object (permanently,
    /// e.g. `actionFlags` says `NOTAVAIL`).
    #[error("action not available")]
    NotAvail,

    /// The action is available but not to this caller at this access level.
    #[error("permission denied")]
    Permission,

    /// Object has not completed initialisation.
    #[error("object not initialised")]
    NotInited,

    /// Object has already completed initialisation.
    #[error("object already initialised")]
    Inited,

    /// Object was destroyed while the caller was waiting on it.
    #[error("object signalled (destroyed)")]
    Signalled,

    /// Object-wait loop exceeded its bound, or dispatcher recursion was
    /// too deep to queue.
    #[error("operation timed out")]
    Timeout,

    /// CSPRNG could not produce acceptable output (quality too low, or
    /// five retries exhausted).
    #[error("random number generation failed")]
    Random,

    /// Generic resource or handler failure.
    #[error("operation failed")]
    Failed,

    /// A destroy left residue (handler returned failure but the object was
    /// still removed from the table).
    #[error("destroy completed with residual state")]
    Incomplete,

    /// Allocation failed or a hard resource cap was hit.
    #[error("out of memory")]
    Memory,

    /// Malformed data (not a parameter-shape issue; `ArgError` covers those).
    #[error("bad data")]
    BadData,

    /// Dependent object / attribute / mechanism lookup failed.
    #[error("not found")]
    NotFound,

    /// Caller error on a specific argument position.
    #[error("bad argument: {0:?}")]
    ArgError(ArgPosition),
}

impl KernelError {
    pub fn arg(position: ArgPosition) -> Self {
        KernelError::ArgError(position)
    }
}

pub type KernelResult<T> = Result<T, KernelError>;

/// Dispatcher-internal sentinel: "the pre-dispatch check found the object in
/// an invalid state; rewrite the in-flight message to `DESTROY`". This must
/// never cross the crate boundary, so it lives in its own small
/// `pub(crate)`-friendly type in `seckernel`, not here. This type exists
/// only so that internal plumbing which narrows a richer outcome down to the
/// public `KernelError` has somewhere to express "not a real error".
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct OkSpecial;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_stable_for_logging() {
        assert_eq!(KernelError::Permission.to_string(), "permission denied");
        assert_eq!(
            KernelError::arg(ArgPosition::Num1).to_string(),
            "bad argument: Num1"
        );
    }
}
