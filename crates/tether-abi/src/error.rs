//! Error types for the tether boundary ABI

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Errors raised by boundary heap access
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HeapError {
    /// Access outside the heap's addressable range
    #[error("Heap access out of bounds: offset {offset} len {len} (capacity {capacity})")]
    OutOfBounds {
        /// Offset of the attempted access
        offset: u32,
        /// Length of the attempted access
        len: u32,
        /// Heap capacity
        capacity: u32,
    },

    /// Access not aligned to the access width
    #[error("Misaligned heap access: offset {offset} requires {align}-byte alignment")]
    Misaligned {
        /// Offset of the attempted access
        offset: u32,
        /// Required alignment
        align: u32,
    },

    /// A scratch region (stack or pool) is exhausted
    #[error("Heap region exhausted: {region} (requested {requested} bytes)")]
    RegionExhausted {
        /// Region name ("stack", "pool", "data")
        region: &'static str,
        /// Requested allocation size
        requested: u32,
    },

    /// Bytes at the given offset are not valid UTF-8
    #[error("Invalid UTF-8 in boundary string at offset {0}")]
    InvalidUtf8(u32),
}

/// Bridge error taxonomy.
///
/// All variants are synchronous programmer/usage errors raised at the point
/// of detection; none are transient or retried.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BridgeError {
    /// Host value shape doesn't match the expected wire type on write
    #[error("Type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        /// Expected type name
        expected: String,
        /// Actual value description
        got: String,
    },

    /// Mutable operation attempted through a const-flagged reference
    #[error("Const violation: {0}")]
    ConstViolation(String),

    /// Type id or name absent from the registry — fatal to the call being built
    #[error("Unknown wire type: {0}")]
    UnknownType(String),

    /// Class id or name absent from the registry
    #[error("Unknown class: {0}")]
    UnknownClass(String),

    /// No overload registered for the given argument count
    #[error("No matching overload for '{name}' with {arity} argument(s)")]
    NoMatchingOverload {
        /// Bound name
        name: String,
        /// Runtime argument count
        arity: usize,
    },

    /// Access to pointer/shared-handle fields of a deleted instance
    #[error("Use after free: {0}")]
    UseAfterFree(String),

    /// A value-object read conversion needed a host class that was never registered
    #[error("No value class registered for '{0}'")]
    MissingValueClass(String),

    /// Slot handle not present in the callback/external table
    #[error("Invalid slot handle: {0}")]
    BadHandle(u32),

    /// Duplicate registration under an already-taken id or name
    #[error("Duplicate registration: {0}")]
    DuplicateRegistration(String),

    /// Boundary heap access failure
    #[error(transparent)]
    Heap(#[from] HeapError),

    /// Failure reported by a native entry point
    #[error("Native call failed: {0}")]
    NativeError(String),
}

impl BridgeError {
    /// Build a `TypeMismatch` from an expected type name and an actual value description.
    pub fn mismatch(expected: impl Into<String>, got: impl Into<String>) -> Self {
        BridgeError::TypeMismatch {
            expected: expected.into(),
            got: got.into(),
        }
    }
}
