//! tether-abi — boundary-level types for the tether bridging layer
//!
//! This crate defines the in-memory contract at the native boundary and
//! nothing else: the flat addressable byte space ([`BoundaryHeap`]), the
//! untagged 64-bit carrier every value crosses in ([`Word`]), the dynamic
//! host-language value form ([`HostValue`]), wrapper instance state
//! ([`Instance`]), and the shared error taxonomy ([`BridgeError`]).
//!
//! Conversion and invocation logic lives in `tether-bridge`; this crate is
//! deliberately dependency-light so native-side code can compile against it
//! alone.

pub mod error;
pub mod heap;
pub mod instance;
pub mod value;
pub mod word;

pub use error::{BridgeError, BridgeResult, HeapError};
pub use heap::BoundaryHeap;
pub use instance::{Instance, InstanceFlags, InstanceRef, Lifecycle};
pub use value::{HostBytes, HostFn, HostValue};
pub use word::Word;
