//! HostValue — the dynamic host-language value form
//!
//! Every value entering or leaving the bridge on the host side is a
//! `HostValue`. Wire types convert between this form and boundary `Word`s.
//! 64-bit integers are carried exactly; conversions never round-trip through
//! a lossy host numeric type.

use std::cell::RefCell;
use std::rc::Rc;

use crate::error::BridgeResult;
use crate::instance::InstanceRef;

/// A host-side callback invocable from native code via a slot handle.
pub type HostFn = Rc<dyn Fn(&[HostValue]) -> BridgeResult<HostValue>>;

/// Shared, mutable host byte buffer. Shared so a native-side commit can copy
/// boundary-resident bytes back into the buffer the host still holds.
pub type HostBytes = Rc<RefCell<Vec<u8>>>;

/// Dynamic host-language value.
#[derive(Clone)]
pub enum HostValue {
    /// Absent / null
    Null,
    /// Boolean
    Bool(bool),
    /// Signed integer (up to 64 bits, exact)
    Int(i64),
    /// Unsigned integer (up to 64 bits, exact)
    UInt(u64),
    /// Double-precision float
    Float(f64),
    /// UTF-8 string
    Str(String),
    /// Mutable byte buffer
    Bytes(HostBytes),
    /// Ordered list of values
    List(Vec<HostValue>),
    /// Wrapped native class instance
    Instance(InstanceRef),
    /// Host function (callback)
    Callable(HostFn),
}

impl HostValue {
    /// Wrap a byte vector as a host buffer
    pub fn bytes(data: Vec<u8>) -> Self {
        HostValue::Bytes(Rc::new(RefCell::new(data)))
    }

    /// Wrap a closure as a host callback
    pub fn callable<F>(f: F) -> Self
    where
        F: Fn(&[HostValue]) -> BridgeResult<HostValue> + 'static,
    {
        HostValue::Callable(Rc::new(f))
    }

    /// Type name for error messages
    pub fn type_name(&self) -> &'static str {
        match self {
            HostValue::Null => "null",
            HostValue::Bool(_) => "bool",
            HostValue::Int(_) => "int",
            HostValue::UInt(_) => "uint",
            HostValue::Float(_) => "float",
            HostValue::Str(_) => "string",
            HostValue::Bytes(_) => "bytes",
            HostValue::List(_) => "list",
            HostValue::Instance(_) => "instance",
            HostValue::Callable(_) => "callable",
        }
    }

    /// True for null (the falsy sentinel the Nullable policy maps to zero)
    pub fn is_null(&self) -> bool {
        matches!(self, HostValue::Null)
    }

    /// Extract a signed integer, accepting any exact numeric representation
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            HostValue::Int(v) => Some(*v),
            HostValue::UInt(v) => i64::try_from(*v).ok(),
            HostValue::Bool(b) => Some(*b as i64),
            _ => None,
        }
    }

    /// Extract an unsigned integer
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            HostValue::UInt(v) => Some(*v),
            HostValue::Int(v) => u64::try_from(*v).ok(),
            HostValue::Bool(b) => Some(*b as u64),
            _ => None,
        }
    }

    /// Extract a float, widening exact integers
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            HostValue::Float(v) => Some(*v),
            HostValue::Int(v) => Some(*v as f64),
            HostValue::UInt(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            HostValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract a string slice
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HostValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Extract a list slice
    pub fn as_list(&self) -> Option<&[HostValue]> {
        match self {
            HostValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Extract an instance reference
    pub fn as_instance(&self) -> Option<&InstanceRef> {
        match self {
            HostValue::Instance(inst) => Some(inst),
            _ => None,
        }
    }
}

impl PartialEq for HostValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (HostValue::Null, HostValue::Null) => true,
            (HostValue::Bool(a), HostValue::Bool(b)) => a == b,
            (HostValue::Int(a), HostValue::Int(b)) => a == b,
            (HostValue::UInt(a), HostValue::UInt(b)) => a == b,
            (HostValue::Float(a), HostValue::Float(b)) => a == b,
            (HostValue::Str(a), HostValue::Str(b)) => a == b,
            (HostValue::Bytes(a), HostValue::Bytes(b)) => *a.borrow() == *b.borrow(),
            (HostValue::List(a), HostValue::List(b)) => a == b,
            // Identity comparison for instances and callables
            (HostValue::Instance(a), HostValue::Instance(b)) => Rc::ptr_eq(a, b),
            (HostValue::Callable(a), HostValue::Callable(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl std::fmt::Debug for HostValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostValue::Null => write!(f, "Null"),
            HostValue::Bool(v) => write!(f, "Bool({v})"),
            HostValue::Int(v) => write!(f, "Int({v})"),
            HostValue::UInt(v) => write!(f, "UInt({v})"),
            HostValue::Float(v) => write!(f, "Float({v})"),
            HostValue::Str(v) => write!(f, "Str({v:?})"),
            HostValue::Bytes(v) => write!(f, "Bytes(len={})", v.borrow().len()),
            HostValue::List(v) => f.debug_tuple("List").field(v).finish(),
            HostValue::Instance(v) => {
                write!(f, "Instance({})", v.borrow().class_name())
            }
            HostValue::Callable(_) => write!(f, "Callable"),
        }
    }
}
