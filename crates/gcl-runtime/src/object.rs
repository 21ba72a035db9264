//! Heap object payloads

use std::fmt;
use std::mem;
use std::rc::Rc;

use gcl_gc::{GcTraceable, ObjectId};

use crate::env::Env;
use crate::value::{Value, ValueType};

/// Arguments of a native function call
#[derive(Debug, Clone, Copy)]
pub struct CallInfo<'a> {
    /// Receiver (`this`)
    pub this: &'a Value,
    /// Positional arguments
    pub args: &'a [Value],
}

impl CallInfo<'_> {
    /// Argument at `index`, `undefined` when missing
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    /// Number of arguments actually passed
    pub fn len(&self) -> usize {
        self.args.len()
    }

    /// Whether no arguments were passed
    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }
}

/// Native function body. `Err` carries the thrown value.
pub type NativeFn = dyn Fn(&Env, &CallInfo<'_>) -> Result<Value, Value>;

/// Callable object
#[derive(Clone)]
pub struct Function {
    name: Rc<str>,
    call: Rc<NativeFn>,
}

impl Function {
    pub(crate) fn new(name: &str, call: Rc<NativeFn>) -> Self {
        Self {
            name: Rc::from(name),
            call,
        }
    }

    /// Function name
    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn body(&self) -> Rc<NativeFn> {
        Rc::clone(&self.call)
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function").field("name", &self.name).finish()
    }
}

/// Error constructor family
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// `Error`
    Error,
    /// `TypeError`
    TypeError,
    /// `RangeError`
    RangeError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Error => "Error",
            Self::TypeError => "TypeError",
            Self::RangeError => "RangeError",
        };
        f.write_str(name)
    }
}

/// Error object
#[derive(Debug, Clone)]
pub struct ErrorObject {
    /// Constructor family
    pub kind: ErrorKind,
    /// Message
    pub message: Rc<str>,
}

/// Heap payload of every object the environment allocates
#[derive(Debug)]
pub enum JsObject {
    /// Ordinary object with named properties
    Plain(Vec<(Rc<str>, Value)>),
    /// Native function
    Function(Function),
    /// Error instance
    Error(ErrorObject),
}

impl JsObject {
    /// `typeof` of this object
    pub fn type_of(&self) -> ValueType {
        match self {
            Self::Function(_) => ValueType::Function,
            Self::Plain(_) | Self::Error(_) => ValueType::Object,
        }
    }

    pub(crate) fn property(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Plain(props) => props.iter().find(|(k, _)| &**k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub(crate) fn set_property(&mut self, key: &str, value: Value) -> bool {
        let Self::Plain(props) = self else {
            return false;
        };
        match props.iter_mut().find(|(k, _)| &**k == key) {
            Some((_, slot)) => *slot = value,
            None => props.push((Rc::from(key), value)),
        }
        true
    }
}

impl GcTraceable for JsObject {
    fn trace(&self, tracer: &mut dyn FnMut(ObjectId)) {
        // Function bodies and errors hold no managed values.
        if let Self::Plain(props) = self {
            for id in props.iter().filter_map(|(_, v)| v.as_object()) {
                tracer(id);
            }
        }
    }

    fn external_size(&self) -> usize {
        match self {
            Self::Plain(props) => props.len() * mem::size_of::<(Rc<str>, Value)>(),
            Self::Function(f) => f.name.len(),
            Self::Error(e) => e.message.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_object_traces_object_properties() {
        let mut heap = gcl_gc::Heap::new();
        let child = heap.alloc(JsObject::Plain(Vec::new())).unwrap();

        let mut obj = JsObject::Plain(Vec::new());
        assert!(obj.set_property("n", Value::Number(1.0)));
        assert!(obj.set_property("child", Value::Object(child)));

        let mut traced = Vec::new();
        obj.trace(&mut |id| traced.push(id));
        assert_eq!(traced, vec![child]);
        assert_eq!(obj.property("n"), Some(&Value::Number(1.0)));
    }

    #[test]
    fn test_error_has_no_properties() {
        let mut err = JsObject::Error(ErrorObject {
            kind: ErrorKind::TypeError,
            message: Rc::from("bad"),
        });
        assert!(!err.set_property("x", Value::Null));
        assert_eq!(err.type_of(), ValueType::Object);
        assert_eq!(ErrorKind::TypeError.to_string(), "TypeError");
    }
}
