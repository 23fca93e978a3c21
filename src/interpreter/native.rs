use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use super::runtime_error::RuntimeError;
use super::value::Value;

/// A host-provided callable. Arity is checked at the call site like
/// any other callable.
pub struct NativeFunction {
    pub name: &'static str,
    pub arity: usize,
    pub function: fn(&[Value]) -> Result<Value, RuntimeError>,
}

impl fmt::Display for NativeFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "<native fn {}>", self.name)
    }
}

/// Elapsed seconds since the Unix epoch, as a float.
pub fn clock() -> NativeFunction {
    NativeFunction {
        name: "clock",
        arity: 0,
        function: |_arguments| {
            let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).map_err(|_| {
                std::io::Error::new(std::io::ErrorKind::Other, "system clock before Unix epoch")
            })?;
            Ok(Value::Number(elapsed.as_secs_f64()))
        },
    }
}
