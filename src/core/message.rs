//! Message factories turn a format string plus parameters into message text.
//!
//! Factories take part in logger identity: two loggers with the same name but
//! different factory instances are distinct. Identity is by instance, so
//! compare factories with [`same_factory`], never by value.

use std::fmt::{self, Display};
use std::sync::Arc;

pub trait MessageFactory: Send + Sync {
    fn new_message(&self, format: &str, params: &[&dyn Display]) -> String;

    fn name(&self) -> &str;
}

impl fmt::Debug for dyn MessageFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("MessageFactory").field(&self.name()).finish()
    }
}

/// Instance identity for shared factories.
///
/// Compares data pointers only; vtable pointers of the same type may differ
/// between codegen units.
pub fn same_factory(a: &Arc<dyn MessageFactory>, b: &Arc<dyn MessageFactory>) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

/// Replaces each `{}` with the next parameter. Surplus placeholders are kept
/// verbatim, surplus parameters ignored. `\{}` escapes a placeholder.
#[derive(Debug, Default)]
pub struct ParameterizedMessageFactory;

impl MessageFactory for ParameterizedMessageFactory {
    fn new_message(&self, format: &str, params: &[&dyn Display]) -> String {
        if params.is_empty() {
            return format.to_string();
        }

        let mut out = String::with_capacity(format.len() + params.len() * 8);
        let mut params = params.iter();
        let mut chars = format.chars().peekable();

        while let Some(c) = chars.next() {
            match c {
                '\\' if chars.peek() == Some(&'{') => {
                    chars.next();
                    out.push('{');
                }
                '{' if chars.peek() == Some(&'}') => {
                    chars.next();
                    match params.next() {
                        Some(param) => {
                            use std::fmt::Write;
                            let _ = write!(out, "{}", param);
                        }
                        None => out.push_str("{}"),
                    }
                }
                _ => out.push(c),
            }
        }
        out
    }

    fn name(&self) -> &str {
        "ParameterizedMessageFactory"
    }
}

/// Uses the format string as the message and ignores parameters.
#[derive(Debug, Default)]
pub struct SimpleMessageFactory;

impl MessageFactory for SimpleMessageFactory {
    fn new_message(&self, format: &str, _params: &[&dyn Display]) -> String {
        format.to_string()
    }

    fn name(&self) -> &str {
        "SimpleMessageFactory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parameterized_substitution() {
        let factory = ParameterizedMessageFactory;
        let msg = factory.new_message("user {} logged in from {}", &[&42, &"10.0.0.1"]);
        assert_eq!(msg, "user 42 logged in from 10.0.0.1");
    }

    #[test]
    fn test_parameterized_surplus_and_escape() {
        let factory = ParameterizedMessageFactory;
        assert_eq!(factory.new_message("{} and {}", &[&1]), "1 and {}");
        assert_eq!(factory.new_message("\\{} is {}", &[&"x"]), "{} is x");
        assert_eq!(factory.new_message("no params {}", &[]), "no params {}");
    }

    #[test]
    fn test_identity_is_by_instance() {
        let a: Arc<dyn MessageFactory> = Arc::new(ParameterizedMessageFactory);
        let b: Arc<dyn MessageFactory> = Arc::new(ParameterizedMessageFactory);
        assert!(same_factory(&a, &a.clone()));
        assert!(!same_factory(&a, &b));
    }
}
