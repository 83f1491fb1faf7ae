use core::fmt;

use wasm_bindgen::JsCast;

/// Error type produced by the web backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebError {
    /// The DOM APIs are not accessible (e.g., when executed outside of a browser).
    DomUnavailable,
    /// The requested mounting node cannot be located.
    RootNotFound(String),
    /// Wrapper around JavaScript exceptions.
    Js(String),
}

impl fmt::Display for WebError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DomUnavailable => write!(f, "DOM is not available"),
            Self::RootNotFound(id) => write!(f, "Failed to find DOM element with id `{id}`"),
            Self::Js(msg) => write!(f, "JavaScript error: {msg}"),
        }
    }
}

impl std::error::Error for WebError {}

impl From<wasm_bindgen::JsValue> for WebError {
    fn from(value: wasm_bindgen::JsValue) -> Self {
        if let Some(message) = value.as_string() {
            return Self::Js(message);
        }
        match value.dyn_ref::<js_sys::Error>() {
            Some(error) => Self::Js(String::from(error.message())),
            None => Self::Js(format!("{value:?}")),
        }
    }
}

impl From<WebError> for wasm_bindgen::JsValue {
    fn from(value: WebError) -> Self {
        js_sys::Error::new(&value.to_string()).into()
    }
}

impl From<WebError> for raven_core::Error {
    fn from(value: WebError) -> Self {
        Self::Host(value.to_string())
    }
}
