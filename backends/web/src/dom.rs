use crate::error::WebError;

use web_sys::{Document, Element, Window};

/// Attribute carrying the node id of every mounted element.
pub const NODE_ID_ATTRIBUTE: &str = "data-raven-id";

/// Attribute marking grouping containers.
pub const GROUP_ATTRIBUTE: &str = "data-raven-group";

const STYLE_ID: &str = "raven-web-styles";

const DEFAULT_STYLES: &str = "[data-raven-group] { display: contents; }\n\
.raven-root { touch-action: none; }\n";

/// The element an application is mounted into.
#[derive(Debug, Clone)]
pub struct DomRoot {
    document: Document,
    element: Element,
}

impl DomRoot {
    /// Creates a [`DomRoot`] pointing at the provided element id.
    ///
    /// Without an id, a fresh `div` is appended to the document body.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no document or the element cannot be found.
    pub fn new(root_id: Option<&str>, inject_styles: bool) -> Result<Self, WebError> {
        let window: Window = web_sys::window().ok_or(WebError::DomUnavailable)?;
        let document: Document = window.document().ok_or(WebError::DomUnavailable)?;

        if inject_styles {
            inject_stylesheet(&document)?;
        }

        let element = if let Some(id) = root_id {
            document
                .get_element_by_id(id)
                .ok_or_else(|| WebError::RootNotFound(id.to_string()))?
        } else {
            let body = document.body().ok_or(WebError::DomUnavailable)?;
            let host = document.create_element("div")?;
            host.set_id("raven-root");
            body.append_child(&host)?;
            host
        };
        element.set_class_name("raven-root");

        Ok(Self { document, element })
    }

    /// Returns the DOM element representing the mounting point.
    #[must_use]
    pub const fn element(&self) -> &Element {
        &self.element
    }

    /// Returns the owning document.
    #[must_use]
    pub const fn document(&self) -> &Document {
        &self.document
    }

    /// Clears the mounting element.
    ///
    /// # Errors
    ///
    /// Returns an error if the DOM refuses to detach a child.
    pub fn clear(&self) -> Result<(), WebError> {
        while let Some(child) = self.element.first_child() {
            self.element.remove_child(&child)?;
        }
        Ok(())
    }
}

fn inject_stylesheet(document: &Document) -> Result<(), WebError> {
    if document.get_element_by_id(STYLE_ID).is_some() {
        return Ok(());
    }

    let style = document.create_element("style")?;
    style.set_id(STYLE_ID);
    style.set_text_content(Some(DEFAULT_STYLES));

    if let Some(head) = document.head() {
        head.append_child(&style)?;
    } else if let Some(body) = document.body() {
        body.prepend_with_node_1(&style)?;
    } else {
        return Err(WebError::DomUnavailable);
    }
    Ok(())
}
