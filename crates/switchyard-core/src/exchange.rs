//! The request/response carrier passed through a chain.
//!
//! Building an [`Exchange`] from the wire and writing it back is the
//! transport's job. The dispatch core only fills in routing information and
//! lets filters and handlers read and mutate it.

use serde::Serialize;
use serde_json::{Map, Value};

/// Status codes the dispatch core produces on its own.
pub mod status {
    /// The request was served.
    pub const OK: u16 = 200;
    /// No mapping and no default handler matched the path.
    pub const NOT_FOUND: u16 = 404;
    /// Chain construction or invocation failed.
    pub const INTERNAL_SERVER_ERROR: u16 = 500;
    /// The runtime has been shut down.
    pub const SERVICE_UNAVAILABLE: u16 = 503;
}

/// A single request travelling through a chain, together with its response.
#[derive(Debug, Clone, Serialize)]
pub struct Exchange {
    path: String,
    servlet_path: String,
    path_info: Option<String>,
    handler_name: Option<String>,
    attributes: Map<String, Value>,
    status: u16,
    body: String,
}

impl Exchange {
    /// Creates an exchange for an already-decoded request path.
    pub fn new(path: impl Into<String>) -> Self {
        let path = path.into();
        Self {
            servlet_path: path.clone(),
            path,
            path_info: None,
            handler_name: None,
            attributes: Map::new(),
            status: status::OK,
            body: String::new(),
        }
    }

    /// The request path the exchange was dispatched on.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// The part of the path consumed by the matched mapping.
    pub fn servlet_path(&self) -> &str {
        &self.servlet_path
    }

    /// The part of the path after the servlet path, if any.
    pub fn path_info(&self) -> Option<&str> {
        self.path_info.as_deref()
    }

    /// The handler serving the exchange, once routed.
    pub fn handler_name(&self) -> Option<&str> {
        self.handler_name.as_deref()
    }

    /// Records the routing decision. Called by the chain before any filter runs.
    pub fn set_route(
        &mut self,
        handler_name: impl Into<String>,
        servlet_path: impl Into<String>,
        path_info: Option<String>,
    ) {
        self.handler_name = Some(handler_name.into());
        self.servlet_path = servlet_path.into();
        self.path_info = path_info;
    }

    /// Returns a request attribute.
    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Sets a request attribute, returning the previous value.
    pub fn set_attribute(
        &mut self,
        key: impl Into<String>,
        value: impl Into<Value>,
    ) -> Option<Value> {
        self.attributes.insert(key.into(), value.into())
    }

    /// Removes a request attribute.
    pub fn remove_attribute(&mut self, key: &str) -> Option<Value> {
        self.attributes.remove(key)
    }

    /// The response status.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Sets the response status.
    pub fn set_status(&mut self, status: u16) {
        self.status = status;
    }

    /// The response body.
    pub fn body(&self) -> &str {
        &self.body
    }

    /// Replaces the response body.
    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
    }

    /// Appends to the response body.
    pub fn write(&mut self, chunk: &str) {
        self.body.push_str(chunk);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_exchange_defaults() {
        let exchange = Exchange::new("/a/b");
        assert_eq!(exchange.path(), "/a/b");
        assert_eq!(exchange.servlet_path(), "/a/b");
        assert_eq!(exchange.path_info(), None);
        assert_eq!(exchange.handler_name(), None);
        assert_eq!(exchange.status(), status::OK);
        assert!(exchange.body().is_empty());
    }

    #[test]
    fn test_attributes_and_body() {
        let mut exchange = Exchange::new("/");
        assert_eq!(exchange.set_attribute("user", "alice"), None);
        assert_eq!(exchange.attribute("user"), Some(&Value::from("alice")));
        exchange.write("hello");
        exchange.write(", world");
        assert_eq!(exchange.body(), "hello, world");
        assert_eq!(exchange.remove_attribute("user"), Some(Value::from("alice")));
        assert_eq!(exchange.attribute("user"), None);
    }
}
