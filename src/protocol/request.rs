use std::fmt;

use serde_json::{Map, Value};

/// Request types understood by the Mind service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestKind {
    BodyAuthenticate,
    CollectionSearch,
    ContentSearch,
    OfferSearch,
    CategorySearch,
    SubscriptionSearch,
    /// Any request type not listed above, sent verbatim.
    Other(String),
}

impl RequestKind {
    pub fn as_str(&self) -> &str {
        match self {
            RequestKind::BodyAuthenticate => "bodyAuthenticate",
            RequestKind::CollectionSearch => "collectionSearch",
            RequestKind::ContentSearch => "contentSearch",
            RequestKind::OfferSearch => "offerSearch",
            RequestKind::CategorySearch => "categorySearch",
            RequestKind::SubscriptionSearch => "subscriptionSearch",
            RequestKind::Other(kind) => kind,
        }
    }
}

impl From<&str> for RequestKind {
    fn from(value: &str) -> Self {
        match value {
            "bodyAuthenticate" => RequestKind::BodyAuthenticate,
            "collectionSearch" => RequestKind::CollectionSearch,
            "contentSearch" => RequestKind::ContentSearch,
            "offerSearch" => RequestKind::OfferSearch,
            "categorySearch" => RequestKind::CategorySearch,
            "subscriptionSearch" => RequestKind::SubscriptionSearch,
            other => RequestKind::Other(other.to_string()),
        }
    }
}

impl fmt::Display for RequestKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound request: its type plus the JSON fields of its body.
///
/// Field names are passed to the service as-is, so they must already be in
/// the service's camelCase form.
#[derive(Debug, Clone, PartialEq)]
pub struct Request {
    kind: RequestKind,
    fields: Map<String, Value>,
    monitor: bool,
}

impl Request {
    pub fn new(kind: impl Into<RequestKind>) -> Self {
        Self {
            kind: kind.into(),
            fields: Map::new(),
            monitor: false,
        }
    }

    pub fn with_fields(kind: impl Into<RequestKind>, fields: Map<String, Value>) -> Self {
        Self {
            kind: kind.into(),
            fields,
            monitor: false,
        }
    }

    pub fn field(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(name.to_string(), value.into());
        self
    }

    /// Asks the service to keep sending responses as results change.
    pub fn monitor(mut self, monitor: bool) -> Self {
        self.monitor = monitor;
        self
    }

    pub fn kind(&self) -> &RequestKind {
        &self.kind
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn is_monitor(&self) -> bool {
        self.monitor
    }
}
