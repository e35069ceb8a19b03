//! Protocol payload model
//!
//! The harness never interprets protocol content beyond hrefs, child links and
//! list paging counters. Everything else rides along in `fields` untouched.
//! Decoding from the wire format is the job of a [`crate::server::PayloadDecoder`].

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One decoded protocol resource
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub href: Option<String>,

    /// Link element name (eg `EndDeviceListLink`) to href
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub links: BTreeMap<String, String>,

    /// Present only on list resources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub list: Option<ListPage>,

    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub fields: Map<String, Value>,
}

/// Paging counters and the items of a single list page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListPage {
    /// Total number of items the server claims the list holds
    #[serde(default)]
    pub all: Option<u32>,
    /// Number of items the server claims are on this page
    #[serde(default)]
    pub results: Option<u32>,
    #[serde(default)]
    pub items: Vec<Resource>,
}

impl Resource {
    pub fn new(href: impl Into<String>) -> Self {
        Self {
            href: Some(href.into()),
            ..Default::default()
        }
    }

    pub fn with_link(mut self, name: impl Into<String>, href: impl Into<String>) -> Self {
        self.links.insert(name.into(), href.into());
        self
    }

    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.fields.insert(name.into(), value.into());
        self
    }

    pub fn with_list(mut self, page: ListPage) -> Self {
        self.list = Some(page);
        self
    }

    /// The href, treating an empty string as absent
    pub fn href(&self) -> Option<&str> {
        self.href.as_deref().filter(|h| !h.is_empty())
    }

    /// Href of the named link, treating an empty string as absent
    pub fn link(&self, name: &str) -> Option<&str> {
        self.links
            .get(name)
            .map(String::as_str)
            .filter(|h| !h.is_empty())
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn field_u64(&self, name: &str) -> Option<u64> {
        self.fields.get(name).and_then(|v| match v {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        })
    }

    /// Advertised poll rate in seconds (DeviceCapability and list resources)
    pub fn poll_rate(&self) -> Option<u64> {
        self.field_u64("pollRate").filter(|rate| *rate > 0)
    }

    /// Items on this page, empty for non-list resources
    pub fn items(&self) -> &[Resource] {
        self.list.as_ref().map(|l| l.items.as_slice()).unwrap_or_default()
    }
}

impl ListPage {
    /// A page whose `results` counter matches its items
    pub fn new(items: Vec<Resource>) -> Self {
        Self {
            all: None,
            results: Some(items.len() as u32),
            items,
        }
    }

    pub fn with_all(mut self, all: u32) -> Self {
        self.all = Some(all);
        self
    }
}
