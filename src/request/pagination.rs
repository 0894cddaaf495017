//! Paged list requests
//!
//! TIDAL list replies look like
//! `{"limit": 100, "offset": 0, "totalNumberOfItems": 230, "items": [..]}`.
//! The fetcher only describes and decodes single pages; whether another page
//! is requested is decided by the orchestrator from [`Page::next_offset`].

use serde_json::Value;

use crate::tidal::{Endpoint, Params};

/// One page to request
#[derive(Debug, Clone, PartialEq)]
pub struct PageRequest {
    pub endpoint: Endpoint,
    pub offset: u32,
    pub limit: u32,
    /// Search text, for search endpoints
    pub query: Option<String>,
}

impl PageRequest {
    pub fn new(endpoint: Endpoint, offset: u32, limit: u32) -> Self {
        Self {
            endpoint,
            offset,
            limit,
            query: None,
        }
    }

    pub fn with_query(mut self, query: Option<String>) -> Self {
        self.query = query;
        self
    }

    /// Same request, moved to another offset
    pub fn at(&self, offset: u32) -> Self {
        Self {
            offset,
            ..self.clone()
        }
    }

    pub fn params(&self) -> Params {
        let mut params = Vec::with_capacity(3);
        if let Some(query) = &self.query {
            params.push(("query", query.clone()));
        }
        params.push(("offset", self.offset.to_string()));
        params.push(("limit", self.limit.to_string()));
        params
    }
}

/// A page that could not be used
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PageError {
    #[error("Json object missing values ({0})")]
    MissingField(&'static str),

    #[error("Offset returned does not match offset requested! {returned} != {requested}")]
    OffsetMismatch { returned: u64, requested: u32 },

    #[error("Json reply is not an object")]
    NotObject,
}

/// A decoded page
#[derive(Debug, Clone, PartialEq)]
pub struct Page {
    pub offset: u32,
    pub limit: Option<u32>,
    pub total: Option<u32>,
    pub items: Vec<Value>,
}

impl Page {
    /// Decode a page reply.
    ///
    /// `strict` requires `limit`, `offset` and `totalNumberOfItems` besides
    /// `items`; otherwise missing paging fields just mean a single page. An
    /// echoed offset that differs from the requested one is always an error.
    pub fn parse(value: Value, requested_offset: u32, strict: bool) -> Result<Self, PageError> {
        let Value::Object(mut obj) = value else {
            return Err(PageError::NotObject);
        };

        if strict {
            for field in ["limit", "offset", "totalNumberOfItems", "items"] {
                if !obj.contains_key(field) {
                    return Err(PageError::MissingField(field));
                }
            }
        }

        if let Some(returned) = obj.get("offset").and_then(Value::as_u64) {
            if returned != u64::from(requested_offset) {
                return Err(PageError::OffsetMismatch {
                    returned,
                    requested: requested_offset,
                });
            }
        }

        let items = match obj.remove("items") {
            Some(Value::Array(items)) => items,
            _ => return Err(PageError::MissingField("items")),
        };

        Ok(Self {
            offset: requested_offset,
            limit: json_u32(obj.get("limit")),
            total: json_u32(obj.get("totalNumberOfItems")),
            items,
        })
    }

    /// Offset of the following page, if the server reports more items
    pub fn next_offset(&self) -> Option<u32> {
        let total = self.total?;
        let next = self.offset.saturating_add(self.items.len() as u32);
        (!self.items.is_empty() && next < total).then_some(next)
    }

    /// The server returned more items than the limit it echoed
    pub fn exceeds_limit(&self) -> bool {
        self.limit.is_some_and(|limit| self.items.len() > limit as usize)
    }
}

fn json_u32(value: Option<&Value>) -> Option<u32> {
    value.and_then(Value::as_u64).and_then(|n| u32::try_from(n).ok())
}
