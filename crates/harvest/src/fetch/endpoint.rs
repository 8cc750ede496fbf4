//! Endpoint descriptors and rendered requests.

use std::fmt;

use indexmap::IndexMap;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::error::{HarvestError, Result};

/// Key attributes accumulated while descending a taxonomy
/// (`year → 2024`, `make → Acme`, ...).
pub type Keys = IndexMap<String, String>;

/// Describes one upstream resource.
///
/// `path` and the values of `query` are templates: a path segment or query
/// value written as `{name}` is replaced by the key `name`. Anything else is
/// taken literally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub base_url: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub query: IndexMap<String, String>,
}

impl Endpoint {
    pub fn new(base_url: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            path: path.into(),
            headers: IndexMap::new(),
            query: IndexMap::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_headers(mut self, headers: &IndexMap<String, String>) -> Self {
        self.headers
            .extend(headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    pub fn with_query(mut self, name: impl Into<String>, template: impl Into<String>) -> Self {
        self.query.insert(name.into(), template.into());
        self
    }

    /// Fill the templates from `keys` and produce a request.
    pub fn render(&self, keys: &Keys) -> Result<Request> {
        let mut url = Url::parse(&self.base_url).map_err(|e| self.error(e.to_string()))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| self.error("base URL cannot take a path".to_string()))?;
            segments.pop_if_empty();
            for segment in self.path.split('/').filter(|s| !s.is_empty()) {
                segments.push(&self.fill(segment, keys)?);
            }
        }

        let params = self
            .query
            .iter()
            .map(|(name, template)| Ok((name.clone(), self.fill(template, keys)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Request {
            url: url.to_string(),
            headers: self
                .headers
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            params,
        })
    }

    fn fill(&self, template: &str, keys: &Keys) -> Result<String> {
        match placeholder(template) {
            Some(key) => keys
                .get(key)
                .cloned()
                .ok_or_else(|| self.error(format!("missing key '{}'", key))),
            None => Ok(template.to_string()),
        }
    }

    fn error(&self, message: String) -> HarvestError {
        HarvestError::Endpoint {
            endpoint: format!("{}{}", self.base_url, self.path),
            message,
        }
    }
}

fn placeholder(template: &str) -> Option<&str> {
    template
        .strip_prefix('{')
        .and_then(|rest| rest.strip_suffix('}'))
        .filter(|key| !key.is_empty())
}

/// A fully rendered GET request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub params: Vec<(String, String)>,
}

impl Request {
    /// A request for a plain URL with no headers or parameters.
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            params: Vec::new(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((name.into(), value.into()));
        self
    }
}

/// `url?name=value&...` in parameter order, unencoded. Used in logs and as the
/// lookup key of the mock transport.
impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.url)?;
        for (i, (name, value)) in self.params.iter().enumerate() {
            let sep = if i == 0 { '?' } else { '&' };
            write!(f, "{}{}={}", sep, name, value)?;
        }
        Ok(())
    }
}
