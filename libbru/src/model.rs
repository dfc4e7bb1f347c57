//! Typed documents assembled from blocks.

use crate::ast::{Block, Pair};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which conventional assembly a file follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Request,
    Folder,
    Collection,
    Environment,
}

impl DocumentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Request => "request",
            DocumentKind::Folder => "folder",
            DocumentKind::Collection => "collection",
            DocumentKind::Environment => "environment",
        }
    }
}

impl fmt::Display for DocumentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "request" => Ok(DocumentKind::Request),
            "folder" => Ok(DocumentKind::Folder),
            "collection" => Ok(DocumentKind::Collection),
            "environment" | "env" => Ok(DocumentKind::Environment),
            _ => Err(format!("unknown document kind: {}", s)),
        }
    }
}

/// A parsed file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Document {
    Request(Request),
    Folder(Collection),
    Collection(Collection),
    Environment(Environment),
}

impl Document {
    pub fn kind(&self) -> DocumentKind {
        match self {
            Document::Request(_) => DocumentKind::Request,
            Document::Folder(_) => DocumentKind::Folder,
            Document::Collection(_) => DocumentKind::Collection,
            Document::Environment(_) => DocumentKind::Environment,
        }
    }

    /// Display name from the `meta` block.
    pub fn name(&self) -> &str {
        match self {
            Document::Request(r) => &r.meta.name,
            Document::Folder(c) | Document::Collection(c) => &c.meta.name,
            Document::Environment(e) => &e.name,
        }
    }

    pub fn as_request(&self) -> Option<&Request> {
        match self {
            Document::Request(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Collection> {
        match self {
            Document::Folder(c) | Document::Collection(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_environment(&self) -> Option<&Environment> {
        match self {
            Document::Environment(e) => Some(e),
            _ => None,
        }
    }
}

/// Contents of the `meta` block.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub name: String,
    /// `http` or `graphql` for requests.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u32>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
    /// Keys not listed above, in source order.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Pair>,
}

impl Meta {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }
}

/// The method block of a request: `get { url: ... }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Http {
    /// Lowercase method name, which is also the block name.
    pub method: String,
    pub url: String,
    /// Active body mode, `none` when absent.
    pub body: String,
    /// Active auth mode, `none` when absent.
    pub auth: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Pair>,
}

/// Method names recognized as request method blocks.
pub const HTTP_METHODS: &[&str] = &[
    "get", "post", "put", "delete", "patch", "options", "head", "connect", "trace",
];

/// Fields of an `auth:<mode>` block.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Auth {
    /// The block qualifier: `bearer`, `basic`, `awsv4`, ...
    pub mode: String,
    pub fields: Vec<Pair>,
}

/// Request body sections, one per mode.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub xml: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sparql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub graphql_vars: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub form_url_encoded: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub multipart_form: Vec<Pair>,
}

/// `vars:pre-request` and `vars:post-response`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestVars {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub req: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub res: Vec<Pair>,
}

/// `script(type=pre-request)` and `script(type=post-response)`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Scripts {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub req: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub res: Option<String>,
}

/// A request file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub http: Option<Http>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub query_params: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub path_params: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub body: RequestBody,
    #[serde(default)]
    pub vars: RequestVars,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assertions: Vec<Pair>,
    #[serde(default)]
    pub script: Scripts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub settings: Vec<Pair>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    /// Blocks this assembly does not know, kept verbatim.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Block>,
}

/// A `folder.bru` or `collection.bru` file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Collection {
    pub meta: Meta,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub headers: Vec<Pair>,
    /// The `mode` of the plain `auth` block.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_mode: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth: Option<Auth>,
    #[serde(default)]
    pub vars: RequestVars,
    #[serde(default)]
    pub script: Scripts,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tests: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Block>,
}

/// An environment file.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Environment {
    pub name: String,
    pub variables: Vec<Variable>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extra: Vec<Block>,
}

/// An environment variable.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    /// Always `None` after parsing a secret variable.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub enabled: bool,
    #[serde(default)]
    pub secret: bool,
}

impl Variable {
    pub fn new(name: &str, value: &str) -> Self {
        Self {
            name: name.to_string(),
            value: Some(value.to_string()),
            enabled: true,
            secret: false,
        }
    }

    pub fn secret(mut self) -> Self {
        self.secret = true;
        self
    }

    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}
