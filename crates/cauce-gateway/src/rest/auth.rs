//! Pluggable authentication strategies for REST endpoints.

use std::collections::HashMap;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

/// Authentication applied to a request before dispatch.
///
/// The variant set is closed: each scheme knows how to decorate a
/// [`reqwest::RequestBuilder`] and nothing else about the call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AuthScheme {
    /// No authentication.
    #[default]
    None,
    /// HTTP basic auth.
    Basic {
        /// Username.
        username: String,
        /// Password.
        password: String,
    },
    /// Bearer token in the Authorization header.
    Bearer {
        /// Token value.
        token: String,
    },
    /// Credentials appended as query-string parameters.
    Query {
        /// Parameter names and values.
        params: HashMap<String, String>,
    },
}

impl AuthScheme {
    /// Applies this scheme to a request builder.
    pub fn apply(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self {
            AuthScheme::None => request,
            AuthScheme::Basic { username, password } => {
                let encoded = STANDARD.encode(format!("{username}:{password}"));
                request.header(reqwest::header::AUTHORIZATION, format!("Basic {encoded}"))
            }
            AuthScheme::Bearer { token } => request.bearer_auth(token),
            AuthScheme::Query { params } => {
                let query: Vec<(&str, &str)> = params
                    .iter()
                    .map(|(k, v)| (k.as_str(), v.as_str()))
                    .collect();
                request.query(&query)
            }
        }
    }
}
