use serde::Deserialize;
use std::collections::HashMap;

/// A parsed `WWW-Authenticate: Bearer ...` challenge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerChallenge {
    pub realm: String,
    pub service: Option<String>,
    pub scope: Option<String>,
}

impl BearerChallenge {
    /// Parse the header value. Returns `None` for non-bearer schemes or a
    /// challenge without a realm.
    #[must_use]
    pub fn parse(header: &str) -> Option<Self> {
        let (scheme, params) = header.trim().split_once(' ')?;
        if !scheme.eq_ignore_ascii_case("bearer") {
            return None;
        }
        let params = parse_params(params);
        Some(Self {
            realm: params.get("realm")?.clone(),
            service: params.get("service").cloned(),
            scope: params.get("scope").cloned(),
        })
    }

    /// Query parameters for the token request. Falls back to a pull scope on
    /// `repository` when the challenge names none.
    #[must_use]
    pub fn token_query(&self, repository: &str) -> Vec<(&'static str, String)> {
        let mut query = Vec::new();
        if let Some(service) = &self.service {
            query.push(("service", service.clone()));
        }
        let scope = self
            .scope
            .clone()
            .unwrap_or_else(|| format!("repository:{repository}:pull"));
        query.push(("scope", scope));
        query
    }
}

/// Split `key="value",key2="value, with comma"` pairs. Commas inside quotes
/// do not end a value.
fn parse_params(raw: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();
    let mut key = String::new();
    let mut value = String::new();
    let mut in_value = false;
    let mut in_quotes = false;

    for ch in raw.chars() {
        match ch {
            '"' if in_value => in_quotes = !in_quotes,
            '=' if !in_value => in_value = true,
            ',' if !in_quotes => {
                if !key.trim().is_empty() {
                    params.insert(key.trim().to_ascii_lowercase(), value.clone());
                }
                key.clear();
                value.clear();
                in_value = false;
            }
            _ if in_value => value.push(ch),
            _ => key.push(ch),
        }
    }
    if !key.trim().is_empty() {
        params.insert(key.trim().to_ascii_lowercase(), value);
    }
    params
}

/// Token endpoint response. Registries use either field name.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    access_token: Option<String>,
}

impl TokenResponse {
    #[must_use]
    pub fn into_token(self) -> Option<String> {
        self.token
            .or(self.access_token)
            .filter(|token| !token.is_empty())
    }
}
