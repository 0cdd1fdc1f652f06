use crate::error::AnchorError;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::time::Duration;

/// A typed row returned from the graph store. The query boundary only ever
/// produces a small set of row shapes, so they are modeled as a tagged
/// variant instead of untyped JSON that callers would have to downcast.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphRow {
    /// A file node's path.
    File { path: String },
    /// Anything else a query projects; kept for forward compatibility.
    Value(Value),
}

impl GraphRow {
    pub fn path(&self) -> Option<&str> {
        match self {
            GraphRow::File { path } => Some(path),
            GraphRow::Value(_) => None,
        }
    }
}

/// Read-only query capability against the persistent graph store.
pub trait GraphQueryer {
    fn execute_query(
        &self,
        query: &str,
        params: &HashMap<String, Value>,
    ) -> Result<Vec<GraphRow>, AnchorError>;
}

/// Graph client speaking the Neo4j HTTP transaction API.
pub struct HttpGraphClient {
    endpoint: String,
    credentials: Option<(String, String)>,
    timeout: Duration,
}

impl HttpGraphClient {
    pub fn new(endpoint: impl Into<String>) -> Self {
        HttpGraphClient {
            endpoint: endpoint.into(),
            credentials: None,
            timeout: Duration::from_secs(10),
        }
    }

    /// Builds a client from global configuration, or `None` when no graph
    /// endpoint is configured.
    pub fn from_config() -> Option<Self> {
        let config = crate::config::Config::get();
        let mut client = HttpGraphClient::new(config.graph_url()?);
        if let Some((user, password)) = config.graph_credentials() {
            client.credentials = Some((user.to_string(), password.to_string()));
        }
        Some(client)
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.credentials = Some((user.into(), password.into()));
        self
    }
}

impl GraphQueryer for HttpGraphClient {
    fn execute_query(
        &self,
        query: &str,
        params: &HashMap<String, Value>,
    ) -> Result<Vec<GraphRow>, AnchorError> {
        let body = json!({
            "statements": [{
                "statement": query,
                "parameters": params,
            }]
        });

        let mut request = ureq::post(&self.endpoint)
            .set("Content-Type", "application/json")
            .timeout(self.timeout);
        if let Some((user, password)) = &self.credentials {
            request = request.set("Authorization", &basic_auth(user, password));
        }

        let response: Value = request.send_json(body)?.into_json()?;

        if let Some(errors) = response["errors"].as_array() {
            if let Some(first) = errors.first() {
                return Err(AnchorError::GraphError(
                    first["message"].as_str().unwrap_or("unknown graph error").to_string(),
                ));
            }
        }

        let result = &response["results"][0];
        let columns: Vec<&str> = result["columns"]
            .as_array()
            .map(|cols| cols.iter().filter_map(|c| c.as_str()).collect())
            .unwrap_or_default();
        let path_column = columns.iter().position(|c| *c == "path");

        let mut rows = Vec::new();
        for data in result["data"].as_array().unwrap_or(&Vec::new()) {
            let row = &data["row"];
            match path_column.and_then(|i| row[i].as_str()) {
                Some(path) => rows.push(GraphRow::File { path: path.to_string() }),
                None => rows.push(GraphRow::Value(row.clone())),
            }
        }

        Ok(rows)
    }
}

fn basic_auth(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

#[cfg(test)]
mod tests {
    use super::basic_auth;

    #[test]
    fn basic_auth_header_encodes_credentials() {
        assert_eq!(basic_auth("neo4j", "pw"), "Basic bmVvNGo6cHc=");
    }
}
