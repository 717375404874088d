//! Route registry: which paths exist and which methods they accept.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::ExplorerError;
use crate::policy::Role;
use crate::types::HttpMethod;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    pub path: String,
    pub methods: Vec<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
    #[serde(default)]
    pub min_role: Role,
}

impl Endpoint {
    pub fn allows(&self, method: HttpMethod) -> bool {
        self.methods.contains(&method)
    }

    pub fn default_method(&self) -> HttpMethod {
        self.methods.first().copied().unwrap_or(HttpMethod::GET)
    }
}

#[derive(Debug, Deserialize)]
struct RegistryFile {
    endpoints: Vec<Endpoint>,
}

/// Ordered registry of endpoints, keyed by route template.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RouteRegistry {
    endpoints: Vec<Endpoint>,
}

impl RouteRegistry {
    pub fn new(endpoints: Vec<Endpoint>) -> Self {
        let mut registry = Self::default();
        for endpoint in endpoints {
            registry.insert(endpoint);
        }
        registry
    }

    pub fn from_json(raw: &str) -> Result<Self, ExplorerError> {
        let file: RegistryFile = serde_json::from_str(raw)?;
        let registry = Self::new(file.endpoints);
        if let Some(empty) = registry.endpoints.iter().find(|e| e.methods.is_empty()) {
            return Err(ExplorerError::Config(format!(
                "endpoint {} declares no methods",
                empty.path
            )));
        }
        Ok(registry)
    }

    pub fn from_file(path: &Path) -> Result<Self, ExplorerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    /// Add an endpoint; a later definition of the same path replaces the earlier one.
    pub fn insert(&mut self, endpoint: Endpoint) {
        match self.endpoints.iter_mut().find(|e| e.path == endpoint.path) {
            Some(existing) => *existing = endpoint,
            None => self.endpoints.push(endpoint),
        }
    }

    pub fn lookup(&self, path: &str) -> Option<&Endpoint> {
        self.endpoints.iter().find(|e| e.path == path)
    }

    pub fn get(&self, path: &str) -> Result<&Endpoint, ExplorerError> {
        self.lookup(path)
            .ok_or_else(|| ExplorerError::NotFound(format!("no endpoint registered for {}", path)))
    }

    pub fn endpoints(&self) -> &[Endpoint] {
        &self.endpoints
    }

    pub fn by_tag<'a>(&'a self, tag: &'a str) -> impl Iterator<Item = &'a Endpoint> + 'a {
        self.endpoints
            .iter()
            .filter(move |e| e.tag.as_deref().is_some_and(|t| t.eq_ignore_ascii_case(tag)))
    }

    /// Distinct tags in first-seen order.
    pub fn tags(&self) -> Vec<&str> {
        let mut tags: Vec<&str> = Vec::new();
        for tag in self.endpoints.iter().filter_map(|e| e.tag.as_deref()) {
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tags
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "endpoints": [
            {"path": "/api/v1/users", "methods": ["GET", "POST"], "tag": "users"},
            {"path": "/api/v1/users/[id]", "methods": ["GET", "PATCH", "DELETE"], "tag": "users"},
            {"path": "/api/v1/admin/teams", "methods": ["GET"], "tag": "admin", "min_role": "admin"}
        ]
    }"#;

    #[test]
    fn test_parse_registry() {
        let registry = RouteRegistry::from_json(SAMPLE).unwrap();
        assert_eq!(registry.len(), 3);

        let users = registry.lookup("/api/v1/users/[id]").unwrap();
        assert!(users.allows(HttpMethod::PATCH));
        assert!(!users.allows(HttpMethod::POST));
        assert_eq!(users.default_method(), HttpMethod::GET);
        assert_eq!(users.min_role, Role::Member);

        assert_eq!(registry.lookup("/api/v1/admin/teams").unwrap().min_role, Role::Admin);
    }

    #[test]
    fn test_get_unknown_path() {
        let registry = RouteRegistry::from_json(SAMPLE).unwrap();
        assert!(matches!(
            registry.get("/nope"),
            Err(ExplorerError::NotFound(_))
        ));
    }

    #[test]
    fn test_tags_and_filter() {
        let registry = RouteRegistry::from_json(SAMPLE).unwrap();
        assert_eq!(registry.tags(), vec!["users", "admin"]);
        assert_eq!(registry.by_tag("USERS").count(), 2);
    }

    #[test]
    fn test_later_definition_replaces_earlier() {
        let mut registry = RouteRegistry::from_json(SAMPLE).unwrap();
        registry.insert(Endpoint {
            path: "/api/v1/users".to_string(),
            methods: vec![HttpMethod::GET],
            summary: None,
            tag: None,
            min_role: Role::Member,
        });
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.lookup("/api/v1/users").unwrap().methods, vec![HttpMethod::GET]);
    }

    #[test]
    fn test_rejects_endpoint_without_methods() {
        let raw = r#"{"endpoints": [{"path": "/x", "methods": []}]}"#;
        assert!(matches!(
            RouteRegistry::from_json(raw),
            Err(ExplorerError::Config(_))
        ));
    }
}
