//! Editable request state behind the explorer front end.
//!
//! The editor owns everything the user can change before sending: the
//! selected endpoint, method, path parameters, query and header rows, body
//! and session context. It never talks to the network; [`RequestEditor::build_config`]
//! turns the current state into a validated [`RequestConfig`].

use std::collections::HashSet;

use crate::error::ExplorerError;
use crate::policy::{HeaderPolicy, Role, SessionContext};
use crate::registry::Endpoint;
use crate::types::{AuthType, HttpMethod, KeyValuePair, PathParam, RequestConfig};
use crate::url_params::{self, build_url, extract_path_params, resolve_against_base};
use crate::validation::{validate_json_body, validate_path_params};

/// Editor sections that track "edited" / "set by preset" markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorTab {
    Params,
    Query,
    Headers,
    Body,
    Auth,
}

impl EditorTab {
    pub fn label(self) -> &'static str {
        match self {
            EditorTab::Params => "Params",
            EditorTab::Query => "Query",
            EditorTab::Headers => "Headers",
            EditorTab::Body => "Body",
            EditorTab::Auth => "Auth",
        }
    }
}

/// Which key/value list a row operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowKind {
    Query,
    Headers,
}

impl RowKind {
    fn tab(self) -> EditorTab {
        match self {
            RowKind::Query => EditorTab::Query,
            RowKind::Headers => EditorTab::Headers,
        }
    }
}

/// Per-tab markers. A tab is never both edited and preset-modified.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TabMarkers {
    edited: HashSet<EditorTab>,
    preset_modified: HashSet<EditorTab>,
}

impl TabMarkers {
    pub fn mark_edited(&mut self, tab: EditorTab) {
        self.preset_modified.remove(&tab);
        self.edited.insert(tab);
    }

    pub fn mark_preset(&mut self, tabs: &[EditorTab]) {
        for tab in tabs {
            self.edited.remove(tab);
            self.preset_modified.insert(*tab);
        }
    }

    pub fn is_edited(&self, tab: EditorTab) -> bool {
        self.edited.contains(&tab)
    }

    pub fn is_preset_modified(&self, tab: EditorTab) -> bool {
        self.preset_modified.contains(&tab)
    }

    pub fn clear(&mut self) {
        self.edited.clear();
        self.preset_modified.clear();
    }
}

#[derive(Debug, Clone)]
pub struct RequestEditor {
    endpoint: Option<Endpoint>,
    path_template: String,
    method: HttpMethod,
    path_params: Vec<PathParam>,
    query_params: Vec<KeyValuePair>,
    headers: Vec<KeyValuePair>,
    body: String,
    session: SessionContext,
    markers: TabMarkers,
}

impl RequestEditor {
    pub fn new(session: SessionContext) -> Self {
        Self {
            endpoint: None,
            path_template: String::new(),
            method: HttpMethod::GET,
            path_params: vec![],
            query_params: vec![],
            headers: vec![],
            body: String::new(),
            session,
            markers: TabMarkers::default(),
        }
    }

    /// Switch to `endpoint`. Path params are derived fresh from its template
    /// and all per-request edits are discarded; the session is kept.
    pub fn select_endpoint(&mut self, endpoint: &Endpoint) {
        log::debug!("selecting endpoint {}", endpoint.path);
        self.path_template = endpoint.path.clone();
        self.method = endpoint.default_method();
        self.path_params = extract_path_params(&endpoint.path);
        self.query_params.clear();
        self.headers.clear();
        self.body.clear();
        self.markers.clear();
        self.endpoint = Some(endpoint.clone());
    }

    /// Work on a raw template that is not in the registry.
    pub fn select_path(&mut self, template: &str) {
        self.select_endpoint(&Endpoint {
            path: template.to_string(),
            methods: HttpMethod::all(),
            summary: None,
            tag: None,
            min_role: Role::Member,
        });
    }

    pub fn endpoint(&self) -> Option<&Endpoint> {
        self.endpoint.as_ref()
    }

    pub fn path_template(&self) -> &str {
        &self.path_template
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn path_params(&self) -> &[PathParam] {
        &self.path_params
    }

    pub fn query_params(&self) -> &[KeyValuePair] {
        &self.query_params
    }

    pub fn headers(&self) -> &[KeyValuePair] {
        &self.headers
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn markers(&self) -> &TabMarkers {
        &self.markers
    }

    pub fn set_method(&mut self, method: HttpMethod) -> Result<(), ExplorerError> {
        if let Some(endpoint) = &self.endpoint {
            if !endpoint.allows(method) {
                return Err(ExplorerError::Validation(vec![format!(
                    "{} is not allowed on {}",
                    method, endpoint.path
                )]));
            }
        }
        self.method = method;
        Ok(())
    }

    pub fn set_path_param(&mut self, name: &str, value: impl Into<String>) -> Result<(), ExplorerError> {
        let param = self
            .path_params
            .iter_mut()
            .find(|p| p.name == name)
            .ok_or_else(|| {
                ExplorerError::NotFound(format!("no path parameter named {}", name))
            })?;
        param.value = value.into();
        self.markers.mark_edited(EditorTab::Params);
        Ok(())
    }

    fn rows_mut(&mut self, kind: RowKind) -> &mut Vec<KeyValuePair> {
        match kind {
            RowKind::Query => &mut self.query_params,
            RowKind::Headers => &mut self.headers,
        }
    }

    fn row_mut(&mut self, kind: RowKind, id: &str) -> Result<&mut KeyValuePair, ExplorerError> {
        self.rows_mut(kind)
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| ExplorerError::NotFound(format!("no row with id {}", id)))
    }

    /// Append a row and return its id.
    pub fn add_row(&mut self, kind: RowKind, key: impl Into<String>, value: impl Into<String>) -> String {
        let row = KeyValuePair::new(key, value);
        let id = row.id.clone();
        self.rows_mut(kind).push(row);
        self.markers.mark_edited(kind.tab());
        id
    }

    pub fn update_row(
        &mut self,
        kind: RowKind,
        id: &str,
        key: Option<String>,
        value: Option<String>,
    ) -> Result<(), ExplorerError> {
        let row = self.row_mut(kind, id)?;
        if let Some(key) = key {
            row.key = key;
        }
        if let Some(value) = value {
            row.value = value;
        }
        self.markers.mark_edited(kind.tab());
        Ok(())
    }

    pub fn toggle_row(&mut self, kind: RowKind, id: &str) -> Result<bool, ExplorerError> {
        let row = self.row_mut(kind, id)?;
        row.enabled = !row.enabled;
        let enabled = row.enabled;
        self.markers.mark_edited(kind.tab());
        Ok(enabled)
    }

    pub fn remove_row(&mut self, kind: RowKind, id: &str) -> Result<KeyValuePair, ExplorerError> {
        let rows = self.rows_mut(kind);
        let index = rows
            .iter()
            .position(|r| r.id == id)
            .ok_or_else(|| ExplorerError::NotFound(format!("no row with id {}", id)))?;
        let removed = rows.remove(index);
        self.markers.mark_edited(kind.tab());
        Ok(removed)
    }

    /// Replace the query rows with those of a pasted URL, if they differ.
    pub fn load_url(&mut self, url: &str) {
        let parsed = url_params::parse_query_params(url);
        let current: Vec<(String, String)> = self
            .query_params
            .iter()
            .filter(|r| r.enabled)
            .map(|r| (r.key.clone(), r.value.clone()))
            .collect();
        if url_params::params_equal(&parsed, &current) {
            return;
        }
        self.query_params = url_params::query_rows_from_url(url);
        self.markers.mark_edited(EditorTab::Query);
    }

    pub fn set_body(&mut self, body: impl Into<String>) {
        self.body = body.into();
        self.markers.mark_edited(EditorTab::Body);
    }

    pub fn set_auth_type(&mut self, auth_type: AuthType) {
        self.session.auth_type = auth_type;
        self.markers.mark_edited(EditorTab::Auth);
    }

    pub fn set_api_key(&mut self, api_key: Option<String>) {
        self.session.api_key = api_key;
        self.markers.mark_edited(EditorTab::Auth);
    }

    pub fn set_team_id(&mut self, team_id: Option<String>) {
        self.session.team_id = team_id;
        self.markers.mark_edited(EditorTab::Auth);
    }

    pub fn set_bypass_team_scope(&mut self, bypass: bool) {
        self.session.bypass_team_scope = bypass;
        self.markers.mark_edited(EditorTab::Auth);
    }

    // Preset application writes through these without marking edits.

    pub(crate) fn replace_method(&mut self, method: HttpMethod) {
        self.method = method;
    }

    pub(crate) fn path_params_mut(&mut self) -> &mut Vec<PathParam> {
        &mut self.path_params
    }

    pub(crate) fn replace_rows(&mut self, kind: RowKind, rows: Vec<KeyValuePair>) {
        *self.rows_mut(kind) = rows;
    }

    pub(crate) fn replace_body(&mut self, body: String) {
        self.body = body;
    }

    pub(crate) fn session_mut(&mut self) -> &mut SessionContext {
        &mut self.session
    }

    pub(crate) fn markers_mut(&mut self) -> &mut TabMarkers {
        &mut self.markers
    }

    /// URL preview; unfilled placeholders stay visible.
    pub fn url(&self) -> String {
        build_url(&self.path_template, &self.path_params, &self.query_params)
    }

    /// All pre-flight messages; empty means the request may be sent.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = validate_path_params(&self.path_params);
        if let Some(message) = validate_json_body(&self.body) {
            errors.push(message);
        }
        errors
    }

    /// Validate and resolve the current state into a sendable request.
    pub fn build_config(&self, base_url: &str, policy: &HeaderPolicy) -> Result<RequestConfig, ExplorerError> {
        if self.path_template.is_empty() {
            return Err(ExplorerError::Validation(vec!["No endpoint selected".to_string()]));
        }

        let errors = self.validate();
        if !errors.is_empty() {
            return Err(ExplorerError::Validation(errors));
        }

        if let Some(endpoint) = &self.endpoint {
            if !self.session.role.satisfies(endpoint.min_role) {
                return Err(ExplorerError::Forbidden(format!(
                    "{} requires the {} role",
                    endpoint.path, endpoint.min_role
                )));
            }
        }

        let headers = policy.merge_headers(&self.session, &self.headers)?;
        let url = resolve_against_base(base_url, &self.url());
        let body = (!self.body.trim().is_empty()).then(|| self.body.clone());

        Ok(RequestConfig::new(self.method, url, headers, body, self.session.auth_type)?
            .with_api_key(self.session.api_key.clone())
            .with_session_cookie(self.session.session_cookie.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoint(path: &str, methods: Vec<HttpMethod>) -> Endpoint {
        Endpoint {
            path: path.to_string(),
            methods,
            summary: None,
            tag: None,
            min_role: Role::Member,
        }
    }

    fn editor_for(path: &str) -> RequestEditor {
        let mut editor = RequestEditor::new(SessionContext::default());
        editor.select_endpoint(&endpoint(path, vec![HttpMethod::GET, HttpMethod::POST]));
        editor
    }

    // ============ endpoint selection tests ============

    #[test]
    fn test_select_endpoint_derives_params() {
        let editor = editor_for("/api/v1/teams/:teamId/users/[id]");
        let names: Vec<_> = editor.path_params().iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["teamId", "id"]);
        assert_eq!(editor.method(), HttpMethod::GET);
    }

    #[test]
    fn test_select_endpoint_discards_previous_state() {
        let mut editor = editor_for("/api/v1/users/[id]");
        editor.set_path_param("id", "42").unwrap();
        editor.add_row(RowKind::Query, "q", "x");
        editor.set_body("{}");

        editor.select_endpoint(&endpoint("/api/v1/items/[itemId]", vec![HttpMethod::GET]));
        assert_eq!(editor.path_params().len(), 1);
        assert_eq!(editor.path_params()[0].name, "itemId");
        assert!(editor.path_params()[0].value.is_empty());
        assert!(editor.query_params().is_empty());
        assert!(editor.body().is_empty());
        assert!(!editor.markers().is_edited(EditorTab::Params));
    }

    #[test]
    fn test_set_method_must_be_allowed() {
        let mut editor = editor_for("/api/v1/users");
        assert!(editor.set_method(HttpMethod::POST).is_ok());
        assert!(editor.set_method(HttpMethod::DELETE).is_err());
        assert_eq!(editor.method(), HttpMethod::POST);
    }

    #[test]
    fn test_set_unknown_path_param() {
        let mut editor = editor_for("/api/v1/users/[id]");
        assert!(matches!(
            editor.set_path_param("nope", "1"),
            Err(ExplorerError::NotFound(_))
        ));
    }

    // ============ row tests ============

    #[test]
    fn test_row_ids_stable_across_edits() {
        let mut editor = editor_for("/api/v1/users");
        let id = editor.add_row(RowKind::Headers, "X-Trace", "1");
        editor
            .update_row(RowKind::Headers, &id, None, Some("2".to_string()))
            .unwrap();
        assert!(!editor.toggle_row(RowKind::Headers, &id).unwrap());

        let row = &editor.headers()[0];
        assert_eq!(row.id, id);
        assert_eq!(row.value, "2");
        assert!(!row.enabled);
        assert!(editor.markers().is_edited(EditorTab::Headers));
    }

    #[test]
    fn test_remove_row() {
        let mut editor = editor_for("/api/v1/users");
        let a = editor.add_row(RowKind::Query, "a", "1");
        let b = editor.add_row(RowKind::Query, "b", "2");
        let removed = editor.remove_row(RowKind::Query, &a).unwrap();
        assert_eq!(removed.key, "a");
        assert_eq!(editor.query_params().len(), 1);
        assert_eq!(editor.query_params()[0].id, b);
        assert!(editor.remove_row(RowKind::Query, &a).is_err());
    }

    #[test]
    fn test_load_url_fills_query_rows() {
        let mut editor = editor_for("/api/v1/users");
        editor.load_url("http://localhost:3000/api/v1/users?page=2&sort=name");
        assert_eq!(editor.url(), "/api/v1/users?page=2&sort=name");

        let ids: Vec<_> = editor.query_params().iter().map(|r| r.id.clone()).collect();
        editor.load_url("/api/v1/users?page=2&sort=name");
        let same: Vec<_> = editor.query_params().iter().map(|r| r.id.clone()).collect();
        assert_eq!(ids, same);
    }

    // ============ build_config tests ============

    #[test]
    fn test_build_config_reports_all_validation_errors() {
        let mut editor = editor_for("/api/v1/teams/:teamId/users/[id]");
        editor.set_body("{a:1}");
        let err = editor.build_config("http://localhost:3000", &HeaderPolicy::default()).unwrap_err();
        assert_eq!(
            err.validation_messages().unwrap(),
            &[
                "teamId is required".to_string(),
                "id is required".to_string(),
                "Invalid JSON format".to_string(),
            ]
        );
    }

    #[test]
    fn test_build_config_resolves_request() {
        let mut editor = editor_for("/api/v1/users/[id]");
        editor.set_method(HttpMethod::POST).unwrap();
        editor.set_path_param("id", "42").unwrap();
        editor.add_row(RowKind::Query, "expand", "teams");
        editor.add_row(RowKind::Headers, "X-Trace", "abc");
        editor.set_team_id(Some("team_1".to_string()));
        editor.set_body(r#"{"name":"Ada"}"#);

        let config = editor
            .build_config("http://localhost:3000/", &HeaderPolicy::default())
            .unwrap();
        assert_eq!(config.url(), "http://localhost:3000/api/v1/users/42?expand=teams");
        assert_eq!(config.method(), HttpMethod::POST);
        assert_eq!(config.body(), Some(r#"{"name":"Ada"}"#));
        assert_eq!(
            config.headers(),
            &[
                ("x-team-id".to_string(), "team_1".to_string()),
                ("X-Trace".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn test_build_config_enforces_min_role() {
        let mut editor = RequestEditor::new(SessionContext::default());
        editor.select_endpoint(&Endpoint {
            min_role: Role::Admin,
            ..endpoint("/api/v1/admin/teams", vec![HttpMethod::GET])
        });
        let err = editor.build_config("", &HeaderPolicy::default()).unwrap_err();
        assert!(matches!(err, ExplorerError::Forbidden(_)));
    }

    #[test]
    fn test_build_config_without_endpoint() {
        let editor = RequestEditor::new(SessionContext::default());
        assert!(editor.build_config("", &HeaderPolicy::default()).is_err());
    }
}
