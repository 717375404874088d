//! Presets: named, pre-filled request values for an endpoint.
//!
//! Applying a preset replaces whole editor sections rather than merging row
//! by row. Path parameters are the exception: they are matched by name and
//! parameters the preset does not mention keep their value.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::editor::{EditorTab, RequestEditor, RowKind};
use crate::error::ExplorerError;
use crate::types::{AuthType, HttpMethod, KeyValuePair};

/// Replaced with the first locally cached team id when a preset is applied.
pub const FIRST_TEAM_ID_PLACEHOLDER: &str = "{{FIRST_TEAM_ID}}";

/// Session-context override carried by a preset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SessionOverride {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bypass_team_scope: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_type: Option<AuthType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preset {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub method: Option<HttpMethod>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_params: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query_params: Option<IndexMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<IndexMap<String, String>>,
    /// Either a JSON document or a raw string.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<SessionOverride>,
}

impl Preset {
    fn body_text(&self) -> Option<String> {
        self.body.as_ref().map(|body| match body {
            serde_json::Value::String(raw) => raw.clone(),
            other => serde_json::to_string_pretty(other).unwrap_or_else(|_| other.to_string()),
        })
    }
}

/// Source of team ids the user has seen before, most relevant first.
pub trait TeamCache {
    fn cached_team_ids(&self) -> Vec<String>;
}

impl TeamCache for Vec<String> {
    fn cached_team_ids(&self) -> Vec<String> {
        self.clone()
    }
}

impl TeamCache for [String] {
    fn cached_team_ids(&self) -> Vec<String> {
        self.to_vec()
    }
}

/// Resolve `{{FIRST_TEAM_ID}}`. `None` when the placeholder cannot be filled.
pub fn resolve_team_id(raw: &str, cache: &(impl TeamCache + ?Sized)) -> Option<String> {
    if !raw.contains(FIRST_TEAM_ID_PLACEHOLDER) {
        return Some(raw.to_string());
    }

    match cache.cached_team_ids().into_iter().find(|id| !id.is_empty()) {
        Some(first) => Some(raw.replace(FIRST_TEAM_ID_PLACEHOLDER, &first)),
        None => {
            log::warn!("no cached team id to substitute into preset");
            None
        }
    }
}

fn rows_from_map(map: &IndexMap<String, String>) -> Vec<KeyValuePair> {
    map.iter().map(|(k, v)| KeyValuePair::new(k, v)).collect()
}

/// Apply `preset` to `editor` and return the tabs it touched.
pub fn apply_preset(
    editor: &mut RequestEditor,
    preset: &Preset,
    cache: &(impl TeamCache + ?Sized),
) -> Vec<EditorTab> {
    let mut touched = Vec::new();

    if let Some(method) = preset.method {
        editor.replace_method(method);
    }

    if let Some(values) = &preset.path_params {
        for (name, value) in values {
            match editor.path_params_mut().iter_mut().find(|p| &p.name == name) {
                Some(param) => param.value = resolve_team_id(value, cache).unwrap_or_default(),
                None => log::debug!("preset {} sets unknown path param {}", preset.id, name),
            }
        }
        touched.push(EditorTab::Params);
    }

    if let Some(query) = &preset.query_params {
        editor.replace_rows(RowKind::Query, rows_from_map(query));
        touched.push(EditorTab::Query);
    }

    if let Some(headers) = &preset.headers {
        editor.replace_rows(RowKind::Headers, rows_from_map(headers));
        touched.push(EditorTab::Headers);
    }

    if let Some(body) = preset.body_text() {
        editor.replace_body(body);
        touched.push(EditorTab::Body);
    }

    if let Some(session) = &preset.session {
        let context = editor.session_mut();
        if let Some(bypass) = session.bypass_team_scope {
            context.bypass_team_scope = bypass;
        }
        if let Some(team_id) = &session.team_id {
            context.team_id = resolve_team_id(team_id, cache);
        }
        if let Some(auth_type) = session.auth_type {
            context.auth_type = auth_type;
        }
        touched.push(EditorTab::Auth);
    }

    editor.markers_mut().mark_preset(&touched);
    log::debug!("applied preset {} ({} tabs)", preset.id, touched.len());
    touched
}

/// Presets grouped by endpoint path.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PresetCatalog {
    by_path: IndexMap<String, Vec<Preset>>,
}

impl PresetCatalog {
    pub fn from_json(raw: &str) -> Result<Self, ExplorerError> {
        let by_path: IndexMap<String, Vec<Preset>> = serde_json::from_str(raw)?;
        Ok(Self { by_path })
    }

    pub fn from_file(path: &Path) -> Result<Self, ExplorerError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn for_endpoint(&self, path: &str) -> &[Preset] {
        self.by_path.get(path).map(|p| p.as_slice()).unwrap_or(&[])
    }

    pub fn find(&self, path: &str, id: &str) -> Result<&Preset, ExplorerError> {
        self.for_endpoint(path)
            .iter()
            .find(|p| p.id == id)
            .ok_or_else(|| ExplorerError::NotFound(format!("no preset {} for {}", id, path)))
    }

    /// Layer `other` on top: presets with the same id on the same path are replaced.
    pub fn merge(&mut self, other: PresetCatalog) {
        for (path, presets) in other.by_path {
            let existing = self.by_path.entry(path).or_default();
            for preset in presets {
                match existing.iter_mut().find(|p| p.id == preset.id) {
                    Some(slot) => *slot = preset,
                    None => existing.push(preset),
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.by_path.values().map(|p| p.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::SessionContext;

    fn editor_for(path: &str) -> RequestEditor {
        let mut editor = RequestEditor::new(SessionContext::default());
        editor.select_path(path);
        editor
    }

    fn preset(raw: &str) -> Preset {
        serde_json::from_str(raw).unwrap()
    }

    fn no_teams() -> Vec<String> {
        vec![]
    }

    // ============ apply_preset tests ============

    #[test]
    fn test_headers_replace_existing_rows() {
        let mut editor = editor_for("/api/v1/users");
        editor.add_row(RowKind::Headers, "X-Old", "1");
        editor.add_row(RowKind::Headers, "X-Other", "2");

        let p = preset(r#"{"id": "p", "name": "P", "headers": {"X-Test": "1"}}"#);
        apply_preset(&mut editor, &p, &no_teams());

        assert_eq!(editor.headers().len(), 1);
        assert_eq!(editor.headers()[0].key, "X-Test");
        assert_eq!(editor.headers()[0].value, "1");
        assert!(editor.headers()[0].enabled);
    }

    #[test]
    fn test_path_params_merged_by_name() {
        let mut editor = editor_for("/api/v1/teams/[teamId]/users/[id]");
        editor.set_path_param("teamId", "t1").unwrap();
        editor.set_path_param("id", "old").unwrap();

        let p = preset(r#"{"id": "p", "name": "P", "path_params": {"id": "42", "ghost": "x"}}"#);
        apply_preset(&mut editor, &p, &no_teams());

        assert_eq!(editor.url(), "/api/v1/teams/t1/users/42");
        assert_eq!(editor.path_params().len(), 2);
    }

    #[test]
    fn test_unspecified_fields_untouched() {
        let mut editor = editor_for("/api/v1/items");
        editor.set_body(r#"{"keep":true}"#);
        editor.add_row(RowKind::Query, "page", "1");

        let p = preset(r#"{"id": "p", "name": "P", "method": "POST"}"#);
        let touched = apply_preset(&mut editor, &p, &no_teams());

        assert!(touched.is_empty());
        assert_eq!(editor.method(), HttpMethod::POST);
        assert_eq!(editor.body(), r#"{"keep":true}"#);
        assert_eq!(editor.query_params().len(), 1);
        assert!(editor.markers().is_edited(EditorTab::Body));
    }

    #[test]
    fn test_body_value_and_raw_string() {
        let mut editor = editor_for("/api/v1/items");
        let p = preset(r#"{"id": "p", "name": "P", "body": {"name": "widget"}}"#);
        apply_preset(&mut editor, &p, &no_teams());
        assert_eq!(
            serde_json::from_str::<serde_json::Value>(editor.body()).unwrap(),
            serde_json::json!({"name": "widget"})
        );

        let p = preset(r#"{"id": "p", "name": "P", "body": "{\"raw\": 1}"}"#);
        apply_preset(&mut editor, &p, &no_teams());
        assert_eq!(editor.body(), r#"{"raw": 1}"#);
    }

    #[test]
    fn test_markers_switch_to_preset_then_back_on_edit() {
        let mut editor = editor_for("/api/v1/items");
        editor.add_row(RowKind::Headers, "X-Old", "1");
        assert!(editor.markers().is_edited(EditorTab::Headers));

        let p = preset(r#"{"id": "p", "name": "P", "headers": {"X-Test": "1"}, "query_params": {"q": "a"}}"#);
        let touched = apply_preset(&mut editor, &p, &no_teams());
        assert_eq!(touched, vec![EditorTab::Query, EditorTab::Headers]);
        assert!(!editor.markers().is_edited(EditorTab::Headers));
        assert!(editor.markers().is_preset_modified(EditorTab::Headers));
        assert!(editor.markers().is_preset_modified(EditorTab::Query));

        let id = editor.headers()[0].id.clone();
        editor
            .update_row(RowKind::Headers, &id, None, Some("2".to_string()))
            .unwrap();
        assert!(!editor.markers().is_preset_modified(EditorTab::Headers));
        assert!(editor.markers().is_edited(EditorTab::Headers));
        assert!(editor.markers().is_preset_modified(EditorTab::Query));
    }

    #[test]
    fn test_session_override_resolves_first_team() {
        let mut editor = editor_for("/api/v1/items");
        let p = preset(
            r#"{"id": "p", "name": "P", "session": {"team_id": "{{FIRST_TEAM_ID}}", "bypass_team_scope": false, "auth_type": "apiKey"}}"#,
        );
        let teams = vec!["team_a".to_string(), "team_b".to_string()];
        apply_preset(&mut editor, &p, &teams);

        let session = editor.session();
        assert_eq!(session.team_id.as_deref(), Some("team_a"));
        assert_eq!(session.auth_type, AuthType::ApiKey);
        assert!(!session.bypass_team_scope);
        assert!(editor.markers().is_preset_modified(EditorTab::Auth));
    }

    #[test]
    fn test_first_team_placeholder_in_path_params() {
        let mut editor = editor_for("/api/v1/teams/:teamId/members");
        let p = preset(r#"{"id": "p", "name": "P", "path_params": {"teamId": "{{FIRST_TEAM_ID}}"}}"#);

        apply_preset(&mut editor, &p, &no_teams());
        assert_eq!(editor.validate(), vec!["teamId is required".to_string()]);

        apply_preset(&mut editor, &p, &vec!["team_a".to_string()]);
        assert_eq!(editor.url(), "/api/v1/teams/team_a/members");
    }

    #[test]
    fn test_first_team_placeholder_without_cache() {
        assert_eq!(resolve_team_id("{{FIRST_TEAM_ID}}", &no_teams()), None);
        assert_eq!(resolve_team_id("team_x", &no_teams()), Some("team_x".to_string()));
    }

    // ============ PresetCatalog tests ============

    const CATALOG: &str = r#"{
        "/api/v1/users": [
            {"id": "list", "name": "List users", "query_params": {"page": "1"}},
            {"id": "create", "name": "Create user", "method": "POST", "body": {"email": "a@example.com"}}
        ]
    }"#;

    #[test]
    fn test_catalog_lookup() {
        let catalog = PresetCatalog::from_json(CATALOG).unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.for_endpoint("/api/v1/users").len(), 2);
        assert!(catalog.for_endpoint("/api/v1/none").is_empty());
        assert_eq!(catalog.find("/api/v1/users", "create").unwrap().method, Some(HttpMethod::POST));
        assert!(catalog.find("/api/v1/users", "missing").is_err());
    }

    #[test]
    fn test_catalog_merge_replaces_by_id() {
        let mut catalog = PresetCatalog::from_json(CATALOG).unwrap();
        let overlay = PresetCatalog::from_json(
            r#"{
                "/api/v1/users": [{"id": "list", "name": "List page 2", "query_params": {"page": "2"}}],
                "/api/v1/teams": [{"id": "all", "name": "All teams"}]
            }"#,
        )
        .unwrap();
        catalog.merge(overlay);

        assert_eq!(catalog.len(), 3);
        assert_eq!(catalog.find("/api/v1/users", "list").unwrap().name, "List page 2");
        assert_eq!(catalog.for_endpoint("/api/v1/teams").len(), 1);
    }
}
