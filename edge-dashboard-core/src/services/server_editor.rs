//! Server editor
//!
//! Transient edit buffer for one server's launch definition. Every edit is a
//! local state change; only [`ServerEditor::save`] talks to the config store.

use std::collections::BTreeMap;
use std::fmt;

use crate::error::{CoreError, CoreResult};
use crate::services::config_store::ConfigStore;
use crate::types::{
    Candidate, ExecutableInstance, LaunchDefinition, RegistryEntry, ServerSubmission,
    DEFAULT_COMMAND,
};

/// Scalar fields editable through [`ServerEditor::set_field`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditorField {
    ServerId,
    Command,
}

/// Buffer-local identity of an env row
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnvRowId(u32);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvRow {
    pub id: EnvRowId,
    pub key: String,
    pub value: String,
}

/// Reason the buffer cannot be saved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationIssue {
    EmptyServerId,
    /// `_` is reserved as the tool-name separator on the edge
    UnderscoreInServerId,
    EmptyCommand,
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let message = match self {
            Self::EmptyServerId => "Server ID cannot be empty",
            Self::UnderscoreInServerId => "Server ID cannot contain underscores (_)",
            Self::EmptyCommand => "Command cannot be empty",
        };
        f.write_str(message)
    }
}

/// Server editor
#[derive(Debug, Clone)]
pub struct ServerEditor {
    candidate: Candidate,
    server_id: String,
    command: String,
    args: Vec<String>,
    env: Vec<EnvRow>,
    next_row: u32,
}

impl ServerEditor {
    // ===== Seeding =====

    /// Edit an installed server
    #[must_use]
    pub fn from_instance(instance: &ExecutableInstance) -> Self {
        Self::seeded(
            Candidate::Existing(instance.server_id.clone()),
            instance.server_id.clone(),
            instance.command.clone(),
            instance.args.clone(),
            &instance.env,
        )
    }

    /// Install from a catalog entry; the server id starts as the catalog id
    #[must_use]
    pub fn from_registry(entry: &RegistryEntry) -> Self {
        Self::seeded(
            Candidate::New {
                registry_id: Some(entry.registry_id.clone()),
            },
            entry.registry_id.clone(),
            entry.command.clone(),
            entry.args.clone(),
            &entry.env.to_env_map(),
        )
    }

    /// Install a server that is not in the catalog
    #[must_use]
    pub fn custom() -> Self {
        Self::seeded(
            Candidate::New { registry_id: None },
            String::new(),
            DEFAULT_COMMAND.to_string(),
            Vec::new(),
            &BTreeMap::new(),
        )
    }

    fn seeded(
        candidate: Candidate,
        server_id: String,
        command: String,
        args: Vec<String>,
        env: &BTreeMap<String, String>,
    ) -> Self {
        let mut editor = Self {
            candidate,
            server_id,
            command,
            args,
            env: Vec::with_capacity(env.len()),
            next_row: 0,
        };
        for (key, value) in env {
            editor.push_row(key.clone(), value.clone());
        }
        editor
    }

    // ===== Accessors =====

    pub fn candidate(&self) -> &Candidate {
        &self.candidate
    }

    pub fn server_id(&self) -> &str {
        &self.server_id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn args(&self) -> &[String] {
        &self.args
    }

    pub fn env_rows(&self) -> &[EnvRow] {
        &self.env
    }

    // ===== Edits =====

    pub fn set_field(&mut self, field: EditorField, value: impl Into<String>) {
        match field {
            EditorField::ServerId => self.server_id = value.into(),
            EditorField::Command => self.command = value.into(),
        }
    }

    pub fn set_arg(&mut self, index: usize, value: impl Into<String>) -> CoreResult<()> {
        let slot = self
            .args
            .get_mut(index)
            .ok_or_else(|| arg_out_of_range(index))?;
        *slot = value.into();
        Ok(())
    }

    /// Append an empty argument
    pub fn add_arg(&mut self) {
        self.args.push(String::new());
    }

    pub fn remove_arg(&mut self, index: usize) -> CoreResult<String> {
        if index >= self.args.len() {
            return Err(arg_out_of_range(index));
        }
        Ok(self.args.remove(index))
    }

    /// Append a blank row
    pub fn add_env_var(&mut self) -> EnvRowId {
        self.push_row(String::new(), String::new())
    }

    pub fn set_env_value(&mut self, id: EnvRowId, value: impl Into<String>) -> CoreResult<()> {
        self.row_mut(id)?.value = value.into();
        Ok(())
    }

    /// Change a row's key, keeping its value.
    ///
    /// Another row already holding `key` is dropped, so a key is never present twice.
    pub fn rename_env_key(&mut self, id: EnvRowId, key: impl Into<String>) -> CoreResult<()> {
        let key = key.into();
        self.row_mut(id)?;
        if !key.is_empty() {
            self.env.retain(|row| row.id == id || row.key != key);
        }
        self.row_mut(id)?.key = key;
        Ok(())
    }

    pub fn remove_env_var(&mut self, id: EnvRowId) -> CoreResult<EnvRow> {
        let index = self
            .env
            .iter()
            .position(|row| row.id == id)
            .ok_or_else(|| row_not_found(id))?;
        Ok(self.env.remove(index))
    }

    // ===== Validation / commit =====

    /// First blocking issue, if any
    pub fn validation(&self) -> Option<ValidationIssue> {
        let server_id = self.server_id.trim();
        if server_id.is_empty() {
            Some(ValidationIssue::EmptyServerId)
        } else if server_id.contains('_') {
            Some(ValidationIssue::UnderscoreInServerId)
        } else if self.command.trim().is_empty() {
            Some(ValidationIssue::EmptyCommand)
        } else {
            None
        }
    }

    pub fn can_save(&self) -> bool {
        self.validation().is_none()
    }

    /// Env as committed: blank keys dropped, later rows win on duplicate keys
    pub fn env_map(&self) -> BTreeMap<String, String> {
        self.env
            .iter()
            .filter(|row| !row.key.trim().is_empty())
            .map(|row| (row.key.trim().to_string(), row.value.clone()))
            .collect()
    }

    /// Validated buffer contents
    pub fn submission(&self) -> CoreResult<ServerSubmission> {
        if let Some(issue) = self.validation() {
            return Err(CoreError::ValidationError(issue.to_string()));
        }
        Ok(ServerSubmission {
            candidate: self.candidate.clone(),
            server_id: self.server_id.trim().to_string(),
            launch: LaunchDefinition::new(
                self.command.trim(),
                self.args.clone(),
                self.env_map(),
            ),
        })
    }

    /// Hand the buffer to the store and close it
    pub async fn save(self, store: &ConfigStore) -> CoreResult<()> {
        let submission = self.submission()?;
        store.install_or_update(submission).await
    }

    /// Discard the buffer
    pub fn cancel(self) {
        log::debug!("Discarded edits for '{}'", self.server_id);
    }

    fn push_row(&mut self, key: String, value: String) -> EnvRowId {
        let id = EnvRowId(self.next_row);
        self.next_row += 1;
        self.env.push(EnvRow { id, key, value });
        id
    }

    fn row_mut(&mut self, id: EnvRowId) -> CoreResult<&mut EnvRow> {
        self.env
            .iter_mut()
            .find(|row| row.id == id)
            .ok_or_else(|| row_not_found(id))
    }
}

fn arg_out_of_range(index: usize) -> CoreError {
    CoreError::ValidationError(format!("No argument at index {index}"))
}

fn row_not_found(id: EnvRowId) -> CoreError {
    CoreError::ValidationError(format!("No env row {}", id.0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::RegistryLookup;
    use crate::test_utils::{create_test_store, document_with_servers};
    use crate::types::EnvSpec;

    fn catalog_entry(env: EnvSpec) -> RegistryEntry {
        RegistryEntry {
            registry_id: "tavily".to_string(),
            name: "Tavily".to_string(),
            description: String::new(),
            icon: None,
            category: "Search".to_string(),
            tags: Vec::new(),
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "tavily-mcp".to_string()],
            env,
        }
    }

    fn existing() -> ServerEditor {
        let mut env = BTreeMap::new();
        env.insert("TOKEN".to_string(), "abc".to_string());
        ServerEditor::from_instance(&ExecutableInstance {
            server_id: "gmail".to_string(),
            display_id: "gmail".to_string(),
            command: "npx".to_string(),
            args: vec!["-y".to_string(), "gmail-mcp".to_string()],
            env,
            status: "READY".to_string(),
            tools: Vec::new(),
            registry_id: None,
            installing: false,
        })
    }

    #[test]
    fn required_env_names_seed_empty_values() {
        let editor = ServerEditor::from_registry(&catalog_entry(EnvSpec::Required(vec![
            "API_KEY".to_string(),
            "REGION".to_string(),
        ])));
        let env = editor.env_map();
        assert_eq!(env.len(), 2);
        assert_eq!(env["API_KEY"], "");
        assert_eq!(env["REGION"], "");
        assert!(editor.candidate().is_new());
        assert_eq!(editor.server_id(), "tavily");
    }

    #[test]
    fn default_env_mapping_is_copied() {
        let mut defaults = BTreeMap::new();
        defaults.insert("HOST".to_string(), "localhost".to_string());
        let editor = ServerEditor::from_registry(&catalog_entry(EnvSpec::Defaults(defaults.clone())));
        assert_eq!(editor.env_map(), defaults);
    }

    #[test]
    fn underscore_blocks_save() {
        let mut editor = existing();
        editor.set_field(EditorField::ServerId, "my_server");
        assert!(!editor.can_save());
        assert_eq!(
            editor.validation(),
            Some(ValidationIssue::UnderscoreInServerId)
        );
        assert!(matches!(
            editor.submission(),
            Err(CoreError::ValidationError(_))
        ));

        editor.set_field(EditorField::ServerId, "my-server");
        assert!(editor.can_save());
    }

    #[test]
    fn validation_reports_in_priority_order() {
        let mut editor = ServerEditor::custom();
        editor.set_field(EditorField::Command, "");
        assert_eq!(editor.validation(), Some(ValidationIssue::EmptyServerId));
        editor.set_field(EditorField::ServerId, "a_b");
        assert_eq!(
            editor.validation(),
            Some(ValidationIssue::UnderscoreInServerId)
        );
        editor.set_field(EditorField::ServerId, "ab");
        assert_eq!(editor.validation(), Some(ValidationIssue::EmptyCommand));
    }

    #[test]
    fn arg_edits_use_splice_semantics() {
        let mut editor = existing();
        editor.add_arg();
        assert_eq!(editor.args(), ["-y", "gmail-mcp", ""]);
        editor.set_arg(2, "--verbose").unwrap();
        assert_eq!(editor.remove_arg(0).unwrap(), "-y");
        assert_eq!(editor.args(), ["gmail-mcp", "--verbose"]);
        assert!(editor.set_arg(5, "x").is_err());
        assert!(editor.remove_arg(2).is_err());
    }

    #[test]
    fn blank_env_rows_stay_distinct() {
        let mut editor = existing();
        let first = editor.add_env_var();
        let second = editor.add_env_var();
        assert_ne!(first, second);
        assert_eq!(editor.env_rows().len(), 3);

        editor.rename_env_key(second, "REGION").unwrap();
        editor.set_env_value(second, "eu").unwrap();

        // The still-blank row is dropped on commit
        let env = editor.env_map();
        assert_eq!(env.len(), 2);
        assert_eq!(env["REGION"], "eu");
    }

    #[test]
    fn rename_env_key_keeps_value_and_old_key_is_gone() {
        let mut editor = existing();
        let id = editor.env_rows()[0].id;
        editor.rename_env_key(id, "API_TOKEN").unwrap();

        let env = editor.env_map();
        assert_eq!(env.get("API_TOKEN").map(String::as_str), Some("abc"));
        assert!(!env.contains_key("TOKEN"));
    }

    #[test]
    fn rename_onto_existing_key_replaces_that_row() {
        let mut editor = existing();
        let row = editor.add_env_var();
        editor.set_env_value(row, "xyz").unwrap();
        editor.rename_env_key(row, "TOKEN").unwrap();

        assert_eq!(editor.env_rows().len(), 1);
        assert_eq!(editor.env_map()["TOKEN"], "xyz");
    }

    #[test]
    fn removing_unknown_row_is_an_error() {
        let mut editor = existing();
        let id = editor.env_rows()[0].id;
        editor.remove_env_var(id).unwrap();
        assert!(editor.remove_env_var(id).is_err());
        assert!(editor.env_map().is_empty());
    }

    #[test]
    fn submission_trims_identity_fields() {
        let mut editor = ServerEditor::custom();
        editor.set_field(EditorField::ServerId, "  local  ");
        editor.set_field(EditorField::Command, " uvx ");
        let submission = editor.submission().unwrap();
        assert_eq!(submission.server_id, "local");
        assert_eq!(submission.launch.command, "uvx");
        assert_eq!(submission.candidate, Candidate::New { registry_id: None });
    }

    #[test]
    fn catalog_seeding_uses_builtin_lookup() {
        let lookup = RegistryLookup::builtin();
        let entry = lookup.find_by_registry_id("postgres").unwrap();
        let editor = ServerEditor::from_registry(entry);
        assert!(editor.env_map().contains_key("POSTGRES_CONNECTION_STRING"));
    }

    #[tokio::test]
    async fn save_installs_through_store() {
        let (store, channel) = create_test_store();
        let editor = ServerEditor::from_registry(&catalog_entry(EnvSpec::Required(vec![
            "TAVILY_API_KEY".to_string(),
        ])));

        editor.save(&store).await.unwrap();

        let doc = store.document().await;
        assert!(doc.contains_server("tavily"));
        assert_eq!(
            doc.installed_servers["tavily"].registry_id.as_deref(),
            Some("tavily")
        );
        assert!(store.is_installing("tavily").await);
        assert_eq!(channel.patches().await.len(), 1);
    }

    #[tokio::test]
    async fn second_install_of_same_entry_keeps_first() {
        let (store, channel) = create_test_store();
        let entry = catalog_entry(EnvSpec::Required(vec!["TAVILY_API_KEY".to_string()]));

        let mut first = ServerEditor::from_registry(&entry);
        let row = first.env_rows()[0].id;
        first.set_env_value(row, "tvly-first").unwrap();
        first.save(&store).await.unwrap();

        let second = ServerEditor::from_registry(&entry);
        let result = second.save(&store).await;

        assert!(matches!(result, Err(CoreError::ValidationError(_))));
        let doc = store.document().await;
        assert_eq!(
            doc.launch_definition("tavily").unwrap().env["TAVILY_API_KEY"],
            "tvly-first"
        );
        assert_eq!(channel.patches().await.len(), 1);
    }

    #[tokio::test]
    async fn save_edit_updates_existing_server() {
        let (store, _) = create_test_store();
        store.apply_snapshot(document_with_servers(&["gmail"])).await;

        let mut editor = existing();
        editor.add_arg();
        editor.set_arg(2, "--debug").unwrap();
        editor.save(&store).await.unwrap();

        let doc = store.document().await;
        assert_eq!(
            doc.launch_definition("gmail").unwrap().args,
            vec!["-y", "gmail-mcp", "--debug"]
        );
        assert_eq!(doc.launch_definition("gmail").unwrap().env["TOKEN"], "abc");
    }

    #[tokio::test]
    async fn invalid_buffer_never_reaches_store() {
        let (store, channel) = create_test_store();
        let mut editor = ServerEditor::custom();
        editor.set_field(EditorField::ServerId, "bad_id");

        assert!(editor.save(&store).await.is_err());
        assert!(channel.patches().await.is_empty());
    }

    #[test]
    fn cancel_has_no_side_effects() {
        existing().cancel();
    }
}
