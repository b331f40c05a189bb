//! Executable instance derivation
//!
//! Pure functions over a configuration document. Nothing here caches; callers
//! re-derive after every document change.

use indexmap::IndexMap;

use crate::types::{
    EdgeConfig, ExecutableInstance, InstalledServer, LaunchConfig, BUILTIN_SERVER_ID,
    DEFAULT_COMMAND,
};

/// Fuse each installed record with its launch definition.
///
/// The built-in instance always comes first, exactly once, whether or not the
/// document lists it. Remaining instances follow `installedMCPs` order.
pub fn executable_instances<F>(document: &EdgeConfig, is_installing: F) -> Vec<ExecutableInstance>
where
    F: Fn(&str) -> bool,
{
    let builtin_env = document
        .installed_servers
        .get(BUILTIN_SERVER_ID)
        .map(|record| record.env.clone())
        .unwrap_or_default();

    let mut instances = Vec::with_capacity(document.installed_servers.len() + 1);
    instances.push(ExecutableInstance::builtin(builtin_env));

    for (server_id, record) in &document.installed_servers {
        if server_id == BUILTIN_SERVER_ID {
            continue;
        }
        let mut instance = fuse(document, server_id, record);
        instance.installing = is_installing(server_id);
        instances.push(instance);
    }
    instances
}

fn fuse(document: &EdgeConfig, server_id: &str, record: &InstalledServer) -> ExecutableInstance {
    let launch = document.launch_definition(server_id);

    let command = launch
        .map(|l| l.command.as_str())
        .filter(|c| !c.is_empty())
        .or_else(|| record.command.as_deref().filter(|c| !c.is_empty()))
        .unwrap_or(DEFAULT_COMMAND)
        .to_string();

    let args = match launch {
        Some(l) => l.args.clone(),
        None => record.args.clone().unwrap_or_default(),
    };

    // Launch config wins on key collision: it is what actually gets executed.
    let mut env = record.env.clone();
    if let Some(l) = launch {
        env.extend(l.env.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    ExecutableInstance {
        server_id: server_id.to_string(),
        display_id: record.display_id().to_string(),
        command,
        args,
        env,
        status: record.status.clone(),
        tools: record.tools.clone(),
        registry_id: record.registry_id.clone(),
        installing: false,
    }
}

/// Copies of both server maps without `server_id`; `document` is left untouched.
pub fn without_server(
    document: &EdgeConfig,
    server_id: &str,
) -> (IndexMap<String, InstalledServer>, LaunchConfig) {
    let installed = document
        .installed_servers
        .iter()
        .filter(|(id, _)| id.as_str() != server_id)
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect();

    let launch_config = LaunchConfig {
        servers: document
            .launch_config
            .servers
            .iter()
            .filter(|(id, _)| id.as_str() != server_id)
            .map(|(id, def)| (id.clone(), def.clone()))
            .collect(),
        extra: document.launch_config.extra.clone(),
    };

    (installed, launch_config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{LaunchDefinition, BUILTIN_COMMAND};
    use std::collections::BTreeMap;

    fn env(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    fn record(server_id: &str) -> InstalledServer {
        InstalledServer {
            server_id: server_id.to_string(),
            status: "READY".to_string(),
            ..InstalledServer::default()
        }
    }

    fn document_with(ids: &[&str]) -> EdgeConfig {
        let mut doc = EdgeConfig::default();
        for id in ids {
            doc.installed_servers.insert((*id).to_string(), record(id));
            doc.launch_config.servers.insert(
                (*id).to_string(),
                LaunchDefinition::new("npx", vec![(*id).to_string()], BTreeMap::new()),
            );
        }
        doc
    }

    #[test]
    fn launch_env_wins_on_collision() {
        let mut doc = EdgeConfig::default();
        let mut rec = record("svc");
        rec.env = env(&[("A", "1"), ("B", "2")]);
        doc.installed_servers.insert("svc".to_string(), rec);
        doc.launch_config.servers.insert(
            "svc".to_string(),
            LaunchDefinition::new("npx", Vec::new(), env(&[("B", "9"), ("C", "3")])),
        );

        let instances = executable_instances(&doc, |_| false);
        let svc = instances.iter().find(|i| i.server_id == "svc").unwrap();
        assert_eq!(svc.env, env(&[("A", "1"), ("B", "9"), ("C", "3")]));
    }

    #[test]
    fn derivation_is_idempotent() {
        let doc = document_with(&["a", "b"]);
        let first = executable_instances(&doc, |id| id == "a");
        let second = executable_instances(&doc, |id| id == "a");
        assert_eq!(first, second);
    }

    #[test]
    fn builtin_is_always_present_exactly_once() {
        let empty = executable_instances(&EdgeConfig::default(), |_| false);
        assert_eq!(empty.len(), 1);
        assert!(empty[0].is_builtin());

        let mut doc = document_with(&["a"]);
        let mut builtin = record(BUILTIN_SERVER_ID);
        builtin.env = env(&[("WORKDIR", "/tmp")]);
        builtin.command = Some("ignored".to_string());
        doc.installed_servers
            .insert(BUILTIN_SERVER_ID.to_string(), builtin);

        let instances = executable_instances(&doc, |_| false);
        let builtins: Vec<_> = instances.iter().filter(|i| i.is_builtin()).collect();
        assert_eq!(builtins.len(), 1);
        assert_eq!(builtins[0].command, BUILTIN_COMMAND);
        assert!(builtins[0].args.is_empty());
        assert_eq!(builtins[0].env, env(&[("WORKDIR", "/tmp")]));
    }

    #[test]
    fn falls_back_to_record_then_default_command() {
        let mut doc = EdgeConfig::default();
        let mut with_cmd = record("with-cmd");
        with_cmd.command = Some("python".to_string());
        with_cmd.args = Some(vec!["server.py".to_string()]);
        doc.installed_servers.insert("with-cmd".to_string(), with_cmd);
        doc.installed_servers.insert("bare".to_string(), record("bare"));

        let instances = executable_instances(&doc, |_| false);
        let with_cmd = instances.iter().find(|i| i.server_id == "with-cmd").unwrap();
        assert_eq!(with_cmd.command, "python");
        assert_eq!(with_cmd.args, vec!["server.py".to_string()]);

        let bare = instances.iter().find(|i| i.server_id == "bare").unwrap();
        assert_eq!(bare.command, DEFAULT_COMMAND);
        assert!(bare.args.is_empty());
    }

    #[test]
    fn launch_command_preferred_over_record() {
        let mut doc = document_with(&["a"]);
        doc.installed_servers.get_mut("a").unwrap().command = Some("stale".to_string());
        let instances = executable_instances(&doc, |_| false);
        assert_eq!(instances[1].command, "npx");
        assert_eq!(instances[1].args, vec!["a".to_string()]);
    }

    #[test]
    fn installing_flag_comes_from_pending_set() {
        let doc = document_with(&["a", "b"]);
        let instances = executable_instances(&doc, |id| id == "b");
        assert!(!instances.iter().find(|i| i.server_id == "a").unwrap().installing);
        assert!(instances.iter().find(|i| i.server_id == "b").unwrap().installing);
    }

    #[test]
    fn display_id_defaults_to_server_id() {
        let mut doc = document_with(&["a", "b"]);
        doc.installed_servers.get_mut("b").unwrap().display_id = Some("Bee".to_string());
        let instances = executable_instances(&doc, |_| false);
        assert_eq!(instances[1].display_id, "a");
        assert_eq!(instances[2].display_id, "Bee");
    }

    #[test]
    fn instances_follow_document_order() {
        let doc = document_with(&["zeta", "alpha", "mid"]);
        let ids: Vec<String> = executable_instances(&doc, |_| false)
            .into_iter()
            .map(|i| i.server_id)
            .collect();
        assert_eq!(ids, vec![BUILTIN_SERVER_ID, "zeta", "alpha", "mid"]);
    }

    #[test]
    fn removal_keeps_order_of_the_rest() {
        let doc = document_with(&["zeta", "alpha", "mid"]);
        let (installed, launch) = without_server(&doc, "alpha");
        assert_eq!(installed.keys().collect::<Vec<_>>(), vec!["zeta", "mid"]);
        assert_eq!(launch.servers.keys().collect::<Vec<_>>(), vec!["zeta", "mid"]);
    }

    #[test]
    fn removal_produces_new_maps_and_keeps_original() {
        let doc = document_with(&["a", "b"]);
        let saved = doc.clone();

        let (installed, launch) = without_server(&doc, "b");

        assert_eq!(installed.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(launch.servers.keys().collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(doc, saved);
        assert!(doc.installed_servers.contains_key("b"));
    }
}
