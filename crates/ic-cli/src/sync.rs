//! File-backed synchronization commands

use std::fs;

use async_trait::async_trait;

use ic_sync::{
    FileProfileStore, FileRuleStore, MemoryProfileStore, Message, Notifier, SyncConfig, SyncOutcome, Synchronizer,
};

/// Routes UI notifications to the log.
struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, message: Message) {
        match message {
            Message::RuleError { error } => log::error!("rule error: {error}"),
            other => log::info!("notification: {other:?}"),
        }
    }
}

fn runtime() -> Result<tokio::runtime::Runtime, String> {
    tokio::runtime::Runtime::new().map_err(|e| format!("Failed to start tokio runtime: {}", e))
}

fn load_config(path: Option<&str>) -> Result<SyncConfig, String> {
    let Some(path) = path else {
        return Ok(SyncConfig::default());
    };
    let text = fs::read_to_string(path).map_err(|e| format!("Failed to read '{}': {}", path, e))?;
    SyncConfig::from_json(&text).map_err(|e| format!("Invalid config '{}': {}", path, e))
}

pub fn cmd_sync(profiles: &str, rules: &str, config: Option<&str>) -> Result<(), String> {
    let config = load_config(config)?;
    let synchronizer = Synchronizer::new(FileRuleStore::new(rules), FileProfileStore::new(profiles), LogNotifier)
        .with_config(config);

    let outcome = runtime()?
        .block_on(synchronizer.sync())
        .map_err(|e| format!("Synchronization failed: {}", e))?;

    match outcome {
        SyncOutcome::Applied { rule_count } => println!("Installed {rule_count} rules into '{rules}'"),
        SyncOutcome::Disabled => println!("Enforcement is disabled; '{rules}' cleared"),
        SyncOutcome::NoActiveProfile => println!("No active profile; '{rules}' cleared"),
    }
    Ok(())
}

pub fn cmd_clear(rules: &str) -> Result<(), String> {
    let synchronizer = Synchronizer::new(FileRuleStore::new(rules), MemoryProfileStore::default(), LogNotifier);

    runtime()?
        .block_on(synchronizer.clear())
        .map_err(|e| format!("Failed to clear '{}': {}", rules, e))?;

    println!("Cleared '{rules}'");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ic_core::NativeRule;

    fn read_rules(path: &std::path::Path) -> Vec<NativeRule> {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn sync_then_clear_rule_file() {
        let dir = tempfile::tempdir().unwrap();
        let profiles = dir.path().join("profiles.json");
        let rules = dir.path().join("rules.json");
        fs::write(
            &profiles,
            r#"{
                "profiles": [{"id": "p", "name": "P",
                    "requestHeaders": [{"name": "X-Dev", "value": "1"}],
                    "blocks": [{"pattern": "ads.js"}]}],
                "activeProfileId": "p",
                "globalEnabled": true
            }"#,
        )
        .unwrap();

        let (profiles, rules) = (profiles.to_str().unwrap(), rules.as_path());
        cmd_sync(profiles, rules.to_str().unwrap(), None).unwrap();
        assert_eq!(read_rules(rules).len(), 2);

        cmd_sync(profiles, rules.to_str().unwrap(), None).unwrap();
        assert_eq!(read_rules(rules).len(), 2);

        cmd_clear(rules.to_str().unwrap()).unwrap();
        assert!(read_rules(rules).is_empty());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        assert!(load_config(Some("/nonexistent/sync.json")).is_err());
        assert_eq!(load_config(None).unwrap(), SyncConfig::default());
    }
}
