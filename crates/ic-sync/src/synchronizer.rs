//! Full-replacement synchronization of the live rule store
//!
//! Every run removes whatever is installed, waits for the removal to become
//! visible, compiles the active profile and installs the result as a single
//! batch. A failed run leaves the store empty and tells the UI why.

use ic_compiler::{compile, RuleIdAllocator};
use ic_core::rule::{NativeRule, RuleUpdate};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::SyncConfig;
use crate::error::SyncError;
use crate::store::{Message, Notifier, ProfileStore, RuleStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The active profile is installed
    Applied { rule_count: usize },
    /// Global enforcement is off; the store is empty
    Disabled,
    /// The stored active id refers to no profile; the store is empty
    NoActiveProfile,
}

/// Answer to an inbound [`Message`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reply {
    pub success: bool,
}

pub struct Synchronizer<R, P, N> {
    rules: R,
    profiles: P,
    notifier: N,
    config: SyncConfig,
    run: Mutex<()>,
}

impl<R: RuleStore, P: ProfileStore, N: Notifier> Synchronizer<R, P, N> {
    pub fn new(rules: R, profiles: P, notifier: N) -> Self {
        Self {
            rules,
            profiles,
            notifier,
            config: SyncConfig::default(),
            run: Mutex::new(()),
        }
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn rule_store(&self) -> &R {
        &self.rules
    }

    pub fn profile_store(&self) -> &P {
        &self.profiles
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    // =========================================================================
    // Public operations
    // =========================================================================

    /// Replace the installed rules with the compiled active profile.
    ///
    /// Runs never overlap. On failure the store is emptied (best effort),
    /// a `ruleError` message is sent and the original error is returned.
    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let _run = self.run.lock().await;

        match self.run_sync().await {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                log::error!("rule synchronization failed: {err}");
                if let Err(cleanup) = self.remove_all().await {
                    log::error!("cleanup after failed synchronization also failed: {cleanup}");
                }
                self.notifier
                    .notify(Message::RuleError {
                        error: err.to_string(),
                    })
                    .await;
                Err(err)
            }
        }
    }

    /// Remove every dynamic rule.
    pub async fn clear(&self) -> Result<(), SyncError> {
        let _run = self.run.lock().await;
        let residue = self.remove_all().await?;
        if !residue.is_empty() {
            log::warn!("{} rules could not be removed", residue.len());
        }
        Ok(())
    }

    /// Dispatch a message from the UI. Messages that are not requests get
    /// no reply.
    pub async fn handle_message(&self, message: Message) -> Option<Reply> {
        match message {
            Message::UpdateRules => Some(Reply {
                success: self.sync().await.is_ok(),
            }),
            Message::RuleError { .. } => None,
        }
    }

    // =========================================================================
    // Protocol steps
    // =========================================================================

    async fn run_sync(&self) -> Result<SyncOutcome, SyncError> {
        let residue = self.remove_all().await?;

        if !self.profiles.global_enabled().await.map_err(SyncError::Profiles)? {
            log::info!("enforcement disabled, rule store left empty");
            return Ok(SyncOutcome::Disabled);
        }

        let profiles = self.profiles.load_all_profiles().await.map_err(SyncError::Profiles)?;
        let active_id = self.profiles.active_profile_id().await.map_err(SyncError::Profiles)?;
        let Some(profile) = active_id.as_deref().and_then(|id| profiles.iter().find(|p| p.id == id)) else {
            log::warn!("no active profile ({active_id:?}), rule store left empty");
            return Ok(SyncOutcome::NoActiveProfile);
        };

        let mut ids = allocator_past(&residue);
        let rules = compile(profile, &self.config.compile, &mut ids);
        let rule_count = rules.len();

        if !rules.is_empty() {
            self.rules
                .update_dynamic_rules(RuleUpdate::add(rules))
                .await
                .map_err(|source| SyncError::Install {
                    count: rule_count,
                    source,
                })?;
        }

        log::info!("installed {rule_count} rules from profile '{}'", profile.name);
        Ok(SyncOutcome::Applied { rule_count })
    }

    /// Remove everything installed and wait for the store to report empty.
    ///
    /// Returns whatever is still installed once the retries are spent.
    async fn remove_all(&self) -> Result<Vec<NativeRule>, SyncError> {
        let mut installed = self.rules.dynamic_rules().await.map_err(SyncError::Read)?;
        let mut removals = 0u32;

        while !installed.is_empty() {
            if removals > self.config.max_removal_retries {
                log::warn!("{} rules survived {removals} removals, proceeding", installed.len());
                break;
            }
            if removals > 0 {
                log::warn!("{} rules still installed after removal, retrying", installed.len());
            }

            let ids: Vec<i32> = installed.iter().map(|r| r.id).collect();
            log::debug!("removing {} installed rules", ids.len());
            self.rules
                .update_dynamic_rules(RuleUpdate::remove(ids))
                .await
                .map_err(SyncError::Remove)?;
            removals += 1;

            installed = self.wait_until_empty().await?;
        }

        Ok(installed)
    }

    async fn wait_until_empty(&self) -> Result<Vec<NativeRule>, SyncError> {
        let deadline = Instant::now() + self.config.settle_timeout;
        loop {
            let installed = self.rules.dynamic_rules().await.map_err(SyncError::Read)?;
            if installed.is_empty() || Instant::now() >= deadline {
                return Ok(installed);
            }
            tokio::time::sleep(self.config.poll_interval).await;
        }
    }
}

/// Clock-seeded ids, moved past anything a removal failed to clear.
///
/// Residue ids are also reserved, so a start that wraps past `i32::MAX`
/// still cannot collide with them.
fn allocator_past(residue: &[NativeRule]) -> RuleIdAllocator {
    let clock = RuleIdAllocator::from_clock().peek();
    let start = match residue.iter().map(|r| r.id).max() {
        Some(max) => max.checked_add(1).map_or(clock, |floor| clock.max(floor)),
        None => clock,
    };
    RuleIdAllocator::starting_at(start).skipping(residue.iter().map(|r| r.id))
}
