// Copyright (c) 2026 NAS Orchestrator Contributors
// SPDX-License-Identifier: AGPL-3.0
//! Account Reconciler
//!
//! Drives each share user through its status machine:
//!
//! | Status | Action | Next |
//! |--------|--------|------|
//! | `init` | create OS account, create share account with password | `active` |
//! | `active` | verify both accounts exist, recreate if missing | `active` |
//! | `changing_pwd` | push new password to the share account | `active` |
//! | `deleting` | remove share account, remove OS account, delete record | (gone) |
//!
//! A status only advances after every remote step for the record succeeded.
//! Failures are logged per record and the pass continues.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Share user account convergence

use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use crate::application::errors::SyncError;
use crate::application::reconciler::{Reconciler, SyncOutcome};
use crate::application::single_flight::SingleFlight;
use crate::domain::host::resolve_address;
use crate::domain::host_command::HostCommand;
use crate::domain::lifecycle::Lifecycle;
use crate::domain::remote::{RemoteExecError, RemoteExecutor};
use crate::domain::repository::ShareUserRepository;
use crate::domain::share_user::{ShareUser, ShareUserStatus};

const OS_USER_MISSING: &str = "no such user";
const SHARE_ACCOUNT_MISSING: &str = "not found";

pub struct AccountReconciler {
    users: Arc<dyn ShareUserRepository>,
    executor: Arc<dyn RemoteExecutor>,
    guard: SingleFlight,
}

impl AccountReconciler {
    pub fn new(users: Arc<dyn ShareUserRepository>, executor: Arc<dyn RemoteExecutor>) -> Self {
        Self {
            users,
            executor,
            guard: SingleFlight::new(),
        }
    }

    pub async fn sync(&self) -> Result<SyncOutcome, SyncError> {
        let Some(_running) = self.guard.try_enter() else {
            debug!("Account sync already running, skipping");
            return Ok(SyncOutcome::Busy);
        };

        let users = self.users.list_all().await?;
        for user in &users {
            if let Err(e) = self.sync_user(user).await {
                error!(
                    host = %user.host_id,
                    user = %user.username,
                    status = user.status.as_str(),
                    error = %e,
                    output = e.output(),
                    "Account sync failed"
                );
            }
        }
        Ok(SyncOutcome::Completed)
    }

    pub async fn sync_user(&self, user: &ShareUser) -> Result<(), SyncError> {
        match user.status {
            ShareUserStatus::Init => {
                self.create_accounts(user).await?;
                self.advance(user, ShareUserStatus::Active).await
            }
            ShareUserStatus::Active => self.heal(user).await,
            ShareUserStatus::ChangingPassword => {
                self.set_password(user).await?;
                self.advance(user, ShareUserStatus::Active).await
            }
            ShareUserStatus::Deleting => self.delete_accounts(user).await,
        }
    }

    async fn heal(&self, user: &ShareUser) -> Result<(), SyncError> {
        let host = resolve_address(user.host_id.as_str());

        let os_user = self
            .executor
            .run(host, &HostCommand::LookupOsUser { username: user.username.clone() })
            .await;
        if let Err(e) = os_user {
            if !e.mentions(OS_USER_MISSING) {
                return Err(SyncError::remote(host, e));
            }
            warn!(host, user = %user.username, "OS account missing, recreating");
            return self.create_accounts(user).await;
        }

        let account = self
            .executor
            .run(host, &HostCommand::LookupShareAccount { username: user.username.clone() })
            .await;
        if let Err(e) = account {
            if !e.mentions(SHARE_ACCOUNT_MISSING) {
                return Err(SyncError::remote(host, e));
            }
            warn!(host, user = %user.username, "Share account missing, recreating");
            return self.create_accounts(user).await;
        }

        Ok(())
    }

    async fn create_accounts(&self, user: &ShareUser) -> Result<(), SyncError> {
        let host = resolve_address(user.host_id.as_str());
        self.executor
            .run(host, &HostCommand::EnsureOsUser { username: user.username.clone() })
            .await
            .map_err(|e| SyncError::remote(host, e))?;
        self.set_password(user).await?;
        info!(host, user = %user.username, "Share user created");
        Ok(())
    }

    async fn set_password(&self, user: &ShareUser) -> Result<(), SyncError> {
        let host = resolve_address(user.host_id.as_str());
        self.executor
            .run(
                host,
                &HostCommand::SetSharePassword {
                    username: user.username.clone(),
                    password: user.password.clone(),
                },
            )
            .await
            .map_err(|e| SyncError::remote(host, e))?;
        Ok(())
    }

    async fn delete_accounts(&self, user: &ShareUser) -> Result<(), SyncError> {
        let host = resolve_address(user.host_id.as_str());
        let username = user.username.clone();

        if self
            .is_present(host, HostCommand::CountShareAccount { username: username.clone() })
            .await?
        {
            self.executor
                .run(host, &HostCommand::DeleteShareAccount { username: username.clone() })
                .await
                .map_err(|e| SyncError::remote(host, e))?;
        }

        if self
            .is_present(host, HostCommand::CountOsUser { username: username.clone() })
            .await?
        {
            self.executor
                .run(host, &HostCommand::DeleteOsUser { username: username.clone() })
                .await
                .map_err(|e| SyncError::remote(host, e))?;
        }

        let deleted = self.users.delete(user.id, ShareUserStatus::Deleting).await?;
        if deleted == 0 {
            warn!(host, user = %username, "Share user left deleting state before removal");
        } else {
            info!(host, user = %username, "Share user deleted");
        }
        Ok(())
    }

    /// Runs a counting command and reports whether the count is non-zero.
    async fn is_present(&self, host: &str, cmd: HostCommand) -> Result<bool, SyncError> {
        let output = self
            .executor
            .run(host, &cmd)
            .await
            .map_err(|e| SyncError::remote(host, e))?;
        let count: u64 = output.trim().parse().map_err(|_| {
            SyncError::remote(
                host,
                RemoteExecError::exec_failed("unexpected count output", output.clone()),
            )
        })?;
        Ok(count > 0)
    }

    async fn advance(&self, user: &ShareUser, next: ShareUserStatus) -> Result<(), SyncError> {
        user.status.transition(next)?;
        let updated = self
            .users
            .update_status(&[user.id], &[user.status], next)
            .await?;
        if updated == 0 {
            debug!(user = %user.username, "Status changed concurrently, leaving it alone");
        } else {
            debug!(user = %user.username, from = user.status.as_str(), to = next.as_str(), "Status advanced");
        }
        Ok(())
    }
}

#[async_trait]
impl Reconciler for AccountReconciler {
    fn name(&self) -> &'static str {
        "share_users"
    }

    async fn reconcile(&self) -> Result<SyncOutcome, SyncError> {
        self.sync().await
    }
}
