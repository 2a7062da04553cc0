//! # Inbound Port - VirtualRoutingApi
//!
//! Driving port used by the method dispatcher for the virtual-app methods.
//! Updates of an installed virtual app go through the lifecycle manager
//! like any other app; only their transport differs.

use crate::domain::RouterError;
use async_trait::async_trait;
use shared_types::{
    InstallResult, InstallVirtualParams, ProposeInstallResult, ProposeInstallVirtualParams,
    UninstallParams, UninstallResult,
};

#[async_trait]
pub trait VirtualRoutingApi: Send + Sync {
    /// Propose an app to a peer reached through `intermediaries`. Every hop
    /// checks its collateral before passing the proposal on.
    async fn propose_install_virtual(
        &self,
        params: ProposeInstallVirtualParams,
    ) -> Result<ProposeInstallResult, RouterError>;

    /// Install a pending virtual proposal on every hop, or on none.
    ///
    /// # Errors
    /// - `InvalidRoute`: `intermediaries` differs from the proposal's
    async fn install_virtual(
        &self,
        params: InstallVirtualParams,
    ) -> Result<InstallResult, RouterError>;

    /// Release the app at every hop. Final balances are keyed by the ends.
    async fn uninstall_virtual(
        &self,
        params: UninstallParams,
    ) -> Result<UninstallResult, RouterError>;
}
