//! Remote lifecycle statuses that the provider polls on

use serde::{Deserialize, Serialize};

/// Where a remote resource is in its asynchronous lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Still converging, keep polling
    Pending,
    /// Terminal, the resource can be read
    Ready,
    /// Terminal failure
    Failed(String),
}

/// Compute instance status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceStatus {
    Provisioning,
    Installing,
    Running,
    Stopped,
    Uninstalled,
    Rescue,
    PendingPayment,
    ManualProvisioning,
    ProductNotAvailable,
    VerificationRequired,
    ResetPassword,
    Error,
    #[serde(other)]
    Unknown,
}

impl Default for InstanceStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl InstanceStatus {
    pub fn phase(self, error_message: Option<&str>) -> Phase {
        match self {
            InstanceStatus::Provisioning | InstanceStatus::Installing => Phase::Pending,
            InstanceStatus::Error => Phase::Failed(
                error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or("instance provisioning failed")
                    .to_string(),
            ),
            _ => Phase::Ready,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            InstanceStatus::Provisioning => "provisioning",
            InstanceStatus::Installing => "installing",
            InstanceStatus::Running => "running",
            InstanceStatus::Stopped => "stopped",
            InstanceStatus::Uninstalled => "uninstalled",
            InstanceStatus::Rescue => "rescue",
            InstanceStatus::PendingPayment => "pending_payment",
            InstanceStatus::ManualProvisioning => "manual_provisioning",
            InstanceStatus::ProductNotAvailable => "product_not_available",
            InstanceStatus::VerificationRequired => "verification_required",
            InstanceStatus::ResetPassword => "reset_password",
            InstanceStatus::Error => "error",
            InstanceStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// Custom image download status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageStatus {
    Downloading,
    Downloaded,
    Error,
    #[serde(other)]
    Unknown,
}

impl Default for ImageStatus {
    fn default() -> Self {
        Self::Unknown
    }
}

impl ImageStatus {
    pub fn phase(self, error_message: Option<&str>) -> Phase {
        match self {
            ImageStatus::Downloading => Phase::Pending,
            ImageStatus::Error => Phase::Failed(
                error_message
                    .filter(|m| !m.is_empty())
                    .unwrap_or("Download error, check the url availability and retry")
                    .to_string(),
            ),
            _ => Phase::Ready,
        }
    }
}

impl std::fmt::Display for ImageStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ImageStatus::Downloading => "downloading",
            ImageStatus::Downloaded => "downloaded",
            ImageStatus::Error => "error",
            ImageStatus::Unknown => "unknown",
        };
        f.write_str(s)
    }
}
