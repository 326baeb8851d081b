#![allow(dead_code)]

/// Side-effecting actions routed through the permission gate. The set is
/// fixed; action strings outside it are auto-approved (see [`gate_allows`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatedAction {
    FileWrite,
    FileDelete,
    FileRename,
    FileMove,
    ProcessExecute,
    NetworkRequest,
    DeployTrigger,
    ConfigModify,
    SystemInstall,
}

impl GatedAction {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "file:write" => Some(Self::FileWrite),
            "file:delete" => Some(Self::FileDelete),
            "file:rename" => Some(Self::FileRename),
            "file:move" => Some(Self::FileMove),
            "process:execute" => Some(Self::ProcessExecute),
            "network:request" => Some(Self::NetworkRequest),
            "deploy:trigger" => Some(Self::DeployTrigger),
            "config:modify" => Some(Self::ConfigModify),
            "system:install" => Some(Self::SystemInstall),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FileWrite => "file:write",
            Self::FileDelete => "file:delete",
            Self::FileRename => "file:rename",
            Self::FileMove => "file:move",
            Self::ProcessExecute => "process:execute",
            Self::NetworkRequest => "network:request",
            Self::DeployTrigger => "deploy:trigger",
            Self::ConfigModify => "config:modify",
            Self::SystemInstall => "system:install",
        }
    }
}

/// Collaborator interface: decides whether a gated action may run. The
/// engine never caches decisions; every call reaches the gate.
pub trait PermissionGate: Send + Sync {
    fn may_perform(&self, action: GatedAction, details: &str) -> bool;
}

/// Gate check for a raw action string. Unknown actions are auto-approved.
pub fn gate_allows(gate: &dyn PermissionGate, action: &str, details: &str) -> bool {
    match GatedAction::parse(action) {
        Some(a) => gate.may_perform(a, details),
        None => true,
    }
}

/// Approves everything. Used by headless runs started with `-y`.
pub struct AllowAll;

impl PermissionGate for AllowAll {
    fn may_perform(&self, _action: GatedAction, _details: &str) -> bool {
        true
    }
}

/// Denies every gated action. Default for headless runs without `-y`;
/// unknown (ungated) actions still pass through [`gate_allows`].
pub struct DenyAll;

impl PermissionGate for DenyAll {
    fn may_perform(&self, _action: GatedAction, _details: &str) -> bool {
        false
    }
}
