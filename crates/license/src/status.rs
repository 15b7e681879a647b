//! License status state machine.
//!
//! Transitions are checked in one place so the lazy-expiry path on read and
//! the administrative suspend/revoke paths cannot disagree about what is
//! allowed. `Expired` and `Revoked` are terminal; a new license must be
//! issued to restore access.

use serde::{Deserialize, Serialize};

/// Status of a stored license.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LicenseStatus {
    /// License grants access.
    #[default]
    Active,
    /// License passed its expiry; terminal for this license instance.
    Expired,
    /// Access paused by an operator; may be reactivated.
    Suspended,
    /// Access withdrawn; terminal.
    Revoked,
}

impl LicenseStatus {
    /// Whether the state machine permits moving from `self` to `to`.
    ///
    /// Self-transitions are allowed so repeated application of the same
    /// transition (e.g. concurrent lazy expiry) stays idempotent.
    pub fn can_transition(self, to: LicenseStatus) -> bool {
        use LicenseStatus::*;
        match (self, to) {
            (a, b) if a == b => true,
            (Active, Suspended) | (Active, Revoked) | (Active, Expired) => true,
            (Suspended, Active) | (Suspended, Revoked) => true,
            (Expired, _) | (Revoked, _) => false,
            _ => false,
        }
    }

    /// True for states no further transition can leave.
    pub fn is_terminal(self) -> bool {
        matches!(self, LicenseStatus::Expired | LicenseStatus::Revoked)
    }
}

impl core::fmt::Display for LicenseStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let s = match self {
            LicenseStatus::Active => "active",
            LicenseStatus::Expired => "expired",
            LicenseStatus::Suspended => "suspended",
            LicenseStatus::Revoked => "revoked",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::LicenseStatus::*;

    #[test]
    fn suspend_and_reactivate_may_cycle() {
        assert!(Active.can_transition(Suspended));
        assert!(Suspended.can_transition(Active));
    }

    #[test]
    fn revoked_and_expired_are_terminal() {
        for to in [Active, Expired, Suspended] {
            assert!(!Revoked.can_transition(to));
        }
        for to in [Active, Suspended, Revoked] {
            assert!(!Expired.can_transition(to));
        }
    }

    #[test]
    fn self_transition_is_idempotent() {
        assert!(Expired.can_transition(Expired));
        assert!(Revoked.can_transition(Revoked));
    }
}
