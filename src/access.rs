//! Passphrase-derived access levels for encrypted channel sections.

use bitflags::bitflags;

bitflags! {
    /// Which encrypted sections a supplied passphrase unlocks. Level 1 is the
    /// minimum required to read any sample data; level 2 and level 3 gate
    /// additional metadata sections this crate does not otherwise interpret.
    pub struct AccessLevel: u8 {
        const NONE   = 0b000;
        const LEVEL1 = 0b001;
        const LEVEL2 = 0b010;
        const LEVEL3 = 0b100;
    }
}

/// Declares which sections, if any, a channel requires a passphrase for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequiredAccess {
    /// No encryption; any passphrase (including none) is sufficient.
    None,
    /// Section 2 encryption; requires at least level 1 access.
    Section2,
    /// Section 3 encryption; requires at least level 1 access.
    Section3,
}

impl Default for RequiredAccess {
    fn default() -> Self {
        RequiredAccess::None
    }
}

impl RequiredAccess {
    /// True when `granted` satisfies this channel's requirement, per §4.3:
    /// section-2/section-3 encryption needs at least level-1 access.
    pub fn is_satisfied_by(self, granted: AccessLevel) -> bool {
        match self {
            RequiredAccess::None => true,
            RequiredAccess::Section2 | RequiredAccess::Section3 => {
                granted.contains(AccessLevel::LEVEL1)
            }
        }
    }
}

/// Derives the access level a passphrase grants. Out of scope is the actual
/// cryptographic verification of the passphrase against the archive's stored
/// key material — that lives in the block decompression primitive assumed
/// available per the purpose/scope notes. This derives the coarse level used
/// only to decide whether `password_needed` must be raised.
pub fn access_level_for_passphrase(passphrase: Option<&str>) -> AccessLevel {
    match passphrase {
        Some(p) if !p.is_empty() => AccessLevel::LEVEL1,
        _ => AccessLevel::NONE,
    }
}
