use std::fmt;

use crate::control::Version;

/// A control block directive key.
///
/// Keys are resolved once per line. Anything that is not a known key maps to
/// [`Directive::Unrecognized`] and is reported as a directive error.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Directive {
    Version,
    OpsManager,
    SplitRestaurant,
    BackupDriver,
    AltMealOptions,
    AltGroceryOptions,
    StartTimes,
    PickupManagers,
    Unrecognized(String),
}

const KEYS: &[(&str, Directive)] = &[
    ("version", Directive::Version),
    ("ops-manager", Directive::OpsManager),
    ("split-restaurant", Directive::SplitRestaurant),
    ("backup-driver", Directive::BackupDriver),
    ("alt-meal-options", Directive::AltMealOptions),
    ("alt-grocery-options", Directive::AltGroceryOptions),
    ("start-times", Directive::StartTimes),
    ("pickup-managers", Directive::PickupManagers),
];

impl Directive {
    /// Resolves a key, ignoring ASCII case.
    pub fn from_key(key: &str) -> Self {
        KEYS.iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, d)| d.clone())
            .unwrap_or_else(|| Self::Unrecognized(key.to_owned()))
    }

    /// The canonical key as written in a control block.
    pub fn key(&self) -> &str {
        match self {
            Self::Unrecognized(key) => key,
            known => KEYS
                .iter()
                .find(|(_, d)| d == known)
                .map_or("", |(k, _)| k),
        }
    }

    /// Whether this directive is defined by the given version.
    pub fn allowed_in(&self, version: Version) -> bool {
        match self {
            Self::Version | Self::OpsManager | Self::SplitRestaurant | Self::BackupDriver => true,
            Self::AltMealOptions
            | Self::AltGroceryOptions
            | Self::StartTimes
            | Self::PickupManagers => version >= Version::V300,
            Self::Unrecognized(_) => false,
        }
    }

    /// Whether the directive may only appear once per block. All others
    /// accumulate across lines.
    pub fn is_unique(&self) -> bool {
        matches!(self, Self::Version | Self::OpsManager)
    }
}

impl fmt::Display for Directive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}
