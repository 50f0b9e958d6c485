//! The control block: `key=value` directive lines that configure how a
//! document's templates are evaluated.
//!
//! A block is scanned once, top to bottom, into a [`ControlBlock`] whose
//! shape depends on its [`Version`]. The parsed block exposes its values to
//! templates through [`ControlBlock::bindings`] and can be cross checked
//! against the known users and restaurants with [`ControlBlock::audit`].
//!
//! ```text
//! version=300
//! ops-manager=jsmith|555-0100
//! split-restaurant=Bopshop|alice
//! backup-driver=bob, carol
//! alt-meal-options=Veg, Vegan
//! ```

mod audit;
mod directive;
mod parse;

use std::fmt;

use indexmap::IndexSet;

pub use crate::control::audit::{Catalog, Restaurant, User};
pub use crate::control::directive::Directive;
pub use crate::control::parse::ControlBlockBuilder;
use crate::listener::DocumentId;
use crate::{Context, Result, Value};

/// The protocol version of a control block.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Version {
    #[default]
    V200,
    V300,
}

/// A parsed control block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum ControlBlock {
    V200(Common),
    V300(V300Block),
}

/// The directives every version defines.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Common {
    pub(crate) document: DocumentId,
    pub(crate) ops_manager: Option<OpsManager>,
    pub(crate) split_restaurants: Vec<SplitRestaurant>,
    pub(crate) backup_drivers: Vec<BackupDriver>,
}

/// A version 300 block.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct V300Block {
    pub(crate) common: Common,
    pub(crate) alt_meal_options: Vec<String>,
    pub(crate) alt_grocery_options: Vec<String>,
    pub(crate) start_times: Vec<String>,
    pub(crate) pickup_managers: Vec<PickupManager>,
}

/// `ops-manager=UserName|Phone`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OpsManager {
    pub(crate) user_name: String,
    pub(crate) phone: String,
    pub(crate) line: usize,
}

/// `split-restaurant=Restaurant|CleanupDriver`
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct SplitRestaurant {
    pub(crate) restaurant: String,
    pub(crate) cleanup_driver: String,
    pub(crate) line: usize,
}

/// One user named by `backup-driver`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct BackupDriver {
    pub(crate) user_name: String,
    pub(crate) line: usize,
}

/// One `UserName|Restaurant` pair named by `pickup-managers`.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PickupManager {
    pub(crate) user_name: String,
    pub(crate) restaurant: String,
    pub(crate) line: usize,
}

impl Version {
    /// The number written in a `version=` directive.
    pub fn number(self) -> u16 {
        match self {
            Self::V200 => 200,
            Self::V300 => 300,
        }
    }

    pub fn from_number(n: &str) -> Option<Self> {
        match n {
            "200" => Some(Self::V200),
            "300" => Some(Self::V300),
            _ => None,
        }
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

impl ControlBlock {
    /// Parses a control block, detecting the version from a leading
    /// `version=` line. Blocks without one are version 200.
    ///
    /// Every directive error in the block is reported in one [`Error`][crate::Error]
    /// of kind [`Directive`][crate::ErrorKind::Directive].
    pub fn parse(text: &str, document: DocumentId) -> Result<Self> {
        ControlBlockBuilder::new(text, document).scan()
    }

    /// Parses a control block as the given version. A `version=` line that
    /// names a different version is a directive error.
    pub fn parse_version(text: &str, document: DocumentId, version: Version) -> Result<Self> {
        ControlBlockBuilder::new(text, document)
            .with_version(version)
            .scan()
    }

    pub fn version(&self) -> Version {
        match self {
            Self::V200(_) => Version::V200,
            Self::V300(_) => Version::V300,
        }
    }

    /// The directives shared by every version.
    pub fn common(&self) -> &Common {
        match self {
            Self::V200(common) => common,
            Self::V300(block) => &block.common,
        }
    }

    pub fn document(&self) -> &DocumentId {
        &self.common().document
    }

    pub fn ops_manager(&self) -> Option<&OpsManager> {
        self.common().ops_manager.as_ref()
    }

    pub fn split_restaurants(&self) -> &[SplitRestaurant] {
        &self.common().split_restaurants
    }

    pub fn backup_drivers(&self) -> &[BackupDriver] {
        &self.common().backup_drivers
    }

    /// Alternate meal options in the order listed, duplicates included.
    /// Always empty before version 300.
    pub fn alt_meal_options(&self) -> &[String] {
        match self {
            Self::V200(_) => &[],
            Self::V300(block) => &block.alt_meal_options,
        }
    }

    pub fn alt_grocery_options(&self) -> &[String] {
        match self {
            Self::V200(_) => &[],
            Self::V300(block) => &block.alt_grocery_options,
        }
    }

    pub fn start_times(&self) -> &[String] {
        match self {
            Self::V200(_) => &[],
            Self::V300(block) => &block.start_times,
        }
    }

    pub fn pickup_managers(&self) -> &[PickupManager] {
        match self {
            Self::V200(_) => &[],
            Self::V300(block) => &block.pickup_managers,
        }
    }

    /// The distinct alternate meal options in first seen order.
    pub fn alt_meal_catalog(&self) -> IndexSet<&str> {
        self.alt_meal_options().iter().map(String::as_str).collect()
    }

    /// The distinct alternate grocery options in first seen order.
    pub fn alt_grocery_catalog(&self) -> IndexSet<&str> {
        self.alt_grocery_options()
            .iter()
            .map(String::as_str)
            .collect()
    }

    /// Checks every user and restaurant the block names against `catalog`.
    ///
    /// All violations are collected into a single error of kind
    /// [`Audit`][crate::ErrorKind::Audit].
    pub fn audit(&self, catalog: &Catalog) -> Result<()> {
        audit::audit(self, catalog)
    }

    /// Exposes the block to templates.
    ///
    /// Every binding is always present so that templates can test the
    /// `Has*` flags without tripping over unresolved bindings.
    pub fn bindings(&self) -> Context {
        let mut ctx = Context::new();
        let ops = self.ops_manager();
        ctx.insert("ControlBlockVersion", self.version().number());
        ctx.insert("HasOpsManager", ops.is_some());
        ctx.insert("OpsManagerUserName", ops.map(|o| o.user_name.as_str()));
        ctx.insert("OpsManagerPhone", ops.map(|o| o.phone.as_str()));

        let drivers: Vec<_> = self
            .backup_drivers()
            .iter()
            .map(|d| d.user_name.as_str())
            .collect();
        ctx.insert("HasBackupDrivers", !drivers.is_empty());
        ctx.insert("BackupDrivers", drivers);

        let splits: Vec<_> = self
            .split_restaurants()
            .iter()
            .map(|s| s.restaurant.as_str())
            .collect();
        ctx.insert("HasSplitRestaurants", !splits.is_empty());
        ctx.insert("SplitRestaurants", splits);

        if let Self::V300(block) = self {
            ctx.insert("HasAltMealOptions", !block.alt_meal_options.is_empty());
            ctx.insert("AltMealOptions", strings(self.alt_meal_catalog()));
            ctx.insert("HasAltGroceryOptions", !block.alt_grocery_options.is_empty());
            ctx.insert("AltGroceryOptions", strings(self.alt_grocery_catalog()));
            ctx.insert("StartTimes", block.start_times.clone());
            let managers: Vec<_> = block
                .pickup_managers
                .iter()
                .map(|p| p.user_name.as_str())
                .collect();
            ctx.insert("HasPickupManagers", !managers.is_empty());
            ctx.insert("PickupManagers", managers);
        }
        ctx
    }
}

fn strings(set: IndexSet<&str>) -> Value {
    set.into_iter().collect()
}

impl Common {
    pub fn document(&self) -> &DocumentId {
        &self.document
    }
}

impl V300Block {
    pub fn common(&self) -> &Common {
        &self.common
    }
}

impl OpsManager {
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// The line the directive was read from.
    pub fn line(&self) -> usize {
        self.line
    }
}

impl SplitRestaurant {
    pub fn restaurant(&self) -> &str {
        &self.restaurant
    }

    pub fn cleanup_driver(&self) -> &str {
        &self.cleanup_driver
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl BackupDriver {
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

impl PickupManager {
    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn restaurant(&self) -> &str {
        &self.restaurant
    }

    pub fn line(&self) -> usize {
        self.line
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bindings_v200() {
        let block = ControlBlock::parse(
            "ops-manager=jsmith|555-0100\nbackup-driver=alice,bob",
            DocumentId::new("test"),
        )
        .unwrap();
        let ctx = block.bindings();
        assert_eq!(ctx.get("ControlBlockVersion"), Some(&Value::Integer(200)));
        assert_eq!(ctx.get("HasOpsManager"), Some(&Value::Bool(true)));
        assert_eq!(ctx.get("OpsManagerPhone"), Some(&Value::from("555-0100")));
        assert_eq!(
            ctx.get("BackupDrivers"),
            Some(&Value::from(vec!["alice", "bob"]))
        );
        assert_eq!(ctx.get("HasSplitRestaurants"), Some(&Value::Bool(false)));
        assert!(!ctx.contains("AltMealOptions"));
    }

    #[test]
    fn bindings_without_ops_manager() {
        let block = ControlBlock::parse("", DocumentId::new("test")).unwrap();
        let ctx = block.bindings();
        assert_eq!(ctx.get("HasOpsManager"), Some(&Value::Bool(false)));
        assert_eq!(ctx.get("OpsManagerUserName"), Some(&Value::None));
    }

    #[test]
    fn catalogs_dedupe_in_first_seen_order() {
        let block = ControlBlock::parse(
            "version=300\nalt-meal-options=Vegan,Veg\nalt-meal-options=Vegan,Halal",
            DocumentId::new("test"),
        )
        .unwrap();
        assert_eq!(block.alt_meal_options(), ["Vegan", "Veg", "Vegan", "Halal"]);
        let catalog: Vec<_> = block.alt_meal_catalog().into_iter().collect();
        assert_eq!(catalog, ["Vegan", "Veg", "Halal"]);
        assert_eq!(
            block.bindings().get("AltMealOptions"),
            Some(&Value::from(vec!["Vegan", "Veg", "Halal"]))
        );
    }

    #[test]
    fn v300_accessors_empty_on_v200() {
        let block = ControlBlock::parse("backup-driver=alice", DocumentId::new("test")).unwrap();
        assert_eq!(block.version(), Version::V200);
        assert!(block.alt_meal_options().is_empty());
        assert!(block.pickup_managers().is_empty());
        assert!(block.alt_grocery_catalog().is_empty());
    }
}
