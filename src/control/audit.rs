use indexmap::IndexMap;

use crate::control::ControlBlock;
use crate::listener::{Diagnostic, Listener};
use crate::{ErrorKind, Result};

/// The known users and restaurants a control block is audited against.
///
/// Must be fully populated before auditing and is only read from then on,
/// so one catalog can be shared by any number of audits.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Catalog {
    users: IndexMap<String, User>,
    restaurants: IndexMap<String, Restaurant>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct User {
    user_name: String,
    phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct Restaurant {
    name: String,
}

impl Catalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a user, replacing any user with the same name.
    pub fn add_user(&mut self, user: User) -> &mut Self {
        self.users.insert(user.user_name.clone(), user);
        self
    }

    /// Adds a restaurant, replacing any restaurant with the same name.
    pub fn add_restaurant(&mut self, restaurant: Restaurant) -> &mut Self {
        self.restaurants.insert(restaurant.name.clone(), restaurant);
        self
    }

    pub fn user(&self, user_name: &str) -> Option<&User> {
        self.users.get(user_name)
    }

    pub fn restaurant(&self, name: &str) -> Option<&Restaurant> {
        self.restaurants.get(name)
    }

    /// Iterates over the users in insertion order.
    pub fn users(&self) -> impl Iterator<Item = &User> {
        self.users.values()
    }

    /// Iterates over the restaurants in insertion order.
    pub fn restaurants(&self) -> impl Iterator<Item = &Restaurant> {
        self.restaurants.values()
    }
}

impl User {
    pub fn new(user_name: impl Into<String>) -> Self {
        Self {
            user_name: user_name.into(),
            phone: None,
        }
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn user_name(&self) -> &str {
        &self.user_name
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }
}

impl Restaurant {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Collects audit violations for one block.
struct Auditor<'a> {
    catalog: &'a Catalog,
    listener: Listener,
}

impl Auditor<'_> {
    fn user(&mut self, role: &str, user_name: &str, line: usize) {
        if self.catalog.user(user_name).is_none() {
            self.violation(line, format!("{role} `{user_name}` is not a known user"));
        }
    }

    fn restaurant(&mut self, role: &str, name: &str, line: usize) {
        if self.catalog.restaurant(name).is_none() {
            self.violation(line, format!("{role} `{name}` is not a known restaurant"));
        }
    }

    fn violation(&mut self, line: usize, msg: String) {
        tracing::warn!(document = %self.listener.document(), line, "{msg}");
        let diagnostic = Diagnostic::at_line(ErrorKind::Audit, self.listener.document(), line, msg);
        self.listener.report(diagnostic);
    }
}

pub(crate) fn audit(block: &ControlBlock, catalog: &Catalog) -> Result<()> {
    let mut a = Auditor {
        catalog,
        listener: Listener::new(block.document().clone()),
    };

    if let Some(ops) = block.ops_manager() {
        a.user("ops manager", &ops.user_name, ops.line);
    }
    for split in block.split_restaurants() {
        a.restaurant("split restaurant", &split.restaurant, split.line);
        a.user(
            &format!("cleanup driver for `{}`", split.restaurant),
            &split.cleanup_driver,
            split.line,
        );
    }
    for driver in block.backup_drivers() {
        a.user("backup driver", &driver.user_name, driver.line);
    }
    // Empty before version 300.
    for manager in block.pickup_managers() {
        a.user("pickup manager", &manager.user_name, manager.line);
        a.restaurant(
            &format!("pickup restaurant for `{}`", manager.user_name),
            &manager.restaurant,
            manager.line,
        );
    }

    tracing::debug!(
        document = %block.document(),
        violations = a.listener.diagnostics().len(),
        "audited control block"
    );
    a.listener.raise_if_errors_present()
}
