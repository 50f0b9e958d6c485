use indexmap::IndexMap;

use crate::control::{
    BackupDriver, ControlBlock, Directive, OpsManager, PickupManager, SplitRestaurant, V300Block,
    Version,
};
use crate::listener::{DocumentId, Listener};
use crate::types::span::Span;
use crate::{ErrorKind, Result};

/// Accumulates directives during a single top to bottom scan of a control
/// block.
///
/// Every problem found is recorded and the scan carries on, so one pass
/// reports all of them. The finished [`ControlBlock`] is only produced if
/// nothing was recorded.
#[derive(Debug)]
pub struct ControlBlockBuilder<'source> {
    source: &'source str,
    listener: Listener,
    version: Version,
    /// Set when the caller fixed the version up front.
    forced: bool,
    /// Whether any directive has been read yet.
    started: bool,
    /// The line each unique directive was first set on.
    unique: IndexMap<Directive, usize>,
    block: V300Block,
}

impl<'source> ControlBlockBuilder<'source> {
    pub fn new(source: &'source str, document: DocumentId) -> Self {
        let mut block = V300Block::default();
        block.common.document = document.clone();
        Self {
            source,
            listener: Listener::new(document),
            version: Version::default(),
            forced: false,
            started: false,
            unique: IndexMap::new(),
            block,
        }
    }

    /// Parses the block as `version` instead of detecting it.
    pub fn with_version(mut self, version: Version) -> Self {
        self.version = version;
        self.forced = true;
        self
    }

    /// Reads every line and finishes the block.
    pub fn scan(mut self) -> Result<ControlBlock> {
        let source = self.source;
        let mut offset = 0;
        for (i, raw) in source.split('\n').enumerate() {
            self.read_line(i + 1, offset, raw.trim_end_matches('\r'));
            offset += raw.len() + 1;
        }
        self.finish()
    }

    fn read_line(&mut self, line: usize, offset: usize, raw: &'source str) {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            return;
        }

        let (key_raw, value_raw) = match raw.split_once('=') {
            Some(kv) => kv,
            None => {
                let span = trimmed_span(offset, raw);
                self.error(span, format!("expected `key=value`, found `{trimmed}`"));
                return;
            }
        };
        let key_span = trimmed_span(offset, key_raw);
        let value_span = trimmed_span(offset + key_raw.len() + 1, value_raw);
        let key = strip_whitespace(key_raw);
        let value = strip_whitespace(value_raw);

        let directive = Directive::from_key(&key);
        if !directive.allowed_in(self.version) {
            let msg = match directive {
                Directive::Unrecognized(_) => format!("unknown directive `{key}`"),
                _ => format!("unknown directive `{key}` for version {}", self.version),
            };
            self.error(key_span, msg);
            return;
        }

        if directive.is_unique() {
            if let Some(first) = self.unique.get(&directive) {
                let msg = format!(
                    "duplicate `{directive}` directive on line {line}, first set on line {first}"
                );
                self.error(key_span, msg);
                return;
            }
            self.unique.insert(directive.clone(), line);
        }

        tracing::trace!(key = directive.key(), line, "read directive");
        match directive {
            Directive::Version => self.read_version(&value, key_span, value_span),

            Directive::OpsManager => {
                if let Some((user_name, phone)) =
                    self.pair(&directive, &value, value_span, "UserName|Phone")
                {
                    self.block.common.ops_manager = Some(OpsManager {
                        user_name,
                        phone,
                        line,
                    });
                }
            }

            Directive::SplitRestaurant => {
                if let Some((restaurant, cleanup_driver)) =
                    self.pair(&directive, &value, value_span, "Restaurant|CleanupDriver")
                {
                    self.block.common.split_restaurants.push(SplitRestaurant {
                        restaurant,
                        cleanup_driver,
                        line,
                    });
                }
            }

            Directive::BackupDriver => {
                for user_name in self.list(&directive, &value, value_span) {
                    self.block
                        .common
                        .backup_drivers
                        .push(BackupDriver { user_name, line });
                }
            }

            Directive::AltMealOptions => {
                let items = self.list(&directive, &value, value_span);
                self.block.alt_meal_options.extend(items);
            }

            Directive::AltGroceryOptions => {
                let items = self.list(&directive, &value, value_span);
                self.block.alt_grocery_options.extend(items);
            }

            Directive::StartTimes => {
                let items = self.list(&directive, &value, value_span);
                self.block.start_times.extend(items);
            }

            Directive::PickupManagers => {
                for item in self.list(&directive, &value, value_span) {
                    if let Some((user_name, restaurant)) =
                        self.pair(&directive, &item, value_span, "UserName|Restaurant")
                    {
                        self.block.pickup_managers.push(PickupManager {
                            user_name,
                            restaurant,
                            line,
                        });
                    }
                }
            }

            // Rejected above.
            Directive::Unrecognized(_) => {}
        }
        self.started = true;
    }

    fn read_version(&mut self, value: &str, key_span: Span, value_span: Span) {
        if self.started {
            self.error(key_span, "`version` must be the first directive");
            return;
        }
        match Version::from_number(value) {
            None => self.error(value_span, format!("unknown version `{value}`")),
            Some(v) if self.forced && v != self.version => self.error(
                value_span,
                format!(
                    "version {v} conflicts with the expected version {}",
                    self.version
                ),
            ),
            Some(v) => self.version = v,
        }
    }

    /// Splits a comma separated list. Returns nothing if any item is empty.
    fn list(&mut self, directive: &Directive, value: &str, span: Span) -> Vec<String> {
        let items: Vec<_> = value.split(',').map(str::to_owned).collect();
        if items.iter().any(String::is_empty) {
            self.error(span, format!("empty item in `{directive}` list"));
            return Vec::new();
        }
        items
    }

    /// Splits a `left|right` pair where both sides must be present and
    /// neither holds a list.
    fn pair(
        &mut self,
        directive: &Directive,
        value: &str,
        span: Span,
        expected: &str,
    ) -> Option<(String, String)> {
        match value.split_once('|') {
            Some((l, r)) if is_pair_half(l) && is_pair_half(r) => {
                Some((l.to_owned(), r.to_owned()))
            }
            _ => {
                let msg = format!("expected `{expected}` for `{directive}`, found `{value}`");
                self.error(span, msg);
                None
            }
        }
    }

    fn error(&mut self, span: Span, msg: impl Into<String>) {
        self.listener
            .syntax_error(ErrorKind::Directive, self.source, span, msg);
    }

    fn finish(mut self) -> Result<ControlBlock> {
        tracing::debug!(
            document = %self.listener.document(),
            version = %self.version,
            errors = self.listener.diagnostics().len(),
            "scanned control block"
        );
        self.listener.raise_if_errors_present()?;
        Ok(match self.version {
            Version::V200 => ControlBlock::V200(self.block.common),
            Version::V300 => ControlBlock::V300(self.block),
        })
    }
}

fn is_pair_half(s: &str) -> bool {
    !s.is_empty() && !s.contains(|c: char| c == '|' || c == ',')
}

/// The span of `s` without surrounding whitespace, where `s` starts at
/// `offset` in the source.
fn trimmed_span(offset: usize, s: &str) -> Span {
    let m = offset + (s.len() - s.trim_start().len());
    Span::from(m..m + s.trim().len())
}

fn strip_whitespace(s: &str) -> String {
    s.chars().filter(|c| !c.is_whitespace()).collect()
}
