//! Run context handed to every parse function
//!
//! Holds the debug flag of the run and the item-state prefix that parse
//! functions with historical per-item counters use to key their state.

use parking_lot::Mutex;

use crate::config::SectionsConfig;
use crate::types::SectionName;

/// Key prefix for per-item counter state
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemStatePrefix {
    pub section: SectionName,
    pub item: Option<String>,
}

impl ItemStatePrefix {
    pub fn new<S: Into<SectionName>>(section: S, item: Option<String>) -> Self {
        Self {
            section: section.into(),
            item,
        }
    }
}

#[derive(Debug, Default)]
pub struct RunContext {
    debug: bool,
    item_state_prefix: Mutex<Option<ItemStatePrefix>>,
}

impl RunContext {
    pub fn new(debug: bool) -> Self {
        Self {
            debug,
            item_state_prefix: Mutex::new(None),
        }
    }

    pub fn from_config(config: &SectionsConfig) -> Self {
        Self::new(config.debug)
    }

    /// Raw propagation of parse failures requested
    pub fn debug(&self) -> bool {
        self.debug
    }

    pub fn item_state_prefix(&self) -> Option<ItemStatePrefix> {
        self.item_state_prefix.lock().clone()
    }

    pub fn set_item_state_prefix(&self, prefix: Option<ItemStatePrefix>) -> Option<ItemStatePrefix> {
        std::mem::replace(&mut *self.item_state_prefix.lock(), prefix)
    }

    /// Swaps the prefix in until the guard is dropped
    pub fn scoped_item_state_prefix(&self, prefix: ItemStatePrefix) -> ItemStatePrefixGuard<'_> {
        let previous = self.set_item_state_prefix(Some(prefix));
        ItemStatePrefixGuard {
            context: self,
            previous,
        }
    }
}

/// Restores the previous item-state prefix on drop, unwinding included
#[must_use = "the prefix is restored as soon as the guard is dropped"]
pub struct ItemStatePrefixGuard<'a> {
    context: &'a RunContext,
    previous: Option<ItemStatePrefix>,
}

impl Drop for ItemStatePrefixGuard<'_> {
    fn drop(&mut self) {
        self.context.set_item_state_prefix(self.previous.take());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scoped_prefix_restores_previous() {
        let ctx = RunContext::new(false);
        let outer = ItemStatePrefix::new("if", Some("eth0".to_string()));
        ctx.set_item_state_prefix(Some(outer.clone()));

        {
            let _guard = ctx.scoped_item_state_prefix(ItemStatePrefix::new("df", None));
            assert_eq!(ctx.item_state_prefix(), Some(ItemStatePrefix::new("df", None)));
        }

        assert_eq!(ctx.item_state_prefix(), Some(outer));
    }

    #[test]
    fn test_scoped_prefix_restored_on_panic() {
        let ctx = RunContext::new(false);

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = ctx.scoped_item_state_prefix(ItemStatePrefix::new("df", None));
            panic!("parse function blew up");
        }));

        assert!(result.is_err());
        assert_eq!(ctx.item_state_prefix(), None);
    }
}
