//! Typed capability lookup
//!
//! A process reaches kernel extensions through the [`CapabilitySet`] built
//! for its context. Builtin interfaces are named by [`InterfaceId`]; hosts
//! can add their own extensions under a custom string key and processes
//! fetch them with a typed downcast.

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::rc::Rc;

/// Known interface keys
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum InterfaceId {
    /// Process tree control (start, kill, reparent, notify)
    Kernel,
    /// Sleep scheduling
    Sleep,
    /// Spawn request queue
    Spawn,
    /// Cooperative CPU budget
    Coop,
    /// Host-provided extension
    Custom(String),
}

impl InterfaceId {
    /// All builtin interfaces
    pub const BUILTIN: [InterfaceId; 4] = [
        InterfaceId::Kernel,
        InterfaceId::Sleep,
        InterfaceId::Spawn,
        InterfaceId::Coop,
    ];

    /// Checks whether this is one of the kernel's own interfaces
    pub fn is_builtin(&self) -> bool {
        !matches!(self, InterfaceId::Custom(_))
    }
}

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InterfaceId::Kernel => f.write_str("kernel"),
            InterfaceId::Sleep => f.write_str("sleep"),
            InterfaceId::Spawn => f.write_str("spawn"),
            InterfaceId::Coop => f.write_str("coop"),
            InterfaceId::Custom(name) => write!(f, "custom:{}", name),
        }
    }
}

/// Set of interfaces granted to one process context
#[derive(Debug, Clone, Default)]
pub struct CapabilitySet {
    granted: BTreeSet<InterfaceId>,
    custom: BTreeMap<String, Rc<dyn Any>>,
}

impl CapabilitySet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a set granting every builtin interface
    pub fn all_builtin() -> Self {
        let mut set = Self::new();
        for id in InterfaceId::BUILTIN {
            set.grant(id);
        }
        set
    }

    /// Grants a builtin interface
    ///
    /// Custom ids are ignored here; use [`CapabilitySet::insert_custom`].
    pub fn grant(&mut self, id: InterfaceId) {
        if id.is_builtin() {
            self.granted.insert(id);
        }
    }

    /// Revokes an interface
    pub fn revoke(&mut self, id: &InterfaceId) {
        match id {
            InterfaceId::Custom(name) => {
                self.custom.remove(name);
            }
            builtin => {
                self.granted.remove(builtin);
            }
        }
    }

    /// Adds a host extension under `name`
    pub fn insert_custom(&mut self, name: impl Into<String>, extension: Rc<dyn Any>) {
        self.custom.insert(name.into(), extension);
    }

    /// Checks whether an interface is available
    pub fn has(&self, id: &InterfaceId) -> bool {
        match id {
            InterfaceId::Custom(name) => self.custom.contains_key(name),
            builtin => self.granted.contains(builtin),
        }
    }

    /// Returns a host extension downcast to `T`
    ///
    /// `None` if nothing is registered under `name` or it is not a `T`.
    pub fn custom<T: Any>(&self, name: &str) -> Option<Rc<T>> {
        self.custom.get(name).cloned()?.downcast::<T>().ok()
    }

    /// Lists every available interface
    pub fn interfaces(&self) -> Vec<InterfaceId> {
        self.granted
            .iter()
            .cloned()
            .chain(self.custom.keys().cloned().map(InterfaceId::Custom))
            .collect()
    }
}
