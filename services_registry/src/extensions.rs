//! Interface registry
//!
//! The kernel does not hard-wire which services a process can reach.
//! Builtin interfaces start out registered and can be withdrawn; hosts can
//! add their own extensions under a string key. Each process context gets
//! a [`CapabilitySet`] snapshot of this registry when it is built.

use crate::RegistryError;
use kernel_api::{CapabilitySet, InterfaceId};
use std::any::Any;
use std::collections::{BTreeMap, BTreeSet};
use std::rc::Rc;

/// Extension registry
#[derive(Debug, Clone)]
pub struct ExtensionRegistry {
    builtins: BTreeSet<InterfaceId>,
    custom: BTreeMap<String, Rc<dyn Any>>,
}

impl ExtensionRegistry {
    /// Creates a registry with every builtin interface registered
    pub fn new() -> Self {
        Self {
            builtins: InterfaceId::BUILTIN.into_iter().collect(),
            custom: BTreeMap::new(),
        }
    }

    /// Creates a registry with nothing registered
    pub fn empty() -> Self {
        Self {
            builtins: BTreeSet::new(),
            custom: BTreeMap::new(),
        }
    }

    /// Re-registers a builtin interface; false if already present or
    /// `id` is a custom key
    pub fn register_builtin(&mut self, id: InterfaceId) -> bool {
        id.is_builtin() && self.builtins.insert(id)
    }

    /// Registers a host extension under `name`
    pub fn try_register(
        &mut self,
        name: impl Into<String>,
        extension: Rc<dyn Any>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.custom.contains_key(&name) {
            return Err(RegistryError::ExtensionAlreadyRegistered(name));
        }
        self.custom.insert(name, extension);
        Ok(())
    }

    /// Registers a host extension; false if the name is taken
    pub fn register(&mut self, name: impl Into<String>, extension: Rc<dyn Any>) -> bool {
        self.try_register(name, extension).is_ok()
    }

    /// Removes an interface; false if it was not registered
    pub fn unregister(&mut self, id: &InterfaceId) -> bool {
        match id {
            InterfaceId::Custom(name) => self.custom.remove(name).is_some(),
            builtin => self.builtins.remove(builtin),
        }
    }

    /// Checks whether an interface is registered
    pub fn is_registered(&self, id: &InterfaceId) -> bool {
        match id {
            InterfaceId::Custom(name) => self.custom.contains_key(name),
            builtin => self.builtins.contains(builtin),
        }
    }

    /// Looks up a host extension by name, downcast to `T`
    pub fn get_extension<T: Any>(&self, name: &str) -> Result<Rc<T>, RegistryError> {
        self.custom
            .get(name)
            .cloned()
            .and_then(|extension| extension.downcast::<T>().ok())
            .ok_or_else(|| RegistryError::ExtensionNotFound(name.to_string()))
    }

    /// Builds the capability set handed to a process context
    pub fn capabilities(&self) -> CapabilitySet {
        let mut set = CapabilitySet::new();
        for id in &self.builtins {
            set.grant(id.clone());
        }
        for (name, extension) in &self.custom {
            set.insert_custom(name.clone(), extension.clone());
        }
        set
    }
}

impl Default for ExtensionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtins_registered_by_default() {
        let registry = ExtensionRegistry::new();
        for id in InterfaceId::BUILTIN {
            assert!(registry.is_registered(&id));
        }
        assert!(ExtensionRegistry::empty().capabilities().interfaces().is_empty());
    }

    #[test]
    fn test_unregister_builtin_removes_capability() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.unregister(&InterfaceId::Spawn));
        assert!(!registry.unregister(&InterfaceId::Spawn));

        let caps = registry.capabilities();
        assert!(!caps.has(&InterfaceId::Spawn));
        assert!(caps.has(&InterfaceId::Kernel));

        assert!(registry.register_builtin(InterfaceId::Spawn));
        assert!(!registry.register_builtin(InterfaceId::Spawn));
    }

    #[test]
    fn test_custom_extension_round_trip() {
        let mut registry = ExtensionRegistry::new();
        assert!(registry.register("segments", Rc::new(String::from("seg-0"))));
        assert!(!registry.register("segments", Rc::new(String::from("seg-1"))));

        let ext = registry.get_extension::<String>("segments").unwrap();
        assert_eq!(ext.as_str(), "seg-0");

        let caps = registry.capabilities();
        assert_eq!(caps.custom::<String>("segments").unwrap().as_str(), "seg-0");
    }

    #[test]
    fn test_get_extension_missing_or_wrong_type() {
        let mut registry = ExtensionRegistry::new();
        registry.register("counter", Rc::new(5u64));

        assert_eq!(
            registry.get_extension::<String>("counter"),
            Err(RegistryError::ExtensionNotFound("counter".to_string()))
        );
        assert!(registry.get_extension::<u64>("missing").is_err());
    }

    #[test]
    fn test_register_builtin_rejects_custom_key() {
        let mut registry = ExtensionRegistry::empty();
        assert!(!registry.register_builtin(InterfaceId::Custom("x".to_string())));
    }
}
