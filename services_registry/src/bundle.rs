//! Program bundles

use crate::ProcessRegistry;
use serde_json::Value;

/// A set of images installed together
///
/// A bundle that names a root image can be booted directly by the kernel;
/// the root process is started with [`Bundle::default_root_memory`].
pub trait Bundle {
    /// Registers every image in the bundle
    fn install(&self, registry: &mut ProcessRegistry);

    /// Image to start as the root process, if any
    fn root_image_name(&self) -> Option<&str> {
        None
    }

    /// Initial memory for the root process
    ///
    /// `overrides` comes from the host and replaces the default when given.
    fn default_root_memory(&self, overrides: Option<Value>) -> Value {
        overrides.unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kernel_api::{Process, ProcessContext, ProcessFault};
    use serde_json::json;

    struct Idle;

    impl Process for Idle {
        fn run(&mut self, _ctx: &mut ProcessContext<'_>) -> Result<(), ProcessFault> {
            Ok(())
        }
    }

    struct Plain;

    impl Bundle for Plain {
        fn install(&self, registry: &mut ProcessRegistry) {
            registry.register("TST/Plain/Worker", |_| Box::new(Idle));
        }
    }

    struct Rooted;

    impl Bundle for Rooted {
        fn install(&self, registry: &mut ProcessRegistry) {
            registry.register("TST/Rooted/Init", |_| Box::new(Idle));
            registry.register("TST/Rooted/Worker", |_| Box::new(Idle));
        }

        fn root_image_name(&self) -> Option<&str> {
            Some("TST/Rooted/Init")
        }

        fn default_root_memory(&self, overrides: Option<Value>) -> Value {
            overrides.unwrap_or_else(|| json!({ "workers": 2 }))
        }
    }

    #[test]
    fn test_bundle_defaults() {
        let mut registry = ProcessRegistry::new();
        Plain.install(&mut registry);

        assert!(registry.contains("TST/Plain/Worker"));
        assert_eq!(Plain.root_image_name(), None);
        assert_eq!(Plain.default_root_memory(None), Value::Null);
    }

    #[test]
    fn test_rooted_bundle_memory_override() {
        let mut registry = ProcessRegistry::new();
        Rooted.install(&mut registry);

        assert_eq!(registry.count(), 2);
        assert_eq!(Rooted.root_image_name(), Some("TST/Rooted/Init"));
        assert_eq!(Rooted.default_root_memory(None), json!({ "workers": 2 }));
        assert_eq!(
            Rooted.default_root_memory(Some(json!({ "workers": 5 }))),
            json!({ "workers": 5 })
        );
    }
}
