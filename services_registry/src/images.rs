//! Image name to constructor table

use crate::RegistryError;
use kernel_api::{Process, ProcessConstructor, ProcessInit};
use std::collections::BTreeMap;
use std::fmt;

/// Process registry
///
/// Image names are conventionally prefixed with the author's initials
/// (`ANI/MyProgram`), with further segments for bundled programs
/// (`ANI/MyBundle/Worker`). The kernel only ever reads from the registry;
/// registration is the host's job.
pub struct ProcessRegistry {
    constructors: BTreeMap<String, ProcessConstructor>,
}

impl ProcessRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    /// Registers a boxed constructor
    pub fn try_register(
        &mut self,
        image_name: impl Into<String>,
        constructor: ProcessConstructor,
    ) -> Result<(), RegistryError> {
        let image_name = image_name.into();
        if self.constructors.contains_key(&image_name) {
            return Err(RegistryError::ImageAlreadyRegistered(image_name));
        }
        log::debug!("registered image {}", image_name);
        self.constructors.insert(image_name, constructor);
        Ok(())
    }

    /// Registers a constructor; false if the image name is taken
    pub fn register<F>(&mut self, image_name: impl Into<String>, constructor: F) -> bool
    where
        F: Fn(&ProcessInit) -> Box<dyn Process> + 'static,
    {
        self.try_register(image_name, Box::new(constructor)).is_ok()
    }

    /// Checks whether an image name is registered
    pub fn contains(&self, image_name: &str) -> bool {
        self.constructors.contains_key(image_name)
    }

    /// Instantiates the process described by `init`
    ///
    /// Returns `None` if its image name has no constructor.
    pub fn get_new_process(&self, init: &ProcessInit) -> Option<Box<dyn Process>> {
        self.constructors
            .get(&init.image_name)
            .map(|constructor| constructor(init))
    }

    /// Registered image names, sorted
    pub fn image_names(&self) -> Vec<&str> {
        self.constructors.keys().map(String::as_str).collect()
    }

    /// Returns the number of registered images
    pub fn count(&self) -> usize {
        self.constructors.len()
    }
}

impl Default for ProcessRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ProcessRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessRegistry")
            .field("images", &self.image_names())
            .finish()
    }
}
