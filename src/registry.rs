use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

use log::{debug, warn};
use thiserror::Error;

use crate::MatSurfId;

const ID_SPACE: u32 = u16::MAX as u32 + 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RegistryError {
    #[error("all 65536 ids are allocated")]
    Exhausted,
    #[error("key is already bound to {existing}")]
    AlreadyBound { existing: MatSurfId },
}

/// Maps scene objects to `MatSurfId`s.
///
/// Individually registered keys take ids upward from 0. Groups and shared
/// ids take ids downward from `u16::MAX`, and every key registered into a
/// group shares the group's id, so background objects can be lumped together.
#[derive(Debug, Clone)]
pub struct Registry<K = String> {
    ids: HashMap<K, MatSurfId>,
    grps: HashMap<String, MatSurfId>,
    src_map: HashMap<MatSurfId, Vec<K>>,
    next_id: u32,
    next_grp_id: u32,
    allocated: u32,
}

impl<K: Clone + Eq + Hash> Default for Registry<K> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Clone + Eq + Hash> Registry<K> {
    pub fn new() -> Self {
        Self {
            ids: HashMap::new(),
            grps: HashMap::new(),
            src_map: HashMap::new(),
            next_id: 0,
            next_grp_id: u16::MAX as u32,
            allocated: 0,
        }
    }

    /// Same key, same id.
    pub fn register(&mut self, key: K) -> Result<MatSurfId, RegistryError> {
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        let id = self.allocate(false)?;
        self.bind(key, id);
        Ok(id)
    }

    pub fn register_grouped(&mut self, key: K, grp: &str) -> Result<MatSurfId, RegistryError> {
        if let Some(id) = self.ids.get(&key) {
            if self.grps.get(grp) != Some(id) {
                warn!("Key already registered as {}, ignoring group {}", id, grp);
            }
            return Ok(*id);
        }
        let grp_id = match self.grps.get(grp) {
            Some(id) => *id,
            None => {
                let id = self.allocate(true)?;
                debug!("Allocated {} for group {}", id, grp);
                self.grps.insert(grp.to_string(), id);
                id
            }
        };
        self.bind(key, grp_id);
        Ok(grp_id)
    }

    /// Like `register`, but draws from the top of the id space so the id can
    /// be handed to a second registry with `adopt`.
    pub fn register_shared(&mut self, key: K) -> Result<MatSurfId, RegistryError> {
        if let Some(id) = self.ids.get(&key) {
            return Ok(*id);
        }
        let id = self.allocate(true)?;
        self.bind(key, id);
        Ok(id)
    }

    /// Bind `key` to an id chosen elsewhere.
    pub fn adopt(&mut self, key: K, id: MatSurfId) -> Result<MatSurfId, RegistryError> {
        if let Some(existing) = self.ids.get(&key) {
            if *existing != id {
                return Err(RegistryError::AlreadyBound { existing: *existing });
            }
            return Ok(id);
        }
        if !self.src_map.contains_key(&id) {
            if self.allocated == ID_SPACE {
                return Err(RegistryError::Exhausted);
            }
            self.allocated += 1;
        }
        self.bind(key, id);
        Ok(id)
    }

    pub fn lookup(&self, key: &K) -> Option<MatSurfId> {
        self.ids.get(key).copied()
    }

    pub fn group(&self, grp: &str) -> Option<MatSurfId> {
        self.grps.get(grp).copied()
    }

    /// Every key sharing `id`, in registration order.
    pub fn keys(&self, id: MatSurfId) -> &[K] {
        self.src_map.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// End of scene setup: the registry becomes shared and read-only.
    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }

    fn bind(&mut self, key: K, id: MatSurfId) {
        self.ids.insert(key.clone(), id);
        self.src_map.entry(id).or_default().push(key);
    }

    fn allocate(&mut self, grouped: bool) -> Result<MatSurfId, RegistryError> {
        if self.allocated == ID_SPACE {
            warn!("MatSurfId space exhausted");
            return Err(RegistryError::Exhausted);
        }
        self.allocated += 1;
        // Every id outside [next_id, next_grp_id] is taken, so while
        // allocated <= ID_SPACE a free id is left inside that window.
        loop {
            let id = if grouped {
                let id = self.next_grp_id;
                self.next_grp_id = self.next_grp_id.saturating_sub(1);
                id
            } else {
                let id = self.next_id;
                self.next_id += 1;
                id
            };
            let id = MatSurfId::new(id as u16);
            // Skip ids bound through `adopt`.
            if !self.src_map.contains_key(&id) {
                return Ok(id);
            }
        }
    }
}

/// The id maps populated during scene construction.
#[derive(Debug, Clone, Default)]
pub struct SceneIdRegistry {
    pub surfaces: Registry<String>,
    pub materials: Registry<String>,
    /// Ids carried by Emission events.
    pub lights: Registry<String>,
}

impl SceneIdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_light(&mut self, light_name: &str) -> Result<MatSurfId, RegistryError> {
        self.lights.register(light_name.to_string())
    }

    pub fn with_surf(&mut self, obj_name: &str, grp: Option<&str>) -> Result<MatSurfId, RegistryError> {
        match grp {
            Some(grp) => self.surfaces.register_grouped(obj_name.to_string(), grp),
            None => self.surfaces.register(obj_name.to_string()),
        }
    }

    pub fn with_mat(&mut self, mat_name: &str) -> Result<MatSurfId, RegistryError> {
        self.materials.register(mat_name.to_string())
    }

    /// One id for a surface and the material behind it. Within a group, every
    /// pair shares the group's id, including surfaces grouped earlier through
    /// `with_surf`.
    pub fn with_matsurf(
        &mut self,
        obj_name: &str,
        mat_name: &str,
        grp: Option<&str>,
    ) -> Result<MatSurfId, RegistryError> {
        let obj_name = obj_name.to_string();
        let mat_name = mat_name.to_string();
        if let Some(existing) = self.materials.lookup(&mat_name) {
            let surf_id = self
                .surfaces
                .lookup(&obj_name)
                .or_else(|| grp.and_then(|grp| self.surfaces.group(grp)));
            if surf_id != Some(existing) {
                warn!("Material {} already bound to {}, not pairing it with {}", mat_name, existing, obj_name);
                return Err(RegistryError::AlreadyBound { existing });
            }
        }
        let id = match grp {
            Some(grp) => self.surfaces.register_grouped(obj_name, grp)?,
            None => self.surfaces.register_shared(obj_name)?,
        };
        let others = self.materials.keys(id);
        if grp.is_none() && !others.is_empty() && !others.contains(&mat_name) {
            warn!("Pairing {} with {}, which already names other materials", mat_name, id);
        }
        self.materials.adopt(mat_name, id)
    }

    pub fn freeze(self) -> Arc<Self> {
        Arc::new(self)
    }
}
