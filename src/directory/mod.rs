//! Target node directory
//!
//! The directory is the crawler's source of truth for which nodes exist. It
//! is read once per crawl cycle; changes made between cycles take effect on
//! the next one.

use crate::model::Target;
use crate::{FedcatError, Result};
use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

/// Storage of the nodes to crawl
pub trait TargetDirectory: Send + Sync {
    /// Returns every known target
    fn get_all(&self) -> Result<Vec<Target>>;

    /// Adds a target, replacing any previous entry with the same id
    fn insert(&self, target: Target) -> Result<()>;

    /// Removes a target, returning it if it existed
    fn remove(&self, id: &str) -> Result<Option<Target>>;
}

/// Directory held in process memory
#[derive(Debug, Default)]
pub struct InMemoryTargetDirectory {
    targets: RwLock<HashMap<String, Target>>,
}

impl InMemoryTargetDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a directory pre-populated with `targets`
    pub fn with_targets(targets: impl IntoIterator<Item = Target>) -> Self {
        let map = targets
            .into_iter()
            .map(|target| (target.id.clone(), target))
            .collect();
        Self {
            targets: RwLock::new(map),
        }
    }
}

/// Makes `directory` hold exactly `targets`
///
/// Every listed target is inserted or replaced, and every stored target whose
/// id is not listed is removed. Returns the number of removed targets.
pub fn sync_targets(
    directory: &dyn TargetDirectory,
    targets: impl IntoIterator<Item = Target>,
) -> Result<usize> {
    let mut keep = HashSet::new();
    for target in targets {
        keep.insert(target.id.clone());
        directory.insert(target)?;
    }

    let mut removed = 0;
    for stale in directory.get_all()? {
        if !keep.contains(&stale.id) && directory.remove(&stale.id)?.is_some() {
            tracing::debug!("Removed target {} no longer in the configuration", stale.id);
            removed += 1;
        }
    }
    Ok(removed)
}

fn poisoned<T>(_: T) -> FedcatError {
    FedcatError::LockPoisoned("target directory")
}

impl TargetDirectory for InMemoryTargetDirectory {
    fn get_all(&self) -> Result<Vec<Target>> {
        let targets = self.targets.read().map_err(poisoned)?;
        let mut all: Vec<Target> = targets.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    fn insert(&self, target: Target) -> Result<()> {
        self.targets
            .write()
            .map_err(poisoned)?
            .insert(target.id.clone(), target);
        Ok(())
    }

    fn remove(&self, id: &str) -> Result<Option<Target>> {
        Ok(self.targets.write().map_err(poisoned)?.remove(id))
    }
}
