// ABOUTME: In-memory application registry.
// ABOUTME: Used by tests and by callers that manage persistence themselves.

use super::{AppRegistry, AppUpdate, Application, already_registered, not_registered};
use crate::error::Result;
use crate::types::AppName;
use parking_lot::Mutex;
use std::collections::BTreeMap;

#[derive(Default)]
pub struct MemoryRegistry {
    apps: Mutex<BTreeMap<AppName, Application>>,
}

impl MemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AppRegistry for MemoryRegistry {
    fn get(&self, name: &AppName) -> Result<Application> {
        self.apps
            .lock()
            .get(name)
            .cloned()
            .ok_or_else(|| not_registered(name))
    }

    fn insert(&self, app: Application) -> Result<()> {
        let mut apps = self.apps.lock();
        if apps.contains_key(&app.name) {
            return Err(already_registered(&app.name));
        }
        apps.insert(app.name.clone(), app);
        Ok(())
    }

    fn update(&self, name: &AppName, update: AppUpdate) -> Result<Application> {
        let mut apps = self.apps.lock();
        let app = apps.get_mut(name).ok_or_else(|| not_registered(name))?;
        update.apply(app);
        Ok(app.clone())
    }

    fn remove(&self, name: &AppName) -> Result<()> {
        self.apps
            .lock()
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| not_registered(name))
    }
}
