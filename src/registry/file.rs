// ABOUTME: JSON-file application registry.
// ABOUTME: The whole registry is one map written atomically through a sibling temp file.

use super::{AppRegistry, AppUpdate, Application, already_registered, not_registered};
use crate::error::Result;
use crate::types::AppName;
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::path::PathBuf;

type Store = BTreeMap<AppName, Application>;

pub struct FileRegistry {
    path: PathBuf,
    // Serializes read-modify-write cycles within this process.
    guard: Mutex<()>,
}

impl FileRegistry {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            guard: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<Store> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Store::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Store::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, store: &Store) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, serde_json::to_vec_pretty(store)?)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

impl AppRegistry for FileRegistry {
    fn get(&self, name: &AppName) -> Result<Application> {
        let _guard = self.guard.lock();
        self.read()?
            .remove(name)
            .ok_or_else(|| not_registered(name))
    }

    fn insert(&self, app: Application) -> Result<()> {
        let _guard = self.guard.lock();
        let mut store = self.read()?;
        if store.contains_key(&app.name) {
            return Err(already_registered(&app.name));
        }
        tracing::debug!(app = %app.name, path = %self.path.display(), "registering application");
        store.insert(app.name.clone(), app);
        self.write(&store)
    }

    fn update(&self, name: &AppName, update: AppUpdate) -> Result<Application> {
        let _guard = self.guard.lock();
        let mut store = self.read()?;
        let app = store.get_mut(name).ok_or_else(|| not_registered(name))?;
        update.apply(app);
        let updated = app.clone();
        self.write(&store)?;
        Ok(updated)
    }

    fn remove(&self, name: &AppName) -> Result<()> {
        let _guard = self.guard.lock();
        let mut store = self.read()?;
        if store.remove(name).is_none() {
            return Err(not_registered(name));
        }
        self.write(&store)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::error::ErrorKind;

    fn app(name: &str) -> Application {
        Application::new(
            AppName::new(name).unwrap(),
            PathBuf::from(format!("/srv/{}", name)),
            "dev",
            Config::default(),
        )
    }

    #[test]
    fn missing_file_is_an_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let registry = FileRegistry::new(dir.path().join("apps.json"));
        let err = registry.get(&AppName::new("shop").unwrap()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn insert_update_remove_persist() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("apps.json");
        let registry = FileRegistry::new(&path);
        let name = AppName::new("shop").unwrap();

        registry.insert(app("shop")).unwrap();
        assert_eq!(
            registry.insert(app("shop")).unwrap_err().kind(),
            ErrorKind::AlreadyExists
        );

        let updated = registry
            .update(
                &name,
                AppUpdate {
                    env: Some("prod".into()),
                    config: None,
                },
            )
            .unwrap();
        assert_eq!(updated.env, "prod");

        let reopened = FileRegistry::new(&path);
        assert_eq!(reopened.get(&name).unwrap().env, "prod");

        reopened.remove(&name).unwrap();
        assert_eq!(
            FileRegistry::new(&path).get(&name).unwrap_err().kind(),
            ErrorKind::NotFound
        );
    }
}
