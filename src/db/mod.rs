//! JSON document store for tenant records.
//!
//! Reads go straight to the committed file. Every read-modify-write goes
//! through one worker task, so transactions from the pollers and from
//! commands are applied one at a time in submission order. Commits write a
//! sibling temp file and rename it over the committed one.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

pub mod migrations;
pub mod models;
pub mod repository;

pub use models::{
    AccountRouting, RecapConfig, RecapConfigPatch, Registry, RoutingError, TenantRecord,
    TrackedAccount,
};
pub use repository::Repository;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Malformed store document: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store worker stopped")]
    WorkerClosed,
}

/// Result of a transaction closure. Nothing is written unless `changed`.
#[derive(Debug)]
pub struct Mutation<R> {
    pub value: R,
    pub changed: bool,
}

impl<R> Mutation<R> {
    pub fn changed(value: R) -> Self {
        Self {
            value,
            changed: true,
        }
    }

    pub fn unchanged(value: R) -> Self {
        Self {
            value,
            changed: false,
        }
    }
}

#[derive(Debug, Clone)]
struct DocumentFile {
    path: PathBuf,
}

impl DocumentFile {
    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Loads and migrates the document. A missing or empty file is an empty
    /// registry, anything unparseable is an error.
    fn load(&self) -> Result<(Registry, bool), StoreError> {
        let raw = match fs::read(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Registry::default(), false)),
            Err(e) => return Err(e.into()),
        };

        parse_registry(&raw)
    }

    fn write_atomically(&self, registry: &Registry) -> Result<(), StoreError> {
        let dir = self.path.parent().filter(|d| !d.as_os_str().is_empty());
        if let Some(dir) = dir {
            fs::create_dir_all(dir)?;
        }

        let body = serde_json::to_vec_pretty(&registry_to_value(registry)?)?;
        let tmp = self.temp_path();

        let mut file = fs::File::create(&tmp)?;
        file.write_all(&body)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&tmp, &self.path)?;
        sync_dir(dir.unwrap_or(Path::new(".")))?;
        Ok(())
    }

    fn apply<R, F>(&self, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Registry) -> Mutation<R>,
    {
        let (mut registry, migrated) = self.load()?;
        let Mutation { value, changed } = mutate(&mut registry);

        if changed || migrated {
            self.write_atomically(&registry)?;
            debug!(path = %self.path.display(), migrated, "🗄️ Store committed");
        }

        Ok(value)
    }
}

/// Makes a rename inside `dir` durable.
#[cfg(unix)]
fn sync_dir(dir: &Path) -> io::Result<()> {
    fs::File::open(dir)?.sync_all()
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> io::Result<()> {
    Ok(())
}

pub(crate) fn parse_registry(raw: &[u8]) -> Result<(Registry, bool), StoreError> {
    if raw.iter().all(u8::is_ascii_whitespace) {
        return Ok((Registry::default(), false));
    }

    let document: Map<String, Value> = serde_json::from_slice(raw)?;
    let mut registry = Registry::default();
    let mut migrated = false;

    for (key, mut value) in document {
        if !models::is_tenant_id(&key) {
            registry.other.insert(key, value);
            continue;
        }

        let original = value.clone();
        let tenant_migrated = migrations::migrate_tenant(&key, &mut value);
        match serde_json::from_value(value) {
            Ok(tenant) => {
                migrated |= tenant_migrated;
                registry.tenants.insert(key, tenant);
            }
            Err(e) => {
                // Kept as written and never polled until it is repaired.
                warn!(guild_id = %key, error = %e, "🗄️ ⚠️ Unreadable tenant record, skipping it");
                registry.other.insert(key, original);
            }
        }
    }

    Ok((registry, migrated))
}

fn registry_to_value(registry: &Registry) -> Result<Value, StoreError> {
    let mut document = registry.other.clone();
    for (key, tenant) in &registry.tenants {
        if document.insert(key.clone(), serde_json::to_value(tenant)?).is_some() {
            warn!(guild_id = %key, "🗄️ ⚠️ Unreadable tenant record replaced");
        }
    }
    Ok(Value::Object(document))
}

type Job = Box<dyn FnOnce(&DocumentFile) + Send>;

/// Handle to the store. Cheap to clone, all clones share the writer.
#[derive(Debug, Clone)]
pub struct Store {
    file: Arc<DocumentFile>,
    sender: mpsc::Sender<Job>,
}

impl Store {
    /// Opens the store at `path` and spawns its writer task. Must be called
    /// from within a tokio runtime.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let file = DocumentFile { path: path.into() };
        let (sender, mut receiver) = mpsc::channel::<Job>(100);

        info!(path = %file.path.display(), "🗄️ Opening registration store");

        let worker_file = file.clone();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                let file = worker_file.clone();
                if let Err(e) = tokio::task::spawn_blocking(move || job(&file)).await {
                    error!(error = ?e, "🗄️ ❌ Store transaction panicked");
                }
            }
            debug!("🗄️ Store writer stopped");
        });

        Self {
            file: Arc::new(file),
            sender,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file.path
    }

    /// Reads the committed document. Pending migrations are applied in memory
    /// only; the next transaction persists them.
    pub async fn load(&self) -> Result<Registry, StoreError> {
        let raw = match tokio::fs::read(&self.file.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Registry::default()),
            Err(e) => return Err(e.into()),
        };

        parse_registry(&raw).map(|(registry, _)| registry)
    }

    /// Runs `mutate` against the latest committed document inside the writer
    /// queue and commits the result when it reports a change.
    pub async fn transaction<R, F>(&self, mutate: F) -> Result<R, StoreError>
    where
        F: FnOnce(&mut Registry) -> Mutation<R> + Send + 'static,
        R: Send + 'static,
    {
        let (respond_to, response) = oneshot::channel();
        let job: Job = Box::new(move |file| {
            let _ = respond_to.send(file.apply(mutate));
        });

        self.sender
            .send(job)
            .await
            .map_err(|_| StoreError::WorkerClosed)?;

        response.await.map_err(|_| StoreError::WorkerClosed)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::riot::Platform;
    use serde_json::json;

    const GUILD: &str = "123456789012345678";

    fn store() -> (tempfile::TempDir, Store) {
        let dir = tempfile::tempdir().unwrap();
        let store = Store::open(dir.path().join("data").join("registrations.json"));
        (dir, store)
    }

    #[tokio::test]
    async fn missing_file_is_an_empty_registry() {
        let (_dir, store) = store();

        let registry = store.load().await.unwrap();
        assert_eq!(registry, Registry::default());
    }

    #[tokio::test]
    async fn transaction_commits_changes() {
        let (_dir, store) = store();

        let count = store
            .transaction(|registry| {
                let tenant = registry.tenant_entry(GUILD);
                tenant
                    .accounts
                    .push(TrackedAccount::new("A", "1", "p1", Platform::EUW1));
                Mutation::changed(tenant.accounts.len())
            })
            .await
            .unwrap();
        assert_eq!(count, 1);

        let registry = store.load().await.unwrap();
        assert_eq!(registry.total_accounts(), 1);
        assert!(!store.file.temp_path().exists());
    }

    #[tokio::test]
    async fn commit_syncs_the_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        sync_dir(dir.path()).unwrap();
        assert!(sync_dir(&dir.path().join("missing")).is_err() || cfg!(not(unix)));

        let store = Store::open(dir.path().join("registrations.json"));
        store
            .transaction(|registry| {
                registry.tenant_entry(GUILD).channel_id = Some("7".into());
                Mutation::changed(())
            })
            .await
            .unwrap();
        assert_eq!(
            store.load().await.unwrap().tenant(GUILD).unwrap().channel_id.as_deref(),
            Some("7")
        );
    }

    #[tokio::test]
    async fn unchanged_transaction_does_not_write() {
        let (_dir, store) = store();

        store
            .transaction(|registry| {
                registry.tenant_entry(GUILD);
                Mutation::unchanged(())
            })
            .await
            .unwrap();

        assert!(!store.path().exists());
    }

    #[tokio::test]
    async fn concurrent_transactions_are_serialized() {
        let (_dir, store) = store();
        let mut handles = Vec::new();

        for i in 0..20 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store
                    .transaction(move |registry| {
                        registry
                            .tenant_entry(GUILD)
                            .accounts
                            .push(TrackedAccount::new(&format!("p{i}"), "1", "x", Platform::NA1));
                        Mutation::changed(())
                    })
                    .await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.load().await.unwrap().total_accounts(), 20);
    }

    #[tokio::test]
    async fn leftover_temp_file_is_ignored() {
        let (_dir, store) = store();
        store
            .transaction(|registry| {
                registry.tenant_entry(GUILD).channel_id = Some("42".into());
                Mutation::changed(())
            })
            .await
            .unwrap();

        // A crash between "write temp" and "rename".
        fs::write(store.file.temp_path(), b"{ half written").unwrap();

        let registry = store.load().await.unwrap();
        assert_eq!(
            registry.tenant(GUILD).unwrap().channel_id.as_deref(),
            Some("42")
        );
    }

    #[tokio::test]
    async fn failed_commit_keeps_previous_state() {
        let (_dir, store) = store();
        store
            .transaction(|registry| {
                registry.tenant_entry(GUILD).channel_id = Some("1".into());
                Mutation::changed(())
            })
            .await
            .unwrap();

        // The temp path cannot be created as a file.
        fs::create_dir_all(store.file.temp_path()).unwrap();

        let res = store
            .transaction(|registry| {
                registry.tenant_entry(GUILD).channel_id = Some("2".into());
                Mutation::changed(())
            })
            .await;
        assert!(matches!(res, Err(StoreError::Io(_))));

        let registry = store.load().await.unwrap();
        assert_eq!(registry.tenant(GUILD).unwrap().channel_id.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn corrupt_file_is_an_error() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        fs::write(store.path(), b"{ not json").unwrap();

        assert!(matches!(store.load().await, Err(StoreError::Json(_))));

        let res = store.transaction(|_| Mutation::changed(())).await;
        assert!(res.is_err());
        assert_eq!(fs::read(store.path()).unwrap(), b"{ not json");
    }

    #[tokio::test]
    async fn unreadable_tenant_does_not_block_the_others() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let broken = json!({
            "schemaVersion": 2,
            "channelId": "10",
            "announceQueues": null,
            "recap": { "enabled": false, "mode": "DAILY", "queue": "RANKED_TFT", "lastSentYmd": null },
            "accounts": [{ "gameName": "A", "tagLine": "1", "region": "EUW1", "puuid": "p", "lastMatchId": 42 }]
        });
        let document = json!({
            "111111111111111111": broken,
            "222222222222222222": { "channelId": "20", "accounts": [] }
        });
        fs::write(store.path(), serde_json::to_vec(&document).unwrap()).unwrap();

        let registry = store.load().await.unwrap();
        assert_eq!(registry.tenant_ids(), ["222222222222222222"]);
        assert!(registry.tenant("111111111111111111").is_none());

        store
            .transaction(|registry| {
                registry.tenant_entry("333333333333333333").channel_id = Some("30".into());
                Mutation::changed(())
            })
            .await
            .unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw["111111111111111111"], broken);
        assert_eq!(raw["333333333333333333"]["channelId"], json!("30"));
        assert_eq!(
            store.load().await.unwrap().tenant_ids(),
            ["222222222222222222", "333333333333333333"]
        );
    }

    #[tokio::test]
    async fn legacy_records_are_migrated_on_next_write() {
        let (_dir, store) = store();
        fs::create_dir_all(store.path().parent().unwrap()).unwrap();
        let legacy = json!({
            "123456789012345678": {
                "channelId": "10",
                "recap": { "enabled": true, "hour": 8, "minute": 0 },
                "accounts": [{ "gameName": "A", "tagLine": "1", "region": "NA", "puuid": "p" }]
            },
            "meta": { "note": "kept" }
        });
        fs::write(store.path(), serde_json::to_vec(&legacy).unwrap()).unwrap();

        let registry = store.load().await.unwrap();
        let account = &registry.tenant(GUILD).unwrap().accounts[0];
        assert_eq!(account.key.as_deref(), Some("a#1@na1"));

        store.transaction(|_| Mutation::unchanged(())).await.unwrap();

        let raw: Value = serde_json::from_slice(&fs::read(store.path()).unwrap()).unwrap();
        assert_eq!(raw[GUILD]["schemaVersion"], json!(2));
        assert!(raw[GUILD]["recap"].get("hour").is_none());
        assert_eq!(raw["meta"], json!({ "note": "kept" }));
    }
}
