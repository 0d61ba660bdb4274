//! Certificate hot reloading

use crate::config::{Material, SharedMaterial};
use crate::error::{Result, TlsError};
use crate::loader::load_key_pair;
use crate::trust::load_ca_file;
use arc_swap::ArcSwap;
use notify::event::{AccessKind, AccessMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::Mutex;
use rustls::crypto::CryptoProvider;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Files the material is reloaded from
#[derive(Debug, Clone)]
pub(crate) struct ReloadSources {
    pub(crate) ca_path: Option<PathBuf>,
    pub(crate) client_ca_path: Option<PathBuf>,
    pub(crate) cert_path: Option<PathBuf>,
    pub(crate) key_path: Option<PathBuf>,
    pub(crate) provider: Arc<CryptoProvider>,
}

impl ReloadSources {
    fn files(&self) -> impl Iterator<Item = &Path> {
        [
            &self.ca_path,
            &self.client_ca_path,
            &self.cert_path,
            &self.key_path,
        ]
        .into_iter()
        .filter_map(|path| path.as_deref())
    }

    /// Load a fresh set of material. Roots taken from the trust store are kept.
    fn load(&self, current: &Material) -> Result<Material> {
        let roots = match &self.ca_path {
            Some(path) => Arc::new(load_ca_file(path)?),
            None => Arc::clone(&current.roots),
        };

        let client_roots = self
            .client_ca_path
            .as_deref()
            .map(load_ca_file)
            .transpose()?
            .map(Arc::new);

        let certificate = load_key_pair(
            self.cert_path.as_deref(),
            self.key_path.as_deref(),
            &self.provider,
        )?;

        Material::new(roots, client_roots, certificate, &self.provider)
    }

    fn same_files(&self, other: &ReloadSources) -> bool {
        self.ca_path == other.ca_path
            && self.client_ca_path == other.client_ca_path
            && self.cert_path == other.cert_path
            && self.key_path == other.key_path
    }

    fn reload(&self, material: &ArcSwap<Material>) {
        let current = material.load_full();
        match self.load(&current) {
            Ok(next) => {
                material.store(Arc::new(next));
                info!("Reloaded TLS certificate material");
            }
            Err(e) => {
                warn!(error = %e, "Failed to reload TLS certificate material, keeping current");
            }
        }
    }
}

/// Watches the configured files and republishes material when they change
pub(crate) struct CertWatcher {
    watcher: RecommendedWatcher,
    dirs: Vec<PathBuf>,
    sources: ReloadSources,
    material: SharedMaterial,
}

impl CertWatcher {
    pub(crate) fn start(sources: ReloadSources, material: SharedMaterial) -> Result<Self> {
        let mut files = Vec::new();
        let mut dirs = Vec::new();
        for path in sources.files() {
            let (dir, file) = watch_target(path)?;
            if !dirs.contains(&dir) {
                dirs.push(dir);
            }
            files.push(file);
        }

        let handler_sources = sources.clone();
        let handler_material = Arc::clone(&material);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            match res {
                Ok(event) => {
                    if should_reload(&event) {
                        debug!(paths = ?event.paths, "Certificate directory changed");
                        handler_sources.reload(&handler_material);
                    }
                }
                Err(e) => warn!(error = %e, "Certificate watcher error"),
            }
        })?;

        for dir in &dirs {
            watcher.watch(dir, RecursiveMode::NonRecursive)?;
        }

        info!(files = ?files, "Certificate watcher started");

        Ok(Self {
            watcher,
            dirs,
            sources,
            material,
        })
    }

    fn watches(&self, sources: &ReloadSources) -> bool {
        self.sources.same_files(sources)
    }

    pub(crate) fn material(&self) -> SharedMaterial {
        Arc::clone(&self.material)
    }

    /// Stop watching. Pending callbacks finish on their own thread.
    pub(crate) fn stop(mut self) {
        for dir in &self.dirs {
            if let Err(e) = self.watcher.unwatch(dir) {
                debug!(dir = %dir.display(), error = %e, "Failed to unwatch directory");
            }
        }
        info!("Certificate watcher stopped");
    }
}

impl fmt::Debug for CertWatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CertWatcher")
            .field("dirs", &self.dirs)
            .finish_non_exhaustive()
    }
}

/// Slot holding the watcher started on behalf of an [`Options`](crate::Options) value.
///
/// A clone starts with an empty slot: a watcher belongs to the value that
/// started it.
#[derive(Default)]
pub(crate) struct WatchHandle {
    inner: Arc<Mutex<Option<CertWatcher>>>,
}

impl WatchHandle {
    /// Publish `material` under a watcher, or join the watcher already running
    /// for the same files. A watcher for other files is replaced.
    pub(crate) fn attach(
        &self,
        sources: ReloadSources,
        material: Material,
    ) -> Result<SharedMaterial> {
        let mut slot = self.inner.lock();

        if let Some(watcher) = slot.as_ref() {
            if watcher.watches(&sources) {
                debug!("Reusing running certificate watcher");
                return Ok(watcher.material());
            }
        }

        let replaced = slot.take();
        let shared = Arc::new(ArcSwap::from_pointee(material));
        if sources.files().next().is_some() {
            *slot = Some(CertWatcher::start(sources, Arc::clone(&shared))?);
        } else {
            debug!("No certificate files configured, nothing to watch");
        }
        drop(slot);

        if let Some(watcher) = replaced {
            info!("Certificate files changed in options, replacing watcher");
            watcher.stop();
        }

        Ok(shared)
    }

    /// Whether a watcher is running
    pub(crate) fn is_active(&self) -> bool {
        self.inner.lock().is_some()
    }

    /// Stop the watcher, if one is running. Repeated calls do nothing.
    pub(crate) fn close(&self) {
        let watcher = self.inner.lock().take();
        if let Some(watcher) = watcher {
            watcher.stop();
        }
    }
}

impl Clone for WatchHandle {
    fn clone(&self) -> Self {
        Self::default()
    }
}

impl fmt::Debug for WatchHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchHandle")
            .field("active", &self.is_active())
            .finish()
    }
}

/// Canonical parent directory to watch, and the canonical path of the file in it
fn watch_target(path: &Path) -> Result<(PathBuf, PathBuf)> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let dir = std::fs::canonicalize(dir).map_err(|e| TlsError::Watch(notify::Error::io(e)))?;

    let name = path.file_name().ok_or_else(|| {
        TlsError::Watch(notify::Error::generic(&format!(
            "not a file path: {}",
            path.display()
        )))
    })?;

    let file = dir.join(name);
    Ok((dir, file))
}

/// Any change in a watched directory triggers a reload. Secret mounts rotate
/// by swapping a symlinked directory, which never names the files themselves.
fn should_reload(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_)
            | EventKind::Modify(_)
            | EventKind::Remove(_)
            | EventKind::Access(AccessKind::Close(AccessMode::Write))
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::load_certified_key;
    use notify::event::{CreateKind, DataChange, ModifyKind, RenameMode};
    use rustls::RootCertStore;
    use std::fs;

    fn testdata(name: &str) -> PathBuf {
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("testdata")
            .join(name)
    }

    fn sources(dir: &Path, prefix: &str) -> ReloadSources {
        let cert = dir.join(format!("{prefix}-cert.pem"));
        let key = dir.join(format!("{prefix}-key.pem"));
        fs::copy(testdata(&format!("{prefix}-cert.pem")), &cert).unwrap();
        fs::copy(testdata(&format!("{prefix}-key.pem")), &key).unwrap();

        ReloadSources {
            ca_path: None,
            client_ca_path: None,
            cert_path: Some(cert),
            key_path: Some(key),
            provider: Arc::new(rustls::crypto::ring::default_provider()),
        }
    }

    fn material(sources: &ReloadSources) -> Material {
        let key = load_certified_key(
            sources.cert_path.as_deref().unwrap(),
            sources.key_path.as_deref().unwrap(),
            &sources.provider,
        )
        .unwrap();
        Material::new(
            Arc::new(RootCertStore::empty()),
            None,
            Some(Arc::new(key)),
            &sources.provider,
        )
        .unwrap()
    }

    #[test]
    fn test_should_reload_on_directory_changes() {
        let event = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(PathBuf::from("/etc/tls/cert.pem"));
        assert!(should_reload(&event));

        let event = Event::new(EventKind::Create(CreateKind::File))
            .add_path(PathBuf::from("/etc/tls/other.txt"));
        assert!(should_reload(&event));

        // Secret mount rotation renames the data symlink, not the files
        let event = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::To)))
            .add_path(PathBuf::from("/etc/tls/..data"));
        assert!(should_reload(&event));
    }

    #[test]
    fn test_should_not_reload_on_reads() {
        let event = Event::new(EventKind::Access(AccessKind::Close(AccessMode::Read)))
            .add_path(PathBuf::from("/etc/tls/cert.pem"));
        assert!(!should_reload(&event));

        let event = Event::new(EventKind::Access(AccessKind::Open(AccessMode::Any)))
            .add_path(PathBuf::from("/etc/tls/cert.pem"));
        assert!(!should_reload(&event));
    }

    #[test]
    fn test_watch_target_of_relative_file() {
        let (dir, file) = watch_target(Path::new("Cargo.toml")).unwrap();
        assert!(dir.is_absolute());
        assert_eq!(file, dir.join("Cargo.toml"));
    }

    #[test]
    fn test_close_without_watcher() {
        let handle = WatchHandle::default();
        assert!(!handle.is_active());
        handle.close();
        handle.close();
        assert!(!handle.is_active());
    }

    #[test]
    fn test_same_files_ignores_provider() {
        let dir = tempfile::tempdir().unwrap();
        let server = sources(dir.path(), "example-server");
        let mut other = server.clone();
        other.provider = Arc::new(rustls::crypto::ring::default_provider());
        assert!(server.same_files(&other));

        let client = sources(dir.path(), "example-client");
        assert!(!server.same_files(&client));
    }

    #[test]
    fn test_attach_reuses_watcher_for_same_files() {
        let dir = tempfile::tempdir().unwrap();
        let server = sources(dir.path(), "example-server");
        let handle = WatchHandle::default();

        let first = handle.attach(server.clone(), material(&server)).unwrap();
        let second = handle.attach(server.clone(), material(&server)).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert!(handle.is_active());

        handle.close();
    }

    #[test]
    fn test_attach_replaces_watcher_for_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let server = sources(dir.path(), "example-server");
        let client = sources(dir.path(), "example-client");
        let handle = WatchHandle::default();

        let first = handle.attach(server.clone(), material(&server)).unwrap();
        let second = handle.attach(client.clone(), material(&client)).unwrap();
        assert!(!Arc::ptr_eq(&first, &second));

        let expected = load_certified_key(
            client.cert_path.as_deref().unwrap(),
            client.key_path.as_deref().unwrap(),
            &client.provider,
        )
        .unwrap();
        let current = second.load();
        assert_eq!(current.certificate.as_ref().unwrap().cert, expected.cert);

        handle.close();
        assert!(!handle.is_active());
    }

    #[test]
    fn test_clone_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let server = sources(dir.path(), "example-server");
        let handle = WatchHandle::default();
        handle.attach(server.clone(), material(&server)).unwrap();

        let cloned = handle.clone();
        assert!(handle.is_active());
        assert!(!cloned.is_active());

        cloned.close();
        assert!(handle.is_active());
        handle.close();
    }
}
