//! Test helpers: an in-memory store with scripted serialization
//! conflicts, a recording peer transport, and a harness wiring a full
//! [`VideoService`] over a tempdir-backed local file store.

#![allow(dead_code)]

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::atomic::{AtomicI64, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, Once};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;

use fedvid_core::models::{
    Author, FederationEvent, StagedFile, Tag, Video, VideoCreate, VideoDraft, VideoUpdate,
};
use fedvid_core::{FederationConfig, StoreError, VideoServiceConfig};
use fedvid_db::{Store, StoreTransaction};
use fedvid_federation::{
    FederationBroadcaster, FederationError, PeerAddress, PeerTransport, StaticPeerRegistry,
};
use fedvid_services::{ViewAccounting, VideoService};
use fedvid_storage::{FileStore, FileStoreError, FileStoreResult, LocalFileStore};

/// Committed store contents, cloned out for assertions.
#[derive(Default, Clone)]
pub struct StoreState {
    pub authors: Vec<Author>,
    pub tags: Vec<Tag>,
    pub videos: HashMap<i64, Video>,
    pub video_tags: HashMap<i64, Vec<i64>>,
}

/// In-memory [`Store`]. A transaction clones the committed state and
/// writes it back on commit; id sequences live outside the state so they
/// keep advancing across rollbacks, like real database sequences.
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
    next_author_id: Arc<AtomicI64>,
    next_tag_id: Arc<AtomicI64>,
    next_video_id: Arc<AtomicI64>,
    commit_conflicts: Arc<AtomicU32>,
    increment_failures: AtomicU32,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            next_author_id: Arc::new(AtomicI64::new(1)),
            next_tag_id: Arc::new(AtomicI64::new(1)),
            next_video_id: Arc::new(AtomicI64::new(1)),
            commit_conflicts: Arc::new(AtomicU32::new(0)),
            increment_failures: AtomicU32::new(0),
        }
    }
}

impl MemoryStore {
    /// The next `n` commits fail with a serialization conflict.
    pub fn inject_commit_conflicts(&self, n: u32) {
        self.commit_conflicts.store(n, Ordering::SeqCst);
    }

    /// The next `n` view increments fail with a backend error.
    pub fn inject_increment_failures(&self, n: u32) {
        self.increment_failures.store(n, Ordering::SeqCst);
    }

    pub fn committed(&self) -> StoreState {
        self.state.lock().unwrap().clone()
    }

    pub fn video_count(&self) -> usize {
        self.state.lock().unwrap().videos.len()
    }

    pub fn seed_author(&self, name: &str) -> i64 {
        let id = self.next_author_id.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().authors.push(Author {
            id,
            name: name.to_string(),
            pod_id: None,
        });
        id
    }

    /// Insert a committed video directly, keeping the id sequence ahead
    /// of the seeded id.
    pub fn seed_video(&self, video: Video) {
        self.next_video_id.fetch_max(video.id + 1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        state.video_tags.entry(video.id).or_default();
        state.videos.insert(video.id, video);
    }
}

fn take_scripted(counter: &AtomicU32) -> bool {
    counter
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl Store for MemoryStore {
    type Tx = MemoryTransaction;

    async fn begin_serializable(&self) -> Result<MemoryTransaction, StoreError> {
        Ok(MemoryTransaction {
            shared: self.state.clone(),
            pending: self.state.lock().unwrap().clone(),
            next_author_id: self.next_author_id.clone(),
            next_tag_id: self.next_tag_id.clone(),
            next_video_id: self.next_video_id.clone(),
            commit_conflicts: self.commit_conflicts.clone(),
        })
    }

    async fn get_video(&self, id: i64) -> Result<Option<Video>, StoreError> {
        Ok(self.state.lock().unwrap().videos.get(&id).cloned())
    }

    async fn increment_views(&self, video_id: i64) -> Result<(), StoreError> {
        if take_scripted(&self.increment_failures) {
            return Err(StoreError::Backend("scripted increment failure".into()));
        }

        let mut state = self.state.lock().unwrap();
        match state.videos.get_mut(&video_id) {
            Some(video) => {
                video.views += 1;
                Ok(())
            }
            None => Err(StoreError::Backend(format!("video {video_id} not found"))),
        }
    }

    async fn delete_video(&self, video_id: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.videos.remove(&video_id);
        state.video_tags.remove(&video_id);
        Ok(())
    }
}

pub struct MemoryTransaction {
    shared: Arc<Mutex<StoreState>>,
    pending: StoreState,
    next_author_id: Arc<AtomicI64>,
    next_tag_id: Arc<AtomicI64>,
    next_video_id: Arc<AtomicI64>,
    commit_conflicts: Arc<AtomicU32>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn find_or_create_author(
        &mut self,
        name: &str,
        pod_id: Option<i64>,
    ) -> Result<Author, StoreError> {
        if let Some(author) = self
            .pending
            .authors
            .iter()
            .find(|a| a.name == name && a.pod_id == pod_id)
        {
            return Ok(author.clone());
        }

        let author = Author {
            id: self.next_author_id.fetch_add(1, Ordering::SeqCst),
            name: name.to_string(),
            pod_id,
        };
        self.pending.authors.push(author.clone());
        Ok(author)
    }

    async fn find_or_create_tags(&mut self, names: &[String]) -> Result<Vec<Tag>, StoreError> {
        let unique: BTreeSet<&str> = names.iter().map(String::as_str).collect();

        let mut tags = Vec::with_capacity(unique.len());
        for name in unique {
            let tag = match self.pending.tags.iter().find(|t| t.name == name) {
                Some(tag) => tag.clone(),
                None => {
                    let tag = Tag {
                        id: self.next_tag_id.fetch_add(1, Ordering::SeqCst),
                        name: name.to_string(),
                    };
                    self.pending.tags.push(tag.clone());
                    tag
                }
            };
            tags.push(tag);
        }

        Ok(tags)
    }

    async fn get_author(&mut self, id: i64) -> Result<Option<Author>, StoreError> {
        Ok(self.pending.authors.iter().find(|a| a.id == id).cloned())
    }

    async fn get_video(&mut self, id: i64) -> Result<Option<Video>, StoreError> {
        Ok(self.pending.videos.get(&id).cloned())
    }

    async fn insert_video(&mut self, draft: &VideoDraft) -> Result<Video, StoreError> {
        let video = Video {
            id: self.next_video_id.fetch_add(1, Ordering::SeqCst),
            name: draft.name.clone(),
            extname: draft.extname.clone(),
            category: draft.category,
            licence: draft.licence,
            language: draft.language,
            nsfw: draft.nsfw,
            description: draft.description.clone(),
            duration: draft.duration,
            views: 0,
            author_id: draft.author_id,
            origin_pod_id: draft.origin_pod_id,
            remote_id: draft.remote_id,
            created_at: Utc::now(),
        };
        self.pending.videos.insert(video.id, video.clone());
        Ok(video)
    }

    async fn update_video(&mut self, id: i64, fields: &VideoUpdate) -> Result<Video, StoreError> {
        let video = self
            .pending
            .videos
            .get_mut(&id)
            .ok_or_else(|| StoreError::Backend(format!("video {id} not found")))?;

        if let Some(name) = &fields.name {
            video.name = name.clone();
        }
        if let Some(category) = fields.category {
            video.category = category;
        }
        if let Some(licence) = fields.licence {
            video.licence = licence;
        }
        if let Some(language) = fields.language {
            video.language = Some(language);
        }
        if let Some(nsfw) = fields.nsfw {
            video.nsfw = nsfw;
        }
        if let Some(description) = &fields.description {
            video.description = description.clone();
        }

        Ok(video.clone())
    }

    async fn set_video_tags(&mut self, video_id: i64, tag_ids: &[i64]) -> Result<(), StoreError> {
        self.pending.video_tags.insert(video_id, tag_ids.to_vec());
        Ok(())
    }

    async fn get_video_tags(&mut self, video_id: i64) -> Result<Vec<Tag>, StoreError> {
        let ids = self
            .pending
            .video_tags
            .get(&video_id)
            .cloned()
            .unwrap_or_default();

        Ok(self
            .pending
            .tags
            .iter()
            .filter(|t| ids.contains(&t.id))
            .cloned()
            .collect())
    }

    async fn commit(self) -> Result<(), StoreError> {
        if take_scripted(&self.commit_conflicts) {
            return Err(StoreError::SerializationConflict);
        }

        *self.shared.lock().unwrap() = self.pending;
        Ok(())
    }

    async fn rollback(self) {}
}

/// Transport that records every delivery and can be scripted to fail for
/// specific peer URLs.
#[derive(Default)]
pub struct RecordingTransport {
    sent: Mutex<Vec<(String, FederationEvent)>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingTransport {
    pub fn fail_peer(&self, url: &str) {
        self.failing.lock().unwrap().insert(url.to_string());
    }

    pub fn sent(&self) -> Vec<(String, FederationEvent)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn sent_to(&self, url: &str) -> Vec<FederationEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(peer, _)| peer == url)
            .map(|(_, event)| event.clone())
            .collect()
    }
}

#[async_trait]
impl PeerTransport for RecordingTransport {
    async fn send(
        &self,
        peer: &PeerAddress,
        event: &FederationEvent,
        _timeout: Duration,
    ) -> Result<(), FederationError> {
        if self.failing.lock().unwrap().contains(&peer.url) {
            return Err(FederationError::Unreachable {
                peer: peer.url.clone(),
                reason: "scripted failure".to_string(),
            });
        }

        self.sent
            .lock()
            .unwrap()
            .push((peer.url.clone(), event.clone()));
        Ok(())
    }
}

/// File store that fails any rename out of a canonical (identity-derived)
/// name, so a rolled-back attempt cannot restore its staged upload.
pub struct RestoreFailingFileStore {
    inner: LocalFileStore,
}

#[async_trait]
impl FileStore for RestoreFailingFileStore {
    async fn write(&self, name: &str, data: &[u8]) -> FileStoreResult<()> {
        self.inner.write(name, data).await
    }

    async fn rename(&self, from: &str, to: &str) -> FileStoreResult<()> {
        if from.chars().next().is_some_and(|c| c.is_ascii_digit()) {
            return Err(FileStoreError::RenameFailed(format!(
                "{from}: scripted failure"
            )));
        }
        self.inner.rename(from, to).await
    }

    async fn remove(&self, name: &str) -> FileStoreResult<()> {
        self.inner.remove(name).await
    }

    async fn exists(&self, name: &str) -> FileStoreResult<bool> {
        self.inner.exists(name).await
    }
}

/// Fully wired service stack over the in-memory store, recording
/// transport, and a tempdir-backed local file store.
pub struct TestApp {
    pub store: Arc<MemoryStore>,
    pub files: Arc<LocalFileStore>,
    pub transport: Arc<RecordingTransport>,
    pub service: VideoService<MemoryStore>,
    pub views: ViewAccounting<MemoryStore>,
    _storage_dir: TempDir,
}

pub async fn spawn_app(peer_urls: &[&str]) -> TestApp {
    spawn_app_with(peer_urls, VideoServiceConfig::default()).await
}

pub async fn spawn_app_with(peer_urls: &[&str], config: VideoServiceConfig) -> TestApp {
    let storage_dir = TempDir::new().expect("create storage dir");
    let files = Arc::new(
        LocalFileStore::new(storage_dir.path())
            .await
            .expect("create file store"),
    );

    assemble(peer_urls, config, files.clone(), files, storage_dir)
}

/// Harness whose service cannot rename canonical files back to their
/// staged names. Assertions still go through the plain local store over
/// the same root.
pub async fn spawn_app_with_failing_restore(peer_urls: &[&str]) -> TestApp {
    let storage_dir = TempDir::new().expect("create storage dir");
    let local = LocalFileStore::new(storage_dir.path())
        .await
        .expect("create file store");
    let service_files: Arc<dyn FileStore> = Arc::new(RestoreFailingFileStore {
        inner: local.clone(),
    });

    assemble(
        peer_urls,
        VideoServiceConfig::default(),
        Arc::new(local),
        service_files,
        storage_dir,
    )
}

fn assemble(
    peer_urls: &[&str],
    config: VideoServiceConfig,
    files: Arc<LocalFileStore>,
    service_files: Arc<dyn FileStore>,
    storage_dir: TempDir,
) -> TestApp {
    init_tracing();

    let federation_config = FederationConfig {
        peers: peer_urls.iter().map(|p| p.to_string()).collect(),
        ..Default::default()
    };
    let registry = Arc::new(StaticPeerRegistry::from_config(&federation_config));
    let transport = Arc::new(RecordingTransport::default());
    let federation = Arc::new(FederationBroadcaster::new(
        registry,
        transport.clone(),
        &federation_config,
    ));

    let store = Arc::new(MemoryStore::default());
    let service = VideoService::new(store.clone(), service_files, federation.clone(), config);
    let views = ViewAccounting::new(store.clone(), federation);

    TestApp {
        store,
        files,
        transport,
        service,
        views,
        _storage_dir: storage_dir,
    }
}

impl TestApp {
    /// Write a staged upload under the storage root and return its handle.
    pub async fn stage_upload(&self, name: &str) -> StagedFile {
        self.files
            .write(name, b"fake video bytes")
            .await
            .expect("stage upload");

        let extname = name
            .rfind('.')
            .map(|i| name[i..].to_string())
            .expect("staged name has an extension");

        StagedFile {
            name: name.to_string(),
            extname,
            duration: 120,
        }
    }

    pub async fn file_exists(&self, name: &str) -> bool {
        self.files.exists(name).await.expect("probe file")
    }
}

pub fn create_input(name: &str, tags: &[&str]) -> VideoCreate {
    VideoCreate {
        name: name.to_string(),
        category: 3,
        licence: 1,
        language: None,
        nsfw: false,
        description: format!("{name} description"),
        tags: tags.iter().map(|t| t.to_string()).collect(),
        author_name: "alice".to_string(),
    }
}

pub fn video_fixture(id: i64, author_id: i64) -> Video {
    Video {
        id,
        name: "seeded clip".to_string(),
        extname: ".webm".to_string(),
        category: 3,
        licence: 1,
        language: None,
        nsfw: false,
        description: "seeded".to_string(),
        duration: 120,
        views: 10,
        author_id,
        origin_pod_id: None,
        remote_id: None,
        created_at: Utc::now(),
    }
}

static TRACING: Once = Once::new();

fn init_tracing() {
    TRACING.call_once(|| {
        tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .init();
    });
}

/// Wait until the transport has recorded at least `n` deliveries.
/// Best-effort broadcasts run on spawned tasks, so assertions on them
/// have to wait for the runtime to schedule the send.
pub async fn wait_for_sends(transport: &RecordingTransport, n: usize) {
    for _ in 0..200 {
        if transport.sent().len() >= n {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!(
        "expected at least {n} deliveries, saw {}",
        transport.sent().len()
    );
}
