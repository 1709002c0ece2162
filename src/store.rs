//! Durable per-legislator profile repository.
//!
//! One JSON document per entity at `<root>/entities/<slug>/profile.json`.
//! Mutations are serialized per entity through a lock registry, so two
//! enrollment runs touching different legislators never contend. Every write
//! goes to a temp file in the same directory and is renamed into place, so a
//! reader (or a crash) can never observe a half-recomputed aggregate.

use crate::embedding::Embedding;
use crate::error::{Result, RollcallError};
use crate::profile::{EntityDescriptor, Profile, SampleRef, VoiceSample};
use crate::roster::RosterIndex;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Outcome of pre-creating profiles from the roster.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapReport {
    pub created: usize,
    pub skipped: usize,
    pub total: usize,
}

/// Filesystem-backed profile store with per-entity locking.
pub struct ProfileStore {
    entities_dir: PathBuf,
    expected_dim: usize,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ProfileStore {
    /// Open (creating if needed) a store rooted at `root`.
    ///
    /// `expected_dim` is the embedding dimension every sample must carry.
    pub fn open(root: &Path, expected_dim: usize) -> Result<Self> {
        let entities_dir = root.join("entities");
        fs::create_dir_all(&entities_dir)?;
        Ok(Self {
            entities_dir,
            expected_dim,
            locks: Mutex::new(HashMap::new()),
        })
    }

    /// Embedding dimension this store accepts.
    pub fn expected_dim(&self) -> usize {
        self.expected_dim
    }

    fn profile_path(&self, slug: &str) -> PathBuf {
        self.entities_dir.join(slug).join("profile.json")
    }

    /// Fetch (or create) the mutation lock for one entity.
    fn lock_for(&self, slug: &str) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        locks
            .entry(slug.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn load(&self, slug: &str) -> Result<Profile> {
        let path = self.profile_path(slug);
        let contents = fs::read_to_string(&path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                RollcallError::NotFound {
                    slug: slug.to_string(),
                }
            } else {
                RollcallError::Io(e)
            }
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Write the profile document atomically: temp file, then rename.
    fn persist(&self, profile: &Profile) -> Result<()> {
        let path = self.profile_path(&profile.entity.slug);
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)?;
        }
        let tmp = path.with_extension("json.tmp");
        let contents = serde_json::to_vec_pretty(profile)?;
        fs::write(&tmp, contents)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Whether a profile exists for this slug.
    pub fn exists(&self, slug: &str) -> bool {
        self.profile_path(slug).exists()
    }

    /// Create an empty profile.
    ///
    /// # Errors
    /// `DuplicateProfile` if the slug is already enrolled.
    pub fn create(&self, entity: EntityDescriptor) -> Result<Profile> {
        let lock = self.lock_for(&entity.slug);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        if self.exists(&entity.slug) {
            return Err(RollcallError::DuplicateProfile { slug: entity.slug });
        }
        let profile = Profile::new(entity);
        self.persist(&profile)?;
        Ok(profile)
    }

    /// Read a profile.
    ///
    /// # Errors
    /// `NotFound` if the slug has no profile.
    pub fn get(&self, slug: &str) -> Result<Profile> {
        self.load(slug)
    }

    /// Get an existing profile or create an empty one from the descriptor.
    pub fn ensure(&self, entity: EntityDescriptor) -> Result<Profile> {
        match self.get(&entity.slug) {
            Ok(profile) => Ok(profile),
            Err(RollcallError::NotFound { .. }) => match self.create(entity) {
                Ok(profile) => Ok(profile),
                // Raced with a concurrent creator; theirs wins
                Err(RollcallError::DuplicateProfile { slug }) => self.get(&slug),
                Err(e) => Err(e),
            },
            Err(e) => Err(e),
        }
    }

    /// Append a voice sample and atomically recompute the aggregate.
    ///
    /// Returns the updated profile.
    ///
    /// # Errors
    /// `InvalidEmbeddingDimension` if the sample's embedding does not match
    /// the store dimension; `NotFound`, `DuplicateSample` as usual.
    pub fn add_sample(&self, slug: &str, sample: VoiceSample) -> Result<Profile> {
        if sample.embedding.dim() != self.expected_dim {
            return Err(RollcallError::InvalidEmbeddingDimension {
                expected: self.expected_dim,
                actual: sample.embedding.dim(),
            });
        }

        let lock = self.lock_for(slug);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut profile = self.load(slug)?;
        profile.attach_sample(sample)?;
        profile.verify_aggregate()?;
        self.persist(&profile)?;
        Ok(profile)
    }

    /// Remove a sample and atomically recompute the aggregate.
    ///
    /// Removing the last sample returns the profile to the unenrolled state.
    pub fn remove_sample(&self, slug: &str, sample_ref: &SampleRef) -> Result<Profile> {
        let lock = self.lock_for(slug);
        let _guard = lock.lock().unwrap_or_else(|e| e.into_inner());

        let mut profile = self.load(slug)?;
        profile.detach_sample(sample_ref)?;
        profile.verify_aggregate()?;
        self.persist(&profile)?;
        Ok(profile)
    }

    /// Lazy iterator over all profiles in slug order.
    ///
    /// The slug listing is taken up front; each profile document is loaded
    /// only when the iterator reaches it. Calling `list` again restarts from
    /// the beginning.
    pub fn list(&self) -> Result<ProfileIter<'_>> {
        let mut slugs = Vec::new();
        for entry in fs::read_dir(&self.entities_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                let slug = entry.file_name().to_string_lossy().into_owned();
                if self.exists(&slug) {
                    slugs.push(slug);
                }
            }
        }
        slugs.sort();
        Ok(ProfileIter {
            store: self,
            slugs,
            next: 0,
        })
    }

    /// Eager snapshot of every profile, for the matcher.
    pub fn snapshot(&self) -> Result<Vec<Profile>> {
        self.list()?.collect()
    }

    /// Pre-create empty profiles for every roster entry.
    ///
    /// Existing profiles are left untouched and counted as skipped.
    pub fn bootstrap_from_roster(&self, roster: &RosterIndex) -> Result<BootstrapReport> {
        let mut created = 0;
        let mut skipped = 0;
        for entry in roster.entries() {
            if self.exists(&entry.slug) {
                skipped += 1;
                continue;
            }
            let descriptor = roster
                .descriptor_for(&entry.slug)
                .ok_or_else(|| RollcallError::NotFound {
                    slug: entry.slug.clone(),
                })?;
            self.create(descriptor)?;
            created += 1;
        }
        Ok(BootstrapReport {
            created,
            skipped,
            total: roster.len(),
        })
    }

    /// Validate an externally supplied embedding against the store dimension.
    pub fn check_dim(&self, embedding: &Embedding) -> Result<()> {
        if embedding.dim() != self.expected_dim {
            return Err(RollcallError::InvalidEmbeddingDimension {
                expected: self.expected_dim,
                actual: embedding.dim(),
            });
        }
        Ok(())
    }
}

/// Lazy, restartable iterator over stored profiles.
pub struct ProfileIter<'a> {
    store: &'a ProfileStore,
    slugs: Vec<String>,
    next: usize,
}

impl Iterator for ProfileIter<'_> {
    type Item = Result<Profile>;

    fn next(&mut self) -> Option<Self::Item> {
        let slug = self.slugs.get(self.next)?;
        self.next += 1;
        Some(self.store.load(slug))
    }
}
