use crate::checksum::file_sha256;
use crate::conversion::ConversionPipeline;
use crate::error::{HoHatchError, Result};
use crate::image_handler::jpeg_file_to_data_uri;
use crate::scratch::{reset_dir, RetryPolicy};
use std::fs;
use std::path::{Path, PathBuf};

/// JPEG previews keyed by source stem, validated by a SHA-256 sidecar.
///
/// Layout: `<dir>/<stem>.jpg` next to `<dir>/<stem>.hash`. Entries are only
/// ever overwritten; `clear` drops the whole directory.
#[derive(Debug, Clone)]
pub struct DisplayCache {
    dir: PathBuf,
}

impl DisplayCache {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// (jpeg, hash sidecar) for a source texture
    pub fn entry_paths(&self, source: &Path) -> (PathBuf, PathBuf) {
        let stem = source
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        (
            self.dir.join(format!("{}.jpg", stem)),
            self.dir.join(format!("{}.hash", stem)),
        )
    }

    /// True when both files exist and the sidecar matches the source's current hash
    pub fn is_fresh(&self, source: &Path) -> bool {
        let (jpg, hash_file) = self.entry_paths(source);
        if !(jpg.is_file() && hash_file.is_file()) {
            return false;
        }

        let stored = match fs::read_to_string(&hash_file) {
            Ok(s) => s,
            Err(e) => {
                log::warn!("Could not read {}: {}. Recaching.", hash_file.display(), e);
                return false;
            }
        };
        match file_sha256(source) {
            Ok(current) => current == stored.trim(),
            Err(e) => {
                log::warn!("Could not hash {}: {}. Recaching.", source.display(), e);
                false
            }
        }
    }

    /// Cached preview for the image list, without converting anything.
    /// With `verify_hash` the entry must also be fresh.
    pub fn cached_preview(&self, source: &Path, verify_hash: bool) -> Option<String> {
        let (jpg, hash_file) = self.entry_paths(source);
        if !(jpg.is_file() && hash_file.is_file()) {
            return None;
        }
        if verify_hash && !self.is_fresh(source) {
            return None;
        }
        match jpeg_file_to_data_uri(&jpg) {
            Ok(uri) => Some(uri),
            Err(e) => {
                log::warn!("Could not load cached image {}: {}", jpg.display(), e);
                None
            }
        }
    }

    /// Data URI for a DDS file, converting only when the cache is missing or stale
    pub fn get_displayable_image(
        &self,
        pipeline: &ConversionPipeline<'_>,
        source: &Path,
        width: u32,
        height: u32,
    ) -> Result<String> {
        if !source.is_file() {
            return Err(HoHatchError::NotFound(source.to_path_buf()));
        }

        let (jpg, hash_file) = self.entry_paths(source);
        if self.is_fresh(source) {
            log::debug!("Using cached preview for {}", source.display());
            return jpeg_file_to_data_uri(&jpg);
        }

        log::info!("Recaching display image for {}", source.display());
        fs::create_dir_all(&self.dir)?;
        pipeline.dds_to_jpg(source, &jpg, width, height)?;

        let hash = file_sha256(source)?;
        if let Err(e) = fs::write(&hash_file, &hash) {
            log::error!("Failed to write hash file for {}: {}", source.display(), e);
        }

        jpeg_file_to_data_uri(&jpg)
    }

    /// Remove every cached preview
    pub fn clear(&self, policy: &RetryPolicy) -> Result<()> {
        reset_dir(&self.dir, policy)?;
        log::info!("Cleared cache at {}", self.dir.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scratch::Timing;
    use crate::test_support::{FakeMode, FakeTexconv};

    struct Fixture {
        root: tempfile::TempDir,
        fake: FakeTexconv,
        cache: DisplayCache,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            fs::create_dir_all(root.path().join("work")).unwrap();
            let cache = DisplayCache::new(root.path().join("cache"));
            Self {
                root,
                fake: FakeTexconv::new(),
                cache,
            }
        }

        fn pipeline(&self) -> ConversionPipeline<'_> {
            ConversionPipeline::new(
                &self.fake,
                PathBuf::from("texconv.exe"),
                self.root.path().join("work"),
                Timing::immediate(),
            )
        }

        fn dds(&self, name: &str, content: &[u8]) -> PathBuf {
            let path = self.root.path().join("dump").join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, content).unwrap();
            path
        }

        fn display(&self, source: &Path) -> Result<String> {
            self.cache
                .get_displayable_image(&self.pipeline(), source, 53, 64)
        }
    }

    #[test]
    fn second_lookup_is_served_from_cache() {
        let fx = Fixture::new();
        let dds = fx.dds("ABC.dds", b"texture v1");

        let first = fx.display(&dds).unwrap();
        let second = fx.display(&dds).unwrap();

        assert!(first.starts_with("data:image/jpeg;base64,"));
        assert_eq!(first, second);
        assert_eq!(fx.fake.call_count(), 1);

        let (jpg, hash) = fx.cache.entry_paths(&dds);
        assert!(jpg.is_file());
        assert_eq!(fs::read_to_string(hash).unwrap(), file_sha256(&dds).unwrap());
    }

    #[test]
    fn changed_source_regenerates_entry() {
        let fx = Fixture::new();
        let dds = fx.dds("ABC.dds", b"texture v1");
        fx.display(&dds).unwrap();
        let (_, hash) = fx.cache.entry_paths(&dds);
        let old_hash = fs::read_to_string(&hash).unwrap();

        fs::write(&dds, b"texture v2 with different bytes").unwrap();
        assert!(!fx.cache.is_fresh(&dds));
        fx.display(&dds).unwrap();

        assert_eq!(fx.fake.call_count(), 2);
        let new_hash = fs::read_to_string(&hash).unwrap();
        assert_ne!(old_hash, new_hash);
        assert_eq!(new_hash, file_sha256(&dds).unwrap());
    }

    #[test]
    fn tampered_sidecar_forces_recache() {
        let fx = Fixture::new();
        let dds = fx.dds("ABC.dds", b"texture");
        fx.display(&dds).unwrap();
        let (_, hash) = fx.cache.entry_paths(&dds);
        fs::write(&hash, "not a hash").unwrap();

        fx.display(&dds).unwrap();
        assert_eq!(fx.fake.call_count(), 2);
    }

    #[test]
    fn missing_source_is_not_found() {
        let fx = Fixture::new();
        let err = fx.display(&fx.root.path().join("missing.dds")).unwrap_err();
        assert!(matches!(err, HoHatchError::NotFound(_)));
        assert_eq!(fx.fake.call_count(), 0);
    }

    #[test]
    fn converter_failure_leaves_no_sidecar() {
        let fx = Fixture::new();
        fx.fake.set_mode(FakeMode::Fail);
        let dds = fx.dds("ABC.dds", b"texture");

        let err = fx.display(&dds).unwrap_err();
        assert!(err.to_string().contains("Stderr"));
        let (jpg, hash) = fx.cache.entry_paths(&dds);
        assert!(!jpg.exists());
        assert!(!hash.exists());
    }

    #[test]
    fn cached_preview_respects_hash_check() {
        let fx = Fixture::new();
        let dds = fx.dds("ABC.dds", b"texture");
        assert!(fx.cache.cached_preview(&dds, false).is_none());

        fx.display(&dds).unwrap();
        fs::write(&dds, b"changed").unwrap();

        assert!(fx.cache.cached_preview(&dds, false).is_some());
        assert!(fx.cache.cached_preview(&dds, true).is_none());
    }

    #[test]
    fn clear_removes_entries() {
        let fx = Fixture::new();
        let dds = fx.dds("ABC.dds", b"texture");
        fx.display(&dds).unwrap();

        fx.cache.clear(&RetryPolicy::new(1, std::time::Duration::ZERO)).unwrap();
        assert!(fx.cache.dir().is_dir());
        assert_eq!(fs::read_dir(fx.cache.dir()).unwrap().count(), 0);
    }
}
