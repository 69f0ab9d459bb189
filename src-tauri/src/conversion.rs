use crate::error::{HoHatchError, Result};
use crate::image_handler::{flip_vertical_in_place, is_replacement_image, prepare_replacement};
use crate::scratch::{move_file, ScratchDir, Timing};
use crate::texconv::{run_texconv, TexconvRequest, TexconvRunner, INJECT_FORMAT, INJECT_MIP_LEVELS};
use std::fs;
use std::path::{Path, PathBuf};

pub const SAME_NAME_ERROR: &str = "Target and replacement filenames cannot be the same.";

fn file_stem(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default()
}

/// DDS <-> JPEG conversions through texconv.
///
/// Every call works inside its own `ScratchDir` under `work_dir`, which is
/// removed when the call returns, successful or not.
pub struct ConversionPipeline<'a> {
    runner: &'a dyn TexconvRunner,
    executable: PathBuf,
    work_dir: PathBuf,
    timing: Timing,
}

impl<'a> ConversionPipeline<'a> {
    pub fn new(
        runner: &'a dyn TexconvRunner,
        executable: PathBuf,
        work_dir: PathBuf,
        timing: Timing,
    ) -> Self {
        Self {
            runner,
            executable,
            work_dir,
            timing,
        }
    }

    /// Convert a DDS to a vertically flipped JPEG of `width` x `height` at `dest`
    pub fn dds_to_jpg(&self, dds: &Path, dest: &Path, width: u32, height: u32) -> Result<PathBuf> {
        if !dds.is_file() {
            return Err(HoHatchError::NotFound(dds.to_path_buf()));
        }

        let stem = file_stem(dds);
        let scratch = ScratchDir::create(&self.work_dir, "jpg_conv", &stem, self.timing.dir_removal)?;

        // texconv reads a private copy so the game can keep its handle on the original
        let input = scratch.join(format!("{}.dds", stem));
        fs::copy(dds, &input).map_err(|e| {
            HoHatchError::FileSystem(format!("Failed to stage {}: {}", dds.display(), e))
        })?;

        let request = TexconvRequest::ToJpg {
            input,
            output_dir: scratch.path().to_path_buf(),
            width,
            height,
        };
        run_texconv(self.runner, &self.executable, &request)?;
        self.timing.settle();

        let produced = request.expected_output();
        if !produced.is_file() {
            return Err(HoHatchError::Texconv(format!(
                "Conversion failed: {} was not produced",
                produced.display()
            )));
        }

        flip_vertical_in_place(&produced, &self.timing.image_io)?;
        move_file(&produced, dest)?;
        log::info!("Converted {} -> {}", dds.display(), dest.display());
        Ok(dest.to_path_buf())
    }

    /// Convert a replacement image into `<inject_dir>/<target_name>` as BC7 DDS
    pub fn image_to_dds(&self, replacement: &Path, target_name: &str, inject_dir: &Path) -> Result<PathBuf> {
        let target_stem = file_stem(Path::new(target_name));
        let scratch = ScratchDir::create(&self.work_dir, "replace", &target_stem, self.timing.dir_removal)?;

        let processed = scratch.join(format!("{}_processed.jpg", file_stem(replacement)));
        prepare_replacement(replacement, &processed)?;

        let request = TexconvRequest::ToDds {
            input: processed,
            output_dir: scratch.path().to_path_buf(),
            format: INJECT_FORMAT.to_string(),
            mip_levels: INJECT_MIP_LEVELS,
        };
        run_texconv(self.runner, &self.executable, &request)?;
        self.timing.settle();

        let produced = request.expected_output();
        if !produced.is_file() {
            return Err(HoHatchError::Texconv(format!(
                "Conversion to DDS failed: {} was not produced",
                produced.display()
            )));
        }

        let renamed = scratch.join(target_name);
        fs::rename(&produced, &renamed)?;

        fs::create_dir_all(inject_dir).map_err(|e| {
            HoHatchError::FileSystem(format!("Failed to create {}: {}", inject_dir.display(), e))
        })?;
        let final_path = inject_dir.join(target_name);
        move_file(&renamed, &final_path)?;
        log::info!("Wrote replacement texture {}", final_path.display());
        Ok(final_path)
    }

    /// Replace `target` with `replacement` in the inject folder.
    ///
    /// When the target came from the dump folder the dumped original is removed
    /// afterwards; failing to remove it does not fail the replacement.
    pub fn replace_texture(
        &self,
        target: &Path,
        replacement: &Path,
        inject_dir: &Path,
        is_dump: bool,
    ) -> Result<PathBuf> {
        if file_stem(target) == file_stem(replacement) {
            return Err(HoHatchError::FileSystem(SAME_NAME_ERROR.to_string()));
        }
        if !replacement.is_file() {
            return Err(HoHatchError::NotFound(replacement.to_path_buf()));
        }
        if !is_replacement_image(replacement) {
            return Err(HoHatchError::FileSystem(format!(
                "Unsupported replacement image: {}",
                replacement.display()
            )));
        }
        let target_name = target
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| {
                HoHatchError::FileSystem(format!("Invalid target path: {}", target.display()))
            })?;

        let final_path = self.image_to_dds(replacement, &target_name, inject_dir)?;

        if is_dump && target != final_path {
            match fs::remove_file(target) {
                Ok(()) => log::info!("Deleted original dump texture {}", target.display()),
                Err(e) => log::warn!(
                    "Could not delete original dump texture {}: {}",
                    target.display(),
                    e
                ),
            }
        }

        Ok(final_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeMode, FakeTexconv};
    use image::{Rgba, RgbaImage};

    struct Fixture {
        root: tempfile::TempDir,
        fake: FakeTexconv,
    }

    impl Fixture {
        fn new() -> Self {
            let root = tempfile::tempdir().unwrap();
            fs::create_dir_all(root.path().join("work")).unwrap();
            Self {
                root,
                fake: FakeTexconv::new(),
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

        fn path(&self, rel: &str) -> PathBuf {
            self.root.path().join(rel)
        }

        fn work_is_empty(&self) -> bool {
            fs::read_dir(self.path("work")).unwrap().count() == 0
        }
    }

    fn write_png(path: &Path, w: u32, h: u32) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        RgbaImage::from_pixel(w, h, Rgba([200, 100, 50, 255]))
            .save(path)
            .unwrap();
    }

    #[test]
    fn dds_to_jpg_writes_flipped_output_and_cleans_up() {
        let fx = Fixture::new();
        let dds = fx.path("dump/ABC.dds");
        fs::create_dir_all(dds.parent().unwrap()).unwrap();
        fs::write(&dds, b"dds bytes").unwrap();
        let dest = fx.path("out/ABC.jpg");

        let result = fx.pipeline().dds_to_jpg(&dds, &dest, 848, 1024).unwrap();

        assert_eq!(result, dest);
        let (w, h) = image::image_dimensions(&dest).unwrap();
        assert_eq!((w, h), (848, 1024));
        assert!(dds.is_file());
        assert!(fx.work_is_empty());

        let args = &fx.fake.calls()[0].args;
        assert!(args.contains(&"-r".to_string()));
        assert!(args.windows(2).any(|w| w[0] == "-w" && w[1] == "848"));
    }

    #[test]
    fn dds_to_jpg_missing_source_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .pipeline()
            .dds_to_jpg(&fx.path("nope.dds"), &fx.path("out.jpg"), 8, 8)
            .unwrap_err();
        assert!(matches!(err, HoHatchError::NotFound(_)));
        assert_eq!(fx.fake.call_count(), 0);
    }

    #[test]
    fn converter_failure_surfaces_stderr_and_cleans_up() {
        let fx = Fixture::new();
        fx.fake.set_mode(FakeMode::Fail);
        let dds = fx.path("a.dds");
        fs::write(&dds, b"x").unwrap();

        let err = fx.pipeline().dds_to_jpg(&dds, &fx.path("a.jpg"), 8, 8).unwrap_err();
        assert!(matches!(err, HoHatchError::Texconv(_)));
        assert!(err.to_string().contains("cannot read"));
        assert!(fx.work_is_empty());
    }

    #[test]
    fn missing_output_is_a_conversion_error() {
        let fx = Fixture::new();
        fx.fake.set_mode(FakeMode::NoOutput);
        let dds = fx.path("a.dds");
        fs::write(&dds, b"x").unwrap();

        let err = fx.pipeline().dds_to_jpg(&dds, &fx.path("a.jpg"), 8, 8).unwrap_err();
        assert!(err.to_string().contains("was not produced"));
    }

    #[test]
    fn replacement_is_normalised_to_1024_before_conversion() {
        let fx = Fixture::new();
        let inject = fx.path("inject");
        for (i, (w, h)) in [(256u32, 256u32), (2048, 1536)].into_iter().enumerate() {
            let replacement = fx.path(&format!("art/new{}.png", i));
            write_png(&replacement, w, h);
            let target = inject.join(format!("TEX{}.dds", i));

            fx.pipeline()
                .replace_texture(&target, &replacement, &inject, false)
                .unwrap();
        }

        let calls = fx.fake.calls();
        assert_eq!(calls.len(), 2);
        for call in calls {
            assert_eq!(call.input_dims, Some((1024, 1024)));
            assert!(call.args.windows(2).any(|w| w[0] == "-f" && w[1] == "BC7_UNORM"));
            assert!(call.args.windows(2).any(|w| w[0] == "-m" && w[1] == "11"));
        }
        assert!(inject.join("TEX0.dds").is_file());
        assert!(inject.join("TEX1.dds").is_file());
        assert!(fx.work_is_empty());
    }

    #[test]
    fn dump_sourced_replace_removes_the_original() {
        let fx = Fixture::new();
        let dump_file = fx.path("dump/textures/Game.exe/ABC.dds");
        fs::create_dir_all(dump_file.parent().unwrap()).unwrap();
        fs::write(&dump_file, b"orig").unwrap();
        let replacement = fx.path("art/new.png");
        write_png(&replacement, 64, 64);
        let inject = fx.path("inject/textures");

        let out = fx
            .pipeline()
            .replace_texture(&dump_file, &replacement, &inject, true)
            .unwrap();

        assert_eq!(out, inject.join("ABC.dds"));
        assert!(out.is_file());
        assert!(!dump_file.exists());
    }

    #[test]
    fn inject_sourced_replace_leaves_dump_alone() {
        let fx = Fixture::new();
        let dump_file = fx.path("dump/textures/ABC.dds");
        fs::create_dir_all(dump_file.parent().unwrap()).unwrap();
        fs::write(&dump_file, b"orig").unwrap();
        let inject = fx.path("inject/textures");
        let inject_file = inject.join("ABC.dds");
        fs::create_dir_all(&inject).unwrap();
        fs::write(&inject_file, b"old injected").unwrap();
        let replacement = fx.path("art/new.png");
        write_png(&replacement, 64, 64);

        fx.pipeline()
            .replace_texture(&inject_file, &replacement, &inject, false)
            .unwrap();

        assert_eq!(fs::read(&inject_file).unwrap(), b"DDS fake texture");
        assert_eq!(fs::read(&dump_file).unwrap(), b"orig");
    }

    #[test]
    fn same_stem_is_rejected() {
        let fx = Fixture::new();
        let replacement = fx.path("ABC.png");
        write_png(&replacement, 8, 8);
        let err = fx
            .pipeline()
            .replace_texture(&fx.path("inject/ABC.dds"), &replacement, &fx.path("inject"), false)
            .unwrap_err();
        assert_eq!(err.to_string(), SAME_NAME_ERROR);
        assert_eq!(fx.fake.call_count(), 0);
    }

    #[test]
    fn failed_dds_conversion_keeps_dump_file() {
        let fx = Fixture::new();
        fx.fake.set_mode(FakeMode::Fail);
        let dump_file = fx.path("dump/ABC.dds");
        fs::create_dir_all(dump_file.parent().unwrap()).unwrap();
        fs::write(&dump_file, b"orig").unwrap();
        let replacement = fx.path("new.png");
        write_png(&replacement, 8, 8);

        assert!(fx
            .pipeline()
            .replace_texture(&dump_file, &replacement, &fx.path("inject"), true)
            .is_err());
        assert!(dump_file.is_file());
        assert!(fx.work_is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn undeletable_dump_original_does_not_fail_replace() {
        use std::os::unix::fs::PermissionsExt;

        let fx = Fixture::new();
        let dump_dir = fx.path("dump/textures/Game.exe");
        let dump_file = dump_dir.join("ABC.dds");
        fs::create_dir_all(&dump_dir).unwrap();
        fs::write(&dump_file, b"orig").unwrap();
        let replacement = fx.path("art/new.png");
        write_png(&replacement, 32, 32);
        let inject = fx.path("inject/textures");

        fs::set_permissions(&dump_dir, fs::Permissions::from_mode(0o555)).unwrap();
        // Permission bits are not enforced for root
        let enforced = fs::write(dump_dir.join("write_check"), b"").is_err();
        let _ = fs::remove_file(dump_dir.join("write_check"));

        let result = fx
            .pipeline()
            .replace_texture(&dump_file, &replacement, &inject, true);
        fs::set_permissions(&dump_dir, fs::Permissions::from_mode(0o755)).unwrap();

        let out = result.unwrap();
        assert_eq!(out, inject.join("ABC.dds"));
        assert!(out.is_file());
        if enforced {
            assert!(dump_file.is_file());
        }
    }

    #[test]
    fn non_image_replacement_is_rejected() {
        let fx = Fixture::new();
        let replacement = fx.path("notes.txt");
        fs::write(&replacement, b"hello").unwrap();
        let err = fx
            .pipeline()
            .replace_texture(&fx.path("inject/ABC.dds"), &replacement, &fx.path("inject"), false)
            .unwrap_err();
        assert!(err.to_string().contains("Unsupported replacement image"));
        assert_eq!(fx.fake.call_count(), 0);
    }
}
