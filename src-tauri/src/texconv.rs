use crate::error::{HoHatchError, Result};
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;

/// Block format used for injected textures
pub const INJECT_FORMAT: &str = "BC7_UNORM";
/// Mip chain length for injected 1024x1024 textures
pub const INJECT_MIP_LEVELS: u32 = 11;

#[cfg(target_os = "windows")]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

/// A single texconv invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TexconvRequest {
    /// DDS to JPEG, resized to `width` x `height`
    ToJpg {
        input: PathBuf,
        output_dir: PathBuf,
        width: u32,
        height: u32,
    },
    /// Image to block-compressed DDS with a fixed mip count
    ToDds {
        input: PathBuf,
        output_dir: PathBuf,
        format: String,
        mip_levels: u32,
    },
}

impl TexconvRequest {
    pub fn input(&self) -> &Path {
        match self {
            TexconvRequest::ToJpg { input, .. } | TexconvRequest::ToDds { input, .. } => input,
        }
    }

    pub fn output_dir(&self) -> &Path {
        match self {
            TexconvRequest::ToJpg { output_dir, .. } | TexconvRequest::ToDds { output_dir, .. } => {
                output_dir
            }
        }
    }

    /// File texconv writes on success: the input stem with the target extension
    pub fn expected_output(&self) -> PathBuf {
        let stem = self
            .input()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let ext = match self {
            TexconvRequest::ToJpg { .. } => "jpg",
            TexconvRequest::ToDds { .. } => "dds",
        };
        self.output_dir().join(format!("{}.{}", stem, ext))
    }

    /// `[-f <format>] -o <dir> <input> -ft jpg|-m <levels> [-w <w> -h <h>] [-r] -y`
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        match self {
            TexconvRequest::ToJpg {
                input,
                output_dir,
                width,
                height,
            } => {
                args.push("-o".to_string());
                args.push(path_arg(output_dir));
                args.push(path_arg(input));
                args.push("-ft".to_string());
                args.push("jpg".to_string());
                args.push("-w".to_string());
                args.push(width.to_string());
                args.push("-h".to_string());
                args.push(height.to_string());
                args.push("-r".to_string());
            }
            TexconvRequest::ToDds {
                input,
                output_dir,
                format,
                mip_levels,
            } => {
                args.push("-f".to_string());
                args.push(format.clone());
                args.push("-o".to_string());
                args.push(path_arg(output_dir));
                args.push(path_arg(input));
                args.push("-m".to_string());
                args.push(mip_levels.to_string());
            }
        }
        args.push("-y".to_string());
        args
    }
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Captured result of a finished texconv process
#[derive(Debug, Clone, Default)]
pub struct TexconvOutput {
    pub success: bool,
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Seam between the pipeline and the external process
pub trait TexconvRunner: Send + Sync {
    fn run(&self, executable: &Path, args: &[String]) -> io::Result<TexconvOutput>;
}

impl<T: TexconvRunner + ?Sized> TexconvRunner for std::sync::Arc<T> {
    fn run(&self, executable: &Path, args: &[String]) -> io::Result<TexconvOutput> {
        (**self).run(executable, args)
    }
}

/// Runs the real texconv executable
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

impl TexconvRunner for ProcessRunner {
    fn run(&self, executable: &Path, args: &[String]) -> io::Result<TexconvOutput> {
        let mut command = Command::new(executable);
        command.args(args);
        #[cfg(target_os = "windows")]
        {
            use std::os::windows::process::CommandExt;
            command.creation_flags(CREATE_NO_WINDOW);
        }

        let output = command.output()?;
        Ok(TexconvOutput {
            success: output.status.success(),
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).trim().to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        })
    }
}

/// Run one request. A spawn failure or non-zero exit is an error carrying the tool output.
pub fn run_texconv(
    runner: &dyn TexconvRunner,
    executable: &Path,
    request: &TexconvRequest,
) -> Result<TexconvOutput> {
    let args = request.to_args();
    log::info!("Running texconv: {} {}", executable.display(), args.join(" "));

    let output = runner.run(executable, &args).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            HoHatchError::Texconv(format!(
                "Texconv executable not found at {}",
                executable.display()
            ))
        } else {
            HoHatchError::Texconv(format!("Failed to start texconv: {}", e))
        }
    })?;

    if !output.stdout.is_empty() {
        log::debug!("texconv stdout: {}", output.stdout);
    }
    if !output.stderr.is_empty() {
        log::warn!("texconv stderr: {}", output.stderr);
    }

    if !output.success {
        let code = output
            .code
            .map(|c| c.to_string())
            .unwrap_or_else(|| "none".to_string());
        return Err(HoHatchError::Texconv(format!(
            "Texconv failed. Return code: {}. Stdout: {}. Stderr: {}",
            code, output.stdout, output.stderr
        )));
    }

    Ok(output)
}
