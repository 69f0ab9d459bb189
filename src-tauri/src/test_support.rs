//! Test doubles shared by the module tests.

use crate::texconv::{TexconvOutput, TexconvRunner};
use image::{Rgb, RgbImage};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FakeMode {
    /// Behave like texconv: write the expected output file
    #[default]
    Convert,
    /// Exit non-zero with a message on stderr
    Fail,
    /// Exit zero but write nothing
    NoOutput,
}

#[derive(Debug, Clone)]
pub struct FakeCall {
    pub args: Vec<String>,
    /// Dimensions of the input image when it was a JPEG
    pub input_dims: Option<(u32, u32)>,
}

/// Emulates texconv by writing real JPEGs or stub DDS files
#[derive(Debug, Default)]
pub struct FakeTexconv {
    mode: Mutex<FakeMode>,
    calls: Mutex<Vec<FakeCall>>,
}

impl FakeTexconv {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_mode(&self, mode: FakeMode) {
        *self.mode.lock().unwrap() = mode;
    }

    pub fn calls(&self) -> Vec<FakeCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

fn value_after(args: &[String], flag: &str) -> Option<String> {
    args.iter()
        .position(|a| a == flag)
        .and_then(|i| args.get(i + 1))
        .cloned()
}

impl TexconvRunner for FakeTexconv {
    fn run(&self, _executable: &Path, args: &[String]) -> io::Result<TexconvOutput> {
        let out_index = args.iter().position(|a| a == "-o").expect("-o flag");
        let output_dir = PathBuf::from(&args[out_index + 1]);
        let input = PathBuf::from(&args[out_index + 2]);
        let stem = input.file_stem().unwrap().to_string_lossy().to_string();
        let to_jpg = value_after(args, "-ft").as_deref() == Some("jpg");

        let input_dims = if to_jpg {
            None
        } else {
            image::image_dimensions(&input).ok()
        };
        self.calls.lock().unwrap().push(FakeCall {
            args: args.to_vec(),
            input_dims,
        });

        match *self.mode.lock().unwrap() {
            FakeMode::Fail => {
                return Ok(TexconvOutput {
                    success: false,
                    code: Some(1),
                    stdout: String::new(),
                    stderr: format!("ERROR: cannot read {}", input.display()),
                })
            }
            FakeMode::NoOutput => {
                return Ok(TexconvOutput {
                    success: true,
                    code: Some(0),
                    ..Default::default()
                })
            }
            FakeMode::Convert => {}
        }

        if !input.is_file() {
            return Ok(TexconvOutput {
                success: false,
                code: Some(1),
                stdout: String::new(),
                stderr: format!("FAILED: {} not found", input.display()),
            });
        }

        if to_jpg {
            let width = value_after(args, "-w").and_then(|v| v.parse().ok()).unwrap_or(8);
            let height = value_after(args, "-h").and_then(|v| v.parse().ok()).unwrap_or(8);
            // Shade follows the source bytes so different inputs give different JPEGs
            let shade = fs::read(&input)?.iter().fold(0u8, |acc, b| acc.wrapping_add(*b));
            let img = RgbImage::from_pixel(width, height, Rgb([shade, shade, shade]));
            img.save_with_format(output_dir.join(format!("{}.jpg", stem)), image::ImageFormat::Jpeg)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e.to_string()))?;
        } else {
            fs::write(output_dir.join(format!("{}.dds", stem)), b"DDS fake texture")?;
        }

        Ok(TexconvOutput {
            success: true,
            code: Some(0),
            stdout: format!("reading {}", input.display()),
            stderr: String::new(),
        })
    }
}

/// Special K tree with one profile and empty dump/inject texture folders
pub fn special_k_tree(root: &Path) -> (PathBuf, PathBuf, PathBuf) {
    let sk = root.join("Special K");
    let profile = sk.join("Profiles").join("Shadowverse Worlds Beyond");
    let dump = profile.join("SK_Res").join("dump").join("textures");
    let inject = profile.join("SK_Res").join("inject").join("textures");
    fs::create_dir_all(&dump).unwrap();
    fs::create_dir_all(&inject).unwrap();
    fs::write(sk.join("SKIF.exe"), b"").unwrap();
    (sk, dump, inject)
}
