//! External tool implementations: ImageMagick `convert` and `imgkap`.

use std::path::Path;
use std::process::Command;

use chartkap_pipeline::{Extent, PixelRect};

use crate::collaborators::{ChartEncoder, CollaboratorError, RasterTransformer};

/// Run `command`, turning spawn failures and non-zero exits into errors.
fn run(tool: &str, command: &mut Command) -> Result<(), CollaboratorError> {
    log::debug!("running {command:?}");
    let output = command.output().map_err(|source| CollaboratorError::Spawn {
        tool: tool.to_owned(),
        source,
    })?;
    if output.status.success() {
        Ok(())
    } else {
        Err(CollaboratorError::ToolFailed {
            tool: tool.to_owned(),
            status: output.status.to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        })
    }
}

/// [`RasterTransformer`] backed by ImageMagick's `convert`.
#[derive(Debug, Clone)]
pub struct ImageMagick {
    program: String,
}

impl ImageMagick {
    /// Use `program` (e.g. `convert` or `magick`) for all transforms.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn convert(&self, source: &Path, target: &Path, args: &[String]) -> Result<(), CollaboratorError> {
        let mut command = Command::new(&self.program);
        command.arg(source).args(args).arg(target);
        run(&self.program, &mut command)
    }
}

impl RasterTransformer for ImageMagick {
    fn rotate(&self, source: &Path, target: &Path, degrees: f64) -> Result<(), CollaboratorError> {
        self.convert(source, target, &["-rotate".to_owned(), degrees.to_string()])
    }

    fn crop(&self, source: &Path, target: &Path, rect: PixelRect) -> Result<(), CollaboratorError> {
        self.convert(
            source,
            target,
            &["-crop".to_owned(), rect.to_string(), "+repage".to_owned()],
        )
    }

    fn resize_percent(
        &self,
        source: &Path,
        target: &Path,
        percent: f64,
    ) -> Result<(), CollaboratorError> {
        self.convert(source, target, &["-resize".to_owned(), format!("{percent}%")])
    }

    fn quantize_and_export(
        &self,
        source: &Path,
        target: &Path,
        colors: u32,
    ) -> Result<(), CollaboratorError> {
        let mut command = Command::new(&self.program);
        command
            .arg(source)
            .args(["-depth", "8", "-colors"])
            .arg(colors.to_string())
            .args(["-type", "Palette"])
            .arg(format!("png8:{}", target.display()));
        run(&self.program, &mut command)
    }

    fn dimensions(&self, path: &Path) -> Result<Extent, CollaboratorError> {
        let (width, height) =
            image::image_dimensions(path).map_err(|source| CollaboratorError::Image {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Extent::new(width, height))
    }
}

/// [`ChartEncoder`] backed by `imgkap`.
///
/// The header is written next to the output as `<output>.txt`, which
/// is also where `imgkap` expects to find it.
#[derive(Debug, Clone)]
pub struct Imgkap {
    program: String,
}

impl Imgkap {
    /// Use `program` as the `imgkap` executable.
    #[must_use]
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl ChartEncoder for Imgkap {
    fn encode(&self, header: &str, image: &Path, output: &Path) -> Result<(), CollaboratorError> {
        let header_path = output.with_extension("txt");
        std::fs::write(&header_path, header)
            .map_err(|source| CollaboratorError::io(&header_path, source))?;
        let mut command = Command::new(&self.program);
        command
            .args(["-p", "NONE", "-n"])
            .arg(image)
            .arg(&header_path)
            .arg(output);
        run(&self.program, &mut command)
    }
}
