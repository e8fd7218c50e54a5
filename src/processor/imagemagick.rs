//! Image resizing via ImageMagick.

use super::{CommandTransform, Processor, Transform};
use crate::types::{ChunkStream, ImageProperties};

/// Default ImageMagick executable.
pub const DEFAULT_PROGRAM: &str = "convert";

/// Resizes images to fill `width`x`height`, cropping the overflow around the
/// centre.
///
/// With one dimension set to 0 the image is scaled to the other, keeping
/// its aspect ratio. `0x0` returns the original bytes. The output keeps the
/// input's format.
#[derive(Debug, Clone)]
pub struct ImageMagickProcessor {
    program: String,
}

impl ImageMagickProcessor {
    pub fn new() -> Self {
        Self::with_program(DEFAULT_PROGRAM)
    }

    /// Use a different executable (e.g. `magick` on ImageMagick 7).
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Command-line arguments for `properties`, or `None` for a pass-through.
    pub fn arguments(properties: &ImageProperties) -> Option<Vec<String>> {
        let ImageProperties { width, height } = *properties;
        let resize = match (width, height) {
            (0, 0) => return None,
            (w, 0) => vec!["-resize".to_string(), format!("{w}x")],
            (0, h) => vec!["-resize".to_string(), format!("x{h}")],
            (w, h) => vec![
                "-resize".to_string(),
                format!("{w}x{h}^"),
                "-gravity".to_string(),
                "center".to_string(),
                "-extent".to_string(),
                format!("{w}x{h}"),
            ],
        };

        let mut args = Vec::with_capacity(resize.len() + 2);
        args.push("-".to_string());
        args.extend(resize);
        args.push("-".to_string());
        Some(args)
    }
}

impl Default for ImageMagickProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl Processor<ImageProperties> for ImageMagickProcessor {
    fn name(&self) -> &str {
        "imagemagick"
    }

    fn process(&self, properties: &ImageProperties) -> Box<dyn Transform> {
        match Self::arguments(properties) {
            Some(args) => Box::new(CommandTransform::new(&self.program).args(args)),
            None => Box::new(|input: ChunkStream| input),
        }
    }
}
