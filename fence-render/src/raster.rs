//! Vector to bitmap rasterization

use std::path::Path;

use crate::cache::VECTOR_EXT;
use crate::error::RenderError;

/// Resolution SVG user units are defined at
pub const SVG_DPI: f32 = 96.0;

/// Converts a vector artifact into PNG bytes
pub trait Rasterizer: Send + Sync {
    fn rasterize(&self, svg: &Path, dpi: f32) -> Result<Vec<u8>, RenderError>;
}

/// Whether a path names a vector artifact that needs rasterizing
pub fn is_vector(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(VECTOR_EXT))
}

/// Whether a path names a bitmap the display layer can show as-is
pub fn is_raster(path: &Path) -> bool {
    image::ImageFormat::from_path(path).is_ok()
}

/// Rasterizer backed by resvg
#[cfg(feature = "raster")]
#[derive(Debug, Default, Clone, Copy)]
pub struct ResvgRasterizer;

#[cfg(feature = "raster")]
impl Rasterizer for ResvgRasterizer {
    fn rasterize(&self, svg: &Path, dpi: f32) -> Result<Vec<u8>, RenderError> {
        use resvg::{tiny_skia, usvg};

        let data = std::fs::read(svg)?;
        let tree = usvg::Tree::from_data(&data, &usvg::Options::default())
            .map_err(|e| RenderError::Rasterize(format!("{}: {}", svg.display(), e)))?;

        let scale = dpi / SVG_DPI;
        let size = tree.size();
        let width = (size.width() * scale).ceil() as u32;
        let height = (size.height() * scale).ceil() as u32;

        let mut pixmap = tiny_skia::Pixmap::new(width.max(1), height.max(1)).ok_or_else(|| {
            RenderError::Rasterize(format!("cannot allocate {}x{} bitmap", width, height))
        })?;

        resvg::render(
            &tree,
            tiny_skia::Transform::from_scale(scale, scale),
            &mut pixmap.as_mut(),
        );

        pixmap
            .encode_png()
            .map_err(|e| RenderError::Rasterize(e.to_string()))
    }
}

/// Placeholder used when built without rasterization support
#[cfg(not(feature = "raster"))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRasterizer;

#[cfg(not(feature = "raster"))]
impl Rasterizer for UnsupportedRasterizer {
    fn rasterize(&self, svg: &Path, _dpi: f32) -> Result<Vec<u8>, RenderError> {
        Err(RenderError::Rasterize(format!(
            "built without the `raster` feature, cannot rasterize {}",
            svg.display()
        )))
    }
}

/// Rasterizer selected by the enabled features
pub fn default_rasterizer() -> Box<dyn Rasterizer> {
    #[cfg(feature = "raster")]
    {
        Box::new(ResvgRasterizer)
    }

    #[cfg(not(feature = "raster"))]
    {
        Box::new(UnsupportedRasterizer)
    }
}
