use super::layout::HouseConfig;
use crate::{config::RenderConfig, shared::errors::AppError};
use image::{imageops, RgbaImage};

/// Everything the renderer needs that never changes after startup.
/// Holding one of these means initialization has completed.
pub struct HouseAssets {
    pub layout: HouseConfig,
    /// Floor plan, already sized to the canvas.
    pub base: RgbaImage,
}

impl HouseAssets {
    pub fn new(layout: HouseConfig, base: RgbaImage) -> Self {
        let (w, h) = match (layout.dims.w, layout.dims.h) {
            (0, _) | (_, 0) => base.dimensions(),
            (w, h) => (w, h),
        };

        let base = if base.dimensions() == (w, h) {
            base
        } else {
            let mut canvas = RgbaImage::from_pixel(w, h, image::Rgba([255, 255, 255, 255]));
            imageops::overlay(&mut canvas, &base, 0, 0);
            canvas
        };

        HouseAssets { layout, base }
    }

    pub fn load(config: &RenderConfig) -> Result<Self, AppError> {
        let layout = HouseConfig::load_from_file(&config.layout)?;

        let base = image::open(&config.base_image)
            .map_err(|e| {
                AppError::render(format!(
                    "Failed to load base image {}: {}",
                    config.base_image.display(),
                    e
                ))
            })?
            .to_rgba8();

        log::info!(
            "Loaded layout with {} rooms and a {}x{} floor plan",
            layout.rooms.len(),
            base.width(),
            base.height()
        );

        Ok(Self::new(layout, base))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::modules::house::layout::tests::LAYOUT;

    #[test]
    fn base_is_fitted_to_layout_dims() {
        let layout = HouseConfig::from_json(LAYOUT).unwrap();
        let base = RgbaImage::from_pixel(50, 50, image::Rgba([0, 0, 0, 255]));

        let assets = HouseAssets::new(layout, base);

        assert_eq!(assets.base.dimensions(), (200, 120));
        assert_eq!(assets.base.get_pixel(10, 10).0, [0, 0, 0, 255]);
        assert_eq!(assets.base.get_pixel(100, 100).0, [255, 255, 255, 255]);
    }

    #[test]
    fn bundled_assets_load() {
        let assets = HouseAssets::load(&RenderConfig::default()).unwrap();
        assert_eq!(assets.base.dimensions(), (400, 300));
        assert_eq!(assets.layout.draw_order().count(), 4);
    }

    #[test]
    fn missing_assets_are_render_errors() {
        let config = RenderConfig {
            layout: "does/not/exist.json".into(),
            ..RenderConfig::default()
        };
        let err = HouseAssets::load(&config).err().unwrap();
        assert_eq!(err.err_type, crate::shared::errors::ErrorType::Render);
    }
}
