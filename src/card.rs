use std::io::Cursor;
use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use anyhow::{Context, Result};
use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use imageproc::drawing::draw_text_mut;

use crate::config::CardConfig;

const WIDTH: u32 = 600;
const HEIGHT: u32 = 400;
const MARGIN: i32 = 10;
const LINE_HEIGHT: i32 = 20;

/// Renders the weather text onto a white PNG card.
pub struct WeatherCard {
    font: FontVec,
    scale: PxScale,
    save_path: Option<PathBuf>,
}

impl WeatherCard {
    /// `None` when cards are disabled or no font is configured.
    pub fn from_config(config: &CardConfig) -> Result<Option<Self>> {
        if !config.enabled {
            return Ok(None);
        }
        let Some(font_path) = &config.font_path else {
            tracing::warn!("Weather card enabled but no font_path set; sending text only");
            return Ok(None);
        };
        let card = Self {
            font: load_font(font_path)?,
            scale: PxScale::from(config.font_size),
            save_path: config.save_path.clone(),
        };
        Ok(Some(card))
    }

    pub fn render(&self, text: &str) -> Result<Vec<u8>> {
        let mut canvas = RgbImage::from_pixel(WIDTH, HEIGHT, Rgb([255, 255, 255]));
        for (line, y) in text.lines().zip(line_offsets()) {
            draw_text_mut(&mut canvas, Rgb([0, 0, 0]), MARGIN, y, self.scale, &self.font, line);
        }

        let mut png = Vec::new();
        DynamicImage::ImageRgb8(canvas)
            .write_to(&mut Cursor::new(&mut png), ImageFormat::Png)
            .context("Failed to encode weather card")?;

        if let Some(path) = &self.save_path {
            std::fs::write(path, &png)
                .with_context(|| format!("Failed to save weather card: {}", path.display()))?;
        }
        tracing::info!("Generated weather card ({} bytes)", png.len());
        Ok(png)
    }
}

fn load_font(path: &Path) -> Result<FontVec> {
    let data = std::fs::read(path)
        .with_context(|| format!("Failed to read font: {}", path.display()))?;
    FontVec::try_from_vec(data).map_err(|e| anyhow::anyhow!("Invalid font {}: {e}", path.display()))
}

/// Baselines that still fit on the card.
fn line_offsets() -> impl Iterator<Item = i32> {
    (0..)
        .map(|i| MARGIN + i * LINE_HEIGHT)
        .take_while(|y| *y + LINE_HEIGHT <= HEIGHT as i32)
}
