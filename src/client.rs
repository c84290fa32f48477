use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{GenError, Result};
use crate::io::{ensure_exists, load_image, save_output};
use crate::prompts::{self, EnhancementLevel};
use crate::providers::{GenerationRequest, ImageProvider, InlineImage, Part};

pub const FALLBACK_LABEL: &str = "object";

/// Builds prompts, relays them with images to the model and saves the first image returned.
#[derive(Clone)]
pub struct GenerationClient {
    provider: Arc<dyn ImageProvider>,
}

impl GenerationClient {
    pub fn new(provider: Arc<dyn ImageProvider>) -> Self {
        Self { provider }
    }

    pub fn provider_name(&self) -> &'static str {
        self.provider.name()
    }

    /// Asks the model for a one-to-two word name of the main object.
    /// Never fails: any error degrades to [`FALLBACK_LABEL`].
    pub async fn detect_label(&self, object: &InlineImage) -> String {
        let req = match GenerationRequest::new(prompts::DETECT_PROMPT, vec![object.clone()]) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!("object detection failed: {e}");
                return FALLBACK_LABEL.into();
            }
        };
        match self.provider.generate(&req).await {
            Ok(parts) => {
                let label = parts
                    .iter()
                    .find_map(|p| match p {
                        Part::Text(t) => Some(t.as_str()),
                        Part::Image(_) => None,
                    })
                    .map(clean_label)
                    .filter(|l| !l.is_empty())
                    .unwrap_or_else(|| FALLBACK_LABEL.into());
                tracing::info!(label = %label, "detected object type");
                label
            }
            Err(e) => {
                tracing::warn!("object detection failed: {e}");
                FALLBACK_LABEL.into()
            }
        }
    }

    pub async fn insert_object(
        &self,
        scene: &Path,
        object: &Path,
        output: &Path,
        object_type: Option<&str>,
        level: EnhancementLevel,
    ) -> Result<PathBuf> {
        tracing::info!(scene = %scene.display(), object = %object.display(), "inserting object into scene");
        ensure_exists(scene).await?;
        ensure_exists(object).await?;
        let scene_img = load_image(scene).await?;
        let object_img = load_image(object).await?;

        let label = match object_type.map(str::trim).filter(|s| !s.is_empty()) {
            Some(t) => t.to_string(),
            None => self.detect_label(&object_img).await,
        };

        let prompt = prompts::build_object_prompt(&label, level);
        self.generate_to(prompt, vec![scene_img, object_img], output)
            .await
            .inspect_err(|e| tracing::error!("object insertion failed: {e}"))
    }

    pub async fn insert_text(
        &self,
        scene: &Path,
        text: &str,
        output: &Path,
        target_area: &str,
        style: Option<&str>,
    ) -> Result<PathBuf> {
        tracing::info!(text = %text, area = %target_area, "inserting text into scene");
        let scene_img = load_image(scene).await?;
        let prompt = prompts::build_text_prompt(text, target_area, style);
        self.generate_to(prompt, vec![scene_img], output)
            .await
            .inspect_err(|e| tracing::error!("text insertion failed: {e}"))
    }

    /// Concatenation of every text part the model returns for the analysis prompt.
    pub async fn analyze_scene(&self, image: &Path) -> Result<String> {
        tracing::info!(image = %image.display(), "analyzing scene");
        let img = load_image(image).await?;
        let req = GenerationRequest::new(prompts::ANALYZE_PROMPT, vec![img])?;
        let parts = self
            .provider
            .generate(&req)
            .await
            .inspect_err(|e| tracing::error!("scene analysis failed: {e}"))?;
        Ok(parts
            .into_iter()
            .filter_map(|p| match p {
                Part::Text(t) => Some(t),
                Part::Image(_) => None,
            })
            .collect())
    }

    async fn generate_to(&self, prompt: String, images: Vec<InlineImage>, output: &Path) -> Result<PathBuf> {
        let req = GenerationRequest::new(prompt, images)?;
        tracing::info!(provider = self.provider.name(), "calling model for image generation");
        let parts = self.provider.generate(&req).await?;

        let img = first_image(&parts).ok_or(GenError::NoImage)?;
        save_output(output, img).await?;
        tracing::info!(path = %output.display(), "generated image saved");
        Ok(output.to_path_buf())
    }
}

/// First image-bearing part in response order. Text seen before it is logged.
fn first_image(parts: &[Part]) -> Option<&InlineImage> {
    let mut found = None;
    let mut extra = 0usize;
    for part in parts {
        match part {
            Part::Image(img) if found.is_none() => found = Some(img),
            Part::Image(_) => extra += 1,
            Part::Text(t) if found.is_none() => tracing::info!("model response: {t}"),
            Part::Text(_) => {}
        }
    }
    if extra > 0 {
        tracing::debug!(ignored = extra, "response carried additional images");
    }
    found
}

fn clean_label(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .lines()
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}
