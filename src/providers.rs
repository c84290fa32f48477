use std::time::Duration;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use image::{ImageBuffer, Rgba};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image-preview";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("rate limited by remote model")]
    RateLimited,
    #[error("http error: {0}")]
    Http(String),
    #[error("fatal provider error: {0}")]
    Fatal(String),
}

/// Raw image payload plus the MIME type it travels under.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// One part of the first candidate of a model response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Image(InlineImage),
}

/// Prompt text followed by one or more images, sent in that order.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    images: Vec<InlineImage>,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, images: Vec<InlineImage>) -> Result<Self, ProviderError> {
        if images.is_empty() {
            return Err(ProviderError::Fatal("request must contain at least one image".into()));
        }
        Ok(Self { prompt: prompt.into(), images })
    }

    pub fn prompt(&self) -> &str { &self.prompt }

    pub fn images(&self) -> &[InlineImage] { &self.images }
}

#[async_trait]
pub trait ImageProvider: Send + Sync {
    /// Submits the request and returns the parts of the first candidate, in order.
    async fn generate(&self, req: &GenerationRequest) -> Result<Vec<Part>, ProviderError>;
    fn name(&self) -> &'static str;
}

pub struct MockProvider;

#[async_trait]
impl ImageProvider for MockProvider {
    fn name(&self) -> &'static str { "mock" }

    async fn generate(&self, req: &GenerationRequest) -> Result<Vec<Part>, ProviderError> {
        // CPU-bound image synthesis. Small and fast enough to do inline.
        let bytes = render_png(256, 256, (req.prompt().len() % 255) as u8)
            .map_err(|e| ProviderError::Fatal(format!("encode error: {e}")))?;
        Ok(vec![
            Part::Text("mock".into()),
            Part::Image(InlineImage { mime_type: "image/png".into(), bytes }),
        ])
    }
}

pub(crate) fn render_png(w: u32, h: u32, tint: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut img = ImageBuffer::<Rgba<u8>, Vec<u8>>::new(w, h);
    for (x, y, p) in img.enumerate_pixels_mut() {
        let v = ((x ^ y) & 0xFF) as u8;
        *p = Rgba([v, 255 - v, tint, 255]);
    }
    let mut png_bytes: Vec<u8> = Vec::new();
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut std::io::Cursor::new(&mut png_bytes), image::ImageFormat::Png)?;
    Ok(png_bytes)
}

pub struct GeminiProvider {
    client: reqwest::Client,
    api_key: String,
    model: String,
    api_base: String,
}

impl GeminiProvider {
    pub fn new(
        api_key: String,
        model: String,
        api_base: String,
        timeout: Option<Duration>,
    ) -> Result<Self, ProviderError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        let client = builder
            .build()
            .map_err(|e| ProviderError::Fatal(format!("http client: {e}")))?;
        Ok(Self { client, api_key, model, api_base })
    }

    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.api_base.trim_end_matches('/'), self.model)
    }
}

#[derive(Serialize)]
struct GenerateContentReq<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<ReqPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum ReqPart<'a> {
    Text { text: &'a str },
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: ReqBlob<'a>,
    },
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ReqBlob<'a> {
    mime_type: &'a str,
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResp {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<RespPart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespPart {
    text: Option<String>,
    #[serde(alias = "inline_data")]
    inline_data: Option<RespBlob>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RespBlob {
    #[serde(alias = "mime_type", default)]
    mime_type: Option<String>,
    #[serde(default)]
    data: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

fn encode_request(req: &GenerationRequest) -> GenerateContentReq<'_> {
    let mut parts = Vec::with_capacity(req.images().len() + 1);
    parts.push(ReqPart::Text { text: req.prompt() });
    for img in req.images() {
        parts.push(ReqPart::Inline {
            inline_data: ReqBlob { mime_type: &img.mime_type, data: BASE64.encode(&img.bytes) },
        });
    }
    GenerateContentReq { contents: vec![Content { role: "user", parts }] }
}

/// Only the first candidate is read; the rest are dropped.
fn first_candidate_parts(resp: GenerateContentResp) -> Result<Vec<Part>, ProviderError> {
    let Some(candidate) = resp.candidates.into_iter().next() else {
        let reason = resp
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .unwrap_or_else(|| "unspecified".into());
        return Err(ProviderError::Fatal(format!("response has no candidates (block reason: {reason})")));
    };

    let mut out = Vec::new();
    for part in candidate.content.map(|c| c.parts).unwrap_or_default() {
        if let Some(blob) = part.inline_data {
            if blob.data.is_empty() { continue; }
            let bytes = BASE64
                .decode(blob.data.as_bytes())
                .map_err(|e| ProviderError::Fatal(format!("image base64 decode failed: {e}")))?;
            let mime_type = blob.mime_type.unwrap_or_else(|| "image/png".into());
            out.push(Part::Image(InlineImage { mime_type, bytes }));
        } else if let Some(text) = part.text {
            out.push(Part::Text(text));
        }
    }
    Ok(out)
}

#[async_trait]
impl ImageProvider for GeminiProvider {
    fn name(&self) -> &'static str { "gemini" }

    async fn generate(&self, req: &GenerationRequest) -> Result<Vec<Part>, ProviderError> {
        let body = encode_request(req);
        tracing::debug!(model = %self.model, images = req.images().len(), "calling generateContent");

        let resp = self
            .client
            .post(self.endpoint())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        let status = resp.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let snippet: String = text.chars().take(500).collect();
            return Err(ProviderError::Http(format!("{status}: {snippet}")));
        }

        let parsed = resp
            .json::<GenerateContentResp>()
            .await
            .map_err(|e| ProviderError::Fatal(format!("decode error: {e}")))?;
        first_candidate_parts(parsed)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    type Script = dyn Fn(&GenerationRequest) -> Result<Vec<Part>, ProviderError> + Send + Sync;

    /// Provider whose answers come from a closure, for deterministic tests.
    pub struct ScriptedProvider {
        script: Box<Script>,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        pub fn new<F>(f: F) -> Self
        where
            F: Fn(&GenerationRequest) -> Result<Vec<Part>, ProviderError> + Send + Sync + 'static,
        {
            Self { script: Box::new(f), calls: AtomicUsize::new(0) }
        }

        pub fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
    }

    #[async_trait]
    impl ImageProvider for ScriptedProvider {
        fn name(&self) -> &'static str { "scripted" }

        async fn generate(&self, req: &GenerationRequest) -> Result<Vec<Part>, ProviderError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.script)(req)
        }
    }

    pub fn png(tint: u8) -> Vec<u8> {
        render_png(4, 4, tint).unwrap()
    }

    pub fn image_part(tint: u8) -> Part {
        Part::Image(InlineImage { mime_type: "image/png".into(), bytes: png(tint) })
    }
}
