//! Inserts objects and text into scene photographs by prompting a remote
//! generative image model, and saves the image it returns.

pub mod batch;
pub mod client;
pub mod config;
pub mod error;
pub mod io;
pub mod prompts;
pub mod providers;
mod rate_limit;

pub use batch::{batch_process, BatchInputs, BatchParams};
pub use client::GenerationClient;
pub use config::ClientCfg;
pub use error::{GenError, Result};
pub use prompts::{build_object_prompt, build_text_prompt, EnhancementLevel};
pub use providers::{GenerationRequest, ImageProvider, InlineImage, Part, ProviderError};
