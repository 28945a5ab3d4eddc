use std::path::Path;
use std::time::Duration;

use reqwest::blocking::multipart::Form;
use reqwest::blocking::Client;
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use tracing::{debug, trace};

use crate::{CollaboratorError, Credentials};

pub const STABILITY_CORE_ENDPOINT: &str =
    "https://api.stability.ai/v2beta/stable-image/generate/core";

pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(120);

pub trait ImageGenerator {
    /// Synthesizes an image for `prompt` and writes it to `output_path`.
    fn generate(&mut self, prompt: &str, output_path: &Path) -> Result<(), CollaboratorError>;
}

/// Stability AI's "Stable Image Core" text-to-image endpoint.
pub struct StabilityClient {
    client: Client,
    endpoint: String,
    api_key: Option<String>,
    seed: Option<u32>,
}

impl StabilityClient {
    pub fn new(credentials: &Credentials, timeout: Duration) -> Result<Self, CollaboratorError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            endpoint: String::from(STABILITY_CORE_ENDPOINT),
            api_key: credentials.api_key.clone(),
            seed: None,
        })
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = String::from(endpoint);
        self
    }

    /// Makes generation deterministic on the provider's side.
    pub fn with_seed(mut self, seed: Option<u32>) -> Self {
        self.seed = seed;
        self
    }
}

impl ImageGenerator for StabilityClient {
    fn generate(&mut self, prompt: &str, output_path: &Path) -> Result<(), CollaboratorError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(CollaboratorError::MissingApiKey)?;

        let mut form = Form::new()
            .text("prompt", prompt.to_owned())
            .text("output_format", "png");
        if let Some(seed) = self.seed {
            form = form.text("seed", seed.to_string());
        }

        trace!(endpoint = %self.endpoint, prompt, "Requesting image");
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .header(ACCEPT, "image/*")
            .multipart(form)
            .send()?;

        let status = response.status();
        if status != StatusCode::OK {
            // The error payload is JSON, but it's passed on verbatim
            let payload = response.text()?;
            return Err(CollaboratorError::Rejected {
                status: status.as_u16(),
                payload,
            });
        }

        let bytes = response.bytes()?;
        std::fs::write(output_path, &bytes)?;
        debug!(path = %output_path.display(), num_bytes = bytes.len(), "Stored generated image");
        Ok(())
    }
}
