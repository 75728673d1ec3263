//! services/api/src/adapters/card_image.rs
//!
//! This module contains the adapter for card artwork generation.
//! It implements the `CardImageService` port from the `core` crate by
//! calling the image-generation endpoint over plain HTTP.

use arcana_core::domain::TarotCard;
use arcana_core::ports::{CardImageService, PortError, PortResult};
use async_trait::async_trait;
use serde::Deserialize;

const IMAGES_ENDPOINT: &str = "https://api.openai.com/v1/images/generations";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `CardImageService` against an OpenAI-compatible
/// image-generation endpoint.
#[derive(Clone)]
pub struct OpenAiImageAdapter {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl OpenAiImageAdapter {
    /// Creates a new `OpenAiImageAdapter`.
    pub fn new(http: reqwest::Client, api_key: String, model: String) -> Self {
        Self {
            http,
            api_key,
            model,
        }
    }

    fn build_prompt(card: &TarotCard) -> String {
        let orientation = if card.reversed {
            ", drawn reversed, with an inverted and shadowed mood"
        } else {
            ""
        };
        format!(
            "Ornate tarot card artwork for \"{}\"{}. Rich art-nouveau linework, \
             deep indigo and gold palette, centered figure, decorative border, no text.",
            card.name, orientation
        )
    }
}

#[derive(Deserialize)]
struct ImagesResponse {
    data: Vec<ImageDatum>,
}

#[derive(Deserialize)]
struct ImageDatum {
    url: Option<String>,
}

//=========================================================================================
// `CardImageService` Trait Implementation
//=========================================================================================

#[async_trait]
impl CardImageService for OpenAiImageAdapter {
    /// Generates artwork for one drawn card and returns its URL. A failure
    /// here leaves the placeholder image in place; the caller only logs it.
    async fn generate(&self, card: &TarotCard) -> PortResult<String> {
        let body = serde_json::json!({
            "model": self.model,
            "prompt": Self::build_prompt(card),
            "n": 1,
            "size": "1024x1024",
        });

        let response = self
            .http
            .post(IMAGES_ENDPOINT)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PortError::Unexpected(format!(
                "image endpoint returned {}",
                response.status()
            )));
        }

        let parsed: ImagesResponse = response
            .json()
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        parsed
            .data
            .into_iter()
            .find_map(|datum| datum.url)
            .ok_or_else(|| {
                PortError::Unexpected("image response contained no url".to_string())
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reversed_cards_get_a_reversed_prompt() {
        let card = TarotCard {
            index: 16,
            name: "The Tower".to_string(),
            reversed: true,
            image_url: None,
        };
        let prompt = OpenAiImageAdapter::build_prompt(&card);
        assert!(prompt.contains("The Tower"));
        assert!(prompt.contains("reversed"));

        let upright = TarotCard {
            reversed: false,
            ..card
        };
        assert!(!OpenAiImageAdapter::build_prompt(&upright).contains("reversed"));
    }
}
