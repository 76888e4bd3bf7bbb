// ============================================================================
// GEMINI CLIENT: generateContent over REST with inline base64 images
// ============================================================================

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use reqwest::blocking::Client;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};

use super::{ImageModel, ModelError};
use crate::io::EncodedImage;
use crate::settings::AppSettings;

const SEGMENT_SUBJECTS_SYSTEM: &str = "You are a precise image segmentation model. Your task is to \
identify every main subject in the image and produce a single black-and-white mask. Every \
identified subject must be pure white and every other area must be black. Your output must be \
the mask image only.";

const SEGMENT_SUBJECTS_TASK: &str = "Identify every salient main subject in the image and produce \
one precise binary mask for them (white on a black background). All subjects must be completely \
white and everything else completely black. Output only the mask image.";

const SEGMENT_SELECTION_SYSTEM: &str = "You are a precise image segmentation model. Your task is \
to produce a black-and-white mask from the user's selection. The main subject inside the marked \
area must be pure white and every other area must be black. Your output must be the mask image \
only.";

const SEGMENT_SELECTION_TASK: &str = "Produce a precise binary mask (white on a black background) \
for the main object inside the drawn rectangle. The object must be completely white and \
everything else completely black. Do not include the rectangle in the output mask. Output only \
the mask image.";

const EDIT_SYSTEM: &str = "You are a precise AI photo editor. Your only job is to modify the \
background of the image as the user instructs.

Absolute rules:
1. Preserve the main subject exactly. Never change the subject's shape, size, proportions, \
colors, texture, shadows or lighting. Instead of recreating the subject, copy the original \
pixels of the masked area into the result unchanged; that area must match the original pixel \
for pixel.
2. Output format: the output resolution and size must always match the original image exactly.

Working rules:
1. Masks: when a mask is provided, its white area is the main subject to preserve and all edits \
apply only to its black area (the background). When no mask is provided, first identify the \
most prominent subject yourself, then apply the instruction only to the remaining background.
2. Instructions: for background removal, solid fills or gradients, keep every detail of the \
subject (hair, fine edges) and change only the background as specified. Additional background \
edits (such as adding a shadow) are applied only where they do not affect the subject's core \
appearance.

In short: you edit backgrounds and never touch the subject.";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    system_instruction: Content<'a>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum RequestPart<'a> {
    Text {
        text: &'a str,
    },
    #[serde(rename_all = "camelCase")]
    Inline {
        inline_data: InlineData,
    },
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_modalities: Vec<&'static str>,
}

#[derive(Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    inline_data: Option<InlineData>,
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

fn inline(image: &EncodedImage) -> RequestPart<'static> {
    RequestPart::Inline {
        inline_data: InlineData {
            mime_type: image.mime_type.clone(),
            data: BASE64.encode(&image.bytes),
        },
    }
}

/// Client for Google's Gemini image models.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    endpoint: String,
}

impl GeminiClient {
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        endpoint: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, ModelError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(ModelError::MissingApiKey);
        }
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model: model.into(),
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_settings(settings: &AppSettings) -> Result<Self, ModelError> {
        Self::new(
            settings.api_key.clone(),
            settings.model.clone(),
            settings.endpoint.clone(),
            Duration::from_secs(settings.request_timeout_secs),
        )
    }

    fn url(&self) -> String {
        format!("{}/models/{}:generateContent", self.endpoint, self.model)
    }

    fn generate(
        &self,
        system: &str,
        parts: Vec<RequestPart<'_>>,
        modalities: Vec<&'static str>,
    ) -> Result<Option<EncodedImage>, ModelError> {
        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![RequestPart::Text { text: system }],
            },
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                response_modalities: modalities,
            },
        };

        log::debug!("[AI] POST {}", self.url());
        let response = self
            .http
            .post(self.url())
            .header(CONTENT_TYPE, "application/json")
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .map_err(|e| ModelError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        if !status.is_success() {
            return Err(status_error(status.as_u16(), &body));
        }
        parse_image_response(&body)
    }
}

fn status_error(status: u16, body: &str) -> ModelError {
    let message = serde_json::from_str::<ErrorEnvelope>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| body.trim().chars().take(200).collect());
    ModelError::Status { status, message }
}

/// Pull the first inline image out of a `generateContent` response body.
fn parse_image_response(body: &str) -> Result<Option<EncodedImage>, ModelError> {
    let response: GenerateResponse =
        serde_json::from_str(body).map_err(|e| ModelError::MalformedResponse(e.to_string()))?;

    let Some(candidate) = response.candidates.into_iter().next() else {
        return Ok(None);
    };
    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let mut remarks = Vec::new();
    for part in parts {
        if let Some(inline) = part.inline_data {
            let bytes = BASE64
                .decode(inline.data.trim())
                .map_err(|e| ModelError::UndecodableImage(e.to_string()))?;
            return Ok(Some(EncodedImage::new(bytes, inline.mime_type)));
        }
        if let Some(text) = part.text {
            remarks.push(text);
        }
    }
    if !remarks.is_empty() {
        log::debug!("[AI] response had no image, model said: {}", remarks.join(" "));
    }
    Ok(None)
}

impl ImageModel for GeminiClient {
    fn name(&self) -> &str {
        &self.model
    }

    fn segment_subjects(&self, image: &EncodedImage) -> Result<Option<EncodedImage>, ModelError> {
        self.generate(
            SEGMENT_SUBJECTS_SYSTEM,
            vec![inline(image), RequestPart::Text { text: SEGMENT_SUBJECTS_TASK }],
            vec!["IMAGE"],
        )
    }

    fn segment_selection(
        &self,
        composite: &EncodedImage,
    ) -> Result<Option<EncodedImage>, ModelError> {
        self.generate(
            SEGMENT_SELECTION_SYSTEM,
            vec![inline(composite), RequestPart::Text { text: SEGMENT_SELECTION_TASK }],
            vec!["IMAGE"],
        )
    }

    fn edit_image(
        &self,
        image: &EncodedImage,
        instruction: &str,
        mask: Option<&EncodedImage>,
    ) -> Result<Option<EncodedImage>, ModelError> {
        if instruction.trim().is_empty() {
            return Err(ModelError::InvalidRequest(
                "an instruction is required".to_string(),
            ));
        }
        let mut parts = vec![inline(image)];
        if let Some(mask) = mask {
            parts.push(inline(mask));
        }
        parts.push(RequestPart::Text { text: instruction });
        self.generate(EDIT_SYSTEM, parts, vec!["IMAGE", "TEXT"])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_inline_image_is_returned() {
        let data = BASE64.encode([1u8, 2, 3]);
        let body = format!(
            r#"{{"candidates":[{{"content":{{"parts":[
                {{"text":"here you go"}},
                {{"inlineData":{{"mimeType":"image/png","data":"{}"}}}},
                {{"inlineData":{{"mimeType":"image/jpeg","data":"AAAA"}}}}
            ]}}}}]}}"#,
            data
        );
        let image = parse_image_response(&body).unwrap().unwrap();
        assert_eq!(image.bytes, vec![1, 2, 3]);
        assert_eq!(image.mime_type, "image/png");
    }

    #[test]
    fn text_only_or_empty_responses_are_absent() {
        let text_only = r#"{"candidates":[{"content":{"parts":[{"text":"sorry"}]}}]}"#;
        assert_eq!(parse_image_response(text_only).unwrap(), None);
        assert_eq!(parse_image_response(r#"{"candidates":[]}"#).unwrap(), None);
        assert_eq!(parse_image_response("{}").unwrap(), None);
        let no_content = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert_eq!(parse_image_response(no_content).unwrap(), None);
    }

    #[test]
    fn bad_payloads_are_errors() {
        assert!(matches!(
            parse_image_response("not json"),
            Err(ModelError::MalformedResponse(_))
        ));
        let bad_b64 =
            r#"{"candidates":[{"content":{"parts":[{"inlineData":{"mimeType":"image/png","data":"%%%"}}]}}]}"#;
        assert!(matches!(
            parse_image_response(bad_b64),
            Err(ModelError::UndecodableImage(_))
        ));
    }

    #[test]
    fn status_errors_prefer_api_message() {
        let e = status_error(400, r#"{"error":{"code":400,"message":"API key not valid."}}"#);
        assert_eq!(
            e,
            ModelError::Status {
                status: 400,
                message: "API key not valid.".into()
            }
        );
        let e = status_error(502, "Bad Gateway\n");
        assert_eq!(
            e,
            ModelError::Status {
                status: 502,
                message: "Bad Gateway".into()
            }
        );
    }

    #[test]
    fn request_serializes_in_rest_shape() {
        let image = EncodedImage::new(vec![0xFF], "image/png");
        let request = GenerateRequest {
            system_instruction: Content {
                parts: vec![RequestPart::Text { text: "sys" }],
            },
            contents: vec![Content {
                parts: vec![inline(&image), RequestPart::Text { text: "go" }],
            }],
            generation_config: GenerationConfig {
                response_modalities: vec!["IMAGE"],
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["systemInstruction"]["parts"][0]["text"], "sys");
        assert_eq!(
            json["contents"][0]["parts"][0]["inlineData"]["mimeType"],
            "image/png"
        );
        assert_eq!(json["contents"][0]["parts"][0]["inlineData"]["data"], "/w==");
        assert_eq!(json["generationConfig"]["responseModalities"][0], "IMAGE");
    }

    #[test]
    fn missing_key_is_rejected_up_front() {
        let r = GeminiClient::new(" ", "m", "http://localhost", Duration::from_secs(1));
        assert!(matches!(r, Err(ModelError::MissingApiKey)));
    }

    #[test]
    fn blank_instruction_is_invalid() {
        let client =
            GeminiClient::new("key", "m", "http://127.0.0.1:9/", Duration::from_secs(1)).unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:9/models/m:generateContent");
        let image = EncodedImage::new(vec![1], "image/png");
        assert!(matches!(
            client.edit_image(&image, "  ", None),
            Err(ModelError::InvalidRequest(_))
        ));
    }
}
