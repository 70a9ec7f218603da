use serde_json::json;

use super::gemini::{GeminiProvider, GenerateContentResponse};
use crate::constants::{ILLUSTRATION_PROMPT_PREFIX, ILLUSTRATION_PROMPT_SUFFIX};
use crate::utils::{log_info, log_warn};

/// Ask the image model for an illustration of `subject`.
///
/// Returns the first inline image as a `data:` URL. Failures are logged and
/// reported as `None`; an illustration is decoration, never a hard error.
pub async fn generate_illustration(provider: &GeminiProvider, subject: &str) -> Option<String> {
    let subject = subject.trim();
    if subject.is_empty() {
        return None;
    }

    let body = json!({
        "contents": {
            "parts": [{ "text": illustration_prompt(subject) }]
        }
    });

    match provider.generate_content(provider.image_model(), &body).await {
        Ok(response) => {
            let image = first_inline_image(&response);
            if image.is_none() {
                log_warn("🖼", format!("No image returned for '{}'", subject));
            } else {
                log_info("🖼", format!("Generated illustration for '{}'", subject));
            }
            image
        }
        Err(e) => {
            log_warn("🖼", format!("Failed to generate image ({}): {}", e.kind(), e));
            None
        }
    }
}

pub(crate) fn illustration_prompt(subject: &str) -> String {
    format!(
        "{} {}, {}",
        ILLUSTRATION_PROMPT_PREFIX, subject, ILLUSTRATION_PROMPT_SUFFIX
    )
}

fn first_inline_image(response: &GenerateContentResponse) -> Option<String> {
    response
        .first_parts()
        .iter()
        .find_map(|part| part.inline_data.as_ref())
        .map(|inline| {
            let mime = inline.mime_type.as_deref().unwrap_or("image/png");
            format!("data:{};base64,{}", mime, inline.data)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_prompt_wording() {
        assert_eq!(
            illustration_prompt("hematopoietic stem cells"),
            "High quality medical scientific illustration of hematopoietic stem cells, \
             microscopic view, blue and teal lighting, professional aesthetic, 4k."
        );
    }

    #[test]
    fn test_first_inline_image_skips_text_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "Here is your image" },
                    { "inlineData": { "mimeType": "image/png", "data": "iVBORw0KGgo=" } },
                    { "inlineData": { "mimeType": "image/jpeg", "data": "second" } }
                ]}
            }]
        }))
        .unwrap();

        assert_eq!(
            first_inline_image(&response).as_deref(),
            Some("data:image/png;base64,iVBORw0KGgo=")
        );
    }

    #[test]
    fn test_missing_mime_type_defaults_to_png() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "inlineData": { "data": "AAAA" } }] } }]
        }))
        .unwrap();

        assert_eq!(
            first_inline_image(&response).as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn test_text_only_response_has_no_image() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "sorry" }] } }]
        }))
        .unwrap();

        assert_eq!(first_inline_image(&response), None);
    }
}
