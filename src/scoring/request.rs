//! Outbound request payload and the instructional prompt built from it.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde::Serialize;

use crate::db::{Entry, ScoreMetric};

use super::hasher::NormalizedPhoto;

pub const UNSPECIFIED: &str = "unspecified";

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationRequest {
    pub entry_id: String,
    /// Display label of the design tag, or `"unspecified"`.
    pub design_tag: String,
    pub products: Vec<String>,
    pub user_goal: Option<String>,
    pub photo_jpeg: Vec<u8>,
}

/// JSON body posted to the scoring endpoint.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RequestBody {
    pub model: String,
    pub temperature: f64,
    pub input: String,
}

pub fn build_request(
    entry: &Entry,
    photo: &NormalizedPhoto,
    user_goal: Option<&str>,
) -> EvaluationRequest {
    let design_tag = entry
        .design()
        .map(|category| category.display_name().to_owned())
        .unwrap_or_else(|| UNSPECIFIED.to_owned());

    let products = entry
        .used_products
        .iter()
        .filter_map(|product| product.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_owned)
        .collect();

    EvaluationRequest {
        entry_id: entry.id.clone(),
        design_tag,
        products,
        user_goal: user_goal
            .map(str::trim)
            .filter(|goal| !goal.is_empty())
            .map(str::to_owned),
        photo_jpeg: photo.jpeg.clone(),
    }
}

pub fn build_prompt(request: &EvaluationRequest) -> String {
    let products = if request.products.is_empty() {
        "none recorded".to_owned()
    } else {
        request.products.join(", ")
    };
    let goal = request.user_goal.as_deref().unwrap_or(UNSPECIFIED);
    let labels = ScoreMetric::ORDERED
        .iter()
        .map(|metric| format!("\"{}: ...\"", metric.label()))
        .collect::<Vec<_>>()
        .join(", ");

    format!(
        "You are a professional nail technician reviewing a self-applied gel manicure.\n\
         Score the nails in the photo and reply with JSON only, no prose, using exactly this shape:\n\
         {{\"total_score\": int, \"scores\": {{\"finish_quality\": int, \"edge_and_cuticle\": int, \
         \"thickness_balance\": int, \"design_balance\": int, \"durability_prediction\": int}}, \
         \"highlights\": [string], \"improvements\": [string], \"next_steps\": [string], \
         \"caution\": string or null, \"confidence\": float, \"assumptions\": [string]}}\n\
         Rules: every score is an integer from 0 to 100; confidence is between 0 and 1; \
         highlights has exactly five items in this order: {labels}; \
         list anything you could not see in assumptions.\n\
         Design: {design}\n\
         Products used (in order): {products}\n\
         User goal: {goal}\n\
         Photo (JPEG, base64): data:image/jpeg;base64,{photo}",
        design = request.design_tag,
        photo = STANDARD.encode(&request.photo_jpeg),
    )
}

pub fn build_body(request: &EvaluationRequest, model: &str, temperature: f64) -> RequestBody {
    RequestBody {
        model: model.to_owned(),
        temperature,
        input: build_prompt(request),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::UsedProduct;

    fn photo() -> NormalizedPhoto {
        NormalizedPhoto {
            jpeg: vec![0xFF, 0xD8, 0xFF],
            width: 1,
            height: 1,
            hash: "h".into(),
        }
    }

    #[test]
    fn missing_metadata_degrades_to_placeholders() {
        let entry = Entry::new("bare");
        let request = build_request(&entry, &photo(), Some("   "));
        assert_eq!(request.design_tag, UNSPECIFIED);
        assert!(request.products.is_empty());
        assert_eq!(request.user_goal, None);

        let prompt = build_prompt(&request);
        assert!(prompt.contains("Design: unspecified"));
        assert!(prompt.contains("Products used (in order): none recorded"));
        assert!(prompt.contains("User goal: unspecified"));
    }

    #[test]
    fn products_keep_order_and_skip_unnamed() {
        let mut entry = Entry::new("gradient");
        entry.design_category = Some("gradation".into());
        entry.used_products = vec![
            UsedProduct { product_id: "b".into(), name: Some("Top gel".into()), order_index: 0 },
            UsedProduct { product_id: "x".into(), name: None, order_index: 1 },
            UsedProduct { product_id: "a".into(), name: Some("Base gel".into()), order_index: 2 },
        ];

        let request = build_request(&entry, &photo(), Some("longer wear"));
        assert_eq!(request.design_tag, "gradation");
        assert_eq!(request.products, vec!["Top gel", "Base gel"]);

        let prompt = build_prompt(&request);
        assert!(prompt.contains("Top gel, Base gel"));
        assert!(prompt.contains("User goal: longer wear"));
        assert!(prompt.contains("data:image/jpeg;base64,/9j/"));
    }

    #[test]
    fn body_serializes_expected_fields() {
        let request = build_request(&Entry::new("x"), &photo(), None);
        let body = serde_json::to_value(build_body(&request, "model-a", 0.2)).expect("json");
        assert_eq!(body["model"], "model-a");
        assert!(body["input"].as_str().expect("input").contains("total_score"));
        assert_eq!(body["temperature"], serde_json::json!(0.2));

        let raw = serde_json::to_string(&build_body(&request, "m", 0.2)).expect("body");
        assert!(raw.contains("\"temperature\":0.2,"), "{raw}");
    }
}
