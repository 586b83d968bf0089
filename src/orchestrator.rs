//! Two-stage pipeline: refine each product view, then compose the final shot.

use crate::ai::payload::{encode_asset, inline_from_base64};
use crate::ai::{
    FallbackClient, GeminiHttpClient, GenerateContentRequest, GenerationService, Part,
};
use crate::error::EmptyResponseKind;
use crate::models::{
    non_blank, Config, GenerationInput, GenerationResult, ImageAsset, ModelChain, ModelsUsed,
    ProductView,
};
use crate::prompts::{build_generation_prompt, build_refinement_prompt, CompositionPromptOptions};
use crate::{Error, Result};
use std::collections::BTreeMap;
use tracing::{info, warn};

/// The provider may return more; only this many are surfaced.
const MAX_GENERATED_IMAGES: usize = 2;

/// Runs the refinement and composition stages for one request at a time.
///
/// Holds only read-only configuration, so a single instance can serve
/// concurrent runs.
pub struct Orchestrator {
    provider: Box<dyn GenerationService>,
    refinement: ModelChain,
    composition: ModelChain,
    default_api_key: Option<String>,
    lighting_guidance: Option<String>,
}

/// Input that passed validation, borrowed from the caller.
struct ValidatedInput<'a> {
    product_type: &'a str,
    /// In [`ProductView::ALL`] order.
    views: [&'a ImageAsset; 4],
    model_reference: &'a ImageAsset,
    custom_scene: Option<&'a ImageAsset>,
    scene_prompt: Option<&'a str>,
    pose_notes: Option<&'a str>,
    api_key: &'a str,
}

struct RefinedView {
    data: String,
    model_used: String,
}

impl Orchestrator {
    /// Build an orchestrator talking to the configured provider host.
    pub fn new(config: &Config) -> Self {
        let http = GeminiHttpClient::new(config.api_host.clone(), config.request_timeout);
        Self::with_service(Box::new(FallbackClient::new(http)), config)
    }

    /// Build an orchestrator around any provider implementation.
    ///
    /// This is primarily useful for tests that need to inject mocks.
    pub fn with_service(provider: Box<dyn GenerationService>, config: &Config) -> Self {
        Self {
            provider,
            refinement: config.refinement.clone(),
            composition: config.composition.clone(),
            default_api_key: config.default_api_key.clone(),
            lighting_guidance: config.lighting_guidance.clone(),
        }
    }

    pub async fn run(&self, input: &GenerationInput) -> Result<GenerationResult> {
        let validated = self.validate(input)?;
        info!(
            "Starting generation for {} (custom scene: {})",
            validated.product_type,
            validated.custom_scene.is_some()
        );

        let refined = self.refine_all(&validated).await?;
        info!("All product views refined");

        let mut generated = self
            .compose(&validated, &refined)
            .await
            .map_err(|e| Error::Composition {
                source: Box::new(e),
            })?;
        if generated.images.len() > MAX_GENERATED_IMAGES {
            info!(
                "Provider returned {} images, keeping the first {}",
                generated.images.len(),
                MAX_GENERATED_IMAGES
            );
            generated.images.truncate(MAX_GENERATED_IMAGES);
        }
        info!(
            "Composition produced {} image(s) via {}",
            generated.images.len(),
            generated.model_used
        );

        let mut refined_images = BTreeMap::new();
        let mut refinement_models = BTreeMap::new();
        for (view, refined) in ProductView::ALL.into_iter().zip(refined) {
            refined_images.insert(view, refined.data);
            refinement_models.insert(view, refined.model_used);
        }

        Ok(GenerationResult {
            refined_images,
            generated_images: generated.images,
            models_used: ModelsUsed {
                refinement: refinement_models,
                composition: generated.model_used,
            },
        })
    }

    /// Checks every required input, reporting all missing fields at once.
    fn validate<'a>(&'a self, input: &'a GenerationInput) -> Result<ValidatedInput<'a>> {
        let product_type = non_blank(Some(input.product_type.as_str()));
        let views = ProductView::ALL.map(move |view| {
            input
                .product_views
                .get(&view)
                .filter(|asset| !asset.is_empty())
        });
        let model_reference = input
            .model_reference
            .as_ref()
            .filter(|asset| !asset.is_empty());
        let api_key =
            non_blank(input.api_key.as_deref()).or(non_blank(self.default_api_key.as_deref()));

        let mut missing = Vec::new();
        if product_type.is_none() {
            missing.push("productType".to_string());
        }
        for (view, asset) in ProductView::ALL.iter().zip(&views) {
            if asset.is_none() {
                missing.push(view.field_name().to_string());
            }
        }
        if model_reference.is_none() {
            missing.push("modelReference".to_string());
        }
        if api_key.is_none() {
            missing.push("apiKey".to_string());
        }

        let custom_scene = match input.custom_scene.as_ref() {
            Some(scene) if scene.is_empty() => {
                warn!("Ignoring empty custom scene upload");
                None
            }
            other => other,
        };

        match (product_type, views, model_reference, api_key) {
            (
                Some(product_type),
                [Some(front), Some(back), Some(left), Some(right)],
                Some(model_reference),
                Some(api_key),
            ) => Ok(ValidatedInput {
                product_type,
                views: [front, back, left, right],
                model_reference,
                custom_scene,
                scene_prompt: non_blank(input.scene_prompt.as_deref()),
                pose_notes: non_blank(input.pose_notes.as_deref()),
                api_key,
            }),
            _ => {
                warn!("Rejecting request, missing: {}", missing.join(", "));
                Err(Error::Validation { fields: missing })
            }
        }
    }

    /// Refines all four views concurrently.
    ///
    /// Every call is awaited before returning; when several fail, the error of
    /// the earliest view in [`ProductView::ALL`] order is reported.
    async fn refine_all(&self, input: &ValidatedInput<'_>) -> Result<[RefinedView; 4]> {
        let prompt = build_refinement_prompt(input.product_type);
        let [front, back, left, right] = input.views;

        let (front, back, left, right) = tokio::join!(
            self.refine_view(ProductView::Front, front, &prompt, input.api_key),
            self.refine_view(ProductView::Back, back, &prompt, input.api_key),
            self.refine_view(ProductView::Left, left, &prompt, input.api_key),
            self.refine_view(ProductView::Right, right, &prompt, input.api_key),
        );

        Ok([front?, back?, left?, right?])
    }

    async fn refine_view(
        &self,
        view: ProductView,
        asset: &ImageAsset,
        prompt: &str,
        api_key: &str,
    ) -> Result<RefinedView> {
        info!("[{}] Refining ({} bytes)", view, asset.bytes.len());

        let request = GenerateContentRequest::image_request(vec![
            Part::text(prompt),
            encode_asset(asset).into(),
        ]);

        let generated = self
            .provider
            .generate(&self.refinement, api_key, &request)
            .await
            .map_err(|e| Error::Refinement {
                view,
                source: Box::new(e),
            })?;

        let model_used = generated.model_used;
        let data = generated.images.into_iter().next().ok_or_else(|| Error::Refinement {
            view,
            source: Box::new(Error::EmptyResponse {
                model: model_used.clone(),
                kind: EmptyResponseKind::NoImageData,
            }),
        })?;

        info!("[{}] Refined via {}", view, model_used);
        Ok(RefinedView { data, model_used })
    }

    /// Parts go: instruction, refined front, pose reference, refined back,
    /// left and right, then the custom scene when present.
    async fn compose(
        &self,
        input: &ValidatedInput<'_>,
        refined: &[RefinedView; 4],
    ) -> Result<crate::ai::GeneratedImages> {
        let prompt = build_generation_prompt(&CompositionPromptOptions {
            product_type: input.product_type,
            scene_prompt: input.scene_prompt,
            custom_scene: input.custom_scene.is_some(),
            guidance: self.lighting_guidance.as_deref(),
            pose_notes: input.pose_notes,
        });

        let refined_part = |index: usize| -> Part {
            inline_from_base64(&input.views[index].mime_type, &refined[index].data).into()
        };

        let mut parts = vec![
            Part::text(prompt),
            refined_part(0),
            encode_asset(input.model_reference).into(),
            refined_part(1),
            refined_part(2),
            refined_part(3),
        ];
        if let Some(scene) = input.custom_scene {
            parts.push(encode_asset(scene).into());
        }

        info!("Composing with {} parts", parts.len());
        let request = GenerateContentRequest::image_request(parts);
        self.provider
            .generate(&self.composition, input.api_key, &request)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::mock::MockReply;
    use crate::ai::MockGenerationClient;
    use base64::Engine as _;

    fn asset(tag: u8) -> ImageAsset {
        ImageAsset::new("image/jpeg", vec![0xFF, 0xD8, 0xFF, tag])
    }

    fn b64(asset: &ImageAsset) -> String {
        base64::engine::general_purpose::STANDARD.encode(&asset.bytes)
    }

    fn complete_input() -> GenerationInput {
        GenerationInput::new("necklace")
            .with_view(ProductView::Front, asset(1))
            .with_view(ProductView::Back, asset(2))
            .with_view(ProductView::Left, asset(3))
            .with_view(ProductView::Right, asset(4))
            .with_model_reference(ImageAsset::new("", vec![9, 9, 9]))
    }

    fn test_config() -> Config {
        Config {
            default_api_key: Some("default-key".to_string()),
            refinement: ModelChain::new("refine-model", vec!["refine-backup".to_string()]),
            composition: ModelChain::new("compose-model", vec!["compose-backup".to_string()]),
            ..Config::default()
        }
    }

    fn build(mock: &MockGenerationClient) -> Orchestrator {
        Orchestrator::with_service(Box::new(mock.clone()), &test_config())
    }

    fn inline_data(part: &Part) -> &str {
        &part.as_inline_data().expect("inline part").data
    }

    #[tokio::test]
    async fn test_run_refines_four_views_then_composes() {
        let mock = MockGenerationClient::new();
        let orchestrator = build(&mock);
        let input = complete_input();

        let result = orchestrator.run(&input).await.unwrap();

        assert_eq!(mock.get_call_count(), 5);
        let calls = mock.calls();

        for call in &calls[..4] {
            assert_eq!(call.chain.primary, "refine-model");
            assert_eq!(call.api_key, "default-key");
            let parts = call.request.parts();
            assert_eq!(parts.len(), 2);
            assert!(parts[0].as_text().unwrap().contains("necklace"));
            assert!(parts[1].as_inline_data().is_some());
        }

        // Refined data for each view is whatever its own refinement call returned.
        let refined_for = |view: ProductView| -> String {
            let source = b64(&input.product_views[&view]);
            let index = calls[..4]
                .iter()
                .position(|c| inline_data(&c.request.parts()[1]) == source)
                .unwrap();
            format!("image-{}", index + 1)
        };

        let composition = &calls[4];
        assert_eq!(composition.chain.primary, "compose-model");
        let parts = composition.request.parts();
        assert_eq!(parts.len(), 6);
        assert!(parts[0].as_text().unwrap().contains("wearing the provided necklace"));
        assert_eq!(inline_data(&parts[1]), refined_for(ProductView::Front));
        assert_eq!(
            inline_data(&parts[2]),
            b64(input.model_reference.as_ref().unwrap())
        );
        assert_eq!(parts[2].as_inline_data().unwrap().mime_type, "image/png");
        assert_eq!(inline_data(&parts[3]), refined_for(ProductView::Back));
        assert_eq!(inline_data(&parts[4]), refined_for(ProductView::Left));
        assert_eq!(inline_data(&parts[5]), refined_for(ProductView::Right));
        assert_eq!(parts[1].as_inline_data().unwrap().mime_type, "image/jpeg");

        assert_eq!(result.refined_images.len(), 4);
        assert_eq!(
            result.refined_images[&ProductView::Front],
            refined_for(ProductView::Front)
        );
        assert_eq!(result.generated_images, vec!["image-5"]);
        assert_eq!(result.models_used.composition, "compose-model");
        assert!(result
            .models_used
            .refinement
            .values()
            .all(|m| m == "refine-model"));
    }

    #[tokio::test]
    async fn test_missing_back_view_fails_before_any_call() {
        let mock = MockGenerationClient::new();
        let orchestrator = build(&mock);
        let mut input = complete_input();
        input.product_views.remove(&ProductView::Back);

        let err = orchestrator.run(&input).await.unwrap_err();

        match err {
            Error::Validation { fields } => assert_eq!(fields, vec!["productBack"]),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_validation_lists_every_missing_field() {
        let mock = MockGenerationClient::new();
        let config = Config {
            default_api_key: None,
            ..test_config()
        };
        let orchestrator = Orchestrator::with_service(Box::new(mock.clone()), &config);
        let input = GenerationInput::new("   ")
            .with_view(ProductView::Left, ImageAsset::new("image/png", vec![]));

        let err = orchestrator.run(&input).await.unwrap_err();

        match err {
            Error::Validation { fields } => assert_eq!(
                fields,
                vec![
                    "productType",
                    "productFront",
                    "productBack",
                    "productLeft",
                    "productRight",
                    "modelReference",
                    "apiKey",
                ]
            ),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(mock.get_call_count(), 0);
    }

    #[tokio::test]
    async fn test_request_api_key_overrides_default() {
        let mock = MockGenerationClient::new();
        let orchestrator = build(&mock);

        orchestrator
            .run(&complete_input().with_api_key("caller-key"))
            .await
            .unwrap();

        assert!(mock.calls().iter().all(|c| c.api_key == "caller-key"));
    }

    #[tokio::test]
    async fn test_custom_scene_is_appended_last() {
        let mock = MockGenerationClient::new();
        let orchestrator = build(&mock);
        let scene = ImageAsset::new("image/webp", vec![7, 7]);
        let input = complete_input()
            .with_custom_scene(scene.clone())
            .with_scene_prompt("  marble terrace ")
            .with_pose_notes("hand on collarbone");

        orchestrator.run(&input).await.unwrap();

        let calls = mock.calls();
        let parts = calls[4].request.parts();
        assert_eq!(parts.len(), 7);
        assert_eq!(inline_data(&parts[6]), b64(&scene));
        assert_eq!(parts[6].as_inline_data().unwrap().mime_type, "image/webp");

        let prompt = parts[0].as_text().unwrap();
        assert!(prompt.contains("styling notes: marble terrace."));
        assert!(prompt.contains("uploaded background scene"));
        assert!(prompt.contains("pose highlights: hand on collarbone."));
        assert!(!prompt.contains("editorial backdrop"));
    }

    #[tokio::test]
    async fn test_generated_images_are_capped_at_two() {
        let mock = MockGenerationClient::new()
            .with_images(&["r1"])
            .with_images(&["r2"])
            .with_images(&["r3"])
            .with_images(&["r4"])
            .with_images(&["g1", "g2", "g3"]);
        let orchestrator = build(&mock);

        let result = orchestrator.run(&complete_input()).await.unwrap();

        assert_eq!(result.generated_images, vec!["g1", "g2"]);
    }

    #[tokio::test]
    async fn test_refinement_failure_names_view_and_skips_composition() {
        let mock = MockGenerationClient::new()
            .with_images(&["r1"])
            .with_reply(MockReply::ProviderError {
                status: 400,
                body: "unsupported image".to_string(),
            })
            .with_reply(MockReply::ChannelUnavailable)
            .with_images(&["r4"]);
        let orchestrator = build(&mock);

        let err = orchestrator.run(&complete_input()).await.unwrap_err();

        match &err {
            Error::Refinement { view, source } => {
                assert_eq!(*view, ProductView::Back);
                assert!(matches!(**source, Error::ProviderRequest { status: 400, .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.status_code(), 400);
        assert_eq!(mock.get_call_count(), 4);
    }

    #[tokio::test]
    async fn test_empty_refinement_is_reported() {
        let mock = MockGenerationClient::new().with_reply(MockReply::Images(vec![]));
        let orchestrator = build(&mock);

        let err = orchestrator.run(&complete_input()).await.unwrap_err();

        match err {
            Error::Refinement { view, source } => {
                assert_eq!(view, ProductView::Front);
                assert!(matches!(*source, Error::EmptyResponse { .. }));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_composition_failure_after_refinement() {
        let mock = MockGenerationClient::new()
            .with_images(&["r1"])
            .with_images(&["r2"])
            .with_images(&["r3"])
            .with_images(&["r4"])
            .with_reply(MockReply::ChannelUnavailable);
        let orchestrator = build(&mock);

        let err = orchestrator.run(&complete_input()).await.unwrap_err();

        assert!(matches!(err, Error::Composition { .. }));
        assert!(err.is_channel_unavailable());
        assert_eq!(err.status_code(), 503);
        assert_eq!(mock.get_call_count(), 5);
    }

    #[tokio::test]
    async fn test_substituted_models_are_reported() {
        let mock = MockGenerationClient::new()
            .with_reply(MockReply::Substituted {
                model: "refine-backup".to_string(),
                images: vec!["r1".to_string()],
            })
            .with_images(&["r2"])
            .with_images(&["r3"])
            .with_images(&["r4"])
            .with_reply(MockReply::Substituted {
                model: "compose-backup".to_string(),
                images: vec!["g1".to_string()],
            });
        let orchestrator = build(&mock);

        let result = orchestrator.run(&complete_input()).await.unwrap();

        assert_eq!(result.models_used.composition, "compose-backup");
        assert_eq!(
            result.models_used.refinement[&ProductView::Front],
            "refine-backup"
        );
        assert_eq!(
            result.models_used.refinement[&ProductView::Back],
            "refine-model"
        );
    }
}
