use anyhow::{Context, Result};
use aura_align::ai::mime::{detect_image_mime, extension_for_mime};
use aura_align::models::{
    Config, GenerationInput, GenerationResult, ImageAsset, ModelsUsed, ProductView,
};
use aura_align::{ErrorResponse, Orchestrator};
use base64::Engine as _;
use chrono::Local;
use clap::Parser;
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

#[derive(Debug, Parser)]
#[command(name = "aura-align")]
#[command(about = "Refine jewelry product photos and compose model shots")]
struct CliArgs {
    /// Product category, e.g. "necklace" or "ring".
    #[arg(long, default_value = "")]
    product_type: String,

    #[arg(long, value_name = "PATH")]
    front: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    back: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    left: Option<PathBuf>,

    #[arg(long, value_name = "PATH")]
    right: Option<PathBuf>,

    /// Pose and expression reference for the model.
    #[arg(long, value_name = "PATH")]
    model_reference: Option<PathBuf>,

    /// Optional background scene to place the model in.
    #[arg(long, value_name = "PATH")]
    scene: Option<PathBuf>,

    #[arg(long)]
    scene_prompt: Option<String>,

    #[arg(long)]
    pose_notes: Option<String>,

    /// Overrides NANO_BANANA_API_KEY for this run.
    #[arg(long)]
    api_key: Option<String>,

    #[arg(long, default_value = "output")]
    output_dir: PathBuf,
}

/// Summary written next to the images of a run.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RunSummary {
    product_type: String,
    refined_files: Vec<String>,
    generated_files: Vec<String>,
    models_used: ModelsUsed,
}

fn load_asset(path: &Path) -> Result<ImageAsset> {
    let bytes = fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    let mime_type = detect_image_mime(&bytes);
    Ok(ImageAsset::new(mime_type, bytes))
}

fn load_optional(path: Option<&PathBuf>) -> Result<Option<ImageAsset>> {
    path.map(|p| load_asset(p)).transpose()
}

fn build_input(args: &CliArgs) -> Result<GenerationInput> {
    let mut input = GenerationInput::new(args.product_type.clone());

    let views = [
        (ProductView::Front, args.front.as_ref()),
        (ProductView::Back, args.back.as_ref()),
        (ProductView::Left, args.left.as_ref()),
        (ProductView::Right, args.right.as_ref()),
    ];
    for (view, path) in views {
        if let Some(asset) = load_optional(path)? {
            input = input.with_view(view, asset);
        }
    }

    input.model_reference = load_optional(args.model_reference.as_ref())?;
    input.custom_scene = load_optional(args.scene.as_ref())?;
    input.scene_prompt = args.scene_prompt.clone();
    input.pose_notes = args.pose_notes.clone();
    input.api_key = args.api_key.clone();
    Ok(input)
}

fn write_image(dir: &Path, stem: &str, data: &str) -> Result<String> {
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(data)
        .with_context(|| format!("Provider returned invalid base64 for {}", stem))?;
    let filename = format!("{}.{}", stem, extension_for_mime(detect_image_mime(&bytes)));
    fs::write(dir.join(&filename), &bytes)?;
    Ok(filename)
}

/// Writes decoded images and a `result.json` summary into a fresh run directory.
fn write_outputs(
    output_dir: &Path,
    product_type: &str,
    result: &GenerationResult,
) -> Result<PathBuf> {
    let date = Local::now().format("%Y-%m-%d").to_string();
    let run_dir = output_dir.join(format!("{}_{}", date, Uuid::new_v4()));
    fs::create_dir_all(&run_dir)?;

    let mut refined_files = Vec::new();
    for (view, data) in &result.refined_images {
        refined_files.push(write_image(&run_dir, view.field_name(), data)?);
    }

    let mut generated_files = Vec::new();
    for (index, data) in result.generated_images.iter().enumerate() {
        generated_files.push(write_image(
            &run_dir,
            &format!("generated_{}", index + 1),
            data,
        )?);
    }

    let summary = RunSummary {
        product_type: product_type.trim().to_string(),
        refined_files,
        generated_files,
        models_used: result.models_used.clone(),
    };
    fs::write(
        run_dir.join("result.json"),
        serde_json::to_string_pretty(&summary)?,
    )?;

    Ok(run_dir)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "aura_align=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting aura-align");

    let args = CliArgs::parse();
    let config = Config::from_env()?;
    let input = build_input(&args)?;
    let orchestrator = Orchestrator::new(&config);

    match orchestrator.run(&input).await {
        Ok(result) => {
            let run_dir = write_outputs(&args.output_dir, &args.product_type, &result)?;
            info!(
                "Generation completed: {} generated image(s) saved to {}",
                result.generated_images.len(),
                run_dir.display()
            );
            Ok(())
        }
        Err(e) => {
            error!("Generation failed: {}", e);
            let response = ErrorResponse::from(&e);
            eprintln!("{}", serde_json::to_string(&response)?);
            std::process::exit(1);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    const PNG: [u8; 8] = [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A];
    const JPEG: [u8; 4] = [0xFF, 0xD8, 0xFF, 0xE0];

    fn encode(bytes: &[u8]) -> String {
        base64::engine::general_purpose::STANDARD.encode(bytes)
    }

    #[test]
    fn test_parse_args() {
        let args = CliArgs::try_parse_from([
            "aura-align",
            "--product-type",
            "ring",
            "--front",
            "f.png",
            "--scene-prompt",
            "beach",
        ])
        .unwrap();
        assert_eq!(args.product_type, "ring");
        assert_eq!(args.front, Some(PathBuf::from("f.png")));
        assert_eq!(args.back, None);
        assert_eq!(args.output_dir, PathBuf::from("output"));
    }

    #[test]
    fn test_load_asset_sniffs_mime_type() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("front.bin");
        fs::write(&path, JPEG).unwrap();

        let asset = load_asset(&path).unwrap();
        assert_eq!(asset.mime_type, "image/jpeg");
        assert_eq!(asset.bytes, JPEG);
    }

    #[test]
    fn test_load_asset_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        assert!(load_asset(&dir.path().join("nope.png")).is_err());
    }

    #[test]
    fn test_build_input_leaves_missing_uploads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let front = dir.path().join("front.png");
        fs::write(&front, PNG).unwrap();

        let args = CliArgs::try_parse_from([
            "aura-align",
            "--product-type",
            "necklace",
            "--front",
            front.to_str().unwrap(),
        ])
        .unwrap();
        let input = build_input(&args).unwrap();

        assert_eq!(input.product_views.len(), 1);
        assert_eq!(input.product_views[&ProductView::Front].mime_type, "image/png");
        assert!(input.model_reference.is_none());
        assert!(input.custom_scene.is_none());
    }

    #[test]
    fn test_write_outputs() {
        let dir = tempfile::tempdir().unwrap();

        let mut refined_images = BTreeMap::new();
        for view in ProductView::ALL {
            refined_images.insert(view, encode(&PNG));
        }
        let result = GenerationResult {
            refined_images,
            generated_images: vec![encode(&JPEG), encode(&PNG)],
            models_used: ModelsUsed {
                refinement: BTreeMap::new(),
                composition: "nano-banana-fast".to_string(),
            },
        };

        let run_dir = write_outputs(dir.path(), " necklace ", &result).unwrap();

        assert!(run_dir.join("productFront.png").exists());
        assert!(run_dir.join("productRight.png").exists());
        assert!(run_dir.join("generated_1.jpg").exists());
        assert!(run_dir.join("generated_2.png").exists());

        let summary: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(run_dir.join("result.json")).unwrap())
                .unwrap();
        assert_eq!(summary["productType"], "necklace");
        assert_eq!(summary["modelsUsed"]["composition"], "nano-banana-fast");
        assert_eq!(summary["generatedFiles"][0], "generated_1.jpg");
    }

    #[test]
    fn test_write_outputs_rejects_invalid_base64() {
        let dir = tempfile::tempdir().unwrap();
        let result = GenerationResult {
            refined_images: BTreeMap::new(),
            generated_images: vec!["!!!not-base64!!!".to_string()],
            models_used: ModelsUsed::default(),
        };
        assert!(write_outputs(dir.path(), "ring", &result).is_err());
    }
}
