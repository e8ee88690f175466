use std::env;

use texgen::{
    Config, GenerationError, GenerationPipeline, GenerationRequest, ImageSize,
    PngFileMaterializer, TextureMaterializer,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file first
    match dotenv::dotenv() {
        Ok(_) => log::info!("✅ .env file loaded successfully"),
        Err(_) => log::warn!("⚠️  No .env file found, using system environment variables"),
    }

    texgen::logger::init_with_config(
        texgen::logger::LoggerConfig::development()
            .with_level(texgen::logger::LogLevel::Debug),
    )?;

    log::info!("🔍 Checking provider environment...");

    match env::var("OPENAI_API_KEY") {
        Ok(api_key) if !api_key.trim().is_empty() => {
            log::info!("✅ API key found in environment");
            log::debug!(
                "API key starts with: {}...",
                &api_key[..5.min(api_key.len())]
            );
        }
        _ => {
            log::error!("❌ No OPENAI_API_KEY set, generation requests will be rejected");
        }
    }

    if let Ok(endpoint) = env::var("OPENAI_BASE_URL") {
        log::info!("OPENAI_BASE_URL: {}", endpoint);
    } else {
        log::info!("No endpoint override set, using the default provider endpoint");
    }

    let config = Config::from_env();

    log::info!("🖼️  Available image generation models:");
    for (id, name, provider) in texgen::supported_models() {
        log::info!("  {} - {} ({})", id, name, provider);
    }

    log::info!("🔄 Creating generation pipeline...");
    let pipeline = match GenerationPipeline::new(config) {
        Ok(pipeline) => {
            log::info!("✅ Generation pipeline initialized successfully");
            pipeline
        }
        Err(e) => {
            log::error!("❌ Failed to initialize pipeline: {}", e);
            return Err(e.into());
        }
    };

    log::info!("🎨 Testing texture generation...");

    let request = GenerationRequest::new(
        "A seamless tileable texture of realistic green grass, top-down view",
    )
    .with_size(ImageSize::Square512);

    let handle = match pipeline.start(request) {
        Ok(handle) => handle,
        Err(e) => {
            log::error!("❌ Generation rejected before submission: {}", e);
            return Err(e.into());
        }
    };

    log::info!("🧪 Generation {} started", handle.id());

    // Follow the run's progress while waiting on the terminal result.
    let mut stages = handle.stage_updates();
    tokio::spawn(async move {
        while stages.changed().await.is_ok() {
            let stage = *stages.borrow();
            log::info!("📶 Stage: {}", stage.as_str());
            if stage.is_terminal() {
                break;
            }
        }
    });

    match handle.result().await {
        Ok(output) => {
            log::info!("✅ Texture generation successful!");
            log::info!("🤖 Model used: {}", output.model);
            for prompt in &output.revised_prompts {
                log::info!("📝 Provider revised the prompt: {}", prompt);
            }

            let materializer = PngFileMaterializer::new("generated_textures");
            for (index, image) in output.images.iter().enumerate() {
                log::info!(
                    "📏 Image {}: {}x{} ({} channels)",
                    index,
                    image.width(),
                    image.height(),
                    image.channels()
                );

                let name = format!(
                    "generated_texture_{}_{}",
                    chrono::Utc::now().timestamp(),
                    index
                );
                match materializer.materialize(&name, image).await {
                    Ok(result) => {
                        log::info!("💾 Texture saved to: {}", result.path.display());
                    }
                    Err(e) => {
                        log::error!("❌ Failed to save texture: {}", e);
                    }
                }
            }
        }
        Err(e) => {
            // Each failure kind gets its own message so a user can tell a
            // bad key from a dead network from a rejected prompt.
            match &e {
                GenerationError::Provider { code, message } => {
                    log::error!("❌ Provider rejected the request ({}): {}", code, message);
                    log::warn!("💡 Check your API key, account credits, and content policy");
                }
                GenerationError::Timeout => {
                    log::error!("❌ The provider did not answer in time");
                    log::warn!("💡 Try again, or raise the request timeout");
                }
                GenerationError::Network(details) => {
                    log::error!("❌ Network failure while contacting the provider: {}", details);
                }
                GenerationError::HttpStatus(status) => {
                    log::error!("❌ Provider answered with unexpected HTTP status {}", status);
                }
                GenerationError::MalformedResponse(details) => {
                    log::error!("❌ Could not understand the provider response: {}", details);
                }
                GenerationError::Decode(details) => {
                    log::error!("❌ Returned image could not be decoded: {}", details);
                }
                GenerationError::Cancelled => {
                    log::warn!("⚠️  Generation was cancelled before completion");
                }
                other => {
                    log::error!("❌ Texture generation failed: {}", other);
                }
            }
            return Err(e.into());
        }
    }

    log::info!("🎉 Demo run completed!");
    log::info!("💡 Check the generated_textures directory for the result");

    Ok(())
}
