
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};
use std::path::Path;

use super::settings::{ENV_GEMINI_API_KEY, ENV_QDRANT_API_KEY};
use super::{Config, ConfigError, EmbeddingConfig, LlmConfig, VectorStoreConfig};
use crate::database::VectorBackend;
use crate::embeddings::ChunkingConfig;

#[inline]
pub fn run_interactive_config(config_dir: &Path) -> Result<()> {
    eprintln!("{}", style("🔧 RAG Assistant Configuration Setup").bold().cyan());
    eprintln!();

    let mut config = load_existing_config(config_dir)?;

    eprintln!("{}", style("Chat Model").bold().yellow());
    eprintln!("Any OpenAI-compatible chat completions endpoint.");
    eprintln!();
    configure_llm(&mut config.llm)?;

    eprintln!();
    eprintln!("{}", style("Embeddings").bold().yellow());
    configure_embedding(&mut config.embedding)?;

    eprintln!();
    eprintln!("{}", style("Vector Store").bold().yellow());
    configure_vector_store(&mut config.vector_store)?;

    eprintln!();
    eprintln!("{}", style("Chunking").bold().yellow());
    configure_chunking(&mut config.chunking)?;

    if config.vector_store.backend == VectorBackend::Qdrant {
        eprintln!();
        eprintln!("{}", style("Testing configuration...").yellow());

        if test_qdrant_connection(&config.vector_store) {
            eprintln!("{}", style("✓ Qdrant connection successful!").green());
        } else {
            eprintln!(
                "{}",
                style("⚠ Warning: Could not connect to Qdrant").yellow()
            );
            eprintln!("You can continue, but make sure Qdrant is reachable before ingesting.");
        }
    }

    eprintln!();
    eprintln!(
        "API keys are read from {} and {} and are never saved.",
        style(ENV_GEMINI_API_KEY).cyan(),
        style(ENV_QDRANT_API_KEY).cyan()
    );

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config(config: &Config) -> Result<()> {
    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Chat Model:").bold().yellow());
    eprintln!(
        "  Base URL: {}",
        style(config.llm.base_url.as_deref().unwrap_or("(not set)")).cyan()
    );
    eprintln!(
        "  Model: {}",
        style(config.llm.model.as_deref().unwrap_or("(not set)")).cyan()
    );
    eprintln!(
        "  API Key: {}",
        credential_status(config.llm.api_key.as_deref())
    );

    eprintln!();
    eprintln!("{}", style("Embeddings:").bold().yellow());
    eprintln!("  Base URL: {}", style(&config.embedding.base_url).cyan());
    eprintln!("  Model: {}", style(&config.embedding.model).cyan());
    eprintln!("  Dimension: {}", style(config.embedding.dimension).cyan());
    eprintln!("  Batch Size: {}", style(config.embedding.batch_size).cyan());

    eprintln!();
    eprintln!("{}", style("Vector Store:").bold().yellow());
    eprintln!("  Backend: {}", style(config.vector_store.backend).cyan());
    match config.vector_store.backend {
        VectorBackend::Qdrant => {
            eprintln!("  URL: {}", style(&config.vector_store.url).cyan());
            eprintln!(
                "  API Key: {}",
                credential_status(config.vector_store.api_key.as_deref())
            );
        }
        VectorBackend::Lance => {
            eprintln!(
                "  Path: {}",
                style(config.vector_database_path().display()).cyan()
            );
        }
    }
    eprintln!(
        "  Collection: {}",
        style(&config.vector_store.collection).cyan()
    );
    eprintln!("  Distance: {}", style(config.vector_store.distance).cyan());

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!("  Chunk Size: {}", style(config.chunking.chunk_size).cyan());
    eprintln!(
        "  Chunk Overlap: {}",
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Agent:").bold().yellow());
    eprintln!("  Name: {}", style(&config.agent.name).cyan());
    eprintln!("  Max Turns: {}", style(config.agent.max_turns).cyan());
    eprintln!("  Top K: {}", style(config.agent.top_k).cyan());

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );

    Ok(())
}

fn credential_status(value: Option<&str>) -> console::StyledObject<&'static str> {
    match value {
        Some(key) if !key.is_empty() => style("set").green(),
        _ => style("not set").red(),
    }
}

fn load_existing_config(config_dir: &Path) -> Result<Config> {
    Config::load_file(config_dir).map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            Ok(Config {
                base_dir: config_dir.to_path_buf(),
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_llm(llm: &mut LlmConfig) -> Result<()> {
    let base_url: String = Input::new()
        .with_prompt("Chat completions base URL")
        .default(llm.base_url.clone().unwrap_or_else(|| {
            "https://generativelanguage.googleapis.com/v1beta/openai/".to_string()
        }))
        .validate_with(|input: &String| -> Result<(), ConfigError> {
            LlmConfig::default().set_base_url(input.clone())
        })
        .interact_text()?;

    let model: String = Input::new()
        .with_prompt("Chat model")
        .default(
            llm.model
                .clone()
                .unwrap_or_else(|| "gemini-2.0-flash".to_string()),
        )
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    llm.set_base_url(base_url)?;
    llm.set_model(model)?;

    Ok(())
}

fn configure_embedding(embedding: &mut EmbeddingConfig) -> Result<()> {
    let model: String = Input::new()
        .with_prompt("Embedding model")
        .default(embedding.model.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Model name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let dimension: u32 = Input::new()
        .with_prompt("Embedding dimension")
        .default(embedding.dimension)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            EmbeddingConfig::default().set_dimension(*input)
        })
        .interact_text()?;

    let batch_size: u32 = Input::new()
        .with_prompt("Batch size for embedding generation")
        .default(embedding.batch_size)
        .validate_with(|input: &u32| -> Result<(), ConfigError> {
            EmbeddingConfig::default().set_batch_size(*input)
        })
        .interact_text()?;

    embedding.set_model(model)?;
    embedding.set_dimension(dimension)?;
    embedding.set_batch_size(batch_size)?;

    Ok(())
}

fn configure_vector_store(store: &mut VectorStoreConfig) -> Result<()> {
    let backends = [VectorBackend::Qdrant, VectorBackend::Lance];
    let labels = ["qdrant (remote server)", "lance (embedded, local disk)"];
    let default_index = backends
        .iter()
        .position(|&backend| backend == store.backend)
        .unwrap_or(0);

    let backend_index = Select::new()
        .with_prompt("Vector store backend")
        .default(default_index)
        .items(&labels)
        .interact()?;
    store.backend = backends[backend_index];

    if store.backend == VectorBackend::Qdrant {
        let url: String = Input::new()
            .with_prompt("Qdrant URL")
            .default(store.url.clone())
            .validate_with(|input: &String| -> Result<(), ConfigError> {
                VectorStoreConfig::default().set_url(input.clone())
            })
            .interact_text()?;
        store.set_url(url)?;
    }

    let collection: String = Input::new()
        .with_prompt("Collection name")
        .default(store.collection.clone())
        .validate_with(|input: &String| -> Result<(), &str> {
            if input.trim().is_empty() {
                Err("Collection name cannot be empty")
            } else {
                Ok(())
            }
        })
        .interact_text()?;
    store.set_collection(collection)?;

    Ok(())
}

fn configure_chunking(chunking: &mut ChunkingConfig) -> Result<()> {
    let chunk_size: usize = Input::new()
        .with_prompt("Chunk size (characters)")
        .default(chunking.chunk_size)
        .validate_with(|input: &usize| -> Result<(), &str> {
            if *input == 0 {
                Err("Chunk size must be greater than 0")
            } else {
                Ok(())
            }
        })
        .interact_text()?;

    let chunk_overlap: usize = Input::new()
        .with_prompt("Chunk overlap (characters)")
        .default(chunking.chunk_overlap.min(chunk_size - 1))
        .validate_with(|input: &usize| -> Result<(), ConfigError> {
            ChunkingConfig::new(chunk_size, *input).validate()
        })
        .interact_text()?;

    *chunking = ChunkingConfig::new(chunk_size, chunk_overlap);

    Ok(())
}

fn test_qdrant_connection(store: &VectorStoreConfig) -> bool {
    let url = format!("{}/collections", store.url.trim_end_matches('/'));

    let agent: ureq::Agent = ureq::Agent::config_builder()
        .timeout_global(Some(std::time::Duration::from_secs(5)))
        .build()
        .into();

    let mut request = agent.get(&url);
    if let Some(key) = &store.api_key {
        request = request.header("api-key", key.as_str());
    }

    match request.call() {
        Ok(_) => true,
        Err(ureq::Error::StatusCode(code)) => code != 404 && code < 500,
        Err(_) => false,
    }
}
