use super::estimate_token_count as estimate_token_count_impl;
use super::*;

fn sample_document() -> String {
    let mut doc = String::from("# Dapr Agentic Cloud Ascent\n\n");
    doc.push_str(
        "DACA is a design pattern for building planet-scale agentic systems. \
         It combines stateless containers with actors and workflows.\n\n",
    );
    doc.push_str("## Core Principles\n\n");
    for i in 0..12 {
        doc.push_str(&format!(
            "- Principle {i}: keep agents stateless and push state into managed stores.\n"
        ));
    }
    doc.push_str("\n```yaml\napiVersion: dapr.io/v1alpha1\nkind: Component\nmetadata:\n  name: statestore\n```\n\n");
    doc.push_str("## Deployment Stages\n\n");
    doc.push_str(&"Local development uses Rancher Desktop, then prototypes move to free tiers. ".repeat(8));
    doc.push_str("\n\nÜnïcödé text «with» multi-byte characters ✓ should survive chunking intact.\n");
    doc
}

fn three_section_document() -> String {
    ["Alpha", "Beta", "Gamma"]
        .iter()
        .map(|name| {
            format!(
                "# {name}\n\nThe {name} section explains one topic in a short paragraph of prose.\n\n"
            )
        })
        .collect()
}

#[test]
fn estimate_token_count() {
    assert_eq!(estimate_token_count_impl("hello world"), 2);
    assert_eq!(estimate_token_count_impl("This is a test."), 5);
    assert_eq!(estimate_token_count_impl(""), 0);
}

#[test]
fn default_config_values() {
    let config = ChunkingConfig::default();
    assert_eq!(config.chunk_size, 800);
    assert_eq!(config.chunk_overlap, 160);
    assert!(config.validate().is_ok());
}

#[test]
fn rejects_zero_chunk_size() {
    let config = ChunkingConfig::new(0, 0);
    let result = chunk_markdown("some text", &config);
    assert!(matches!(result, Err(crate::RagError::Config(_))));
}

#[test]
fn rejects_overlap_not_smaller_than_size() {
    let config = ChunkingConfig::new(100, 100);
    assert!(matches!(
        config.validate(),
        Err(ConfigError::ChunkOverlapTooLarge(100, 100))
    ));
    assert!(chunk_markdown("some text", &config).is_err());
}

#[test]
fn empty_document_has_no_chunks() {
    let chunks =
        chunk_markdown("", &ChunkingConfig::default()).expect("chunking should succeed");
    assert!(chunks.is_empty());
}

#[test]
fn short_document_is_single_chunk() {
    let text = "# Title\n\nA short paragraph.\n";
    let chunks = chunk_markdown(text, &ChunkingConfig::default()).expect("chunking should succeed");

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].content, text);
    assert_eq!(chunks[0].chunk_index, 0);
    assert_eq!((chunks[0].start, chunks[0].end), (0, text.len()));
}

#[test]
fn chunks_respect_max_size() {
    let text = sample_document();
    let config = ChunkingConfig::new(120, 30);
    let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    for chunk in &chunks {
        assert!(chunk.content.chars().count() <= config.chunk_size);
        assert!(!chunk.content.is_empty());
    }
}

#[test]
fn reconstruction_recovers_original_text() {
    let text = sample_document();

    for (size, overlap) in [(1, 0), (7, 3), (50, 0), (64, 63), (120, 30), (800, 160)] {
        let config = ChunkingConfig::new(size, overlap);
        let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");
        assert_eq!(
            reconstruct(&chunks),
            text,
            "reconstruction failed for size={size} overlap={overlap}"
        );
    }
}

#[test]
fn chunking_is_deterministic() {
    let text = sample_document();
    let config = ChunkingConfig::new(150, 40);

    let first = chunk_markdown(&text, &config).expect("chunking should succeed");
    let second = chunk_markdown(&text, &config).expect("chunking should succeed");
    assert_eq!(first, second);
}

#[test]
fn adjacent_chunks_share_overlap_unless_split_at_heading() {
    let text = sample_document();
    let config = ChunkingConfig::new(120, 30);
    let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");

    for pair in chunks.windows(2) {
        let (prev, next) = (&pair[0], &pair[1]);
        if next.start == prev.end {
            assert!(
                next.content.starts_with('#'),
                "only headings may start a chunk without overlap: {:?}",
                next.content
            );
        } else {
            let prev_chars: Vec<char> = prev.content.chars().collect();
            let suffix: String = prev_chars[prev_chars.len() - config.chunk_overlap..]
                .iter()
                .collect();
            assert!(next.content.starts_with(&suffix));
        }
    }
}

#[test]
fn headings_start_new_chunks_without_overlap() {
    let text = three_section_document();
    let config = ChunkingConfig::new(100, 20);
    let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");

    assert_eq!(chunks.len(), 3);
    assert!(chunks[0].content.starts_with("# Alpha"));
    assert!(chunks[1].content.starts_with("# Beta"));
    assert!(chunks[2].content.starts_with("# Gamma"));
    assert_eq!(chunks[1].start, chunks[0].end);
    assert_eq!(chunks[2].start, chunks[1].end);
}

#[test]
fn code_block_kept_whole_when_it_fits() {
    let code = "```rust\nlet answer = 42;\nprintln!(\"{answer}\");\nlet done = true;\n```\n";
    let text = format!(
        "Intro paragraph before the example.\n\n{code}\nClosing paragraph after the example that keeps going for a while.\n"
    );
    let config = ChunkingConfig::new(110, 10);
    let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");

    assert!(chunks.len() > 1);
    assert!(chunks.iter().any(|c| c.content.contains(code)));
}

#[test]
fn multibyte_boundaries_are_respected() {
    let text = "é".repeat(50);
    let config = ChunkingConfig::new(16, 4);
    let chunks = chunk_markdown(&text, &config).expect("chunking should succeed");

    for chunk in &chunks {
        assert!(chunk.content.chars().all(|c| c == 'é'));
        assert!(chunk.content.chars().count() <= 16);
    }
    assert_eq!(reconstruct(&chunks), text);
}

#[test]
fn chunk_indices_are_sequential() {
    let text = sample_document();
    let chunks =
        chunk_markdown(&text, &ChunkingConfig::new(90, 15)).expect("chunking should succeed");

    for (i, chunk) in chunks.iter().enumerate() {
        assert_eq!(chunk.chunk_index, i);
    }
}
