//! CLI command implementations

use anyhow::{bail, Context};
use audiovis_core::audio::decode_with_transcoder;
use audiovis_core::protocol::{decode_request, encode_response};
use audiovis_core::{
    ClearTarget, GeneratedImage, TransformEngine, TransformRequest, TransformResponse, VisualKind,
    VisualizationCache, VisualsConfig,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::output::{emit, OutputFormat};

/// One generated image, as reported to the user.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeneratedEntry {
    kind: VisualKind,
    #[serde(flatten)]
    image: GeneratedImage,
}

/// A cache entry location.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EntryPath {
    kind: VisualKind,
    path: PathBuf,
    exists: bool,
}

/// Resolve configuration: file (or defaults), environment, then flags.
pub fn load_config(file: Option<&Path>, cache_root: Option<PathBuf>) -> anyhow::Result<VisualsConfig> {
    let mut config = match file {
        Some(path) => VisualsConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => VisualsConfig::default(),
    }
    .with_env_overrides();

    if let Some(root) = cache_root {
        config.cache.cache_root = root;
    }
    config.validate().context("invalid configuration")?;

    debug!(?config, "Configuration resolved");
    Ok(config)
}

/// Render or fetch cached images for `input`
pub async fn generate(
    config: &VisualsConfig,
    input: &Path,
    key: Option<String>,
    target: ClearTarget,
    force: bool,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let key = match key {
        Some(key) => key,
        None => input
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .with_context(|| format!("cannot derive a cache key from {}", input.display()))?,
    };

    let cache = VisualizationCache::new(config.cache.clone());
    let mut entries = Vec::new();
    for &kind in target.kinds() {
        let image = if force {
            cache.regenerate(input, &key, kind).await
        } else {
            cache.generate(input, &key, kind).await
        }
        .with_context(|| format!("failed to generate {} for {}", kind, input.display()))?;
        entries.push(GeneratedEntry { kind, image });
    }

    emit(&entries, format, |entries| {
        for entry in entries {
            let status = match (entry.image.cached, entry.image.placeholder) {
                (true, _) => "cached",
                (false, true) => "placeholder",
                (false, false) => "rendered",
            };
            println!("{:<12} {:<12} {}", entry.kind, status, entry.image.image_path.display());
        }
    })
}

/// Print cache paths for `key`
pub fn path(config: &VisualsConfig, key: &str, target: ClearTarget, format: OutputFormat) -> anyhow::Result<()> {
    let cache = VisualizationCache::new(config.cache.clone());
    let entries: Vec<EntryPath> = target
        .kinds()
        .iter()
        .map(|&kind| {
            let path = cache.cached_path(key, kind);
            let exists = path.exists();
            EntryPath { kind, path, exists }
        })
        .collect();

    emit(&entries, format, |entries| {
        for entry in entries {
            let marker = if entry.exists { "" } else { " (missing)" };
            println!("{:<12} {}{}", entry.kind, entry.path.display(), marker);
        }
    })
}

/// Remove cache entries for `key`
pub async fn clear(
    config: &VisualsConfig,
    key: &str,
    target: ClearTarget,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let cache = VisualizationCache::new(config.cache.clone());
    cache
        .clear_cache(key, target)
        .await
        .with_context(|| format!("failed to clear cache for {}", key))?;

    let cleared: Vec<VisualKind> = target.kinds().to_vec();
    emit(&cleared, format, |kinds| {
        for kind in kinds {
            println!("Cleared {} for {}", kind, key);
        }
    })
}

/// Decode `input` and run one transform request
pub async fn transform(
    config: &VisualsConfig,
    input: &Path,
    width: i64,
    height: Option<i64>,
    sample_rate: Option<u32>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let audio = decode_with_transcoder(
        &config.cache.transcoder,
        input,
        sample_rate,
        config.cache.transcoder_timeout(),
    )
    .await
    .with_context(|| format!("failed to decode {}", input.display()))?;
    info!(
        samples = audio.len(),
        sample_rate = audio.sample_rate,
        duration_secs = audio.duration_secs,
        "Audio decoded"
    );

    let request = TransformRequest {
        request_id: input.display().to_string(),
        kind: None,
        samples: audio.samples,
        width,
        height,
        sample_rate: audio.sample_rate as f64,
    };

    let engine = TransformEngine::start(&config.engine);
    let response = engine.transform(request).await;
    engine.shutdown().await;
    let response = response?;

    match (&response, format) {
        (TransformResponse::Error { error, .. }, _) => bail!("transform rejected: {}", error),
        (_, OutputFormat::Json) => println!("{}", encode_response(&response)),
        (
            TransformResponse::Success {
                waveform_data,
                spectrogram_data,
                ..
            },
            OutputFormat::Text,
        ) => {
            println!("Input: {}", input.display());
            if let Some(waveform) = waveform_data {
                let mean = waveform.iter().sum::<f32>() / waveform.len().max(1) as f32;
                println!("  Waveform: {} points (mean level {:.3})", waveform.len(), mean);
            }
            if let Some(spectrogram) = spectrogram_data {
                let rows = spectrogram.first().map(Vec::len).unwrap_or(0);
                println!("  Spectrogram: {} columns x {} rows", spectrogram.len(), rows);
            }
        }
    }

    Ok(())
}

/// JSON-lines transform worker
///
/// Each stdin line is one request; each stdout line is one response. Requests
/// run concurrently, so responses are written in completion order.
pub async fn worker(config: &VisualsConfig) -> anyhow::Result<()> {
    let engine = TransformEngine::start(&config.engine);
    let (reply, mut responses) = mpsc::channel::<TransformResponse>(config.engine.queue_capacity.max(1));

    let writer = tokio::spawn(async move {
        let mut stdout = tokio::io::stdout();
        while let Some(response) = responses.recv().await {
            let mut line = encode_response(&response);
            line.push('\n');
            stdout.write_all(line.as_bytes()).await?;
            stdout.flush().await?;
        }
        Ok::<_, std::io::Error>(())
    });

    info!(lanes = engine.lane_count(), "Worker ready");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut handled = 0usize;
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        if line.trim().is_empty() {
            continue;
        }
        handled += 1;
        match decode_request(&line) {
            Ok(request) => engine.submit(request, reply.clone()).await?,
            Err(rejection) => {
                if reply.send(rejection).await.is_err() {
                    break;
                }
            }
        }
    }

    drop(reply);
    engine.shutdown().await;
    writer.await?.context("failed to write stdout")?;

    info!(handled, "Worker finished");
    Ok(())
}
