//! Decoding audio files into sample buffers through the transcoder.
//!
//! Container formats are never parsed here: ffmpeg converts the input to a
//! temporary 16-bit mono WAV file, which is then read with `hound`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

use crate::types::AudioData;
use crate::{Error, Result};

/// Decode `input` to mono samples with the transcoder `program`.
///
/// `sample_rate` resamples the output; `None` keeps the source rate. A
/// transcoder still running after `timeout` is killed and the decode fails.
/// The intermediate WAV is removed even if the returned future is dropped.
pub async fn decode_with_transcoder(
    program: &str,
    input: impl AsRef<Path>,
    sample_rate: Option<u32>,
    timeout: Option<Duration>,
) -> Result<AudioData> {
    let input = input.as_ref();
    if !tokio::fs::try_exists(input).await.unwrap_or(false) {
        return Err(Error::SourceNotFound {
            path: input.to_path_buf(),
        });
    }

    info!("Decoding audio from: {}", input.display());

    let temp_wav = tempfile::Builder::new()
        .prefix("audiovis_")
        .suffix(".wav")
        .tempfile()?;

    let mut args: Vec<String> = vec![
        "-hide_banner".into(),
        "-nostdin".into(),
        "-loglevel".into(),
        "error".into(),
        "-i".into(),
        input.to_string_lossy().into_owned(),
        "-vn".into(),
        "-acodec".into(),
        "pcm_s16le".into(),
        "-ac".into(),
        "1".into(),
    ];
    if let Some(rate) = sample_rate {
        args.push("-ar".into());
        args.push(rate.to_string());
    }
    args.push("-y".into());
    args.push(temp_wav.path().to_string_lossy().into_owned());

    let run = Command::new(program)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .output();

    let output = match timeout {
        Some(limit) => tokio::time::timeout(limit, run)
            .await
            .map_err(|_| Error::Decode(format!("transcoder exceeded {:?}", limit)))?,
        None => run.await,
    }
    .map_err(|source| Error::TranscoderUnavailable {
        program: program.to_string(),
        source,
    })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::Decode(format!("transcoder failed: {}", stderr.trim())));
    }

    let path = temp_wav.path().to_path_buf();
    let audio = tokio::task::spawn_blocking(move || read_wav(&path))
        .await
        .map_err(|e| Error::Decode(e.to_string()))??;
    drop(temp_wav);

    info!("Decoded {} samples at {}Hz", audio.len(), audio.sample_rate);
    Ok(audio)
}

/// Read a WAV file and mix it down to mono `f32` samples.
pub fn read_wav(path: &Path) -> Result<AudioData> {
    let reader = hound::WavReader::open(path).map_err(|e| Error::Decode(e.to_string()))?;
    let spec = reader.spec();
    debug!("WAV spec: {:?}", spec);

    let samples: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Decode(e.to_string()))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample.max(1) - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Decode(e.to_string()))?
        }
    };

    Ok(AudioData::new(
        downmix(&samples, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Average interleaved channels into one.
fn downmix(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
