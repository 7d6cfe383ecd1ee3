//! Integration tests for the transform engine and its wire protocol

use audiovis_core::{EngineConfig, TransformEngine, TransformRequest, TransformResponse};
use std::f32::consts::PI;
use tokio_test::{assert_err, assert_ok};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn sine(freq: f32, sample_rate: f32, len: usize) -> Vec<f32> {
    (0..len)
        .map(|i| (2.0 * PI * freq * i as f32 / sample_rate).sin())
        .collect()
}

fn argmax(values: &[f32]) -> usize {
    values
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
        .map(|(i, _)| i)
        .unwrap()
}

fn engine(lanes: usize) -> TransformEngine {
    TransformEngine::start(&EngineConfig {
        lanes: Some(lanes),
        queue_capacity: 4,
        ..Default::default()
    })
}

#[tokio::test]
async fn test_one_second_tone_over_the_wire() {
    init_tracing();
    let engine = engine(2);

    let samples = sine(440.0, 44100.0, 44100);
    let message = serde_json::json!({
        "type": "generate",
        "requestId": "tone",
        "audioData": samples,
        "width": 800,
        "height": 200,
        "sampleRate": 44100,
    })
    .to_string();

    let reply = assert_ok!(engine.transform_message(&message).await);
    let response: TransformResponse = serde_json::from_str(&reply).unwrap();

    let TransformResponse::Success {
        request_id,
        waveform_data: Some(waveform),
        spectrogram_data: Some(spectrogram),
    } = response
    else {
        panic!("expected both outputs, got {}", reply);
    };
    assert_eq!(request_id, "tone");

    assert_eq!(waveform.len(), 800);
    let peak = waveform.iter().cloned().fold(0.0f32, f32::max);
    assert!((peak - 1.0).abs() < 1e-6);
    assert!(waveform.iter().all(|v| (0.0..=1.0).contains(v)));

    // 440 Hz sits near bin 20 of 2048; rows span bins 1..=929 over 200 rows
    assert_eq!(spectrogram.len(), 800);
    for column in &spectrogram[..780] {
        assert_eq!(column.len(), 200);
        let row = argmax(column);
        assert!((3..=6).contains(&row), "peak at row {}", row);
        assert!((column[row] - 1.0).abs() < 1e-6);
    }

    engine.shutdown().await;
}

#[tokio::test]
async fn test_invalid_requests_do_not_stop_the_engine() {
    init_tracing();
    let engine = engine(1);

    let empty = assert_ok!(engine.transform(TransformRequest::waveform("a", vec![], 10, 44100.0)).await);
    assert!(!empty.is_success());

    let bad_rate = assert_ok!(
        engine
            .transform(TransformRequest::spectrogram("b", vec![0.5; 64], 4, 4, 0.0))
            .await
    );
    assert!(!bad_rate.is_success());

    let garbage = assert_ok!(engine.transform_message("{not json").await);
    assert!(garbage.contains(r#""type":"error""#));

    let fine = assert_ok!(engine.transform(TransformRequest::waveform("c", vec![0.5; 64], 4, 44100.0)).await);
    assert_eq!(
        fine,
        TransformResponse::Success {
            request_id: "c".to_string(),
            waveform_data: Some(vec![1.0; 4]),
            spectrogram_data: None,
        }
    );

    engine.shutdown().await;
}

#[tokio::test]
async fn test_silence_stays_silent() {
    let engine = engine(1);
    let response = assert_ok!(
        engine
            .transform(TransformRequest {
                kind: None,
                height: Some(16),
                ..TransformRequest::waveform("quiet", vec![0.0; 4096], 8, 44100.0)
            })
            .await
    );

    let TransformResponse::Success {
        waveform_data: Some(waveform),
        spectrogram_data: Some(spectrogram),
        ..
    } = response
    else {
        panic!("expected both outputs");
    };
    assert!(waveform.iter().all(|&v| v == 0.0));
    assert!(spectrogram.iter().flatten().all(|&v| v == 0.0));

    engine.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_drains_queued_work() {
    let engine = engine(1);
    let (reply, mut responses) = tokio::sync::mpsc::channel(8);
    for i in 0..4 {
        let request = TransformRequest::waveform(format!("q{}", i), sine(100.0, 8000.0, 800), 16, 8000.0);
        assert_ok!(engine.submit(request, reply.clone()).await);
    }
    drop(reply);
    engine.shutdown().await;

    let mut ids = Vec::new();
    while let Some(response) = responses.recv().await {
        assert!(response.is_success());
        ids.push(response.request_id().to_string());
    }
    ids.sort();
    assert_eq!(ids, ["q0", "q1", "q2", "q3"]);
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = EngineConfig {
        fft_size: 1000,
        ..Default::default()
    };
    assert_err!(config.validate());
}
