//! Voice pipeline integration tests
//!
//! Exercises the codec, playback scheduler and state machine without
//! requiring audio hardware.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use sara_voice::voice::codec::{self, AudioFrame, EncodedChunk};
use sara_voice::voice::{
    CAPTURE_SAMPLE_RATE, PLAYBACK_SAMPLE_RATE, PlaybackScheduler, SessionEvent, SessionState,
    Speaker as _, StateMachine, samples_to_wav,
};

mod common;
use common::{FakeSpeaker, chunk_of_secs, generate_sine_samples};

#[test]
fn codec_roundtrip_arbitrary_pcm() {
    let samples: Vec<i16> = (0..4096)
        .map(|i| ((i * 2731) % 65536 - 32768) as i16)
        .collect();
    let frame = AudioFrame::new(CAPTURE_SAMPLE_RATE, 1, samples).unwrap();

    let chunk = codec::encode(&frame);
    let back = codec::decode(&chunk, CAPTURE_SAMPLE_RATE, 1).unwrap();
    assert_eq!(back, frame);
}

#[test]
fn codec_roundtrip_through_f32_capture_path() {
    let input = generate_sine_samples(CAPTURE_SAMPLE_RATE, 440.0, 0.1, 0.8);
    let frame = AudioFrame::from_f32_mono(CAPTURE_SAMPLE_RATE, &input);

    let chunk = codec::encode(&frame);
    let back = codec::decode(&chunk, CAPTURE_SAMPLE_RATE, 1).unwrap();

    // Bit-exact through the wire; quantized relative to the f32 input
    assert_eq!(back.samples, frame.samples);
    for (a, b) in back.to_f32().iter().zip(&input) {
        assert!((a - b).abs() < 1.0 / 32768.0 + f32::EPSILON);
    }
}

#[test]
fn gapless_ordering_under_burst_arrival() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    // Chunks arrive all at once, far faster than real time
    let durations = [0.2, 0.05, 0.3, 0.1, 0.25];
    for &d in &durations {
        scheduler.schedule(&chunk_of_secs(d)).unwrap();
    }

    let starts = speaker.starts();
    let mut expected = starts[0];
    for (i, &d) in durations.iter().enumerate() {
        assert!((starts[i] - expected).abs() < 1e-9, "chunk {i} not gapless");
        expected += d;
    }
}

#[test]
fn gapless_ordering_with_interleaved_clock_advance() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    let a = scheduler.schedule(&chunk_of_secs(0.5)).unwrap();
    // Next chunk arrives while the first is still playing
    speaker.advance(0.3);
    let b = scheduler.schedule(&chunk_of_secs(0.4)).unwrap();

    // No gap, no overlap: starts exactly when the first ends
    assert!((b.start - (a.start + a.duration)).abs() < 1e-9);
}

#[test]
fn catch_up_after_idle_gap() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    scheduler.schedule(&chunk_of_secs(0.5)).unwrap();

    // 5 second pause after the audio finished; cursor is stale
    speaker.advance(5.5);
    let late = scheduler.schedule(&chunk_of_secs(0.2)).unwrap();
    assert!((late.start - speaker.now()).abs() < 1e-9);
}

#[test]
fn drain_signal_fires_exactly_once() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker);

    let ids: Vec<u64> = (0..3)
        .map(|_| scheduler.schedule(&chunk_of_secs(0.1)).unwrap().id)
        .collect();

    let mut drains = 0;
    for &id in &ids {
        if scheduler.on_finished(id) {
            drains += 1;
        }
    }
    assert_eq!(drains, 1);

    // No further signal until a new chunk arrives and finishes
    assert!(!scheduler.on_finished(999));
    let next = scheduler.schedule(&chunk_of_secs(0.1)).unwrap();
    assert!(scheduler.on_finished(next.id));
}

#[test]
fn cancel_all_discards_every_unit() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    let n = 5;
    for _ in 0..n {
        scheduler.schedule(&chunk_of_secs(0.3)).unwrap();
    }
    assert_eq!(scheduler.in_flight(), n);

    scheduler.cancel_all();

    assert_eq!(scheduler.in_flight(), 0);
    assert_eq!(speaker.cancelled.borrow().len(), n);
    // A completion arriving late for a cancelled unit must not signal drain
    assert!(!scheduler.on_finished(0));
}

#[test]
fn bad_chunk_isolation() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    let corrupt = EncodedChunk::from_base64(BASE64.encode([1u8, 2, 3]), PLAYBACK_SAMPLE_RATE);

    let mut scheduled = 0;
    for i in 0..10 {
        let chunk = if i == 4 {
            corrupt.clone()
        } else {
            chunk_of_secs(0.1)
        };
        if scheduler.schedule(&chunk).is_ok() {
            scheduled += 1;
        }
    }

    assert_eq!(scheduled, 9);
    assert_eq!(speaker.starts().len(), 9);

    // Cursor progressed by exactly the nine good chunks
    assert!((scheduler.next_start() - 0.9).abs() < 1e-9);
    let starts = speaker.starts();
    for (i, &start) in starts.iter().enumerate() {
        assert!((start - 0.1 * i as f64).abs() < 1e-9);
    }
}

#[test]
fn scenario_half_point_three_point_four() {
    let speaker = FakeSpeaker::default();
    speaker.advance(1.25);
    let mut scheduler = PlaybackScheduler::new(speaker.clone());

    let t0 = speaker.now();
    scheduler.schedule(&chunk_of_secs(0.5)).unwrap();
    scheduler.schedule(&chunk_of_secs(0.3)).unwrap();
    scheduler.schedule(&chunk_of_secs(0.4)).unwrap();

    let starts = speaker.starts();
    assert!((starts[0] - t0).abs() < 1e-9);
    assert!((starts[1] - (t0 + 0.5)).abs() < 1e-9);
    assert!((starts[2] - (t0 + 0.8)).abs() < 1e-9);
}

#[test]
fn state_machine_follows_playback_lifecycle() {
    let speaker = FakeSpeaker::default();
    let mut scheduler = PlaybackScheduler::new(speaker);
    let mut sm = StateMachine::new();

    sm.apply(SessionEvent::OpenRequested);
    sm.apply(SessionEvent::Opened);
    assert_eq!(sm.state(), SessionState::Listening);

    let a = scheduler.schedule(&chunk_of_secs(0.2)).unwrap();
    sm.apply(SessionEvent::AudioArrived);
    assert_eq!(sm.state(), SessionState::Speaking);

    let b = scheduler.schedule(&chunk_of_secs(0.2)).unwrap();
    sm.apply(SessionEvent::AudioArrived);
    assert_eq!(sm.state(), SessionState::Speaking);

    if scheduler.on_finished(a.id) {
        sm.apply(SessionEvent::Drained);
    }
    assert_eq!(sm.state(), SessionState::Speaking);

    if scheduler.on_finished(b.id) {
        sm.apply(SessionEvent::Drained);
    }
    assert_eq!(sm.state(), SessionState::Listening);

    sm.apply(SessionEvent::Closed);
    assert_eq!(sm.state(), SessionState::Idle);
}

#[test]
fn samples_to_wav_header() {
    let samples = generate_sine_samples(CAPTURE_SAMPLE_RATE, 440.0, 0.1, 0.5);
    let wav_data = samples_to_wav(&samples, CAPTURE_SAMPLE_RATE).unwrap();

    // Check WAV header magic
    assert_eq!(&wav_data[0..4], b"RIFF");
    assert_eq!(&wav_data[8..12], b"WAVE");
    assert!(wav_data.len() > 44);
}

#[test]
fn wav_roundtrip() {
    let original_samples: Vec<f32> = vec![0.0, 0.5, -0.5, 0.25, -1.0];
    let wav_data = samples_to_wav(&original_samples, CAPTURE_SAMPLE_RATE).unwrap();

    let cursor = std::io::Cursor::new(wav_data);
    let mut reader = hound::WavReader::new(cursor).unwrap();

    let spec = reader.spec();
    assert_eq!(spec.sample_rate, CAPTURE_SAMPLE_RATE);
    assert_eq!(spec.channels, 1);

    let read_samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
    assert_eq!(read_samples.len(), original_samples.len());
    assert_eq!(read_samples[1], 16384);
}
