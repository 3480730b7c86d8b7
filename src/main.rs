use std::process::ExitCode;
use std::time::Duration;

use clap::{Parser, Subcommand};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use sara_voice::voice::{
    AudioCapture, CAPTURE_SAMPLE_RATE, CpalSpeaker, PLAYBACK_SAMPLE_RATE, PlaybackScheduler,
    samples_to_wav,
};
use sara_voice::{ChatClient, Config, MediaClient, VoiceSession};

/// SARA - realtime voice client for the SARA assistant
#[derive(Parser)]
#[command(name = "sara", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Test microphone input
    TestMic {
        /// Duration in seconds
        #[arg(short, long, default_value = "5")]
        duration: u64,

        /// Write captured audio to a WAV file
        #[arg(long)]
        dump: Option<std::path::PathBuf>,
    },
    /// Test speaker output through the playback scheduler
    TestSpeaker,
    /// Send one chat message and print the reply
    Chat {
        /// Message text
        message: String,
    },
    /// Describe an image through the persona's eyes
    See {
        /// Path to a JPEG or PNG image
        image: std::path::PathBuf,
        /// Override the default "what do you see" prompt
        #[arg(short, long)]
        prompt: Option<String>,
    },
    /// Generate an image and write it to a file
    Image {
        /// Prompt text
        prompt: String,
        /// Output path
        #[arg(short, long, default_value = "sara-image.png")]
        out: std::path::PathBuf,
    },
    /// Generate a video and print its download URI
    Video {
        /// Prompt text
        prompt: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,sara_voice=info",
        1 => "info,sara_voice=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;

    if let Some(cmd) = cli.command {
        return match cmd {
            Command::TestMic { duration, dump } => test_mic(duration, dump).await,
            Command::TestSpeaker => test_speaker().await,
            Command::Chat { message } => cmd_chat(&config, &message).await,
            Command::See { image, prompt } => cmd_see(&config, &image, prompt.as_deref()).await,
            Command::Image { prompt, out } => cmd_image(&config, &prompt, &out).await,
            Command::Video { prompt } => cmd_video(&config, &prompt).await,
        };
    }

    // Default: run a live voice session until closed or interrupted
    tracing::info!(persona = %config.persona.name, "starting voice session");
    let mut session = VoiceSession::new();
    session.run(&config).await?;

    Ok(())
}

/// Test microphone input
#[allow(clippy::future_not_send)]
async fn test_mic(duration: u64, dump: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    println!("Testing microphone for {duration} seconds...");
    println!("Speak into your microphone!\n");

    let mut capture = AudioCapture::new()?;
    let (frame_tx, mut frames) = mpsc::unbounded_channel();
    capture.start(frame_tx)?;

    println!("Sample rate: {CAPTURE_SAMPLE_RATE} Hz");
    println!("---");

    let mut captured: Vec<f32> = Vec::new();
    let deadline = tokio::time::Instant::now() + Duration::from_secs(duration);
    let mut ticker = tokio::time::interval(Duration::from_secs(1));
    ticker.tick().await;
    let mut second = 0u64;

    loop {
        tokio::select! {
            Some(frame) = frames.recv() => {
                captured.extend(frame.to_f32());
            }
            _ = ticker.tick() => {
                second += 1;
                let window_start = captured.len().saturating_sub(CAPTURE_SAMPLE_RATE as usize);
                let window = &captured[window_start..];
                let energy = calculate_rms(window);
                let peak = window.iter().map(|s| s.abs()).fold(0.0f32, f32::max);

                // Visual meter
                #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
                let meter_len = (energy * 100.0).min(50.0) as usize;
                let meter: String = "█".repeat(meter_len) + &" ".repeat(50 - meter_len);

                println!("[{second:2}s] RMS: {energy:.4} | Peak: {peak:.4} | [{meter}]");
            }
            () = tokio::time::sleep_until(deadline) => break,
        }
    }

    capture.stop();

    if let Some(path) = dump {
        let wav = samples_to_wav(&captured, CAPTURE_SAMPLE_RATE)?;
        std::fs::write(&path, wav)?;
        println!("\nWrote {} samples to {}", captured.len(), path.display());
    }

    println!("\n---");
    println!("If you saw movement in the meter, your mic is working!");
    println!("If RMS stayed near 0, check:");
    println!("  1. Is your mic plugged in?");
    println!("  2. Run: pactl info | grep 'Default Source'");
    println!("  3. Run: arecord -l (to list devices)");

    Ok(())
}

/// Calculate RMS energy
#[allow(clippy::cast_precision_loss)]
fn calculate_rms(samples: &[f32]) -> f32 {
    if samples.is_empty() {
        return 0.0;
    }
    let sum_squares: f32 = samples.iter().map(|s| s * s).sum();
    (sum_squares / samples.len() as f32).sqrt()
}

/// Test speaker output with a sine wave scheduled as three gapless chunks
#[allow(clippy::future_not_send)]
async fn test_speaker() -> anyhow::Result<()> {
    println!("Testing speaker output...");
    println!("You should hear a 440Hz tone for 2 seconds\n");

    let (finished_tx, mut finished) = mpsc::unbounded_channel();
    let speaker = CpalSpeaker::new(finished_tx)?;
    let mut scheduler = PlaybackScheduler::new(speaker);

    let frequency = 440.0_f32;
    #[allow(clippy::cast_precision_loss)]
    let samples: Vec<f32> = (0..(PLAYBACK_SAMPLE_RATE as usize * 2))
        .map(|i| {
            let t = i as f32 / PLAYBACK_SAMPLE_RATE as f32;
            (2.0 * std::f32::consts::PI * frequency * t).sin() * 0.3 // 30% volume
        })
        .collect();

    let mut pending = 0usize;
    for chunk in samples.chunks(samples.len() / 3 + 1) {
        let frame = sara_voice::AudioFrame::from_f32_mono(PLAYBACK_SAMPLE_RATE, chunk);
        scheduler.schedule(&sara_voice::voice::codec::encode(&frame))?;
        pending += 1;
    }

    println!("Playing {} samples in {pending} chunks...", samples.len());

    while pending > 0 {
        match tokio::time::timeout(Duration::from_secs(5), finished.recv()).await {
            Ok(Some(id)) => {
                scheduler.on_finished(id);
                pending -= 1;
            }
            _ => anyhow::bail!("playback did not complete"),
        }
    }

    println!("\n---");
    println!("If you heard the tone, your speakers are working!");

    Ok(())
}

/// Send one chat message
async fn cmd_chat(config: &Config, message: &str) -> anyhow::Result<()> {
    let client = ChatClient::new(config)?;
    let reply = client.send(&[], message).await?;
    println!("{reply}");
    Ok(())
}

/// Describe an image
async fn cmd_see(
    config: &Config,
    image: &std::path::Path,
    prompt: Option<&str>,
) -> anyhow::Result<()> {
    let bytes = std::fs::read(image)?;
    let mime = match image.extension().and_then(|e| e.to_str()) {
        Some("png") => "image/png",
        _ => "image/jpeg",
    };

    let client = ChatClient::new(config)?;
    let analysis = client.describe_image(&bytes, mime, prompt).await?;
    println!("{analysis}");
    Ok(())
}

/// Generate an image
async fn cmd_image(config: &Config, prompt: &str, out: &std::path::Path) -> anyhow::Result<()> {
    let client = MediaClient::new(config)?;
    println!("Generating image...");
    let bytes = client.generate_image(prompt).await?;
    std::fs::write(out, &bytes)?;
    println!("Wrote {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

/// Generate a video
async fn cmd_video(config: &Config, prompt: &str) -> anyhow::Result<()> {
    let client = MediaClient::new(config)?;
    println!("Generating video (this can take minutes)...");
    let uri = client.generate_video(prompt).await?;
    println!("{uri}");
    Ok(())
}
