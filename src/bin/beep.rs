// Minimal hardware check: play a ramped tone through the engine and
// report the measured output latency.

use std::thread;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use psych::config::AppConfig;
use psych::dsp;
use psych::engine::AudioEngine;
use psych::sound::CacheKey;
use psych::units::UnitExt;

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Tone frequency in Hz
    #[arg(long, default_value_t = 1000.0)]
    freq: f64,

    /// Tone duration in seconds
    #[arg(long, default_value_t = 0.5)]
    dur: f64,

    /// Attenuation below unit RMS, in dB
    #[arg(long, default_value_t = 20.0)]
    level: f64,

    /// Path to config TOML
    #[arg(long, default_value = "psych.toml")]
    config: String,
}

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true)
        .without_time()
        .try_init();

    let args = Args::parse();
    let config = AppConfig::load_or_default(&args.config);

    let mut engine = AudioEngine::with_cache_capacity(config.cache.capacity);
    engine
        .setup(&config.engine)
        .context("opening audio output")?;

    let rate = config.engine.sample_rate;
    let tone = dsp::tone(args.freq.hz(), args.dur.secs(), rate);
    let beep = dsp::ramp(&dsp::attenuate(&tone, args.level), 5.0.ms())?;
    let beep = engine.canonical(CacheKey::Id(0), &beep)?;

    let channel = engine.play(&beep, 0.0, None)?;
    thread::sleep(Duration::from_secs_f64(args.dur + 0.25));

    println!(
        "played {} Hz for {} s on channel {channel}; output latency {:.2} ms",
        args.freq,
        args.dur,
        engine.current_latency()? * 1e3
    );
    if let Some(warning) = engine.take_warning() {
        println!("warning: {warning}");
    }
    engine.close();
    Ok(())
}
