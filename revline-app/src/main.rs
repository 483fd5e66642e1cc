//! Revline - terminal driving simulator
//!
//! Keyboard in, procedural engine sound out, one status line in between.

mod config;

use std::fs::{self, File};
use std::io::{stdout, Stdout, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use crossterm::{
    cursor,
    event::{
        self, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::Print,
    terminal::{self, disable_raw_mode, enable_raw_mode, ClearType},
};
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

use revline_audio::{AudioCommand, AudioConfig, AudioEngine, AudioError, AudioEvent, EngineState};
use revline_input::{Command, DriverControls, InputHandler};
use revline_sim::{Notice, Simulation, SnapshotPublisher, SnapshotReader, VehicleState};

use crate::config::Config;

/// Simulation and display rate
const FPS: u64 = 60;

/// How long a notice stays on the status line
const NOTICE_SECS: f32 = 3.0;

const MAX_VOLUME: f32 = 2.0;

const HELP: &str =
    "w/Up gas  s/Down brake  Space nitro  i ignition  l lights  m mute  +/- volume  r reset  q quit";

fn main() -> anyhow::Result<()> {
    init_logging()?;

    let config = Config::load();
    info!(path = %Config::config_path().display(), "revline starting");
    if !Config::config_path().exists() {
        // First run: leave an editable copy of the defaults
        if let Err(e) = config.save() {
            warn!(error = %e, "could not write default config");
        }
    }

    // Snapshot mailbox for the audio thread
    let mut publisher = SnapshotPublisher::default();
    let reader = publisher.subscribe();

    // Create audio channels
    let (cmd_tx, cmd_rx, evt_tx, evt_rx) = AudioEngine::create_channels();
    let engine = AudioEngine::new(cmd_tx, evt_rx);
    let shutdown = engine.shutdown_flag();

    // Spawn audio thread
    let audio_config = config.audio.clone();
    let max_rpm = config.vehicle.engine.max_rpm;
    let audio_handle = thread::Builder::new()
        .name("revline-audio".into())
        .spawn(move || {
            if let Err(e) = run_audio_thread(&audio_config, max_rpm, reader, cmd_rx, &evt_tx, shutdown)
            {
                let _ = evt_tx.try_send(AudioEvent::Error(e.to_string()));
            }
        })?;

    // Initialize terminal
    enable_raw_mode()?;
    let mut stdout = stdout();
    let enhanced = terminal::supports_keyboard_enhancement().unwrap_or(false);
    if enhanced {
        // Needed for key release events
        execute!(
            stdout,
            PushKeyboardEnhancementFlags(KeyboardEnhancementFlags::REPORT_EVENT_TYPES)
        )?;
    }
    execute!(stdout, cursor::Hide, Print(HELP), Print("\r\n"))?;
    debug!(enhanced, "terminal ready");

    // Run main loop
    let result = run_app(&mut stdout, config, &engine, &mut publisher);

    // Cleanup
    engine.shutdown();
    if enhanced {
        let _ = execute!(stdout, PopKeyboardEnhancementFlags);
    }
    execute!(stdout, cursor::Show, Print("\r\n"))?;
    disable_raw_mode()?;

    // Wait for audio thread
    if audio_handle.join().is_err() {
        error!("audio thread panicked");
    }
    drain_audio_events(&engine);
    info!(
        readers = publisher.readers(),
        overwritten = publisher.overwritten(),
        "snapshot publisher"
    );
    info!("revline stopped");

    result
}

/// Log to a file so the status line stays readable
fn init_logging() -> anyhow::Result<()> {
    let dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("revline");
    fs::create_dir_all(&dir)?;
    let file = File::create(dir.join("revline.log"))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("revline=info,revline_sim=info,revline_audio=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .init();
    Ok(())
}

fn run_audio_thread(
    config: &AudioConfig,
    max_rpm: f32,
    reader: SnapshotReader,
    cmd_rx: Receiver<AudioCommand>,
    evt_tx: &Sender<AudioEvent>,
    shutdown: Arc<AtomicBool>,
) -> Result<(), AudioError> {
    // Get audio host and device
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(AudioError::NoOutputDevice)?;

    let supported = device
        .default_output_config()
        .map_err(|e| AudioError::DeviceConfig(e.to_string()))?;

    let mut stream_config: cpal::StreamConfig = supported.into();
    if let Some(rate) = config.sample_rate {
        stream_config.sample_rate = cpal::SampleRate(rate);
    }
    let sample_rate = stream_config.sample_rate.0;
    let channels = usize::from(stream_config.channels);
    info!(
        device = %device.name().unwrap_or_default(),
        sample_rate,
        channels,
        "audio output"
    );

    // The callback owns the engine state; commands arrive through the channel
    let mut state = EngineState::new(sample_rate, config, max_rpm, reader, evt_tx.clone());
    let err_tx = evt_tx.clone();

    let stream = device
        .build_output_stream(
            &stream_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                while let Ok(cmd) = cmd_rx.try_recv() {
                    state.handle_command(cmd);
                }
                state.process(data, channels);
            },
            move |err| {
                let _ = err_tx.try_send(AudioEvent::Error(err.to_string()));
            },
            None,
        )
        .map_err(|e| AudioError::BuildStream(e.to_string()))?;

    stream
        .play()
        .map_err(|e| AudioError::PlayStream(e.to_string()))?;

    // Keep the stream alive until shutdown
    while !shutdown.load(Ordering::Relaxed) {
        thread::sleep(Duration::from_millis(20));
    }
    Ok(())
}

fn run_app(
    stdout: &mut Stdout,
    config: Config,
    engine: &AudioEngine,
    publisher: &mut SnapshotPublisher,
) -> anyhow::Result<()> {
    let mut sim = Simulation::new(config.vehicle);
    let mut input_handler = InputHandler::new();
    let mut controls = DriverControls::default();
    let mut volume = config.audio.master_volume;
    let mut notice: Option<(Notice, f32)> = None;

    publisher.publish(sim.state());

    let frame_duration = Duration::from_millis(1000 / FPS);
    let mut last_frame = Instant::now();

    loop {
        // Handle input, waiting out the rest of the frame
        let timeout = frame_duration.saturating_sub(last_frame.elapsed());
        if event::poll(timeout)? {
            if let Event::Key(key) = event::read()? {
                if let Some(cmd) = input_handler.handle_key(key) {
                    if cmd == Command::Quit {
                        return Ok(());
                    }
                    apply_command(cmd, &mut sim, &mut controls, engine, &mut volume);
                }
            }
        }

        if last_frame.elapsed() < frame_duration {
            continue;
        }
        let dt = last_frame.elapsed().as_secs_f32();
        last_frame = Instant::now();

        // Advance the simulation
        let pedals = controls.update(dt);
        sim.set_gas(pedals.gas);
        sim.set_brake(pedals.brake);
        sim.set_nitro(pedals.nitro);
        let state = sim.tick(dt);
        publisher.publish(state);

        for n in sim.drain_notices() {
            info!(notice = %n, "notice");
            notice = Some((n, NOTICE_SECS));
        }
        notice = notice
            .map(|(n, left)| (n, left - dt))
            .filter(|(_, left)| *left > 0.0);

        drain_audio_events(engine);
        draw_status(stdout, &state, volume, notice.map(|(n, _)| n))?;
    }
}

fn apply_command(
    cmd: Command,
    sim: &mut Simulation,
    controls: &mut DriverControls,
    engine: &AudioEngine,
    volume: &mut f32,
) {
    if controls.handle(&cmd) {
        return;
    }
    match cmd {
        Command::ToggleIgnition => {
            if let Err(e) = sim.request_ignition_toggle() {
                warn!(error = %e, "ignition refused");
            }
        }
        Command::ToggleLights => {
            let on = !sim.controls().lights_on;
            sim.set_lights(on);
            debug!(on, "lights");
        }
        Command::ToggleMute => engine.send(AudioCommand::ToggleMute),
        Command::AdjustVolume(delta) => {
            *volume = (*volume + delta).clamp(0.0, MAX_VOLUME);
            engine.send(AudioCommand::SetMasterVolume(*volume));
            debug!(volume = *volume, "master volume");
        }
        Command::Reset => {
            sim.reset();
            controls.clear();
        }
        Command::Press(_) | Command::Release(_) | Command::Quit => {}
    }
}

fn drain_audio_events(engine: &AudioEngine) {
    while let Ok(event) = engine.event_rx.try_recv() {
        match event {
            AudioEvent::GraphBuilt => debug!("audio graph built"),
            AudioEvent::GraphReleased => debug!("audio graph released"),
            AudioEvent::BlowOff => debug!("blow-off"),
            AudioEvent::Levels { peak, voices } => debug!(peak, voices, "levels"),
            AudioEvent::Error(e) => error!(error = %e, "audio"),
        }
    }
}

fn draw_status(
    stdout: &mut Stdout,
    state: &VehicleState,
    volume: f32,
    notice: Option<Notice>,
) -> anyhow::Result<()> {
    let mut line = format!(
        "[{:<6}] {:>5.0} rpm  {:>5.1} km/h  gear {}  {:>5.1}°C  turbo {:>3.0}%  {:>8.2} km  vol {:>3.0}%",
        state.lifecycle.display_name(),
        state.rpm,
        state.speed,
        if state.gear == 0 { "N".to_string() } else { state.gear.to_string() },
        state.temperature,
        state.turbo_pressure * 100.0,
        state.odometer,
        volume * 100.0,
    );
    if state.nitro_active {
        line.push_str("  NITRO");
    }
    if state.lights_on {
        line.push_str("  LIGHTS");
    }
    if let Some(n) = notice {
        line.push_str(&format!("  {}", n));
    }

    queue!(
        stdout,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(line)
    )?;
    stdout.flush()?;
    Ok(())
}
