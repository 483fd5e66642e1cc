//! Audio engine - owns the synthesis graph on the audio thread

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver, Sender};
use revline_sim::SnapshotReader;
use tracing::debug;

use crate::config::AudioConfig;
use crate::graph::{AudioSynthesisGraph, GraphEvents};
use crate::mixer::MasterBus;

/// Commands sent to the audio engine
#[derive(Debug, Clone, PartialEq)]
pub enum AudioCommand {
    SetMasterVolume(f32),
    SetMuted(bool),
    ToggleMute,
    Shutdown,
}

/// Events sent from the audio engine
#[derive(Debug, Clone, PartialEq)]
pub enum AudioEvent {
    /// Engine started turning, voices allocated
    GraphBuilt,
    /// Fade finished, voices dropped
    GraphReleased,
    BlowOff,
    /// Periodic output level
    Levels { peak: f32, voices: usize },
    /// Device or stream failure
    Error(String),
}

/// Audio engine state (held in the audio callback)
pub struct EngineState {
    graph: AudioSynthesisGraph,
    master: MasterBus,
    reader: SnapshotReader,
    events: Sender<AudioEvent>,
    sample_rate: u32,
    control_block: usize,
    peak: f32,
    frames_since_levels: usize,
    levels_interval_frames: usize,
    shutdown: bool,
}

impl EngineState {
    pub fn new(
        sample_rate: u32,
        config: &AudioConfig,
        max_rpm: f32,
        reader: SnapshotReader,
        events: Sender<AudioEvent>,
    ) -> Self {
        debug!(sample_rate, control_block = config.control_block, "audio engine state created");
        Self {
            graph: AudioSynthesisGraph::new(sample_rate, config, max_rpm),
            master: MasterBus::new(config.master_volume, config.muted, config.rates.master),
            reader,
            events,
            sample_rate,
            control_block: config.control_block.max(1),
            peak: 0.0,
            frames_since_levels: 0,
            levels_interval_frames: ((config.levels_interval_secs * sample_rate as f32) as usize)
                .max(1),
            shutdown: false,
        }
    }

    pub fn graph(&self) -> &AudioSynthesisGraph {
        &self.graph
    }

    pub fn master(&self) -> &MasterBus {
        &self.master
    }

    /// Process a command
    pub fn handle_command(&mut self, cmd: AudioCommand) {
        match cmd {
            AudioCommand::SetMasterVolume(volume) => self.master.set_volume(volume),
            AudioCommand::SetMuted(muted) => self.master.set_muted(muted),
            AudioCommand::ToggleMute => self.master.set_muted(!self.master.is_muted()),
            AudioCommand::Shutdown => self.shutdown = true,
        }
    }

    /// Fill an interleaved output buffer
    ///
    /// Reads the newest vehicle snapshot once per control block. Never
    /// blocks and never allocates.
    pub fn process(&mut self, output: &mut [f32], channels: usize) {
        if self.shutdown {
            output.fill(0.0);
            return;
        }

        let channels = channels.max(1);
        for block in output.chunks_mut(self.control_block * channels) {
            let state = self.reader.latest();
            let events = self.graph.process_block(&state, block, channels);
            self.emit(events);
        }

        self.master.process(output, channels, self.sample_rate as f32);
        self.meter(output, channels);
    }

    fn emit(&self, events: GraphEvents) {
        // A full queue drops the event rather than stall the callback
        if events.built {
            let _ = self.events.try_send(AudioEvent::GraphBuilt);
        }
        if events.blow_off {
            let _ = self.events.try_send(AudioEvent::BlowOff);
        }
        if events.released {
            let _ = self.events.try_send(AudioEvent::GraphReleased);
        }
    }

    fn meter(&mut self, output: &[f32], channels: usize) {
        self.peak = output.iter().fold(self.peak, |p, x| p.max(x.abs()));
        self.frames_since_levels += output.len() / channels;
        if self.frames_since_levels >= self.levels_interval_frames {
            let _ = self.events.try_send(AudioEvent::Levels {
                peak: self.peak,
                voices: self.graph.audible_voices(),
            });
            self.peak = 0.0;
            self.frames_since_levels = 0;
        }
    }
}

/// Handle to communicate with the audio engine
pub struct AudioEngine {
    /// Send commands to audio thread
    pub command_tx: Sender<AudioCommand>,
    /// Receive events from audio thread
    pub event_rx: Receiver<AudioEvent>,
    /// Shutdown flag
    shutdown: Arc<AtomicBool>,
}

impl AudioEngine {
    /// Create channels for engine communication
    pub fn create_channels() -> (
        Sender<AudioCommand>,
        Receiver<AudioCommand>,
        Sender<AudioEvent>,
        Receiver<AudioEvent>,
    ) {
        let (cmd_tx, cmd_rx) = bounded(256);
        let (evt_tx, evt_rx) = bounded(256);
        (cmd_tx, cmd_rx, evt_tx, evt_rx)
    }

    pub fn new(command_tx: Sender<AudioCommand>, event_rx: Receiver<AudioEvent>) -> Self {
        Self {
            command_tx,
            event_rx,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Send a command to the audio engine
    pub fn send(&self, cmd: AudioCommand) {
        let _ = self.command_tx.try_send(cmd);
    }

    /// Shared flag the audio thread polls
    pub fn shutdown_flag(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    /// Request shutdown
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        let _ = self.command_tx.try_send(AudioCommand::Shutdown);
    }
}
