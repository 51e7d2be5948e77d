//! Generation lifecycle: `Idle -> Generating -> Complete`, back to `Idle`
//! on failure.
//!
//! A run is driven by repeated [`MapGenerator::poll`] calls. Each call scans
//! at most `yield_every` analysis windows and then returns, so a host loop
//! stays responsive on long tracks. The last poll quantizes, assigns lanes,
//! persists the map and notifies subscribers. Only one run can be in flight
//! per generator.

use std::sync::mpsc;
use std::sync::Arc;

use crate::analysis::{BeatGrid, EnergyEnvelope, OnsetDetector, OnsetScan, ScanStatus, TempoEstimator};
use crate::audio::{read_mono, SampleSource};
use crate::chart::{assign_notes, LaneStrategy, MapStore, NoteMap};
use crate::config::GeneratorConfig;
use crate::error::{MapError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationState {
    Idle,
    Generating,
    Complete,
}

/// Lifecycle notifications delivered to subscribers.
#[derive(Debug, Clone)]
pub enum GeneratorEvent {
    Started { clip: String },
    Completed { map: Arc<NoteMap> },
}

/// Result of one [`MapGenerator::poll`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GenerationPoll {
    /// Nothing is running and nothing has completed.
    Idle,
    /// Suspended at a window boundary; poll again to continue.
    Pending { processed: usize, total: usize },
    Complete,
}

/// How [`MapGenerator::check_and_load`] obtained its map.
#[derive(Debug, Clone)]
pub enum LoadOutcome {
    /// A run was already in flight; nothing was done.
    Busy,
    Loaded(Arc<NoteMap>),
    Generated(Arc<NoteMap>),
}

type Listener = Box<dyn FnMut(&GeneratorEvent) + Send>;

struct Run {
    clip: String,
    samples: Vec<f32>,
    envelope: EnergyEnvelope,
    scan: OnsetScan,
    grid: BeatGrid,
    strategy: LaneStrategy,
}

enum Phase {
    Idle,
    Generating(Box<Run>),
    Complete,
}

pub struct MapGenerator {
    config: GeneratorConfig,
    store: Option<MapStore>,
    phase: Phase,
    map: Arc<NoteMap>,
    bpm: Option<f32>,
    listeners: Vec<Listener>,
    channels: Vec<mpsc::Sender<GeneratorEvent>>,
}

impl MapGenerator {
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            store: None,
            phase: Phase::Idle,
            map: Arc::new(NoteMap::default()),
            bpm: None,
            listeners: Vec::new(),
            channels: Vec::new(),
        })
    }

    /// Persist completed maps to `store` and load from it in
    /// [`check_and_load`](Self::check_and_load).
    pub fn with_store(mut self, store: MapStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&MapStore> {
        self.store.as_ref()
    }

    pub fn state(&self) -> GenerationState {
        match self.phase {
            Phase::Idle => GenerationState::Idle,
            Phase::Generating(_) => GenerationState::Generating,
            Phase::Complete => GenerationState::Complete,
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self.phase, Phase::Generating(_))
    }

    /// The current note map. Empty while a run is in flight.
    pub fn map(&self) -> Arc<NoteMap> {
        Arc::clone(&self.map)
    }

    /// Tempo used by the most recent run, detected or overridden. `None`
    /// after a map was loaded from the store.
    pub fn bpm(&self) -> Option<f32> {
        self.bpm
    }

    pub fn subscribe<F>(&mut self, listener: F)
    where
        F: FnMut(&GeneratorEvent) + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Channel-backed subscription for consumers on other threads. The
    /// subscription ends once the receiver is dropped.
    pub fn events(&mut self) -> mpsc::Receiver<GeneratorEvent> {
        let (tx, rx) = mpsc::channel();
        self.channels.push(tx);
        rx
    }

    /// Closure subscribers plus channels whose receiver was still alive at
    /// the last notification.
    pub fn subscriber_count(&self) -> usize {
        self.listeners.len() + self.channels.len()
    }

    /// Enters `Generating` for `source`. Returns `Ok(false)` without side
    /// effects when a run is already in flight. Input errors return the
    /// generator to `Idle`.
    pub fn start(&mut self, source: &dyn SampleSource) -> Result<bool> {
        if self.is_generating() {
            log::debug!("Generation already in progress, ignoring start for '{}'", source.name());
            return Ok(false);
        }
        self.emit(GeneratorEvent::Started {
            clip: source.name().to_string(),
        });
        self.begin(source)?;
        Ok(true)
    }

    /// Advances the in-flight run by one chunk of windows.
    pub fn poll(&mut self) -> Result<GenerationPoll> {
        let max_blocks = self.config.yield_every;
        let status = match &mut self.phase {
            Phase::Idle => return Ok(GenerationPoll::Idle),
            Phase::Complete => return Ok(GenerationPoll::Complete),
            Phase::Generating(run) => {
                let Run {
                    samples,
                    envelope,
                    scan,
                    ..
                } = &mut **run;
                scan.advance(envelope, samples, max_blocks)
            }
        };

        match status {
            Ok(ScanStatus::Suspended { processed, total }) => {
                Ok(GenerationPoll::Pending { processed, total })
            }
            Ok(ScanStatus::Finished { .. }) => {
                if let Phase::Generating(run) = std::mem::replace(&mut self.phase, Phase::Idle) {
                    self.finish(*run);
                }
                Ok(GenerationPoll::Complete)
            }
            Err(e) => {
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    /// Drops the in-flight run, if any, without notifying. Returns whether
    /// a run was cancelled.
    pub fn cancel(&mut self) -> bool {
        if !self.is_generating() {
            return false;
        }
        self.phase = Phase::Idle;
        log::info!("Generation cancelled");
        true
    }

    /// Starts and polls to completion. `progress` sees every suspension
    /// point. `Ok(None)` when another run was already in flight.
    pub fn run<F>(&mut self, source: &dyn SampleSource, mut progress: F) -> Result<Option<Arc<NoteMap>>>
    where
        F: FnMut(usize, usize),
    {
        if !self.start(source)? {
            return Ok(None);
        }
        self.drive(&mut progress).map(Some)
    }

    /// Loads the persisted map for `source` unless `force` is set or none
    /// exists, generating otherwise. A failed load falls back to generating.
    pub fn check_and_load<F>(
        &mut self,
        source: &dyn SampleSource,
        force: bool,
        mut progress: F,
    ) -> Result<LoadOutcome>
    where
        F: FnMut(usize, usize),
    {
        if self.is_generating() {
            return Ok(LoadOutcome::Busy);
        }

        let stored = match &self.store {
            Some(store) if !force && store.contains(source.name()) => Some(store.clone()),
            _ => None,
        };

        self.emit(GeneratorEvent::Started {
            clip: source.name().to_string(),
        });

        if let Some(store) = stored {
            let loaded = store.load(source.name()).and_then(|map| {
                map.validate(self.config.lanes)?;
                Ok(map)
            });
            match loaded {
                Ok(map) => {
                    self.map = Arc::new(map);
                    self.bpm = None;
                    self.phase = Phase::Complete;
                    self.emit(GeneratorEvent::Completed {
                        map: Arc::clone(&self.map),
                    });
                    return Ok(LoadOutcome::Loaded(Arc::clone(&self.map)));
                }
                Err(e) => {
                    log::error!("Load failed for '{}': {}; regenerating", source.name(), e);
                }
            }
        }

        self.begin(source)?;
        self.drive(&mut progress).map(LoadOutcome::Generated)
    }

    fn drive(&mut self, progress: &mut dyn FnMut(usize, usize)) -> Result<Arc<NoteMap>> {
        loop {
            match self.poll()? {
                GenerationPoll::Pending { processed, total } => progress(processed, total),
                GenerationPoll::Complete => return Ok(self.map()),
                GenerationPoll::Idle => return Err(MapError::Interrupted),
            }
        }
    }

    fn begin(&mut self, source: &dyn SampleSource) -> Result<()> {
        self.map = Arc::new(NoteMap::new(source.name()));
        match self.prepare(source) {
            Ok(run) => {
                self.phase = Phase::Generating(Box::new(run));
                Ok(())
            }
            Err(e) => {
                log::error!("Generation for '{}' aborted: {}", source.name(), e);
                self.phase = Phase::Idle;
                Err(e)
            }
        }
    }

    fn prepare(&mut self, source: &dyn SampleSource) -> Result<Run> {
        let samples = read_mono(source)?;
        let sample_rate = source.sample_rate();
        let duration = samples.len() as f32 / sample_rate as f32;

        let bpm = match self.config.bpm {
            Some(bpm) => bpm,
            None => TempoEstimator::default().estimate(&samples, sample_rate),
        };
        self.bpm = Some(bpm);

        let grid = BeatGrid::new(bpm, self.config.subdivisions_per_beat, self.config.beat_offset)?;
        let strategy = LaneStrategy::from_config(&self.config);

        let mut envelope = EnergyEnvelope::new(self.config.window_size, sample_rate)?;
        if strategy.needs_bands() {
            envelope = envelope.with_bands(self.config.lanes);
        }

        let detector = OnsetDetector::new(
            self.config.minimum_energy,
            self.config.peak_sensitivity,
            self.config.baseline_smoothing,
        );
        let scan = OnsetScan::new(detector, &envelope, &samples);

        log::info!(
            "BPM: {:.2} | Song: {:.1}s | Grid: {:.3}s intervals | {} windows",
            bpm,
            duration,
            grid.subdivision_interval(),
            scan.total_blocks()
        );

        Ok(Run {
            clip: source.name().to_string(),
            samples,
            envelope,
            scan,
            grid,
            strategy,
        })
    }

    fn finish(&mut self, run: Run) {
        let Run {
            clip,
            scan,
            grid,
            mut strategy,
            ..
        } = run;

        let raw_hits = scan.into_hits();
        log::info!("Detected {} raw hits", raw_hits.len());

        let quantized = grid.quantize(&raw_hits);
        log::info!("Quantized to {} grid-aligned hits", quantized.len());

        let notes = assign_notes(
            &quantized,
            &grid,
            self.config.lanes,
            self.config.heavy_note_interval,
            &mut strategy,
        );
        let mut map = NoteMap {
            clip_name: clip,
            notes,
        };
        map.sort_by_time();

        log::info!("Final map: {} notes", map.len());
        map.summary(self.config.lanes).log();

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&map) {
                log::warn!("Could not persist map for '{}': {}", map.clip_name, e);
            }
        }

        self.map = Arc::new(map);
        self.phase = Phase::Complete;
        self.emit(GeneratorEvent::Completed {
            map: Arc::clone(&self.map),
        });
    }

    fn emit(&mut self, event: GeneratorEvent) {
        for listener in &mut self.listeners {
            listener(&event);
        }
        self.channels.retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl std::fmt::Debug for MapGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapGenerator")
            .field("state", &self.state())
            .field("notes", &self.map.len())
            .field("bpm", &self.bpm)
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}
