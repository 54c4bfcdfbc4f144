//! Multi-phase progress bar built from a fixed pool of trackers per phase
//!
//! Every phase owns `multi_num` pre-created trackers sitting in a bounded
//! channel. [`ProgressBar::create_tracker`] takes one out (waiting while the
//! phase is saturated) and [`ProgressBar::mark_as_done`] puts it back, so the
//! number of trackers in flight for a phase can never exceed its width.
//! Completions of the last phase feed the pinned summary lines rendered above
//! the trackers.

use crate::config::ProgressConfig;
use crate::error::{Result, UtilkitError};
use indicatif::{MultiProgress, ProgressBarIter, ProgressDrawTarget, ProgressStyle};
use std::io;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{mpsc as std_mpsc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

static NEXT_BAR_ID: AtomicU64 = AtomicU64::new(1);

/// Index of a phase, in the order the phases were declared
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Phase(pub usize);

impl From<usize> for Phase {
    fn from(index: usize) -> Self {
        Phase(index)
    }
}

/// What a tracker's counter measures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Units {
    #[default]
    Count,
    Bytes,
}

/// Declaration of one phase
#[derive(Debug, Clone)]
pub struct PhaseParam {
    pub name: String,
    /// Number of trackers that may run in parallel within this phase
    pub multi_num: usize,
    pub units: Units,
}

impl PhaseParam {
    pub fn new(name: impl Into<String>, multi_num: usize, units: Units) -> Self {
        Self {
            name: name.into(),
            multi_num,
            units,
        }
    }
}

/// Point-in-time view of the terminal phase tally
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressSummary {
    pub total: u64,
    pub completed: u64,
    pub percent: f64,
    pub elapsed: Duration,
}

impl ProgressSummary {
    fn new(total: u64, completed: u64, elapsed: Duration) -> Self {
        Self {
            total,
            completed,
            percent: percent_of(completed, total),
            elapsed,
        }
    }

    /// Percentage with one decimal, right-aligned to four columns
    pub fn percent_display(&self) -> String {
        format!("{:4.1}%", self.percent)
    }

    /// The four pinned lines shown above the trackers
    pub fn lines(&self) -> [String; 4] {
        [
            format!(">> Total   : {}", self.total),
            format!(">> Handled : {}", self.completed),
            format!(">> Percent : {}", self.percent_display()),
            format!(">> Duration: {:.2?}", self.elapsed),
        ]
    }
}

/// A zero total has nothing to be a percentage of; report 0 instead of NaN/inf.
pub fn percent_of(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    completed as f64 / total as f64 * 100.0
}

#[derive(Debug)]
struct PhaseSlots {
    name: String,
    multi_num: usize,
    release: mpsc::Sender<indicatif::ProgressBar>,
    available: tokio::sync::Mutex<mpsc::Receiver<indicatif::ProgressBar>>,
}

#[derive(Debug)]
struct RenderLoop {
    stop: std_mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// Exclusive handle on one tracker of a phase
///
/// Writing bytes into a tracker advances its counter by the number of bytes
/// written, so it can sit at the end of [`std::io::copy`] or be wrapped
/// around another writer with [`Tracker::wrap_write`].
///
/// Hand it back with [`ProgressBar::mark_as_done`]. A tracker that is simply
/// dropped still returns to its phase, but the completion is not counted.
#[derive(Debug)]
pub struct Tracker {
    bar: indicatif::ProgressBar,
    phase: Phase,
    owner: u64,
    done: bool,
    home: mpsc::Sender<indicatif::ProgressBar>,
}

impl Tracker {
    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn increment(&self, delta: u64) {
        self.bar.inc(delta);
    }

    pub fn set_position(&self, position: u64) {
        self.bar.set_position(position);
    }

    pub fn set_message(&self, message: impl Into<String>) {
        self.bar.set_message(message.into());
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> u64 {
        self.bar.length().unwrap_or(0)
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }

    /// Counts every byte written through `writer`
    pub fn wrap_write<W: io::Write>(&self, writer: W) -> ProgressBarIter<W> {
        self.bar.wrap_write(writer)
    }

    /// Counts every byte read through `reader`
    pub fn wrap_read<R: io::Read>(&self, reader: R) -> ProgressBarIter<R> {
        self.bar.wrap_read(reader)
    }
}

impl io::Write for Tracker {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bar.inc(buf.len() as u64);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for Tracker {
    fn drop(&mut self) {
        if !self.done {
            warn!(phase = self.phase.0, "tracker released without mark_as_done");
        }
        // Capacity equals the number of trackers ever created for the phase,
        // so this only fails once the owning progress bar is gone.
        let _ = self.home.try_send(self.bar.clone());
    }
}

/// Multi-phase progress display with a bounded tracker pool per phase
#[derive(Debug)]
pub struct ProgressBar {
    id: u64,
    total: u64,
    completed: AtomicU64,
    started: Instant,
    terminal: Phase,
    phases: Vec<PhaseSlots>,
    multi: MultiProgress,
    pinned: Vec<indicatif::ProgressBar>,
    render: Mutex<Option<RenderLoop>>,
}

impl ProgressBar {
    /// Create a progress bar drawing to stderr with default options
    pub fn new(total: u64, phases: Vec<PhaseParam>) -> Result<Self> {
        Self::with_config(total, phases, &ProgressConfig::default())
    }

    /// Create a progress bar and start its render loop
    ///
    /// All trackers of all phases are created here; nothing is allocated
    /// afterwards. The last phase is the terminal phase whose completions
    /// drive the summary.
    pub fn with_config(total: u64, phases: Vec<PhaseParam>, config: &ProgressConfig) -> Result<Self> {
        if phases.is_empty() {
            return Err(UtilkitError::InvalidInput {
                message: "progress bar needs at least one phase".to_string(),
            });
        }
        if let Some(param) = phases.iter().find(|p| p.multi_num == 0) {
            return Err(UtilkitError::InvalidInput {
                message: format!("phase '{}' must allow at least one tracker", param.name),
            });
        }

        let target = if config.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let multi = MultiProgress::with_draw_target(target);

        let pinned_style = ProgressStyle::with_template("{msg}")?;
        let pinned: Vec<_> = (0..4)
            .map(|_| {
                let bar = multi.add(indicatif::ProgressBar::new(0));
                bar.set_style(pinned_style.clone());
                bar
            })
            .collect();

        let count_style = tracker_style(Units::Count, config)?;
        let bytes_style = tracker_style(Units::Bytes, config)?;

        let mut slots = Vec::with_capacity(phases.len());
        let mut rendered = pinned.clone();
        for param in phases {
            let (release, available) = mpsc::channel(param.multi_num);
            let style = match param.units {
                Units::Count => &count_style,
                Units::Bytes => &bytes_style,
            };

            for _ in 0..param.multi_num {
                let bar = multi.add(indicatif::ProgressBar::new(0));
                bar.set_style(style.clone());
                bar.set_message(format!("{} Readying", param.name));
                rendered.push(bar.clone());
                release
                    .try_send(bar)
                    .map_err(|_| UtilkitError::PoolClosed { phase: slots.len() })?;
            }

            slots.push(PhaseSlots {
                name: param.name,
                multi_num: param.multi_num,
                release,
                available: tokio::sync::Mutex::new(available),
            });
        }

        let render = spawn_render_loop(rendered, config.refresh_interval())?;

        let progress = Self {
            id: NEXT_BAR_ID.fetch_add(1, Ordering::Relaxed),
            total,
            completed: AtomicU64::new(0),
            started: Instant::now(),
            terminal: Phase(slots.len() - 1),
            phases: slots,
            multi,
            pinned,
            render: Mutex::new(Some(render)),
        };
        progress.publish_summary();

        info!(
            total,
            phases = progress.phases.len(),
            trackers = progress.phases.iter().map(|p| p.multi_num).sum::<usize>(),
            "progress bar started"
        );
        Ok(progress)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn phase_count(&self) -> usize {
        self.phases.len()
    }

    /// The phase whose completions are counted in the summary
    pub fn terminal_phase(&self) -> Phase {
        self.terminal
    }

    pub fn phase_name(&self, phase: impl Into<Phase>) -> Result<&str> {
        Ok(&self.slots(phase.into())?.name)
    }

    /// Number of idle trackers in a phase
    pub fn available(&self, phase: impl Into<Phase>) -> Result<usize> {
        let slots = self.slots(phase.into())?;
        Ok(slots.release.max_capacity() - slots.release.capacity())
    }

    /// Take a tracker from `phase`, waiting until one is free
    ///
    /// Cancelling the returned future never loses a tracker.
    pub async fn create_tracker(&self, phase: impl Into<Phase>, message: &str, total: u64) -> Result<Tracker> {
        let phase = phase.into();
        let slots = self.slots(phase)?;
        let bar = {
            let mut available = slots.available.lock().await;
            available.recv().await
        };
        let bar = bar.ok_or(UtilkitError::PoolClosed { phase: phase.0 })?;
        Ok(self.hand_out(phase, bar, message, total))
    }

    /// Blocking flavour of [`ProgressBar::create_tracker`] for plain threads
    ///
    /// # Panics
    ///
    /// Panics when called from within an asynchronous execution context.
    pub fn create_tracker_blocking(&self, phase: impl Into<Phase>, message: &str, total: u64) -> Result<Tracker> {
        let phase = phase.into();
        let slots = self.slots(phase)?;
        let bar = slots.available.blocking_lock().blocking_recv();
        let bar = bar.ok_or(UtilkitError::PoolClosed { phase: phase.0 })?;
        Ok(self.hand_out(phase, bar, message, total))
    }

    /// Take a tracker only if one is idle right now
    ///
    /// Callers already queued in [`ProgressBar::create_tracker`] take
    /// precedence: while one of them is waiting on the phase this returns
    /// `Ok(None)`, even if a tracker was released a moment ago and has not
    /// been picked up yet.
    pub fn try_create_tracker(&self, phase: impl Into<Phase>, message: &str, total: u64) -> Result<Option<Tracker>> {
        let phase = phase.into();
        let slots = self.slots(phase)?;
        let Ok(mut available) = slots.available.try_lock() else {
            // someone is already waiting on this phase
            return Ok(None);
        };
        match available.try_recv() {
            Ok(bar) => Ok(Some(self.hand_out(phase, bar, message, total))),
            Err(mpsc::error::TryRecvError::Empty) => Ok(None),
            Err(mpsc::error::TryRecvError::Disconnected) => Err(UtilkitError::PoolClosed { phase: phase.0 }),
        }
    }

    /// Finish a tracker and hand it back to its phase
    ///
    /// Completing a tracker of the terminal phase bumps the completed tally
    /// and republishes the summary lines.
    pub fn mark_as_done(&self, mut tracker: Tracker) -> Result<()> {
        if tracker.owner != self.id {
            return Err(UtilkitError::ForeignTracker);
        }
        let slots = self.slots(tracker.phase)?;

        tracker.bar.finish();
        tracker.bar.reset();
        tracker.bar.set_message(format!("{} Done", slots.name));
        tracker.bar.set_length(0);

        if tracker.phase == self.terminal {
            self.completed.fetch_add(1, Ordering::SeqCst);
            self.publish_summary();
        }

        debug!(phase = tracker.phase.0, "tracker returned");
        tracker.done = true;
        Ok(())
    }

    /// Completed count of the terminal phase, with percentage and elapsed time
    pub fn summary(&self) -> ProgressSummary {
        ProgressSummary::new(
            self.total,
            self.completed.load(Ordering::SeqCst),
            self.started.elapsed(),
        )
    }

    /// The summary lines as last published
    pub fn pinned_messages(&self) -> Vec<String> {
        self.pinned.iter().map(|bar| bar.message()).collect()
    }

    /// Print a line above the bars without tearing the display
    pub fn println(&self, line: impl AsRef<str>) -> Result<()> {
        self.multi.println(line)?;
        Ok(())
    }

    /// Stop the render loop after drawing a final frame
    ///
    /// Trackers remain usable; the display simply stops refreshing.
    pub fn stop(&self) {
        let render = self
            .render
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(render) = render {
            // concurrent releases may have published out of order
            self.publish_summary();
            drop(render.stop);
            if render.handle.join().is_err() {
                warn!("progress render loop panicked");
            }
            info!(summary = ?self.summary(), "progress bar stopped");
        }
    }

    fn slots(&self, phase: Phase) -> Result<&PhaseSlots> {
        self.phases.get(phase.0).ok_or(UtilkitError::UnknownPhase {
            phase: phase.0,
            phases: self.phases.len(),
        })
    }

    fn hand_out(&self, phase: Phase, bar: indicatif::ProgressBar, message: &str, total: u64) -> Tracker {
        let slots = &self.phases[phase.0];
        bar.reset();
        bar.set_length(total);
        bar.set_message(format!("{} {}", slots.name, message));
        debug!(phase = phase.0, total, "tracker acquired");

        Tracker {
            bar,
            phase,
            owner: self.id,
            done: false,
            home: slots.release.clone(),
        }
    }

    fn publish_summary(&self) {
        let summary = self.summary();
        for (bar, line) in self.pinned.iter().zip(summary.lines()) {
            bar.set_message(line);
        }
    }
}

impl Drop for ProgressBar {
    fn drop(&mut self) {
        self.stop();
    }
}

fn tracker_style(units: Units, config: &ProgressConfig) -> Result<ProgressStyle> {
    let counter = match units {
        Units::Count => "{pos}/{len} ({per_sec})",
        Units::Bytes => "{bytes}/{total_bytes} ({bytes_per_sec})",
    };
    let template = format!(
        "{{msg:{msg_width}.white}} [{{bar:{bar_width}.cyan/blue}}] {{percent:>3}}% {counter} [{{elapsed}}] eta {{eta}}",
        msg_width = config.message_width,
        bar_width = config.bar_width,
    );
    Ok(ProgressStyle::with_template(&template)?.progress_chars("=> "))
}

fn spawn_render_loop(bars: Vec<indicatif::ProgressBar>, interval: Duration) -> Result<RenderLoop> {
    let (stop, stopped) = std_mpsc::channel::<()>();
    let handle = thread::Builder::new()
        .name("progress-render".to_string())
        .spawn(move || loop {
            match stopped.recv_timeout(interval) {
                Err(std_mpsc::RecvTimeoutError::Timeout) => {
                    for bar in &bars {
                        bar.tick();
                    }
                }
                _ => {
                    for bar in &bars {
                        bar.tick();
                    }
                    break;
                }
            }
        })?;
    Ok(RenderLoop { stop, handle })
}
