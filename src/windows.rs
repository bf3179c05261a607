use crate::units::{MS, S, US};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Upper edge of the prompt window.
pub const PROMPT_END: f64 = 10.0 * US;
/// Upper edge of the delayed window.
pub const DELAYED_END: f64 = 1.0 * MS;
/// Upper edge of the long-delayed window.
pub const DELAYED_LONG_END: f64 = 1.0 * S;

/// Default significance threshold for germanium multiplicities (10 keV in eV).
pub const DEFAULT_GE_THRESHOLD_EV: f64 = 1.0e4;

/// Disjoint time windows relative to the start of the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeWindow {
    Prompt,
    Delayed,
    DelayedLong,
    AfterDelayed,
}

impl TimeWindow {
    pub const ALL: [TimeWindow; 4] = [
        TimeWindow::Prompt,
        TimeWindow::Delayed,
        TimeWindow::DelayedLong,
        TimeWindow::AfterDelayed,
    ];

    /// Picks the window for a global time in engine units.
    pub fn classify(global_time: f64) -> Self {
        if global_time < PROMPT_END {
            TimeWindow::Prompt
        } else if global_time < DELAYED_END {
            TimeWindow::Delayed
        } else if global_time < DELAYED_LONG_END {
            TimeWindow::DelayedLong
        } else {
            TimeWindow::AfterDelayed
        }
    }

    pub fn index(self) -> usize {
        match self {
            TimeWindow::Prompt => 0,
            TimeWindow::Delayed => 1,
            TimeWindow::DelayedLong => 2,
            TimeWindow::AfterDelayed => 3,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TimeWindow::Prompt => "prompt",
            TimeWindow::Delayed => "delayed",
            TimeWindow::DelayedLong => "delayed_long",
            TimeWindow::AfterDelayed => "after_delayed",
        }
    }
}

/// Accumulated energy keyed by detector-element ID.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectorEnergyMap {
    entries: BTreeMap<i32, f64>,
}

impl DetectorEnergyMap {
    pub fn add(&mut self, element_id: i32, energy: f64) {
        *self.entries.entry(element_id).or_insert(0.0) += energy;
    }

    pub fn get(&self, element_id: i32) -> Option<f64> {
        self.entries.get(&element_id).copied()
    }

    pub fn total(&self) -> f64 {
        self.entries.values().sum()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Entries in ascending element-ID order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.entries.iter().map(|(id, energy)| (*id, *energy))
    }
}

/// Per-window significance thresholds in eV. An entry is emitted when its
/// energy strictly exceeds the threshold of its window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowThresholds {
    pub prompt: f64,
    pub delayed: f64,
    pub delayed_long: f64,
    pub after_delayed: f64,
}

impl WindowThresholds {
    /// Same threshold in every window.
    pub const fn uniform(threshold: f64) -> Self {
        Self {
            prompt: threshold,
            delayed: threshold,
            delayed_long: threshold,
            after_delayed: threshold,
        }
    }

    /// Emits every entry.
    pub const fn unfiltered() -> Self {
        Self::uniform(0.0)
    }

    pub fn for_window(&self, window: TimeWindow) -> f64 {
        match window {
            TimeWindow::Prompt => self.prompt,
            TimeWindow::Delayed => self.delayed,
            TimeWindow::DelayedLong => self.delayed_long,
            TimeWindow::AfterDelayed => self.after_delayed,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = f64> + '_ {
        TimeWindow::ALL.into_iter().map(|window| self.for_window(window))
    }
}

impl Default for WindowThresholds {
    fn default() -> Self {
        Self::uniform(DEFAULT_GE_THRESHOLD_EV)
    }
}

/// Output of reducing one window map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WindowColumns {
    /// Detectors above threshold, per reentrance tube.
    pub multiplicity: Vec<u32>,
    pub detector: Vec<i32>,
    pub edep: Vec<f64>,
    /// Sum of emitted energies per reentrance tube.
    pub energy_per_tube: Vec<f64>,
}

impl WindowColumns {
    /// Empties the pair vectors and seeds the per-tube vectors with zeros.
    pub fn reset(&mut self, tube_count: usize) {
        self.multiplicity.clear();
        self.multiplicity.resize(tube_count, 0);
        self.energy_per_tube.clear();
        self.energy_per_tube.resize(tube_count, 0.0);
        self.detector.clear();
        self.edep.clear();
    }

    fn record(&mut self, tube: usize, element_id: i32, energy: f64) {
        if tube >= self.multiplicity.len() {
            self.multiplicity.resize(tube + 1, 0);
            self.energy_per_tube.resize(tube + 1, 0.0);
        }
        self.multiplicity[tube] += 1;
        self.energy_per_tube[tube] += energy;
        self.detector.push(element_id);
        self.edep.push(energy);
    }
}

/// Output of reducing all four windows of one energy class.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EnergyClassColumns {
    pub prompt: WindowColumns,
    pub delayed: WindowColumns,
    pub delayed_long: WindowColumns,
    pub after_delayed: WindowColumns,
}

impl EnergyClassColumns {
    pub fn reset(&mut self, tube_count: usize) {
        for window in TimeWindow::ALL {
            self.window_mut(window).reset(tube_count);
        }
    }

    pub fn window(&self, window: TimeWindow) -> &WindowColumns {
        match window {
            TimeWindow::Prompt => &self.prompt,
            TimeWindow::Delayed => &self.delayed,
            TimeWindow::DelayedLong => &self.delayed_long,
            TimeWindow::AfterDelayed => &self.after_delayed,
        }
    }

    pub fn window_mut(&mut self, window: TimeWindow) -> &mut WindowColumns {
        match window {
            TimeWindow::Prompt => &mut self.prompt,
            TimeWindow::Delayed => &mut self.delayed,
            TimeWindow::DelayedLong => &mut self.delayed_long,
            TimeWindow::AfterDelayed => &mut self.after_delayed,
        }
    }
}

/// Four window maps for one energy class.
///
/// Reduction thresholds only filter the output vectors; the accumulated
/// totals are never modified.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WindowAccumulator {
    maps: [DetectorEnergyMap; 4],
}

impl WindowAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `energy` (eV) to the element entry of the window selected by `global_time`.
    pub fn add(&mut self, element_id: i32, energy: f64, global_time: f64) -> TimeWindow {
        let window = TimeWindow::classify(global_time);
        self.add_to(window, element_id, energy);
        window
    }

    pub fn add_to(&mut self, window: TimeWindow, element_id: i32, energy: f64) {
        self.maps[window.index()].add(element_id, energy);
    }

    pub fn map(&self, window: TimeWindow) -> &DetectorEnergyMap {
        &self.maps[window.index()]
    }

    /// Sum over all windows and elements.
    pub fn grand_total(&self) -> f64 {
        self.maps.iter().map(DetectorEnergyMap::total).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.maps.iter().all(DetectorEnergyMap::is_empty)
    }

    pub fn clear(&mut self) {
        for map in &mut self.maps {
            map.clear();
        }
    }

    /// Writes multiplicities and (element, energy) pairs for entries above
    /// threshold into `out`. `tube_of` maps an element ID to its tube.
    pub fn reduce<F>(&self, thresholds: &WindowThresholds, tube_of: F, out: &mut EnergyClassColumns)
    where
        F: Fn(i32) -> usize,
    {
        for window in TimeWindow::ALL {
            let threshold = thresholds.for_window(window);
            let columns = out.window_mut(window);
            for (element_id, energy) in self.map(window).iter() {
                if energy <= threshold {
                    continue;
                }
                columns.record(tube_of(element_id), element_id, energy);
            }
        }
    }
}

/// Region energy totals per tube and window (liquid argon bookkeeping).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TubeEnergyColumns {
    pub prompt: Vec<f64>,
    pub delayed: Vec<f64>,
    pub delayed_long: Vec<f64>,
    pub after_delayed: Vec<f64>,
}

impl TubeEnergyColumns {
    pub fn reset(&mut self, tube_count: usize) {
        for window in TimeWindow::ALL {
            let column = self.window_mut(window);
            column.clear();
            column.resize(tube_count, 0.0);
        }
    }

    pub fn add(&mut self, window: TimeWindow, tube: usize, energy: f64) {
        let column = self.window_mut(window);
        if tube >= column.len() {
            column.resize(tube + 1, 0.0);
        }
        column[tube] += energy;
    }

    pub fn window(&self, window: TimeWindow) -> &[f64] {
        match window {
            TimeWindow::Prompt => &self.prompt,
            TimeWindow::Delayed => &self.delayed,
            TimeWindow::DelayedLong => &self.delayed_long,
            TimeWindow::AfterDelayed => &self.after_delayed,
        }
    }

    fn window_mut(&mut self, window: TimeWindow) -> &mut Vec<f64> {
        match window {
            TimeWindow::Prompt => &mut self.prompt,
            TimeWindow::Delayed => &mut self.delayed,
            TimeWindow::DelayedLong => &mut self.delayed_long,
            TimeWindow::AfterDelayed => &mut self.after_delayed,
        }
    }
}
