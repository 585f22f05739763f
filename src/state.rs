use std::path::PathBuf;

use log::{info, warn};

use crate::config::{clamp_sample_rate, PlotConfig};
use crate::data::convert::Converter;
use crate::data::mapping::{partition, validate};
use crate::data::model::{ChannelGroup, ColumnAssignment, ConversionResult};
use crate::engine::{Engine, NumericArray};
use crate::error::{ImportError, Result};

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// Which plot to request from the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlotKind {
    TimeSeries,
    Spectrum,
}

/// Channel chosen for plotting. `channel` is 1-based, as shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSelection {
    pub group: ChannelGroup,
    pub channel: usize,
}

impl Default for ChannelSelection {
    fn default() -> Self {
        Self {
            group: ChannelGroup::Acceleration,
            channel: 1,
        }
    }
}

/// Working state of an import session, independent of any front end.
pub struct Session {
    /// Latest successful conversion (None until the first one).
    pub current: Option<ConversionResult>,

    /// Converted files, oldest first.
    pub files: Vec<PathBuf>,

    pub selection: ChannelSelection,

    /// Sample rate in Hz used for plots.
    pub sample_rate: f64,

    pub plot: PlotConfig,

    /// Status / error message for display.
    pub status_message: Option<String>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new(PlotConfig::default())
    }
}

impl Session {
    pub fn new(plot: PlotConfig) -> Self {
        Self {
            current: None,
            files: Vec::new(),
            selection: ChannelSelection::default(),
            sample_rate: clamp_sample_rate(plot.sample_rate),
            plot,
            status_message: None,
        }
    }

    /// Ingest a finished conversion. Replaces the previous one.
    pub fn set_result(&mut self, result: ConversionResult) {
        let name = result
            .output
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if !self.files.contains(&result.output) {
            self.files.push(result.output.clone());
        }
        self.current = Some(result);
        let ChannelSelection { group, channel } = self.selection;
        self.select_channel(group, channel);
        self.status_message = Some(format!("Imported {name}"));
    }

    pub fn assignment(&self) -> Option<&ColumnAssignment> {
        self.current.as_ref().map(|r| &r.assignment)
    }

    /// Drop the current column assignment; the table stays loaded.
    pub fn clear_mapping(&mut self) {
        if let Some(result) = &mut self.current {
            result.assignment.clear();
        }
        self.selection.channel = 1;
        self.status_message = Some("Mapping cleared".to_string());
    }

    /// Replace the assignment of the current table. Takes effect on [`save`](Self::save).
    pub fn set_assignment(&mut self, assignment: ColumnAssignment) -> Result<()> {
        let Some(result) = &mut self.current else {
            warn!("no file loaded; mapping ignored");
            self.status_message = Some("Nothing to map".to_string());
            return Ok(());
        };
        validate(&assignment, result.table.cols())?;
        result.assignment = assignment;
        let ChannelSelection { group, channel } = self.selection;
        self.select_channel(group, channel);
        Ok(())
    }

    /// Number of columns assigned to `group`.
    pub fn channel_count(&self, group: ChannelGroup) -> usize {
        self.assignment().map_or(0, |a| a.indices(group).len())
    }

    /// Select a channel, clamped to `1..=channel_count(group)`.
    pub fn select_channel(&mut self, group: ChannelGroup, channel: usize) {
        let count = self.channel_count(group);
        let channel = if channel == 0 || channel > count { 1 } else { channel };
        self.selection = ChannelSelection { group, channel };
    }

    pub fn set_sample_rate(&mut self, rate: f64) {
        self.sample_rate = clamp_sample_rate(rate);
    }

    /// The source column behind the current selection.
    pub fn selected_data(&self) -> Option<Vec<f64>> {
        let result = self.current.as_ref()?;
        let ChannelSelection { group, channel } = self.selection;
        let column = *result.assignment.indices(group).get(channel.checked_sub(1)?)?;
        result.table.column(column)
    }

    /// Ask the engine to plot the selected channel.
    pub fn plot(&mut self, engine: &dyn Engine, kind: PlotKind) -> Result<()> {
        if !engine.is_ready() {
            return Err(ImportError::EngineUnavailable { operation: "plot" });
        }
        let ChannelSelection { group, channel } = self.selection;
        let values = self
            .selected_data()
            .ok_or(ImportError::NothingSelected { group, channel })?;

        match render(engine, kind, &values, self.sample_rate, &self.plot) {
            Ok(()) => {
                info!("plotted {group} channel {channel}");
                self.status_message = Some(format!("Plotted {}", plot_title(&self.plot, kind)));
                Ok(())
            }
            Err(e) => {
                warn!("plot failed: {e}");
                self.status_message = Some(format!("Plot failed: {e}"));
                Err(e)
            }
        }
    }

    pub fn close_plots(&mut self, engine: &dyn Engine) -> Result<()> {
        if !engine.is_ready() {
            return Err(ImportError::EngineUnavailable {
                operation: "close plots",
            });
        }
        engine
            .close_all_rendered_views()
            .map_err(|source| ImportError::RenderFailure {
                title: "all views".to_string(),
                source,
            })
    }

    /// Re-apply the current assignment and re-write the output file.
    pub fn save(&mut self, converter: &Converter) -> Result<()> {
        let Some(result) = &mut self.current else {
            self.status_message = Some("Nothing to save".to_string());
            return Ok(());
        };
        let saved = partition(&result.table, &result.assignment)
            .map_err(ImportError::from)
            .and_then(|record| {
                converter.persist(&result.output, &record)?;
                Ok(record)
            });
        match saved {
            Ok(record) => {
                result.record = record;
                self.status_message = Some(format!("Saved {}", result.output.display()));
                Ok(())
            }
            Err(e) => {
                self.status_message = Some(format!("Save failed: {e}"));
                Err(e)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Rendering
// ---------------------------------------------------------------------------

/// Title configured for `kind`.
pub fn plot_title(plot: &PlotConfig, kind: PlotKind) -> &str {
    match kind {
        PlotKind::TimeSeries => &plot.time_title,
        PlotKind::Spectrum => &plot.spectrum_title,
    }
}

/// Send one channel to the engine for plotting.
///
/// Requires a ready engine (`EngineUnavailable` otherwise); an engine that
/// rejects the request yields `RenderFailure`.
pub fn render(
    engine: &dyn Engine,
    kind: PlotKind,
    values: &[f64],
    sample_rate: f64,
    plot: &PlotConfig,
) -> Result<()> {
    if !engine.is_ready() {
        return Err(ImportError::EngineUnavailable { operation: "plot" });
    }
    let title = plot_title(plot, kind);
    let values = NumericArray::from_vector(values);
    let rendered = match kind {
        PlotKind::TimeSeries => engine.render_time_series(&values, sample_rate, title),
        PlotKind::Spectrum => engine.render_spectrum(&values, sample_rate, title),
    };
    rendered.map_err(|source| ImportError::RenderFailure {
        title: title.to_string(),
        source,
    })
}
