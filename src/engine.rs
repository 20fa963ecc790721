// Playback session engine
//
// Composes the eligibility pass, window extraction, downsampling, the
// playback state machine and the sync hub into the single object the host
// talks to. One engine per playback session; `setup_data` swaps the session
// arrays and the eligibility mask together so no tick ever observes a torn
// combination of old arrays against a new mask.

use crate::controller::PlaybackController;
use crate::eligibility::EligibilityEngine;
use crate::error::{PlaybackError, Result};
use crate::sync::{SubscriptionGuard, SyncHub, ViewSink, ViewSubscription};
use crate::types::{
    PlayState, PlaybackStats, SeriesId, StreamFilters, StreamingState, TickUpdate,
};
use crate::window::WindowExtractor;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Construction parameters for a playback session
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub session_id: String,
    pub state: StreamingState,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            session_id: uuid::Uuid::new_v4().to_string(),
            state: StreamingState::default(),
        }
    }
}

/// Time-windowed streaming playback engine for one session
pub struct StreamingEngine {
    session_id: String,
    times: Vec<f64>,
    series: BTreeMap<SeriesId, Vec<f64>>,
    state: StreamingState,
    controller: PlaybackController,
    hub: SyncHub,
    stats: PlaybackStats,
    data_loaded: bool,
}

impl StreamingEngine {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.state.filters.validate()?;
        if !(config.state.window_size > 0.0) {
            return Err(PlaybackError::InvalidConfig(format!(
                "window_size must be positive, got {}",
                config.state.window_size
            )));
        }
        Ok(Self {
            session_id: config.session_id,
            times: Vec::new(),
            series: BTreeMap::new(),
            state: config.state,
            controller: PlaybackController::new(0, Vec::new()),
            hub: SyncHub::new(),
            stats: PlaybackStats::default(),
            data_loaded: false,
        })
    }

    /// Load (or replace) the session arrays and recompute eligibility.
    ///
    /// `times` must be sorted ascending and every series must have exactly
    /// `times.len()` samples; violations are construction errors and leave
    /// the previously loaded data untouched.
    pub fn setup_data(
        &mut self,
        times: Vec<f64>,
        series: BTreeMap<SeriesId, Vec<f64>>,
    ) -> Result<()> {
        for (id, values) in &series {
            if values.len() != times.len() {
                return Err(PlaybackError::MismatchedLength {
                    series: id.clone(),
                    expected: times.len(),
                    actual: values.len(),
                });
            }
        }
        for i in 1..times.len() {
            if times[i] < times[i - 1] {
                return Err(PlaybackError::UnsortedTimes(i));
            }
        }

        let eligible =
            EligibilityEngine::compute_eligible_indices(&self.state.filters, &times, &series);

        log::info!(
            "Session '{}': loaded {} points across {} series, {} eligible",
            self.session_id,
            times.len(),
            series.len(),
            eligible.len()
        );

        // Validation passed; swap arrays and mask together
        self.stats.total_points = times.len();
        self.stats.eligible_count = eligible.len();
        self.stats.total_filter_recomputes += 1;
        self.controller.set_eligible(eligible, times.len());
        self.times = times;
        self.series = series;
        self.data_loaded = true;
        self.state.current_time_index = self.controller.current_time_index();
        Ok(())
    }

    /// Replace the filter configuration and recompute eligibility.
    pub fn set_filters(&mut self, filters: StreamFilters) -> Result<()> {
        filters.validate()?;
        self.state.filters = filters;
        if self.data_loaded {
            let eligible = EligibilityEngine::compute_eligible_indices(
                &self.state.filters,
                &self.times,
                &self.series,
            );
            self.stats.eligible_count = eligible.len();
            self.stats.total_filter_recomputes += 1;
            self.controller.set_eligible(eligible, self.times.len());
            self.state.current_time_index = self.controller.current_time_index();
        }
        Ok(())
    }

    pub fn set_speed(&mut self, speed: f64) {
        self.controller.set_speed(speed);
        self.state.speed = self.controller.speed();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.controller.set_looping(looping);
        self.state.looping = looping;
    }

    pub fn set_window_size(&mut self, window_size: f64) -> Result<()> {
        if !(window_size > 0.0) {
            return Err(PlaybackError::InvalidConfig(format!(
                "window_size must be positive, got {}",
                window_size
            )));
        }
        self.state.window_size = window_size;
        Ok(())
    }

    pub fn play(&mut self) {
        self.controller.play();
        self.state.play_state = self.controller.play_state();
    }

    pub fn pause(&mut self) {
        self.controller.pause();
        self.state.play_state = self.controller.play_state();
    }

    pub fn stop(&mut self) {
        self.controller.stop();
        self.state.play_state = self.controller.play_state();
        self.state.current_time_index = self.controller.current_time_index();
    }

    /// Move the cursor to the first eligible index at or after `time`.
    /// Returns the resulting raw index.
    pub fn seek(&mut self, time: f64) -> Result<usize> {
        self.ensure_loaded("seek")?;
        self.controller.seek(time, &self.times);
        self.state.current_time_index = self.controller.current_time_index();
        Ok(self.state.current_time_index)
    }

    /// Advance one tick and dispatch the resulting window to all
    /// subscribers. Dispatches even when nothing advanced (paused, stopped,
    /// frozen, or the final boundary tick).
    pub fn tick(&mut self) -> Result<TickUpdate> {
        self.ensure_loaded("tick")?;

        let outcome = self.controller.tick();
        self.state.play_state = outcome.play_state;
        self.state.current_time_index = outcome.current_time_index;
        self.stats.total_ticks += 1;

        if outcome.frozen {
            log::debug!(
                "Session '{}': tick with empty eligible set, playback frozen",
                self.session_id
            );
        }

        let update = self.build_update();
        let dispatch = self.hub.notify_subscribers(&update, None);
        self.stats.total_dispatches += dispatch.dispatched as u64;
        self.stats.total_subscriber_faults += dispatch.faults as u64;
        Ok(update)
    }

    /// Push the current frame to the named views (or all views), regardless
    /// of play state. Lets a newly opened view obtain a frame without
    /// waiting for the next tick.
    pub fn sync_views(&mut self, view_ids: Option<&[String]>) -> Result<TickUpdate> {
        self.ensure_loaded("sync_views")?;
        let update = self.build_update();
        let dispatch = self.hub.notify_subscribers(&update, view_ids);
        self.stats.total_dispatches += dispatch.dispatched as u64;
        self.stats.total_subscriber_faults += dispatch.faults as u64;
        Ok(update)
    }

    pub fn subscribe(&self, subscription: ViewSubscription) -> SubscriptionGuard {
        self.hub.subscribe(subscription)
    }

    pub fn subscribe_sink(&self, sink: Arc<dyn ViewSink>) -> SubscriptionGuard {
        self.hub.subscribe_sink(sink)
    }

    pub fn unsubscribe(&self, view_id: &str) -> bool {
        self.hub.unsubscribe(view_id)
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn total_points(&self) -> usize {
        self.times.len()
    }

    pub fn eligible_count(&self) -> usize {
        self.controller.eligible_count()
    }

    pub fn current_state(&self) -> (PlayState, usize) {
        (
            self.controller.play_state(),
            self.controller.current_time_index(),
        )
    }

    pub fn state(&self) -> &StreamingState {
        &self.state
    }

    pub fn filters(&self) -> &StreamFilters {
        &self.state.filters
    }

    pub fn stats(&self) -> PlaybackStats {
        let mut stats = self.stats.clone();
        stats.eligible_count = self.controller.eligible_count();
        stats.total_points = self.times.len();
        stats
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    fn ensure_loaded(&self, operation: &'static str) -> Result<()> {
        if self.data_loaded {
            Ok(())
        } else {
            Err(PlaybackError::DataNotLoaded(operation))
        }
    }

    fn build_update(&self) -> TickUpdate {
        let index = self.controller.current_time_index();
        let window = WindowExtractor::get_window_data(
            &self.times,
            &self.series,
            &self.state.filters,
            index,
            self.state.window_size,
        );
        TickUpdate {
            session_id: self.session_id.clone(),
            current_time_index: index,
            play_state: self.controller.play_state(),
            window_data: window.series,
            eligible_count: self.controller.eligible_count(),
            no_eligible_data: self.controller.eligible_count() == 0,
            timestamp: chrono::Utc::now(),
        }
    }
}
