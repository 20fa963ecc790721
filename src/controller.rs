// Playback state machine
//
// Owns the cursor and the eligible index list. The cursor advances through
// eligible positions only; raw indices filtered out by the eligibility pass
// are skipped without rescanning. Wall-clock pacing is not handled here: an
// external timer drives `tick()` and the controller is purely reactive.

use crate::types::PlayState;

/// Result of one `tick()` call, dispatched to subscribers whether or not the
/// cursor moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickOutcome {
    /// Raw index into the time axis after this tick
    pub current_time_index: usize,
    pub play_state: PlayState,
    /// Cursor moved at least one eligible position
    pub advanced: bool,
    /// Cursor wrapped to the first eligible index (loop mode)
    pub wrapped: bool,
    /// The eligible set is empty; playback is frozen at the last cursor
    pub frozen: bool,
}

#[derive(Debug)]
pub struct PlaybackController {
    play_state: PlayState,
    /// Sorted raw indices playback may visit
    eligible: Vec<usize>,
    /// Cursor position within `eligible`
    position: usize,
    /// Last known raw index; survives an eligible set going empty
    cursor_raw: usize,
    total_points: usize,
    speed: f64,
    looping: bool,
}

impl PlaybackController {
    pub fn new(total_points: usize, eligible: Vec<usize>) -> Self {
        let mut controller = Self {
            play_state: PlayState::Stopped,
            eligible,
            position: 0,
            cursor_raw: 0,
            total_points,
            speed: 1.0,
            looping: false,
        };
        controller.sync_cursor();
        controller
    }

    /// Replace the eligible set after a filter or data change, keeping the
    /// cursor as close as possible to its previous raw index.
    pub fn set_eligible(&mut self, eligible: Vec<usize>, total_points: usize) {
        self.total_points = total_points;
        self.eligible = eligible;
        if self.eligible.is_empty() {
            self.position = 0;
            self.cursor_raw = self.cursor_raw.min(total_points.saturating_sub(1));
            log::warn!("Eligible set is empty; playback frozen at index {}", self.cursor_raw);
            return;
        }
        let pos = self.eligible.partition_point(|&i| i < self.cursor_raw);
        self.position = pos.min(self.eligible.len() - 1);
        self.sync_cursor();
    }

    pub fn play(&mut self) {
        if self.play_state != PlayState::Playing {
            log::debug!("Playback started at index {}", self.cursor_raw);
            self.play_state = PlayState::Playing;
        }
    }

    pub fn pause(&mut self) {
        if self.play_state == PlayState::Playing {
            self.play_state = PlayState::Paused;
        }
    }

    /// Stop and rewind to the first eligible position.
    pub fn stop(&mut self) {
        self.play_state = PlayState::Stopped;
        self.position = 0;
        self.cursor_raw = 0;
        self.sync_cursor();
    }

    /// Move the cursor to the first eligible index at or after `time`, or to
    /// the last eligible index if none qualifies. Does not change play state.
    pub fn seek(&mut self, time: f64, times: &[f64]) {
        if self.eligible.is_empty() {
            return;
        }
        let pos = self.eligible.partition_point(|&i| times[i] < time);
        self.position = pos.min(self.eligible.len() - 1);
        self.sync_cursor();
    }

    /// Advance the cursor by `round(speed)` eligible positions when playing.
    ///
    /// Past the last eligible position the cursor either wraps to the first
    /// (loop mode) or clamps there and the machine transitions to Stopped.
    /// The outcome is dispatched in every case, including the final tick at
    /// the boundary before Stopped becomes externally observable.
    pub fn tick(&mut self) -> TickOutcome {
        if self.eligible.is_empty() {
            return TickOutcome {
                current_time_index: self.cursor_raw,
                play_state: self.play_state,
                advanced: false,
                wrapped: false,
                frozen: true,
            };
        }

        let mut advanced = false;
        let mut wrapped = false;

        if self.play_state == PlayState::Playing {
            let step = self.speed.round().max(0.0) as usize;
            let last = self.eligible.len() - 1;
            if step > 0 {
                if self.position + step > last {
                    if self.looping {
                        self.position = 0;
                        wrapped = true;
                        advanced = true;
                    } else {
                        self.position = last;
                        self.play_state = PlayState::Stopped;
                        log::debug!("Playback reached the last eligible index, stopping");
                    }
                } else {
                    self.position += step;
                    advanced = true;
                }
                self.sync_cursor();
            }
        }

        TickOutcome {
            current_time_index: self.cursor_raw,
            play_state: self.play_state,
            advanced,
            wrapped,
            frozen: false,
        }
    }

    pub fn set_speed(&mut self, speed: f64) {
        if speed < 0.0 {
            log::warn!("Negative speed {} clamped to 0; reverse playback is a host concern", speed);
            self.speed = 0.0;
        } else {
            self.speed = speed;
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn play_state(&self) -> PlayState {
        self.play_state
    }

    pub fn current_time_index(&self) -> usize {
        self.cursor_raw.min(self.total_points.saturating_sub(1))
    }

    pub fn eligible_count(&self) -> usize {
        self.eligible.len()
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    fn sync_cursor(&mut self) {
        if let Some(&raw) = self.eligible.get(self.position) {
            self.cursor_raw = raw;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
        let step = (end - start) / (n - 1) as f64;
        (0..n).map(|i| start + i as f64 * step).collect()
    }

    fn full(n: usize) -> Vec<usize> {
        (0..n).collect()
    }

    #[test]
    fn test_initial_state_is_stopped_at_zero() {
        let c = PlaybackController::new(10, full(10));
        assert_eq!(c.play_state(), PlayState::Stopped);
        assert_eq!(c.current_time_index(), 0);
    }

    #[test]
    fn test_transitions() {
        let mut c = PlaybackController::new(10, full(10));
        c.pause(); // no-op from Stopped
        assert_eq!(c.play_state(), PlayState::Stopped);
        c.play();
        assert_eq!(c.play_state(), PlayState::Playing);
        c.pause();
        assert_eq!(c.play_state(), PlayState::Paused);
        c.play();
        assert_eq!(c.play_state(), PlayState::Playing);
        c.stop();
        assert_eq!(c.play_state(), PlayState::Stopped);
        assert_eq!(c.current_time_index(), 0);
    }

    #[test]
    fn test_tick_advances_only_while_playing() {
        let mut c = PlaybackController::new(10, full(10));
        let out = c.tick();
        assert!(!out.advanced);
        assert_eq!(out.current_time_index, 0);

        c.play();
        let out = c.tick();
        assert!(out.advanced);
        assert_eq!(out.current_time_index, 1);

        c.pause();
        let out = c.tick();
        assert!(!out.advanced);
        assert_eq!(out.current_time_index, 1);
    }

    #[test]
    fn test_advancement_skips_ineligible_indices() {
        // Only even raw indices eligible
        let eligible: Vec<usize> = (0..10).map(|i| i * 2).collect();
        let mut c = PlaybackController::new(20, eligible);
        c.play();
        assert_eq!(c.tick().current_time_index, 2);
        assert_eq!(c.tick().current_time_index, 4);
    }

    #[test]
    fn test_speed_rounds_to_positions() {
        let mut c = PlaybackController::new(100, full(100));
        c.set_speed(2.6);
        c.play();
        assert_eq!(c.tick().current_time_index, 3);
        c.set_speed(0.4); // rounds to 0: dispatch without advancing
        let out = c.tick();
        assert!(!out.advanced);
        assert_eq!(out.current_time_index, 3);
    }

    #[test]
    fn test_loop_wraps_to_first_eligible() {
        let eligible = vec![5, 6, 7];
        let mut c = PlaybackController::new(10, eligible);
        c.set_looping(true);
        c.play();
        c.tick(); // 6
        c.tick(); // 7
        let out = c.tick();
        assert!(out.wrapped);
        assert_eq!(out.current_time_index, 5);
        assert_eq!(out.play_state, PlayState::Playing);
    }

    #[test]
    fn test_no_loop_clamps_and_stops() {
        let eligible = vec![5, 6, 7];
        let mut c = PlaybackController::new(10, eligible);
        c.play();
        c.tick(); // 6
        c.tick(); // 7
        let out = c.tick();
        assert!(!out.wrapped);
        assert_eq!(out.current_time_index, 7);
        assert_eq!(out.play_state, PlayState::Stopped);
    }

    #[test]
    fn test_seek_finds_first_eligible_at_or_after_time() {
        let times = linspace(0.0, 99.0, 100);
        let eligible: Vec<usize> = (20..=80).collect();
        let mut c = PlaybackController::new(100, eligible);

        c.seek(42.5, &times);
        assert_eq!(c.current_time_index(), 43);

        // Before the eligible range: first eligible
        c.seek(1.0, &times);
        assert_eq!(c.current_time_index(), 20);

        // Past the eligible range: last eligible
        c.seek(95.0, &times);
        assert_eq!(c.current_time_index(), 80);

        // Seek leaves play state alone
        assert_eq!(c.play_state(), PlayState::Stopped);
    }

    #[test]
    fn test_empty_eligible_set_freezes_ticks() {
        let mut c = PlaybackController::new(10, full(10));
        c.play();
        c.tick();
        c.tick();
        assert_eq!(c.current_time_index(), 2);

        c.set_eligible(Vec::new(), 10);
        let out = c.tick();
        assert!(out.frozen);
        assert!(!out.advanced);
        assert_eq!(out.current_time_index, 2);
        assert_eq!(out.play_state, PlayState::Playing);
    }

    #[test]
    fn test_set_eligible_remaps_cursor_to_nearest() {
        let mut c = PlaybackController::new(100, full(100));
        let times = linspace(0.0, 99.0, 100);
        c.seek(50.0, &times);
        assert_eq!(c.current_time_index(), 50);

        // Cursor raw index 50 is gone; nearest eligible at or after is 60
        let eligible: Vec<usize> = (0..=40).chain(60..=99).collect();
        c.set_eligible(eligible, 100);
        assert_eq!(c.current_time_index(), 60);
    }
}
