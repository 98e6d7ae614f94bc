//! Fade state machine driving `Stop(duration)` / `Pause(duration)` /
//! `Resume(duration)` (spec §4.D), grounded on
//! `ChannelInternalState::FadeIn`/`FadeOut`: a fader is armed with a
//! start/target gain pair and a duration, advanced each frame by elapsed
//! time rather than sample count, and on completion the channel state
//! transitions to the fade's target.

use std::sync::Arc;

use resonant_core::fader::Fader;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
    FadingIn,
    FadingOut,
}

/// What a completed fade-out resolves to. Mirrors the two
/// `eChannelPlaybackState_*` targets `FadeOut` accepts in the original.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FadeOutTarget {
    Stopped,
    Paused,
}

pub(crate) struct ActiveFade {
    fader: Arc<dyn Fader>,
    start_gain: f32,
    target_gain: f32,
    duration: f32,
    elapsed: f32,
}

impl ActiveFade {
    fn new(fader: Arc<dyn Fader>, start_gain: f32, target_gain: f32, duration: f32) -> Self {
        Self { fader, start_gain, target_gain, duration, elapsed: 0.0 }
    }

    /// Advances by `delta_time` seconds, returning the current gain and
    /// whether the fade has completed.
    fn advance(&mut self, delta_time: f32) -> (f32, bool) {
        self.elapsed = (self.elapsed + delta_time).min(self.duration);
        let percentage = if self.duration <= 0.0 { 1.0 } else { self.elapsed / self.duration };
        let eased = self.fader.get_from_percentage(percentage);
        let gain = self.start_gain + (self.target_gain - self.start_gain) * eased;
        (gain, self.elapsed >= self.duration)
    }
}

/// Owns the current playback state, the channel's stored (unfaded) gain,
/// and an optional in-flight fade.
pub struct FadeMachine {
    state: PlaybackState,
    /// The gain this channel plays at once any fade completes.
    stored_gain: f32,
    current_gain: f32,
    active: Option<ActiveFade>,
    fade_out_target: Option<FadeOutTarget>,
}

impl FadeMachine {
    pub fn new(stored_gain: f32) -> Self {
        Self { state: PlaybackState::Stopped, stored_gain, current_gain: stored_gain, active: None, fade_out_target: None }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn current_gain(&self) -> f32 {
        self.current_gain
    }

    pub fn set_stored_gain(&mut self, gain: f32) {
        self.stored_gain = gain;
        if self.active.is_none() && matches!(self.state, PlaybackState::Playing) {
            self.current_gain = gain;
        }
    }

    pub fn begin_playing(&mut self) {
        self.state = PlaybackState::Playing;
        self.current_gain = self.stored_gain;
        self.active = None;
    }

    /// Like [`Self::begin_playing`] but starts at zero gain and fades up to
    /// `stored_gain` over `duration` seconds, for a switch-container item
    /// newly appearing after a state transition (spec §4.D step 3).
    pub fn begin_playing_faded_in(&mut self, duration: f32, fader: Arc<dyn Fader>) {
        if duration <= 0.0 {
            self.begin_playing();
            return;
        }
        self.current_gain = 0.0;
        self.active = Some(ActiveFade::new(fader, 0.0, self.stored_gain, duration));
        self.fade_out_target = None;
        self.state = PlaybackState::FadingIn;
    }

    /// `Stop(duration)`: immediate halt when `duration <= 0` or the channel
    /// is already at zero gain, otherwise a fade-out to `Stopped`.
    pub fn stop(&mut self, duration: f32, fader: Arc<dyn Fader>) -> bool {
        self.fade_to(duration, fader, 0.0, FadeOutTarget::Stopped, PlaybackState::Stopped)
    }

    /// `Pause(duration)`.
    pub fn pause(&mut self, duration: f32, fader: Arc<dyn Fader>) -> bool {
        self.fade_to(duration, fader, 0.0, FadeOutTarget::Paused, PlaybackState::Paused)
    }

    fn fade_to(
        &mut self,
        duration: f32,
        fader: Arc<dyn Fader>,
        target_gain: f32,
        target: FadeOutTarget,
        immediate_state: PlaybackState,
    ) -> bool {
        if self.current_gain <= 0.0 {
            self.state = immediate_state;
            self.active = None;
            self.fade_out_target = None;
            return true;
        }
        if duration <= 0.0 {
            self.state = immediate_state;
            self.current_gain = target_gain;
            self.active = None;
            self.fade_out_target = None;
            return true;
        }
        self.active = Some(ActiveFade::new(fader, self.current_gain, target_gain, duration));
        self.fade_out_target = Some(target);
        self.state = PlaybackState::FadingOut;
        false
    }

    /// `Resume(duration)`: fades in from the current gain (expected 0) up
    /// to the stored playback gain.
    pub fn resume(&mut self, duration: f32, fader: Arc<dyn Fader>) {
        if duration <= 0.0 {
            self.begin_playing();
            return;
        }
        self.active = Some(ActiveFade::new(fader, self.current_gain, self.stored_gain, duration));
        self.fade_out_target = None;
        self.state = PlaybackState::FadingIn;
    }

    /// Advances the active fader by `delta_time` seconds; returns `true` if
    /// a fade completed on this call (the caller should act on the new
    /// `state()`, e.g. destroy the instance on a completed `Stopped` fade).
    pub fn advance(&mut self, delta_time: f32) -> bool {
        let Some(active) = self.active.as_mut() else { return false };
        let (gain, done) = active.advance(delta_time);
        self.current_gain = gain;
        if !done {
            return false;
        }
        self.active = None;
        match self.state {
            PlaybackState::FadingIn => self.state = PlaybackState::Playing,
            PlaybackState::FadingOut => {
                self.state = match self.fade_out_target.take() {
                    Some(FadeOutTarget::Stopped) => PlaybackState::Stopped,
                    Some(FadeOutTarget::Paused) => PlaybackState::Paused,
                    None => PlaybackState::Stopped,
                };
            }
            _ => {}
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use resonant_core::fader::LinearFader;

    fn linear() -> Arc<dyn Fader> {
        Arc::new(LinearFader)
    }

    #[test]
    fn stop_with_zero_duration_is_immediate() {
        let mut m = FadeMachine::new(1.0);
        m.begin_playing();
        assert!(m.stop(0.0, linear()));
        assert_eq!(m.state(), PlaybackState::Stopped);
        assert_eq!(m.current_gain(), 0.0);
    }

    #[test]
    fn stop_with_duration_fades_out_over_time() {
        let mut m = FadeMachine::new(1.0);
        m.begin_playing();
        assert!(!m.stop(1.0, linear()));
        assert_eq!(m.state(), PlaybackState::FadingOut);

        assert!(!m.advance(0.5));
        assert!((m.current_gain() - 0.5).abs() < 1e-5);
        assert_eq!(m.state(), PlaybackState::FadingOut);

        assert!(m.advance(0.5));
        assert_eq!(m.state(), PlaybackState::Stopped);
        assert!(m.current_gain() < 1e-5);
    }

    #[test]
    fn pause_at_zero_gain_short_circuits() {
        let mut m = FadeMachine::new(1.0);
        m.begin_playing();
        m.stop(0.0, linear());
        assert!(m.pause(2.0, linear()));
        assert_eq!(m.state(), PlaybackState::Paused);
    }

    #[test]
    fn resume_fades_in_from_current_gain_to_stored_gain() {
        let mut m = FadeMachine::new(0.8);
        m.begin_playing();
        m.stop(0.0, linear());
        m.resume(1.0, linear());
        assert_eq!(m.state(), PlaybackState::FadingIn);
        m.advance(1.0);
        assert_eq!(m.state(), PlaybackState::Playing);
        assert!((m.current_gain() - 0.8).abs() < 1e-5);
    }

    #[test]
    fn begin_playing_faded_in_ramps_from_zero() {
        let mut m = FadeMachine::new(0.6);
        m.begin_playing_faded_in(1.0, linear());
        assert_eq!(m.state(), PlaybackState::FadingIn);
        assert_eq!(m.current_gain(), 0.0);
        m.advance(0.5);
        assert!((m.current_gain() - 0.3).abs() < 1e-5);
        m.advance(0.5);
        assert_eq!(m.state(), PlaybackState::Playing);
    }
}
