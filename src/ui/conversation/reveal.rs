use ratatui::style::Color;
use std::time::{Duration, Instant};

/// One-shot fade-in for a freshly received reply
#[derive(Debug, Clone, Copy)]
pub struct FadeIn {
    started: Instant,
    duration: Duration,
}

impl FadeIn {
    pub fn start(duration: Duration) -> Self {
        Self::starting_at(Instant::now(), duration)
    }

    pub fn starting_at(started: Instant, duration: Duration) -> Self {
        Self { started, duration }
    }

    /// Progress in `0.0..=1.0` at `now`
    pub fn progress_at(&self, now: Instant) -> f32 {
        if self.duration.is_zero() {
            return 1.0;
        }
        let elapsed = now.saturating_duration_since(self.started);
        (elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
    }

    pub fn is_finished_at(&self, now: Instant) -> bool {
        self.progress_at(now) >= 1.0
    }

    /// Interpolate between `from` and `to` at `now`
    pub fn color_at(&self, from: (u8, u8, u8), to: (u8, u8, u8), now: Instant) -> Color {
        let t = self.progress_at(now);
        let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
        Color::Rgb(mix(from.0, to.0), mix(from.1, to.1), mix(from.2, to.2))
    }
}
