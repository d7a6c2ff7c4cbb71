//! Status LED state.  Only the state is tracked; nothing is rendered.

use parking_lot::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0, 0, 0);
    pub const RED: Rgb = Rgb::new(255, 0, 0);
    pub const GREEN: Rgb = Rgb::new(0, 255, 0);
    pub const BLUE: Rgb = Rgb::new(0, 0, 255);
    pub const WHITE: Rgb = Rgb::new(255, 255, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }
}

/// A point-in-time copy of the indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndicatorState {
    pub enabled: bool,
    pub rainbow: bool,
    pub color: Rgb,
    /// Most recent flash, if any.
    pub last_flash: Option<Rgb>,
}

impl Default for IndicatorState {
    fn default() -> Self {
        Self {
            enabled: true,
            rainbow: true,
            color: Rgb::BLACK,
            last_flash: None,
        }
    }
}

/// Shared indicator, starting enabled and in rainbow mode.
#[derive(Debug, Default)]
pub struct Indicator {
    state: Mutex<IndicatorState>,
}

impl Indicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> IndicatorState {
        *self.state.lock()
    }

    pub fn is_enabled(&self) -> bool {
        self.state.lock().enabled
    }

    pub fn is_rainbow(&self) -> bool {
        self.state.lock().rainbow
    }

    /// A static color: leaves rainbow mode and turns the indicator on.
    pub fn set_color(&self, color: Rgb) {
        let mut s = self.state.lock();
        s.color = color;
        s.rainbow = false;
        s.enabled = true;
        tracing::debug!(r = color.r, g = color.g, b = color.b, "indicator color set");
    }

    pub fn set_rainbow(&self, on: bool) {
        let mut s = self.state.lock();
        s.rainbow = on;
        if on {
            s.enabled = true;
        }
    }

    /// Turning the indicator off also ends rainbow mode.
    pub fn set_enabled(&self, on: bool) {
        let mut s = self.state.lock();
        s.enabled = on;
        if !on {
            s.rainbow = false;
        }
    }

    /// A brief flash; the steady mode is unchanged afterwards.
    pub fn flash(&self, color: Rgb) {
        self.state.lock().last_flash = Some(color);
        tracing::debug!(r = color.r, g = color.g, b = color.b, "indicator flashed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_enabled_in_rainbow_mode() {
        let ind = Indicator::new();
        assert_eq!(ind.snapshot(), IndicatorState::default());
        assert!(ind.is_enabled());
        assert!(ind.is_rainbow());
    }

    #[test]
    fn color_leaves_rainbow_and_enables() {
        let ind = Indicator::new();
        ind.set_enabled(false);
        ind.set_color(Rgb::BLUE);
        let s = ind.snapshot();
        assert!(s.enabled);
        assert!(!s.rainbow);
        assert_eq!(s.color, Rgb::BLUE);
    }

    #[test]
    fn disabling_clears_rainbow() {
        let ind = Indicator::new();
        ind.set_enabled(false);
        assert!(!ind.is_enabled());
        assert!(!ind.is_rainbow());

        ind.set_rainbow(true);
        assert!(ind.is_enabled());
        assert!(ind.is_rainbow());
    }

    #[test]
    fn rainbow_off_keeps_enabled() {
        let ind = Indicator::new();
        ind.set_rainbow(false);
        assert!(ind.is_enabled());
        assert!(!ind.is_rainbow());
    }

    #[test]
    fn flash_does_not_change_mode() {
        let ind = Indicator::new();
        ind.flash(Rgb::GREEN);
        let s = ind.snapshot();
        assert_eq!(s.last_flash, Some(Rgb::GREEN));
        assert!(s.rainbow);
        assert!(s.enabled);
    }
}
