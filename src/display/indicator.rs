// src/display/indicator.rs
//! Fix status indicator: a plain on/off LED or an addressable pixel strip

use crate::config::IndicatorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb(pub u8, pub u8, pub u8);

pub const LED_OFF: Rgb = Rgb(0, 0, 0);
pub const LED_WHITE: Rgb = Rgb(0x80, 0x80, 0x80);
pub const LED_RED: Rgb = Rgb(0x80, 0, 0);
pub const LED_GREEN: Rgb = Rgb(0, 0x80, 0);
pub const LED_BLUE: Rgb = Rgb(0, 0, 0x80);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusIndicator {
    /// Single-colour LED; colours in `ignore` leave it dark instead of lit
    SinglePixel { lit: bool, ignore: Vec<Rgb> },
    /// Addressable RGB pixels
    Addressable { pixels: Vec<Rgb>, lit: bool },
}

impl StatusIndicator {
    pub fn single(ignore: Vec<Rgb>) -> Self {
        StatusIndicator::SinglePixel { lit: false, ignore }
    }

    pub fn addressable(count: usize) -> Self {
        StatusIndicator::Addressable {
            pixels: vec![LED_OFF; count.max(1)],
            lit: false,
        }
    }

    pub fn on(&mut self) {
        match self {
            StatusIndicator::SinglePixel { lit, .. } | StatusIndicator::Addressable { lit, .. } => {
                *lit = true
            }
        }
    }

    pub fn off(&mut self) {
        match self {
            StatusIndicator::SinglePixel { lit, .. } | StatusIndicator::Addressable { lit, .. } => {
                *lit = false
            }
        }
    }

    /// Set pixel `idx` and light the indicator. A single LED can only be lit
    /// or dark, so it goes dark for colours it is told to ignore.
    pub fn set_pixel(&mut self, idx: usize, color: Rgb) {
        match self {
            StatusIndicator::SinglePixel { lit, ignore } => {
                *lit = color != LED_OFF && !ignore.contains(&color);
            }
            StatusIndicator::Addressable { pixels, lit } => {
                if let Some(px) = pixels.get_mut(idx) {
                    *px = color;
                }
                *lit = true;
            }
        }
    }

    /// Show fix status: blue with an external antenna, green on the internal
    /// one, red without a fix.
    pub fn show_fix(&mut self, has_fix: bool, external_antenna: bool) {
        let color = match (has_fix, external_antenna) {
            (true, true) => LED_BLUE,
            (true, false) => LED_GREEN,
            (false, _) => LED_RED,
        };
        self.set_pixel(0, color);
    }

    /// Colour currently shown by the first pixel, `None` when dark
    pub fn color(&self) -> Option<Rgb> {
        match self {
            StatusIndicator::SinglePixel { lit: true, .. } => Some(LED_WHITE),
            StatusIndicator::Addressable {
                pixels, lit: true, ..
            } => pixels.first().copied().filter(|c| *c != LED_OFF),
            _ => None,
        }
    }
}

impl Default for StatusIndicator {
    fn default() -> Self {
        Self::addressable(1)
    }
}

impl From<IndicatorKind> for StatusIndicator {
    fn from(kind: IndicatorKind) -> Self {
        match kind {
            // Red means no fix, so a plain LED stays dark for it
            IndicatorKind::Single => Self::single(vec![LED_RED]),
            IndicatorKind::Addressable => Self::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_addressable_shows_fix_colours() {
        let mut led = StatusIndicator::addressable(1);
        assert_eq!(led.color(), None);

        led.show_fix(true, true);
        assert_eq!(led.color(), Some(LED_BLUE));
        led.show_fix(true, false);
        assert_eq!(led.color(), Some(LED_GREEN));
        led.show_fix(false, true);
        assert_eq!(led.color(), Some(LED_RED));

        led.off();
        assert_eq!(led.color(), None);
    }

    #[test]
    fn test_single_pixel_ignores_colours() {
        let mut led = StatusIndicator::single(vec![LED_RED]);
        led.show_fix(true, false);
        assert_eq!(led.color(), Some(LED_WHITE));
        led.show_fix(false, false);
        assert_eq!(led.color(), None);
        led.on();
        assert_eq!(led.color(), Some(LED_WHITE));
    }

    #[test]
    fn test_indicator_from_config_kind() {
        let mut single = StatusIndicator::from(IndicatorKind::Single);
        assert!(matches!(single, StatusIndicator::SinglePixel { .. }));
        single.show_fix(false, true);
        assert_eq!(single.color(), None);
        single.show_fix(true, true);
        assert_eq!(single.color(), Some(LED_WHITE));

        let rgb = StatusIndicator::from(IndicatorKind::Addressable);
        assert_eq!(rgb, StatusIndicator::addressable(1));
    }

    #[test]
    fn test_out_of_range_pixel_is_ignored() {
        let mut led = StatusIndicator::addressable(2);
        led.set_pixel(5, LED_GREEN);
        assert_eq!(led.color(), None);
        led.set_pixel(0, LED_GREEN);
        assert_eq!(led.color(), Some(LED_GREEN));
    }
}
