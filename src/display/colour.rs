//! Per-job colours for bars and summary lines

use console::Style;

/// A 256-colour terminal foreground style
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ColourStyle {
    /// Index into the 256-colour palette
    pub index: u8,
}

impl ColourStyle {
    /// Style for palette entry `index`
    pub const fn new(index: u8) -> Self {
        Self { index }
    }

    /// Terminal style for this colour, applied even when stdout is redirected
    pub fn style(&self) -> Style {
        Style::new().color256(self.index).force_styling(true)
    }

    /// Name usable in an indicatif template (`{bar:.N}`)
    pub fn template_name(&self) -> String {
        self.index.to_string()
    }

    /// Wrap `text` in this colour
    pub fn paint(&self, text: &str) -> String {
        self.style().apply_to(text).to_string()
    }
}

/// Muted palette cycled across jobs in dispatch order
pub const PALETTE: [ColourStyle; 12] = [
    ColourStyle::new(23),  // emerald
    ColourStyle::new(101), // olive
    ColourStyle::new(66),  // teal
    ColourStyle::new(60),  // slate grey blue
    ColourStyle::new(24),  // slate blue
    ColourStyle::new(255), // chalk
    ColourStyle::new(187), // champagne
    ColourStyle::new(241), // warm grey
    ColourStyle::new(236), // charcoal
    ColourStyle::new(138), // taupe
    ColourStyle::new(137), // amber
    ColourStyle::new(89),  // burgundy
];

/// Endless iterator over [`PALETTE`]
pub fn cycle_colours() -> impl Iterator<Item = ColourStyle> {
    PALETTE.iter().copied().cycle()
}
