/// Visual state of the mute button.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ButtonStyle {
    pub opacity: f32,
    pub grayscale: bool,
}

impl ButtonStyle {
    pub const UNMUTED: ButtonStyle = ButtonStyle {
        opacity: 1.0,
        grayscale: false,
    };
    pub const MUTED: ButtonStyle = ButtonStyle {
        opacity: 0.6,
        grayscale: true,
    };

    pub fn for_muted(muted: bool) -> Self {
        if muted { Self::MUTED } else { Self::UNMUTED }
    }
}
