//! Prompt derivation from frame colour.

use image::Rgb;
use vfill_models::BandPosition;

/// Dominant channel of a mean colour, if one channel is strictly largest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Dominant {
    Red,
    Green,
    Blue,
}

fn dominant(mean: Rgb<u8>) -> Option<Dominant> {
    let [r, g, b] = mean.0;
    if b > r && b > g {
        Some(Dominant::Blue)
    } else if g > r && g > b {
        Some(Dominant::Green)
    } else if r > g && r > b {
        Some(Dominant::Red)
    } else {
        None
    }
}

/// Scene description for one band given the frame's mean colour.
pub fn band_prompt(mean: Rgb<u8>, position: BandPosition) -> &'static str {
    match (position, dominant(mean)) {
        (BandPosition::Top, Some(Dominant::Blue)) => {
            "beautiful sky, fluffy white clouds, atmospheric lighting"
        }
        (BandPosition::Top, Some(Dominant::Green)) => {
            "lush green landscape, rolling hills, natural environment"
        }
        (BandPosition::Top, _) => "natural landscape extension, seamless continuation",
        (BandPosition::Bottom, Some(Dominant::Green)) => {
            "lush green grass, natural ground, earth tones"
        }
        (BandPosition::Bottom, Some(Dominant::Red)) => {
            "natural earth, ground texture, warm tones"
        }
        (BandPosition::Bottom, _) => "natural ground extension, seamless continuation",
    }
}

/// Prompt for one full-canvas outpaint call.
pub fn derive_prompt(mean: Rgb<u8>) -> String {
    format!(
        "vertical 9:16 extension of the centered scene, above: {}, below: {}, photorealistic, cinematic quality",
        band_prompt(mean, BandPosition::Top),
        band_prompt(mean, BandPosition::Bottom)
    )
}
