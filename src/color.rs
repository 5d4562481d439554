//! Color codec
//!
//! Two jobs live here:
//!
//! 1. Mapping picking fingerprints to RGB colors and back. Fingerprint `i`
//!    is stored as its 24 low bits in the red, green and blue channels; the
//!    value 0 (transparent black) means "nothing here".
//! 2. Parsing CSS color strings and packing them into a single `f32` whose
//!    four bytes are read by the GPU as normalized RGBA.
//!
//! Packing clears the lowest bit of the alpha byte. With alpha 0xFF the
//! packed bits could form a NaN float, which some drivers canonicalize and
//! thereby corrupt; the shaders scale alpha back by 255/254.

use std::collections::HashMap;

/// 8-bit RGBA color
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const TRANSPARENT: Rgba = Rgba::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    const fn from_hex(rgb: u32) -> Self {
        Self::new((rgb >> 16) as u8, (rgb >> 8) as u8, rgb as u8, 255)
    }
}

// ===== Picking fingerprints =====

/// Largest fingerprint that fits in the RGB channels
pub const MAX_FINGERPRINT: u32 = 0x00ff_ffff;

/// Encode a picking fingerprint as an opaque RGB color
pub fn index_to_color(index: u32) -> [u8; 4] {
    [
        ((index >> 16) & 0xff) as u8,
        ((index >> 8) & 0xff) as u8,
        (index & 0xff) as u8,
        255,
    ]
}

/// Decode a picking pixel back into its fingerprint. Alpha is ignored.
pub fn color_to_index(pixel: [u8; 4]) -> u32 {
    (u32::from(pixel[0]) << 16) | (u32::from(pixel[1]) << 8) | u32::from(pixel[2])
}

/// Encode a fingerprint as a packed float attribute
pub fn index_to_packed(index: u32) -> f32 {
    let [r, g, b, a] = index_to_color(index);
    pack_rgba(Rgba::new(r, g, b, a))
}

/// Pack a color into one float whose bytes are `[r, g, b, a]` in memory
pub fn pack_rgba(color: Rgba) -> f32 {
    f32::from_ne_bytes([color.r, color.g, color.b, color.a & 0xfe])
}

/// Recover the color bytes from a packed float
pub fn unpack_rgba(value: f32) -> Rgba {
    let [r, g, b, a] = value.to_ne_bytes();
    Rgba::new(r, g, b, a)
}

// ===== CSS parsing =====

/// Parses CSS color strings. Owns the read-only table of named colors.
#[derive(Debug, Clone)]
pub struct ColorCodec {
    named: HashMap<&'static str, Rgba>,
}

impl Default for ColorCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl ColorCodec {
    pub fn new() -> Self {
        let named = NAMED_COLORS
            .iter()
            .map(|&(name, rgb)| (name, Rgba::from_hex(rgb)))
            .chain(std::iter::once(("transparent", Rgba::TRANSPARENT)))
            .collect();
        Self { named }
    }

    /// Parse `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb()`, `rgba()` or a named
    /// color. Returns `None` for anything else.
    pub fn parse(&self, input: &str) -> Option<Rgba> {
        let input = input.trim();
        if let Some(hex) = input.strip_prefix('#') {
            return parse_hex(hex);
        }
        let lower = input.to_ascii_lowercase();
        if let Some(args) = lower
            .strip_prefix("rgba(")
            .or_else(|| lower.strip_prefix("rgb("))
        {
            return parse_functional(args.strip_suffix(')')?);
        }
        self.named.get(lower.as_str()).copied()
    }

    /// Parse and pack in one step. Unparseable colors become transparent.
    pub fn packed(&self, input: &str) -> f32 {
        pack_rgba(self.parse(input).unwrap_or(Rgba::TRANSPARENT))
    }
}

fn parse_hex(hex: &str) -> Option<Rgba> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
    match hex.len() {
        3 | 4 => {
            let digit = |i: usize| u8::from_str_radix(&hex[i..=i], 16).ok().map(|v| v * 17);
            let a = if hex.len() == 4 { digit(3)? } else { 255 };
            Some(Rgba::new(digit(0)?, digit(1)?, digit(2)?, a))
        }
        6 => Some(Rgba::new(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
        8 => Some(Rgba::new(
            channel(0..2)?,
            channel(2..4)?,
            channel(4..6)?,
            channel(6..8)?,
        )),
        _ => None,
    }
}

fn parse_functional(args: &str) -> Option<Rgba> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    if parts.len() != 3 && parts.len() != 4 {
        return None;
    }
    let channel = |part: &str| -> Option<u8> {
        let value = match part.strip_suffix('%') {
            Some(percent) => percent.parse::<f64>().ok()? * 2.55,
            None => part.parse::<f64>().ok()?,
        };
        Some(value.round().clamp(0.0, 255.0) as u8)
    };
    let alpha = match parts.get(3) {
        Some(part) => {
            let value = part.parse::<f64>().ok()?;
            (value.clamp(0.0, 1.0) * 255.0).round() as u8
        }
        None => 255,
    };
    Some(Rgba::new(
        channel(parts[0])?,
        channel(parts[1])?,
        channel(parts[2])?,
        alpha,
    ))
}

const NAMED_COLORS: &[(&str, u32)] = &[
    ("aliceblue", 0xf0f8ff),
    ("antiquewhite", 0xfaebd7),
    ("aqua", 0x00ffff),
    ("aquamarine", 0x7fffd4),
    ("azure", 0xf0ffff),
    ("beige", 0xf5f5dc),
    ("bisque", 0xffe4c4),
    ("black", 0x000000),
    ("blanchedalmond", 0xffebcd),
    ("blue", 0x0000ff),
    ("blueviolet", 0x8a2be2),
    ("brown", 0xa52a2a),
    ("burlywood", 0xdeb887),
    ("cadetblue", 0x5f9ea0),
    ("chartreuse", 0x7fff00),
    ("chocolate", 0xd2691e),
    ("coral", 0xff7f50),
    ("cornflowerblue", 0x6495ed),
    ("cornsilk", 0xfff8dc),
    ("crimson", 0xdc143c),
    ("cyan", 0x00ffff),
    ("darkblue", 0x00008b),
    ("darkcyan", 0x008b8b),
    ("darkgoldenrod", 0xb8860b),
    ("darkgray", 0xa9a9a9),
    ("darkgreen", 0x006400),
    ("darkgrey", 0xa9a9a9),
    ("darkkhaki", 0xbdb76b),
    ("darkmagenta", 0x8b008b),
    ("darkolivegreen", 0x556b2f),
    ("darkorange", 0xff8c00),
    ("darkorchid", 0x9932cc),
    ("darkred", 0x8b0000),
    ("darksalmon", 0xe9967a),
    ("darkseagreen", 0x8fbc8f),
    ("darkslateblue", 0x483d8b),
    ("darkslategray", 0x2f4f4f),
    ("darkslategrey", 0x2f4f4f),
    ("darkturquoise", 0x00ced1),
    ("darkviolet", 0x9400d3),
    ("deeppink", 0xff1493),
    ("deepskyblue", 0x00bfff),
    ("dimgray", 0x696969),
    ("dimgrey", 0x696969),
    ("dodgerblue", 0x1e90ff),
    ("firebrick", 0xb22222),
    ("floralwhite", 0xfffaf0),
    ("forestgreen", 0x228b22),
    ("fuchsia", 0xff00ff),
    ("gainsboro", 0xdcdcdc),
    ("ghostwhite", 0xf8f8ff),
    ("gold", 0xffd700),
    ("goldenrod", 0xdaa520),
    ("gray", 0x808080),
    ("green", 0x008000),
    ("greenyellow", 0xadff2f),
    ("grey", 0x808080),
    ("honeydew", 0xf0fff0),
    ("hotpink", 0xff69b4),
    ("indianred", 0xcd5c5c),
    ("indigo", 0x4b0082),
    ("ivory", 0xfffff0),
    ("khaki", 0xf0e68c),
    ("lavender", 0xe6e6fa),
    ("lavenderblush", 0xfff0f5),
    ("lawngreen", 0x7cfc00),
    ("lemonchiffon", 0xfffacd),
    ("lightblue", 0xadd8e6),
    ("lightcoral", 0xf08080),
    ("lightcyan", 0xe0ffff),
    ("lightgoldenrodyellow", 0xfafad2),
    ("lightgray", 0xd3d3d3),
    ("lightgreen", 0x90ee90),
    ("lightgrey", 0xd3d3d3),
    ("lightpink", 0xffb6c1),
    ("lightsalmon", 0xffa07a),
    ("lightseagreen", 0x20b2aa),
    ("lightskyblue", 0x87cefa),
    ("lightslategray", 0x778899),
    ("lightslategrey", 0x778899),
    ("lightsteelblue", 0xb0c4de),
    ("lightyellow", 0xffffe0),
    ("lime", 0x00ff00),
    ("limegreen", 0x32cd32),
    ("linen", 0xfaf0e6),
    ("magenta", 0xff00ff),
    ("maroon", 0x800000),
    ("mediumaquamarine", 0x66cdaa),
    ("mediumblue", 0x0000cd),
    ("mediumorchid", 0xba55d3),
    ("mediumpurple", 0x9370db),
    ("mediumseagreen", 0x3cb371),
    ("mediumslateblue", 0x7b68ee),
    ("mediumspringgreen", 0x00fa9a),
    ("mediumturquoise", 0x48d1cc),
    ("mediumvioletred", 0xc71585),
    ("midnightblue", 0x191970),
    ("mintcream", 0xf5fffa),
    ("mistyrose", 0xffe4e1),
    ("moccasin", 0xffe4b5),
    ("navajowhite", 0xffdead),
    ("navy", 0x000080),
    ("oldlace", 0xfdf5e6),
    ("olive", 0x808000),
    ("olivedrab", 0x6b8e23),
    ("orange", 0xffa500),
    ("orangered", 0xff4500),
    ("orchid", 0xda70d6),
    ("palegoldenrod", 0xeee8aa),
    ("palegreen", 0x98fb98),
    ("paleturquoise", 0xafeeee),
    ("palevioletred", 0xdb7093),
    ("papayawhip", 0xffefd5),
    ("peachpuff", 0xffdab9),
    ("peru", 0xcd853f),
    ("pink", 0xffc0cb),
    ("plum", 0xdda0dd),
    ("powderblue", 0xb0e0e6),
    ("purple", 0x800080),
    ("rebeccapurple", 0x663399),
    ("red", 0xff0000),
    ("rosybrown", 0xbc8f8f),
    ("royalblue", 0x4169e1),
    ("saddlebrown", 0x8b4513),
    ("salmon", 0xfa8072),
    ("sandybrown", 0xf4a460),
    ("seagreen", 0x2e8b57),
    ("seashell", 0xfff5ee),
    ("sienna", 0xa0522d),
    ("silver", 0xc0c0c0),
    ("skyblue", 0x87ceeb),
    ("slateblue", 0x6a5acd),
    ("slategray", 0x708090),
    ("slategrey", 0x708090),
    ("snow", 0xfffafa),
    ("springgreen", 0x00ff7f),
    ("steelblue", 0x4682b4),
    ("tan", 0xd2b48c),
    ("teal", 0x008080),
    ("thistle", 0xd8bfd8),
    ("tomato", 0xff6347),
    ("turquoise", 0x40e0d0),
    ("violet", 0xee82ee),
    ("wheat", 0xf5deb3),
    ("white", 0xffffff),
    ("whitesmoke", 0xf5f5f5),
    ("yellow", 0xffff00),
    ("yellowgreen", 0x9acd32),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fingerprint_round_trip() {
        for index in [1, 2, 255, 256, 65_535, 65_536, 1_234_567, MAX_FINGERPRINT] {
            assert_eq!(color_to_index(index_to_color(index)), index);
        }
    }

    #[test]
    fn zero_means_nothing() {
        assert_eq!(color_to_index([0, 0, 0, 0]), 0);
        assert_eq!(index_to_color(0), [0, 0, 0, 255]);
    }

    #[test]
    fn color_to_index_ignores_alpha() {
        assert_eq!(color_to_index([0, 1, 2, 0]), 258);
        assert_eq!(color_to_index([0, 1, 2, 255]), 258);
    }

    #[test]
    fn packed_values_are_never_nan() {
        let codec = ColorCodec::new();
        for color in ["#ffffff", "#ff80ff", "rgba(255, 255, 255, 1)", "white"] {
            let packed = codec.packed(color);
            assert!(!packed.is_nan(), "{color} packed to NaN");
        }
        for index in [0x00ff_ffff, 0x0080_8080, 1] {
            assert!(!index_to_packed(index).is_nan());
        }
    }

    #[test]
    fn packing_clears_the_alpha_low_bit() {
        let unpacked = unpack_rgba(pack_rgba(Rgba::new(10, 20, 30, 255)));
        assert_eq!(unpacked, Rgba::new(10, 20, 30, 254));
        let unpacked = unpack_rgba(pack_rgba(Rgba::new(10, 20, 30, 128)));
        assert_eq!(unpacked, Rgba::new(10, 20, 30, 128));
    }

    #[test]
    fn packed_fingerprint_keeps_rgb() {
        let unpacked = unpack_rgba(index_to_packed(0x0012_3456));
        assert_eq!((unpacked.r, unpacked.g, unpacked.b), (0x12, 0x34, 0x56));
    }

    #[test]
    fn parses_css_forms() {
        let codec = ColorCodec::new();
        assert_eq!(codec.parse("#999"), Some(Rgba::new(153, 153, 153, 255)));
        assert_eq!(codec.parse("#ff8000"), Some(Rgba::new(255, 128, 0, 255)));
        assert_eq!(codec.parse("#ff800080"), Some(Rgba::new(255, 128, 0, 128)));
        assert_eq!(codec.parse("rgb(1, 2, 3)"), Some(Rgba::new(1, 2, 3, 255)));
        assert_eq!(
            codec.parse("RGBA(10,20,30,0.5)"),
            Some(Rgba::new(10, 20, 30, 128))
        );
        assert_eq!(
            codec.parse("rgb(100%, 0%, 50%)"),
            Some(Rgba::new(255, 0, 128, 255))
        );
        assert_eq!(codec.parse("Tomato"), Some(Rgba::new(255, 99, 71, 255)));
        assert_eq!(codec.parse("transparent"), Some(Rgba::TRANSPARENT));
    }

    #[test]
    fn rejects_garbage() {
        let codec = ColorCodec::new();
        assert_eq!(codec.parse("#12"), None);
        assert_eq!(codec.parse("#gggggg"), None);
        assert_eq!(codec.parse("rgb(1, 2)"), None);
        assert_eq!(codec.parse("notacolor"), None);
        assert_eq!(unpack_rgba(codec.packed("notacolor")), Rgba::TRANSPARENT);
    }
}
