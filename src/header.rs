//! Stream configuration and the one-byte header that carries it.
//!
//! ```text
//! bit 7..5   window_bits - 8
//! bit 4..3   literal_bits - 5
//! bit 2      custom dictionary
//! bit 1      reserved, must be 0
//! bit 0      more headers follow, must be 0
//! ```

use fehler::{throw, throws};
use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfError {
    #[error("window bits must be within 8..=15, got {0}")]
    WindowBits(u8),
    #[error("literal bits must be within 5..=8, got {0}")]
    LiteralBits(u8),
    #[error("header asks for a 2^{requested} byte window but this decompressor is capped at 2^{limit}")]
    WindowTooLarge { requested: u8, limit: u8 },
    #[error("reserved header bit set (extended-format stream?)")]
    ReservedBitSet,
    #[error("multi-byte headers are not supported")]
    MoreHeaders,
}

/// Codec parameters, fixed for the lifetime of a stream.
///
/// Built with the defaults of the reference implementation (1 KiB window,
/// 8-bit literals) and narrowed from there:
///
/// ```
/// use tamp_compression::Conf;
/// let conf = Conf::new().window_bits(12)?.literal_bits(8)?;
/// # Ok::<(), tamp_compression::ConfError>(())
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Conf {
    pub(crate) window: u8,
    pub(crate) literal: u8,
    pub(crate) use_custom_dictionary: bool,
}

impl Default for Conf {
    fn default() -> Self {
        Conf { window: 10, literal: 8, use_custom_dictionary: false }
    }
}

impl Conf {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the window size to `1 << bits` bytes. Valid range is 8..=15.
    #[throws(ConfError)]
    pub fn window_bits(mut self, bits: u8) -> Self {
        if !(8..=15).contains(&bits) {
            throw!(ConfError::WindowBits(bits));
        }
        self.window = bits;
        self
    }

    /// Set the literal width. Valid range is 5..=8; every input byte must
    /// then fit in that many bits.
    #[throws(ConfError)]
    pub fn literal_bits(mut self, bits: u8) -> Self {
        if !(5..=8).contains(&bits) {
            throw!(ConfError::LiteralBits(bits));
        }
        self.literal = bits;
        self
    }

    pub fn window_size(&self) -> usize {
        1 << self.window
    }

    pub fn uses_custom_dictionary(&self) -> bool {
        self.use_custom_dictionary
    }

    /// The shortest match worth encoding. A match token costs
    /// `1 + window_bits` bits for the offset alone, so for the wider windows
    /// a two-byte match loses against two literals.
    pub fn min_pattern_size(&self) -> usize {
        let threshold = match self.literal {
            5 => 10,
            6 => 12,
            7 => 14,
            _ => return 2,
        };
        if self.window > threshold {
            3
        } else {
            2
        }
    }

    /// Serialize into the wire header byte.
    pub(crate) fn pack(&self) -> u8 {
        ((self.window - 8) << 5)
            | ((self.literal - 5) << 3)
            | ((self.use_custom_dictionary as u8) << 2)
    }

    /// Parse a wire header byte. The field encodings cannot go out of range,
    /// so the only failures are the two flag bits this version refuses to
    /// ignore.
    #[throws(ConfError)]
    pub(crate) fn parse(byte: u8) -> Self {
        if byte & 0x01 != 0 {
            throw!(ConfError::MoreHeaders);
        }
        if byte & 0x02 != 0 {
            throw!(ConfError::ReservedBitSet);
        }
        Conf {
            window: ((byte >> 5) & 0x7) + 8,
            literal: ((byte >> 3) & 0x3) + 5,
            use_custom_dictionary: byte & 0x04 != 0,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_header_byte() {
        assert_eq!(Conf::new().pack(), 0x58);
    }

    #[test]
    fn pack_parse_bijection() {
        for window in 8..=15 {
            for literal in 5..=8 {
                for &custom in &[false, true] {
                    let conf = Conf { window, literal, use_custom_dictionary: custom };
                    assert_eq!(Conf::parse(conf.pack()).unwrap(), conf);
                }
            }
        }
    }

    #[test]
    fn rejects_flag_bits() {
        assert_eq!(Conf::parse(0x59), Err(ConfError::MoreHeaders));
        assert_eq!(Conf::parse(0x5A), Err(ConfError::ReservedBitSet));
    }

    #[test]
    fn builder_validates() {
        assert!(Conf::new().window_bits(7).is_err());
        assert!(Conf::new().window_bits(16).is_err());
        assert!(Conf::new().literal_bits(4).is_err());
        assert!(Conf::new().literal_bits(9).is_err());
    }

    #[test]
    fn min_pattern_size_table() {
        let conf = |w, l| Conf { window: w, literal: l, use_custom_dictionary: false };
        assert_eq!(conf(10, 5).min_pattern_size(), 2);
        assert_eq!(conf(11, 5).min_pattern_size(), 3);
        assert_eq!(conf(12, 6).min_pattern_size(), 2);
        assert_eq!(conf(13, 6).min_pattern_size(), 3);
        assert_eq!(conf(14, 7).min_pattern_size(), 2);
        assert_eq!(conf(15, 7).min_pattern_size(), 3);
        assert_eq!(conf(15, 8).min_pattern_size(), 2);
    }
}
