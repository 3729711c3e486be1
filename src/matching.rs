//! Back-reference search strategies.
//!
//! The finder is the replaceable heart of the compressor: given the window
//! and the pending input, name the best place to point a match token at.
//! Strategies are interchangeable only if they agree bit-for-bit, because
//! the chosen `(index, size)` pair goes straight onto the wire; anything
//! that picks a different-but-equal match produces a different (still
//! decodable) stream.
//!
//! Selection rule, shared by every strategy: the longest match wins, ties go
//! to the lowest window index, and the search returns as soon as a match of
//! the maximum encodable size turns up. The scan never starts at the very
//! last window byte and never wraps, so a candidate is always a straight
//! slice.

use byteorder::{ByteOrder, LE};

/// A match token is capped 13 bytes above the minimum pattern size so the
/// length always fits one Huffman symbol.
pub(crate) const MAX_PATTERN_EXTRA: usize = 13;

/// A back-reference into the window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Match {
    /// Start offset in the window.
    pub index: u16,
    /// Length in bytes; at least the minimum pattern size, at most 16.
    pub size: u8,
}

/// A strategy for finding the best back-reference.
pub trait MatchFinder {
    /// Search `window` for the longest prefix of `input`, subject to the
    /// selection rule above. Returns `None` when nothing reaches
    /// `min_pattern_size`.
    fn find_best_match(window: &[u8], input: &[u8], min_pattern_size: usize) -> Option<Match>;
}

/// Reference strategy: plain byte-by-byte scan of every window position.
pub struct ByteScan;

impl MatchFinder for ByteScan {
    fn find_best_match(window: &[u8], input: &[u8], min_pattern_size: usize) -> Option<Match> {
        if input.len() < min_pattern_size {
            return None;
        }
        let cap = input.len().min(min_pattern_size + MAX_PATTERN_EXTRA);

        let mut best_index = 0;
        let mut best_size = 0;
        for index in 0..window.len() - 1 {
            let size = window[index..]
                .iter()
                .take(cap)
                .zip(input)
                .take_while(|&(a, b)| a == b)
                .count();
            if size > best_size {
                best_size = size;
                best_index = index;
                if size == cap {
                    break;
                }
            }
        }

        if best_size >= min_pattern_size {
            Some(Match { index: best_index as u16, size: best_size as u8 })
        } else {
            None
        }
    }
}

/// Word-parallel strategy: scans the window four positions at a time through
/// little-endian 32-bit loads, filtering on the first two input bytes before
/// extending. Returns exactly what `ByteScan` returns.
pub struct WordScan;

/// Extend a two-byte candidate. `checked` bytes already matched; comparison
/// continues from there, stopping at the window end or the cap.
fn extend(window: &[u8], index: usize, input: &[u8], checked: usize, cap: usize) -> usize {
    checked
        + window[index + checked..]
            .iter()
            .take(cap - checked)
            .zip(&input[checked..])
            .take_while(|&(a, b)| a == b)
            .count()
}

impl MatchFinder for WordScan {
    fn find_best_match(window: &[u8], input: &[u8], min_pattern_size: usize) -> Option<Match> {
        if input.len() < min_pattern_size {
            return None;
        }
        let cap = input.len().min(min_pattern_size + MAX_PATTERN_EXTRA);

        let first = input[0];
        // window order: input[0] is the low byte of a matching 16-bit load
        let pair = u16::from(input[0]) | u16::from(input[1]) << 8;

        let mut best_index = 0;
        let mut best_size = 0;
        let mut update = |index: usize, size: usize| {
            if size > best_size {
                best_size = size;
                best_index = index;
            }
            best_size == cap
        };

        for (word_index, chunk) in window.chunks_exact(4).enumerate() {
            let word = LE::read_u32(chunk);
            let base = word_index * 4;

            if (word & 0xFFFF) as u16 == pair {
                let size = if input.len() >= 3 && (word >> 16 & 0xFF) as u8 == input[2] {
                    if input.len() >= 4 && (word >> 24) as u8 == input[3] {
                        extend(window, base, input, 4, cap)
                    } else {
                        3
                    }
                } else {
                    2
                };
                if update(base, size) {
                    break;
                }
            }
            if (word >> 8 & 0xFFFF) as u16 == pair {
                let size = if input.len() >= 3 && (word >> 24) as u8 == input[2] {
                    extend(window, base + 1, input, 3, cap)
                } else {
                    2
                };
                if update(base + 1, size) {
                    break;
                }
            }
            if (word >> 16) as u16 == pair {
                let size = extend(window, base + 2, input, 2, cap);
                if update(base + 2, size) {
                    break;
                }
            }
            // the pair straddles into the next word; check the first byte
            // here and let the extension look across
            if (word >> 24) as u8 == first && base + 3 < window.len() - 1 {
                let size = extend(window, base + 3, input, 1, cap);
                if update(base + 3, size) {
                    break;
                }
            }
        }

        if best_size >= min_pattern_size {
            Some(Match { index: best_index as u16, size: best_size as u8 })
        } else {
            None
        }
    }
}

cfg_if::cfg_if! {
    if #[cfg(target_pointer_width = "16")] {
        /// On 16-bit targets the 32-bit loads cost more than they save.
        pub type DefaultFinder = ByteScan;
    } else {
        pub type DefaultFinder = WordScan;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand::prelude::*;

    #[test]
    fn finds_longest() {
        let mut window = vec![0u8; 256];
        window[10..13].copy_from_slice(b"abc");
        window[100..105].copy_from_slice(b"abcde");
        let found = ByteScan::find_best_match(&window, b"abcdef", 2).unwrap();
        assert_eq!(found, Match { index: 100, size: 5 });
    }

    #[test]
    fn ties_go_to_the_lowest_index() {
        let mut window = vec![0u8; 256];
        window[40..44].copy_from_slice(b"wxyz");
        window[80..84].copy_from_slice(b"wxyz");
        let found = ByteScan::find_best_match(&window, b"wxyz", 2).unwrap();
        assert_eq!(found.index, 40);
    }

    #[test]
    fn respects_min_pattern_size() {
        let mut window = vec![0u8; 256];
        window[0..2].copy_from_slice(b"ab");
        assert!(ByteScan::find_best_match(&window, b"abQQ", 3).is_none());
        assert!(ByteScan::find_best_match(&window, b"a", 2).is_none());
    }

    #[test]
    fn caps_the_match_length() {
        let window = vec![b'a'; 256];
        let input = vec![b'a'; 16];
        let found = ByteScan::find_best_match(&window, &input, 2).unwrap();
        assert_eq!(found, Match { index: 0, size: 15 });
        let found = ByteScan::find_best_match(&window, &input, 3).unwrap();
        assert_eq!(found, Match { index: 0, size: 16 });
    }

    #[test]
    fn never_starts_at_the_last_byte() {
        let mut window = vec![0u8; 256];
        window[254] = b'q';
        window[255] = b'q';
        // a 2-byte match exists at index 254 but not beyond it
        let found = ByteScan::find_best_match(&window, b"qq", 2).unwrap();
        assert_eq!(found, Match { index: 254, size: 2 });
    }

    #[test]
    fn strategies_agree_on_random_states() {
        let mut rng = StdRng::seed_from_u64(0x7A3B);
        for round in 0..800 {
            let window_bits = rng.gen_range(8, 12);
            let mut window = vec![0u8; 1 << window_bits];
            // low-entropy alphabet so matches actually occur
            let alphabet = if round % 2 == 0 { 4 } else { 256 };
            for byte in window.iter_mut() {
                *byte = (rng.gen_range(0, alphabet) & 0xFF) as u8;
            }
            let input_len = rng.gen_range(1, 17);
            let input: Vec<u8> = (0..input_len)
                .map(|_| (rng.gen_range(0, alphabet) & 0xFF) as u8)
                .collect();
            for &min_pattern_size in &[2usize, 3] {
                let a = ByteScan::find_best_match(&window, &input, min_pattern_size);
                let b = WordScan::find_best_match(&window, &input, min_pattern_size);
                assert_eq!(a, b, "divergence on round {}", round);
            }
        }
    }
}
