//! The SML memory image and its textual `.sml` format.
//!
//! An image is exactly [MEMORY_SIZE] signed integer cells. The text form
//! is one word per line, a sign character followed by four zero-padded
//! digits (`+2099`, `-0007`). The reader is lenient: it accepts any
//! whitespace-separated signed decimals, zero-fills when fewer than 100
//! values are present and ignores extras.

use std::fmt;
use std::ops::{Index, IndexMut};

use nom::character::complete::{digit1, multispace0, one_of};
use nom::combinator::{map_res, opt, recognize};
use nom::sequence::{pair, preceded};
use nom::IResult;

/// Number of memory cells of the SML machine.
pub const MEMORY_SIZE: usize = 100;

/// Error produced when parsing a memory image file.
#[derive(Debug, Clone, PartialEq)]
pub enum ImageError {
    /// Input that is neither a signed decimal nor trailing whitespace.
    InvalidWord {
        /// Snippet of the offending input, cut at the first line feed.
        near: String,
    },
}

impl fmt::Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ImageError::InvalidWord { near } => {
                write!(f, "invalid memory image near '{}'", near)
            }
        }
    }
}

impl std::error::Error for ImageError {}

/// A fixed 100-cell memory image, addresses 0 through 99.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryImage {
    words: [i32; MEMORY_SIZE],
}

impl Default for MemoryImage {
    fn default() -> MemoryImage {
        MemoryImage {
            words: [0; MEMORY_SIZE],
        }
    }
}

impl MemoryImage {
    pub fn new() -> MemoryImage {
        MemoryImage::default()
    }

    /// All 100 words, addresses 0 upward.
    pub fn words(&self) -> &[i32] {
        &self.words
    }

    /// Parses the textual `.sml` form.
    pub fn parse(text: &str) -> Result<MemoryImage, ImageError> {
        let mut image = MemoryImage::new();
        let mut rest = text;
        let mut address = 0;

        while let Ok((remaining, value)) = word(rest) {
            if address < MEMORY_SIZE {
                image.words[address] = value;
                address += 1;
            }
            // Values past address 99 are consumed and ignored.
            rest = remaining;
        }

        if !rest.trim().is_empty() {
            return Err(ImageError::InvalidWord {
                near: snippet(rest.trim_start()),
            });
        }

        Ok(image)
    }
}

fn word(input: &str) -> IResult<&str, i32> {
    preceded(
        multispace0,
        map_res(
            recognize(pair(opt(one_of("+-")), digit1)),
            |text: &str| text.parse::<i32>(),
        ),
    )(input)
}

fn snippet(input: &str) -> String {
    let end = input
        .char_indices()
        .take_while(|(offset, ch)| *ch != '\n' && *offset < 20)
        .last()
        .map(|(offset, ch)| offset + ch.len_utf8())
        .unwrap_or(0);
    input[..end].to_string()
}

impl From<[i32; MEMORY_SIZE]> for MemoryImage {
    fn from(words: [i32; MEMORY_SIZE]) -> MemoryImage {
        MemoryImage { words }
    }
}

impl Index<usize> for MemoryImage {
    type Output = i32;

    fn index(&self, address: usize) -> &i32 {
        &self.words[address]
    }
}

impl IndexMut<usize> for MemoryImage {
    fn index_mut(&mut self, address: usize) -> &mut i32 {
        &mut self.words[address]
    }
}

impl fmt::Display for MemoryImage {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for word in &self.words {
            writeln!(f, "{:+05}", word)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_signed_zero_padded_words() {
        let mut image = MemoryImage::new();
        image[0] = 2099;
        image[50] = -7;
        let text = image.to_string();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), MEMORY_SIZE);
        assert_eq!(lines[0], "+2099");
        assert_eq!(lines[1], "+0000");
        assert_eq!(lines[50], "-0007");
    }

    #[test]
    fn parses_whitespace_separated_words() {
        let image = MemoryImage::parse("+1099\n  +2099\t-0007\n4300").unwrap();
        assert_eq!(image[0], 1099);
        assert_eq!(image[1], 2099);
        assert_eq!(image[2], -7);
        assert_eq!(image[3], 4300);
        // Short files zero-fill the rest.
        assert_eq!(image[4], 0);
        assert_eq!(image[99], 0);
    }

    #[test]
    fn display_parse_round_trip() {
        let mut image = MemoryImage::new();
        image[0] = 4003;
        image[99] = -42;
        assert_eq!(MemoryImage::parse(&image.to_string()).unwrap(), image);
    }

    #[test]
    fn rejects_garbage() {
        let err = MemoryImage::parse("+1099 bogus").unwrap_err();
        assert_eq!(
            err,
            ImageError::InvalidWord {
                near: "bogus".to_string()
            }
        );
    }
}
