use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::{Result, RnnErr};

/// Converts between text and the token sequences a network is trained on.
pub trait SequenceCodec {
    fn encode(&self, text: &str) -> Result<Vec<usize>>;

    /// Converts tokens back into text, tokens outside the vocabulary are skipped.
    fn decode(&self, tokens: &[usize]) -> String;

    /// Returns the amount of distinct tokens, including the end token.
    fn vocab_size(&self) -> usize;
}

/// A character level codec. Token 0 is reserved as the end token, character `i` of the alphabet
/// is token `i + 1`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "CharCodecJson", into = "CharCodecJson")]
pub struct CharCodec {
    characters: Vec<char>,
    indices: HashMap<char, usize>,
}

#[derive(Serialize, Deserialize)]
struct CharCodecJson {
    characters: Vec<char>,
}

impl CharCodec {
    /// Creates a codec over the distinct characters of `texts`, in order of first appearance.
    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        let mut characters = Vec::new();
        for c in texts.iter().flat_map(|text| text.as_ref().chars()) {
            if !characters.contains(&c) {
                characters.push(c);
            }
        }

        Self::from_characters(characters)
    }

    fn from_characters(characters: Vec<char>) -> Self {
        let indices = characters
            .iter()
            .enumerate()
            .map(|(i, &c)| (c, i + 1))
            .collect();

        Self {
            characters,
            indices,
        }
    }

    pub fn characters(&self) -> &[char] {
        &self.characters
    }
}

impl SequenceCodec for CharCodec {
    fn encode(&self, text: &str) -> Result<Vec<usize>> {
        text.chars()
            .map(|c| self.indices.get(&c).copied().ok_or(RnnErr::UnknownToken(c)))
            .collect()
    }

    fn decode(&self, tokens: &[usize]) -> String {
        tokens
            .iter()
            .filter_map(|&token| token.checked_sub(1))
            .filter_map(|i| self.characters.get(i))
            .collect()
    }

    fn vocab_size(&self) -> usize {
        self.characters.len() + 1
    }
}

impl From<CharCodecJson> for CharCodec {
    fn from(json: CharCodecJson) -> Self {
        Self::from_characters(json.characters)
    }
}

impl From<CharCodec> for CharCodecJson {
    fn from(codec: CharCodec) -> Self {
        Self {
            characters: codec.characters,
        }
    }
}
