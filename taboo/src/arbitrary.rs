use quickcheck::Arbitrary;

use crate::{BoundingBox, DetectionResult};

const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const PUNCTUATION: [&str; 5] = ["", "!", ".", ",", "?"];

/// A non-empty lowercase ASCII word.
#[derive(Clone, Debug)]
pub struct Word(pub String);

impl Arbitrary for Word {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let len = 1 + usize::arbitrary(g) % 9;
        let word = (0..len)
            .map(|_| *g.choose(LETTERS).unwrap() as char)
            .collect();
        Word(word)
    }
}

impl Word {
    /// Writes `word` with this word's casing pattern and some trailing punctuation.
    pub fn restyle(&self, word: &str) -> String {
        let pattern = self.0.as_bytes();
        let mut styled: String = word
            .chars()
            .enumerate()
            .map(|(idx, c)| {
                if pattern[idx % pattern.len()] % 2 == 0 {
                    c.to_ascii_uppercase()
                } else {
                    c
                }
            })
            .collect();
        styled += PUNCTUATION[pattern[0] as usize % PUNCTUATION.len()];
        styled
    }
}

/// Whitespace-free tokens with mixed case and punctuation.
#[derive(Clone, Debug)]
pub struct Description(pub Vec<String>);

impl Arbitrary for Description {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let tokens = Vec::<(Word, Word)>::arbitrary(g)
            .into_iter()
            .map(|(word, style)| style.restyle(&word.0))
            .collect();
        Description(tokens)
    }
}

impl Arbitrary for BoundingBox {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        let x1 = (u8::arbitrary(g) % 60) as i32;
        let y1 = (u8::arbitrary(g) % 60) as i32;
        Self {
            x1,
            y1,
            x2: x1 + (u8::arbitrary(g) % 40) as i32,
            y2: y1 + (u8::arbitrary(g) % 40) as i32,
        }
    }
}

impl Arbitrary for DetectionResult {
    fn arbitrary(g: &mut quickcheck::Gen) -> Self {
        Self {
            label: String::from(*g.choose(&["pizza", "plate", "cup"]).unwrap()),
            bounding_box: BoundingBox::arbitrary(g),
        }
    }
}
