//! Idea phrases for the generator
//!
//! Vocabulary files hold one `word:pos` entry per line, where `pos` is `v`
//! (verb), `n` (noun) or `a` (adjective). Blank lines and `#` comments are
//! ignored.

use rand::seq::IndexedRandom;
use rand::Rng;
use std::path::Path;
use tracing::{info, warn};
use vfd_core::{Result, VfdError};

/// Minimum verbs and nouns a vocabulary must provide
const MIN_WORDS_PER_CLASS: usize = 5;

const MIN_PHRASE_WORDS: usize = 2;
const MAX_PHRASE_WORDS: usize = 4;

const BUILTIN_VERBS: &[&str] = &[
    "bounce", "fall", "spin", "drift", "pulse", "flicker", "scroll", "wave", "orbit", "chase",
    "blink", "rise", "swirl", "sparkle", "race",
];
const BUILTIN_NOUNS: &[&str] = &[
    "stars", "rain", "snow", "comets", "waves", "fireflies", "sparks", "bubbles", "arrows",
    "ripples", "planets", "lightning", "pixels", "meteors", "tides",
];
const BUILTIN_ADJECTIVES: &[&str] = &[
    "mirrored", "glowing", "tiny", "cosmic", "gentle", "chaotic", "rhythmic", "electric", "lazy",
    "frantic", "twin", "random",
];

/// Where the generator gets its next idea
pub trait IdeaSource: Send + Sync {
    fn next_idea(&self) -> String;
}

/// Always the same idea (single-shot mode)
#[derive(Debug, Clone)]
pub struct FixedIdea(String);

impl FixedIdea {
    pub fn new(idea: impl Into<String>) -> Self {
        Self(idea.into())
    }
}

impl IdeaSource for FixedIdea {
    fn next_idea(&self) -> String {
        self.0.clone()
    }
}

/// Words grouped by part of speech
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    pub verbs: Vec<String>,
    pub nouns: Vec<String>,
    pub adjectives: Vec<String>,
}

impl Vocabulary {
    pub fn builtin() -> Self {
        let owned = |words: &[&str]| -> Vec<String> { words.iter().map(|w| w.to_string()).collect() };
        Self {
            verbs: owned(BUILTIN_VERBS),
            nouns: owned(BUILTIN_NOUNS),
            adjectives: owned(BUILTIN_ADJECTIVES),
        }
    }

    /// Parse `word:pos` lines, returning the vocabulary and the skipped line count
    pub fn parse(text: &str) -> (Self, usize) {
        let mut vocab = Self::default();
        let mut skipped = 0;

        for line in text.lines().map(str::trim) {
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((word, pos)) = line.split_once(':') else {
                skipped += 1;
                continue;
            };
            let word = word.trim();
            let bucket = match pos.trim().to_lowercase().as_str() {
                "v" => &mut vocab.verbs,
                "n" => &mut vocab.nouns,
                "a" => &mut vocab.adjectives,
                _ => {
                    skipped += 1;
                    continue;
                }
            };
            if word.is_empty() {
                skipped += 1;
            } else if !bucket.iter().any(|w| w == word) {
                bucket.push(word.to_string());
            }
        }
        (vocab, skipped)
    }

    /// Load and check a vocabulary file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            VfdError::Vocabulary(format!("{} unreadable: {}", path.display(), e))
        })?;
        let (vocab, skipped) = Self::parse(&text);
        if skipped > 0 {
            warn!("Skipped {} lines (missing or invalid :pos tags)", skipped);
        }
        vocab.check()?;
        info!(
            "Loaded {} verbs, {} nouns, {} adjectives",
            vocab.verbs.len(),
            vocab.nouns.len(),
            vocab.adjectives.len()
        );
        Ok(vocab)
    }

    fn check(&self) -> Result<()> {
        if self.verbs.len() < MIN_WORDS_PER_CLASS {
            return Err(VfdError::Vocabulary(format!(
                "Only {} verbs found (need {}+)",
                self.verbs.len(),
                MIN_WORDS_PER_CLASS
            )));
        }
        if self.nouns.len() < MIN_WORDS_PER_CLASS {
            return Err(VfdError::Vocabulary(format!(
                "Only {} nouns found (need {}+)",
                self.nouns.len(),
                MIN_WORDS_PER_CLASS
            )));
        }
        Ok(())
    }
}

/// Builds 2-4 word phrases such as "mirrored bouncing sparks"
#[derive(Debug, Clone)]
pub struct VocabularyIdeas {
    vocab: Vocabulary,
}

impl VocabularyIdeas {
    pub fn new(vocab: Vocabulary) -> Self {
        Self { vocab }
    }

    /// From a vocabulary file, or the built-in words when none is configured
    pub fn from_file(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Ok(Self::new(Vocabulary::load(path)?)),
            None => Ok(Self::new(Vocabulary::builtin())),
        }
    }

    pub fn generate<R: Rng>(&self, rng: &mut R) -> String {
        let target = rng.random_range(MIN_PHRASE_WORDS..=MAX_PHRASE_WORDS);
        let mut words: Vec<String> = Vec::new();

        let adjectives = match rng.random::<f64>() {
            r if r < 0.3 => 0,
            r if r < 0.8 => 1,
            _ => 2,
        };
        for _ in 0..adjectives {
            if words.len() + 1 >= target {
                break;
            }
            if let Some(adj) = self.vocab.adjectives.choose(rng) {
                if !words.contains(adj) {
                    words.push(adj.clone());
                }
            }
        }

        if rng.random_bool(0.8) && words.len() + 1 < target {
            if let Some(verb) = self.vocab.verbs.choose(rng) {
                words.push(present_participle(verb));
            }
        }

        let mut tries = 0;
        while words.len() < target && tries < 32 {
            tries += 1;
            if let Some(noun) = self.vocab.nouns.choose(rng) {
                if !words.contains(noun) {
                    words.push(noun.clone());
                }
            }
        }

        if !words.iter().any(|w| self.vocab.nouns.contains(w)) {
            if let Some(noun) = self.vocab.nouns.choose(rng) {
                words.push(noun.clone());
            }
        }

        words.join(" ")
    }
}

impl IdeaSource for VocabularyIdeas {
    fn next_idea(&self) -> String {
        self.generate(&mut rand::rng())
    }
}

/// English `-ing` form for common regular verbs
fn present_participle(verb: &str) -> String {
    let lower = verb.to_lowercase();
    if let Some(stem) = lower.strip_suffix("ie") {
        return format!("{}ying", stem);
    }
    let silent_e = lower.ends_with('e')
        && !["ee", "ye", "oe"].iter().any(|end| lower.ends_with(end));
    if silent_e && lower.len() > 2 {
        return format!("{}ing", &lower[..lower.len() - 1]);
    }

    let chars: Vec<char> = lower.chars().collect();
    let is_vowel = |c: char| "aeiou".contains(c);
    if let [.., a, b, c] = chars.as_slice() {
        let short = chars.len() <= 4;
        if short && !is_vowel(*a) && is_vowel(*b) && !is_vowel(*c) && !"wxy".contains(*c) {
            return format!("{}{}ing", lower, c);
        }
    }
    format!("{}ing", lower)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use tempfile::TempDir;

    #[test]
    fn test_present_participle() {
        assert_eq!(present_participle("bounce"), "bouncing");
        assert_eq!(present_participle("spin"), "spinning");
        assert_eq!(present_participle("drift"), "drifting");
        assert_eq!(present_participle("tie"), "tying");
        assert_eq!(present_participle("flee"), "fleeing");
        assert_eq!(present_participle("glow"), "glowing");
    }

    #[test]
    fn test_parse_vocabulary() {
        let text = "# comment\nspin:v\nstar:n\nbright:A\nbroken line\nspin:v\nodd:x\n\n";
        let (vocab, skipped) = Vocabulary::parse(text);
        assert_eq!(vocab.verbs, vec!["spin"]);
        assert_eq!(vocab.nouns, vec!["star"]);
        assert_eq!(vocab.adjectives, vec!["bright"]);
        assert_eq!(skipped, 2);
    }

    #[test]
    fn test_load_rejects_small_vocabulary() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("idea.txt");
        std::fs::write(&path, "spin:v\nstar:n\n").unwrap();
        assert!(matches!(
            Vocabulary::load(&path),
            Err(VfdError::Vocabulary(_))
        ));
        assert!(Vocabulary::load(&dir.path().join("missing.txt")).is_err());
    }

    #[test]
    fn test_phrases_have_two_to_four_words_and_a_noun() {
        let ideas = VocabularyIdeas::new(Vocabulary::builtin());
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let phrase = ideas.generate(&mut rng);
            let words: Vec<&str> = phrase.split(' ').collect();
            assert!((2..=4).contains(&words.len()), "bad phrase: {}", phrase);
            assert!(
                words.iter().any(|w| BUILTIN_NOUNS.contains(w)),
                "no noun in: {}",
                phrase
            );
        }
    }

    #[test]
    fn test_fixed_idea() {
        let source = FixedIdea::new("falling snow");
        assert_eq!(source.next_idea(), "falling snow");
        assert_eq!(source.next_idea(), "falling snow");
    }
}
