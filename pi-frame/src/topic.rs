use crate::{prompts::PromptContext, registry::Arguments, Result};
use rand::{seq::SliceRandom, RngCore};

pub const ADJECTIVES: [&str; 17] = [
    "Cozy",
    "Mischievous",
    "Space",
    "Office-worker",
    "Glamorous",
    "Deceptive",
    "Stylish",
    "Leisurely",
    "Lounging",
    "Smoking",
    "Binge-drinking",
    "Dancing",
    "Partying",
    "Cute",
    "Evil",
    "Psychedelic",
    "Gangster",
];

pub const NOUNS: [&str; 18] = [
    "Animals",
    "Hot Dogs",
    "Robots",
    "Astronauts",
    "Pickles",
    "Condiments",
    "Wizards",
    "Zombies",
    "Dogs",
    "Cats",
    "Garden Gnomes",
    "French Fries",
    "Musical Instruments",
    "Lobsters",
    "Monsteras",
    "House Plants",
    "Aliens",
    "Fruits",
];

/// Picks the subject of the next picture.
pub trait TopicStrategy: Send + Sync {
    fn get_topic(&self, context: &PromptContext, rng: &mut dyn RngCore) -> String;
}

/// An adjective and a noun, both drawn at random: "Cozy Hot Dogs".
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RandomAdlib {
    adjectives: Vec<String>,
    nouns: Vec<String>,
}

impl RandomAdlib {
    /// Missing or empty lists fall back to the built-in ones.
    pub fn new(adjectives: Option<Vec<String>>, nouns: Option<Vec<String>>) -> Self {
        fn or_default(words: Option<Vec<String>>, default: &[&str]) -> Vec<String> {
            match words {
                Some(words) if !words.is_empty() => words,
                _ => default.iter().copied().map(String::from).collect(),
            }
        }
        Self {
            adjectives: or_default(adjectives, &ADJECTIVES),
            nouns: or_default(nouns, &NOUNS),
        }
    }
}

impl Default for RandomAdlib {
    fn default() -> Self {
        Self::new(None, None)
    }
}

impl TopicStrategy for RandomAdlib {
    fn get_topic(&self, _context: &PromptContext, rng: &mut dyn RngCore) -> String {
        let adjective = self.adjectives.choose(&mut *rng).map_or("", String::as_str);
        let noun = self.nouns.choose(&mut *rng).map_or("", String::as_str);
        format!("{} {}", adjective, noun)
    }
}

pub fn random_adlib(mut args: Arguments) -> Result<Box<dyn TopicStrategy>> {
    let adjectives = args.take("adjectives")?;
    let nouns = args.take("nouns")?;
    args.finish()?;
    Ok(Box::new(RandomAdlib::new(adjectives, nouns)))
}
