use std::collections::HashMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reveal::{PhaseDurations, Round};
use crate::scramble::Variant;

pub type ImageId = String;
pub type GameId = String;

pub const CATEGORIES: [&str; 12] = [
    "Guess the Celebrity",
    "Guess the Movie",
    "Guess the TV Show",
    "Guess the Landmark",
    "Guess the Brand",
    "Guess the Animal",
    "Guess the Food",
    "Guess the Sport",
    "Guess the Car",
    "Guess the Game",
    "Guess the Art",
    "Guess the Music",
];

pub fn is_known_category(category: &str) -> bool {
    CATEGORIES.contains(&category)
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VariantUrls {
    pub original_url: String,
    pub grid15_url: String,
    pub grid10_url: String,
    pub grid5_url: String,
}

impl VariantUrls {
    pub fn url(&self, variant: Variant) -> &str {
        match variant {
            Variant::Grid15 => &self.grid15_url,
            Variant::Grid10 => &self.grid10_url,
            Variant::Grid5 => &self.grid5_url,
            Variant::Original => &self.original_url,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ImageAsset {
    pub id: ImageId,
    /// Display name, also the answer text.
    pub name: String,
    pub category: String,
    #[serde(flatten)]
    pub urls: VariantUrls,
    pub published: bool,
    pub created_at: u64,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum GameStatus {
    #[default]
    Draft,
    Published,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameRound {
    pub image_id: ImageId,
    pub sequence: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameDefinition {
    pub id: GameId,
    pub title: String,
    pub category: String,
    pub description: String,
    pub randomize_order: bool,
    pub status: GameStatus,
    pub settings: PhaseDurations,
    pub rounds: Vec<GameRound>,
    pub created_at: u64,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlanError {
    #[error("game has no rounds")]
    NoRounds,
    #[error("image {0} not found")]
    UnknownImage(ImageId),
}

/// Resolves a game's rounds against the image catalog, in sequence order or
/// shuffled when the game asks for it.
pub fn plan_rounds<R: Rng + ?Sized>(
    game: &GameDefinition,
    images: &HashMap<ImageId, ImageAsset>,
    rng: &mut R,
) -> Result<Vec<Round>, PlanError> {
    if game.rounds.is_empty() {
        return Err(PlanError::NoRounds);
    }

    let mut ordered = game.rounds.iter().collect::<Vec<_>>();
    ordered.sort_by_key(|round| round.sequence);

    let mut rounds = ordered
        .into_iter()
        .map(|round| {
            images
                .get(&round.image_id)
                .map(|image| Round {
                    answer: image.name.clone(),
                    urls: image.urls.clone(),
                })
                .ok_or_else(|| PlanError::UnknownImage(round.image_id.clone()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    if game.randomize_order {
        rounds.shuffle(rng);
    }
    Ok(rounds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn image(id: &str, name: &str) -> ImageAsset {
        ImageAsset {
            id: id.to_string(),
            name: name.to_string(),
            category: "Guess the Movie".to_string(),
            urls: VariantUrls {
                original_url: format!("https://cdn.example.com/original/{id}"),
                grid15_url: format!("https://cdn.example.com/grid15/{id}"),
                grid10_url: format!("https://cdn.example.com/grid10/{id}"),
                grid5_url: format!("https://cdn.example.com/grid5/{id}"),
            },
            published: true,
            created_at: 0,
            tags: vec![],
        }
    }

    fn catalog() -> HashMap<ImageId, ImageAsset> {
        [("i1", "Jaws"), ("i2", "Alien"), ("i3", "Heat")]
            .into_iter()
            .map(|(id, name)| (id.to_string(), image(id, name)))
            .collect()
    }

    fn game(rounds: &[(&str, u32)], randomize_order: bool) -> GameDefinition {
        GameDefinition {
            id: "g1".into(),
            title: "Films".into(),
            category: "Guess the Movie".into(),
            description: String::new(),
            randomize_order,
            status: GameStatus::Published,
            settings: PhaseDurations::default(),
            rounds: rounds
                .iter()
                .map(|(id, sequence)| GameRound {
                    image_id: id.to_string(),
                    sequence: *sequence,
                })
                .collect(),
            created_at: 0,
        }
    }

    fn answers(rounds: &[Round]) -> Vec<&str> {
        rounds.iter().map(|r| r.answer.as_str()).collect()
    }

    #[test]
    fn rounds_follow_sequence_order() {
        let game = game(&[("i3", 2), ("i1", 0), ("i2", 1)], false);
        let rounds = plan_rounds(&game, &catalog(), &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(answers(&rounds), vec!["Jaws", "Alien", "Heat"]);
        assert_eq!(rounds[0].urls.url(Variant::Grid15), "https://cdn.example.com/grid15/i1");
    }

    #[test]
    fn randomized_games_shuffle_with_the_given_rng() {
        let game = game(&[("i1", 0), ("i2", 1), ("i3", 2)], true);
        let rounds = plan_rounds(&game, &catalog(), &mut StdRng::seed_from_u64(42)).unwrap();

        let mut expected = vec!["Jaws", "Alien", "Heat"];
        expected.shuffle(&mut StdRng::seed_from_u64(42));
        assert_eq!(answers(&rounds), expected);
    }

    #[test]
    fn unknown_images_and_empty_games_are_rejected() {
        let missing = game(&[("i1", 0), ("nope", 1)], false);
        assert_eq!(
            plan_rounds(&missing, &catalog(), &mut StdRng::seed_from_u64(0)),
            Err(PlanError::UnknownImage("nope".into()))
        );
        let empty = game(&[], false);
        assert_eq!(
            plan_rounds(&empty, &catalog(), &mut StdRng::seed_from_u64(0)),
            Err(PlanError::NoRounds)
        );
    }

    #[test]
    fn categories_are_a_closed_list() {
        assert!(is_known_category("Guess the Landmark"));
        assert!(!is_known_category("guess the landmark"));
    }
}
