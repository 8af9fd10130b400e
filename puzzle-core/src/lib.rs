pub mod catalog;
pub mod guess;
pub mod reveal;
pub mod scramble;

pub use catalog::{
    is_known_category, plan_rounds, GameDefinition, GameId, GameRound, GameStatus, ImageAsset,
    ImageId, PlanError, VariantUrls, CATEGORIES,
};
pub use guess::{judge_guess, normalize_words, score_guess, GuessVerdict};
pub use reveal::{
    AnswerRecord, Phase, PhaseDurations, Round, Session, SessionError, SessionEvent,
    SessionStatus,
};
pub use scramble::{
    decode, encode, normalize, regenerate_grids, render_variants, scramble, scramble_with_rng,
    GridRenditions, GridSize, OutputFormat, RenderOptions, RenderedVariants, ScrambleError,
    Variant,
};
