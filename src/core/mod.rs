pub mod beam;
pub mod fallback;
pub mod markov;
pub mod pipeline;
pub mod ranking;
pub mod scorer;
pub mod vocab;
