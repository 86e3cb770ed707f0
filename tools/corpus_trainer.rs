/// Corpus Trainer — trains Markov scorers from tagged phrase corpora.
///
/// Usage: corpus_trainer --vocab <vocab.ron> --input <file.txt> --output <model.ron> [--ngram <2|3|4>]
use std::env;
use std::path::Path;
use std::process;

use mood_seed::core::markov::{save_model, MarkovTrainer};
use mood_seed::core::vocab::Vocabulary;

const USAGE: &str =
    "Usage: corpus_trainer --vocab <vocab.ron> --input <file.txt> --output <model.ron> [--ngram <2|3|4>]";

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().collect();

    let mut vocab = None;
    let mut input = None;
    let mut output = None;
    let mut ngram = 2usize;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--vocab" if i + 1 < args.len() => {
                i += 1;
                vocab = Some(args[i].clone());
            }
            "--input" if i + 1 < args.len() => {
                i += 1;
                input = Some(args[i].clone());
            }
            "--output" if i + 1 < args.len() => {
                i += 1;
                output = Some(args[i].clone());
            }
            "--ngram" if i + 1 < args.len() => {
                i += 1;
                ngram = args[i].parse().unwrap_or_else(|_| {
                    eprintln!("Error: --ngram must be 2, 3, or 4");
                    process::exit(1);
                });
            }
            "--help" | "-h" => {
                println!("{}", USAGE);
                process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {}", other);
                eprintln!("{}", USAGE);
                process::exit(1);
            }
        }
        i += 1;
    }

    let vocab_path = require(vocab, "--vocab");
    let input_path = require(input, "--input");
    let output_path = require(output, "--output");

    let vocab = Vocabulary::load_from_ron(Path::new(&vocab_path)).unwrap_or_else(|e| {
        eprintln!("Error loading vocabulary '{}': {}", vocab_path, e);
        process::exit(1);
    });

    let text = std::fs::read_to_string(&input_path).unwrap_or_else(|e| {
        eprintln!("Error reading input file '{}': {}", input_path, e);
        process::exit(1);
    });

    println!("Training {}-gram model from '{}'...", ngram, input_path);
    let model = MarkovTrainer::train(&text, ngram, &vocab).unwrap_or_else(|e| {
        eprintln!("Error training model: {}", e);
        process::exit(1);
    });

    let transition_count: usize = model.transitions.values().map(|v| v.len()).sum();
    println!(
        "Model trained: {} unique prefixes, {} transitions",
        model.transitions.len(),
        transition_count
    );

    if !model.tagged_transitions.is_empty() {
        let tags: Vec<&str> = vocab
            .emotion_labels()
            .into_iter()
            .filter(|label| {
                vocab
                    .encode_emotion(label)
                    .map(|id| model.tagged_transitions.contains_key(&id))
                    .unwrap_or(false)
            })
            .collect();
        println!("Emotions found: {:?}", tags);
    }

    save_model(&model, Path::new(&output_path)).unwrap_or_else(|e| {
        eprintln!("Error saving model to '{}': {}", output_path, e);
        process::exit(1);
    });

    println!("Model saved to '{}'", output_path);
}

fn require(value: Option<String>, flag: &str) -> String {
    value.unwrap_or_else(|| {
        eprintln!("Error: {} is required", flag);
        eprintln!("{}", USAGE);
        process::exit(1);
    })
}
