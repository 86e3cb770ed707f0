/// Preview — interactive shell for inspecting seed phrase decoding.
///
/// Usage: preview (--config <engine.ron> | --vocab <vocab.ron> --model <model.ron>)
///                [--beam-width <k>] [--max-len <m>] [--seed <n>] [<emotion>...]
///
/// With emotion labels, prints their ranked phrases and exits. Without,
/// starts an interactive shell.
///
/// Commands:
///   gen <emotion>      — ranked phrases with scores
///   words <emotion>    — cleaned seed words (with fallback)
///   brief <emotion>    — story brief: mood, tone, words
///   width <k>          — set beam width
///   maxlen <m|default> — set step budget
///   emotions           — list known emotion labels
///   help               — list commands
///   quit               — exit

use mood_seed::core::beam::{BeamSearch, Termination};
use mood_seed::core::pipeline::{SeedEngine, SeedEngineBuilder};
use mood_seed::core::ranking::SeedPhrase;
use std::io::{self, BufRead, Write};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let mut options = parse_args(&args[1..]).unwrap_or_else(|message| {
        eprintln!("{}", message);
        print_usage();
        std::process::exit(1);
    });
    let emotions = std::mem::take(&mut options.emotions);
    let builder = options.into_builder();

    let engine = builder.build().unwrap_or_else(|e| {
        eprintln!("Error building engine: {}", e);
        std::process::exit(1);
    });

    let mut search = engine.search();

    if !emotions.is_empty() {
        let mut failed = false;
        for emotion in &emotions {
            println!("[{}]", emotion);
            match engine.generate_with(emotion, search) {
                Ok(phrases) => print_phrases(&phrases),
                Err(e) => {
                    eprintln!("ERROR: {}", e);
                    failed = true;
                }
            }
        }
        if failed {
            std::process::exit(1);
        }
        return;
    }

    let mut brief_count: u64 = 0;

    println!(
        "Loaded vocabulary: {} tokens, {} emotions",
        engine.vocabulary().size(),
        engine.vocabulary().emotion_labels().len()
    );
    println!("Type 'help' for commands.\n");

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("preview> ");
        stdout.flush().ok();

        let mut line = String::new();
        if stdin.lock().read_line(&mut line).is_err() || line.is_empty() {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let parts: Vec<&str> = line.split_whitespace().collect();
        let cmd = parts[0].to_lowercase();

        match cmd.as_str() {
            "quit" | "exit" | "q" => {
                println!("Goodbye.");
                break;
            }
            "help" | "h" | "?" => {
                print_help();
            }
            "emotions" => {
                println!("{}", engine.vocabulary().emotion_labels().join(", "));
            }
            "gen" => {
                let Some(emotion) = parts.get(1) else {
                    println!("Usage: gen <emotion>");
                    continue;
                };
                match engine.generate_with(emotion, search) {
                    Ok(phrases) => {
                        println!("\n--- {} candidates ---", phrases.len());
                        print_phrases(&phrases);
                        println!("--- End ---\n");
                    }
                    Err(e) => println!("ERROR: {}", e),
                }
            }
            "words" => {
                let Some(emotion) = parts.get(1) else {
                    println!("Usage: words <emotion>");
                    continue;
                };
                println!("{}", engine.seed_words(emotion).join(", "));
            }
            "brief" => {
                let Some(emotion) = parts.get(1) else {
                    println!("Usage: brief <emotion>");
                    continue;
                };
                let brief = engine.brief(emotion, brief_count);
                brief_count += 1;
                println!("Mood:  {}", brief.mood);
                println!("Tone:  {}", brief.tone);
                println!("Words: {}", brief.words.join(", "));
            }
            "width" => match parts.get(1).and_then(|s| s.parse::<usize>().ok()) {
                Some(width) if width > 0 => {
                    search.beam_width = width;
                    println!("Beam width set to {}", width);
                }
                _ => println!("Usage: width <k>  (k >= 1, current: {})", search.beam_width),
            },
            "maxlen" => match parts.get(1).copied() {
                Some("default") => {
                    search = BeamSearch {
                        max_len: None,
                        ..search
                    };
                    println!(
                        "Step budget reset to vocabulary default ({})",
                        engine.vocabulary().max_len()
                    );
                }
                Some(value) => match value.parse::<usize>() {
                    Ok(max_len) => {
                        search = search.with_max_len(max_len);
                        println!("Step budget set to {}", max_len);
                    }
                    Err(_) => println!("Usage: maxlen <m|default>"),
                },
                None => println!("Usage: maxlen <m|default>"),
            },
            other => {
                println!("Unknown command: {}. Type 'help' for commands.", other);
            }
        }
    }
}

/// Command-line options, before any file is read.
#[derive(Debug, Default, PartialEq)]
struct PreviewArgs {
    config: Option<String>,
    vocab: Option<String>,
    model: Option<String>,
    beam_width: Option<usize>,
    max_len: Option<usize>,
    seed: Option<u64>,
    emotions: Vec<String>,
}

impl PreviewArgs {
    fn into_builder(self) -> SeedEngineBuilder {
        let mut builder = SeedEngine::builder();
        if let Some(path) = self.config {
            builder = builder.config_file(&path);
        }
        if let Some(path) = self.vocab {
            builder = builder.vocabulary_path(&path);
        }
        if let Some(path) = self.model {
            builder = builder.model_path(&path);
        }
        if let Some(width) = self.beam_width {
            builder = builder.beam_width(width);
        }
        if let Some(max_len) = self.max_len {
            builder = builder.max_len(max_len);
        }
        if let Some(seed) = self.seed {
            builder = builder.seed(seed);
        }
        builder
    }
}

fn parse_args(args: &[String]) -> Result<PreviewArgs, String> {
    let mut options = PreviewArgs::default();

    let mut i = 0;
    while i < args.len() {
        match args[i].as_str() {
            "--config" if i + 1 < args.len() => {
                i += 1;
                options.config = Some(args[i].clone());
            }
            "--vocab" if i + 1 < args.len() => {
                i += 1;
                options.vocab = Some(args[i].clone());
            }
            "--model" if i + 1 < args.len() => {
                i += 1;
                options.model = Some(args[i].clone());
            }
            "--beam-width" if i + 1 < args.len() => {
                i += 1;
                options.beam_width = Some(parse_value(&args[i], "--beam-width")?);
            }
            "--max-len" if i + 1 < args.len() => {
                i += 1;
                options.max_len = Some(parse_value(&args[i], "--max-len")?);
            }
            "--seed" if i + 1 < args.len() => {
                i += 1;
                options.seed = Some(parse_value(&args[i], "--seed")?);
            }
            arg if !arg.starts_with('-') => options.emotions.push(arg.to_string()),
            other => return Err(format!("Unknown argument: {}", other)),
        }
        i += 1;
    }
    Ok(options)
}

fn parse_value<T: std::str::FromStr>(value: &str, flag: &str) -> Result<T, String> {
    value
        .parse()
        .map_err(|_| format!("Error: invalid value for {}: {}", flag, value))
}

fn print_phrases(phrases: &[SeedPhrase]) {
    for (rank, phrase) in phrases.iter().enumerate() {
        let marker = match phrase.termination {
            Termination::Natural => "",
            Termination::Forced => " (forced)",
        };
        println!(
            "{:>3}. {:<40} {:.4}{}",
            rank + 1,
            format!("\"{}\"", phrase.text),
            phrase.score,
            marker
        );
    }
}

fn print_usage() {
    println!("Usage: preview (--config <engine.ron> | --vocab <vocab.ron> --model <model.ron>)");
    println!("               [--beam-width <k>] [--max-len <m>] [--seed <n>] [<emotion>...]");
}

fn print_help() {
    println!("Commands:");
    println!("  gen <emotion>      — ranked phrases with scores");
    println!("  words <emotion>    — cleaned seed words (with fallback)");
    println!("  brief <emotion>    — story brief: mood, tone, words");
    println!("  width <k>          — set beam width");
    println!("  maxlen <m|default> — set step budget");
    println!("  emotions           — list known emotion labels");
    println!("  help               — list commands");
    println!("  quit               — exit");
}
