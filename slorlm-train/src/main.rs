use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use slorlm_core::estimate::HillClimbing;
use slorlm_core::io::{collect_words, open_corpus, read_sentences};
use slorlm_core::model::tokenizer::TAG_SEPARATOR;
use slorlm_core::{LanguageModel, ModelConfig, Smoothing, persistence, required_keys};

#[derive(Parser, Debug)]
#[command(name = "slorlm-train")]
#[command(about = "Train n-gram language models and score sentences")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train a model on a corpus and save it
    Train {
        /// Training corpus, one sentence per line (count tables for google models)
        #[arg(short, long)]
        input: PathBuf,

        /// Index file of the saved model
        #[arg(short, long)]
        model: PathBuf,

        /// JSON model configuration; command line options take precedence
        #[arg(long)]
        config: Option<PathBuf>,

        /// Order of the model
        #[arg(short, long)]
        order: Option<usize>,

        /// Smoothing method, or "sniff" to detect tagged corpora
        #[arg(short, long)]
        smoothing: Option<String>,

        /// Drop top-order n-grams seen this many times or fewer
        #[arg(long)]
        cutoff: Option<u64>,

        /// Corpus whose vocabulary restricts a stingy model
        #[arg(long)]
        test_corpus: Option<PathBuf>,

        /// Held-out corpus used to estimate the discount
        #[arg(long)]
        estimate: Option<PathBuf>,

        /// Seed of the discount estimator
        #[arg(long, default_value_t = 0)]
        seed: u64,
    },
    /// Score every sentence of a corpus with a saved model (CSV on stdout)
    Score {
        /// Index file of the saved model
        #[arg(short, long)]
        model: PathBuf,

        /// Sentences to score, one per line
        #[arg(short, long)]
        input: PathBuf,

        /// Only load the counts needed by the input sentences
        #[arg(long)]
        restrict: bool,
    },
}

/// Picks tagged Kneser-Ney when the first token of the corpus looks like `word/TAG`.
fn sniff<P: AsRef<Path>>(corpus: P) -> Result<Smoothing, Box<dyn std::error::Error>> {
    for line in open_corpus(corpus)?.lines() {
        let line = line?;
        if let Some(token) = line.split_whitespace().next() {
            return Ok(if token.contains(TAG_SEPARATOR) { Smoothing::TagKneserNey } else { Smoothing::KneserNey });
        }
    }
    Ok(Smoothing::KneserNey)
}

fn parse_smoothing(name: &str, corpus: &Path) -> Result<Smoothing, Box<dyn std::error::Error>> {
    if name == "sniff" {
        let smoothing = sniff(corpus)?;
        log::info!("Sniffed smoothing: {}", smoothing);
        return Ok(smoothing);
    }
    match name.parse() {
        Ok(smoothing) => Ok(smoothing),
        Err(err) => {
            log::warn!("{}, falling back to {}", err, Smoothing::KneserNey);
            Ok(Smoothing::KneserNey)
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn train(
    input: &Path,
    model_path: &Path,
    config: Option<&Path>,
    order: Option<usize>,
    smoothing: Option<&str>,
    cutoff: Option<u64>,
    test_corpus: Option<&Path>,
    estimate: Option<&Path>,
    seed: u64,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = match config {
        Some(path) => ModelConfig::from_json_file(path)?,
        None => ModelConfig::default(),
    };
    if let Some(name) = smoothing {
        config.set_smoothing(parse_smoothing(name, input)?);
    }
    if let Some(order) = order {
        config.set_order(order)?;
    }
    if let Some(cutoff) = cutoff {
        config.set_cutoff(cutoff);
    }

    let mut model = match config.smoothing() {
        Smoothing::Google => LanguageModel::from_google_counts(open_corpus(input)?, config.order())?,
        Smoothing::StingyKneserNey => {
            let test_corpus = test_corpus.ok_or("a stingy model needs --test-corpus")?;
            let vocabulary = collect_words(open_corpus(test_corpus)?)?;
            log::info!("Restricting training to {} words", vocabulary.len());
            LanguageModel::train_restricted(config, open_corpus(input)?, &vocabulary)?
        }
        _ => LanguageModel::train(config, open_corpus(input)?)?,
    };

    if let Some(held_out) = estimate {
        if model.smoothing().is_kneser_ney() {
            let held_out = read_sentences(held_out)?;
            model.estimate_discount(&HillClimbing::default().with_seed(seed), &held_out)?;
        } else {
            log::warn!("Discount estimation only applies to Kneser-Ney models, ignoring --estimate");
        }
    }

    persistence::save(&model, model_path)?;
    Ok(())
}

fn score(model_path: &Path, input: &Path, restrict: bool) -> Result<(), Box<dyn std::error::Error>> {
    let sentences = read_sentences(input)?;
    let model = if restrict {
        let index = persistence::ModelIndex::read(model_path)?;
        let keys = required_keys(index.smoothing, index.order, &sentences)?;
        log::info!("Loading {} keys needed by {} sentences", keys.len(), sentences.len());
        persistence::load_restricted(model_path, &keys)?
    } else {
        persistence::load(model_path)?
    };

    write_scores(&model, &sentences, std::io::stdout().lock())
}

/// Writes one CSV row of scores per sentence, after a header row.
fn write_scores<W: Write>(model: &LanguageModel, sentences: &[String], writer: W) -> Result<(), Box<dyn std::error::Error>> {
    let mut writer = csv::Writer::from_writer(writer);
    for sentence in sentences {
        writer.serialize(model.combined_scores(sentence)?)?;
    }
    writer.flush()?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    match Args::parse().command {
        Command::Train { input, model, config, order, smoothing, cutoff, test_corpus, estimate, seed } => train(
            &input,
            &model,
            config.as_deref(),
            order,
            smoothing.as_deref(),
            cutoff,
            test_corpus.as_deref(),
            estimate.as_deref(),
            seed,
        ),
        Command::Score { model, input, restrict } => score(&model, &input, restrict),
    }
}
