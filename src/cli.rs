//! Command-line surface (spec §6). Subcommand layout follows the original
//! tool's `ngrams`, `counts`, `diff`, `sdiff`, `intersect`, `sintersect`,
//! `search`, `catalogue`, and `results` commands; the XML-pipeline and
//! report-generating commands are out of scope (spec §8 Non-goals).

use std::collections::HashSet;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Write};
use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::catalogue::Catalogue;
use crate::corpus::Corpus;
use crate::error::{ConfigurationError, TaclError};
use crate::results::{self, OutputTable, ResultRow, Results};
use crate::store::{CountsRow, DataStore};
use crate::tokenizer::Tokenizer;

#[derive(Parser)]
#[command(name = "tacl")]
#[command(about = "Set-algebraic n-gram analysis over labelled corpora of textual witnesses")]
#[command(version)]
pub struct Cli {
    /// Increase log verbosity; may be repeated (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum TokenizerChoice {
    Cbeta,
    Pagel,
}

impl TokenizerChoice {
    fn build(self) -> Tokenizer {
        match self {
            TokenizerChoice::Cbeta => Tokenizer::cbeta(),
            TokenizerChoice::Pagel => Tokenizer::pagel(),
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Generate and store n-grams for every witness in a corpus.
    Ngrams {
        db: PathBuf,
        corpus: PathBuf,
        #[arg(short = 'n', long)]
        min_size: usize,
        #[arg(short = 'a', long)]
        max_size: usize,
        #[arg(short, long, value_enum, default_value = "cbeta")]
        tokenizer: TokenizerChoice,
        /// Restrict ingestion to the works listed in this catalogue.
        #[arg(short, long)]
        catalogue: Option<PathBuf>,
    },
    /// Emit per-witness, per-size n-gram aggregates for a catalogue.
    Counts {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Emit n-grams occurring under exactly one label.
    Diff {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        /// Restrict to n-grams unique to this label versus all others.
        #[arg(short = 'a', long)]
        asymmetric: Option<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Diff against previously computed results, each set assigned an
    /// explicit label (`-s LABEL FILE`, repeatable).
    Sdiff {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        #[arg(
            short = 's',
            long = "supplied",
            num_args = 2,
            value_names = ["LABEL", "FILE"],
            action = clap::ArgAction::Append,
            required = true
        )]
        supplied: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Emit n-grams occurring under every label.
    Intersect {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Intersect against previously computed results, each set assigned an
    /// explicit label (`-s LABEL FILE`, repeatable).
    Sintersect {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        #[arg(
            short = 's',
            long = "supplied",
            num_args = 2,
            value_names = ["LABEL", "FILE"],
            action = clap::ArgAction::Append,
            required = true
        )]
        supplied: Vec<String>,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Emit occurrences of specific n-grams, including count-0 rows for
    /// witnesses lacking them.
    Search {
        db: PathBuf,
        corpus: PathBuf,
        catalogue: PathBuf,
        /// Path to a file listing the n-grams to search for, one per line.
        ngrams: PathBuf,
        #[arg(short, long, value_enum, default_value = "cbeta")]
        tokenizer: TokenizerChoice,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Generate or validate a catalogue.
    Catalogue {
        corpus: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
        /// Default label assigned to every work (generate mode).
        #[arg(short, long)]
        label: Option<String>,
    },
    /// Apply the results algebra to a results file, in the fixed order:
    /// extend, bifurcated_extend, reduce, reciprocal_remove, zero_fill, the
    /// prune_* family, remove_label, sort, add_label_count,
    /// add_label_work_count, then at most one of group_by_ngram /
    /// group_by_witness / collapse_witnesses.
    Results {
        /// Path to a results CSV, or `-` for stdin.
        input: String,
        #[arg(short, long, value_enum, default_value = "cbeta")]
        tokenizer: TokenizerChoice,
        #[arg(long)]
        corpus: Option<PathBuf>,
        #[arg(long)]
        extend: bool,
        #[arg(long)]
        bifurcated_extend: bool,
        #[arg(long = "max-be-count")]
        max_be_count: Option<usize>,
        #[arg(long)]
        reduce: bool,
        #[arg(long)]
        reciprocal: bool,
        #[arg(short = 'z', long)]
        zero_fill: bool,
        #[arg(long = "ngrams")]
        prune_ngrams: Option<PathBuf>,
        #[arg(long = "min-works")]
        min_works: Option<u32>,
        #[arg(long = "max-works")]
        max_works: Option<u32>,
        #[arg(long = "min-size")]
        min_size: Option<u32>,
        #[arg(long = "max-size")]
        max_size: Option<u32>,
        #[arg(long = "min-count")]
        min_count: Option<u32>,
        #[arg(long = "max-count")]
        max_count: Option<u32>,
        #[arg(long = "min-count-work")]
        min_count_work: Option<u32>,
        #[arg(long = "max-count-work")]
        max_count_work: Option<u32>,
        #[arg(long = "remove")]
        remove_label: Option<String>,
        #[arg(long)]
        sort: bool,
        #[arg(long = "add-label-count")]
        add_label_count: bool,
        #[arg(long = "add-label-work-count")]
        add_label_work_count: bool,
        /// Pivot into the n-gram-grouped table, with a column per label in
        /// the order this catalogue's `ordered_labels()` gives.
        #[arg(long = "group-by-ngram")]
        group_by_ngram: Option<PathBuf>,
        #[arg(long = "group-by-witness")]
        group_by_witness: bool,
        #[arg(long = "collapse-witnesses")]
        collapse_witnesses: bool,
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

/// Parses arguments and runs the selected subcommand, writing its own
/// output. Returns the process's `TaclError`, if any.
pub fn run(cli: Cli) -> Result<(), TaclError> {
    match cli.command {
        Command::Ngrams { corpus, db, min_size, max_size, tokenizer, catalogue } => {
            let corpus = Corpus::new(corpus);
            let store = DataStore::open(db)?;
            let catalogue = catalogue.map(Catalogue::load).transpose()?;
            store.add_ngrams(&corpus, &tokenizer.build(), min_size, max_size, catalogue.as_ref())?;
            Ok(())
        }
        Command::Counts { db, corpus, catalogue, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let rows = store.counts(&corpus, &catalogue)?;
            write_counts_rows(output, &rows)
        }
        Command::Diff { db, corpus, catalogue, asymmetric, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let rows = match asymmetric {
                Some(label) => store.diff_asymmetric(&corpus, &catalogue, &label)?,
                None => store.diff(&corpus, &catalogue)?,
            };
            write_rows(output, &rows)
        }
        Command::Sdiff { db, corpus, catalogue, supplied, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let (supplied_rows, labels) = load_supplied(&supplied)?;
            let rows = store.diff_supplied(&corpus, &catalogue, &supplied_rows, &labels)?;
            write_rows(output, &rows)
        }
        Command::Intersect { db, corpus, catalogue, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let rows = store.intersection(&corpus, &catalogue)?;
            write_rows(output, &rows)
        }
        Command::Sintersect { db, corpus, catalogue, supplied, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let (supplied_rows, labels) = load_supplied(&supplied)?;
            let rows = store.intersection_supplied(&corpus, &catalogue, &supplied_rows, &labels)?;
            write_rows(output, &rows)
        }
        Command::Search { db, corpus, catalogue, ngrams, tokenizer, output } => {
            let store = DataStore::open(db)?;
            let corpus = Corpus::new(corpus);
            let catalogue = Catalogue::load(catalogue)?;
            let ngrams: HashSet<String> = std::fs::read_to_string(ngrams)?
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect();
            let rows = store.search(&corpus, &catalogue, &tokenizer.build(), &ngrams)?;
            write_rows(output, &rows)
        }
        Command::Catalogue { corpus, output, label } => {
            let catalogue = match label {
                Some(label) => Catalogue::generate(corpus, &label)?,
                None => return Err(ConfigurationError::new("catalogue generation requires --label").into()),
            };
            catalogue.save(output)?;
            Ok(())
        }
        Command::Results {
            input,
            tokenizer,
            corpus,
            extend,
            bifurcated_extend,
            max_be_count,
            reduce,
            reciprocal,
            zero_fill,
            prune_ngrams,
            min_works,
            max_works,
            min_size,
            max_size,
            min_count,
            max_count,
            min_count_work,
            max_count_work,
            remove_label,
            sort,
            add_label_count,
            add_label_work_count,
            group_by_ngram,
            group_by_witness,
            collapse_witnesses,
            output,
        } => {
            results::validate_format_flags(group_by_ngram.is_some(), group_by_witness, collapse_witnesses)?;
            if bifurcated_extend && max_be_count.is_none() {
                return Err(ConfigurationError::new("--bifurcated-extend requires --max-be-count").into());
            }
            if (extend || bifurcated_extend || zero_fill) && corpus.is_none() {
                return Err(ConfigurationError::new("--extend/--bifurcated-extend/--zero-fill require --corpus").into());
            }

            let mut results = load_results(&input, tokenizer.build())?;
            let corpus = corpus.map(Corpus::new);

            if extend {
                results.extend(corpus.as_ref().expect("checked above"))?;
            }
            if bifurcated_extend {
                results.bifurcated_extend(corpus.as_ref().expect("checked above"), max_be_count.expect("checked above"))?;
            }
            if reduce {
                results.reduce();
            }
            if reciprocal {
                results.reciprocal_remove();
            }
            if zero_fill {
                results.zero_fill(corpus.as_ref().expect("checked above"))?;
            }
            if let Some(path) = prune_ngrams {
                let ngrams: HashSet<String> = std::fs::read_to_string(path)?
                    .lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(str::to_string)
                    .collect();
                results.prune_by_ngram(&ngrams);
            }
            if min_works.is_some() || max_works.is_some() {
                results.prune_by_work_count(min_works, max_works);
            }
            if min_size.is_some() || max_size.is_some() {
                results.prune_by_ngram_size(min_size, max_size);
            }
            if min_count.is_some() || max_count.is_some() {
                results.prune_by_ngram_count(min_count, max_count);
            }
            if min_count_work.is_some() || max_count_work.is_some() {
                results.prune_by_ngram_count_per_work(min_count_work, max_count_work);
            }
            if let Some(label) = remove_label {
                results.remove_label(&label);
            }
            if sort {
                results.sort();
            }
            if add_label_count {
                results.add_label_count();
            }
            if add_label_work_count {
                results.add_label_work_count();
            }

            let output_table = if let Some(catalogue_path) = group_by_ngram {
                let ordered_labels = Catalogue::load(catalogue_path)?.ordered_labels();
                OutputTable::NgramGroups(results::group_by_ngram(results, &ordered_labels))
            } else if group_by_witness {
                OutputTable::WitnessGroups(results::group_by_witness(results))
            } else if collapse_witnesses {
                OutputTable::Rows(results::collapse_witnesses(results))
            } else {
                OutputTable::Rows(results)
            };

            write_output_table(output, &output_table)
        }
    }
}

/// Parses `-s LABEL FILE` pairs (flattened by clap into `[LABEL, FILE,
/// LABEL, FILE, ...]`), loading each FILE's rows and overwriting their
/// label column with the paired LABEL.
fn load_supplied(pairs: &[String]) -> Result<(Vec<ResultRow>, Vec<String>), TaclError> {
    let mut rows = Vec::new();
    let mut labels = Vec::new();
    for pair in pairs.chunks(2) {
        let (label, path) = (&pair[0], &pair[1]);
        labels.push(label.clone());
        let mut loaded = results::load_rows(BufReader::new(File::open(path)?))?;
        for row in &mut loaded {
            row.label = label.clone();
        }
        rows.extend(loaded);
    }
    Ok((rows, labels))
}

fn load_results(input: &str, tokenizer: Tokenizer) -> Result<Results, TaclError> {
    if input == "-" {
        Ok(Results::load(io::stdin().lock(), tokenizer)?)
    } else {
        Ok(Results::load(BufReader::new(File::open(input)?), tokenizer)?)
    }
}

fn write_rows(output: Option<PathBuf>, rows: &[ResultRow]) -> Result<(), TaclError> {
    match output {
        Some(path) => Ok(results::write_rows(BufWriter::new(File::create(path)?), rows)?),
        None => Ok(results::write_rows(io::stdout().lock(), rows)?),
    }
}

fn write_output_table(output: Option<PathBuf>, table: &OutputTable) -> Result<(), TaclError> {
    match output {
        Some(path) => Ok(table.write_csv(BufWriter::new(File::create(path)?))?),
        None => Ok(table.write_csv(io::stdout().lock())?),
    }
}

fn write_counts_rows(output: Option<PathBuf>, rows: &[CountsRow]) -> Result<(), TaclError> {
    match output {
        Some(path) => Ok(crate::store::write_counts_rows(BufWriter::new(File::create(path)?), rows)?),
        None => Ok(crate::store::write_counts_rows(io::stdout().lock(), rows)?),
    }
}
