use std::sync::Arc;
use std::{env, fs, io};

use anyhow::{bail, Context, Result};
use env_logger::Env;
use kmercolor::{AlphabetKind, ColorIndex, IndexConfig, Kmer};
use log::{debug, info};
use seq_io::fasta;

/// Reads every sequence of a (possibly compressed) FASTA file
fn read_fasta(path: &str) -> Result<Vec<Vec<u8>>> {
    let (reader, format) =
        niffler::from_path(path).with_context(|| format!("failed to open {path}"))?;
    debug!("{path}: {format:?} compression");
    let mut fasta = fasta::Reader::new(reader);
    let mut sequences = Vec::new();
    while let Some(record) = fasta.next() {
        let record = record.with_context(|| format!("invalid FASTA in {path}"))?;
        sequences.push(record.full_seq().into_owned());
    }
    Ok(sequences)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.len() < 2 {
        bail!("usage: kmercolor <k> <colors.fa>... [--alphabet dna|rna|dna-iupac|protein] [--table out.bin]");
    }

    let k: usize = args[0].parse().context("k must be a positive integer")?;
    let mut alphabet = AlphabetKind::Dna;
    let mut table = None;
    let mut paths = Vec::new();
    let mut rest = args[1..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--alphabet" => {
                let name = rest.next().context("--alphabet needs a value")?;
                alphabet = name.parse()?;
            }
            "--table" => table = Some(rest.next().context("--table needs a path")?.clone()),
            path => paths.push(path.to_string()),
        }
    }

    let config = IndexConfig::builder()
        .alphabet(alphabet)
        .k(k)
        .canonicalize(alphabet != AlphabetKind::Protein)
        .max_substitutions(1)
        .color_universe_size(paths.len())
        .build()?;

    // one color per input file
    let mut records = Vec::new();
    for (color, path) in paths.iter().enumerate() {
        let sequences = read_fasta(path)?;
        info!("{path}: {} sequences as color {color}", sequences.len());
        records.extend(sequences.into_iter().map(|seq| (color, seq)));
    }
    let first_window = records
        .first()
        .and_then(|(_, seq)| seq.get(..k).map(<[u8]>::to_vec));

    let index = Arc::new(config.color_index()?);
    let stats = ColorIndex::build_parallel(&index, records, config.num_threads())?;
    println!(
        "sequences: {}\nk-mers: {}\ndistinct k-mers: {}\ncolor sets: {}",
        stats.sequences, stats.kmers, stats.distinct_kmers, stats.color_sets
    );

    if let Some(window) = first_window {
        if let Ok(kmer) = Kmer::from_bytes(config.alphabet(), &window) {
            for (variant, id) in index.lookup_approximate(&kmer, config.max_substitutions())? {
                let colors = index.registry().get(id)?;
                println!("{}\t{}\t{colors}", variant.kmer, variant.substitutions);
            }
        }
    }

    if let Some(path) = table {
        let mut writer = io::BufWriter::new(fs::File::create(&path)?);
        index.registry().write_table(&mut writer)?;
        info!("Wrote color table to {path}");
    }

    Ok(())
}
