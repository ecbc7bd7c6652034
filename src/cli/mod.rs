use clap::{Parser, Subcommand, ValueEnum};
use crate::tvm::{Boc, BocOptions, Cell, TopologicalOrder};
use anyhow::{Context, Result};
use serde::Serialize;
use std::time::Instant;

/// tonboc CLI
#[derive(Parser, Debug)]
#[command(name = "tonboc")]
#[command(about = "Inspect and re-encode Bags of Cells", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Decode a BoC and print every root as a fift hex tree
    Decode {
        /// Hex, base64 or fift hex text, or a file path with --file
        input: String,
        /// Read a raw BoC from the file at INPUT
        #[arg(short, long)]
        file: bool,
        /// Fail unless the bag contains a Merkle proof or update
        #[arg(long)]
        check_proofs: bool,
        /// Print roots as JSON
        #[arg(long)]
        json: bool,
    },
    /// Re-encode a BoC
    Encode {
        /// Hex, base64 or fift hex text
        input: String,
        #[arg(long, value_enum, default_value_t = OutputFormat::Hex)]
        format: OutputFormat,
        /// Omit the CRC-32C checksum
        #[arg(long)]
        no_crc: bool,
        /// Write the cell offset index
        #[arg(long)]
        index: bool,
        #[arg(long)]
        cache_bits: bool,
        /// Lay out cells depth first instead of breadth first
        #[arg(long)]
        depth_first: bool,
    },
    /// Print the representation hash of every root
    Hash {
        /// Hex, base64 or fift hex text, or a file path with --file
        input: String,
        /// Read a raw BoC from the file at INPUT
        #[arg(short, long)]
        file: bool,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputFormat {
    Hex,
    Base64,
    Fift,
}

/// Summary of one root for JSON output
#[derive(Serialize, Debug)]
struct RootInfo {
    index: usize,
    cell_type: String,
    hash: String,
    depth: u16,
    level: u8,
    fift: String,
}

impl RootInfo {
    fn new(index: usize, cell: &Cell) -> Self {
        Self {
            index,
            cell_type: cell.cell_type().to_string(),
            hash: cell.hash_hex(),
            depth: cell.depth(),
            level: cell.level(),
            fift: cell.print(1),
        }
    }
}

fn load_boc(input: &str, from_file: bool, check_proofs: bool) -> Result<Boc> {
    let start = Instant::now();
    let boc = if from_file {
        let data = std::fs::read(input).with_context(|| format!("Failed to read {}", input))?;
        Boc::from_bytes(&data, check_proofs).context("Failed to deserialize BoC file")?
    } else {
        Boc::from_str_checked(input, check_proofs).context("Failed to parse BoC")?
    };
    log::debug!(
        "Loaded {} root(s) in {:.3}s",
        boc.roots().len(),
        start.elapsed().as_secs_f64()
    );
    Ok(boc)
}

impl Cli {
    /// Parse command line arguments
    pub fn parse_args() -> Self {
        Cli::parse()
    }

    /// Execute the command
    pub fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Decode {
                input,
                file,
                check_proofs,
                json,
            } => self.execute_decode(input, *file, *check_proofs, *json),
            Commands::Encode {
                input,
                format,
                no_crc,
                index,
                cache_bits,
                depth_first,
            } => {
                let options = BocOptions {
                    has_index: *index,
                    hash_crc32: !*no_crc,
                    has_cache_bits: *cache_bits,
                    topological_order: if *depth_first {
                        TopologicalOrder::DepthFirst
                    } else {
                        TopologicalOrder::BreadthFirst
                    },
                    flags: 0,
                };
                self.execute_encode(input, *format, &options)
            }
            Commands::Hash { input, file } => self.execute_hash(input, *file),
        }
    }

    fn execute_decode(&self, input: &str, file: bool, check_proofs: bool, json: bool) -> Result<()> {
        let boc = load_boc(input, file, check_proofs)?;

        if json {
            let roots: Vec<RootInfo> = boc
                .roots()
                .iter()
                .enumerate()
                .map(|(i, root)| RootInfo::new(i, root))
                .collect();
            println!("{}", serde_json::to_string_pretty(&roots)?);
            return Ok(());
        }

        for (i, root) in boc.roots().iter().enumerate() {
            println!(
                "root #{} {} hash={} depth={} level={}",
                i,
                root.cell_type(),
                root.hash_hex(),
                root.depth(),
                root.level()
            );
            print!("{}", root.print(1));
        }
        Ok(())
    }

    fn execute_encode(&self, input: &str, format: OutputFormat, options: &BocOptions) -> Result<()> {
        let boc = load_boc(input, false, false)?;

        let output = match format {
            OutputFormat::Hex => boc.to_hex(options)?,
            OutputFormat::Base64 => boc.to_base64(options)?,
            OutputFormat::Fift => boc.to_fift(),
        };
        log::info!("Encoded {} root(s) as {:?}", boc.roots().len(), format);
        println!("{}", output.trim_end());
        Ok(())
    }

    fn execute_hash(&self, input: &str, file: bool) -> Result<()> {
        let boc = load_boc(input, file, false)?;
        for root in &boc {
            println!("{}", root.hash_hex());
        }
        Ok(())
    }
}
