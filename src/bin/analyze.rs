use std::fs::File;
use std::io::BufWriter;
use std::path::PathBuf;
use std::time::Instant;
use std::{env, process};

use mini_assembly::{AlignmentBase, AnalysisParams, Backend, OrientedReadId, StoreInterface};
use mini_assembly::analyze::{self, BackendGraph};
use mini_assembly::formats;

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();

    // Open the database.
    let database = AlignmentBase::open(&config.db_file).map_err(|x| x.to_string())?;
    eprintln!(
        "Opened {} with {} reads and {} alignments",
        config.db_file.display(), database.reads(), database.alignments()
    );
    let mut interface = StoreInterface::new(&database).map_err(|x| x.to_string())?;

    // Coverage analysis.
    let coverage = analyze::analyze_coverage(config.query, &mut interface).map_err(|x| x.to_string())?;
    eprintln!(
        "Read {} has {} markers and {} alignments",
        config.query, coverage.marker_count(), coverage.alignment_count()
    );
    let histograms = coverage.histograms();
    write_report(&config, "OrdinalTable.csv", |out| {
        formats::write_ordinal_table(out, &coverage)
    })?;
    write_report(&config, "CoverageHistogram.csv", |out| {
        formats::write_coverage_histogram(out, &histograms)
    })?;
    write_report(&config, "CoverageRatioHistogram.csv", |out| {
        formats::write_coverage_ratio_histogram(out, &histograms)
    })?;

    // Mini-assembly.
    let analysis = analyze::analyze_read(config.query, &mut interface, &config.params).map_err(|x| x.to_string())?;
    let (vertices, edges) = analysis.graph.size();
    eprintln!(
        "The {} graph has {} vertices and {} edges after simplification",
        config.params.backend, vertices, edges
    );
    eprintln!("Found {} branch loci", analysis.bubble_count());

    if let BackendGraph::DeBruijn(_, vertex_histograms) = &analysis.graph {
        write_report(&config, "VertexCoverageHistogram.csv", |out| {
            formats::write_vertex_coverage_histogram(out, vertex_histograms)
        })?;
    }
    write_report(&config, "SimilarityMatrix.csv", |out| {
        formats::write_similarity_matrix(out, &analysis.consistency)
    })?;
    write_report(&config, "BubbleSummary.csv", |out| {
        formats::write_bubble_summary(out, &analysis)
    })?;
    write_report(&config, "ConsensusGraph.dot", |out| {
        formats::write_consensus_graph(out, &analysis)
    })?;
    write_report(&config, "ReadSimilarityGraph.dot", |out| {
        formats::write_read_similarity_graph(out, &analysis, config.params.neighbor_count)
    })?;

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

fn write_report<F>(config: &Config, name: &str, writer: F) -> Result<(), String>
where
    F: FnOnce(&mut BufWriter<File>) -> std::io::Result<()>,
{
    let filename = format!("{}-{}", config.prefix, name);
    let file = File::create(&filename).map_err(|x| x.to_string())?;
    let mut out = BufWriter::new(file);
    writer(&mut out).map_err(|x| x.to_string())?;
    eprintln!("Wrote {}", filename);
    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub db_file: PathBuf,
    pub query: OrientedReadId,
    pub params: AnalysisParams,
    pub prefix: String,
}

impl Config {
    pub fn new() -> Config {
        let mut params = AnalysisParams::default();

        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] alignments.db", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("r", "read", "query read id (required)", "INT");
        opts.optopt("s", "strand", "query strand (default: 0)", "0|1");
        let backend_desc = format!("graph backend: de-bruijn or marker-graph (default: {})", params.backend);
        opts.optopt("b", "backend", &backend_desc, "STR");
        let window_desc = format!("window length of the de-bruijn backend (default: {})", params.window_length);
        opts.optopt("k", "window", &window_desc, "INT");
        let total_desc = format!("minimum total coverage (default: {})", params.min_total_coverage);
        opts.optopt("", "min-coverage", &total_desc, "INT");
        let same_desc = format!("minimum same-strand coverage (default: {})", params.min_same_strand_coverage);
        opts.optopt("", "min-same-strand", &same_desc, "INT");
        let opposite_desc = format!("minimum opposite-strand coverage (default: {})", params.min_opposite_strand_coverage);
        opts.optopt("", "min-opposite-strand", &opposite_desc, "INT");
        let neighbor_desc = format!("average degree of the read similarity graph (default: {})", params.neighbor_count);
        opts.optopt("n", "neighbors", &neighbor_desc, "INT");
        opts.optopt("o", "output", "prefix of the report files (default: <read>-<strand>)", "STR");
        let matches = match opts.parse(&args[1..]) {
            Ok(m) => m,
            Err(f) => {
                eprintln!("{}", f);
                process::exit(1);
            }
        };

        if matches.opt_present("h") {
            eprint!("{}", opts.usage(&header));
            process::exit(0);
        }

        let read_id = match matches.opt_str("r") {
            Some(s) => match s.parse::<u32>() {
                Ok(id) => id,
                Err(_) => {
                    eprintln!("Invalid read id: {}", s);
                    process::exit(1);
                }
            },
            None => {
                eprint!("{}", opts.usage(&header));
                process::exit(1);
            }
        };
        let mut strand: u32 = 0;
        if let Some(s) = matches.opt_str("s") {
            match s.parse::<u32>() {
                Ok(value) if value < 2 => strand = value,
                _ => {
                    eprintln!("Invalid strand: {}", s);
                    process::exit(1);
                }
            }
        }

        if let Some(s) = matches.opt_str("b") {
            match s.parse::<Backend>() {
                Ok(backend) => params.backend = backend,
                Err(message) => {
                    eprintln!("{}", message);
                    process::exit(1);
                }
            }
        }
        Self::parse_usize(&matches, "k", &mut params.window_length);
        if params.window_length == 0 {
            eprintln!("Window length must be nonzero");
            process::exit(1);
        }
        Self::parse_usize(&matches, "min-coverage", &mut params.min_total_coverage);
        Self::parse_usize(&matches, "min-same-strand", &mut params.min_same_strand_coverage);
        Self::parse_usize(&matches, "min-opposite-strand", &mut params.min_opposite_strand_coverage);
        Self::parse_usize(&matches, "n", &mut params.neighbor_count);

        let query = OrientedReadId::new(read_id, strand);
        let prefix = match matches.opt_str("o") {
            Some(s) => s,
            None => format!("{}", query),
        };

        let db_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        Config {
            db_file, query,
            params, prefix,
        }
    }

    fn parse_usize(matches: &getopts::Matches, name: &str, value: &mut usize) {
        if let Some(s) = matches.opt_str(name) {
            match s.parse::<usize>() {
                Ok(parsed) => *value = parsed,
                Err(_) => {
                    eprintln!("Invalid value for --{}: {}", name, s);
                    process::exit(1);
                }
            }
        }
    }
}

//-----------------------------------------------------------------------------
