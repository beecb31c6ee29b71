use std::path::PathBuf;
use std::time::Instant;
use std::{env, fs, process};

use mini_assembly::{AlignmentBase, utils};

use getopts::Options;

//-----------------------------------------------------------------------------

fn main() -> Result<(), String> {
    let start_time = Instant::now();

    // Parse arguments.
    let config = Config::new();

    // Check if the database already exists.
    if utils::file_exists(&config.db_file) {
        if config.overwrite {
            eprintln!("Overwriting database {}", config.db_file.display());
            fs::remove_file(&config.db_file).map_err(|x| x.to_string())?;
        } else {
            return Err(format!("Database {} already exists", config.db_file.display()));
        }
    }

    // Create the database.
    eprintln!("Loading markers from {}", config.markers_file.display());
    eprintln!("Loading alignments from {}", config.alignments_file.display());
    AlignmentBase::create_from_files(
        &config.markers_file, &config.alignments_file, &config.db_file
    ).map_err(|x| x.to_string())?;

    // Statistics.
    let database = AlignmentBase::open(&config.db_file).map_err(|x| x.to_string())?;
    eprintln!(
        "The database contains {} reads and {} alignments",
        database.reads(), database.alignments()
    );
    let size = database.file_size().unwrap_or(String::from("unknown"));
    eprintln!("Final database size: {}", size);

    let end_time = Instant::now();
    let seconds = end_time.duration_since(start_time).as_secs_f64();
    eprintln!("Used {:.3} seconds", seconds);

    Ok(())
}

//-----------------------------------------------------------------------------

struct Config {
    pub markers_file: PathBuf,
    pub alignments_file: PathBuf,
    pub db_file: PathBuf,
    pub overwrite: bool,
}

impl Config {
    pub fn new() -> Config {
        let args: Vec<String> = env::args().collect();
        let program = args[0].clone();
        let header = format!("Usage: {} [options] markers.txt[.gz] alignments.txt[.gz]", program);

        let mut opts = Options::new();
        opts.optflag("h", "help", "print this help");
        opts.optopt("o", "output", "output file name (default: <alignments>.db)", "FILE");
        opts.optflag("", "overwrite", "overwrite the database file if it exists");
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

        let markers_file = if let Some(s) = matches.free.first() {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };
        let alignments_file = if let Some(s) = matches.free.get(1) {
            PathBuf::from(s)
        } else {
            eprint!("{}", opts.usage(&header));
            process::exit(1);
        };

        let db_file = if let Some(s) = matches.opt_str("o") {
            PathBuf::from(s)
        } else {
            let mut name = alignments_file.clone().into_os_string();
            name.push(".db");
            PathBuf::from(name)
        };

        let overwrite = matches.opt_present("overwrite");

        Config {
            markers_file, alignments_file, db_file,
            overwrite,
        }
    }
}

//-----------------------------------------------------------------------------
