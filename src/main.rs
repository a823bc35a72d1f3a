use std::fs::File;
use std::io::{self, BufReader};

use anyhow::{anyhow, Context};
use clap::{App, Arg};
use my_lang::backend::Opts;
use my_lang::lexer::Lexer;
use my_lang::{Config, Driver, Stage};

fn main() -> anyhow::Result<()> {
    let matches = App::new("my-lang")
        .version(env!("CARGO_PKG_VERSION"))
        .about(env!("CARGO_PKG_DESCRIPTION"))
        .arg(
            Arg::with_name("INPUT")
                .help("source file to read, stdin when omitted")
                .index(1),
        )
        .arg(
            Arg::with_name("opt-level")
                .short("O")
                .long("opt-level")
                .takes_value(true)
                .possible_values(&["0", "1"])
                .default_value("1")
                .help("0 disables the optimization pipeline"),
        )
        .arg(
            Arg::with_name("stage")
                .long("stage")
                .takes_value(true)
                .possible_values(&["tokens", "parse", "ir"])
                .default_value("ir")
                .help("stop after tokenizing, after parsing, or lower to IR"),
        )
        .arg(
            Arg::with_name("module-name")
                .long("module-name")
                .takes_value(true)
                .default_value("my cool jit")
                .help("name printed in the module header"),
        )
        .arg(
            Arg::with_name("no-prompt")
                .long("no-prompt")
                .help("don't print the ready> prompt when reading stdin"),
        )
        .get_matches();

    let opt_level: u8 = matches
        .value_of("opt-level")
        .unwrap_or("1")
        .parse()
        .context("invalid optimization level")?;
    let stage: Stage = matches
        .value_of("stage")
        .unwrap_or("ir")
        .parse()
        .map_err(|e: String| anyhow!(e))?;
    let input = matches.value_of("INPUT");

    let config = Config {
        opts: Opts::from_level(opt_level),
        prompt: input.is_none() && !matches.is_present("no-prompt"),
        module_name: matches
            .value_of("module-name")
            .unwrap_or("my cool jit")
            .to_string(),
        stage,
    };

    let stderr = io::stderr();
    let mut out = stderr.lock();

    match input {
        Some(path) => {
            let file =
                File::open(path).with_context(|| format!("failed to open input file {}", path))?;
            Driver::new(Lexer::new(BufReader::new(file)), &config)
                .run(&mut out)
                .with_context(|| format!("failed to read input file {}", path))?;
        }
        None => {
            let stdin = io::stdin();
            Driver::new(Lexer::new(stdin.lock()), &config)
                .run(&mut out)
                .context("failed to read stdin")?;
        }
    }

    Ok(())
}
