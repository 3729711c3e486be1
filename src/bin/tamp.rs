//! Command-line front end: compress or decompress a file (or stdin/stdout).

use std::env;
use std::fs::File;
use std::io::{self, ErrorKind, Read, Write};
use std::process::exit;

use fehler::throws;
use getopts::Options;
use tamp_compression::{stream, Conf};

fn usage(program: &str, opts: &Options) -> ! {
    let brief = format!("Usage: {} [options] [INPUT]", program);
    eprint!("{}", opts.usage(&brief));
    exit(2);
}

#[throws(io::Error)]
fn main() {
    let args: Vec<String> = env::args().collect();
    let program = &args[0];

    let mut opts = Options::new();
    opts.optflag("d", "decompress", "decompress instead of compress");
    opts.optopt("w", "window", "window bits, 8-15 (default 10)", "BITS");
    opts.optopt("l", "literal", "literal bits, 5-8 (default 8)", "BITS");
    opts.optopt("o", "output", "write to FILE instead of stdout", "FILE");
    opts.optflag("h", "help", "print this help");

    let matches = match opts.parse(&args[1..]) {
        Ok(m) => m,
        Err(e) => {
            eprintln!("{}", e);
            usage(program, &opts);
        }
    };
    if matches.opt_present("h") || matches.free.len() > 1 {
        usage(program, &opts);
    }

    let parse_bits = |name: &str| -> Result<Option<u8>, io::Error> {
        match matches.opt_str(name) {
            None => Ok(None),
            Some(s) => s
                .parse()
                .map(Some)
                .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e)),
        }
    };

    let input: Box<dyn Read> = match matches.free.first() {
        Some(path) => Box::new(File::open(path)?),
        None => Box::new(io::stdin()),
    };
    let output: Box<dyn Write> = match matches.opt_str("o") {
        Some(path) => Box::new(File::create(path)?),
        None => Box::new(io::stdout()),
    };

    if matches.opt_present("d") {
        stream::decompress(input, output)?;
    } else {
        let mut conf = Conf::new();
        if let Some(bits) = parse_bits("w")? {
            conf = conf
                .window_bits(bits)
                .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
        }
        if let Some(bits) = parse_bits("l")? {
            conf = conf
                .literal_bits(bits)
                .map_err(|e| io::Error::new(ErrorKind::InvalidInput, e))?;
        }
        stream::compress(conf, input, output)?;
    }
}
