use std::{
    env,
    io::{self, Read, Write},
    process,
};

use log::{debug, warn};
use zpl_rescale::{label_dpi, rescale, Config, Error, LabelSink, Printer};

//
// cargo run -- label.zpl 300 > label-300.zpl
// cargo run -- label.zpl auto --print
//

#[derive(Debug, Default)]
struct Options {
    input: String,
    printer_dpi: Option<u32>,
    label_dpi: Option<u32>,
    print: bool,
}

fn print_usage() {
    println!("Usage: zpl-rescale <input|-> <printer-dpi|auto> [--label-dpi N] [--print]");
    println!();
    println!("Rescales a ZPL label to the printer's resolution and writes it to stdout.");
    println!("The label resolution is read from its ^LL directive unless --label-dpi is given.");
    println!();
    println!("  --print      send to the USB printer named by ZEBRA_SERIAL (or the first one)");
    println!("               instead of stdout; 'auto' reads the dpi from the printer");
}

fn parse_args(args: &[String]) -> Result<Options, String> {
    let mut options = Options::default();
    let mut positional = Vec::new();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--print" => options.print = true,
            "--label-dpi" => {
                let value = iter.next().ok_or("--label-dpi needs a value")?;
                options.label_dpi = Some(parse_dpi(value)?);
            }
            _ => positional.push(arg.clone()),
        }
    }

    if positional.len() != 2 {
        return Err("expected an input and a printer resolution".to_string());
    }
    options.input = positional[0].clone();
    options.printer_dpi = match positional[1].as_str() {
        "auto" => None,
        value => Some(parse_dpi(value)?),
    };
    if options.printer_dpi.is_none() && !options.print {
        return Err("'auto' needs --print".to_string());
    }
    Ok(options)
}

fn parse_dpi(value: &str) -> Result<u32, String> {
    value
        .parse::<u32>()
        .map_err(|_| format!("not a resolution: {}", value))
}

fn read_input(input: &str) -> Result<String, Error> {
    let mut commands = String::new();
    if input == "-" {
        io::stdin().read_to_string(&mut commands)?;
    } else {
        commands = std::fs::read_to_string(input)?;
    }
    Ok(commands)
}

fn run(options: Options) -> Result<(), Error> {
    let commands = read_input(&options.input)?;

    // An explicit label resolution replaces the ^LL lookup.
    let label = options.label_dpi.unwrap_or_else(|| label_dpi(&commands));
    debug!("label resolution {}dpi", label);

    if options.print {
        let mut config = Config::new();
        if let Ok(serial) = env::var("ZEBRA_SERIAL") {
            config = config.serial(serial);
        }
        if let Some(dpi) = options.printer_dpi {
            config = config.dpi(dpi);
        }
        let printer = Printer::new(config)?;
        if options.label_dpi.is_some() {
            let commands = rescale_or_original(&commands, printer.dpi(), label);
            return printer.send(commands.as_bytes());
        }
        return printer.print(&commands);
    }

    let printer = options.printer_dpi.unwrap_or(0);
    let scaled = if label == 0 {
        warn!("label resolution unknown, output is unscaled");
        commands
    } else {
        rescale(&commands, printer, label)?
    };
    io::stdout().write_all(scaled.as_bytes())?;
    Ok(())
}

fn rescale_or_original(commands: &str, printer: u32, label: u32) -> String {
    if printer == 0 || label == 0 {
        return commands.to_string();
    }
    match rescale(commands, printer, label) {
        Ok(scaled) => scaled,
        Err(err) => {
            warn!("rescale failed, printing unscaled label: {}", err);
            commands.to_string()
        }
    }
}

fn main() {
    dotenvy::dotenv().ok();
    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            writeln!(
                buf,
                "[{}:{}] {} - {}",
                record.file().unwrap_or("unknown"),
                record.line().unwrap_or(0),
                record.level(),
                record.args()
            )
        })
        .init();

    let args: Vec<String> = env::args().skip(1).collect();
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        print_usage();
        return;
    }

    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(msg) => {
            eprintln!("Error: {}", msg);
            print_usage();
            process::exit(1);
        }
    };

    if let Err(err) = run(options) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
