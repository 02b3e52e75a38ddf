use std::{env, fs};
use zpl_rescale::{Config, LabelSink, Printer};

//
// ZEBRA_SERIAL=D2J184800123 cargo run --example print_label label.zpl
//

fn main() {
    // Load environment variables from .env file
    dotenvy::dotenv().ok();

    env_logger::Builder::from_default_env()
        .format(|buf, record| {
            use std::io::Write;
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

    let args: Vec<String> = env::args().collect();
    let commands = match args.get(1) {
        Some(file) => fs::read_to_string(file).expect("could not read label"),
        None => "^XA\n^LL203\n^FO50,50^GB300,150,4^FS\n^FO80,100^A0N,40,40^FDRescaled^FS\n^XZ\n"
            .to_string(),
    };

    let mut config = Config::new();
    if let Ok(serial) = env::var("ZEBRA_SERIAL") {
        config = config.serial(serial);
    }

    match Printer::new(config) {
        Ok(printer) => {
            println!("printing on {} ({}dpi)", printer.product(), printer.dpi());
            match printer.print(&commands) {
                Ok(()) => println!("print success"),
                Err(err) => println!("print failed {:?}", err),
            }
        }
        Err(err) => panic!("Invalid configuration settings: {}", err),
    }
}
