use zpl_rescale::list_printers;

//
// cargo run --example list_printers
//

fn main() {
    env_logger::init();

    match list_printers() {
        Ok(printers) if printers.is_empty() => println!("no Zebra printers attached"),
        Ok(printers) => {
            for printer in printers {
                let dpi = match printer.dpi() {
                    0 => "unknown".to_string(),
                    dpi => format!("{}dpi", dpi),
                };
                println!(
                    "{:04x} {:<16} {} ({})",
                    printer.product_id, printer.serial, printer.product, dpi
                );
            }
        }
        Err(err) => println!("could not list printers: {}", err),
    }
}
