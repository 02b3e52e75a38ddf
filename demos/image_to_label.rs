use image::GenericImageView;
use std::env;
use zpl_rescale::{rescale, Bitmap, RasterField};

//
// cargo run --example image_to_label logo.png 203 300 > logo-300.zpl
//

fn print_usage() {
    println!("Usage: cargo run --example image_to_label <image> <label-dpi> <printer-dpi> [threshold]");
    println!();
    println!("Renders the image as a ^GFA field at the label resolution, then rescales");
    println!("the whole label for the printer and writes it to stdout.");
}

fn main() {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    if args.len() < 4 || args[1] == "--help" || args[1] == "-h" {
        print_usage();
        return;
    }

    let label_dpi: u32 = args[2].parse().expect("label dpi must be a number");
    let printer_dpi: u32 = args[3].parse().expect("printer dpi must be a number");
    let threshold: u8 = args.get(4).map_or(128, |t| t.parse().expect("threshold 0-255"));

    let image = image::open(&args[1]).expect("could not open image");
    let (width, height) = image.dimensions();
    let gray = image.to_luma8();

    // pad the width up to whole bytes; padding stays white
    let mut bitmap = Bitmap::new((width + 7) / 8 * 8, height);
    for y in 0..height {
        for x in 0..width {
            bitmap.set(x, y, gray.get_pixel(x, y).0[0] < threshold);
        }
    }

    let field = RasterField::from_bitmap(&bitmap);
    let label = format!(
        "^XA\n^LL{}\n^FO20,20^{}^FS\n^FO20,{}^A0N,30,30^FDRendered at {}dpi^FS\n^XZ\n",
        label_dpi,
        field,
        height + 40,
        label_dpi
    );

    match rescale(&label, printer_dpi, label_dpi) {
        Ok(scaled) => print!("{}", scaled),
        Err(err) => {
            eprintln!("rescale failed: {}", err);
            print!("{}", label);
        }
    }
}
