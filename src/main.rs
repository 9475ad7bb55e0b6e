use clap::{arg, crate_version, Command};
use retrolz77::{codec, Params};

const RCH: &str = "unreachable was reached";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let long_help = "Examples:
---------
Compress:    `retrolz77 compress -w 4096 -l 60 -i my_file -o my_file.lz77`
Decompress:  `retrolz77 decompress -i my_file.lz77 -o my_file`";

    let mut main_cmd = Command::new("retrolz77")
        .about("Compress and decompress with a parametrised LZ77 sliding-window codec")
        .after_long_help(long_help)
        .version(crate_version!());
    main_cmd = main_cmd.subcommand(
        Command::new("compress")
            .arg(arg!(-w --window <BYTES> "maximum sliding-window size, 4..65535").default_value("4096"))
            .arg(arg!(-l --lookahead <BYTES> "maximum look-ahead length, 2..window").default_value("60"))
            .arg(arg!(-i --input <PATH> "input path").required(true))
            .arg(arg!(-o --output <PATH> "output path").required(true))
            .about("compress a file"),
    );
    main_cmd = main_cmd.subcommand(
        Command::new("decompress")
            .arg(arg!(-i --input <PATH> "input path").required(true))
            .arg(arg!(-o --output <PATH> "output path").required(true))
            .about("decompress a file (window/lookahead are read back from the header)"),
    );

    let matches = main_cmd.get_matches();
    env_logger::init();

    if let Some(cmd) = matches.subcommand_matches("compress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let window: u16 = cmd.get_one::<String>("window").expect(RCH).parse()?;
        let lookahead: u16 = cmd.get_one::<String>("lookahead").expect(RCH).parse()?;
        let params = Params::new(window, lookahead)?;
        let data = std::fs::read(path_in)?;
        log::info!("compressing {path_in} ({} bytes) with window={window} lookahead={lookahead}", data.len());
        let compressed = codec::compress_slice(&data, params)?;
        log::info!(
            "wrote {path_out} ({} bytes, {:.1}% of input)",
            compressed.len(),
            100.0 * compressed.len() as f64 / std::cmp::max(1, data.len()) as f64
        );
        std::fs::write(path_out, compressed)?;
    }

    if let Some(cmd) = matches.subcommand_matches("decompress") {
        let path_in = cmd.get_one::<String>("input").expect(RCH);
        let path_out = cmd.get_one::<String>("output").expect(RCH);
        let data = std::fs::read(path_in)?;
        log::info!("decompressing {path_in} ({} bytes)", data.len());
        let expanded = codec::decompress_slice(&data)?;
        log::info!("wrote {path_out} ({} bytes)", expanded.len());
        std::fs::write(path_out, expanded)?;
    }

    Ok(())
}
