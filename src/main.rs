use anyhow::Result;
use clap::Parser;

#[derive(Parser, Debug)]
#[command(
    name = "image-translator-rust",
    version,
    about = "Translate text regions inside images and overlay the result"
)]
struct Cli {
    /// Image file to translate
    input: String,

    /// Target language (default: en)
    #[arg(short = 'l', long = "lang", default_value = "en")]
    lang: String,

    /// Source language (ISO 639-1). Use "auto" to accept any supported script.
    #[arg(short = 'L', long = "source-lang", default_value = "auto")]
    source_lang: String,

    /// Output file path (defaults to <input>.translated.png)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Publish the composited image to the image host and print its URL
    #[arg(long = "publish")]
    publish: bool,

    /// Return the original image untouched when no text is found
    #[arg(long = "allow-empty")]
    allow_empty: bool,

    /// Write detected-region debug artifacts next to the input
    #[arg(long = "debug-regions")]
    debug_regions: bool,

    /// Read extra settings from a local TOML file
    #[arg(short = 'r', long = "read-settings")]
    read_settings: Option<String>,

    /// Enable verbose logging
    #[arg(long = "verbose")]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    image_translator_rust::logging::init(cli.verbose)?;

    let output = image_translator_rust::run(image_translator_rust::Config {
        input: cli.input,
        output: cli.output,
        lang: cli.lang,
        source_lang: cli.source_lang,
        publish: cli.publish,
        allow_empty: cli.allow_empty,
        debug_regions: cli.debug_regions,
        settings_path: cli.read_settings,
    })
    .await?;

    println!("{}", output);
    Ok(())
}
