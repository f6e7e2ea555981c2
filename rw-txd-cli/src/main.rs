//! RenderWare TXD CLI
//!
//! Command-line interface for inspecting and converting texture dictionaries.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand, ValueEnum};
use rw_txd::{
    EngineConfig, FailedTexture, LibraryVersion, TexDictionary, TextureExporter, TxdSerializer, convert_dictionary,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "rwtxd")]
#[command(about = "Inspect and convert RenderWare texture dictionaries")]
#[command(version)]
struct Cli {
    /// Engine configuration file (YAML)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log chunk traversal and codec decisions
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the textures of a dictionary
    Info {
        /// Input TXD file
        input: PathBuf,

        #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Move every texture to another platform
    Convert {
        input: PathBuf,
        output: PathBuf,

        /// Target platform (Direct3D8, Direct3D9, PlayStation2, PowerVR)
        #[arg(short, long)]
        platform: String,

        /// Library version to write, e.g. 3.6.0.3
        #[arg(long)]
        version: Option<String>,
    },

    /// Write one mipmap level of every texture as an image
    Export {
        input: PathBuf,

        /// Output directory
        output: PathBuf,

        #[arg(long, default_value_t = 0)]
        level: usize,
    },

    /// Replace a texture's pixels with an image
    Import {
        input: PathBuf,

        /// Texture name inside the dictionary
        texture: String,

        image: PathBuf,

        /// Where to write the result, defaults to the input file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Text,
    Yaml,
}

#[derive(Debug, Serialize)]
struct DictionaryReport {
    file: String,
    version: String,
    recommended_platform: Option<String>,
    textures: Vec<TextureReport>,
    failed: Vec<FailedTexture>,
    warnings: Vec<String>,
}

#[derive(Debug, Serialize)]
struct TextureReport {
    name: String,
    mask_name: String,
    platform: Option<String>,
    format: Option<String>,
    width: u32,
    height: u32,
    mipmaps: usize,
    has_alpha: bool,
    compressed: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Info { input, format } => info_command(&config, &input, format),
        Commands::Convert {
            input,
            output,
            platform,
            version,
        } => convert_command(&config, &input, &output, &platform, version.as_deref()),
        Commands::Export { input, output, level } => export_command(&config, &input, &output, level),
        Commands::Import {
            input,
            texture,
            image,
            output,
        } => import_command(&config, &input, &texture, &image, output.as_deref()),
    }
}

fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if verbose { "debug" } else { "warn" }));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let Some(path) = path else {
        return Ok(EngineConfig::default());
    };
    let config = EngineConfig::from_yaml_file(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))?;
    config.validate().context("invalid configuration")?;
    Ok(config)
}

fn load_dictionary(serializer: &TxdSerializer<'_>, path: &Path) -> Result<TexDictionary> {
    serializer
        .load_from_file(path)
        .with_context(|| format!("failed to read {}", path.display()))
}

fn build_report(path: &Path, dictionary: &TexDictionary, warnings: Vec<String>) -> DictionaryReport {
    let textures = dictionary
        .textures()
        .iter()
        .map(|texture| {
            let raster = texture.raster();
            let (width, height) = raster.map(|r| r.size()).unwrap_or((0, 0));
            TextureReport {
                name: texture.name().to_string(),
                mask_name: texture.mask_name().to_string(),
                platform: raster.map(|r| r.platform_name().to_string()),
                format: raster.map(|r| r.format_string()),
                width,
                height,
                mipmaps: raster.map(|r| r.mipmap_count()).unwrap_or(0),
                has_alpha: raster.is_some_and(|r| r.has_alpha()),
                compressed: raster.is_some_and(|r| r.is_compressed()),
            }
        })
        .collect();

    DictionaryReport {
        file: path.display().to_string(),
        version: dictionary.version().to_string(),
        recommended_platform: dictionary.recommended_platform().map(str::to_string),
        textures,
        failed: dictionary.failed.clone(),
        warnings,
    }
}

fn render_text(report: &DictionaryReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("{} (RenderWare {})\n", report.file, report.version));
    if let Some(platform) = &report.recommended_platform {
        out.push_str(&format!("  platform: {}\n", platform));
    }
    out.push_str(&format!("  textures: {}\n", report.textures.len()));
    for (i, texture) in report.textures.iter().enumerate() {
        out.push_str(&format!(
            "  [{}] {} {}x{} {} mips={} {}{}\n",
            i,
            texture.name,
            texture.width,
            texture.height,
            texture.format.as_deref().unwrap_or("-"),
            texture.mipmaps,
            texture.platform.as_deref().unwrap_or("no raster"),
            if texture.has_alpha { " alpha" } else { "" },
        ));
    }
    for failed in &report.failed {
        out.push_str(&format!("  failed #{}: {}\n", failed.index, failed.error));
    }
    for warning in &report.warnings {
        out.push_str(&format!("  warning: {}\n", warning));
    }
    out
}

fn info_command(config: &EngineConfig, input: &Path, format: OutputFormat) -> Result<()> {
    let serializer = TxdSerializer::new(config.clone());
    let dictionary = load_dictionary(&serializer, input)?;
    let report = build_report(input, &dictionary, serializer.diagnostics().warnings());

    match format {
        OutputFormat::Text => print!("{}", render_text(&report)),
        OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&report).context("failed to encode report")?),
    }
    Ok(())
}

fn convert_command(
    config: &EngineConfig,
    input: &Path,
    output: &Path,
    platform: &str,
    version: Option<&str>,
) -> Result<()> {
    let serializer = TxdSerializer::new(config.clone());
    let mut dictionary = load_dictionary(&serializer, input)?;

    if let Some(version) = version {
        let version: LibraryVersion = version
            .parse()
            .with_context(|| format!("invalid library version '{}'", version))?;
        dictionary.set_engine_version(version);
    }

    let converted = convert_dictionary(&mut dictionary, platform, serializer.registry(), &serializer.context())
        .with_context(|| format!("failed to convert {} to {}", input.display(), platform))?;
    serializer
        .save_to_file(&dictionary, output)
        .with_context(|| format!("failed to write {}", output.display()))?;

    println!(
        "Converted {} of {} textures, wrote {}",
        converted,
        dictionary.texture_count(),
        output.display()
    );
    for warning in serializer.diagnostics().warnings() {
        println!("  warning: {}", warning);
    }
    Ok(())
}

fn export_command(config: &EngineConfig, input: &Path, output: &Path, level: usize) -> Result<()> {
    let serializer = TxdSerializer::new(config.clone());
    let dictionary = load_dictionary(&serializer, input)?;
    std::fs::create_dir_all(output).with_context(|| format!("failed to create {}", output.display()))?;

    let ctx = serializer.context();
    let mut written = 0;
    for texture in dictionary.textures() {
        let path = output.join(TextureExporter::create_filename(texture.name(), "png"));
        match TextureExporter::export_texture(texture, level, &path, &ctx) {
            Ok(()) => {
                written += 1;
                println!("  {}", path.display());
            }
            Err(err) => tracing::warn!("skipping '{}': {}", texture.name(), err),
        }
    }

    println!("Exported {} of {} textures", written, dictionary.texture_count());
    Ok(())
}

fn import_command(
    config: &EngineConfig,
    input: &Path,
    texture_name: &str,
    image: &Path,
    output: Option<&Path>,
) -> Result<()> {
    let serializer = TxdSerializer::new(config.clone());
    let dictionary = load_dictionary(&serializer, input)?;

    let Some(texture) = dictionary.find_texture(texture_name) else {
        bail!("no texture named '{}' in {}", texture_name, input.display());
    };
    let Some(raster) = texture.raster() else {
        bail!("texture '{}' has no raster", texture_name);
    };
    let pixels =
        TextureExporter::import_image(image).with_context(|| format!("failed to read {}", image.display()))?;
    raster
        .set_pixel_data(pixels, &serializer.context())
        .with_context(|| format!("{} cannot hold {}", raster.platform_name(), image.display()))?;

    let output = output.unwrap_or(input);
    serializer
        .save_to_file(&dictionary, output)
        .with_context(|| format!("failed to write {}", output.display()))?;
    println!("Replaced '{}' ({}), wrote {}", texture.name(), raster.format_string(), output.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rw_txd::{ColorOrdering, MipmapLayer, PixelData, Raster, RasterFormat, TextureBase, default_registry};

    fn write_sample(path: &Path) {
        let version = LibraryVersion::san_andreas();
        let serializer = TxdSerializer::default();
        let raster = Raster::new(default_registry().require("Direct3D9").unwrap(), version);
        let mut pixels = PixelData::new(RasterFormat::R8888, 32, ColorOrdering::Bgra);
        pixels.push_mipmap(MipmapLayer::new(8, 8, vec![0x7F; 256]));
        raster.set_pixel_data(pixels, &serializer.context()).unwrap();

        let mut texture = TextureBase::new("road", version);
        texture.set_raster(Some(raster));
        let mut dictionary = TexDictionary::new(version);
        dictionary.add_texture(texture);
        serializer.save_to_file(&dictionary, path).unwrap();
    }

    #[test]
    fn test_report_lists_textures() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roads.txd");
        write_sample(&path);

        let serializer = TxdSerializer::default();
        let dictionary = load_dictionary(&serializer, &path).unwrap();
        let report = build_report(&path, &dictionary, Vec::new());
        assert_eq!(report.textures.len(), 1);
        assert_eq!(report.textures[0].platform.as_deref(), Some("Direct3D9"));
        assert_eq!((report.textures[0].width, report.textures[0].height), (8, 8));

        let text = render_text(&report);
        assert!(text.contains("road 8x8"));
        let yaml = serde_yaml::to_string(&report).unwrap();
        assert!(yaml.contains("name: road"));
    }

    #[test]
    fn test_convert_then_export() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("roads.txd");
        let output = dir.path().join("roads_ps2.txd");
        write_sample(&input);

        let config = EngineConfig::default();
        convert_command(&config, &input, &output, "PlayStation2", Some("3.6.0.3")).unwrap();
        let dictionary = load_dictionary(&TxdSerializer::default(), &output).unwrap();
        assert_eq!(dictionary.recommended_platform(), Some("PlayStation2"));

        let images = dir.path().join("png");
        export_command(&config, &output, &images, 0).unwrap();
        assert!(images.join("road.png").exists());

        assert!(convert_command(&config, &input, &output, "PlayStation2", Some("not-a-version")).is_err());
    }
}
