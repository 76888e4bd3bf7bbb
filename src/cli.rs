// ============================================================================
// Backdrop CLI: headless background editing via command-line arguments
// ============================================================================
//
// Usage examples:
//   Backdrop --input photo.png                               (transparent background)
//   Backdrop -i photo.jpg --mode solid --color "#202020" -o out.png
//   Backdrop -i "shots/*.jpg" --mode gradient --output-dir processed/
//   Backdrop -i cat.png --select 40,30,300,280 --prompt "add a soft shadow"
//
// No GUI is opened in CLI mode. Each file goes through the same session the
// desktop app uses: upload, (automatic mask), optional manual selection,
// apply, export.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::Parser;

use crate::error::{ErrorKind, SessionError};
use crate::io::read_image_file;
use crate::model::{GeminiClient, ImageModel};
use crate::prompt::{FillMode, HexColor};
use crate::selection::Rect;
use crate::session::{EditSession, SessionOptions};
use crate::settings::AppSettings;

/// Extra time granted to the session on top of the HTTP timeout.
const SETTLE_SLACK: Duration = Duration::from_secs(5);

// ============================================================================
// CLI argument definition (clap Derive)
// ============================================================================

/// Backdrop headless background editor.
#[derive(Parser, Debug)]
#[command(
    name = "Backdrop",
    about = "Backdrop headless background editor",
    long_about = "Remove or replace image backgrounds with a generative image model\n\
                  without opening the GUI. The API key is read from the settings file\n\
                  or the GEMINI_API_KEY / API_KEY environment variables.\n\n\
                  Example:\n  \
                  Backdrop --input photo.png --mode solid --color \"#FFFFFF\"\n  \
                  Backdrop -i \"*.jpg\" --mode gradient --output-dir out/"
)]
pub struct CliArgs {
    /// Input file(s). Glob patterns accepted (e.g. "*.png", "shots/*.jpg").
    #[arg(short, long, required = true, num_args = 1..)]
    pub input: Vec<String>,

    /// Output PNG path. Only valid for single-file input.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Output directory for batch processing (`<stem>.png` per input).
    #[arg(long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// Background mode: transparent, solid or gradient.
    #[arg(short, long, default_value = "transparent", value_name = "MODE")]
    pub mode: FillMode,

    /// Solid fill colour (#RRGGBB). Defaults to the settings file value.
    #[arg(long, value_name = "HEX")]
    pub color: Option<HexColor>,

    /// Gradient top colour (#RRGGBB).
    #[arg(long, value_name = "HEX")]
    pub gradient_top: Option<HexColor>,

    /// Gradient bottom colour (#RRGGBB).
    #[arg(long, value_name = "HEX")]
    pub gradient_bottom: Option<HexColor>,

    /// Extra instruction applied to the background only.
    #[arg(short, long, value_name = "TEXT")]
    pub prompt: Option<String>,

    /// Refine the subject mask from a rectangle in image pixels: X,Y,W,H.
    #[arg(long, value_name = "X,Y,W,H", value_parser = parse_rect)]
    pub select: Option<Rect>,

    /// Skip the automatic subject mask.
    #[arg(long)]
    pub no_auto_mask: bool,

    /// Model request timeout in seconds. Defaults to the settings file value.
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,

    /// Print per-file timing and debug logging.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    /// Returns `true` when any CLI-mode flag is present in the real process arguments.
    /// Used by `main()` to route before creating an eframe window.
    pub fn is_cli_mode() -> bool {
        std::env::args().any(|a| a == "--input" || a == "-i" || a.starts_with("--input="))
    }
}

fn parse_rect(s: &str) -> Result<Rect, String> {
    Rect::parse(s).ok_or_else(|| format!("'{}' is not X,Y,W,H", s))
}

// ============================================================================
// Public entry point
// ============================================================================

/// Run all CLI processing and return an OS exit code.
/// `0` = all files succeeded, `1` = one or more files failed.
pub fn run(args: CliArgs) -> ExitCode {
    let mut settings = AppSettings::load();
    if let Some(t) = args.timeout {
        settings.request_timeout_secs = t.max(1);
    }
    let client = match GeminiClient::from_settings(&settings) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    run_with_model(&args, &settings, Arc::new(client))
}

/// Same as [`run`] with an explicit model and settings.
pub fn run_with_model(
    args: &CliArgs,
    settings: &AppSettings,
    model: Arc<dyn ImageModel>,
) -> ExitCode {
    // Resolve glob patterns / literal paths → concrete PathBufs
    let inputs = resolve_inputs(&args.input);
    if inputs.is_empty() {
        eprintln!("error: no input files matched the given pattern(s).");
        return ExitCode::FAILURE;
    }

    if inputs.len() > 1 && args.output.is_some() && args.output_dir.is_none() {
        eprintln!(
            "error: {} input files given but --output only accepts a single file path.\n\
             Use --output-dir to specify a destination directory for batch processing.",
            inputs.len()
        );
        return ExitCode::FAILURE;
    }

    if let Some(dir) = &args.output_dir
        && let Err(e) = std::fs::create_dir_all(dir)
    {
        eprintln!(
            "error: could not create output directory '{}': {}",
            dir.display(),
            e
        );
        return ExitCode::FAILURE;
    }

    let mut options = SessionOptions::from_settings(settings);
    options.auto_mask_on_upload = settings.auto_mask_on_upload && !args.no_auto_mask;
    let mut session = match EditSession::new(model, options) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let wait = Duration::from_secs(settings.request_timeout_secs) + SETTLE_SLACK;

    let total = inputs.len();
    let multi = total > 1;
    let mut any_failure = false;

    for (idx, input_path) in inputs.iter().enumerate() {
        if multi || args.verbose {
            println!("[{}/{}] {}", idx + 1, total, input_path.display());
        }
        let file_start = Instant::now();

        let Some(output_path) =
            build_output_path(input_path, args.output.as_deref(), args.output_dir.as_deref())
        else {
            eprintln!(
                "  error: cannot determine output path for '{}'.",
                input_path.display()
            );
            any_failure = true;
            continue;
        };

        match run_one(&mut session, args, input_path, &output_path, wait) {
            Ok(()) => {
                if args.verbose || multi {
                    println!(
                        "  → {} ({:.0}ms)",
                        output_path.display(),
                        file_start.elapsed().as_secs_f64() * 1000.0
                    );
                }
            }
            Err(e) => {
                eprintln!("  error: {}", e);
                any_failure = true;
            }
        }
    }

    if any_failure { ExitCode::FAILURE } else { ExitCode::SUCCESS }
}

// ============================================================================
// Per-file processing pipeline
// ============================================================================

fn run_one(
    session: &mut EditSession,
    args: &CliArgs,
    input: &Path,
    output: &Path,
    wait: Duration,
) -> Result<(), String> {
    // -- Step 1: Upload (starts the automatic mask) ----------------------
    let (name, bytes) = read_image_file(input).map_err(|e| format!("load failed: {}", e))?;
    session.upload_image(name, bytes);
    if let Some(e) = session.error() {
        return Err(e.to_string());
    }
    settle(session, wait)?;
    report_mask_outcome(session, args.verbose, "automatic mask");

    // -- Step 2: Manual selection (optional) -----------------------------
    if let Some(rect) = args.select {
        session.request_mask_for_selection(rect);
        settle(session, wait)?;
        report_mask_outcome(session, args.verbose, "selection mask");
    }

    // -- Step 3: Apply ---------------------------------------------------
    // Upload reset the mode and the prompt; set them for this file
    {
        let bg = session.background_mut();
        bg.mode = args.mode;
        if let Some(c) = args.color {
            bg.solid = c;
        }
        if let Some(c) = args.gradient_top {
            bg.gradient_top = c;
        }
        if let Some(c) = args.gradient_bottom {
            bg.gradient_bottom = c;
        }
    }
    session.set_prompt(args.prompt.clone().unwrap_or_default());
    session.apply_edit();
    if let Some(e) = session.error() {
        return Err(e.to_string());
    }
    if !session.settle(wait) {
        session.cancel();
        return Err(format!("model did not answer within {}s", wait.as_secs()));
    }
    if let Some(e) = session.error() {
        return Err(e.to_string());
    }

    // -- Step 4: Export --------------------------------------------------
    session.export_edited(output).map_err(|e| e.to_string())
}

fn settle(session: &mut EditSession, wait: Duration) -> Result<(), String> {
    if session.settle(wait) {
        Ok(())
    } else {
        Err(format!("model did not answer within {}s", wait.as_secs()))
    }
}

/// Mask problems are not fatal: the edit can still run without a mask.
fn report_mask_outcome(session: &mut EditSession, verbose: bool, what: &str) {
    match session.error().cloned() {
        Some(e @ SessionError::Model(_)) => {
            eprintln!("  warning: {} failed: {}", what, e);
            session.dismiss_error();
        }
        Some(e) if e.kind() == ErrorKind::EmptyResult => {
            eprintln!("  warning: {}", e);
            session.dismiss_error();
        }
        Some(_) => {}
        None => {
            if verbose && session.current().active_mask().is_some() {
                println!("  {} ready", what);
            }
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// Expand glob patterns and literal paths into a deduplicated, ordered list.
fn resolve_inputs(patterns: &[String]) -> Vec<PathBuf> {
    let mut result: Vec<PathBuf> = Vec::new();

    for pattern in patterns {
        let as_path = Path::new(pattern);

        if as_path.exists() {
            if !result.iter().any(|p| p.as_path() == as_path) {
                result.push(as_path.to_path_buf());
            }
            continue;
        }

        match glob::glob(pattern) {
            Ok(entries) => {
                let mut matched = false;
                for entry in entries.flatten() {
                    if !result.contains(&entry) {
                        result.push(entry);
                    }
                    matched = true;
                }
                if !matched {
                    eprintln!("warning: pattern '{}' matched no files.", pattern);
                }
            }
            Err(e) => {
                eprintln!("warning: invalid glob '{}': {}", pattern, e);
            }
        }
    }

    result
}

/// Compute the output path for a single input file.
///
/// Priority:
/// 1. `--output` (explicit path, used for single-file input)
/// 2. `--output-dir` (batch directory, `<stem>.png`)
/// 3. Fallback: next to the input as `<stem>_edited.png`
fn build_output_path(input: &Path, output: Option<&Path>, output_dir: Option<&Path>) -> Option<PathBuf> {
    if let Some(out) = output {
        return Some(out.to_path_buf());
    }

    let stem = input.file_stem()?.to_string_lossy().into_owned();

    if let Some(dir) = output_dir {
        return Some(dir.join(format!("{}.png", stem)));
    }

    let parent = input.parent().unwrap_or(Path::new("."));
    Some(parent.join(format!("{}_edited.png", stem)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::EncodedImage;
    use crate::model::ModelError;
    use image::{Rgba, RgbaImage};
    use std::sync::Mutex;

    /// Answers instantly: white mask, and a copy of the input as the edit.
    struct InstantModel {
        instructions: Mutex<Vec<String>>,
    }

    impl ImageModel for InstantModel {
        fn name(&self) -> &str {
            "instant"
        }

        fn segment_subjects(&self, image: &EncodedImage) -> Result<Option<EncodedImage>, ModelError> {
            let (w, h) = image.dimensions().map_err(|e| ModelError::UndecodableImage(e.to_string()))?;
            let mask = RgbaImage::from_pixel(w, h, Rgba([255, 255, 255, 255]));
            Ok(EncodedImage::png_from_rgba(&mask).ok())
        }

        fn segment_selection(&self, _: &EncodedImage) -> Result<Option<EncodedImage>, ModelError> {
            Ok(None)
        }

        fn edit_image(
            &self,
            image: &EncodedImage,
            instruction: &str,
            _: Option<&EncodedImage>,
        ) -> Result<Option<EncodedImage>, ModelError> {
            self.instructions.lock().unwrap().push(instruction.to_string());
            Ok(Some(image.clone()))
        }
    }

    fn write_sample(dir: &Path, name: &str) -> PathBuf {
        let path = dir.join(name);
        let img = RgbaImage::from_pixel(16, 8, Rgba([10, 20, 30, 255]));
        std::fs::write(&path, EncodedImage::png_from_rgba(&img).unwrap().bytes).unwrap();
        path
    }

    #[test]
    fn args_parse_colours_modes_and_rects() {
        let args = CliArgs::try_parse_from([
            "Backdrop", "-i", "a.png", "--mode", "gradient", "--gradient-top", "#000000",
            "--select", "1,2,30,40", "--timeout", "9",
        ])
        .unwrap();
        assert_eq!(args.mode, FillMode::Gradient);
        assert_eq!(args.gradient_top, Some(HexColor([0, 0, 0])));
        assert_eq!(args.select.map(|r| r.width), Some(30.0));
        assert_eq!(args.timeout, Some(9));

        assert!(CliArgs::try_parse_from(["Backdrop", "-i", "a.png", "--mode", "blur"]).is_err());
        assert!(CliArgs::try_parse_from(["Backdrop", "-i", "a.png", "--select", "1,2"]).is_err());
        assert!(CliArgs::try_parse_from(["Backdrop"]).is_err());
    }

    #[test]
    fn output_paths_follow_priority() {
        let input = Path::new("shots/cat.jpg");
        assert_eq!(
            build_output_path(input, Some(Path::new("x.png")), Some(Path::new("out"))),
            Some(PathBuf::from("x.png"))
        );
        assert_eq!(
            build_output_path(input, None, Some(Path::new("out"))),
            Some(PathBuf::from("out/cat.png"))
        );
        assert_eq!(
            build_output_path(input, None, None),
            Some(PathBuf::from("shots/cat_edited.png"))
        );
    }

    #[test]
    fn globs_and_literals_are_deduplicated() {
        let dir = tempfile::tempdir().unwrap();
        let a = write_sample(dir.path(), "a.png");
        write_sample(dir.path(), "b.png");
        let pattern = dir.path().join("*.png").to_string_lossy().into_owned();
        let inputs = resolve_inputs(&[a.to_string_lossy().into_owned(), pattern]);
        assert_eq!(inputs.len(), 2);
        assert_eq!(inputs[0], a);
    }

    #[test]
    fn batch_run_writes_one_png_per_input() {
        let dir = tempfile::tempdir().unwrap();
        write_sample(dir.path(), "a.png");
        write_sample(dir.path(), "b.png");
        let out = dir.path().join("out");
        let args = CliArgs::try_parse_from([
            "Backdrop".to_string(),
            "-i".to_string(),
            dir.path().join("*.png").to_string_lossy().into_owned(),
            "--output-dir".to_string(),
            out.to_string_lossy().into_owned(),
            "--mode".to_string(),
            "solid".to_string(),
            "--prompt".to_string(),
            "warm light".to_string(),
        ])
        .unwrap();
        let model = Arc::new(InstantModel {
            instructions: Mutex::new(Vec::new()),
        });

        let code = run_with_model(&args, &AppSettings::default(), model.clone());
        assert_eq!(code, ExitCode::SUCCESS);
        assert!(out.join("a.png").exists());
        assert!(out.join("b.png").exists());

        let instructions = model.instructions.lock().unwrap();
        assert_eq!(instructions.len(), 2);
        assert!(instructions[0].contains("solid color #FFFFFF"));
        assert!(instructions[0].contains("\"warm light\""));
    }

    #[test]
    fn missing_inputs_fail() {
        let args = CliArgs::try_parse_from(["Backdrop", "-i", "/definitely/not/here/*.png"]).unwrap();
        let model = Arc::new(InstantModel {
            instructions: Mutex::new(Vec::new()),
        });
        assert_eq!(
            run_with_model(&args, &AppSettings::default(), model),
            ExitCode::FAILURE
        );
    }
}
