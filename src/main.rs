//! `sap`: the CLI entry point (`spec.md` §6). Parses arguments, installs a
//! `fern`-backed logger, and drives the core pipeline this crate's library
//! implements.
//!
//! Source parsing (markup + embedded script → AST) and PDF stream writing
//! are both external collaborators `spec.md` §1 excludes from the core; this
//! binary stands in for the first with a minimal plain-text paragraph
//! splitter (blank line = paragraph break, whitespace = word break) and for
//! the second with a plain-text placement dump, so the library's typed
//! pipeline — style resolution, line-breaking, page flow — still runs on
//! real input end to end.

use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use log::LevelFilter;

use sap::errors::{Error, Result};
use sap::interp::{Decls, Evaluator};
use sap::layout::{self, FontSet};
use sap::tree::block::BlockObject;
use sap::tree::inline::{InlineObject, Separator, SeparatorKind};
use sap::tree::style::Style;

/// `sap <input> [-o <output>] [-I <dir>]* [-L <dir>]* [--watch]`, matching
/// `spec.md` §6's CLI contract exactly.
#[derive(Debug, Parser)]
#[command(name = "sap", about = "A programmable typesetting engine", version)]
struct Cli {
    /// The source document to compile.
    input: PathBuf,

    /// Output path; defaults to the input path with its extension replaced
    /// by `.pdf` (here: the plain-text placement dump standing in for it).
    #[arg(short = 'o', long = "output")]
    output: Option<PathBuf>,

    /// Additional directories searched for `import`ed source files.
    #[arg(short = 'I', action = clap::ArgAction::Append)]
    include_dirs: Vec<PathBuf>,

    /// Additional directories searched for fonts, ahead of fontconfig.
    #[arg(short = 'L', action = clap::ArgAction::Append)]
    font_dirs: Vec<PathBuf>,

    /// Recompile on source/font changes (requires a platform file-watch
    /// backend; unsupported builds print a diagnostic and compile once).
    #[arg(long)]
    watch: bool,
}

const PAGE_WIDTH_MM: f64 = 210.0;
const PAGE_HEIGHT_MM: f64 = 297.0;
const PAGE_MARGIN_MM: f64 = 25.0;

fn setup_logging() {
    let level = std::env::var("SAP_LOG").ok().and_then(|s| s.parse::<LevelFilter>().ok()).unwrap_or(LevelFilter::Info);

    fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!("[{}][{}] {}", record.level(), record.target(), message))
        })
        .level(level)
        .chain(std::io::stderr())
        .apply()
        .expect("logger already initialized");
}

/// Splits raw source text into paragraphs (blank-line separated) of
/// `Text`/`Separator` atoms (`spec.md` §3.3), standing in for the external
/// parser's AST production for plain-text input.
fn build_document(text: &str, style: &Rc<Style>) -> Vec<BlockObject> {
    let mut blocks = Vec::new();
    for para in text.split("\n\n") {
        let words: Vec<&str> = para.split_whitespace().collect();
        if words.is_empty() {
            continue;
        }
        let mut contents = Vec::with_capacity(words.len() * 2 - 1);
        for (i, word) in words.iter().enumerate() {
            if i > 0 {
                contents.push(InlineObject::Separator(Separator { kind: SeparatorKind::Space, hyphenation_cost: 0.0 }));
            }
            contents.push(InlineObject::Text(Rc::from(*word)));
        }
        blocks.push(BlockObject::Paragraph { contents, style: style.clone() });
    }
    blocks
}

/// Runs the compile-once pipeline: read source, lay it out, dump placement
/// records to `output` (the PDF writer's contract input, per `spec.md` §6).
fn compile(cli: &Cli) -> Result<()> {
    let source = std::fs::read_to_string(&cli.input)?;

    if !cli.include_dirs.is_empty() {
        log::debug!("include search path: {:?}", cli.include_dirs);
    }

    let mut style = Style::empty();
    style.font_family = Some(Rc::from("sans-serif"));
    let style = Rc::new(style);

    let blocks = build_document(&source, &style);
    if blocks.is_empty() {
        log::warn!("{}: no content to lay out", cli.input.display());
    }

    let fonts = FontSet::with_extra_dirs(cli.font_dirs.clone());
    // This binary's minimal text splitter never produces a `ScriptCall`/
    // `ScriptBlock` node, so an evaluator with no declarations is a valid
    // `ScriptRunner` here; a real source parser would hand in one built
    // from the document's own typechecked declarations.
    let decls = Decls::default();
    let mut evaluator = Evaluator::with_style(&decls, style.clone());
    let (objects, num_pages) = layout::layout_document(&fonts, &mut evaluator, PAGE_WIDTH_MM, PAGE_HEIGHT_MM, PAGE_MARGIN_MM, &blocks)?;

    let output_path = cli.output.clone().unwrap_or_else(|| cli.input.with_extension("pdf"));
    let mut dump = String::new();
    dump.push_str(&format!("; sap placement dump: {} page(s)\n", num_pages));
    for (i, obj) in objects.iter().enumerate() {
        let placement = obj.placement().map(|p| p.resolved());
        match placement {
            Some(pos) => dump.push_str(&format!(
                "object {i}: page {} at ({:.2}mm, {:.2}mm), size {:.2}x{:.2}mm\n",
                pos.page_number.unwrap_or(0),
                pos.x_mm,
                pos.y_mm,
                obj.size.width_mm,
                obj.size.height_mm()
            )),
            None => dump.push_str(&format!("object {i}: unplaced\n")),
        }
    }
    std::fs::write(&output_path, dump)?;
    log::info!("wrote {} across {num_pages} page(s)", output_path.display());

    Ok(())
}

fn main() {
    let cli = Cli::parse();
    setup_logging();

    if cli.watch {
        log::warn!("--watch requires a platform file-watch backend not built into this binary; compiling once");
    }

    let exit_code = match compile(&cli) {
        Ok(()) => 0,
        Err(err) => {
            log::error!("{err}");
            error_exit_code(&err)
        }
    };
    std::process::exit(exit_code);
}

fn error_exit_code(err: &Error) -> i32 {
    err.exit_code()
}
