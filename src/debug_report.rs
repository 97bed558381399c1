use tracklang::{CompileOutput, PassMetrics, Passes};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const RED: &str = "\x1b[31m";
    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    /// Wraps text in an escape code when color is on.
    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, code: &str) -> String {
            match self.enabled {
                true => format!("{code}{}{RESET}", s.as_ref()),
                false => s.as_ref().to_string(),
            }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            self.paint(s, BOLD)
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            self.paint(s, DIM)
        }
    }
}

pub fn print_run(out: &CompileOutput, notes: &[String], color: bool) {
    let palette = ansi::Palette::new(color);
    println!("\n{}", palette.bold(palette.paint(format!("⚙  Compiling: \"{}\"", out.text.trim()), ansi::CYAN)));
    println!("  {} {}", palette.dim("normalized:"), palette.paint(&out.normalized, ansi::BLUE));

    if !notes.is_empty() {
        println!("\n{}", palette.paint("━━━ Rule Notes ━━━", ansi::GRAY));
        for note in notes {
            println!("  {} {}", palette.paint("!", ansi::YELLOW), palette.dim(note));
        }
    }

    println!("\n{}", palette.paint("━━━ Passes ━━━", ansi::GRAY));
    for pass in &out.metrics.passes {
        println!("  {}", fmt_pass(pass, &palette));
    }
    if out.passes.contains(Passes::WIDENED) && !out.widened.is_empty() {
        println!("  {} {}", palette.dim("widened:"), palette.paint(out.widened.join(", "), ansi::YELLOW));
    }

    println!("\n{}", palette.paint("━━━ Rules ━━━", ansi::GRAY));
    if out.matched().is_empty() {
        println!("{}", palette.dim("  No rules fired"));
    }
    for (idx, rule) in out.matched().iter().enumerate() {
        println!(
            "  {} {} {}",
            palette.paint(format!("[{idx}]"), ansi::GRAY),
            palette.paint(&rule.name, ansi::CYAN),
            palette.dim(format!("({})", rule.kind.as_str())),
        );
    }

    if !out.unmatched().is_empty() || !out.diagnostics.missing_required.is_empty() {
        println!("\n{}", palette.paint("━━━ Diagnostics ━━━", ansi::GRAY));
        if !out.unmatched().is_empty() {
            println!("  {} {}", palette.dim("unmatched:"), palette.paint(out.unmatched().join(" "), ansi::RED));
        }
        if !out.diagnostics.missing_required.is_empty() {
            println!(
                "  {} {}",
                palette.dim("missing commands:"),
                palette.paint(out.diagnostics.missing_required.join(", "), ansi::RED)
            );
            println!("\n{}", palette.dim("  Tip: rephrase as e.g. \"curve rows 10-20 left 15 deg\""));
        }
    }

    println!("\n{}", palette.paint("━━━ Document ━━━", ansi::GRAY));
    for line in format!("{:#}", out.document).lines() {
        println!("  {line}");
    }

    let status = if out.complete {
        palette.bold(palette.paint("✓ complete", ansi::GREEN))
    } else {
        palette.bold(palette.paint("✗ incomplete", ansi::RED))
    };
    println!(
        "\n  {}  │  Total: {}  │  Rules v{}",
        status,
        palette.paint(format!("{:?}", out.elapsed()), ansi::GREEN),
        out.rules_version,
    );
    println!();
}

fn fmt_pass(pass: &PassMetrics, palette: &ansi::Palette) -> String {
    let verdict = if pass.complete {
        palette.paint("✓", ansi::GREEN)
    } else {
        palette.paint("✗", ansi::RED)
    };
    format!(
        "{} {:<9} {} fired  {} unmatched  {}",
        verdict,
        palette.paint(pass.kind.to_string(), ansi::BLUE),
        palette.paint(pass.fired.to_string(), ansi::YELLOW),
        palette.paint(pass.unmatched.to_string(), ansi::YELLOW),
        palette.dim(format!("{:?}", pass.duration)),
    )
}
