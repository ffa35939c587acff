use trellis::engine::{RunMetrics, StepKind, StepMetrics};

mod ansi {
    pub const RESET: &str = "\x1b[0m";
    pub const DIM: &str = "\x1b[2m";
    pub const BOLD: &str = "\x1b[1m";

    pub const GREEN: &str = "\x1b[32m";
    pub const YELLOW: &str = "\x1b[33m";
    pub const BLUE: &str = "\x1b[34m";
    pub const CYAN: &str = "\x1b[36m";
    pub const GRAY: &str = "\x1b[90m";

    pub struct Palette {
        enabled: bool,
    }

    impl Palette {
        pub fn new(enabled: bool) -> Self {
            Self { enabled }
        }

        pub fn paint(&self, s: impl AsRef<str>, color: &str) -> String {
            if self.enabled { format!("{}{}{}", color, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn bold(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", BOLD, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }

        pub fn dim(&self, s: impl AsRef<str>) -> String {
            if self.enabled { format!("{}{}{}", DIM, s.as_ref(), RESET) } else { s.as_ref().to_string() }
        }
    }
}

/// Writes the per-step report to stderr so stdout stays the document.
pub fn print_run(input: &str, metrics: &RunMetrics, color: bool) {
    let palette = ansi::Palette::new(color);
    let name = metrics.transformation.as_deref().unwrap_or("transformation");
    eprintln!("\n{}", palette.bold(palette.paint(format!("⚙  {name}: \"{input}\""), ansi::CYAN)));

    eprintln!("\n{}", palette.paint("━━━ Steps ━━━", ansi::GRAY));
    if metrics.steps.is_empty() {
        eprintln!("{}", palette.dim("  No steps ran"));
    }
    for step in &metrics.steps {
        print_step(step, &palette);
    }
    if metrics.aborted {
        eprintln!("  {}", palette.paint("aborted after the last step shown", ansi::YELLOW));
    }

    eprintln!("\n{}", palette.paint("━━━ Timing ━━━", ansi::GRAY));
    eprintln!(
        "  Total: {}  │  Visited: {}  │  Matched: {}",
        palette.paint(format!("{:?}", metrics.total), ansi::GREEN),
        palette.paint(metrics.visited().to_string(), ansi::BLUE),
        palette.paint(metrics.matched().to_string(), ansi::BLUE),
    );
    eprintln!();
}

fn print_step(step: &StepMetrics, palette: &ansi::Palette) {
    eprintln!(
        "  {} {} {} {}",
        palette.paint(format!("[{}]", step.index), ansi::GRAY),
        palette.paint(step.kind.to_string(), ansi::BLUE),
        palette.bold(&step.label),
        palette.dim(format!("{:?}", step.duration)),
    );

    if step.kind == StepKind::Rule {
        let matched = if step.matched > 0 {
            palette.paint(format!("✓ {} matched", step.matched), ansi::GREEN)
        } else {
            palette.dim("✗ 0 matched")
        };
        eprintln!("      {} {}  {} {}", palette.dim("visited:"), step.visited, palette.dim("│"), matched);
    }
}
