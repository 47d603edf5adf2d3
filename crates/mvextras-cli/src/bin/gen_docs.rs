//! Binary that emits command-line options markdown to stdout.
//!
//! The docs build redirects the output into `docs/command-line-options.md`.

fn main() {
    print!("{}", mvextras_cli::render_options_markdown());
}
