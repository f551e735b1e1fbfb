//! Headless driver
//!
//! Spawns the configured shell behind a pty, feeds its output through the
//! engine, and prints the visible screen whenever it settles. Useful for
//! exercising the full pipeline without a presentation layer.

use std::process::ExitCode;
use std::time::Instant;

use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use wrapterm::config::Config;
use wrapterm::shell::{default_shell, OutputDecoder, ShellPty};
use wrapterm::{Notice, Terminal};

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("fatal error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config_path = std::env::args().nth(1).unwrap_or_else(|| "wrapterm.json".to_string());
    let config = Config::load_or_default(config_path.as_ref())?;

    let program = default_shell(config.shell.program.as_deref());
    info!(%program, rows = config.rows, cols = config.cols, "starting shell");

    let mut shell = ShellPty::spawn(
        &program,
        &config.shell.args,
        config.rows as u16,
        config.cols as u16,
    )?;
    let mut term = Terminal::with_timings(config.rows, config.cols, config.blink_timings());
    let mut decoder = OutputDecoder::new();

    let mut buf = [0u8; 4096];
    while shell.is_alive() {
        if !shell.poll_read(50)? {
            term.tick(Instant::now());
            continue;
        }

        let n = shell.read(&mut buf)?;
        if n == 0 {
            continue;
        }

        let text = decoder.decode(&buf[..n]);
        for notice in term.process(&text) {
            match notice {
                Notice::Updated => print_screen(&term, config.rows),
                Notice::Bell => info!("bell"),
                Notice::TitleChanged(title) => info!(%title, "title changed"),
                Notice::CursorMoved { .. } | Notice::ScrollToBottom => {}
            }
        }
    }

    let code = shell.wait()?;
    info!(code, "shell exited");
    Ok(())
}

/// Print the bottom screenful of the buffer, one run at a time.
fn print_screen(term: &Terminal, rows: usize) {
    let total = term.buffer().line_count();
    let top = total.saturating_sub(rows);

    let mut rd = term.render_sections(top, total);
    while rd.next_line() {
        while let Some(section) = rd.next_section() {
            print!("{}", section.text);
        }
        println!();
    }
    println!("---");
}
