use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use layerbox_core::{Notice, Prompter, Reporter};
use layerbox_domain::{ImageReference, ImageSourceChoice};

use crate::style::Style;

/// Asks the operator on stderr and reads answers from stdin.
pub struct TerminalPrompter<'a> {
    style: &'a Style,
}

impl<'a> TerminalPrompter<'a> {
    pub fn new(style: &'a Style) -> Self {
        Self { style }
    }
}

impl Prompter for TerminalPrompter<'_> {
    fn choose_source(&self) -> Result<Option<ImageSourceChoice>> {
        eprintln!("{}", self.style.header("How should the sandbox image be provided?"));
        eprintln!("  1. Build from the generated Dockerfile");
        eprintln!("  2. Pull from a registry");
        loop {
            let Some(answer) = ask("Option [1]: ")? else {
                return Ok(None);
            };
            match parse_source_answer(&answer) {
                Some(choice) => return Ok(Some(choice)),
                None => eprintln!(
                    "{}",
                    self.style
                        .warning(&format!("'{answer}' is not one of 1, 2 (or build, pull)"))
                ),
            }
        }
    }

    fn repository(&self, default: &ImageReference) -> Result<Option<String>> {
        ask(&format!("Repository and tag [{default}]: "))
    }
}

fn parse_source_answer(answer: &str) -> Option<ImageSourceChoice> {
    match answer.trim().to_ascii_lowercase().as_str() {
        "" | "1" | "build" => Some(ImageSourceChoice::Build),
        "2" | "pull" => Some(ImageSourceChoice::PullNamed),
        _ => None,
    }
}

/// `None` when stdin is closed.
fn ask(prompt: &str) -> Result<Option<String>> {
    eprint!("{prompt}");
    io::stderr().flush().ok();
    let mut answer = String::new();
    let read = io::stdin()
        .lock()
        .read_line(&mut answer)
        .context("failed to read the answer from stdin")?;
    if read == 0 {
        return Ok(None);
    }
    Ok(Some(answer.trim().to_string()))
}

/// Prints progress notices on stderr, keeping stdout for the final result.
pub struct TerminalReporter<'a> {
    style: &'a Style,
    enabled: bool,
}

impl<'a> TerminalReporter<'a> {
    pub fn new(style: &'a Style, enabled: bool) -> Self {
        Self { style, enabled }
    }
}

impl Reporter for TerminalReporter<'_> {
    fn notice(&self, notice: &Notice) {
        if !self.enabled {
            return;
        }
        match notice {
            Notice::ImageSummary { .. } => {
                let mut lines = render_notice(notice).into_iter();
                if let Some(title) = lines.next() {
                    eprintln!("{}", self.style.header(&title));
                }
                for line in lines {
                    eprintln!("{}", self.style.info(&line));
                }
            }
            Notice::PlatformPinned { .. } => {
                for line in render_notice(notice) {
                    eprintln!("{}", self.style.warning(&line));
                }
            }
            Notice::DescriptorReused {
                note: Some(_),
                state,
                ..
            } if state != "reused" => {
                let mut lines = render_notice(notice).into_iter();
                if let Some(first) = lines.next() {
                    eprintln!("{}", self.style.step(&first));
                }
                for line in lines {
                    eprintln!("{}", self.style.warning(&line));
                }
            }
            Notice::CommandPreview { .. } => {
                for line in render_notice(notice) {
                    eprintln!("{}", self.style.dim(&line));
                }
            }
            _ => {
                for line in render_notice(notice) {
                    eprintln!("{}", self.style.step(&line));
                }
            }
        }
    }
}

pub(crate) fn render_notice(notice: &Notice) -> Vec<String> {
    match notice {
        Notice::AttachingToSession { name } => {
            vec![format!("Attaching to running session {name}")]
        }
        Notice::ImageSummary {
            source,
            reference,
            platform,
        } => vec![
            "Sandbox image".to_string(),
            format!("  source     : {source}"),
            format!("  repository : {}", reference.as_deref().unwrap_or("-")),
            format!(
                "  platform   : {}",
                platform.as_deref().unwrap_or("engine default")
            ),
        ],
        Notice::DescriptorWritten { path, base_image } => {
            vec![format!("Generated {path} (FROM {base_image})")]
        }
        Notice::DescriptorReused { path, state, note } => {
            let mut lines = vec![format!("Using existing {path}")];
            if let Some(note) = note {
                lines.push(format!("  {state}: {note}"));
            }
            lines
        }
        Notice::BuildingImage { tag } => {
            vec![format!("Building image {tag}; this may take a while")]
        }
        Notice::ReusingLocalImage { reference } => {
            vec![format!("Using local image {reference}")]
        }
        Notice::PullingImage { reference } => vec![format!("Pulling {reference}")],
        Notice::PlatformPinned { requested, run } => vec![format!(
            "--platform {requested} applies to the image only; the session runs as {run}"
        )],
        Notice::CommandPreview { command } => vec![format!("$ {}", command.join(" "))],
        Notice::StartingSession { name } => vec![format!("Starting session {name}")],
    }
}
