use std::path::PathBuf;

use thiserror::Error;

pub(crate) const USAGE: &str = "\
label-preview: load, page through, print and share PDF labels

Usage: label-preview [--config PATH] [--json] [--open] <command> [args]

Commands:
  load <url|--sample>      Load a PDF and render its first page
  page <url> <n>           Load a PDF and render page n
  print <url>              Load a PDF and send it to the print binding
  share <url> [name]       Hand the PDF to the share target without loading it
  embed <url|--sample>     Fetch the whole file into a local preview URL;
                           with --open, show it in the system viewer
  help                     Show this message";

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Source {
    Url(String),
    Sample,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Load { source: Source },
    Page { source: Source, page: u32 },
    Print { source: Source },
    Share { source: Source, name: Option<String> },
    Embed { source: Source, open: bool },
    Help,
}

impl Command {
    pub(crate) fn name(&self) -> &'static str {
        match self {
            Command::Load { .. } => "load",
            Command::Page { .. } => "page",
            Command::Print { .. } => "print",
            Command::Share { .. } => "share",
            Command::Embed { .. } => "embed",
            Command::Help => "help",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct CliArgs {
    pub config: Option<PathBuf>,
    pub json: bool,
    pub command: Command,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum ArgsError {
    #[error("missing command")]
    MissingCommand,
    #[error("unknown command: {0}")]
    UnknownCommand(String),
    #[error("unknown option: {0}")]
    UnknownOption(String),
    #[error("{0} requires a value")]
    MissingValue(&'static str),
    #[error("invalid page number: {0}")]
    InvalidPage(String),
    #[error("unexpected argument: {0}")]
    Unexpected(String),
}

pub(crate) fn parse_args<I>(args: I) -> Result<CliArgs, ArgsError>
where
    I: IntoIterator<Item = String>,
{
    let mut config = None;
    let mut json = false;
    let mut open = false;
    let mut positional = Vec::new();

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().ok_or(ArgsError::MissingValue("--config"))?;
                config = Some(PathBuf::from(path));
            }
            "--json" => json = true,
            "--open" => open = true,
            "-h" | "--help" => positional.insert(0, "help".to_string()),
            "--sample" => positional.push(arg),
            other if other.starts_with("--") => {
                return Err(ArgsError::UnknownOption(other.to_string()))
            }
            _ => positional.push(arg),
        }
    }

    let mut positional = positional.into_iter();
    let name = positional.next().ok_or(ArgsError::MissingCommand)?;
    let command = match name.as_str() {
        "help" => Command::Help,
        "load" => Command::Load {
            source: source_arg(positional.next())?,
        },
        "page" => {
            let source = source_arg(positional.next())?;
            let raw = positional.next().ok_or(ArgsError::MissingValue("page"))?;
            let page = raw
                .parse::<u32>()
                .ok()
                .filter(|page| *page > 0)
                .ok_or(ArgsError::InvalidPage(raw))?;
            Command::Page { source, page }
        }
        "print" => Command::Print {
            source: source_arg(positional.next())?,
        },
        "share" => Command::Share {
            source: source_arg(positional.next())?,
            name: positional.next(),
        },
        "embed" => Command::Embed {
            source: source_arg(positional.next())?,
            open,
        },
        _ => return Err(ArgsError::UnknownCommand(name)),
    };
    if open && !matches!(command, Command::Embed { .. } | Command::Help) {
        return Err(ArgsError::Unexpected("--open".to_string()));
    }

    if let Some(extra) = positional.next() {
        if command != Command::Help {
            return Err(ArgsError::Unexpected(extra));
        }
    }

    Ok(CliArgs {
        config,
        json,
        command,
    })
}

fn source_arg(arg: Option<String>) -> Result<Source, ArgsError> {
    match arg {
        None => Err(ArgsError::MissingValue("url")),
        Some(value) if value == "--sample" => Ok(Source::Sample),
        Some(value) => Ok(Source::Url(value)),
    }
}
