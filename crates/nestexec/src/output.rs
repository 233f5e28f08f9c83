use std::collections::BTreeSet;
use std::io::{self, IsTerminal, Write};

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Plain,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

#[derive(Serialize)]
struct ContainerList<'a> {
    count: usize,
    containers: Vec<&'a str>,
}

pub fn write_containers(
    out: &mut impl Write,
    ids: &BTreeSet<String>,
    format: OutputFormat,
) -> io::Result<()> {
    match format {
        OutputFormat::Json => {
            let list = ContainerList {
                count: ids.len(),
                containers: ids.iter().map(String::as_str).collect(),
            };
            let json = serde_json::to_string(&list).map_err(io::Error::other)?;
            writeln!(out, "{json}")?;
        }
        OutputFormat::Table => {
            let mut table = Table::new();
            table
                .load_preset(UTF8_FULL)
                .set_content_arrangement(ContentArrangement::Dynamic)
                .set_header(vec!["CONTAINER ID"]);
            for id in ids {
                table.add_row(vec![id.as_str()]);
            }
            writeln!(out, "{table}")?;
        }
        OutputFormat::Plain => {
            for id in ids {
                writeln!(out, "{id}")?;
            }
        }
    }
    out.flush()
}

pub fn print_containers(ids: &BTreeSet<String>, format: OutputFormat) -> io::Result<()> {
    write_containers(&mut io::stdout().lock(), ids, format)
}
