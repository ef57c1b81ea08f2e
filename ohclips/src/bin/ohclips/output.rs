use anyhow::Result;
use clap::ValueEnum;
use colored::{Color, Colorize};
use comfy_table::{Attribute, Cell, Color as TableColor, Table};
use serde::Serialize;

use crate::theme::{ICONS, THEME};

#[derive(Clone, Copy, Debug, ValueEnum, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Formatted table output (default)
    #[default]
    Table,
    /// JSON output for scripting
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct GlobalOptions {
    pub output_format: OutputFormat,
    pub quiet: bool,
    pub no_color: bool,
}

/// Data that renders as a two-column table.
pub trait TableDisplay {
    fn rows(&self) -> Vec<(String, String)>;
}

pub struct OutputManager {
    pub options: GlobalOptions,
}

impl OutputManager {
    pub fn new(options: GlobalOptions) -> Self {
        Self { options }
    }

    pub fn display<T>(&self, title: &str, data: &T) -> Result<()>
    where
        T: Serialize + TableDisplay,
    {
        if self.options.quiet {
            return Ok(());
        }
        match self.options.output_format {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(data)?),
            OutputFormat::Table => println!("{}", self.table(title, data)),
        }
        Ok(())
    }

    fn table<T: TableDisplay>(&self, title: &str, data: &T) -> Table {
        let mut table = Table::new();
        if self.options.no_color {
            table.load_preset(comfy_table::presets::ASCII_FULL);
            table.set_header(vec![Cell::new(title).add_attribute(Attribute::Bold), Cell::new("")]);
        } else {
            table.load_preset(comfy_table::presets::UTF8_FULL_CONDENSED);
            table.set_header(vec![
                Cell::new(title).add_attribute(Attribute::Bold).fg(TableColor::Cyan),
                Cell::new(""),
            ]);
        }
        for (key, value) in data.rows() {
            table.add_row(vec![Cell::new(key), Cell::new(value)]);
        }
        table
    }

    fn line(&self, icon: &str, color: Color, message: &str) -> String {
        if self.options.no_color {
            format!("{icon} {message}")
        } else {
            format!("{} {}", icon.color(color), message.color(color))
        }
    }

    pub fn success(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.success, THEME.success, message));
        }
    }

    pub fn error(&self, message: &str) {
        eprintln!("{}", self.line(ICONS.error, THEME.error, message));
    }

    pub fn warning(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.warning, THEME.warning, message));
        }
    }

    pub fn info(&self, message: &str) {
        if !self.options.quiet {
            println!("{}", self.line(ICONS.info, THEME.info, message));
        }
    }

    pub fn key_value(&self, key: &str, value: &str) {
        if self.options.quiet {
            return;
        }
        if self.options.no_color {
            println!("  {key}: {value}");
        } else {
            println!("  {}: {}", key.color(THEME.key).bold(), value.color(THEME.value));
        }
    }
}
