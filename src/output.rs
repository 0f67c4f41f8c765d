//! Output formatting for enumerated usernames

use crate::crawl::UsernameSet;
use crate::error::{Error, Result};
use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table, presets::UTF8_FULL};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Base name of the results file
const OUTPUT_STEM: &str = "wordpress_usernames";

/// CSV header row
const CSV_HEADER: &str = "username";

/// Output format for results
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One username per line
    #[default]
    Txt,
    /// JSON array
    Json,
    /// Single-column CSV with a header row
    Csv,
}

impl OutputFormat {
    /// File extension for this format
    pub fn extension(self) -> &'static str {
        match self {
            Self::Txt => "txt",
            Self::Json => "json",
            Self::Csv => "csv",
        }
    }

    /// Fixed output filename, e.g. `wordpress_usernames.json`
    pub fn file_name(self) -> String {
        format!("{}.{}", OUTPUT_STEM, self.extension())
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "txt" => Ok(Self::Txt),
            "json" => Ok(Self::Json),
            "csv" => Ok(Self::Csv),
            _ => Err(Error::InvalidOutputFormat(s.to_string())),
        }
    }
}

/// Write usernames in sorted order using the given format
pub fn write_usernames<W: Write>(
    usernames: &UsernameSet,
    format: OutputFormat,
    writer: &mut W,
) -> Result<()> {
    match format {
        OutputFormat::Txt => write_txt(usernames, writer),
        OutputFormat::Json => write_json(usernames, writer),
        OutputFormat::Csv => write_csv(usernames, writer),
    }
}

/// Save usernames to `wordpress_usernames.<ext>` inside `dir`
///
/// An existing file is overwritten. Returns the path written.
pub fn save_usernames(
    usernames: &UsernameSet,
    format: OutputFormat,
    dir: impl AsRef<Path>,
) -> Result<PathBuf> {
    let path = dir.as_ref().join(format.file_name());
    let file = File::create(&path).map_err(Error::OutputFailed)?;
    let mut writer = BufWriter::new(file);
    write_usernames(usernames, format, &mut writer)?;
    writer.flush().map_err(Error::OutputFailed)?;
    Ok(path)
}

fn write_txt<W: Write>(usernames: &UsernameSet, writer: &mut W) -> Result<()> {
    for username in usernames.iter() {
        writeln!(writer, "{}", username).map_err(Error::OutputFailed)?;
    }
    Ok(())
}

fn write_json<W: Write>(usernames: &UsernameSet, writer: &mut W) -> Result<()> {
    serde_json::to_writer_pretty(&mut *writer, usernames)?;
    writeln!(writer).map_err(Error::OutputFailed)?;
    Ok(())
}

fn write_csv<W: Write>(usernames: &UsernameSet, writer: &mut W) -> Result<()> {
    write!(writer, "{}\r\n", CSV_HEADER).map_err(Error::OutputFailed)?;
    for username in usernames.iter() {
        write!(writer, "{}\r\n", csv_field(username)).map_err(Error::OutputFailed)?;
    }
    Ok(())
}

/// Quote a CSV field when it contains a separator, quote or line break
fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

/// Print the human-readable summary table
pub fn print_summary<W: Write>(usernames: &UsernameSet, writer: &mut W) -> Result<()> {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("#").add_attribute(Attribute::Bold),
            Cell::new("Username").add_attribute(Attribute::Bold),
        ]);

    if usernames.is_empty() {
        table.add_row(vec![
            Cell::new("-"),
            Cell::new("No usernames found").fg(Color::DarkGrey),
        ]);
    }

    for (index, username) in usernames.iter().enumerate() {
        table.add_row(vec![
            Cell::new(index + 1),
            Cell::new(username).fg(Color::Cyan),
        ]);
    }

    writeln!(writer, "{}", table).map_err(Error::OutputFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> UsernameSet {
        ["bob", "alice"].into_iter().collect()
    }

    fn render(format: OutputFormat) -> String {
        let mut buf = Vec::new();
        write_usernames(&sample(), format, &mut buf).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn parse_format() {
        assert_eq!("txt".parse::<OutputFormat>().unwrap(), OutputFormat::Txt);
        assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("csv".parse::<OutputFormat>().unwrap(), OutputFormat::Csv);
        assert!("xml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn file_names() {
        assert_eq!(OutputFormat::Txt.file_name(), "wordpress_usernames.txt");
        assert_eq!(OutputFormat::Json.file_name(), "wordpress_usernames.json");
        assert_eq!(OutputFormat::Csv.file_name(), "wordpress_usernames.csv");
    }

    #[test]
    fn txt_sorted_lines() {
        assert_eq!(render(OutputFormat::Txt), "alice\nbob\n");
    }

    #[test]
    fn json_sorted_array() {
        let output = render(OutputFormat::Json);
        let parsed: Vec<String> = serde_json::from_str(&output).unwrap();
        assert_eq!(parsed, vec!["alice", "bob"]);
        assert_eq!(output, "[\n  \"alice\",\n  \"bob\"\n]\n");
    }

    #[test]
    fn csv_header_then_rows() {
        assert_eq!(render(OutputFormat::Csv), "username\r\nalice\r\nbob\r\n");
    }

    #[test]
    fn csv_quotes_special_values() {
        assert_eq!(csv_field("plain"), "plain");
        assert_eq!(csv_field("a,b"), "\"a,b\"");
        assert_eq!(csv_field("say \"hi\""), "\"say \"\"hi\"\"\"");
    }

    #[test]
    fn empty_set() {
        let empty = UsernameSet::new();
        let mut buf = Vec::new();
        write_usernames(&empty, OutputFormat::Json, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "[]\n");

        let mut buf = Vec::new();
        write_usernames(&empty, OutputFormat::Csv, &mut buf).unwrap();
        assert_eq!(String::from_utf8(buf).unwrap(), "username\r\n");
    }

    #[test]
    fn summary_lists_usernames() {
        let mut buf = Vec::new();
        print_summary(&sample(), &mut buf).unwrap();
        let table = String::from_utf8(buf).unwrap();
        assert!(table.contains("alice"));
        assert!(table.contains("bob"));
        assert!(table.find("alice") < table.find("bob"));
    }
}
