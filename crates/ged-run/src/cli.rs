use clap::{Parser, Subcommand};
use ged_tree::{Database, DuplicatePointers, Options, RecordRef, TreeBuilder};
use miette::IntoDiagnostic;
use miette::miette;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};
use std::{fs, path::PathBuf};

#[derive(Parser, Debug, Default)]
#[command(name = "ged")]
#[command(author = env!("CARGO_PKG_AUTHORS"))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(after_help = "# Examples:\n\n\
    ## To print the normalized forest:\n\
    ged family.ged\n\n\
    ## To print every NAME record:\n\
    ged find NAME family.ged\n\n\
    ## To resolve a cross-reference:\n\
    ged lookup @I1@ family.ged\n\n\
    ## To check that a file is normalized:\n\
    ged fmt --check family.ged")]
#[command(
    about = "ged rebuilds the record tree of GEDCOM-style genealogy files.",
    long_about = None
)]
pub struct Cli {
    #[clap(flatten)]
    input: InputArgs,

    #[clap(flatten)]
    output: OutputArgs,

    #[clap(subcommand)]
    commands: Option<Commands>,

    files: Option<Vec<PathBuf>>,
}

#[derive(Clone, Debug, Default, PartialEq, clap::ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct InputArgs {
    /// Fail when a pointer is declared more than once instead of keeping the last one
    #[arg(long, default_value_t = false)]
    reject_duplicate_pointers: bool,

    /// Ignore blank lines instead of treating them as malformed
    #[arg(long, default_value_t = false)]
    skip_blank_lines: bool,
}

#[derive(Clone, Debug, clap::Args, Default)]
struct OutputArgs {
    /// Set output format
    #[arg(short = 'F', long, value_enum, default_value_t)]
    output_format: OutputFormat,

    /// Unbuffered output
    #[clap(long, default_value_t = false)]
    unbuffered: bool,
}

#[derive(Debug, Clone, Subcommand)]
enum Commands {
    /// Print the number of roots, records and indexed pointers
    Stats {
        /// Path to the GEDCOM files to inspect
        files: Option<Vec<PathBuf>>,
    },
    /// Print every record with the given tag, together with its subtree
    Find {
        /// Tag to search for, e.g. NAME
        tag: String,
        /// Path to the GEDCOM files to search
        files: Option<Vec<PathBuf>>,
    },
    /// Print the record that declares the given pointer
    Lookup {
        /// Pointer to resolve, e.g. @I1@
        pointer: String,
        /// Path to the GEDCOM files to search
        files: Option<Vec<PathBuf>>,
    },
    /// Rewrite files in normalized form
    Fmt {
        /// Check if files are formatted without modifying them
        #[arg(short, long)]
        check: bool,
        /// Path to the GEDCOM files to format
        files: Option<Vec<PathBuf>>,
    },
}

/// Where a document is read from.
#[derive(Debug, Clone, PartialEq)]
enum Source {
    Stdin,
    File(PathBuf),
}

impl Source {
    fn name(&self) -> String {
        match self {
            Source::Stdin => "<stdin>".to_string(),
            Source::File(path) => path.display().to_string(),
        }
    }

    fn reader(&self) -> miette::Result<Box<dyn BufRead>> {
        match self {
            Source::Stdin => Ok(Box::new(io::stdin().lock())),
            Source::File(path) => {
                if !path.exists() {
                    return Err(miette!("File not found: {}", path.display()));
                }
                let file = fs::File::open(path).into_diagnostic()?;
                Ok(Box::new(BufReader::new(file)))
            }
        }
    }

    fn read_to_string(&self) -> miette::Result<String> {
        let mut content = String::new();
        self.reader()?.read_to_string(&mut content).into_diagnostic()?;
        Ok(content)
    }
}

impl Cli {
    pub fn run(&self) -> miette::Result<()> {
        match &self.commands {
            None => self.each_database(&self.files, |db, handle| self.print_forest(db, handle)),
            Some(Commands::Stats { files }) => {
                self.each_database(files, |db, handle| self.print_stats(db, handle))
            }
            Some(Commands::Find { tag, files }) => self.each_database(files, |db, handle| {
                self.print_records(&db.find_records(tag), handle)
            }),
            Some(Commands::Lookup { pointer, files }) => self.each_database(files, |db, handle| {
                let record = db
                    .lookup(pointer)
                    .ok_or_else(|| miette!("Pointer not found: {}", pointer))?;
                self.print_records(&[record], handle)
            }),
            Some(Commands::Fmt { check, files }) => self.format(*check, files),
        }
    }

    fn options(&self) -> Options {
        Options {
            duplicate_pointers: if self.input.reject_duplicate_pointers {
                DuplicatePointers::Reject
            } else {
                DuplicatePointers::LastWins
            },
            skip_blank_lines: self.input.skip_blank_lines,
            ..Default::default()
        }
    }

    fn sources(files: &Option<Vec<PathBuf>>) -> Vec<Source> {
        match files {
            Some(files) if !files.is_empty() => files.iter().cloned().map(Source::File).collect(),
            _ => vec![Source::Stdin],
        }
    }

    /// Streams `source` line by line into a fresh builder.
    fn load(&self, source: &Source) -> miette::Result<Database> {
        let mut builder = TreeBuilder::new(self.options());

        for line in source.reader()?.lines() {
            let line = line.into_diagnostic()?;
            builder.push_line(&line).map_err(|err| {
                miette::Report::new(err).wrap_err(format!("Failed to parse {}", source.name()))
            })?;
        }

        tracing::debug!(source = %source.name(), lines = builder.lines_consumed(), "loaded");
        Ok(builder.finish())
    }

    fn each_database<F>(&self, files: &Option<Vec<PathBuf>>, mut f: F) -> miette::Result<()>
    where
        F: FnMut(&Database, &mut dyn Write) -> miette::Result<()>,
    {
        let stdout = io::stdout();
        let mut handle: Box<dyn Write> = if self.output.unbuffered {
            Box::new(stdout.lock())
        } else {
            Box::new(BufWriter::new(stdout.lock()))
        };

        for source in Self::sources(files) {
            let db = self.load(&source)?;
            f(&db, &mut handle)?;
        }

        handle.flush().into_diagnostic()
    }

    fn print_forest(&self, db: &Database, handle: &mut dyn Write) -> miette::Result<()> {
        match self.output.output_format {
            OutputFormat::Text => db.write(handle).into_diagnostic(),
            OutputFormat::Json => write_json(handle, &db.to_json()),
        }
    }

    fn print_records(&self, records: &[RecordRef<'_>], handle: &mut dyn Write) -> miette::Result<()> {
        match self.output.output_format {
            OutputFormat::Text => {
                for record in records {
                    handle.write_all(record.as_string().as_bytes()).into_diagnostic()?;
                }
                Ok(())
            }
            OutputFormat::Json => write_json(
                handle,
                &serde_json::Value::Array(records.iter().map(|r| r.to_json()).collect()),
            ),
        }
    }

    fn print_stats(&self, db: &Database, handle: &mut dyn Write) -> miette::Result<()> {
        match self.output.output_format {
            OutputFormat::Text => writeln!(
                handle,
                "roots: {}\nrecords: {}\npointers: {}",
                db.root_count(),
                db.record_count(),
                db.pointer_count()
            )
            .into_diagnostic(),
            OutputFormat::Json => write_json(
                handle,
                &serde_json::json!({
                    "roots": db.root_count(),
                    "records": db.record_count(),
                    "pointers": db.pointer_count(),
                }),
            ),
        }
    }

    fn format(&self, check: bool, files: &Option<Vec<PathBuf>>) -> miette::Result<()> {
        for source in Self::sources(files) {
            let content = source.read_to_string()?;
            let formatted = ged_tree::parse_with_options(&content, self.options())
                .map_err(|err| {
                    miette::Report::new(err).wrap_err(format!("Failed to parse {}", source.name()))
                })?
                .as_string();

            if check {
                if formatted != content {
                    return Err(miette!("The input is not formatted: {}", source.name()));
                }
            } else {
                match &source {
                    Source::Stdin => io::stdout().write_all(formatted.as_bytes()).into_diagnostic()?,
                    Source::File(path) => fs::write(path, formatted).into_diagnostic()?,
                }
            }
        }

        Ok(())
    }
}

fn write_json(handle: &mut dyn Write, value: &serde_json::Value) -> miette::Result<()> {
    serde_json::to_writer_pretty(&mut *handle, value).into_diagnostic()?;
    writeln!(handle).into_diagnostic()
}
