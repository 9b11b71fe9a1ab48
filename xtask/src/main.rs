//! Build automation tasks for linebatch
//!
//! Currently generates the worker CLI reference from its clap definitions.

use anyhow::Context;
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Build automation tasks for linebatch", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Parser)]
enum Command {
    /// Generate the worker CLI reference in Markdown
    GenerateCliDocs {
        /// Output directory for generated documentation
        #[arg(short, long, default_value = "docs")]
        output_dir: String,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::GenerateCliDocs { output_dir } => generate_cli_docs(&output_dir)?,
    }

    Ok(())
}

fn generate_cli_docs(output_dir: &str) -> anyhow::Result<()> {
    println!("Generating worker CLI documentation...");

    let markdown = clap_markdown::help_markdown::<linebatch_worker::Cli>();

    let content = format!(
        r#"# linebatch-worker Reference

Generated from the worker's clap definitions on {}.

Every flag can also be set through the environment variable shown next to it, or
through a `.env` file in the working directory. Logging follows `RUST_LOG` and the
`LOG_*` variables.

## Running a fleet

```bash
# Coordinator
LINEBATCH_DATASET=/data/arxiv.jsonl linebatch-server

# Any number of random-mode workers
linebatch-worker random --coordinator-url http://coordinator:8000

# Or a single sequential worker
linebatch-worker sequential
```

{}

---

*Regenerate with `cargo xtask generate-cli-docs`.*
"#,
        chrono::Utc::now().format("%Y-%m-%d"),
        markdown
    );

    let output_path = PathBuf::from(output_dir);
    fs::create_dir_all(&output_path)
        .with_context(|| format!("creating {}", output_path.display()))?;

    let file_path = output_path.join("worker-cli.md");
    fs::write(&file_path, content).with_context(|| format!("writing {}", file_path.display()))?;

    println!("Generated worker CLI documentation at: {}", file_path.display());
    Ok(())
}
