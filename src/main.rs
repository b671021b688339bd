use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use gridedit::{
    EditableGrid, Field, HttpRepository, RepositoryConfig, RowId, StagedBulkUpdate,
    StagedUpdate, ViewRow,
};
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gridedit")]
#[command(about = "Review and edit grid rows against the configured API")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print rows, optionally filtered (FIELD=PATTERN, case-insensitive substring)
    List {
        #[arg(long = "filter")]
        filters: Vec<String>,
    },
    /// Edit one row and commit it
    Update {
        #[arg(long)]
        row: usize,
        /// FIELD=VALUE, repeatable
        #[arg(long = "set", required = true)]
        assignments: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
    /// Edit several rows and commit them as one batch
    Bulk {
        /// ROW:FIELD=VALUE, repeatable
        #[arg(long = "set", required = true)]
        assignments: Vec<String>,
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config = RepositoryConfig::from_env().context("loading API endpoints")?;
    let repository = HttpRepository::new(config).context("building HTTP client")?;
    let grid = EditableGrid::new(Arc::new(repository));

    grid.fetch().await.context("loading rows")?;

    match cli.command {
        Command::List { filters } => list(&grid, &filters).await,
        Command::Update {
            row,
            assignments,
            yes,
        } => update(&grid, row, &assignments, yes).await,
        Command::Bulk { assignments, yes } => bulk(&grid, &assignments, yes).await,
    }
}

async fn list(grid: &EditableGrid, filters: &[String]) -> Result<()> {
    for raw in filters {
        let (field, pattern) = parse_assignment(raw)?;
        grid.set_filter(field, &pattern).await;
    }
    let columns = grid.schema().await.column_list().to_vec();
    print_rows(&columns, &grid.view().await);
    Ok(())
}

async fn update(grid: &EditableGrid, index: usize, assignments: &[String], yes: bool) -> Result<()> {
    let row = resolve_row(grid, index).await?;
    for raw in assignments {
        let (field, value) = parse_assignment(raw)?;
        grid.set_field(row, field, value).await?;
    }

    let staged = match grid.stage_update(row).await {
        Ok(staged) => staged,
        Err(err) if err.is_refusal() => {
            println!("Nothing to update: {}", err);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    describe_update(&staged);
    if !yes && !confirm("Are you sure you want to update this row?")? {
        grid.cancel_update().await;
        println!("Cancelled.");
        return Ok(());
    }

    grid.confirm_update().await?;
    println!("Row {} updated.", index);
    Ok(())
}

async fn bulk(grid: &EditableGrid, assignments: &[String], yes: bool) -> Result<()> {
    for raw in assignments {
        let (index, rest) = raw
            .split_once(':')
            .ok_or_else(|| anyhow!("expected ROW:FIELD=VALUE, got '{}'", raw))?;
        let index: usize = index
            .trim()
            .parse()
            .with_context(|| format!("invalid row number in '{}'", raw))?;
        let row = resolve_row(grid, index).await?;
        let (field, value) = parse_assignment(rest)?;
        grid.set_field(row, field, value).await?;
    }

    let staged = match grid.stage_bulk_update().await {
        Ok(staged) => staged,
        Err(err) if err.is_refusal() => {
            println!("Nothing to update: {}", err);
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };
    describe_bulk(&staged);
    if !yes && !confirm(&format!("Are you sure you want to update {} row(s)?", staged.len()))? {
        grid.cancel_bulk_update().await;
        println!("Cancelled.");
        return Ok(());
    }

    grid.confirm_bulk_update().await?;
    println!("{} row(s) updated.", staged.len());
    Ok(())
}

async fn resolve_row(grid: &EditableGrid, index: usize) -> Result<RowId> {
    grid.row_id(index)
        .await
        .ok_or_else(|| anyhow!("row {} does not exist", index))
}

fn parse_assignment(raw: &str) -> Result<(Field, String)> {
    let (name, value) = raw
        .split_once('=')
        .ok_or_else(|| anyhow!("expected FIELD=VALUE, got '{}'", raw))?;
    let field: Field = name.parse()?;
    Ok((field, value.to_string()))
}

fn print_rows(columns: &[Field], rows: &[ViewRow]) {
    let header: Vec<&str> = columns.iter().map(Field::as_str).collect();
    println!("#\t{}", header.join("\t"));
    for row in rows {
        let cells: Vec<&str> = columns
            .iter()
            .map(|field| row.record.get(*field).unwrap_or(""))
            .collect();
        let marker = if row.dirty { "*" } else { "" };
        println!("{}{}\t{}", row.id.index(), marker, cells.join("\t"));
    }
    println!("({} row(s))", rows.len());
}

fn describe_update(staged: &StagedUpdate) {
    println!("Row {}:", staged.row().index());
    for (field, value) in staged.record().fields() {
        println!("  {} = {}", field, value);
    }
}

fn describe_bulk(staged: &StagedBulkUpdate) {
    for candidate in staged.candidates() {
        println!("Row {}:", candidate.row.index());
        for (field, value) in candidate.record.fields() {
            println!("  {} = {}", field, value);
        }
    }
}

fn confirm(question: &str) -> Result<bool> {
    print!("{} [y/N] ", question);
    io::stdout().flush()?;

    let mut answer = String::new();
    let read = io::stdin().lock().read_line(&mut answer)?;
    if read == 0 {
        bail!("no answer on stdin; pass --yes to skip confirmation");
    }
    Ok(matches!(answer.trim(), "y" | "Y" | "yes" | "YES"))
}
