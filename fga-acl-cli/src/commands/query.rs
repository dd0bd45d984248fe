use crate::profiles::{ProfilesFile, DEFAULT_CONNECTION};
use clap::{Args, ValueEnum};
use colored::Colorize;
use fga_acl::{ChannelSink, Column, PermissionFact, PermissionTable, QueryPredicate};
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One JSON object per line
    Json,
    /// Tab-separated columns with a header line
    Tsv,
}

#[derive(Debug, Clone, Args)]
pub struct QueryArgs {
    /// Object type (e.g. doc)
    #[arg(long)]
    pub object_type: Option<String>,
    /// Object identifier
    #[arg(long)]
    pub object_id: Option<String>,
    /// Subject type (e.g. user)
    #[arg(long)]
    pub subject_type: Option<String>,
    /// Subject identifier
    #[arg(long)]
    pub subject_id: Option<String>,
    /// Relation (e.g. viewer)
    #[arg(short, long)]
    pub relation: Option<String>,
    /// Connection profile to query
    #[arg(short, long, default_value = DEFAULT_CONNECTION)]
    pub connection: String,
    /// Maximum number of rows to return
    #[arg(short, long)]
    pub limit: Option<u64>,
    #[arg(long, value_enum, default_value_t = OutputFormat::Json)]
    pub format: OutputFormat,
}

impl QueryArgs {
    /// The predicates bound by the column flags.
    pub fn predicate(&self) -> QueryPredicate {
        let mut predicate = QueryPredicate::new();
        let flags = [
            (Column::ObjectType, &self.object_type),
            (Column::ObjectId, &self.object_id),
            (Column::SubjectType, &self.subject_type),
            (Column::SubjectId, &self.subject_id),
            (Column::Relation, &self.relation),
        ];
        for (column, value) in flags {
            if let Some(value) = value {
                predicate.set(column, value.as_str());
            }
        }
        predicate
    }
}

/// Run a permission query and print the rows to stdout.
///
/// Rows are printed as soon as they arrive. Ctrl-C cancels the query.
pub async fn run(args: &QueryArgs, profiles: &ProfilesFile) -> Result<(), Box<dyn std::error::Error>> {
    let profile = profiles.profile(&args.connection)?;
    let predicate = args.predicate();

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupted, cancelling query");
            on_interrupt.cancel();
        }
    });

    let format = args.format;
    let (mut sink, mut rows) = ChannelSink::new(args.limit);
    let printer = tokio::spawn(async move {
        if format == OutputFormat::Tsv {
            println!("{}", header().bold());
        }
        let mut count = 0usize;
        while let Some(fact) = rows.recv().await {
            match render(&fact, format) {
                Ok(line) => println!("{}", line),
                Err(e) => tracing::error!(error = %e, "failed to render row"),
            }
            count += 1;
        }
        count
    });

    let table = PermissionTable::grpc();
    let result = table.list(&profile, &predicate, &mut sink, &cancel).await;
    drop(sink);
    let count = printer.await?;
    table.shutdown();
    result?;

    eprintln!("{}", format!("{} row(s)", count).dimmed());
    Ok(())
}

/// Tab-separated column names.
pub fn header() -> String {
    fga_acl::table::COLUMNS
        .iter()
        .map(|c| c.name)
        .collect::<Vec<_>>()
        .join("\t")
}

/// Render one row in `format`.
pub fn render(fact: &PermissionFact, format: OutputFormat) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Json => serde_json::to_string(fact),
        OutputFormat::Tsv => Ok([
            fact.object_type.clone(),
            fact.object_id.clone(),
            fact.subject_type.clone(),
            fact.subject_id.clone(),
            fact.relation.clone(),
            fact.allowed.map(|a| a.to_string()).unwrap_or_default(),
            fact.policy_version.clone().unwrap_or_default(),
            fact.evaluated_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
        ]
        .join("\t")),
    }
}
