use std::sync::Arc;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use panel_core::{
    presenter::PanelView, query::QueryCache, render_panel, transport::HttpRecordTransport,
    FormEngine, FormRequest, HostContext, RecordTransport, MAX_HOST_INTERFACE_VERSION,
};
use shared::{
    domain::{CategoryId, CompanyId, FormOutcome, RecordId},
    protocol::{CodeListQuery, HsCodeData, HsCodeRecord},
};
use tracing::info;

#[derive(Parser, Debug)]
struct Cli {
    #[arg(long)]
    server_url: String,
    /// Entity model of the host page the panel is embedded against.
    #[arg(long, default_value = "company")]
    model: String,
    /// Id of that entity; together with `--model company` it scopes the
    /// panel to one customer.
    #[arg(long)]
    id: Option<i64>,
    #[arg(long, default_value = "en")]
    locale: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List harmonized system codes, optionally filtered by a search term.
    List {
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Create a new harmonized system code.
    Create {
        code: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        customer: Option<i64>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Replace the writable fields of an existing code.
    Edit {
        pk: i64,
        code: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        customer: Option<i64>,
        #[arg(long, default_value = "")]
        notes: String,
    },
    /// Delete an existing code.
    Delete { pk: i64 },
}

/// The CLI is its own form collaborator: the invocation itself is the
/// "modal", so opening a form only logs what a host would render.
struct CliForms;

#[async_trait]
impl FormEngine for CliForms {
    async fn open(&self, request: FormRequest) -> Result<()> {
        info!(kind = ?request.kind, url = %request.url, "form opened");
        Ok(())
    }
}

async fn find_record(api: &HttpRecordTransport, pk: RecordId) -> Result<HsCodeRecord> {
    let records = api.list(&CodeListQuery::default()).await?;
    records
        .into_iter()
        .find(|record| record.pk == pk)
        .ok_or_else(|| anyhow!("no harmonized system code with pk={}", pk.0))
}

fn print_view(view: &PanelView) {
    if let Some(banner) = &view.banner {
        println!("[{}]", banner.title);
        for line in banner.lines {
            println!("  {line}");
        }
    }
    if view.fetching {
        println!("(fetching)");
    }
    match view.empty_text {
        Some(text) => println!("{text}"),
        None => {
            for row in &view.rows {
                println!(
                    "{:>6}  {:<12} {:<30} {:<20} {:<20} {}",
                    row.pk.0, row.code, row.description, row.category, row.customer, row.notes
                );
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let cli = Cli::parse();

    let api = Arc::new(HttpRecordTransport::new(&cli.server_url)?);
    let ctx = HostContext {
        model: cli.model,
        id: cli.id,
        api: api.clone(),
        forms: Arc::new(CliForms),
        cache: QueryCache::new(),
        locale: cli.locale,
        interface_version: MAX_HOST_INTERFACE_VERSION,
    };
    let panel = render_panel(ctx)?;

    match cli.command {
        Command::List { search } => {
            panel.set_search_term(search).await;
        }
        Command::Create {
            code,
            description,
            category,
            customer,
            notes,
        } => {
            panel.open_create().await?;
            let mut data = HsCodeData {
                code,
                description,
                category: category.map(CategoryId),
                customer: customer.map(CompanyId),
                notes,
            };
            if let Some(scope) = panel.scope() {
                // Scoped panels force the customer field.
                data.customer = Some(scope);
            }
            let record = api.create(&data).await?;
            println!("created harmonized system code pk={}", record.pk.0);
            panel.form_closed(FormOutcome::Submitted).await;
        }
        Command::Edit {
            pk,
            code,
            description,
            category,
            customer,
            notes,
        } => {
            let record = find_record(&api, RecordId(pk)).await?;
            panel.open_edit(record).await?;
            let mut data = HsCodeData {
                code,
                description,
                category: category.map(CategoryId),
                customer: customer.map(CompanyId),
                notes,
            };
            if let Some(scope) = panel.scope() {
                data.customer = Some(scope);
            }
            let updated = api.update(RecordId(pk), &data).await?;
            println!("updated harmonized system code pk={}", updated.pk.0);
            panel.form_closed(FormOutcome::Submitted).await;
        }
        Command::Delete { pk } => {
            let record = find_record(&api, RecordId(pk)).await?;
            panel.open_delete(record).await?;
            api.delete(RecordId(pk)).await?;
            println!("deleted harmonized system code pk={pk}");
            panel.form_closed(FormOutcome::Submitted).await;
        }
    }

    print_view(&panel.view().await);
    Ok(())
}
