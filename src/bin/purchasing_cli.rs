use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use chrono::NaiveDate;
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use purchasing_engine::{
    bootstrap,
    commands::{
        purchaseorders::{
            CreatePurchaseOrderCommand, RefreshPurchaseOrderReceiptStatusCommand,
            SetPurchaseOrderStatusCommand, UpsertPurchaseOrderLineCommand,
        },
        purchaserequests::{
            ApprovePurchaseRequestCommand, ConvertPurchaseRequestCommand,
            CreatePurchaseRequestCommand, RejectPurchaseRequestCommand, ShipTo,
            SubmitPurchaseRequestCommand, UpsertPurchaseRequestLineCommand,
        },
        receipts::{
            CancelReceiptCommand, CreateReceiptCommand, MarkReceiptReceivedCommand,
            ReconcileReceiptCommand, UpsertReceiptLineCommand,
        },
    },
    config,
    entities::{
        actor::ActorRole,
        purchase_order::PurchaseOrderStatus,
        purchase_request::{PurchaseRequestPriority, PurchaseRequestStatus},
        receipt_line::ReceiptLineCondition,
        status_log::{self, AuditEntityType},
    },
    events,
    services::{
        numbering::{DocumentCategory, NumberingScheme},
        purchase_orders::PurchaseOrderDetail,
        purchase_requests::PurchaseRequestDetail,
        receipts::ReceiptDetail,
    },
    PurchasingEngine,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let app_config = config::load_config().context("failed to load application config")?;
    config::init_tracing(&app_config.log_level, app_config.log_json);

    let (engine, event_rx) = bootstrap(&app_config)
        .await
        .context("failed to start purchasing engine")?;
    let events_task = tokio::spawn(events::process_events(event_rx));

    let outcome = match cli.command {
        Commands::Pr(command) => handle_pr_command(&engine, cli.actor, command, cli.json).await,
        Commands::Po(command) => handle_po_command(&engine, cli.actor, command, cli.json).await,
        Commands::Receipt(command) => {
            handle_receipt_command(&engine, cli.actor, command, cli.json).await
        }
        Commands::Settings(command) => {
            handle_settings_command(&engine, cli.actor, command, cli.json).await
        }
        Commands::Actor(command) => {
            handle_actor_command(&engine, cli.actor, command, cli.json).await
        }
        Commands::Log(args) => handle_log_command(&engine, args, cli.json).await,
    };

    // Closing the last sender lets the event loop drain and exit.
    drop(engine);
    let _ = events_task.await;
    outcome
}

#[derive(Parser)]
#[command(
    name = "purchasing",
    about = "Drive purchase requests, purchase orders and receipts",
    version
)]
struct Cli {
    /// Actor performing the operation
    #[arg(long, global = true, env = "PURCHASING_ACTOR", default_value_t = Uuid::nil())]
    actor: Uuid,
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON"
    )]
    json: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(subcommand)]
    Pr(PrCommands),
    #[command(subcommand)]
    Po(PoCommands),
    #[command(subcommand)]
    Receipt(ReceiptCommands),
    #[command(subcommand)]
    Settings(SettingsCommands),
    #[command(subcommand)]
    Actor(ActorCommands),
    /// Show the status log of a document
    Log(LogArgs),
}

#[derive(Subcommand)]
enum PrCommands {
    Create(PrCreateArgs),
    Line(PrLineArgs),
    Submit(DocumentMessageArgs),
    Approve(DocumentMessageArgs),
    Reject(DocumentMessageArgs),
    Convert(PrConvertArgs),
    Show(DocumentArgs),
    List(ProjectListArgs),
}

#[derive(Subcommand)]
enum PoCommands {
    Create(PoCreateArgs),
    Line(PoLineArgs),
    Status(PoStatusArgs),
    /// Re-derive receiving status from receipts
    Refresh(DocumentArgs),
    Coverage(DocumentArgs),
    Show(DocumentArgs),
    List(ProjectListArgs),
    /// Coverage rollup across a vendor's purchase orders
    VendorRollup(VendorArgs),
}

#[derive(Subcommand)]
enum ReceiptCommands {
    Create(ReceiptCreateArgs),
    Line(ReceiptLineArgs),
    Receive(DocumentMessageArgs),
    Reconcile(DocumentMessageArgs),
    Cancel(DocumentMessageArgs),
    Show(DocumentArgs),
}

#[derive(Subcommand)]
enum SettingsCommands {
    Show,
    Threshold {
        #[arg(help = "New approval threshold")]
        amount: Decimal,
    },
    Numbering {
        #[arg(value_enum)]
        category: CategoryArg,
        #[arg(value_enum)]
        scheme: SchemeArg,
    },
}

#[derive(Subcommand)]
enum ActorCommands {
    SetRole {
        target: Uuid,
        #[arg(value_parser = parse_role)]
        role: ActorRole,
    },
}

#[derive(Args)]
struct DocumentArgs {
    id: Uuid,
}

#[derive(Args)]
struct DocumentMessageArgs {
    id: Uuid,
    #[arg(long, short)]
    message: Option<String>,
}

#[derive(Args)]
struct ProjectListArgs {
    project: Uuid,
    #[arg(long)]
    status: Option<String>,
}

#[derive(Args)]
struct VendorArgs {
    vendor: Uuid,
}

#[derive(Args)]
struct PrCreateArgs {
    project: Uuid,
    #[arg(long)]
    needed_by: Option<NaiveDate>,
    #[arg(long, value_parser = parse_priority)]
    priority: Option<PurchaseRequestPriority>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct PrLineArgs {
    id: Uuid,
    #[arg(long)]
    line: Option<Uuid>,
    #[arg(long)]
    description: String,
    #[arg(long)]
    quantity: Decimal,
    #[arg(long)]
    uom: Option<String>,
    #[arg(long)]
    unit_cost: Option<Decimal>,
    #[arg(long)]
    inactive: bool,
}

#[derive(Args)]
struct ShipToArgs {
    #[arg(long)]
    ship_to_name: Option<String>,
    #[arg(long)]
    ship_to_address1: Option<String>,
    #[arg(long)]
    ship_to_address2: Option<String>,
    #[arg(long)]
    ship_to_city: Option<String>,
    #[arg(long)]
    ship_to_state: Option<String>,
    #[arg(long)]
    ship_to_postal_code: Option<String>,
}

impl ShipToArgs {
    fn into_ship_to(self) -> Option<ShipTo> {
        let ship_to = ShipTo {
            name: self.ship_to_name,
            address1: self.ship_to_address1,
            address2: self.ship_to_address2,
            city: self.ship_to_city,
            state: self.ship_to_state,
            postal_code: self.ship_to_postal_code,
        };
        (ship_to != ShipTo::default()).then_some(ship_to)
    }
}

#[derive(Args)]
struct PrConvertArgs {
    id: Uuid,
    #[arg(long)]
    vendor: Uuid,
    #[command(flatten)]
    ship_to: ShipToArgs,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct PoCreateArgs {
    project: Uuid,
    #[arg(long)]
    vendor: Uuid,
    #[command(flatten)]
    ship_to: ShipToArgs,
    #[arg(long)]
    needed_by: Option<NaiveDate>,
    #[arg(long)]
    freight: Option<Decimal>,
    #[arg(long)]
    tax: Option<Decimal>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct PoLineArgs {
    id: Uuid,
    #[arg(long)]
    line: Option<Uuid>,
    #[arg(long)]
    description: String,
    #[arg(long)]
    quantity: Decimal,
    #[arg(long)]
    uom: Option<String>,
    #[arg(long)]
    unit_cost: Decimal,
    #[arg(long)]
    inactive: bool,
}

#[derive(Args)]
struct PoStatusArgs {
    id: Uuid,
    #[arg(value_parser = parse_po_status)]
    status: PurchaseOrderStatus,
    #[arg(long, short)]
    message: Option<String>,
}

#[derive(Args)]
struct ReceiptCreateArgs {
    project: Uuid,
    #[arg(long)]
    vendor: Option<Uuid>,
    #[arg(long)]
    po: Option<Uuid>,
    #[arg(long)]
    location: Option<String>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct ReceiptLineArgs {
    id: Uuid,
    #[arg(long)]
    line: Option<Uuid>,
    #[arg(long, help = "PO line being received; omit for blind receiving")]
    po_line: Option<Uuid>,
    #[arg(long)]
    description: String,
    #[arg(long)]
    quantity: Decimal,
    #[arg(long)]
    uom: Option<String>,
    #[arg(long, value_parser = parse_condition)]
    condition: Option<ReceiptLineCondition>,
    #[arg(long)]
    notes: Option<String>,
}

#[derive(Args)]
struct LogArgs {
    #[arg(value_parser = parse_entity_type)]
    entity_type: AuditEntityType,
    id: Uuid,
}

#[derive(Clone, Copy, ValueEnum)]
enum CategoryArg {
    Pr,
    Po,
    Rcv,
}

impl From<CategoryArg> for DocumentCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Pr => DocumentCategory::PurchaseRequest,
            CategoryArg::Po => DocumentCategory::PurchaseOrder,
            CategoryArg::Rcv => DocumentCategory::Receipt,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum SchemeArg {
    Global,
    Yearly,
}

impl From<SchemeArg> for NumberingScheme {
    fn from(value: SchemeArg) -> Self {
        match value {
            SchemeArg::Global => NumberingScheme::Global,
            SchemeArg::Yearly => NumberingScheme::Yearly,
        }
    }
}

fn parse_enum<T: FromStr>(value: &str, what: &str) -> Result<T, String> {
    T::from_str(value).map_err(|_| format!("unknown {}: {}", what, value))
}

fn parse_role(value: &str) -> Result<ActorRole, String> {
    parse_enum(value, "role")
}

fn parse_priority(value: &str) -> Result<PurchaseRequestPriority, String> {
    parse_enum(value, "priority")
}

fn parse_po_status(value: &str) -> Result<PurchaseOrderStatus, String> {
    parse_enum(value, "purchase order status")
}

fn parse_condition(value: &str) -> Result<ReceiptLineCondition, String> {
    parse_enum(value, "condition")
}

fn parse_entity_type(value: &str) -> Result<AuditEntityType, String> {
    parse_enum(value, "document type")
}

async fn handle_pr_command(
    engine: &PurchasingEngine,
    actor_id: Uuid,
    command: PrCommands,
    json: bool,
) -> Result<()> {
    let service = &engine.services.purchase_requests;
    let detail = match command {
        PrCommands::Create(args) => {
            service
                .create(CreatePurchaseRequestCommand {
                    project_id: args.project,
                    actor_id,
                    needed_by: args.needed_by,
                    priority: args.priority,
                    notes: args.notes,
                })
                .await?
        }
        PrCommands::Line(args) => {
            service
                .upsert_line(UpsertPurchaseRequestLineCommand {
                    purchase_request_id: args.id,
                    actor_id,
                    line_id: args.line,
                    description: args.description,
                    quantity: Some(args.quantity),
                    uom: args.uom,
                    est_unit_cost: args.unit_cost,
                    catalog_item_id: None,
                    sov_line_id: None,
                    timeline_task_id: None,
                    sort_order: None,
                    is_active: Some(!args.inactive),
                })
                .await?
        }
        PrCommands::Submit(args) => {
            service
                .submit(SubmitPurchaseRequestCommand {
                    purchase_request_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        PrCommands::Approve(args) => {
            service
                .approve(ApprovePurchaseRequestCommand {
                    purchase_request_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        PrCommands::Reject(args) => {
            service
                .reject(RejectPurchaseRequestCommand {
                    purchase_request_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        PrCommands::Convert(args) => {
            let result = service
                .convert_to_po(ConvertPurchaseRequestCommand {
                    purchase_request_id: args.id,
                    vendor_id: args.vendor,
                    actor_id,
                    ship_to: args.ship_to.into_ship_to(),
                    notes: args.notes,
                })
                .await?;
            if json {
                return print_json(&result);
            }
            render_pr(&result.purchase_request);
            render_po(&result.purchase_order);
            return Ok(());
        }
        PrCommands::Show(args) => service.get(args.id).await?,
        PrCommands::List(args) => {
            let status = args
                .status
                .as_deref()
                .map(|s| parse_enum::<PurchaseRequestStatus>(s, "status"))
                .transpose()
                .map_err(|e| anyhow!(e))?;
            let requests = service.list_for_project(args.project, status).await?;
            if json {
                return print_json(&requests);
            }
            for pr in &requests {
                println!("- {} • {} • {}", pr.pr_number, pr.status.as_str(), pr.id);
            }
            return Ok(());
        }
    };

    if json {
        print_json(&detail)
    } else {
        render_pr(&detail);
        Ok(())
    }
}

async fn handle_po_command(
    engine: &PurchasingEngine,
    actor_id: Uuid,
    command: PoCommands,
    json: bool,
) -> Result<()> {
    let service = &engine.services.purchase_orders;
    let detail = match command {
        PoCommands::Create(args) => {
            service
                .create(CreatePurchaseOrderCommand {
                    project_id: args.project,
                    vendor_id: args.vendor,
                    actor_id,
                    ship_to: args.ship_to.into_ship_to(),
                    needed_by: args.needed_by,
                    freight_estimate: args.freight,
                    tax_estimate: args.tax,
                    notes: args.notes,
                })
                .await?
        }
        PoCommands::Line(args) => {
            service
                .upsert_line(UpsertPurchaseOrderLineCommand {
                    purchase_order_id: args.id,
                    actor_id,
                    line_id: args.line,
                    description: args.description,
                    quantity: args.quantity,
                    uom: args.uom,
                    unit_cost: args.unit_cost,
                    line_status: None,
                    catalog_item_id: None,
                    sov_line_id: None,
                    timeline_task_id: None,
                    sort_order: None,
                    is_active: Some(!args.inactive),
                })
                .await?
        }
        PoCommands::Status(args) => {
            service
                .set_status(SetPurchaseOrderStatusCommand {
                    purchase_order_id: args.id,
                    status: args.status,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        PoCommands::Refresh(args) => {
            service
                .refresh_receipt_status(RefreshPurchaseOrderReceiptStatusCommand {
                    purchase_order_id: args.id,
                    actor_id,
                })
                .await?
        }
        PoCommands::Coverage(args) => {
            let coverage = engine.services.coverage.po_coverage(args.id).await?;
            if json {
                return print_json(&coverage);
            }
            println!(
                "PO {} • {} • receipts {}",
                coverage.po_number,
                coverage.status.as_str(),
                coverage.receipt_state.as_str()
            );
            for line in &coverage.lines {
                println!(
                    "  - {} • ordered {} • received {} • open {} • {}",
                    line.description,
                    line.qty_ordered,
                    line.qty_received,
                    line.qty_open,
                    line.state.as_str()
                );
            }
            return Ok(());
        }
        PoCommands::Show(args) => service.get(args.id).await?,
        PoCommands::List(args) => {
            let status = args
                .status
                .as_deref()
                .map(parse_po_status)
                .transpose()
                .map_err(|e| anyhow!(e))?;
            let orders = service.list_for_project(args.project, status).await?;
            if json {
                return print_json(&orders);
            }
            for po in &orders {
                println!("- {} • {} • {}", po.po_number, po.status.as_str(), po.id);
            }
            return Ok(());
        }
        PoCommands::VendorRollup(args) => {
            let rollup = engine.services.coverage.vendor_rollup(args.vendor).await?;
            if json {
                return print_json(&rollup);
            }
            println!(
                "Vendor {} • {} POs ({} open, {} fully received) • committed {}",
                rollup.vendor_id,
                rollup.po_count,
                rollup.open_po_count,
                rollup.fully_received_po_count,
                rollup.committed_value
            );
            return Ok(());
        }
    };

    if json {
        print_json(&detail)
    } else {
        render_po(&detail);
        Ok(())
    }
}

async fn handle_receipt_command(
    engine: &PurchasingEngine,
    actor_id: Uuid,
    command: ReceiptCommands,
    json: bool,
) -> Result<()> {
    let service = &engine.services.receipts;
    let detail = match command {
        ReceiptCommands::Create(args) => {
            service
                .create(CreateReceiptCommand {
                    project_id: args.project,
                    actor_id,
                    vendor_id: args.vendor,
                    purchase_order_id: args.po,
                    location: args.location,
                    notes: args.notes,
                })
                .await?
        }
        ReceiptCommands::Line(args) => {
            service
                .upsert_line(UpsertReceiptLineCommand {
                    receipt_id: args.id,
                    actor_id,
                    line_id: args.line,
                    purchase_order_line_id: args.po_line,
                    description: args.description,
                    qty_received: args.quantity,
                    uom: args.uom,
                    condition: args.condition,
                    notes: args.notes,
                })
                .await?
        }
        ReceiptCommands::Receive(args) => {
            service
                .mark_received(MarkReceiptReceivedCommand {
                    receipt_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        ReceiptCommands::Reconcile(args) => {
            service
                .reconcile(ReconcileReceiptCommand {
                    receipt_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        ReceiptCommands::Cancel(args) => {
            service
                .cancel(CancelReceiptCommand {
                    receipt_id: args.id,
                    actor_id,
                    message: args.message,
                })
                .await?
        }
        ReceiptCommands::Show(args) => service.get(args.id).await?,
    };

    if json {
        print_json(&detail)
    } else {
        render_receipt(&detail);
        Ok(())
    }
}

async fn handle_settings_command(
    engine: &PurchasingEngine,
    actor_id: Uuid,
    command: SettingsCommands,
    json: bool,
) -> Result<()> {
    let service = &engine.services.settings;
    let policy = match command {
        SettingsCommands::Show => service.current().await?,
        SettingsCommands::Threshold { amount } => {
            service.set_approval_threshold(actor_id, amount).await?
        }
        SettingsCommands::Numbering { category, scheme } => {
            service
                .set_numbering_scheme(actor_id, category.into(), scheme.into())
                .await?
        }
    };

    if json {
        print_json(&policy)
    } else {
        println!("Approval threshold: {}", policy.approval_threshold);
        println!(
            "Numbering: PR {} • PO {} • RCV {}",
            policy.pr_numbering, policy.po_numbering, policy.receipt_numbering
        );
        Ok(())
    }
}

async fn handle_actor_command(
    engine: &PurchasingEngine,
    actor_id: Uuid,
    command: ActorCommands,
    json: bool,
) -> Result<()> {
    match command {
        ActorCommands::SetRole { target, role } => {
            let actor = engine
                .services
                .administration
                .set_actor_role(actor_id, target, role)
                .await?;
            if json {
                print_json(&actor)
            } else {
                println!("Actor {} now has role {}", actor.display_name, actor.role.as_str());
                Ok(())
            }
        }
    }
}

async fn handle_log_command(engine: &PurchasingEngine, args: LogArgs, json: bool) -> Result<()> {
    let entries = engine
        .services
        .audit_log
        .entries_for_entity(args.entity_type, args.id)
        .await?;
    if json {
        return print_json(&entries);
    }
    for entry in &entries {
        render_log_entry(entry);
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_pr(detail: &PurchaseRequestDetail) {
    println!(
        "PR {} • {} • total {} • {}",
        detail.header.pr_number,
        detail.header.status.as_str(),
        detail.total,
        detail.header.id
    );
    for line in &detail.lines {
        println!(
            "  - {} • qty {} • est {} • {}",
            line.description,
            line.quantity,
            line.est_unit_cost
                .map(|c| c.to_string())
                .unwrap_or_else(|| "-".into()),
            if line.is_active { "active" } else { "inactive" }
        );
    }
}

fn render_po(detail: &PurchaseOrderDetail) {
    println!(
        "PO {} • {} • total {} • {}",
        detail.header.po_number,
        detail.header.status.as_str(),
        detail.total,
        detail.header.id
    );
    for line in &detail.lines {
        println!(
            "  - {} • qty {} @ {} • {}",
            line.description, line.quantity, line.unit_cost, line.id
        );
    }
}

fn render_receipt(detail: &ReceiptDetail) {
    println!(
        "Receipt {} • {} • {} unlinked • {}",
        detail.header.receipt_number,
        detail.header.status.as_str(),
        detail.unlinked_count,
        detail.header.id
    );
    for line in &detail.lines {
        let link = line
            .purchase_order_line_id
            .map(|id| id.to_string())
            .unwrap_or_else(|| "blind".into());
        println!(
            "  - {} • received {} • {} • {}",
            line.description,
            line.qty_received,
            line.condition.as_str(),
            link
        );
    }
}

fn render_log_entry(entry: &status_log::Model) {
    let transition = match (&entry.from_status, &entry.to_status) {
        (Some(from), Some(to)) => format!("{} -> {}", from, to),
        (None, Some(to)) => format!("-> {}", to),
        _ => String::new(),
    };
    println!(
        "{} • {} • {} {}",
        entry.created_at.format("%Y-%m-%d %H:%M:%S"),
        entry.actor_id,
        entry.message,
        transition
    );
}
