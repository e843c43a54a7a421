//! CLI definition and dispatch.

use chrono::{Datelike, Local, NaiveDate};
use clap::{Parser, Subcommand, ValueEnum};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_chart::JsonChartAdapter;
use crate::adapters::typst_chart::TypstChartAdapter;
use crate::domain::calendar::{PeriodSummary, daily_pnl};
use crate::domain::config_validation::validate_journal_config;
use crate::domain::error::JournalError;
use crate::domain::pnl_series::{PnlSeries, ViewMode, build_pnl_series};
use crate::domain::point_value::{PointValueTable, instrument_root};
use crate::domain::reconstructor::{
    OpenPolicy, ReconstructionReport, ReconstructorConfig, reconstruct_with_report,
};
use crate::domain::trade::{CompletedTrade, TradeRecord};
use crate::logging::init_tracing;
use crate::ports::chart_port::ChartPort;
use crate::ports::config_port::ConfigPort;
use crate::ports::trade_store_port::TradeStorePort;

#[derive(Parser, Debug)]
#[command(name = "tradejournal", about = "Import broker trade logs and chart cumulative P&L")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ChartFormat {
    Typst,
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Reconstruct trades from a broker fill log and store them
    Import {
        #[arg(short, long)]
        file: PathBuf,
        #[arg(short, long)]
        config: PathBuf,
        #[arg(long)]
        dry_run: bool,
    },
    /// Build the cumulative P&L chart for a month or year
    Chart {
        #[arg(short, long)]
        config: PathBuf,
        /// monthly or yearly; defaults to [journal] view_mode
        #[arg(long)]
        mode: Option<String>,
        /// Reference date (YYYY-MM-DD); defaults to today
        #[arg(long)]
        date: Option<String>,
        #[arg(long, value_enum, default_value_t = ChartFormat::Typst)]
        format: ChartFormat,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Chart a fill log directly instead of the trade store
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Show daily P&L for one month
    Calendar {
        #[arg(short, long)]
        config: PathBuf,
        /// Month as YYYY-MM
        #[arg(long)]
        month: String,
    },
    /// Decode a symbol's instrument root and point value
    PointValue {
        symbol: String,
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

/// Settings resolved from the `[journal]`, `[log]` and `[point_values]` sections.
#[derive(Debug, Clone)]
pub struct JournalConfig {
    pub commission_per_trade: f64,
    pub open_policy: OpenPolicy,
    pub view_mode: ViewMode,
    pub point_values: PointValueTable,
    pub log_level: String,
    pub log_format: String,
}

impl JournalConfig {
    pub fn reconstructor(&self) -> ReconstructorConfig {
        ReconstructorConfig {
            open_policy: self.open_policy,
            point_values: self.point_values.clone(),
        }
    }
}

pub fn run(cli: Cli) -> ExitCode {
    match execute(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

pub fn execute(command: Command) -> Result<(), JournalError> {
    match command {
        Command::Import {
            file,
            config,
            dry_run,
        } => run_import(&file, &config, dry_run),
        Command::Chart {
            config,
            mode,
            date,
            format,
            output,
            file,
        } => run_chart(
            &config,
            mode.as_deref(),
            date.as_deref(),
            format,
            output.as_ref(),
            file.as_ref(),
        ),
        Command::Calendar { config, month } => run_calendar(&config, &month),
        Command::PointValue { symbol, config } => run_point_value(&symbol, config.as_ref()),
    }
}

pub fn build_journal_config(adapter: &dyn ConfigPort) -> Result<JournalConfig, JournalError> {
    let open_policy = match adapter.get_string("journal", "open_policy") {
        Some(raw) => raw.parse().map_err(|reason| JournalError::ConfigInvalid {
            section: "journal".into(),
            key: "open_policy".into(),
            reason,
        })?,
        None => OpenPolicy::default(),
    };
    let view_mode = match adapter.get_string("journal", "view_mode") {
        Some(raw) => raw.parse().map_err(|reason| JournalError::ConfigInvalid {
            section: "journal".into(),
            key: "view_mode".into(),
            reason,
        })?,
        None => ViewMode::default(),
    };

    let mut point_values = PointValueTable::builtin();
    for root in adapter.section_keys("point_values") {
        let value = adapter.get_double("point_values", &root, 0.0);
        if value > 0.0 {
            point_values = point_values.with_override(&root, value);
        }
    }
    tracing::debug!(roots = point_values.len(), "point value table ready");

    Ok(JournalConfig {
        commission_per_trade: adapter.get_double("journal", "commission_per_trade", 0.0),
        open_policy,
        view_mode,
        point_values,
        log_level: adapter
            .get_string("log", "level")
            .unwrap_or_else(|| "info".to_string()),
        log_format: adapter
            .get_string("log", "format")
            .unwrap_or_else(|| "text".to_string()),
    })
}

/// Load, validate and resolve the config file, then install logging from it.
pub fn load_config(path: &Path) -> Result<(FileConfigAdapter, JournalConfig), JournalError> {
    let adapter = FileConfigAdapter::from_file(path)?;
    validate_journal_config(&adapter)?;
    let config = build_journal_config(&adapter)?;
    init_tracing(&config.log_level, &config.log_format)?;
    tracing::debug!(file = %path.display(), open_policy = ?config.open_policy, "config loaded");
    Ok((adapter, config))
}

/// Open the trade store selected by `[store] backend`.
pub fn open_store(adapter: &dyn ConfigPort) -> Result<Box<dyn TradeStorePort>, JournalError> {
    let backend = adapter
        .get_string("store", "backend")
        .unwrap_or_else(|| "sqlite".to_string())
        .to_lowercase();

    match backend.as_str() {
        "csv" => {
            let path = adapter.get_string("store", "csv_path").ok_or_else(|| {
                JournalError::ConfigMissing {
                    section: "store".into(),
                    key: "csv_path".into(),
                }
            })?;
            Ok(Box::new(CsvAdapter::new(PathBuf::from(path))))
        }
        #[cfg(feature = "sqlite")]
        "sqlite" => {
            use crate::adapters::sqlite_adapter::SqliteAdapter;
            Ok(Box::new(SqliteAdapter::from_config(adapter)?))
        }
        other => Err(JournalError::ConfigInvalid {
            section: "store".into(),
            key: "backend".into(),
            reason: format!("backend '{other}' is not available in this build"),
        }),
    }
}

/// Subtract a flat per-trade commission from every record's profit.
pub fn apply_commission(records: &[TradeRecord], commission: f64) -> Vec<TradeRecord> {
    records
        .iter()
        .map(|r| r.clone().with_profit(r.profit - commission))
        .collect()
}

/// First and last day of the month or year containing `reference`.
pub fn period_bounds(mode: ViewMode, reference: NaiveDate) -> (NaiveDate, NaiveDate) {
    let year = reference.year();
    match mode {
        ViewMode::Yearly => (
            NaiveDate::from_ymd_opt(year, 1, 1).unwrap_or(reference),
            NaiveDate::from_ymd_opt(year, 12, 31).unwrap_or(reference),
        ),
        ViewMode::Monthly => {
            let start = reference.with_day(1).unwrap_or(reference);
            let next_month = if reference.month() == 12 {
                NaiveDate::from_ymd_opt(year + 1, 1, 1)
            } else {
                NaiveDate::from_ymd_opt(year, reference.month() + 1, 1)
            };
            let end = next_month.and_then(|d| d.pred_opt()).unwrap_or(reference);
            (start, end)
        }
    }
}

pub fn parse_reference_date(raw: Option<&str>) -> Result<NaiveDate, JournalError> {
    match raw {
        None => Ok(Local::now().date_naive()),
        Some(s) => NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| {
            JournalError::InvalidArgument {
                name: "date".into(),
                reason: format!("'{s}' is not a YYYY-MM-DD date"),
            }
        }),
    }
}

pub fn parse_month(raw: &str) -> Result<NaiveDate, JournalError> {
    NaiveDate::parse_from_str(&format!("{}-01", raw.trim()), "%Y-%m-%d").map_err(|_| {
        JournalError::InvalidArgument {
            name: "month".into(),
            reason: format!("'{raw}' is not a YYYY-MM month"),
        }
    })
}

pub fn read_log(path: &Path) -> Result<String, JournalError> {
    fs::read_to_string(path).map_err(|e| {
        tracing::error!(file = %path.display(), error = %e, "cannot read trade log");
        JournalError::Io(e)
    })
}

pub fn import_log(
    text: &str,
    config: &JournalConfig,
) -> (Vec<CompletedTrade>, ReconstructionReport) {
    reconstruct_with_report(text, &config.reconstructor())
}

/// Commission-adjusted series for the period around `reference`.
pub fn chart_series(
    records: &[TradeRecord],
    config: &JournalConfig,
    mode: ViewMode,
    reference: NaiveDate,
) -> PnlSeries {
    let adjusted = apply_commission(records, config.commission_per_trade);
    build_pnl_series(&adjusted, mode, reference)
}

pub fn chart_port(format: ChartFormat) -> Box<dyn ChartPort> {
    match format {
        ChartFormat::Typst => Box::new(TypstChartAdapter),
        ChartFormat::Json => Box::new(JsonChartAdapter { pretty: true }),
    }
}

fn run_import(file: &Path, config_path: &Path, dry_run: bool) -> Result<(), JournalError> {
    let (adapter, config) = load_config(config_path)?;

    eprintln!("Reading trade log {}", file.display());
    let text = read_log(file)?;
    let (trades, report) = import_log(&text, &config);

    if !report.header_found {
        eprintln!("warning: no DateTime header found; nothing imported");
    }

    for t in &trades {
        println!(
            "{}  {:<14} {:<5} {:>6} {:>12.2} {:>12.2} {:>12.2}",
            t.date.format("%Y-%m-%d %H:%M:%S"),
            t.symbol,
            if t.is_long() { "long" } else { "short" },
            t.quantity,
            t.entry_price,
            t.exit_price,
            t.profit
        );
    }

    let total: f64 = trades.iter().map(|t| t.profit).sum();
    eprintln!(
        "{} trades reconstructed, net {:.2} ({} rows skipped, {} unmatched closes, {} still open)",
        trades.len(),
        total,
        report.rows_skipped,
        report.unmatched_closes,
        report.open_positions
    );
    if report.overwritten_opens > 0 {
        eprintln!(
            "warning: {} open fills were replaced by a later open on the same symbol",
            report.overwritten_opens
        );
    }

    if dry_run {
        eprintln!("Dry run: nothing stored");
        return Ok(());
    }

    let records: Vec<TradeRecord> = trades.iter().map(TradeRecord::from).collect();
    let store = open_store(&adapter)?;
    let written = store.save_trades(&records)?;
    eprintln!("{} new trades stored", written);
    Ok(())
}

fn run_chart(
    config_path: &Path,
    mode: Option<&str>,
    date: Option<&str>,
    format: ChartFormat,
    output: Option<&PathBuf>,
    file: Option<&PathBuf>,
) -> Result<(), JournalError> {
    let (adapter, config) = load_config(config_path)?;

    let mode = match mode {
        Some(raw) => raw
            .parse::<ViewMode>()
            .map_err(|reason| JournalError::InvalidArgument {
                name: "mode".into(),
                reason,
            })?,
        None => config.view_mode,
    };
    let reference = parse_reference_date(date)?;

    let records: Vec<TradeRecord> = match file {
        Some(path) => {
            let text = read_log(path)?;
            let (trades, _) = import_log(&text, &config);
            trades.iter().map(TradeRecord::from).collect()
        }
        None => {
            let (start, end) = period_bounds(mode, reference);
            open_store(&adapter)?.load_trades(start, end)?
        }
    };

    let series = chart_series(&records, &config, mode, reference);
    let port = chart_port(format);
    let output = output
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("pnl.{}", port.extension())));
    port.write(&series, &output)?;

    eprintln!(
        "{} trades, net {:.2}, domain [{:.2}, {:.2}]",
        series.trade_points().count(),
        series.total(),
        series.domain.min,
        series.domain.max
    );
    eprintln!("Chart written to: {}", output.display());
    Ok(())
}

fn run_calendar(config_path: &Path, month: &str) -> Result<(), JournalError> {
    let (adapter, config) = load_config(config_path)?;
    let reference = parse_month(month)?;
    let (start, end) = period_bounds(ViewMode::Monthly, reference);

    let records = apply_commission(
        &open_store(&adapter)?.load_trades(start, end)?,
        config.commission_per_trade,
    );

    for day in daily_pnl(&records, reference.year(), reference.month()) {
        let sign = if day.pnl >= 0.0 { "+" } else { "" };
        println!(
            "{}  {:>3} trades  {}{:.2}",
            day.date, day.trades, sign, day.pnl
        );
    }

    let summary = PeriodSummary::compute(&records);
    println!(
        "total {:.2} over {} trades, win rate {:.1}%, largest win {:.2}, largest loss {:.2}",
        summary.total_pnl,
        summary.total_trades,
        summary.win_rate * 100.0,
        summary.largest_win,
        summary.largest_loss
    );
    Ok(())
}

fn run_point_value(symbol: &str, config_path: Option<&PathBuf>) -> Result<(), JournalError> {
    let table = match config_path {
        Some(path) => load_config(path)?.1.point_values,
        None => PointValueTable::builtin(),
    };
    println!(
        "{}  root={}  point_value={}",
        symbol,
        instrument_root(symbol),
        table.point_value(symbol)
    );
    Ok(())
}
