//! Resolution pipeline: source bundles in, canonical shows and run reports out.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use arrow_array::{Int32Array, RecordBatch, StringArray, UInt32Array};
use arrow_schema::{DataType, Field as ArrowField, Schema};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use parquet::arrow::ArrowWriter;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use showrec_adapters::{
    adapter_for_source, load_record_bundle, parse_timezone, DateSide, NormalizedRecord,
    ParserConfig, StandardStringDateParser, DEFAULT_DESCRIPTION_CUTOFF,
};
use showrec_core::{CanonicalShow, PartialDate, ScrapedRecord};
use showrec_storage::{MemoryShowStore, PgShowStore, ShowStore, StoreError};
use tokio::fs;
use tracing::{info, info_span, warn};
use uuid::Uuid;

pub mod candidates;
pub mod merge;

pub use candidates::{build_candidate_filter, find_candidates, CandidateError, Resolution};
pub use merge::{merge_record, new_show, reconcile_end, reconcile_start, MergeChanges, RecordDates};

pub const CRATE_NAME: &str = "showrec-sync";

#[derive(Debug, Clone, Deserialize)]
pub struct SourceRegistry {
    pub sources: Vec<SourceConfig>,
}

impl SourceRegistry {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text).context("parsing source registry")
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        serde_yaml::from_str(&text).with_context(|| format!("parsing {}", path.display()))
    }

    pub fn enabled(&self) -> impl Iterator<Item = &SourceConfig> {
        self.sources.iter().filter(|source| source.enabled)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    pub source_id: String,
    pub display_name: String,
    pub enabled: bool,
    /// IANA name; sources without one use the configured default.
    #[serde(default)]
    pub timezone: Option<String>,
    /// Relative to the workspace root. Defaults to `fixtures/<source_id>/sample/bundle.json`.
    #[serde(default)]
    pub bundle_path: Option<PathBuf>,
    /// Marker the source appends to truncated descriptions.
    #[serde(default)]
    pub description_cutoff: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ResolveConfig {
    pub database_url: Option<String>,
    pub workspace_root: PathBuf,
    pub state_path: PathBuf,
    pub default_timezone: Tz,
    pub description_cutoff: String,
}

impl ResolveConfig {
    pub fn for_workspace(workspace_root: impl Into<PathBuf>) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            database_url: None,
            state_path: workspace_root.join("state").join("shows.json"),
            workspace_root,
            default_timezone: Tz::UTC,
            description_cutoff: DEFAULT_DESCRIPTION_CUTOFF.to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());
        let mut config = Self::for_workspace(
            lookup("SHOWREC_WORKSPACE_ROOT")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        );
        config.database_url = lookup("DATABASE_URL");
        if let Some(state_path) = lookup("SHOWREC_STATE_PATH") {
            config.state_path = PathBuf::from(state_path);
        }
        if let Some(name) = lookup("SHOWREC_DEFAULT_TIMEZONE") {
            config.default_timezone =
                parse_timezone(&name).context("reading SHOWREC_DEFAULT_TIMEZONE")?;
        }
        if let Some(cutoff) = lookup("SHOWREC_DESCRIPTION_CUTOFF") {
            config.description_cutoff = cutoff;
        }
        Ok(config)
    }

    pub fn registry_path(&self) -> PathBuf {
        self.workspace_root.join("sources.yaml")
    }

    pub fn parser_config(&self) -> ParserConfig {
        ParserConfig {
            default_timezone: self.default_timezone,
        }
    }

    fn bundle_path_for(&self, source: &SourceConfig) -> PathBuf {
        match &source.bundle_path {
            Some(path) => self.workspace_root.join(path),
            None => self
                .workspace_root
                .join("fixtures")
                .join(&source.source_id)
                .join("sample")
                .join("bundle.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveAction {
    Created,
    Merged,
    Unchanged,
    Ambiguous,
    Rejected,
}

impl ResolveAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResolveAction::Created => "created",
            ResolveAction::Merged => "merged",
            ResolveAction::Unchanged => "unchanged",
            ResolveAction::Ambiguous => "ambiguous",
            ResolveAction::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RecordOutcome {
    pub record_id: Uuid,
    pub source_id: String,
    pub name: String,
    pub action: ResolveAction,
    pub show_id: Option<Uuid>,
    /// Competing shows when the record was ambiguous.
    pub candidates: Vec<Uuid>,
    pub changes: Vec<&'static str>,
    pub dates: RecordDates,
    pub error: Option<String>,
}

impl RecordOutcome {
    fn new(record_id: Uuid, source_id: &str, name: &str, action: ResolveAction) -> Self {
        Self {
            record_id,
            source_id: source_id.to_string(),
            name: name.to_string(),
            action,
            show_id: None,
            candidates: Vec::new(),
            changes: Vec::new(),
            dates: RecordDates::default(),
            error: None,
        }
    }

    fn rejected(record_id: Uuid, source_id: &str, name: &str, error: impl ToString) -> Self {
        Self {
            error: Some(error.to_string()),
            ..Self::new(record_id, source_id, name, ResolveAction::Rejected)
        }
    }
}

pub fn parse_record_dates(parser: &StandardStringDateParser, record: &ScrapedRecord) -> RecordDates {
    RecordDates {
        start: parser.parse(DateSide::Start, &record.dates),
        end: parser.parse(DateSide::End, &record.dates),
    }
}

/// Resolves one normalized record against `store`: create, merge or escalate.
pub fn resolve_record<S: ShowStore + ?Sized>(
    store: &mut S,
    source_id: &str,
    parser: &StandardStringDateParser,
    normalized: NormalizedRecord,
    now: DateTime<Utc>,
) -> Result<RecordOutcome, StoreError> {
    let record_id = normalized.record_id;
    let record = match normalized.record {
        Ok(record) => record,
        Err(err) => {
            warn!(%record_id, source_id, error = %err, "rejected invalid record");
            return Ok(RecordOutcome::rejected(record_id, source_id, "", err));
        }
    };
    let _span = info_span!("resolve_record", %record_id, source_id, name = %record.name).entered();

    let resolution = match find_candidates(&*store, &record, None) {
        Ok(cursor) => Resolution::from_cursor(cursor),
        Err(CandidateError::Validation(err)) => {
            warn!(error = %err, "rejected invalid record");
            return Ok(RecordOutcome::rejected(record_id, source_id, &record.name, err));
        }
        Err(CandidateError::Store(err)) => return Err(err),
    };
    let dates = parse_record_dates(parser, &record);

    let mut outcome = RecordOutcome {
        dates,
        ..RecordOutcome::new(record_id, source_id, &record.name, ResolveAction::Created)
    };
    match resolution {
        Resolution::NoMatch => {
            let show = new_show(&record, dates, now);
            outcome.show_id = Some(show.id);
            store.insert(show)?;
            info!(show_id = ?outcome.show_id, "created canonical show");
        }
        Resolution::Unique(show) => {
            let (merged, changes) = merge_record(&show, &record, dates, now);
            outcome.show_id = Some(show.id);
            outcome.changes = changes.0;
            if outcome.changes.is_empty() {
                outcome.action = ResolveAction::Unchanged;
            } else {
                outcome.action = ResolveAction::Merged;
                store.update(merged)?;
                info!(show_id = %show.id, changes = ?outcome.changes, "merged record into show");
            }
        }
        Resolution::Ambiguous(shows) => {
            outcome.action = ResolveAction::Ambiguous;
            outcome.candidates = shows.iter().map(|show| show.id).collect();
            warn!(candidates = shows.len(), "ambiguous record left for review");
        }
    }
    Ok(outcome)
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolveRunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub enabled_sources: usize,
    pub records_seen: usize,
    pub action_counts: BTreeMap<String, usize>,
    pub shows_total: usize,
    pub published_to_database: bool,
    pub reports_dir: String,
    pub parquet_manifest: String,
}

impl ResolveRunSummary {
    pub fn count(&self, action: ResolveAction) -> usize {
        self.action_counts.get(action.as_str()).copied().unwrap_or(0)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifest {
    pub schema_version: u32,
    pub files: Vec<ParquetManifestFile>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParquetManifestFile {
    pub name: String,
    pub path: String,
    pub sha256: String,
    pub bytes: u64,
}

pub struct ResolvePipeline {
    config: ResolveConfig,
}

impl ResolvePipeline {
    pub fn new(config: ResolveConfig) -> Self {
        Self { config }
    }

    pub async fn run_once(&self) -> Result<ResolveRunSummary> {
        let started_at = Utc::now();
        let run_id = Uuid::new_v4();
        let registry = SourceRegistry::load(self.config.registry_path()).await?;
        let enabled_sources: Vec<SourceConfig> = registry.enabled().cloned().collect();
        let mut store = MemoryShowStore::load_snapshot(&self.config.state_path)
            .await
            .context("loading show state")?;
        let parser_config = self.config.parser_config();

        let mut outcomes = Vec::new();
        for source in &enabled_sources {
            let bundle_path = self.config.bundle_path_for(source);
            let bundle = load_record_bundle(&bundle_path)?;
            let parser = StandardStringDateParser::for_source(&parser_config, source.timezone.as_deref())
                .with_context(|| format!("configuring date parser for {}", source.source_id))?;
            let adapter = adapter_for_source(
                &source.source_id,
                source.description_cutoff.clone(),
                &self.config.description_cutoff,
            );
            let records = adapter
                .parse_records(&bundle)
                .with_context(|| format!("normalizing {}", bundle_path.display()))?;
            info!(
                source_id = %source.source_id,
                bundle_id = %bundle.bundle_id,
                records = records.len(),
                "loaded record bundle"
            );

            for normalized in records {
                let record_id = normalized.record_id;
                let name = normalized
                    .record
                    .as_ref()
                    .map(|record| record.name.clone())
                    .unwrap_or_default();
                let outcome = match resolve_record(
                    &mut store,
                    &source.source_id,
                    &parser,
                    normalized,
                    Utc::now(),
                ) {
                    Ok(outcome) => outcome,
                    Err(err @ StoreError::DuplicateExternalId { .. }) => {
                        warn!(%record_id, error = %err, "rejected record conflicting with stored show");
                        RecordOutcome::rejected(record_id, &source.source_id, &name, err)
                    }
                    Err(err) => {
                        return Err(anyhow::Error::new(err).context(format!("resolving record {record_id}")))
                    }
                };
                outcomes.push(outcome);
            }
        }

        store
            .save_snapshot(&self.config.state_path)
            .await
            .context("saving show state")?;

        let published_to_database = match &self.config.database_url {
            Some(url) => {
                publish_shows(url, &store, &outcomes).await?;
                true
            }
            None => false,
        };

        let finished_at = Utc::now();
        let reports_dir = self
            .write_reports(run_id, started_at, finished_at, &enabled_sources, &outcomes)
            .await?;
        let manifest_path = export_parquet_snapshots(&reports_dir, store.shows()).await?;

        let mut action_counts = BTreeMap::new();
        for outcome in &outcomes {
            *action_counts.entry(outcome.action.as_str().to_string()).or_default() += 1;
        }

        Ok(ResolveRunSummary {
            run_id,
            started_at,
            finished_at,
            enabled_sources: enabled_sources.len(),
            records_seen: outcomes.len(),
            action_counts,
            shows_total: store.len(),
            published_to_database,
            reports_dir: reports_dir.display().to_string(),
            parquet_manifest: manifest_path.display().to_string(),
        })
    }

    async fn write_reports(
        &self,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        finished_at: DateTime<Utc>,
        enabled_sources: &[SourceConfig],
        outcomes: &[RecordOutcome],
    ) -> Result<PathBuf> {
        let reports_dir = self.config.workspace_root.join("reports").join(run_id.to_string());
        fs::create_dir_all(&reports_dir)
            .await
            .with_context(|| format!("creating {}", reports_dir.display()))?;

        let mut source_counts: BTreeMap<&str, BTreeMap<&str, usize>> = BTreeMap::new();
        for outcome in outcomes {
            *source_counts
                .entry(outcome.source_id.as_str())
                .or_default()
                .entry(outcome.action.as_str())
                .or_default() += 1;
        }

        let mut brief = vec![
            "# Show Resolution Brief".to_string(),
            String::new(),
            format!("- Run ID: `{run_id}`"),
            format!("- Started: {started_at}"),
            format!("- Finished: {finished_at}"),
            format!("- Enabled sources: {}", enabled_sources.len()),
            format!("- Records: {}", outcomes.len()),
            String::new(),
            "## Source Counts".to_string(),
        ];
        for (source_id, counts) in &source_counts {
            let counts = counts
                .iter()
                .map(|(action, n)| format!("{action} {n}"))
                .collect::<Vec<_>>()
                .join(", ");
            brief.push(format!("- {source_id}: {counts}"));
        }
        let needs_review: Vec<&RecordOutcome> = outcomes
            .iter()
            .filter(|o| matches!(o.action, ResolveAction::Ambiguous | ResolveAction::Rejected))
            .collect();
        if !needs_review.is_empty() {
            brief.push(String::new());
            brief.push("## Needs Review".to_string());
            for outcome in needs_review {
                let detail = match outcome.action {
                    ResolveAction::Ambiguous => format!("{} candidates", outcome.candidates.len()),
                    _ => outcome.error.clone().unwrap_or_default(),
                };
                brief.push(format!(
                    "- [{}] `{}` {:?}: {}",
                    outcome.source_id, outcome.record_id, outcome.name, detail
                ));
            }
        }
        brief.push(String::new());
        fs::write(reports_dir.join("daily_brief.md"), brief.join("\n"))
            .await
            .context("writing daily_brief.md")?;

        let delta_json = serde_json::to_vec_pretty(&serde_json::json!({
            "run": {
                "run_id": run_id,
                "started_at": started_at,
                "finished_at": finished_at,
                "sources": enabled_sources,
                "database_url_configured": self.config.database_url.is_some(),
            },
            "outcomes": outcomes,
        }))
        .context("serializing resolution delta")?;
        fs::write(reports_dir.join("resolution_delta.json"), delta_json)
            .await
            .context("writing resolution_delta.json")?;

        Ok(reports_dir)
    }
}

/// Upserts every show touched in this run into Postgres.
async fn publish_shows(database_url: &str, store: &MemoryShowStore, outcomes: &[RecordOutcome]) -> Result<()> {
    let touched: BTreeSet<Uuid> = outcomes
        .iter()
        .filter(|o| matches!(o.action, ResolveAction::Created | ResolveAction::Merged))
        .filter_map(|o| o.show_id)
        .collect();
    let pg = PgShowStore::connect(database_url)
        .await
        .context("connecting to DATABASE_URL")?;
    pg.migrate().await.context("applying show schema")?;
    for show in store.shows().iter().filter(|show| touched.contains(&show.id)) {
        pg.upsert(show)
            .await
            .with_context(|| format!("publishing show {}", show.id))?;
    }
    info!(shows = touched.len(), "published shows to postgres");
    Ok(())
}

pub async fn run_resolve_once_from_env() -> Result<ResolveRunSummary> {
    let config = ResolveConfig::from_env()?;
    ResolvePipeline::new(config).run_once().await
}

pub fn report_daily_markdown(runs: usize, workspace_root: Option<PathBuf>) -> Result<String> {
    let root = workspace_root.unwrap_or_else(|| PathBuf::from("."));
    let reports_root = root.join("reports");
    let mut dirs = std::fs::read_dir(&reports_root)
        .with_context(|| format!("reading {}", reports_root.display()))?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|ft| ft.is_dir()).unwrap_or(false))
        .collect::<Vec<_>>();
    dirs.sort_by_key(|e| e.metadata().and_then(|m| m.modified()).ok());
    dirs.reverse();

    let mut lines = vec!["# Show Resolution Report".to_string(), String::new()];
    for dir in dirs.into_iter().take(runs.max(1)) {
        let run_id = dir.file_name().to_string_lossy().to_string();
        let delta_path = dir.path().join("resolution_delta.json");
        let manifest_path = dir.path().join("snapshots").join("manifest.json");

        let delta: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(&delta_path)
                .with_context(|| format!("reading {}", delta_path.display()))?,
        )
        .with_context(|| format!("parsing {}", delta_path.display()))?;
        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for outcome in delta
            .get("outcomes")
            .and_then(|v| v.as_array())
            .map(Vec::as_slice)
            .unwrap_or_default()
        {
            let action = outcome
                .get("action")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            *counts.entry(action.to_string()).or_default() += 1;
        }

        lines.push(format!("## Run `{run_id}`"));
        for (action, count) in &counts {
            lines.push(format!("- {action}: {count}"));
        }
        lines.push(format!("- delta: `{}`", delta_path.display()));
        if manifest_path.exists() {
            lines.push(format!("- parquet manifest: `{}`", manifest_path.display()));
        }
        lines.push(String::new());
    }

    Ok(lines.join("\n"))
}

async fn export_parquet_snapshots(reports_dir: &Path, shows: &[CanonicalShow]) -> Result<PathBuf> {
    let snapshot_dir = reports_dir.join("snapshots");
    fs::create_dir_all(&snapshot_dir)
        .await
        .with_context(|| format!("creating {}", snapshot_dir.display()))?;

    let shows_path = snapshot_dir.join("shows.parquet");
    let bindings_path = snapshot_dir.join("source_bindings.parquet");
    write_shows_parquet(&shows_path, shows)?;
    write_bindings_parquet(&bindings_path, shows)?;

    let manifest = ParquetManifest {
        schema_version: 1,
        files: vec![
            manifest_entry("shows", reports_dir, &shows_path)?,
            manifest_entry("source_bindings", reports_dir, &bindings_path)?,
        ],
    };
    let manifest_path = snapshot_dir.join("manifest.json");
    let bytes = serde_json::to_vec_pretty(&manifest).context("serializing parquet manifest")?;
    fs::write(&manifest_path, bytes)
        .await
        .with_context(|| format!("writing {}", manifest_path.display()))?;
    Ok(manifest_path)
}

fn write_parquet(path: &Path, batch: RecordBatch) -> Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut writer = ArrowWriter::try_new(file, batch.schema(), None)
        .with_context(|| format!("opening parquet writer {}", path.display()))?;
    writer
        .write(&batch)
        .with_context(|| format!("writing record batch {}", path.display()))?;
    writer
        .close()
        .with_context(|| format!("closing parquet writer {}", path.display()))?;
    Ok(())
}

fn date_columns(
    shows: &[CanonicalShow],
    pick: impl Fn(&CanonicalShow) -> PartialDate,
) -> (Int32Array, UInt32Array, UInt32Array) {
    let dates: Vec<PartialDate> = shows.iter().map(pick).collect();
    (
        Int32Array::from(dates.iter().map(|d| d.year).collect::<Vec<_>>()),
        UInt32Array::from(dates.iter().map(|d| d.month).collect::<Vec<_>>()),
        UInt32Array::from(dates.iter().map(|d| d.day).collect::<Vec<_>>()),
    )
}

fn write_shows_parquet(path: &Path, shows: &[CanonicalShow]) -> Result<()> {
    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("id", DataType::Utf8, false),
        ArrowField::new("name", DataType::Utf8, false),
        ArrowField::new("season", DataType::Utf8, true),
        ArrowField::new("show_type", DataType::Utf8, true),
        ArrowField::new("external_id", DataType::UInt32, true),
        ArrowField::new("airing_start_year", DataType::Int32, true),
        ArrowField::new("airing_start_month", DataType::UInt32, true),
        ArrowField::new("airing_start_day", DataType::UInt32, true),
        ArrowField::new("airing_end_year", DataType::Int32, true),
        ArrowField::new("airing_end_month", DataType::UInt32, true),
        ArrowField::new("airing_end_day", DataType::UInt32, true),
        ArrowField::new("updated_at", DataType::Utf8, false),
    ]));

    let ids = StringArray::from(shows.iter().map(|s| Some(s.id.to_string())).collect::<Vec<_>>());
    let names = StringArray::from(shows.iter().map(|s| Some(s.name.as_str())).collect::<Vec<_>>());
    let seasons = StringArray::from(shows.iter().map(|s| s.season.as_deref()).collect::<Vec<_>>());
    let types = StringArray::from(
        shows
            .iter()
            .map(|s| s.show_type.map(|t| t.as_str()))
            .collect::<Vec<_>>(),
    );
    let external_ids = UInt32Array::from(shows.iter().map(|s| s.external_id).collect::<Vec<_>>());
    let (start_years, start_months, start_days) = date_columns(shows, |s| s.airing_start);
    let (end_years, end_months, end_days) = date_columns(shows, |s| s.airing_end);
    let updated = StringArray::from(
        shows
            .iter()
            .map(|s| Some(s.updated_at.to_rfc3339()))
            .collect::<Vec<_>>(),
    );

    let batch = RecordBatch::try_new(
        schema,
        vec![
            Arc::new(ids),
            Arc::new(names),
            Arc::new(seasons),
            Arc::new(types),
            Arc::new(external_ids),
            Arc::new(start_years),
            Arc::new(start_months),
            Arc::new(start_days),
            Arc::new(end_years),
            Arc::new(end_months),
            Arc::new(end_days),
            Arc::new(updated),
        ],
    )
    .context("building shows record batch")?;
    write_parquet(path, batch)
}

fn write_bindings_parquet(path: &Path, shows: &[CanonicalShow]) -> Result<()> {
    let rows = shows
        .iter()
        .flat_map(|show| show.bindings.iter().map(move |binding| (show.id, binding)))
        .collect::<Vec<_>>();

    let schema = Arc::new(Schema::new(vec![
        ArrowField::new("show_id", DataType::Utf8, false),
        ArrowField::new("source_id", DataType::Utf8, false),
        ArrowField::new("content_tag", DataType::Utf8, false),
        ArrowField::new("url", DataType::Utf8, false),
    ]));
    let show_ids = StringArray::from(rows.iter().map(|(id, _)| Some(id.to_string())).collect::<Vec<_>>());
    let source_ids = StringArray::from(
        rows.iter()
            .map(|(_, b)| Some(b.source_id.as_str()))
            .collect::<Vec<_>>(),
    );
    let tags = StringArray::from(
        rows.iter()
            .map(|(_, b)| Some(b.content_tag.as_str()))
            .collect::<Vec<_>>(),
    );
    let urls = StringArray::from(rows.iter().map(|(_, b)| Some(b.url.as_str())).collect::<Vec<_>>());

    let batch = RecordBatch::try_new(
        schema,
        vec![Arc::new(show_ids), Arc::new(source_ids), Arc::new(tags), Arc::new(urls)],
    )
    .context("building source_bindings record batch")?;
    write_parquet(path, batch)
}

fn manifest_entry(name: &str, reports_dir: &Path, path: &Path) -> Result<ParquetManifestFile> {
    let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    let mut hasher = Sha256::new();
    hasher.update(&bytes);
    let sha256 = hex::encode(hasher.finalize());
    let rel = path
        .strip_prefix(reports_dir)
        .unwrap_or(path)
        .display()
        .to_string();
    Ok(ParquetManifestFile {
        name: name.to_string(),
        path: rel,
        sha256,
        bytes: bytes.len() as u64,
    })
}
