//! Reports component: long-running jobs whose progress is pushed over the
//! update stream.
//!
//! `Reports.Start` creates a report and finishes it in the background after
//! [`ReportOptions::run_time`]. The overview page subscribes to
//! `Reports.Overview`, which re-renders the list on every store change; a
//! report page subscribes to `Reports.Detail` for that one report.

use std::sync::Arc;
use std::time::Duration;

use maud::{Markup, html};
use serde::Deserialize;
use serde_json::json;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use super::layout::{SIMPLE_CSS, document, nav_links, script_var};
use super::report_store::{ChangeKind, Report, ReportStatus, ReportStore};
use crate::domain::{PageParams, RegistryBuilder, Update};
use crate::service::{
    ActionError, Page, PageError, StreamError, page_fn, stream_fn, typed_action, typed_stream,
};
use crate::ws::{Delivery, UpdateSink};

/// Name of the stream that renders the report list.
pub const OVERVIEW_STREAM: &str = "Reports.Overview";

/// Name of the stream that renders a single report.
pub const DETAIL_STREAM: &str = "Reports.Detail";

/// Timing of the reports demo.
#[derive(Debug, Clone, Copy)]
pub struct ReportOptions {
    /// How long a started report runs before it finishes.
    pub run_time: Duration,
    /// Artificial latency of `Reports.Refresh`.
    pub refresh_delay: Duration,
}

impl Default for ReportOptions {
    fn default() -> Self {
        Self {
            run_time: Duration::from_secs(5),
            refresh_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct ReportArgs {
    #[serde(default)]
    id: String,
}

#[derive(Debug, Default, Deserialize)]
struct NoArgs {}

/// The reports component.
#[derive(Debug)]
pub struct Reports {
    store: Arc<ReportStore>,
    options: ReportOptions,
}

impl Reports {
    /// Creates the component over `store`.
    #[must_use]
    pub fn new(store: Arc<ReportStore>, options: ReportOptions) -> Self {
        Self { store, options }
    }

    /// Returns the backing store.
    #[must_use]
    pub fn store(&self) -> &Arc<ReportStore> {
        &self.store
    }

    /// Registers the `Reports.*` actions and streams plus `/reports` and
    /// `/report/{id}`.
    pub fn register(self: &Arc<Self>, builder: &mut RegistryBuilder) {
        builder.component("Reports", |c| {
            let reports = Arc::clone(self);
            c.action(
                "Start",
                typed_action(move |_ctx, args: ReportArgs| {
                    let reports = Arc::clone(&reports);
                    async move { reports.start(args.id).await }
                }),
            );

            let reports = Arc::clone(self);
            c.action(
                "Cancel",
                typed_action(move |_ctx, args: ReportArgs| {
                    let reports = Arc::clone(&reports);
                    async move {
                        reports
                            .store
                            .transition(&args.id, ReportStatus::Started, ReportStatus::Cancelled)
                            .await?;
                        Ok(Some(reports.all_reports_update().await))
                    }
                }),
            );

            let reports = Arc::clone(self);
            c.action(
                "Refresh",
                typed_action(move |_ctx, _: NoArgs| {
                    let reports = Arc::clone(&reports);
                    async move {
                        tokio::time::sleep(reports.options.refresh_delay).await;
                        Ok(Some(reports.all_reports_update().await))
                    }
                }),
            );

            c.action(
                "SomeError",
                typed_action(|_ctx, _: NoArgs| async move {
                    Err(ActionError::new("something bad happened (not really)"))
                }),
            );

            let reports = Arc::clone(self);
            c.page(
                "/reports",
                page_fn(move |_ctx| {
                    let reports = Arc::clone(&reports);
                    async move {
                        let page: Box<dyn Page> = Box::new(reports.index_page().await);
                        Ok(page)
                    }
                }),
            );

            let reports = Arc::clone(self);
            c.page(
                "/report/{id}",
                page_fn(move |ctx| {
                    let reports = Arc::clone(&reports);
                    async move {
                        let page: Box<dyn Page> = Box::new(reports.report_page(&ctx.params).await);
                        Ok(page)
                    }
                }),
            );

            let store = Arc::clone(&self.store);
            c.stream(
                "Overview",
                stream_fn(move |cancel, _args, sink| {
                    overview_stream(Arc::clone(&store), cancel, sink)
                }),
            );

            let store = Arc::clone(&self.store);
            c.stream(
                "Detail",
                typed_stream(move |cancel, args: ReportArgs, sink| {
                    detail_stream(Arc::clone(&store), args.id, cancel, sink)
                }),
            );
        });
    }

    async fn start(&self, id: String) -> Result<Option<Update>, ActionError> {
        self.store.create(Report::start(id.clone())).await?;

        let store = Arc::clone(&self.store);
        let run_time = self.options.run_time;
        let finish_id = id.clone();
        tokio::spawn(
            async move {
                tokio::time::sleep(run_time).await;
                match store
                    .transition(&finish_id, ReportStatus::Started, ReportStatus::Finished)
                    .await
                {
                    Ok(true) => tracing::info!(id = %finish_id, "report finished"),
                    Ok(false) => {}
                    Err(err) => tracing::warn!(id = %finish_id, error = %err, "report vanished"),
                }
            }
            .in_current_span(),
        );

        let params = PageParams::from([("id", id.as_str())]);
        let update = self.report_page(&params).await.update()?;
        Ok(Some(update.with_url(format!("/report/{id}"))))
    }

    async fn all_reports_update(&self) -> Update {
        let reports = self.store.all().await;
        Update::replace_element("#all-reports", all_reports_block(&reports).into_string())
    }

    async fn index_page(&self) -> ReportsPage {
        let reports = self.store.all().await;
        ReportsPage {
            content: index_block(&reports),
            stream: OVERVIEW_STREAM,
            args: None,
        }
    }

    async fn report_page(&self, params: &PageParams) -> ReportsPage {
        let id = params.get("id").unwrap_or_default();
        let report = self.store.get(id).await;
        ReportsPage {
            content: html! {
                main id="reports" {
                    a href="/reports" class="ga" ga-link="" { "< All Reports" }
                    (single_report_block(id, report.as_ref()))
                }
            },
            stream: DETAIL_STREAM,
            args: Some(json!({ "id": id })),
        }
    }
}

struct ReportsPage {
    content: Markup,
    stream: &'static str,
    args: Option<serde_json::Value>,
}

impl Page for ReportsPage {
    fn render_document(&self) -> Result<String, PageError> {
        let subscription = json!({ "name": self.stream, "args": self.args });
        let preamble = script_var("stream", &subscription)?;
        Ok(document(
            "guiapi • Reports",
            SIMPLE_CSS,
            html! { (self.content) },
            html! { footer { (nav_links()) } },
            Some(preamble),
        )
        .into_string())
    }

    fn update(&self) -> Result<Update, PageError> {
        Ok(
            Update::replace_element("#reports", self.content.clone().into_string())
                .with_stream(self.stream, self.args.clone()),
        )
    }
}

/// Pushes the report list after every store change.
async fn overview_stream(
    store: Arc<ReportStore>,
    cancel: CancellationToken,
    sink: UpdateSink,
) -> Result<(), StreamError> {
    let mut changes = store.subscribe();
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            change = changes.recv() => match change {
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "overview lagged, re-rendering");
                }
                Err(RecvError::Closed) => return Ok(()),
            },
        }
        let reports = store.all().await;
        let update = Update::replace_element("#all-reports", all_reports_block(&reports).into_string());
        if sink.send_or_cancel(&cancel, update).await? == Delivery::Cancelled {
            return Ok(());
        }
    }
}

/// Pushes one report whenever it changes.
async fn detail_stream(
    store: Arc<ReportStore>,
    id: String,
    cancel: CancellationToken,
    sink: UpdateSink,
) -> Result<(), StreamError> {
    if id.is_empty() {
        return Ok(());
    }
    let mut changes = store.subscribe();
    loop {
        let report = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(()),
            change = changes.recv() => match change {
                Ok(change) if change.report.id != id => continue,
                Ok(change) if change.kind == ChangeKind::Delete => None,
                Ok(change) => Some(change.report),
                Err(RecvError::Lagged(_)) => store.get(&id).await,
                Err(RecvError::Closed) => return Ok(()),
            },
        };
        let update = Update::replace_element(
            "#single-report",
            single_report_block(&id, report.as_ref()).into_string(),
        );
        if sink.send_or_cancel(&cancel, update).await? == Delivery::Cancelled {
            return Ok(());
        }
    }
}

fn index_block(reports: &[Report]) -> Markup {
    html! {
        main id="reports" {
            h1 { "Reports" }
            p { "Reports run in the background. The list updates itself while they do." }
            h3 { "All Reports" }
            (all_reports_block(reports))
            p { "Refreshing is slow on purpose; the spinner shows while it runs." }
            div {
                button class="ga" ga-on="click" ga-action="Reports.Refresh" ga-func="onRefresh" {
                    "Refresh"
                }
                " "
                button class="ga" ga-on="click" ga-action="Reports.SomeError" { "Fake Error" }
            }
            h3 { "New Report" }
            div {
                input class="new-report" name="id" type="text" placeholder="Give the new report a name";
            }
            div {
                button class="ga" ga-on="click" ga-action="Reports.Start" ga-values=".new-report" {
                    "Start"
                }
            }
        }
    }
}

fn all_reports_block(reports: &[Report]) -> Markup {
    if reports.is_empty() {
        return html! { p id="all-reports" { "No reports yet." } };
    }
    html! {
        ul id="all-reports" {
            @for report in reports {
                li {
                    a href=(format!("/report/{}", report.id)) class="ga" ga-link="" { (report.id) }
                    ": " (report.status) " (" (report.started.format("%Y-%m-%d %H:%M:%S")) ")"
                    @if report.status == ReportStatus::Started {
                        " "
                        button class="ga" ga-on="click" ga-action="Reports.Cancel"
                            ga-args=(json!({ "id": report.id }).to_string()) { "Cancel" }
                    }
                }
            }
        }
    }
}

fn single_report_block(id: &str, report: Option<&Report>) -> Markup {
    html! {
        div id="single-report" {
            h1 { "Report " (id) }
            @match report {
                None => p { "Report with ID " (format!("{id:?}")) " doesn't exist" },
                Some(report) => {
                    div { "ID: " (format!("{id:?}")) }
                    div { "Status: " (report.status) }
                    div { "Started: " (report.started.format("%Y-%m-%d %H:%M:%S")) }
                }
            }
        }
    }
}
