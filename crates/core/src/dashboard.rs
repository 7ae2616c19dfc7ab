//! Ties the pieces together for one interactive session.
//!
//! Every user interaction runs the same sequence: acquire a connection, run
//! the queries the page needs, release, derive metrics, render. Page state is rebuilt from
//! scratch whenever a destination is activated, so nothing is cached across
//! navigations. A connection failure halts the session; query failures stay
//! scoped to the page that produced them.

use crate::config::DashboardConfig;
use crate::connection_manager::{ConnectionError, ConnectionProvider};
use crate::data_source::{AllowList, DataSourceDescriptor, RowCap, SourceKind};
use crate::metrics::MetricRecipe;
use crate::query_runner::{FetchError, QueryBackend, QueryExecutor};
use crate::shell::{Destination, Shell, ShellError};
use crate::tabular::TabularResult;
use crate::view_renderer::{RenderedView, TableView, ViewRenderer};

const PLAYGROUND_NO_DATA: &str = "No results returned for this query.";
const INSIGHT_NO_DATA: &str = "No data returned for this insight.";

/// A stored result plus the categorical filter value chosen over it.
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub outcome: Result<TabularResult, FetchError>,
    pub filter_value: Option<String>,
}

impl Fetched {
    fn new(outcome: Result<TabularResult, FetchError>) -> Self {
        Self {
            outcome,
            filter_value: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BrowsePage {
    pub kind: SourceKind,
    pub selected: usize,
    pub fetched: Option<Fetched>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PlaygroundPage {
    pub editor: String,
    pub notice: Option<String>,
    pub fetched: Option<Fetched>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InsightSection {
    pub title: String,
    pub fetched: Fetched,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OverviewPage {
    pub view_name: String,
    pub fetched: Option<Fetched>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Page {
    Browse(BrowsePage),
    Playground(PlaygroundPage),
    Insights(Vec<InsightSection>),
    Overview(OverviewPage),
}

impl Page {
    fn fresh(destination: Destination, config: &DashboardConfig) -> Self {
        match destination {
            Destination::ExploreTables => Self::Browse(BrowsePage {
                kind: SourceKind::Table,
                selected: 0,
                fetched: None,
            }),
            Destination::ExploreViews => Self::Browse(BrowsePage {
                kind: SourceKind::View,
                selected: 0,
                fetched: None,
            }),
            Destination::SqlPlayground => Self::Playground(PlaygroundPage::default()),
            Destination::Insights => Self::Insights(Vec::new()),
            Destination::Overview => Self::Overview(OverviewPage {
                view_name: config.overview_view.clone().unwrap_or_default(),
                fetched: None,
            }),
        }
    }

    /// The page's main result; insights carry one result per section instead.
    #[must_use]
    pub fn primary(&self) -> Option<&Fetched> {
        match self {
            Self::Browse(page) => page.fetched.as_ref(),
            Self::Playground(page) => page.fetched.as_ref(),
            Self::Overview(page) => page.fetched.as_ref(),
            Self::Insights(_) => None,
        }
    }

    fn primary_mut(&mut self) -> Option<&mut Fetched> {
        match self {
            Self::Browse(page) => page.fetched.as_mut(),
            Self::Playground(page) => page.fetched.as_mut(),
            Self::Overview(page) => page.fetched.as_mut(),
            Self::Insights(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Ready,
    Halted { banner: String },
}

#[derive(Debug)]
pub struct Dashboard<B: QueryBackend> {
    config: DashboardConfig,
    allow_list: AllowList,
    executor: QueryExecutor<B>,
    renderer: ViewRenderer,
    shell: Shell,
    page: Page,
    session: SessionState,
}

impl<B: QueryBackend> Dashboard<B> {
    pub fn new(config: DashboardConfig, backend: B) -> Result<Self, ShellError> {
        let shell = Shell::new(config.pages.clone())?;
        let provider = ConnectionProvider::new(backend, config.connection.clone());
        let executor = QueryExecutor::new(provider, config.playground);
        let allow_list = AllowList::new(config.tables.clone(), config.views.clone());
        let renderer = ViewRenderer::new(config.filter_columns.clone());
        let page = Page::fresh(shell.active(), &config);

        Ok(Self {
            config,
            allow_list,
            executor,
            renderer,
            shell,
            page,
            session: SessionState::Ready,
        })
    }

    #[must_use]
    pub fn config(&self) -> &DashboardConfig {
        &self.config
    }

    #[must_use]
    pub fn executor(&self) -> &QueryExecutor<B> {
        &self.executor
    }

    #[must_use]
    pub fn shell(&self) -> &Shell {
        &self.shell
    }

    #[must_use]
    pub fn page(&self) -> &Page {
        &self.page
    }

    #[must_use]
    pub fn session(&self) -> &SessionState {
        &self.session
    }

    #[must_use]
    pub fn halted_banner(&self) -> Option<&str> {
        match &self.session {
            SessionState::Halted { banner } => Some(banner),
            SessionState::Ready => None,
        }
    }

    #[must_use]
    pub fn source_names(&self, kind: SourceKind) -> &[String] {
        self.allow_list.names(kind)
    }

    /// Verifies the connection and loads the initial destination on it.
    pub async fn start(&mut self) {
        self.activate(true).await;
    }

    pub async fn navigate(&mut self, destination: Destination) -> Result<(), ShellError> {
        if self.halted_banner().is_some() {
            return Ok(());
        }
        self.shell.select(destination)?;
        self.activate_current().await;
        Ok(())
    }

    pub async fn navigate_index(&mut self, index: usize) -> Result<(), ShellError> {
        if self.halted_banner().is_some() {
            return Ok(());
        }
        self.shell.select_index(index)?;
        self.activate_current().await;
        Ok(())
    }

    pub async fn next_page(&mut self) {
        if self.halted_banner().is_some() {
            return;
        }
        self.shell.next();
        self.activate_current().await;
    }

    pub async fn previous_page(&mut self) {
        if self.halted_banner().is_some() {
            return;
        }
        self.shell.previous();
        self.activate_current().await;
    }

    /// Moves the browse selection by `delta`, clamped, and fetches the new
    /// source when it changed.
    pub async fn move_selection(&mut self, delta: isize) {
        let Page::Browse(page) = &self.page else {
            return;
        };
        let count = self.allow_list.names(page.kind).len();
        if count == 0 {
            return;
        }
        let target = page
            .selected
            .saturating_add_signed(delta)
            .min(count - 1);
        if target != page.selected {
            self.select_source(target).await;
        }
    }

    pub async fn select_source(&mut self, index: usize) {
        if self.halted_banner().is_some() {
            return;
        }
        let Page::Browse(page) = &mut self.page else {
            return;
        };
        if index >= self.allow_list.names(page.kind).len() {
            return;
        }
        page.selected = index;
        self.load_page(false).await;
    }

    /// Editor buffer of the playground, when it is the active page.
    pub fn query_text_mut(&mut self) -> Option<&mut String> {
        match &mut self.page {
            Page::Playground(page) => Some(&mut page.editor),
            _ => None,
        }
    }

    pub async fn run_playground(&mut self) {
        if self.halted_banner().is_some() {
            return;
        }
        let Page::Playground(page) = &mut self.page else {
            return;
        };
        let source = match DataSourceDescriptor::raw_query(page.editor.clone()) {
            Ok(source) => source,
            Err(warning) => {
                page.notice = Some(warning.to_string());
                page.fetched = None;
                return;
            }
        };

        let outcome = self.executor.fetch_playground(&source).await;
        self.observe(&outcome);
        if let Page::Playground(page) = &mut self.page {
            page.notice = None;
            page.fetched = Some(Fetched::new(outcome));
        }
    }

    /// Steps through the categorical filter options of the page's result.
    /// Purely client-side: no query is issued.
    pub fn cycle_filter(&mut self, forward: bool) {
        let renderer = &self.renderer;
        let Some(fetched) = self.page.primary_mut() else {
            return;
        };
        let Ok(result) = &fetched.outcome else {
            return;
        };
        let Some(filter) = renderer.filter_for(result) else {
            return;
        };

        let len = filter.options.len();
        let current = fetched
            .filter_value
            .as_deref()
            .and_then(|value| filter.options.iter().position(|option| option == value))
            .unwrap_or(0);
        let next = if forward {
            (current + 1) % len
        } else {
            (current + len - 1) % len
        };
        fetched.filter_value = (next != 0).then(|| filter.options[next].clone());
    }

    #[must_use]
    pub fn caption(&self) -> Option<String> {
        match &self.page {
            Page::Browse(page) => {
                let name = self.allow_list.names(page.kind).get(page.selected)?;
                Some(format!(
                    "Showing top {} rows of {name}",
                    self.config.browse_row_cap
                ))
            }
            Page::Playground(page) => match page.fetched.as_ref().map(|f| &f.outcome) {
                Some(Ok(result)) if !result.is_empty() => {
                    Some("Query executed successfully".to_string())
                }
                _ => None,
            },
            Page::Overview(page) => Some(format!("Metrics over {}", page.view_name)),
            Page::Insights(_) => None,
        }
    }

    /// Rendered form of the page's main result, if one has been fetched.
    #[must_use]
    pub fn primary_view(&self) -> Option<RenderedView> {
        let fetched = self.page.primary()?;
        let (metrics, notice): (Option<&[MetricRecipe]>, String) = match &self.page {
            Page::Browse(page) => {
                let name = self
                    .allow_list
                    .names(page.kind)
                    .get(page.selected)
                    .map_or("", String::as_str);
                let metrics = match page.kind {
                    SourceKind::View => Some(self.config.metrics.as_slice()),
                    SourceKind::Table => None,
                };
                (metrics, format!("No data found in {}: {name}", page.kind))
            }
            Page::Playground(_) => (None, PLAYGROUND_NO_DATA.to_string()),
            Page::Overview(page) => (
                Some(self.config.metrics.as_slice()),
                format!("No data found in view: {}", page.view_name),
            ),
            Page::Insights(_) => return None,
        };

        Some(self.renderer.render(
            fetched.outcome.as_ref(),
            metrics,
            fetched.filter_value.as_deref(),
            &notice,
        ))
    }

    #[must_use]
    pub fn insight_views(&self) -> Vec<(String, RenderedView)> {
        let Page::Insights(sections) = &self.page else {
            return Vec::new();
        };
        sections
            .iter()
            .map(|section| {
                let view =
                    self.renderer
                        .render(section.fetched.outcome.as_ref(), None, None, INSIGHT_NO_DATA);
                (section.title.clone(), view)
            })
            .collect()
    }

    /// Typed form of the rows on screen, used for export.
    #[must_use]
    pub fn visible_result(&self) -> Option<TabularResult> {
        let fetched = self.page.primary()?;
        let result = fetched.outcome.as_ref().ok()?;
        Some(
            self.renderer
                .visible_rows(result, fetched.filter_value.as_deref()),
        )
    }

    /// Name of what the page shows: the browsed object, the overview view,
    /// or `query` for the playground.
    #[must_use]
    pub fn source_label(&self) -> Option<&str> {
        match &self.page {
            Page::Browse(page) => self
                .allow_list
                .names(page.kind)
                .get(page.selected)
                .map(String::as_str),
            Page::Playground(_) => Some("query"),
            Page::Overview(page) => Some(&page.view_name),
            Page::Insights(_) => None,
        }
    }

    /// Rows currently on screen, after filtering.
    #[must_use]
    pub fn visible_table(&self) -> Option<TableView> {
        match self.primary_view()? {
            RenderedView::Table(table) => Some(table),
            RenderedView::NoData { .. } | RenderedView::Failed { .. } => None,
        }
    }

    async fn activate_current(&mut self) {
        self.activate(false).await;
    }

    async fn activate(&mut self, verify: bool) {
        let destination = self.shell.active();
        tracing::info!(page = destination.label(), "page activated");
        self.page = Page::fresh(destination, &self.config);
        self.load_page(verify).await;
    }

    /// Runs what the active page needs on one scoped connection. With
    /// `verify`, the connection is pinged even when the page has no query.
    async fn load_page(&mut self, verify: bool) {
        let planned = self.planned_fetches();
        if planned.is_empty() && !verify {
            return;
        }

        match self.executor.fetch_batch(planned, verify).await {
            Ok(outcomes) => {
                if verify {
                    tracing::info!(
                        target_name = %self.config.connection.name,
                        "connection verified"
                    );
                }
                self.store(outcomes);
            }
            Err(error) => self.halt(&error),
        }
    }

    /// One entry per result slot of the active page, in display order.
    fn planned_fetches(&self) -> Vec<Result<String, FetchError>> {
        let dialect = self.executor.dialect();
        match &self.page {
            Page::Browse(page) => {
                let Some(name) = self.allow_list.names(page.kind).get(page.selected) else {
                    return Vec::new();
                };
                let cap = RowCap::Limit(self.config.browse_row_cap);
                vec![self
                    .allow_list
                    .resolve(page.kind, name)
                    .map(|source| source.to_sql(dialect, cap))
                    .map_err(FetchError::from)]
            }
            Page::Overview(page) => vec![self
                .allow_list
                .view(&page.view_name)
                .map(|source| source.to_sql(dialect, RowCap::Unlimited))
                .map_err(FetchError::from)],
            Page::Insights(_) => self
                .config
                .insights
                .iter()
                .map(|insight| Ok(insight.render_sql(dialect)))
                .collect(),
            Page::Playground(_) => Vec::new(),
        }
    }

    fn store(&mut self, outcomes: Vec<Result<TabularResult, FetchError>>) {
        let mut outcomes = outcomes.into_iter();
        match &mut self.page {
            Page::Browse(BrowsePage { fetched, .. })
            | Page::Overview(OverviewPage { fetched, .. }) => {
                *fetched = outcomes.next().map(Fetched::new);
            }
            Page::Insights(sections) => {
                *sections = self
                    .config
                    .insights
                    .iter()
                    .zip(outcomes)
                    .map(|(insight, outcome)| InsightSection {
                        title: insight.title.clone(),
                        fetched: Fetched::new(outcome),
                    })
                    .collect();
            }
            Page::Playground(_) => {}
        }
    }

    fn observe(&mut self, outcome: &Result<TabularResult, FetchError>) {
        if let Err(FetchError::Connection(error)) = outcome {
            self.halt(error);
        }
    }

    fn halt(&mut self, error: &ConnectionError) {
        tracing::error!(target_name = %error.target, cause = %error.cause, "session halted");
        self.session = SessionState::Halted {
            banner: error.to_string(),
        };
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::{Dashboard, Page, SessionState};
    use crate::config::{DashboardConfig, Preset};
    use crate::metrics::ScalarValue;
    use crate::query_runner::tests::FakeBackend;
    use crate::shell::Destination;
    use crate::tabular::{CellValue, TabularResult};
    use crate::view_renderer::RenderedView;

    fn text(value: &str) -> CellValue {
        CellValue::Text(value.to_string())
    }

    fn config() -> DashboardConfig {
        Preset::EmbeddedFile.config()
    }

    fn claims_view() -> TabularResult {
        TabularResult::new(
            vec![
                "Provider_Name".to_string(),
                "Receiver_Name".to_string(),
                "Location".to_string(),
                "Quantity".to_string(),
            ],
            vec![
                vec![text("Acme"), text("Shelter"), text("NY"), CellValue::Integer(2)],
                vec![text("Acme"), text("Shelter"), text("NY"), CellValue::Integer(3)],
                vec![text("Bistro"), text("Kitchen"), text("LA"), CellValue::Integer(5)],
            ],
        )
        .expect("valid shape")
    }

    async fn started(backend: FakeBackend) -> Dashboard<FakeBackend> {
        let mut dashboard = Dashboard::new(config(), backend).expect("pages configured");
        dashboard.start().await;
        dashboard
    }

    fn tile(view: &RenderedView, label: &str) -> ScalarValue {
        view.metrics()
            .iter()
            .find(|tile| tile.label == label)
            .map(|tile| tile.value)
            .unwrap_or_else(|| panic!("missing tile {label}"))
    }

    #[tokio::test]
    async fn start_browses_first_table_with_row_cap() {
        let backend = FakeBackend::default().with_result(
            "SELECT * FROM CLAIMS LIMIT 50",
            TabularResult::empty(vec!["Claim_ID".to_string()]),
        );
        let dashboard = started(backend).await;

        assert_eq!(dashboard.shell().active(), Destination::ExploreTables);
        assert_eq!(
            dashboard.executor().provider().backend().executed(),
            vec!["SELECT * FROM CLAIMS LIMIT 50"]
        );
        let view = dashboard.primary_view().expect("view expected");
        assert_eq!(view.headline(), "No data found in table: CLAIMS");
        assert_eq!(
            dashboard.caption().as_deref(),
            Some("Showing top 50 rows of CLAIMS")
        );
    }

    #[tokio::test]
    async fn every_activation_refetches_from_scratch() {
        let mut dashboard = started(FakeBackend::default()).await;
        dashboard
            .navigate(Destination::ExploreViews)
            .await
            .expect("views offered");
        dashboard
            .navigate(Destination::ExploreTables)
            .await
            .expect("tables offered");

        assert_eq!(
            dashboard.executor().provider().backend().executed(),
            vec![
                "SELECT * FROM CLAIMS LIMIT 50",
                "SELECT * FROM Available_Food LIMIT 50",
                "SELECT * FROM CLAIMS LIMIT 50",
            ]
        );
    }

    #[tokio::test]
    async fn each_interaction_uses_one_connection() {
        let mut dashboard = started(FakeBackend::default()).await;
        assert_eq!(
            dashboard
                .executor()
                .provider()
                .backend()
                .connects
                .load(Ordering::SeqCst),
            1,
            "start verifies and browses on one connection"
        );

        dashboard
            .navigate(Destination::Insights)
            .await
            .expect("insights offered");
        let backend = dashboard.executor().provider().backend();
        assert_eq!(backend.connects.load(Ordering::SeqCst), 2);
        assert_eq!(backend.releases.load(Ordering::SeqCst), 2);
        assert_eq!(backend.executed().len(), 4);
    }

    #[tokio::test]
    async fn start_on_the_playground_still_verifies_the_connection() {
        let mut config = config();
        config.pages = vec![Destination::SqlPlayground];
        let backend = FakeBackend {
            fail_connect: true,
            ..FakeBackend::default()
        };
        let mut dashboard = Dashboard::new(config, backend).expect("pages");

        dashboard.start().await;

        assert!(dashboard.halted_banner().is_some());
        assert!(dashboard.executor().provider().backend().executed().is_empty());
    }

    #[tokio::test]
    async fn connection_failure_halts_the_session() {
        let backend = FakeBackend {
            fail_connect: true,
            ..FakeBackend::default()
        };
        let mut dashboard = started(backend).await;

        assert_eq!(
            dashboard.session(),
            &SessionState::Halted {
                banner: "Database connection failed: server not found".to_string()
            }
        );
        dashboard.next_page().await;
        assert_eq!(dashboard.shell().active(), Destination::ExploreTables);
        assert!(dashboard.executor().provider().backend().executed().is_empty());
    }

    #[tokio::test]
    async fn query_failure_stays_scoped_to_the_page() {
        let mut dashboard = started(FakeBackend::default()).await;

        let view = dashboard.primary_view().expect("view expected");
        assert!(matches!(view, RenderedView::Failed { .. }));
        assert!(dashboard.halted_banner().is_none());

        dashboard.next_page().await;
        assert_eq!(dashboard.shell().active(), Destination::ExploreViews);
    }

    #[tokio::test]
    async fn selection_moves_within_the_allow_list() {
        let mut dashboard = started(FakeBackend::default()).await;

        dashboard.move_selection(1).await;
        dashboard.move_selection(10).await;
        dashboard.move_selection(10).await;

        let Page::Browse(page) = dashboard.page() else {
            panic!("browse page expected");
        };
        assert_eq!(page.selected, 3);
        assert_eq!(
            dashboard.executor().provider().backend().executed(),
            vec![
                "SELECT * FROM CLAIMS LIMIT 50",
                "SELECT * FROM FOOD_LISTING LIMIT 50",
                "SELECT * FROM RECEIVER LIMIT 50",
            ]
        );
    }

    #[tokio::test]
    async fn blank_playground_query_warns_without_querying() {
        let mut dashboard = started(FakeBackend::default()).await;
        dashboard
            .navigate(Destination::SqlPlayground)
            .await
            .expect("playground offered");
        *dashboard.query_text_mut().expect("editor") = "   ".to_string();

        dashboard.run_playground().await;

        let Page::Playground(page) = dashboard.page() else {
            panic!("playground expected");
        };
        assert_eq!(page.notice.as_deref(), Some("Please enter a SQL query!"));
        assert_eq!(dashboard.executor().provider().backend().executed().len(), 1);
    }

    #[tokio::test]
    async fn read_only_playground_rejects_writes_inline() {
        let mut dashboard = started(FakeBackend::default()).await;
        dashboard
            .navigate(Destination::SqlPlayground)
            .await
            .expect("playground offered");
        *dashboard.query_text_mut().expect("editor") = "DELETE FROM CLAIMS".to_string();

        dashboard.run_playground().await;

        let view = dashboard.primary_view().expect("view expected");
        assert_eq!(
            view.headline(),
            "query failed: statement rejected: write operation `DELETE`"
        );
        assert!(dashboard.halted_banner().is_none());
    }

    #[tokio::test]
    async fn playground_shows_rows_and_success_caption() {
        let sql = "SELECT * FROM Food_Claims WHERE Quantity > 1";
        let backend = FakeBackend::default().with_result(sql, claims_view());
        let mut dashboard = started(backend).await;
        dashboard
            .navigate(Destination::SqlPlayground)
            .await
            .expect("playground offered");
        dashboard
            .query_text_mut()
            .expect("editor")
            .push_str(sql);

        dashboard.run_playground().await;

        let table = dashboard.visible_table().expect("table expected");
        assert_eq!(table.rows.len(), 3);
        assert!(table.metrics.is_empty());
        assert_eq!(
            dashboard.caption().as_deref(),
            Some("Query executed successfully")
        );
    }

    #[tokio::test]
    async fn filter_cycles_client_side_and_updates_metrics() {
        let backend = FakeBackend::default()
            .with_result("SELECT * FROM Food_Claims", claims_view());
        let mut dashboard = started(backend).await;
        dashboard
            .navigate(Destination::Overview)
            .await
            .expect("overview offered");
        let queries_before = dashboard.executor().provider().backend().executed().len();

        let view = dashboard.primary_view().expect("view expected");
        assert_eq!(tile(&view, "Provider-receiver pairs"), ScalarValue::Count(2));
        assert_eq!(tile(&view, "Rows"), ScalarValue::Count(3));

        dashboard.cycle_filter(true);
        dashboard.cycle_filter(true);
        let table = dashboard.visible_table().expect("table expected");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(
            table.filter.as_ref().and_then(|filter| filter.selected_value()),
            Some("NY")
        );
        let view = dashboard.primary_view().expect("view expected");
        assert_eq!(tile(&view, "Total quantity"), ScalarValue::Integer(5));

        dashboard.cycle_filter(true);
        assert_eq!(
            dashboard.visible_table().expect("table").rows.len(),
            3,
            "wraps back to (All)"
        );
        assert_eq!(
            dashboard.executor().provider().backend().executed().len(),
            queries_before
        );
    }

    #[tokio::test]
    async fn visible_result_follows_the_filter() {
        let backend = FakeBackend::default()
            .with_result("SELECT * FROM Food_Claims", claims_view());
        let mut dashboard = started(backend).await;
        dashboard
            .navigate(Destination::Overview)
            .await
            .expect("overview offered");

        dashboard.cycle_filter(false);
        let visible = dashboard.visible_result().expect("result expected");
        assert_eq!(visible.row_count(), 2);
        assert!(visible
            .rows()
            .iter()
            .all(|row| row[2] == CellValue::Text("NY".to_string())));
        assert_eq!(dashboard.source_label(), Some("Food_Claims"));
    }

    #[tokio::test]
    async fn insights_render_each_section_independently() {
        let config = config();
        let first_sql = config.insights[0].sql.clone();
        let backend = FakeBackend::default().with_result(
            &first_sql,
            TabularResult::new(
                vec!["Name".to_string(), "Total_Foods".to_string()],
                vec![vec![text("Acme"), CellValue::Integer(4)]],
            )
            .expect("valid shape"),
        );
        let mut dashboard = started(backend).await;
        dashboard
            .navigate(Destination::Insights)
            .await
            .expect("insights offered");

        let views = dashboard.insight_views();
        assert_eq!(views.len(), 3);
        assert_eq!(views[0].0, "Top Food Providers");
        assert!(matches!(views[0].1, RenderedView::Table(_)));
        assert!(matches!(views[1].1, RenderedView::Failed { .. }));
        assert!(matches!(views[2].1, RenderedView::Failed { .. }));
        assert!(dashboard.executor().provider().backend().executed()[3]
            .contains("date('now')"));
    }

    #[tokio::test]
    async fn unavailable_destination_is_an_error() {
        let mut config = config();
        config.pages = vec![Destination::ExploreViews];
        config.overview_view = None;
        let mut dashboard = Dashboard::new(config, FakeBackend::default()).expect("pages");
        dashboard.start().await;

        assert!(dashboard.navigate(Destination::Insights).await.is_err());
        assert_eq!(dashboard.shell().active(), Destination::ExploreViews);
    }
}
