use std::future::Future;
use std::sync::{mpsc, Arc};

use eframe::egui;
use eframe::egui::{
    Align, Align2, Color32, CornerRadius, FontFamily, FontId, Frame, Layout, Margin, RichText,
    ScrollArea, Stroke, TextEdit, TextStyle, Vec2,
};
use egui_extras::{Column, TableBuilder};
use strum::IntoEnumIterator;
use strum_macros::{Display, EnumIter};
use tokio::runtime::Handle;
use tracing::{error, info};

use quarry_core::analysis::AnalysisView;
use quarry_core::baseline::BaselineView;
use quarry_core::calls::{
    call_cells, CallDetailView, CallFilters, CallSort, CallsRequest, CallsSession, CALL_COLUMNS,
};
use quarry_core::client::ExplorerApi;
use quarry_core::graph::{GraphModel, GraphView};
use quarry_core::inspector::RowDetail;
use quarry_core::options::FilterSelections;
use quarry_core::session::{BrowseSession, Delivery, OptionsRequest, RowRequest, Ticket};
use quarry_core::table::{TableBody, EMPTY_TABLE_MESSAGE};
use quarry_core::types::{GraphPayload, OptionsPayload, RowPage, SampleCall, SampleCallPage};

use crate::config::Settings;
use crate::error::CliResult;

const PAGE_SIZES: [u32; 5] = [10, 25, 50, 100, 250];
const NODE_RADIUS: f32 = 10.0;

pub struct GuiArgs {
    pub runtime_handle: Handle,
    pub api: Arc<dyn ExplorerApi>,
    pub settings: Settings,
    pub initial_dataset: Option<String>,
}

pub fn run_gui(args: GuiArgs) -> CliResult<()> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default().with_inner_size([1400.0, 900.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Quarry",
        native_options,
        Box::new(move |cc| {
            let palette = Palette::default();
            setup_style(&cc.egui_ctx, &palette);
            Ok(Box::new(GuiApp::new(args, cc.egui_ctx.clone())?))
        }),
    )
    .map_err(|err| std::io::Error::other(err.to_string()))?;
    Ok(())
}

#[derive(Clone)]
struct Palette {
    bg_primary: Color32,
    bg_panel: Color32,
    bg_elevated: Color32,
    accent: Color32,
    accent_warm: Color32,
    success: Color32,
    danger: Color32,
    text_primary: Color32,
    text_muted: Color32,
    border: Color32,
    groups: [Color32; 6],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            bg_primary: Color32::from_rgb(0x0F, 0x14, 0x1B),
            bg_panel: Color32::from_rgb(0x14, 0x1C, 0x24),
            bg_elevated: Color32::from_rgb(0x1B, 0x25, 0x30),
            accent: Color32::from_rgb(0x4F, 0x9B, 0xD9),
            accent_warm: Color32::from_rgb(0xE6, 0xA3, 0x6C),
            success: Color32::from_rgb(0x6A, 0xD3, 0x9F),
            danger: Color32::from_rgb(0xE7, 0x6F, 0x51),
            text_primary: Color32::from_rgb(0xE5, 0xEC, 0xF2),
            text_muted: Color32::from_rgb(0x9A, 0xA8, 0xB7),
            border: Color32::from_rgb(0x2C, 0x38, 0x46),
            groups: [
                Color32::from_rgb(0x4F, 0x9B, 0xD9),
                Color32::from_rgb(0xE6, 0xA3, 0x6C),
                Color32::from_rgb(0x6A, 0xD3, 0x9F),
                Color32::from_rgb(0xB8, 0x8B, 0xF5),
                Color32::from_rgb(0xE2, 0x8B, 0x8B),
                Color32::from_rgb(0x7D, 0xC4, 0xFF),
            ],
        }
    }
}

impl Palette {
    fn group_color(&self, index: usize) -> Color32 {
        self.groups[index % self.groups.len()]
    }
}

fn lighten_color(color: Color32, factor: f32) -> Color32 {
    color.gamma_multiply(factor)
}

fn setup_style(ctx: &egui::Context, palette: &Palette) {
    let mut visuals = egui::Visuals::dark();
    visuals.panel_fill = palette.bg_panel;
    visuals.window_fill = palette.bg_primary;
    visuals.faint_bg_color = lighten_color(palette.bg_panel, 1.04);
    visuals.extreme_bg_color = palette.bg_elevated;
    visuals.text_edit_bg_color = Some(palette.bg_elevated);
    visuals.widgets.noninteractive.bg_fill = palette.bg_panel;
    visuals.widgets.noninteractive.bg_stroke = Stroke::new(1.0, palette.border);
    visuals.widgets.inactive.bg_fill = palette.bg_elevated;
    visuals.widgets.active.bg_fill = lighten_color(palette.bg_elevated, 1.08);
    visuals.widgets.hovered.bg_fill = lighten_color(palette.bg_elevated, 1.06);
    visuals.selection.bg_fill = palette.accent.gamma_multiply(0.3);
    visuals.selection.stroke = Stroke::new(1.0, palette.accent);
    visuals.override_text_color = Some(palette.text_primary);
    visuals.weak_text_color = Some(palette.text_muted);
    visuals.warn_fg_color = palette.accent_warm;
    visuals.error_fg_color = palette.danger;
    visuals.striped = true;

    visuals.widgets.inactive.bg_stroke = Stroke::new(1.0, palette.border);
    visuals.widgets.active.bg_stroke = Stroke::new(1.0, palette.accent);
    visuals.widgets.hovered.bg_stroke = Stroke::new(1.5, palette.text_muted);
    visuals.widgets.noninteractive.corner_radius = CornerRadius::same(6);
    visuals.widgets.inactive.corner_radius = CornerRadius::same(6);
    visuals.widgets.hovered.corner_radius = CornerRadius::same(6);
    visuals.widgets.active.corner_radius = CornerRadius::same(6);
    visuals.window_corner_radius = CornerRadius::same(10);
    visuals.window_stroke = Stroke::new(1.0, palette.border);
    visuals.collapsing_header_frame = true;

    ctx.set_visuals(visuals);

    let mut style = (*ctx.style()).clone();
    style.text_styles.insert(
        TextStyle::Heading,
        FontId::new(18.0, FontFamily::Proportional),
    );
    style
        .text_styles
        .insert(TextStyle::Body, FontId::new(13.0, FontFamily::Proportional));
    style.text_styles.insert(
        TextStyle::Monospace,
        FontId::new(12.0, FontFamily::Monospace),
    );
    style.spacing.item_spacing = Vec2::new(10.0, 8.0);
    style.spacing.window_margin = Margin::same(12);
    style.spacing.button_padding = Vec2::new(8.0, 5.0);
    ctx.set_style(style);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, EnumIter, Display)]
enum Tab {
    #[default]
    Datasets,
    Graph,
    #[strum(to_string = "Sample calls")]
    SampleCalls,
}

enum AppEvent {
    DatasetsLoaded(Vec<String>),
    DatasetsFailed(String),
    OptionsLoaded {
        ticket: Ticket,
        dataset: String,
        payload: OptionsPayload,
    },
    OptionsFailed {
        ticket: Ticket,
        error: String,
    },
    RowsLoaded {
        ticket: Ticket,
        page: RowPage,
    },
    RowsFailed {
        ticket: Ticket,
        error: String,
    },
    GraphLoaded {
        ticket: Ticket,
        payload: GraphPayload,
    },
    GraphFailed {
        ticket: Ticket,
        error: String,
    },
    CallsLoaded {
        ticket: Ticket,
        page: SampleCallPage,
    },
    CallsFailed {
        ticket: Ticket,
        error: String,
    },
    CallLoaded {
        ticket: Ticket,
        call: SampleCall,
    },
    CallFailed {
        ticket: Ticket,
        error: String,
    },
}

/// What the user asked for while a frame was drawn. Applied after drawing.
enum Intent {
    SelectDataset(String),
    ApplyFilters,
    ResetFilters,
    NextPage,
    PrevPage,
    SetPageSize(u32),
    SelectRow(usize),
    CloseInspector,
    LoadGraph,
    ApplyCallFilters,
    SetCallSort(CallSort),
    NextCallsPage,
    PrevCallsPage,
    OpenCall(String),
    CloseCall,
    DismissError,
}

/// Unapplied input scoped to the selected dataset.
#[derive(Debug, Default, PartialEq)]
struct DatasetDraft {
    ticker: Option<String>,
    quarter: Option<String>,
    search: String,
    graph_ticker: Option<String>,
}

impl DatasetDraft {
    /// Nothing chosen for one dataset carries over to the next.
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn clear_filters(&mut self) {
        self.ticker = None;
        self.quarter = None;
        self.search.clear();
    }

    fn sync_choices(&mut self, selections: &FilterSelections) {
        self.ticker = selections.ticker().map(str::to_string);
        self.quarter = selections.quarter().map(str::to_string);
    }

    /// Puts back what the table on screen was loaded with.
    fn restore(&mut self, selections: &FilterSelections) {
        self.sync_choices(selections);
        self.search = selections.search().unwrap_or_default().to_string();
    }
}

#[derive(Default)]
struct CallDraft {
    exchange: String,
    sector: String,
    pred_label: String,
    return_min: String,
    return_max: String,
}

struct Inspector {
    /// Distinct per opened row so collapsed sections start fresh.
    serial: u64,
    detail: RowDetail,
    raw_json: String,
}

fn analysis_group_id(serial: u64, index: usize) -> egui::Id {
    egui::Id::new(("analysis-group", serial, index))
}

pub struct GuiApp {
    runtime: Handle,
    api: Arc<dyn ExplorerApi>,
    egui_ctx: egui::Context,
    palette: Palette,
    tab: Tab,
    session: BrowseSession,
    graph: GraphView,
    calls: CallsSession,
    calls_loaded: bool,
    draft: DatasetDraft,
    call_draft: CallDraft,
    graph_limit: u32,
    inspector: Option<Inspector>,
    inspections: u64,
    error: Option<String>,
    initial_dataset: Option<String>,
    events_tx: mpsc::Sender<AppEvent>,
    events_rx: mpsc::Receiver<AppEvent>,
}

impl GuiApp {
    fn new(args: GuiArgs, egui_ctx: egui::Context) -> CliResult<Self> {
        let (events_tx, events_rx) = mpsc::channel();
        let app = Self {
            runtime: args.runtime_handle,
            api: args.api,
            egui_ctx,
            palette: Palette::default(),
            tab: Tab::default(),
            session: BrowseSession::new(args.settings.page_size)?,
            graph: GraphView::new(args.settings.graph_limit),
            calls: CallsSession::new(args.settings.page_size)?,
            calls_loaded: false,
            draft: DatasetDraft::default(),
            call_draft: CallDraft::default(),
            graph_limit: args.settings.graph_limit,
            inspector: None,
            inspections: 0,
            error: None,
            initial_dataset: args.initial_dataset,
            events_tx,
            events_rx,
        };
        app.load_datasets();
        Ok(app)
    }

    /// Runs `task` on the runtime and posts its event back to the UI thread.
    fn dispatch<F>(&self, task: F)
    where
        F: Future<Output = AppEvent> + Send + 'static,
    {
        let tx = self.events_tx.clone();
        let ctx = self.egui_ctx.clone();
        self.runtime.spawn(async move {
            let event = task.await;
            let _ = tx.send(event);
            ctx.request_repaint();
        });
    }

    fn load_datasets(&self) {
        let api = self.api.clone();
        self.dispatch(async move {
            match api.list_datasets().await {
                Ok(list) => AppEvent::DatasetsLoaded(list.datasets),
                Err(err) => AppEvent::DatasetsFailed(err.to_string()),
            }
        });
    }

    fn fetch_options(&self, request: OptionsRequest) {
        let api = self.api.clone();
        self.dispatch(async move {
            match api.fetch_options(&request.query).await {
                Ok(payload) => AppEvent::OptionsLoaded {
                    ticket: request.ticket,
                    dataset: request.dataset,
                    payload,
                },
                Err(err) => AppEvent::OptionsFailed {
                    ticket: request.ticket,
                    error: err.to_string(),
                },
            }
        });
    }

    fn fetch_rows(&self, request: RowRequest) {
        let api = self.api.clone();
        self.dispatch(async move {
            match api.fetch_rows(&request.query).await {
                Ok(page) => AppEvent::RowsLoaded {
                    ticket: request.ticket,
                    page,
                },
                Err(err) => AppEvent::RowsFailed {
                    ticket: request.ticket,
                    error: err.to_string(),
                },
            }
        });
    }

    fn fetch_graph(&mut self) {
        self.graph.set_limit(self.graph_limit);
        let request = self.graph.request(self.draft.graph_ticker.clone());
        let api = self.api.clone();
        self.dispatch(async move {
            match api.fetch_graph(&request.query).await {
                Ok(payload) => AppEvent::GraphLoaded {
                    ticket: request.ticket,
                    payload,
                },
                Err(err) => AppEvent::GraphFailed {
                    ticket: request.ticket,
                    error: err.to_string(),
                },
            }
        });
    }

    fn fetch_calls(&mut self, request: CallsRequest) {
        self.calls_loaded = true;
        let api = self.api.clone();
        self.dispatch(async move {
            match api.fetch_sample_calls(&request.query).await {
                Ok(page) => AppEvent::CallsLoaded {
                    ticket: request.ticket,
                    page,
                },
                Err(err) => AppEvent::CallsFailed {
                    ticket: request.ticket,
                    error: err.to_string(),
                },
            }
        });
    }

    fn open_call(&mut self, id: &str) {
        let request = match self.calls.open_detail(id) {
            Ok(request) => request,
            Err(err) => return self.show_error(err.to_string()),
        };
        let api = self.api.clone();
        self.dispatch(async move {
            match api.fetch_call_detail(&request.id).await {
                Ok(call) => AppEvent::CallLoaded {
                    ticket: request.ticket,
                    call,
                },
                Err(err) => AppEvent::CallFailed {
                    ticket: request.ticket,
                    error: err.to_string(),
                },
            }
        });
    }

    fn select_dataset(&mut self, dataset: &str) {
        match self.session.select_dataset(dataset) {
            Ok(switch) => {
                self.draft.reset();
                self.inspector = None;
                self.fetch_options(switch.options);
                self.fetch_rows(switch.rows);
            }
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn issue_rows(&mut self, request: quarry_core::Result<RowRequest>) {
        match request {
            Ok(request) => {
                self.inspector = None;
                self.fetch_rows(request);
            }
            Err(err) => self.show_error(err.to_string()),
        }
    }

    fn show_error(&mut self, message: String) {
        error!("{message}");
        // One notification at a time; the first failure stays visible.
        if self.error.is_none() {
            self.error = Some(message);
        }
    }

    fn drain_events(&mut self) -> bool {
        let mut handled = false;
        while let Ok(event) = self.events_rx.try_recv() {
            handled = true;
            match event {
                AppEvent::DatasetsLoaded(datasets) => {
                    info!("Server offers {} datasets", datasets.len());
                    let preferred = self
                        .initial_dataset
                        .take()
                        .filter(|wanted| datasets.contains(wanted));
                    if let Some(first) = self.session.set_datasets(datasets) {
                        self.select_dataset(&preferred.unwrap_or(first));
                    }
                }
                AppEvent::DatasetsFailed(error) => self.show_error(error),
                AppEvent::OptionsLoaded {
                    ticket,
                    dataset,
                    payload,
                } => {
                    if self.session.accept_options(ticket, &dataset, payload) == Delivery::Applied {
                        self.draft.sync_choices(self.session.selections());
                    }
                }
                AppEvent::OptionsFailed { ticket, error } => {
                    if self.session.is_current_options(ticket) {
                        self.show_error(error);
                    }
                }
                AppEvent::RowsLoaded { ticket, page } => {
                    match self.session.accept_rows(ticket, page) {
                        Ok(Delivery::Applied) => self.inspector = None,
                        Ok(Delivery::Stale) => {}
                        Ok(Delivery::Refetch(request)) => self.fetch_rows(request),
                        Err(err) => self.show_error(err.to_string()),
                    }
                }
                AppEvent::RowsFailed { ticket, error } => {
                    if self.session.fail_rows(ticket) {
                        self.draft.restore(self.session.selections());
                        self.show_error(error);
                    }
                }
                AppEvent::GraphLoaded { ticket, payload } => {
                    self.graph.accept(ticket, &payload);
                }
                AppEvent::GraphFailed { ticket, error } => {
                    if self.graph.fail(ticket) {
                        self.show_error(error);
                    }
                }
                AppEvent::CallsLoaded { ticket, page } => {
                    if let Delivery::Refetch(request) = self.calls.accept(ticket, page) {
                        self.fetch_calls(request);
                    }
                }
                AppEvent::CallsFailed { ticket, error } => {
                    if self.calls.fail(ticket) {
                        self.show_error(error);
                    }
                }
                AppEvent::CallLoaded { ticket, call } => {
                    self.calls.accept_detail(ticket, &call);
                }
                AppEvent::CallFailed { ticket, error } => {
                    if self.calls.is_current_detail(ticket) {
                        self.show_error(error);
                    }
                }
            }
        }
        handled
    }

    fn apply_intents(&mut self, intents: Vec<Intent>) {
        for intent in intents {
            match intent {
                Intent::SelectDataset(dataset) => self.select_dataset(&dataset),
                Intent::ApplyFilters => {
                    let request = self.session.apply_filters(
                        self.draft.ticker.as_deref(),
                        self.draft.quarter.as_deref(),
                        Some(self.draft.search.as_str()),
                    );
                    self.issue_rows(request);
                }
                Intent::ResetFilters => {
                    self.draft.clear_filters();
                    let request = self.session.reset_filters();
                    self.issue_rows(request);
                }
                Intent::NextPage => match self.session.next_page() {
                    Ok(Some(request)) => self.fetch_rows(request),
                    Ok(None) => {}
                    Err(err) => self.show_error(err.to_string()),
                },
                Intent::PrevPage => match self.session.prev_page() {
                    Ok(Some(request)) => self.fetch_rows(request),
                    Ok(None) => {}
                    Err(err) => self.show_error(err.to_string()),
                },
                Intent::SetPageSize(page_size) => {
                    let request = self.session.set_page_size(page_size);
                    self.issue_rows(request);
                }
                Intent::SelectRow(index) => {
                    if let Some(detail) = self.session.select_row(index) {
                        let raw_json = detail.raw_json().unwrap_or_else(|err| err.to_string());
                        self.inspections += 1;
                        self.inspector = Some(Inspector {
                            serial: self.inspections,
                            detail,
                            raw_json,
                        });
                    }
                }
                Intent::CloseInspector => self.inspector = None,
                Intent::LoadGraph => self.fetch_graph(),
                Intent::ApplyCallFilters => match self.call_filters() {
                    Ok(filters) => {
                        let request = self.calls.apply_filters(filters);
                        self.fetch_calls(request);
                    }
                    Err(err) => self.show_error(err.to_string()),
                },
                Intent::SetCallSort(sort) => {
                    let request = self.calls.set_sort(sort);
                    self.fetch_calls(request);
                }
                Intent::NextCallsPage => {
                    if let Some(request) = self.calls.next_page() {
                        self.fetch_calls(request);
                    }
                }
                Intent::PrevCallsPage => {
                    if let Some(request) = self.calls.prev_page() {
                        self.fetch_calls(request);
                    }
                }
                Intent::OpenCall(id) => self.open_call(&id),
                Intent::CloseCall => self.calls.close_detail(),
                Intent::DismissError => self.error = None,
            }
        }
    }

    fn call_filters(&self) -> quarry_core::Result<CallFilters> {
        let text = |value: &str| Some(value.trim().to_string()).filter(|value| !value.is_empty());
        Ok(CallFilters {
            exchange: text(&self.call_draft.exchange),
            sector: text(&self.call_draft.sector),
            pred_label: text(&self.call_draft.pred_label),
            return_min: CallFilters::parse_bound("return_min", &self.call_draft.return_min)?,
            return_max: CallFilters::parse_bound("return_max", &self.call_draft.return_max)?,
        })
    }
}

impl eframe::App for GuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if self.drain_events() {
            ctx.request_repaint();
        }
        if self.tab == Tab::SampleCalls && !self.calls_loaded {
            let request = self.calls.request();
            self.fetch_calls(request);
        }

        let mut intents: Vec<Intent> = Vec::new();
        let palette = self.palette.clone();

        egui::TopBottomPanel::top("header")
            .exact_height(52.0)
            .frame(
                Frame::new()
                    .fill(palette.bg_panel)
                    .stroke(Stroke::new(1.0, palette.border))
                    .inner_margin(Margin::symmetric(16, 10)),
            )
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.label(
                        RichText::new("Quarry")
                            .color(palette.text_primary)
                            .size(18.0)
                            .strong(),
                    );
                    ui.add_space(16.0);
                    for tab in Tab::iter() {
                        ui.selectable_value(&mut self.tab, tab, tab.to_string());
                    }
                    ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                        let busy = self.session.is_loading()
                            || self.graph.is_loading()
                            || self.calls.is_loading();
                        if busy {
                            ui.spinner();
                        }
                    });
                });
            });

        match self.tab {
            Tab::Datasets => {
                if let Some(inspector) = &self.inspector {
                    egui::SidePanel::right("inspector")
                        .resizable(true)
                        .default_width(380.0)
                        .frame(
                            Frame::new()
                                .fill(palette.bg_panel)
                                .stroke(Stroke::new(1.0, palette.border))
                                .inner_margin(Margin::same(16)),
                        )
                        .show(ctx, |ui| {
                            render_inspector(ui, inspector, &palette, &mut intents);
                        });
                }
                egui::CentralPanel::default()
                    .frame(
                        Frame::new()
                            .fill(palette.bg_primary)
                            .inner_margin(Margin::same(16)),
                    )
                    .show(ctx, |ui| {
                        render_filters(
                            ui,
                            &self.session,
                            &mut self.draft,
                            &palette,
                            &mut intents,
                        );
                        ui.add_space(8.0);
                        render_pagination(ui, &self.session, &palette, &mut intents);
                        ui.add_space(8.0);
                        render_rows(ui, &self.session, &palette, &mut intents);
                    });
            }
            Tab::Graph => {
                egui::CentralPanel::default()
                    .frame(
                        Frame::new()
                            .fill(palette.bg_primary)
                            .inner_margin(Margin::same(16)),
                    )
                    .show(ctx, |ui| {
                        ui.horizontal(|ui| {
                            let tickers: Vec<String> = self
                                .session
                                .selections()
                                .options()
                                .tickers()
                                .map(str::to_string)
                                .collect();
                            option_combo(ui, "graph-ticker", "Ticker", &tickers, &mut self.draft.graph_ticker);
                            ui.label(RichText::new("Limit").color(palette.text_muted));
                            ui.add(egui::DragValue::new(&mut self.graph_limit).range(1..=500));
                            if ui.button("Load graph").clicked() {
                                intents.push(Intent::LoadGraph);
                            }
                            let model = self.graph.model();
                            ui.label(
                                RichText::new(format!(
                                    "{} nodes, {} edges",
                                    model.nodes().len(),
                                    model.edges().len()
                                ))
                                .color(palette.text_muted),
                            );
                        });
                        ui.add_space(8.0);
                        Frame::new()
                            .fill(palette.bg_panel)
                            .stroke(Stroke::new(1.0, palette.border))
                            .corner_radius(CornerRadius::same(8))
                            .show(ui, |ui| {
                                let size = ui.available_size();
                                let (response, painter) =
                                    ui.allocate_painter(size, egui::Sense::hover());
                                let hovered =
                                    draw_graph(&painter, response.rect, self.graph.model(), response.hover_pos(), &palette);
                                if let Some(tooltip) = hovered {
                                    response.on_hover_text(tooltip);
                                }
                            });
                    });
            }
            Tab::SampleCalls => {
                if let Some(detail) = self.calls.detail() {
                    egui::SidePanel::right("call-detail")
                        .resizable(true)
                        .default_width(400.0)
                        .frame(
                            Frame::new()
                                .fill(palette.bg_panel)
                                .stroke(Stroke::new(1.0, palette.border))
                                .inner_margin(Margin::same(16)),
                        )
                        .show(ctx, |ui| {
                            render_call_detail(ui, detail, &palette, &mut intents);
                        });
                }
                egui::CentralPanel::default()
                    .frame(
                        Frame::new()
                            .fill(palette.bg_primary)
                            .inner_margin(Margin::same(16)),
                    )
                    .show(ctx, |ui| {
                        render_call_filters(ui, &self.calls, &mut self.call_draft, &mut intents);
                        ui.add_space(8.0);
                        render_calls(ui, &self.calls, &palette, &mut intents);
                    });
            }
        }

        if let Some(message) = &self.error {
            let modal = egui::Modal::new(egui::Id::new("request-error")).show(ctx, |ui| {
                ui.set_max_width(420.0);
                ui.label(
                    RichText::new("Request failed")
                        .color(palette.danger)
                        .size(16.0)
                        .strong(),
                );
                ui.add_space(6.0);
                ui.label(message);
                ui.add_space(10.0);
                ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                    ui.button("Dismiss").clicked()
                })
                .inner
            });
            if modal.inner || modal.should_close() {
                intents.push(Intent::DismissError);
            }
        }

        self.apply_intents(intents);
    }
}

fn option_combo(
    ui: &mut egui::Ui,
    id: &str,
    label: &str,
    choices: &[String],
    selected: &mut Option<String>,
) {
    let selected_text = selected.clone().unwrap_or_else(|| "All".to_string());
    egui::ComboBox::from_id_salt(id)
        .selected_text(format!("{label}: {selected_text}"))
        .width(180.0)
        .show_ui(ui, |ui| {
            ui.selectable_value(selected, None, "All");
            for choice in choices {
                ui.selectable_value(selected, Some(choice.clone()), choice);
            }
        });
}

fn render_filters(
    ui: &mut egui::Ui,
    session: &BrowseSession,
    draft: &mut DatasetDraft,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    ui.horizontal_wrapped(|ui| {
        let current = session.state().dataset().unwrap_or("Select a dataset").to_string();
        egui::ComboBox::from_id_salt("dataset-selector")
            .selected_text(current)
            .width(220.0)
            .show_ui(ui, |ui| {
                for dataset in session.datasets() {
                    let active = session.state().dataset() == Some(dataset.as_str());
                    if ui.selectable_label(active, dataset).clicked() && !active {
                        intents.push(Intent::SelectDataset(dataset.clone()));
                    }
                }
            });

        let options = session.selections().options();
        let tickers: Vec<String> = options.tickers().map(str::to_string).collect();
        let quarters: Vec<String> = options.quarters().map(str::to_string).collect();
        option_combo(ui, "ticker-filter", "Ticker", &tickers, &mut draft.ticker);
        option_combo(ui, "quarter-filter", "Quarter", &quarters, &mut draft.quarter);

        let response = ui.add_sized(
            [220.0, 26.0],
            TextEdit::singleline(&mut draft.search)
                .hint_text("Search")
                .background_color(palette.bg_elevated),
        );
        let submitted =
            response.lost_focus() && ui.input(|input| input.key_pressed(egui::Key::Enter));
        if ui.button("Apply").clicked() || submitted {
            intents.push(Intent::ApplyFilters);
        }
        if ui.button("Reset").clicked() {
            intents.push(Intent::ResetFilters);
        }
    });
}

fn render_pagination(
    ui: &mut egui::Ui,
    session: &BrowseSession,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    let pagination = session.state().pagination();
    ui.horizontal(|ui| {
        if ui
            .add_enabled(pagination.can_prev(), egui::Button::new("◀ Prev"))
            .clicked()
        {
            intents.push(Intent::PrevPage);
        }
        ui.label(pagination.page_label());
        if ui
            .add_enabled(pagination.can_next(), egui::Button::new("Next ▶"))
            .clicked()
        {
            intents.push(Intent::NextPage);
        }
        ui.add_space(12.0);
        ui.label(RichText::new(pagination.range_label()).color(palette.text_muted));
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            let mut page_size = pagination.page_size();
            egui::ComboBox::from_id_salt("page-size")
                .selected_text(format!("{page_size} / page"))
                .show_ui(ui, |ui| {
                    for size in PAGE_SIZES {
                        ui.selectable_value(&mut page_size, size, size.to_string());
                    }
                });
            if page_size != pagination.page_size() {
                intents.push(Intent::SetPageSize(page_size));
            }
        });
    });
}

fn render_rows(
    ui: &mut egui::Ui,
    session: &BrowseSession,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    let table = session.table();
    if table.columns().is_empty() {
        if let TableBody::Placeholder { message, .. } = table.body() {
            ui.label(RichText::new(*message).color(palette.text_muted).italics());
        }
        return;
    }

    let selected = session.selected_index();
    ScrollArea::horizontal()
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            let mut builder = TableBuilder::new(ui)
                .id_salt("rows-table")
                .striped(true)
                .resizable(true)
                .cell_layout(Layout::left_to_right(Align::Center));
            for _ in table.columns() {
                builder = builder.column(Column::initial(140.0).at_least(60.0).clip(true));
            }
            builder
                .header(24.0, |mut header| {
                    for column in table.columns() {
                        header.col(|ui| {
                            ui.label(
                                RichText::new(column)
                                    .color(palette.text_muted)
                                    .size(11.0)
                                    .strong(),
                            );
                        });
                    }
                })
                .body(|mut body| match table.body() {
                    TableBody::Rows(rows) => {
                        body.rows(24.0, rows.len(), |mut row| {
                            let index = row.index();
                            let is_selected = selected == Some(index);
                            for cell in &rows[index] {
                                row.col(|ui| {
                                    if ui.selectable_label(is_selected, cell).clicked() {
                                        intents.push(Intent::SelectRow(index));
                                    }
                                });
                            }
                        });
                    }
                    TableBody::Placeholder { span, message } => {
                        body.row(24.0, |mut row| {
                            row.col(|ui| {
                                ui.label(RichText::new(*message).color(palette.text_muted).italics());
                            });
                            for _ in 1..*span {
                                row.col(|_| {});
                            }
                        });
                    }
                });
        });
}

fn section_label(ui: &mut egui::Ui, text: &str, palette: &Palette) {
    ui.label(
        RichText::new(text)
            .color(palette.text_muted)
            .size(12.0)
            .strong(),
    );
}

fn render_inspector(
    ui: &mut egui::Ui,
    inspector: &Inspector,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    let detail = &inspector.detail;
    ui.horizontal(|ui| {
        ui.label(
            RichText::new("Row Inspector")
                .color(palette.text_primary)
                .size(16.0)
                .strong(),
        );
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if ui.button("X").clicked() {
                intents.push(Intent::CloseInspector);
            }
        });
    });
    ui.separator();

    ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
        section_label(ui, "Fields", palette);
        egui::Grid::new("inspector-fields")
            .num_columns(2)
            .striped(true)
            .show(ui, |ui| {
                for (name, value) in &detail.fields {
                    ui.label(RichText::new(name).color(palette.text_muted));
                    ui.label(value);
                    ui.end_row();
                }
            });

        ui.add_space(12.0);
        section_label(ui, "Agent analysis", palette);
        match &detail.analysis {
            AnalysisView::Decoded(report) => {
                for (index, group) in report.groups.iter().enumerate() {
                    egui::CollapsingHeader::new(group.title())
                        .id_salt(analysis_group_id(inspector.serial, index))
                        .default_open(group.expanded)
                        .show(ui, |ui| {
                            for line in &group.items {
                                ui.label(RichText::new(&line.headline).strong());
                                if let Some(reason) = &line.reason {
                                    ui.label(RichText::new(reason).color(palette.text_muted));
                                }
                            }
                        });
                }
                if let Some(summary) = &report.summary {
                    ui.add_space(4.0);
                    ui.label(RichText::new(summary).italics());
                }
            }
            AnalysisView::ParseError(_) => {
                if let Some(message) = detail.analysis.message() {
                    ui.label(RichText::new(message).color(palette.danger));
                }
            }
            AnalysisView::NoAnalysis => {
                if let Some(message) = detail.analysis.message() {
                    ui.label(RichText::new(message).color(palette.text_muted).italics());
                }
            }
        }

        ui.add_space(12.0);
        section_label(ui, "Baseline metrics", palette);
        match &detail.baseline {
            BaselineView::Populated(fields) => {
                egui::Grid::new("inspector-baseline")
                    .num_columns(2)
                    .show(ui, |ui| {
                        for (name, value) in fields {
                            ui.label(RichText::new(name).color(palette.text_muted));
                            ui.label(RichText::new(value).color(palette.accent_warm));
                            ui.end_row();
                        }
                    });
            }
            other => {
                if let Some(message) = other.message() {
                    ui.label(RichText::new(message).color(palette.text_muted).italics());
                }
            }
        }

        ui.add_space(12.0);
        egui::CollapsingHeader::new("Raw row")
            .id_salt("inspector-raw")
            .default_open(false)
            .show(ui, |ui| {
                let mut display = inspector.raw_json.clone();
                ui.add(
                    TextEdit::multiline(&mut display)
                        .font(TextStyle::Monospace)
                        .interactive(false)
                        .desired_width(f32::INFINITY),
                );
            });
    });
}

/// Draws `model` with nodes on a circle. Returns the tooltip of the node
/// under `pointer`, if any.
fn draw_graph(
    painter: &egui::Painter,
    rect: egui::Rect,
    model: &GraphModel,
    pointer: Option<egui::Pos2>,
    palette: &Palette,
) -> Option<String> {
    if model.is_empty() {
        painter.text(
            rect.center(),
            Align2::CENTER_CENTER,
            "No graph loaded",
            FontId::new(12.0, FontFamily::Proportional),
            palette.text_muted,
        );
        return None;
    }

    let nodes = model.nodes();
    let center = rect.center();
    let radius = rect.width().min(rect.height()) * 0.38;
    let positions: Vec<egui::Pos2> = (0..nodes.len())
        .map(|idx| {
            let angle = idx as f32 / nodes.len() as f32 * std::f32::consts::TAU;
            egui::pos2(
                center.x + radius * angle.cos(),
                center.y + radius * angle.sin(),
            )
        })
        .collect();

    for edge in model.edges() {
        let (Some(from), Some(to)) = (
            model.node_index(&edge.from).and_then(|idx| positions.get(idx)),
            model.node_index(&edge.to).and_then(|idx| positions.get(idx)),
        ) else {
            continue;
        };
        let stroke = Stroke::new(1.0, palette.text_muted);
        let direction = (*to - *from).normalized();
        let tip = *to - direction * NODE_RADIUS;
        if edge.directed {
            painter.arrow(*from, tip - *from, stroke);
        } else {
            painter.line_segment([*from, tip], stroke);
        }

        if !edge.label.is_empty() {
            let mid = egui::pos2((from.x + to.x) * 0.5, (from.y + to.y) * 0.5);
            let text_width = edge.label.len() as f32 * 6.0;
            let text_rect = egui::Rect::from_center_size(mid, Vec2::new(text_width + 12.0, 16.0));
            painter.rect(
                text_rect,
                CornerRadius::same(6),
                palette.bg_primary,
                Stroke::new(1.0, palette.border),
                egui::StrokeKind::Middle,
            );
            painter.text(
                mid,
                Align2::CENTER_CENTER,
                &edge.label,
                FontId::new(10.0, FontFamily::Proportional),
                palette.text_muted,
            );
        }
    }

    let groups = model.groups();
    let mut hovered = None;
    for (node, pos) in nodes.iter().zip(&positions) {
        let group = groups
            .iter()
            .position(|group| *group == node.group)
            .unwrap_or_default();
        let color = palette.group_color(group);
        painter.circle_filled(*pos, NODE_RADIUS + 4.0, color.gamma_multiply(0.15));
        painter.circle_filled(*pos, NODE_RADIUS, color);
        painter.text(
            *pos + Vec2::new(0.0, NODE_RADIUS + 6.0),
            Align2::CENTER_TOP,
            &node.label,
            FontId::new(12.0, FontFamily::Proportional),
            palette.text_primary,
        );
        if pointer.is_some_and(|pointer| pointer.distance(*pos) <= NODE_RADIUS + 4.0) {
            hovered = Some(node.tooltip.clone());
        }
    }

    // Legend
    let mut legend = rect.left_top() + Vec2::new(12.0, 12.0);
    for (index, group) in groups.iter().enumerate() {
        painter.circle_filled(legend + Vec2::new(5.0, 7.0), 5.0, palette.group_color(index));
        painter.text(
            legend + Vec2::new(16.0, 0.0),
            Align2::LEFT_TOP,
            *group,
            FontId::new(11.0, FontFamily::Proportional),
            palette.text_muted,
        );
        legend.y += 18.0;
    }

    hovered
}

fn render_call_filters(
    ui: &mut egui::Ui,
    calls: &CallsSession,
    draft: &mut CallDraft,
    intents: &mut Vec<Intent>,
) {
    ui.horizontal_wrapped(|ui| {
        for (hint, value) in [
            ("Exchange", &mut draft.exchange),
            ("Sector", &mut draft.sector),
            ("Prediction", &mut draft.pred_label),
            ("Min return", &mut draft.return_min),
            ("Max return", &mut draft.return_max),
        ] {
            ui.add_sized([120.0, 26.0], TextEdit::singleline(value).hint_text(hint));
        }
        if ui.button("Apply").clicked() {
            intents.push(Intent::ApplyCallFilters);
        }

        let current = calls.state().sort_by();
        egui::ComboBox::from_id_salt("call-sort")
            .selected_text(current.label())
            .show_ui(ui, |ui| {
                for sort in CallSort::iter() {
                    if ui.selectable_label(sort == current, sort.label()).clicked() && sort != current {
                        intents.push(Intent::SetCallSort(sort));
                    }
                }
            });
    });
}

fn render_calls(
    ui: &mut egui::Ui,
    calls: &CallsSession,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    let pagination = calls.state().pagination();
    ui.horizontal(|ui| {
        if ui
            .add_enabled(pagination.can_prev(), egui::Button::new("◀ Prev"))
            .clicked()
        {
            intents.push(Intent::PrevCallsPage);
        }
        ui.label(pagination.page_label());
        if ui
            .add_enabled(pagination.can_next(), egui::Button::new("Next ▶"))
            .clicked()
        {
            intents.push(Intent::NextCallsPage);
        }
        ui.add_space(12.0);
        ui.label(RichText::new(pagination.range_label()).color(palette.text_muted));
    });
    ui.add_space(8.0);

    let rows = calls.calls();
    if rows.is_empty() {
        ui.label(
            RichText::new(EMPTY_TABLE_MESSAGE)
                .color(palette.text_muted)
                .italics(),
        );
        return;
    }
    let cells: Vec<Vec<String>> = rows.iter().map(call_cells).collect();
    ScrollArea::horizontal()
        .auto_shrink([false; 2])
        .show(ui, |ui| {
            TableBuilder::new(ui)
                .id_salt("calls-table")
                .striped(true)
                .resizable(true)
                .cell_layout(Layout::left_to_right(Align::Center))
                .columns(Column::initial(110.0).at_least(60.0).clip(true), CALL_COLUMNS.len())
                .header(24.0, |mut header| {
                    for column in CALL_COLUMNS {
                        header.col(|ui| {
                            ui.label(
                                RichText::new(*column)
                                    .color(palette.text_muted)
                                    .size(11.0)
                                    .strong(),
                            );
                        });
                    }
                })
                .body(|body| {
                    body.rows(24.0, cells.len(), |mut row| {
                        let index = row.index();
                        let id = rows[index].id.clone();
                        for cell in &cells[index] {
                            row.col(|ui| {
                                if ui.selectable_label(false, cell).clicked() {
                                    intents.push(Intent::OpenCall(id.clone().unwrap_or_default()));
                                }
                            });
                        }
                    });
                });
        });
}

fn render_call_detail(
    ui: &mut egui::Ui,
    detail: &CallDetailView,
    palette: &Palette,
    intents: &mut Vec<Intent>,
) {
    ui.horizontal(|ui| {
        ui.label(
            RichText::new(&detail.title)
                .color(palette.text_primary)
                .size(16.0)
                .strong(),
        );
        ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
            if ui.button("X").clicked() {
                intents.push(Intent::CloseCall);
            }
        });
    });
    ui.separator();

    ScrollArea::vertical().auto_shrink([false; 2]).show(ui, |ui| {
        egui::Grid::new("call-fields").num_columns(2).show(ui, |ui| {
            for (name, value) in &detail.fields {
                ui.label(RichText::new(name).color(palette.text_muted));
                let color = match value.as_str() {
                    "✓" => palette.success,
                    "✗" => palette.danger,
                    _ => palette.text_primary,
                };
                ui.label(RichText::new(value).color(color));
                ui.end_row();
            }
        });

        if let Some(summary) = &detail.summary {
            ui.add_space(12.0);
            section_label(ui, "Summary", palette);
            ui.label(summary);
        }
        for (title, points) in [
            ("Comparative points", &detail.comparative_points),
            ("Historical notes", &detail.historical_notes),
        ] {
            if points.is_empty() {
                continue;
            }
            ui.add_space(12.0);
            section_label(ui, title, palette);
            for point in points {
                ui.label(format!("• {point}"));
            }
        }
        if !detail.token_usage.is_empty() {
            ui.add_space(12.0);
            egui::CollapsingHeader::new("Token usage")
                .id_salt("call-token-usage")
                .show(ui, |ui| {
                    for (name, value) in &detail.token_usage {
                        ui.monospace(format!("{name}: {value}"));
                    }
                });
        }
    });
}
